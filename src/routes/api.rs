use crate::{
    AppState,
    handlers::{diagnostics, health_check, ready_check, session_info, session_lock, session_unlock},
    routes::auth_middleware::auth_middleware,
    websocket::websocket_handler,
};
use axum::{routing::{get, post}, Router, middleware};
use std::sync::Arc;

/// Create API routes
pub fn create_api_routes(state: Arc<AppState>) -> Router {
    let protected = Router::<Arc<AppState>>::new()
        .route("/v1/diagnostics", get(diagnostics))
        .route("/collaboration/:document_id/info", get(session_info))
        .route("/collaboration/:document_id/lock", post(session_lock))
        .route("/collaboration/:document_id/unlock", post(session_unlock))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware)); // Applies to all routes added above

    Router::<Arc<AppState>>::new()
        .route("/health", get(health_check))
        .route("/ready", get(ready_check))
        // Authorizes against the path participant itself, before upgrading
        .route("/collaboration/:document_id/ws/:user_id", get(websocket_handler))
        .merge(protected)
        .with_state(state)
}
