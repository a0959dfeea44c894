use crate::{
    AppState,
    models::{CollabError, ErrorResponse, LockRequest, LockResponse, SendMessage, SessionInfoResponse},
    routes::auth_middleware::AuthenticatedUser,
    websocket::fanout,
};
use axum::{extract::{Extension, Path, Query, State}, http::StatusCode, Json};
use std::sync::Arc;
use tracing::{info, warn};

type HandlerError = (StatusCode, Json<ErrorResponse>);

/// Current participants, lock holder and recent changes of a document
pub async fn session_info(
    State(state): State<Arc<AppState>>,
    Path(document_id): Path<String>,
) -> Json<SessionInfoResponse> {
    Json(state.registry.session_info(&document_id))
}

/// Acquire the document lock on behalf of a connected participant
pub async fn session_lock(
    State(state): State<Arc<AppState>>,
    Path(document_id): Path<String>,
    Query(request): Query<LockRequest>,
    caller: Option<Extension<AuthenticatedUser>>,
) -> Result<Json<LockResponse>, HandlerError> {
    ensure_caller(caller.as_ref().map(|Extension(user)| user), &request.user_id)?;

    let success = state
        .registry
        .acquire_lock(&document_id, &request.user_id, |session| {
            fanout::broadcast(session, &SendMessage::lock_state(&request.user_id, true));
        })
        .map_err(|e| not_found(&document_id, e))?;

    if success {
        info!("Document {} locked by {} over HTTP", document_id, request.user_id);
    }
    Ok(Json(LockResponse { success }))
}

/// Release the document lock; only the holder can
pub async fn session_unlock(
    State(state): State<Arc<AppState>>,
    Path(document_id): Path<String>,
    Query(request): Query<LockRequest>,
    caller: Option<Extension<AuthenticatedUser>>,
) -> Result<Json<LockResponse>, HandlerError> {
    ensure_caller(caller.as_ref().map(|Extension(user)| user), &request.user_id)?;

    let success = state
        .registry
        .release_lock(&document_id, &request.user_id, |session| {
            fanout::broadcast(session, &SendMessage::lock_state(&request.user_id, false));
        })
        .map_err(|e| not_found(&document_id, e))?;

    if success {
        info!("Document {} unlocked by {} over HTTP", document_id, request.user_id);
    }
    Ok(Json(LockResponse { success }))
}

fn ensure_caller(caller: Option<&AuthenticatedUser>, user_id: &str) -> Result<(), HandlerError> {
    match caller {
        Some(AuthenticatedUser(uid)) if uid != user_id => {
            warn!("{} tried to act on the lock as {}", uid, user_id);
            Err(ErrorResponse::reply(StatusCode::FORBIDDEN, format!("Cannot act as '{}'", user_id)))
        }
        _ => Ok(()),
    }
}

fn not_found(document_id: &str, e: CollabError) -> HandlerError {
    warn!("Lock request on document {} failed: {}", document_id, e);
    ErrorResponse::reply(StatusCode::NOT_FOUND, e.to_string())
}
