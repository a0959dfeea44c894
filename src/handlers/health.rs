use std::sync::Arc;
use axum::{extract::State, Json};
use crate::AppState;
use crate::models::HealthResponse;
use tracing::debug;

/// Health check endpoint
pub async fn health_check() -> Json<HealthResponse> {
    debug!("Health check requested");
    Json(HealthResponse {
        status: "ok".to_string(),
        message: "Server is running".to_string(),
    })
}

/// Readiness check endpoint
pub async fn ready_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    debug!("Readiness check requested");
    let stats = state.registry.stats();
    Json(HealthResponse {
        status: "ok".to_string(),
        message: format!("Service is ready ({} active sessions)", stats.sessions),
    })
}
