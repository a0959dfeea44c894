use utoipa::OpenApi;
use crate::models::*;

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/api/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse)
    )
)]
#[allow(dead_code)]
pub async fn health_check_doc() {}

/// Readiness check endpoint
#[utoipa::path(
    get,
    path = "/api/ready",
    responses(
        (status = 200, description = "Service is ready", body = HealthResponse)
    )
)]
#[allow(dead_code)]
pub async fn ready_check_doc() {}

/// Session and resource counters
#[utoipa::path(
    get,
    path = "/api/v1/diagnostics",
    responses(
        (status = 200, description = "Diagnostics snapshot", body = DiagnosticsResponse),
        (status = 401, description = "Missing or invalid token")
    )
)]
#[allow(dead_code)]
pub async fn diagnostics_doc() {}

/// Collaboration session summary
#[utoipa::path(
    get,
    path = "/api/collaboration/{document_id}/info",
    params(("document_id" = String, Path, description = "Document identifier")),
    responses(
        (status = 200, description = "Active users, lock holder and recent changes", body = SessionInfoResponse)
    )
)]
#[allow(dead_code)]
pub async fn session_info_doc() {}

/// Acquire the document lock for a connected participant
#[utoipa::path(
    post,
    path = "/api/collaboration/{document_id}/lock",
    params(("document_id" = String, Path, description = "Document identifier"), LockRequest),
    responses(
        (status = 200, description = "Whether the lock was acquired", body = LockResponse),
        (status = 403, description = "Token does not match user_id", body = ErrorResponse),
        (status = 404, description = "No session or participant not connected", body = ErrorResponse)
    )
)]
#[allow(dead_code)]
pub async fn session_lock_doc() {}

/// Release the document lock held by a participant
#[utoipa::path(
    post,
    path = "/api/collaboration/{document_id}/unlock",
    params(("document_id" = String, Path, description = "Document identifier"), LockRequest),
    responses(
        (status = 200, description = "Whether the lock was released", body = LockResponse),
        (status = 403, description = "Token does not match user_id", body = ErrorResponse),
        (status = 404, description = "No session for the document", body = ErrorResponse)
    )
)]
#[allow(dead_code)]
pub async fn session_unlock_doc() {}

#[derive(OpenApi)]
#[openapi(
    paths(
        health_check_doc,
        ready_check_doc,
        diagnostics_doc,
        session_info_doc,
        session_lock_doc,
        session_unlock_doc,
    ),
    components(
        schemas(HealthResponse, DiagnosticsResponse, SessionInfoResponse, ChangeRecord, LockResponse, ErrorResponse)
    ),
    tags(
        (name = "api", description = "API endpoints")
    )
)]
pub struct ApiDoc;
