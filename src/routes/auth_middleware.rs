use std::sync::Arc;
use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use tracing::{debug, error};
use crate::AppState;
use crate::services::auth_service::{get_auth_token, token_subject};

/// Participant id proven by a validated token.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthenticatedUser(pub String);

pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {

    // Without a secret identity is trusted as given
    let Some(secret) = &state.config.cloud_auth_jwt_secret else {
        return Ok(next.run(req).await);
    };

    // 1. Get the auth token from the request
    let token = match get_auth_token(req.headers()) {
        Ok(token) => token,
        Err(e) => {
            error!("Rejecting request without token: {}", e);
            return Err(StatusCode::UNAUTHORIZED);
        }
    };

    // 2. Validate the token and extract the subject
    let uid = token_subject(&token, secret)?;
    debug!("Request authenticated for {}", uid);

    // 3. Make the identity available to downstream handlers
    req.extensions_mut().insert(AuthenticatedUser(uid));

    Ok(next.run(req).await)
}
