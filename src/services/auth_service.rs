use axum::http::{self, HeaderMap, StatusCode};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation, TokenData};
use tracing::{debug, error, warn};

use crate::config::Config;

const AUTH_COOKIE: &str = "auth_token";

// Get the auth token from request headers
pub fn get_auth_token(headers: &HeaderMap) -> Result<String, String> {
    // 1. Try to get token from Authorization header
    if let Some(auth_header) = headers.get(http::header::AUTHORIZATION) {
        let auth_str = auth_header.to_str().map_err(|_| "Invalid Authorization header".to_string())?;
        Ok(auth_str
            .strip_prefix("Bearer ")
            .unwrap_or(auth_str)
            .to_string())
    }
    // 2. Try to get token from cookies
    else {
        let cookie_header = headers.get(http::header::COOKIE)
            .ok_or_else(|| "Missing Authorization header or Cookie".to_string())?
            .to_str()
            .map_err(|_| "Invalid Cookie header".to_string())?;

        cookie::Cookie::split_parse(cookie_header)
            .flatten()
            .find(|c| c.name() == AUTH_COOKIE)
            .map(|c| c.value().to_string())
            .ok_or_else(|| format!("{} cookie not found", AUTH_COOKIE))
    }
}

// Validate a JWT token and return the token data
pub fn validate_jwt(token: &str, secret: &str) -> Result<TokenData<serde_json::Value>, jsonwebtoken::errors::Error> {
    let validation = Validation::new(Algorithm::HS256);
    let decoding_key = DecodingKey::from_secret(secret.as_bytes());
    decode::<serde_json::Value>(token, &decoding_key, &validation)
}

/// Resolve the identity behind a token to a participant id (the `sub` claim).
pub fn token_subject(token: &str, secret: &str) -> Result<String, StatusCode> {
    let token_data = validate_jwt(token, secret).map_err(|e| {
        error!("JWT validation failed: {}", e);
        StatusCode::UNAUTHORIZED
    })?;

    token_data
        .claims
        .get("sub")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| {
            error!("JWT token does not contain 'sub' claim");
            StatusCode::UNAUTHORIZED
        })
}

/// Check that the caller may act as `participant_id`.
///
/// Without a configured secret every caller is trusted. With one, the token
/// (header, cookie, or the `token` query parameter browsers use for WebSockets)
/// must name the participant in its `sub` claim.
pub fn authorize_participant(
    config: &Config,
    headers: &HeaderMap,
    query_token: Option<&str>,
    participant_id: &str,
) -> Result<(), StatusCode> {
    let Some(secret) = &config.cloud_auth_jwt_secret else {
        return Ok(());
    };

    let token = match query_token {
        Some(token) => token.to_string(),
        None => get_auth_token(headers).map_err(|e| {
            warn!("No auth token for participant {}: {}", participant_id, e);
            StatusCode::UNAUTHORIZED
        })?,
    };

    let subject = token_subject(&token, secret)?;
    if subject != participant_id {
        warn!("Token for {} cannot act as participant {}", subject, participant_id);
        return Err(StatusCode::FORBIDDEN);
    }
    debug!("Participant {} authenticated", participant_id);
    Ok(())
}
