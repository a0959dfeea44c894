use axum::{http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Response for an error
#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct ErrorResponse {
    pub code: u16,
    pub status: String,
    pub error: String,
}

impl ErrorResponse {
    /// Build the `(status, body)` pair the HTTP handlers return on failure.
    pub fn reply(status: StatusCode, error: impl Into<String>) -> (StatusCode, Json<ErrorResponse>) {
        (status, Json(ErrorResponse {
            code: status.as_u16(),
            status: status.to_string(),
            error: error.into(),
        }))
    }
}

/// Outcomes of a session operation that did not apply.
///
/// None of these are faults: unknown session/participant is a race with a
/// disconnect, a lock conflict is normal contention, a malformed message is the
/// client's problem and is reported back to it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CollabError {
    #[error("no collaboration session for document '{0}'")]
    UnknownSession(String),
    #[error("participant '{0}' is not connected to this document")]
    UnknownParticipant(String),
    #[error("Document is locked by another user")]
    LockConflict { holder: String },
    #[error("Malformed message: {0}")]
    MalformedMessage(String),
}

/// Failure to enqueue an outbound frame for one recipient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    #[error("outbound queue is full")]
    Lagging,
    #[error("connection is closed")]
    Closed,
}
