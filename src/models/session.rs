use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::{IntoParams, ToSchema};

/// One accepted edit. Never modified after it enters the change log.
#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
pub struct ChangeRecord {
    /// Per-session acceptance order, starting at 1.
    pub seq: u64,
    pub user_id: String,
    /// Assigned by the registry when the change is accepted.
    #[serde(rename = "timestamp")]
    pub applied_at: DateTime<Utc>,
    /// Opaque client payload, stored verbatim.
    #[schema(value_type = Object)]
    pub change: Value,
}

/// Last known cursor of a participant.
#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
pub struct CursorState {
    #[schema(value_type = Object)]
    pub position: Value,
    #[serde(rename = "timestamp")]
    pub updated_at: DateTime<Utc>,
}

/// Result of an accepted cursor move.
#[derive(Debug, Clone, PartialEq)]
pub struct CursorUpdate {
    pub user_id: String,
    pub position: Value,
    pub updated_at: DateTime<Utc>,
}

/// Full state handed to a participant right after it joins.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub lock_holder: Option<String>,
    pub cursors: BTreeMap<String, CursorState>,
    pub changes: Vec<ChangeRecord>,
}

/// Read-only summary of a session, served over HTTP.
#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq, Default)]
pub struct SessionInfoResponse {
    pub active_users: Vec<String>,
    pub locked_by: Option<String>,
    /// When the current holder took the lock.
    pub locked_at: Option<DateTime<Utc>>,
    pub recent_changes: Vec<ChangeRecord>,
}

#[derive(Deserialize, IntoParams, Debug)]
#[into_params(parameter_in = Query)]
pub struct LockRequest {
    pub user_id: String,
}

#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct LockResponse {
    pub success: bool,
}
