use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::{ChangeRecord, CursorState, SessionSnapshot};

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CursorMessage {
    pub position: Value,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ChangeMessage {
    pub change: Value,
}

/// Messages a client may send on a collaboration socket.
#[derive(Serialize, Deserialize, Debug)]
#[serde(tag = "type")]
pub enum ReceivedMessage {
    #[serde(rename = "cursor")]
    Cursor(CursorMessage),
    #[serde(rename = "change")]
    Change(ChangeMessage),
    #[serde(rename = "lock")]
    Lock,
    #[serde(rename = "unlock")]
    Unlock,
    #[serde(rename = "ping")]
    Ping,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CurrentStateMessage {
    /// Current lock holder, if any.
    pub locks: Option<String>,
    pub cursors: BTreeMap<String, CursorState>,
    pub changes: Vec<ChangeRecord>,
}

impl From<SessionSnapshot> for CurrentStateMessage {
    fn from(snapshot: SessionSnapshot) -> Self {
        Self {
            locks: snapshot.lock_holder,
            cursors: snapshot.cursors,
            changes: snapshot.changes,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct UsersMessage {
    pub users: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CursorBroadcastMessage {
    pub user_id: String,
    pub position: Value,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ChangeBroadcastMessage {
    pub change: ChangeRecord,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct LockStateMessage {
    pub user_id: String,
    pub locked: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct LockResultMessage {
    pub success: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PongMessage {
    pub date: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ErrorMessage {
    pub message: String,
}

/// Messages the server sends, either broadcast or as a direct reply.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type")]
pub enum SendMessage {
    #[serde(rename = "current_state")]
    CurrentState(CurrentStateMessage),
    #[serde(rename = "users")]
    Users(UsersMessage),
    #[serde(rename = "cursor")]
    Cursor(CursorBroadcastMessage),
    #[serde(rename = "change")]
    Change(ChangeBroadcastMessage),
    #[serde(rename = "lock")]
    Lock(LockStateMessage),
    #[serde(rename = "lock_response")]
    LockResponse(LockResultMessage),
    #[serde(rename = "unlock_response")]
    UnlockResponse(LockResultMessage),
    #[serde(rename = "pong")]
    Pong(PongMessage),
    #[serde(rename = "error")]
    Error(ErrorMessage),
}

impl SendMessage {
    pub fn error(message: impl Into<String>) -> Self {
        SendMessage::Error(ErrorMessage { message: message.into() })
    }

    pub fn lock_state(user_id: &str, locked: bool) -> Self {
        SendMessage::Lock(LockStateMessage { user_id: user_id.to_string(), locked })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn parses_inbound_messages_by_type() {
        let cursor: ReceivedMessage =
            serde_json::from_str(r#"{"type":"cursor","position":{"x":3,"y":7}}"#).unwrap();
        assert!(matches!(cursor, ReceivedMessage::Cursor(CursorMessage { position }) if position == json!({"x":3,"y":7})));

        let lock: ReceivedMessage = serde_json::from_str(r#"{"type":"lock"}"#).unwrap();
        assert!(matches!(lock, ReceivedMessage::Lock));

        let unlock: ReceivedMessage = serde_json::from_str(r#"{"type":"unlock","extra":1}"#).unwrap();
        assert!(matches!(unlock, ReceivedMessage::Unlock));
    }

    #[test]
    fn rejects_unknown_type_and_missing_fields() {
        assert!(serde_json::from_str::<ReceivedMessage>(r#"{"type":"delete"}"#).is_err());
        assert!(serde_json::from_str::<ReceivedMessage>(r#"{"type":"change"}"#).is_err());
        assert!(serde_json::from_str::<ReceivedMessage>(r#"{"position":1}"#).is_err());
    }

    #[test]
    fn change_broadcast_wire_shape() {
        let applied_at = Utc::now();
        let msg = SendMessage::Change(ChangeBroadcastMessage {
            change: ChangeRecord {
                seq: 4,
                user_id: "alice".to_string(),
                applied_at,
                change: json!({"payload": "x"}),
            },
        });
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["type"], "change");
        assert_eq!(value["change"]["user_id"], "alice");
        assert_eq!(value["change"]["seq"], 4);
        assert_eq!(value["change"]["change"], json!({"payload": "x"}));
        assert!(value["change"]["timestamp"].is_string());
    }

    #[test]
    fn current_state_uses_null_for_missing_lock() {
        let msg = SendMessage::CurrentState(CurrentStateMessage {
            locks: None,
            cursors: BTreeMap::new(),
            changes: vec![],
        });
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({"type": "current_state", "locks": null, "cursors": {}, "changes": []})
        );
    }

    #[test]
    fn lock_replies_are_distinct_types() {
        let lock = serde_json::to_value(SendMessage::LockResponse(LockResultMessage { success: true })).unwrap();
        let unlock = serde_json::to_value(SendMessage::UnlockResponse(LockResultMessage { success: false })).unwrap();
        assert_eq!(lock, json!({"type": "lock_response", "success": true}));
        assert_eq!(unlock, json!({"type": "unlock_response", "success": false}));
    }
}
