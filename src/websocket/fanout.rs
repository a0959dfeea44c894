use tracing::{error, warn};

use crate::models::{DeliveryError, SendMessage};
use crate::ws::{ConnectionHandle, Outbound, Session};

fn encode(msg: &SendMessage) -> Option<String> {
    match serde_json::to_string(msg) {
        Ok(text) => Some(text),
        Err(e) => {
            error!("Failed to serialize outbound message: {}", e);
            None
        }
    }
}

/// Queue `msg` for every participant of the session.
///
/// Each recipient is attempted independently; a failed delivery is logged and
/// the loop moves on. A recipient whose queue is full is evicted rather than
/// left with a gap in its event stream. Returns the number of participants the
/// message reached.
pub fn broadcast(session: &Session<ConnectionHandle>, msg: &SendMessage) -> usize {
    let Some(text) = encode(msg) else {
        return 0;
    };

    let mut delivered = 0;
    for (user_id, handle) in session.handles() {
        match handle.deliver(Outbound::Text(text.clone())) {
            Ok(()) => delivered += 1,
            Err(DeliveryError::Lagging) => warn!(
                "{} is not keeping up on document {}, disconnecting",
                user_id,
                session.document_id()
            ),
            Err(e) => warn!(
                "Failed to deliver to {} on document {}: {}",
                user_id,
                session.document_id(),
                e
            ),
        }
    }
    delivered
}

/// Queue `msg` for a single connection.
pub fn reply(handle: &ConnectionHandle, msg: &SendMessage) -> bool {
    let Some(text) = encode(msg) else {
        return false;
    };
    match handle.deliver(Outbound::Text(text)) {
        Ok(()) => true,
        Err(e) => {
            warn!("Failed to reply on connection {}: {}", handle.conn_id(), e);
            false
        }
    }
}
