use tracing::debug;

use crate::models::{CursorBroadcastMessage, CursorMessage, SendMessage};
use crate::websocket::fanout;
use crate::ws::{ConnCtx, ConnectionHandle, SessionRegistry};

/// Handle a cursor move: record it and show it to everyone.
pub fn handle_cursor_message(msg: CursorMessage, ctx: &ConnCtx, registry: &SessionRegistry<ConnectionHandle>) {
    let result = registry.update_cursor(&ctx.document_id, &ctx.user_id, msg.position, |session, update| {
        let event = SendMessage::Cursor(CursorBroadcastMessage {
            user_id: update.user_id,
            position: update.position,
        });
        fanout::broadcast(session, &event);
    });

    // Only fails when the participant already left; nothing to tell anyone.
    if let Err(e) = result {
        debug!("Dropping cursor update from {} on document {}: {}", ctx.user_id, ctx.document_id, e);
    }
}
