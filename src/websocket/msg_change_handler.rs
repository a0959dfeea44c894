use tracing::{debug, info};

use crate::models::{ChangeBroadcastMessage, ChangeMessage, CollabError, SendMessage};
use crate::websocket::fanout;
use crate::ws::{ConnCtx, ConnectionHandle, SessionRegistry};

/// Handle a change: append it to the log and broadcast it, or tell the sender
/// why it was refused.
pub fn handle_change_message(msg: ChangeMessage, ctx: &ConnCtx, registry: &SessionRegistry<ConnectionHandle>) {
    let result = registry.apply_change(&ctx.document_id, &ctx.user_id, msg.change, |session, record| {
        let seq = record.seq;
        fanout::broadcast(session, &SendMessage::Change(ChangeBroadcastMessage { change: record }));
        seq
    });

    match result {
        Ok(seq) => debug!("Change #{} from {} applied on document {}", seq, ctx.user_id, ctx.document_id),
        Err(e) => match &e {
            CollabError::LockConflict { holder } => {
                info!(
                    "Change from {} on document {} refused, locked by {}",
                    ctx.user_id, ctx.document_id, holder
                );
                fanout::reply(&ctx.handle, &SendMessage::error(e.to_string()));
            }
            // The sender already left; nobody is waiting for an answer.
            _ => debug!("Dropping change from {} on document {}: {}", ctx.user_id, ctx.document_id, e),
        },
    }
}
