use tracing::{debug, info};

use crate::models::{LockResultMessage, SendMessage};
use crate::websocket::fanout;
use crate::ws::{ConnCtx, ConnectionHandle, SessionRegistry};

/// Handle a lock request. The requester always gets a `lock_response`; the
/// other participants only hear about it when the lock was actually taken.
pub fn handle_lock_message(ctx: &ConnCtx, registry: &SessionRegistry<ConnectionHandle>) {
    let success = registry
        .acquire_lock(&ctx.document_id, &ctx.user_id, |session| {
            fanout::broadcast(session, &SendMessage::lock_state(&ctx.user_id, true));
        })
        .unwrap_or_else(|e| {
            debug!("Lock request from {} on document {} failed: {}", ctx.user_id, ctx.document_id, e);
            false
        });

    if success {
        info!("Document {} locked by {}", ctx.document_id, ctx.user_id);
    }
    fanout::reply(&ctx.handle, &SendMessage::LockResponse(LockResultMessage { success }));
}

/// Handle an unlock request. Only the holder can release.
pub fn handle_unlock_message(ctx: &ConnCtx, registry: &SessionRegistry<ConnectionHandle>) {
    let success = registry
        .release_lock(&ctx.document_id, &ctx.user_id, |session| {
            fanout::broadcast(session, &SendMessage::lock_state(&ctx.user_id, false));
        })
        .unwrap_or(false);

    if success {
        info!("Document {} unlocked by {}", ctx.document_id, ctx.user_id);
    }
    fanout::reply(&ctx.handle, &SendMessage::UnlockResponse(LockResultMessage { success }));
}
