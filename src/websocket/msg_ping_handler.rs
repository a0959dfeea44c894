use tracing::debug;
use chrono::Utc;

use crate::models::{PongMessage, SendMessage};
use crate::websocket::fanout;
use crate::ws::ConnCtx;

/// Handle ping - reply with a pong carrying the server time.
pub fn handle_ping_message(ctx: &ConnCtx) {
    debug!("Ping received from {} on document {}", ctx.user_id, ctx.document_id);

    let pong = SendMessage::Pong(PongMessage { date: Utc::now().to_rfc3339() });
    fanout::reply(&ctx.handle, &pong);
}
