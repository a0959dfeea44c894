use std::sync::Arc;
use axum::{
    extract::{Path, Query, State, ws::{Message, WebSocket, WebSocketUpgrade}},
    http::HeaderMap,
    response::{IntoResponse, Response},
};
use futures_util::{Sink, SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::{mpsc, Notify};
use tracing::{debug, info, warn};

use crate::AppState;
use crate::models::{CollabError, ReceivedMessage, SendMessage, UsersMessage};
use crate::services::auth_service;
use crate::websocket::fanout;
use crate::websocket::msg_change_handler::handle_change_message;
use crate::websocket::msg_cursor_handler::handle_cursor_message;
use crate::websocket::msg_lock_handler::{handle_lock_message, handle_unlock_message};
use crate::websocket::msg_ping_handler::handle_ping_message;
use crate::ws::{ConnCtx, ConnectionHandle, Outbound, SessionRegistry};

#[derive(Deserialize, Debug, Default)]
pub struct WsQuery {
    token: Option<String>,
}

/// WebSocket handler
pub async fn websocket_handler(
    Path((document_id, user_id)): Path<(String, String)>,
    Query(query): Query<WsQuery>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
    ws: WebSocketUpgrade,
) -> Response {
    info!("New WebSocket connection attempt for document {} by {}", document_id, user_id);

    if let Err(status) = auth_service::authorize_participant(&state.config, &headers, query.token.as_deref(), &user_id) {
        return status.into_response();
    }

    ws.on_upgrade(move |socket| handle_socket(socket, document_id, user_id, state))
}

/// Handle WebSocket connection
async fn handle_socket(socket: WebSocket, document_id: String, user_id: String, state: Arc<AppState>) {

    // Outbound frames for this connection, drained by the writer task below
    let (tx, mut rx) = mpsc::channel::<Outbound>(state.config.outbound_buffer);
    let ctx = ConnCtx {
        document_id,
        user_id,
        handle: ConnectionHandle::new(tx),
    };

    info!(
        "WebSocket connection established for document {} by {} (connection {})",
        ctx.document_id, ctx.user_id, ctx.handle.conn_id()
    );

    // Register, then send the snapshot to the joiner and the roster to everyone.
    // Both are queued inside the session's critical section, so no event can
    // slip in between the snapshot and the joiner's first broadcast.
    state.registry.join(&ctx.document_id, &ctx.user_id, ctx.handle.clone(), |session, outcome| {
        if let Some(previous) = outcome.replaced {
            info!("{} reconnected to document {}, closing previous connection", ctx.user_id, ctx.document_id);
            previous.close();
        }
        fanout::reply(&ctx.handle, &SendMessage::CurrentState(outcome.snapshot.into()));
        fanout::broadcast(session, &SendMessage::Users(UsersMessage { users: session.roster() }));
    });

    // Split the socket into sender and receiver
    let (mut sender, mut receiver) = socket.split();

    // Writer: forward queued frames to the socket in order
    let eviction = ctx.handle.eviction();
    let mut send_task = tokio::spawn(async move {
        write_frames(&mut sender, &mut rx, &eviction).await;
    });

    // Reader: apply inbound messages against the registry
    let recv_ctx = ctx.clone();
    let recv_state = state.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(frame) = receiver.next().await {
            match frame {
                Ok(Message::Text(text)) => dispatch_message(&text, &recv_ctx, &recv_state.registry),
                Ok(Message::Binary(_)) => {
                    fanout::reply(&recv_ctx.handle, &SendMessage::error("Binary messages are not supported"));
                }
                Ok(Message::Close(_)) => break,
                // Ping/pong frames are answered by the transport
                Ok(_) => {}
                Err(e) => {
                    warn!("WebSocket error for {} on document {}: {}", recv_ctx.user_id, recv_ctx.document_id, e);
                    break;
                }
            }
        }
    });

    // Wait for either task to finish (and finish the other)
    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    };

    disconnect(&ctx, &state.registry);

    info!("WebSocket connection terminated for document {} by {}", ctx.document_id, ctx.user_id);
}

/// Drain the connection's queue into the socket until it is closed, replaced
/// or evicted. Eviction wins over queued frames.
async fn write_frames<S>(sink: &mut S, rx: &mut mpsc::Receiver<Outbound>, eviction: &Notify)
where
    S: Sink<Message> + Unpin,
{
    loop {
        tokio::select! {
            biased;
            _ = eviction.notified() => {
                let _ = sink.send(Message::Close(None)).await;
                break;
            }
            frame = rx.recv() => match frame {
                Some(Outbound::Text(text)) => {
                    if sink.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                Some(Outbound::Close) | None => {
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                }
            },
        }
    }
}

/// Take the connection out of its session and tell the others, unless a
/// reconnection has already replaced it.
fn disconnect(ctx: &ConnCtx, registry: &SessionRegistry<ConnectionHandle>) {
    let left = registry.leave(&ctx.document_id, &ctx.user_id, &ctx.handle, |session, outcome| {
        if outcome.lock_released {
            info!("Lock on document {} released, {} disconnected", ctx.document_id, ctx.user_id);
            fanout::broadcast(session, &SendMessage::lock_state(&ctx.user_id, false));
        }
        fanout::broadcast(session, &SendMessage::Users(UsersMessage { users: session.roster() }));
    });
    if left.is_none() {
        debug!("Connection {} of {} was already replaced", ctx.handle.conn_id(), ctx.user_id);
    }
}

/// Parse one text frame and route it by its `type`.
///
/// Anything that fails to parse is answered with an `error` to the sender only.
pub fn dispatch_message(text: &str, ctx: &ConnCtx, registry: &SessionRegistry<ConnectionHandle>) {
    let msg: ReceivedMessage = match serde_json::from_str(text) {
        Ok(msg) => msg,
        Err(e) => {
            warn!("Failed to parse message from {} on document {}: {}", ctx.user_id, ctx.document_id, e);
            let err = CollabError::MalformedMessage(e.to_string());
            fanout::reply(&ctx.handle, &SendMessage::error(err.to_string()));
            return;
        }
    };

    match msg {
        ReceivedMessage::Cursor(cursor_msg) => handle_cursor_message(cursor_msg, ctx, registry),
        ReceivedMessage::Change(change_msg) => handle_change_message(change_msg, ctx, registry),
        ReceivedMessage::Lock => handle_lock_message(ctx, registry),
        ReceivedMessage::Unlock => handle_unlock_message(ctx, registry),
        ReceivedMessage::Ping => handle_ping_message(ctx),
    }
}
