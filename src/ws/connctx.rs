use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::Notify;
use uuid::Uuid;

use crate::models::DeliveryError;

/// Frames queued for one connection's writer task.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Text(String),
    /// Close the socket once the frames queued before it are written.
    Close,
}

/// Sending side of one physical connection, stored in the session registry.
///
/// Two handles are equal when they refer to the same connection.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    conn_id: Uuid,
    tx: mpsc::Sender<Outbound>,
    eviction: Arc<Notify>,
}

impl PartialEq for ConnectionHandle {
    fn eq(&self, other: &Self) -> bool {
        self.conn_id == other.conn_id
    }
}

impl ConnectionHandle {
    pub fn new(tx: mpsc::Sender<Outbound>) -> Self {
        Self {
            conn_id: Uuid::new_v4(),
            tx,
            eviction: Arc::new(Notify::new()),
        }
    }

    pub fn conn_id(&self) -> Uuid {
        self.conn_id
    }

    /// Queue a frame without waiting.
    ///
    /// A full queue means the peer stopped reading and has already missed a
    /// frame. The connection is evicted so the client reconnects and starts
    /// again from a fresh `current_state`.
    pub fn deliver(&self, frame: Outbound) -> Result<(), DeliveryError> {
        self.tx.try_send(frame).map_err(|e| match e {
            TrySendError::Full(_) => {
                self.evict();
                DeliveryError::Lagging
            }
            TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }

    /// Ask the writer to close the socket after the frames already queued.
    /// Falls back to eviction when the queue has no room for the close.
    pub fn close(&self) {
        if let Err(TrySendError::Full(_)) = self.tx.try_send(Outbound::Close) {
            self.evict();
        }
    }

    /// Close the socket right away, dropping anything still queued.
    pub fn evict(&self) {
        self.eviction.notify_one();
    }

    /// Signal the writer task waits on next to its queue.
    pub fn eviction(&self) -> Arc<Notify> {
        self.eviction.clone()
    }
}

/// Identity of one WebSocket connection.
#[derive(Clone, Debug)]
pub struct ConnCtx {
    pub document_id: String,
    pub user_id: String,
    pub handle: ConnectionHandle,
}
