//! Event stream client connection state.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use uuid::Uuid;

/// Why a frame could not be queued for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushError {
    /// The client's stream is gone.
    Closed,
    /// The client is not draining its queue.
    Full,
}

/// One live `/event` subscriber.
///
/// Holds the sending half of a bounded frame queue; the receiving half
/// feeds the HTTP response body.
pub struct ClientConnection {
    /// Unique connection ID.
    pub id: String,
    /// Send channel to the client's response stream.
    tx: mpsc::Sender<Arc<str>>,
    /// When this connection was established.
    pub connected_at: Instant,
}

impl ClientConnection {
    /// Create a connection with a fresh ID.
    pub fn new(tx: mpsc::Sender<Arc<str>>) -> Self {
        Self::with_id(format!("conn_{}", Uuid::now_v7()), tx)
    }

    /// Create a connection with a fixed ID.
    pub fn with_id(id: String, tx: mpsc::Sender<Arc<str>>) -> Self {
        Self {
            id,
            tx,
            connected_at: Instant::now(),
        }
    }

    /// Queue a frame without waiting.
    pub fn push(&self, frame: Arc<str>) -> Result<(), PushError> {
        self.tx.try_send(frame).map_err(|e| match e {
            mpsc::error::TrySendError::Closed(_) => PushError::Closed,
            mpsc::error::TrySendError::Full(_) => PushError::Full,
        })
    }

    /// Whether the receiving side has gone away.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Connection age.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }
}
