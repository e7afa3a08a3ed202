//! Receiving side of one event stream connection.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::mpsc;

use super::broadcast::Fanout;

/// Frames queued for one subscriber, in emission order.
///
/// Ends when the fan-out drops the connection. Dropping the subscription
/// (client disconnected) unregisters it.
pub struct Subscription {
    id: String,
    rx: mpsc::Receiver<Arc<str>>,
    fanout: Arc<Fanout>,
}

impl Subscription {
    pub(crate) fn new(id: String, rx: mpsc::Receiver<Arc<str>>, fanout: Arc<Fanout>) -> Self {
        Self { id, rx, fanout }
    }

    /// ID of the underlying connection.
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish_non_exhaustive()
    }
}

impl Stream for Subscription {
    type Item = Arc<str>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let _ = self.fanout.remove(&self.id);
    }
}
