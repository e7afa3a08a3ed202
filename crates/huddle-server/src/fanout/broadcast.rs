//! Snapshot fan-out to connected event stream clients.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::connection::{ClientConnection, PushError};
use super::stream::Subscription;

/// Why a new subscriber was turned away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FanoutError {
    /// `max_connections` live streams already open.
    #[error("connection limit reached ({limit})")]
    TooManyConnections {
        /// Configured limit.
        limit: usize,
    },
    /// The fan-out was closed for shutdown.
    #[error("server is shutting down")]
    Closed,
}

/// Result of one broadcast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Connections the frame was queued for.
    pub delivered: usize,
    /// Connections removed because the push failed.
    pub dropped: usize,
}

/// Owns the live connection set.
///
/// Pushes never block: each connection has a bounded queue, and a
/// connection whose push fails is removed on the spot. Callers that need
/// ordering across broadcasts serialize them externally.
pub struct Fanout {
    connections: DashMap<String, Arc<ClientConnection>>,
    queue_capacity: usize,
    max_connections: usize,
    closed: AtomicBool,
}

impl Fanout {
    /// Create a fan-out with per-connection queue `queue_capacity` and at
    /// most `max_connections` live streams.
    pub fn new(queue_capacity: usize, max_connections: usize) -> Self {
        Self {
            connections: DashMap::new(),
            queue_capacity: queue_capacity.max(1),
            max_connections,
            closed: AtomicBool::new(false),
        }
    }

    /// Register a new connection whose queue starts with `initial`.
    pub fn open(self: &Arc<Self>, initial: Arc<str>) -> Result<Subscription, FanoutError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(FanoutError::Closed);
        }
        if self.connections.len() >= self.max_connections {
            return Err(FanoutError::TooManyConnections {
                limit: self.max_connections,
            });
        }
        let (tx, rx) = mpsc::channel(self.queue_capacity);
        let connection = Arc::new(ClientConnection::new(tx));
        // Cannot fail: the queue is fresh and its receiver is alive.
        let _ = connection.push(initial);
        let id = connection.id.clone();
        let _ = self.connections.insert(id.clone(), connection);
        debug!(conn_id = %id, connections = self.connections.len(), "event stream opened");
        Ok(Subscription::new(id, rx, Arc::clone(self)))
    }

    /// Add an externally built connection.
    pub fn add(&self, connection: Arc<ClientConnection>) {
        let _ = self.connections.insert(connection.id.clone(), connection);
    }

    /// Remove a connection by ID. Returns `true` if it was live.
    pub fn remove(&self, connection_id: &str) -> bool {
        let removed = self.connections.remove(connection_id).is_some();
        if removed {
            debug!(conn_id = connection_id, "event stream removed");
        }
        removed
    }

    /// Queue `frame` on every live connection, dropping the ones that fail.
    pub fn broadcast(&self, frame: &Arc<str>) -> BroadcastReport {
        let mut failed = Vec::new();
        let mut delivered = 0;
        for entry in &self.connections {
            match entry.value().push(Arc::clone(frame)) {
                Ok(()) => delivered += 1,
                Err(reason) => failed.push((entry.key().clone(), reason)),
            }
        }

        for (id, reason) in &failed {
            match reason {
                PushError::Full => warn!(conn_id = %id, "client not draining events, dropping connection"),
                PushError::Closed => debug!(conn_id = %id, "client gone, dropping connection"),
            }
            let _ = self.connections.remove(id);
        }

        let report = BroadcastReport {
            delivered,
            dropped: failed.len(),
        };
        debug!(
            delivered = report.delivered,
            dropped = report.dropped,
            "broadcast snapshot"
        );
        report
    }

    /// Drop every connection and refuse new ones. Open streams end once
    /// their queued frames are drained.
    pub fn close_all(&self) {
        self.closed.store(true, Ordering::Release);
        let count = self.connections.len();
        self.connections.clear();
        debug!(closed = count, "all event streams closed");
    }

    /// Number of live connections.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Whether `connection_id` is live.
    pub fn contains(&self, connection_id: &str) -> bool {
        self.connections.contains_key(connection_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    fn make_connection_with_rx(
        id: &str,
        capacity: usize,
    ) -> (Arc<ClientConnection>, mpsc::Receiver<Arc<str>>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Arc::new(ClientConnection::with_id(id.into(), tx)), rx)
    }

    fn frame(s: &str) -> Arc<str> {
        Arc::from(s)
    }

    #[test]
    fn add_and_remove() {
        let fanout = Fanout::new(8, 10);
        let (conn, _rx) = make_connection_with_rx("c1", 8);
        fanout.add(conn);
        assert_eq!(fanout.connection_count(), 1);
        assert!(fanout.remove("c1"));
        assert!(!fanout.remove("c1"));
        assert_eq!(fanout.connection_count(), 0);
    }

    #[test]
    fn broadcast_reaches_every_connection() {
        let fanout = Fanout::new(8, 10);
        let (c1, mut rx1) = make_connection_with_rx("c1", 8);
        let (c2, mut rx2) = make_connection_with_rx("c2", 8);
        fanout.add(c1);
        fanout.add(c2);

        let report = fanout.broadcast(&frame("snap"));
        assert_eq!(report, BroadcastReport { delivered: 2, dropped: 0 });
        assert_eq!(&*rx1.try_recv().unwrap(), "snap");
        assert_eq!(&*rx2.try_recv().unwrap(), "snap");
    }

    #[test]
    fn failed_connection_is_removed_others_unaffected() {
        let fanout = Fanout::new(8, 10);
        let (c1, rx1) = make_connection_with_rx("gone", 8);
        let (c2, mut rx2) = make_connection_with_rx("alive", 8);
        fanout.add(c1);
        fanout.add(c2);
        drop(rx1);

        let report = fanout.broadcast(&frame("one"));
        assert_eq!(report, BroadcastReport { delivered: 1, dropped: 1 });
        assert!(!fanout.contains("gone"));
        assert!(fanout.contains("alive"));

        let report = fanout.broadcast(&frame("two"));
        assert_eq!(report, BroadcastReport { delivered: 1, dropped: 0 });
        assert_eq!(&*rx2.try_recv().unwrap(), "one");
        assert_eq!(&*rx2.try_recv().unwrap(), "two");
    }

    #[test]
    fn slow_connection_is_removed() {
        let fanout = Fanout::new(8, 10);
        let (slow, mut slow_rx) = make_connection_with_rx("slow", 1);
        fanout.add(slow);

        assert_eq!(fanout.broadcast(&frame("a")).delivered, 1);
        let report = fanout.broadcast(&frame("b"));
        assert_eq!(report.dropped, 1);
        assert_eq!(fanout.connection_count(), 0);

        // Already-queued frames still drain, nothing after the failure arrives.
        assert_eq!(&*slow_rx.try_recv().unwrap(), "a");
        assert!(slow_rx.try_recv().is_err());
    }

    #[test]
    fn broadcast_to_empty_fanout() {
        let fanout = Fanout::new(8, 10);
        assert_eq!(fanout.broadcast(&frame("x")), BroadcastReport::default());
    }

    #[tokio::test]
    async fn open_queues_initial_frame_first() {
        let fanout = Arc::new(Fanout::new(8, 10));
        let mut sub = fanout.open(frame("initial")).unwrap();
        let _ = fanout.broadcast(&frame("next"));
        assert_eq!(&*sub.next().await.unwrap(), "initial");
        assert_eq!(&*sub.next().await.unwrap(), "next");
    }

    #[tokio::test]
    async fn open_respects_connection_limit() {
        let fanout = Arc::new(Fanout::new(8, 1));
        let _first = fanout.open(frame("a")).unwrap();
        let err = fanout.open(frame("b")).unwrap_err();
        assert_eq!(err, FanoutError::TooManyConnections { limit: 1 });
    }

    #[tokio::test]
    async fn dropping_subscription_unregisters() {
        let fanout = Arc::new(Fanout::new(8, 10));
        let sub = fanout.open(frame("a")).unwrap();
        assert_eq!(fanout.connection_count(), 1);
        drop(sub);
        assert_eq!(fanout.connection_count(), 0);
    }

    #[tokio::test]
    async fn close_all_ends_streams_and_refuses_new() {
        let fanout = Arc::new(Fanout::new(8, 10));
        let mut sub = fanout.open(frame("a")).unwrap();
        fanout.close_all();
        assert_eq!(fanout.connection_count(), 0);
        assert_eq!(&*sub.next().await.unwrap(), "a");
        assert!(sub.next().await.is_none());
        assert_eq!(fanout.open(frame("b")).unwrap_err(), FanoutError::Closed);
    }
}
