//! `PollHub`: the one place where the session is mutated and broadcast.

use std::sync::Arc;

use huddle_core::{Action, Applied, Phase, SessionState, Snapshot};
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument};

use crate::fanout::{BroadcastReport, Fanout, FanoutError, Subscription};

/// Outcome of one dispatched action.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Dispatched {
    /// What the action did to the session.
    pub applied: Applied,
    /// How the resulting snapshot was delivered.
    pub broadcast: BroadcastReport,
}

/// Session state plus its subscribers.
///
/// The session mutex is held across "apply action → snapshot → queue on
/// every connection", and across "snapshot → register" for subscribers, so
/// every live connection sees snapshots in emission order and a new
/// subscriber's first frame precedes any later broadcast. Queueing never
/// blocks; socket writes happen in each connection's response stream.
pub struct PollHub {
    session: Mutex<SessionState>,
    fanout: Arc<Fanout>,
}

impl PollHub {
    /// Create a hub with a fresh session.
    pub fn new(fanout: Arc<Fanout>) -> Self {
        Self::with_session(SessionState::new(), fanout)
    }

    /// Create a hub around an existing session.
    pub fn with_session(session: SessionState, fanout: Arc<Fanout>) -> Self {
        Self {
            session: Mutex::new(session),
            fanout,
        }
    }

    /// Open an event stream whose first frame is the current snapshot.
    pub async fn subscribe(&self) -> Result<Subscription, FanoutError> {
        let session = self.session.lock().await;
        let frame = encode(&session.snapshot(false)).unwrap_or_else(|| Arc::from("{}"));
        let subscription = self.fanout.open(frame)?;
        info!(
            conn_id = subscription.id(),
            connections = self.fanout.connection_count(),
            "client subscribed"
        );
        Ok(subscription)
    }

    /// Apply `action` and broadcast the resulting snapshot.
    ///
    /// Unknown actions leave the session unchanged but still rebroadcast.
    #[instrument(skip_all, fields(action = action.name()))]
    pub async fn dispatch(&self, action: Action) -> Dispatched {
        let mut session = self.session.lock().await;
        let applied = session.apply(action);
        let snapshot = session.snapshot(applied.reset);
        debug!(
            phase = snapshot.phase.as_str(),
            received = snapshot.pending.received,
            expected = snapshot.pending.expected,
            flushed = applied.flushed,
            "action applied"
        );
        if applied.flushed {
            info!(
                subject = %snapshot.results.subject,
                items = snapshot.results.items.len(),
                "poll round closed"
            );
        }
        let broadcast = match encode(&snapshot) {
            Some(frame) => self.fanout.broadcast(&frame),
            None => BroadcastReport::default(),
        };
        drop(session);
        Dispatched { applied, broadcast }
    }

    /// Current snapshot, without the reset marker.
    pub async fn snapshot(&self) -> Snapshot {
        self.session.lock().await.snapshot(false)
    }

    /// Current phase.
    pub async fn phase(&self) -> Phase {
        self.session.lock().await.phase()
    }

    /// The connection set.
    pub fn fanout(&self) -> &Arc<Fanout> {
        &self.fanout
    }

    /// Close every stream and refuse new subscribers.
    pub async fn close(&self) {
        // Taken so no broadcast is half-queued when streams are dropped.
        let _session = self.session.lock().await;
        self.fanout.close_all();
    }
}

fn encode(snapshot: &Snapshot) -> Option<Arc<str>> {
    match snapshot.to_json() {
        Ok(json) => Some(Arc::from(json)),
        Err(e) => {
            error!(error = %e, "failed to serialize snapshot");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use serde_json::Value;

    fn make_hub() -> PollHub {
        PollHub::new(Arc::new(Fanout::new(16, 16)))
    }

    async fn next_json(sub: &mut Subscription) -> Value {
        let frame = sub.next().await.unwrap();
        serde_json::from_str(&frame).unwrap()
    }

    #[tokio::test]
    async fn subscriber_gets_current_snapshot_first() {
        let hub = make_hub();
        let _ = hub
            .dispatch(Action::NewPoll {
                subject: "Lunch".into(),
            })
            .await;

        let mut sub = hub.subscribe().await.unwrap();
        let _ = hub.dispatch(Action::DeclareKey { key: "k1".into() }).await;

        let first = next_json(&mut sub).await;
        assert_eq!(first["phase"], "feedback");
        assert_eq!(first["subject"], "Lunch");
        assert_eq!(first["pending"]["expected"], 0);
        assert!(first.get("reset").is_none());

        let second = next_json(&mut sub).await;
        assert_eq!(second["pending"]["expected"], 1);
    }

    #[tokio::test]
    async fn dispatch_broadcasts_to_all_subscribers() {
        let hub = make_hub();
        let mut a = hub.subscribe().await.unwrap();
        let mut b = hub.subscribe().await.unwrap();
        let _ = next_json(&mut a).await;
        let _ = next_json(&mut b).await;

        let out = hub
            .dispatch(Action::NewPoll {
                subject: "q".into(),
            })
            .await;
        assert!(out.applied.reset);
        assert_eq!(out.broadcast.delivered, 2);

        for sub in [&mut a, &mut b] {
            let snap = next_json(sub).await;
            assert_eq!(snap["phase"], "feedback");
            assert_eq!(snap["reset"], true);
        }
    }

    #[tokio::test]
    async fn unknown_action_still_rebroadcasts() {
        let hub = make_hub();
        let mut sub = hub.subscribe().await.unwrap();
        let initial = next_json(&mut sub).await;

        let out = hub.dispatch(Action::Unknown { name: None }).await;
        assert_eq!(out.applied, Applied::default());
        assert_eq!(out.broadcast.delivered, 1);
        assert_eq!(next_json(&mut sub).await, initial);
    }

    #[tokio::test]
    async fn quorum_flush_is_broadcast() {
        let hub = make_hub();
        let _ = hub.dispatch(Action::DeclareKey { key: "a".into() }).await;
        let _ = hub
            .dispatch(Action::NewPoll {
                subject: "q".into(),
            })
            .await;
        let out = hub
            .dispatch(Action::PostFeedback {
                key: "a".into(),
                text: "nice".into(),
                note: huddle_core::Note::new(5),
            })
            .await;
        assert!(out.applied.flushed);

        let snap = hub.snapshot().await;
        assert_eq!(snap.phase, Phase::Review);
        assert_eq!(snap.results.items, vec!["nice [5/5]".to_string()]);
        assert_eq!(snap.results.histogram, Some([0, 0, 0, 0, 0, 1]));
    }

    #[tokio::test]
    async fn dropped_subscriber_does_not_affect_others() {
        let hub = make_hub();
        let gone = hub.subscribe().await.unwrap();
        let mut alive = hub.subscribe().await.unwrap();
        drop(gone);
        assert_eq!(hub.fanout().connection_count(), 1);

        let out = hub.dispatch(Action::ForceResults).await;
        assert_eq!(out.broadcast.delivered, 1);
        let _ = next_json(&mut alive).await;
        assert_eq!(next_json(&mut alive).await["phase"], "review");
    }

    #[tokio::test]
    async fn close_ends_streams() {
        let hub = make_hub();
        let mut sub = hub.subscribe().await.unwrap();
        hub.close().await;
        let _ = next_json(&mut sub).await;
        assert!(sub.next().await.is_none());
        assert!(matches!(hub.subscribe().await, Err(FanoutError::Closed)));
    }

    #[tokio::test]
    async fn phase_accessor() {
        let hub = make_hub();
        assert_eq!(hub.phase().await, Phase::Initial);
        let _ = hub.dispatch(Action::ForceResults).await;
        assert_eq!(hub.phase().await, Phase::Review);
    }
}
