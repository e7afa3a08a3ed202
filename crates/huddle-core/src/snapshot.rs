//! Client-facing view of the session.

use serde::{Deserialize, Serialize};

use crate::session::{Phase, ResultSet};

/// Submission progress for the current round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingCounts {
    /// Submissions received so far.
    pub received: usize,
    /// Declared participants.
    pub expected: usize,
}

/// Full session state as pushed on the event stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Current phase.
    pub phase: Phase,
    /// Current subject.
    pub subject: String,
    /// Round progress.
    pub pending: PendingCounts,
    /// Last flushed results.
    pub results: ResultSet,
    /// Set on snapshots emitted by `new-poll` and `reset`; omitted otherwise.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub reset: bool,
}

impl Snapshot {
    /// Serialize to the JSON carried in one event frame.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
