//! The single poll session and its phase machine.

use std::collections::{HashMap, HashSet};

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::action::{Action, Note};
use crate::aggregate::{self, Histogram};
use crate::snapshot::{PendingCounts, Snapshot};

/// Subject shown before the first poll is opened.
pub const UNCONFIGURED_SUBJECT: &str = "(unconfigured)";

/// Where the session is in its round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// No poll opened since start or the last reset.
    #[default]
    Initial,
    /// Collecting submissions.
    Feedback,
    /// Showing the last flushed results.
    Review,
}

impl Phase {
    /// Wire name of the phase.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Initial => "initial",
            Self::Feedback => "feedback",
            Self::Review => "review",
        }
    }
}

/// One participant's feedback for the current round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    /// Free-form text, possibly blank.
    pub text: String,
    /// Optional rating.
    pub note: Option<Note>,
}

/// Outcome of the last flushed round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultSet {
    /// Subject of the round these results belong to.
    pub subject: String,
    /// Display strings, shuffled.
    pub items: Vec<String>,
    /// Rating counts 0..=5, `None` when nobody rated.
    pub histogram: Option<Histogram>,
}

impl Default for ResultSet {
    fn default() -> Self {
        Self {
            subject: UNCONFIGURED_SUBJECT.into(),
            items: Vec::new(),
            histogram: None,
        }
    }
}

/// What applying an action did, beyond mutating the session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Applied {
    /// The round was closed and results recomputed.
    pub flushed: bool,
    /// Clients should clear local input (new poll or full reset).
    pub reset: bool,
}

/// Process-wide poll session.
///
/// All mutation goes through `&mut self`; the server holds it behind one
/// lock so actions, flushes and snapshot reads never interleave.
#[derive(Debug, Clone)]
pub struct SessionState {
    phase: Phase,
    subject: String,
    participants: HashSet<String>,
    pending: HashMap<String, Submission>,
    results: ResultSet,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionState {
    /// A fresh session in [`Phase::Initial`].
    pub fn new() -> Self {
        Self {
            phase: Phase::Initial,
            subject: UNCONFIGURED_SUBJECT.into(),
            participants: HashSet::new(),
            pending: HashMap::new(),
            results: ResultSet::default(),
        }
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Current subject.
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Declared participant keys.
    pub fn participants(&self) -> &HashSet<String> {
        &self.participants
    }

    /// Submissions received this round.
    pub fn pending(&self) -> &HashMap<String, Submission> {
        &self.pending
    }

    /// Last flushed results.
    pub fn results(&self) -> &ResultSet {
        &self.results
    }

    /// Add a participant key. Returns `true` if it was new.
    ///
    /// Keys declared mid-round raise the quorum for that round.
    pub fn declare_key(&mut self, key: impl Into<String>) -> bool {
        self.participants.insert(key.into())
    }

    /// Open a new round on `subject`, dropping anything pending.
    pub fn new_poll(&mut self, subject: impl Into<String>) {
        self.subject = subject.into();
        self.pending.clear();
        self.phase = Phase::Feedback;
    }

    /// Record a submission (last one per key wins) and flush once every
    /// declared participant has submitted. Returns `true` if it flushed.
    ///
    /// Accepted in any phase.
    pub fn post_feedback<R>(&mut self, key: impl Into<String>, submission: Submission, rng: &mut R) -> bool
    where
        R: Rng + ?Sized,
    {
        let _ = self.pending.insert(key.into(), submission);
        if self.quorum_reached() {
            self.flush(rng);
            true
        } else {
            false
        }
    }

    /// Whether every declared participant has a pending submission.
    pub fn quorum_reached(&self) -> bool {
        !self.participants.is_empty() && self.pending.len() == self.participants.len()
    }

    /// Close the round with whatever has been received.
    pub fn force_results<R>(&mut self, rng: &mut R)
    where
        R: Rng + ?Sized,
    {
        self.flush(rng);
    }

    /// Forget participants, pending submissions and results.
    ///
    /// The subject is kept so clients still see the last topic.
    pub fn reset(&mut self) {
        self.participants.clear();
        self.pending.clear();
        self.results = ResultSet::default();
        self.phase = Phase::Initial;
    }

    /// Compute results from pending submissions and move to review.
    pub fn flush<R>(&mut self, rng: &mut R)
    where
        R: Rng + ?Sized,
    {
        let aggregate = aggregate::aggregate(&self.pending, rng);
        debug!(
            submissions = self.pending.len(),
            items = aggregate.items.len(),
            rated = aggregate.histogram.is_some(),
            "flushing poll round"
        );
        self.results = ResultSet {
            subject: self.subject.clone(),
            items: aggregate.items,
            histogram: aggregate.histogram,
        };
        self.pending.clear();
        self.phase = Phase::Review;
    }

    /// Apply one action using the thread RNG for shuffling.
    pub fn apply(&mut self, action: Action) -> Applied {
        self.apply_with(action, &mut rand::rng())
    }

    /// Apply one action with a caller-supplied RNG.
    pub fn apply_with<R>(&mut self, action: Action, rng: &mut R) -> Applied
    where
        R: Rng + ?Sized,
    {
        match action {
            Action::DeclareKey { key } => {
                let _ = self.declare_key(key);
                Applied::default()
            }
            Action::NewPoll { subject } => {
                self.new_poll(subject);
                Applied {
                    flushed: false,
                    reset: true,
                }
            }
            Action::PostFeedback { key, text, note } => Applied {
                flushed: self.post_feedback(key, Submission { text, note }, rng),
                reset: false,
            },
            Action::ForceResults => {
                self.force_results(rng);
                Applied {
                    flushed: true,
                    reset: false,
                }
            }
            Action::Reset => {
                self.reset();
                Applied {
                    flushed: false,
                    reset: true,
                }
            }
            Action::Unknown { .. } => Applied::default(),
        }
    }

    /// Full view of the session for clients.
    pub fn snapshot(&self, reset: bool) -> Snapshot {
        Snapshot {
            phase: self.phase,
            subject: self.subject.clone(),
            pending: PendingCounts {
                received: self.pending.len(),
                expected: self.participants.len(),
            },
            results: self.results.clone(),
            reset,
        }
    }
}
