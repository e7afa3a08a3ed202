//! # huddle-core
//!
//! Domain model for a single live feedback poll.
//!
//! - **Session**: `SessionState` with its phase machine (`Initial` → `Feedback` → `Review`)
//! - **Actions**: `Action` vocabulary parsed and validated from JSON payloads
//! - **Aggregation**: rating histogram and shuffled result items computed on flush
//! - **Snapshots**: `Snapshot`, the full state view pushed to every client
//!
//! Nothing in this crate performs I/O; callers serialize access to the
//! session themselves.

#![deny(unsafe_code)]

pub mod action;
pub mod aggregate;
pub mod errors;
pub mod session;
pub mod snapshot;

pub use action::{Action, Note};
pub use aggregate::{Aggregate, Histogram};
pub use errors::ActionError;
pub use session::{Applied, Phase, ResultSet, SessionState, Submission};
pub use snapshot::{PendingCounts, Snapshot};
