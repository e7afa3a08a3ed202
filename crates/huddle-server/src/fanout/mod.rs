//! Live connection set and best-effort snapshot delivery.

pub mod broadcast;
pub mod connection;
pub mod stream;

pub use broadcast::{BroadcastReport, Fanout, FanoutError};
pub use connection::{ClientConnection, PushError};
pub use stream::Subscription;
