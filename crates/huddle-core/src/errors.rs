//! Action payload errors.

use thiserror::Error;

/// Why an inbound action payload was rejected.
///
/// Every variant is request-local: the session is left untouched and
/// nothing is broadcast.
#[derive(Debug, Error)]
pub enum ActionError {
    /// The body is not valid JSON.
    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    /// The body is valid JSON but not an object.
    #[error("action payload must be a JSON object")]
    NotAnObject,
    /// The `action` field is present but not a string.
    #[error("field `action` must be a string")]
    ActionNotString,
    /// A known action is missing a required field or carries a bad value.
    #[error("invalid `{action}` payload: {message}")]
    InvalidPayload {
        /// Action name as sent by the client.
        action: String,
        /// What is wrong with the payload.
        message: String,
    },
}

/// Result type for action parsing.
pub type Result<T> = std::result::Result<T, ActionError>;
