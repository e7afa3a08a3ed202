//! The action vocabulary accepted by `POST /api`.
//!
//! Payloads look like `{"action": "post-feedback", "key": "k1", "text": "…", "note": 4}`.
//! Known actions validate their fields strictly; an unknown or absent action
//! name parses to [`Action::Unknown`], which leaves the session untouched.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::{ActionError, Result};

/// `declare-key` action name.
pub const DECLARE_KEY: &str = "declare-key";
/// `new-poll` action name.
pub const NEW_POLL: &str = "new-poll";
/// `post-feedback` action name.
pub const POST_FEEDBACK: &str = "post-feedback";
/// `force-results` action name.
pub const FORCE_RESULTS: &str = "force-results";
/// `reset` action name.
pub const RESET: &str = "reset";

/// A rating between 0 and [`Note::MAX`] inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct Note(u8);

impl Note {
    /// Highest accepted rating.
    pub const MAX: u8 = 5;

    /// Build a note, or `None` when `value` exceeds [`Note::MAX`].
    pub fn new(value: u8) -> Option<Self> {
        (value <= Self::MAX).then_some(Self(value))
    }

    /// The rating value.
    pub fn value(self) -> u8 {
        self.0
    }
}

impl TryFrom<i64> for Note {
    type Error = String;

    fn try_from(value: i64) -> std::result::Result<Self, Self::Error> {
        u8::try_from(value)
            .ok()
            .and_then(Self::new)
            .ok_or_else(|| format!("note must be between 0 and {}, got {value}", Self::MAX))
    }
}

impl From<Note> for u8 {
    fn from(note: Note) -> Self {
        note.0
    }
}

impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One state-changing request from a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Register a participant key.
    DeclareKey {
        /// Opaque client-chosen key.
        key: String,
    },
    /// Open a new poll round on `subject`.
    NewPoll {
        /// Topic of the round.
        subject: String,
    },
    /// Submit (or overwrite) this participant's feedback.
    PostFeedback {
        /// Submitting participant.
        key: String,
        /// Free-form feedback; may be blank.
        text: String,
        /// Optional rating.
        note: Option<Note>,
    },
    /// Close the round now, whatever has been received.
    ForceResults,
    /// Return to the initial phase and forget everything.
    Reset,
    /// Unrecognized action; applied as a no-op.
    Unknown {
        /// The name as sent, if any.
        name: Option<String>,
    },
}

#[derive(Deserialize)]
struct DeclareKeyPayload {
    key: String,
}

#[derive(Deserialize)]
struct NewPollPayload {
    subject: String,
}

#[derive(Deserialize)]
struct PostFeedbackPayload {
    key: String,
    text: String,
    #[serde(default)]
    note: Option<Note>,
}

impl Action {
    /// Parse a raw request body.
    pub fn from_slice(body: &[u8]) -> Result<Self> {
        let value: Value = serde_json::from_slice(body)?;
        Self::from_value(value)
    }

    /// Parse an already-decoded JSON value.
    pub fn from_value(value: Value) -> Result<Self> {
        let Value::Object(map) = value else {
            return Err(ActionError::NotAnObject);
        };
        let name = match map.get("action") {
            None | Some(Value::Null) => return Ok(Self::Unknown { name: None }),
            Some(Value::String(name)) => name.clone(),
            Some(_) => return Err(ActionError::ActionNotString),
        };

        let action = match name.as_str() {
            DECLARE_KEY => {
                let p: DeclareKeyPayload = payload(&name, map)?;
                Self::DeclareKey { key: p.key }
            }
            NEW_POLL => {
                let p: NewPollPayload = payload(&name, map)?;
                Self::NewPoll { subject: p.subject }
            }
            POST_FEEDBACK => {
                let p: PostFeedbackPayload = payload(&name, map)?;
                Self::PostFeedback {
                    key: p.key,
                    text: p.text,
                    note: p.note,
                }
            }
            FORCE_RESULTS => Self::ForceResults,
            RESET => Self::Reset,
            _ => Self::Unknown { name: Some(name) },
        };
        Ok(action)
    }

    /// Wire name of this action (`"unknown"` for unrecognized ones).
    pub fn name(&self) -> &str {
        match self {
            Self::DeclareKey { .. } => DECLARE_KEY,
            Self::NewPoll { .. } => NEW_POLL,
            Self::PostFeedback { .. } => POST_FEEDBACK,
            Self::ForceResults => FORCE_RESULTS,
            Self::Reset => RESET,
            Self::Unknown { .. } => "unknown",
        }
    }
}

fn payload<T: DeserializeOwned>(action: &str, map: Map<String, Value>) -> Result<T> {
    serde_json::from_value(Value::Object(map)).map_err(|e| ActionError::InvalidPayload {
        action: action.to_owned(),
        message: e.to_string(),
    })
}
