//! HTTP error type and settings errors.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use huddle_core::ActionError;
use serde::Serialize;
use thiserror::Error;

use crate::fanout::FanoutError;

// ── Error code constants ────────────────────────────────────────────

/// Malformed action payload.
pub const INVALID_PARAMS: &str = "INVALID_PARAMS";
/// Event stream limit reached.
pub const MAX_CONNECTIONS_REACHED: &str = "MAX_CONNECTIONS_REACHED";
/// Server is draining.
pub const SHUTTING_DOWN: &str = "SHUTTING_DOWN";

/// Error returned by the HTTP handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The action payload was rejected; the session is untouched.
    #[error(transparent)]
    InvalidAction(#[from] ActionError),

    /// No room for another event stream.
    #[error("connection limit reached ({limit})")]
    TooManyConnections {
        /// Configured limit.
        limit: usize,
    },

    /// New streams are refused during shutdown.
    #[error("server is shutting down")]
    ShuttingDown,
}

impl From<FanoutError> for ApiError {
    fn from(err: FanoutError) -> Self {
        match err {
            FanoutError::TooManyConnections { limit } => Self::TooManyConnections { limit },
            FanoutError::Closed => Self::ShuttingDown,
        }
    }
}

/// Wire-format error detail.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    /// Machine-readable code.
    pub code: String,
    /// Human-readable message.
    pub message: String,
}

/// Wire-format failure envelope, `{"success": false, "error": {...}}`.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Always `false`.
    pub success: bool,
    /// What went wrong.
    pub error: ErrorBody,
}

impl ApiError {
    /// Machine-readable error code for this variant.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidAction(_) => INVALID_PARAMS,
            Self::TooManyConnections { .. } => MAX_CONNECTIONS_REACHED,
            Self::ShuttingDown => SHUTTING_DOWN,
        }
    }

    /// HTTP status for this variant.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidAction(_) => StatusCode::BAD_REQUEST,
            Self::TooManyConnections { .. } | Self::ShuttingDown => {
                StatusCode::SERVICE_UNAVAILABLE
            }
        }
    }

    /// Convert to the wire-format envelope.
    pub fn to_response_body(&self) -> ErrorResponse {
        ErrorResponse {
            success: false,
            error: ErrorBody {
                code: self.code().to_owned(),
                message: self.to_string(),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.to_response_body())).into_response()
    }
}

/// Errors that can occur when loading settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// Failed to read the settings file from disk.
    #[error("failed to read settings file: {0}")]
    Io(#[from] std::io::Error),
    /// Failed to parse JSON in the settings file.
    #[error("failed to parse settings JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// A settings value was invalid.
    #[error("invalid settings value: {0}")]
    InvalidValue(String),
}

/// Result type for settings operations.
pub type Result<T> = std::result::Result<T, SettingsError>;
