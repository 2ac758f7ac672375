//! Error taxonomy for the sensing engine.
//!
//! Only the session boundary can fail: permission acquisition, configuration
//! loading, and use of a session after teardown. The per-sample arithmetic
//! has no error path.

use thiserror::Error;

use crate::types::ActivityState;

/// Errors surfaced by the sensing engine.
#[derive(Debug, Error)]
pub enum SensingError {
    /// The user refused motion sensor access.
    #[error("motion sensor permission denied")]
    PermissionDenied,

    /// The permission request itself failed.
    #[error("motion sensor permission request failed: {0}")]
    PermissionRequest(String),

    /// A configuration value is out of range or inconsistent.
    #[error("invalid configuration for `{field}`: {reason}")]
    InvalidConfig {
        field: &'static str,
        reason: String,
    },

    /// Configuration text could not be parsed.
    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The session has been stopped or ended in a terminal state.
    #[error("tracking session is closed")]
    SessionClosed,
}

impl SensingError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        SensingError::InvalidConfig {
            field,
            reason: reason.into(),
        }
    }

    /// The terminal activity state a permission failure maps to, if any.
    pub fn terminal_state(&self) -> Option<ActivityState> {
        match self {
            SensingError::PermissionDenied => Some(ActivityState::PermissionDenied),
            SensingError::PermissionRequest(_) => Some(ActivityState::PermissionError),
            _ => None,
        }
    }
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, SensingError>;
