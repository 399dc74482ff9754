//! AI backend errors

use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a backend call produced no usable patch text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackendError {
    /// The backend ran but reported failure
    Failed {
        message: String,
        exit_code: Option<i32>,
    },

    Timeout { seconds: u64 },

    /// The backend answered with nothing but whitespace
    EmptyResponse,

    /// No backend configured, or the configured one cannot be started
    NotConfigured { message: String },

    /// Transport failure while talking to the backend
    Io { message: String },
}

impl BackendError {
    /// Whether trying the same request again could plausibly succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, BackendError::Timeout { .. } | BackendError::Io { .. })
    }
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendError::Failed {
                message,
                exit_code: Some(code),
            } => write!(f, "AI backend exited with status {}: {}", code, message),
            BackendError::Failed { message, .. } => write!(f, "AI backend failed: {}", message),
            BackendError::Timeout { seconds } => {
                write!(f, "AI backend did not answer within {}s", seconds)
            }
            BackendError::EmptyResponse => f.write_str("AI backend returned an empty response"),
            BackendError::NotConfigured { message } => {
                write!(f, "AI backend not available: {}", message)
            }
            BackendError::Io { message } => write!(f, "AI backend I/O error: {}", message),
        }
    }
}

impl std::error::Error for BackendError {}
