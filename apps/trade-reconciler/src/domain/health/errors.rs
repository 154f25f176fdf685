//! Heartbeat store errors.

use std::fmt;

/// Errors raised by heartbeat persistence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeartbeatError {
    /// Storage backend failure.
    Storage {
        /// Error message.
        message: String,
    },
}

impl HeartbeatError {
    /// Shorthand for a storage error.
    pub fn storage(message: impl fmt::Display) -> Self {
        Self::Storage {
            message: message.to_string(),
        }
    }
}

impl fmt::Display for HeartbeatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Storage { message } => write!(f, "Heartbeat storage error: {message}"),
        }
    }
}

impl std::error::Error for HeartbeatError {}
