//! Risk management errors.

use std::fmt;

/// Errors that can occur configuring risk checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RiskError {
    /// Invalid risk configuration.
    InvalidConfiguration {
        /// Configuration field.
        field: String,
        /// Error message.
        message: String,
    },
}

impl fmt::Display for RiskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidConfiguration { field, message } => {
                write!(f, "Invalid risk configuration for '{field}': {message}")
            }
        }
    }
}

impl std::error::Error for RiskError {}
