//! Error taxonomy for the trade reconciler.
//!
//! Every layer error converts into a [`ReconcilerError`] carrying an
//! [`ErrorCode`]. The code decides how the polling loop treats the failure.
//!
//! | Code | Source | Handling |
//! |------|--------|----------|
//! | `TRANSIENT_BROKER` | timeout, 5xx, rate limit | retried next cycle |
//! | `BROKER_REJECTED` | 4xx order rejection | entry marked FAILED |
//! | `DUPLICATE_GROUP` | store create | entry rejected |
//! | `ARM_FAILED` | exit leg submission | retried, then FAILED + alert |
//! | `CIRCUIT_BREAKER_TRIPPED` | risk gate | entry rejected |
//! | `STORE_CONFLICT` | optimistic update | retried from a fresh read |
//! | `STORAGE` | sqlite / io | logged |
//! | `TRADING_HALTED` | drawdown, no account | entries rejected |
//! | `INVALID_INPUT` | malformed candidate or config | rejected |
//! | `INTERNAL` | invariant breach | logged |

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::application::ports::{AlertError, BrokerError, SignalSourceError};
use crate::config::ConfigError;
use crate::domain::health::HeartbeatError;
use crate::domain::trade_group::TradeGroupError;

/// Error codes for the trade reconciler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Broker unreachable, timed out, rate limited, or failing.
    TransientBroker,
    /// Broker refused the request.
    BrokerRejected,
    /// Trade group already exists for the id or symbol.
    DuplicateGroup,
    /// Exit legs could not be placed.
    ArmFailed,
    /// Volatility circuit breaker blocked an entry.
    CircuitBreakerTripped,
    /// Stored group changed since it was read.
    StoreConflict,
    /// Persistence failure.
    Storage,
    /// New entries halted.
    TradingHalted,
    /// Malformed input.
    InvalidInput,
    /// Invariant breach.
    Internal,
}

/// How loudly an error is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Expected outcome.
    Info,
    /// Recoverable; retried later.
    Warn,
    /// Needs attention.
    Error,
}

impl ErrorCode {
    /// Get the error reason string.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::TransientBroker => "TRANSIENT_BROKER",
            Self::BrokerRejected => "BROKER_REJECTED",
            Self::DuplicateGroup => "DUPLICATE_GROUP",
            Self::ArmFailed => "ARM_FAILED",
            Self::CircuitBreakerTripped => "CIRCUIT_BREAKER_TRIPPED",
            Self::StoreConflict => "STORE_CONFLICT",
            Self::Storage => "STORAGE",
            Self::TradingHalted => "TRADING_HALTED",
            Self::InvalidInput => "INVALID_INPUT",
            Self::Internal => "INTERNAL",
        }
    }

    /// Whether the same operation may succeed on a later cycle.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::TransientBroker | Self::ArmFailed | Self::StoreConflict | Self::Storage
        )
    }

    /// Log severity for this code.
    #[must_use]
    pub const fn severity(&self) -> Severity {
        match self {
            Self::CircuitBreakerTripped => Severity::Info,
            Self::TransientBroker
            | Self::StoreConflict
            | Self::TradingHalted
            | Self::ArmFailed
            | Self::InvalidInput => Severity::Warn,
            Self::BrokerRejected | Self::DuplicateGroup | Self::Storage | Self::Internal => {
                Severity::Error
            }
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.reason())
    }
}

/// A rich error with context for the trade reconciler.
#[derive(Debug, Clone, Error)]
pub struct ReconcilerError {
    code: ErrorCode,
    message: String,
    context: Vec<(String, String)>,
}

impl ReconcilerError {
    /// Create a new error.
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            context: Vec::new(),
        }
    }

    /// Add context to the error.
    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.push((key.into(), value.into()));
        self
    }

    /// Get the error code.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        self.code
    }

    /// Get the message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Get the context.
    #[must_use]
    pub fn context(&self) -> &[(String, String)] {
        &self.context
    }

    /// Emit the error at the level its code calls for.
    pub fn log(&self, what: &str) {
        let context = self
            .context
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(" ");
        match self.code.severity() {
            Severity::Info => {
                tracing::info!(code = %self.code, context = %context, "{what}: {}", self.message);
            }
            Severity::Warn => {
                tracing::warn!(code = %self.code, context = %context, "{what}: {}", self.message);
            }
            Severity::Error => {
                tracing::error!(code = %self.code, context = %context, "{what}: {}", self.message);
            }
        }
    }
}

impl std::fmt::Display for ReconcilerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code.reason(), self.message)
    }
}

/// Convenience constructors for common errors.
impl ReconcilerError {
    /// Exit legs could not be placed.
    #[must_use]
    pub fn arm_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ArmFailed, message)
    }
}

impl From<BrokerError> for ReconcilerError {
    fn from(err: BrokerError) -> Self {
        let code = if err.is_transient() {
            ErrorCode::TransientBroker
        } else {
            ErrorCode::BrokerRejected
        };
        Self::new(code, err.to_string())
    }
}

impl From<TradeGroupError> for ReconcilerError {
    fn from(err: TradeGroupError) -> Self {
        let code = match &err {
            TradeGroupError::DuplicateGroup { .. } => ErrorCode::DuplicateGroup,
            TradeGroupError::StoreConflict { .. } => ErrorCode::StoreConflict,
            TradeGroupError::Storage { .. } => ErrorCode::Storage,
            TradeGroupError::InvalidParameters { .. } => ErrorCode::InvalidInput,
            TradeGroupError::NotFound { .. } | TradeGroupError::InvalidTransition { .. } => {
                ErrorCode::Internal
            }
        };
        Self::new(code, err.to_string())
    }
}

impl From<HeartbeatError> for ReconcilerError {
    fn from(err: HeartbeatError) -> Self {
        Self::new(ErrorCode::Storage, err.to_string())
    }
}

impl From<AlertError> for ReconcilerError {
    fn from(err: AlertError) -> Self {
        Self::new(ErrorCode::Internal, err.to_string())
    }
}

impl From<ConfigError> for ReconcilerError {
    fn from(err: ConfigError) -> Self {
        Self::new(ErrorCode::InvalidInput, err.to_string())
    }
}

impl From<SignalSourceError> for ReconcilerError {
    fn from(err: SignalSourceError) -> Self {
        Self::new(ErrorCode::InvalidInput, err.to_string())
    }
}
