//! Alpaca-specific error types.

use thiserror::Error;

use crate::application::ports::BrokerError;

/// Errors from the Alpaca adapter.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AlpacaError {
    /// HTTP client could not be built or a body could not be read.
    #[error("HTTP error: {0}")]
    Http(String),

    /// API returned an error not covered below.
    #[error("API error: {code} - {message}")]
    Api {
        /// Error code from the API.
        code: String,
        /// Error message from the API.
        message: String,
    },

    /// Order was rejected.
    #[error("Order rejected: {0}")]
    OrderRejected(String),

    /// Client order id already used.
    #[error("Duplicate client order id: {0}")]
    DuplicateClientOrderId(String),

    /// Order can no longer be cancelled.
    #[error("Order not cancelable: {0}")]
    NotCancelable(String),

    /// Buying power too low.
    #[error("Insufficient buying power: {0}")]
    InsufficientFunds(String),

    /// Authentication failed.
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Rate limited.
    #[error("Rate limited, retry after {retry_after_secs}s")]
    RateLimited {
        /// Suggested retry delay in seconds.
        retry_after_secs: u64,
    },

    /// 5xx after all retries.
    #[error("Server error {status}: {message}")]
    Server {
        /// HTTP status.
        status: u16,
        /// Response body.
        message: String,
    },

    /// Network error (retryable).
    #[error("Network error: {0}")]
    Network(String),

    /// JSON parsing error.
    #[error("JSON parsing error: {0}")]
    JsonParse(String),

    /// Max retries exceeded.
    #[error("Max retries exceeded after {attempts} attempts")]
    MaxRetriesExceeded {
        /// Number of attempts made before giving up.
        attempts: u32,
    },

    /// Order not found.
    #[error("Order not found: {order_id}")]
    OrderNotFound {
        /// The order that was not found.
        order_id: String,
    },
}

impl From<AlpacaError> for BrokerError {
    fn from(err: AlpacaError) -> Self {
        match err {
            AlpacaError::Http(msg) | AlpacaError::Network(msg) | AlpacaError::JsonParse(msg) => {
                Self::ConnectionError { message: msg }
            }
            AlpacaError::Api { code, message } => Self::Unknown {
                message: format!("{code}: {message}"),
            },
            AlpacaError::OrderRejected(reason) => Self::OrderRejected { reason },
            AlpacaError::DuplicateClientOrderId(client_order_id) => {
                Self::DuplicateClientOrderId { client_order_id }
            }
            AlpacaError::NotCancelable(order_id) => Self::AlreadyTerminal { order_id },
            AlpacaError::InsufficientFunds(_) => Self::InsufficientFunds,
            AlpacaError::AuthenticationFailed(message) => Self::AuthenticationFailed { message },
            AlpacaError::RateLimited { .. } => Self::RateLimited,
            AlpacaError::Server { status, message } => Self::ServerError {
                message: format!("{status}: {message}"),
            },
            AlpacaError::MaxRetriesExceeded { attempts } => Self::ConnectionError {
                message: format!("Max retries exceeded after {attempts} attempts"),
            },
            AlpacaError::OrderNotFound { order_id } => Self::OrderNotFound { order_id },
        }
    }
}
