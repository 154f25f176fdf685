//! Alert Port (Driven Port)
//!
//! Operator notifications for conditions that need a human: an unarmed
//! filled position, a partial fill that was abandoned, a manual ticket.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::shared::{GroupId, Symbol};

/// Alert severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertSeverity {
    /// Informational, e.g. a manual ticket to execute.
    Info,
    /// Needs attention soon.
    Warning,
    /// Unmanaged risk; act now.
    Critical,
}

impl fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "INFO"),
            Self::Warning => write!(f, "WARNING"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// An operator alert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    /// Severity.
    pub severity: AlertSeverity,
    /// Group concerned, if any.
    pub group_id: Option<GroupId>,
    /// Instrument concerned, if any.
    pub symbol: Option<Symbol>,
    /// Short summary.
    pub title: String,
    /// Details.
    pub message: String,
}

impl Alert {
    /// Create an alert about a trade group.
    #[must_use]
    pub fn for_group(
        severity: AlertSeverity,
        group_id: &GroupId,
        symbol: &Symbol,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            group_id: Some(group_id.clone()),
            symbol: Some(symbol.clone()),
            title: title.into(),
            message: message.into(),
        }
    }
}

/// Alert delivery error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AlertError {
    /// Delivery failed.
    #[error("Alert delivery failed: {message}")]
    DeliveryFailed {
        /// Error details.
        message: String,
    },
}

/// Port for operator alerts.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AlertPort: Send + Sync {
    /// Deliver an alert.
    async fn send(&self, alert: Alert) -> Result<(), AlertError>;
}

/// Alert sink that writes alerts to the log.
#[derive(Debug, Clone, Default)]
pub struct LogAlertSink;

#[async_trait]
impl AlertPort for LogAlertSink {
    async fn send(&self, alert: Alert) -> Result<(), AlertError> {
        let group_id = alert.group_id.as_ref().map(ToString::to_string);
        let symbol = alert.symbol.as_ref().map(ToString::to_string);
        match alert.severity {
            AlertSeverity::Critical => tracing::error!(
                alert = %alert.title,
                group_id = ?group_id,
                symbol = ?symbol,
                "{}",
                alert.message
            ),
            AlertSeverity::Warning => tracing::warn!(
                alert = %alert.title,
                group_id = ?group_id,
                symbol = ?symbol,
                "{}",
                alert.message
            ),
            AlertSeverity::Info => tracing::info!(
                alert = %alert.title,
                group_id = ?group_id,
                symbol = ?symbol,
                "{}",
                alert.message
            ),
        }
        Ok(())
    }
}
