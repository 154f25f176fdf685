//! Result of proposing a new entry.

use serde::{Deserialize, Serialize};

use crate::domain::shared::GroupId;

/// Whether a proposed entry opened a trade group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum EntryDecision {
    /// A group was created and its entry submitted (or left pending).
    Accepted {
        /// The new group.
        group_id: GroupId,
    },
    /// No group was created, or its entry was refused.
    Rejected {
        /// Stable reason code, e.g. `circuit_breaker_tripped`.
        reason: String,
        /// Human-readable detail.
        message: String,
    },
}

impl EntryDecision {
    /// Shorthand for a rejection.
    #[must_use]
    pub fn rejected(reason: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Rejected {
            reason: reason.into(),
            message: message.into(),
        }
    }

    /// Returns true if a group was created.
    #[must_use]
    pub const fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }

    /// Rejection reason code, if rejected.
    #[must_use]
    pub fn rejection_reason(&self) -> Option<&str> {
        match self {
            Self::Accepted { .. } => None,
            Self::Rejected { reason, .. } => Some(reason),
        }
    }
}
