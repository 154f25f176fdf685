//! Trade group errors.

use std::fmt;

use super::value_objects::GroupState;

/// Errors raised by the trade group aggregate and its store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TradeGroupError {
    /// Group id already exists, or the symbol already has an open group.
    DuplicateGroup {
        /// Group that could not be created.
        group_id: String,
        /// Symbol of the group.
        symbol: String,
        /// What collided.
        reason: String,
    },

    /// Stored row changed since it was read.
    StoreConflict {
        /// Group whose update was refused.
        group_id: String,
    },

    /// Group not found.
    NotFound {
        /// Group id.
        group_id: String,
    },

    /// State change not permitted from the current state.
    InvalidTransition {
        /// Group id.
        group_id: String,
        /// Current state.
        from: GroupState,
        /// Attempted state or operation.
        to: String,
        /// Reason for failure.
        reason: String,
    },

    /// Invalid group parameters.
    InvalidParameters {
        /// Field with invalid value.
        field: String,
        /// Error message.
        message: String,
    },

    /// Storage backend failure.
    Storage {
        /// Error message.
        message: String,
    },
}

impl TradeGroupError {
    /// Shorthand for a storage error.
    pub fn storage(message: impl fmt::Display) -> Self {
        Self::Storage {
            message: message.to_string(),
        }
    }
}

impl fmt::Display for TradeGroupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateGroup {
                group_id,
                symbol,
                reason,
            } => write!(f, "Duplicate trade group {group_id} for {symbol}: {reason}"),
            Self::StoreConflict { group_id } => {
                write!(f, "Trade group {group_id} was modified concurrently")
            }
            Self::NotFound { group_id } => write!(f, "Trade group not found: {group_id}"),
            Self::InvalidTransition {
                group_id,
                from,
                to,
                reason,
            } => write!(
                f,
                "Invalid trade group transition for {group_id}: {from} -> {to}: {reason}"
            ),
            Self::InvalidParameters { field, message } => {
                write!(f, "Invalid trade group parameter '{field}': {message}")
            }
            Self::Storage { message } => write!(f, "Trade group storage error: {message}"),
        }
    }
}

impl std::error::Error for TradeGroupError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_group_display() {
        let err = TradeGroupError::DuplicateGroup {
            group_id: "gid_1".to_string(),
            symbol: "BTC/USD".to_string(),
            reason: "symbol already has an open group".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("gid_1"));
        assert!(msg.contains("BTC/USD"));
    }

    #[test]
    fn invalid_transition_display() {
        let err = TradeGroupError::InvalidTransition {
            group_id: "gid_1".to_string(),
            from: GroupState::ClosedSl,
            to: "ARMED".to_string(),
            reason: "group is terminal".to_string(),
        };
        assert!(err.to_string().contains("CLOSED_SL -> ARMED"));
    }

    #[test]
    fn storage_shorthand() {
        let err = TradeGroupError::storage("disk full");
        assert_eq!(err.to_string(), "Trade group storage error: disk full");
    }
}
