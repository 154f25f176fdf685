//! Trade group lifecycle state.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::shared::DomainError;

/// Lifecycle state of a trade group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GroupState {
    /// Entry submitted, fill not yet confirmed.
    EntryPending,
    /// Entry filled, both exit legs live.
    Armed,
    /// Take-profit leg filled.
    ClosedTp,
    /// Stop-loss leg filled.
    ClosedSl,
    /// Position went flat without either leg filling.
    ClosedManual,
    /// Entry never became a protected position.
    Failed,
}

impl GroupState {
    /// All states, in lifecycle order.
    pub const ALL: [Self; 6] = [
        Self::EntryPending,
        Self::Armed,
        Self::ClosedTp,
        Self::ClosedSl,
        Self::ClosedManual,
        Self::Failed,
    ];

    /// Returns true while the group still needs reconciliation.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        matches!(self, Self::EntryPending | Self::Armed)
    }

    /// Returns true once the group is immutable.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !self.is_open()
    }

    /// Storage representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::EntryPending => "ENTRY_PENDING",
            Self::Armed => "ARMED",
            Self::ClosedTp => "CLOSED_TP",
            Self::ClosedSl => "CLOSED_SL",
            Self::ClosedManual => "CLOSED_MANUAL",
            Self::Failed => "FAILED",
        }
    }
}

impl fmt::Display for GroupState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GroupState {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| DomainError::InvalidValue {
                field: "state".to_string(),
                message: format!("unknown trade group state '{s}'"),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_states() {
        assert!(GroupState::EntryPending.is_open());
        assert!(GroupState::Armed.is_open());
        assert!(GroupState::ClosedTp.is_terminal());
        assert!(GroupState::ClosedSl.is_terminal());
        assert!(GroupState::ClosedManual.is_terminal());
        assert!(GroupState::Failed.is_terminal());
    }

    #[test]
    fn parse_matches_display() {
        for state in GroupState::ALL {
            assert_eq!(state.to_string().parse::<GroupState>().unwrap(), state);
        }
    }

    #[test]
    fn parse_unknown_state_fails() {
        assert!("OPEN".parse::<GroupState>().is_err());
    }

    #[test]
    fn serde_uses_storage_names() {
        let json = serde_json::to_string(&GroupState::ClosedManual).unwrap();
        assert_eq!(json, "\"CLOSED_MANUAL\"");
    }
}
