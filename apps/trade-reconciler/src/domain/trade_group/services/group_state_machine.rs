//! Trade Group State Machine
//!
//! The single table of permitted lifecycle transitions.

use crate::domain::trade_group::value_objects::GroupState;

/// Validates trade group state transitions.
pub struct GroupStateMachine;

impl GroupStateMachine {
    /// Check if a state transition is valid.
    #[must_use]
    pub const fn is_valid_transition(from: GroupState, to: GroupState) -> bool {
        matches!(
            (from, to),
            (GroupState::EntryPending, GroupState::Armed)
                | (GroupState::EntryPending, GroupState::Failed)
                | (GroupState::Armed, GroupState::ClosedTp)
                | (GroupState::Armed, GroupState::ClosedSl)
                | (GroupState::Armed, GroupState::ClosedManual)
        )
    }

    /// Get a human-readable reason for an invalid transition.
    #[must_use]
    pub fn transition_error_reason(from: GroupState, to: GroupState) -> String {
        if from.is_terminal() {
            format!("Group is already {from} and cannot move to {to}")
        } else {
            format!("Invalid transition from {from} to {to}")
        }
    }

    /// Get all valid next states from a given state.
    #[must_use]
    pub fn valid_next_states(from: GroupState) -> Vec<GroupState> {
        GroupState::ALL
            .into_iter()
            .filter(|to| Self::is_valid_transition(from, *to))
            .collect()
    }
}
