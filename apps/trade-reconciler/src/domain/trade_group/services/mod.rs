//! Trade group domain services.

mod exit_resolution;
mod group_state_machine;

pub use exit_resolution::{ExitOutcome, LegFill, resolve_exit};
pub use group_state_machine::GroupStateMachine;
