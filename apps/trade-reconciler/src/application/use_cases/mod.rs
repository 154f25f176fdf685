//! Application Use Cases
//!
//! Use cases orchestrate domain logic to fulfill application requirements.

mod check_health;
mod propose_entry;
mod reconcile;

pub use check_health::CheckHealthUseCase;
pub use propose_entry::ProposeEntryUseCase;
pub use reconcile::{PartialFillPolicy, ReconcileConfig, ReconcileUseCase};
