//! Risk management value objects.

mod bar;
mod entry_candidate;
mod risk_context;
mod risk_decision;

pub use bar::Bar;
pub use entry_candidate::EntryCandidate;
pub use risk_context::{OpenExposure, RiskContext};
pub use risk_decision::{RejectionReason, RiskDecision};
