//! Risk Management Bounded Context
//!
//! Pre-trade checks that decide whether a new entry may open a trade group.
//!
//! # Key Concepts
//!
//! - **Risk Policy**: configured limits (risk per trade, exposure caps, drawdown halt)
//! - **Circuit Breaker**: latest true range against its trailing average
//! - **Risk Gate**: pure evaluation of a candidate against the policy and open groups

pub mod aggregate;
pub mod errors;
pub mod services;
pub mod value_objects;

pub use aggregate::RiskPolicy;
pub use errors::RiskError;
pub use services::{RiskGate, VolatilityReading, average_true_range, true_range};
pub use value_objects::{
    Bar, EntryCandidate, OpenExposure, RejectionReason, RiskContext, RiskDecision,
};
