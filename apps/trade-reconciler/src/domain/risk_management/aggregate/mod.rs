//! Risk policy aggregate.

mod risk_policy;

pub use risk_policy::RiskPolicy;
