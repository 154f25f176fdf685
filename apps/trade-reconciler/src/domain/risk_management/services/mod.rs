//! Risk management domain services.

mod risk_gate;
mod volatility;

pub use risk_gate::RiskGate;
pub use volatility::{VolatilityReading, average_true_range, true_range};
