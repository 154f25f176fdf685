//! Candidate entry proposed by the signal layer.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::Bar;

/// Price levels and recent bars for a proposed entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryCandidate {
    /// Expected entry price (last trade or limit price).
    pub entry_price: Decimal,
    /// Stop-loss trigger price.
    pub stop_price: Decimal,
    /// Take-profit limit price.
    pub take_profit_price: Decimal,
    /// Limit price for the entry; market order when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit_price: Option<Decimal>,
    /// Recent bars, oldest first, for the circuit breaker.
    #[serde(default)]
    pub bars: Vec<Bar>,
}

impl EntryCandidate {
    /// Distance between entry and stop, the per-unit risk.
    #[must_use]
    pub fn risk_per_unit(&self) -> Decimal {
        (self.entry_price - self.stop_price).abs()
    }
}
