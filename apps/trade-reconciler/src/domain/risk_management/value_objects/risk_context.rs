//! Risk validation context.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::shared::Symbol;
use crate::domain::trade_group::TradeGroup;

/// Exposure of one open trade group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenExposure {
    /// Instrument.
    pub symbol: Symbol,
    /// Entry-to-stop risk.
    pub risk: Decimal,
    /// Notional value.
    pub notional: Decimal,
}

impl From<&TradeGroup> for OpenExposure {
    fn from(group: &TradeGroup) -> Self {
        Self {
            symbol: group.symbol().clone(),
            risk: group.open_risk(),
            notional: group.notional(),
        }
    }
}

/// Account and portfolio state a candidate is judged against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskContext {
    /// Current account equity.
    pub equity: Decimal,
    /// Equity at the previous close, for the drawdown halt.
    pub last_equity: Option<Decimal>,
    /// Every open trade group.
    pub open: Vec<OpenExposure>,
}

impl RiskContext {
    /// Build a context from account equity and the open groups.
    #[must_use]
    pub fn new(equity: Decimal, last_equity: Option<Decimal>, open_groups: &[TradeGroup]) -> Self {
        Self {
            equity,
            last_equity,
            open: open_groups
                .iter()
                .filter(|g| g.is_open())
                .map(OpenExposure::from)
                .collect(),
        }
    }

    /// Fractional loss since the previous close, when known.
    #[must_use]
    pub fn daily_drawdown(&self) -> Option<Decimal> {
        self.last_equity
            .filter(|last| *last > Decimal::ZERO)
            .map(|last| (last - self.equity) / last)
    }

    /// Whether the instrument already has an open group, however the
    /// symbol is spelled.
    #[must_use]
    pub fn has_open_group(&self, symbol: &Symbol) -> bool {
        self.open.iter().any(|e| e.symbol.same_instrument(symbol))
    }

    /// Total entry-to-stop risk across open groups.
    #[must_use]
    pub fn total_open_risk(&self) -> Decimal {
        self.open.iter().map(|e| e.risk).sum()
    }

    /// Total notional across open groups.
    #[must_use]
    pub fn total_notional(&self) -> Decimal {
        self.open.iter().map(|e| e.notional).sum()
    }
}
