//! Risk Policy Aggregate

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::domain::risk_management::errors::RiskError;

/// Limits applied to every new entry.
///
/// Fractions are of account equity, e.g. `0.01` is one percent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskPolicy {
    /// Equity risked between entry and stop on one trade.
    pub risk_per_trade: Decimal,
    /// Maximum notional of one position.
    pub max_position_fraction: Decimal,
    /// Maximum notional across all open groups.
    pub max_total_exposure_fraction: Decimal,
    /// Maximum entry-to-stop risk across all open groups.
    pub max_portfolio_risk_fraction: Decimal,
    /// Circuit breaker trips above this multiple of ATR. Zero disables it.
    pub volatility_multiplier: Decimal,
    /// Bars in the trailing true range average.
    pub atr_period: usize,
    /// Daily loss from the previous close that halts new entries.
    pub max_daily_drawdown: Decimal,
    /// Decimal places the computed quantity is truncated to.
    pub quantity_decimals: u32,
}

impl Default for RiskPolicy {
    fn default() -> Self {
        Self {
            risk_per_trade: dec!(0.01),
            max_position_fraction: dec!(0.25),
            max_total_exposure_fraction: dec!(0.50),
            max_portfolio_risk_fraction: dec!(0.05),
            volatility_multiplier: dec!(3.0),
            atr_period: 14,
            max_daily_drawdown: dec!(0.05),
            quantity_decimals: 6,
        }
    }
}

impl RiskPolicy {
    /// Bars needed for a circuit breaker reading.
    #[must_use]
    pub const fn required_bars(&self) -> usize {
        self.atr_period + 2
    }

    /// Whether the volatility circuit breaker is active.
    #[must_use]
    pub fn circuit_breaker_enabled(&self) -> bool {
        self.volatility_multiplier > Decimal::ZERO
    }

    /// Validate the policy.
    ///
    /// # Errors
    ///
    /// Returns error if a fraction lies outside `(0, 1]`, the multiplier is
    /// negative, or the ATR period is zero.
    pub fn validate(&self) -> Result<(), RiskError> {
        for (field, value) in [
            ("risk_per_trade", self.risk_per_trade),
            ("max_position_fraction", self.max_position_fraction),
            ("max_total_exposure_fraction", self.max_total_exposure_fraction),
            ("max_portfolio_risk_fraction", self.max_portfolio_risk_fraction),
            ("max_daily_drawdown", self.max_daily_drawdown),
        ] {
            if value <= Decimal::ZERO || value > Decimal::ONE {
                return Err(RiskError::InvalidConfiguration {
                    field: field.to_string(),
                    message: format!("must be in (0, 1], got {value}"),
                });
            }
        }

        if self.volatility_multiplier < Decimal::ZERO {
            return Err(RiskError::InvalidConfiguration {
                field: "volatility_multiplier".to_string(),
                message: "must not be negative".to_string(),
            });
        }

        if self.atr_period == 0 {
            return Err(RiskError::InvalidConfiguration {
                field: "atr_period".to_string(),
                message: "must be at least 1".to_string(),
            });
        }

        Ok(())
    }
}
