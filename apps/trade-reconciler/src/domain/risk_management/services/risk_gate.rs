//! Risk Gate
//!
//! Pure pre-trade evaluation. Checks run in a fixed order and the first
//! failure decides the rejection reason.

use rust_decimal::{Decimal, RoundingStrategy};

use super::volatility::VolatilityReading;
use crate::domain::risk_management::aggregate::RiskPolicy;
use crate::domain::risk_management::value_objects::{
    EntryCandidate, RejectionReason, RiskContext, RiskDecision,
};
use crate::domain::shared::Symbol;
use crate::domain::trade_group::PositionSide;

/// Risk Gate - decides whether a candidate entry may open a trade group.
#[derive(Debug, Clone)]
pub struct RiskGate {
    policy: RiskPolicy,
}

impl RiskGate {
    /// Create a gate enforcing `policy`.
    #[must_use]
    pub const fn new(policy: RiskPolicy) -> Self {
        Self { policy }
    }

    /// The enforced policy.
    #[must_use]
    pub const fn policy(&self) -> &RiskPolicy {
        &self.policy
    }

    /// Evaluate a candidate entry.
    #[must_use]
    pub fn evaluate(
        &self,
        symbol: &Symbol,
        side: PositionSide,
        context: &RiskContext,
        candidate: &EntryCandidate,
    ) -> RiskDecision {
        match self.run_checks(symbol, side, context, candidate) {
            Ok((quantity, risk_amount)) => RiskDecision::Approved {
                quantity,
                risk_amount,
            },
            Err(reason) => RiskDecision::rejected(reason),
        }
    }

    fn run_checks(
        &self,
        symbol: &Symbol,
        side: PositionSide,
        context: &RiskContext,
        candidate: &EntryCandidate,
    ) -> Result<(Decimal, Decimal), RejectionReason> {
        self.check_drawdown(context)?;

        if context.has_open_group(symbol) {
            return Err(RejectionReason::OpenGroupExists {
                symbol: symbol.to_string(),
            });
        }

        check_candidate(side, candidate)?;
        self.check_volatility(candidate)?;

        let quantity = self.size(context.equity, candidate)?;
        let notional = quantity * candidate.entry_price;
        let risk_amount = quantity * candidate.risk_per_unit();

        let position_limit = self.policy.max_position_fraction * context.equity;
        if notional > position_limit {
            return Err(RejectionReason::PositionLimitExceeded {
                notional,
                limit: position_limit,
            });
        }

        let total_risk = context.total_open_risk() + risk_amount;
        let risk_limit = self.policy.max_portfolio_risk_fraction * context.equity;
        if total_risk > risk_limit {
            return Err(RejectionReason::PortfolioRiskExceeded {
                total: total_risk,
                limit: risk_limit,
            });
        }

        let total_notional = context.total_notional() + notional;
        let exposure_limit = self.policy.max_total_exposure_fraction * context.equity;
        if total_notional > exposure_limit {
            return Err(RejectionReason::ExposureLimitExceeded {
                total: total_notional,
                limit: exposure_limit,
            });
        }

        Ok((quantity, risk_amount))
    }

    fn check_drawdown(&self, context: &RiskContext) -> Result<(), RejectionReason> {
        if context.equity <= Decimal::ZERO {
            return Err(RejectionReason::TradingHalted {
                message: format!("account equity is {}", context.equity),
            });
        }
        match context.daily_drawdown() {
            Some(drawdown) if drawdown > self.policy.max_daily_drawdown => {
                Err(RejectionReason::TradingHalted {
                    message: format!(
                        "daily drawdown {} exceeds limit {}",
                        drawdown.round_dp(4),
                        self.policy.max_daily_drawdown
                    ),
                })
            }
            _ => Ok(()),
        }
    }

    fn check_volatility(&self, candidate: &EntryCandidate) -> Result<(), RejectionReason> {
        if !self.policy.circuit_breaker_enabled() {
            return Ok(());
        }
        let Some(reading) = VolatilityReading::measure(&candidate.bars, self.policy.atr_period)
        else {
            return Err(RejectionReason::InsufficientHistory {
                bars: candidate.bars.len(),
                required: self.policy.required_bars(),
            });
        };
        if reading.exceeds(self.policy.volatility_multiplier) {
            return Err(RejectionReason::CircuitBreakerTripped {
                true_range: reading.latest_true_range,
                atr: reading.atr,
            });
        }
        Ok(())
    }

    fn size(&self, equity: Decimal, candidate: &EntryCandidate) -> Result<Decimal, RejectionReason> {
        let per_unit = candidate.risk_per_unit();
        let raw = equity * self.policy.risk_per_trade / per_unit;
        let quantity =
            raw.round_dp_with_strategy(self.policy.quantity_decimals, RoundingStrategy::ToZero);
        if quantity <= Decimal::ZERO {
            return Err(RejectionReason::QuantityTooSmall);
        }
        Ok(quantity.normalize())
    }
}

fn check_candidate(side: PositionSide, candidate: &EntryCandidate) -> Result<(), RejectionReason> {
    let invalid = |message: &str| RejectionReason::InvalidCandidate {
        message: message.to_string(),
    };

    if candidate.entry_price <= Decimal::ZERO
        || candidate.stop_price <= Decimal::ZERO
        || candidate.take_profit_price <= Decimal::ZERO
    {
        return Err(invalid("prices must be positive"));
    }
    if candidate.limit_price.is_some_and(|p| p <= Decimal::ZERO) {
        return Err(invalid("limit price must be positive"));
    }
    if !side.stop_is_protective(candidate.entry_price, candidate.stop_price) {
        return Err(invalid("stop must be on the losing side of the entry"));
    }
    if !side.target_is_profitable(candidate.entry_price, candidate.take_profit_price) {
        return Err(invalid("take profit must be on the winning side of the entry"));
    }
    Ok(())
}
