//! Outcome of the risk gate.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a candidate entry was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum RejectionReason {
    /// Daily drawdown limit exceeded, or account state unknown.
    TradingHalted {
        /// Human-readable cause.
        message: String,
    },
    /// The symbol already has an open trade group.
    OpenGroupExists {
        /// Instrument.
        symbol: String,
    },
    /// Candidate prices are inconsistent.
    InvalidCandidate {
        /// What is wrong.
        message: String,
    },
    /// Latest true range is abnormally large.
    CircuitBreakerTripped {
        /// Latest true range.
        true_range: Decimal,
        /// Trailing average true range.
        atr: Decimal,
    },
    /// Too few bars to measure volatility.
    InsufficientHistory {
        /// Bars supplied.
        bars: usize,
        /// Bars required.
        required: usize,
    },
    /// Sized quantity truncates to zero.
    QuantityTooSmall,
    /// Position notional over the per-position cap.
    PositionLimitExceeded {
        /// Candidate notional.
        notional: Decimal,
        /// Cap.
        limit: Decimal,
    },
    /// Open risk over the portfolio cap.
    PortfolioRiskExceeded {
        /// Open risk including the candidate.
        total: Decimal,
        /// Cap.
        limit: Decimal,
    },
    /// Notional over the total exposure cap.
    ExposureLimitExceeded {
        /// Open notional including the candidate.
        total: Decimal,
        /// Cap.
        limit: Decimal,
    },
}

impl RejectionReason {
    /// Stable machine-readable code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::TradingHalted { .. } => "trading_halted",
            Self::OpenGroupExists { .. } => "open_group_exists",
            Self::InvalidCandidate { .. } => "invalid_candidate",
            Self::CircuitBreakerTripped { .. } => "circuit_breaker_tripped",
            Self::InsufficientHistory { .. } => "insufficient_history",
            Self::QuantityTooSmall => "quantity_too_small",
            Self::PositionLimitExceeded { .. } => "position_limit_exceeded",
            Self::PortfolioRiskExceeded { .. } => "portfolio_risk_exceeded",
            Self::ExposureLimitExceeded { .. } => "exposure_limit_exceeded",
        }
    }
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TradingHalted { message } => write!(f, "Trading halted: {message}"),
            Self::OpenGroupExists { symbol } => {
                write!(f, "{symbol} already has an open trade group")
            }
            Self::InvalidCandidate { message } => write!(f, "Invalid candidate: {message}"),
            Self::CircuitBreakerTripped { true_range, atr } => write!(
                f,
                "Circuit breaker tripped: true range {true_range} against ATR {atr}"
            ),
            Self::InsufficientHistory { bars, required } => write!(
                f,
                "Insufficient history for volatility check: {bars} bars, {required} required"
            ),
            Self::QuantityTooSmall => write!(f, "Sized quantity rounds to zero"),
            Self::PositionLimitExceeded { notional, limit } => {
                write!(f, "Position notional {notional} exceeds limit {limit}")
            }
            Self::PortfolioRiskExceeded { total, limit } => {
                write!(f, "Portfolio open risk {total} exceeds limit {limit}")
            }
            Self::ExposureLimitExceeded { total, limit } => {
                write!(f, "Total exposure {total} exceeds limit {limit}")
            }
        }
    }
}

/// Result of evaluating a candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum RiskDecision {
    /// Entry may proceed with this size.
    Approved {
        /// Sized quantity.
        quantity: Decimal,
        /// Amount lost if the stop is hit.
        risk_amount: Decimal,
    },
    /// Entry must not proceed.
    Rejected {
        /// Why.
        reason: RejectionReason,
    },
}

impl RiskDecision {
    /// Returns true if approved.
    #[must_use]
    pub const fn is_approved(&self) -> bool {
        matches!(self, Self::Approved { .. })
    }

    /// Shorthand for a rejection.
    #[must_use]
    pub const fn rejected(reason: RejectionReason) -> Self {
        Self::Rejected { reason }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn rejection_codes_are_stable() {
        let reason = RejectionReason::CircuitBreakerTripped {
            true_range: dec!(310),
            atr: dec!(100),
        };
        assert_eq!(reason.code(), "circuit_breaker_tripped");
        assert!(reason.to_string().contains("310"));
    }

    #[test]
    fn decision_serializes_with_tags() {
        let decision = RiskDecision::rejected(RejectionReason::QuantityTooSmall);
        let json = serde_json::to_value(&decision).unwrap();
        assert_eq!(json["decision"], "rejected");
        assert_eq!(json["reason"]["code"], "quantity_too_small");
    }
}
