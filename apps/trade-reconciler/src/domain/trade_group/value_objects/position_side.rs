//! Direction of a trade group's entry.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::OrderSide;
use crate::domain::shared::DomainError;

/// Direction of the position a trade group opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionSide {
    /// Entry buys, exits sell.
    Long,
    /// Entry sells, exits buy.
    Short,
}

impl PositionSide {
    /// Side of the entry order.
    #[must_use]
    pub const fn entry_side(&self) -> OrderSide {
        match self {
            Self::Long => OrderSide::Buy,
            Self::Short => OrderSide::Sell,
        }
    }

    /// Side of both exit legs.
    #[must_use]
    pub const fn exit_side(&self) -> OrderSide {
        self.entry_side().opposite()
    }

    /// Whether `stop` sits on the losing side of `entry`.
    #[must_use]
    pub fn stop_is_protective(&self, entry: Decimal, stop: Decimal) -> bool {
        match self {
            Self::Long => stop < entry,
            Self::Short => stop > entry,
        }
    }

    /// Whether `target` sits on the winning side of `entry`.
    #[must_use]
    pub fn target_is_profitable(&self, entry: Decimal, target: Decimal) -> bool {
        match self {
            Self::Long => target > entry,
            Self::Short => target < entry,
        }
    }

    /// Storage representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Long => "long",
            Self::Short => "short",
        }
    }
}

impl fmt::Display for PositionSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PositionSide {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "long" | "buy" => Ok(Self::Long),
            "short" | "sell" => Ok(Self::Short),
            other => Err(DomainError::InvalidValue {
                field: "side".to_string(),
                message: format!("unknown position side '{other}'"),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn exit_side_is_opposite_of_entry() {
        assert_eq!(PositionSide::Long.entry_side(), OrderSide::Buy);
        assert_eq!(PositionSide::Long.exit_side(), OrderSide::Sell);
        assert_eq!(PositionSide::Short.entry_side(), OrderSide::Sell);
        assert_eq!(PositionSide::Short.exit_side(), OrderSide::Buy);
    }

    #[test]
    fn protective_stop_depends_on_direction() {
        assert!(PositionSide::Long.stop_is_protective(dec!(100), dec!(95)));
        assert!(!PositionSide::Long.stop_is_protective(dec!(100), dec!(105)));
        assert!(PositionSide::Short.stop_is_protective(dec!(100), dec!(105)));
    }

    #[test]
    fn profitable_target_depends_on_direction() {
        assert!(PositionSide::Long.target_is_profitable(dec!(100), dec!(110)));
        assert!(PositionSide::Short.target_is_profitable(dec!(100), dec!(90)));
        assert!(!PositionSide::Short.target_is_profitable(dec!(100), dec!(110)));
    }

    #[test]
    fn parse_accepts_order_side_aliases() {
        assert_eq!("buy".parse::<PositionSide>().unwrap(), PositionSide::Long);
        assert_eq!("SHORT".parse::<PositionSide>().unwrap(), PositionSide::Short);
        assert!("flat".parse::<PositionSide>().is_err());
    }
}
