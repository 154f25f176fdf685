//! OHLC price bar.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::shared::Timestamp;

/// One OHLC bar, as supplied by the external market-data layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bar {
    /// Bar open time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Timestamp>,
    /// Open price.
    pub open: Decimal,
    /// High price.
    pub high: Decimal,
    /// Low price.
    pub low: Decimal,
    /// Close price.
    pub close: Decimal,
}

impl Bar {
    /// Create a bar without a timestamp.
    #[must_use]
    pub const fn new(open: Decimal, high: Decimal, low: Decimal, close: Decimal) -> Self {
        Self {
            timestamp: None,
            open,
            high,
            low,
            close,
        }
    }
}
