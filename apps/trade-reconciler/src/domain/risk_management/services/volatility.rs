//! Volatility circuit breaker.
//!
//! True Range: max(high-low, |high-prev_close|, |low-prev_close|).
//! The latest bar's true range is compared with the simple average of the
//! `period` true ranges before it, so a reading needs `period + 2` bars.

use rust_decimal::Decimal;

use crate::domain::risk_management::value_objects::Bar;

/// True range of `bar` given the previous close.
#[must_use]
pub fn true_range(bar: &Bar, prev_close: Decimal) -> Decimal {
    let high_low = bar.high - bar.low;
    let high_prev = (bar.high - prev_close).abs();
    let low_prev = (bar.low - prev_close).abs();
    high_low.max(high_prev).max(low_prev)
}

/// Simple average of the true ranges of `bars[1..]`.
///
/// Returns `None` with fewer than two bars.
#[must_use]
pub fn average_true_range(bars: &[Bar]) -> Option<Decimal> {
    if bars.len() < 2 {
        return None;
    }
    let sum: Decimal = bars
        .windows(2)
        .map(|pair| true_range(&pair[1], pair[0].close))
        .sum();
    Some(sum / Decimal::from(bars.len() - 1))
}

/// Latest true range against its trailing average.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VolatilityReading {
    /// True range of the newest bar.
    pub latest_true_range: Decimal,
    /// Average true range of the `period` bars before it.
    pub atr: Decimal,
}

impl VolatilityReading {
    /// Measure the newest bar of `bars` (oldest first) against `period` bars of history.
    ///
    /// Returns `None` when fewer than `period + 2` bars are supplied.
    #[must_use]
    pub fn measure(bars: &[Bar], period: usize) -> Option<Self> {
        let n = bars.len();
        if period == 0 || n < period + 2 {
            return None;
        }
        let latest = &bars[n - 1];
        let latest_true_range = true_range(latest, bars[n - 2].close);
        let atr = average_true_range(&bars[n - 2 - period..n - 1])?;
        Some(Self {
            latest_true_range,
            atr,
        })
    }

    /// Whether the latest range exceeds `multiplier` times ATR.
    ///
    /// A reading exactly at the multiple does not trip.
    #[must_use]
    pub fn exceeds(&self, multiplier: Decimal) -> bool {
        self.latest_true_range > multiplier * self.atr
    }
}
