//! Signal Source Port (Driven Port)
//!
//! Entry signals come from an external layer; this crate only consumes them.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::risk_management::EntryCandidate;
use crate::domain::shared::Symbol;
use crate::domain::trade_group::PositionSide;

/// A request to open a trade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntrySignal {
    /// Instrument.
    pub symbol: Symbol,
    /// Direction.
    pub side: PositionSide,
    /// Price levels and recent bars.
    #[serde(flatten)]
    pub candidate: EntryCandidate,
}

/// A signal taken from the source, awaiting a decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedSignal {
    /// Source-specific handle used to settle the signal.
    pub receipt: String,
    /// The signal itself.
    pub signal: EntrySignal,
}

/// What became of a received signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalDisposition {
    /// Accepted or rejected; the signal is done.
    Decided,
    /// No decision could be reached; kept aside for the operator.
    Failed,
}

/// Signal source error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SignalSourceError {
    /// Source could not be read.
    #[error("Signal source unavailable: {message}")]
    Unavailable {
        /// Error details.
        message: String,
    },
}

/// Port for pending entry signals.
///
/// A drained signal stays pending until it is settled, so a crash between
/// the two never loses it.
#[async_trait]
pub trait SignalSourcePort: Send + Sync {
    /// Every pending signal, oldest first.
    async fn drain(&self) -> Result<Vec<ReceivedSignal>, SignalSourceError>;

    /// Record the outcome of a drained signal.
    async fn settle(
        &self,
        receipt: &str,
        disposition: SignalDisposition,
    ) -> Result<(), SignalSourceError>;
}

/// Signal source that never has signals.
#[derive(Debug, Clone, Default)]
pub struct NoOpSignalSource;

#[async_trait]
impl SignalSourcePort for NoOpSignalSource {
    async fn drain(&self) -> Result<Vec<ReceivedSignal>, SignalSourceError> {
        Ok(Vec::new())
    }

    async fn settle(
        &self,
        _receipt: &str,
        _disposition: SignalDisposition,
    ) -> Result<(), SignalSourceError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn no_op_source_is_empty() {
        assert!(NoOpSignalSource.drain().await.unwrap().is_empty());
    }

    #[test]
    fn signal_parses_flattened_candidate() {
        let json = r#"{
            "symbol": "btc/usd",
            "side": "long",
            "entry_price": "50000",
            "stop_price": "49500",
            "take_profit_price": "51000"
        }"#;
        let signal: EntrySignal = serde_json::from_str(json).unwrap();
        assert_eq!(signal.symbol.as_str(), "BTC/USD");
        assert_eq!(signal.side, PositionSide::Long);
        assert!(signal.candidate.bars.is_empty());
    }
}
