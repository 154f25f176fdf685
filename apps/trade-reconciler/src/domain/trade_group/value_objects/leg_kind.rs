//! Which order of a trade group.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the three orders a trade group owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LegKind {
    /// Parent entry order.
    Entry,
    /// Take-profit limit order.
    TakeProfit,
    /// Stop-loss stop order.
    StopLoss,
}

impl LegKind {
    /// Suffix appended to the group's client order ids.
    #[must_use]
    pub const fn suffix(&self) -> &'static str {
        match self {
            Self::Entry => "entry",
            Self::TakeProfit => "tp",
            Self::StopLoss => "sl",
        }
    }

    /// The other exit leg; the entry has no sibling.
    #[must_use]
    pub const fn sibling(&self) -> Option<Self> {
        match self {
            Self::Entry => None,
            Self::TakeProfit => Some(Self::StopLoss),
            Self::StopLoss => Some(Self::TakeProfit),
        }
    }
}

impl fmt::Display for LegKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}
