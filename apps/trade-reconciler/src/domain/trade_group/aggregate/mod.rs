//! Trade group aggregate.

mod trade_group;

pub use trade_group::{OpenTradeGroupCommand, ReconstitutedTradeGroupParams, TradeGroup};
