//! Broker Adapters
//!
//! Implementations of `BrokerPort`: the Alpaca trading API and a manual
//! ticket broker for venues without an API.

pub mod alpaca;
pub mod manual;

pub use alpaca::{AlpacaBrokerAdapter, AlpacaConfig, AlpacaEnvironment, AlpacaError};
pub use manual::{ManualBroker, ManualTicket};
