//! Alpaca Markets Broker Adapter
//!
//! Implementation of `BrokerPort` for the Alpaca Markets trading API with:
//! - Lookups by client order id
//! - Retry logic with exponential backoff
//! - Environment-aware safety checks (PAPER vs LIVE)

mod adapter;
mod api_types;
mod config;
mod error;
mod http_client;

pub use adapter::AlpacaBrokerAdapter;
pub use config::{AlpacaConfig, AlpacaEnvironment, RetryConfig};
pub use error::AlpacaError;
