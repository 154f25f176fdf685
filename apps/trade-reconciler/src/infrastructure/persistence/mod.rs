//! Persistence Adapters
//!
//! Implementations of `TradeGroupStore` and `HeartbeatRepository`.

pub mod in_memory;
pub mod sqlite;

pub use in_memory::{InMemoryHeartbeatRepository, InMemoryTradeGroupStore};
pub use sqlite::SqliteStore;
