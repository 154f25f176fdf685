//! Infrastructure Layer
//!
//! This module contains all adapters (implementations) for the ports defined
//! in the application layer. Following hexagonal architecture:
//!
//! - **Driven Adapters (Outbound)**: Implement ports for external systems
//!   - `broker/`: Broker adapters (Alpaca, manual tickets)
//!   - `persistence/`: Trade group and heartbeat stores (in-memory, SQLite)
//!   - `signals`: Entry signal inbox
//!   - `alerts`: Operator alert webhook
//!
//! - **Wiring**
//!   - `config/`: Dependency injection container

pub mod alerts;
pub mod broker;
pub mod config;
pub mod persistence;
pub mod signals;
