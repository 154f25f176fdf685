// Allow unwrap/expect in tests - tests should panic on unexpected errors
// Allow test-specific patterns and pedantic lints in test code
#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::match_same_arms,
        clippy::needless_pass_by_value,
        clippy::needless_collect,
        clippy::option_if_let_else,
        clippy::default_trait_access,
        clippy::items_after_statements,
        clippy::or_fun_call
    )
)]

//! Trade Reconciler - Rust Core Library
//!
//! Order lifecycle and exit-leg reconciliation for a single-account trading bot.
//!
//! # Architecture (Clean Architecture + DDD + Hexagonal)
//!
//! ## Layers (inside → outside)
//!
//! - **Domain**: Core business logic
//!   - `trade_group`: Entry plus take-profit/stop-loss legs, state machine, exit resolution
//!   - `risk_management`: Pre-trade risk gate, ATR volatility breaker
//!   - `health`: Heartbeats and health evaluation
//!
//! - **Application**: Use cases and orchestration
//!   - `ports`: `BrokerPort`, `AlertPort`, `Clock`, `SignalSourcePort`
//!   - `use_cases`: `Reconcile`, `ProposeEntry`, `CheckHealth`
//!   - `services`: Polling driver with connectivity backoff
//!
//! - **Infrastructure**: Adapters (implementations)
//!   - `broker`: Alpaca adapter and manual ticket broker
//!   - `persistence`: Trade group and heartbeat stores (in-memory, SQLite)
//!   - `signals`: JSON file inbox for entry signals
//!   - `alerts`: Webhook sink for operator alerts
//!   - `config`: Dependency injection container

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Clean Architecture Layers
// =============================================================================

/// Domain layer - Core business logic with no external dependencies.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Cross-cutting
// =============================================================================

/// YAML configuration with environment interpolation.
pub mod config;

/// Application error type.
pub mod error;

/// Tracing subscriber setup.
pub mod telemetry;

// =============================================================================
// Re-exports
// =============================================================================

// Domain re-exports
pub use domain::health::{HealthReason, HealthStatus, Heartbeat};
pub use domain::risk_management::{RiskDecision, RiskGate, RiskPolicy};
pub use domain::shared::{BrokerId, ClientOrderId, GroupId, Symbol, Timestamp};
pub use domain::trade_group::{GroupState, PositionSide, TradeGroup, TradeGroupStore};

// Application re-exports
pub use application::ports::{BrokerError, BrokerPort, Clock, SystemClock};
pub use application::services::{PollingConfig, PollingDriver};
pub use application::use_cases::{
    CheckHealthUseCase, PartialFillPolicy, ProposeEntryUseCase, ReconcileConfig, ReconcileUseCase,
};

// Infrastructure re-exports
pub use infrastructure::alerts::WebhookAlertSink;
pub use infrastructure::broker::{AlpacaBrokerAdapter, AlpacaConfig, AlpacaEnvironment, ManualBroker};
pub use infrastructure::config::{ConfiguredBroker, Container, ProductionContainer};
pub use infrastructure::persistence::{InMemoryTradeGroupStore, SqliteStore};

pub use config::{Config, ConfigError, load_config};
pub use error::{ErrorCode, ReconcilerError};
