//! Domain Layer
//!
//! The innermost layer containing business logic with zero infrastructure dependencies.
//! This layer defines:
//!
//! - **Aggregates**: Consistency boundaries with invariants
//! - **Value Objects**: Immutable domain types with equality by value
//! - **Domain Services**: Stateless business logic
//! - **Repository Traits**: Persistence abstractions (implemented in adapters)
//!
//! # Bounded Contexts
//!
//! - [`trade_group`]: Entry plus exit-leg lifecycle of one logical trade
//! - [`risk_management`]: Pre-trade risk gate and volatility circuit breaker
//! - [`health`]: Connectivity heartbeats and health evaluation

pub mod health;
pub mod risk_management;
pub mod shared;
pub mod trade_group;
