//! Health Bounded Context
//!
//! Each broker connectivity check leaves a heartbeat; health is judged from
//! the most recent one.

pub mod errors;
pub mod heartbeat;
pub mod repository;
pub mod services;

pub use errors::HeartbeatError;
pub use heartbeat::{Heartbeat, NewHeartbeat};
pub use repository::HeartbeatRepository;
pub use services::{HealthReason, HealthStatus, evaluate_health};
