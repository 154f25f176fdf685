//! Check Health Use Case
//!
//! Reads the latest heartbeat and judges whether the polling loop is alive
//! and reaching the broker.

use std::sync::Arc;

use crate::application::ports::Clock;
use crate::domain::health::{HealthStatus, HeartbeatRepository, evaluate_health};

/// Use case behind the `health` command.
pub struct CheckHealthUseCase<H>
where
    H: HeartbeatRepository,
{
    heartbeats: Arc<H>,
    clock: Arc<dyn Clock>,
    max_age: chrono::Duration,
}

impl<H> CheckHealthUseCase<H>
where
    H: HeartbeatRepository,
{
    /// Create a new CheckHealthUseCase.
    pub fn new(heartbeats: Arc<H>, clock: Arc<dyn Clock>, max_age: chrono::Duration) -> Self {
        Self {
            heartbeats,
            clock,
            max_age,
        }
    }

    /// Evaluate health. A repository failure is reported as `db_error`.
    pub async fn execute(&self) -> HealthStatus {
        match self.heartbeats.get_recent_heartbeats(1).await {
            Ok(mut beats) => evaluate_health(beats.pop(), self.clock.now(), self.max_age),
            Err(e) => {
                tracing::error!(error = %e, "Failed to read heartbeats");
                HealthStatus::db_error()
            }
        }
    }
}
