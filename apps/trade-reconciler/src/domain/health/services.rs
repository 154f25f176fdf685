//! Health evaluation.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::heartbeat::Heartbeat;
use crate::domain::shared::Timestamp;

/// Why the service is (un)healthy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthReason {
    /// Latest heartbeat is recent and successful.
    Ok,
    /// Nothing has been recorded yet.
    NoHeartbeats,
    /// Latest connectivity check failed.
    NotOk,
    /// Latest heartbeat is older than the allowed age.
    Stale,
    /// Heartbeats could not be read.
    DbError,
}

impl HealthReason {
    /// Stable string form.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::NoHeartbeats => "no_heartbeats",
            Self::NotOk => "not_ok",
            Self::Stale => "stale",
            Self::DbError => "db_error",
        }
    }
}

impl fmt::Display for HealthReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Health verdict with the heartbeat it was based on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    /// Overall verdict.
    pub healthy: bool,
    /// Reason for the verdict.
    pub reason: HealthReason,
    /// Heartbeat the verdict was based on.
    pub latest: Option<Heartbeat>,
}

impl HealthStatus {
    /// Unhealthy because heartbeats could not be read.
    #[must_use]
    pub const fn db_error() -> Self {
        Self {
            healthy: false,
            reason: HealthReason::DbError,
            latest: None,
        }
    }
}

/// Judge health from the latest heartbeat.
#[must_use]
pub fn evaluate_health(
    latest: Option<Heartbeat>,
    now: Timestamp,
    max_age: chrono::Duration,
) -> HealthStatus {
    let reason = match &latest {
        None => HealthReason::NoHeartbeats,
        Some(beat) if !beat.ok => HealthReason::NotOk,
        Some(beat) if now.duration_since(beat.recorded_at) > max_age => HealthReason::Stale,
        Some(_) => HealthReason::Ok,
    };
    HealthStatus {
        healthy: reason == HealthReason::Ok,
        reason,
        latest,
    }
}
