//! Heartbeat Repository Trait

use async_trait::async_trait;

use super::errors::HeartbeatError;
use super::heartbeat::{Heartbeat, NewHeartbeat};

/// Persistence port for heartbeats.
#[async_trait]
pub trait HeartbeatRepository: Send + Sync {
    /// Store a heartbeat and return its id. Ids increase with every call.
    ///
    /// # Errors
    ///
    /// Returns error if persistence fails.
    async fn record_heartbeat(&self, beat: NewHeartbeat) -> Result<i64, HeartbeatError>;

    /// Most recent heartbeats, newest first.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    async fn get_recent_heartbeats(&self, limit: usize) -> Result<Vec<Heartbeat>, HeartbeatError>;
}
