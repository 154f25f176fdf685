//! Heartbeat records.

use serde::{Deserialize, Serialize};

use crate::domain::shared::Timestamp;

/// Outcome of one connectivity check, before it is stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewHeartbeat {
    /// When the check ran.
    pub recorded_at: Timestamp,
    /// Whether the broker answered successfully.
    pub ok: bool,
    /// Round-trip time of the check.
    pub latency_ms: Option<u64>,
    /// HTTP status, when one was received.
    pub status_code: Option<u16>,
    /// Error text for a failed check.
    pub error: Option<String>,
    /// Free-form context.
    pub note: Option<String>,
}

impl NewHeartbeat {
    /// A successful check.
    #[must_use]
    pub const fn ok(recorded_at: Timestamp, latency_ms: u64) -> Self {
        Self {
            recorded_at,
            ok: true,
            latency_ms: Some(latency_ms),
            status_code: Some(200),
            error: None,
            note: None,
        }
    }

    /// A failed check.
    #[must_use]
    pub fn failed(
        recorded_at: Timestamp,
        latency_ms: u64,
        status_code: Option<u16>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            recorded_at,
            ok: false,
            latency_ms: Some(latency_ms),
            status_code,
            error: Some(error.into()),
            note: None,
        }
    }

    /// Attach a note.
    #[must_use]
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// A stored heartbeat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Heartbeat {
    /// Monotonically increasing id.
    pub id: i64,
    /// When the check ran.
    pub recorded_at: Timestamp,
    /// Whether the broker answered successfully.
    pub ok: bool,
    /// Round-trip time of the check.
    pub latency_ms: Option<u64>,
    /// HTTP status, when one was received.
    pub status_code: Option<u16>,
    /// Error text for a failed check.
    pub error: Option<String>,
    /// Free-form context.
    pub note: Option<String>,
}

impl Heartbeat {
    /// Combine a new heartbeat with the id assigned by the store.
    #[must_use]
    pub fn from_new(id: i64, beat: NewHeartbeat) -> Self {
        Self {
            id,
            recorded_at: beat.recorded_at,
            ok: beat.ok,
            latency_ms: beat.latency_ms,
            status_code: beat.status_code,
            error: beat.error,
            note: beat.note,
        }
    }
}
