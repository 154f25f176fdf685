//! Timestamp value object for temporal data.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A UTC timestamp for trade group bookkeeping and broker fills.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Create a new Timestamp from a DateTime<Utc>.
    #[must_use]
    pub const fn new(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Get the current timestamp.
    #[must_use]
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Parse from an ISO 8601 string.
    ///
    /// # Errors
    ///
    /// Returns error if the string is not a valid ISO 8601 timestamp.
    pub fn parse(s: &str) -> Result<Self, chrono::ParseError> {
        let dt = DateTime::parse_from_rfc3339(s)?;
        Ok(Self(dt.with_timezone(&Utc)))
    }

    /// Get the inner DateTime<Utc>.
    #[must_use]
    pub const fn as_datetime(&self) -> DateTime<Utc> {
        self.0
    }

    /// Fixed-width nanosecond representation used as the storage key.
    ///
    /// Parsing it back yields an equal timestamp, which the optimistic
    /// concurrency check on `updated_at` relies on.
    #[must_use]
    pub fn to_storage_string(&self) -> String {
        self.0.to_rfc3339_opts(SecondsFormat::Nanos, true)
    }

    /// Calculate duration since another timestamp.
    #[must_use]
    pub fn duration_since(&self, other: Self) -> chrono::Duration {
        self.0 - other.0
    }

    /// The smallest timestamp strictly after this one.
    #[must_use]
    pub fn next_tick(&self) -> Self {
        Self(self.0 + chrono::Duration::nanoseconds(1))
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Self::now()
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

impl std::ops::Add<chrono::Duration> for Timestamp {
    type Output = Self;

    fn add(self, rhs: chrono::Duration) -> Self {
        Self(self.0 + rhs)
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }
}

impl From<Timestamp> for DateTime<Utc> {
    fn from(ts: Timestamp) -> Self {
        ts.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_parse() {
        let ts = Timestamp::parse("2026-01-19T12:00:00Z").unwrap();
        assert_eq!(ts.to_string(), "2026-01-19T12:00:00+00:00");
    }

    #[test]
    fn timestamp_parse_invalid() {
        assert!(Timestamp::parse("not-a-date").is_err());
    }

    #[test]
    fn timestamp_ordering() {
        let ts1 = Timestamp::parse("2026-01-19T12:00:00Z").unwrap();
        let ts2 = Timestamp::parse("2026-01-19T13:00:00Z").unwrap();
        assert!(ts1 < ts2);
    }

    #[test]
    fn timestamp_duration_since() {
        let ts1 = Timestamp::parse("2026-01-19T12:00:00Z").unwrap();
        let ts2 = Timestamp::parse("2026-01-19T13:00:00Z").unwrap();
        assert_eq!(ts2.duration_since(ts1).num_hours(), 1);
    }

    #[test]
    fn storage_string_preserves_nanoseconds() {
        let ts = Timestamp::parse("2026-01-19T12:00:00.123456789Z").unwrap();
        let stored = ts.to_storage_string();
        assert_eq!(stored, "2026-01-19T12:00:00.123456789Z");
        assert_eq!(Timestamp::parse(&stored).unwrap(), ts);
    }

    #[test]
    fn next_tick_is_strictly_greater() {
        let ts = Timestamp::parse("2026-01-19T12:00:00Z").unwrap();
        assert!(ts.next_tick() > ts);
        assert_eq!(ts.next_tick().duration_since(ts).num_nanoseconds(), Some(1));
    }
}
