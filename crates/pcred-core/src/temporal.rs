//! # Temporal Types: UTC-Only Timestamps and Injected Clocks
//!
//! Defines `Timestamp`, a UTC-only timestamp truncated to seconds, and the
//! [`Clock`] trait through which every "now" decision in the workspace is
//! made.
//!
//! ## Security Invariant
//!
//! Token claims carry Unix seconds; a timestamp with sub-second precision
//! would not survive a round trip through a token and would make boundary
//! comparisons (`now >= exp`) depend on where the value came from. All
//! construction paths truncate to whole seconds.
//!
//! Validation never calls the system clock directly. Tests drive boundary
//! behavior with [`FixedClock`].

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::PcredError;

/// A UTC-only timestamp, truncated to seconds precision.
///
/// # Construction
///
/// - [`Timestamp::now()`]: current UTC time, truncated.
/// - [`Timestamp::from_utc()`]: from a `DateTime<Utc>`, truncating sub-seconds.
/// - [`Timestamp::parse()`]: from an ISO8601 string, rejecting non-UTC offsets.
/// - [`Timestamp::from_epoch_secs()`]: from Unix seconds, as carried in tokens.
///
/// Deserialization goes through [`Timestamp::parse()`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Create a timestamp from the current UTC time, truncated to seconds.
    pub fn now() -> Self {
        Self(truncate_to_seconds(Utc::now()))
    }

    /// Create a timestamp from a `chrono::DateTime<Utc>`, truncating sub-seconds.
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self(truncate_to_seconds(dt))
    }

    /// Parse a timestamp from an RFC 3339 string.
    ///
    /// Only the `Z` suffix is accepted; explicit offsets, even `+00:00`, are
    /// rejected.
    pub fn parse(s: &str) -> Result<Self, PcredError> {
        if !s.ends_with('Z') {
            return Err(PcredError::InvalidTimestamp(format!(
                "timestamp must use Z suffix (UTC only), got: {s:?}"
            )));
        }
        let dt = DateTime::parse_from_rfc3339(s)
            .map_err(|e| PcredError::InvalidTimestamp(format!("invalid RFC 3339 timestamp {s:?}: {e}")))?;
        Ok(Self(truncate_to_seconds(dt.with_timezone(&Utc))))
    }

    /// Create a timestamp from a Unix epoch timestamp (seconds).
    pub fn from_epoch_secs(secs: i64) -> Result<Self, PcredError> {
        DateTime::from_timestamp(secs, 0)
            .map(Self)
            .ok_or_else(|| PcredError::InvalidTimestamp(format!("unix timestamp out of range: {secs}")))
    }

    /// Access the inner `DateTime<Utc>`.
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Returns the Unix epoch timestamp in seconds.
    pub fn epoch_secs(&self) -> i64 {
        self.0.timestamp()
    }

    /// Add (or with a negative argument, subtract) whole seconds.
    ///
    /// Returns `None` when the result leaves the representable range.
    pub fn checked_add_secs(&self, secs: i64) -> Option<Self> {
        let delta = chrono::TimeDelta::try_seconds(secs)?;
        self.0.checked_add_signed(delta).map(Self)
    }

    /// Signed distance `self - other` in seconds.
    pub fn secs_since(&self, other: &Timestamp) -> i64 {
        self.epoch_secs().saturating_sub(other.epoch_secs())
    }

    /// Render as ISO8601 with Z suffix (e.g., `2026-01-15T12:00:00Z`).
    pub fn to_iso8601(&self) -> String {
        self.0.format("%Y-%m-%dT%H:%M:%SZ").to_string()
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_iso8601())
    }
}

fn truncate_to_seconds(dt: DateTime<Utc>) -> DateTime<Utc> {
    dt.with_nanosecond(0).unwrap_or(dt)
}

/// Source of the current time.
pub trait Clock: Send + Sync {
    /// The current UTC time, truncated to seconds.
    fn now(&self) -> Timestamp;
}

/// Wall-clock time from the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

/// A settable clock for tests and replays.
#[derive(Debug)]
pub struct FixedClock {
    epoch_secs: AtomicI64,
}

impl FixedClock {
    /// A clock frozen at `at`.
    pub fn new(at: Timestamp) -> Self {
        Self {
            epoch_secs: AtomicI64::new(at.epoch_secs()),
        }
    }

    /// Move the clock to `at`.
    pub fn set(&self, at: Timestamp) {
        self.epoch_secs.store(at.epoch_secs(), Ordering::SeqCst);
    }

    /// Move the clock forward (or back, if negative) by `secs`.
    pub fn advance(&self, secs: i64) {
        self.epoch_secs.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> Timestamp {
        let secs = self.epoch_secs.load(Ordering::SeqCst);
        // Only reachable through advance() past year 262143.
        Timestamp::from_epoch_secs(secs).unwrap_or_else(|_| Timestamp::from_utc(DateTime::<Utc>::MAX_UTC))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_now_has_no_subseconds() {
        assert_eq!(Timestamp::now().as_datetime().nanosecond(), 0);
    }

    #[test]
    fn test_from_utc_truncates() {
        let dt = Utc.with_ymd_and_hms(2026, 1, 15, 12, 30, 45).unwrap();
        let ts = Timestamp::from_utc(dt.with_nanosecond(123_456_789).unwrap());
        assert_eq!(ts.as_datetime().nanosecond(), 0);
        assert_eq!(ts.to_iso8601(), "2026-01-15T12:30:45Z");
    }

    #[test]
    fn test_parse_z_suffix_only() {
        assert_eq!(
            Timestamp::parse("2026-01-15T12:00:00Z").unwrap().to_iso8601(),
            "2026-01-15T12:00:00Z"
        );
        assert!(Timestamp::parse("2026-01-15T12:00:00+00:00").is_err());
        assert!(Timestamp::parse("2026-01-15T08:00:00-04:00").is_err());
        assert!(Timestamp::parse("not-a-date").is_err());
        assert!(Timestamp::parse("").is_err());
    }

    #[test]
    fn test_parse_subseconds_truncated() {
        let ts = Timestamp::parse("2026-01-15T12:00:00.123456Z").unwrap();
        assert_eq!(ts.to_iso8601(), "2026-01-15T12:00:00Z");
    }

    #[test]
    fn test_epoch_roundtrip() {
        let ts = Timestamp::parse("2026-01-15T12:00:00Z").unwrap();
        assert_eq!(Timestamp::from_epoch_secs(ts.epoch_secs()).unwrap(), ts);
    }

    #[test]
    fn test_epoch_out_of_range() {
        assert!(Timestamp::from_epoch_secs(i64::MAX).is_err());
    }

    #[test]
    fn test_checked_add_secs() {
        let ts = Timestamp::parse("2026-01-15T12:00:00Z").unwrap();
        assert_eq!(ts.checked_add_secs(3600).unwrap().to_iso8601(), "2026-01-15T13:00:00Z");
        assert_eq!(ts.checked_add_secs(-60).unwrap().to_iso8601(), "2026-01-15T11:59:00Z");
        assert!(ts.checked_add_secs(i64::MAX).is_none());
    }

    #[test]
    fn test_secs_since() {
        let a = Timestamp::parse("2026-01-15T12:00:00Z").unwrap();
        let b = Timestamp::parse("2026-01-15T12:05:00Z").unwrap();
        assert_eq!(b.secs_since(&a), 300);
        assert_eq!(a.secs_since(&b), -300);
    }

    #[test]
    fn test_serde_roundtrip() {
        let ts = Timestamp::parse("2026-01-15T12:00:00Z").unwrap();
        let json = serde_json::to_string(&ts).unwrap();
        let parsed: Timestamp = serde_json::from_str(&json).unwrap();
        assert_eq!(ts, parsed);
    }

    #[test]
    fn test_deserialize_follows_parse_rules() {
        let ts: Timestamp = serde_json::from_str(r#""2026-01-15T12:00:00.750Z""#).unwrap();
        assert_eq!(ts.as_datetime().nanosecond(), 0);
        assert_eq!(ts.to_iso8601(), "2026-01-15T12:00:00Z");
        assert!(serde_json::from_str::<Timestamp>(r#""2026-01-15T12:00:00+00:00""#).is_err());
        assert!(serde_json::from_str::<Timestamp>("1768478400").is_err());
    }

    #[test]
    fn fixed_clock_set_and_advance() {
        let start = Timestamp::parse("2026-01-15T12:00:00Z").unwrap();
        let clock = FixedClock::new(start);
        assert_eq!(clock.now(), start);
        clock.advance(90);
        assert_eq!(clock.now().to_iso8601(), "2026-01-15T12:01:30Z");
        clock.set(start);
        assert_eq!(clock.now(), start);
    }

    #[test]
    fn system_clock_is_close_to_now() {
        let delta = SystemClock.now().secs_since(&Timestamp::now()).abs();
        assert!(delta <= 1);
    }
}
