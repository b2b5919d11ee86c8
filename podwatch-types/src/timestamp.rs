//! Timestamp representation for readings.
//!
//! Readings are stamped in nanoseconds since the Unix epoch. Sensors report
//! sub-millisecond timing, so milliseconds are too coarse for ordering.

use core::fmt;
use core::str::FromStr;
use core::time::Duration;

/// Nanoseconds since the Unix epoch.
///
/// A u64 holds nanosecond timestamps until the year 2554.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Nanoseconds(pub u64);

impl Nanoseconds {
    /// Create from nanoseconds.
    pub const fn from_nanos(nanos: u64) -> Self {
        Self(nanos)
    }

    /// Create from milliseconds. Saturates at the largest timestamp.
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis.saturating_mul(1_000_000))
    }

    /// Create from seconds. Saturates at the largest timestamp.
    pub const fn from_secs(secs: u64) -> Self {
        Self(secs.saturating_mul(1_000_000_000))
    }

    /// Get the value in nanoseconds.
    pub const fn as_nanos(&self) -> u64 {
        self.0
    }

    /// Get the value in milliseconds (truncated).
    pub const fn as_millis(&self) -> u64 {
        self.0 / 1_000_000
    }

    /// Convert to a standard Duration measured from the epoch.
    pub const fn to_duration(&self) -> Duration {
        Duration::from_nanos(self.0)
    }

    /// The current wall-clock time.
    #[cfg(feature = "std")]
    pub fn now() -> Self {
        let elapsed = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default();
        Self::from(elapsed)
    }
}

impl From<Duration> for Nanoseconds {
    fn from(d: Duration) -> Self {
        Self(u64::try_from(d.as_nanos()).unwrap_or(u64::MAX))
    }
}

impl fmt::Display for Nanoseconds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error returned when a timestamp string is not a decimal nanosecond count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseTimestampError;

impl fmt::Display for ParseTimestampError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("timestamp must be a decimal count of nanoseconds since the epoch")
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ParseTimestampError {}

impl FromStr for Nanoseconds {
    type Err = ParseTimestampError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<u64>().map(Self).map_err(|_| ParseTimestampError)
    }
}

/// An inclusive range of timestamps used by historical queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TimeRange {
    pub start: Nanoseconds,
    pub end: Nanoseconds,
}

impl TimeRange {
    /// Create a range from two timestamps.
    pub const fn new(start: Nanoseconds, end: Nanoseconds) -> Self {
        Self { start, end }
    }

    /// Create a range from millisecond bounds, as dashboards send them.
    pub const fn from_millis(start: u64, end: u64) -> Self {
        Self::new(Nanoseconds::from_millis(start), Nanoseconds::from_millis(end))
    }

    /// A range covering every representable timestamp.
    pub const fn all() -> Self {
        Self::new(Nanoseconds(0), Nanoseconds(u64::MAX))
    }

    /// Check whether a timestamp falls inside the range.
    pub fn contains(&self, ts: Nanoseconds) -> bool {
        ts >= self.start && ts <= self.end
    }
}

impl Default for TimeRange {
    fn default() -> Self {
        Self::all()
    }
}
