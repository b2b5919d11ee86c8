//! Breach levels and fault lifecycle events.

use core::fmt;

use crate::{Measurement, Nanoseconds, Reading};

/// Outcome of evaluating a value against a measurement's limits.
///
/// Ordered by severity, so `max` picks the worse of two levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum BreachLevel {
    #[default]
    None,
    Warning,
    Critical,
}

impl BreachLevel {
    /// The fault level this breach raises, if any.
    pub fn fault_level(&self) -> Option<FaultLevel> {
        match self {
            BreachLevel::None => None,
            BreachLevel::Warning => Some(FaultLevel::Warning),
            BreachLevel::Critical => Some(FaultLevel::Critical),
        }
    }

    /// Returns a short symbol for display.
    pub fn symbol(&self) -> &'static str {
        match self {
            BreachLevel::None => "OK",
            BreachLevel::Warning => "WARN",
            BreachLevel::Critical => "CRIT",
        }
    }
}

/// Severity of an open fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum FaultLevel {
    Warning,
    Critical,
}

impl FaultLevel {
    /// Name used by fault consumers.
    pub fn as_str(&self) -> &'static str {
        match self {
            FaultLevel::Warning => "WARNING",
            FaultLevel::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for FaultLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<FaultLevel> for BreachLevel {
    fn from(level: FaultLevel) -> Self {
        match level {
            FaultLevel::Warning => BreachLevel::Warning,
            FaultLevel::Critical => BreachLevel::Critical,
        }
    }
}

/// What happened to a fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum FaultEventKind {
    /// A fault opened at `level`. When `previous` is set, the fault at that
    /// level was closed by the same event (escalation or de-escalation).
    Opened,
    /// The fault at `level` cleared; the measurement is back within bounds.
    Cleared,
}

/// A fault lifecycle event for one (pod, measurement) pair.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct FaultEvent {
    pub kind: FaultEventKind,
    pub level: FaultLevel,
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub previous: Option<FaultLevel>,
    pub measurement: Measurement,
    /// The reading that caused this transition.
    pub trip_reading: Reading,
}

impl FaultEvent {
    /// A fault opened from a clear state.
    pub fn opened(level: FaultLevel, measurement: Measurement, trip_reading: Reading) -> Self {
        Self {
            kind: FaultEventKind::Opened,
            level,
            previous: None,
            measurement,
            trip_reading,
        }
    }

    /// A fault replaced by one at a different level.
    pub fn changed(
        from: FaultLevel,
        to: FaultLevel,
        measurement: Measurement,
        trip_reading: Reading,
    ) -> Self {
        Self {
            previous: Some(from),
            ..Self::opened(to, measurement, trip_reading)
        }
    }

    /// A fault at `level` cleared.
    pub fn cleared(level: FaultLevel, measurement: Measurement, trip_reading: Reading) -> Self {
        Self {
            kind: FaultEventKind::Cleared,
            ..Self::opened(level, measurement, trip_reading)
        }
    }

    /// The pod the fault belongs to.
    pub fn pod_id(&self) -> &str {
        &self.trip_reading.pod_id
    }

    /// The measurement key the fault belongs to.
    pub fn key(&self) -> &str {
        &self.trip_reading.key
    }

    /// When the transition happened.
    pub fn timestamp(&self) -> Nanoseconds {
        self.trip_reading.timestamp
    }

    /// True for an opened event that raised severity.
    pub fn is_escalation(&self) -> bool {
        self.kind == FaultEventKind::Opened && self.previous.is_some_and(|p| p < self.level)
    }
}
