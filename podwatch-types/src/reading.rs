//! Readings: raw inbound tuples and their validated form.

use alloc::string::String;
use core::fmt;

use crate::Nanoseconds;

/// Which logical channel a reading arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum ReadingKind {
    /// A continuously-valued sensor channel.
    #[default]
    Measurement,
    /// A discrete, enumerated channel (pod state and friends).
    #[cfg_attr(feature = "serde", serde(alias = "state"))]
    Status,
}

impl ReadingKind {
    /// Name of the channel, as used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReadingKind::Measurement => "measurement",
            ReadingKind::Status => "status",
        }
    }
}

impl fmt::Display for ReadingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A value as delivered by the transport: a number or its textual form.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum RawValue {
    Number(f64),
    Text(String),
}

impl RawValue {
    /// Interpret the value as a finite number.
    ///
    /// Text is accepted when it parses as a number; NaN and infinities are not.
    pub fn as_number(&self) -> Option<f64> {
        let n = match self {
            RawValue::Number(n) => *n,
            RawValue::Text(s) => s.trim().parse::<f64>().ok()?,
        };
        n.is_finite().then_some(n)
    }
}

impl From<f64> for RawValue {
    fn from(n: f64) -> Self {
        RawValue::Number(n)
    }
}

impl From<&str> for RawValue {
    fn from(s: &str) -> Self {
        RawValue::Text(String::from(s))
    }
}

impl fmt::Display for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawValue::Number(n) => write!(f, "{}", n),
            RawValue::Text(s) => write!(f, "{:?}", s),
        }
    }
}

/// An unvalidated reading exactly as the transport delivered it.
///
/// Every field may be missing or malformed; the validator decides.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct RawReading {
    #[cfg_attr(feature = "serde", serde(default, rename = "channel"))]
    pub kind: ReadingKind,
    #[cfg_attr(feature = "serde", serde(default))]
    pub pod_id: String,
    #[cfg_attr(feature = "serde", serde(default, alias = "measurementKey", alias = "statusId"))]
    pub key: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub value: Option<RawValue>,
    /// Nanoseconds since the epoch, as a decimal string.
    #[cfg_attr(feature = "serde", serde(default, rename = "timestampNanos", alias = "timestamp"))]
    pub timestamp: Option<String>,
}

impl RawReading {
    /// A raw reading on the measurement channel.
    pub fn measurement(
        pod_id: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<RawValue>,
        timestamp: Nanoseconds,
    ) -> Self {
        Self {
            kind: ReadingKind::Measurement,
            pod_id: pod_id.into(),
            key: key.into(),
            value: Some(value.into()),
            timestamp: Some(alloc::format!("{}", timestamp)),
        }
    }

    /// A raw reading on the status channel.
    pub fn status(
        pod_id: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<RawValue>,
        timestamp: Nanoseconds,
    ) -> Self {
        Self {
            kind: ReadingKind::Status,
            ..Self::measurement(pod_id, key, value, timestamp)
        }
    }
}

/// A validated reading. Its pod and key are known to resolve in the registry.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct Reading {
    pub pod_id: String,
    pub key: String,
    pub kind: ReadingKind,
    pub value: f64,
    pub timestamp: Nanoseconds,
}

impl Reading {
    /// A measurement reading.
    pub fn measurement(
        pod_id: impl Into<String>,
        key: impl Into<String>,
        value: f64,
        timestamp: Nanoseconds,
    ) -> Self {
        Self {
            pod_id: pod_id.into(),
            key: key.into(),
            kind: ReadingKind::Measurement,
            value,
            timestamp,
        }
    }

    /// A status reading.
    pub fn status(
        pod_id: impl Into<String>,
        key: impl Into<String>,
        value: f64,
        timestamp: Nanoseconds,
    ) -> Self {
        Self {
            kind: ReadingKind::Status,
            ..Self::measurement(pod_id, key, value, timestamp)
        }
    }
}
