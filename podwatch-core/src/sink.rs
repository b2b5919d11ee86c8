//! Seams between the pipeline and its downstream collaborators.
//!
//! Each stage of the pipeline talks to one of these traits. In-process
//! implementations live in [`crate::publisher`], [`crate::store`] and
//! [`crate::fault_log`]; tests substitute recording fakes.

use std::collections::BTreeMap;

use async_trait::async_trait;
use podwatch_types::{FaultEvent, Nanoseconds, Reading, TimeRange};
use serde::{Deserialize, Serialize};

use crate::error::SinkError;

/// Series name every reading is written under.
pub const SERIES: &str = "measurement";
/// Tag carrying the pod id.
pub const POD_TAG: &str = "podId";
/// Tag carrying the measurement key or status id.
pub const KEY_TAG: &str = "measurementKey";
/// Field carrying the numeric value.
pub const VALUE_FIELD: &str = "value";

/// A single time-series point, as handed to durable storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub measurement: String,
    pub tags: BTreeMap<String, String>,
    pub fields: BTreeMap<String, f64>,
    pub timestamp: Nanoseconds,
}

impl Point {
    /// The point a reading is stored as.
    pub fn from_reading(reading: &Reading) -> Self {
        let tags = BTreeMap::from([
            (POD_TAG.to_string(), reading.pod_id.clone()),
            (KEY_TAG.to_string(), reading.key.clone()),
        ]);
        let fields = BTreeMap::from([(VALUE_FIELD.to_string(), reading.value)]);
        Self {
            measurement: SERIES.to_string(),
            tags,
            fields,
            timestamp: reading.timestamp,
        }
    }

    pub fn pod_id(&self) -> Option<&str> {
        self.tags.get(POD_TAG).map(String::as_str)
    }

    pub fn key(&self) -> Option<&str> {
        self.tags.get(KEY_TAG).map(String::as_str)
    }

    pub fn value(&self) -> Option<f64> {
        self.fields.get(VALUE_FIELD).copied()
    }

    /// True if the point belongs to the given pod and key.
    pub fn matches(&self, pod_id: &str, key: &str) -> bool {
        self.measurement == SERIES && self.pod_id() == Some(pod_id) && self.key() == Some(key)
    }
}

/// One row of a historical query.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistoricalReading {
    pub timestamp: Nanoseconds,
    pub value: f64,
}

/// Fan-out of validated readings to live observers.
///
/// `publish` must not block. It returns how many subscribers were reached.
pub trait RealtimePublisher: Send + Sync {
    fn publish(&self, reading: &Reading) -> Result<usize, SinkError>;
}

/// Append-only time-series storage.
#[async_trait]
pub trait DurableSink: Send + Sync {
    async fn append_point(&self, point: Point) -> Result<(), SinkError>;
}

/// Read side of durable storage.
#[async_trait]
pub trait HistoricalQuery: Send + Sync {
    /// Readings for one pod and key inside `range`, ordered by timestamp.
    async fn query(
        &self,
        pod_id: &str,
        key: &str,
        range: TimeRange,
    ) -> Result<Vec<HistoricalReading>, SinkError>;
}

/// Destination for fault lifecycle events.
#[async_trait]
pub trait FaultSink: Send + Sync {
    async fn record_fault(&self, event: &FaultEvent) -> Result<(), SinkError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_from_reading() {
        let reading = Reading::measurement("pod_1", "velocity", 12.5, Nanoseconds(99));
        let point = Point::from_reading(&reading);

        assert_eq!(point.measurement, "measurement");
        assert_eq!(point.pod_id(), Some("pod_1"));
        assert_eq!(point.key(), Some("velocity"));
        assert_eq!(point.value(), Some(12.5));
        assert_eq!(point.timestamp, Nanoseconds(99));
        assert!(point.matches("pod_1", "velocity"));
        assert!(!point.matches("pod_1", "temperature"));
    }

    #[test]
    fn status_readings_share_the_series() {
        let reading = Reading::status("pod_1", "state", 2.0, Nanoseconds(1));
        let point = Point::from_reading(&reading);
        assert_eq!(point.measurement, SERIES);
        assert_eq!(point.key(), Some("state"));
    }

    #[test]
    fn point_json_shape() {
        let point = Point::from_reading(&Reading::measurement(
            "pod_1",
            "velocity",
            1.0,
            Nanoseconds(5),
        ));
        let json = serde_json::to_value(&point).unwrap();
        assert_eq!(json["tags"]["podId"], "pod_1");
        assert_eq!(json["tags"]["measurementKey"], "velocity");
        assert_eq!(json["fields"]["value"], 1.0);
        assert_eq!(json["timestamp"], 5);
    }
}
