//! Telemetry topic naming and payload decoding.
//!
//! Pods publish on three topic shapes, shown here with MQTT separators:
//!
//! | Topic                              | Channel     | Key              |
//! |------------------------------------|-------------|------------------|
//! | `hyped/{pod}/measurement/{key}`    | measurement | `{key}`          |
//! | `hyped/{pod}/status/{id}`          | status      | `{id}`           |
//! | `hyped/{pod}/state`                | status      | `state`          |
//!
//! NATS subjects use the same segments separated by `.`.
//!
//! A payload is either a JSON object `{"value": .., "timestamp": ..}` or a
//! bare value. Readings without a timestamp are stamped on arrival.

use podwatch_types::{Nanoseconds, RawReading, RawValue, ReadingKind};
use serde::Deserialize;

use crate::AdapterError;

/// Root segment of every telemetry topic.
pub const ROOT: &str = "hyped";

/// Status id used for the `hyped/{pod}/state` topic.
pub const STATE_KEY: &str = "state";

/// MQTT subscription filters covering every telemetry topic.
pub const MQTT_FILTERS: [&str; 3] = [
    "hyped/+/measurement/+",
    "hyped/+/status/+",
    "hyped/+/state",
];

/// NATS subjects covering every telemetry topic.
pub const NATS_SUBJECTS: [&str; 3] = [
    "hyped.*.measurement.*",
    "hyped.*.status.*",
    "hyped.*.state",
];

/// Where a topic routes a reading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub kind: ReadingKind,
    pub pod_id: String,
    pub key: String,
}

/// Split a topic into its route.
pub fn parse_topic(topic: &str, separator: char) -> Result<Route, AdapterError> {
    let invalid = || AdapterError::InvalidTopic(topic.to_string());
    let segments: Vec<&str> = topic.split(separator).collect();

    let (kind, pod_id, key) = match segments.as_slice() {
        [ROOT, pod, "measurement", key] => (ReadingKind::Measurement, *pod, *key),
        [ROOT, pod, "status", id] => (ReadingKind::Status, *pod, *id),
        [ROOT, pod, "state"] => (ReadingKind::Status, *pod, STATE_KEY),
        _ => return Err(invalid()),
    };
    if pod_id.is_empty() || key.is_empty() {
        return Err(invalid());
    }

    Ok(Route {
        kind,
        pod_id: pod_id.to_string(),
        key: key.to_string(),
    })
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TimestampField {
    Number(u64),
    Text(String),
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    value: Option<RawValue>,
    #[serde(default, alias = "timestampNanos")]
    timestamp: Option<TimestampField>,
}

/// Decode a payload into its value and timestamp.
///
/// Neither is checked beyond decoding; the pipeline validates them.
pub fn decode_payload(
    topic: &str,
    payload: &[u8],
) -> Result<(Option<RawValue>, Option<String>), AdapterError> {
    let invalid = |reason: String| AdapterError::InvalidPayload {
        topic: topic.to_string(),
        reason,
    };
    let text = std::str::from_utf8(payload)
        .map_err(|e| invalid(e.to_string()))?
        .trim();

    if text.starts_with('{') {
        let envelope: Envelope = serde_json::from_str(text).map_err(|e| invalid(e.to_string()))?;
        let timestamp = envelope.timestamp.map(|t| match t {
            TimestampField::Number(n) => n.to_string(),
            TimestampField::Text(s) => s,
        });
        return Ok((envelope.value, timestamp));
    }

    if text.is_empty() {
        return Ok((None, None));
    }
    let value = serde_json::from_str::<RawValue>(text).unwrap_or_else(|_| RawValue::from(text));
    Ok((Some(value), None))
}

/// Turn a message into a raw reading, stamping the current time if needed.
pub fn to_raw_reading(
    topic: &str,
    payload: &[u8],
    separator: char,
) -> Result<RawReading, AdapterError> {
    let route = parse_topic(topic, separator)?;
    let (value, timestamp) = decode_payload(topic, payload)?;
    Ok(RawReading {
        kind: route.kind,
        pod_id: route.pod_id,
        key: route.key,
        value,
        timestamp: Some(timestamp.unwrap_or_else(|| Nanoseconds::now().to_string())),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_measurement_topics() {
        let route = parse_topic("hyped/pod_1/measurement/velocity", '/').unwrap();
        assert_eq!(route.kind, ReadingKind::Measurement);
        assert_eq!(route.pod_id, "pod_1");
        assert_eq!(route.key, "velocity");

        let route = parse_topic("hyped.pod_1.measurement.velocity", '.').unwrap();
        assert_eq!(route.key, "velocity");
    }

    #[test]
    fn parses_status_topics() {
        let route = parse_topic("hyped/pod_1/status/brakes", '/').unwrap();
        assert_eq!(route.kind, ReadingKind::Status);
        assert_eq!(route.key, "brakes");

        let route = parse_topic("hyped/pod_1/state", '/').unwrap();
        assert_eq!(route.kind, ReadingKind::Status);
        assert_eq!(route.key, STATE_KEY);
    }

    #[test]
    fn rejects_other_topics() {
        for topic in [
            "hyped/pod_1",
            "hyped/pod_1/measurement",
            "hyped//measurement/velocity",
            "hyped/pod_1/measurement/",
            "other/pod_1/measurement/velocity",
            "hyped/pod_1/logs/velocity",
            "hyped/pod_1/measurement/velocity/extra",
        ] {
            assert!(
                matches!(parse_topic(topic, '/'), Err(AdapterError::InvalidTopic(_))),
                "{topic} should be rejected"
            );
        }
    }

    #[test]
    fn decodes_json_envelope() {
        let (value, ts) =
            decode_payload("t", br#"{"value": 12.5, "timestamp": 1700000000000000000}"#).unwrap();
        assert_eq!(value, Some(RawValue::Number(12.5)));
        assert_eq!(ts.as_deref(), Some("1700000000000000000"));

        let (value, ts) = decode_payload("t", br#"{"value": "3", "timestamp": "42"}"#).unwrap();
        assert_eq!(value, Some(RawValue::Text("3".into())));
        assert_eq!(ts.as_deref(), Some("42"));

        let (value, ts) = decode_payload("t", br#"{"timestamp": 42}"#).unwrap();
        assert_eq!(value, None);
        assert_eq!(ts.as_deref(), Some("42"));
    }

    #[test]
    fn decodes_bare_values() {
        assert_eq!(
            decode_payload("t", b" 7.25\n").unwrap(),
            (Some(RawValue::Number(7.25)), None)
        );
        assert_eq!(
            decode_payload("t", b"RUNNING").unwrap(),
            (Some(RawValue::Text("RUNNING".into())), None)
        );
        assert_eq!(decode_payload("t", b"").unwrap(), (None, None));
    }

    #[test]
    fn rejects_broken_payloads() {
        assert!(matches!(
            decode_payload("t", b"{\"value\": "),
            Err(AdapterError::InvalidPayload { .. })
        ));
        assert!(matches!(
            decode_payload("t", &[0xff, 0xfe]),
            Err(AdapterError::InvalidPayload { .. })
        ));
    }

    #[test]
    fn stamps_missing_timestamps() {
        let before = Nanoseconds::now();
        let raw = to_raw_reading("hyped/pod_1/state", b"2", '/').unwrap();
        let stamped: Nanoseconds = raw.timestamp.as_deref().unwrap().parse().unwrap();

        assert_eq!(raw.kind, ReadingKind::Status);
        assert_eq!(raw.key, "state");
        assert_eq!(raw.value, Some(RawValue::Number(2.0)));
        assert!(stamped >= before);
    }

    #[test]
    fn keeps_supplied_timestamps() {
        let raw = to_raw_reading(
            "hyped/pod_1/measurement/velocity",
            br#"{"value": 1, "timestamp": 5}"#,
            '/',
        )
        .unwrap();
        assert_eq!(raw.timestamp.as_deref(), Some("5"));
        assert_eq!(raw.kind, ReadingKind::Measurement);
    }
}
