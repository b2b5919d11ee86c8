//! Validation of raw readings against the registry.

use std::sync::Arc;

use podwatch_types::{Measurement, Nanoseconds, RawReading, Reading, ReadingKind, Status};

use crate::error::ValidationError;
use crate::registry::Registry;

/// A measurement reading whose pod and key resolved, with its definition.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedMeasurement {
    pub reading: Reading,
    pub measurement: Measurement,
}

/// A status reading whose value is one of the permitted enumerants.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedStatus {
    pub reading: Reading,
    pub status: Status,
}

/// Checks raw readings against a shared registry. Has no side effects.
#[derive(Debug, Clone)]
pub struct Validator {
    registry: Arc<Registry>,
}

impl Validator {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Validate a reading on the measurement channel.
    pub fn validate_measurement(
        &self,
        raw: &RawReading,
    ) -> Result<ValidatedMeasurement, ValidationError> {
        let (value, timestamp) = self.check_common(raw)?;
        let measurement = self
            .registry
            .resolve_measurement(&raw.pod_id, &raw.key)
            .ok_or_else(|| ValidationError::UnknownMeasurement {
                pod_id: raw.pod_id.clone(),
                key: raw.key.clone(),
            })?;
        let value = value.as_number().ok_or_else(|| {
            ValidationError::malformed(format!("value {} is not a finite number", value))
        })?;

        Ok(ValidatedMeasurement {
            reading: Reading::measurement(raw.pod_id.as_str(), raw.key.as_str(), value, timestamp),
            measurement: measurement.clone(),
        })
    }

    /// Validate a reading on the status channel.
    pub fn validate_status(&self, raw: &RawReading) -> Result<ValidatedStatus, ValidationError> {
        let (value, timestamp) = self.check_common(raw)?;
        let status = self
            .registry
            .resolve_status(&raw.pod_id, &raw.key)
            .ok_or_else(|| ValidationError::UnknownStatus {
                pod_id: raw.pod_id.clone(),
                key: raw.key.clone(),
            })?;
        let invalid = |value| ValidationError::InvalidStatusValue {
            pod_id: raw.pod_id.clone(),
            key: raw.key.clone(),
            value,
        };
        let value = value.as_number().ok_or_else(|| invalid(f64::NAN))?;
        if !status.permits(value) {
            return Err(invalid(value));
        }

        Ok(ValidatedStatus {
            reading: Reading::status(raw.pod_id.as_str(), raw.key.as_str(), value, timestamp),
            status: status.clone(),
        })
    }

    /// Validate according to the channel the reading arrived on.
    pub fn validate(&self, raw: &RawReading) -> Result<Reading, ValidationError> {
        match raw.kind {
            ReadingKind::Measurement => self.validate_measurement(raw).map(|v| v.reading),
            ReadingKind::Status => self.validate_status(raw).map(|v| v.reading),
        }
    }

    /// Checks shared by both channels: required fields, timestamp, known pod.
    fn check_common<'a>(
        &self,
        raw: &'a RawReading,
    ) -> Result<(&'a podwatch_types::RawValue, Nanoseconds), ValidationError> {
        if raw.pod_id.is_empty() {
            return Err(ValidationError::malformed("missing pod id"));
        }
        if raw.key.is_empty() {
            return Err(ValidationError::malformed(format!(
                "missing {} key",
                raw.kind
            )));
        }
        let value = raw
            .value
            .as_ref()
            .ok_or_else(|| ValidationError::malformed("missing value"))?;
        let timestamp = raw
            .timestamp
            .as_deref()
            .ok_or_else(|| ValidationError::malformed("missing timestamp"))?;
        let timestamp: Nanoseconds = timestamp.parse().map_err(|_| {
            ValidationError::malformed(format!("invalid timestamp {:?}", timestamp))
        })?;

        if self.registry.resolve_pod(&raw.pod_id).is_none() {
            return Err(ValidationError::UnknownPod {
                pod_id: raw.pod_id.clone(),
            });
        }
        Ok((value, timestamp))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::registry::tests::test_registry;
    use podwatch_types::RawValue;

    fn validator() -> Validator {
        Validator::new(Arc::new(test_registry()))
    }

    #[test]
    fn accepts_known_measurement() {
        let raw = RawReading::measurement("pod_1", "velocity", 42.5, Nanoseconds(1_000));
        let validated = validator().validate_measurement(&raw).unwrap();
        assert_eq!(validated.reading.value, 42.5);
        assert_eq!(validated.reading.timestamp, Nanoseconds(1_000));
        assert_eq!(validated.measurement.id, "velocity");
    }

    #[test]
    fn accepts_numeric_text() {
        let raw = RawReading::measurement("pod_1", "velocity", "17.25", Nanoseconds(1));
        let validated = validator().validate_measurement(&raw).unwrap();
        assert_eq!(validated.reading.value, 17.25);
    }

    #[test]
    fn rejects_non_numeric_value() {
        let raw = RawReading::measurement("pod_1", "velocity", "fast", Nanoseconds(1));
        let err = validator().validate_measurement(&raw).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedMessage);
    }

    #[test]
    fn rejects_missing_fields() {
        let v = validator();

        let mut raw = RawReading::measurement("", "velocity", 1.0, Nanoseconds(1));
        assert_eq!(v.validate(&raw).unwrap_err().kind(), ErrorKind::MalformedMessage);

        raw.pod_id = "pod_1".into();
        raw.key.clear();
        assert_eq!(v.validate(&raw).unwrap_err().kind(), ErrorKind::MalformedMessage);

        raw.key = "velocity".into();
        raw.value = None;
        assert_eq!(v.validate(&raw).unwrap_err().kind(), ErrorKind::MalformedMessage);

        raw.value = Some(RawValue::Number(1.0));
        raw.timestamp = None;
        assert_eq!(v.validate(&raw).unwrap_err().kind(), ErrorKind::MalformedMessage);

        raw.timestamp = Some("yesterday".into());
        assert_eq!(v.validate(&raw).unwrap_err().kind(), ErrorKind::MalformedMessage);
    }

    #[test]
    fn rejects_unknown_pod_and_keys() {
        let v = validator();

        let raw = RawReading::measurement("pod_9", "velocity", 1.0, Nanoseconds(1));
        assert_eq!(
            v.validate(&raw).unwrap_err(),
            ValidationError::UnknownPod {
                pod_id: "pod_9".into()
            }
        );

        let raw = RawReading::measurement("pod_1", "warp", 1.0, Nanoseconds(1));
        assert_eq!(v.validate(&raw).unwrap_err().kind(), ErrorKind::UnknownMeasurement);

        // A status id is not a measurement key, and vice versa.
        let raw = RawReading::measurement("pod_1", "state", 1.0, Nanoseconds(1));
        assert_eq!(v.validate(&raw).unwrap_err().kind(), ErrorKind::UnknownMeasurement);
        let raw = RawReading::status("pod_1", "velocity", 1.0, Nanoseconds(1));
        assert_eq!(v.validate(&raw).unwrap_err().kind(), ErrorKind::UnknownStatus);
    }

    #[test]
    fn status_values_must_be_enumerated() {
        let v = validator();

        let raw = RawReading::status("pod_1", "state", 1.0, Nanoseconds(5));
        let validated = v.validate_status(&raw).unwrap();
        assert_eq!(validated.reading.kind, ReadingKind::Status);
        assert_eq!(validated.status.enumerant(1.0).unwrap().label, "READY");

        let raw = RawReading::status("pod_1", "state", 9.0, Nanoseconds(5));
        assert_eq!(
            v.validate_status(&raw).unwrap_err(),
            ValidationError::InvalidStatusValue {
                pod_id: "pod_1".into(),
                key: "state".into(),
                value: 9.0,
            }
        );

        let raw = RawReading::status("pod_1", "state", "RUNNING", Nanoseconds(5));
        assert_eq!(
            v.validate_status(&raw).unwrap_err().kind(),
            ErrorKind::InvalidStatusValue
        );
    }

    #[test]
    fn validate_dispatches_on_kind() {
        let v = validator();
        let reading = v
            .validate(&RawReading::status("pod_1", "state", "2", Nanoseconds(3)))
            .unwrap();
        assert_eq!(reading.kind, ReadingKind::Status);
        assert_eq!(reading.value, 2.0);
    }
}
