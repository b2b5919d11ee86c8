//! Error types for the ingestion pipeline.

use std::fmt;

use podwatch_types::UnsupportedSchema;
use thiserror::Error;

/// Category of a validation rejection, for counting and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ErrorKind {
    MalformedMessage,
    UnknownPod,
    UnknownMeasurement,
    UnknownStatus,
    InvalidStatusValue,
}

impl ErrorKind {
    /// Every kind, in a stable order.
    pub const ALL: [ErrorKind; 5] = [
        ErrorKind::MalformedMessage,
        ErrorKind::UnknownPod,
        ErrorKind::UnknownMeasurement,
        ErrorKind::UnknownStatus,
        ErrorKind::InvalidStatusValue,
    ];

    /// Snake-case name, used as a counter label.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::MalformedMessage => "malformed_message",
            ErrorKind::UnknownPod => "unknown_pod",
            ErrorKind::UnknownMeasurement => "unknown_measurement",
            ErrorKind::UnknownStatus => "unknown_status",
            ErrorKind::InvalidStatusValue => "invalid_status_value",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a raw reading was rejected. Rejected readings reach no downstream stage.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// A required field is missing or unusable.
    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    #[error("Unknown pod \"{pod_id}\"")]
    UnknownPod { pod_id: String },

    #[error("Measurement \"{key}\" not found for pod \"{pod_id}\"")]
    UnknownMeasurement { pod_id: String, key: String },

    #[error("Status \"{key}\" not found for pod \"{pod_id}\"")]
    UnknownStatus { pod_id: String, key: String },

    #[error("Status \"{key}\" value {value} is not valid for pod \"{pod_id}\"")]
    InvalidStatusValue {
        pod_id: String,
        key: String,
        value: f64,
    },
}

impl ValidationError {
    /// The category of this rejection.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ValidationError::MalformedMessage(_) => ErrorKind::MalformedMessage,
            ValidationError::UnknownPod { .. } => ErrorKind::UnknownPod,
            ValidationError::UnknownMeasurement { .. } => ErrorKind::UnknownMeasurement,
            ValidationError::UnknownStatus { .. } => ErrorKind::UnknownStatus,
            ValidationError::InvalidStatusValue { .. } => ErrorKind::InvalidStatusValue,
        }
    }

    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        ValidationError::MalformedMessage(reason.into())
    }
}

/// A downstream sink failed to accept a reading or fault.
///
/// Sink errors stay inside the stage that hit them.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The sink is shut down or has nobody to deliver to.
    #[error("Sink closed")]
    Closed,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The sink refused the write.
    #[error("Sink rejected write: {0}")]
    Rejected(String),
}

/// A registry document could not be loaded. Always fatal at startup.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Failed to read registry document: {0}")]
    Config(#[from] config::ConfigError),

    #[error(transparent)]
    UnsupportedVersion(#[from] UnsupportedSchema),

    #[error("Pod \"{pod_id}\": invalid {what} type \"{sensor_type}\" for \"{id}\"")]
    UnknownType {
        pod_id: String,
        what: &'static str,
        id: String,
        sensor_type: String,
    },

    #[error("Pod \"{pod_id}\": unknown operating mode \"{mode}\"")]
    UnknownMode { pod_id: String, mode: String },

    #[error("Pod \"{pod_id}\": measurement \"{id}\" is missing {missing}")]
    MissingLimits {
        pod_id: String,
        id: String,
        missing: &'static str,
    },

    #[error("Pod \"{pod_id}\": {what} range of \"{id}\" is inverted")]
    InvertedRange {
        pod_id: String,
        id: String,
        what: &'static str,
    },

    #[error("Pod \"{pod_id}\": {what} \"{id}\" is defined more than once")]
    DuplicateId {
        pod_id: String,
        id: String,
        what: &'static str,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_kinds() {
        let cases = [
            (ValidationError::malformed("no pod"), ErrorKind::MalformedMessage),
            (
                ValidationError::UnknownPod {
                    pod_id: "pod_9".into(),
                },
                ErrorKind::UnknownPod,
            ),
            (
                ValidationError::UnknownMeasurement {
                    pod_id: "pod_1".into(),
                    key: "warp".into(),
                },
                ErrorKind::UnknownMeasurement,
            ),
            (
                ValidationError::UnknownStatus {
                    pod_id: "pod_1".into(),
                    key: "mood".into(),
                },
                ErrorKind::UnknownStatus,
            ),
            (
                ValidationError::InvalidStatusValue {
                    pod_id: "pod_1".into(),
                    key: "state".into(),
                    value: 9.0,
                },
                ErrorKind::InvalidStatusValue,
            ),
        ];

        for (err, kind) in cases {
            assert_eq!(err.kind(), kind);
        }
    }

    #[test]
    fn messages_carry_context() {
        let err = ValidationError::InvalidStatusValue {
            pod_id: "pod_1".into(),
            key: "state".into(),
            value: 9.0,
        };
        assert_eq!(
            err.to_string(),
            "Status \"state\" value 9 is not valid for pod \"pod_1\""
        );

        let err = RegistryError::DuplicateId {
            pod_id: "pod_1".into(),
            id: "state".into(),
            what: "channel",
        };
        assert!(err.to_string().contains("defined more than once"));
    }

    #[test]
    fn kind_names_are_unique() {
        let mut names: Vec<_> = ErrorKind::ALL.iter().map(|k| k.as_str()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), ErrorKind::ALL.len());
    }
}
