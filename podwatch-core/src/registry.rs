//! Read-only registry of pod, measurement and status definitions.
//!
//! The registry is loaded once at startup from a YAML, TOML or JSON document
//! and shared by `Arc` afterwards. Every schema violation is a fatal
//! [`RegistryError`].
//!
//! # Document shape
//!
//! ```yaml
//! version: 1
//! pods:
//!   pod_1:
//!     label: Pod 1
//!     mode: ALL_SYSTEMS_ON
//!     measurements:
//!       velocity:
//!         label: Velocity
//!         unit: m/s
//!         format: float
//!         type: velocity
//!         limits:
//!           critical: { low: 0, high: 100 }
//!           warning: { low: 10, high: 90 }
//!     statuses:
//!       state:
//!         label: State
//!         format: enum
//!         type: status
//!         values:
//!           - { value: 0, label: IDLE }
//!           - { value: 1, label: READY }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use config::{Config, File, FileFormat};
use podwatch_types::{
    Limits, Measurement, Pod, PodMode, Range, SchemaVersion, SensorType, Status, StatusValue,
};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::RegistryError;

/// Immutable lookup of every known pod.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    pods: BTreeMap<String, Pod>,
}

impl Registry {
    /// Build a registry from already-constructed pods.
    ///
    /// Pods built in code skip document validation.
    pub fn new(pods: impl IntoIterator<Item = Pod>) -> Self {
        Self {
            pods: pods.into_iter().map(|p| (p.id.clone(), p)).collect(),
        }
    }

    /// Load a registry document from a file. The format follows the extension.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, RegistryError> {
        let path = path.as_ref();
        let doc: RawDocument = Config::builder()
            .add_source(File::from(path))
            .build()?
            .try_deserialize()?;
        let registry = Self::from_document(doc)?;
        debug!(path = %path.display(), pods = registry.len(), "Loaded pod registry");
        Ok(registry)
    }

    /// Parse a registry document held in memory.
    pub fn parse(content: &str, format: FileFormat) -> Result<Self, RegistryError> {
        let doc: RawDocument = Config::builder()
            .add_source(File::from_str(content, format))
            .build()?
            .try_deserialize()?;
        Self::from_document(doc)
    }

    fn from_document(doc: RawDocument) -> Result<Self, RegistryError> {
        SchemaVersion::declared(doc.version).check()?;

        let pods = doc
            .pods
            .into_iter()
            .map(|(id, raw)| raw.into_pod(id))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(pods))
    }

    /// Look up a pod.
    pub fn resolve_pod(&self, pod_id: &str) -> Option<&Pod> {
        self.pods.get(pod_id)
    }

    /// Look up a measurement definition within a pod.
    pub fn resolve_measurement(&self, pod_id: &str, key: &str) -> Option<&Measurement> {
        self.resolve_pod(pod_id)?.measurement(key)
    }

    /// Look up a status definition within a pod.
    pub fn resolve_status(&self, pod_id: &str, id: &str) -> Option<&Status> {
        self.resolve_pod(pod_id)?.status(id)
    }

    /// All pods, ordered by id.
    pub fn pods(&self) -> impl Iterator<Item = &Pod> {
        self.pods.values()
    }

    /// All pod ids, ordered.
    pub fn pod_ids(&self) -> impl Iterator<Item = &str> {
        self.pods.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.pods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pods.is_empty()
    }
}

// Document form. Enumerated fields stay as strings so errors can name the pod.

#[derive(Debug, Deserialize)]
struct RawDocument {
    #[serde(default)]
    version: Option<u32>,
    #[serde(default)]
    pods: BTreeMap<String, RawPod>,
}

#[derive(Debug, Deserialize)]
struct RawPod {
    label: Option<String>,
    mode: Option<String>,
    #[serde(default)]
    measurements: BTreeMap<String, RawMeasurement>,
    #[serde(default)]
    statuses: BTreeMap<String, RawStatus>,
}

#[derive(Debug, Deserialize)]
struct RawMeasurement {
    label: Option<String>,
    #[serde(default)]
    unit: String,
    format: Option<String>,
    #[serde(rename = "type")]
    sensor_type: String,
    limits: Option<RawLimits>,
}

#[derive(Debug, Deserialize)]
struct RawLimits {
    critical: Option<RawRange>,
    warning: Option<RawRange>,
}

#[derive(Debug, Deserialize)]
struct RawRange {
    low: f64,
    high: f64,
}

#[derive(Debug, Deserialize)]
struct RawStatus {
    label: Option<String>,
    format: Option<String>,
    #[serde(rename = "type")]
    sensor_type: String,
    #[serde(default)]
    values: Vec<RawStatusValue>,
}

#[derive(Debug, Deserialize)]
struct RawStatusValue {
    value: f64,
    label: String,
}

impl RawPod {
    fn into_pod(self, id: String) -> Result<Pod, RegistryError> {
        let mode = match self.mode.as_deref() {
            None => PodMode::default(),
            Some("ALL_SYSTEMS_ON") => PodMode::AllSystemsOn,
            Some("LEVITATION_ONLY") => PodMode::LevitationOnly,
            Some("LIM_ONLY") => PodMode::LimOnly,
            Some(other) => {
                return Err(RegistryError::UnknownMode {
                    pod_id: id,
                    mode: other.to_string(),
                })
            }
        };

        if let Some(key) = self
            .measurements
            .keys()
            .find(|k| self.statuses.contains_key(k.as_str()))
        {
            return Err(RegistryError::DuplicateId {
                pod_id: id,
                id: key.clone(),
                what: "channel",
            });
        }

        let mut builder = Pod::builder(id.as_str()).mode(mode);
        if let Some(label) = self.label {
            builder = builder.label(label);
        }
        for (key, raw) in self.measurements {
            builder = builder.measurement(raw.into_measurement(&id, key)?);
        }
        for (key, raw) in self.statuses {
            builder = builder.status(raw.into_status(&id, key)?);
        }
        Ok(builder.build())
    }
}

fn sensor_type(
    pod_id: &str,
    what: &'static str,
    id: &str,
    name: &str,
) -> Result<SensorType, RegistryError> {
    name.parse().map_err(|_| RegistryError::UnknownType {
        pod_id: pod_id.to_string(),
        what,
        id: id.to_string(),
        sensor_type: name.to_string(),
    })
}

impl RawMeasurement {
    fn into_measurement(self, pod_id: &str, id: String) -> Result<Measurement, RegistryError> {
        let sensor_type = sensor_type(pod_id, "measurement", &id, &self.sensor_type)?;

        let missing = |missing| RegistryError::MissingLimits {
            pod_id: pod_id.to_string(),
            id: id.clone(),
            missing,
        };
        let limits = self.limits.ok_or_else(|| missing("limits"))?;
        let critical = limits.critical.ok_or_else(|| missing("a critical range"))?;
        let critical = Range::new(critical.low, critical.high);
        let warning = limits.warning.map(|w| Range::new(w.low, w.high));

        let inverted = |what| RegistryError::InvertedRange {
            pod_id: pod_id.to_string(),
            id: id.clone(),
            what,
        };
        if critical.is_inverted() {
            return Err(inverted("critical"));
        }
        let mut limits = Limits::new(critical);
        if let Some(warning) = warning {
            if warning.is_inverted() {
                return Err(inverted("warning"));
            }
            if !warning.is_within(&critical) {
                warn!(
                    pod_id,
                    measurement = %id,
                    "Warning range [{}, {}] is not inside critical range [{}, {}]",
                    warning.low,
                    warning.high,
                    critical.low,
                    critical.high
                );
            }
            limits = limits.with_warning(warning);
        }

        let mut builder = Measurement::builder(id)
            .unit(self.unit)
            .sensor_type(sensor_type)
            .limits(limits);
        if let Some(label) = self.label {
            builder = builder.label(label);
        }
        if let Some(format) = self.format {
            builder = builder.format(format);
        }
        Ok(builder.build())
    }
}

impl RawStatus {
    fn into_status(self, pod_id: &str, id: String) -> Result<Status, RegistryError> {
        let sensor_type = sensor_type(pod_id, "status", &id, &self.sensor_type)?;

        let mut values: Vec<StatusValue> = Vec::with_capacity(self.values.len());
        for raw in self.values {
            if values.iter().any(|v| v.value == raw.value) {
                return Err(RegistryError::DuplicateId {
                    pod_id: pod_id.to_string(),
                    id: format!("{}={}", id, raw.value),
                    what: "status value",
                });
            }
            values.push(StatusValue {
                value: raw.value,
                label: raw.label,
            });
        }

        let mut builder = Status::builder(id).sensor_type(sensor_type);
        if let Some(label) = self.label {
            builder = builder.label(label);
        }
        if let Some(format) = self.format {
            builder = builder.format(format);
        }
        for v in values {
            builder = builder.value(v.value, v.label);
        }
        Ok(builder.build())
    }
}
