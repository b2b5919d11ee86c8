//! Registry definitions: pods, their measurements and their statuses.

use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::fmt;
use core::str::FromStr;

/// A closed numeric interval `[low, high]`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Range {
    pub low: f64,
    pub high: f64,
}

impl Range {
    /// Create a new range.
    pub const fn new(low: f64, high: f64) -> Self {
        Self { low, high }
    }

    /// Check whether a value lies inside the range, bounds included.
    pub fn contains(&self, value: f64) -> bool {
        value >= self.low && value <= self.high
    }

    /// Check whether this range lies entirely inside `outer`.
    pub fn is_within(&self, outer: &Range) -> bool {
        self.low >= outer.low && self.high <= outer.high
    }

    /// A range is inverted when its low bound exceeds its high bound.
    pub fn is_inverted(&self) -> bool {
        self.low > self.high
    }
}

/// Safety limits of a measurement.
///
/// The critical range is mandatory. The warning range, when present, is
/// expected to sit inside the critical range; that expectation is not
/// enforced here.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Limits {
    pub critical: Range,
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub warning: Option<Range>,
}

impl Limits {
    /// Create limits with only a critical range.
    pub const fn new(critical: Range) -> Self {
        Self {
            critical,
            warning: None,
        }
    }

    /// Attach a warning range.
    pub fn with_warning(mut self, warning: Range) -> Self {
        self.warning = Some(warning);
        self
    }
}

/// Operating mode of a pod.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum PodMode {
    #[default]
    AllSystemsOn,
    LevitationOnly,
    LimOnly,
}

/// The kind of sensor a measurement or status comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum SensorType {
    Temperature,
    Acceleration,
    Pressure,
    HallEffect,
    Displacement,
    Velocity,
    Status,
    Magnetism,
    Keyence,
    Resistance,
    Levitation,
    #[cfg_attr(feature = "serde", serde(rename = "binary-status"))]
    BinaryStatus,
}

impl SensorType {
    /// Every sensor type a registry document may name.
    pub const ALL: [SensorType; 12] = [
        SensorType::Temperature,
        SensorType::Acceleration,
        SensorType::Pressure,
        SensorType::HallEffect,
        SensorType::Displacement,
        SensorType::Velocity,
        SensorType::Status,
        SensorType::Magnetism,
        SensorType::Keyence,
        SensorType::Resistance,
        SensorType::Levitation,
        SensorType::BinaryStatus,
    ];

    /// The name used for this type in registry documents.
    pub fn as_str(&self) -> &'static str {
        match self {
            SensorType::Temperature => "temperature",
            SensorType::Acceleration => "acceleration",
            SensorType::Pressure => "pressure",
            SensorType::HallEffect => "hall_effect",
            SensorType::Displacement => "displacement",
            SensorType::Velocity => "velocity",
            SensorType::Status => "status",
            SensorType::Magnetism => "magnetism",
            SensorType::Keyence => "keyence",
            SensorType::Resistance => "resistance",
            SensorType::Levitation => "levitation",
            SensorType::BinaryStatus => "binary-status",
        }
    }
}

impl fmt::Display for SensorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a sensor type name is not recognised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownSensorType(pub String);

impl fmt::Display for UnknownSensorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown sensor type \"{}\"", self.0)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for UnknownSensorType {}

impl FromStr for SensorType {
    type Err = UnknownSensorType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SensorType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownSensorType(s.to_string()))
    }
}

/// A continuously-valued sensor channel with safety limits.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Measurement {
    pub id: String,
    pub label: String,
    pub unit: String,
    /// Display format hint, e.g. "float" or "integer".
    pub format: String,
    #[cfg_attr(feature = "serde", serde(rename = "type"))]
    pub sensor_type: SensorType,
    pub limits: Limits,
}

impl Measurement {
    /// Create a builder for a measurement with the given id.
    pub fn builder(id: impl Into<String>) -> MeasurementBuilder {
        MeasurementBuilder::new(id)
    }
}

/// One permitted value of a status channel.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StatusValue {
    pub value: f64,
    pub label: String,
}

/// A discrete-valued channel restricted to an enumerated set.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Status {
    pub id: String,
    pub label: String,
    pub format: String,
    #[cfg_attr(feature = "serde", serde(rename = "type"))]
    pub sensor_type: SensorType,
    pub values: Vec<StatusValue>,
}

impl Status {
    /// Create a builder for a status with the given id.
    pub fn builder(id: impl Into<String>) -> StatusBuilder {
        StatusBuilder::new(id)
    }

    /// Look up the enumerant matching a value.
    pub fn enumerant(&self, value: f64) -> Option<&StatusValue> {
        self.values.iter().find(|v| v.value == value)
    }

    /// Check whether a value is one of the permitted enumerants.
    pub fn permits(&self, value: f64) -> bool {
        self.enumerant(value).is_some()
    }
}

/// A hyperloop pod: the top-level telemetry namespace.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Pod {
    pub id: String,
    pub label: String,
    pub mode: PodMode,
    pub measurements: BTreeMap<String, Measurement>,
    pub statuses: BTreeMap<String, Status>,
}

impl Pod {
    /// Create a builder for a pod with the given id.
    pub fn builder(id: impl Into<String>) -> PodBuilder {
        PodBuilder::new(id)
    }

    /// Get a measurement definition by id.
    pub fn measurement(&self, key: &str) -> Option<&Measurement> {
        self.measurements.get(key)
    }

    /// Get a status definition by id.
    pub fn status(&self, id: &str) -> Option<&Status> {
        self.statuses.get(id)
    }
}

// ============================================================================
// Builders
// ============================================================================

/// Builder for `Pod`.
#[derive(Debug)]
pub struct PodBuilder {
    id: String,
    label: Option<String>,
    mode: PodMode,
    measurements: BTreeMap<String, Measurement>,
    statuses: BTreeMap<String, Status>,
}

impl PodBuilder {
    /// Create a new builder.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: None,
            mode: PodMode::default(),
            measurements: BTreeMap::new(),
            statuses: BTreeMap::new(),
        }
    }

    /// Set the display label. Defaults to the id.
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Set the operating mode.
    pub fn mode(mut self, mode: PodMode) -> Self {
        self.mode = mode;
        self
    }

    /// Add a measurement.
    pub fn measurement(mut self, measurement: Measurement) -> Self {
        self.measurements.insert(measurement.id.clone(), measurement);
        self
    }

    /// Add a status.
    pub fn status(mut self, status: Status) -> Self {
        self.statuses.insert(status.id.clone(), status);
        self
    }

    /// Build the pod.
    pub fn build(self) -> Pod {
        Pod {
            label: self.label.unwrap_or_else(|| self.id.clone()),
            id: self.id,
            mode: self.mode,
            measurements: self.measurements,
            statuses: self.statuses,
        }
    }
}

/// Builder for `Measurement`.
#[derive(Debug)]
pub struct MeasurementBuilder {
    id: String,
    label: Option<String>,
    unit: String,
    format: String,
    sensor_type: Option<SensorType>,
    limits: Limits,
}

impl MeasurementBuilder {
    /// Create a new builder. Limits default to an unbounded critical range.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: None,
            unit: String::new(),
            format: "float".to_string(),
            sensor_type: None,
            limits: Limits::new(Range::new(f64::NEG_INFINITY, f64::INFINITY)),
        }
    }

    /// Set the display label. Defaults to the id.
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Set the physical unit.
    pub fn unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }

    /// Set the display format hint.
    pub fn format(mut self, format: impl Into<String>) -> Self {
        self.format = format.into();
        self
    }

    /// Set the sensor type. Defaults to the type named like the id, or velocity.
    pub fn sensor_type(mut self, sensor_type: SensorType) -> Self {
        self.sensor_type = Some(sensor_type);
        self
    }

    /// Set the limits.
    pub fn limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Build the measurement.
    pub fn build(self) -> Measurement {
        let sensor_type = self
            .sensor_type
            .or_else(|| self.id.parse().ok())
            .unwrap_or(SensorType::Velocity);
        Measurement {
            label: self.label.unwrap_or_else(|| self.id.clone()),
            id: self.id,
            unit: self.unit,
            format: self.format,
            sensor_type,
            limits: self.limits,
        }
    }
}

/// Builder for `Status`.
#[derive(Debug)]
pub struct StatusBuilder {
    id: String,
    label: Option<String>,
    format: String,
    sensor_type: SensorType,
    values: Vec<StatusValue>,
}

impl StatusBuilder {
    /// Create a new builder.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: None,
            format: "enum".to_string(),
            sensor_type: SensorType::Status,
            values: Vec::new(),
        }
    }

    /// Set the display label. Defaults to the id.
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Set the display format hint.
    pub fn format(mut self, format: impl Into<String>) -> Self {
        self.format = format.into();
        self
    }

    /// Set the sensor type.
    pub fn sensor_type(mut self, sensor_type: SensorType) -> Self {
        self.sensor_type = sensor_type;
        self
    }

    /// Append a permitted value.
    pub fn value(mut self, value: f64, label: impl Into<String>) -> Self {
        self.values.push(StatusValue {
            value,
            label: label.into(),
        });
        self
    }

    /// Build the status.
    pub fn build(self) -> Status {
        Status {
            label: self.label.unwrap_or_else(|| self.id.clone()),
            id: self.id,
            format: self.format,
            sensor_type: self.sensor_type,
            values: self.values,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_status() -> Status {
        Status::builder("state")
            .label("State")
            .value(0.0, "IDLE")
            .value(1.0, "READY")
            .value(2.0, "RUNNING")
            .build()
    }

    #[test]
    fn range_contains_bounds() {
        let r = Range::new(0.0, 100.0);
        assert!(r.contains(0.0));
        assert!(r.contains(100.0));
        assert!(!r.contains(-0.1));
        assert!(!r.contains(100.1));
    }

    #[test]
    fn range_within_and_inverted() {
        let critical = Range::new(0.0, 100.0);
        assert!(Range::new(10.0, 90.0).is_within(&critical));
        assert!(critical.is_within(&critical));
        assert!(!Range::new(-5.0, 90.0).is_within(&critical));
        assert!(Range::new(5.0, 1.0).is_inverted());
        assert!(!critical.is_inverted());
    }

    #[test]
    fn sensor_type_round_trips_names() {
        for t in SensorType::ALL {
            assert_eq!(t.as_str().parse::<SensorType>().unwrap(), t);
        }
        assert_eq!(
            "binary-status".parse::<SensorType>().unwrap(),
            SensorType::BinaryStatus
        );
        assert_eq!(
            "warp".parse::<SensorType>(),
            Err(UnknownSensorType("warp".to_string()))
        );
    }

    #[test]
    fn measurement_builder_defaults() {
        let m = Measurement::builder("velocity").build();
        assert_eq!(m.label, "velocity");
        assert_eq!(m.format, "float");
        assert_eq!(m.sensor_type, SensorType::Velocity);
        assert!(m.limits.warning.is_none());
        assert!(m.limits.critical.contains(f64::MAX));
    }

    #[test]
    fn measurement_builder_infers_type_from_id() {
        let m = Measurement::builder("temperature").build();
        assert_eq!(m.sensor_type, SensorType::Temperature);

        let m = Measurement::builder("lim_temp_1")
            .sensor_type(SensorType::Temperature)
            .build();
        assert_eq!(m.sensor_type, SensorType::Temperature);
    }

    #[test]
    fn status_permits_only_enumerants() {
        let status = state_status();
        assert!(status.permits(1.0));
        assert_eq!(status.enumerant(2.0).unwrap().label, "RUNNING");
        assert!(!status.permits(9.0));
        assert!(!status.permits(0.5));
    }

    #[test]
    fn pod_builder_indexes_by_id() {
        let pod = Pod::builder("pod_1")
            .label("Pod 1")
            .mode(PodMode::LevitationOnly)
            .measurement(Measurement::builder("velocity").build())
            .status(state_status())
            .build();

        assert_eq!(pod.label, "Pod 1");
        assert_eq!(pod.mode, PodMode::LevitationOnly);
        assert!(pod.measurement("velocity").is_some());
        assert!(pod.status("state").is_some());
        assert!(pod.measurement("state").is_none());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn serde_names_match_registry_documents() {
        let json = serde_json::to_value(PodMode::LimOnly).unwrap();
        assert_eq!(json, "LIM_ONLY");

        let json = serde_json::to_value(SensorType::HallEffect).unwrap();
        assert_eq!(json, "hall_effect");

        let m = Measurement::builder("keyence")
            .limits(Limits::new(Range::new(0.0, 16.0)))
            .build();
        let json = serde_json::to_value(&m).unwrap();
        assert_eq!(json["type"], "keyence");
        assert!(json["limits"].get("warning").is_none());
    }
}
