//! Runtime settings for the podwatch server.
//!
//! Settings are layered: built-in defaults, then an optional file, then
//! `PODWATCH_`-prefixed environment variables. Nested keys use a double
//! underscore, e.g. `PODWATCH_STORE__PATH=/var/lib/podwatch/points.ndjson`.
//!
//! ```toml
//! registry = "config/pods.yaml"
//!
//! [log]
//! level = "info"
//! format = "plain"
//!
//! [input]
//! kind = "tcp"
//! address = "0.0.0.0:7070"
//!
//! [store]
//! kind = "jsonl"
//! path = "data/points.ndjson"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "PODWATCH";

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Path of the pod registry document.
    pub registry: PathBuf,
    pub log: LogSettings,
    pub input: InputSettings,
    pub ingest: IngestSettings,
    pub store: StoreSettings,
    pub realtime: RealtimeSettings,
    pub stats: StatsSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            registry: PathBuf::from("config/pods.yaml"),
            log: LogSettings::default(),
            input: InputSettings::default(),
            ingest: IngestSettings::default(),
            store: StoreSettings::default(),
            realtime: RealtimeSettings::default(),
            stats: StatsSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings from an optional file plus the environment.
    ///
    /// A path that was given explicitly must exist.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }
        let config = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to read settings")?;
        config
            .try_deserialize()
            .context("Invalid settings")
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Plain,
    Json,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct LogSettings {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Plain,
        }
    }
}

/// Where raw readings come from.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum InputKind {
    /// Newline-delimited JSON on standard input.
    #[default]
    Stdin,
    /// Newline-delimited JSON from TCP clients.
    Tcp,
    /// Newline-delimited JSON read from a file.
    File,
    /// MQTT broker (requires the `mqtt` feature).
    Mqtt,
    /// NATS server (requires the `nats` feature).
    Nats,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct InputSettings {
    pub kind: InputKind,
    /// Listen address for `tcp`, broker address for `mqtt` and `nats`.
    pub address: String,
    /// Input file for `file`.
    pub path: Option<PathBuf>,
    /// MQTT client id.
    pub client_id: String,
    /// Inbound queue depth between the transport and the pipeline.
    pub buffer: usize,
}

impl Default for InputSettings {
    fn default() -> Self {
        Self {
            kind: InputKind::Stdin,
            address: "127.0.0.1:7070".to_string(),
            path: None,
            client_id: "podwatch".to_string(),
            buffer: 1024,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct IngestSettings {
    /// Ingestion workers. Readings for one (pod, key) always go to the same worker.
    pub workers: usize,
    /// Readings queued per worker before the server stops pulling input.
    pub queue: usize,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            workers: 4,
            queue: 256,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    #[default]
    Memory,
    Jsonl,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct StoreSettings {
    pub kind: StoreKind,
    /// Point file for `jsonl`.
    pub path: PathBuf,
    /// Points retained by the `memory` store; the oldest go first.
    pub max_points: usize,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            kind: StoreKind::Memory,
            path: PathBuf::from("data/points.ndjson"),
            max_points: podwatch_core::DEFAULT_MAX_POINTS,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct RealtimeSettings {
    /// Readings buffered per subscriber before it lags.
    pub capacity: usize,
    /// Fault events kept for history queries.
    pub fault_history: usize,
}

impl Default for RealtimeSettings {
    fn default() -> Self {
        Self {
            capacity: podwatch_core::DEFAULT_CAPACITY,
            fault_history: podwatch_core::DEFAULT_MAX_HISTORY,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct StatsSettings {
    /// Seconds between stats log lines. Zero disables reporting.
    pub interval_secs: u64,
}

impl Default for StatsSettings {
    fn default() -> Self {
        Self { interval_secs: 30 }
    }
}

impl StatsSettings {
    pub fn interval(&self) -> Option<Duration> {
        (self.interval_secs > 0).then(|| Duration::from_secs(self.interval_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_file() {
        let settings = Settings::load(None).unwrap();
        assert_eq!(settings.registry, PathBuf::from("config/pods.yaml"));
        assert_eq!(settings.input.kind, InputKind::Stdin);
        assert_eq!(settings.store.kind, StoreKind::Memory);
        assert_eq!(settings.stats.interval(), Some(Duration::from_secs(30)));
        assert_eq!(settings.ingest, IngestSettings::default());
        assert_eq!(settings.store.max_points, podwatch_core::DEFAULT_MAX_POINTS);
    }

    #[test]
    fn file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("podwatch.toml");
        std::fs::write(
            &path,
            r#"
registry = "pods.yaml"

[log]
format = "json"

[input]
kind = "tcp"
address = "0.0.0.0:9000"

[ingest]
workers = 2
queue = 8

[store]
kind = "jsonl"
path = "points.ndjson"
max_points = 500

[stats]
interval_secs = 0
"#,
        )
        .unwrap();

        let settings = Settings::load(Some(&path)).unwrap();
        assert_eq!(settings.registry, PathBuf::from("pods.yaml"));
        assert_eq!(settings.log.format, LogFormat::Json);
        assert_eq!(settings.log.level, "info");
        assert_eq!(settings.input.kind, InputKind::Tcp);
        assert_eq!(settings.input.address, "0.0.0.0:9000");
        assert_eq!(settings.input.buffer, 1024);
        assert_eq!(settings.store.kind, StoreKind::Jsonl);
        assert_eq!(settings.store.max_points, 500);
        assert_eq!(settings.ingest.workers, 2);
        assert_eq!(settings.ingest.queue, 8);
        assert_eq!(
            settings.realtime.fault_history,
            podwatch_core::DEFAULT_MAX_HISTORY
        );
        assert_eq!(settings.stats.interval(), None);
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        assert!(Settings::load(Some(Path::new("/nonexistent/podwatch.toml"))).is_err());
    }
}
