//! # podwatch-adapters
//!
//! Transport adapters that turn broker messages into [`RawReading`]s for the
//! ingestion pipeline.
//!
//! ## Supported Transports
//!
//! - **MQTT** (`mqtt` feature) - subscribes to `hyped/+/measurement/+`,
//!   `hyped/+/status/+` and `hyped/+/state`
//! - **NATS** (`nats` feature) - the same topics as NATS subjects
//!
//! Topic parsing and payload decoding in [`topic`] are always available.
//!
//! ## Quick Start (MQTT)
//!
//! ```rust,ignore
//! use podwatch_adapters::mqtt::MqttAdapter;
//! use tokio::sync::mpsc;
//!
//! let (tx, rx) = mpsc::channel(1024);
//! let adapter = MqttAdapter::builder().host("localhost").build();
//! tokio::spawn(adapter.run(tx));
//! ```

pub mod error;
pub mod topic;

#[cfg(feature = "mqtt")]
pub mod mqtt;

#[cfg(feature = "nats")]
pub mod nats;

pub use error::AdapterError;

// Re-export types for convenience
pub use podwatch_types::{RawReading, RawValue, ReadingKind};
