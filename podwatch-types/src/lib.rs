//! # podwatch-types
//!
//! Core types for pod telemetry. This crate defines the shared vocabulary of
//! the podwatch workspace: the registry definitions a pod is described by,
//! the readings that flow through ingestion, and the fault events raised
//! when a reading breaches its limits.
//!
//! ## Design Goals
//!
//! - **Zero required dependencies**: Core types work without any serialization framework
//! - **Optional serialization**: Enable the `serde` feature to read registry documents
//!   and emit readings or faults as JSON
//! - **Transport agnostic**: Readings carry no knowledge of MQTT, TCP or files
//! - **Versioned schema**: Registry documents declare the schema version they target
//!
//! ## Features
//!
//! - `std` (default): Standard library support
//! - `serde`: JSON/YAML/etc. serialization via serde
//!
//! ## Example
//!
//! ```rust
//! use podwatch_types::{Limits, Measurement, Range, Reading, Nanoseconds};
//!
//! let velocity = Measurement::builder("velocity")
//!     .label("Velocity")
//!     .unit("m/s")
//!     .limits(Limits::new(Range::new(0.0, 100.0)).with_warning(Range::new(10.0, 90.0)))
//!     .build();
//!
//! let reading = Reading::measurement("pod_1", "velocity", 42.0, Nanoseconds::from_millis(1));
//! assert!(velocity.limits.critical.contains(reading.value));
//! ```
//!
//! ## Schema Version
//!
//! The current registry schema version is **1**.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod fault;
mod pod;
mod reading;
mod timestamp;
mod version;

pub use fault::*;
pub use pod::*;
pub use reading::*;
pub use timestamp::*;
pub use version::*;

/// Current registry schema version.
///
/// Increment this when making breaking changes to the registry document format.
pub const SCHEMA_VERSION: u32 = 1;
