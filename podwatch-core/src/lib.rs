//! # podwatch-core
//!
//! Ingestion pipeline for hyperloop pod telemetry.
//!
//! Every inbound reading is validated against a read-only [`Registry`], pushed
//! to live subscribers, checked against its safety limits and appended to
//! durable storage. A failure in one downstream stage never stops the others.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use podwatch_core::{BroadcastPublisher, FaultLog, IngestionPipeline, Registry, SubscriptionFilter};
//! use podwatch_types::{Nanoseconds, RawReading};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = Arc::new(Registry::load("config/pods.yaml")?);
//!     let publisher = Arc::new(BroadcastPublisher::default());
//!     let faults = Arc::new(FaultLog::default());
//!
//!     let pipeline = IngestionPipeline::builder(registry)
//!         .publisher(publisher.clone())
//!         .fault_sink(faults.clone())
//!         .build();
//!
//!     // Watch one pod's velocity
//!     let mut sub = publisher.subscribe(SubscriptionFilter::pod("pod_1").key("velocity"));
//!
//!     let raw = RawReading::measurement("pod_1", "velocity", 95.0, Nanoseconds::now());
//!     let report = pipeline.ingest(&raw).await?;
//!     println!("fault: {:?}", report.fault_event);
//!     println!("live: {:?}", sub.recv().await?);
//!     Ok(())
//! }
//! ```
//!
//! ## Stages
//!
//! - **Validation**: unknown pods, keys and status values never reach a sink
//! - **Realtime publish**: non-blocking broadcast, issued before the durable write
//! - **Fault tracking**: per-measurement state machine, one event per transition
//! - **Durable write**: append-only, failures logged and reported

mod error;
mod fault_log;
mod faults;
mod limits;
mod pipeline;
mod publisher;
mod registry;
mod sink;
mod stats;
mod store;
mod validator;
mod writer;

pub use error::{ErrorKind, RegistryError, SinkError, ValidationError};
pub use fault_log::{FaultLog, FaultQuery, DEFAULT_MAX_HISTORY};
pub use faults::{FaultKey, FaultState, FaultTracker};
pub use limits::evaluate;
pub use pipeline::{IngestReport, IngestionPipeline, IngestionPipelineBuilder, StageOutcome};
pub use publisher::{
    BroadcastPublisher, Subscription, SubscriptionError, SubscriptionFilter, DEFAULT_CAPACITY,
};
pub use registry::Registry;
pub use sink::{
    DurableSink, FaultSink, HistoricalQuery, HistoricalReading, Point, RealtimePublisher,
    KEY_TAG, POD_TAG, SERIES, VALUE_FIELD,
};
pub use stats::{PipelineStats, ReportingHandle, Stage, StatsSnapshot};
pub use store::{JsonLinesStore, MemoryStore, DEFAULT_MAX_POINTS};
pub use validator::{ValidatedMeasurement, ValidatedStatus, Validator};
pub use writer::DurableWriter;

// Registry documents can be parsed from memory in any of these formats.
pub use config::FileFormat;

// Re-export types for convenience
pub use podwatch_types::{
    BreachLevel, FaultEvent, FaultEventKind, FaultLevel, Measurement, Nanoseconds, Pod, PodMode,
    RawReading, RawValue, Reading, ReadingKind, Status, TimeRange,
};
