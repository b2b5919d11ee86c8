//! # podwatch
//!
//! Telemetry ingestion server for a hyperloop pod.
//!
//! Raw readings arrive from a transport, are validated against the pod
//! registry and then fan out to live subscribers, the fault tracker and
//! durable storage. The pipeline itself lives in [`podwatch_core`]; this
//! crate supplies the inbound sources, settings and the server loop.
//!
//! ```text
//!  stdin | tcp | file | mqtt | nats
//!              │
//!              ▼
//!      ┌───────────────┐     ┌────────────────────┐
//!      │ ReadingSource │────▶│ IngestionPipeline  │
//!      └───────────────┘     │  validate          │
//!                            │  publish ──────────┼──▶ live subscribers
//!                            │  track faults ─────┼──▶ fault log
//!                            │  write ────────────┼──▶ point store
//!                            └────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ### As a CLI tool
//!
//! ```bash
//! # Validate a registry
//! podwatch check config/pods.yaml
//!
//! # Ingest NDJSON from TCP clients, as configured in podwatch.toml
//! podwatch --config config/podwatch.toml run
//!
//! # Read back stored velocity readings
//! podwatch history pod_1 velocity --from-ms 1700000000000
//! ```
//!
//! ### As a library
//!
//! ```no_run
//! use std::sync::Arc;
//! use podwatch::{ChannelSource, Server, Settings};
//! use podwatch_core::{MemoryStore, Nanoseconds, RawReading, Registry};
//!
//! # tokio_test::block_on(async {
//! let registry = Arc::new(Registry::load("config/pods.yaml").unwrap());
//! let server = Server::new(registry, Arc::new(MemoryStore::new()), &Settings::default());
//!
//! let (tx, mut source) = ChannelSource::create("in-process", 16);
//! tx.send(RawReading::measurement("pod_1", "velocity", 42.0, Nanoseconds::now()))
//!     .await
//!     .unwrap();
//! drop(tx);
//!
//! let stats = server.run(&mut source, std::future::pending::<()>()).await;
//! println!("{} measurements", stats.measurements);
//! # });
//! ```

pub mod server;
pub mod settings;
pub mod source;

pub use server::Server;
pub use settings::Settings;
pub use source::{ChannelSource, FileSource, ReadingSource, StreamSource, TcpSource};
