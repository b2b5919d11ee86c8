//! NATS adapter: the same telemetry topics, carried as NATS subjects.
//!
//! ## Example
//!
//! ```rust,no_run
//! use podwatch_adapters::nats::NatsAdapter;
//! use tokio::sync::mpsc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let adapter = NatsAdapter::builder()
//!         .url("nats://localhost:4222")
//!         .build()
//!         .await?;
//!
//!     let (tx, mut rx) = mpsc::channel(1024);
//!     tokio::spawn(adapter.run(tx));
//!
//!     while let Some(raw) = rx.recv().await {
//!         println!("{}/{}", raw.pod_id, raw.key);
//!     }
//!     Ok(())
//! }
//! ```

use futures_util::stream::{self, StreamExt};
use podwatch_types::RawReading;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::topic::{to_raw_reading, NATS_SUBJECTS};
use crate::AdapterError;

/// NATS subject token separator.
pub const SEPARATOR: char = '.';

/// Receives telemetry from a NATS server.
pub struct NatsAdapter {
    client: async_nats::Client,
}

impl NatsAdapter {
    /// Create a new builder for configuring the adapter.
    pub fn builder() -> NatsAdapterBuilder {
        NatsAdapterBuilder::default()
    }

    /// Forward readings to `tx` until the channel or the connection closes.
    pub async fn run(self, tx: mpsc::Sender<RawReading>) -> Result<(), AdapterError> {
        let mut subscribers = Vec::with_capacity(NATS_SUBJECTS.len());
        for subject in NATS_SUBJECTS {
            let subscriber = self
                .client
                .subscribe(subject)
                .await
                .map_err(|e| AdapterError::Subscribe(e.to_string()))?;
            subscribers.push(subscriber);
        }
        info!(subjects = ?NATS_SUBJECTS, "Subscribed to telemetry subjects");

        let mut messages = stream::select_all(subscribers);
        while let Some(message) = messages.next().await {
            let subject = message.subject.as_str();
            match to_raw_reading(subject, &message.payload, SEPARATOR) {
                Ok(raw) => {
                    if tx.send(raw).await.is_err() {
                        debug!("Pipeline channel closed, stopping NATS adapter");
                        return Err(AdapterError::Closed);
                    }
                }
                Err(e) => warn!(subject, error = %e, "Dropping message"),
            }
        }

        Err(AdapterError::Connection(
            "NATS subscription stream ended".to_string(),
        ))
    }
}

impl std::fmt::Debug for NatsAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NatsAdapter").finish()
    }
}

/// Builder for NatsAdapter.
#[derive(Debug, Default)]
pub struct NatsAdapterBuilder {
    url: Option<String>,
    credentials: Option<String>,
}

impl NatsAdapterBuilder {
    /// Set the NATS server URL (default: "nats://localhost:4222").
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Set the path to a credentials file for authentication.
    pub fn credentials_file(mut self, path: impl Into<String>) -> Self {
        self.credentials = Some(path.into());
        self
    }

    /// Connect and build the adapter.
    pub async fn build(self) -> Result<NatsAdapter, AdapterError> {
        let url = self
            .url
            .unwrap_or_else(|| "nats://localhost:4222".to_string());

        let client = match self.credentials {
            Some(creds) => async_nats::ConnectOptions::new()
                .credentials_file(&creds)
                .await
                .map_err(|e| AdapterError::Connection(e.to_string()))?
                .connect(&url)
                .await
                .map_err(|e| AdapterError::Connection(e.to_string()))?,
            None => async_nats::connect(&url)
                .await
                .map_err(|e| AdapterError::Connection(e.to_string()))?,
        };

        Ok(NatsAdapter { client })
    }
}
