//! MQTT adapter: subscribes to the telemetry topics and forwards raw readings.
//!
//! ## Example
//!
//! ```rust,no_run
//! use podwatch_adapters::mqtt::MqttAdapter;
//! use tokio::sync::mpsc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let adapter = MqttAdapter::builder()
//!         .host("localhost")
//!         .port(1883)
//!         .client_id("telemetry-server")
//!         .build();
//!
//!     let (tx, mut rx) = mpsc::channel(1024);
//!     tokio::spawn(adapter.run(tx));
//!
//!     while let Some(raw) = rx.recv().await {
//!         println!("{}/{} = {:?}", raw.pod_id, raw.key, raw.value);
//!     }
//!     Ok(())
//! }
//! ```

use std::time::Duration;

use podwatch_types::RawReading;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS, SubscribeFilter};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::topic::{to_raw_reading, MQTT_FILTERS};
use crate::AdapterError;

/// MQTT topic level separator.
pub const SEPARATOR: char = '/';

/// Receives telemetry from an MQTT broker.
pub struct MqttAdapter {
    client: AsyncClient,
    eventloop: EventLoop,
    reconnect_delay: Duration,
}

impl MqttAdapter {
    /// Create a new builder for configuring the adapter.
    pub fn builder() -> MqttAdapterBuilder {
        MqttAdapterBuilder::default()
    }

    /// Forward readings to `tx` until the channel closes.
    ///
    /// Connection errors are logged and retried after the reconnect delay.
    /// Messages that cannot be decoded are logged and dropped.
    pub async fn run(mut self, tx: mpsc::Sender<RawReading>) -> Result<(), AdapterError> {
        loop {
            let event = match self.eventloop.poll().await {
                Ok(event) => event,
                Err(e) => {
                    if tx.is_closed() {
                        return Err(AdapterError::Closed);
                    }
                    error!(error = %e, "MQTT connection error, retrying");
                    tokio::time::sleep(self.reconnect_delay).await;
                    continue;
                }
            };

            match event {
                Event::Incoming(Packet::ConnAck(_)) => {
                    // Subscriptions do not survive a clean-session reconnect.
                    let filters = MQTT_FILTERS
                        .iter()
                        .map(|f| SubscribeFilter::new(f.to_string(), QoS::AtLeastOnce))
                        .collect::<Vec<_>>();
                    self.client.subscribe_many(filters).await?;
                    info!(filters = ?MQTT_FILTERS, "Subscribed to telemetry topics");
                }
                Event::Incoming(Packet::Publish(publish)) => {
                    match to_raw_reading(&publish.topic, &publish.payload, SEPARATOR) {
                        Ok(raw) => {
                            if tx.send(raw).await.is_err() {
                                debug!("Pipeline channel closed, stopping MQTT adapter");
                                return Err(AdapterError::Closed);
                            }
                        }
                        Err(e) => warn!(topic = %publish.topic, error = %e, "Dropping message"),
                    }
                }
                _ => {}
            }
        }
    }
}

impl std::fmt::Debug for MqttAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MqttAdapter")
            .field("reconnect_delay", &self.reconnect_delay)
            .finish_non_exhaustive()
    }
}

/// Builder for MqttAdapter.
#[derive(Debug, Default)]
pub struct MqttAdapterBuilder {
    host: Option<String>,
    port: Option<u16>,
    client_id: Option<String>,
    credentials: Option<(String, String)>,
    keep_alive: Option<Duration>,
    reconnect_delay: Option<Duration>,
    capacity: Option<usize>,
}

impl MqttAdapterBuilder {
    /// Set the broker host (default: "localhost").
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Set the broker port (default: 1883).
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Set the client id (default: "podwatch").
    pub fn client_id(mut self, id: impl Into<String>) -> Self {
        self.client_id = Some(id.into());
        self
    }

    /// Set username and password.
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some((username.into(), password.into()));
        self
    }

    /// Set the keep-alive interval (default: 5 seconds).
    pub fn keep_alive(mut self, keep_alive: Duration) -> Self {
        self.keep_alive = Some(keep_alive);
        self
    }

    /// Set the delay between reconnect attempts (default: 1 second).
    pub fn reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = Some(delay);
        self
    }

    /// Set the client request queue capacity (default: 10).
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }

    fn options(&self) -> MqttOptions {
        let mut options = MqttOptions::new(
            self.client_id.as_deref().unwrap_or("podwatch"),
            self.host.as_deref().unwrap_or("localhost"),
            self.port.unwrap_or(1883),
        );
        options.set_keep_alive(self.keep_alive.unwrap_or(Duration::from_secs(5)));
        if let Some((username, password)) = &self.credentials {
            options.set_credentials(username.as_str(), password.as_str());
        }
        options
    }

    /// Build the adapter. No connection is made until [`MqttAdapter::run`].
    pub fn build(self) -> MqttAdapter {
        let (client, eventloop) = AsyncClient::new(self.options(), self.capacity.unwrap_or(10));
        MqttAdapter {
            client,
            eventloop,
            reconnect_delay: self.reconnect_delay.unwrap_or(Duration::from_secs(1)),
        }
    }
}
