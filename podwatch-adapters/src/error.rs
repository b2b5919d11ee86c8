//! Error types for adapters.

use thiserror::Error;

/// Errors that can occur while receiving telemetry from a transport.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// Connection to the broker failed or was lost.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// The broker refused a subscription.
    #[error("Subscription failed: {0}")]
    Subscribe(String),

    /// A topic did not follow the telemetry naming scheme.
    #[error("Unrecognised topic \"{0}\"")]
    InvalidTopic(String),

    /// A payload could not be decoded.
    #[error("Invalid payload on \"{topic}\": {reason}")]
    InvalidPayload { topic: String, reason: String },

    /// The receiving side of the pipeline has gone away.
    #[error("Pipeline channel closed")]
    Closed,
}

#[cfg(feature = "mqtt")]
impl From<rumqttc::ClientError> for AdapterError {
    fn from(err: rumqttc::ClientError) -> Self {
        AdapterError::Subscribe(err.to_string())
    }
}

#[cfg(feature = "mqtt")]
impl From<rumqttc::ConnectionError> for AdapterError {
    fn from(err: rumqttc::ConnectionError) -> Self {
        AdapterError::Connection(err.to_string())
    }
}
