//! Channel-based reading source.
//!
//! Receives raw readings pushed through a tokio mpsc channel. Broker
//! adapters and in-process producers feed the pipeline this way.

use async_trait::async_trait;
use podwatch_core::RawReading;
use tokio::sync::mpsc;

use super::ReadingSource;

/// A source fed through an mpsc channel.
#[derive(Debug)]
pub struct ChannelSource {
    receiver: mpsc::Receiver<RawReading>,
    description: String,
}

impl ChannelSource {
    /// Wrap an existing receiver.
    ///
    /// `source_description` names the producer, e.g. "mqtt://localhost:1883".
    pub fn new(receiver: mpsc::Receiver<RawReading>, source_description: &str) -> Self {
        Self {
            receiver,
            description: format!("channel: {}", source_description),
        }
    }

    /// Create a channel pair. The source ends once every sender is dropped.
    pub fn create(source_description: &str, buffer: usize) -> (mpsc::Sender<RawReading>, Self) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (tx, Self::new(rx, source_description))
    }
}

#[async_trait]
impl ReadingSource for ChannelSource {
    async fn recv(&mut self) -> Option<RawReading> {
        self.receiver.recv().await
    }

    fn description(&self) -> &str {
        &self.description
    }
}
