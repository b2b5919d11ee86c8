//! Inbound sources of raw readings.
//!
//! Every transport ends up as a [`ReadingSource`]: the server pulls raw
//! readings from it one at a time and hands each to the pipeline.

mod channel;
mod file;
mod stream;
mod tcp;

pub use channel::ChannelSource;
pub use file::FileSource;
pub use stream::StreamSource;
pub use tcp::TcpSource;

use std::fmt::Debug;

use async_trait::async_trait;
use podwatch_core::RawReading;

/// A stream of raw readings from some transport.
///
/// # Example
///
/// ```
/// use podwatch::{ChannelSource, ReadingSource};
/// use podwatch_core::{Nanoseconds, RawReading};
///
/// # tokio_test::block_on(async {
/// let (tx, mut source) = ChannelSource::create("test", 16);
/// tx.send(RawReading::measurement("pod_1", "velocity", 1.0, Nanoseconds(1)))
///     .await
///     .unwrap();
/// assert_eq!(source.recv().await.unwrap().key, "velocity");
/// # });
/// ```
#[async_trait]
pub trait ReadingSource: Send + Debug {
    /// Wait for the next raw reading. `None` once the source is exhausted.
    async fn recv(&mut self) -> Option<RawReading>;

    /// Human-readable description of the source, for logs.
    fn description(&self) -> &str;
}
