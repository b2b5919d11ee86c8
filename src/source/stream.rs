//! Stream-based reading source.
//!
//! Reads newline-delimited JSON readings from any async byte stream:
//! stdin, a TCP connection, a file, or a pipe.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use podwatch_core::RawReading;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::ReadingSource;

/// A source that parses one raw reading per line of an async reader.
///
/// A background task does the reading. Lines that are not valid JSON are
/// logged and skipped; the stream keeps going.
///
/// # Example
///
/// ```
/// use std::io::Cursor;
/// use podwatch::{ReadingSource, StreamSource};
///
/// # tokio_test::block_on(async {
/// let data = br#"{"podId":"pod_1","key":"velocity","value":1.5,"timestampNanos":"1"}"#;
/// let mut source = StreamSource::spawn(Cursor::new(data.to_vec()), "example", 16);
/// assert_eq!(source.recv().await.unwrap().pod_id, "pod_1");
/// # });
/// ```
#[derive(Debug)]
pub struct StreamSource {
    receiver: mpsc::Receiver<RawReading>,
    description: String,
    last_error: Arc<Mutex<Option<String>>>,
}

impl StreamSource {
    /// Spawn a background task reading from `reader`.
    pub fn spawn<R>(reader: R, description: &str, buffer: usize) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        let last_error = Arc::new(Mutex::new(None));
        let description = format!("stream: {}", description);

        tokio::spawn(forward_lines(
            reader,
            tx,
            description.clone(),
            last_error.clone(),
        ));

        Self {
            receiver: rx,
            description,
            last_error,
        }
    }

    /// Get the last read or parse error, if any.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().clone()
    }
}

#[async_trait]
impl ReadingSource for StreamSource {
    async fn recv(&mut self) -> Option<RawReading> {
        self.receiver.recv().await
    }

    fn description(&self) -> &str {
        &self.description
    }
}

/// Parse NDJSON lines from `reader` into `tx` until EOF or the receiver drops.
pub(crate) async fn forward_lines<R>(
    reader: R,
    tx: mpsc::Sender<RawReading>,
    origin: String,
    last_error: Arc<Mutex<Option<String>>>,
) where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut line = String::new();
    let mut line_no = 0u64;

    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => {
                debug!(origin = %origin, lines = line_no, "End of stream");
                break;
            }
            Ok(_) => {
                line_no += 1;
                let text = line.trim();
                if text.is_empty() {
                    continue;
                }
                match serde_json::from_str::<RawReading>(text) {
                    Ok(raw) => {
                        if tx.send(raw).await.is_err() {
                            // Receiver dropped
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(origin = %origin, line = line_no, error = %e, "Skipping unparsable line");
                        *last_error.lock() = Some(format!("Parse error on line {}: {}", line_no, e));
                    }
                }
            }
            Err(e) => {
                warn!(origin = %origin, error = %e, "Read error");
                *last_error.lock() = Some(format!("Read error: {}", e));
                break;
            }
        }
    }
}
