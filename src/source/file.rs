//! File-based reading source.
//!
//! Replays a newline-delimited JSON file of raw readings, e.g. a capture
//! from a test run.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use podwatch_core::RawReading;

use super::{ReadingSource, StreamSource};

/// A source that reads every line of a file once.
#[derive(Debug)]
pub struct FileSource {
    path: PathBuf,
    description: String,
    inner: StreamSource,
}

impl FileSource {
    /// Open a file for replay.
    pub async fn open(path: impl AsRef<Path>, buffer: usize) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = tokio::fs::File::open(&path).await?;
        let description = format!("file: {}", path.display());
        let inner = StreamSource::spawn(file, &path.display().to_string(), buffer);
        Ok(Self {
            path,
            description,
            inner,
        })
    }

    /// Returns the path being replayed.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get the last read or parse error, if any.
    pub fn last_error(&self) -> Option<String> {
        self.inner.last_error()
    }
}

#[async_trait]
impl ReadingSource for FileSource {
    async fn recv(&mut self) -> Option<RawReading> {
        self.inner.recv().await
    }

    fn description(&self) -> &str {
        &self.description
    }
}
