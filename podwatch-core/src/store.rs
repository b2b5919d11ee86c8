//! Reference durable stores.
//!
//! - [`MemoryStore`]: points held in memory, for tests and short sessions.
//! - [`JsonLinesStore`]: one JSON point per line, appended to a file.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::RwLock;
use podwatch_types::TimeRange;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::SinkError;
use crate::sink::{DurableSink, HistoricalQuery, HistoricalReading, Point};

fn select<'a>(
    points: impl Iterator<Item = &'a Point>,
    pod_id: &str,
    key: &str,
    range: TimeRange,
) -> Vec<HistoricalReading> {
    let mut rows: Vec<HistoricalReading> = points
        .filter(|p| p.matches(pod_id, key) && range.contains(p.timestamp))
        .filter_map(|p| {
            p.value().map(|value| HistoricalReading {
                timestamp: p.timestamp,
                value,
            })
        })
        .collect();
    rows.sort_by_key(|r| r.timestamp);
    rows
}

/// Points kept by [`MemoryStore::new`].
pub const DEFAULT_MAX_POINTS: usize = 100_000;

/// Durable store kept in memory.
///
/// Holds at most `max_points`; the oldest appended point is evicted first.
#[derive(Debug)]
pub struct MemoryStore {
    points: RwLock<VecDeque<Point>>,
    max_points: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_max_points(DEFAULT_MAX_POINTS)
    }

    pub fn with_max_points(max_points: usize) -> Self {
        Self {
            points: RwLock::new(VecDeque::new()),
            max_points: max_points.max(1),
        }
    }

    pub fn max_points(&self) -> usize {
        self.max_points
    }

    /// Retained points, in arrival order.
    pub fn points(&self) -> Vec<Point> {
        self.points.read().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.points.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.read().is_empty()
    }
}

#[async_trait]
impl DurableSink for MemoryStore {
    async fn append_point(&self, point: Point) -> Result<(), SinkError> {
        let mut points = self.points.write();
        points.push_back(point);
        if points.len() > self.max_points {
            points.pop_front();
        }
        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HistoricalQuery for MemoryStore {
    async fn query(
        &self,
        pod_id: &str,
        key: &str,
        range: TimeRange,
    ) -> Result<Vec<HistoricalReading>, SinkError> {
        Ok(select(self.points.read().iter(), pod_id, key, range))
    }
}

/// Append-only newline-delimited JSON file of points.
#[derive(Debug)]
pub struct JsonLinesStore {
    path: PathBuf,
    file: Mutex<File>,
}

impl JsonLinesStore {
    /// Open the file for appending, creating it if needed.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, SinkError> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        debug!(path = %path.display(), "Opened durable store");
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_points(&self) -> Result<Vec<Point>, SinkError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut points = Vec::new();
        for (n, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Point>(line) {
                Ok(point) => points.push(point),
                Err(e) => warn!(
                    path = %self.path.display(),
                    line = n + 1,
                    error = %e,
                    "Skipping unreadable point"
                ),
            }
        }
        Ok(points)
    }
}

#[async_trait]
impl DurableSink for JsonLinesStore {
    async fn append_point(&self, point: Point) -> Result<(), SinkError> {
        let mut line = serde_json::to_vec(&point)?;
        line.push(b'\n');

        let mut file = self.file.lock().await;
        file.write_all(&line).await?;
        file.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl HistoricalQuery for JsonLinesStore {
    async fn query(
        &self,
        pod_id: &str,
        key: &str,
        range: TimeRange,
    ) -> Result<Vec<HistoricalReading>, SinkError> {
        let points = self.read_points().await?;
        Ok(select(points.iter(), pod_id, key, range))
    }
}
