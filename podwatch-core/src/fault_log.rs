//! In-memory fault history with a live feed.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use podwatch_types::{FaultEvent, TimeRange};
use tokio::sync::broadcast;

use crate::error::SinkError;
use crate::sink::FaultSink;

/// Selects fault events from the history.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FaultQuery {
    /// Restrict to one pod. `None` means all pods.
    pub pod_id: Option<String>,
    pub range: TimeRange,
}

impl FaultQuery {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn pod(pod_id: impl Into<String>) -> Self {
        Self {
            pod_id: Some(pod_id.into()),
            range: TimeRange::all(),
        }
    }

    pub fn range(mut self, range: TimeRange) -> Self {
        self.range = range;
        self
    }

    fn matches(&self, event: &FaultEvent) -> bool {
        self.pod_id.as_deref().map_or(true, |p| p == event.pod_id())
            && self.range.contains(event.timestamp())
    }
}

/// Fault events kept by [`FaultLog::new`].
pub const DEFAULT_MAX_HISTORY: usize = 10_000;

/// Records fault events and rebroadcasts them to live listeners.
///
/// The history is a ring: once `max_history` events are held, the oldest
/// recorded event is dropped for each new one.
#[derive(Debug)]
pub struct FaultLog {
    history: RwLock<VecDeque<FaultEvent>>,
    max_history: usize,
    tx: broadcast::Sender<Arc<FaultEvent>>,
}

impl FaultLog {
    pub fn new(capacity: usize) -> Self {
        Self::with_max_history(capacity, DEFAULT_MAX_HISTORY)
    }

    /// `capacity` bounds the live feed, `max_history` the recorded events.
    pub fn with_max_history(capacity: usize, max_history: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            history: RwLock::new(VecDeque::new()),
            max_history: max_history.max(1),
            tx,
        }
    }

    pub fn max_history(&self) -> usize {
        self.max_history
    }

    /// Live feed of fault events recorded from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<FaultEvent>> {
        self.tx.subscribe()
    }

    /// Recorded events matching `query`, ordered by timestamp.
    pub fn faults(&self, query: &FaultQuery) -> Vec<FaultEvent> {
        let mut events: Vec<FaultEvent> = self
            .history
            .read()
            .iter()
            .filter(|e| query.matches(e))
            .cloned()
            .collect();
        events.sort_by_key(|e| e.timestamp());
        events
    }

    pub fn len(&self) -> usize {
        self.history.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.read().is_empty()
    }
}

impl Default for FaultLog {
    fn default() -> Self {
        Self::new(crate::publisher::DEFAULT_CAPACITY)
    }
}

#[async_trait]
impl FaultSink for FaultLog {
    async fn record_fault(&self, event: &FaultEvent) -> Result<(), SinkError> {
        {
            let mut history = self.history.write();
            history.push_back(event.clone());
            if history.len() > self.max_history {
                history.pop_front();
            }
        }
        let _ = self.tx.send(Arc::new(event.clone()));
        Ok(())
    }
}
