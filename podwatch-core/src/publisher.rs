//! Realtime fan-out of validated readings over a tokio broadcast channel.

use std::collections::BTreeSet;
use std::sync::Arc;

use podwatch_types::Reading;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::trace;

use crate::error::SinkError;
use crate::sink::RealtimePublisher;

/// Default number of readings buffered per subscriber before it lags.
pub const DEFAULT_CAPACITY: usize = 1024;

/// Which readings a subscriber wants: one pod, optionally a subset of keys.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SubscriptionFilter {
    pod_id: Option<String>,
    keys: Option<BTreeSet<String>>,
}

impl SubscriptionFilter {
    /// Every reading from every pod.
    pub fn all() -> Self {
        Self::default()
    }

    /// Every reading from one pod.
    pub fn pod(pod_id: impl Into<String>) -> Self {
        Self {
            pod_id: Some(pod_id.into()),
            keys: None,
        }
    }

    /// Restrict to the given keys. Can be called repeatedly to add more.
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.keys.get_or_insert_with(BTreeSet::new).insert(key.into());
        self
    }

    pub fn matches(&self, reading: &Reading) -> bool {
        if let Some(pod_id) = &self.pod_id {
            if *pod_id != reading.pod_id {
                return false;
            }
        }
        match &self.keys {
            Some(keys) => keys.contains(&reading.key),
            None => true,
        }
    }
}

/// Error returned by [`Subscription::recv`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SubscriptionError {
    /// The subscriber fell behind and this many readings were dropped.
    #[error("Subscriber lagged, {0} readings skipped")]
    Lagged(u64),

    /// The publisher was dropped.
    #[error("Publisher closed")]
    Closed,
}

/// A live stream of readings matching a filter.
#[derive(Debug)]
pub struct Subscription {
    filter: SubscriptionFilter,
    rx: broadcast::Receiver<Arc<Reading>>,
}

impl Subscription {
    /// Wait for the next matching reading.
    ///
    /// A lagging subscriber gets one `Lagged` error and then resumes with
    /// the oldest reading still buffered.
    pub async fn recv(&mut self) -> Result<Arc<Reading>, SubscriptionError> {
        loop {
            match self.rx.recv().await {
                Ok(reading) if self.filter.matches(&reading) => return Ok(reading),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    return Err(SubscriptionError::Lagged(n))
                }
                Err(broadcast::error::RecvError::Closed) => return Err(SubscriptionError::Closed),
            }
        }
    }

    /// Take the next matching reading if one is already buffered.
    pub fn try_recv(&mut self) -> Option<Result<Arc<Reading>, SubscriptionError>> {
        loop {
            match self.rx.try_recv() {
                Ok(reading) if self.filter.matches(&reading) => return Some(Ok(reading)),
                Ok(_) => continue,
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(SubscriptionError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => {
                    return Some(Err(SubscriptionError::Closed))
                }
            }
        }
    }

    pub fn filter(&self) -> &SubscriptionFilter {
        &self.filter
    }
}

/// In-process realtime publisher.
///
/// Publishing never waits for subscribers. Slow subscribers miss readings
/// and are told how many.
#[derive(Debug, Clone)]
pub struct BroadcastPublisher {
    tx: broadcast::Sender<Arc<Reading>>,
}

impl BroadcastPublisher {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Open a subscription. Only readings published afterwards are seen.
    pub fn subscribe(&self, filter: SubscriptionFilter) -> Subscription {
        Subscription {
            filter,
            rx: self.tx.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for BroadcastPublisher {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl RealtimePublisher for BroadcastPublisher {
    fn publish(&self, reading: &Reading) -> Result<usize, SinkError> {
        // No subscribers is not a failure.
        let reached = self.tx.send(Arc::new(reading.clone())).unwrap_or(0);
        trace!(pod_id = %reading.pod_id, key = %reading.key, reached, "Published reading");
        Ok(reached)
    }
}
