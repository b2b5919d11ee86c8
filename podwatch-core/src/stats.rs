//! Pipeline counters and periodic reporting.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use podwatch_types::{FaultEvent, FaultEventKind, Nanoseconds, ReadingKind};
use serde::Serialize;
use tokio::sync::watch;
use tracing::info;

use crate::error::ErrorKind;

/// The stage a failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Publish,
    Faults,
    Durable,
}

/// Lock-free counters updated by the pipeline.
#[derive(Debug, Default)]
pub struct PipelineStats {
    measurements: AtomicU64,
    statuses: AtomicU64,
    rejected: [AtomicU64; ErrorKind::ALL.len()],
    published: AtomicU64,
    publish_failures: AtomicU64,
    fault_failures: AtomicU64,
    durable_failures: AtomicU64,
    faults_opened: AtomicU64,
    faults_cleared: AtomicU64,
}

impl PipelineStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_accepted(&self, kind: ReadingKind) {
        let counter = match kind {
            ReadingKind::Measurement => &self.measurements,
            ReadingKind::Status => &self.statuses,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected(&self, kind: ErrorKind) {
        let idx = ErrorKind::ALL.iter().position(|k| *k == kind).unwrap_or(0);
        self.rejected[idx].fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_published(&self) {
        self.published.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self, stage: Stage) {
        let counter = match stage {
            Stage::Publish => &self.publish_failures,
            Stage::Faults => &self.fault_failures,
            Stage::Durable => &self.durable_failures,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fault(&self, event: &FaultEvent) {
        let counter = match event.kind {
            FaultEventKind::Opened => &self.faults_opened,
            FaultEventKind::Cleared => &self.faults_cleared,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Read all counters at once.
    pub fn snapshot(&self) -> StatsSnapshot {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        StatsSnapshot {
            timestamp: Nanoseconds::now(),
            measurements: load(&self.measurements),
            statuses: load(&self.statuses),
            rejected: ErrorKind::ALL
                .iter()
                .zip(self.rejected.iter())
                .map(|(kind, c)| (kind.as_str().to_string(), load(c)))
                .collect(),
            published: load(&self.published),
            publish_failures: load(&self.publish_failures),
            fault_failures: load(&self.fault_failures),
            durable_failures: load(&self.durable_failures),
            faults_opened: load(&self.faults_opened),
            faults_cleared: load(&self.faults_cleared),
        }
    }

    /// Log a snapshot every `interval` until the returned handle is stopped.
    pub fn start_reporting(self: &Arc<Self>, interval: Duration) -> ReportingHandle {
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let stats = self.clone();

        tokio::spawn(async move {
            let mut timer = tokio::time::interval(interval);
            // The first tick completes immediately.
            timer.tick().await;

            loop {
                tokio::select! {
                    _ = timer.tick() => {
                        let s = stats.snapshot();
                        info!(
                            measurements = s.measurements,
                            statuses = s.statuses,
                            rejected = s.total_rejected(),
                            published = s.published,
                            faults_opened = s.faults_opened,
                            faults_cleared = s.faults_cleared,
                            durable_failures = s.durable_failures,
                            "Pipeline stats"
                        );
                    }
                    changed = stop_rx.changed() => {
                        if changed.is_err() || *stop_rx.borrow() {
                            break;
                        }
                    }
                }
            }
        });

        ReportingHandle { stop_tx }
    }
}

/// Handle for the background reporting task.
pub struct ReportingHandle {
    stop_tx: watch::Sender<bool>,
}

impl ReportingHandle {
    pub fn stop(self) {
        let _ = self.stop_tx.send(true);
    }
}

/// Point-in-time copy of the pipeline counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub timestamp: Nanoseconds,
    pub measurements: u64,
    pub statuses: u64,
    /// Rejections by error kind.
    pub rejected: BTreeMap<String, u64>,
    pub published: u64,
    pub publish_failures: u64,
    pub fault_failures: u64,
    pub durable_failures: u64,
    pub faults_opened: u64,
    pub faults_cleared: u64,
}

impl StatsSnapshot {
    pub fn total_rejected(&self) -> u64 {
        self.rejected.values().sum()
    }

    pub fn rejected(&self, kind: ErrorKind) -> u64 {
        self.rejected.get(kind.as_str()).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use podwatch_types::{FaultLevel, Measurement, Reading};

    #[test]
    fn counters_accumulate() {
        let stats = PipelineStats::new();
        stats.record_accepted(ReadingKind::Measurement);
        stats.record_accepted(ReadingKind::Measurement);
        stats.record_accepted(ReadingKind::Status);
        stats.record_rejected(ErrorKind::UnknownPod);
        stats.record_rejected(ErrorKind::InvalidStatusValue);
        stats.record_rejected(ErrorKind::InvalidStatusValue);
        stats.record_published();
        stats.record_failure(Stage::Durable);

        let reading = Reading::measurement("pod_1", "velocity", 150.0, Nanoseconds(1));
        let m = Measurement::builder("velocity").build();
        stats.record_fault(&FaultEvent::opened(
            FaultLevel::Critical,
            m.clone(),
            reading.clone(),
        ));
        stats.record_fault(&FaultEvent::cleared(FaultLevel::Critical, m, reading));

        let s = stats.snapshot();
        assert_eq!(s.measurements, 2);
        assert_eq!(s.statuses, 1);
        assert_eq!(s.rejected(ErrorKind::UnknownPod), 1);
        assert_eq!(s.rejected(ErrorKind::InvalidStatusValue), 2);
        assert_eq!(s.rejected(ErrorKind::MalformedMessage), 0);
        assert_eq!(s.total_rejected(), 3);
        assert_eq!(s.published, 1);
        assert_eq!(s.durable_failures, 1);
        assert_eq!(s.publish_failures, 0);
        assert_eq!(s.faults_opened, 1);
        assert_eq!(s.faults_cleared, 1);
    }

    #[test]
    fn snapshot_lists_every_error_kind() {
        let s = PipelineStats::new().snapshot();
        assert_eq!(s.rejected.len(), ErrorKind::ALL.len());
        let json = serde_json::to_value(&s).unwrap();
        assert_eq!(json["rejected"]["unknown_pod"], 0);
    }

    #[tokio::test(start_paused = true)]
    async fn reporting_stops_on_request() {
        let stats = Arc::new(PipelineStats::new());
        let handle = stats.start_reporting(Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(35)).await;
        handle.stop();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(Arc::strong_count(&stats), 1);
    }
}
