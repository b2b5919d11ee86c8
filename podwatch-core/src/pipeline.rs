//! The ingestion pipeline: validate, publish, then track faults and write.

use std::sync::Arc;

use podwatch_types::{FaultEvent, FaultEventKind, RawReading, Reading, ReadingKind};
use tracing::{debug, error, info, warn};

use crate::error::ValidationError;
use crate::fault_log::FaultLog;
use crate::faults::FaultTracker;
use crate::limits::evaluate;
use crate::publisher::BroadcastPublisher;
use crate::registry::Registry;
use crate::sink::{DurableSink, FaultSink, RealtimePublisher};
use crate::stats::{PipelineStats, Stage};
use crate::store::MemoryStore;
use crate::validator::{ValidatedMeasurement, Validator};
use crate::writer::DurableWriter;

/// How one stage of the pipeline went for a reading.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StageOutcome {
    /// The stage ran and its sink accepted the work.
    Done,
    /// The stage does not apply to this reading.
    #[default]
    Skipped,
    /// The sink failed. The error has already been logged.
    Failed(String),
}

impl StageOutcome {
    pub fn is_done(&self) -> bool {
        matches!(self, StageOutcome::Done)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, StageOutcome::Failed(_))
    }
}

/// Per-stage result of ingesting one accepted reading.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestReport {
    pub reading: Reading,
    pub publish: StageOutcome,
    pub faults: StageOutcome,
    /// The fault transition caused by this reading, if any.
    pub fault_event: Option<FaultEvent>,
    pub durable: StageOutcome,
}

/// Orchestrates the stages for every inbound reading.
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use podwatch_core::{IngestionPipeline, Registry};
/// use podwatch_types::{Nanoseconds, RawReading};
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let registry = Arc::new(Registry::load("config/pods.yaml")?);
/// let pipeline = IngestionPipeline::builder(registry).build();
///
/// let raw = RawReading::measurement("pod_1", "velocity", 42.0, Nanoseconds::now());
/// let report = pipeline.ingest(&raw).await?;
/// assert!(report.publish.is_done());
/// # Ok(())
/// # }
/// ```
pub struct IngestionPipeline {
    validator: Validator,
    publisher: Arc<dyn RealtimePublisher>,
    tracker: Arc<FaultTracker>,
    fault_sink: Arc<dyn FaultSink>,
    writer: DurableWriter,
    stats: Arc<PipelineStats>,
}

impl IngestionPipeline {
    pub fn builder(registry: Arc<Registry>) -> IngestionPipelineBuilder {
        IngestionPipelineBuilder::new(registry)
    }

    pub fn registry(&self) -> &Arc<Registry> {
        self.validator.registry()
    }

    pub fn tracker(&self) -> &Arc<FaultTracker> {
        &self.tracker
    }

    pub fn stats(&self) -> &Arc<PipelineStats> {
        &self.stats
    }

    /// Ingest a reading according to the channel it arrived on.
    pub async fn ingest(&self, raw: &RawReading) -> Result<IngestReport, ValidationError> {
        match raw.kind {
            ReadingKind::Measurement => self.ingest_measurement(raw).await,
            ReadingKind::Status => self.ingest_status(raw).await,
        }
    }

    /// Validate, publish, then evaluate limits and write durably.
    pub async fn ingest_measurement(
        &self,
        raw: &RawReading,
    ) -> Result<IngestReport, ValidationError> {
        let validated = self
            .validator
            .validate_measurement(raw)
            .map_err(|e| self.rejected(raw, e))?;
        self.stats.record_accepted(ReadingKind::Measurement);

        let publish = self.publish(&validated.reading);
        let ((faults, fault_event), durable) = tokio::join!(
            self.track_faults(&validated),
            self.write(&validated.reading)
        );

        Ok(IngestReport {
            reading: validated.reading,
            publish,
            faults,
            fault_event,
            durable,
        })
    }

    /// Validate, publish, then write durably. Statuses have no limits.
    pub async fn ingest_status(&self, raw: &RawReading) -> Result<IngestReport, ValidationError> {
        let validated = self
            .validator
            .validate_status(raw)
            .map_err(|e| self.rejected(raw, e))?;
        self.stats.record_accepted(ReadingKind::Status);

        let publish = self.publish(&validated.reading);
        let durable = self.write(&validated.reading).await;

        Ok(IngestReport {
            reading: validated.reading,
            publish,
            faults: StageOutcome::Skipped,
            fault_event: None,
            durable,
        })
    }

    fn rejected(&self, raw: &RawReading, err: ValidationError) -> ValidationError {
        self.stats.record_rejected(err.kind());
        warn!(
            channel = %raw.kind,
            pod_id = %raw.pod_id,
            key = %raw.key,
            kind = %err.kind(),
            "Rejected reading: {}",
            err
        );
        err
    }

    fn publish(&self, reading: &Reading) -> StageOutcome {
        match self.publisher.publish(reading) {
            Ok(_) => {
                self.stats.record_published();
                StageOutcome::Done
            }
            Err(e) => {
                self.stats.record_failure(Stage::Publish);
                error!(
                    pod_id = %reading.pod_id,
                    key = %reading.key,
                    value = reading.value,
                    error = %e,
                    "Failed to publish reading"
                );
                StageOutcome::Failed(e.to_string())
            }
        }
    }

    async fn track_faults(
        &self,
        validated: &ValidatedMeasurement,
    ) -> (StageOutcome, Option<FaultEvent>) {
        let reading = &validated.reading;
        let breach = evaluate(&validated.measurement, reading.value);
        let Some(event) = self.tracker.track(&validated.measurement, reading, breach) else {
            return (StageOutcome::Done, None);
        };

        self.stats.record_fault(&event);
        match event.kind {
            FaultEventKind::Opened => warn!(
                pod_id = %reading.pod_id,
                key = %reading.key,
                value = reading.value,
                level = %event.level,
                previous = ?event.previous,
                "Fault opened for {}",
                validated.measurement.label
            ),
            FaultEventKind::Cleared => info!(
                pod_id = %reading.pod_id,
                key = %reading.key,
                value = reading.value,
                level = %event.level,
                "Fault cleared for {}",
                validated.measurement.label
            ),
        }

        let outcome = match self.fault_sink.record_fault(&event).await {
            Ok(()) => StageOutcome::Done,
            Err(e) => {
                self.stats.record_failure(Stage::Faults);
                error!(
                    pod_id = %reading.pod_id,
                    key = %reading.key,
                    value = reading.value,
                    level = %event.level,
                    error = %e,
                    "Failed to deliver fault event"
                );
                StageOutcome::Failed(e.to_string())
            }
        };
        (outcome, Some(event))
    }

    async fn write(&self, reading: &Reading) -> StageOutcome {
        let outcome = self.writer.write(reading).await;
        if outcome.is_failed() {
            self.stats.record_failure(Stage::Durable);
        }
        outcome
    }
}

impl std::fmt::Debug for IngestionPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IngestionPipeline")
            .field("pods", &self.registry().len())
            .finish_non_exhaustive()
    }
}

/// Builder for [`IngestionPipeline`].
///
/// Any collaborator left unset gets an in-process default: a
/// [`BroadcastPublisher`], a [`FaultLog`] and a [`MemoryStore`].
pub struct IngestionPipelineBuilder {
    registry: Arc<Registry>,
    publisher: Option<Arc<dyn RealtimePublisher>>,
    fault_sink: Option<Arc<dyn FaultSink>>,
    durable_sink: Option<Arc<dyn DurableSink>>,
    tracker: Option<Arc<FaultTracker>>,
    stats: Option<Arc<PipelineStats>>,
}

impl IngestionPipelineBuilder {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            publisher: None,
            fault_sink: None,
            durable_sink: None,
            tracker: None,
            stats: None,
        }
    }

    pub fn publisher(mut self, publisher: Arc<dyn RealtimePublisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    pub fn fault_sink(mut self, sink: Arc<dyn FaultSink>) -> Self {
        self.fault_sink = Some(sink);
        self
    }

    pub fn durable_sink(mut self, sink: Arc<dyn DurableSink>) -> Self {
        self.durable_sink = Some(sink);
        self
    }

    /// Share a fault tracker, e.g. to inspect open faults from elsewhere.
    pub fn tracker(mut self, tracker: Arc<FaultTracker>) -> Self {
        self.tracker = Some(tracker);
        self
    }

    pub fn stats(mut self, stats: Arc<PipelineStats>) -> Self {
        self.stats = Some(stats);
        self
    }

    pub fn build(self) -> IngestionPipeline {
        debug!(pods = self.registry.len(), "Building ingestion pipeline");
        IngestionPipeline {
            validator: Validator::new(self.registry),
            publisher: self
                .publisher
                .unwrap_or_else(|| Arc::new(BroadcastPublisher::default())),
            tracker: self.tracker.unwrap_or_default(),
            fault_sink: self
                .fault_sink
                .unwrap_or_else(|| Arc::new(FaultLog::default())),
            writer: DurableWriter::new(
                self.durable_sink
                    .unwrap_or_else(|| Arc::new(MemoryStore::new())),
            ),
            stats: self.stats.unwrap_or_default(),
        }
    }
}
