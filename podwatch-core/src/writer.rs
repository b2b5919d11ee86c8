//! Durable writes of validated readings.

use std::sync::Arc;

use podwatch_types::Reading;
use tracing::{error, trace};

use crate::pipeline::StageOutcome;
use crate::sink::{DurableSink, Point};

/// Appends readings to durable storage.
///
/// Failures are logged with the reading's context and reported, never
/// raised. There is no retry.
#[derive(Clone)]
pub struct DurableWriter {
    sink: Arc<dyn DurableSink>,
}

impl DurableWriter {
    pub fn new(sink: Arc<dyn DurableSink>) -> Self {
        Self { sink }
    }

    pub async fn write(&self, reading: &Reading) -> StageOutcome {
        match self.sink.append_point(Point::from_reading(reading)).await {
            Ok(()) => {
                trace!(pod_id = %reading.pod_id, key = %reading.key, "Wrote reading");
                StageOutcome::Done
            }
            Err(e) => {
                error!(
                    pod_id = %reading.pod_id,
                    key = %reading.key,
                    value = reading.value,
                    timestamp = %reading.timestamp,
                    error = %e,
                    "Failed to write reading to durable storage"
                );
                StageOutcome::Failed(e.to_string())
            }
        }
    }
}

impl std::fmt::Debug for DurableWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DurableWriter").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SinkError;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use podwatch_types::Nanoseconds;

    struct Failing;

    #[async_trait]
    impl DurableSink for Failing {
        async fn append_point(&self, _point: Point) -> Result<(), SinkError> {
            Err(SinkError::Rejected("disk full".into()))
        }
    }

    #[tokio::test]
    async fn writes_point_for_reading() {
        let store = Arc::new(MemoryStore::new());
        let writer = DurableWriter::new(store.clone());

        let reading = Reading::measurement("pod_1", "velocity", 12.0, Nanoseconds(7));
        assert_eq!(writer.write(&reading).await, StageOutcome::Done);

        let points = store.points();
        assert_eq!(points.len(), 1);
        assert!(points[0].matches("pod_1", "velocity"));
        assert_eq!(points[0].value(), Some(12.0));
    }

    #[tokio::test]
    async fn failure_is_reported_not_raised() {
        let writer = DurableWriter::new(Arc::new(Failing));
        let reading = Reading::measurement("pod_1", "velocity", 12.0, Nanoseconds(7));
        assert_eq!(
            writer.write(&reading).await,
            StageOutcome::Failed("Sink rejected write: disk full".into())
        );
    }
}
