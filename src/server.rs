//! The ingestion server: wires settings, sources and the pipeline together.

use std::collections::hash_map::DefaultHasher;
use std::future::Future;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use podwatch_core::{
    BroadcastPublisher, DurableSink, FaultLog, IngestionPipeline, JsonLinesStore, MemoryStore,
    RawReading, Registry, StatsSnapshot,
};
use tokio::signal;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use crate::settings::{InputKind, InputSettings, Settings, StoreKind};
use crate::source::{ChannelSource, FileSource, ReadingSource, StreamSource, TcpSource};

/// A running pipeline and the live feeds it exposes.
#[derive(Debug)]
pub struct Server {
    pipeline: Arc<IngestionPipeline>,
    publisher: Arc<BroadcastPublisher>,
    faults: Arc<FaultLog>,
    workers: usize,
    queue: usize,
    stats_interval: Option<Duration>,
}

impl Server {
    /// Build a server from settings: load the registry, open the store.
    pub async fn from_settings(settings: &Settings) -> Result<Self> {
        let registry = Registry::load(&settings.registry).with_context(|| {
            format!(
                "Failed to load pod registry from {}",
                settings.registry.display()
            )
        })?;
        info!(
            path = %settings.registry.display(),
            pods = registry.len(),
            "Loaded pod registry"
        );

        let store: Arc<dyn DurableSink> = match settings.store.kind {
            StoreKind::Memory => Arc::new(MemoryStore::with_max_points(settings.store.max_points)),
            StoreKind::Jsonl => {
                let store = JsonLinesStore::open(&settings.store.path)
                    .await
                    .with_context(|| {
                        format!("Failed to open store {}", settings.store.path.display())
                    })?;
                info!(path = %settings.store.path.display(), "Writing points to file");
                Arc::new(store)
            }
        };

        Ok(Self::new(Arc::new(registry), store, settings))
    }

    /// Build a server around an already-loaded registry and store.
    ///
    /// Only the realtime, ingest and stats sections of `settings` apply.
    pub fn new(registry: Arc<Registry>, store: Arc<dyn DurableSink>, settings: &Settings) -> Self {
        let publisher = Arc::new(BroadcastPublisher::new(settings.realtime.capacity));
        let faults = Arc::new(FaultLog::with_max_history(
            settings.realtime.capacity,
            settings.realtime.fault_history,
        ));
        let pipeline = IngestionPipeline::builder(registry)
            .publisher(publisher.clone())
            .fault_sink(faults.clone())
            .durable_sink(store)
            .build();

        Self {
            pipeline: Arc::new(pipeline),
            publisher,
            faults,
            workers: settings.ingest.workers.max(1),
            queue: settings.ingest.queue.max(1),
            stats_interval: settings.stats.interval(),
        }
    }

    pub fn pipeline(&self) -> &Arc<IngestionPipeline> {
        &self.pipeline
    }

    /// Live readings, for realtime subscribers.
    pub fn publisher(&self) -> &Arc<BroadcastPublisher> {
        &self.publisher
    }

    /// Fault history and live fault feed.
    pub fn faults(&self) -> &Arc<FaultLog> {
        &self.faults
    }

    /// Ingest from `source` until it ends or `shutdown` resolves.
    ///
    /// Readings are sharded over a fixed set of workers by (pod, key). Each
    /// worker ingests its readings one at a time, so readings for one key
    /// are applied in arrival order while different keys run in parallel.
    /// Worker queues are bounded; a full queue stops the loop pulling from
    /// `source`. Queued readings finish before this returns.
    pub async fn run<F>(&self, source: &mut dyn ReadingSource, shutdown: F) -> StatsSnapshot
    where
        F: Future<Output = ()>,
    {
        info!(
            source = source.description(),
            workers = self.workers,
            "Ingesting"
        );
        let reporting = self
            .stats_interval
            .map(|interval| self.pipeline.stats().start_reporting(interval));

        let mut workers = JoinSet::new();
        let mut queues = Vec::with_capacity(self.workers);
        for _ in 0..self.workers {
            let (tx, rx) = mpsc::channel(self.queue);
            workers.spawn(ingest_worker(self.pipeline.clone(), rx));
            queues.push(tx);
        }

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested");
                    break;
                }
                next = source.recv() => match next {
                    Some(raw) => {
                        let queue = &queues[shard(&raw.pod_id, &raw.key, queues.len())];
                        if queue.send(raw).await.is_err() {
                            error!("Ingestion worker stopped, no longer accepting readings");
                            break;
                        }
                    }
                    None => {
                        info!(source = source.description(), "Source exhausted");
                        break;
                    }
                },
            }
        }

        debug!("Draining queued readings");
        drop(queues);
        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Ingestion worker failed");
            }
        }

        if let Some(handle) = reporting {
            handle.stop();
        }

        let stats = self.pipeline.stats().snapshot();
        info!(
            measurements = stats.measurements,
            statuses = stats.statuses,
            rejected = stats.total_rejected(),
            faults_opened = stats.faults_opened,
            durable_failures = stats.durable_failures,
            "Ingestion stopped"
        );
        stats
    }
}

async fn ingest_worker(pipeline: Arc<IngestionPipeline>, mut rx: mpsc::Receiver<RawReading>) {
    while let Some(raw) = rx.recv().await {
        // Rejections are already logged and counted.
        let _ = pipeline.ingest(&raw).await;
    }
}

/// Worker index for a (pod, key) pair. Stable for the life of the process.
fn shard(pod_id: &str, key: &str, workers: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    pod_id.hash(&mut hasher);
    key.hash(&mut hasher);
    (hasher.finish() % workers.max(1) as u64) as usize
}

/// Open the configured inbound source.
pub async fn open_source(input: &InputSettings) -> Result<Box<dyn ReadingSource>> {
    let source: Box<dyn ReadingSource> = match input.kind {
        InputKind::Stdin => Box::new(StreamSource::spawn(
            tokio::io::stdin(),
            "stdin",
            input.buffer,
        )),
        InputKind::Tcp => Box::new(
            TcpSource::bind(&input.address, input.buffer)
                .await
                .with_context(|| format!("Failed to listen on {}", input.address))?,
        ),
        InputKind::File => {
            let path = input
                .path
                .as_ref()
                .context("input.path is required for file input")?;
            Box::new(
                FileSource::open(path, input.buffer)
                    .await
                    .with_context(|| format!("Failed to open {}", path.display()))?,
            )
        }
        InputKind::Mqtt => Box::new(open_mqtt(input)?),
        InputKind::Nats => Box::new(open_nats(input).await?),
    };
    Ok(source)
}

#[cfg(feature = "mqtt")]
fn open_mqtt(input: &InputSettings) -> Result<ChannelSource> {
    use podwatch_adapters::mqtt::MqttAdapter;

    let (host, port) = match input.address.rsplit_once(':') {
        Some((host, port)) => (
            host,
            port.parse::<u16>()
                .with_context(|| format!("Invalid MQTT port in {}", input.address))?,
        ),
        None => (input.address.as_str(), 1883),
    };
    let adapter = MqttAdapter::builder()
        .host(host)
        .port(port)
        .client_id(input.client_id.as_str())
        .build();

    let (tx, source) = ChannelSource::create(&format!("mqtt://{}:{}", host, port), input.buffer);
    tokio::spawn(async move {
        if let Err(e) = adapter.run(tx).await {
            info!(reason = %e, "MQTT adapter stopped");
        }
    });
    Ok(source)
}

#[cfg(not(feature = "mqtt"))]
fn open_mqtt(_input: &InputSettings) -> Result<ChannelSource> {
    anyhow::bail!("MQTT input requires building with the `mqtt` feature")
}

#[cfg(feature = "nats")]
async fn open_nats(input: &InputSettings) -> Result<ChannelSource> {
    use podwatch_adapters::nats::NatsAdapter;

    let url = if input.address.contains("://") {
        input.address.clone()
    } else {
        format!("nats://{}", input.address)
    };
    let adapter = NatsAdapter::builder()
        .url(url.as_str())
        .build()
        .await
        .with_context(|| format!("Failed to connect to {}", url))?;

    let (tx, source) = ChannelSource::create(&url, input.buffer);
    tokio::spawn(async move {
        if let Err(e) = adapter.run(tx).await {
            info!(reason = %e, "NATS adapter stopped");
        }
    });
    Ok(source)
}

#[cfg(not(feature = "nats"))]
async fn open_nats(_input: &InputSettings) -> Result<ChannelSource> {
    anyhow::bail!("NATS input requires building with the `nats` feature")
}

/// Resolves on Ctrl+C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use podwatch_core::{
        FaultEventKind, FaultLevel, FaultQuery, FaultState, FileFormat, HistoricalQuery,
        Nanoseconds, Point, SinkError, SubscriptionFilter, TimeRange,
    };
    use tokio::sync::Semaphore;

    const PODS: &str = r#"
pods:
  pod_1:
    measurements:
      velocity:
        type: velocity
        limits:
          critical: { low: 0, high: 100 }
          warning: { low: 10, high: 90 }
    statuses:
      state:
        type: status
        values:
          - { value: 0, label: IDLE }
          - { value: 1, label: READY }
"#;

    fn test_settings() -> Settings {
        let mut settings = Settings::default();
        settings.realtime.capacity = 64;
        settings.stats.interval_secs = 0;
        settings
    }

    fn server_with(store: Arc<dyn DurableSink>, settings: &Settings) -> Server {
        let registry = Registry::parse(PODS, FileFormat::Yaml).unwrap();
        Server::new(Arc::new(registry), store, settings)
    }

    fn server(store: Arc<MemoryStore>) -> Server {
        server_with(store, &test_settings())
    }

    fn velocity(value: f64, ts: u64) -> RawReading {
        RawReading::measurement("pod_1", "velocity", value, Nanoseconds(ts))
    }

    /// Durable sink that parks every write until permits are added.
    struct GatedSink {
        gate: Semaphore,
        started: AtomicUsize,
    }

    impl GatedSink {
        fn closed() -> Self {
            Self {
                gate: Semaphore::new(0),
                started: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl DurableSink for GatedSink {
        async fn append_point(&self, _point: Point) -> Result<(), SinkError> {
            self.started.fetch_add(1, Ordering::SeqCst);
            let _permit = self.gate.acquire().await.map_err(|_| SinkError::Closed)?;
            Ok(())
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn ingests_until_source_ends() {
        let store = Arc::new(MemoryStore::new());
        let server = server(store.clone());
        let mut live = server
            .publisher()
            .subscribe(SubscriptionFilter::pod("pod_1"));

        let (tx, mut source) = ChannelSource::create("test", 16);
        for (ts, value) in [50.0, 95.0, 150.0, 50.0].into_iter().enumerate() {
            tx.send(velocity(value, ts as u64)).await.unwrap();
        }
        tx.send(RawReading::status("pod_1", "state", 1.0, Nanoseconds(9)))
            .await
            .unwrap();
        tx.send(RawReading::measurement("pod_9", "velocity", 1.0, Nanoseconds(9)))
            .await
            .unwrap();
        drop(tx);

        let stats = server
            .run(&mut source, std::future::pending::<()>())
            .await;
        assert_eq!(stats.measurements, 4);
        assert_eq!(stats.statuses, 1);
        assert_eq!(stats.total_rejected(), 1);

        let rows = store
            .query("pod_1", "velocity", TimeRange::all())
            .await
            .unwrap();
        assert_eq!(rows.len(), 4);
        assert_eq!(store.len(), 5);

        let events: Vec<_> = server
            .faults()
            .faults(&FaultQuery::pod("pod_1"))
            .into_iter()
            .map(|e| (e.kind, e.level, e.previous))
            .collect();
        assert_eq!(
            events,
            vec![
                (FaultEventKind::Opened, FaultLevel::Warning, None),
                (
                    FaultEventKind::Opened,
                    FaultLevel::Critical,
                    Some(FaultLevel::Warning)
                ),
                (FaultEventKind::Cleared, FaultLevel::Critical, None),
            ]
        );
        assert_eq!(
            server.pipeline().tracker().state("pod_1", "velocity"),
            FaultState::Clear
        );

        let mut received = 0;
        while live.try_recv().is_some() {
            received += 1;
        }
        assert_eq!(received, 5);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn breach_then_clear_always_ends_clear() {
        for round in 0..200 {
            let server = server(Arc::new(MemoryStore::new()));
            let (tx, mut source) = ChannelSource::create("test", 4);
            tx.send(velocity(150.0, 1)).await.unwrap();
            tx.send(velocity(50.0, 2)).await.unwrap();
            drop(tx);

            server.run(&mut source, std::future::pending::<()>()).await;
            assert_eq!(
                server.pipeline().tracker().state("pod_1", "velocity"),
                FaultState::Clear,
                "stale fault in round {}",
                round
            );
            assert_eq!(server.faults().len(), 2);
        }
    }

    #[test]
    fn one_key_always_maps_to_one_worker() {
        let first = shard("pod_1", "velocity", 4);
        assert!(first < 4);
        assert!((0..100).all(|_| shard("pod_1", "velocity", 4) == first));
        assert_eq!(shard("pod_1", "velocity", 1), 0);
        assert_eq!(shard("pod_1", "velocity", 0), 0);

        let used: std::collections::HashSet<usize> = (0..64)
            .map(|i| shard("pod_1", &format!("sensor_{}", i), 4))
            .collect();
        assert!(used.len() > 1);
    }

    #[tokio::test]
    async fn full_queues_hold_back_the_source() {
        let sink = Arc::new(GatedSink::closed());
        let mut settings = test_settings();
        settings.ingest.workers = 1;
        settings.ingest.queue = 1;
        let server = Arc::new(server_with(sink.clone(), &settings));

        let (tx, mut source) = ChannelSource::create("test", 1);
        let running = tokio::spawn({
            let server = server.clone();
            async move { server.run(&mut source, std::future::pending::<()>()).await }
        });

        // One write parked in the sink, one reading queued for the worker,
        // one held by the server loop and one in the source buffer.
        let mut accepted = 0;
        for ts in 0..20 {
            let send = tx.send(velocity(50.0, ts));
            match tokio::time::timeout(Duration::from_millis(100), send).await {
                Ok(sent) => {
                    sent.unwrap();
                    accepted += 1;
                }
                Err(_) => break,
            }
        }
        assert!(accepted >= 1);
        assert!(accepted <= 4, "accepted {} readings past a stalled sink", accepted);
        assert_eq!(sink.started.load(Ordering::SeqCst), 1);

        sink.gate.add_permits(64);
        drop(tx);
        let stats = running.await.unwrap();
        assert_eq!(stats.measurements, accepted);
        assert_eq!(sink.started.load(Ordering::SeqCst) as u64, accepted);
    }

    #[tokio::test]
    async fn stops_on_shutdown() {
        let server = server(Arc::new(MemoryStore::new()));
        let (_tx, mut source) = ChannelSource::create("idle", 1);

        let stats = server.run(&mut source, async {}).await;
        assert_eq!(stats.measurements, 0);
    }

    #[tokio::test]
    async fn from_settings_loads_registry_and_store() {
        let dir = tempfile::tempdir().unwrap();
        let registry = dir.path().join("pods.yaml");
        std::fs::write(&registry, PODS).unwrap();

        let mut settings = Settings::default();
        settings.registry = registry;
        settings.store.kind = StoreKind::Jsonl;
        settings.store.path = dir.path().join("points.ndjson");
        settings.realtime.fault_history = 8;

        let server = Server::from_settings(&settings).await.unwrap();
        assert_eq!(server.pipeline().registry().len(), 1);
        assert_eq!(server.faults().max_history(), 8);
        assert!(settings.store.path.exists());
    }

    #[test]
    fn bundled_registry_is_valid() {
        let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("config/pods.yaml");
        let registry = Registry::load(path).unwrap();
        assert!(registry.resolve_measurement("pod_1", "velocity").is_some());
        assert!(registry.resolve_status("pod_1", "state").is_some());
    }

    #[tokio::test]
    async fn from_settings_fails_on_missing_registry() {
        let mut settings = Settings::default();
        settings.registry = "/nonexistent/pods.yaml".into();
        let err = Server::from_settings(&settings).await.unwrap_err();
        assert!(err.to_string().contains("pod registry"));
    }

    #[cfg(not(feature = "mqtt"))]
    #[tokio::test]
    async fn mqtt_input_needs_feature() {
        let input = InputSettings {
            kind: InputKind::Mqtt,
            ..InputSettings::default()
        };
        assert!(open_source(&input).await.is_err());
    }
}
