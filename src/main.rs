use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use podwatch::server::{open_source, shutdown_signal, Server};
use podwatch::settings::{LogFormat, LogSettings, Settings};
use podwatch_core::{HistoricalQuery, JsonLinesStore, Nanoseconds, Registry, TimeRange};

#[derive(Parser, Debug)]
#[command(name = "podwatch")]
#[command(about = "Telemetry ingestion server for a hyperloop pod", version)]
struct Cli {
    /// Settings file (TOML, YAML or JSON). PODWATCH_* variables override it.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ingest readings from the configured input (default)
    Run,

    /// Validate the pod registry and print a summary
    Check {
        /// Registry to check instead of the configured one
        registry: Option<PathBuf>,
    },

    /// Print stored readings for one pod and key as JSON lines
    History {
        pod_id: String,
        key: String,

        /// Start of the range, milliseconds since the epoch
        #[arg(long, default_value = "0")]
        from_ms: u64,

        /// End of the range, milliseconds since the epoch
        #[arg(long)]
        to_ms: Option<u64>,

        /// Point file to read instead of the configured store
        #[arg(long)]
        store: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref())?;
    init_tracing(&settings.log)?;

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run(&settings).await,
        Command::Check { registry } => check(registry.unwrap_or(settings.registry)),
        Command::History {
            pod_id,
            key,
            from_ms,
            to_ms,
            store,
        } => {
            let path = store.unwrap_or(settings.store.path);
            let range = TimeRange::new(
                Nanoseconds::from_millis(from_ms),
                to_ms.map_or(Nanoseconds(u64::MAX), Nanoseconds::from_millis),
            );
            history(path, &pod_id, &key, range).await
        }
    }
}

/// Logs go to stderr so `history` output stays clean.
fn init_tracing(log: &LogSettings) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&log.level)
            .with_context(|| format!("Invalid log level \"{}\"", log.level))?,
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match log.format {
        LogFormat::Plain => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
    Ok(())
}

async fn run(settings: &Settings) -> Result<()> {
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "podwatch starting");

    let server = Server::from_settings(settings).await?;
    let mut source = open_source(&settings.input).await?;
    server.run(source.as_mut(), shutdown_signal()).await;
    Ok(())
}

fn check(path: PathBuf) -> Result<()> {
    let registry = Registry::load(&path)
        .with_context(|| format!("Invalid registry {}", path.display()))?;

    println!("{}: {} pod(s)", path.display(), registry.len());
    for pod in registry.pods() {
        println!("{} \"{}\" ({:?})", pod.id, pod.label, pod.mode);
        for m in pod.measurements.values() {
            let warning = m
                .limits
                .warning
                .map(|w| format!(" warning [{}, {}]", w.low, w.high))
                .unwrap_or_default();
            println!(
                "  measurement {} [{}] {}: critical [{}, {}]{}",
                m.id, m.sensor_type, m.unit, m.limits.critical.low, m.limits.critical.high, warning
            );
        }
        for s in pod.statuses.values() {
            let values: Vec<String> = s
                .values
                .iter()
                .map(|v| format!("{}={}", v.value, v.label))
                .collect();
            println!("  status {} [{}]: {}", s.id, s.sensor_type, values.join(", "));
        }
    }
    Ok(())
}

async fn history(path: PathBuf, pod_id: &str, key: &str, range: TimeRange) -> Result<()> {
    if !path.exists() {
        anyhow::bail!("No point file at {}", path.display());
    }
    let store = JsonLinesStore::open(path.clone())
        .await
        .with_context(|| format!("Failed to open {}", path.display()))?;

    for row in store.query(pod_id, key, range).await? {
        println!("{}", serde_json::to_string(&row)?);
    }
    Ok(())
}
