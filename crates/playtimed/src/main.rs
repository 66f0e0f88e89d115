//! playtimed - job eligibility and play-time tracking service
//!
//! Reads NDJSON requests on stdin and writes responses and client
//! messages as NDJSON on stdout. Logs go to stderr.

use anyhow::{Context, Result};
use clap::Parser;
use playtime_api::Event;
use playtime_config::load_config;
use playtime_store::{AuditEvent, AuditEventType, SqliteStore, Store};
use playtime_util::{DB_FILENAME, MonotonicInstant, default_config_path};
use playtimed::Service;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::signal::unix::{SignalKind, signal};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// playtimed - Job eligibility and play-time tracking service
#[derive(Parser, Debug)]
#[command(name = "playtimed")]
#[command(about = "Job eligibility and play-time tracking service", long_about = None)]
struct Args {
    /// Catalog file path (default: ~/.config/playtime/config.toml)
    #[arg(short, long, default_value_os_t = default_config_path())]
    config: PathBuf,

    /// Data directory override (or set PLAYTIME_DATA_DIR env var)
    #[arg(short, long, env = "PLAYTIME_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Accounting tick in milliseconds
    #[arg(long, default_value_t = 1000)]
    tick_ms: u64,
}

async fn write_line<W, T>(out: &mut W, value: &T) -> Result<()>
where
    W: AsyncWriteExt + Unpin,
    T: Serialize,
{
    let mut json = serde_json::to_string(value)?;
    json.push('\n');
    out.write_all(json.as_bytes()).await?;
    out.flush().await?;
    Ok(())
}

async fn run(args: Args) -> Result<()> {
    let catalog = load_config(&args.config)
        .with_context(|| format!("Failed to load config from {:?}", args.config))?;

    info!(
        config_path = %args.config.display(),
        job_count = catalog.jobs.len(),
        "Configuration loaded"
    );

    let data_dir = args
        .data_dir
        .clone()
        .unwrap_or_else(|| catalog.service.data_dir.clone());

    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("Failed to create data directory {:?}", data_dir))?;

    let db_path = data_dir.join(DB_FILENAME);
    let store: Arc<dyn Store> = Arc::new(
        SqliteStore::open(&db_path)
            .with_context(|| format!("Failed to open database {:?}", db_path))?,
    );

    info!(db_path = %db_path.display(), "Store initialized");

    store.append_audit(AuditEvent::new(AuditEventType::ServiceStarted))?;

    let (mut service, mut outbox) = Service::new(catalog, store);

    let mut sigterm = signal(SignalKind::terminate()).context("Failed to create SIGTERM handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("Failed to create SIGINT handler")?;

    let mut tick_timer = tokio::time::interval(Duration::from_millis(args.tick_ms.max(1)));
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    info!("Service running");

    loop {
        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down gracefully");
                break;
            }
            _ = sigint.recv() => {
                info!("Received SIGINT, shutting down gracefully");
                break;
            }

            _ = tick_timer.tick() => {
                service.tick(MonotonicInstant::now());
            }

            Some(message) = outbox.recv() => {
                debug!(user_id = %message.user_id(), "Sending client message");
                write_line(&mut stdout, &Event::new(message)).await?;
            }

            line = lines.next_line() => {
                match line.context("Failed to read stdin")? {
                    Some(line) => {
                        if let Some(response) = service.handle_line(&line) {
                            write_line(&mut stdout, &response).await?;
                        }
                    }
                    None => {
                        info!("stdin closed, shutting down");
                        break;
                    }
                }
            }
        }
    }

    info!("Shutting down playtimed");
    service.shutdown();

    // Flush anything the final save queued.
    while let Ok(message) = outbox.try_recv() {
        write_line(&mut stdout, &Event::new(message)).await?;
    }

    info!("Shutdown complete");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "playtimed starting");

    run(args).await
}
