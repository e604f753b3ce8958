//! # RMS Telemetry
//!
//! Tail the logs of an RMS meteor camera and serve its status over HTTP.
//!
//! The log polling driver runs on its own thread and is the only writer of
//! the telemetry store; HTTP handlers only read from it.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{info, warn};

use rms_telemetry::archive::ArchiveReader;
use rms_telemetry::config::Config;
use rms_telemetry::driver::PollingDriver;
use rms_telemetry::server::{self, AppState};
use rms_telemetry::store::TelemetryStore;
use rms_telemetry::system::SystemMonitor;

/// Command line arguments. Anything given here overrides the config file.
#[derive(Debug, Parser)]
#[command(name = "rms-telemetry", version, about = "Serve RMS station telemetry over HTTP")]
struct Args {
    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Address to listen on
    #[arg(long)]
    ip: Option<String>,

    /// Port to listen on
    #[arg(long)]
    port: Option<u16>,

    /// Directory holding the RMS log files
    #[arg(short = 'd', long)]
    log_dir: Option<PathBuf>,
}

/// Build the effective configuration from the file (if any) and `args`.
fn resolve_config(args: &Args) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => Config::default(),
    };

    if let Some(ip) = &args.ip {
        config.server.ip = ip.clone();
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(log_dir) = &args.log_dir {
        config.logs.log_dir = log_dir.clone();
    }

    config.validate()?;
    Ok(config)
}

fn check_log_dir(log_dir: &Path) -> Result<()> {
    if !log_dir.is_dir() {
        bail!("Log directory {} does not exist", log_dir.display());
    }
    Ok(())
}

/// Main entry point for RMS Telemetry
///
/// # Control Flow
///
/// 1. **Initialization**
///    - Parse arguments and load configuration
///    - Set up logging with tracing subscriber
///    - Replay the existing logs into the store
///
/// 2. **Main Loop**
///    - Log polling driver on a dedicated thread
///    - HTTP server on the tokio runtime
///
/// 3. **Graceful Shutdown**
///    - Ctrl+C stops the server and signals the driver
///    - The driver thread is joined before exit
///
/// # Errors
///
/// Returns error if:
/// - Configuration is invalid or the log directory is missing
/// - The listening socket cannot be bound
#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let (writer, _guard) = tracing_appender::non_blocking(std::io::stdout());
    tracing_subscriber::fmt()
        .with_writer(writer)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("RMS Telemetry v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = resolve_config(&args)?;
    check_log_dir(&config.logs.log_dir)?;

    let store = Arc::new(TelemetryStore::new(config.history.max_history));
    let monitor = Arc::new(SystemMonitor::new(&config.logs.log_dir, &config.cache));
    let archive = Arc::new(ArchiveReader::new(
        &config.logs.log_dir,
        &config.archive,
        &config.cache,
    ));

    let mut driver = PollingDriver::new(&config, Arc::clone(&store));
    driver.bootstrap().context("Failed to replay existing logs")?;
    info!("Bootstrap done, {} runs in history", store.history_len());

    let shutdown = Arc::new(AtomicBool::new(false));
    let poller = driver
        .spawn(Arc::clone(&shutdown))
        .context("Failed to start log polling thread")?;

    let address = format!("{}:{}", config.server.ip, config.server.port);
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;
    info!("Listening on http://{}", address);
    info!("Press Ctrl+C to exit");

    let state = Arc::new(AppState {
        store,
        monitor,
        archive,
    });
    let stop = Arc::clone(&shutdown);
    let served = server::serve(listener, state, async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
        }
        info!("Received Ctrl+C, shutting down...");
        stop.store(true, Ordering::Relaxed);
    })
    .await;

    // The server may also stop on its own error
    shutdown.store(true, Ordering::Relaxed);
    if tokio::task::spawn_blocking(move || poller.join()).await?.is_err() {
        warn!("Log polling thread panicked");
    }

    served.context("HTTP server failed")?;
    info!("RMS Telemetry stopped");
    Ok(())
}
