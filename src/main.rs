//! Heart Disease Prediction API (v1)
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ TraceLayer ─▶ request id ─▶ request metrics ─▶ timeout ─▶ handler
//!                                                      │                          │
//!                                                      ▼                          ▼
//!                                               MetricsRegistry ◀──────── ModelSlot
//!                                                      │              (record_prediction,
//!                                                      ▼               update_model_status)
//!     Prometheus ◀──────────────────────────────── GET /metrics
//! ```
//!
//! The binary starts with an empty model slot; `/predict` answers 503 until an
//! embedding application installs a `Predictor`.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use heart_disease_mlops::config::{load_config, ServiceConfig};
use heart_disease_mlops::observability::{configure_logging, MetricsRegistry};
use heart_disease_mlops::{HttpServer, ModelSlot, Shutdown};

#[derive(Parser)]
#[command(name = "heart-disease-mlops")]
#[command(about = "Heart disease prediction API with Prometheus metrics", long_about = None)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the bind address.
    #[arg(short, long)]
    bind: Option<String>,

    /// Override the log level (DEBUG, INFO, WARNING, ERROR, CRITICAL).
    #[arg(long)]
    log_level: Option<String>,

    /// Emit JSON log lines.
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ServiceConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }
    if let Some(level) = cli.log_level {
        config.observability.log_level = level;
    }
    config.observability.json_logs |= cli.json_logs;

    configure_logging(&config.observability.log_level, config.observability.json_logs)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        bind_address = %config.listener.bind_address,
        request_timeout_secs = config.timeouts.request_secs,
        "heart-disease-mlops starting"
    );

    let metrics = MetricsRegistry::new()?;
    let models = Arc::new(ModelSlot::new(metrics.clone()));
    tracing::warn!("No model installed; /predict will answer 503 until one is loaded");

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    shutdown.trigger_on_signal();

    let server = HttpServer::new(config, metrics, models)?;
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
