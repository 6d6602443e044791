//! leafscan Prediction Server
//!
//! Loads the configured disease model once, then serves `GET /`,
//! `GET /health` and `POST /predict`.

use std::net::SocketAddr;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use leafscan::utils::{init_logging, LogConfig, LogLevel};
use leafscan::{InferenceService, ServiceConfig};
use leafscan_server::router_for;

/// leafscan Prediction Server
#[derive(Parser, Debug)]
#[command(name = "leafscan-server")]
#[command(version)]
#[command(about = "HTTP API server for bean and maize leaf disease prediction")]
struct Cli {
    /// Port to listen on
    #[arg(short, long, env = "LEAF_PORT", default_value = "8000")]
    port: u16,

    /// Host to bind to
    #[arg(long, env = "LEAF_HOST", default_value = "0.0.0.0")]
    host: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LEAF_LOG", default_value = "info")]
    log_level: String,

    #[command(flatten)]
    service: ServiceConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_config = LogConfig::production().with_level(LogLevel::parse(&cli.log_level));
    init_logging(&log_config).map_err(anyhow::Error::msg)?;

    info!("leafscan server v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration:");
    info!("  Mock model:  {}", cli.service.mock_model);
    info!("  Model path:  {:?}", cli.service.model_path);
    if !cli.service.model_format.is_empty() {
        info!("  Format:      {}", cli.service.model_format);
    }

    // Model and vocabulary must be ready before the listener accepts requests
    let service_config = cli.service.clone();
    let service = tokio::task::spawn_blocking(move || InferenceService::from_config(&service_config))
        .await
        .context("Model loading task failed")?
        .context("Failed to load the disease model")?;
    info!("Model version: {}", service.model_version());
    info!("Labels: {}", service.labels().join(", "));

    let app = router_for(service);

    let addr: SocketAddr = format!("{}:{}", cli.host, cli.port).parse()?;
    info!("Starting server on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
