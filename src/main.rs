//! Service guard gateway.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ ┌──────────────────────┐
//!                     │  interceptor chain   │  source tag, access log
//!                     └──────────┬───────────┘
//!                                ▼
//!                     ┌──────────────────────┐
//!                     │      handlers        │  demo, products, gateway, admin
//!                     └──────────┬───────────┘
//!                                ▼
//!                     ┌──────────────────────┐
//!                     │  resilient invoker   │  admission → work → record
//!                     └──────────┬───────────┘
//!                                ▼
//!                        unit of work / remote user service
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use service_guard::config::{load_config, ServiceConfig};
use service_guard::lifecycle::{build_server, signals, Shutdown};
use service_guard::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "service-guard")]
#[command(about = "Gateway with resource admission control and fallback", long_about = None)]
struct Cli {
    /// TOML config file. Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ServiceConfig::default(),
    };

    logging::init_logging(&config.observability.log_level);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "service-guard starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        service = %config.app.service_name,
        resources = config.resources.len(),
        request_timeout_secs = config.gateway.request_timeout_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let server = build_server(config)?;
    let shutdown = Shutdown::new();
    tokio::spawn(signals::shutdown_on_signal(shutdown.clone()));

    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
