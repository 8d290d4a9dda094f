//! Trace-propagating call orchestrator
//!
//! An HTTP service that fans requests out to two downstream services and
//! keeps one correlation identifier and one W3C trace across every hop.
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌──────────────────────────────────────────────────┐
//!                        │                  ORCHESTRATOR                    │
//!                        │                                                  │
//!   Client Request       │  ┌──────────┐    ┌──────────┐    ┌────────────┐  │
//!   ─────────────────────┼─▶│  http    │───▶│ context  │───▶│  handlers  │  │
//!   X-Trace-ID?          │  │  server  │    │ resolver │    │            │  │
//!   traceparent?         │  └──────────┘    └──────────┘    └─────┬──────┘  │
//!                        │                                        │         │
//!                        │                                        ▼         │
//!                        │                               ┌──────────────┐   │
//!                        │                               │ orchestrator │   │
//!                        │                               │  patterns    │   │
//!                        │                               └──────┬───────┘   │
//!                        │                                      │           │
//!                        │                                      ▼           │      Service B
//!   Client Response      │  ┌──────────┐    ┌──────────┐  ┌────────────┐    │      Service C
//!   ◀────────────────────┼──│ envelope │◀───│ outcomes │◀─│  outbound  │◀───┼────▶ (child
//!   X-Trace-ID           │  │  + status│    │  merged  │  │  client    │    │       carriers)
//!                        │  └──────────┘    └──────────┘  └────────────┘    │
//!                        │                                                  │
//!                        │  ┌────────────────────────────────────────────┐  │
//!                        │  │  config │ observability │ lifecycle        │  │
//!                        │  └────────────────────────────────────────────┘  │
//!                        └──────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use trace_orchestrator::config::load_config;
use trace_orchestrator::http::HttpServer;
use trace_orchestrator::lifecycle::{spawn_signal_handler, Shutdown};
use trace_orchestrator::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "trace-orchestrator")]
#[command(about = "Call orchestrator with end-to-end trace propagation", long_about = None)]
struct Args {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = load_config(args.config.as_deref())?;
    let _telemetry = logging::init_logging(&config.observability)?;

    tracing::info!(
        service = %config.observability.service_name,
        version = env!("CARGO_PKG_VERSION"),
        "trace-orchestrator starting"
    );
    tracing::info!(
        bind_address = %config.listener.bind_address,
        service_b = %config.downstream.service_b_url,
        service_c = %config.downstream.service_c_url,
        call_timeout_ms = config.timeouts.call_ms,
        request_timeout_ms = config.timeouts.request_ms,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    spawn_signal_handler(shutdown.clone());

    let server = HttpServer::new(config)?;
    server.run(listener, shutdown.subscribe()).await?;

    let pending = shutdown.receiver_count();
    if pending > 0 {
        tracing::warn!(pending, "Tasks still subscribed to shutdown");
    }
    tracing::info!("Shutdown complete");
    Ok(())
}
