//! MCP gateway
//!
//! # Architecture Overview
//!
//! ```text
//!                         ┌──────────────────────────────────────────────────┐
//!                         │                    GATEWAY                       │
//!     Client Request      │  ┌──────────┐   ┌──────────┐   ┌─────────────┐   │
//!     ────────────────────┼─▶│   net    │──▶│   http   │──▶│   routing   │   │
//!                         │  │ listener │   │  server  │   │ (prefixes)  │   │
//!                         │  └──────────┘   └────┬─────┘   └──────┬──────┘   │
//!                         │                      │                ▼          │
//!                         │               ┌──────┴─────┐   ┌─────────────┐   │
//!                         │               │   admin    │   │    proxy    │───┼──▶ Backend
//!                         │               │ /register  │   │   handler   │   │    MCP server
//!                         │               │ /overview  │   └──────┬──────┘   │
//!                         │               └────────────┘          ▼          │
//!     Client Response     │                                ┌─────────────┐   │
//!     ◀───────────────────┼────────────────────────────────│     sse     │◀──┼─── event stream
//!                         │                                │  rewriter   │   │
//!                         │                                └─────────────┘   │
//!                         └──────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use mcp_gateway::config;
use mcp_gateway::lifecycle::{wait_for_signal, Shutdown};
use mcp_gateway::net::Listener;
use mcp_gateway::observability::{logging, metrics};
use mcp_gateway::HttpServer;

#[derive(Parser)]
#[command(name = "mcp-gateway")]
#[command(about = "Reverse proxy for MCP servers over SSE", long_about = None)]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen port, overriding the file and MCP_GATEWAY_PORT
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = config::load(args.config.as_deref(), args.port)?;

    logging::init(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "mcp-gateway starting");

    tracing::info!(
        bind_address = %config.listener.bind_address,
        max_connections = config.listener.max_connections,
        header_read_secs = config.timeouts.header_read_secs,
        routes = config.routes.len(),
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

    let listener = Listener::bind(&config.listener).await?;
    let server = HttpServer::new(config)?;

    let shutdown = Shutdown::new();
    let receiver = shutdown.subscribe();
    tokio::spawn(async move {
        wait_for_signal().await;
        shutdown.trigger();
    });

    server.run(listener, receiver).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
