//! Memento MCP Server
//!
//! Exposes Memento's memory store, hybrid search, pin/unpin, forget, and
//! context-injection tools to an agent over a line-delimited JSON-RPC
//! transport on stdio.

mod protocol;
mod server;
mod tools;

use std::io;
use std::path::PathBuf;

use clap::Parser;
use memento_core::config::Config;
use memento_core::MemoryEngine;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::protocol::stdio::StdioTransport;
use crate::server::McpServer;

/// Memory service for AI agents, spoken over the Model Context Protocol.
#[derive(Parser, Debug)]
#[command(name = "memento-mcp", version, about)]
struct Cli {
    /// Path to the SQLite database file. Defaults to `memento.db` inside the
    /// platform data directory.
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Path to a TOML configuration file (spec §6). Missing or absent file
    /// falls back to built-in defaults.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .with_writer(io::stderr)
        .with_target(false)
        .with_ansi(false)
        .init();

    info!("memento-mcp v{} starting", env!("CARGO_PKG_VERSION"));

    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!("failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let engine = match MemoryEngine::new(cli.data_dir, config) {
        Ok(engine) => engine,
        Err(e) => {
            error!("failed to initialize memory engine: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = engine.start_scheduler() {
        error!("failed to start scheduler: {}", e);
        std::process::exit(1);
    }

    let server = McpServer::new(engine);
    let transport = StdioTransport::new();

    info!("listening on stdio");
    if let Err(e) = transport.run(server).await {
        error!("server error: {}", e);
        std::process::exit(1);
    }

    info!("memento-mcp shutting down");
}
