//! Platform relay (v1)
//!
//! Exposes tag management, mass broadcast, template push and paginated
//! tag-member lookup of a messaging platform as simple JSON endpoints.
//!
//! # Architecture Overview
//!
//! ```text
//!                      ┌───────────────────────────────────────────────┐
//!                      │                PLATFORM RELAY                 │
//!                      │                                               │
//!   Frontend Request   │  ┌─────────┐    ┌──────────┐    ┌──────────┐  │
//!   ───────────────────┼─▶│  http   │───▶│ handlers │───▶│  relay   │  │
//!                      │  │ server  │    │ validate │    │  loops   │  │
//!                      │  └─────────┘    └──────────┘    └────┬─────┘  │
//!                      │                                      │        │
//!                      │                       pacing ◀──────┤        │
//!                      │                                      ▼        │
//!   Envelope / Relay   │  ┌─────────┐                   ┌──────────┐   │      Platform
//!   ◀──────────────────┼──│response │◀──────────────────│ upstream │◀──┼────▶ Open API
//!                      │  │envelope │                   │  client  │   │
//!                      │  └─────────┘                   └──────────┘   │
//!                      │                                               │
//!                      │  config (+ hot reload) · logging · shutdown   │
//!                      └───────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use platform_relay::config::{load_or_default, watcher::ConfigWatcher};
use platform_relay::lifecycle::{signals, Shutdown};
use platform_relay::observability::init_logging;
use platform_relay::HttpServer;

#[derive(Parser)]
#[command(name = "platform-relay")]
#[command(about = "HTTP relay for the messaging platform open API", long_about = None)]
struct Args {
    /// Path to a TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Reload the configuration file when it changes.
    #[arg(long, requires = "config")]
    watch: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = load_or_default(args.config.as_deref())?;
    init_logging(&config.observability)?;

    tracing::info!("platform-relay v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.base_url,
        upstream_timeout_secs = config.upstream.timeout_secs,
        pacing_ms = config.upstream.pacing_ms,
        "Configuration loaded"
    );

    // Keep the watcher alive for the lifetime of the server.
    let (_watcher, config_updates) = match args.config.as_deref() {
        Some(path) if args.watch => {
            let (watcher, updates) = ConfigWatcher::new(path);
            (Some(watcher.run()?), updates)
        }
        _ => {
            let (_, updates) = mpsc::unbounded_channel();
            (None, updates)
        }
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    signals::spawn_signal_handler(shutdown.clone());

    let server = HttpServer::new(config)?;
    server.run(listener, config_updates, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
