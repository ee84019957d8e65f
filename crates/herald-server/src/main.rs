//! # Herald Server
//!
//! Realtime event distribution for the robot frontend: every robot response
//! is fanned out to all connected SSE and WebSocket subscribers.
//!
//! ## Usage
//!
//! ```bash
//! # Run with default settings
//! herald
//!
//! # Run with a specific config file
//! HERALD_CONFIG=/path/to/herald.toml herald
//!
//! # Run with environment variables
//! HERALD_PORT=8080 HERALD_HOST=0.0.0.0 herald
//! ```

mod config;
mod demo;
mod handlers;
mod metrics;

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_LOG_FILTER: &str = "herald=debug,tower_http=debug";

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = config::Config::load()?;
    tracing::info!(
        host = %config.host,
        port = config.port,
        push = config.transport.push,
        websocket = config.transport.websocket,
        "Starting Herald server"
    );

    metrics::init_metrics();
    handlers::run_server(config).await
}
