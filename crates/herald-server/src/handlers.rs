//! HTTP handlers for the Herald server.
//!
//! This module wires the transports into axum routes and owns the
//! background tasks (heartbeats, stats, demo producer).

use crate::config::Config;
use crate::demo;
use crate::metrics::{self, ConnectionMetricsGuard};
use anyhow::{Context, Result};
use axum::{
    extract::{ws::WebSocketUpgrade, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use herald_core::{Broadcaster, HeartbeatScheduler, Registry, RegistryConfig, TransportKind};
use herald_transport::{
    delivery::DeliveryConfig, push, serve_bidirectional, split_socket, EchoHandler,
    InboundHandler, SocketConfig,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::{debug, error, info, warn};

/// Text published by the `/test/push` hook.
pub const TEST_PUSH_TEXT: &str = "This was pushed from server!";

const STATS_INTERVAL: Duration = Duration::from_secs(5);

/// Shared server state.
pub struct AppState {
    /// Connected subscribers.
    pub registry: Arc<Registry>,
    /// Fan-out entry point for producers.
    pub broadcaster: Arc<Broadcaster>,
    /// Handler for inbound WebSocket messages.
    pub handler: Arc<dyn InboundHandler>,
    /// Server configuration.
    pub config: Config,
}

impl AppState {
    /// Create new app state.
    #[must_use]
    pub fn new(config: Config) -> Self {
        let registry = Arc::new(Registry::with_config(RegistryConfig {
            mailbox_capacity: config.limits.mailbox_capacity,
            max_connections: config.limits.max_connections,
        }));

        Self {
            broadcaster: Arc::new(Broadcaster::new(Arc::clone(&registry))),
            registry,
            handler: Arc::new(EchoHandler),
            config,
        }
    }

    fn delivery_config(&self) -> DeliveryConfig {
        DeliveryConfig {
            idle_timeout: self.config.heartbeat.idle_timeout(),
        }
    }

    fn socket_config(&self) -> SocketConfig {
        SocketConfig {
            delivery: self.delivery_config(),
            max_message_size: self.config.limits.max_message_size,
        }
    }
}

/// Build the axum router for `state`.
pub fn build_router(state: Arc<AppState>) -> Router {
    let config = &state.config;
    let mut app = Router::new()
        .route("/health", get(health_handler))
        .route("/test/push", get(test_push_handler));

    if config.transport.push {
        app = app.route(&config.transport.push_path, get(push_handler));
    }
    if config.transport.websocket {
        app = app.route(&config.transport.websocket_path, get(ws_handler));
    }

    let cors = config.transport.cors;
    let app = app.with_state(state);
    if cors {
        app.layer(CorsLayer::permissive())
    } else {
        app
    }
}

/// Run the HTTP server.
///
/// # Errors
///
/// Returns an error if the server fails to start.
pub async fn run_server(config: Config) -> Result<()> {
    let state = Arc::new(AppState::new(config.clone()));

    // Start metrics server if enabled
    if config.metrics.enabled {
        if let Err(e) = metrics::start_metrics_server(config.metrics.port) {
            error!("Failed to start metrics server: {}", e);
        }
    }

    let _heartbeats =
        HeartbeatScheduler::new(Arc::clone(&state.registry), config.heartbeat.interval()).spawn();
    let _stats = spawn_stats_reporter(Arc::clone(&state.broadcaster));
    if config.demo.enabled {
        info!("Demo producer enabled");
        let _demo = demo::spawn(Arc::clone(&state.broadcaster));
    }

    let app = build_router(state);

    // Bind and serve
    let addr = config.bind_addr()?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("Herald server listening on {}", addr);
    if config.transport.push {
        info!("Push endpoint: http://{}{}", addr, config.transport.push_path);
    }
    if config.transport.websocket {
        info!(
            "WebSocket endpoint: ws://{}{}",
            addr, config.transport.websocket_path
        );
    }

    axum::serve(listener, app).await?;

    Ok(())
}

fn spawn_stats_reporter(broadcaster: Arc<Broadcaster>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(STATS_INTERVAL);
        loop {
            ticker.tick().await;
            metrics::set_fanout(broadcaster.stats());
        }
    })
}

/// Health check handler.
async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let stats = state.registry.stats();
    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "connections": {
            "push": stats.push,
            "websocket": stats.bidirectional,
        }
    }))
}

/// Producer test hook.
async fn test_push_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let recipients = state.broadcaster.send_response(TEST_PUSH_TEXT, None);
    debug!(recipients, "Test push published");
    axum::Json(serde_json::json!({
        "status": "pushed",
        "recipients": recipients,
    }))
}

/// SSE subscription handler.
async fn push_handler(State(state): State<Arc<AppState>>) -> Response {
    let sub = match push::subscribe(&state.registry, state.delivery_config()) {
        Ok(sub) => sub,
        Err(e) => {
            warn!(error = %e, "Push subscription refused");
            metrics::record_rejection(TransportKind::Push);
            return StatusCode::SERVICE_UNAVAILABLE.into_response();
        }
    };

    let guard = ConnectionMetricsGuard::new(TransportKind::Push);
    let connection = sub.connection.id();
    let task = sub.task;
    tokio::spawn(async move {
        let _guard = guard;
        match task.await {
            Ok(outcome) => debug!(%connection, ?outcome, "Push subscriber gone"),
            Err(e) => error!(%connection, error = %e, "Push delivery task failed"),
        }
    });

    sub.stream.into_response()
}

/// WebSocket upgrade handler.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    let conn = match state.registry.register(TransportKind::Bidirectional) {
        Ok(conn) => conn,
        Err(e) => {
            warn!(error = %e, "WebSocket connection refused");
            metrics::record_rejection(TransportKind::Bidirectional);
            return StatusCode::SERVICE_UNAVAILABLE.into_response();
        }
    };

    let registry = Arc::clone(&state.registry);
    let id = conn.id();
    // Oversized messages are discarded by the session, not by the protocol layer
    ws.on_failed_upgrade(move |e| {
        warn!(connection = %id, error = %e, "WebSocket upgrade failed");
        registry.unregister(id);
    })
    .on_upgrade(move |socket| async move {
        let _guard = ConnectionMetricsGuard::new(TransportKind::Bidirectional);
        debug!(connection = %id, "WebSocket connected");

        let (writer, source) = split_socket(socket);
        let outcome = serve_bidirectional(
            Arc::clone(&state.registry),
            conn,
            writer,
            source,
            Arc::clone(&state.handler),
            state.socket_config(),
        )
        .await;

        debug!(
            connection = %id,
            read = ?outcome.read,
            delivery = ?outcome.delivery,
            "WebSocket disconnected"
        );
    })
}
