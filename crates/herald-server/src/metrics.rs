//! Metrics collection and export for Herald.
//!
//! Uses the `metrics` crate for instrumentation and exports
//! to Prometheus format. Per-write counters live in `herald-transport`;
//! this module owns connection and fan-out metrics.

use herald_core::{BroadcasterStats, TransportKind};
use herald_transport::metrics::names as transport_names;
use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::info;

/// Metric names.
pub mod names {
    pub const CONNECTIONS_TOTAL: &str = "herald_connections_total";
    pub const CONNECTIONS_ACTIVE: &str = "herald_connections_active";
    pub const CONNECTIONS_REJECTED: &str = "herald_connections_rejected_total";
    pub const EVENTS_PUBLISHED: &str = "herald_events_published_total";
    pub const DELIVERIES: &str = "herald_deliveries_total";
    pub const DISPLACED: &str = "herald_events_displaced_total";
}

/// Initialize the metrics system.
pub fn init_metrics() {
    metrics::describe_counter!(
        names::CONNECTIONS_TOTAL,
        "Total number of connections since server start"
    );
    metrics::describe_gauge!(
        names::CONNECTIONS_ACTIVE,
        "Current number of open connections"
    );
    metrics::describe_counter!(
        names::CONNECTIONS_REJECTED,
        "Connections refused because the registry was full"
    );
    metrics::describe_counter!(names::EVENTS_PUBLISHED, "Events handed to the broadcaster");
    metrics::describe_counter!(names::DELIVERIES, "Events enqueued into mailboxes");
    metrics::describe_counter!(
        names::DISPLACED,
        "Events dropped from full mailboxes to make room"
    );
    metrics::describe_counter!(
        transport_names::EVENTS_WRITTEN,
        "Events written to a transport"
    );
    metrics::describe_counter!(
        transport_names::HEARTBEATS_WRITTEN,
        "Heartbeats written to a transport"
    );
    metrics::describe_counter!(transport_names::WRITE_FAILURES, "Failed transport writes");
    metrics::describe_counter!(
        transport_names::INBOUND_MESSAGES,
        "Decoded inbound messages"
    );
    metrics::describe_counter!(
        transport_names::DECODE_FAILURES,
        "Malformed inbound frames discarded"
    );

    info!("Metrics initialized");
}

/// Start the Prometheus metrics server.
///
/// # Errors
///
/// Returns an error if the server cannot be started.
pub fn start_metrics_server(port: u16) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("0.0.0.0:{}", port).parse()?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;

    info!("Metrics server listening on {}", addr);
    Ok(())
}

/// Record a connection refused at capacity.
pub fn record_rejection(transport: TransportKind) {
    counter!(names::CONNECTIONS_REJECTED, "transport" => transport.as_str()).increment(1);
}

/// Mirror the broadcaster's running totals.
pub fn set_fanout(stats: BroadcasterStats) {
    counter!(names::EVENTS_PUBLISHED).absolute(stats.published);
    counter!(names::DELIVERIES).absolute(stats.deliveries);
    counter!(names::DISPLACED).absolute(stats.displaced);
}

/// Metrics guard that records disconnection on drop.
pub struct ConnectionMetricsGuard {
    transport: &'static str,
}

impl ConnectionMetricsGuard {
    /// Create a new metrics guard, recording a connection.
    #[must_use]
    pub fn new(transport: TransportKind) -> Self {
        let transport = transport.as_str();
        counter!(names::CONNECTIONS_TOTAL, "transport" => transport).increment(1);
        gauge!(names::CONNECTIONS_ACTIVE, "transport" => transport).increment(1.0);
        Self { transport }
    }
}

impl Drop for ConnectionMetricsGuard {
    fn drop(&mut self) {
        gauge!(names::CONNECTIONS_ACTIVE, "transport" => self.transport).decrement(1.0);
    }
}
