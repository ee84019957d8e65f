//! Per-connection delivery loop.
//!
//! The loop drains one connection's mailbox and writes each event through
//! the transport's writer. A failed write is the only thing that ends the
//! loop from this side; the other way out is the registry closing the
//! connection, which also abandons a write that is still in flight. Either
//! way the connection is unregistered and the writer is closed exactly
//! once, here.

use crate::metrics;
use crate::traits::EventWriter;
use herald_core::{ConnectionHandle, Registry};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Default time a delivery task waits on an empty mailbox before an idle check.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Upper bound on closing the writer once delivery has ended.
pub const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Delivery configuration.
#[derive(Debug, Clone)]
pub struct DeliveryConfig {
    /// How long to wait on an empty mailbox before checking the transport.
    /// Zero means [`DEFAULT_IDLE_TIMEOUT`].
    pub idle_timeout: Duration,
}

impl DeliveryConfig {
    /// The idle timeout actually used by the loop.
    #[must_use]
    pub fn effective_idle_timeout(&self) -> Duration {
        if self.idle_timeout.is_zero() {
            DEFAULT_IDLE_TIMEOUT
        } else {
            self.idle_timeout
        }
    }
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }
}

/// Why a delivery loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// The connection was unregistered elsewhere.
    Closed,
    /// Writing to the transport failed.
    WriteFailed,
    /// An idle check found the transport gone.
    TransportGone,
}

/// Drain `conn`'s mailbox into `writer` until the connection closes or a
/// write fails.
pub async fn deliver<W: EventWriter>(
    conn: ConnectionHandle,
    registry: Arc<Registry>,
    mut writer: W,
    config: DeliveryConfig,
) -> DeliveryOutcome {
    let transport = writer.name();
    let idle_timeout = config.effective_idle_timeout();
    debug!(connection = %conn.id(), transport, "Delivery started");

    let outcome = loop {
        match conn.mailbox().recv_timeout(idle_timeout).await {
            Ok(Some(event)) => {
                let written = tokio::select! {
                    _ = conn.closed() => None,
                    result = writer.write(&event) => Some(result),
                };
                match written {
                    None => {
                        debug!(connection = %conn.id(), "Write abandoned, connection closed");
                        break DeliveryOutcome::Closed;
                    }
                    Some(Ok(())) => {
                        conn.touch();
                        metrics::record_written(transport, event.is_heartbeat());
                        trace!(connection = %conn.id(), event = event.id(), "Delivered");
                    }
                    Some(Err(e)) => {
                        debug!(connection = %conn.id(), error = %e, "Write failed");
                        metrics::record_write_failure(transport);
                        break DeliveryOutcome::WriteFailed;
                    }
                }
            }
            Ok(None) => break DeliveryOutcome::Closed,
            Err(_) => {
                if !writer.is_open() {
                    break DeliveryOutcome::TransportGone;
                }
                trace!(connection = %conn.id(), "Idle");
            }
        }
    };

    conn.begin_close();
    registry.unregister(conn.id());
    match tokio::time::timeout(CLOSE_TIMEOUT, writer.close()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => trace!(connection = %conn.id(), error = %e, "Close failed"),
        Err(_) => warn!(connection = %conn.id(), "Close timed out"),
    }

    debug!(connection = %conn.id(), outcome = ?outcome, "Delivery finished");
    outcome
}
