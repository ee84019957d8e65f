//! Transport-level metrics.
//!
//! Recorded through the `metrics` facade; the server installs the exporter.

use metrics::counter;

/// Metric names.
pub mod names {
    pub const EVENTS_WRITTEN: &str = "herald_events_written_total";
    pub const HEARTBEATS_WRITTEN: &str = "herald_heartbeats_written_total";
    pub const WRITE_FAILURES: &str = "herald_write_failures_total";
    pub const INBOUND_MESSAGES: &str = "herald_inbound_messages_total";
    pub const DECODE_FAILURES: &str = "herald_decode_failures_total";
}

/// Record a successful write.
pub fn record_written(transport: &'static str, heartbeat: bool) {
    let name = if heartbeat {
        names::HEARTBEATS_WRITTEN
    } else {
        names::EVENTS_WRITTEN
    };
    counter!(name, "transport" => transport).increment(1);
}

/// Record a failed write.
pub fn record_write_failure(transport: &'static str) {
    counter!(names::WRITE_FAILURES, "transport" => transport).increment(1);
}

/// Record a decoded inbound message.
pub fn record_inbound() {
    counter!(names::INBOUND_MESSAGES).increment(1);
}

/// Record a discarded malformed inbound frame.
pub fn record_decode_failure() {
    counter!(names::DECODE_FAILURES).increment(1);
}
