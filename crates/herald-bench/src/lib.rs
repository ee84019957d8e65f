//! Shared fixtures for the Herald benchmarks.

use herald_core::{ConnectionHandle, Registry, RegistryConfig, TransportKind};
use std::sync::Arc;

/// A registry holding `n` push connections.
///
/// The connections are returned as well so callers can drain them.
pub fn populated_registry(n: usize, mailbox_capacity: usize) -> (Arc<Registry>, Vec<ConnectionHandle>) {
    let registry = Arc::new(Registry::with_config(RegistryConfig {
        mailbox_capacity,
        max_connections: n.max(1),
    }));
    let connections = (0..n)
        .filter_map(|_| registry.register(TransportKind::Push).ok())
        .collect();
    (registry, connections)
}

/// Empty every mailbox, returning how many events were removed.
pub fn drain(connections: &[ConnectionHandle]) -> usize {
    connections
        .iter()
        .map(|conn| std::iter::from_fn(|| conn.mailbox().try_recv()).count())
        .sum()
}

/// Whether a text message received on the WebSocket is a robot response.
pub fn is_robot_response(text: &str) -> bool {
    serde_json::from_str::<serde_json::Value>(text)
        .map(|v| v["type"] == "robot_response")
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use herald_core::Broadcaster;

    #[test]
    fn test_populated_registry() {
        let (registry, connections) = populated_registry(10, 4);
        assert_eq!(registry.len(), 10);
        assert_eq!(connections.len(), 10);

        let broadcaster = Broadcaster::new(Arc::clone(&registry));
        for _ in 0..6 {
            broadcaster.send_response("tick", None);
        }
        assert_eq!(drain(&connections), 40);
        assert_eq!(drain(&connections), 0);
    }

    #[test]
    fn test_is_robot_response() {
        assert!(is_robot_response(
            r#"{"type":"robot_response","text":"hi","hasAudio":false,"audioData":null}"#
        ));
        assert!(!is_robot_response(r#"{"type":"heartbeat"}"#));
        assert!(!is_robot_response("garbage"));
    }
}
