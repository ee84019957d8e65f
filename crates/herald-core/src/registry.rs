//! Registry of live connections.
//!
//! The registry is the only structure shared and mutated by every
//! connection task. Register, unregister and snapshot all go through one
//! lock, so a snapshot never sees a half-inserted or half-removed entry.

use crate::connection::{Connection, ConnectionHandle, ConnectionId, ConnectionState, TransportKind};
use crate::mailbox::DEFAULT_MAILBOX_CAPACITY;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use thiserror::Error;
use tracing::{debug, info};

/// Registry errors.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Maximum number of live connections reached.
    #[error("Maximum connections reached ({0})")]
    CapacityReached(usize),
}

/// Registry configuration.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Capacity of each connection's mailbox.
    pub mailbox_capacity: usize,
    /// Maximum number of live connections.
    pub max_connections: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            mailbox_capacity: DEFAULT_MAILBOX_CAPACITY,
            max_connections: 10_000,
        }
    }
}

/// The set of live connections, keyed and ordered by ID.
pub struct Registry {
    connections: RwLock<BTreeMap<ConnectionId, ConnectionHandle>>,
    next_id: AtomicU64,
    total_registered: AtomicU64,
    config: RegistryConfig,
}

impl Registry {
    /// Create a new registry with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Create a new registry with custom configuration.
    #[must_use]
    pub fn with_config(config: RegistryConfig) -> Self {
        info!("Creating registry with config: {:?}", config);
        Self {
            connections: RwLock::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
            total_registered: AtomicU64::new(0),
            config,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<ConnectionId, ConnectionHandle>> {
        self.connections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<ConnectionId, ConnectionHandle>> {
        self.connections
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Register a new `Active` connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection limit is reached.
    pub fn register(&self, transport: TransportKind) -> Result<ConnectionHandle, RegistryError> {
        let mut connections = self.write();
        if connections.len() >= self.config.max_connections {
            return Err(RegistryError::CapacityReached(self.config.max_connections));
        }

        let id = ConnectionId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        let conn = Arc::new(Connection::new(
            id,
            transport,
            self.config.mailbox_capacity,
        ));
        connections.insert(id, Arc::clone(&conn));
        self.total_registered.fetch_add(1, Ordering::Relaxed);

        debug!(
            connection = %id,
            transport = transport.as_str(),
            connections = connections.len(),
            "Registered"
        );

        Ok(conn)
    }

    /// Remove a connection and mark it `Closed`.
    ///
    /// Idempotent. Returns `true` if the connection was present.
    pub fn unregister(&self, id: ConnectionId) -> bool {
        let mut connections = self.write();
        match connections.remove(&id) {
            Some(conn) => {
                conn.mark_closed();
                debug!(
                    connection = %id,
                    connections = connections.len(),
                    "Unregistered"
                );
                true
            }
            None => false,
        }
    }

    /// Point-in-time copy of all `Active` connections, ordered by ID.
    #[must_use]
    pub fn snapshot(&self) -> Vec<ConnectionHandle> {
        self.read()
            .values()
            .filter(|conn| conn.is_active())
            .cloned()
            .collect()
    }

    /// Look up a connection.
    #[must_use]
    pub fn get(&self, id: ConnectionId) -> Option<ConnectionHandle> {
        self.read().get(&id).cloned()
    }

    #[must_use]
    pub fn contains(&self, id: ConnectionId) -> bool {
        self.read().contains_key(&id)
    }

    /// Number of registered connections (`Active` or `Closing`).
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Get registry statistics.
    #[must_use]
    pub fn stats(&self) -> RegistryStats {
        let connections = self.read();
        let mut stats = RegistryStats {
            total_registered: self.total_registered.load(Ordering::Relaxed),
            ..RegistryStats::default()
        };
        for conn in connections.values() {
            match conn.state() {
                ConnectionState::Active => stats.active += 1,
                ConnectionState::Closing => stats.closing += 1,
                ConnectionState::Closed => {}
            }
            match conn.transport() {
                TransportKind::Push => stats.push += 1,
                TransportKind::Bidirectional => stats.bidirectional += 1,
            }
        }
        stats
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

/// Registry statistics.
#[derive(Debug, Clone, Default)]
pub struct RegistryStats {
    /// Connections in the `Active` state.
    pub active: usize,
    /// Connections in the `Closing` state.
    pub closing: usize,
    /// Registered push connections.
    pub push: usize,
    /// Registered bidirectional connections.
    pub bidirectional: usize,
    /// Connections registered since creation.
    pub total_registered: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_assigns_unique_ids() {
        let registry = Registry::new();
        let a = registry.register(TransportKind::Push).unwrap();
        let b = registry.register(TransportKind::Bidirectional).unwrap();

        assert_ne!(a.id(), b.id());
        assert!(a.id() < b.id());
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_unregister_is_idempotent() {
        let registry = Registry::new();
        let conn = registry.register(TransportKind::Push).unwrap();

        assert!(registry.unregister(conn.id()));
        assert!(!registry.unregister(conn.id()));
        assert_eq!(conn.state(), ConnectionState::Closed);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_self_unregistration_while_held() {
        let registry = Registry::new();
        let conn = registry.register(TransportKind::Bidirectional).unwrap();
        let held = registry.get(conn.id()).unwrap();

        assert!(registry.unregister(held.id()));
        assert!(!registry.contains(conn.id()));
        assert!(held.mailbox().is_closed());
    }

    #[test]
    fn test_snapshot_is_ordered_and_active_only() {
        let registry = Registry::new();
        let a = registry.register(TransportKind::Push).unwrap();
        let b = registry.register(TransportKind::Push).unwrap();
        let c = registry.register(TransportKind::Push).unwrap();

        b.begin_close();

        let ids: Vec<ConnectionId> = registry.snapshot().iter().map(|c| c.id()).collect();
        assert_eq!(ids, vec![a.id(), c.id()]);
        // Closing connections stay registered until unregistered
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let registry = Registry::new();
        let a = registry.register(TransportKind::Push).unwrap();
        let snapshot = registry.snapshot();

        registry.unregister(a.id());
        assert_eq!(snapshot.len(), 1);
        assert!(registry.snapshot().is_empty());
    }

    #[test]
    fn test_capacity_limit() {
        let registry = Registry::with_config(RegistryConfig {
            max_connections: 1,
            ..RegistryConfig::default()
        });

        let first = registry.register(TransportKind::Push).unwrap();
        assert!(matches!(
            registry.register(TransportKind::Push),
            Err(RegistryError::CapacityReached(1))
        ));

        registry.unregister(first.id());
        assert!(registry.register(TransportKind::Push).is_ok());
    }

    #[test]
    fn test_registry_stats() {
        let registry = Registry::new();
        let _a = registry.register(TransportKind::Push).unwrap();
        let b = registry.register(TransportKind::Bidirectional).unwrap();
        let c = registry.register(TransportKind::Bidirectional).unwrap();
        c.begin_close();
        registry.unregister(b.id());

        let stats = registry.stats();
        assert_eq!(stats.active, 1);
        assert_eq!(stats.closing, 1);
        assert_eq!(stats.push, 1);
        assert_eq!(stats.bidirectional, 1);
        assert_eq!(stats.total_registered, 3);
    }

    #[test]
    fn test_concurrent_register_unregister() {
        let registry = Arc::new(Registry::new());
        let threads: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        let conn = registry.register(TransportKind::Push).unwrap();
                        let _ = registry.snapshot();
                        registry.unregister(conn.id());
                    }
                })
            })
            .collect();

        for t in threads {
            t.join().unwrap();
        }
        assert!(registry.is_empty());
        assert_eq!(registry.stats().total_registered, 800);
    }
}
