//! Subscriber connections.
//!
//! A connection is created by the registry on a successful transport
//! handshake and moves through `Active -> Closing -> Closed`. The state never
//! regresses and a closed connection is never reused.

use crate::mailbox::Mailbox;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::debug;

/// Unique identifier for a connection, assigned by the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Create a connection ID from its numeric value.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    #[must_use]
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Lifecycle state of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConnectionState {
    /// Receiving events.
    Active,
    /// A transport failure or close was observed; cleanup pending.
    Closing,
    /// Removed from the registry.
    Closed,
}

/// Which transport a connection uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    /// One-way push (Server-Sent Events).
    Push,
    /// Full-duplex (WebSocket).
    Bidirectional,
}

impl TransportKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportKind::Push => "sse",
            TransportKind::Bidirectional => "websocket",
        }
    }
}

/// Shared handle to a live connection.
pub type ConnectionHandle = Arc<Connection>;

/// A live subscriber.
#[derive(Debug)]
pub struct Connection {
    id: ConnectionId,
    transport: TransportKind,
    mailbox: Mailbox,
    state: watch::Sender<ConnectionState>,
    last_activity: Mutex<Instant>,
    connected_at: Instant,
}

impl Connection {
    pub(crate) fn new(id: ConnectionId, transport: TransportKind, mailbox_capacity: usize) -> Self {
        let (state, _) = watch::channel(ConnectionState::Active);
        let now = Instant::now();
        Self {
            id,
            transport,
            mailbox: Mailbox::new(mailbox_capacity),
            state,
            last_activity: Mutex::new(now),
            connected_at: now,
        }
    }

    #[must_use]
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    #[must_use]
    pub fn transport(&self) -> TransportKind {
        self.transport
    }

    /// The connection's mailbox.
    #[must_use]
    pub fn mailbox(&self) -> &Mailbox {
        &self.mailbox
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state() == ConnectionState::Active
    }

    /// Move from `Active` to `Closing`.
    ///
    /// Returns `true` if this call made the transition.
    pub fn begin_close(&self) -> bool {
        let changed = self.state.send_if_modified(|state| {
            if *state == ConnectionState::Active {
                *state = ConnectionState::Closing;
                true
            } else {
                false
            }
        });
        if changed {
            debug!(connection = %self.id, "Connection closing");
        }
        changed
    }

    /// Move to `Closed` and close the mailbox.
    ///
    /// Only the registry calls this, while removing the connection.
    pub(crate) fn mark_closed(&self) {
        self.state.send_if_modified(|state| {
            if *state == ConnectionState::Closed {
                false
            } else {
                *state = ConnectionState::Closed;
                true
            }
        });
        self.mailbox.close();
    }

    /// Wait until the connection reaches `Closed`.
    pub async fn closed(&self) {
        let mut rx = self.state.subscribe();
        // The sender lives as long as `self`, so this only returns once closed.
        let _ = rx.wait_for(|state| *state == ConnectionState::Closed).await;
    }

    /// Record a successful outbound write.
    pub fn touch(&self) {
        *self
            .last_activity
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Instant::now();
    }

    /// Time of the last successful outbound write (or of registration).
    #[must_use]
    pub fn last_activity(&self) -> Instant {
        *self
            .last_activity
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// How long the connection has been idle as of `now`.
    #[must_use]
    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_activity())
    }

    /// How long the connection has been open.
    #[must_use]
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }
}
