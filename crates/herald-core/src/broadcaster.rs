//! Event fan-out.
//!
//! The broadcaster copies each published event into the mailbox of every
//! live connection. It never waits on a subscriber and never fails: a
//! disconnected peer is not the publisher's problem.

use crate::event::Event;
use crate::mailbox::Enqueued;
use crate::registry::Registry;
use bytes::Bytes;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

/// Fans events out to every registered connection.
pub struct Broadcaster {
    registry: Arc<Registry>,
    published: AtomicU64,
    deliveries: AtomicU64,
    displaced: AtomicU64,
}

impl Broadcaster {
    /// Create a broadcaster over the given registry.
    #[must_use]
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            published: AtomicU64::new(0),
            deliveries: AtomicU64::new(0),
            displaced: AtomicU64::new(0),
        }
    }

    /// The registry this broadcaster fans out to.
    #[must_use]
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Publish an event to every live connection.
    ///
    /// Returns the number of connections whose mailbox accepted the event.
    pub fn publish(&self, event: Event) -> usize {
        self.publish_shared(Arc::new(event))
    }

    /// Publish an already shared event.
    pub fn publish_shared(&self, event: Arc<Event>) -> usize {
        let mut recipients = 0;

        for conn in self.registry.snapshot() {
            match conn.mailbox().enqueue(Arc::clone(&event)) {
                Enqueued::Queued => recipients += 1,
                Enqueued::DisplacedOldest => {
                    recipients += 1;
                    self.displaced.fetch_add(1, Ordering::Relaxed);
                    trace!(connection = %conn.id(), "Slow subscriber, dropped oldest event");
                }
                Enqueued::Closed => {
                    trace!(connection = %conn.id(), "Skipping closed mailbox");
                }
            }
        }

        self.published.fetch_add(1, Ordering::Relaxed);
        self.deliveries
            .fetch_add(recipients as u64, Ordering::Relaxed);
        debug!(event = event.id(), kind = ?event.kind(), recipients, "Published event");

        recipients
    }

    /// Build a robot response from `text` and optional audio, and publish it.
    ///
    /// This is the entry point for robot-control and task-intake producers.
    pub fn send_response(&self, text: impl Into<String>, audio: Option<Bytes>) -> usize {
        self.publish(Event::robot_response(text, audio))
    }

    /// Get broadcaster statistics.
    #[must_use]
    pub fn stats(&self) -> BroadcasterStats {
        BroadcasterStats {
            published: self.published.load(Ordering::Relaxed),
            deliveries: self.deliveries.load(Ordering::Relaxed),
            displaced: self.displaced.load(Ordering::Relaxed),
        }
    }
}

/// Broadcaster statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcasterStats {
    /// Events published.
    pub published: u64,
    /// Mailbox enqueues across all publishes.
    pub deliveries: u64,
    /// Events dropped from full mailboxes.
    pub displaced: u64,
}
