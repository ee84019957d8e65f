//! Bounded per-subscriber event queue.
//!
//! A mailbox is written by the broadcaster and the heartbeat scheduler and
//! drained by exactly one delivery task. Enqueue never waits: when the queue
//! is full the oldest pending event is displaced.

use crate::event::Event;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::error::Elapsed;
use tracing::trace;

/// Default mailbox capacity.
pub const DEFAULT_MAILBOX_CAPACITY: usize = 64;

/// Outcome of an enqueue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enqueued {
    /// The event was appended.
    Queued,
    /// The event was appended after dropping the oldest pending event.
    DisplacedOldest,
    /// The mailbox is closed; the event was discarded.
    Closed,
}

impl Enqueued {
    /// Whether the event is now pending in the mailbox.
    #[must_use]
    pub fn is_accepted(&self) -> bool {
        !matches!(self, Enqueued::Closed)
    }
}

/// A bounded FIFO of shared events.
#[derive(Debug)]
pub struct Mailbox {
    queue: Mutex<VecDeque<Arc<Event>>>,
    notify: Notify,
    closed: AtomicBool,
    capacity: usize,
    displaced: AtomicU64,
}

impl Mailbox {
    /// Create a mailbox holding at most `capacity` events (minimum 1).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            queue: Mutex::new(VecDeque::with_capacity(capacity)),
            notify: Notify::new(),
            closed: AtomicBool::new(false),
            capacity,
            displaced: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Arc<Event>>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append an event, dropping the oldest one if full.
    pub fn enqueue(&self, event: Arc<Event>) -> Enqueued {
        if self.is_closed() {
            return Enqueued::Closed;
        }

        let outcome = {
            let mut queue = self.lock();
            let outcome = if queue.len() >= self.capacity {
                if let Some(old) = queue.pop_front() {
                    trace!(event = old.id(), "Mailbox full, displacing oldest event");
                }
                self.displaced.fetch_add(1, Ordering::Relaxed);
                Enqueued::DisplacedOldest
            } else {
                Enqueued::Queued
            };
            queue.push_back(event);
            outcome
        };

        self.notify.notify_one();
        outcome
    }

    /// Take the next event without waiting.
    pub fn try_recv(&self) -> Option<Arc<Event>> {
        if self.is_closed() {
            return None;
        }
        self.lock().pop_front()
    }

    /// Wait for the next event.
    ///
    /// Returns `None` once the mailbox is closed.
    pub async fn recv(&self) -> Option<Arc<Event>> {
        loop {
            if self.is_closed() {
                return None;
            }
            if let Some(event) = self.lock().pop_front() {
                return Some(event);
            }
            self.notify.notified().await;
        }
    }

    /// Wait for the next event for at most `timeout`.
    ///
    /// # Errors
    ///
    /// Returns `Elapsed` if nothing arrived in time.
    pub async fn recv_timeout(&self, timeout: Duration) -> Result<Option<Arc<Event>>, Elapsed> {
        tokio::time::timeout(timeout, self.recv()).await
    }

    /// Close the mailbox, discarding pending events and waking the reader.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.lock().clear();
            self.notify.notify_one();
        }
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Number of pending events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total events dropped by overflow since creation.
    #[must_use]
    pub fn displaced(&self) -> u64 {
        self.displaced.load(Ordering::Relaxed)
    }
}

impl Default for Mailbox {
    fn default() -> Self {
        Self::new(DEFAULT_MAILBOX_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(text: &str) -> Arc<Event> {
        Arc::new(Event::robot_response(text, None))
    }

    #[test]
    fn test_fifo_order() {
        let mailbox = Mailbox::new(4);
        mailbox.enqueue(response("e1"));
        mailbox.enqueue(response("e2"));

        assert_eq!(mailbox.try_recv().unwrap().text(), Some("e1"));
        assert_eq!(mailbox.try_recv().unwrap().text(), Some("e2"));
        assert!(mailbox.try_recv().is_none());
    }

    #[test]
    fn test_overflow_keeps_most_recent() {
        let capacity = 8;
        let mailbox = Mailbox::new(capacity);

        for i in 0..capacity + 5 {
            mailbox.enqueue(response(&format!("event-{}", i)));
        }

        assert_eq!(mailbox.len(), capacity);
        assert_eq!(mailbox.displaced(), 5);

        let kept: Vec<String> = std::iter::from_fn(|| mailbox.try_recv())
            .map(|e| e.text().unwrap_or_default().to_string())
            .collect();
        let expected: Vec<String> = (5..capacity + 5).map(|i| format!("event-{}", i)).collect();
        assert_eq!(kept, expected);
    }

    #[test]
    fn test_enqueue_reports_displacement() {
        let mailbox = Mailbox::new(1);
        assert_eq!(mailbox.enqueue(response("a")), Enqueued::Queued);
        assert_eq!(mailbox.enqueue(response("b")), Enqueued::DisplacedOldest);
    }

    #[test]
    fn test_closed_mailbox_rejects() {
        let mailbox = Mailbox::new(4);
        mailbox.enqueue(response("pending"));
        mailbox.close();

        assert!(mailbox.is_closed());
        assert!(mailbox.is_empty());
        assert_eq!(mailbox.enqueue(response("late")), Enqueued::Closed);
        assert!(!Enqueued::Closed.is_accepted());
    }

    #[tokio::test]
    async fn test_recv_wakes_on_enqueue() {
        let mailbox = Arc::new(Mailbox::new(4));
        let reader = {
            let mailbox = Arc::clone(&mailbox);
            tokio::spawn(async move { mailbox.recv().await })
        };

        tokio::task::yield_now().await;
        mailbox.enqueue(response("wake"));

        let event = reader.await.unwrap().unwrap();
        assert_eq!(event.text(), Some("wake"));
    }

    #[tokio::test]
    async fn test_recv_returns_none_on_close() {
        let mailbox = Arc::new(Mailbox::new(4));
        let reader = {
            let mailbox = Arc::clone(&mailbox);
            tokio::spawn(async move { mailbox.recv().await })
        };

        tokio::task::yield_now().await;
        mailbox.close();

        assert!(reader.await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_recv_timeout_elapses() {
        let mailbox = Mailbox::new(4);
        assert!(mailbox
            .recv_timeout(Duration::from_secs(30))
            .await
            .is_err());
    }
}
