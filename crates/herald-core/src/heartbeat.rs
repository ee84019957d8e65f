//! Heartbeat scheduling.
//!
//! Push transports sit behind proxies that cut idle streams. The scheduler
//! makes several passes per interval and drops a heartbeat into the mailbox
//! of every connection that would otherwise go a full interval without a
//! write. An idle connection therefore sees one heartbeat per interval.

use crate::event::Event;
use crate::registry::Registry;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, trace};

/// Default heartbeat interval.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Scheduling passes per heartbeat interval.
const PASSES_PER_INTERVAL: u32 = 4;

const MIN_PASS_PERIOD: Duration = Duration::from_millis(1);

/// Periodically injects heartbeats into idle connections.
pub struct HeartbeatScheduler {
    registry: Arc<Registry>,
    interval: Duration,
}

impl HeartbeatScheduler {
    /// Create a scheduler. A zero interval is replaced by the default.
    #[must_use]
    pub fn new(registry: Arc<Registry>, interval: Duration) -> Self {
        let interval = if interval.is_zero() {
            DEFAULT_HEARTBEAT_INTERVAL
        } else {
            interval
        };
        Self { registry, interval }
    }

    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Time between scheduling passes.
    #[must_use]
    pub fn pass_period(&self) -> Duration {
        (self.interval / PASSES_PER_INTERVAL).max(MIN_PASS_PERIOD)
    }

    /// Idle time at which a pass enqueues a heartbeat.
    ///
    /// One pass period short of the interval, so the next heartbeat is due
    /// before the connection has been silent for a whole interval.
    #[must_use]
    pub fn idle_threshold(&self) -> Duration {
        self.interval.saturating_sub(self.pass_period())
    }

    /// Run one scheduling pass.
    ///
    /// Returns the number of heartbeats enqueued.
    pub fn tick(&self) -> usize {
        let now = Instant::now();
        let threshold = self.idle_threshold();
        let heartbeat = Arc::new(Event::heartbeat());
        let mut sent = 0;

        for conn in self.registry.snapshot() {
            if conn.idle_for(now) < threshold {
                continue;
            }
            if conn.mailbox().enqueue(Arc::clone(&heartbeat)).is_accepted() {
                trace!(connection = %conn.id(), "Heartbeat enqueued");
                sent += 1;
            }
        }

        sent
    }

    /// Run the scheduler on its own task until the handle is aborted.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let period = self.pass_period();
            let mut ticker = time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            debug!(
                interval_ms = self.interval.as_millis() as u64,
                pass_ms = period.as_millis() as u64,
                "Heartbeat scheduler started"
            );
            loop {
                ticker.tick().await;
                let sent = self.tick();
                if sent > 0 {
                    debug!(heartbeats = sent, "Heartbeat pass");
                }
            }
        })
    }
}
