//! Periodic heartbeat emission.
//!
//! [`HeartbeatScheduler`] is pure: the caller passes the current time and gets
//! back the status message to broadcast, if one is due. This keeps the cadence
//! testable against a virtual clock. [`HeartbeatTask`] drives a scheduler on a
//! tokio task and publishes to the broadcast topic until stopped.

use crate::identity::Identity;
use crate::protocol::{encode, DeviceStatus, Message, BROADCAST_TOPIC};
use crate::transport::Publisher;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Monotonic millisecond clock.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
}

/// Milliseconds since construction, on tokio's clock (honours paused time).
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_ms(&self) -> u64 {
        millis(self.origin.elapsed())
    }
}

/// Hand-driven clock for tests.
#[derive(Debug, Default)]
pub struct ManualClock {
    now_ms: AtomicU64,
}

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self {
            now_ms: AtomicU64::new(start_ms),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.now_ms
            .fetch_add(millis(by), Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now_ms.load(Ordering::SeqCst)
    }
}

/// Heartbeat timing and content.
#[derive(Debug, Clone)]
pub struct HeartbeatConfig {
    /// Time between heartbeats (default: 60s)
    pub interval: Duration,
    /// Delay before the first heartbeat, giving subscriptions time to settle (default: 2s)
    pub initial_delay: Duration,
    /// `device_status` reported in every heartbeat (default: "OK")
    pub status: DeviceStatus,
}

impl HeartbeatConfig {
    /// Longest accepted interval or initial delay.
    pub const MAX_PERIOD: Duration = Duration::from_secs(24 * 60 * 60);
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            initial_delay: Duration::from_secs(2),
            status: DeviceStatus::ok(),
        }
    }
}

/// Decides when heartbeats are due and builds them.
///
/// Heartbeats sit on a fixed grid (`start + initial_delay + k * interval`).
/// If the caller falls behind by several slots, a single heartbeat is emitted
/// and the grid resumes at the next future slot.
#[derive(Debug, Clone)]
pub struct HeartbeatScheduler {
    identity: Arc<Identity>,
    config: HeartbeatConfig,
    started_at_ms: u64,
    next_due_ms: u64,
    sent: u64,
}

impl HeartbeatScheduler {
    pub fn new(identity: Arc<Identity>, config: HeartbeatConfig, started_at_ms: u64) -> Self {
        let next_due_ms = started_at_ms.saturating_add(millis(config.initial_delay));
        Self {
            identity,
            config,
            started_at_ms,
            next_due_ms,
            sent: 0,
        }
    }

    pub fn config(&self) -> &HeartbeatConfig {
        &self.config
    }

    /// When the next heartbeat is due.
    pub fn next_due_ms(&self) -> u64 {
        self.next_due_ms
    }

    /// Heartbeats emitted so far.
    pub fn sent(&self) -> u64 {
        self.sent
    }

    /// Advance to `now_ms`, returning the heartbeat to publish if one is due.
    pub fn tick(&mut self, now_ms: u64) -> Option<Message> {
        if now_ms < self.next_due_ms {
            return None;
        }

        let interval_ms = millis(self.config.interval).max(1);
        let missed = (now_ms - self.next_due_ms) / interval_ms;
        if missed > 0 {
            debug!("Heartbeat fell behind by {} interval(s)", missed);
        }
        // Saturates at u64::MAX, which is never due again.
        let advance = (missed + 1).saturating_mul(interval_ms);
        self.next_due_ms = self.next_due_ms.saturating_add(advance);
        self.sent += 1;

        Some(self.heartbeat(now_ms))
    }

    /// Build this node's status message as of `now_ms`.
    pub fn heartbeat(&self, now_ms: u64) -> Message {
        let uptime_secs = now_ms.saturating_sub(self.started_at_ms) as f64 / 1000.0;
        Message::heartbeat(&self.identity, uptime_secs, self.config.status.clone())
    }
}

/// Whole milliseconds in `d`, saturating at `u64::MAX`.
fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// A scheduler running on its own tokio task.
///
/// Independent of inbound traffic: publish failures are logged and the
/// schedule continues.
pub struct HeartbeatTask {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<HeartbeatScheduler>,
}

impl HeartbeatTask {
    /// Spawn the heartbeat loop. Must be called within a tokio runtime.
    pub fn spawn(
        mut scheduler: HeartbeatScheduler,
        clock: Arc<dyn Clock>,
        publisher: Arc<dyn Publisher>,
    ) -> Self {
        let (shutdown, mut shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            loop {
                if let Some(msg) = scheduler.tick(clock.now_ms()) {
                    match publisher.publish(BROADCAST_TOPIC, encode(&msg)) {
                        Ok(()) => debug!("Heartbeat #{} published", scheduler.sent()),
                        Err(e) => warn!("Failed to publish heartbeat: {}", e),
                    }
                }

                let wait_ms = scheduler.next_due_ms().saturating_sub(clock.now_ms());
                tokio::select! {
                    _ = tokio::time::sleep(Duration::from_millis(wait_ms)) => {}
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }

            debug!("Heartbeat loop stopped after {} heartbeat(s)", scheduler.sent());
            scheduler
        });

        Self { shutdown, handle }
    }

    /// Stop the loop and wait for it to exit. Returns the final scheduler state.
    pub async fn stop(self) -> Option<HeartbeatScheduler> {
        let _ = self.shutdown.send(true);
        self.handle.await.ok()
    }
}
