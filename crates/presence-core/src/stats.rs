//! Dispatch counters shared between the delivery path and whoever reports them.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Per-process message counters. Lock-free; safe to bump from any thread.
#[derive(Debug, Default)]
pub struct DispatchStats {
    received: AtomicU64,
    handled: AtomicU64,
    replies: AtomicU64,
    unrouted: AtomicU64,
    rejected: AtomicU64,
    publish_failures: AtomicU64,
}

/// Point-in-time copy of [`DispatchStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    /// Raw payloads handed to the dispatcher
    pub received: u64,
    /// Messages that reached a handler
    pub handled: u64,
    /// Replies published successfully
    pub replies: u64,
    /// Decoded messages with no handler registered for their kind
    pub unrouted: u64,
    /// Payloads dropped by the decoder
    pub rejected: u64,
    pub publish_failures: u64,
}

impl DispatchStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_handled(&self) {
        self.handled.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_reply(&self) {
        self.replies.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_unrouted(&self) {
        self.unrouted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_publish_failure(&self) {
        self.publish_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            handled: self.handled.load(Ordering::Relaxed),
            replies: self.replies.load(Ordering::Relaxed),
            unrouted: self.unrouted.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            publish_failures: self.publish_failures.load(Ordering::Relaxed),
        }
    }
}
