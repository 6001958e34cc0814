//! The presence agent: subscriptions, inbound dispatch and the heartbeat.
//!
//! Transport-agnostic; the binary runs it over MQTT, tests over
//! `MemoryTransport`.

use presence_core::protocol::topics;
use presence_core::transport::Result;
use presence_core::{
    Clock, DispatchOutcome, DispatchStats, DispatchTable, Dispatcher, HeartbeatConfig,
    HeartbeatScheduler, HeartbeatTask, Identity, StatsSnapshot, Transport,
};
use std::sync::Arc;
use tracing::{info, warn};

/// Topic patterns a node listens on: network broadcasts, its own device topic,
/// and optionally its group.
pub fn subscriptions_for(identity: &Identity, subscribe_group: bool) -> Vec<String> {
    let mut patterns = vec![
        topics::broadcast_subscription(),
        topics::device_subscription(identity.name()),
    ];
    if subscribe_group {
        patterns.push(topics::group_subscription(identity.group()));
    }
    patterns
}

pub struct Agent<T: Transport + 'static> {
    identity: Arc<Identity>,
    transport: Arc<T>,
    dispatcher: Dispatcher,
    subscriptions: Vec<String>,
}

impl<T: Transport + 'static> Agent<T> {
    /// Agent with the standard handler table.
    pub fn new(identity: Arc<Identity>, transport: Arc<T>, subscribe_group: bool) -> Self {
        Self::with_table(identity, transport, DispatchTable::standard(), subscribe_group)
    }

    pub fn with_table(
        identity: Arc<Identity>,
        transport: Arc<T>,
        table: DispatchTable,
        subscribe_group: bool,
    ) -> Self {
        let dispatcher = Dispatcher::new(table, Arc::clone(&identity), transport.clone());
        let subscriptions = subscriptions_for(&identity, subscribe_group);

        Self {
            identity,
            transport,
            dispatcher,
            subscriptions,
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn subscriptions(&self) -> &[String] {
        &self.subscriptions
    }

    pub fn stats(&self) -> Arc<DispatchStats> {
        self.dispatcher.stats()
    }

    /// Issue every subscription. Call again after each reconnect; a clean
    /// session forgets them.
    pub async fn subscribe(&self) -> Result<()> {
        for pattern in &self.subscriptions {
            self.transport.subscribe(pattern).await?;
            info!("Subscribed to {}", pattern);
        }
        Ok(())
    }

    /// Handle one delivered message.
    pub fn on_message(&self, topic: &str, payload: &[u8]) -> DispatchOutcome {
        self.dispatcher.on_message(topic, payload)
    }

    /// Start broadcasting heartbeats, timed from `clock`'s current reading.
    pub fn start_heartbeat(&self, config: HeartbeatConfig, clock: Arc<dyn Clock>) -> HeartbeatTask {
        info!(
            "Heartbeat every {:?} (first in {:?})",
            config.interval, config.initial_delay
        );
        let scheduler = HeartbeatScheduler::new(Arc::clone(&self.identity), config, clock.now_ms());
        HeartbeatTask::spawn(scheduler, clock, self.transport.clone())
    }

    /// Stop the heartbeat, disconnect, and report final counters.
    pub async fn shutdown(&self, heartbeat: HeartbeatTask) -> StatsSnapshot {
        if let Some(scheduler) = heartbeat.stop().await {
            info!("Heartbeat stopped after {} heartbeat(s)", scheduler.sent());
        }

        if let Err(e) = self.transport.disconnect().await {
            warn!("Disconnect failed: {}", e);
        }

        let snapshot = self.dispatcher.stats().snapshot();
        info!(
            "Messages: {} received, {} handled, {} replies, {} unrouted, {} rejected, {} publish failures",
            snapshot.received,
            snapshot.handled,
            snapshot.replies,
            snapshot.unrouted,
            snapshot.rejected,
            snapshot.publish_failures
        );
        snapshot
    }
}
