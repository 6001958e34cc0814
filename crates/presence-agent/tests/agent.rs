//! End-to-end tests for the presence agent.
//!
//! Drives full agents over `MemoryTransport`: subscriptions, heartbeat
//! acknowledgements between nodes, self-suppression and malformed traffic.

use std::sync::Arc;
use std::time::Duration;

use presence_agent::Agent;
use presence_core::protocol::{encode, topics, BROADCAST_TOPIC};
use presence_core::{
    DataType, DeviceStatus, DispatchOutcome, HeartbeatConfig, Identity, MemoryTransport, Message,
    MessageKind, MonotonicClock, StatusReport,
};

// ============================================================================
// Helpers
// ============================================================================

fn agent(name: &str) -> (Agent<MemoryTransport>, Arc<MemoryTransport>) {
    let identity = Arc::new(Identity::new(name, "demo").unwrap());
    let transport = Arc::new(MemoryTransport::new());
    (Agent::new(identity, transport.clone(), false), transport)
}

fn status(data_type: DataType, device_name: &str, id: u32) -> Vec<u8> {
    encode(&Message::status(
        id,
        data_type,
        StatusReport {
            device_name: device_name.to_string(),
            device_group: "demo".to_string(),
            device_uptime: 42.0,
            device_status: DeviceStatus::ok(),
        },
    ))
}

// ============================================================================
// Subscriptions
// ============================================================================

#[tokio::test]
async fn test_subscribes_to_broadcast_and_device_topics() {
    let (agent, transport) = agent("host1");
    agent.subscribe().await.unwrap();

    assert_eq!(
        transport.subscriptions(),
        vec!["/network/broadcasts/#", "/device/host1/#"]
    );
}

#[tokio::test]
async fn test_subscribe_failure_is_reported() {
    let (agent, transport) = agent("host1");
    transport.set_failing(true);
    assert!(agent.subscribe().await.is_err());
}

// ============================================================================
// Acknowledgements
// ============================================================================

#[test]
fn test_client_status_is_acked_to_its_device_topic() {
    let (agent, transport) = agent("host1");

    let outcome = agent.on_message(BROADCAST_TOPIC, &status(DataType::Client, "X", 7));
    assert_eq!(
        outcome,
        DispatchOutcome::Handled {
            kind: MessageKind::Status,
            replied: true
        }
    );

    let published = transport.published();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].topic, "/device/X");
    assert_eq!(
        published[0].payload,
        br#"{"msg_type":"set","msg_id":7,"data_type":"response","value":"ack"}"#.to_vec()
    );
}

#[test]
fn test_own_heartbeat_echo_gets_no_reply() {
    let (agent, transport) = agent("host1");

    let outcome = agent.on_message(BROADCAST_TOPIC, &status(DataType::Server, "host1", 0));
    assert_eq!(
        outcome,
        DispatchOutcome::Handled {
            kind: MessageKind::Status,
            replied: false
        }
    );
    assert!(transport.published().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_two_agents_ack_each_others_heartbeats() {
    let (alpha, alpha_bus) = agent("alpha");
    let (beta, beta_bus) = agent("beta");
    let clock = Arc::new(MonotonicClock::new());

    let alpha_hb = alpha.start_heartbeat(HeartbeatConfig::default(), clock.clone());
    let beta_hb = beta.start_heartbeat(HeartbeatConfig::default(), clock.clone());
    tokio::time::sleep(Duration::from_secs(3)).await;

    // Relay each node's broadcast to both nodes, as the broker would
    let alpha_beats = alpha_bus.take_published();
    let beta_beats = beta_bus.take_published();
    assert_eq!(alpha_beats.len(), 1);
    assert_eq!(beta_beats.len(), 1);
    for beat in alpha_beats.iter().chain(beta_beats.iter()) {
        assert_eq!(beat.topic, BROADCAST_TOPIC);
        alpha.on_message(&beat.topic, &beat.payload);
        beta.on_message(&beat.topic, &beat.payload);
    }

    // Each node acked only the other one
    let alpha_replies = alpha_bus.published();
    assert_eq!(alpha_replies.len(), 1);
    assert_eq!(alpha_replies[0].topic, topics::device_topic("beta"));
    assert!(alpha_replies[0].message().unwrap().is_ack());

    let beta_replies = beta_bus.published();
    assert_eq!(beta_replies.len(), 1);
    assert_eq!(beta_replies[0].topic, topics::device_topic("alpha"));

    alpha.shutdown(alpha_hb).await;
    let stats = beta.shutdown(beta_hb).await;
    assert_eq!(stats.received, 2);
    assert_eq!(stats.handled, 2);
    assert_eq!(stats.replies, 1);
}

// ============================================================================
// Resilience
// ============================================================================

#[test]
fn test_malformed_traffic_is_dropped() {
    let (agent, transport) = agent("host1");

    let garbage: [&[u8]; 4] = [
        b"hello",
        br#"{"msg_id":1}"#,
        br#"{"msg_type":"stat","msg_id":"seven"}"#,
        br#"{"msg_type":"stat","device_name":"X","device_uptime":"later"}"#,
    ];
    for payload in garbage {
        assert!(matches!(
            agent.on_message(BROADCAST_TOPIC, payload),
            DispatchOutcome::Rejected(_)
        ));
    }

    assert!(matches!(
        agent.on_message(BROADCAST_TOPIC, br#"{"msg_type":"reboot"}"#),
        DispatchOutcome::UnknownKind(_)
    ));

    // Still processing normally afterwards
    agent.on_message(BROADCAST_TOPIC, &status(DataType::Server, "host2", 3));
    assert_eq!(transport.published().len(), 1);

    let stats = agent.stats().snapshot();
    assert_eq!(stats.received, 6);
    assert_eq!(stats.rejected, 4);
    assert_eq!(stats.unrouted, 1);
    assert_eq!(stats.handled, 1);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_stops_heartbeat_and_disconnects() {
    let (agent, transport) = agent("host1");
    let heartbeat = agent.start_heartbeat(HeartbeatConfig::default(), Arc::new(MonotonicClock::new()));

    tokio::time::sleep(Duration::from_secs(63)).await;
    agent.shutdown(heartbeat).await;
    assert!(transport.is_disconnected());

    let beats = transport.published_to(BROADCAST_TOPIC).len();
    assert_eq!(beats, 2);

    // No more heartbeats after shutdown
    tokio::time::sleep(Duration::from_secs(300)).await;
    assert_eq!(transport.published_to(BROADCAST_TOPIC).len(), beats);
}
