//! MQTT transport backed by `rumqttc`.
//!
//! Every request goes through the `try_*` client calls, which only enqueue
//! it for the event loop and fail at once when the queue is full. Nothing here
//! waits on the queue, so the task polling the [`EventLoop`] can call into the
//! transport without stalling itself. The caller owns the loop and must keep
//! polling it.

use crate::config::BrokerConfig;
use async_trait::async_trait;
use presence_core::transport::Result;
use presence_core::{Publisher, Transport, TransportError};
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use std::time::Duration;
use tracing::{debug, info};

/// Capacity of the client's request queue.
pub const REQUEST_CAPACITY: usize = 64;

/// Shortest keep-alive accepted by the client.
const MIN_KEEP_ALIVE: Duration = Duration::from_secs(5);

pub struct MqttTransport {
    client: AsyncClient,
}

impl MqttTransport {
    /// Create the client and its event loop. No I/O happens until the loop is polled.
    pub fn connect(broker: &BrokerConfig, client_id: &str) -> (Self, EventLoop) {
        let mut options = MqttOptions::new(client_id, broker.host.clone(), broker.port);
        options.set_keep_alive(Duration::from_secs(broker.keep_alive_secs).max(MIN_KEEP_ALIVE));
        options.set_clean_session(true);

        let (client, eventloop) = AsyncClient::new(options, REQUEST_CAPACITY);
        info!(
            "MQTT client {} targeting {}:{}",
            client_id, broker.host, broker.port
        );

        (Self { client }, eventloop)
    }
}

impl Publisher for MqttTransport {
    fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<()> {
        debug!("Publishing {} bytes to {}", payload.len(), topic);
        self.client
            .try_publish(topic, QoS::AtMostOnce, false, payload)
            .map_err(|e| TransportError::PublishFailed(format!("{}: {}", topic, e)))
    }
}

#[async_trait]
impl Transport for MqttTransport {
    async fn subscribe(&self, pattern: &str) -> Result<()> {
        self.client
            .try_subscribe(pattern, QoS::AtLeastOnce)
            .map_err(|e| TransportError::SubscribeFailed(format!("{}: {}", pattern, e)))
    }

    async fn disconnect(&self) -> Result<()> {
        self.client
            .try_disconnect()
            .map_err(|e| TransportError::Other(e.to_string()))
    }
}

/// Topic and payload of an incoming PUBLISH, if that's what the event is.
pub fn inbound_publish(event: &Event) -> Option<(&str, &[u8])> {
    match event {
        Event::Incoming(Packet::Publish(publish)) => {
            Some((publish.topic.as_str(), &publish.payload[..]))
        }
        _ => None,
    }
}

/// Whether the broker just accepted our connection.
pub fn is_connack(event: &Event) -> bool {
    matches!(event, Event::Incoming(Packet::ConnAck(_)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rumqttc::{ConnAck, ConnectReturnCode, Outgoing, Publish};

    #[test]
    fn test_inbound_publish_extracts_topic_and_payload() {
        let event = Event::Incoming(Packet::Publish(Publish::new(
            "/network/broadcasts",
            QoS::AtMostOnce,
            b"{\"msg_type\":\"stat\"}".to_vec(),
        )));

        let (topic, payload) = inbound_publish(&event).unwrap();
        assert_eq!(topic, "/network/broadcasts");
        assert_eq!(payload, b"{\"msg_type\":\"stat\"}");
        assert!(!is_connack(&event));
    }

    #[test]
    fn test_connack_detected() {
        let event = Event::Incoming(Packet::ConnAck(ConnAck::new(
            ConnectReturnCode::Success,
            false,
        )));
        assert!(is_connack(&event));
        assert!(inbound_publish(&event).is_none());
    }

    #[test]
    fn test_outgoing_events_ignored() {
        let event = Event::Outgoing(Outgoing::PingReq);
        assert!(inbound_publish(&event).is_none());
        assert!(!is_connack(&event));
    }

    #[tokio::test]
    async fn test_publish_before_connect_is_queued() {
        let broker = BrokerConfig::default();
        let (transport, _eventloop) = MqttTransport::connect(&broker, "presence-test");

        // Nothing polls the loop, but the request queue accepts the message
        assert!(transport.publish("/network/broadcasts", b"{}".to_vec()).is_ok());
    }

    #[tokio::test]
    async fn test_full_queue_fails_fast() {
        let broker = BrokerConfig::default();
        let (transport, _eventloop) = MqttTransport::connect(&broker, "presence-test");

        // Heartbeats pile up while the broker is unreachable
        let accepted = (0..REQUEST_CAPACITY * 2)
            .filter(|_| transport.publish("/network/broadcasts", b"{}".to_vec()).is_ok())
            .count();
        assert_eq!(accepted, REQUEST_CAPACITY);

        let subscribed = tokio::time::timeout(
            Duration::from_secs(1),
            transport.subscribe("/network/broadcasts"),
        )
        .await
        .expect("subscribe must not wait on the request queue");
        assert!(matches!(subscribed, Err(TransportError::SubscribeFailed(_))));

        let disconnected = tokio::time::timeout(Duration::from_secs(1), transport.disconnect())
            .await
            .expect("disconnect must not wait on the request queue");
        assert!(disconnected.is_err());
    }
}
