//! Transport abstractions for the message bus.
//!
//! Handlers and the heartbeat only need [`Publisher`]; the agent also needs
//! [`Transport`] to manage subscriptions. Implementations:
//! - MQTT (`presence-agent`), backed by `rumqttc`
//! - [`MemoryTransport`], an in-process recorder for tests

use crate::protocol::{decode, DecodeError, Message};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Subscribe failed: {0}")]
    SubscribeFailed(String),

    #[error("Publish failed: {0}")]
    PublishFailed(String),

    #[error("Transport error: {0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, TransportError>;

/// Fire-and-forget publish capability.
///
/// Must not block: it is called from the inbound delivery path.
pub trait Publisher: Send + Sync {
    fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<()>;
}

/// A publish/subscribe connection.
#[async_trait]
pub trait Transport: Publisher {
    /// Subscribe to a topic pattern.
    async fn subscribe(&self, pattern: &str) -> Result<()>;

    /// Close the connection.
    async fn disconnect(&self) -> Result<()>;
}

/// A message handed to [`MemoryTransport::publish`].
#[derive(Debug, Clone, PartialEq)]
pub struct Published {
    pub topic: String,
    pub payload: Vec<u8>,
}

impl Published {
    /// Decode the recorded payload.
    pub fn message(&self) -> std::result::Result<Message, DecodeError> {
        decode(&self.payload)
    }
}

/// In-memory transport recording everything published and subscribed.
///
/// Failure injection via [`MemoryTransport::set_failing`] makes publish and
/// subscribe return errors without recording anything.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    published: Mutex<Vec<Published>>,
    subscriptions: Mutex<Vec<String>>,
    failing: AtomicBool,
    disconnected: AtomicBool,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent publishes and subscribes fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Everything published so far, in order.
    pub fn published(&self) -> Vec<Published> {
        self.published
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Messages published to a single topic.
    pub fn published_to(&self, topic: &str) -> Vec<Published> {
        self.published()
            .into_iter()
            .filter(|p| p.topic == topic)
            .collect()
    }

    /// Drain recorded publishes.
    pub fn take_published(&self) -> Vec<Published> {
        std::mem::take(&mut *self.published.lock().unwrap_or_else(|e| e.into_inner()))
    }

    pub fn subscriptions(&self) -> Vec<String> {
        self.subscriptions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn is_disconnected(&self) -> bool {
        self.disconnected.load(Ordering::SeqCst)
    }
}

impl Publisher for MemoryTransport {
    fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(TransportError::PublishFailed(format!(
                "injected failure on {}",
                topic
            )));
        }
        self.published
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(Published {
                topic: topic.to_string(),
                payload,
            });
        Ok(())
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn subscribe(&self, pattern: &str) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(TransportError::SubscribeFailed(pattern.to_string()));
        }
        self.subscriptions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(pattern.to_string());
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.disconnected.store(true, Ordering::SeqCst);
        Ok(())
    }
}
