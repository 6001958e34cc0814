//! Dispatch table and the decode-then-dispatch boundary.
//!
//! Each message kind maps to exactly one [`Handler`]. The [`Dispatcher`] owns
//! the table together with the node identity and an injected [`Publisher`];
//! handlers return at most one [`Outbound`] message, which the dispatcher
//! publishes fire-and-forget.

use crate::handlers::{DiscoveryHandler, GetHandler, SetHandler, StatusHandler};
use crate::identity::Identity;
use crate::protocol::{decode, encode, DataType, DecodeError, Message, MessageKind};
use crate::stats::DispatchStats;
use crate::transport::Publisher;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, warn};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("A handler is already registered for {0}")]
    DuplicateKind(MessageKind),
}

/// Read-only state handlers may consult.
#[derive(Debug, Clone, Copy)]
pub struct Context<'a> {
    pub identity: &'a Identity,
}

/// A reply produced by a handler.
#[derive(Debug, Clone, PartialEq)]
pub struct Outbound {
    pub topic: String,
    pub message: Message,
}

/// Processes one message kind.
///
/// Runs on the transport's delivery path, so it must not block or wait on the
/// network. It sees only the message and the context, and may ask for at most
/// one reply.
pub trait Handler: Send + Sync {
    fn handle(
        &self,
        ctx: &Context<'_>,
        data_type: &DataType,
        id: u32,
        msg: &Message,
    ) -> Option<Outbound>;
}

/// Mapping from message kind to its single handler.
#[derive(Default, Clone)]
pub struct DispatchTable {
    handlers: HashMap<MessageKind, Arc<dyn Handler>>,
}

impl DispatchTable {
    /// Empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Table with the built-in discovery, status, get and set handlers.
    pub fn standard() -> Self {
        let mut table = Self::new();
        table.handlers.insert(MessageKind::Discovery, Arc::new(DiscoveryHandler));
        table.handlers.insert(MessageKind::Status, Arc::new(StatusHandler));
        table.handlers.insert(MessageKind::Get, Arc::new(GetHandler));
        table.handlers.insert(MessageKind::Set, Arc::new(SetHandler));
        table
    }

    /// Register a handler. Kinds are unique: a second registration is refused.
    pub fn register(
        &mut self,
        kind: MessageKind,
        handler: impl Handler + 'static,
    ) -> Result<(), DispatchError> {
        if self.handlers.contains_key(&kind) {
            return Err(DispatchError::DuplicateKind(kind));
        }
        self.handlers.insert(kind, Arc::new(handler));
        Ok(())
    }

    pub fn lookup(&self, kind: MessageKind) -> Option<&Arc<dyn Handler>> {
        self.handlers.get(&kind)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Registered kinds in wire-table order.
    pub fn kinds(&self) -> Vec<MessageKind> {
        MessageKind::ALL
            .into_iter()
            .filter(|k| self.handlers.contains_key(k))
            .collect()
    }
}

/// What happened to one inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// A handler ran; `replied` is true when its reply was published
    Handled { kind: MessageKind, replied: bool },
    /// Decoded, but no handler is registered for the kind
    Unrouted(MessageKind),
    /// `msg_type` is not one this node understands
    UnknownKind(String),
    /// Dropped by the decoder
    Rejected(DecodeError),
}

/// Routes inbound messages to handlers and publishes their replies.
pub struct Dispatcher {
    table: DispatchTable,
    identity: Arc<Identity>,
    publisher: Arc<dyn Publisher>,
    stats: Arc<DispatchStats>,
}

impl Dispatcher {
    pub fn new(table: DispatchTable, identity: Arc<Identity>, publisher: Arc<dyn Publisher>) -> Self {
        Self {
            table,
            identity,
            publisher,
            stats: Arc::new(DispatchStats::new()),
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn table(&self) -> &DispatchTable {
        &self.table
    }

    pub fn stats(&self) -> Arc<DispatchStats> {
        Arc::clone(&self.stats)
    }

    /// Handle a raw payload delivered on `topic`.
    ///
    /// Decode failures are logged and dropped here; nothing propagates to the
    /// delivery loop.
    pub fn on_message(&self, topic: &str, payload: &[u8]) -> DispatchOutcome {
        self.stats.record_received();

        match decode(payload) {
            Ok(msg) => {
                debug!(
                    "Received {} (id {}, data_type {:?}) on {}",
                    msg.kind(),
                    msg.id,
                    msg.data_type.as_str(),
                    topic
                );
                self.dispatch(&msg)
            }
            Err(DecodeError::UnknownKind(name)) => {
                debug!("Ignoring unknown msg_type {:?} on {}", name, topic);
                self.stats.record_unrouted();
                DispatchOutcome::UnknownKind(name)
            }
            Err(e) => {
                error!("Dropping message on {} ({} bytes): {}", topic, payload.len(), e);
                self.stats.record_rejected();
                DispatchOutcome::Rejected(e)
            }
        }
    }

    /// Run the handler registered for the message's kind, if any.
    pub fn dispatch(&self, msg: &Message) -> DispatchOutcome {
        let kind = msg.kind();
        let Some(handler) = self.table.lookup(kind) else {
            debug!("No handler for {}, dropping message {}", kind, msg.id);
            self.stats.record_unrouted();
            return DispatchOutcome::Unrouted(kind);
        };

        self.stats.record_handled();
        let ctx = Context {
            identity: &self.identity,
        };
        let replied = match handler.handle(&ctx, &msg.data_type, msg.id, msg) {
            Some(outbound) => self.publish(outbound),
            None => false,
        };

        DispatchOutcome::Handled { kind, replied }
    }

    fn publish(&self, outbound: Outbound) -> bool {
        let payload = encode(&outbound.message);
        match self.publisher.publish(&outbound.topic, payload) {
            Ok(()) => {
                debug!(
                    "Replied {} (id {}) to {}",
                    outbound.message.kind(),
                    outbound.message.id,
                    outbound.topic
                );
                self.stats.record_reply();
                true
            }
            Err(e) => {
                warn!("Failed to publish reply to {}: {}", outbound.topic, e);
                self.stats.record_publish_failure();
                false
            }
        }
    }
}
