//! presence-core: Message handling core for the network presence agent.
//!
//! This crate provides:
//! - The wire protocol (`disco`/`stat`/`get`/`set` JSON envelopes) and topic naming
//! - Node identity used to tell our own broadcasts apart from peers'
//! - A dispatch table routing each message kind to exactly one handler
//! - The periodic heartbeat scheduler
//! - Publisher and Transport trait abstractions (plus an in-memory transport)

pub mod dispatch;
pub mod handlers;
pub mod heartbeat;
pub mod identity;
pub mod protocol;
pub mod stats;
pub mod transport;

pub use dispatch::{Context, DispatchError, DispatchOutcome, DispatchTable, Dispatcher, Handler, Outbound};
pub use heartbeat::{Clock, HeartbeatConfig, HeartbeatScheduler, HeartbeatTask, ManualClock, MonotonicClock};
pub use identity::{Identity, IdentityError};
pub use protocol::{
    decode, encode, Body, CustomDataType, DataType, DecodeError, DeviceStatus, Message,
    MessageKind, Payload, StatusReport, Structured,
};
pub use stats::{DispatchStats, StatsSnapshot};
pub use transport::{MemoryTransport, Published, Publisher, Transport, TransportError};
