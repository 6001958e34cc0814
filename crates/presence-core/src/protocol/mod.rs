//! Wire protocol for the presence network.
//!
//! Every message is a flat JSON object carrying `msg_type`, `msg_id` and
//! `data_type`, plus the fields defined for its kind:
//! - `disco`: `source`, optional `value`
//! - `stat`: `device_name`, `device_group`, `device_uptime`, `device_status`
//! - `get` / `set`: optional `value`

pub mod codec;
pub mod kind;
pub mod message;
pub mod topics;

pub use codec::{decode, encode, DecodeError};
pub use kind::{CustomDataType, DataType, MessageKind};
pub use message::{Body, DeviceStatus, Message, Payload, StatusReport, Structured, ACK};
pub use topics::BROADCAST_TOPIC;
