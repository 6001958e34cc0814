//! Typed message model.
//!
//! A [`Message`] carries the fields common to every kind (`id`, `data_type`)
//! and a [`Body`] holding the kind-specific fields. The kind is derived from
//! the body, so a message can never carry two kinds at once.

use super::kind::{DataType, MessageKind};
use crate::identity::Identity;
use serde_json::Value;

/// Tracking ID meaning "untracked".
pub const UNTRACKED: u32 = 0;

/// `value` of an acknowledgement reply.
pub const ACK: &str = "ack";

/// A JSON value that is not a string.
///
/// Strings always travel as the `Text` variants of [`Payload`] and
/// [`DeviceStatus`], so each wire value has exactly one typed form.
#[derive(Debug, Clone, PartialEq)]
pub struct Structured(Value);

impl Structured {
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }
}

impl TryFrom<Value> for Structured {
    /// The string that was rejected.
    type Error = String;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::String(s) => Err(s),
            other => Ok(Self(other)),
        }
    }
}

/// Loosely-typed `value` payload, interpreted according to `data_type`.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Payload {
    /// No `value` field on the wire
    #[default]
    Empty,
    /// Any string scalar, including the `"ack"` of a response
    Text(String),
    /// Numbers, booleans, arrays, objects and null, kept verbatim
    Opaque(Structured),
}

impl Payload {
    /// Interpret a raw `value` field; `None` means the field was absent.
    pub fn from_wire(value: Option<Value>) -> Self {
        value.map_or(Self::Empty, Self::from)
    }

    /// Wire form of the payload; `None` means the field is omitted.
    pub fn to_wire(&self) -> Option<Value> {
        match self {
            Self::Empty => None,
            Self::Text(s) => Some(Value::String(s.clone())),
            Self::Opaque(v) => Some(v.as_value().clone()),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        match Structured::try_from(value) {
            Ok(structured) => Self::Opaque(structured),
            Err(text) => Self::Text(text),
        }
    }
}

/// Health payload of a status message: a simple word like `"OK"`, or a structure
/// (battery, temperature, ...).
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceStatus {
    Text(String),
    Opaque(Structured),
}

impl DeviceStatus {
    pub fn ok() -> Self {
        Self::Text("OK".to_string())
    }

    pub fn from_wire(value: Option<Value>) -> Self {
        value.map_or_else(|| Self::Text(String::new()), Self::from)
    }

    pub fn to_wire(&self) -> Value {
        match self {
            Self::Text(s) => Value::String(s.clone()),
            Self::Opaque(v) => v.as_value().clone(),
        }
    }
}

impl From<Value> for DeviceStatus {
    fn from(value: Value) -> Self {
        match Structured::try_from(value) {
            Ok(structured) => Self::Opaque(structured),
            Err(text) => Self::Text(text),
        }
    }
}

impl Default for DeviceStatus {
    fn default() -> Self {
        Self::ok()
    }
}

/// Presence report carried by `stat` messages.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusReport {
    /// Unique name of the reporting device
    pub device_name: String,
    /// Broadcast group the device belongs to
    pub device_group: String,
    /// Seconds of operation, non-negative
    pub device_uptime: f64,
    pub device_status: DeviceStatus,
}

/// Kind-specific message fields.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Discovery { source: String, value: Payload },
    Status(StatusReport),
    Get { value: Payload },
    Set { value: Payload },
}

/// A decoded protocol message.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    /// Tracking ID chosen by the sender, `0` when untracked
    pub id: u32,
    pub data_type: DataType,
    pub body: Body,
}

impl Message {
    /// Heartbeat broadcast for this node: untracked `stat/server` message.
    pub fn heartbeat(identity: &Identity, uptime_secs: f64, status: DeviceStatus) -> Self {
        Self::status(
            UNTRACKED,
            DataType::Server,
            StatusReport {
                device_name: identity.name().to_string(),
                device_group: identity.group().to_string(),
                device_uptime: uptime_secs,
                device_status: status,
            },
        )
    }

    /// Acknowledgement reply: `set/response/ack`, correlated by `id`.
    pub fn ack(id: u32) -> Self {
        Self {
            id,
            data_type: DataType::Response,
            body: Body::Set {
                value: Payload::Text(ACK.to_string()),
            },
        }
    }

    pub fn status(id: u32, data_type: DataType, report: StatusReport) -> Self {
        Self {
            id,
            data_type,
            body: Body::Status(report),
        }
    }

    pub fn discovery(id: u32, data_type: DataType, source: impl Into<String>, value: Payload) -> Self {
        Self {
            id,
            data_type,
            body: Body::Discovery {
                source: source.into(),
                value,
            },
        }
    }

    pub fn get(id: u32, data_type: DataType, value: Payload) -> Self {
        Self {
            id,
            data_type,
            body: Body::Get { value },
        }
    }

    pub fn set(id: u32, data_type: DataType, value: Payload) -> Self {
        Self {
            id,
            data_type,
            body: Body::Set { value },
        }
    }

    /// The message kind, derived from the body.
    pub fn kind(&self) -> MessageKind {
        match self.body {
            Body::Discovery { .. } => MessageKind::Discovery,
            Body::Status(_) => MessageKind::Status,
            Body::Get { .. } => MessageKind::Get,
            Body::Set { .. } => MessageKind::Set,
        }
    }

    /// Status report, for `stat` messages.
    pub fn status_report(&self) -> Option<&StatusReport> {
        match &self.body {
            Body::Status(report) => Some(report),
            _ => None,
        }
    }

    /// The `value` payload, for kinds that carry one.
    pub fn value(&self) -> Option<&Payload> {
        match &self.body {
            Body::Discovery { value, .. } | Body::Get { value } | Body::Set { value } => Some(value),
            Body::Status(_) => None,
        }
    }

    /// Whether this is an acknowledgement reply: `set`, `response`, `"ack"`.
    pub fn is_ack(&self) -> bool {
        self.data_type == DataType::Response
            && matches!(&self.body, Body::Set { value: Payload::Text(v) } if v == ACK)
    }
}
