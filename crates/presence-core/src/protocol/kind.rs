//! Message kinds and data type categories.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{self, Display, Formatter};

/// Discriminant selecting how a message is processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// Network query, broadcast by the asker (`disco`)
    Discovery,
    /// Heartbeat / presence report (`stat`)
    Status,
    /// Value request (`get`)
    Get,
    /// Value assignment or acknowledgement (`set`)
    Set,
}

impl MessageKind {
    /// All kinds, in wire-table order.
    pub const ALL: [MessageKind; 4] = [
        MessageKind::Discovery,
        MessageKind::Status,
        MessageKind::Get,
        MessageKind::Set,
    ];

    /// Parse the `msg_type` wire name. Returns `None` for kinds this node doesn't know.
    pub fn from_wire(name: &str) -> Option<Self> {
        match name {
            "disco" => Some(Self::Discovery),
            "stat" => Some(Self::Status),
            "get" => Some(Self::Get),
            "set" => Some(Self::Set),
            _ => None,
        }
    }

    /// The `msg_type` wire name.
    pub fn as_wire(&self) -> &'static str {
        match self {
            Self::Discovery => "disco",
            Self::Status => "stat",
            Self::Get => "get",
            Self::Set => "set",
        }
    }
}

impl Display for MessageKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}

/// Category qualifying how `value` and status fields are interpreted.
///
/// Unknown categories are kept verbatim so they survive a decode/encode cycle.
/// Build one with `DataType::from`, which maps the well-known names to their
/// own variants.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DataType {
    Server,
    Client,
    Device,
    Response,
    Other(CustomDataType),
}

/// Name of a category outside the well-known set.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CustomDataType(String);

impl CustomDataType {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl DataType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Server => "server",
            Self::Client => "client",
            Self::Device => "device",
            Self::Response => "response",
            Self::Other(custom) => custom.as_str(),
        }
    }
}

impl From<&str> for DataType {
    fn from(s: &str) -> Self {
        match s {
            "server" => Self::Server,
            "client" => Self::Client,
            "device" => Self::Device,
            "response" => Self::Response,
            other => Self::Other(CustomDataType(other.to_string())),
        }
    }
}

impl From<String> for DataType {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

impl Default for DataType {
    /// Absent `data_type`: empty category.
    fn default() -> Self {
        Self::Other(CustomDataType(String::new()))
    }
}

impl Display for DataType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for DataType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for DataType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Self::from(s))
    }
}
