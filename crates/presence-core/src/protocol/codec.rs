//! JSON encoding and decoding of protocol messages.
//!
//! Only `msg_type` is mandatory on decode. Every other field falls back to an
//! empty/zero default when absent, so messages from newer or sloppier senders
//! still get through. A field that is present but has the wrong type is a
//! malformed envelope.

use super::kind::{DataType, MessageKind};
use super::message::{Body, DeviceStatus, Message, Payload, StatusReport};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("Malformed message: {0}")]
    Malformed(String),

    #[error("Message has no msg_type")]
    MissingKind,

    #[error("Unknown msg_type: {0}")]
    UnknownKind(String),

    #[error("Invalid {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

/// `device_uptime` is sent as a decimal string by existing hosts; numbers are accepted too.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum Uptime {
    Number(f64),
    Text(String),
}

/// Flat wire envelope. Field order here is the order on the wire.
#[derive(Debug, Default, Serialize, Deserialize)]
struct WireMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    msg_type: Option<String>,
    #[serde(default)]
    msg_id: u32,
    #[serde(default)]
    data_type: DataType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    device_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    device_group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    device_uptime: Option<Uptime>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    device_status: Option<Value>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    value: Option<Value>,
}

/// A field that is on the wire, even as `null`. Absent fields fall back to `None`.
fn present<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Value>, D::Error> {
    Value::deserialize(deserializer).map(Some)
}

/// Decode a raw payload into a [`Message`].
pub fn decode(data: &[u8]) -> Result<Message, DecodeError> {
    let raw: Value =
        serde_json::from_slice(data).map_err(|e| DecodeError::Malformed(e.to_string()))?;
    if !raw.is_object() {
        return Err(DecodeError::Malformed("expected a JSON object".to_string()));
    }

    let wire: WireMessage =
        serde_json::from_value(raw).map_err(|e| DecodeError::Malformed(e.to_string()))?;

    let name = wire.msg_type.ok_or(DecodeError::MissingKind)?;
    let kind = MessageKind::from_wire(&name).ok_or(DecodeError::UnknownKind(name))?;

    let data_type = wire.data_type;
    let body = match kind {
        MessageKind::Discovery => Body::Discovery {
            source: wire.source.unwrap_or_default(),
            value: Payload::from_wire(wire.value),
        },
        MessageKind::Status => Body::Status(StatusReport {
            device_name: wire.device_name.unwrap_or_default(),
            device_group: wire.device_group.unwrap_or_default(),
            device_uptime: parse_uptime(wire.device_uptime)?,
            device_status: DeviceStatus::from_wire(wire.device_status),
        }),
        MessageKind::Get => Body::Get {
            value: Payload::from_wire(wire.value),
        },
        MessageKind::Set => Body::Set {
            value: Payload::from_wire(wire.value),
        },
    };

    Ok(Message {
        id: wire.msg_id,
        data_type,
        body,
    })
}

/// Encode a [`Message`] as compact JSON, writing only the fields its kind defines.
pub fn encode(msg: &Message) -> Vec<u8> {
    let mut wire = WireMessage {
        msg_type: Some(msg.kind().as_wire().to_string()),
        msg_id: msg.id,
        data_type: msg.data_type.clone(),
        ..Default::default()
    };

    match &msg.body {
        Body::Discovery { source, value } => {
            wire.source = Some(source.clone());
            wire.value = value.to_wire();
        }
        Body::Status(report) => {
            wire.device_name = Some(report.device_name.clone());
            wire.device_group = Some(report.device_group.clone());
            wire.device_uptime = Some(Uptime::Text(report.device_uptime.to_string()));
            wire.device_status = Some(report.device_status.to_wire());
        }
        Body::Get { value } | Body::Set { value } => {
            wire.value = value.to_wire();
        }
    }

    serde_json::to_vec(&wire).expect("WireMessage serialization should not fail")
}

fn parse_uptime(uptime: Option<Uptime>) -> Result<f64, DecodeError> {
    let secs = match uptime {
        None => return Ok(0.0),
        Some(Uptime::Number(n)) => n,
        Some(Uptime::Text(s)) => s.trim().parse::<f64>().map_err(|e| DecodeError::InvalidField {
            field: "device_uptime",
            reason: format!("{:?}: {}", s, e),
        })?,
    };

    if !secs.is_finite() || secs < 0.0 {
        return Err(DecodeError::InvalidField {
            field: "device_uptime",
            reason: format!("{} is not a non-negative number of seconds", secs),
        });
    }
    Ok(secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Identity;
    use serde_json::json;

    // ==================== Wire format ====================

    #[test]
    fn test_heartbeat_wire_format() {
        let identity = Identity::new("host1", "demo").unwrap();
        let msg = Message::heartbeat(&identity, 123.4, DeviceStatus::ok());
        let json = String::from_utf8(encode(&msg)).unwrap();
        assert_eq!(
            json,
            r#"{"msg_type":"stat","msg_id":0,"data_type":"server","device_name":"host1","device_group":"demo","device_uptime":"123.4","device_status":"OK"}"#
        );
    }

    #[test]
    fn test_ack_wire_format() {
        let json = String::from_utf8(encode(&Message::ack(42))).unwrap();
        assert_eq!(
            json,
            r#"{"msg_type":"set","msg_id":42,"data_type":"response","value":"ack"}"#
        );
    }

    #[test]
    fn test_discovery_wire_format() {
        let msg = Message::discovery(7, DataType::Device, "node-a", Payload::Empty);
        let json = String::from_utf8(encode(&msg)).unwrap();
        assert_eq!(
            json,
            r#"{"msg_type":"disco","msg_id":7,"data_type":"device","source":"node-a"}"#
        );
    }

    // ==================== Round trips ====================

    #[test]
    fn test_roundtrip_per_kind() {
        let identity = Identity::new("host1", "demo").unwrap();
        let messages = vec![
            Message::heartbeat(&identity, 61.25, DeviceStatus::ok()),
            Message::status(
                9,
                DataType::Client,
                StatusReport {
                    device_name: "sensor-3".into(),
                    device_group: "lab".into(),
                    device_uptime: 0.0,
                    device_status: DeviceStatus::from(json!({"battery": 81, "temp": 22.5})),
                },
            ),
            Message::ack(u32::MAX),
            Message::status(
                10,
                DataType::Server,
                StatusReport {
                    device_name: "sensor-4".into(),
                    device_group: "lab".into(),
                    device_uptime: 3.5,
                    device_status: DeviceStatus::from(Value::Null),
                },
            ),
            Message::discovery(5, DataType::from("router"), "node-b", Payload::Text("ports".into())),
            Message::discovery(6, DataType::default(), "", Payload::Empty),
            Message::get(11, DataType::Device, Payload::from(json!(["uptime", "load"]))),
            Message::get(13, DataType::Device, Payload::from(Value::Null)),
            Message::get(14, DataType::from("server"), Payload::from(json!(false))),
            Message::set(12, DataType::Device, Payload::Empty),
            Message::set(15, DataType::Client, Payload::Text("ack".into())),
            Message::set(16, DataType::Response, Payload::Text("".into())),
        ];

        for msg in messages {
            let decoded = decode(&encode(&msg)).unwrap();
            assert_eq!(decoded, msg);
        }
    }

    #[test]
    fn test_null_value_distinct_from_absent() {
        let null = decode(br#"{"msg_type":"get","msg_id":1,"data_type":"device","value":null}"#).unwrap();
        assert_eq!(null.value(), Some(&Payload::from(Value::Null)));

        let absent = decode(br#"{"msg_type":"get","msg_id":1,"data_type":"device"}"#).unwrap();
        assert_eq!(absent.value(), Some(&Payload::Empty));

        let status = decode(br#"{"msg_type":"stat","device_status":null}"#).unwrap();
        assert_eq!(status.status_report().unwrap().device_status, DeviceStatus::from(Value::Null));
        assert_eq!(
            String::from_utf8(encode(&null)).unwrap(),
            r#"{"msg_type":"get","msg_id":1,"data_type":"device","value":null}"#
        );
    }

    #[test]
    fn test_uptime_as_number_accepted() {
        let data = br#"{"msg_type":"stat","msg_id":3,"data_type":"client","device_name":"x","device_uptime":17.5}"#;
        let msg = decode(data).unwrap();
        assert_eq!(msg.status_report().unwrap().device_uptime, 17.5);
    }

    // ==================== Defaults ====================

    #[test]
    fn test_missing_optional_fields_default() {
        let msg = decode(br#"{"msg_type":"stat"}"#).unwrap();
        assert_eq!(msg.id, 0);
        assert_eq!(msg.data_type, DataType::default());

        let report = msg.status_report().unwrap();
        assert_eq!(report.device_name, "");
        assert_eq!(report.device_group, "");
        assert_eq!(report.device_uptime, 0.0);
    }

    #[test]
    fn test_unknown_fields_ignored() {
        let msg = decode(br#"{"msg_type":"get","msg_id":1,"data_type":"device","firmware":"2.1"}"#).unwrap();
        assert_eq!(msg.value(), Some(&Payload::Empty));
    }

    // ==================== Errors ====================

    #[test]
    fn test_not_json() {
        assert!(matches!(decode(b"not json at all"), Err(DecodeError::Malformed(_))));
        assert!(matches!(decode(b""), Err(DecodeError::Malformed(_))));
        assert!(matches!(decode(&[0xFF, 0xFE]), Err(DecodeError::Malformed(_))));
    }

    #[test]
    fn test_not_an_object() {
        assert!(matches!(decode(b"[\"stat\", 0]"), Err(DecodeError::Malformed(_))));
        assert!(matches!(decode(b"42"), Err(DecodeError::Malformed(_))));
    }

    #[test]
    fn test_missing_kind() {
        let result = decode(br#"{"msg_id":1,"data_type":"server"}"#);
        assert_eq!(result, Err(DecodeError::MissingKind));
    }

    #[test]
    fn test_unknown_kind() {
        let result = decode(br#"{"msg_type":"reboot","msg_id":1}"#);
        assert_eq!(result, Err(DecodeError::UnknownKind("reboot".into())));
    }

    #[test]
    fn test_bad_msg_id() {
        assert!(matches!(
            decode(br#"{"msg_type":"set","msg_id":-1}"#),
            Err(DecodeError::Malformed(_))
        ));
        assert!(matches!(
            decode(br#"{"msg_type":"set","msg_id":4294967296}"#),
            Err(DecodeError::Malformed(_))
        ));
        assert!(matches!(
            decode(br#"{"msg_type":"set","msg_id":"7"}"#),
            Err(DecodeError::Malformed(_))
        ));
    }

    #[test]
    fn test_bad_uptime() {
        let garbage = decode(br#"{"msg_type":"stat","device_uptime":"soon"}"#);
        assert!(matches!(
            garbage,
            Err(DecodeError::InvalidField { field: "device_uptime", .. })
        ));

        let negative = decode(br#"{"msg_type":"stat","device_uptime":"-3"}"#);
        assert!(matches!(
            negative,
            Err(DecodeError::InvalidField { field: "device_uptime", .. })
        ));
    }
}
