//! Topic naming on the message bus.
//!
//! Subscriptions use the multi-level wildcard so sub-topics are delivered too;
//! `/network/broadcasts/#` also matches `/network/broadcasts` itself.

/// Network-wide broadcast topic; heartbeats are published here.
pub const BROADCAST_TOPIC: &str = "/network/broadcasts";

/// Subscription pattern for all network broadcasts.
pub fn broadcast_subscription() -> String {
    format!("{}/#", BROADCAST_TOPIC)
}

/// Direct topic of a named device; replies to that device are published here.
pub fn device_topic(name: &str) -> String {
    format!("/device/{}", name)
}

/// Subscription pattern for everything addressed to a device.
pub fn device_subscription(name: &str) -> String {
    format!("{}/#", device_topic(name))
}

/// Group broadcast topic.
pub fn group_topic(group: &str) -> String {
    format!("/group/{}", group)
}

/// Subscription pattern for a group's broadcasts.
pub fn group_subscription(group: &str) -> String {
    format!("{}/#", group_topic(group))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_names() {
        assert_eq!(BROADCAST_TOPIC, "/network/broadcasts");
        assert_eq!(broadcast_subscription(), "/network/broadcasts/#");
        assert_eq!(device_topic("host1"), "/device/host1");
        assert_eq!(device_subscription("host1"), "/device/host1/#");
        assert_eq!(group_subscription("demo"), "/group/demo/#");
    }
}
