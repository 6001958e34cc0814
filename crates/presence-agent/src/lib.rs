//! presence-agent library: Exposes the agent components for testing.
//!
//! This is a thin layer over `presence-core` that adds the MQTT transport,
//! file configuration and the agent wiring used by the binary.

pub mod agent;
pub mod config;
pub mod mqtt;

// Re-export key types for convenience
pub use agent::{subscriptions_for, Agent};
pub use config::AgentConfig;
pub use mqtt::MqttTransport;
