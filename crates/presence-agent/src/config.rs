//! Configuration loading and management

use std::path::Path;

use anyhow::{bail, Context, Result};
use presence_core::{DeviceStatus, HeartbeatConfig, Identity};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main configuration for the agent
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Broker connection settings
    #[serde(default)]
    pub broker: BrokerConfig,

    /// This node's identity
    #[serde(default)]
    pub device: DeviceConfig,

    /// Heartbeat settings
    #[serde(default)]
    pub heartbeat: HeartbeatSection,

    /// Also subscribe to `/group/<group>/#`
    #[serde(default)]
    pub subscribe_group: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// MQTT keep-alive in seconds (default: 30)
    #[serde(default = "default_keep_alive")]
    pub keep_alive_secs: u64,

    /// Client ID (generated from the device name if not set)
    pub client_id: Option<String>,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            keep_alive_secs: default_keep_alive(),
            client_id: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Unique device name (defaults to the host name)
    pub name: Option<String>,

    #[serde(default = "default_group")]
    pub group: String,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            name: None,
            group: default_group(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatSection {
    /// Seconds between heartbeats (default: 60)
    #[serde(default = "default_interval")]
    pub interval_secs: u64,

    /// Seconds to wait after startup before the first heartbeat (default: 2)
    #[serde(default = "default_initial_delay")]
    pub initial_delay_secs: u64,

    /// Reported `device_status`, a string or any JSON structure (default: "OK")
    #[serde(default = "default_status")]
    pub status: serde_json::Value,
}

impl Default for HeartbeatSection {
    fn default() -> Self {
        Self {
            interval_secs: default_interval(),
            initial_delay_secs: default_initial_delay(),
            status: default_status(),
        }
    }
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    1883
}

fn default_keep_alive() -> u64 {
    30
}

fn default_group() -> String {
    "demo".to_string()
}

fn default_interval() -> u64 {
    60
}

fn default_initial_delay() -> u64 {
    2
}

fn default_status() -> serde_json::Value {
    serde_json::Value::String("OK".to_string())
}

impl AgentConfig {
    /// Load configuration from a JSON file
    pub fn load(config_file: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(config_file)
            .with_context(|| format!("Failed to read config file: {:?}", config_file))?;
        let config: AgentConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {:?}", config_file))?;
        tracing::info!("Loaded configuration from {:?}", config_file);
        Ok(config)
    }

    /// Load from `path` if given, otherwise use defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => {
                tracing::info!("No config file given, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Configured device name, or the host name
    pub fn device_name(&self) -> String {
        match &self.device.name {
            Some(name) => name.clone(),
            None => gethostname::gethostname().to_string_lossy().into_owned(),
        }
    }

    pub fn identity(&self) -> Result<Identity> {
        let name = self.device_name();
        Identity::new(name.clone(), self.device.group.clone())
            .with_context(|| format!("Invalid device identity {:?}/{:?}", name, self.device.group))
    }

    pub fn heartbeat_config(&self) -> Result<HeartbeatConfig> {
        let max_secs = HeartbeatConfig::MAX_PERIOD.as_secs();
        if self.heartbeat.interval_secs == 0 {
            bail!("heartbeat.interval_secs must be greater than zero");
        }
        if self.heartbeat.interval_secs > max_secs {
            bail!("heartbeat.interval_secs must be at most {}", max_secs);
        }
        if self.heartbeat.initial_delay_secs > max_secs {
            bail!("heartbeat.initial_delay_secs must be at most {}", max_secs);
        }

        Ok(HeartbeatConfig {
            interval: Duration::from_secs(self.heartbeat.interval_secs),
            initial_delay: Duration::from_secs(self.heartbeat.initial_delay_secs),
            status: DeviceStatus::from(self.heartbeat.status.clone()),
        })
    }

    /// Configured client ID, or `presence-<name>-<random suffix>`
    pub fn client_id(&self, device_name: &str) -> String {
        match &self.broker.client_id {
            Some(id) => id.clone(),
            None => {
                let suffix = uuid::Uuid::new_v4().simple().to_string();
                format!("presence-{}-{}", device_name, &suffix[..8])
            }
        }
    }
}
