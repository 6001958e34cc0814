//! presence-agent: MQTT device presence agent.
//!
//! Broadcasts a heartbeat for this device, acknowledges peers' heartbeats and
//! logs discovery/get/set traffic addressed to the network or to this device.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use presence_agent::mqtt::{inbound_publish, is_connack};
use presence_agent::{Agent, AgentConfig, MqttTransport};
use presence_core::MonotonicClock;

/// Pause before polling again after a broker connection error.
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

#[derive(Parser, Debug)]
#[command(name = "presence-agent")]
#[command(about = "Device presence agent for the MQTT network")]
struct Args {
    /// Path to a JSON config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Broker host name or address
    #[arg(short, long, env = "PRESENCE_BROKER")]
    broker: Option<String>,

    /// Broker port
    #[arg(short, long)]
    port: Option<u16>,

    /// Device name (defaults to the host name)
    #[arg(short, long)]
    name: Option<String>,

    /// Device group
    #[arg(short, long)]
    group: Option<String>,

    /// Seconds between heartbeats
    #[arg(long)]
    interval: Option<u64>,

    /// Also subscribe to the group topic
    #[arg(long)]
    subscribe_group: bool,

    /// Enable verbose logging
    #[arg(long)]
    verbose: bool,
}

impl Args {
    /// Command-line values win over the config file.
    fn apply(&self, config: &mut AgentConfig) {
        if let Some(host) = &self.broker {
            config.broker.host = host.clone();
        }
        if let Some(port) = self.port {
            config.broker.port = port;
        }
        if let Some(name) = &self.name {
            config.device.name = Some(name.clone());
        }
        if let Some(group) = &self.group {
            config.device.group = group.clone();
        }
        if let Some(interval) = self.interval {
            config.heartbeat.interval_secs = interval;
        }
        if self.subscribe_group {
            config.subscribe_group = true;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Set up logging - respects RUST_LOG env var, defaults to info (or debug with --verbose)
    let default_filter = if args.verbose {
        "debug,presence_agent=debug,presence_core=debug,rumqttc=info"
    } else {
        "info,presence_agent=info,presence_core=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting presence-agent {}", env!("CARGO_PKG_VERSION"));

    let mut config = AgentConfig::load_or_default(args.config.as_deref())?;
    args.apply(&mut config);

    let identity = Arc::new(config.identity()?);
    let heartbeat_config = config.heartbeat_config()?;
    let client_id = config.client_id(identity.name());
    info!("Device {} (client id {})", identity, client_id);

    let (transport, mut eventloop) = MqttTransport::connect(&config.broker, &client_id);
    let agent = Agent::new(identity, Arc::new(transport), config.subscribe_group);
    let heartbeat = agent.start_heartbeat(heartbeat_config, Arc::new(MonotonicClock::new()));

    info!("Agent running. Press Ctrl+C to stop.");

    // Set on every CONNACK, cleared once all subscriptions are queued
    let mut subscribe_pending = false;

    // Main event loop
    loop {
        tokio::select! {
            event = eventloop.poll() => {
                match event {
                    Ok(event) => {
                        if is_connack(&event) {
                            info!("Connected to {}:{}", config.broker.host, config.broker.port);
                            subscribe_pending = true;
                        } else if let Some((topic, payload)) = inbound_publish(&event) {
                            agent.on_message(topic, payload);
                        }

                        // Retried on later events while the request queue is full
                        if subscribe_pending {
                            match agent.subscribe().await {
                                Ok(()) => subscribe_pending = false,
                                Err(e) => warn!("Subscribe deferred: {}", e),
                            }
                        }
                    }
                    Err(e) => {
                        error!("Broker connection error: {}", e);
                        tokio::time::sleep(RECONNECT_DELAY).await;
                    }
                }
            }

            // Handle graceful shutdown
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
        }
    }

    info!("Shutting down");
    agent.shutdown(heartbeat).await;
    Ok(())
}
