//! Configuration for the orchestration core
//!
//! Consumer settings are keyed per action (prepare / fulfil / transfer),
//! mirroring the external (CONSUMER, TRANSFER, <ACTION>) configuration
//! convention. TOML file plus environment-variable overrides.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use switch_bus::{BusConfig, ConsumerConfig, Topic};

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Bus connection settings
    pub bus: BusSettings,

    /// Per-action consumer settings
    pub consumers: ConsumerSections,

    /// Explicit participant list; `None` means fetch from the store
    pub participants: Option<Vec<String>>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bus: BusSettings::default(),
            consumers: ConsumerSections::default(),
            participants: None,
        }
    }
}

/// Bus connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BusSettings {
    /// Broker URLs
    pub urls: Vec<String>,

    /// Connection name reported to the broker
    pub client_name: String,

    /// Connection timeout (milliseconds)
    pub connection_timeout_ms: u64,
}

impl Default for BusSettings {
    fn default() -> Self {
        Self {
            urls: vec!["nats://localhost:4222".to_string()],
            client_name: "transfer-switch".to_string(),
            connection_timeout_ms: 5_000,
        }
    }
}

impl BusSettings {
    /// Bus-gateway config form
    pub fn to_bus_config(&self) -> BusConfig {
        BusConfig {
            urls: self.urls.clone(),
            name: self.client_name.clone(),
            connection_timeout: Duration::from_millis(self.connection_timeout_ms),
            ..BusConfig::default()
        }
    }
}

/// One section per consumed action
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsumerSections {
    /// Per-participant prepare consumers
    pub prepare: ConsumerSettings,

    /// Shared fulfil consumer
    pub fulfil: ConsumerSettings,

    /// Shared transfer-event consumer
    pub transfer: ConsumerSettings,
}

/// Settings for one consumer group
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsumerSettings {
    /// Consumer group identifier
    pub group_id: String,

    /// Session timeout (milliseconds)
    pub session_timeout_ms: u64,

    /// Max delivery attempts
    pub max_deliver: i64,

    /// Auto-commit flag; off means the pipeline owns the commit
    pub auto_commit: bool,
}

impl Default for ConsumerSettings {
    fn default() -> Self {
        Self {
            group_id: "cg-transfer".to_string(),
            session_timeout_ms: 30_000,
            max_deliver: 3,
            auto_commit: false,
        }
    }
}

impl ConsumerSettings {
    /// Consumer config bound to a topic; client id equals the topic name
    pub fn to_consumer_config(&self, topic: &Topic) -> ConsumerConfig {
        ConsumerConfig {
            group_id: self.group_id.clone(),
            client_id: topic.as_str().to_string(),
            session_timeout: Duration::from_millis(self.session_timeout_ms),
            max_deliver: self.max_deliver,
            auto_commit: self.auto_commit,
        }
    }
}

impl Config {
    /// Load from a TOML file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read config file: {}", e)))?;
        toml::from_str(&content).map_err(|e| Error::Config(format!("cannot parse config: {}", e)))
    }

    /// Defaults plus environment overrides
    pub fn from_env() -> Self {
        let mut config = Config::default();

        if let Ok(urls) = std::env::var("SWITCH_BUS_URLS") {
            config.bus.urls = urls.split(',').map(str::to_string).collect();
        }
        if let Ok(name) = std::env::var("SWITCH_CLIENT_NAME") {
            config.bus.client_name = name;
        }
        if let Ok(participants) = std::env::var("SWITCH_PARTICIPANTS") {
            config.participants = Some(participants.split(',').map(str::to_string).collect());
        }

        config
    }
}
