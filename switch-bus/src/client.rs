//! Broker connection shared by producers and consumers
//!
//! One JetStream stream backs each topic, with the subject equal to the
//! topic name. Streams are created lazily on first use and remembered,
//! so the per-publish and per-subscribe paths skip the broker lookup
//! after the first touch. Retention bounds come from [`BusConfig`] and
//! apply uniformly to every topic stream.

use crate::{topics::Topic, Error, Result};
use async_nats::jetstream::{self, stream::Config as StreamConfig};
use std::collections::HashSet;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Bus client configuration
#[derive(Debug, Clone)]
pub struct BusConfig {
    /// Broker URLs
    pub urls: Vec<String>,

    /// Connection name reported to the broker
    pub name: String,

    /// Connection timeout
    pub connection_timeout: Duration,

    /// Retention bounds applied to every topic stream
    pub stream: StreamSettings,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            urls: vec!["nats://localhost:4222".to_string()],
            name: "transfer-switch".to_string(),
            connection_timeout: Duration::from_secs(5),
            stream: StreamSettings::default(),
        }
    }
}

/// Retention bounds for topic streams
///
/// Envelopes only need to outlive their consumers plus an operator
/// replay window; the bus is not the system of record.
#[derive(Debug, Clone)]
pub struct StreamSettings {
    /// Max retained envelopes per topic
    pub max_messages: i64,

    /// Max retained bytes per topic
    pub max_bytes: i64,

    /// Max envelope age
    pub max_age: Duration,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            max_messages: 1_000_000,
            max_bytes: 1024 * 1024 * 1024,
            max_age: Duration::from_secs(7 * 24 * 60 * 60),
        }
    }
}

struct Connection {
    client: async_nats::Client,
    jetstream: jetstream::Context,
}

/// Shared bus client
///
/// Cheap to share behind an `Arc`; every producer and consumer in the
/// process uses the same connection and the same topic-stream cache.
pub struct BusClient {
    config: BusConfig,
    connection: RwLock<Option<Connection>>,
    ensured_streams: RwLock<HashSet<String>>,
}

impl BusClient {
    /// Create a new, unconnected client
    pub fn new(config: BusConfig) -> Self {
        Self {
            config,
            connection: RwLock::new(None),
            ensured_streams: RwLock::new(HashSet::new()),
        }
    }

    /// Dial the broker and initialize JetStream
    pub async fn connect(&self) -> Result<()> {
        info!("connecting to bus: {:?}", self.config.urls);

        let options = async_nats::ConnectOptions::new()
            .name(&self.config.name)
            .connection_timeout(self.config.connection_timeout)
            .retry_on_initial_connect();

        let client = async_nats::connect_with_options(self.config.urls.join(","), options)
            .await
            .map_err(|e| Error::Connection(e.to_string()))?;
        let jetstream = jetstream::new(client.clone());

        *self.connection.write().await = Some(Connection { client, jetstream });

        info!("connected to bus as {}", self.config.name);
        Ok(())
    }

    /// Get the underlying broker client
    pub async fn client(&self) -> Result<async_nats::Client> {
        self.connection
            .read()
            .await
            .as_ref()
            .map(|c| c.client.clone())
            .ok_or_else(|| Error::Connection("not connected".to_string()))
    }

    /// Get the JetStream context
    pub async fn jetstream(&self) -> Result<jetstream::Context> {
        self.connection
            .read()
            .await
            .as_ref()
            .map(|c| c.jetstream.clone())
            .ok_or_else(|| Error::Connection("not connected".to_string()))
    }

    /// Whether the broker connection is established and healthy
    pub async fn is_connected(&self) -> bool {
        match self.connection.read().await.as_ref() {
            Some(connection) => {
                connection.client.connection_state() == async_nats::connection::State::Connected
            }
            None => false,
        }
    }

    /// Flush pending publishes and drop the connection
    ///
    /// The topic-stream cache is cleared too: streams may have been
    /// pruned by an operator while we were away.
    pub async fn disconnect(&self) -> Result<()> {
        if let Some(connection) = self.connection.write().await.take() {
            connection
                .client
                .flush()
                .await
                .map_err(|e| Error::Connection(e.to_string()))?;
            info!("disconnected from bus");
        }

        self.ensured_streams.write().await.clear();
        Ok(())
    }

    /// Make sure the stream backing a topic exists
    ///
    /// Derives the stream from the topic (stream name, single subject
    /// equal to the topic name, retention from [`BusConfig`]) and caches
    /// the result so later calls for the same topic are free.
    pub async fn ensure_topic_stream(&self, topic: &Topic) -> Result<()> {
        let stream_name = topic.stream_name();

        if self.ensured_streams.read().await.contains(&stream_name) {
            return Ok(());
        }

        let js = self.jetstream().await?;
        js.get_or_create_stream(self.topic_stream_config(topic))
            .await
            .map_err(|e| Error::JetStream(format!("stream {}: {}", stream_name, e)))?;

        debug!("stream {} ready for topic {}", stream_name, topic);
        self.ensured_streams.write().await.insert(stream_name);
        Ok(())
    }

    fn topic_stream_config(&self, topic: &Topic) -> StreamConfig {
        StreamConfig {
            name: topic.stream_name(),
            subjects: vec![topic.as_str().to_string()],
            max_messages: self.config.stream.max_messages,
            max_bytes: self.config.stream.max_bytes,
            max_age: self.config.stream.max_age,
            storage: jetstream::stream::StorageType::File,
            ..Default::default()
        }
    }

    /// Round-trip health check against the broker
    pub async fn health_check(&self) -> Result<()> {
        let client = self.client().await?;

        client
            .flush()
            .await
            .map_err(|e| Error::Connection(format!("flush failed: {}", e)))?;

        match client.connection_state() {
            async_nats::connection::State::Connected => Ok(()),
            state => Err(Error::Connection(format!("broker is {}", state))),
        }
    }
}
