//! Envelope producer with retry logic
//!
//! Delivery is at-least-once: a publish is retried with exponential
//! backoff until the broker acknowledges it or attempts are exhausted.
//! Consumers must tolerate duplicate envelopes.

use crate::{
    client::BusClient,
    envelope::EventEnvelope,
    metrics::{BUS_PRODUCE_DURATION, BUS_PRODUCE_TOTAL},
    topics::{Functionality, Topic, TopicAction},
    Error, Result,
};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

/// Producer seam used by the coordinators
///
/// The default methods derive the destination topic from the routing
/// parameters so callers never hand-build topic strings.
#[async_trait]
pub trait Produce: Send + Sync {
    /// Publish an envelope to an explicit topic
    async fn send(&self, topic: &Topic, envelope: &EventEnvelope) -> Result<()>;

    /// Publish to a general topic: `topic-<functionality>-<action>`
    async fn produce_general(
        &self,
        functionality: Functionality,
        action: TopicAction,
        envelope: &EventEnvelope,
    ) -> Result<()> {
        self.send(&Topic::general(functionality, action), envelope)
            .await
    }

    /// Publish to a per-participant topic:
    /// `topic-<participant>-<functionality>-<action>`
    async fn produce_participant(
        &self,
        participant: &str,
        functionality: Functionality,
        action: TopicAction,
        envelope: &EventEnvelope,
    ) -> Result<()> {
        self.send(
            &Topic::participant(participant, functionality, action),
            envelope,
        )
        .await
    }
}

/// Producer configuration
#[derive(Debug, Clone)]
pub struct ProducerConfig {
    /// Max publish attempts before giving up
    pub max_retry_attempts: u32,

    /// Initial retry delay
    pub initial_retry_delay: Duration,

    /// Retry delay ceiling
    pub max_retry_delay: Duration,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            max_retry_attempts: 3,
            initial_retry_delay: Duration::from_millis(100),
            max_retry_delay: Duration::from_secs(2),
        }
    }
}

/// JetStream-backed producer
pub struct BusProducer {
    client: Arc<BusClient>,
    config: ProducerConfig,
}

impl BusProducer {
    /// Create a new producer
    pub fn new(client: Arc<BusClient>, config: ProducerConfig) -> Self {
        Self { client, config }
    }

    async fn publish_once(&self, topic: &Topic, payload: &[u8]) -> Result<()> {
        self.client.ensure_topic_stream(topic).await?;
        let js = self.client.jetstream().await?;

        let ack = js
            .publish(
                topic.as_str().to_string(),
                bytes::Bytes::copy_from_slice(payload),
            )
            .await
            .map_err(|e| Error::Produce(e.to_string()))?;

        ack.await
            .map_err(|e| Error::Produce(format!("publish ack failed: {}", e)))?;

        Ok(())
    }

    async fn publish_with_retry(&self, topic: &Topic, payload: &[u8]) -> Result<()> {
        let mut attempts = 0;
        let mut delay = self.config.initial_retry_delay;

        loop {
            attempts += 1;

            match self.publish_once(topic, payload).await {
                Ok(_) => {
                    if attempts > 1 {
                        debug!("published to {} after {} attempts", topic, attempts);
                    }
                    return Ok(());
                }
                Err(e) => {
                    if attempts >= self.config.max_retry_attempts {
                        error!("publish to {} failed after {} attempts: {}", topic, attempts, e);
                        return Err(e);
                    }

                    warn!(
                        "publish to {} failed (attempt {}), retrying in {:?}: {}",
                        topic, attempts, delay, e
                    );
                    tokio::time::sleep(delay).await;
                    delay = (delay * 2).min(self.config.max_retry_delay);
                }
            }
        }
    }
}

#[async_trait]
impl Produce for BusProducer {
    async fn send(&self, topic: &Topic, envelope: &EventEnvelope) -> Result<()> {
        let start = Instant::now();
        let payload = envelope.to_bytes()?;

        debug!("producing envelope {} to {}", envelope.id, topic);

        let result = self.publish_with_retry(topic, &payload).await;

        BUS_PRODUCE_DURATION
            .with_label_values(&[topic.as_str()])
            .observe(start.elapsed().as_secs_f64());

        let status = if result.is_ok() { "success" } else { "error" };
        BUS_PRODUCE_TOTAL
            .with_label_values(&[topic.as_str(), status])
            .inc();

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::BusConfig;

    #[tokio::test]
    async fn test_producer_config_default() {
        let config = ProducerConfig::default();
        assert_eq!(config.max_retry_attempts, 3);
        assert_eq!(config.initial_retry_delay, Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_send_fails_when_disconnected() {
        let client = Arc::new(BusClient::new(BusConfig::default()));
        let producer = BusProducer::new(client, ProducerConfig::default());

        let envelope = EventEnvelope::new(
            "t1",
            "dfspA",
            "dfspB",
            crate::EventType::Transfer,
            crate::EventAction::Prepare,
            crate::EventState::success(),
            serde_json::json!({}),
        );

        let topic = Topic::general(Functionality::Transfer, TopicAction::Fulfil);
        assert!(producer.send(&topic, &envelope).await.is_err());
    }
}
