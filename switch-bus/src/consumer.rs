//! Consumer worker loop with manual-commit discipline
//!
//! One consumer per topic, one message in flight at a time. Handlers
//! receive a [`Delivery`] carrying the decoded envelope plus a commit
//! handle; on manual-commit topics the handler commits the offset itself
//! once it has reached a terminal outcome. A handler error leaves the
//! offset uncommitted and the envelope is redelivered.

use crate::{
    client::BusClient,
    envelope::EventEnvelope,
    metrics::{BUS_COMMIT_TOTAL, BUS_CONSUME_TOTAL, BUS_PROCESS_DURATION},
    topics::Topic,
    Error, Result,
};
use async_nats::jetstream::{self, consumer};
use async_trait::async_trait;
use futures::StreamExt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Error type returned by envelope handlers
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Handler bound to a topic by the registrar
#[async_trait]
pub trait EnvelopeHandler: Send + Sync {
    /// Process one delivery to a terminal outcome
    ///
    /// Returning `Err` is fatal for this delivery: the offset is not
    /// committed and the envelope will be redelivered.
    async fn handle(&self, delivery: Delivery) -> std::result::Result<(), HandlerError>;
}

/// Offset-commit seam for one delivery
#[async_trait]
pub trait CommitPoint: Send + Sync {
    /// Whether this topic commits automatically after the handler returns
    fn auto_commit(&self) -> bool;

    /// Synchronously commit the offset; idempotent per delivery
    async fn commit(&self) -> Result<()>;
}

/// One consumed envelope plus its commit handle
pub struct Delivery {
    topic: Topic,
    envelope: EventEnvelope,
    commit: Arc<dyn CommitPoint>,
}

impl Delivery {
    /// Assemble a delivery (used by the worker loop and by test harnesses)
    pub fn new(topic: Topic, envelope: EventEnvelope, commit: Arc<dyn CommitPoint>) -> Self {
        Self {
            topic,
            envelope,
            commit,
        }
    }

    /// Topic the envelope was consumed from
    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    /// The decoded envelope
    pub fn envelope(&self) -> &EventEnvelope {
        &self.envelope
    }

    /// Whether the consumer commits for us
    pub fn auto_commit(&self) -> bool {
        self.commit.auto_commit()
    }

    /// Commit the offset if this is a manual-commit topic
    ///
    /// No-op under auto-commit so pipelines can call it unconditionally.
    pub async fn commit(&self) -> Result<()> {
        if self.commit.auto_commit() {
            return Ok(());
        }
        self.commit.commit().await
    }
}

impl std::fmt::Debug for Delivery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Delivery")
            .field("topic", &self.topic)
            .field("envelope_id", &self.envelope.id)
            .finish()
    }
}

/// Consumer configuration, sourced per (CONSUMER, TRANSFER, action)
#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    /// Consumer group (durable) identifier
    pub group_id: String,

    /// Client id; equals the topic name at registration
    pub client_id: String,

    /// Session timeout / ack wait
    pub session_timeout: Duration,

    /// Max delivery attempts before the broker parks the message
    pub max_deliver: i64,

    /// Auto-commit flag; off means the handler owns the commit
    pub auto_commit: bool,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            group_id: "transfer-switch".to_string(),
            client_id: "transfer-switch".to_string(),
            session_timeout: Duration::from_secs(30),
            max_deliver: 3,
            auto_commit: false,
        }
    }
}

/// Commit point backed by a JetStream message
struct JetStreamCommit {
    message: jetstream::Message,
    topic: Topic,
    auto: bool,
    committed: AtomicBool,
}

impl JetStreamCommit {
    fn new(message: jetstream::Message, topic: Topic, auto: bool) -> Self {
        Self {
            message,
            topic,
            auto,
            committed: AtomicBool::new(false),
        }
    }

    /// Request redelivery unless the offset was already committed
    async fn reject(&self) {
        if self.committed.load(Ordering::SeqCst) {
            return;
        }
        if let Err(e) = self
            .message
            .ack_with(jetstream::AckKind::Nak(None))
            .await
        {
            error!("failed to nak delivery on {}: {}", self.topic, e);
        }
    }
}

#[async_trait]
impl CommitPoint for JetStreamCommit {
    fn auto_commit(&self) -> bool {
        self.auto
    }

    async fn commit(&self) -> Result<()> {
        if self.committed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let result = self
            .message
            .double_ack()
            .await
            .map_err(|e| Error::Commit(e.to_string()));

        let status = if result.is_ok() { "success" } else { "error" };
        BUS_COMMIT_TOTAL
            .with_label_values(&[self.topic.as_str(), status])
            .inc();

        result
    }
}

/// Topic-bound consumer
pub struct BusConsumer {
    client: Arc<BusClient>,
    config: ConsumerConfig,
    topic: Topic,
}

impl BusConsumer {
    /// Create a consumer for one topic
    pub fn new(client: Arc<BusClient>, config: ConsumerConfig, topic: Topic) -> Self {
        Self {
            client,
            config,
            topic,
        }
    }

    /// Topic this consumer is bound to
    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    /// Whether the topic runs with auto-commit
    pub fn is_auto_commit(&self) -> bool {
        self.config.auto_commit
    }

    /// Consume until the stream ends, handling messages strictly in order
    pub async fn run<H>(&self, handler: Arc<H>) -> Result<()>
    where
        H: EnvelopeHandler + 'static,
    {
        let subject = self.topic.as_str().to_string();

        self.client.ensure_topic_stream(&self.topic).await?;

        let consumer_config = consumer::pull::Config {
            durable_name: Some(self.config.group_id.clone()),
            name: Some(self.config.client_id.clone()),
            filter_subject: subject,
            ack_policy: consumer::AckPolicy::Explicit,
            ack_wait: self.config.session_timeout,
            max_deliver: self.config.max_deliver,
            deliver_policy: consumer::DeliverPolicy::All,
            ..Default::default()
        };

        let js = self.client.jetstream().await?;
        let consumer = js
            .get_stream(self.topic.stream_name())
            .await
            .map_err(|e| Error::JetStream(e.to_string()))?
            .create_consumer(consumer_config)
            .await
            .map_err(|e| Error::Consume(e.to_string()))?;

        info!(
            "consumer {} bound to {} (auto_commit: {})",
            self.config.client_id, self.topic, self.config.auto_commit
        );

        let mut messages = consumer
            .messages()
            .await
            .map_err(|e| Error::Consume(e.to_string()))?;

        while let Some(message) = messages.next().await {
            let message = message.map_err(|e| Error::Consume(e.to_string()))?;

            let envelope = match EventEnvelope::from_bytes(&message.payload) {
                Ok(envelope) => envelope,
                Err(e) => {
                    // Undecodable bytes can never succeed; terminate instead
                    // of redelivering forever.
                    warn!("dropping undecodable envelope on {}: {}", self.topic, e);
                    BUS_CONSUME_TOTAL
                        .with_label_values(&[self.topic.as_str(), "parse_error"])
                        .inc();
                    if let Err(term_err) = message.ack_with(jetstream::AckKind::Term).await {
                        error!("failed to terminate bad envelope: {}", term_err);
                    }
                    continue;
                }
            };

            BUS_CONSUME_TOTAL
                .with_label_values(&[self.topic.as_str(), "success"])
                .inc();

            let commit = Arc::new(JetStreamCommit::new(
                message,
                self.topic.clone(),
                self.config.auto_commit,
            ));
            let delivery = Delivery::new(self.topic.clone(), envelope, commit.clone());

            let start = Instant::now();
            match handler.handle(delivery).await {
                Ok(()) => {
                    if self.config.auto_commit {
                        if let Err(e) = commit.commit().await {
                            error!("auto-commit failed on {}: {}", self.topic, e);
                        }
                    }
                    BUS_PROCESS_DURATION
                        .with_label_values(&[self.topic.as_str()])
                        .observe(start.elapsed().as_secs_f64());
                }
                Err(e) => {
                    error!("handler failed on {}: {}", self.topic, e);
                    commit.reject().await;
                }
            }
        }

        Ok(())
    }
}
