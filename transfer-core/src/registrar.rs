//! Handler registrar
//!
//! Binds the coordinators to their topics: one consumer per participant
//! PREPARE topic, one on the shared FULFIL topic, one on the shared
//! TRANSFER topic. Each consumer runs on its own task; messages within
//! a topic are handled strictly sequentially. Registration failures
//! propagate; partial registration is left to the operator to recover.

use crate::config::Config;
use crate::handlers::{FulfilCoordinator, PrepareCoordinator, TransferEventRouter};
use crate::store::TransferStore;
use crate::Result;
use std::sync::Arc;
use switch_bus::{
    BusClient, BusConsumer, EnvelopeHandler, Functionality, Produce, Topic, TopicAction,
};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Result of a registration step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterOutcome {
    /// Consumers were bound
    Registered,

    /// Nothing to bind (empty participant list)
    NoWork,
}

/// One spawned consumer
#[derive(Debug)]
pub struct RegisteredConsumer {
    /// Topic the consumer is bound to
    pub topic: Topic,

    /// The consumer task
    pub task: JoinHandle<()>,
}

/// All consumers spawned by a registration run
#[derive(Debug, Default)]
pub struct RegisterSummary {
    /// Spawned consumers, in registration order
    pub consumers: Vec<RegisteredConsumer>,
}

/// Binds coordinators to topics
pub struct Registrar {
    client: Arc<BusClient>,
    producer: Arc<dyn Produce>,
    store: Arc<dyn TransferStore>,
    config: Config,
}

impl Registrar {
    /// Registrar over the shared client, producer, and store
    pub fn new(
        client: Arc<BusClient>,
        producer: Arc<dyn Produce>,
        store: Arc<dyn TransferStore>,
        config: Config,
    ) -> Self {
        Self {
            client,
            producer,
            store,
            config,
        }
    }

    /// Register every handler: prepare (per participant), fulfil, transfer
    pub async fn register_all_handlers(&self) -> Result<RegisterSummary> {
        let mut summary = RegisterSummary::default();

        self.register_prepare_handlers(None, &mut summary).await?;
        self.register_fulfil_handler(&mut summary);
        self.register_transfer_handler(&mut summary);

        info!("registered {} consumers", summary.consumers.len());
        Ok(summary)
    }

    /// One consumer per participant PREPARE topic, bound to the prepare
    /// coordinator
    ///
    /// Without an explicit list the participants come from configuration
    /// or, failing that, the store. An empty list is reported, not an
    /// error.
    pub async fn register_prepare_handlers(
        &self,
        participants: Option<Vec<String>>,
        summary: &mut RegisterSummary,
    ) -> Result<RegisterOutcome> {
        let names = match participants.or_else(|| self.config.participants.clone()) {
            Some(names) => names,
            None => self
                .store
                .participants()
                .await?
                .into_iter()
                .map(|p| p.name)
                .collect(),
        };

        if names.is_empty() {
            warn!("no participants; prepare handlers not registered");
            return Ok(RegisterOutcome::NoWork);
        }

        for name in names {
            let topic = Topic::participant(&name, Functionality::Transfer, TopicAction::Prepare);
            let handler = Arc::new(PrepareCoordinator::new(
                self.store.clone(),
                self.producer.clone(),
            ));
            self.spawn_consumer(topic, &self.config.consumers.prepare, handler, summary);
        }

        Ok(RegisterOutcome::Registered)
    }

    /// Single consumer on the shared FULFIL topic
    pub fn register_fulfil_handler(&self, summary: &mut RegisterSummary) {
        let topic = Topic::general(Functionality::Transfer, TopicAction::Fulfil);
        let handler = Arc::new(FulfilCoordinator::new(
            self.store.clone(),
            self.producer.clone(),
        ));
        self.spawn_consumer(topic, &self.config.consumers.fulfil, handler, summary);
    }

    /// Single consumer on the shared TRANSFER topic
    pub fn register_transfer_handler(&self, summary: &mut RegisterSummary) {
        let topic = Topic::general(Functionality::Transfer, TopicAction::Transfer);
        let handler = Arc::new(TransferEventRouter::new(self.producer.clone()));
        self.spawn_consumer(topic, &self.config.consumers.transfer, handler, summary);
    }

    fn spawn_consumer<H>(
        &self,
        topic: Topic,
        settings: &crate::config::ConsumerSettings,
        handler: Arc<H>,
        summary: &mut RegisterSummary,
    ) where
        H: EnvelopeHandler + 'static,
    {
        let consumer = BusConsumer::new(
            self.client.clone(),
            settings.to_consumer_config(&topic),
            topic.clone(),
        );

        info!(topic = %topic, "binding consumer");

        let task_topic = topic.clone();
        let task = tokio::spawn(async move {
            if let Err(e) = consumer.run(handler).await {
                error!(topic = %task_topic, "consumer stopped: {}", e);
            }
        });

        summary.consumers.push(RegisteredConsumer { topic, task });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_store::MemoryStore;
    use crate::types::Participant;
    use async_trait::async_trait;
    use switch_bus::{BusConfig, EventEnvelope};

    struct NullProducer;

    #[async_trait]
    impl Produce for NullProducer {
        async fn send(&self, _topic: &Topic, _envelope: &EventEnvelope) -> switch_bus::Result<()> {
            Ok(())
        }
    }

    fn registrar(store: Arc<MemoryStore>) -> Registrar {
        Registrar::new(
            Arc::new(BusClient::new(BusConfig::default())),
            Arc::new(NullProducer),
            store,
            Config::default(),
        )
    }

    #[tokio::test]
    async fn test_empty_participant_list_is_no_work() {
        let registrar = registrar(Arc::new(MemoryStore::new()));
        let mut summary = RegisterSummary::default();

        let outcome = registrar
            .register_prepare_handlers(None, &mut summary)
            .await
            .unwrap();

        assert_eq!(outcome, RegisterOutcome::NoWork);
        assert!(summary.consumers.is_empty());
    }

    #[tokio::test]
    async fn test_one_prepare_consumer_per_participant() {
        let store = Arc::new(MemoryStore::with_participants(vec![
            Participant::new("dfspA", vec!["USD".to_string()]),
            Participant::new("dfspB", vec!["USD".to_string()]),
        ]));
        let registrar = registrar(store);
        let mut summary = RegisterSummary::default();

        let outcome = registrar
            .register_prepare_handlers(None, &mut summary)
            .await
            .unwrap();

        assert_eq!(outcome, RegisterOutcome::Registered);
        let topics: Vec<_> = summary
            .consumers
            .iter()
            .map(|c| c.topic.as_str().to_string())
            .collect();
        assert_eq!(
            topics,
            vec!["topic-dfspA-transfer-prepare", "topic-dfspB-transfer-prepare"]
        );

        for consumer in summary.consumers {
            consumer.task.abort();
        }
    }

    #[tokio::test]
    async fn test_explicit_list_overrides_store() {
        let registrar = registrar(Arc::new(MemoryStore::new()));
        let mut summary = RegisterSummary::default();

        let outcome = registrar
            .register_prepare_handlers(Some(vec!["dfspZ".to_string()]), &mut summary)
            .await
            .unwrap();

        assert_eq!(outcome, RegisterOutcome::Registered);
        assert_eq!(summary.consumers[0].topic.as_str(), "topic-dfspZ-transfer-prepare");

        for consumer in summary.consumers {
            consumer.task.abort();
        }
    }

    #[tokio::test]
    async fn test_shared_handlers_bind_general_topics() {
        let registrar = registrar(Arc::new(MemoryStore::new()));
        let mut summary = RegisterSummary::default();

        registrar.register_fulfil_handler(&mut summary);
        registrar.register_transfer_handler(&mut summary);

        let topics: Vec<_> = summary
            .consumers
            .iter()
            .map(|c| c.topic.as_str().to_string())
            .collect();
        assert_eq!(topics, vec!["topic-transfer-fulfil", "topic-transfer-transfer"]);

        for consumer in summary.consumers {
            consumer.task.abort();
        }
    }
}
