//! In-memory bus doubles shared by the scenario tests

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use switch_bus::{
    CommitPoint, Delivery, EventAction, EventEnvelope, EventState, EventType, Produce, Topic,
};

/// Producer that records every send and can fail the next one on demand
#[derive(Default)]
pub struct RecordingProducer {
    sent: Mutex<Vec<(Topic, EventEnvelope)>>,
    fail_next: AtomicBool,
}

impl RecordingProducer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make the next send fail with a produce error
    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    /// Envelopes sent to the given topic
    pub fn sent_to(&self, topic: &str) -> Vec<EventEnvelope> {
        self.sent
            .lock()
            .iter()
            .filter(|(t, _)| t.as_str() == topic)
            .map(|(_, e)| e.clone())
            .collect()
    }

    /// Total envelopes sent across all topics
    pub fn total_sent(&self) -> usize {
        self.sent.lock().len()
    }
}

#[async_trait]
impl Produce for RecordingProducer {
    async fn send(&self, topic: &Topic, envelope: &EventEnvelope) -> switch_bus::Result<()> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(switch_bus::Error::Produce("injected failure".to_string()));
        }
        self.sent.lock().push((topic.clone(), envelope.clone()));
        Ok(())
    }
}

/// Commit point that counts commits
pub struct RecordingCommit {
    auto: bool,
    commits: AtomicUsize,
}

impl RecordingCommit {
    pub fn manual() -> Arc<Self> {
        Arc::new(Self {
            auto: false,
            commits: AtomicUsize::new(0),
        })
    }

    pub fn commit_count(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CommitPoint for RecordingCommit {
    fn auto_commit(&self) -> bool {
        self.auto
    }

    async fn commit(&self) -> switch_bus::Result<()> {
        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Delivery over a recording commit point
pub fn delivery(topic: Topic, envelope: EventEnvelope) -> (Delivery, Arc<RecordingCommit>) {
    let commit = RecordingCommit::manual();
    (Delivery::new(topic, envelope, commit.clone()), commit)
}

/// A condition/fulfilment pair that verifies
pub fn condition_pair() -> (String, String) {
    let preimage = [42u8; 32];
    let digest = Sha256::digest(preimage);
    (
        URL_SAFE_NO_PAD.encode(digest),
        URL_SAFE_NO_PAD.encode(preimage),
    )
}

/// The S1 prepare envelope: t1, dfspA → dfspB, 100.00 USD
pub fn prepare_envelope(condition: &str, expiration: DateTime<Utc>) -> EventEnvelope {
    EventEnvelope::new(
        "t1",
        "dfspA",
        "dfspB",
        EventType::Transfer,
        EventAction::Prepare,
        EventState::success(),
        serde_json::json!({
            "transferId": "t1",
            "payerFsp": "dfspA",
            "payeeFsp": "dfspB",
            "amount": {"currency": "USD", "amount": "100.00"},
            "ilpPacket": "AQA",
            "condition": condition,
            "expirationDate": expiration.to_rfc3339(),
            "extensionList": []
        }),
    )
}

/// A fulfil envelope for t1 with the given action
pub fn fulfil_envelope(fulfilment: &str, action: EventAction) -> EventEnvelope {
    EventEnvelope::new(
        "t1",
        "dfspB",
        "central-switch",
        EventType::Fulfil,
        action,
        EventState::success(),
        serde_json::json!({
            "fulfilment": fulfilment,
            "completedTimestamp": Utc::now().to_rfc3339(),
        }),
    )
}

/// Topic constants used across scenarios
pub const PREPARE_TOPIC: &str = "topic-dfspA-transfer-prepare";
pub const FULFIL_TOPIC: &str = "topic-transfer-fulfil";
pub const TRANSFER_TOPIC: &str = "topic-transfer-transfer";
pub const NOTIFICATION_TOPIC: &str = "topic-transfer-notification";
pub const PAYER_POSITION_PREPARE: &str = "topic-dfspA-position-prepare";
pub const PAYER_POSITION_REJECT: &str = "topic-dfspA-position-reject";
pub const PAYEE_POSITION_COMMIT: &str = "topic-dfspB-position-commit";
