//! Event-bus gateway for the transfer switch
//!
//! Provides the bus-facing half of the orchestration core:
//! - Deterministic topic naming per participant and action
//! - The `EventEnvelope` wire type shared by every topic
//! - JetStream-backed producer with retry and at-least-once delivery
//! - Consumer worker loop with manual-commit (explicit ack) discipline
//! - Observability via Prometheus metrics

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod client;
pub mod consumer;
pub mod envelope;
pub mod error;
pub mod metrics;
pub mod producer;
pub mod topics;

pub use client::{BusClient, BusConfig, StreamSettings};
pub use consumer::{
    BusConsumer, CommitPoint, ConsumerConfig, Delivery, EnvelopeHandler, HandlerError,
};
pub use envelope::{
    EventAction, EventEnvelope, EventMetadata, EventState, EventStatus, EventType, MessageContent,
};
pub use error::{Error, Result};
pub use producer::{BusProducer, Produce, ProducerConfig};
pub use topics::{Functionality, Topic, TopicAction};
