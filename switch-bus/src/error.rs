//! Error types for the bus gateway

use thiserror::Error;

/// Result type for bus operations
pub type Result<T> = std::result::Result<T, Error>;

/// Bus gateway errors
#[derive(Debug, Error)]
pub enum Error {
    /// Connection to the bus failed or is not established
    #[error("Bus connection error: {0}")]
    Connection(String),

    /// JetStream context or stream management error
    #[error("JetStream error: {0}")]
    JetStream(String),

    /// Produce failed after exhausting retries
    #[error("Produce error: {0}")]
    Produce(String),

    /// Subscription or consumer creation failed
    #[error("Consume error: {0}")]
    Consume(String),

    /// Offset commit (explicit ack) failed
    #[error("Commit error: {0}")]
    Commit(String),

    /// Envelope could not be serialized or deserialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
