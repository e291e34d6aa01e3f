//! Error types for the orchestration core

use thiserror::Error;

/// Result type for core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core errors
///
/// Protocol-level failures (validation, duplicate mismatch, expiry) are
/// never surfaced through this type; they are handled inside the
/// pipelines and reported as notification events. An `Err` from a
/// pipeline means the delivery must not be committed.
#[derive(Debug, Error)]
pub enum Error {
    /// Transactional store failure
    #[error("Store error: {0}")]
    Store(String),

    /// Bus gateway failure (produce, commit, subscribe)
    #[error("Bus error: {0}")]
    Bus(#[from] switch_bus::Error),

    /// Envelope shape violated the contract
    #[error("Invalid envelope: {0}")]
    InvalidEnvelope(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Fatal dispatch error raised when the bus hands us an error instead
    /// of a message
    #[error("Fatal consumer error: {0}")]
    Fatal(String),
}
