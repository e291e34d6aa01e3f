//! Store gateway
//!
//! The transactional store is an external collaborator; this module
//! defines the contract the coordinators program against. Every
//! operation is transactional from the caller's perspective: partial
//! failures surface as a single [`Error::Store`](crate::Error::Store).

use crate::codes::ErrorInformation;
use crate::types::{
    Participant, PreparePayload, Transfer, TransferErrorRecord, TransferId, TransferState,
};
use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Outcome of the atomic insert-if-absent duplicate check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DuplicateCheck {
    /// Same transfer id, same fingerprint seen before
    pub exists_matching: bool,

    /// Same transfer id, different fingerprint seen before
    pub exists_not_matching: bool,
}

impl DuplicateCheck {
    /// Neither flag set: first time this transfer id is seen
    pub fn is_new(&self) -> bool {
        !self.exists_matching && !self.exists_not_matching
    }
}

/// Commit-side record written by the fulfil pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct FulfilRecord {
    /// 32-byte fulfilment preimage, base64url-encoded
    pub fulfilment: String,

    /// Completion instant
    pub completed_timestamp: DateTime<Utc>,
}

/// Contract the external transfer store must offer
#[async_trait]
pub trait TransferStore: Send + Sync {
    /// Atomic insert-if-absent of `(transfer_id, fingerprint)`
    ///
    /// Both flags false means the pair was inserted (new transfer).
    async fn validate_duplicate_hash(
        &self,
        transfer_id: &TransferId,
        fingerprint_hex: &str,
    ) -> Result<DuplicateCheck>;

    /// Latest recorded state, if any
    async fn transfer_state(&self, transfer_id: &TransferId) -> Result<Option<TransferState>>;

    /// Full transfer record, if any
    async fn transfer_by_id(&self, transfer_id: &TransferId) -> Result<Option<Transfer>>;

    /// Persist a prepare
    ///
    /// Prepares that failed validation are stored too (`valid = false`,
    /// with the reason); the audit trail requires every accepted prepare.
    async fn save_prepare(
        &self,
        payload: &PreparePayload,
        reason: Option<String>,
        valid: bool,
    ) -> Result<()>;

    /// Transition RESERVED → COMMITTED atomically, recording the fulfilment
    async fn commit_fulfil(&self, transfer_id: &TransferId, record: FulfilRecord)
        -> Result<Transfer>;

    /// Transition RESERVED → ABORTED atomically
    async fn abort_reject(
        &self,
        transfer_id: &TransferId,
        error: ErrorInformation,
    ) -> Result<Transfer>;

    /// Append to the transfer error log
    async fn log_transfer_error(
        &self,
        transfer_id: &TransferId,
        error_code: u32,
        description: &str,
    ) -> Result<()>;

    /// All registered participants
    async fn participants(&self) -> Result<Vec<Participant>>;

    /// One participant by name
    async fn participant(&self, name: &str) -> Result<Option<Participant>>;

    /// Error log entries for a transfer (audit surface)
    async fn transfer_errors(&self, transfer_id: &TransferId) -> Result<Vec<TransferErrorRecord>>;
}
