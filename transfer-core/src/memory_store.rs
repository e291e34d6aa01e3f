//! In-memory transfer store
//!
//! Backs local development and the test suites. Semantics match the
//! external store contract: insert-if-absent duplicate hashes, atomic
//! state transitions with RESERVED preconditions, append-only error log.

use crate::codes::ErrorInformation;
use crate::store::{DuplicateCheck, FulfilRecord, TransferStore};
use crate::types::{
    Participant, PreparePayload, Transfer, TransferErrorRecord, TransferId, TransferState,
};
use crate::{Error, Result};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::HashMap;

#[derive(Default)]
struct Inner {
    hashes: HashMap<TransferId, String>,
    transfers: HashMap<TransferId, Transfer>,
    errors: Vec<TransferErrorRecord>,
    participants: Vec<Participant>,
}

/// In-memory store; thread-safe, no I/O
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with participants
    pub fn with_participants(participants: Vec<Participant>) -> Self {
        Self {
            inner: RwLock::new(Inner {
                participants,
                ..Inner::default()
            }),
        }
    }

    /// Register a participant
    pub fn add_participant(&self, participant: Participant) {
        self.inner.write().participants.push(participant);
    }

    /// Force a transfer into a state (test seeding)
    pub fn set_transfer_state(&self, transfer_id: &TransferId, state: TransferState) {
        if let Some(transfer) = self.inner.write().transfers.get_mut(transfer_id) {
            transfer.transfer_state = state;
        }
    }

    /// Number of stored transfer rows
    pub fn transfer_count(&self) -> usize {
        self.inner.read().transfers.len()
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("MemoryStore")
            .field("transfers", &inner.transfers.len())
            .field("participants", &inner.participants.len())
            .finish()
    }
}

#[async_trait]
impl TransferStore for MemoryStore {
    async fn validate_duplicate_hash(
        &self,
        transfer_id: &TransferId,
        fingerprint_hex: &str,
    ) -> Result<DuplicateCheck> {
        let mut inner = self.inner.write();

        match inner.hashes.get(transfer_id) {
            None => {
                inner
                    .hashes
                    .insert(transfer_id.clone(), fingerprint_hex.to_string());
                Ok(DuplicateCheck {
                    exists_matching: false,
                    exists_not_matching: false,
                })
            }
            Some(existing) if existing == fingerprint_hex => Ok(DuplicateCheck {
                exists_matching: true,
                exists_not_matching: false,
            }),
            Some(_) => Ok(DuplicateCheck {
                exists_matching: false,
                exists_not_matching: true,
            }),
        }
    }

    async fn transfer_state(&self, transfer_id: &TransferId) -> Result<Option<TransferState>> {
        Ok(self
            .inner
            .read()
            .transfers
            .get(transfer_id)
            .map(|t| t.transfer_state))
    }

    async fn transfer_by_id(&self, transfer_id: &TransferId) -> Result<Option<Transfer>> {
        Ok(self.inner.read().transfers.get(transfer_id).cloned())
    }

    async fn save_prepare(
        &self,
        payload: &PreparePayload,
        reason: Option<String>,
        valid: bool,
    ) -> Result<()> {
        let transfer = Transfer {
            transfer_id: payload.transfer_id.clone(),
            payer_fsp: payload.payer_fsp.clone(),
            payee_fsp: payload.payee_fsp.clone(),
            amount: payload.amount.clone(),
            ilp_packet: payload.ilp_packet.clone(),
            condition: payload.condition.clone(),
            expiration_date: payload.expiration_date,
            extension_list: payload.extension_list.clone(),
            transfer_state: if valid {
                TransferState::Reserved
            } else {
                TransferState::Aborted
            },
            fulfilment: None,
            completed_timestamp: None,
            valid,
            error_reason: reason,
            created_at: Utc::now(),
        };

        self.inner
            .write()
            .transfers
            .insert(payload.transfer_id.clone(), transfer);
        Ok(())
    }

    async fn commit_fulfil(
        &self,
        transfer_id: &TransferId,
        record: FulfilRecord,
    ) -> Result<Transfer> {
        let mut inner = self.inner.write();
        let transfer = inner
            .transfers
            .get_mut(transfer_id)
            .ok_or_else(|| Error::Store(format!("transfer {} not found", transfer_id)))?;

        if transfer.transfer_state != TransferState::Reserved {
            return Err(Error::Store(format!(
                "transfer {} is {}, expected RESERVED",
                transfer_id, transfer.transfer_state
            )));
        }

        transfer.transfer_state = TransferState::Committed;
        transfer.fulfilment = Some(record.fulfilment);
        transfer.completed_timestamp = Some(record.completed_timestamp);
        Ok(transfer.clone())
    }

    async fn abort_reject(
        &self,
        transfer_id: &TransferId,
        error: ErrorInformation,
    ) -> Result<Transfer> {
        let mut inner = self.inner.write();
        let transfer = inner
            .transfers
            .get_mut(transfer_id)
            .ok_or_else(|| Error::Store(format!("transfer {} not found", transfer_id)))?;

        if transfer.transfer_state != TransferState::Reserved {
            return Err(Error::Store(format!(
                "transfer {} is {}, expected RESERVED",
                transfer_id, transfer.transfer_state
            )));
        }

        transfer.transfer_state = TransferState::Aborted;
        transfer.error_reason = Some(error.error_description);
        Ok(transfer.clone())
    }

    async fn log_transfer_error(
        &self,
        transfer_id: &TransferId,
        error_code: u32,
        description: &str,
    ) -> Result<()> {
        self.inner.write().errors.push(TransferErrorRecord {
            transfer_id: transfer_id.clone(),
            error_code,
            error_description: description.to_string(),
            created_at: Utc::now(),
        });
        Ok(())
    }

    async fn participants(&self) -> Result<Vec<Participant>> {
        Ok(self.inner.read().participants.clone())
    }

    async fn participant(&self, name: &str) -> Result<Option<Participant>> {
        Ok(self
            .inner
            .read()
            .participants
            .iter()
            .find(|p| p.name == name)
            .cloned())
    }

    async fn transfer_errors(&self, transfer_id: &TransferId) -> Result<Vec<TransferErrorRecord>> {
        Ok(self
            .inner
            .read()
            .errors
            .iter()
            .filter(|e| &e.transfer_id == transfer_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Money;
    use chrono::{Duration, Utc};

    fn payload(id: &str) -> PreparePayload {
        PreparePayload {
            transfer_id: TransferId::new(id),
            payer_fsp: "dfspA".to_string(),
            payee_fsp: "dfspB".to_string(),
            amount: Money {
                currency: "USD".to_string(),
                amount: "100.00".to_string(),
            },
            ilp_packet: "AQA".to_string(),
            condition: "Y29uZA".to_string(),
            expiration_date: Utc::now() + Duration::hours(1),
            extension_list: None,
        }
    }

    #[tokio::test]
    async fn test_duplicate_hash_insert_if_absent() {
        let store = MemoryStore::new();
        let id = TransferId::new("t1");

        let first = store.validate_duplicate_hash(&id, "aa").await.unwrap();
        assert!(first.is_new());

        let replay = store.validate_duplicate_hash(&id, "aa").await.unwrap();
        assert!(replay.exists_matching);
        assert!(!replay.exists_not_matching);

        let modified = store.validate_duplicate_hash(&id, "bb").await.unwrap();
        assert!(!modified.exists_matching);
        assert!(modified.exists_not_matching);
    }

    #[tokio::test]
    async fn test_save_prepare_valid_lands_reserved() {
        let store = MemoryStore::new();
        store.save_prepare(&payload("t1"), None, true).await.unwrap();

        let state = store.transfer_state(&TransferId::new("t1")).await.unwrap();
        assert_eq!(state, Some(TransferState::Reserved));
    }

    #[tokio::test]
    async fn test_save_prepare_invalid_kept_for_audit() {
        let store = MemoryStore::new();
        store
            .save_prepare(&payload("t2"), Some("payer not active".to_string()), false)
            .await
            .unwrap();

        let transfer = store
            .transfer_by_id(&TransferId::new("t2"))
            .await
            .unwrap()
            .unwrap();
        assert!(!transfer.valid);
        assert_eq!(transfer.transfer_state, TransferState::Aborted);
        assert_eq!(transfer.error_reason.as_deref(), Some("payer not active"));
    }

    #[tokio::test]
    async fn test_commit_fulfil_requires_reserved() {
        let store = MemoryStore::new();
        store.save_prepare(&payload("t3"), None, true).await.unwrap();
        let id = TransferId::new("t3");

        let record = FulfilRecord {
            fulfilment: "ZnVsZmlsbWVudA".to_string(),
            completed_timestamp: Utc::now(),
        };
        let committed = store.commit_fulfil(&id, record.clone()).await.unwrap();
        assert_eq!(committed.transfer_state, TransferState::Committed);

        // Second commit must fail the state precondition.
        assert!(store.commit_fulfil(&id, record).await.is_err());
    }

    #[tokio::test]
    async fn test_abort_reject_transitions_to_aborted() {
        let store = MemoryStore::new();
        store.save_prepare(&payload("t4"), None, true).await.unwrap();
        let id = TransferId::new("t4");

        let aborted = store
            .abort_reject(&id, crate::codes::VALIDATION_ERROR.information())
            .await
            .unwrap();
        assert_eq!(aborted.transfer_state, TransferState::Aborted);
    }

    #[tokio::test]
    async fn test_error_log_is_append_only() {
        let store = MemoryStore::new();
        let id = TransferId::new("t5");
        store.log_transfer_error(&id, 3100, "first").await.unwrap();
        store.log_transfer_error(&id, 3303, "second").await.unwrap();

        let errors = store.transfer_errors(&id).await.unwrap();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].error_code, 3100);
        assert_eq!(errors[1].error_code, 3303);
    }
}
