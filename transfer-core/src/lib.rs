//! Transfer orchestration core
//!
//! Drives two-phase (prepare → fulfil) transfers between switch
//! participants off a partitioned event bus:
//!
//! - **Deterministic lifecycle**: RECEIVED → RESERVED → {COMMITTED,
//!   ABORTED}, serialized through the transactional store
//! - **Idempotent replay handling**: duplicate detection keyed by a
//!   payload fingerprint; replays of finalized transfers answer with the
//!   stored snapshot
//! - **Cryptographic fulfilment validation**: SHA-256 preimage check in
//!   constant time before any state transition
//! - **Commit-then-produce**: offsets are committed before downstream
//!   events are produced, so redelivery can duplicate events downstream
//!   but never re-runs a store effect

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod codes;
pub mod config;
pub mod crypto;
pub mod error;
pub mod handlers;
pub mod memory_store;
pub mod registrar;
pub mod resolver;
pub mod store;
pub mod types;
pub mod validation;

pub use codes::{ErrorInformation, INTERNAL_ERROR, MODIFIED_REQUEST, TRANSFER_EXPIRED, VALIDATION_ERROR};
pub use config::Config;
pub use error::{Error, Result};
pub use handlers::{FulfilCoordinator, PrepareCoordinator, TransferEventRouter};
pub use memory_store::MemoryStore;
pub use registrar::{RegisterOutcome, RegisterSummary, Registrar};
pub use resolver::DuplicateResolution;
pub use store::{DuplicateCheck, FulfilRecord, TransferStore};
pub use types::{
    Extension, FulfilPayload, Money, Participant, PreparePayload, Transfer, TransferErrorRecord,
    TransferId, TransferState,
};
pub use validation::{TransferValidator, ValidationOutcome};
