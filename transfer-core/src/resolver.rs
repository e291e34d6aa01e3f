//! Duplicate resolver
//!
//! Single authority for the "what does a replay mean" decision. The
//! coordinators act on the returned classification and never re-inspect
//! the underlying duplicate flags.

use crate::crypto;
use crate::store::TransferStore;
use crate::types::{PreparePayload, Transfer};
use crate::Result;
use tracing::warn;

/// Classification of an incoming prepare payload against the store
#[derive(Debug, Clone, PartialEq)]
pub enum DuplicateResolution {
    /// First sighting; proceed to validation
    New,

    /// Matching replay of a transfer still in flight; drop silently
    InFlight,

    /// Matching replay of a finalized transfer; answer with its snapshot
    FinalizedReplay(Box<Transfer>),

    /// Duplicate hash exists but no resolvable transfer state
    Anomaly,

    /// Same transfer id with a different fingerprint
    Modified,
}

/// Classify a prepare payload
///
/// Performs the atomic insert-if-absent of `(transferId, fingerprint)`
/// and maps the result plus the recorded transfer state onto a
/// resolution.
pub async fn resolve(
    store: &dyn TransferStore,
    payload: &PreparePayload,
) -> Result<DuplicateResolution> {
    let fingerprint = crypto::fingerprint_hex(payload);
    let check = store
        .validate_duplicate_hash(&payload.transfer_id, &fingerprint)
        .await?;

    if check.exists_not_matching {
        return Ok(DuplicateResolution::Modified);
    }
    if check.is_new() {
        return Ok(DuplicateResolution::New);
    }

    // Matching duplicate: the meaning depends on where the transfer got to.
    match store.transfer_state(&payload.transfer_id).await? {
        None => {
            warn!(
                transfer_id = %payload.transfer_id,
                "duplicate hash exists but transfer state is unresolvable"
            );
            Ok(DuplicateResolution::Anomaly)
        }
        Some(state) if state.is_terminal() => {
            match store.transfer_by_id(&payload.transfer_id).await? {
                Some(transfer) => Ok(DuplicateResolution::FinalizedReplay(Box::new(transfer))),
                None => {
                    warn!(
                        transfer_id = %payload.transfer_id,
                        "finalized transfer disappeared between state read and fetch"
                    );
                    Ok(DuplicateResolution::Anomaly)
                }
            }
        }
        Some(_) => Ok(DuplicateResolution::InFlight),
    }
}
