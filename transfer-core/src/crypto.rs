//! Payload fingerprinting and fulfilment verification
//!
//! Both operations are pure CPU, deterministic across processes and
//! versions, and perform no I/O.

use crate::types::PreparePayload;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::SecondsFormat;
use sha2::{Digest, Sha256};

/// Delimiter between canonicalized fields
///
/// Prevents `("ab", "c")` and `("a", "bc")` from hashing alike.
const FIELD_DELIMITER: u8 = 0x1f;

/// Compute the duplicate-detection fingerprint of a prepare payload
///
/// SHA-256 over the canonical field sequence: transferId, payerFsp,
/// payeeFsp, currency, amount, ilpPacket, condition, expirationDate
/// (RFC 3339 millisecond precision), delimiter-joined. Used solely for
/// duplicate detection and never exposed on the wire.
pub fn fingerprint(payload: &PreparePayload) -> [u8; 32] {
    let expiration = payload
        .expiration_date
        .to_rfc3339_opts(SecondsFormat::Millis, true);

    let fields: [&str; 8] = [
        payload.transfer_id.as_str(),
        &payload.payer_fsp,
        &payload.payee_fsp,
        &payload.amount.currency,
        &payload.amount.amount,
        &payload.ilp_packet,
        &payload.condition,
        &expiration,
    ];

    let mut hasher = Sha256::new();
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            hasher.update([FIELD_DELIMITER]);
        }
        hasher.update(field.as_bytes());
    }
    hasher.finalize().into()
}

/// Hex form of the fingerprint, used as the store key
pub fn fingerprint_hex(payload: &PreparePayload) -> String {
    fingerprint(payload)
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

/// Verify that a fulfilment is the preimage of a condition
///
/// True iff SHA-256(base64url-decode(fulfilment)) equals
/// base64url-decode(condition). Both values must decode to exactly 32
/// bytes. The digest comparison is constant-time. Decode errors yield
/// false; this function never fails.
pub fn verify_fulfilment(fulfilment: &str, condition: &str) -> bool {
    let preimage = match URL_SAFE_NO_PAD.decode(fulfilment) {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };
    let condition = match URL_SAFE_NO_PAD.decode(condition) {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };

    if preimage.len() != 32 || condition.len() != 32 {
        return false;
    }

    let digest = Sha256::digest(&preimage);
    constant_time_eq(digest.as_slice(), &condition)
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}
