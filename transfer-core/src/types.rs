//! Domain types for the transfer lifecycle
//!
//! All wire-facing types keep the bus JSON field names (camelCase) and
//! round-trip without loss. Amounts stay strings on the wire; they are
//! validated against `rust_decimal` but never re-formatted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque transfer identifier (typically a UUID, never interpreted)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransferId(String);

impl TransferId {
    /// Create a new transfer id
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for TransferId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for TransferId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Currency code plus decimal value, wire-faithful
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    /// ISO 4217 currency code
    pub currency: String,

    /// Decimal value as sent (string; validated, never re-formatted)
    pub amount: String,
}

/// One `{key, value}` extension pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extension {
    /// Extension key
    pub key: String,
    /// Extension value
    pub value: String,
}

/// Transfer lifecycle state
///
/// Legal transitions: ∅ → RECEIVED → RESERVED → {COMMITTED, ABORTED};
/// RESERVED → ABORTED on timeout. RECEIVED → RESERVED is internal to the
/// prepare pipeline and both count as in-flight for replay classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransferState {
    /// Prepare accepted, positions not yet reserved
    Received,
    /// Payer position reserved
    Reserved,
    /// Fulfilment accepted (terminal)
    Committed,
    /// Rejected, expired, or failed validation (terminal)
    Aborted,
}

impl TransferState {
    /// Wire enumeration string
    pub fn enumeration(&self) -> &'static str {
        match self {
            TransferState::Received => "RECEIVED",
            TransferState::Reserved => "RESERVED",
            TransferState::Committed => "COMMITTED",
            TransferState::Aborted => "ABORTED",
        }
    }

    /// Terminal states never transition again
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransferState::Committed | TransferState::Aborted)
    }

    /// In-flight states for duplicate classification
    pub fn is_in_flight(&self) -> bool {
        matches!(self, TransferState::Received | TransferState::Reserved)
    }

    /// Whether `next` is a legal successor of `self`
    pub fn can_transition_to(&self, next: TransferState) -> bool {
        matches!(
            (self, next),
            (TransferState::Received, TransferState::Reserved)
                | (TransferState::Received, TransferState::Aborted)
                | (TransferState::Reserved, TransferState::Committed)
                | (TransferState::Reserved, TransferState::Aborted)
        )
    }
}

impl fmt::Display for TransferState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.enumeration())
    }
}

/// Prepare-phase payload as carried on the bus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreparePayload {
    /// Transfer identifier
    pub transfer_id: TransferId,

    /// Paying participant
    pub payer_fsp: String,

    /// Receiving participant
    pub payee_fsp: String,

    /// Transfer amount
    pub amount: Money,

    /// Opaque interledger packet (base64)
    pub ilp_packet: String,

    /// 32-byte condition, base64url-encoded
    pub condition: String,

    /// Absolute expiry instant, UTC
    pub expiration_date: DateTime<Utc>,

    /// Ordered extension pairs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extension_list: Option<Vec<Extension>>,
}

/// Fulfil-phase payload as carried on the bus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FulfilPayload {
    /// 32-byte fulfilment preimage, base64url-encoded
    pub fulfilment: String,

    /// Completion instant claimed by the sender
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_timestamp: Option<DateTime<Utc>>,
}

/// Stored transfer record
///
/// Serialized form doubles as the transfer snapshot sent with
/// `prepare-duplicate` notifications.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transfer {
    /// Transfer identifier
    pub transfer_id: TransferId,

    /// Paying participant
    pub payer_fsp: String,

    /// Receiving participant
    pub payee_fsp: String,

    /// Transfer amount
    pub amount: Money,

    /// Opaque interledger packet
    pub ilp_packet: String,

    /// 32-byte condition, base64url-encoded
    pub condition: String,

    /// Absolute expiry instant
    pub expiration_date: DateTime<Utc>,

    /// Extension pairs from the prepare
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extension_list: Option<Vec<Extension>>,

    /// Current lifecycle state
    pub transfer_state: TransferState,

    /// Fulfilment preimage, present only after commit
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fulfilment: Option<String>,

    /// Completion instant, present only after commit
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_timestamp: Option<DateTime<Utc>>,

    /// False when the prepare failed validation (kept for audit)
    pub valid: bool,

    /// Why validation failed, when it did
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_reason: Option<String>,

    /// When the prepare was accepted
    pub created_at: DateTime<Utc>,
}

/// Append-only transfer error record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferErrorRecord {
    /// Transfer the error belongs to
    pub transfer_id: TransferId,

    /// Wire error code
    pub error_code: u32,

    /// Human-readable description
    pub error_description: String,

    /// When the error was recorded
    pub created_at: DateTime<Utc>,
}

/// Switch participant (FSP)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    /// Participant name, as used in topic names
    pub name: String,

    /// Inactive participants fail prepare validation
    pub is_active: bool,

    /// Currencies the participant transacts in
    pub currencies: Vec<String>,
}

impl Participant {
    /// Active participant supporting the given currencies
    pub fn new(name: impl Into<String>, currencies: Vec<String>) -> Self {
        Self {
            name: name.into(),
            is_active: true,
            currencies,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_state_enumeration_strings() {
        assert_eq!(TransferState::Received.enumeration(), "RECEIVED");
        assert_eq!(TransferState::Reserved.enumeration(), "RESERVED");
        assert_eq!(TransferState::Committed.enumeration(), "COMMITTED");
        assert_eq!(TransferState::Aborted.enumeration(), "ABORTED");
    }

    #[test]
    fn test_state_transitions() {
        assert!(TransferState::Received.can_transition_to(TransferState::Reserved));
        assert!(TransferState::Reserved.can_transition_to(TransferState::Committed));
        assert!(TransferState::Reserved.can_transition_to(TransferState::Aborted));

        assert!(!TransferState::Committed.can_transition_to(TransferState::Aborted));
        assert!(!TransferState::Aborted.can_transition_to(TransferState::Reserved));
        assert!(!TransferState::Received.can_transition_to(TransferState::Committed));
    }

    #[test]
    fn test_terminal_and_in_flight() {
        assert!(TransferState::Committed.is_terminal());
        assert!(TransferState::Aborted.is_terminal());
        assert!(TransferState::Received.is_in_flight());
        assert!(TransferState::Reserved.is_in_flight());
    }

    #[test]
    fn test_prepare_payload_wire_names() {
        let raw = json!({
            "transferId": "t1",
            "payerFsp": "dfspA",
            "payeeFsp": "dfspB",
            "amount": {"currency": "USD", "amount": "100.00"},
            "ilpPacket": "AQA",
            "condition": "Y29uZGl0aW9u",
            "expirationDate": "2099-01-01T00:00:00Z",
            "extensionList": [{"key": "k", "value": "v"}]
        });

        let payload: PreparePayload = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(payload.transfer_id.as_str(), "t1");
        assert_eq!(payload.amount.amount, "100.00");
        assert_eq!(payload.extension_list.as_ref().unwrap().len(), 1);

        let back = serde_json::to_value(&payload).unwrap();
        assert_eq!(back["payerFsp"], "dfspA");
        assert_eq!(back["expirationDate"], "2099-01-01T00:00:00Z");
    }

    #[test]
    fn test_state_wire_serialization() {
        assert_eq!(
            serde_json::to_value(TransferState::Reserved).unwrap(),
            json!("RESERVED")
        );
        let state: TransferState = serde_json::from_value(json!("COMMITTED")).unwrap();
        assert_eq!(state, TransferState::Committed);
    }
}
