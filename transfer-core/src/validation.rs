//! Business-rule validation for prepare payloads
//!
//! Validation failures are not fatal: they are collected as
//! human-readable reasons and drive the error pipeline. Only store
//! lookup failures surface as errors.

use crate::store::TransferStore;
use crate::types::PreparePayload;
use crate::Result;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use chrono::Utc;
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::Arc;

/// Maximum decimal places accepted for an amount
const MAX_AMOUNT_SCALE: u32 = 4;

/// Result of business-rule validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationOutcome {
    /// True when no rule failed
    pub passed: bool,

    /// Human-readable reasons; empty implies pass
    pub reasons: Vec<String>,
}

impl ValidationOutcome {
    fn from_reasons(reasons: Vec<String>) -> Self {
        Self {
            passed: reasons.is_empty(),
            reasons,
        }
    }

    /// Reasons joined for logging and error descriptions
    pub fn joined_reasons(&self) -> String {
        self.reasons.join("; ")
    }
}

/// Validator for prepare payloads
pub struct TransferValidator {
    store: Arc<dyn TransferStore>,
}

impl TransferValidator {
    /// Validator backed by the participant directory in the store
    pub fn new(store: Arc<dyn TransferStore>) -> Self {
        Self { store }
    }

    /// Run every schema and business-rule check
    pub async fn validate_prepare(&self, payload: &PreparePayload) -> Result<ValidationOutcome> {
        let mut reasons = Vec::new();

        self.check_participant(&payload.payer_fsp, "Payer", &payload.amount.currency, &mut reasons)
            .await?;
        self.check_participant(&payload.payee_fsp, "Payee", &payload.amount.currency, &mut reasons)
            .await?;

        check_amount(payload, &mut reasons);
        check_expiration(payload, &mut reasons);
        check_condition(payload, &mut reasons);
        check_ilp_packet(payload, &mut reasons);

        Ok(ValidationOutcome::from_reasons(reasons))
    }

    async fn check_participant(
        &self,
        name: &str,
        role: &str,
        currency: &str,
        reasons: &mut Vec<String>,
    ) -> Result<()> {
        match self.store.participant(name).await? {
            None => reasons.push(format!("{} FSP {} does not exist", role, name)),
            Some(participant) => {
                if !participant.is_active {
                    reasons.push(format!("{} FSP {} is not active", role, name));
                } else if !participant.currencies.iter().any(|c| c == currency) {
                    reasons.push(format!(
                        "{} FSP {} does not support currency {}",
                        role, name, currency
                    ));
                }
            }
        }
        Ok(())
    }
}

fn check_amount(payload: &PreparePayload, reasons: &mut Vec<String>) {
    let currency = &payload.amount.currency;
    if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_uppercase()) {
        reasons.push(format!("Currency {} is not a valid ISO 4217 code", currency));
    }

    match Decimal::from_str(&payload.amount.amount) {
        Err(_) => reasons.push(format!("Amount {} is not a valid decimal", payload.amount.amount)),
        Ok(amount) => {
            if amount <= Decimal::ZERO {
                reasons.push(format!("Amount {} must be positive", payload.amount.amount));
            }
            if amount.scale() > MAX_AMOUNT_SCALE {
                reasons.push(format!(
                    "Amount {} exceeds {} decimal places",
                    payload.amount.amount, MAX_AMOUNT_SCALE
                ));
            }
        }
    }
}

fn check_expiration(payload: &PreparePayload, reasons: &mut Vec<String>) {
    if payload.expiration_date <= Utc::now() {
        reasons.push(format!(
            "Expiration date {} is not in the future",
            payload.expiration_date.to_rfc3339()
        ));
    }
}

fn check_condition(payload: &PreparePayload, reasons: &mut Vec<String>) {
    match URL_SAFE_NO_PAD.decode(&payload.condition) {
        Ok(bytes) if bytes.len() == 32 => {}
        Ok(_) => reasons.push("Condition must decode to 32 bytes".to_string()),
        Err(_) => reasons.push("Condition is not valid base64url".to_string()),
    }
}

fn check_ilp_packet(payload: &PreparePayload, reasons: &mut Vec<String>) {
    if payload.ilp_packet.is_empty() {
        reasons.push("ILP packet is empty".to_string());
        return;
    }
    let parses = URL_SAFE_NO_PAD.decode(&payload.ilp_packet).is_ok()
        || STANDARD.decode(&payload.ilp_packet).is_ok();
    if !parses {
        reasons.push("ILP packet does not parse".to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_store::MemoryStore;
    use crate::types::{Money, Participant, TransferId};
    use chrono::Duration;

    fn store() -> Arc<MemoryStore> {
        Arc::new(MemoryStore::with_participants(vec![
            Participant::new("dfspA", vec!["USD".to_string()]),
            Participant::new("dfspB", vec!["USD".to_string()]),
        ]))
    }

    fn valid_payload() -> PreparePayload {
        PreparePayload {
            transfer_id: TransferId::new("t1"),
            payer_fsp: "dfspA".to_string(),
            payee_fsp: "dfspB".to_string(),
            amount: Money {
                currency: "USD".to_string(),
                amount: "100.00".to_string(),
            },
            ilp_packet: "AQA".to_string(),
            condition: URL_SAFE_NO_PAD.encode([1u8; 32]),
            expiration_date: Utc::now() + Duration::hours(1),
            extension_list: None,
        }
    }

    #[tokio::test]
    async fn test_valid_payload_passes() {
        let validator = TransferValidator::new(store());
        let outcome = validator.validate_prepare(&valid_payload()).await.unwrap();
        assert!(outcome.passed, "unexpected reasons: {:?}", outcome.reasons);
    }

    #[tokio::test]
    async fn test_unknown_payer_fails() {
        let validator = TransferValidator::new(store());
        let mut payload = valid_payload();
        payload.payer_fsp = "ghost".to_string();

        let outcome = validator.validate_prepare(&payload).await.unwrap();
        assert!(!outcome.passed);
        assert!(outcome.reasons[0].contains("does not exist"));
    }

    #[tokio::test]
    async fn test_inactive_participant_fails() {
        let store = store();
        store.add_participant(Participant {
            name: "dfspC".to_string(),
            is_active: false,
            currencies: vec!["USD".to_string()],
        });
        let validator = TransferValidator::new(store);

        let mut payload = valid_payload();
        payload.payee_fsp = "dfspC".to_string();

        let outcome = validator.validate_prepare(&payload).await.unwrap();
        assert!(!outcome.passed);
        assert!(outcome.joined_reasons().contains("not active"));
    }

    #[tokio::test]
    async fn test_unsupported_currency_fails() {
        let validator = TransferValidator::new(store());
        let mut payload = valid_payload();
        payload.amount.currency = "EUR".to_string();

        let outcome = validator.validate_prepare(&payload).await.unwrap();
        assert!(!outcome.passed);
        assert!(outcome.joined_reasons().contains("does not support currency"));
    }

    #[tokio::test]
    async fn test_amount_rules() {
        let validator = TransferValidator::new(store());

        let mut payload = valid_payload();
        payload.amount.amount = "not-a-number".to_string();
        assert!(!validator.validate_prepare(&payload).await.unwrap().passed);

        let mut payload = valid_payload();
        payload.amount.amount = "-5.00".to_string();
        assert!(!validator.validate_prepare(&payload).await.unwrap().passed);

        let mut payload = valid_payload();
        payload.amount.amount = "1.00001".to_string();
        assert!(!validator.validate_prepare(&payload).await.unwrap().passed);
    }

    #[tokio::test]
    async fn test_past_expiration_fails() {
        let validator = TransferValidator::new(store());
        let mut payload = valid_payload();
        payload.expiration_date = Utc::now() - Duration::seconds(1);

        let outcome = validator.validate_prepare(&payload).await.unwrap();
        assert!(!outcome.passed);
        assert!(outcome.joined_reasons().contains("not in the future"));
    }

    #[tokio::test]
    async fn test_malformed_condition_fails() {
        let validator = TransferValidator::new(store());

        let mut payload = valid_payload();
        payload.condition = "###".to_string();
        assert!(!validator.validate_prepare(&payload).await.unwrap().passed);

        let mut payload = valid_payload();
        payload.condition = URL_SAFE_NO_PAD.encode([1u8; 16]);
        assert!(!validator.validate_prepare(&payload).await.unwrap().passed);
    }

    #[tokio::test]
    async fn test_failure_reasons_accumulate() {
        let validator = TransferValidator::new(store());
        let mut payload = valid_payload();
        payload.payer_fsp = "ghost".to_string();
        payload.amount.amount = "0".to_string();
        payload.ilp_packet = String::new();

        let outcome = validator.validate_prepare(&payload).await.unwrap();
        assert!(outcome.reasons.len() >= 3);
    }
}
