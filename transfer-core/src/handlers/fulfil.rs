//! Fulfil coordinator
//!
//! Consumes the shared FULFIL topic and drives commit/reject against the
//! stored transfer. Checks run in a fixed order: fulfilment cryptography
//! before state before expiry, so a forged fulfilment against an expired
//! transfer still reports "modified request" rather than leaking its
//! state.

use crate::codes::{ErrorInformation, INTERNAL_ERROR, MODIFIED_REQUEST, TRANSFER_EXPIRED};
use crate::crypto;
use crate::handlers::{
    dispatch, failure_notification, forwarded_event, request_extension_list, Emit,
    PipelineOutcome,
};
use crate::store::{FulfilRecord, TransferStore};
use crate::types::{FulfilPayload, TransferId, TransferState};
use crate::Result;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use switch_bus::{
    Delivery, EnvelopeHandler, EventAction, EventState, EventType, Functionality, HandlerError,
    Produce, TopicAction,
};
use tracing::{error, warn};

/// Coordinator for the fulfil phase
pub struct FulfilCoordinator {
    store: Arc<dyn TransferStore>,
    producer: Arc<dyn Produce>,
}

impl FulfilCoordinator {
    /// Build a coordinator sharing the process-wide store and producer
    pub fn new(store: Arc<dyn TransferStore>, producer: Arc<dyn Produce>) -> Self {
        Self { store, producer }
    }

    async fn execute(&self, delivery: &Delivery) -> Result<PipelineOutcome> {
        let envelope = delivery.envelope();
        let extension_list = request_extension_list(envelope);
        let meta = &envelope.metadata.event;

        let action = meta.action;
        let accepted = meta.event_type == EventType::Fulfil
            && matches!(action, EventAction::Commit | EventAction::Reject);
        if !accepted {
            warn!(
                envelope_id = %envelope.id,
                event_type = ?meta.event_type,
                action = %action,
                "unexpected type/action combination on fulfil topic"
            );
            return Ok(self.internal_failure(delivery, extension_list));
        }

        let payload: FulfilPayload =
            match serde_json::from_value(envelope.content.payload.clone()) {
                Ok(payload) => payload,
                Err(e) => {
                    warn!(envelope_id = %envelope.id, "malformed fulfil payload: {}", e);
                    return Ok(self.internal_failure(delivery, extension_list));
                }
            };

        let transfer_id = TransferId::from(envelope.id.clone());

        let existing = match self.store.transfer_by_id(&transfer_id).await {
            Ok(Some(transfer)) => transfer,
            Ok(None) => {
                warn!(transfer_id = %transfer_id, "fulfil for unknown transfer");
                return Ok(self.internal_failure(delivery, extension_list));
            }
            Err(e) => {
                error!(transfer_id = %transfer_id, "store read failed: {}", e);
                return Ok(self.internal_failure(delivery, extension_list));
            }
        };

        // Cryptographic check first; see module docs for the ordering.
        if !crypto::verify_fulfilment(&payload.fulfilment, &existing.condition) {
            let info = MODIFIED_REQUEST
                .information()
                .with_extension_list(extension_list);
            return Ok(PipelineOutcome::CommitAndEmit(failure_notification(
                delivery.envelope(),
                EventAction::Commit,
                info,
            )));
        }

        if existing.transfer_state != TransferState::Reserved {
            warn!(
                transfer_id = %transfer_id,
                state = %existing.transfer_state,
                "fulfil against non-RESERVED transfer"
            );
            return Ok(self.internal_failure(delivery, extension_list));
        }

        if existing.expiration_date <= Utc::now() {
            let info = TRANSFER_EXPIRED
                .information()
                .with_extension_list(extension_list);
            return Ok(PipelineOutcome::CommitAndEmit(failure_notification(
                delivery.envelope(),
                EventAction::Commit,
                info,
            )));
        }

        match action {
            EventAction::Commit => {
                let record = FulfilRecord {
                    fulfilment: payload.fulfilment.clone(),
                    completed_timestamp: payload.completed_timestamp.unwrap_or_else(Utc::now),
                };
                if let Err(e) = self.store.commit_fulfil(&transfer_id, record).await {
                    error!(transfer_id = %transfer_id, "store fulfil failed: {}", e);
                    return Ok(self.internal_failure(delivery, extension_list));
                }

                let position = forwarded_event(
                    delivery.envelope(),
                    EventType::Position,
                    EventAction::Commit,
                    EventState::success(),
                );
                Ok(PipelineOutcome::CommitAndEmit(Emit::Participant {
                    participant: existing.payee_fsp.clone(),
                    functionality: Functionality::Position,
                    action: TopicAction::Commit,
                    envelope: position,
                }))
            }
            EventAction::Reject => {
                let info = rejection_information(delivery.envelope(), extension_list.clone());
                if let Err(e) = self.store.abort_reject(&transfer_id, info).await {
                    error!(transfer_id = %transfer_id, "store reject failed: {}", e);
                    return Ok(self.internal_failure(delivery, extension_list));
                }

                let position = forwarded_event(
                    delivery.envelope(),
                    EventType::Position,
                    EventAction::Reject,
                    EventState::success(),
                );
                Ok(PipelineOutcome::CommitAndEmit(Emit::Participant {
                    participant: existing.payer_fsp.clone(),
                    functionality: Functionality::Position,
                    action: TopicAction::Reject,
                    envelope: position,
                }))
            }
            _ => unreachable!("guarded above"),
        }
    }

    fn internal_failure(
        &self,
        delivery: &Delivery,
        extension_list: Option<serde_json::Value>,
    ) -> PipelineOutcome {
        let info = INTERNAL_ERROR
            .information()
            .with_extension_list(extension_list);
        PipelineOutcome::CommitAndEmit(failure_notification(
            delivery.envelope(),
            EventAction::Commit,
            info,
        ))
    }
}

/// Rejection reason carried by the sender, or the canonical fallback
fn rejection_information(
    envelope: &switch_bus::EventEnvelope,
    extension_list: Option<serde_json::Value>,
) -> ErrorInformation {
    envelope
        .content
        .payload
        .get("errorInformation")
        .and_then(|v| serde_json::from_value(v.clone()).ok())
        .unwrap_or_else(|| {
            ErrorInformation {
                error_code: crate::codes::VALIDATION_ERROR.code,
                error_description: "Transfer rejected by payee".to_string(),
                extension_list,
            }
        })
}

#[async_trait]
impl EnvelopeHandler for FulfilCoordinator {
    async fn handle(&self, delivery: Delivery) -> std::result::Result<(), HandlerError> {
        let outcome = self.execute(&delivery).await?;
        dispatch(&delivery, self.producer.as_ref(), outcome).await?;
        Ok(())
    }
}
