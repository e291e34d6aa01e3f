//! Prepare coordinator
//!
//! Consumes per-participant PREPARE topics. Pipeline: duplicate
//! resolution, business validation, store write, offset commit, then
//! exactly one downstream event (payer POSITION on pass, NOTIFICATION
//! failure otherwise).

use crate::codes::{INTERNAL_ERROR, VALIDATION_ERROR};
use crate::handlers::{
    dispatch, duplicate_notification, failure_notification, forwarded_event,
    request_extension_list, Emit, PipelineOutcome,
};
use crate::resolver::{self, DuplicateResolution};
use crate::store::TransferStore;
use crate::types::PreparePayload;
use crate::validation::TransferValidator;
use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;
use switch_bus::{
    Delivery, EnvelopeHandler, EventAction, EventState, EventType, Functionality, HandlerError,
    Produce, Topic, TopicAction,
};
use tracing::{debug, error, warn};

/// Coordinator for the prepare phase
pub struct PrepareCoordinator {
    store: Arc<dyn TransferStore>,
    producer: Arc<dyn Produce>,
    validator: TransferValidator,
}

impl PrepareCoordinator {
    /// Build a coordinator sharing the process-wide store and producer
    pub fn new(store: Arc<dyn TransferStore>, producer: Arc<dyn Produce>) -> Self {
        let validator = TransferValidator::new(store.clone());
        Self {
            store,
            producer,
            validator,
        }
    }

    async fn execute(&self, delivery: &Delivery) -> Result<PipelineOutcome> {
        let envelope = delivery.envelope();

        // The sender's prepare topic must be the one this handler is bound
        // to; anything else means the handler is unbound for that
        // participant and the message is not ours.
        let expected = Topic::participant(
            &envelope.from,
            Functionality::Transfer,
            TopicAction::Prepare,
        );
        if delivery.topic() != &expected {
            warn!(
                topic = %delivery.topic(),
                expected = %expected,
                "prepare envelope arrived on an unbound topic"
            );
            return Ok(PipelineOutcome::Skip);
        }

        let extension_list = request_extension_list(envelope);

        let payload: PreparePayload =
            match serde_json::from_value(envelope.content.payload.clone()) {
                Ok(payload) => payload,
                Err(e) => {
                    warn!(envelope_id = %envelope.id, "malformed prepare payload: {}", e);
                    let info = VALIDATION_ERROR
                        .with_detail(&e.to_string())
                        .with_extension_list(extension_list);
                    return Ok(PipelineOutcome::CommitAndEmit(failure_notification(
                        envelope,
                        EventAction::Prepare,
                        info,
                    )));
                }
            };

        match resolver::resolve(self.store.as_ref(), &payload).await? {
            DuplicateResolution::New => {}
            DuplicateResolution::InFlight => {
                debug!(transfer_id = %payload.transfer_id, "in-flight duplicate, dropping");
                return Ok(PipelineOutcome::CommitOnly);
            }
            DuplicateResolution::FinalizedReplay(transfer) => {
                debug!(transfer_id = %payload.transfer_id, "finalized replay, answering with snapshot");
                return Ok(PipelineOutcome::CommitAndEmit(duplicate_notification(
                    envelope, &transfer,
                )?));
            }
            DuplicateResolution::Anomaly => {
                let info = VALIDATION_ERROR
                    .with_detail("duplicate transfer id with no resolvable state")
                    .with_extension_list(extension_list);
                return Ok(PipelineOutcome::CommitAndEmit(failure_notification(
                    envelope,
                    EventAction::Prepare,
                    info,
                )));
            }
            DuplicateResolution::Modified => {
                let info = crate::codes::MODIFIED_REQUEST
                    .information()
                    .with_extension_list(extension_list);
                return Ok(PipelineOutcome::CommitAndEmit(failure_notification(
                    envelope,
                    EventAction::Prepare,
                    info,
                )));
            }
        }

        let validation = match self.validator.validate_prepare(&payload).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(transfer_id = %payload.transfer_id, "validation lookup failed: {}", e);
                let info = INTERNAL_ERROR
                    .information()
                    .with_extension_list(extension_list);
                return Ok(PipelineOutcome::CommitAndEmit(failure_notification(
                    envelope,
                    EventAction::Prepare,
                    info,
                )));
            }
        };

        let reason = if validation.passed {
            None
        } else {
            Some(validation.joined_reasons())
        };

        if let Err(e) = self
            .store
            .save_prepare(&payload, reason, validation.passed)
            .await
        {
            error!(transfer_id = %payload.transfer_id, "store prepare failed: {}", e);
            let info = INTERNAL_ERROR
                .information()
                .with_extension_list(extension_list);
            return Ok(PipelineOutcome::CommitAndEmit(failure_notification(
                envelope,
                EventAction::Prepare,
                info,
            )));
        }

        if validation.passed {
            let position = forwarded_event(
                envelope,
                EventType::Position,
                EventAction::Prepare,
                EventState::success(),
            );
            return Ok(PipelineOutcome::CommitAndEmit(Emit::Participant {
                participant: payload.payer_fsp.clone(),
                functionality: Functionality::Position,
                action: TopicAction::Prepare,
                envelope: position,
            }));
        }

        let detail = validation.joined_reasons();
        if let Err(e) = self
            .store
            .log_transfer_error(&payload.transfer_id, VALIDATION_ERROR.code, &detail)
            .await
        {
            // The failure notification still goes out; the audit row is lost.
            error!(transfer_id = %payload.transfer_id, "error-log write failed: {}", e);
        }

        let info = VALIDATION_ERROR
            .with_detail(&detail)
            .with_extension_list(extension_list);
        Ok(PipelineOutcome::CommitAndEmit(failure_notification(
            envelope,
            EventAction::Prepare,
            info,
        )))
    }
}

#[async_trait]
impl EnvelopeHandler for PrepareCoordinator {
    async fn handle(&self, delivery: Delivery) -> std::result::Result<(), HandlerError> {
        let outcome = self.execute(&delivery).await?;
        dispatch(&delivery, self.producer.as_ref(), outcome).await?;
        Ok(())
    }
}
