//! Transfer-event router
//!
//! Stateless fan-out from the shared TRANSFER topic (fed by the position
//! subsystem) to the notification topic. Successful terminal
//! action-status events are forwarded with the same action; everything
//! else is a committed no-op.

use crate::handlers::{dispatch, Emit, PipelineOutcome};
use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;
use switch_bus::{
    Delivery, EnvelopeHandler, EventAction, EventStatus, Functionality, HandlerError, Produce,
    TopicAction,
};
use tracing::warn;

/// Actions the router forwards to notification
const FORWARDED_ACTIONS: [EventAction; 5] = [
    EventAction::Prepare,
    EventAction::Commit,
    EventAction::Reject,
    EventAction::Abort,
    EventAction::TimeoutReserved,
];

/// Router from TRANSFER events to NOTIFICATION
pub struct TransferEventRouter {
    producer: Arc<dyn Produce>,
}

impl TransferEventRouter {
    /// Build a router over the shared producer
    pub fn new(producer: Arc<dyn Produce>) -> Self {
        Self { producer }
    }

    fn execute(&self, delivery: &Delivery) -> Result<PipelineOutcome> {
        let envelope = delivery.envelope();
        let event = &envelope.metadata.event;

        let forwardable = event.state.status == EventStatus::Success
            && FORWARDED_ACTIONS.contains(&event.action);

        if !forwardable {
            warn!(
                envelope_id = %envelope.id,
                action = %event.action,
                status = ?event.state.status,
                "transfer event not forwardable, dropping"
            );
            return Ok(PipelineOutcome::CommitOnly);
        }

        // Forward unchanged: same action, same content, unknown fields
        // preserved by the envelope type.
        Ok(PipelineOutcome::CommitAndEmit(Emit::General {
            functionality: Functionality::Transfer,
            action: TopicAction::Notification,
            envelope: envelope.clone(),
        }))
    }
}

#[async_trait]
impl EnvelopeHandler for TransferEventRouter {
    async fn handle(&self, delivery: Delivery) -> std::result::Result<(), HandlerError> {
        let outcome = self.execute(&delivery)?;
        dispatch(&delivery, self.producer.as_ref(), outcome).await?;
        Ok(())
    }
}
