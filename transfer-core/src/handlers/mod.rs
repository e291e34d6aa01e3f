//! Consumer pipelines
//!
//! Each coordinator reduces a delivery to a single [`PipelineOutcome`];
//! one dispatch function then applies it. The offset is committed
//! before producing downstream (duplicate downstream events are
//! preferred over double processing), and a produce failure propagates
//! without touching the offset again.

pub mod events;
pub mod fulfil;
pub mod prepare;

pub use events::TransferEventRouter;
pub use fulfil::FulfilCoordinator;
pub use prepare::PrepareCoordinator;

use crate::codes::ErrorInformation;
use crate::types::Transfer;
use crate::Result;
use serde_json::Value;
use switch_bus::{
    Delivery, EventAction, EventEnvelope, EventMetadata, EventState, EventType, Functionality,
    Produce, TopicAction,
};

/// Name the switch reports as envelope originator
pub(crate) const SWITCH_NAME: &str = "central-switch";

/// Downstream event produced after the offset commit
#[derive(Debug)]
pub(crate) enum Emit {
    /// To a general topic
    General {
        functionality: Functionality,
        action: TopicAction,
        envelope: EventEnvelope,
    },
    /// To a per-participant topic
    Participant {
        participant: String,
        functionality: Functionality,
        action: TopicAction,
        envelope: EventEnvelope,
    },
}

/// Terminal decision of a pipeline
#[derive(Debug)]
pub(crate) enum PipelineOutcome {
    /// Not ours to act on; offset untouched
    Skip,

    /// Terminal with no downstream event (silent in-flight duplicate,
    /// router no-op)
    CommitOnly,

    /// Commit the offset, then produce exactly one downstream event
    CommitAndEmit(Emit),
}

/// Apply a pipeline outcome: commit first, then produce
pub(crate) async fn dispatch(
    delivery: &Delivery,
    producer: &dyn Produce,
    outcome: PipelineOutcome,
) -> Result<()> {
    match outcome {
        PipelineOutcome::Skip => Ok(()),
        PipelineOutcome::CommitOnly => {
            delivery.commit().await?;
            Ok(())
        }
        PipelineOutcome::CommitAndEmit(emit) => {
            delivery.commit().await?;
            match emit {
                Emit::General {
                    functionality,
                    action,
                    envelope,
                } => producer.produce_general(functionality, action, &envelope).await?,
                Emit::Participant {
                    participant,
                    functionality,
                    action,
                    envelope,
                } => {
                    producer
                        .produce_participant(&participant, functionality, action, &envelope)
                        .await?
                }
            }
            Ok(())
        }
    }
}

/// Failure notification to the originator of `original`
pub(crate) fn failure_notification(
    original: &EventEnvelope,
    action: EventAction,
    info: ErrorInformation,
) -> Emit {
    let state = EventState::failure(info.error_code, info.error_description.clone());
    let envelope = EventEnvelope::new(
        original.id.clone(),
        SWITCH_NAME,
        original.from.clone(),
        EventType::Notification,
        action,
        state,
        info.into_payload(),
    );
    Emit::General {
        functionality: Functionality::Transfer,
        action: TopicAction::Notification,
        envelope,
    }
}

/// Success notification answering a finalized-replay prepare with the
/// current transfer snapshot
pub(crate) fn duplicate_notification(original: &EventEnvelope, transfer: &Transfer) -> Result<Emit> {
    let payload = serde_json::to_value(transfer)?;
    let envelope = EventEnvelope::new(
        original.id.clone(),
        SWITCH_NAME,
        original.from.clone(),
        EventType::Notification,
        EventAction::PrepareDuplicate,
        EventState::success(),
        payload,
    );
    Ok(Emit::General {
        functionality: Functionality::Transfer,
        action: TopicAction::Notification,
        envelope,
    })
}

/// Re-stamp an envelope for the next hop, keeping content and unknown
/// fields verbatim
pub(crate) fn forwarded_event(
    original: &EventEnvelope,
    event_type: EventType,
    action: EventAction,
    state: EventState,
) -> EventEnvelope {
    let mut envelope = original.clone();
    envelope.metadata.event = EventMetadata::new(event_type, action, state);
    envelope
}

/// Extension list of the request payload, copied verbatim when present
pub(crate) fn request_extension_list(envelope: &EventEnvelope) -> Option<Value> {
    envelope.content.payload.get("extensionList").cloned()
}
