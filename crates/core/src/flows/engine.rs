use thiserror::Error;

use crate::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
use crate::flows::states::{FlowAction, FlowContext, FlowEvent, FlowState, TransitionOutcome};

pub trait FlowDefinition {
    fn initial_state(&self) -> FlowState;
    fn transition(
        &self,
        current: &FlowState,
        event: &FlowEvent,
        context: &FlowContext,
    ) -> Result<TransitionOutcome, FlowTransitionError>;
}

/// Collect required property fields, summarize once they are all valid, and
/// drop back to collecting whenever an update breaks completeness.
#[derive(Clone, Debug, Default)]
pub struct PropertyIntakeFlow;

impl FlowDefinition for PropertyIntakeFlow {
    fn initial_state(&self) -> FlowState {
        FlowState::Collecting
    }

    fn transition(
        &self,
        current: &FlowState,
        event: &FlowEvent,
        context: &FlowContext,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        transition_property_intake(current, event, context)
    }
}

#[derive(Clone, Debug, Default)]
pub struct FlowEngine<F> {
    flow: F,
}

impl<F> FlowEngine<F>
where
    F: FlowDefinition,
{
    pub fn new(flow: F) -> Self {
        Self { flow }
    }

    pub fn initial_state(&self) -> FlowState {
        self.flow.initial_state()
    }

    pub fn apply(
        &self,
        current: &FlowState,
        event: &FlowEvent,
        context: &FlowContext,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        self.flow.transition(current, event, context)
    }

    pub fn apply_with_audit<S>(
        &self,
        current: &FlowState,
        event: &FlowEvent,
        context: &FlowContext,
        sink: &S,
        audit: &AuditContext,
    ) -> Result<TransitionOutcome, FlowTransitionError>
    where
        S: AuditSink + ?Sized,
    {
        let result = self.apply(current, event, context);
        match &result {
            Ok(outcome) => {
                sink.emit(
                    AuditEvent::new(
                        audit.session_id.clone(),
                        audit.correlation_id.clone(),
                        "flow.transition_applied",
                        AuditCategory::Flow,
                        audit.actor.clone(),
                        AuditOutcome::Success,
                    )
                    .with_metadata("from", outcome.from.as_str())
                    .with_metadata("to", outcome.to.as_str())
                    .with_metadata("event", format!("{:?}", outcome.event)),
                );
            }
            Err(error) => {
                sink.emit(
                    AuditEvent::new(
                        audit.session_id.clone(),
                        audit.correlation_id.clone(),
                        "flow.transition_rejected",
                        AuditCategory::Flow,
                        audit.actor.clone(),
                        AuditOutcome::Rejected,
                    )
                    .with_metadata("error", error.to_string()),
                );
            }
        }
        result
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FlowTransitionError {
    #[error("missing required fields before transition from {state:?}: {missing_fields:?}")]
    MissingRequiredFields { state: FlowState, missing_fields: Vec<String> },
}

fn transition_property_intake(
    current: &FlowState,
    event: &FlowEvent,
    context: &FlowContext,
) -> Result<TransitionOutcome, FlowTransitionError> {
    use FlowAction::{PromptForField, SummarizeForm};
    use FlowEvent::{RequiredFieldsCollected, RequiredFieldsPending};
    use FlowState::{Collecting, Complete};

    let (to, actions) = match (current, event) {
        (Collecting, RequiredFieldsCollected) | (Complete, RequiredFieldsCollected) => {
            if !context.pending_required_fields.is_empty() {
                return Err(FlowTransitionError::MissingRequiredFields {
                    state: *current,
                    missing_fields: context.pending_required_fields.clone(),
                });
            }
            (Complete, vec![SummarizeForm])
        }
        (Collecting, RequiredFieldsPending) | (Complete, RequiredFieldsPending) => {
            (Collecting, vec![PromptForField])
        }
    };

    Ok(TransitionOutcome { from: *current, to, event: event.clone(), actions })
}

#[cfg(test)]
mod tests {
    use crate::audit::{AuditContext, AuditOutcome, InMemoryAuditSink};
    use crate::domain::session::SessionId;
    use crate::flows::engine::{FlowEngine, FlowTransitionError, PropertyIntakeFlow};
    use crate::flows::states::{FlowAction, FlowContext, FlowEvent, FlowState};

    fn pending(fields: &[&str]) -> FlowContext {
        FlowContext {
            pending_required_fields: fields.iter().map(|field| field.to_string()).collect(),
        }
    }

    #[test]
    fn collecting_stays_collecting_while_fields_are_pending() {
        let engine = FlowEngine::new(PropertyIntakeFlow);
        let outcome = engine
            .apply(
                &engine.initial_state(),
                &FlowEvent::RequiredFieldsPending,
                &pending(&["total_size"]),
            )
            .expect("pending keeps collecting");

        assert_eq!(outcome.to, FlowState::Collecting);
        assert_eq!(outcome.actions, vec![FlowAction::PromptForField]);
    }

    #[test]
    fn collected_fields_complete_the_form() {
        let engine = FlowEngine::<PropertyIntakeFlow>::default();
        let outcome = engine
            .apply(
                &FlowState::Collecting,
                &FlowEvent::RequiredFieldsCollected,
                &FlowContext::default(),
            )
            .expect("collecting -> complete");

        assert_eq!(outcome.to, FlowState::Complete);
        assert_eq!(outcome.actions, vec![FlowAction::SummarizeForm]);
    }

    #[test]
    fn complete_reenters_collecting_when_a_field_breaks() {
        let engine = FlowEngine::new(PropertyIntakeFlow);
        let outcome = engine
            .apply(&FlowState::Complete, &FlowEvent::RequiredFieldsPending, &pending(&["budget"]))
            .expect("complete -> collecting");

        assert_eq!(outcome.from, FlowState::Complete);
        assert_eq!(outcome.to, FlowState::Collecting);
    }

    #[test]
    fn complete_can_be_resummarized() {
        let engine = FlowEngine::new(PropertyIntakeFlow);
        let outcome = engine
            .apply(
                &FlowState::Complete,
                &FlowEvent::RequiredFieldsCollected,
                &FlowContext::default(),
            )
            .expect("complete -> complete");

        assert_eq!(outcome.to, FlowState::Complete);
    }

    #[test]
    fn completion_with_pending_fields_is_rejected() {
        let engine = FlowEngine::new(PropertyIntakeFlow);
        let error = engine
            .apply(
                &FlowState::Collecting,
                &FlowEvent::RequiredFieldsCollected,
                &pending(&["budget", "location"]),
            )
            .expect_err("must reject pending fields");

        assert!(matches!(error, FlowTransitionError::MissingRequiredFields { .. }));
    }

    #[test]
    fn flow_transition_emits_audit_event() {
        let engine = FlowEngine::new(PropertyIntakeFlow);
        let sink = InMemoryAuditSink::default();

        let _ = engine
            .apply_with_audit(
                &FlowState::Collecting,
                &FlowEvent::RequiredFieldsCollected,
                &FlowContext::default(),
                &sink,
                &AuditContext::new(
                    Some(SessionId("session_0001".to_owned())),
                    "turn-42",
                    "turn-coordinator",
                ),
            )
            .expect("transition should succeed");

        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].correlation_id, "turn-42");
        assert_eq!(events[0].event_type, "flow.transition_applied");
        assert_eq!(events[0].metadata.get("to").map(String::as_str), Some("complete"));
    }

    #[test]
    fn rejected_transition_is_audited() {
        let engine = FlowEngine::new(PropertyIntakeFlow);
        let sink = InMemoryAuditSink::default();

        let result = engine.apply_with_audit(
            &FlowState::Collecting,
            &FlowEvent::RequiredFieldsCollected,
            &pending(&["location"]),
            &sink,
            &AuditContext::new(None, "turn-43", "turn-coordinator"),
        );

        assert!(result.is_err());
        let events = sink.events();
        assert_eq!(events[0].event_type, "flow.transition_rejected");
        assert_eq!(events[0].outcome, AuditOutcome::Rejected);
    }
}
