//! One user turn, start to finish.
//!
//! Extractor proposes, the form merges, the validator judges, the flow
//! machine moves, and exactly one reply comes out. The coordinator is the
//! only writer of the session's form.

use std::sync::Arc;
use std::time::Duration;

use intake_core::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
use intake_core::domain::form::{ApplyReport, FormDelta};
use intake_core::domain::schema::FieldKey;
use intake_core::errors::{ApplicationError, DomainError};
use intake_core::flows::{FlowContext, FlowEngine, FlowEvent, FlowState, PropertyIntakeFlow};
use intake_core::validation::{display_name, FormValidator, ValidationReport};
use intake_core::Session;
use tracing::{info, warn};
use uuid::Uuid;

use crate::extraction::{ExtractionError, FieldExtractor};
use crate::reply::{ReplyDraft, ReplyWriter};

const ACTOR: &str = "turn-coordinator";

#[derive(Clone, Debug, PartialEq)]
pub struct TurnOutcome {
    pub correlation_id: String,
    pub reply: String,
    pub applied: ApplyReport,
    pub validation: ValidationReport,
    pub extraction_error: Option<String>,
    pub phase: FlowState,
}

impl TurnOutcome {
    pub fn extraction_failed(&self) -> bool {
        self.extraction_error.is_some()
    }
}

pub struct TurnCoordinator {
    extractor: Arc<dyn FieldExtractor>,
    replies: Arc<dyn ReplyWriter>,
    audit_sink: Arc<dyn AuditSink>,
    validator: FormValidator,
    flow: FlowEngine<PropertyIntakeFlow>,
    extraction_timeout: Duration,
}

impl TurnCoordinator {
    pub fn new(
        extractor: Arc<dyn FieldExtractor>,
        replies: Arc<dyn ReplyWriter>,
        audit_sink: Arc<dyn AuditSink>,
        extraction_timeout: Duration,
    ) -> Self {
        Self {
            extractor,
            replies,
            audit_sink,
            validator: FormValidator::new(),
            flow: FlowEngine::new(PropertyIntakeFlow),
            extraction_timeout,
        }
    }

    pub fn extractor_name(&self) -> &'static str {
        self.extractor.name()
    }

    pub fn reply_writer_name(&self) -> &'static str {
        self.replies.name()
    }

    /// Runs a turn against `session`. The session is only modified once the
    /// whole turn has succeeded.
    pub async fn process_turn(
        &self,
        session: &mut Session,
        message: &str,
    ) -> Result<TurnOutcome, ApplicationError> {
        let correlation_id = format!("turn-{}", Uuid::new_v4().simple());
        let audit = AuditContext::new(Some(session.id.clone()), correlation_id.clone(), ACTOR);
        self.emit(&audit, "turn.received", AuditCategory::Ingress, AuditOutcome::Success, |event| {
            event.with_metadata("chars", message.chars().count().to_string())
        });

        let mut counters = session.counters;
        counters.turns += 1;
        counters.extraction_attempts += 1;

        let (delta, extraction_error) = match self.extract(message, session).await {
            Ok(delta) => {
                self.emit(
                    &audit,
                    "extraction.completed",
                    AuditCategory::Extraction,
                    AuditOutcome::Success,
                    |event| {
                        event
                            .with_metadata("extractor", self.extractor.name())
                            .with_metadata("fields", delta.keys().join(","))
                    },
                );
                (delta, None)
            }
            Err(error) => {
                counters.extraction_failures += 1;
                warn!(
                    event_name = "extraction.failed",
                    session_id = %session.id,
                    correlation_id = %correlation_id,
                    extractor = self.extractor.name(),
                    kind = error.kind(),
                    error = %error,
                    "extraction failed, continuing with an empty update"
                );
                self.emit(
                    &audit,
                    "extraction.failed",
                    AuditCategory::Extraction,
                    AuditOutcome::Failed,
                    |event| event.with_metadata("kind", error.kind()),
                );
                (FormDelta::new(), Some(error.to_string()))
            }
        };

        let mut form = session.form.clone();
        let applied = form.apply(&delta);

        let validation = self.validator.evaluate(&form);
        form.record_verdicts(&validation.verdicts);
        counters.validation_passes += 1;
        self.emit(
            &audit,
            "validation.evaluated",
            AuditCategory::Validation,
            AuditOutcome::Success,
            |event| event.with_metadata("pending", validation.pending_names().join(",")),
        );

        let event = if validation.is_complete() {
            FlowEvent::RequiredFieldsCollected
        } else {
            FlowEvent::RequiredFieldsPending
        };
        let context = FlowContext { pending_required_fields: validation.pending_names() };
        let transition = self
            .flow
            .apply_with_audit(&session.phase, &event, &context, self.audit_sink.as_ref(), &audit)
            .map_err(|error| ApplicationError::Domain(DomainError::FlowTransition(error)))?;

        let acknowledged = applied
            .updated()
            .filter_map(|change| match FieldKey::from_name(&change.name) {
                Some(key) if change.required => {
                    let state = form.field(key);
                    if !state.is_valid() {
                        return None;
                    }
                    state.display_value().map(|value| format!("{}: {value}", key.spec().label))
                }
                _ => form
                    .additional()
                    .get(&change.name)
                    .map(|value| format!("{}: {value}", display_name(&change.name))),
            })
            .collect::<Vec<_>>();

        let draft = ReplyDraft {
            extraction_failed: extraction_error.is_some(),
            acknowledged,
            just_completed: transition.from != FlowState::Complete
                && transition.to == FlowState::Complete,
            next: validation.next.clone(),
        };
        let reply = self.replies.write(&draft).await;

        session.form = form;
        session.phase = transition.to;
        session.counters = counters;
        session.transcript.push_turn(message, reply.clone());
        session.touch();

        info!(
            event_name = "turn.completed",
            session_id = %session.id,
            correlation_id = %correlation_id,
            phase = transition.to.as_str(),
            updated = applied.updated().count(),
            pending = validation.pending.len(),
            "turn processed"
        );

        Ok(TurnOutcome {
            correlation_id,
            reply,
            applied,
            validation,
            extraction_error,
            phase: transition.to,
        })
    }

    async fn extract(&self, message: &str, session: &Session) -> Result<FormDelta, ExtractionError> {
        match tokio::time::timeout(
            self.extraction_timeout,
            self.extractor.extract(message, &session.form),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(ExtractionError::TimedOut(self.extraction_timeout)),
        }
    }

    fn emit(
        &self,
        audit: &AuditContext,
        event_type: &str,
        category: AuditCategory,
        outcome: AuditOutcome,
        decorate: impl FnOnce(AuditEvent) -> AuditEvent,
    ) {
        let event = AuditEvent::new(
            audit.session_id.clone(),
            audit.correlation_id.clone(),
            event_type,
            category,
            audit.actor.clone(),
            outcome,
        );
        self.audit_sink.emit(decorate(event));
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use intake_core::audit::InMemoryAuditSink;
    use intake_core::domain::form::{Form, FormDelta};
    use intake_core::domain::schema::FieldKey;
    use intake_core::flows::FlowState;
    use intake_core::validation::NextStep;
    use intake_core::{Session, SessionId};

    use super::TurnCoordinator;
    use crate::extraction::{ExtractionError, FieldExtractor};
    use crate::reply::{TemplateReplyWriter, EXTRACTION_NOTICE};

    struct FixedExtractor(FormDelta);

    #[async_trait]
    impl FieldExtractor for FixedExtractor {
        async fn extract(&self, _message: &str, _form: &Form) -> Result<FormDelta, ExtractionError> {
            Ok(self.0.clone())
        }

        fn name(&self) -> &'static str {
            "fixed"
        }
    }

    struct SlowExtractor;

    #[async_trait]
    impl FieldExtractor for SlowExtractor {
        async fn extract(&self, _message: &str, _form: &Form) -> Result<FormDelta, ExtractionError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(FormDelta::new().with_field(FieldKey::Budget, "500k"))
        }

        fn name(&self) -> &'static str {
            "slow"
        }
    }

    fn coordinator(
        extractor: impl FieldExtractor + 'static,
        sink: &InMemoryAuditSink,
    ) -> TurnCoordinator {
        TurnCoordinator::new(
            Arc::new(extractor),
            Arc::new(TemplateReplyWriter),
            Arc::new(sink.clone()),
            Duration::from_millis(50),
        )
    }

    #[tokio::test]
    async fn partial_update_asks_for_the_next_field() {
        let sink = InMemoryAuditSink::default();
        let delta = FormDelta::new()
            .with_field(FieldKey::Budget, "500k")
            .with_field(FieldKey::Location, "Chicago");
        let coordinator = coordinator(FixedExtractor(delta), &sink);
        let mut session = Session::new(SessionId("session_00000001".to_string()));

        let outcome = coordinator
            .process_turn(&mut session, "budget is 500k, looking in Chicago")
            .await
            .expect("turn");

        assert!(matches!(outcome.validation.next, NextStep::Ask { key: FieldKey::TotalSize, .. }));
        assert_eq!(outcome.phase, FlowState::Collecting);
        assert!(outcome.reply.contains("Budget: 500,000"));
        assert!(outcome.reply.contains("Location: Chicago"));
        assert_eq!(session.transcript.len(), 2);
        assert_eq!(session.counters.turns, 1);
        assert!(session.form.field(FieldKey::Budget).is_valid());

        let event_types = sink.events().into_iter().map(|event| event.event_type).collect::<Vec<_>>();
        assert_eq!(
            event_types,
            vec![
                "turn.received",
                "extraction.completed",
                "validation.evaluated",
                "flow.transition_applied"
            ]
        );
    }

    #[tokio::test]
    async fn slow_extraction_times_out_without_touching_the_form() {
        let sink = InMemoryAuditSink::default();
        let coordinator = coordinator(SlowExtractor, &sink);
        let mut session = Session::new(SessionId("session_00000002".to_string()));

        let outcome = coordinator.process_turn(&mut session, "budget is 500k").await.expect("turn");

        assert_eq!(outcome.extraction_error.as_deref(), Some("extraction timed out after 50ms"));
        assert!(outcome.reply.starts_with(EXTRACTION_NOTICE));
        assert!(session.form.field(FieldKey::Budget).is_missing());
        assert_eq!(session.counters.extraction_failures, 1);
        assert_eq!(session.transcript.len(), 2);
        assert!(sink.events().iter().any(|event| event.event_type == "extraction.failed"));
    }

    #[tokio::test]
    async fn invalid_value_is_not_acknowledged_and_is_re_asked() {
        let sink = InMemoryAuditSink::default();
        let coordinator =
            coordinator(FixedExtractor(FormDelta::new().with_field(FieldKey::Budget, "-20")), &sink);
        let mut session = Session::new(SessionId("session_00000003".to_string()));

        let outcome = coordinator.process_turn(&mut session, "budget is -20").await.expect("turn");

        assert!(!outcome.reply.contains("Got it"));
        assert!(outcome.reply.contains("positive"));
        assert!(outcome.reply.ends_with(FieldKey::Budget.spec().question));
    }
}
