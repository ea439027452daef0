use serde::Serialize;
use tracing::debug;

use crate::domain::form::{FieldStatus, FieldValue, FieldVerdict, Form};
use crate::domain::schema::{by_priority, FieldKey, SemanticType};
use crate::validation::normalize::{parse_area, parse_money, parse_place, parse_property_kind};
use crate::validation::summary::FormSummary;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum PendingReason {
    Missing,
    Invalid { message: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PendingField {
    pub key: FieldKey,
    #[serde(flatten)]
    pub reason: PendingReason,
}

/// What the assistant should do after a turn.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NextStep {
    /// Ask about exactly one field, the highest-priority pending one.
    Ask { key: FieldKey, question: String },
    Summarize(FormSummary),
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ValidationReport {
    pub verdicts: Vec<FieldVerdict>,
    pub pending: Vec<PendingField>,
    pub next: NextStep,
}

impl ValidationReport {
    pub fn is_complete(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn pending_names(&self) -> Vec<String> {
        self.pending.iter().map(|field| field.key.as_str().to_string()).collect()
    }
}

/// Deterministic checks over the required fields. Holds no state; the
/// verdicts it returns are committed by the caller.
#[derive(Clone, Copy, Debug, Default)]
pub struct FormValidator;

impl FormValidator {
    pub fn new() -> Self {
        Self
    }

    pub fn validate_value(&self, key: FieldKey, raw: &str) -> Result<FieldValue, String> {
        match key.spec().semantic {
            SemanticType::Money => {
                parse_money(raw).map(|(amount, currency)| FieldValue::Money { amount, currency })
            }
            SemanticType::Area => {
                parse_area(raw).map(|square_meters| FieldValue::Area { square_meters })
            }
            SemanticType::PropertyKind => {
                parse_property_kind(raw).map(|kind| FieldValue::Property { kind })
            }
            SemanticType::Place => parse_place(raw).map(|name| FieldValue::Place { name }),
        }
    }

    pub fn validate_field(&self, form: &Form, key: FieldKey) -> FieldVerdict {
        let Some(raw) = form.field(key).raw.as_deref() else {
            return FieldVerdict {
                key,
                status: FieldStatus::Unvalidated,
                normalized: None,
                message: None,
            };
        };

        match self.validate_value(key, raw) {
            Ok(value) => {
                FieldVerdict { key, status: FieldStatus::Valid, normalized: Some(value), message: None }
            }
            Err(message) => FieldVerdict {
                key,
                status: FieldStatus::Invalid,
                normalized: None,
                message: Some(message),
            },
        }
    }

    pub fn evaluate(&self, form: &Form) -> ValidationReport {
        let mut verdicts = Vec::with_capacity(FieldKey::ALL.len());
        let mut pending = Vec::new();

        for spec in by_priority() {
            let verdict = self.validate_field(form, spec.key);
            match (&verdict.status, &verdict.message) {
                (FieldStatus::Valid, _) => {}
                (FieldStatus::Invalid, Some(message)) => pending.push(PendingField {
                    key: spec.key,
                    reason: PendingReason::Invalid { message: message.clone() },
                }),
                _ => pending.push(PendingField { key: spec.key, reason: PendingReason::Missing }),
            }
            verdicts.push(verdict);
        }

        let next = match pending.first() {
            Some(field) => NextStep::Ask { key: field.key, question: self.question_for(field) },
            None => NextStep::Summarize(FormSummary::from_verdicts(&verdicts, form.additional())),
        };

        debug!(pending = pending.len(), complete = pending.is_empty(), "form evaluated");
        ValidationReport { verdicts, pending, next }
    }

    /// The follow-up question for one pending field. Invalid values lead
    /// with the reason they were rejected.
    pub fn question_for(&self, pending: &PendingField) -> String {
        let spec = pending.key.spec();
        match &pending.reason {
            PendingReason::Missing => spec.question.to_string(),
            PendingReason::Invalid { message } => format!("{message} {}", spec.question),
        }
    }
}
