use std::collections::BTreeMap;
use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::schema::{normalize_field_name, FieldKey};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldStatus {
    #[default]
    Unvalidated,
    Valid,
    Invalid,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyKind {
    Office,
    Retail,
    Warehouse,
    Industrial,
    Land,
    Residential,
    MixedUse,
}

impl PropertyKind {
    pub const ALL: [PropertyKind; 7] = [
        PropertyKind::Office,
        PropertyKind::Retail,
        PropertyKind::Warehouse,
        PropertyKind::Industrial,
        PropertyKind::Land,
        PropertyKind::Residential,
        PropertyKind::MixedUse,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Office => "office",
            Self::Retail => "retail",
            Self::Warehouse => "warehouse",
            Self::Industrial => "industrial",
            Self::Land => "land",
            Self::Residential => "residential",
            Self::MixedUse => "mixed use",
        }
    }
}

/// A raw value after normalization to its semantic type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldValue {
    Money { amount: Decimal, currency: Option<String> },
    Area { square_meters: Decimal },
    Property { kind: PropertyKind },
    Place { name: String },
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Money { amount, currency: Some(currency) } => {
                write!(f, "{} {currency}", group_thousands(*amount))
            }
            Self::Money { amount, currency: None } => f.write_str(&group_thousands(*amount)),
            Self::Area { square_meters } => write!(f, "{} m²", group_thousands(*square_meters)),
            Self::Property { kind } => f.write_str(kind.label()),
            Self::Place { name } => f.write_str(name),
        }
    }
}

fn group_thousands(value: Decimal) -> String {
    let rendered = value.normalize().to_string();
    let (sign, unsigned) = match rendered.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", rendered.as_str()),
    };
    let (integer, fraction) = match unsigned.split_once('.') {
        Some((integer, fraction)) => (integer, Some(fraction)),
        None => (unsigned, None),
    };

    let mut grouped = String::with_capacity(integer.len() + integer.len() / 3);
    for (index, digit) in integer.chars().enumerate() {
        if index > 0 && (integer.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    match fraction {
        Some(fraction) => format!("{sign}{grouped}.{fraction}"),
        None => format!("{sign}{grouped}"),
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldState {
    pub raw: Option<String>,
    pub normalized: Option<FieldValue>,
    pub status: FieldStatus,
    pub message: Option<String>,
}

impl FieldState {
    /// Nothing has been captured for this field yet.
    pub fn is_missing(&self) -> bool {
        self.raw.is_none()
    }

    pub fn is_valid(&self) -> bool {
        self.status == FieldStatus::Valid
    }

    /// Normalized rendering when available, raw text otherwise.
    pub fn display_value(&self) -> Option<String> {
        match (&self.normalized, &self.raw) {
            (Some(value), _) => Some(value.to_string()),
            (None, Some(raw)) => Some(raw.clone()),
            (None, None) => None,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RequiredFields {
    pub budget: FieldState,
    pub total_size: FieldState,
    pub property_type: FieldState,
    pub location: FieldState,
}

impl RequiredFields {
    pub fn get(&self, key: FieldKey) -> &FieldState {
        match key {
            FieldKey::Budget => &self.budget,
            FieldKey::TotalSize => &self.total_size,
            FieldKey::PropertyType => &self.property_type,
            FieldKey::Location => &self.location,
        }
    }

    pub fn get_mut(&mut self, key: FieldKey) -> &mut FieldState {
        match key {
            FieldKey::Budget => &mut self.budget,
            FieldKey::TotalSize => &mut self.total_size,
            FieldKey::PropertyType => &mut self.property_type,
            FieldKey::Location => &mut self.location,
        }
    }
}

/// Proposed partial update produced from one user message.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormDelta {
    pub required: BTreeMap<FieldKey, String>,
    pub additional: BTreeMap<String, String>,
}

impl FormDelta {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.required.is_empty() && self.additional.is_empty()
    }

    pub fn len(&self) -> usize {
        self.required.len() + self.additional.len()
    }

    /// Routes a named value to a required field or to the additional
    /// preferences. Blank values and blank names are dropped.
    pub fn insert(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        let value = value.trim();
        if value.is_empty() {
            return;
        }

        match FieldKey::from_name(name) {
            Some(key) => {
                self.required.insert(key, value.to_string());
            }
            None => {
                let key = normalize_field_name(name);
                if !key.is_empty() {
                    self.additional.insert(key, value.to_string());
                }
            }
        }
    }

    pub fn with_field(mut self, key: FieldKey, value: impl Into<String>) -> Self {
        self.insert(key.as_str(), value);
        self
    }

    pub fn with_additional(mut self, name: &str, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    /// Every key the delta touches, required names first.
    pub fn keys(&self) -> Vec<String> {
        self.required
            .keys()
            .map(|key| key.as_str().to_string())
            .chain(self.additional.keys().cloned())
            .collect()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeOutcome {
    Updated,
    Unchanged,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldChange {
    pub name: String,
    pub required: bool,
    pub outcome: ChangeOutcome,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyReport {
    pub changes: Vec<FieldChange>,
}

impl ApplyReport {
    pub fn updated(&self) -> impl Iterator<Item = &FieldChange> {
        self.changes.iter().filter(|change| change.outcome == ChangeOutcome::Updated)
    }

    pub fn has_updates(&self) -> bool {
        self.updated().next().is_some()
    }
}

/// Validator decision for one required field, committed by the coordinator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldVerdict {
    pub key: FieldKey,
    pub status: FieldStatus,
    pub normalized: Option<FieldValue>,
    pub message: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Form {
    fields: RequiredFields,
    additional: BTreeMap<String, String>,
}

impl Form {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(&self, key: FieldKey) -> &FieldState {
        self.fields.get(key)
    }

    pub fn additional(&self) -> &BTreeMap<String, String> {
        &self.additional
    }

    /// Merges a delta into the form. Present keys overwrite earlier values;
    /// nothing is ever removed. A required field whose raw value changes
    /// drops back to `Unvalidated` until a verdict is recorded.
    pub fn apply(&mut self, delta: &FormDelta) -> ApplyReport {
        let mut report = ApplyReport::default();

        for (key, value) in &delta.required {
            let state = self.fields.get_mut(*key);
            let outcome = if state.raw.as_deref() == Some(value.as_str()) {
                ChangeOutcome::Unchanged
            } else {
                *state = FieldState {
                    raw: Some(value.clone()),
                    normalized: None,
                    status: FieldStatus::Unvalidated,
                    message: None,
                };
                ChangeOutcome::Updated
            };
            debug!(field = key.as_str(), ?outcome, "required field merged");
            report.changes.push(FieldChange {
                name: key.as_str().to_string(),
                required: true,
                outcome,
            });
        }

        for (name, value) in &delta.additional {
            let previous = self.additional.insert(name.clone(), value.clone());
            let outcome = if previous.as_deref() == Some(value.as_str()) {
                ChangeOutcome::Unchanged
            } else {
                ChangeOutcome::Updated
            };
            debug!(field = name.as_str(), ?outcome, "additional field merged");
            report.changes.push(FieldChange { name: name.clone(), required: false, outcome });
        }

        report
    }

    pub fn record_verdicts(&mut self, verdicts: &[FieldVerdict]) {
        for verdict in verdicts {
            let state = self.fields.get_mut(verdict.key);
            state.status = verdict.status;
            state.normalized = verdict.normalized.clone();
            state.message = verdict.message.clone();
        }
    }

    pub fn status(&self) -> BTreeMap<FieldKey, FieldStatus> {
        FieldKey::ALL.iter().map(|key| (*key, self.fields.get(*key).status)).collect()
    }

    pub fn is_complete(&self) -> bool {
        FieldKey::ALL.iter().all(|key| self.fields.get(*key).is_valid())
    }

    /// Required fields that are not valid yet, in priority order.
    pub fn missing_fields(&self) -> Vec<FieldKey> {
        let mut missing = FieldKey::ALL
            .iter()
            .copied()
            .filter(|key| !self.fields.get(*key).is_valid())
            .collect::<Vec<_>>();
        missing.sort_by_key(|key| key.spec().priority);
        missing
    }
}
