use std::collections::BTreeMap;

use serde::Serialize;

use crate::domain::form::{FieldStatus, FieldVerdict, Form};
use crate::domain::schema::{by_priority, FieldKey};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SummaryLine {
    pub key: FieldKey,
    pub label: &'static str,
    pub value: String,
}

/// Confirmation of everything collected, shown once the form is complete.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct FormSummary {
    pub required: Vec<SummaryLine>,
    pub additional: Vec<(String, String)>,
}

impl FormSummary {
    pub fn from_verdicts(verdicts: &[FieldVerdict], additional: &BTreeMap<String, String>) -> Self {
        let required = by_priority()
            .into_iter()
            .filter_map(|spec| {
                let verdict = verdicts.iter().find(|verdict| verdict.key == spec.key)?;
                let value = verdict.normalized.as_ref()?;
                Some(SummaryLine { key: spec.key, label: spec.label, value: value.to_string() })
            })
            .collect();

        Self {
            required,
            additional: additional.iter().map(|(name, value)| (name.clone(), value.clone())).collect(),
        }
    }

    /// Summary of whatever the form currently holds, valid or not.
    pub fn from_form(form: &Form) -> Self {
        let required = by_priority()
            .into_iter()
            .filter_map(|spec| {
                let value = form.field(spec.key).display_value()?;
                Some(SummaryLine { key: spec.key, label: spec.label, value })
            })
            .collect();

        Self {
            required,
            additional: form
                .additional()
                .iter()
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect(),
        }
    }

    pub fn render(&self) -> String {
        let mut lines =
            self.required.iter().map(|line| format!("- {}: {}", line.label, line.value)).collect::<Vec<_>>();

        if !self.additional.is_empty() {
            lines.push("Additional preferences:".to_string());
            lines.extend(
                self.additional
                    .iter()
                    .map(|(name, value)| format!("- {}: {value}", display_name(name))),
            );
        }

        lines.join("\n")
    }
}

/// `move_in_date` -> `Move In Date`.
pub fn display_name(key: &str) -> String {
    key.split('_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Markdown status board for the whole form.
pub fn render_form_status(form: &Form) -> String {
    let mut lines = vec!["### Required Fields".to_string()];

    for spec in by_priority() {
        let state = form.field(spec.key);
        let line = match (state.status, state.display_value()) {
            (_, None) => format!("⬜ **{}**: Not provided", spec.label),
            (FieldStatus::Valid, Some(value)) => format!("✅ **{}**: {value}", spec.label),
            (FieldStatus::Invalid, Some(value)) => format!("❌ **{}**: {value} (Invalid)", spec.label),
            (FieldStatus::Unvalidated, Some(value)) => {
                format!("⬜ **{}**: {value} (Not validated yet)", spec.label)
            }
        };
        lines.push(line);
    }

    if !form.additional().is_empty() {
        lines.push(String::new());
        lines.push("### Additional Fields".to_string());
        for (name, value) in form.additional() {
            lines.push(format!("📌 **{}**: {value}", display_name(name)));
        }
    }

    lines.push(String::new());
    lines.push("### Form Status".to_string());
    let missing = form.missing_fields();
    if missing.is_empty() {
        lines.push("✅ All required fields are complete!".to_string());
    } else {
        let waiting = missing.iter().map(|key| format!("`{key}`")).collect::<Vec<_>>();
        lines.push(format!("⬜ Waiting for: {}", waiting.join(", ")));
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::{display_name, render_form_status, FormSummary};
    use crate::domain::form::{Form, FormDelta};
    use crate::domain::schema::FieldKey;
    use crate::validation::validator::FormValidator;

    fn validated(form: &mut Form) {
        let report = FormValidator::new().evaluate(form);
        form.record_verdicts(&report.verdicts);
    }

    #[test]
    fn display_names_are_title_cased() {
        assert_eq!(display_name("move_in_date"), "Move In Date");
        assert_eq!(display_name("parking"), "Parking");
    }

    #[test]
    fn status_board_marks_each_field() {
        let mut form = Form::new();
        form.apply(
            &FormDelta::new()
                .with_field(FieldKey::Budget, "500k")
                .with_field(FieldKey::TotalSize, "huge")
                .with_additional("parking", "2 spaces"),
        );
        validated(&mut form);

        let board = render_form_status(&form);
        assert!(board.starts_with("### Required Fields"));
        assert!(board.contains("✅ **Budget**: 500,000"));
        assert!(board.contains("❌ **Total Size**: huge (Invalid)"));
        assert!(board.contains("⬜ **Location**: Not provided"));
        assert!(board.contains("📌 **Parking**: 2 spaces"));
        assert!(board.contains("⬜ Waiting for: `total_size`, `property_type`, `location`"));
    }

    #[test]
    fn complete_form_renders_summary_and_done_status() {
        let mut form = Form::new();
        form.apply(
            &FormDelta::new()
                .with_field(FieldKey::Budget, "20,000 USD")
                .with_field(FieldKey::TotalSize, "500 m2")
                .with_field(FieldKey::PropertyType, "office")
                .with_field(FieldKey::Location, "Mexico City"),
        );
        validated(&mut form);

        assert!(render_form_status(&form).ends_with("✅ All required fields are complete!"));
        let summary = FormSummary::from_form(&form).render();
        assert_eq!(
            summary,
            "- Budget: 20,000 USD\n- Total Size: 500 m²\n- Property Type: office\n- Location: Mexico City"
        );
    }
}
