use std::sync::Arc;

use async_trait::async_trait;
use intake_core::domain::form::{Form, FormDelta};
use intake_core::domain::schema::{describe_schema, FieldKey};
use serde_json::Value;
use tracing::debug;

use super::{ExtractionError, FieldExtractor};
use crate::llm::{CompletionRequest, LlmClient};

const SYSTEM_PROMPT: &str = "You extract commercial real estate requirements from chat messages. \
You never invent values: only report what the user actually said in the latest message.";

pub struct LlmExtractor {
    client: Arc<dyn LlmClient>,
}

impl LlmExtractor {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self { client }
    }

    pub fn build_prompt(message: &str, form: &Form) -> String {
        let mut snapshot = FieldKey::ALL
            .iter()
            .map(|key| {
                let value = form.field(*key).raw.as_deref().unwrap_or("(not provided)");
                format!("- {key}: {value}")
            })
            .collect::<Vec<_>>();
        snapshot.extend(form.additional().iter().map(|(name, value)| format!("- {name}: {value}")));

        format!(
            "Required fields:\n{schema}\n\n\
             Also capture other property preferences the user mentions (area preference such as \
             downtown or suburban, amenities such as parking or security, time frame) using short \
             snake_case names.\n\n\
             Current form:\n{snapshot}\n\n\
             User message:\n\"\"\"{message}\"\"\"\n\n\
             Reply with a JSON object of the form \
             {{\"fields\": {{\"<required field>\": \"<value as the user wrote it>\"}}, \
             \"additional\": {{\"<preference>\": \"<value>\"}}}}. \
             Leave out anything the message does not mention. \
             When the message mentions a field more than once, report the last mention.",
            schema = describe_schema(),
            snapshot = snapshot.join("\n"),
        )
    }
}

#[async_trait]
impl FieldExtractor for LlmExtractor {
    async fn extract(&self, message: &str, form: &Form) -> Result<FormDelta, ExtractionError> {
        let request = CompletionRequest::json(SYSTEM_PROMPT, Self::build_prompt(message, form));
        let raw = self
            .client
            .complete(&request)
            .await
            .map_err(|error| ExtractionError::Model(error.to_string()))?;

        debug!(
            event_name = "extraction.model_output",
            model = self.client.model_name(),
            chars = raw.len(),
            "extraction response received"
        );
        parse_extraction(&raw)
    }

    fn name(&self) -> &'static str {
        "llm"
    }
}

/// Reads model output into a delta.
///
/// Accepts `{"fields": {...}, "additional": {...}}` or a flat object, with or
/// without a Markdown code fence around it. Numbers and booleans are
/// stringified; nulls and blank strings are dropped.
pub fn parse_extraction(raw: &str) -> Result<FormDelta, ExtractionError> {
    let body = strip_code_fence(raw);
    let value: Value = serde_json::from_str(body)
        .map_err(|error| ExtractionError::Malformed(format!("not JSON: {error}")))?;
    let Value::Object(root) = value else {
        return Err(ExtractionError::Malformed("expected a JSON object".to_string()));
    };

    let mut delta = FormDelta::new();
    let sectioned = root.contains_key("fields") || root.contains_key("additional");
    if !sectioned {
        insert_entries(&mut delta, &root)?;
        return Ok(delta);
    }

    for section in ["fields", "additional"] {
        match root.get(section) {
            None | Some(Value::Null) => {}
            Some(Value::Object(entries)) => insert_entries(&mut delta, entries)?,
            Some(_) => {
                return Err(ExtractionError::Malformed(format!("`{section}` must be an object")))
            }
        }
    }

    Ok(delta)
}

fn insert_entries(
    delta: &mut FormDelta,
    entries: &serde_json::Map<String, Value>,
) -> Result<(), ExtractionError> {
    for (name, value) in entries {
        let text = match value {
            Value::Null => continue,
            Value::String(text) => text.clone(),
            Value::Number(number) => number.to_string(),
            Value::Bool(flag) => (if *flag { "yes" } else { "no" }).to_string(),
            Value::Array(_) | Value::Object(_) => {
                return Err(ExtractionError::Malformed(format!("`{name}` is not a scalar")))
            }
        };
        delta.insert(name, text);
    }
    Ok(())
}

fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric());
    rest.strip_suffix("```").unwrap_or(rest).trim()
}
