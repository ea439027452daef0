//! Turning a turn's outcome into the assistant's message.
//!
//! The template writer is the source of truth. The model writer only rewords
//! a finished template and falls back to it on any failure.

use std::sync::Arc;

use async_trait::async_trait;
use intake_core::validation::NextStep;
use tracing::warn;

use crate::llm::{CompletionRequest, LlmClient};

pub const GREETING: &str = "Hi! I can help you find a commercial property. \
Tell me what you're looking for and I'll keep track of the details. \
What budget do you have in mind for the property?";

pub const EXTRACTION_NOTICE: &str = "I had trouble reading that message, so nothing was updated.";

const REPHRASE_SYSTEM_PROMPT: &str = "You are a friendly real estate assistant. \
Rewrite the draft reply so it sounds natural and concise. Keep every fact and value exactly, \
keep the single question if there is one, and do not ask anything else. \
Return only the reply text.";

/// Everything a writer needs to phrase one reply.
#[derive(Clone, Debug, PartialEq)]
pub struct ReplyDraft {
    pub extraction_failed: bool,
    /// `Label: value` lines for fields this turn updated successfully.
    pub acknowledged: Vec<String>,
    /// The form went from collecting to complete on this turn.
    pub just_completed: bool,
    pub next: NextStep,
}

#[async_trait]
pub trait ReplyWriter: Send + Sync {
    async fn write(&self, draft: &ReplyDraft) -> String;
    fn name(&self) -> &'static str;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct TemplateReplyWriter;

impl TemplateReplyWriter {
    pub fn render(&self, draft: &ReplyDraft) -> String {
        let mut parts = Vec::new();

        if draft.extraction_failed {
            parts.push(EXTRACTION_NOTICE.to_string());
        }
        if !draft.acknowledged.is_empty() {
            parts.push(format!("Got it: {}.", draft.acknowledged.join(", ")));
        }

        match &draft.next {
            NextStep::Ask { question, .. } => parts.push(question.clone()),
            NextStep::Summarize(summary) => {
                let lead = if draft.just_completed {
                    "Great, I have everything I need:"
                } else {
                    "Here is what I have for you:"
                };
                parts.push(format!(
                    "{lead}\n{}\nWould you like to add any other details?",
                    summary.render()
                ));
            }
        }

        parts.join(" ")
    }
}

#[async_trait]
impl ReplyWriter for TemplateReplyWriter {
    async fn write(&self, draft: &ReplyDraft) -> String {
        self.render(draft)
    }

    fn name(&self) -> &'static str {
        "template"
    }
}

pub struct LlmReplyWriter {
    client: Arc<dyn LlmClient>,
    fallback: TemplateReplyWriter,
}

impl LlmReplyWriter {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self { client, fallback: TemplateReplyWriter }
    }
}

#[async_trait]
impl ReplyWriter for LlmReplyWriter {
    async fn write(&self, draft: &ReplyDraft) -> String {
        let template = self.fallback.render(draft);
        let request = CompletionRequest::text(
            REPHRASE_SYSTEM_PROMPT,
            format!("Draft reply:\n{template}"),
        );

        match self.client.complete(&request).await {
            Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(_) => {
                warn!(event_name = "reply.rephrase_empty", "model returned an empty reply");
                template
            }
            Err(error) => {
                warn!(
                    event_name = "reply.rephrase_failed",
                    provider = self.client.provider_name(),
                    error = %error,
                    "falling back to template reply"
                );
                template
            }
        }
    }

    fn name(&self) -> &'static str {
        "llm"
    }
}
