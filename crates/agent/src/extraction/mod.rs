//! Free text + current form -> proposed form delta.
//!
//! Extractors only propose. They never touch the form; the turn coordinator
//! decides what to merge.

use std::time::Duration;

use async_trait::async_trait;
use intake_core::domain::form::{Form, FormDelta};
use thiserror::Error;

pub mod llm;
pub mod rules;

pub use llm::{parse_extraction, LlmExtractor};
pub use rules::RuleBasedExtractor;

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("model call failed: {0}")]
    Model(String),
    #[error("malformed extraction output: {0}")]
    Malformed(String),
    #[error("extraction timed out after {}ms", .0.as_millis())]
    TimedOut(Duration),
}

impl ExtractionError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Model(_) => "model",
            Self::Malformed(_) => "malformed",
            Self::TimedOut(_) => "timed_out",
        }
    }
}

/// Finding nothing is an empty delta, not an error.
#[async_trait]
pub trait FieldExtractor: Send + Sync {
    async fn extract(&self, message: &str, form: &Form) -> Result<FormDelta, ExtractionError>;
    fn name(&self) -> &'static str;
}
