pub mod normalize;
pub mod summary;
pub mod validator;

pub use summary::{display_name, render_form_status, FormSummary, SummaryLine};
pub use validator::{FormValidator, NextStep, PendingField, PendingReason, ValidationReport};
