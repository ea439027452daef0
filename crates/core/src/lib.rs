pub mod audit;
pub mod config;
pub mod domain;
pub mod errors;
pub mod flows;
pub mod validation;

pub use domain::form::{
    ApplyReport, ChangeOutcome, FieldStatus, FieldValue, FieldVerdict, Form, FormDelta,
    PropertyKind,
};
pub use domain::schema::{FieldKey, FieldSpec, SemanticType, FIELD_SCHEMA};
pub use domain::session::{Session, SessionId, Transcript};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use flows::{FlowEngine, FlowState, PropertyIntakeFlow};
pub use validation::{FormSummary, FormValidator, NextStep, ValidationReport};
