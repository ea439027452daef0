//! Conversation side of the property intake assistant.
//!
//! Each user turn flows through a fixed loop:
//! 1. **Extraction** (`extraction`) - free text to a proposed form delta,
//!    by rules or by the model
//! 2. **Validation** - `intake_core::FormValidator` judges the merged form
//! 3. **Flow** - `intake_core::flows` moves between collecting and complete
//! 4. **Reply** (`reply`) - one question or a summary, optionally reworded by
//!    the model
//!
//! `AgentRuntime` wraps the loop with session storage and streaming.
//!
//! The model only proposes values and wording. Whether a value is valid and
//! what to ask next are decided deterministically in `intake-core`.

pub mod coordinator;
pub mod extraction;
pub mod llm;
pub mod reply;
pub mod runtime;
pub mod stream;

pub use coordinator::{TurnCoordinator, TurnOutcome};
pub use runtime::{AgentRuntime, ReplyStream, StartedSession};
