//! The Chatline conversation pipeline.
//!
//! Turns a user message plus recent history into a single reply:
//! [`ContextAssembler`] builds the prompt, the engine continues it,
//! [`extract_reply`] isolates the assistant turn and [`sanitize_reply`]
//! guarantees something presentable. [`ChatOrchestrator`] wires the stages
//! together and owns fault handling.

pub mod assembler;
pub mod extractor;
pub mod orchestrator;
pub mod sanitizer;

pub use assembler::{ContextAssembler, Prompt};
pub use extractor::extract_reply;
pub use orchestrator::ChatOrchestrator;
pub use sanitizer::{
    FALLBACK_DEGRADED, FALLBACK_EMPTY, FALLBACK_GENERIC, MIN_REPLY_CHARS, sanitize_reply,
};
