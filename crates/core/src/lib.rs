//! # Chatline Core
//!
//! Domain types, traits, and error definitions for the Chatline conversational
//! service. No framework dependencies: the engine, dialogue and gateway crates
//! implement against the model defined here.
//!
//! The generation engine is a trait here; implementations live in
//! `chatline-engine`.

pub mod engine;
pub mod error;
pub mod message;

// Re-export key types at crate root for ergonomics
pub use engine::{GenerationEngine, GenerationRequest, RawGeneration, SamplingParams};
pub use error::{ChatFault, EngineError};
pub use message::{ChatReply, ConversationContext, ConversationTurn, HistoryEntry, Role};
