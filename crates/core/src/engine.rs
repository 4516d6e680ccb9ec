//! Engine trait: the abstraction over text-generation backends.
//!
//! An engine takes a prompt and a length budget and returns the prompt
//! followed by a sampled continuation. It knows nothing about roles,
//! extraction or fallbacks.
//!
//! Implementations: text-generation-inference over HTTP, in-process Candle.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Sampling configuration. Fixed per process, never per request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplingParams {
    /// Temperature (0.0 = greedy)
    pub temperature: f32,

    /// Penalty applied to tokens already present in the context
    pub repetition_penalty: f32,

    /// Seed for the sampler
    pub seed: u64,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            temperature: 0.8,
            repetition_penalty: 1.1,
            seed: 42,
        }
    }
}

/// A single generation call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// The assembled prompt
    pub prompt: String,

    /// Total length in tokens (prompt + continuation) the engine may reach
    pub max_length: usize,

    pub sampling: SamplingParams,
}

impl GenerationRequest {
    /// Number of tokens the engine may add on top of a prompt of `prompt_tokens`.
    pub fn new_token_budget(&self, prompt_tokens: usize) -> usize {
        self.max_length.saturating_sub(prompt_tokens)
    }
}

/// What an engine hands back: the prompt as a literal prefix plus the continuation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawGeneration {
    pub text: String,
}

impl RawGeneration {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// Join a prompt and a bare continuation into the full generated text.
    pub fn from_continuation(prompt: &str, continuation: &str) -> Self {
        let mut text = String::with_capacity(prompt.len() + continuation.len());
        text.push_str(prompt);
        text.push_str(continuation);
        Self { text }
    }
}

/// Estimate the token count for a string.
///
/// Heuristic: 1 token ≈ 4 characters. Rounds up.
pub fn estimate_tokens(text: &str) -> usize {
    text.len().div_ceil(4)
}

/// The core engine trait.
///
/// The orchestrator calls `generate()` without knowing which backend is
/// running. Implementations that are not reentrant must serialize access
/// themselves.
#[async_trait]
pub trait GenerationEngine: Send + Sync {
    /// A human-readable name for this engine (e.g., "remote", "local").
    fn name(&self) -> &str;

    /// Count the tokens of `prompt` as the engine's tokenizer sees them.
    ///
    /// Default implementation uses the 4-chars-per-token estimate.
    fn count_tokens(&self, prompt: &str) -> Result<usize, EngineError> {
        Ok(estimate_tokens(prompt))
    }

    /// Continue `request.prompt`, returning prompt + continuation.
    async fn generate(&self, request: GenerationRequest) -> Result<RawGeneration, EngineError>;
}
