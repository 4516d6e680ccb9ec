//! Error types for the Chatline domain.
//!
//! Uses `thiserror`. Each bounded context has its own enum; the chat path
//! folds engine errors into [`ChatFault`] and never surfaces them to callers.

use thiserror::Error;

/// Failures raised by a generation engine or the service that owns it.
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    #[error("Engine unavailable: {0}")]
    Unavailable(String),

    #[error("Engine is still loading")]
    Loading,

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Generation failed: {0}")]
    Generation(String),

    #[error("Request timed out: {0}")]
    Timeout(String),
}

impl EngineError {
    /// Whether this error means the engine never became ready.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Loading)
    }
}

/// The chat-path fault taxonomy.
///
/// Every variant is caught by the orchestrator and turned into the degraded
/// reply; the kind only drives logging.
#[derive(Debug, Clone, Error)]
pub enum ChatFault {
    /// The engine has not finished initializing (or failed to).
    #[error("engine unavailable: {0}")]
    EngineUnavailable(String),

    /// The engine was invoked and raised an internal error.
    #[error("generation failure: {0}")]
    GenerationFailure(String),

    /// Anything else in assembly, extraction or sanitization.
    #[error("unknown fault: {0}")]
    Unknown(String),
}

impl ChatFault {
    /// Short, stable label for structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::EngineUnavailable(_) => "engine_unavailable",
            Self::GenerationFailure(_) => "generation_failure",
            Self::Unknown(_) => "unknown",
        }
    }
}

impl From<EngineError> for ChatFault {
    fn from(err: EngineError) -> Self {
        if err.is_unavailable() {
            Self::EngineUnavailable(err.to_string())
        } else {
            Self::GenerationFailure(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_error_displays_correctly() {
        let err = EngineError::Network("connection refused".into());
        assert_eq!(err.to_string(), "Network error: connection refused");
    }

    #[test]
    fn loading_maps_to_engine_unavailable() {
        let fault = ChatFault::from(EngineError::Loading);
        assert!(matches!(fault, ChatFault::EngineUnavailable(_)));
        assert_eq!(fault.kind(), "engine_unavailable");
    }

    #[test]
    fn generation_error_maps_to_generation_failure() {
        let fault = ChatFault::from(EngineError::Generation("tensor shape mismatch".into()));
        assert!(matches!(fault, ChatFault::GenerationFailure(_)));
        assert!(fault.to_string().contains("tensor shape mismatch"));
    }

    #[test]
    fn timeout_is_not_unavailable() {
        assert!(!EngineError::Timeout("120s".into()).is_unavailable());
        assert!(EngineError::Unavailable("failed to load".into()).is_unavailable());
    }
}
