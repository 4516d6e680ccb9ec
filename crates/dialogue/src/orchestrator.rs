//! Chat orchestrator: runs one turn through the pipeline.
//!
//! ```text
//! context ─▶ assemble ─▶ generate ─▶ extract ─▶ sanitize ─▶ reply
//! ```
//!
//! Any fault along the way is logged and replaced by
//! [`FALLBACK_DEGRADED`]; callers always get a reply.

use std::sync::Arc;

use chatline_config::GenerationConfig;
use chatline_core::engine::{GenerationRequest, SamplingParams};
use chatline_core::error::ChatFault;
use chatline_core::message::{ChatReply, ConversationContext};
use chatline_engine::EngineService;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::assembler::ContextAssembler;
use crate::extractor::extract_reply;
use crate::sanitizer::{FALLBACK_DEGRADED, MIN_REPLY_CHARS, sanitize_reply};

/// Drives a single request through assembly, generation and cleanup.
pub struct ChatOrchestrator {
    engine: Arc<EngineService>,
    assembler: ContextAssembler,
    max_response_tokens: usize,
    sampling: SamplingParams,
}

impl ChatOrchestrator {
    pub fn new(engine: Arc<EngineService>, generation: &GenerationConfig) -> Self {
        Self {
            engine,
            assembler: ContextAssembler::new(generation.max_input_length),
            max_response_tokens: generation.max_response_tokens,
            sampling: generation.sampling(),
        }
    }

    pub fn engine(&self) -> &Arc<EngineService> {
        &self.engine
    }

    /// Produce the reply for `context`. Never fails.
    pub async fn respond(&self, context: &ConversationContext) -> ChatReply {
        let request_id = Uuid::new_v4();
        match self.try_respond(request_id, context).await {
            Ok(reply) => ChatReply::new(reply),
            Err(fault) => {
                warn!(
                    %request_id,
                    kind = fault.kind(),
                    error = %fault,
                    "Chat request degraded"
                );
                ChatReply::new(FALLBACK_DEGRADED)
            }
        }
    }

    /// Run the pipeline, surfacing the fault instead of the degraded reply.
    pub async fn try_respond(
        &self,
        request_id: Uuid,
        context: &ConversationContext,
    ) -> Result<String, ChatFault> {
        let engine = self.engine.engine()?;

        let prompt = self.assembler.assemble(context);
        info!(
            %request_id,
            history_turns = context.history().len(),
            prompt_chars = prompt.char_len(),
            truncated = prompt.was_truncated(),
            "Generating reply"
        );
        debug!(%request_id, prompt = prompt.as_str(), "Assembled prompt");

        let prompt_tokens = engine.count_tokens(prompt.as_str())?;
        let request = GenerationRequest {
            prompt: prompt.as_str().to_string(),
            max_length: prompt_tokens.saturating_add(self.max_response_tokens),
            sampling: self.sampling,
        };

        let raw = engine.generate(request).await?;
        debug!(%request_id, raw = %raw.text, "Raw generation");

        let reply = sanitize_reply(extract_reply(&raw.text, prompt.as_str()));
        if reply.chars().count() < MIN_REPLY_CHARS {
            return Err(ChatFault::Unknown(format!(
                "sanitized reply shorter than {MIN_REPLY_CHARS} characters"
            )));
        }

        info!(%request_id, reply_chars = reply.chars().count(), "Reply ready");
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chatline_core::engine::{GenerationEngine, RawGeneration};
    use chatline_core::error::EngineError;

    use crate::sanitizer::{FALLBACK_EMPTY, FALLBACK_GENERIC};

    /// Replies with a fixed continuation and records what it was asked.
    struct ScriptedEngine {
        continuation: Result<String, EngineError>,
        seen: Mutex<Vec<GenerationRequest>>,
    }

    impl ScriptedEngine {
        fn replying(continuation: &str) -> Arc<Self> {
            Arc::new(Self {
                continuation: Ok(continuation.to_string()),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn failing(err: EngineError) -> Arc<Self> {
            Arc::new(Self {
                continuation: Err(err),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn last_request(&self) -> GenerationRequest {
            self.seen.lock().unwrap().last().cloned().unwrap()
        }
    }

    #[async_trait]
    impl GenerationEngine for ScriptedEngine {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn generate(&self, request: GenerationRequest) -> Result<RawGeneration, EngineError> {
            self.seen.lock().unwrap().push(request.clone());
            let continuation = self.continuation.clone()?;
            Ok(RawGeneration::from_continuation(&request.prompt, &continuation))
        }
    }

    fn orchestrator(engine: Arc<ScriptedEngine>) -> ChatOrchestrator {
        let service = Arc::new(EngineService::ready("test-model", engine));
        ChatOrchestrator::new(service, &GenerationConfig::default())
    }

    #[tokio::test]
    async fn replies_with_extracted_assistant_turn() {
        let engine = ScriptedEngine::replying("\nAssistant: Hello! How can I help?\nUser: more");
        let orch = orchestrator(engine.clone());

        let ctx = ConversationContext::from_plain::<&str>("hi", &[]);
        let reply = orch.respond(&ctx).await;

        assert_eq!(reply.response, "Hello! How can I help?");
        assert_eq!(engine.last_request().prompt, "User: hi");
    }

    #[tokio::test]
    async fn history_flows_into_prompt() {
        let engine = ScriptedEngine::replying("\nAssistant: It is sunny today.");
        let orch = orchestrator(engine.clone());

        let ctx = ConversationContext::from_plain(
            "what about the weather?",
            &["hello", "Hi! How can I help?"],
        );
        let reply = orch.respond(&ctx).await;

        assert_eq!(reply.response, "It is sunny today.");
        assert_eq!(
            engine.last_request().prompt,
            "User: hello\nAssistant: Hi! How can I help?\nUser: what about the weather?"
        );
    }

    #[tokio::test]
    async fn length_budget_adds_response_tokens_to_prompt() {
        let engine = ScriptedEngine::replying(" Sure thing.");
        let orch = orchestrator(engine.clone());

        // "User: 12345678901" is 17 chars, 5 estimated tokens.
        let ctx = ConversationContext::from_plain::<&str>("12345678901", &[]);
        orch.respond(&ctx).await;

        let request = engine.last_request();
        assert_eq!(request.max_length, 5 + 30);
        assert_eq!(request.sampling, SamplingParams::default());
    }

    #[tokio::test]
    async fn oversized_response_budget_saturates() {
        let engine = ScriptedEngine::replying(" Sure thing.");
        let service = Arc::new(EngineService::ready("test-model", engine.clone()));
        let generation = GenerationConfig {
            max_response_tokens: usize::MAX,
            ..GenerationConfig::default()
        };
        let orch = ChatOrchestrator::new(service, &generation);

        let reply = orch
            .respond(&ConversationContext::from_plain::<&str>("hi", &[]))
            .await;
        assert_eq!(reply.response, "Sure thing.");
        assert_eq!(engine.last_request().max_length, usize::MAX);
    }

    #[tokio::test]
    async fn empty_generation_gets_empty_fallback() {
        let orch = orchestrator(ScriptedEngine::replying(""));
        let reply = orch.respond(&ConversationContext::from_plain::<&str>("hi", &[])).await;
        assert_eq!(reply.response, FALLBACK_EMPTY);
    }

    #[tokio::test]
    async fn generic_generation_gets_generic_fallback() {
        let orch = orchestrator(ScriptedEngine::replying("\nAssistant: I understand"));
        let reply = orch.respond(&ConversationContext::from_plain::<&str>("hi", &[])).await;
        assert_eq!(reply.response, FALLBACK_GENERIC);
    }

    #[tokio::test]
    async fn engine_failure_degrades() {
        let engine = ScriptedEngine::failing(EngineError::Generation("out of memory".into()));
        let orch = orchestrator(engine);

        let ctx = ConversationContext::from_plain::<&str>("hi", &[]);
        let fault = orch.try_respond(Uuid::new_v4(), &ctx).await.unwrap_err();
        assert_eq!(fault.kind(), "generation_failure");

        let reply = orch.respond(&ctx).await;
        assert_eq!(reply.response, FALLBACK_DEGRADED);
    }

    #[tokio::test]
    async fn timeout_is_a_generation_failure() {
        let orch = orchestrator(ScriptedEngine::failing(EngineError::Timeout("120s".into())));
        let ctx = ConversationContext::from_plain::<&str>("hi", &[]);
        let fault = orch.try_respond(Uuid::new_v4(), &ctx).await.unwrap_err();
        assert!(matches!(fault, ChatFault::GenerationFailure(_)));
    }

    #[tokio::test]
    async fn uninitialized_engine_degrades() {
        let service = Arc::new(EngineService::new("test-model"));
        let orch = ChatOrchestrator::new(service, &GenerationConfig::default());

        let ctx = ConversationContext::from_plain::<&str>("hi", &[]);
        let fault = orch.try_respond(Uuid::new_v4(), &ctx).await.unwrap_err();
        assert_eq!(fault.kind(), "engine_unavailable");
        assert_eq!(orch.respond(&ctx).await.response, FALLBACK_DEGRADED);
    }

    #[tokio::test]
    async fn loading_engine_degrades() {
        let service = Arc::new(EngineService::new("test-model"));
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let handle = service
            .spawn_load(async move {
                let _ = rx.await;
                Err::<Arc<dyn GenerationEngine>, _>(EngineError::Unavailable("gave up".into()))
            })
            .unwrap();

        let orch = ChatOrchestrator::new(service.clone(), &GenerationConfig::default());
        let ctx = ConversationContext::from_plain::<&str>("hi", &[]);
        let fault = orch.try_respond(Uuid::new_v4(), &ctx).await.unwrap_err();
        assert!(matches!(fault, ChatFault::EngineUnavailable(_)));

        tx.send(()).unwrap();
        handle.await.unwrap();
        assert_eq!(orch.respond(&ctx).await.response, FALLBACK_DEGRADED);
    }

    #[tokio::test]
    async fn degraded_reply_is_timestamped() {
        let before = chrono::Utc::now();
        let orch = orchestrator(ScriptedEngine::failing(EngineError::Network("refused".into())));
        let reply = orch.respond(&ConversationContext::from_plain::<&str>("hi", &[])).await;
        assert!(reply.timestamp >= before);
    }
}
