//! Local inference engine: runs the model directly on this machine.
//!
//! Uses [Candle](https://github.com/huggingface/candle) (Rust-native ML) to run
//! GGUF-quantized language models with zero internet after the first download.
//!
//! Supported model families:
//! - **SmolLM** (135M–1.7B params, Q4 ~80–950 MB), smallest practical models
//! - **TinyLlama** (1.1B params, Q4_K_M ~670 MB)
//! - **Qwen2** (0.5B–1.5B params)
//! - Any llama-architecture `.gguf` file with a `tokenizer.json` beside it
//!
//! # Example
//! ```bash
//! MODEL_NAME=smollm:135m CHATLINE_ENGINE=local chatline serve
//! MODEL_NAME=/path/to/model.gguf CHATLINE_ENGINE=local chatline serve
//! ```

use async_trait::async_trait;
use candle_core::quantized::gguf_file;
use candle_core::{DType, Device, Tensor};
use candle_transformers::generation::LogitsProcessor;
use candle_transformers::models::quantized_llama as qlm;
use chatline_core::engine::{GenerationEngine, GenerationRequest, RawGeneration};
use chatline_core::error::EngineError;
use hf_hub::api::sync::Api;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokenizers::Tokenizer;
use tracing::{debug, info, warn};

/// How many trailing tokens the repetition penalty looks at.
const REPEAT_LAST_N: usize = 64;

// ── Well-known model aliases ───────────────────────────────────────────

/// Model presets: friendly aliases that resolve to HuggingFace repos + filenames.
struct ModelPreset {
    repo: &'static str,
    gguf_file: &'static str,
    tokenizer_repo: &'static str,
}

fn resolve_preset(alias: &str) -> Option<ModelPreset> {
    let alias_lower = alias.to_lowercase();
    match alias_lower.as_str() {
        "tinyllama" | "tiny-llama" | "tinyllama-1.1b" => Some(ModelPreset {
            repo: "TheBloke/TinyLlama-1.1B-Chat-v1.0-GGUF",
            gguf_file: "tinyllama-1.1b-chat-v1.0.Q4_K_M.gguf",
            tokenizer_repo: "TinyLlama/TinyLlama-1.1B-Chat-v1.0",
        }),
        "smollm" | "smollm:135m" | "smollm-135m" => Some(ModelPreset {
            repo: "TheBloke/SmolLM-135M-Instruct-GGUF",
            gguf_file: "smollm-135m-instruct.Q4_K_M.gguf",
            tokenizer_repo: "HuggingFaceTB/SmolLM-135M-Instruct",
        }),
        "smollm:360m" | "smollm-360m" => Some(ModelPreset {
            repo: "TheBloke/SmolLM-360M-Instruct-GGUF",
            gguf_file: "smollm-360m-instruct.Q4_K_M.gguf",
            tokenizer_repo: "HuggingFaceTB/SmolLM-360M-Instruct",
        }),
        "smollm:1.7b" | "smollm-1.7b" => Some(ModelPreset {
            repo: "TheBloke/SmolLM-1.7B-Instruct-GGUF",
            gguf_file: "smollm-1.7b-instruct.Q4_K_M.gguf",
            tokenizer_repo: "HuggingFaceTB/SmolLM-1.7B-Instruct",
        }),
        "qwen:0.5b" | "qwen-0.5b" | "qwen2-0.5b" => Some(ModelPreset {
            repo: "Qwen/Qwen2-0.5B-Instruct-GGUF",
            gguf_file: "qwen2-0_5b-instruct-q4_k_m.gguf",
            tokenizer_repo: "Qwen/Qwen2-0.5B-Instruct",
        }),
        "qwen:1.5b" | "qwen-1.5b" | "qwen2-1.5b" => Some(ModelPreset {
            repo: "Qwen/Qwen2-1.5B-Instruct-GGUF",
            gguf_file: "qwen2-1_5b-instruct-q4_k_m.gguf",
            tokenizer_repo: "Qwen/Qwen2-1.5B-Instruct",
        }),
        _ => None,
    }
}

// ── Local Engine ───────────────────────────────────────────────────────

/// An engine that runs a GGUF-quantized model in-process via Candle.
///
/// The weights carry a KV cache, so a single forward pass owns them at a
/// time: generation is serialized behind a mutex and runs on the blocking
/// pool. Tokenization is read-only and needs no lock.
pub struct LocalEngine {
    model: Arc<Mutex<qlm::ModelWeights>>,
    tokenizer: Arc<Tokenizer>,
    device: Device,
    eos_token_id: u32,
}

impl LocalEngine {
    /// Load a model by preset alias or `.gguf` path (downloads if needed).
    ///
    /// Blocking: call from `spawn_blocking`.
    pub fn load(model_name: &str) -> Result<Self, EngineError> {
        let device = Device::Cpu;

        if Path::new(model_name).exists() && model_name.ends_with(".gguf") {
            return Self::load_from_path(Path::new(model_name), device);
        }

        let preset = resolve_preset(model_name).ok_or_else(|| {
            EngineError::ModelNotFound(format!(
                "Unknown local model '{model_name}'. Available presets: tinyllama, smollm, \
                 smollm:135m, smollm:360m, smollm:1.7b, qwen:0.5b, qwen:1.5b. \
                 Or provide a path to a .gguf file."
            ))
        })?;

        info!(
            model = model_name,
            repo = preset.repo,
            file = preset.gguf_file,
            "Downloading/loading local model"
        );

        // Download via HuggingFace Hub (cached automatically)
        let api = Api::new().map_err(|e| {
            EngineError::Network(format!("Failed to initialize HuggingFace Hub API: {e}"))
        })?;

        let model_path = api
            .model(preset.repo.to_string())
            .get(preset.gguf_file)
            .map_err(|e| {
                EngineError::Network(format!(
                    "Failed to download model '{}' from '{}': {e}",
                    preset.gguf_file, preset.repo
                ))
            })?;

        let tokenizer_path = api
            .model(preset.tokenizer_repo.to_string())
            .get("tokenizer.json")
            .map_err(|e| {
                EngineError::Network(format!(
                    "Failed to download tokenizer from '{}': {e}",
                    preset.tokenizer_repo
                ))
            })?;

        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| EngineError::Unavailable(format!("Failed to load tokenizer: {e}")))?;
        let model = load_weights(&model_path, &device)?;

        Ok(Self::assemble(model, tokenizer, device))
    }

    /// Load from an explicit GGUF file path; expects `tokenizer.json` next to it.
    fn load_from_path(path: &Path, device: Device) -> Result<Self, EngineError> {
        info!(path = %path.display(), "Loading local GGUF model");

        let model = load_weights(path, &device)?;

        let tokenizer_path = path.with_file_name("tokenizer.json");
        if !tokenizer_path.exists() {
            warn!(path = %tokenizer_path.display(), "No tokenizer.json beside GGUF file");
            return Err(EngineError::ModelNotFound(format!(
                "tokenizer.json not found at {}",
                tokenizer_path.display()
            )));
        }
        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| EngineError::Unavailable(format!("Failed to load tokenizer: {e}")))?;

        Ok(Self::assemble(model, tokenizer, device))
    }

    fn assemble(model: qlm::ModelWeights, tokenizer: Tokenizer, device: Device) -> Self {
        let eos_token_id = tokenizer
            .token_to_id("</s>")
            .or_else(|| tokenizer.token_to_id("<|endoftext|>"))
            .or_else(|| tokenizer.token_to_id("<|im_end|>"))
            .or_else(|| tokenizer.token_to_id("<|eot_id|>"))
            .unwrap_or(2); // fallback to common EOS id

        info!(eos_token_id, "Local model loaded successfully");

        Self {
            model: Arc::new(Mutex::new(model)),
            tokenizer: Arc::new(tokenizer),
            device,
            eos_token_id,
        }
    }

    fn encode(tokenizer: &Tokenizer, text: &str) -> Result<Vec<u32>, EngineError> {
        tokenizer
            .encode(text, true)
            .map(|encoding| encoding.get_ids().to_vec())
            .map_err(|e| EngineError::Generation(format!("Tokenization failed: {e}")))
    }
}

fn load_weights(path: &Path, device: &Device) -> Result<qlm::ModelWeights, EngineError> {
    let mut file = std::fs::File::open(path)
        .map_err(|e| EngineError::Unavailable(format!("Failed to open model file: {e}")))?;

    let gguf = gguf_file::Content::read(&mut file)
        .map_err(|e| EngineError::Unavailable(format!("Failed to parse GGUF file: {e}")))?;

    qlm::ModelWeights::from_gguf(gguf, &mut file, device)
        .map_err(|e| EngineError::Unavailable(format!("Failed to load model weights: {e}")))
}

/// Everything one generation call needs on the blocking thread.
struct GenerationJob {
    model: Arc<Mutex<qlm::ModelWeights>>,
    tokenizer: Arc<Tokenizer>,
    device: Device,
    eos_token_id: u32,
    request: GenerationRequest,
}

impl GenerationJob {
    /// Run inference: tokenize → sample until EOS or `max_length` → decode.
    fn run(self) -> Result<RawGeneration, EngineError> {
        let prompt_tokens = LocalEngine::encode(&self.tokenizer, &self.request.prompt)?;
        let max_new_tokens = self.request.new_token_budget(prompt_tokens.len());
        let sampling = self.request.sampling;

        debug!(
            prompt_tokens = prompt_tokens.len(),
            max_new_tokens,
            temperature = sampling.temperature,
            "Starting local generation"
        );

        let temperature = (sampling.temperature > 0.0).then_some(f64::from(sampling.temperature));
        let mut logits_processor = LogitsProcessor::new(sampling.seed, temperature, None);

        let mut model = self.model.lock().unwrap_or_else(|e| e.into_inner());
        let mut all_tokens = prompt_tokens.clone();
        let mut generated: Vec<u32> = Vec::new();
        let mut input = Tensor::new(prompt_tokens.as_slice(), &self.device)
            .and_then(|t| t.unsqueeze(0))
            .map_err(map_candle_err)?;
        let mut index_pos = 0;

        for _ in 0..max_new_tokens {
            let seq_len = input.dim(1).map_err(map_candle_err)?;
            let logits = model
                .forward(&input, index_pos)
                .and_then(|l| l.squeeze(0))
                .and_then(|l| l.to_dtype(DType::F32))
                .map_err(map_candle_err)?;
            index_pos += seq_len;

            let logits = if (sampling.repetition_penalty - 1.0).abs() < f32::EPSILON {
                logits
            } else {
                let start = all_tokens.len().saturating_sub(REPEAT_LAST_N);
                candle_transformers::utils::apply_repeat_penalty(
                    &logits,
                    sampling.repetition_penalty,
                    &all_tokens[start..],
                )
                .map_err(map_candle_err)?
            };

            let next_token = logits_processor.sample(&logits).map_err(map_candle_err)?;
            if next_token == self.eos_token_id {
                break;
            }

            generated.push(next_token);
            all_tokens.push(next_token);

            input = Tensor::new(&[next_token][..], &self.device)
                .and_then(|t| t.unsqueeze(0))
                .map_err(map_candle_err)?;
        }
        drop(model);

        let continuation = self
            .tokenizer
            .decode(&generated, true)
            .map_err(|e| EngineError::Generation(format!("Detokenization failed: {e}")))?;

        debug!(
            completion_tokens = generated.len(),
            output_len = continuation.len(),
            "Generation complete"
        );

        Ok(RawGeneration::from_continuation(
            &self.request.prompt,
            &continuation,
        ))
    }
}

/// Map Candle errors to EngineError.
fn map_candle_err(e: candle_core::Error) -> EngineError {
    EngineError::Generation(format!("Candle inference error: {e}"))
}

// ── Engine trait implementation ────────────────────────────────────────

#[async_trait]
impl GenerationEngine for LocalEngine {
    fn name(&self) -> &str {
        "local"
    }

    fn count_tokens(&self, prompt: &str) -> Result<usize, EngineError> {
        Self::encode(&self.tokenizer, prompt).map(|ids| ids.len())
    }

    async fn generate(&self, request: GenerationRequest) -> Result<RawGeneration, EngineError> {
        let job = GenerationJob {
            model: self.model.clone(),
            tokenizer: self.tokenizer.clone(),
            device: self.device.clone(),
            eos_token_id: self.eos_token_id,
            request,
        };

        // Candle is CPU-bound; keep it off the async workers.
        tokio::task::spawn_blocking(move || job.run())
            .await
            .map_err(|e| EngineError::Generation(format!("Inference task panicked: {e}")))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_preset_aliases() {
        assert!(resolve_preset("tinyllama").is_some());
        assert!(resolve_preset("TinyLlama").is_some());
        assert!(resolve_preset("smollm:135m").is_some());
        assert!(resolve_preset("qwen:0.5b").is_some());
        assert!(resolve_preset("nonexistent").is_none());
    }

    #[test]
    fn unknown_model_is_model_not_found() {
        let err = LocalEngine::load("definitely-not-a-model").err().unwrap();
        assert!(matches!(err, EngineError::ModelNotFound(_)));
    }

    #[test]
    fn corrupt_gguf_is_rejected() {
        let dir = std::env::temp_dir().join("chatline-local-engine-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("broken.gguf");
        std::fs::write(&path, b"not a gguf file").unwrap();

        let err = LocalEngine::load(path.to_str().unwrap()).err().unwrap();
        assert!(matches!(err, EngineError::Unavailable(_)));
    }
}
