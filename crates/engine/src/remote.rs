//! Remote engine backed by a text-generation-inference server.
//!
//! Works with: HuggingFace text-generation-inference and any server exposing
//! the same `POST /generate` + `GET /health` surface.
//!
//! The server is asked for the full text (`return_full_text`), so the
//! returned string already carries the prompt as a prefix. Servers that
//! ignore the flag get the prefix restored here.

use async_trait::async_trait;
use chatline_core::engine::{GenerationEngine, GenerationRequest, RawGeneration};
use chatline_core::error::EngineError;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// An engine that forwards generation to an HTTP inference server.
///
/// Reentrant: concurrent requests share one connection pool.
pub struct RemoteEngine {
    base_url: String,
    client: reqwest::Client,
}

impl RemoteEngine {
    /// Create a new remote engine for `base_url`.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, EngineError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EngineError::Unavailable(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Check that the server is up and has its model loaded.
    pub async fn probe(&self) -> Result<(), EngineError> {
        let url = format!("{}/health", self.base_url);
        let response = self.client.get(&url).send().await.map_err(map_reqwest_err)?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(EngineError::Unavailable(format!(
                "Generation server at {} is not healthy (status: {})",
                self.base_url,
                response.status()
            )))
        }
    }

    fn to_api_request(request: &GenerationRequest, max_new_tokens: usize) -> ApiGenerateRequest<'_> {
        let sampling = request.sampling;
        let do_sample = sampling.temperature > 0.0;
        ApiGenerateRequest {
            inputs: &request.prompt,
            parameters: ApiParameters {
                max_new_tokens: max_new_tokens.max(1),
                temperature: do_sample.then_some(sampling.temperature),
                repetition_penalty: sampling.repetition_penalty,
                do_sample,
                return_full_text: true,
                seed: sampling.seed,
            },
        }
    }
}

#[async_trait]
impl GenerationEngine for RemoteEngine {
    fn name(&self) -> &str {
        "remote"
    }

    async fn generate(&self, request: GenerationRequest) -> Result<RawGeneration, EngineError> {
        let url = format!("{}/generate", self.base_url);
        let prompt_tokens = self.count_tokens(&request.prompt)?;
        let max_new_tokens = request.new_token_budget(prompt_tokens);
        let body = Self::to_api_request(&request, max_new_tokens);

        debug!(url = %url, max_new_tokens, "Sending generation request");

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(map_reqwest_err)?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status = %status, body = %error_body, "Generation server returned an error");
            return Err(EngineError::Generation(format!(
                "server returned {status}: {error_body}"
            )));
        }

        let api: ApiGenerateResponse = response
            .json()
            .await
            .map_err(|e| EngineError::Generation(format!("Failed to parse response: {e}")))?;

        if api.generated_text.starts_with(&request.prompt) {
            Ok(RawGeneration::new(api.generated_text))
        } else {
            Ok(RawGeneration::from_continuation(
                &request.prompt,
                &api.generated_text,
            ))
        }
    }
}

fn map_reqwest_err(e: reqwest::Error) -> EngineError {
    if e.is_timeout() {
        EngineError::Timeout(e.to_string())
    } else {
        EngineError::Network(e.to_string())
    }
}

// ── API types ─────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ApiGenerateRequest<'a> {
    inputs: &'a str,
    parameters: ApiParameters,
}

#[derive(Debug, Serialize)]
struct ApiParameters {
    max_new_tokens: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    repetition_penalty: f32,
    do_sample: bool,
    return_full_text: bool,
    seed: u64,
}

#[derive(Debug, Deserialize)]
struct ApiGenerateResponse {
    generated_text: String,
}
