//! Configuration loading, validation, and management for Chatline.
//!
//! Loads configuration from `~/.chatline/config.toml` (or the file named by
//! `CHATLINE_CONFIG`) with environment variable overrides. Validates all
//! settings at startup.

use chatline_core::engine::SamplingParams;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.chatline/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Generation engine selection
    #[serde(default)]
    pub engine: EngineConfig,

    /// Prompt and sampling limits
    #[serde(default)]
    pub generation: GenerationConfig,

    /// HTTP gateway configuration
    #[serde(default)]
    pub gateway: GatewayConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineBackend {
    /// A text-generation-inference server reached over HTTP
    Remote,
    /// In-process Candle inference (requires the `local` feature)
    Local,
}

impl std::str::FromStr for EngineBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "remote" => Ok(Self::Remote),
            "local" => Ok(Self::Local),
            other => Err(ConfigError::ValidationError(format!(
                "unknown engine backend '{other}' (expected 'remote' or 'local')"
            ))),
        }
    }
}

impl std::fmt::Display for EngineBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Remote => write!(f, "remote"),
            Self::Local => write!(f, "local"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_backend")]
    pub backend: EngineBackend,

    /// Model preset, HuggingFace repo, or path to a `.gguf` file
    #[serde(default = "default_model")]
    pub model: String,

    /// Base URL of the remote generation server
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_backend() -> EngineBackend {
    EngineBackend::Remote
}
fn default_model() -> String {
    "smollm:135m".into()
}
fn default_endpoint() -> String {
    "http://127.0.0.1:8080".into()
}
fn default_request_timeout() -> u64 {
    120
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            model: default_model(),
            endpoint: default_endpoint(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Maximum prompt length in characters; longer prompts are cut
    #[serde(default = "default_max_input_length")]
    pub max_input_length: usize,

    /// Tokens the engine may add on top of the prompt
    #[serde(default = "default_max_response_tokens")]
    pub max_response_tokens: usize,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_repetition_penalty")]
    pub repetition_penalty: f32,

    #[serde(default = "default_seed")]
    pub seed: u64,
}

fn default_max_input_length() -> usize {
    500
}
fn default_max_response_tokens() -> usize {
    30
}
fn default_temperature() -> f32 {
    0.8
}
fn default_repetition_penalty() -> f32 {
    1.1
}
fn default_seed() -> u64 {
    42
}

impl GenerationConfig {
    /// The fixed sampling parameters every request is generated with.
    pub fn sampling(&self) -> SamplingParams {
        SamplingParams {
            temperature: self.temperature,
            repetition_penalty: self.repetition_penalty,
            seed: self.seed,
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_input_length: default_max_input_length(),
            max_response_tokens: default_max_response_tokens(),
            temperature: default_temperature(),
            repetition_penalty: default_repetition_penalty(),
            seed: default_seed(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    /// Origins allowed by CORS
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,

    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

fn default_port() -> u16 {
    8000
}
fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_allowed_origins() -> Vec<String> {
    vec![
        "http://localhost:3000".into(),
        "http://127.0.0.1:3000".into(),
    ]
}
fn default_body_limit() -> usize {
    64 * 1024
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            allowed_origins: default_allowed_origins(),
            body_limit_bytes: default_body_limit(),
        }
    }
}

/// Shortest `max_input_length` that still fits the `"User: "` prefix.
const MIN_INPUT_LENGTH: usize = "User: ".len();

/// Upper bound on `max_response_tokens`.
pub const MAX_RESPONSE_TOKENS: usize = 4096;

impl AppConfig {
    /// Load configuration from `CHATLINE_CONFIG` or the default path, then
    /// apply environment variable overrides:
    /// - `MODEL_NAME`, `MAX_INPUT_LENGTH`, `MAX_RESPONSE_TOKENS`, `TEMPERATURE`
    /// - `API_HOST`, `API_PORT`, `ALLOWED_ORIGINS` (comma separated)
    /// - `CHATLINE_ENGINE`, `CHATLINE_ENGINE_URL`
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::load_from(&Self::active_path())?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    ///
    /// Not validated: `load` validates once, after environment overrides.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        Ok(config)
    }

    /// Apply overrides from a key lookup (the process environment in `load`).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(model) = lookup("MODEL_NAME") {
            self.engine.model = model;
        }
        if let Some(backend) = lookup("CHATLINE_ENGINE") {
            self.engine.backend = backend.parse()?;
        }
        if let Some(url) = lookup("CHATLINE_ENGINE_URL") {
            self.engine.endpoint = url;
        }
        if let Some(v) = lookup("MAX_INPUT_LENGTH") {
            self.generation.max_input_length = parse_override("MAX_INPUT_LENGTH", &v)?;
        }
        if let Some(v) = lookup("MAX_RESPONSE_TOKENS") {
            self.generation.max_response_tokens = parse_override("MAX_RESPONSE_TOKENS", &v)?;
        }
        if let Some(v) = lookup("TEMPERATURE") {
            self.generation.temperature = parse_override("TEMPERATURE", &v)?;
        }
        if let Some(host) = lookup("API_HOST") {
            self.gateway.host = host;
        }
        if let Some(v) = lookup("API_PORT") {
            self.gateway.port = parse_override("API_PORT", &v)?;
        }
        if let Some(origins) = lookup("ALLOWED_ORIGINS") {
            self.gateway.allowed_origins = origins
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(String::from)
                .collect();
        }
        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".chatline")
    }

    /// Default configuration file path.
    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// The file `load` reads: `CHATLINE_CONFIG` if set, else [`Self::config_path`].
    pub fn active_path() -> PathBuf {
        std::env::var("CHATLINE_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| Self::config_path())
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let generation = &self.generation;
        if !(0.0..=2.0).contains(&generation.temperature) {
            return Err(ConfigError::ValidationError(
                "temperature must be between 0.0 and 2.0".into(),
            ));
        }

        let penalty = generation.repetition_penalty;
        if !(penalty > 0.0 && penalty.is_finite()) {
            return Err(ConfigError::ValidationError(
                "repetition_penalty must be a finite number > 0".into(),
            ));
        }

        if generation.max_input_length < MIN_INPUT_LENGTH {
            return Err(ConfigError::ValidationError(format!(
                "max_input_length must be at least {MIN_INPUT_LENGTH}"
            )));
        }

        if !(1..=MAX_RESPONSE_TOKENS).contains(&generation.max_response_tokens) {
            return Err(ConfigError::ValidationError(format!(
                "max_response_tokens must be between 1 and {MAX_RESPONSE_TOKENS}"
            )));
        }

        if self.engine.model.trim().is_empty() {
            return Err(ConfigError::ValidationError("engine.model is empty".into()));
        }

        Ok(())
    }

    /// Generate a default config TOML string (for the `init` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

fn parse_override<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Invalid value for {key}: '{value}'")]
    InvalidOverride { key: String, value: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
