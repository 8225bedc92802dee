//! Configuration loading, validation, and management for voxagent.
//!
//! Loads configuration from `~/.voxagent/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use voxagent_core::SamplingOptions;

/// Directive placed at the head of every session.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful, knowledgeable AI assistant speaking through voice.

Rules:
- Always answer directly and clearly
- 2–5 sentences unless more detail is requested
- Be conversational but informative
- Never respond with only a follow-up question
- If unsure, say so honestly

If the user greets you, greet them back warmly.
Always give useful information first.";

/// The root configuration structure.
///
/// Maps directly to `~/.voxagent/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Language model backend and sampling
    #[serde(default)]
    pub model: ModelConfig,

    /// Dispatch loop and session settings
    #[serde(default)]
    pub agent: AgentConfig,

    /// Built-in tool settings
    #[serde(default)]
    pub tools: ToolsConfig,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Backend: "ollama", "openai", "openrouter" or "custom"
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Model name passed to the backend
    #[serde(default = "default_model")]
    pub name: String,

    /// Override the backend's base URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// API key for hosted backends
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_top_p")]
    pub top_p: f32,

    #[serde(default = "default_num_ctx")]
    pub num_ctx: u32,

    #[serde(default = "default_num_predict")]
    pub num_predict: u32,

    #[serde(default = "default_repeat_penalty")]
    pub repeat_penalty: f32,
}

fn default_provider() -> String {
    "ollama".into()
}
fn default_model() -> String {
    "llama3.2:3b".into()
}
fn default_temperature() -> f32 {
    0.6
}
fn default_top_p() -> f32 {
    0.9
}
fn default_num_ctx() -> u32 {
    2048
}
fn default_num_predict() -> u32 {
    256
}
fn default_repeat_penalty() -> f32 {
    1.15
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for ModelConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelConfig")
            .field("provider", &self.provider)
            .field("name", &self.name)
            .field("base_url", &self.base_url)
            .field("api_key", &redact(&self.api_key))
            .field("temperature", &self.temperature)
            .field("top_p", &self.top_p)
            .field("num_ctx", &self.num_ctx)
            .field("num_predict", &self.num_predict)
            .field("repeat_penalty", &self.repeat_penalty)
            .finish()
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            name: default_model(),
            base_url: None,
            api_key: None,
            temperature: default_temperature(),
            top_p: default_top_p(),
            num_ctx: default_num_ctx(),
            num_predict: default_num_predict(),
            repeat_penalty: default_repeat_penalty(),
        }
    }
}

impl ModelConfig {
    /// Sampling parameters in the shape providers consume.
    pub fn sampling(&self) -> SamplingOptions {
        SamplingOptions {
            temperature: self.temperature,
            top_p: self.top_p,
            num_ctx: Some(self.num_ctx),
            num_predict: Some(self.num_predict),
            repeat_penalty: Some(self.repeat_penalty),
        }
    }
}

/// What a second turn on a busy session does.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BusyPolicy {
    /// Queue behind the in-flight turn
    #[default]
    Wait,
    /// Fail immediately with a busy error
    Reject,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Directive at the head of every session
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    /// Maximum reasoning phases per turn
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Messages kept after the directive once a turn completes
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,

    #[serde(default = "default_model_timeout_secs")]
    pub model_timeout_secs: u64,

    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,

    #[serde(default)]
    pub busy_policy: BusyPolicy,
}

fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.into()
}
fn default_max_iterations() -> u32 {
    10
}
fn default_history_limit() -> usize {
    voxagent_core::DEFAULT_HISTORY_LIMIT
}
fn default_model_timeout_secs() -> u64 {
    120
}
fn default_tool_timeout_secs() -> u64 {
    20
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            system_prompt: default_system_prompt(),
            max_iterations: default_max_iterations(),
            history_limit: default_history_limit(),
            model_timeout_secs: default_model_timeout_secs(),
            tool_timeout_secs: default_tool_timeout_secs(),
            busy_policy: BusyPolicy::default(),
        }
    }
}

impl AgentConfig {
    pub fn model_timeout(&self) -> Duration {
        Duration::from_secs(self.model_timeout_secs)
    }

    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolsConfig {
    #[serde(default)]
    pub web_search: WebSearchConfig,

    #[serde(default)]
    pub wikipedia: WikipediaConfig,
}

impl ToolsConfig {
    /// Largest output any enabled tool may produce.
    pub fn max_output_chars(&self) -> usize {
        self.web_search.max_chars.max(self.wikipedia.max_chars)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebSearchConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_search_max_chars")]
    pub max_chars: usize,
}

fn default_true() -> bool {
    true
}
fn default_search_max_chars() -> usize {
    500
}

impl Default for WebSearchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_chars: default_search_max_chars(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WikipediaConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Cap on the text handed back to the model
    #[serde(default = "default_wikipedia_max_chars")]
    pub max_chars: usize,

    /// Cap on each page summary before formatting
    #[serde(default = "default_doc_content_chars_max")]
    pub doc_content_chars_max: usize,

    #[serde(default = "default_top_k_results")]
    pub top_k_results: usize,

    #[serde(default = "default_language")]
    pub language: String,
}

fn default_wikipedia_max_chars() -> usize {
    800
}
fn default_doc_content_chars_max() -> usize {
    1000
}
fn default_top_k_results() -> usize {
    1
}
fn default_language() -> String {
    "en".into()
}

impl Default for WikipediaConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_chars: default_wikipedia_max_chars(),
            doc_content_chars_max: default_doc_content_chars_max(),
            top_k_results: default_top_k_results(),
            language: default_language(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path, applying env var overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
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

        config.validate()?;
        Ok(config)
    }

    /// Apply `VOXAGENT_*` overrides using the given variable lookup.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.model.api_key.is_none() {
            self.model.api_key = lookup("VOXAGENT_API_KEY")
                .or_else(|| lookup("OPENROUTER_API_KEY"))
                .or_else(|| lookup("OPENAI_API_KEY"));
        }

        if let Some(provider) = lookup("VOXAGENT_PROVIDER") {
            self.model.provider = provider;
        }

        if let Some(model) = lookup("VOXAGENT_MODEL") {
            self.model.name = model;
        }

        if let Some(base_url) = lookup("VOXAGENT_BASE_URL") {
            self.model.base_url = Some(base_url);
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".voxagent")
    }

    /// Get the configuration file path.
    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.model.temperature) {
            return Err(ConfigError::ValidationError(
                "model.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.model.top_p <= 0.0 || self.model.top_p > 1.0 {
            return Err(ConfigError::ValidationError(
                "model.top_p must be in (0.0, 1.0]".into(),
            ));
        }

        if self.agent.max_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_iterations must be at least 1".into(),
            ));
        }

        if self.agent.history_limit < 2 || self.agent.history_limit % 2 != 0 {
            return Err(ConfigError::ValidationError(
                "agent.history_limit must be an even number >= 2".into(),
            ));
        }

        if self.agent.model_timeout_secs == 0 || self.agent.tool_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "agent timeouts must be greater than zero".into(),
            ));
        }

        if self.agent.system_prompt.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "agent.system_prompt must not be empty".into(),
            ));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.model.api_key.is_some()
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
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

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
