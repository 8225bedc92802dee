//! Provider trait: the model invocation adapter.
//!
//! A Provider takes an ordered message history plus the declared tool
//! schemas and returns one assistant turn: either terminal text or a list
//! of requested tool invocations.
//!
//! Implementations: Ollama (native API), OpenAI-compatible endpoints.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::message::{Message, ToolCall};

/// Sampling parameters forwarded to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplingOptions {
    /// Temperature (0.0 = deterministic)
    pub temperature: f32,

    /// Nucleus sampling cutoff
    pub top_p: f32,

    /// Context window size (honoured by backends that accept it)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_ctx: Option<u32>,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_predict: Option<u32>,

    /// Repetition penalty (honoured by backends that accept it)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeat_penalty: Option<f32>,
}

impl Default for SamplingOptions {
    fn default() -> Self {
        Self {
            temperature: 0.6,
            top_p: 0.9,
            num_ctx: Some(2048),
            num_predict: Some(256),
            repeat_penalty: Some(1.15),
        }
    }
}

/// A single model invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRequest {
    /// The model to use (e.g., "llama3.2:3b", "gpt-4o-mini")
    pub model: String,

    /// The full ordered history, directive first
    pub messages: Vec<Message>,

    /// Available tools the model can call
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,

    #[serde(default)]
    pub sampling: SamplingOptions,
}

/// A tool definition sent to the LLM so it knows what tools it can call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// The tool name
    pub name: String,

    /// Description of what the tool does
    pub description: String,

    /// JSON Schema describing the tool's parameters
    pub parameters: serde_json::Value,
}

/// Token usage information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// One assistant turn returned by a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderResponse {
    /// Text content (may be empty when tools are requested)
    pub content: String,

    /// Requested tool invocations, in declared order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,

    /// Token usage statistics
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,

    /// Which model actually responded
    pub model: String,
}

impl ProviderResponse {
    /// A terminal text response.
    pub fn text(content: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            tool_calls: Vec::new(),
            usage: None,
            model: model.into(),
        }
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }

    /// Convert into the assistant message appended to history.
    pub fn into_message(self) -> Message {
        Message::assistant_with_tool_calls(self.content, self.tool_calls)
    }
}

/// The core Provider trait.
///
/// The dispatch loop calls `complete()` without knowing which backend is
/// behind it. Failures are terminal for the current turn.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g., "ollama").
    fn name(&self) -> &str;

    /// Send a request and get one complete assistant turn.
    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError>;

    /// Health check: can we reach the provider?
    async fn health_check(&self) -> Result<bool, ProviderError> {
        Ok(true)
    }
}
