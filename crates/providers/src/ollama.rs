//! Native Ollama provider (`/api/chat`).
//!
//! Uses the native endpoint rather than the OpenAI shim so the full sampling
//! profile (`num_ctx`, `num_predict`, `repeat_penalty`) reaches the model.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};
use voxagent_core::error::ProviderError;
use voxagent_core::message::{Message, ToolCall};
use voxagent_core::provider::*;

use crate::{http_client, status_error, synthesize_call_id};

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

pub struct OllamaProvider {
    base_url: String,
    client: reqwest::Client,
}

impl OllamaProvider {
    pub fn new(base_url: Option<&str>) -> Self {
        Self {
            base_url: base_url
                .unwrap_or(DEFAULT_OLLAMA_URL)
                .trim_end_matches('/')
                .to_string(),
            client: http_client(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn convert_messages(messages: &[Message]) -> Vec<OllamaMessage> {
        // Ollama identifies tool results by tool name, not call id.
        let mut call_names: HashMap<&str, &str> = HashMap::new();

        messages
            .iter()
            .map(|m| match m {
                Message::System { content } | Message::User { content } => OllamaMessage {
                    role: m.role().into(),
                    content: content.clone(),
                    tool_calls: None,
                    tool_name: None,
                },
                Message::Assistant {
                    content,
                    tool_calls,
                } => {
                    for tc in tool_calls {
                        call_names.insert(&tc.id, &tc.name);
                    }
                    OllamaMessage {
                        role: "assistant".into(),
                        content: content.clone(),
                        tool_calls: (!tool_calls.is_empty()).then(|| {
                            tool_calls
                                .iter()
                                .map(|tc| OllamaToolCall {
                                    function: OllamaFunction {
                                        name: tc.name.clone(),
                                        arguments: tc.arguments.clone(),
                                    },
                                })
                                .collect()
                        }),
                        tool_name: None,
                    }
                }
                Message::ToolResult {
                    tool_call_id,
                    content,
                } => OllamaMessage {
                    role: "tool".into(),
                    content: content.clone(),
                    tool_calls: None,
                    tool_name: call_names.get(tool_call_id.as_str()).map(|n| n.to_string()),
                },
            })
            .collect()
    }

    fn convert_tools(tools: &[ToolDefinition]) -> Vec<OllamaTool> {
        tools
            .iter()
            .map(|t| OllamaTool {
                r#type: "function".into(),
                function: OllamaToolFunction {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: t.parameters.clone(),
                },
            })
            .collect()
    }

    fn build_request(request: &ProviderRequest) -> OllamaRequest {
        let sampling = &request.sampling;
        OllamaRequest {
            model: request.model.clone(),
            messages: Self::convert_messages(&request.messages),
            tools: (!request.tools.is_empty()).then(|| Self::convert_tools(&request.tools)),
            stream: false,
            options: OllamaOptions {
                temperature: sampling.temperature,
                top_p: sampling.top_p,
                num_ctx: sampling.num_ctx,
                num_predict: sampling.num_predict,
                repeat_penalty: sampling.repeat_penalty,
            },
        }
    }

    fn into_provider_response(response: OllamaResponse) -> ProviderResponse {
        let tool_calls = response
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|tc| ToolCall {
                id: synthesize_call_id(),
                name: tc.function.name,
                arguments: normalize_arguments(tc.function.arguments),
            })
            .collect();

        let usage = match (response.prompt_eval_count, response.eval_count) {
            (Some(prompt), Some(completion)) => Some(Usage {
                prompt_tokens: prompt,
                completion_tokens: completion,
                total_tokens: prompt.saturating_add(completion),
            }),
            _ => None,
        };

        ProviderResponse {
            content: response.message.content.unwrap_or_default(),
            tool_calls,
            usage,
            model: response.model,
        }
    }
}

/// Some models emit arguments as a JSON-encoded string instead of an object.
fn normalize_arguments(arguments: serde_json::Value) -> serde_json::Value {
    match arguments {
        serde_json::Value::String(raw) => {
            serde_json::from_str(&raw).unwrap_or_else(|_| serde_json::json!({ "_raw": raw }))
        }
        serde_json::Value::Null => serde_json::json!({}),
        other => other,
    }
}

#[async_trait]
impl Provider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let url = format!("{}/api/chat", self.base_url);
        let body = Self::build_request(&request);

        debug!(model = %request.model, messages = request.messages.len(), "Sending Ollama chat request");

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Ollama returned error");
            return Err(status_error(status, error_body));
        }

        let parsed: OllamaResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::MalformedResponse(format!("Failed to parse response: {e}")))?;

        Ok(Self::into_provider_response(parsed))
    }

    async fn health_check(&self) -> Result<bool, ProviderError> {
        let response = self
            .client
            .get(format!("{}/api/tags", self.base_url))
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;
        Ok(response.status().is_success())
    }
}

// --- Ollama API types (internal) ---

#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<OllamaTool>>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaMessage {
    role: String,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<OllamaToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct OllamaToolCall {
    function: OllamaFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct OllamaFunction {
    name: String,
    #[serde(default)]
    arguments: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct OllamaTool {
    r#type: String,
    function: OllamaToolFunction,
}

#[derive(Debug, Serialize)]
struct OllamaToolFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
    top_p: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_ctx: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    repeat_penalty: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    #[serde(default)]
    model: String,
    message: OllamaResponseMessage,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct OllamaResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<OllamaToolCall>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_base_url() {
        let provider = OllamaProvider::new(None);
        assert_eq!(provider.base_url(), "http://localhost:11434");
        assert_eq!(provider.name(), "ollama");
    }

    #[test]
    fn request_carries_sampling_options() {
        let request = ProviderRequest {
            model: "llama3.2:3b".into(),
            messages: vec![Message::system("be brief"), Message::user("hi")],
            tools: vec![],
            sampling: SamplingOptions::default(),
        };
        let json = serde_json::to_value(OllamaProvider::build_request(&request)).unwrap();
        assert_eq!(json["stream"], false);
        assert_eq!(json["options"]["num_ctx"], 2048);
        assert_eq!(json["options"]["num_predict"], 256);
        assert!(json.get("tools").is_none());
        assert_eq!(json["messages"][0]["role"], "system");
    }

    #[test]
    fn tool_results_carry_tool_name() {
        let messages = vec![
            Message::user("weather?"),
            Message::assistant_with_tool_calls(
                "",
                vec![ToolCall::new("call_1", "web_search", serde_json::json!({"query": "weather"}))],
            ),
            Message::tool_result("call_1", "Sunny"),
        ];
        let converted = OllamaProvider::convert_messages(&messages);
        assert_eq!(converted[1].tool_calls.as_ref().unwrap()[0].function.name, "web_search");
        assert_eq!(converted[2].role, "tool");
        assert_eq!(converted[2].tool_name.as_deref(), Some("web_search"));
    }

    #[test]
    fn parse_tool_call_response() {
        let data = r#"{
            "model": "llama3.2:3b",
            "message": {"role": "assistant", "content": "",
                "tool_calls": [{"function": {"name": "wikipedia_search", "arguments": {"query": "Ada Lovelace"}}}]},
            "done": true,
            "prompt_eval_count": 30,
            "eval_count": 12
        }"#;
        let parsed: OllamaResponse = serde_json::from_str(data).unwrap();
        let response = OllamaProvider::into_provider_response(parsed);
        assert!(response.has_tool_calls());
        assert_eq!(response.tool_calls[0].name, "wikipedia_search");
        assert_eq!(response.tool_calls[0].arguments["query"], "Ada Lovelace");
        assert!(response.tool_calls[0].id.starts_with("call_"));
        assert_eq!(response.usage.unwrap().total_tokens, 42);
    }

    #[test]
    fn parse_text_response() {
        let data = r#"{"model":"llama3.2:3b","message":{"role":"assistant","content":"Hello there!"},"done":true}"#;
        let parsed: OllamaResponse = serde_json::from_str(data).unwrap();
        let response = OllamaProvider::into_provider_response(parsed);
        assert_eq!(response.content, "Hello there!");
        assert!(!response.has_tool_calls());
        assert!(response.usage.is_none());
    }

    #[test]
    fn usage_total_saturates() {
        let data = format!(
            r#"{{"model":"m","message":{{"role":"assistant","content":"hi"}},"done":true,"prompt_eval_count":{},"eval_count":7}}"#,
            u32::MAX
        );
        let parsed: OllamaResponse = serde_json::from_str(&data).unwrap();
        let usage = OllamaProvider::into_provider_response(parsed).usage.unwrap();
        assert_eq!(usage.completion_tokens, 7);
        assert_eq!(usage.total_tokens, u32::MAX);
    }

    #[test]
    fn string_arguments_are_decoded() {
        assert_eq!(
            normalize_arguments(serde_json::json!(r#"{"query":"x"}"#)),
            serde_json::json!({"query": "x"})
        );
        assert_eq!(normalize_arguments(serde_json::Value::Null), serde_json::json!({}));
    }
}
