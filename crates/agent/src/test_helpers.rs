//! Shared test helpers: scripted providers and stub tools.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::Notify;
use voxagent_core::error::{ProviderError, ToolError};
use voxagent_core::message::{Message, ToolCall};
use voxagent_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use voxagent_core::tool::Tool;

/// A mock provider that returns a sequence of scripted responses.
///
/// Each call to `complete` returns the next response in the queue.
/// Panics if more calls are made than responses provided.
pub struct SequentialMockProvider {
    responses: Mutex<Vec<Result<ProviderResponse, ProviderError>>>,
    call_count: Mutex<usize>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl SequentialMockProvider {
    pub fn new(responses: Vec<ProviderResponse>) -> Self {
        Self::scripted(responses.into_iter().map(Ok).collect())
    }

    /// Like `new`, but individual calls may fail.
    pub fn scripted(responses: Vec<Result<ProviderResponse, ProviderError>>) -> Self {
        Self {
            responses: Mutex::new(responses),
            call_count: Mutex::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Create a provider that returns a single text response (no tool calls).
    pub fn single_text(text: &str) -> Self {
        Self::new(vec![make_text_response(text)])
    }

    /// Create a provider that first returns tool calls, then a final answer.
    pub fn tool_then_answer(tool_calls: Vec<ToolCall>, thought: &str, answer: &str) -> Self {
        Self::new(vec![
            make_tool_call_response(tool_calls, thought),
            make_text_response(answer),
        ])
    }

    pub fn call_count(&self) -> usize {
        *self.call_count.lock().unwrap()
    }

    /// Messages sent on the `n`th call (0-based).
    pub fn request_messages(&self, n: usize) -> Vec<Message> {
        self.requests.lock().unwrap()[n].messages.clone()
    }
}

#[async_trait::async_trait]
impl Provider for SequentialMockProvider {
    fn name(&self) -> &str {
        "sequential_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let mut count = self.call_count.lock().unwrap();
        let responses = self.responses.lock().unwrap();

        if *count >= responses.len() {
            panic!(
                "SequentialMockProvider: no more responses (call #{}, have {})",
                *count,
                responses.len()
            );
        }

        self.requests.lock().unwrap().push(request);
        let response = responses[*count].clone();
        *count += 1;
        response
    }
}

/// A provider that requests the same tool on every call.
pub struct AlwaysToolProvider {
    tool_name: String,
    calls: AtomicUsize,
}

impl AlwaysToolProvider {
    pub fn new(tool_name: &str) -> Self {
        Self {
            tool_name: tool_name.into(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Provider for AlwaysToolProvider {
    fn name(&self) -> &str {
        "always_tool"
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(make_tool_call_response(
            vec![ToolCall::new(
                format!("call_{n}"),
                &self.tool_name,
                serde_json::json!({"query": "again"}),
            )],
            "",
        ))
    }
}

/// A provider that parks every call until released.
///
/// `entered` is signalled once a call is in flight; each `release`
/// lets one call return `reply`.
pub struct GatedProvider {
    pub entered: Notify,
    pub release: Notify,
    reply: String,
}

impl GatedProvider {
    pub fn new(reply: &str) -> Self {
        Self {
            entered: Notify::new(),
            release: Notify::new(),
            reply: reply.into(),
        }
    }
}

#[async_trait::async_trait]
impl Provider for GatedProvider {
    fn name(&self) -> &str {
        "gated"
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok(make_text_response(&self.reply))
    }
}

/// A provider that answers with the last user message after a delay.
pub struct EchoProvider {
    pub delay: Duration,
}

#[async_trait::async_trait]
impl Provider for EchoProvider {
    fn name(&self) -> &str {
        "echo"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        tokio::time::sleep(self.delay).await;
        let last_user = request
            .messages
            .iter()
            .rev()
            .find(|m| matches!(m, Message::User { .. }))
            .map(|m| m.content().to_string())
            .unwrap_or_default();
        Ok(make_text_response(&format!("echo: {last_user}")))
    }
}

/// Create a simple text response (no tool calls).
pub fn make_text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        content: text.into(),
        tool_calls: vec![],
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "mock-model".into(),
    }
}

/// Create a response with tool calls and optional thought content.
pub fn make_tool_call_response(tool_calls: Vec<ToolCall>, thought: &str) -> ProviderResponse {
    ProviderResponse {
        content: thought.into(),
        tool_calls,
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "mock-model".into(),
    }
}

/// Helper to create a tool call.
pub fn make_tool_call(name: &str, args: serde_json::Value) -> ToolCall {
    ToolCall::new(format!("call_{name}"), name, args)
}

/// A tool that sleeps, then returns fixed text.
pub struct SleepyTool {
    pub name: &'static str,
    pub delay: Duration,
    pub output: &'static str,
}

#[async_trait::async_trait]
impl Tool for SleepyTool {
    fn name(&self) -> &str {
        self.name
    }
    fn description(&self) -> &str {
        "Sleeps, then answers"
    }
    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({"type": "object", "properties": {"query": {"type": "string"}}})
    }
    async fn execute(&self, _arguments: serde_json::Value) -> Result<String, ToolError> {
        tokio::time::sleep(self.delay).await;
        Ok(self.output.into())
    }
}

/// A tool that always fails.
pub struct FailingTool;

#[async_trait::async_trait]
impl Tool for FailingTool {
    fn name(&self) -> &str {
        "web_search"
    }
    fn description(&self) -> &str {
        "Always fails"
    }
    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({"type": "object"})
    }
    fn failure_label(&self) -> &str {
        "Search"
    }
    async fn execute(&self, _arguments: serde_json::Value) -> Result<String, ToolError> {
        Err(ToolError::ExecutionFailed {
            tool_name: "web_search".into(),
            reason: "network unreachable".into(),
        })
    }
}
