//! Tool trait: the abstraction over agent capabilities.
//!
//! Tools let the model reach outside its own weights: search the web,
//! look something up in an encyclopedia, and so on. The registry is
//! assembled once at startup and shared read-only by every turn.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::ToolError;
use crate::message::ToolCall;
use crate::provider::ToolDefinition;

/// Default per-invocation timeout.
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(20);

/// Default cap on tool output fed back into model context.
pub const DEFAULT_MAX_OUTPUT_CHARS: usize = 2_000;

/// The core Tool trait.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "web_search").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the LLM).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Human-facing label used in failure text, e.g. "Search" → "Search failed: ...".
    fn failure_label(&self) -> &str {
        self.name()
    }

    /// Execute the tool with the given arguments and return its text output.
    async fn execute(&self, arguments: serde_json::Value) -> Result<String, ToolError>;

    /// Convert this tool into a ToolDefinition for sending to the LLM.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// An immutable, ordered registry of available tools.
///
/// Build it with [`ToolRegistry::with_tool`] / [`ToolRegistry::register`]
/// before wrapping it in an `Arc`; nothing mutates it afterwards.
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
    timeout: Duration,
    max_output_chars: usize,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: Vec::new(),
            timeout: DEFAULT_TOOL_TIMEOUT,
            max_output_chars: DEFAULT_MAX_OUTPUT_CHARS,
        }
    }

    /// Set the per-invocation timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the maximum number of characters returned from any invocation.
    pub fn with_max_output_chars(mut self, max: usize) -> Self {
        self.max_output_chars = max;
        self
    }

    /// Register a tool (builder form).
    pub fn with_tool(mut self, tool: Box<dyn Tool>) -> Self {
        self.register(tool);
        self
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        self.tools.retain(|t| t.name() != tool.name());
        self.tools.push(tool);
    }

    /// Look up a tool by name.
    pub fn lookup(&self, name: &str) -> Result<&dyn Tool, ToolError> {
        self.tools
            .iter()
            .find(|t| t.name() == name)
            .map(|t| t.as_ref())
            .ok_or_else(|| ToolError::NotFound(name.to_string()))
    }

    /// All tool definitions in registration order (for sending to the LLM).
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.to_definition()).collect()
    }

    /// List all registered tool names in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Invoke a tool call with the registry's timeout, bounding its output.
    pub async fn invoke(&self, call: &ToolCall) -> Result<String, ToolError> {
        let tool = self.lookup(&call.name)?;
        let start = Instant::now();

        let outcome = tokio::time::timeout(self.timeout, tool.execute(call.arguments.clone())).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        match outcome {
            Ok(Ok(output)) => {
                debug!(tool = %call.name, call_id = %call.id, duration_ms, "Tool succeeded");
                Ok(truncate_chars(&output, self.max_output_chars))
            }
            Ok(Err(e)) => {
                warn!(tool = %call.name, call_id = %call.id, duration_ms, error = %e, "Tool failed");
                Err(e)
            }
            Err(_) => {
                warn!(tool = %call.name, call_id = %call.id, duration_ms, "Tool timed out");
                Err(ToolError::Timeout {
                    tool_name: call.name.clone(),
                    timeout_secs: self.timeout.as_secs(),
                })
            }
        }
    }

    /// Human-readable failure text folded into history in place of tool output.
    pub fn failure_text(&self, error: &ToolError) -> String {
        match error {
            ToolError::NotFound(name) => format!("Tool '{name}' is not available"),
            other => {
                let label = self
                    .lookup(other.tool_name())
                    .map(|t| t.failure_label().to_string())
                    .unwrap_or_else(|_| other.tool_name().to_string());
                format!("{label} failed: {}", other.cause())
            }
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Truncate `text` to at most `max` characters, on a char boundary.
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A simple test tool for unit tests.
    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "Echoes back the input"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({
                "type": "object",
                "properties": {
                    "text": { "type": "string" }
                },
                "required": ["text"]
            })
        }
        async fn execute(&self, arguments: serde_json::Value) -> Result<String, ToolError> {
            Ok(arguments["text"].as_str().unwrap_or("").to_string())
        }
    }

    struct SlowTool;

    #[async_trait]
    impl Tool for SlowTool {
        fn name(&self) -> &str {
            "slow"
        }
        fn description(&self) -> &str {
            "Never finishes in time"
        }
        fn failure_label(&self) -> &str {
            "Slow lookup"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object"})
        }
        async fn execute(&self, _arguments: serde_json::Value) -> Result<String, ToolError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok("late".into())
        }
    }

    fn echo_call(text: &str) -> ToolCall {
        ToolCall::new("call_1", "echo", serde_json::json!({ "text": text }))
    }

    #[test]
    fn registry_register_and_lookup() {
        let registry = ToolRegistry::new().with_tool(Box::new(EchoTool));
        assert!(registry.lookup("echo").is_ok());
        assert!(matches!(
            registry.lookup("nonexistent"),
            Err(ToolError::NotFound(_))
        ));
    }

    #[test]
    fn registry_definitions_keep_registration_order() {
        let registry = ToolRegistry::new()
            .with_tool(Box::new(SlowTool))
            .with_tool(Box::new(EchoTool));
        let defs = registry.definitions();
        assert_eq!(defs.len(), 2);
        assert_eq!(defs[0].name, "slow");
        assert_eq!(defs[1].name, "echo");
    }

    #[tokio::test]
    async fn registry_invoke_tool() {
        let registry = ToolRegistry::new().with_tool(Box::new(EchoTool));
        let output = registry.invoke(&echo_call("hello world")).await.unwrap();
        assert_eq!(output, "hello world");
    }

    #[tokio::test]
    async fn registry_truncates_output() {
        let registry = ToolRegistry::new()
            .with_max_output_chars(5)
            .with_tool(Box::new(EchoTool));
        let output = registry.invoke(&echo_call("héllo wörld")).await.unwrap();
        assert_eq!(output, "héllo");
    }

    #[tokio::test]
    async fn registry_invoke_missing_tool() {
        let registry = ToolRegistry::new();
        let call = ToolCall::new("call_1", "nonexistent", serde_json::json!({}));
        let err = registry.invoke(&call).await.unwrap_err();
        assert!(matches!(err, ToolError::NotFound(_)));
        assert_eq!(registry.failure_text(&err), "Tool 'nonexistent' is not available");
    }

    #[tokio::test(start_paused = true)]
    async fn registry_enforces_timeout() {
        let registry = ToolRegistry::new()
            .with_timeout(Duration::from_secs(2))
            .with_tool(Box::new(SlowTool));
        let call = ToolCall::new("call_1", "slow", serde_json::json!({}));
        let err = registry.invoke(&call).await.unwrap_err();
        assert!(matches!(err, ToolError::Timeout { timeout_secs: 2, .. }));
        assert_eq!(registry.failure_text(&err), "Slow lookup failed: timed out after 2s");
    }

    #[test]
    fn truncate_chars_is_boundary_safe() {
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("日本語テキスト", 3), "日本語");
        assert_eq!(truncate_chars("", 0), "");
    }
}
