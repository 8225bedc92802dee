//! Built-in tool implementations for voxagent.
//!
//! Tools give the assistant a way to reach beyond the model's weights:
//! a web search for current events and a Wikipedia lookup for
//! established facts.

pub mod web_search;
pub mod wikipedia;

use std::time::Duration;

use voxagent_config::AppConfig;
use voxagent_core::error::ToolError;
use voxagent_core::tool::ToolRegistry;

pub use web_search::WebSearchTool;
pub use wikipedia::WikipediaTool;

/// Create the tool registry described by configuration.
///
/// Tools are registered in a fixed order (web search, then Wikipedia);
/// disabled tools are left out entirely so the model never sees them.
pub fn default_registry(config: &AppConfig) -> ToolRegistry {
    let client = http_client();
    let mut registry = ToolRegistry::new()
        .with_timeout(config.agent.tool_timeout())
        .with_max_output_chars(config.tools.max_output_chars());

    if config.tools.web_search.enabled {
        registry.register(Box::new(CappedTool::new(
            WebSearchTool::new(client.clone()),
            config.tools.web_search.max_chars,
        )));
    }
    if config.tools.wikipedia.enabled {
        registry.register(Box::new(CappedTool::new(
            WikipediaTool::new(client, &config.tools.wikipedia),
            config.tools.wikipedia.max_chars,
        )));
    }

    tracing::debug!(tools = ?registry.names(), "Tool registry assembled");
    registry
}

fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent(concat!("voxagent/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(Duration::from_secs(10))
        .build()
        .unwrap_or_default()
}

/// Pull the required `query` string out of tool arguments.
pub(crate) fn query_argument<'a>(
    tool_name: &str,
    arguments: &'a serde_json::Value,
) -> Result<&'a str, ToolError> {
    arguments["query"]
        .as_str()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .ok_or_else(|| ToolError::InvalidArguments {
            tool_name: tool_name.into(),
            reason: "Missing 'query' argument".into(),
        })
}

/// Wraps a tool with its own output cap, tighter than the registry-wide one.
struct CappedTool<T> {
    inner: T,
    max_chars: usize,
}

impl<T> CappedTool<T> {
    fn new(inner: T, max_chars: usize) -> Self {
        Self { inner, max_chars }
    }
}

#[async_trait::async_trait]
impl<T: voxagent_core::Tool> voxagent_core::Tool for CappedTool<T> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn description(&self) -> &str {
        self.inner.description()
    }

    fn parameters_schema(&self) -> serde_json::Value {
        self.inner.parameters_schema()
    }

    fn failure_label(&self) -> &str {
        self.inner.failure_label()
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<String, ToolError> {
        let output = self.inner.execute(arguments).await?;
        Ok(voxagent_core::tool::truncate_chars(&output, self.max_chars))
    }
}
