//! Web search tool backed by the DuckDuckGo Instant Answer API.
//!
//! No API key is required. The instant-answer endpoint returns an abstract
//! and a list of related topics; both are flattened into one snippet string
//! for the model.

use async_trait::async_trait;
use serde::Deserialize;
use voxagent_core::error::ToolError;
use voxagent_core::tool::Tool;

use crate::query_argument;

const DUCKDUCKGO_URL: &str = "https://api.duckduckgo.com/";

/// Returned when DuckDuckGo has nothing for the query.
pub const NO_RESULT: &str = "No good DuckDuckGo Search Result was found";

/// Related topics consulted per query.
const MAX_TOPICS: usize = 5;

pub struct WebSearchTool {
    client: reqwest::Client,
    endpoint: String,
}

impl WebSearchTool {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            endpoint: DUCKDUCKGO_URL.into(),
        }
    }

    /// Point the tool at a different instant-answer endpoint.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    fn failed(&self, reason: impl Into<String>) -> ToolError {
        ToolError::ExecutionFailed {
            tool_name: self.name().into(),
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the internet for current information. Use for recent events, news, or real-time data."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query"
                }
            },
            "required": ["query"]
        })
    }

    fn failure_label(&self) -> &str {
        "Search"
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<String, ToolError> {
        let query = query_argument(self.name(), &arguments)?;
        tracing::debug!(query = %query, "DuckDuckGo search");

        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("q", query),
                ("format", "json"),
                ("no_html", "1"),
                ("skip_disambig", "1"),
            ])
            .send()
            .await
            .map_err(|e| self.failed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(self.failed(format!("HTTP {}", response.status().as_u16())));
        }

        let body = response.text().await.map_err(|e| self.failed(e.to_string()))?;
        parse_instant_answer(&body).map_err(|e| self.failed(e))
    }
}

#[derive(Debug, Default, Deserialize)]
struct InstantAnswer {
    #[serde(rename = "AbstractText", default)]
    abstract_text: String,
    #[serde(rename = "Answer", default)]
    answer: serde_json::Value,
    #[serde(rename = "Definition", default)]
    definition: String,
    #[serde(rename = "RelatedTopics", default)]
    related_topics: Vec<RelatedTopic>,
}

/// Either a topic with text, or a named group of nested topics.
#[derive(Debug, Deserialize)]
struct RelatedTopic {
    #[serde(rename = "Text", default)]
    text: Option<String>,
    #[serde(rename = "Topics", default)]
    topics: Vec<RelatedTopic>,
}

fn collect_topics<'a>(topics: &'a [RelatedTopic], out: &mut Vec<&'a str>) {
    for topic in topics {
        if out.len() >= MAX_TOPICS {
            return;
        }
        match &topic.text {
            Some(text) if !text.trim().is_empty() => out.push(text.trim()),
            _ => collect_topics(&topic.topics, out),
        }
    }
}

/// Flatten an instant-answer payload into a single snippet string.
pub(crate) fn parse_instant_answer(body: &str) -> Result<String, String> {
    let parsed: InstantAnswer =
        serde_json::from_str(body).map_err(|e| format!("unexpected response: {e}"))?;

    let mut snippets: Vec<&str> = Vec::new();
    if let Some(answer) = parsed.answer.as_str().filter(|a| !a.trim().is_empty()) {
        snippets.push(answer.trim());
    }
    for text in [&parsed.abstract_text, &parsed.definition] {
        if !text.trim().is_empty() {
            snippets.push(text.trim());
        }
    }
    collect_topics(&parsed.related_topics, &mut snippets);

    if snippets.is_empty() {
        Ok(NO_RESULT.into())
    } else {
        Ok(snippets.join(" "))
    }
}
