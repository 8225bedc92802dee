//! Wikipedia lookup through the MediaWiki action API.
//!
//! Two requests per query: a full-text search for the best matching page
//! titles, then a plain-text extract of each page.

use async_trait::async_trait;
use serde::Deserialize;
use voxagent_config::WikipediaConfig;
use voxagent_core::error::ToolError;
use voxagent_core::tool::{Tool, truncate_chars};

use crate::query_argument;

/// Returned when the search finds no page.
pub const NO_RESULT: &str = "No good Wikipedia Search Result was found";

pub struct WikipediaTool {
    client: reqwest::Client,
    endpoint: String,
    top_k_results: usize,
    doc_content_chars_max: usize,
}

impl WikipediaTool {
    pub fn new(client: reqwest::Client, config: &WikipediaConfig) -> Self {
        Self {
            client,
            endpoint: format!("https://{}.wikipedia.org/w/api.php", config.language),
            top_k_results: config.top_k_results.max(1),
            doc_content_chars_max: config.doc_content_chars_max,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn failed(&self, reason: impl Into<String>) -> ToolError {
        ToolError::ExecutionFailed {
            tool_name: self.name().into(),
            reason: reason.into(),
        }
    }

    async fn get(&self, params: &[(&str, &str)]) -> Result<String, ToolError> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("action", "query"), ("format", "json"), ("formatversion", "2")])
            .query(params)
            .send()
            .await
            .map_err(|e| self.failed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(self.failed(format!("HTTP {}", response.status().as_u16())));
        }
        response.text().await.map_err(|e| self.failed(e.to_string()))
    }

    async fn search_titles(&self, query: &str) -> Result<Vec<String>, ToolError> {
        let limit = self.top_k_results.to_string();
        let body = self
            .get(&[("list", "search"), ("srsearch", query), ("srlimit", limit.as_str())])
            .await?;
        parse_search_titles(&body).map_err(|e| self.failed(e))
    }

    async fn page_extract(&self, title: &str) -> Result<Option<Page>, ToolError> {
        let body = self
            .get(&[
                ("prop", "extracts"),
                ("explaintext", "1"),
                ("redirects", "1"),
                ("titles", title),
            ])
            .await?;
        parse_extract(&body).map_err(|e| self.failed(e))
    }
}

#[async_trait]
impl Tool for WikipediaTool {
    fn name(&self) -> &str {
        "wikipedia_search"
    }

    fn description(&self) -> &str {
        "Search Wikipedia for factual/historical info. Use for established facts, not current events."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Topic to look up on Wikipedia"
                }
            },
            "required": ["query"]
        })
    }

    fn failure_label(&self) -> &str {
        "Wikipedia search"
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<String, ToolError> {
        let query = query_argument(self.name(), &arguments)?;
        tracing::debug!(query = %query, endpoint = %self.endpoint, "Wikipedia search");

        let titles = self.search_titles(query).await?;
        let mut pages = Vec::with_capacity(titles.len());
        for title in titles.iter().take(self.top_k_results) {
            if let Some(page) = self.page_extract(title).await? {
                pages.push(page);
            }
        }

        Ok(format_pages(&pages, self.doc_content_chars_max))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Page {
    pub title: String,
    pub extract: String,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    query: Option<SearchQuery>,
}

#[derive(Deserialize)]
struct SearchQuery {
    #[serde(default)]
    search: Vec<SearchHit>,
}

#[derive(Deserialize)]
struct SearchHit {
    title: String,
}

#[derive(Deserialize)]
struct ExtractResponse {
    #[serde(default)]
    query: Option<ExtractQuery>,
}

#[derive(Deserialize)]
struct ExtractQuery {
    #[serde(default)]
    pages: Vec<ExtractPage>,
}

#[derive(Deserialize)]
struct ExtractPage {
    title: String,
    #[serde(default)]
    extract: Option<String>,
    #[serde(default)]
    missing: bool,
}

pub(crate) fn parse_search_titles(body: &str) -> Result<Vec<String>, String> {
    let parsed: SearchResponse =
        serde_json::from_str(body).map_err(|e| format!("unexpected search response: {e}"))?;
    Ok(parsed
        .query
        .map(|q| q.search.into_iter().map(|hit| hit.title).collect())
        .unwrap_or_default())
}

pub(crate) fn parse_extract(body: &str) -> Result<Option<Page>, String> {
    let parsed: ExtractResponse =
        serde_json::from_str(body).map_err(|e| format!("unexpected extract response: {e}"))?;
    Ok(parsed
        .query
        .into_iter()
        .flat_map(|q| q.pages)
        .find(|p| !p.missing)
        .and_then(|p| {
            let extract = p.extract?.trim().to_string();
            (!extract.is_empty()).then_some(Page {
                title: p.title,
                extract,
            })
        }))
}

/// Render pages as `Page: <title>\nSummary: <extract>` blocks.
pub(crate) fn format_pages(pages: &[Page], doc_content_chars_max: usize) -> String {
    if pages.is_empty() {
        return NO_RESULT.into();
    }
    pages
        .iter()
        .map(|p| {
            truncate_chars(
                &format!("Page: {}\nSummary: {}", p.title, p.extract),
                doc_content_chars_max,
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}
