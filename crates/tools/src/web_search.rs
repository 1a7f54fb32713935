// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `web_search` (spec.md §4.8): an external web search collaborator. The
//! production implementation calls the Exa search API; tests substitute
//! [`FakeWebSearchProvider`].

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::ToolError;

const EXA_SEARCH_URL: &str = "https://api.exa.ai/search";
const MAX_RESULTS: u64 = 8;
const TEXT_MAX_CHARS: u64 = 1_000;

#[async_trait]
pub trait WebSearchProvider: Send + Sync {
    async fn search(&self, query: &str) -> Result<String, ToolError>;
}

pub struct ExaWebSearchProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl ExaWebSearchProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self { client: reqwest::Client::new(), api_key: api_key.into(), base_url: EXA_SEARCH_URL.to_string() }
    }

    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self { client: reqwest::Client::new(), api_key: api_key.into(), base_url: base_url.into() }
    }
}

fn render_results(body: &Value) -> String {
    let Some(results) = body.get("results").and_then(Value::as_array) else {
        return "no results".to_string();
    };
    if results.is_empty() {
        return "no results".to_string();
    }

    let mut out = String::new();
    for (index, result) in results.iter().enumerate() {
        let title = result.get("title").and_then(Value::as_str).unwrap_or("(untitled)");
        let url = result.get("url").and_then(Value::as_str).unwrap_or_default();
        let text = result.get("text").and_then(Value::as_str).unwrap_or_default();
        out.push_str(&format!("{}. {title}\n{url}\n{text}\n\n", index + 1));
    }
    out.trim_end().to_string()
}

#[async_trait]
impl WebSearchProvider for ExaWebSearchProvider {
    async fn search(&self, query: &str) -> Result<String, ToolError> {
        let body = serde_json::json!({
            "query": query,
            "numResults": MAX_RESULTS,
            "contents": {"text": {"maxCharacters": TEXT_MAX_CHARS}},
        });
        let response = self
            .client
            .post(&self.base_url)
            .header("x-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ToolError::InvalidInput(format!("web search request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(ToolError::InvalidInput(format!("web search returned HTTP {status}")));
        }

        let parsed: Value = response
            .json()
            .await
            .map_err(|e| ToolError::InvalidInput(format!("malformed web search response: {e}")))?;
        Ok(render_results(&parsed))
    }
}

#[cfg(any(test, feature = "test-support"))]
pub struct FakeWebSearchProvider {
    pub response: String,
}

#[cfg(any(test, feature = "test-support"))]
#[async_trait]
impl WebSearchProvider for FakeWebSearchProvider {
    async fn search(&self, _query: &str) -> Result<String, ToolError> {
        Ok(self.response.clone())
    }
}

#[cfg(test)]
#[path = "web_search_tests.rs"]
mod tests;
