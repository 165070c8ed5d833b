//! web_scrape tool implementation.
//!
//! Fetches one URL and returns its visible text, title, preview metadata
//! and, when a CSS selector is given, the matching elements.

use std::time::Duration;

use isis_client::{RagPipeline, ScrapeRequest};
use isis_core::Error;
use rmcp::{ErrorData as McpError, model::*};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Input parameters for web_scrape tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WebScrapeParams {
    /// URL to scrape (required).
    pub url: String,

    /// CSS selector whose matches are returned as `selectedElement`.
    #[serde(default)]
    pub selector: Option<String>,

    /// Render the page in a headless browser first (default false).
    #[serde(default)]
    pub use_javascript: bool,

    /// Timeout in milliseconds (1000-120000, default 30000).
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_timeout_ms() -> u64 {
    30_000
}

impl WebScrapeParams {
    fn validate(&self) -> Result<ScrapeRequest, Error> {
        let url = self.url.trim();
        if url.is_empty() {
            return Err(Error::InvalidInput("url cannot be empty".into()));
        }
        if !(1_000..=120_000).contains(&self.timeout_ms) {
            return Err(Error::InvalidInput("timeout_ms must be between 1000 and 120000".into()));
        }

        Ok(ScrapeRequest {
            url: url.to_string(),
            selector: self.selector.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(str::to_string),
            javascript: self.use_javascript,
            timeout: Duration::from_millis(self.timeout_ms),
        })
    }
}

/// Implementation of the web_scrape tool.
pub async fn scrape_impl(pipeline: &RagPipeline, params: WebScrapeParams) -> Result<CallToolResult, McpError> {
    let request = params.validate()?;
    tracing::info!(url = %request.url, selector = ?request.selector, "web_scrape");

    let result = pipeline.scrape(&request).await?;

    Ok(CallToolResult::success(vec![Content::text(
        serde_json::to_string_pretty(&result).unwrap_or_default(),
    )]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_pipeline;

    fn params(url: &str) -> WebScrapeParams {
        serde_json::from_value(serde_json::json!({ "url": url })).unwrap()
    }

    #[test]
    fn test_params_defaults() {
        let p = params("https://example.com");
        assert!(p.selector.is_none());
        assert!(!p.use_javascript);
        assert_eq!(p.timeout_ms, 30_000);
    }

    #[test]
    fn test_validate() {
        let request = WebScrapeParams { selector: Some("  ".into()), ..params(" https://example.com ") }
            .validate()
            .unwrap();
        assert_eq!(request.url, "https://example.com");
        assert!(request.selector.is_none());

        assert!(matches!(params("   ").validate(), Err(Error::InvalidInput(_))));
        let slow = WebScrapeParams { timeout_ms: 500, ..params("https://example.com") };
        assert!(matches!(slow.validate(), Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_bad_selector_is_invalid_params() {
        let pipeline = test_pipeline().await;
        let p = WebScrapeParams { selector: Some("div[".into()), ..params("https://example.com") };
        let err = scrape_impl(&pipeline, p).await.unwrap_err();
        assert_eq!(err.code, ErrorCode(-32602));
    }

    #[tokio::test]
    async fn test_private_target_is_blocked() {
        let pipeline = test_pipeline().await;
        let err = scrape_impl(&pipeline, params("http://127.0.0.1:8080/admin")).await.unwrap_err();
        assert_eq!(err.code, ErrorCode(-32004));
    }
}
