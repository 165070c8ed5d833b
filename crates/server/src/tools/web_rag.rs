//! web_rag tool implementation.
//!
//! Searches the web, acquires the top pages and returns their content in
//! the requested format and mode.

use std::time::Duration;

use isis_client::{ContentMode, OutputFormat, RagOptions, RagPipeline};
use isis_core::Error;
use rmcp::{ErrorData as McpError, model::*};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Input parameters for web_rag tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WebRagParams {
    /// Search query (required).
    pub query: String,

    /// Number of pages to retrieve (1-10, default 5).
    #[serde(default = "default_max_results")]
    pub max_results: usize,

    /// Content format: markdown (default), text or html.
    #[serde(default)]
    pub output_format: OutputFormat,

    /// full (default), preview (300 chars plus a content handle) or summary.
    #[serde(default)]
    pub content_mode: ContentMode,

    /// Model used for summary mode; defaults to the configured model.
    #[serde(default)]
    pub summary_model: Option<String>,

    /// Render pages in a headless browser (default false).
    #[serde(default)]
    pub use_javascript: bool,

    /// Per-page timeout in milliseconds (1000-120000, default 30000).
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_max_results() -> usize {
    5
}

fn default_timeout_ms() -> u64 {
    30_000
}

impl Default for WebRagParams {
    fn default() -> Self {
        Self {
            query: String::new(),
            max_results: default_max_results(),
            output_format: OutputFormat::default(),
            content_mode: ContentMode::default(),
            summary_model: None,
            use_javascript: false,
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl WebRagParams {
    fn validate(&self) -> Result<RagOptions, Error> {
        if self.query.trim().is_empty() {
            return Err(Error::InvalidInput("query cannot be empty".into()));
        }
        if !(1..=10).contains(&self.max_results) {
            return Err(Error::InvalidInput("max_results must be between 1 and 10".into()));
        }
        if !(1_000..=120_000).contains(&self.timeout_ms) {
            return Err(Error::InvalidInput("timeout_ms must be between 1000 and 120000".into()));
        }

        Ok(RagOptions {
            max_results: self.max_results,
            output_format: self.output_format,
            content_mode: self.content_mode,
            summary_model: self.summary_model.clone(),
            use_javascript: self.use_javascript,
            timeout: Duration::from_millis(self.timeout_ms),
        })
    }
}

/// Implementation of the web_rag tool.
pub async fn rag_impl(pipeline: &RagPipeline, params: WebRagParams) -> Result<CallToolResult, McpError> {
    let opts = params.validate()?;
    let query = params.query.trim();

    tracing::info!(query, mode = ?opts.content_mode, format = ?opts.output_format, "web_rag");
    let result = pipeline.run(query, &opts).await;

    Ok(CallToolResult::success(vec![Content::text(
        serde_json::to_string_pretty(&result).unwrap_or_default(),
    )]))
}
