//! web_search tool implementation.
//!
//! Runs the provider chain only and returns the ranked hits.

use isis_client::{ProviderReport, RagPipeline, SearchHit};
use isis_core::Error;
use rmcp::{ErrorData as McpError, model::*};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Input parameters for web_search tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WebSearchParams {
    /// Search query (required).
    pub query: String,

    /// Number of results (1-20, default 10).
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

fn default_max_results() -> usize {
    10
}

/// Output structure for web_search tool.
#[derive(Debug, Clone, Serialize)]
pub struct WebSearchOutput {
    pub query: String,
    /// Provider that answered.
    pub provider: String,
    pub results: Vec<SearchHit>,
    /// Providers skipped or failed before the answer.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<ProviderReport>,
}

/// Implementation of the web_search tool.
pub async fn search_impl(pipeline: &RagPipeline, params: WebSearchParams) -> Result<CallToolResult, McpError> {
    let query = params.query.trim();
    if query.is_empty() {
        return Err(Error::InvalidInput("query cannot be empty".into()).into());
    }
    if !(1..=20).contains(&params.max_results) {
        return Err(Error::InvalidInput("max_results must be between 1 and 20".into()).into());
    }

    let outcome = pipeline
        .search()
        .search(query, params.max_results)
        .await
        .map_err(Error::from)?;

    let output = WebSearchOutput {
        query: query.to_string(),
        provider: outcome.provider,
        results: outcome.hits,
        diagnostics: outcome.reports,
    };

    Ok(CallToolResult::success(vec![Content::text(
        serde_json::to_string_pretty(&output).unwrap_or_default(),
    )]))
}
