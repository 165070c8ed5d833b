//! fetch_content tool implementation.
//!
//! Resolves a content handle from a preview result into the full page.

use isis_client::{OutputFormat, RagPipeline};
use isis_core::Error;
use rmcp::{ErrorData as McpError, model::*};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Input parameters for fetch_content tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct FetchContentParams {
    /// Handle returned in `contentHandle` by web_rag preview mode.
    pub content_handle: String,

    /// Content format: markdown (default), text or html.
    #[serde(default)]
    pub output_format: OutputFormat,
}

/// Implementation of the fetch_content tool.
pub async fn fetch_content_impl(
    pipeline: &RagPipeline, params: FetchContentParams,
) -> Result<CallToolResult, McpError> {
    let handle = params.content_handle.trim();
    if handle.is_empty() {
        return Err(Error::InvalidInput("content_handle cannot be empty".into()).into());
    }

    let result = pipeline.fetch_by_handle(handle, params.output_format).await;

    Ok(CallToolResult::success(vec![Content::text(
        serde_json::to_string_pretty(&result).unwrap_or_default(),
    )]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_pipeline_with_cache;
    use isis_core::{PageContent, encode_handle};

    fn body(result: &CallToolResult) -> serde_json::Value {
        serde_json::from_str(&result.content[0].as_text().unwrap().text).unwrap()
    }

    #[tokio::test]
    async fn test_empty_handle() {
        let (pipeline, _cache) = test_pipeline_with_cache().await;
        let err = fetch_content_impl(&pipeline, FetchContentParams::default()).await.unwrap_err();
        assert_eq!(err.code, ErrorCode(-32602));
    }

    #[tokio::test]
    async fn test_cached_handle_returns_full_content() {
        let (pipeline, cache) = test_pipeline_with_cache().await;
        let url = "https://doc.rust-lang.org/book/ch04-01-what-is-ownership.html";
        let page = PageContent {
            content: "Ownership is a set of rules.".into(),
            markdown: "# What is Ownership?\n\nOwnership is a set of rules.".into(),
            title: "What is Ownership?".into(),
        };
        cache.put_page(url, &page).await.unwrap();

        let params = FetchContentParams { content_handle: encode_handle(url), output_format: OutputFormat::Text };
        let json = body(&fetch_content_impl(&pipeline, params).await.unwrap());

        assert_eq!(json["url"], url);
        assert_eq!(json["title"], "What is Ownership?");
        assert_eq!(json["text"], "Ownership is a set of rules.");
        assert_eq!(json["contentLength"], 28);
        assert_eq!(json["cached"], true);
        assert!(json.get("markdown").is_none());
    }

    #[tokio::test]
    async fn test_malformed_handle_reports_error() {
        let (pipeline, _cache) = test_pipeline_with_cache().await;
        let params = FetchContentParams { content_handle: "!!!".into(), ..Default::default() };
        let json = body(&fetch_content_impl(&pipeline, params).await.unwrap());
        assert!(json["error"].as_str().unwrap().starts_with("INVALID_HANDLE"), "{json}");
    }
}
