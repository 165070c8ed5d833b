//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the appropriate implementations.

use crate::tools::{
    FetchContentParams, WebRagParams, WebScrapeParams, WebScreenshotParams, WebSearchParams, fetch_content_impl,
    rag_impl, scrape_impl, screenshot_impl, search_impl,
};

use isis_client::RagPipeline;
use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};

/// The main MCP server handler for isis.
#[derive(Clone)]
pub struct IsisServer {
    tool_router: ToolRouter<Self>,
    pipeline: RagPipeline,
}

/// Tool router implementation using the #[tool_router] macro.
#[tool_router]
impl IsisServer {
    pub fn new(pipeline: RagPipeline) -> Self {
        Self { tool_router: Self::tool_router(), pipeline }
    }

    /// Search the web and return readable page content for retrieval-augmented generation.
    #[tool(
        description = "Search the web and return the content of the top pages. \
            content_mode: full (default), preview (first 300 chars plus a content_handle for fetch_content), \
            or summary (local model, falls back to preview). output_format: markdown (default), text, or html."
    )]
    async fn web_rag(&self, params: Parameters<WebRagParams>) -> Result<CallToolResult, McpError> {
        rag_impl(&self.pipeline, params.0).await
    }

    /// Search only; no page content is fetched.
    #[tool(
        description = "Search the web through a fallback chain of providers. Returns ranked URLs, titles and snippets."
    )]
    async fn web_search(&self, params: Parameters<WebSearchParams>) -> Result<CallToolResult, McpError> {
        search_impl(&self.pipeline, params.0).await
    }

    /// Expand a preview result into the full page.
    #[tool(
        description = "Fetch the full content of a page using the content_handle returned by web_rag in preview mode."
    )]
    async fn fetch_content(&self, params: Parameters<FetchContentParams>) -> Result<CallToolResult, McpError> {
        fetch_content_impl(&self.pipeline, params.0).await
    }

    /// Scrape a single page.
    #[tool(
        description = "Scrape one web page. Returns its title, visible text, description metadata and, \
            when a CSS selector is given, the text and HTML of the matching elements."
    )]
    async fn web_scrape(&self, params: Parameters<WebScrapeParams>) -> Result<CallToolResult, McpError> {
        scrape_impl(&self.pipeline, params.0).await
    }

    /// Capture a page as a PNG image.
    #[tool(
        description = "Take a PNG screenshot of a web page with the headless browser. \
            Fails when the server was started without a browser."
    )]
    async fn web_screenshot(&self, params: Parameters<WebScreenshotParams>) -> Result<CallToolResult, McpError> {
        screenshot_impl(&self.pipeline, params.0).await
    }
}

impl ServerHandler for IsisServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "isis-mcp".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            instructions: Some(
                "Use web_rag to answer questions from live web pages; \
                 use preview mode and fetch_content to keep responses small."
                    .into(),
            ),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_pipeline;

    #[tokio::test]
    async fn test_tool_names() {
        let server = IsisServer::new(test_pipeline().await);
        let mut names: Vec<String> =
            server.tool_router.list_all().into_iter().map(|t| t.name.to_string()).collect();
        names.sort();
        assert_eq!(names, vec!["fetch_content", "web_rag", "web_scrape", "web_screenshot", "web_search"]);
    }

    #[tokio::test]
    async fn test_server_info() {
        let server = IsisServer::new(test_pipeline().await);
        let info = server.get_info();
        assert_eq!(info.server_info.name, "isis-mcp");
        assert!(info.capabilities.tools.is_some());
    }
}
