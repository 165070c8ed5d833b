//! Client side of isis: web search, page acquisition and content shaping.
//!
//! This crate provides the provider-fallback search orchestrator, the HTTP
//! fetch pipeline, readable content extraction, summarization, single-page
//! scraping and screenshots, and the retrieval pipeline composing them.
//! The server crate wraps it in MCP tools.

pub mod extract;
pub mod fetch;
pub mod rag;
pub mod render;
pub mod scrape;
pub mod search;
pub mod summarize;
pub mod transform;

pub use extract::{ExtractConfig, ExtractedPage, Extractor, ReadabilityExtractor};
pub use fetch::{FetchClient, FetchConfig, FetchOptions, FetchResponse, FetchedPage, PageFetcher, WebPageFetcher};
pub use rag::{FetchContentResult, PageResult, RagOptions, RagPipeline, RagResult};
pub use render::{RenderError, RenderOptions, RenderedPage, Renderer, Screenshot, ScreenshotOptions};
pub use scrape::{PageMetadata, ScrapeRequest, ScrapeResult, ScreenshotResult};
pub use search::{
    ProviderReport, ReportStatus, SearchError, SearchHit, SearchOrchestrator, SearchOutcome, SearchProvider,
};
pub use summarize::{OllamaSummarizer, SummarizeError, Summarizer};
pub use transform::{ContentMode, ContentTransformer, OutputFormat, truncate_preview};
