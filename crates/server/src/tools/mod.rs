//! MCP tool implementations.
//!
//! This module contains all tools exposed by the isis server.

pub mod fetch_content;
pub mod web_rag;
pub mod web_scrape;
pub mod web_screenshot;
pub mod web_search;

pub use fetch_content::{FetchContentParams, fetch_content_impl};
pub use web_rag::{WebRagParams, rag_impl};
pub use web_scrape::{WebScrapeParams, scrape_impl};
pub use web_screenshot::{WebScreenshotParams, screenshot_impl};
pub use web_search::{WebSearchParams, search_impl};

#[cfg(test)]
pub(crate) async fn test_pipeline_with_cache() -> (isis_client::RagPipeline, isis_core::CacheDb) {
    use isis_client::{
        ContentTransformer, FetchClient, FetchConfig, ReadabilityExtractor, SearchOrchestrator, WebPageFetcher,
    };
    use std::sync::Arc;

    let cache = isis_core::CacheDb::open_in_memory().await.unwrap();
    let fetcher = WebPageFetcher::new(FetchClient::new(FetchConfig::default()).unwrap());
    let pipeline = isis_client::RagPipeline::new(
        SearchOrchestrator::new(vec![]),
        Arc::new(fetcher),
        Arc::new(ReadabilityExtractor::default()),
        ContentTransformer::without_summarizer(),
        cache.clone(),
    );
    (pipeline, cache)
}

#[cfg(test)]
pub(crate) async fn test_pipeline() -> isis_client::RagPipeline {
    test_pipeline_with_cache().await.0
}
