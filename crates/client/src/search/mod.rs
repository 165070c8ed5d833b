//! Multi-provider web search with ordered fallback.
//!
//! ### Provider chain
//! Providers are tried strictly in order, never concurrently:
//! 1. DuckDuckGo HTML endpoint, scraped directly
//! 2. Self-hosted SearXNG (`/search?format=json`), forwarded-for localhost
//! 3. ScraperAPI proxying the DuckDuckGo HTML endpoint (needs an API key)
//! 4. Public SearXNG mirrors, one chain entry each
//!
//! ### Failure handling
//! - Each attempt is time-bounded; a timeout fails that attempt.
//! - Failures are tagged where they are detected: rate limited, timeout, hard.
//! - Rate-limited attempts back off `base * 2^attempt` and retry up to the
//!   provider's attempt ceiling; everything else moves to the next provider.
//! - The first provider returning a non-empty list wins. Results are never
//!   merged across providers.
//! - Providers missing their configuration are skipped, and reported as
//!   skipped rather than failed.

pub mod duckduckgo;
pub mod error;
pub mod orchestrator;
pub mod searxng;

pub use duckduckgo::{DuckDuckGoProvider, ScraperApiProvider};
pub use error::{FailureKind, ProviderError, SearchError};
pub use orchestrator::{ProviderReport, ProviderSlot, ReportStatus, RetryPolicy, SearchOrchestrator, SearchOutcome};
pub use searxng::SearxngProvider;

use serde::{Deserialize, Serialize};

/// User agent for search endpoints, which reject obvious bots.
pub const SEARCH_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// One ranked search result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct SearchHit {
    pub url: String,
    pub title: String,
    pub description: String,
}

/// Whether a provider can be attempted at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Availability {
    Ready,
    /// Missing credential or disabled service; the reason is logged.
    Unconfigured(String),
}

/// A search backend queried for a ranked list of URLs.
#[async_trait::async_trait]
pub trait SearchProvider: Send + Sync {
    /// Stable name used in logs and diagnostics.
    fn name(&self) -> &str;

    fn availability(&self) -> Availability {
        Availability::Ready
    }

    /// Run one attempt. An empty list is a valid return; the orchestrator
    /// treats it as a hard failure.
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>, ProviderError>;
}
