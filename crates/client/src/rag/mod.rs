//! Query-to-content retrieval pipeline.
//!
//! `run` searches, then acquires every hit concurrently (bounded by a
//! semaphore). Each unit is served from the page cache when a fresh entry
//! exists, otherwise fetched, extracted and written back. Pages that fail
//! are dropped; the rest keep search order and are shaped by the selected
//! output format and content mode.

use std::sync::Arc;
use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use isis_core::{AppConfig, CacheDb, CacheEntry, Error, PageContent, decode_handle, encode_handle};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::extract::{ExtractedPage, Extractor, ReadabilityExtractor};
use crate::fetch::{FetchClient, FetchConfig, FetchOptions, PageFetcher, WebPageFetcher};
use crate::render::{Renderer, ScreenshotOptions};
use crate::scrape::{ScrapeRequest, ScrapeResult, ScreenshotResult, capture_screenshot, scrape_page};
use crate::search::{ProviderReport, SearchHit, SearchOrchestrator};
use crate::summarize::{OllamaSummarizer, Summarizer};
use crate::transform::{ContentMode, ContentTransformer, OutputFormat};

/// Caller options for one retrieval.
#[derive(Debug, Clone)]
pub struct RagOptions {
    pub max_results: usize,
    pub output_format: OutputFormat,
    pub content_mode: ContentMode,
    /// Overrides the configured summary model.
    pub summary_model: Option<String>,
    pub use_javascript: bool,
    /// Per-page acquisition timeout.
    pub timeout: Duration,
}

impl Default for RagOptions {
    fn default() -> Self {
        Self {
            max_results: 5,
            output_format: OutputFormat::Markdown,
            content_mode: ContentMode::Full,
            summary_model: None,
            use_javascript: false,
            timeout: Duration::from_millis(30_000),
        }
    }
}

/// One acquired page, shaped for the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PageResult {
    pub url: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub markdown: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
    /// Present only in preview mode; resolves to the full page via `fetch_content`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_handle: Option<String>,
    pub from_cache: bool,
}

/// Response for one query.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RagResult {
    pub query: String,
    pub results: Vec<PageResult>,
    pub total_results: usize,
    /// RFC 3339 completion time.
    pub searched_at: String,
    /// Set only when the search phase failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Search provider that answered.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
}

/// Response for a content-handle lookup.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FetchContentResult {
    pub url: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub markdown: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    /// Characters in the returned field.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cached: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Page content before shaping.
#[derive(Debug, Clone)]
struct AcquiredPage {
    url: String,
    title: String,
    html: String,
    text: String,
    markdown: String,
    excerpt: String,
    from_cache: bool,
}

impl AcquiredPage {
    fn from_cache(entry: CacheEntry) -> Self {
        Self {
            url: entry.url,
            title: entry.title,
            html: entry.content.clone(),
            text: entry.content,
            markdown: entry.markdown,
            excerpt: String::new(),
            from_cache: true,
        }
    }

    fn from_extraction(url: &str, page: ExtractedPage) -> Self {
        Self {
            url: url.to_string(),
            title: page.title,
            html: page.content,
            text: page.text,
            markdown: page.markdown,
            excerpt: page.excerpt,
            from_cache: false,
        }
    }

    fn field(&self, format: OutputFormat) -> &str {
        match format {
            OutputFormat::Markdown => &self.markdown,
            OutputFormat::Text => &self.text,
            OutputFormat::Html => &self.html,
        }
    }
}

/// Place `value` in the slot named by `format`.
fn slot_fields(format: OutputFormat, value: String) -> (Option<String>, Option<String>, Option<String>) {
    match format {
        OutputFormat::Markdown => (Some(value), None, None),
        OutputFormat::Text => (None, Some(value), None),
        OutputFormat::Html => (None, None, Some(value)),
    }
}

/// Search, acquire and shape pages for a query.
#[derive(Clone)]
pub struct RagPipeline {
    search: Arc<SearchOrchestrator>,
    fetcher: Arc<dyn PageFetcher>,
    extractor: Arc<dyn Extractor>,
    transformer: ContentTransformer,
    cache: CacheDb,
    max_concurrency: usize,
    /// Fetch timeout for handle lookups, which carry no caller options.
    fetch_timeout: Duration,
}

impl RagPipeline {
    pub fn new(
        search: SearchOrchestrator, fetcher: Arc<dyn PageFetcher>, extractor: Arc<dyn Extractor>,
        transformer: ContentTransformer, cache: CacheDb,
    ) -> Self {
        Self {
            search: Arc::new(search),
            fetcher,
            extractor,
            transformer,
            cache,
            max_concurrency: 4,
            fetch_timeout: RagOptions::default().timeout,
        }
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Wire every collaborator from configuration.
    pub async fn from_config(config: &AppConfig, cache: CacheDb) -> Result<Self, Error> {
        let search = SearchOrchestrator::from_config(config)?;

        let mut fetcher = WebPageFetcher::new(FetchClient::new(FetchConfig::from(config))?);
        if config.render_enabled {
            match launch_renderer().await {
                Some(renderer) => fetcher = fetcher.with_renderer(renderer),
                None => tracing::warn!("javascript rendering requested but unavailable; plain fetches only"),
            }
        }

        let summarizer: Option<Arc<dyn Summarizer>> = if config.summary.enabled {
            let http = reqwest::Client::builder()
                .use_rustls_tls()
                .build()
                .map_err(|e| Error::HttpError(format!("failed to build summarizer client: {}", e)))?;
            Some(Arc::new(OllamaSummarizer::new(http, &config.summary)))
        } else {
            None
        };
        let transformer =
            ContentTransformer::new(summarizer, config.summary.max_input_chars, config.summary.timeout());

        tracing::info!(
            providers = ?search.provider_names(),
            max_concurrency = config.max_concurrency,
            summary = config.summary.enabled,
            "retrieval pipeline ready"
        );

        Ok(Self::new(search, Arc::new(fetcher), Arc::new(ReadabilityExtractor::default()), transformer, cache)
            .with_max_concurrency(config.max_concurrency)
            .with_fetch_timeout(config.timeout()))
    }

    pub fn search(&self) -> &SearchOrchestrator {
        &self.search
    }

    /// Scrape one page through the pipeline's fetcher. Bypasses the cache.
    pub async fn scrape(&self, request: &ScrapeRequest) -> Result<ScrapeResult, Error> {
        scrape_page(self.fetcher.as_ref(), request).await
    }

    /// Screenshot one page; needs the headless browser.
    pub async fn screenshot(&self, url: &str, opts: &ScreenshotOptions) -> Result<ScreenshotResult, Error> {
        capture_screenshot(self.fetcher.as_ref(), url, opts).await
    }

    /// Answer a query. Search exhaustion is reported in `error`, never as `Err`.
    pub async fn run(&self, query: &str, opts: &RagOptions) -> RagResult {
        let outcome = match self.search.search(query, opts.max_results).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(query, error = %e, "search phase failed");
                return RagResult {
                    query: query.to_string(),
                    results: Vec::new(),
                    total_results: 0,
                    searched_at: timestamp(),
                    error: Some(format!("search failed: {}. Try again in a few minutes.", e)),
                    provider: None,
                };
            }
        };

        log_reports(&outcome.reports);
        let results = self.acquire(&outcome.hits, opts).await;

        RagResult {
            query: query.to_string(),
            total_results: results.len(),
            results,
            searched_at: timestamp(),
            error: None,
            provider: Some(outcome.provider),
        }
    }

    /// Acquire and shape every hit; failed pages are dropped, order is kept.
    pub async fn acquire(&self, hits: &[SearchHit], opts: &RagOptions) -> Vec<PageResult> {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let mut join_set = JoinSet::new();

        for (idx, hit) in hits.iter().enumerate() {
            let pipeline = self.clone();
            let semaphore = semaphore.clone();
            let opts = opts.clone();
            let url = hit.url.clone();

            join_set.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return (idx, None);
                };
                (idx, pipeline.acquire_one(&url, &opts).await)
            });
        }

        let mut slots: Vec<Option<PageResult>> = vec![None; hits.len()];
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((idx, result)) => slots[idx] = result,
                Err(e) => tracing::warn!(error = %e, "page task aborted"),
            }
        }

        slots.into_iter().flatten().collect()
    }

    async fn acquire_one(&self, url: &str, opts: &RagOptions) -> Option<PageResult> {
        let fetch_opts = FetchOptions { javascript: opts.use_javascript, timeout: opts.timeout };
        match self.load(url, &fetch_opts).await {
            Ok(page) => Some(self.shape(page, opts).await),
            Err(e) => {
                tracing::warn!(url, error = %e, "dropping page");
                None
            }
        }
    }

    /// Cache first, then fetch and extract, writing the extraction back.
    async fn load(&self, url: &str, opts: &FetchOptions) -> Result<AcquiredPage, Error> {
        match self.cache.get_page(url).await {
            Ok(Some(entry)) => {
                tracing::debug!(url, "cache hit");
                return Ok(AcquiredPage::from_cache(entry));
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(url, error = %e, "cache read failed; treating as miss"),
        }

        let fetched = tokio::time::timeout(opts.timeout, self.fetcher.fetch_page(url, opts))
            .await
            .map_err(|_| Error::FetchTimeout(format!("{} exceeded {}ms", url, opts.timeout.as_millis())))??;
        let extracted = self.extractor.extract(&fetched.html, &fetched.final_url)?;

        let entry = PageContent {
            content: extracted.text.clone(),
            markdown: extracted.markdown.clone(),
            title: extracted.title.clone(),
        };
        if let Err(e) = self.cache.put_page(url, &entry).await {
            tracing::warn!(url, error = %e, "cache write failed");
        }

        Ok(AcquiredPage::from_extraction(url, extracted))
    }

    async fn shape(&self, page: AcquiredPage, opts: &RagOptions) -> PageResult {
        let content = self
            .transformer
            .apply(page.field(opts.output_format), opts.content_mode, opts.summary_model.as_deref())
            .await;
        let (markdown, text, html) = slot_fields(opts.output_format, content);

        let content_handle = (opts.content_mode == ContentMode::Preview).then(|| encode_handle(&page.url));
        let excerpt = (opts.content_mode == ContentMode::Full && !page.excerpt.is_empty()).then_some(page.excerpt);

        PageResult {
            url: page.url,
            title: page.title,
            markdown,
            text,
            html,
            excerpt,
            content_handle,
            from_cache: page.from_cache,
        }
    }

    /// Resolve a content handle to the full page.
    ///
    /// Failures are reported in `error` rather than as `Err`.
    pub async fn fetch_by_handle(&self, handle: &str, format: OutputFormat) -> FetchContentResult {
        let url = match decode_handle(handle) {
            Ok(url) => url,
            Err(e) => return FetchContentResult { error: Some(e.to_string()), ..Default::default() },
        };

        let opts = FetchOptions { javascript: false, timeout: self.fetch_timeout };
        match self.load(&url, &opts).await {
            Ok(page) => {
                let body = page.field(format).to_string();
                let content_length = body.chars().count();
                let (markdown, text, html) = slot_fields(format, body);
                FetchContentResult {
                    url: page.url,
                    title: page.title,
                    markdown,
                    text,
                    html,
                    content_length: Some(content_length),
                    cached: Some(page.from_cache),
                    error: None,
                }
            }
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "content handle fetch failed");
                FetchContentResult { url, error: Some(e.to_string()), ..Default::default() }
            }
        }
    }
}

fn log_reports(reports: &[ProviderReport]) {
    for report in reports {
        tracing::debug!(%report, "provider did not answer");
    }
}

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(feature = "render")]
async fn launch_renderer() -> Option<Arc<dyn Renderer>> {
    match crate::render::HeadlessRenderer::launch().await {
        Ok(renderer) => Some(Arc::new(renderer)),
        Err(e) => {
            tracing::warn!(error = %e, "failed to launch headless browser");
            None
        }
    }
}

#[cfg(not(feature = "render"))]
async fn launch_renderer() -> Option<Arc<dyn Renderer>> {
    None
}
