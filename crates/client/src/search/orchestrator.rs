//! Generic retry-and-fallback driver over an ordered provider list.

use std::sync::Arc;
use std::time::{Duration, Instant};

use isis_core::{AppConfig, Error};
use serde::Serialize;

use super::error::{FailureKind, ProviderError, SearchError};
use super::{
    Availability, DuckDuckGoProvider, SEARCH_USER_AGENT, ScraperApiProvider, SearchHit, SearchProvider,
    SearxngProvider,
};

/// Per-provider retry and timeout settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Wait before the first retry; doubles on each further retry.
    pub backoff_base: Duration,
    /// Upper bound for one attempt.
    pub timeout: Duration,
}

impl RetryPolicy {
    /// Scraped primary provider: 3 attempts, 2s base backoff, 10s per attempt.
    pub const PRIMARY: Self =
        Self { max_attempts: 3, backoff_base: Duration::from_millis(2000), timeout: Duration::from_secs(10) };

    /// Self-hosted SearXNG: 2 attempts, 1s base backoff, 8s per attempt.
    pub const LOCAL: Self =
        Self { max_attempts: 2, backoff_base: Duration::from_millis(1000), timeout: Duration::from_secs(8) };

    /// Paid scraping proxy: single attempt, 15s.
    pub const PAID: Self =
        Self { max_attempts: 1, backoff_base: Duration::from_millis(1000), timeout: Duration::from_secs(15) };

    /// Public mirrors: single attempt, 10s.
    pub const MIRROR: Self =
        Self { max_attempts: 1, backoff_base: Duration::from_millis(1000), timeout: Duration::from_secs(10) };

    /// Wait before retry number `retry` (0-based).
    pub fn backoff(&self, retry: u32) -> Duration {
        self.backoff_base.saturating_mul(2u32.saturating_pow(retry))
    }
}

/// A provider together with how it is retried.
#[derive(Clone)]
pub struct ProviderSlot {
    pub provider: Arc<dyn SearchProvider>,
    pub policy: RetryPolicy,
}

impl ProviderSlot {
    pub fn new(provider: impl SearchProvider + 'static, policy: RetryPolicy) -> Self {
        Self { provider: Arc::new(provider), policy }
    }
}

/// What happened to one provider during a search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderReport {
    pub provider: String,
    #[serde(flatten)]
    pub status: ReportStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReportStatus {
    /// Not attempted: required credential or service is not configured.
    Skipped { reason: String },
    /// Attempted and gave up after `attempts` tries.
    Failed {
        #[serde(serialize_with = "serialize_kind")]
        kind: FailureKind,
        error: String,
        attempts: u32,
    },
}

fn serialize_kind<S: serde::Serializer>(kind: &FailureKind, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(kind)
}

impl std::fmt::Display for ProviderReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.status {
            ReportStatus::Skipped { reason } => write!(f, "{}: skipped ({})", self.provider, reason),
            ReportStatus::Failed { kind, error, attempts } => {
                write!(f, "{}: {} after {} attempt(s): {}", self.provider, kind, attempts, error)
            }
        }
    }
}

/// Successful search: the winning provider, its hits, and the providers
/// that were skipped or failed before it.
#[derive(Debug, Clone, Serialize)]
pub struct SearchOutcome {
    pub provider: String,
    pub hits: Vec<SearchHit>,
    pub reports: Vec<ProviderReport>,
}

/// Ordered-fallback search over a provider chain.
#[derive(Clone)]
pub struct SearchOrchestrator {
    chain: Vec<ProviderSlot>,
}

impl SearchOrchestrator {
    pub fn new(chain: Vec<ProviderSlot>) -> Self {
        Self { chain }
    }

    /// Build the standard chain from configuration.
    pub fn from_config(config: &AppConfig) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .user_agent(SEARCH_USER_AGENT)
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::HttpError(format!("failed to build search client: {}", e)))?;

        let search = &config.search;
        let mut chain = Vec::new();

        if search.primary_enabled {
            chain.push(ProviderSlot::new(DuckDuckGoProvider::new(http.clone()), RetryPolicy::PRIMARY));
        }

        let mut local = SearxngProvider::local(http.clone(), &search.local_searxng_url);
        if !search.local_searxng_enabled {
            local = local.disabled("disabled in configuration");
        }
        chain.push(ProviderSlot::new(local, RetryPolicy::LOCAL));

        chain.push(ProviderSlot::new(
            ScraperApiProvider::new(http.clone(), config.scraper_api_key().map(str::to_string)),
            RetryPolicy::PAID,
        ));

        for instance in &search.public_instances {
            chain.push(ProviderSlot::new(SearxngProvider::public(http.clone(), instance), RetryPolicy::MIRROR));
        }

        Ok(Self::new(chain))
    }

    /// Provider names in chain order.
    pub fn provider_names(&self) -> Vec<&str> {
        self.chain.iter().map(|slot| slot.provider.name()).collect()
    }

    /// Query providers in order until one returns results.
    ///
    /// # Errors
    ///
    /// `SearchError::AllProvidersExhausted` when every provider was skipped
    /// or failed; the error carries a per-provider summary.
    pub async fn search(&self, query: &str, max_results: usize) -> Result<SearchOutcome, SearchError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(SearchError::InvalidQuery("query cannot be empty".into()));
        }
        let max_results = max_results.max(1);
        let start = Instant::now();
        let mut reports = Vec::new();

        for slot in &self.chain {
            let name = slot.provider.name().to_string();

            if let Availability::Unconfigured(reason) = slot.provider.availability() {
                tracing::info!(provider = %name, %reason, "skipping search provider");
                reports.push(ProviderReport { provider: name, status: ReportStatus::Skipped { reason } });
                continue;
            }

            match self.drive(slot, query, max_results).await {
                Ok(mut hits) => {
                    hits.truncate(max_results);
                    tracing::info!(
                        provider = %name,
                        results = hits.len(),
                        elapsed_ms = start.elapsed().as_millis() as u64,
                        "search succeeded"
                    );
                    return Ok(SearchOutcome { provider: name, hits, reports });
                }
                Err((err, attempts)) => {
                    tracing::warn!(
                        provider = %name,
                        kind = %err.kind,
                        attempts,
                        error = %err.message,
                        "search provider failed"
                    );
                    reports.push(ProviderReport {
                        provider: name,
                        status: ReportStatus::Failed { kind: err.kind, error: err.message, attempts },
                    });
                }
            }
        }

        let summary = if reports.is_empty() {
            "no search providers configured".to_string()
        } else {
            reports.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
        };

        Err(SearchError::AllProvidersExhausted { summary, reports })
    }

    /// Run one provider under its retry policy.
    async fn drive(
        &self, slot: &ProviderSlot, query: &str, max_results: usize,
    ) -> Result<Vec<SearchHit>, (ProviderError, u32)> {
        let policy = slot.policy;
        let mut attempts = 0;

        loop {
            attempts += 1;
            let outcome = tokio::time::timeout(policy.timeout, slot.provider.search(query, max_results)).await;

            let err = match outcome {
                Ok(Ok(hits)) if !hits.is_empty() => return Ok(hits),
                Ok(Ok(_)) => ProviderError::hard("no results"),
                Ok(Err(err)) => err,
                Err(_) => ProviderError::timeout(format!("no response within {}ms", policy.timeout.as_millis())),
            };

            if !err.kind.is_retryable() || attempts >= policy.max_attempts {
                return Err((err, attempts));
            }

            let wait = policy.backoff(attempts - 1);
            tracing::debug!(
                provider = slot.provider.name(),
                attempt = attempts,
                wait_ms = wait.as_millis() as u64,
                "rate limited; backing off"
            );
            tokio::time::sleep(wait).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Provider that replays scripted responses and counts calls.
    struct Scripted {
        name: String,
        responses: Mutex<VecDeque<Result<Vec<SearchHit>, ProviderError>>>,
        delay: Option<Duration>,
        availability: Availability,
        calls: Arc<AtomicUsize>,
    }

    impl Scripted {
        fn new(name: &str, responses: Vec<Result<Vec<SearchHit>, ProviderError>>) -> Self {
            Self {
                name: name.into(),
                responses: Mutex::new(responses.into()),
                delay: None,
                availability: Availability::Ready,
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn slow(name: &str, delay: Duration) -> Self {
            Self { delay: Some(delay), ..Self::new(name, vec![]) }
        }

        fn unconfigured(name: &str) -> Self {
            let availability = Availability::Unconfigured("SCRAPER_API_KEY not set".into());
            Self { availability, ..Self::new(name, vec![]) }
        }

        fn calls(&self) -> Arc<AtomicUsize> {
            self.calls.clone()
        }
    }

    #[async_trait::async_trait]
    impl SearchProvider for Scripted {
        fn name(&self) -> &str {
            &self.name
        }

        fn availability(&self) -> Availability {
            self.availability.clone()
        }

        async fn search(&self, _query: &str, _max_results: usize) -> Result<Vec<SearchHit>, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(ProviderError::hard("script exhausted")))
        }
    }

    fn hits(n: usize) -> Vec<SearchHit> {
        (0..n)
            .map(|i| SearchHit {
                url: format!("https://example.com/{i}"),
                title: format!("Result {i}"),
                description: String::new(),
            })
            .collect()
    }

    fn fast(max_attempts: u32) -> RetryPolicy {
        RetryPolicy { max_attempts, backoff_base: Duration::from_millis(1), timeout: Duration::from_millis(200) }
    }

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy::PRIMARY;
        assert_eq!(policy.backoff(0), Duration::from_millis(2000));
        assert_eq!(policy.backoff(1), Duration::from_millis(4000));
        assert_eq!(policy.backoff(2), Duration::from_millis(8000));
    }

    #[tokio::test]
    async fn test_first_success_wins() {
        let second = Scripted::new("second", vec![Ok(hits(2))]);
        let second_calls = second.calls();
        let orchestrator = SearchOrchestrator::new(vec![
            ProviderSlot::new(Scripted::new("first", vec![Ok(hits(5))]), fast(1)),
            ProviderSlot::new(second, fast(1)),
        ]);

        let outcome = orchestrator.search("rust", 3).await.unwrap();
        assert_eq!(outcome.provider, "first");
        assert_eq!(outcome.hits.len(), 3);
        assert!(outcome.reports.is_empty());
        assert_eq!(second_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_rate_limited_retries_then_succeeds() {
        let primary = Scripted::new(
            "primary",
            vec![
                Err(ProviderError::rate_limited("HTTP 429")),
                Err(ProviderError::rate_limited("HTTP 429")),
                Ok(hits(1)),
            ],
        );
        let calls = primary.calls();
        let orchestrator = SearchOrchestrator::new(vec![ProviderSlot::new(primary, fast(3))]);

        let outcome = orchestrator.search("rust", 5).await.unwrap();
        assert_eq!(outcome.provider, "primary");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_hard_failure_is_not_retried() {
        let primary = Scripted::new("primary", vec![Err(ProviderError::hard("HTTP 404")), Ok(hits(1))]);
        let calls = primary.calls();
        let orchestrator = SearchOrchestrator::new(vec![
            ProviderSlot::new(primary, fast(3)),
            ProviderSlot::new(Scripted::new("backup", vec![Ok(hits(1))]), fast(1)),
        ]);

        let outcome = orchestrator.search("rust", 5).await.unwrap();
        assert_eq!(outcome.provider, "backup");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(
            outcome.reports[0].status,
            ReportStatus::Failed { kind: FailureKind::Hard, attempts: 1, .. }
        ));
    }

    #[tokio::test]
    async fn test_empty_results_advance_chain() {
        let orchestrator = SearchOrchestrator::new(vec![
            ProviderSlot::new(Scripted::new("empty", vec![Ok(vec![])]), fast(2)),
            ProviderSlot::new(Scripted::new("full", vec![Ok(hits(2))]), fast(1)),
        ]);

        let outcome = orchestrator.search("rust", 5).await.unwrap();
        assert_eq!(outcome.provider, "full");
        assert_eq!(outcome.reports[0].to_string(), "empty: failed after 1 attempt(s): no results");
    }

    #[tokio::test]
    async fn test_fallback_stops_at_first_success() {
        let later = Scripted::new("p4", vec![Ok(hits(1))]);
        let later_calls = later.calls();
        let orchestrator = SearchOrchestrator::new(vec![
            ProviderSlot::new(
                Scripted::new(
                    "p1",
                    vec![Err(ProviderError::rate_limited("429")), Err(ProviderError::rate_limited("429"))],
                ),
                fast(2),
            ),
            ProviderSlot::new(Scripted::new("p2", vec![Err(ProviderError::rate_limited("503"))]), fast(1)),
            ProviderSlot::new(Scripted::new("p3", vec![Ok(hits(4))]), fast(1)),
            ProviderSlot::new(later, fast(1)),
        ]);

        let outcome = orchestrator.search("rust", 10).await.unwrap();
        assert_eq!(outcome.provider, "p3");
        assert_eq!(outcome.hits.len(), 4);
        assert_eq!(outcome.reports.len(), 2);
        assert_eq!(later_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_public_mirror_answers_after_three_failures() {
        let primary = Scripted::new(
            "duckduckgo",
            vec![
                Err(ProviderError::rate_limited("HTTP 429")),
                Err(ProviderError::rate_limited("HTTP 429")),
                Err(ProviderError::rate_limited("HTTP 429")),
            ],
        );
        let primary_calls = primary.calls();
        let mirror_results = vec![
            SearchHit {
                url: "https://doc.rust-lang.org/book/ch04-01-what-is-ownership.html".into(),
                title: "What is Ownership?".into(),
                description: "Ownership is a set of rules".into(),
            },
            SearchHit {
                url: "https://blog.rust-lang.org/ownership".into(),
                title: "Ownership".into(),
                description: String::new(),
            },
            SearchHit {
                url: "https://rustwiki.org/ownership".into(),
                title: "Rust Wiki".into(),
                description: String::new(),
            },
        ];

        let orchestrator = SearchOrchestrator::new(vec![
            ProviderSlot::new(primary, fast(3)),
            ProviderSlot::new(Scripted::slow("searxng-local", Duration::from_secs(5)), fast(1)),
            ProviderSlot::new(Scripted::new("scraperapi", vec![Err(ProviderError::rate_limited("HTTP 503"))]), fast(1)),
            ProviderSlot::new(Scripted::new("searx.be", vec![Ok(mirror_results.clone())]), fast(1)),
            ProviderSlot::new(Scripted::new("search.bus-hit.me", vec![Ok(hits(9))]), fast(1)),
        ]);

        let outcome = orchestrator.search("rust ownership", 5).await.unwrap();
        assert_eq!(outcome.provider, "searx.be");
        assert_eq!(outcome.hits, mirror_results);
        assert_eq!(primary_calls.load(Ordering::SeqCst), 3);

        let failed: Vec<(&str, FailureKind)> = outcome
            .reports
            .iter()
            .map(|r| match &r.status {
                ReportStatus::Failed { kind, .. } => (r.provider.as_str(), *kind),
                ReportStatus::Skipped { .. } => panic!("nothing should be skipped"),
            })
            .collect();
        assert_eq!(
            failed,
            vec![
                ("duckduckgo", FailureKind::RateLimited),
                ("searxng-local", FailureKind::Timeout),
                ("scraperapi", FailureKind::RateLimited),
            ]
        );
    }

    #[tokio::test]
    async fn test_unconfigured_provider_is_skipped_not_failed() {
        let paid = Scripted::unconfigured("scraperapi");
        let paid_calls = paid.calls();
        let orchestrator = SearchOrchestrator::new(vec![
            ProviderSlot::new(paid, fast(1)),
            ProviderSlot::new(Scripted::new("mirror", vec![Ok(hits(1))]), fast(1)),
        ]);

        let outcome = orchestrator.search("rust", 5).await.unwrap();
        assert_eq!(outcome.provider, "mirror");
        assert_eq!(paid_calls.load(Ordering::SeqCst), 0);
        assert!(matches!(outcome.reports[0].status, ReportStatus::Skipped { .. }));
    }

    #[tokio::test]
    async fn test_all_providers_exhausted() {
        let orchestrator = SearchOrchestrator::new(vec![
            ProviderSlot::new(Scripted::new("a", vec![Err(ProviderError::hard("HTTP 500"))]), fast(1)),
            ProviderSlot::new(Scripted::unconfigured("b"), fast(1)),
        ]);

        let err = orchestrator.search("rust", 5).await.unwrap_err();
        match err {
            SearchError::AllProvidersExhausted { summary, reports } => {
                assert_eq!(reports.len(), 2);
                assert!(summary.contains("a: failed after 1 attempt(s): HTTP 500"));
                assert!(summary.contains("b: skipped"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_empty_chain_and_empty_query() {
        let orchestrator = SearchOrchestrator::new(vec![]);
        assert!(matches!(
            orchestrator.search("rust", 5).await,
            Err(SearchError::AllProvidersExhausted { ref summary, .. }) if summary == "no search providers configured"
        ));
        assert!(matches!(orchestrator.search("   ", 5).await, Err(SearchError::InvalidQuery(_))));
    }

    #[test]
    fn test_from_config_chain_order() {
        let config = AppConfig::default();
        let orchestrator = SearchOrchestrator::from_config(&config).unwrap();
        assert_eq!(
            orchestrator.provider_names(),
            vec!["duckduckgo", "searxng-local", "scraperapi", "searx.be", "search.bus-hit.me", "searx.tiekoetter.com"]
        );
    }

    #[test]
    fn test_report_serialization() {
        let report = ProviderReport {
            provider: "searx.be".into(),
            status: ReportStatus::Failed { kind: FailureKind::RateLimited, error: "HTTP 429".into(), attempts: 1 },
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["provider"], "searx.be");
        assert_eq!(json["status"], "failed");
        assert_eq!(json["kind"], "rate limited");
    }
}
