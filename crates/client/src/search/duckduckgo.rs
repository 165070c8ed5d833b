//! DuckDuckGo HTML endpoint, scraped directly or through ScraperAPI.

use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use super::error::{ProviderError, has_rate_limit_signature};
use super::{Availability, SearchHit, SearchProvider};

const DUCKDUCKGO_HTML_URL: &str = "https://html.duckduckgo.com/html/";
const SCRAPERAPI_URL: &str = "http://api.scraperapi.com/";

/// Parse DuckDuckGo's HTML result page.
///
/// Results without a title or an absolute http(s) destination are dropped.
pub fn parse_results(html: &str, max_results: usize) -> Vec<SearchHit> {
    let (Ok(result_sel), Ok(link_sel), Ok(snippet_sel)) = (
        Selector::parse(".result"),
        Selector::parse("a.result__a"),
        Selector::parse(".result__snippet"),
    ) else {
        return Vec::new();
    };

    let document = Html::parse_document(html);
    let mut hits = Vec::new();

    for result in document.select(&result_sel) {
        if hits.len() >= max_results {
            break;
        }

        let Some(link) = result.select(&link_sel).next() else {
            continue;
        };
        let title = collapse_text(link);
        let Some(url) = link.value().attr("href").and_then(resolve_href) else {
            continue;
        };
        if title.is_empty() {
            continue;
        }

        let description = result.select(&snippet_sel).next().map(collapse_text).unwrap_or_default();
        hits.push(SearchHit { url, title, description });
    }

    hits
}

fn collapse_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Resolve a result href, unwrapping `/l/?uddg=` redirect links.
fn resolve_href(href: &str) -> Option<String> {
    let absolute = if href.starts_with("//") { format!("https:{href}") } else { href.to_string() };
    let parsed = Url::parse(&absolute).ok()?;

    if let Some((_, target)) = parsed.query_pairs().find(|(key, _)| key == "uddg") {
        let target = Url::parse(&target).ok()?;
        return matches!(target.scheme(), "http" | "https").then(|| target.to_string());
    }

    matches!(parsed.scheme(), "http" | "https").then(|| parsed.to_string())
}

/// Turn a fetched results page into hits, treating throttle pages as rate limiting.
fn interpret_page(body: &str, max_results: usize) -> Result<Vec<SearchHit>, ProviderError> {
    let hits = parse_results(body, max_results);
    if hits.is_empty() && has_rate_limit_signature(body) {
        return Err(ProviderError::rate_limited("throttling page returned"));
    }
    Ok(hits)
}

/// Scrapes `html.duckduckgo.com` directly.
pub struct DuckDuckGoProvider {
    http: Client,
    endpoint: String,
}

impl DuckDuckGoProvider {
    pub fn new(http: Client) -> Self {
        Self { http, endpoint: DUCKDUCKGO_HTML_URL.to_string() }
    }

    /// Point at a different results endpoint.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait::async_trait]
impl SearchProvider for DuckDuckGoProvider {
    fn name(&self) -> &str {
        "duckduckgo"
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>, ProviderError> {
        tracing::debug!(query, "querying duckduckgo");

        let response = self
            .http
            .get(&self.endpoint)
            .query(&[("q", query)])
            .header("Accept", "text/html")
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ProviderError::from_status(status, &body));
        }

        interpret_page(&body, max_results)
    }
}

/// Fetches the DuckDuckGo results page through ScraperAPI.
pub struct ScraperApiProvider {
    http: Client,
    api_key: Option<String>,
    endpoint: String,
    target: String,
}

impl ScraperApiProvider {
    pub fn new(http: Client, api_key: Option<String>) -> Self {
        Self {
            http,
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            endpoint: SCRAPERAPI_URL.to_string(),
            target: DUCKDUCKGO_HTML_URL.to_string(),
        }
    }

    /// Point at a different proxy endpoint.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    fn target_url(&self, query: &str) -> String {
        match Url::parse_with_params(&self.target, &[("q", query)]) {
            Ok(url) => url.to_string(),
            Err(_) => self.target.clone(),
        }
    }
}

#[async_trait::async_trait]
impl SearchProvider for ScraperApiProvider {
    fn name(&self) -> &str {
        "scraperapi"
    }

    fn availability(&self) -> Availability {
        match self.api_key {
            Some(_) => Availability::Ready,
            None => Availability::Unconfigured("SCRAPER_API_KEY not set".into()),
        }
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>, ProviderError> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(ProviderError::hard("SCRAPER_API_KEY not set"));
        };
        let target = self.target_url(query);
        tracing::debug!(query, "querying duckduckgo through scraperapi");

        let response = self
            .http
            .get(&self.endpoint)
            .query(&[("api_key", api_key), ("url", target.as_str())])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ProviderError::from_status(status, &body));
        }

        interpret_page(&body, max_results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::FailureKind;
    use axum::{Router, extract::Query, http::StatusCode, routing::get};
    use std::collections::HashMap;

    const FIXTURE: &str = r#"
        <html><body>
          <div class="result results_links web-result">
            <h2 class="result__title">
              <a class="result__a"
                 href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fdoc.rust-lang.org%2Fbook%2Fch04-01.html&amp;rut=abc">
                What is <b>Ownership</b>? - The Rust Programming Language
              </a>
            </h2>
            <a class="result__snippet" href="#">
              Ownership is a set of rules that govern how a Rust program manages memory.
            </a>
          </div>
          <div class="result">
            <a class="result__a" href="https://blog.rust-lang.org/ownership">Ownership explained</a>
          </div>
          <div class="result">
            <a class="result__a" href="javascript:void(0)">Ad</a>
          </div>
          <div class="result">
            <a class="result__a" href="https://example.com/third">Third</a>
            <div class="result__snippet">third snippet</div>
          </div>
        </body></html>
    "#;

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[test]
    fn test_parse_results_fixture() {
        let hits = parse_results(FIXTURE, 10);
        assert_eq!(hits.len(), 3);

        assert_eq!(hits[0].url, "https://doc.rust-lang.org/book/ch04-01.html");
        assert_eq!(hits[0].title, "What is Ownership? - The Rust Programming Language");
        assert!(hits[0].description.starts_with("Ownership is a set of rules"));

        assert_eq!(hits[1].url, "https://blog.rust-lang.org/ownership");
        assert_eq!(hits[1].description, "");

        assert_eq!(hits[2].description, "third snippet");
    }

    #[test]
    fn test_parse_results_respects_max() {
        assert_eq!(parse_results(FIXTURE, 1).len(), 1);
        assert!(parse_results("<html><body>No results.</body></html>", 5).is_empty());
    }

    #[test]
    fn test_resolve_href() {
        assert_eq!(
            resolve_href("https://duckduckgo.com/l/?uddg=https%3A%2F%2Fexample.com%2Fa%3Fb%3D1&rut=x").as_deref(),
            Some("https://example.com/a?b=1")
        );
        assert_eq!(resolve_href("/relative/path"), None);
        assert_eq!(resolve_href("ftp://example.com/file"), None);
    }

    #[test]
    fn test_throttle_page_is_rate_limited() {
        let body = "<html><body>If this error persists, our systems detected an anomaly.</body></html>";
        let err = interpret_page(body, 5).unwrap_err();
        assert_eq!(err.kind, FailureKind::RateLimited);
    }

    #[tokio::test]
    async fn test_duckduckgo_provider_against_mock() {
        let router = Router::new().route(
            "/html/",
            get(|Query(params): Query<HashMap<String, String>>| async move {
                assert_eq!(params.get("q").map(String::as_str), Some("rust ownership"));
                FIXTURE
            }),
        );
        let base = serve(router).await;

        let provider = DuckDuckGoProvider::new(Client::new()).with_endpoint(format!("{base}/html/"));
        let hits = provider.search("rust ownership", 2).await.unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[tokio::test]
    async fn test_duckduckgo_provider_429() {
        let router = Router::new().route("/html/", get(|| async { (StatusCode::TOO_MANY_REQUESTS, "slow down") }));
        let base = serve(router).await;

        let provider = DuckDuckGoProvider::new(Client::new()).with_endpoint(format!("{base}/html/"));
        let err = provider.search("rust", 5).await.unwrap_err();
        assert_eq!(err.kind, FailureKind::RateLimited);
    }

    #[tokio::test]
    async fn test_scraperapi_forwards_key_and_target() {
        let router = Router::new().route(
            "/",
            get(|Query(params): Query<HashMap<String, String>>| async move {
                assert_eq!(params.get("api_key").map(String::as_str), Some("secret"));
                let target = params.get("url").cloned().unwrap_or_default();
                assert!(target.starts_with("https://html.duckduckgo.com/html/?q=rust"));
                FIXTURE
            }),
        );
        let base = serve(router).await;

        let provider =
            ScraperApiProvider::new(Client::new(), Some("secret".into())).with_endpoint(format!("{base}/"));
        assert_eq!(provider.availability(), Availability::Ready);
        let hits = provider.search("rust", 5).await.unwrap();
        assert_eq!(hits.len(), 3);
    }

    #[test]
    fn test_scraperapi_without_key_is_unconfigured() {
        let provider = ScraperApiProvider::new(Client::new(), None);
        assert!(matches!(provider.availability(), Availability::Unconfigured(_)));

        let provider = ScraperApiProvider::new(Client::new(), Some("  ".into()));
        assert!(matches!(provider.availability(), Availability::Unconfigured(_)));
    }
}
