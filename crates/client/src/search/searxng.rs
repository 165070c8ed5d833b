//! SearXNG JSON API, self-hosted or public mirror.

use reqwest::Client;
use serde::Deserialize;
use url::Url;

use super::error::ProviderError;
use super::{Availability, SearchHit, SearchProvider};

#[derive(Debug, Deserialize)]
struct SearxngResponse {
    #[serde(default)]
    results: Vec<SearxngResult>,
}

#[derive(Debug, Deserialize)]
struct SearxngResult {
    url: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    content: String,
}

impl From<SearxngResult> for SearchHit {
    fn from(raw: SearxngResult) -> Self {
        Self { url: raw.url, title: raw.title.trim().to_string(), description: raw.content.trim().to_string() }
    }
}

/// One SearXNG instance.
pub struct SearxngProvider {
    http: Client,
    name: String,
    base_url: String,
    /// Self-hosted instances get forwarded-for headers so their limiter
    /// treats the request as local.
    local: bool,
    disabled: Option<String>,
}

impl SearxngProvider {
    /// The self-hosted instance, named `searxng-local`.
    pub fn local(http: Client, base_url: &str) -> Self {
        Self {
            http,
            name: "searxng-local".into(),
            base_url: base_url.trim_end_matches('/').to_string(),
            local: true,
            disabled: None,
        }
    }

    /// A public mirror, named after its host.
    pub fn public(http: Client, base_url: &str) -> Self {
        let name = Url::parse(base_url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_else(|| base_url.to_string());
        Self { http, name, base_url: base_url.trim_end_matches('/').to_string(), local: false, disabled: None }
    }

    /// Keep the provider in the chain but report it as skipped.
    pub fn disabled(mut self, reason: impl Into<String>) -> Self {
        self.disabled = Some(reason.into());
        self
    }
}

#[async_trait::async_trait]
impl SearchProvider for SearxngProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn availability(&self) -> Availability {
        match &self.disabled {
            Some(reason) => Availability::Unconfigured(reason.clone()),
            None => Availability::Ready,
        }
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>, ProviderError> {
        let url = format!("{}/search", self.base_url);
        let count = max_results.to_string();
        tracing::debug!(provider = %self.name, query, "querying searxng");

        let mut request = self
            .http
            .get(&url)
            .query(&[("q", query), ("format", "json"), ("number_of_results", count.as_str())])
            .header("Accept", "application/json");

        if self.local {
            request = request.header("X-Forwarded-For", "127.0.0.1").header("X-Real-IP", "127.0.0.1");
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ProviderError::from_status(status, &body));
        }

        let parsed: SearxngResponse = serde_json::from_str(&body)
            .map_err(|e| ProviderError::hard(format!("invalid JSON from {}: {}", self.name, e)))?;

        Ok(parsed
            .results
            .into_iter()
            .filter(|r| r.url.starts_with("http://") || r.url.starts_with("https://"))
            .take(max_results)
            .map(SearchHit::from)
            .collect())
    }
}
