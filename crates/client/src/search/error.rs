//! Search failure types and rate-limit classification.

use std::fmt;

/// Response fragments that mark a throttling or bot-wall response.
pub const RATE_LIMIT_SIGNATURES: &[&str] =
    &["rate limit", "too quickly", "anomaly", "cloudflare", "service unavailable", "too many requests"];

/// How a single provider attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Throttled; eligible for backoff and retry on the same provider.
    RateLimited,
    /// No response within the attempt's time bound.
    Timeout,
    /// Anything else, including an empty result list.
    Hard,
}

impl FailureKind {
    pub fn is_retryable(self) -> bool {
        matches!(self, FailureKind::RateLimited)
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FailureKind::RateLimited => "rate limited",
            FailureKind::Timeout => "timeout",
            FailureKind::Hard => "failed",
        };
        f.write_str(label)
    }
}

/// A classified failure from one provider attempt.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct ProviderError {
    pub kind: FailureKind,
    pub message: String,
}

impl ProviderError {
    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self { kind: FailureKind::RateLimited, message: message.into() }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self { kind: FailureKind::Timeout, message: message.into() }
    }

    pub fn hard(message: impl Into<String>) -> Self {
        Self { kind: FailureKind::Hard, message: message.into() }
    }

    /// Classify a non-success HTTP response.
    ///
    /// 429 and 503 are throttling regardless of body; other statuses are
    /// throttling only when the body carries a known signature.
    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let message = format!("HTTP {}", status.as_u16());
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status == reqwest::StatusCode::SERVICE_UNAVAILABLE {
            return Self::rate_limited(message);
        }
        if has_rate_limit_signature(body) {
            return Self::rate_limited(format!("{message}: throttling page"));
        }
        Self::hard(message)
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return Self::timeout(err.to_string());
        }
        if let Some(status) = err.status() {
            return Self::from_status(status, "");
        }
        Self::hard(format!("network error: {err}"))
    }
}

/// Whether free text looks like a throttling response.
pub fn has_rate_limit_signature(text: &str) -> bool {
    let lowered = text.to_lowercase();
    RATE_LIMIT_SIGNATURES.iter().any(|sig| lowered.contains(sig))
}

/// Failures of the search phase as a whole.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SearchError {
    /// The query was empty.
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// Every provider was skipped or failed.
    #[error("all search providers failed: {summary}")]
    AllProvidersExhausted { summary: String, reports: Vec<super::ProviderReport> },
}

impl From<SearchError> for isis_core::Error {
    fn from(err: SearchError) -> Self {
        match err {
            SearchError::InvalidQuery(msg) => isis_core::Error::InvalidInput(msg),
            SearchError::AllProvidersExhausted { summary, .. } => isis_core::Error::SearchFailed(summary),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_status_classification() {
        assert_eq!(
            ProviderError::from_status(StatusCode::TOO_MANY_REQUESTS, "").kind,
            FailureKind::RateLimited
        );
        assert_eq!(
            ProviderError::from_status(StatusCode::SERVICE_UNAVAILABLE, "").kind,
            FailureKind::RateLimited
        );
        assert_eq!(ProviderError::from_status(StatusCode::NOT_FOUND, "").kind, FailureKind::Hard);
        assert_eq!(
            ProviderError::from_status(StatusCode::INTERNAL_SERVER_ERROR, "oops").kind,
            FailureKind::Hard
        );
    }

    #[test]
    fn test_body_signature_classification() {
        let err = ProviderError::from_status(StatusCode::FORBIDDEN, "<title>Attention Required! | Cloudflare</title>");
        assert_eq!(err.kind, FailureKind::RateLimited);

        assert!(has_rate_limit_signature("You are making requests Too Quickly"));
        assert!(has_rate_limit_signature("If this error persists, please let us know: anomaly detected"));
        assert!(!has_rate_limit_signature("No results found for your query"));
    }

    #[test]
    fn test_only_rate_limited_is_retryable() {
        assert!(FailureKind::RateLimited.is_retryable());
        assert!(!FailureKind::Timeout.is_retryable());
        assert!(!FailureKind::Hard.is_retryable());
    }

    #[test]
    fn test_provider_error_display() {
        let err = ProviderError::rate_limited("HTTP 429");
        assert_eq!(err.to_string(), "rate limited: HTTP 429");
    }

    #[test]
    fn test_search_error_into_core_error() {
        let err = SearchError::AllProvidersExhausted { summary: "duckduckgo: timeout".into(), reports: vec![] };
        let core: isis_core::Error = err.into();
        assert!(matches!(core, isis_core::Error::SearchFailed(ref s) if s == "duckduckgo: timeout"));
    }
}
