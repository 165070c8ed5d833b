//! Configuration validation rules.

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid { field: field.into(), reason: reason.into() }
}

fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `max_bytes` is 0 or exceeds 50MB
    /// - `timeout_ms` is outside 100ms..=5min
    /// - `max_concurrency` is outside 1..=16
    /// - `user_agent` is empty
    /// - a search or summary endpoint is not an http(s) URL
    /// - `summary.max_input_chars` is 0
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_bytes == 0 {
            return Err(invalid("max_bytes", "must be greater than 0"));
        }
        if self.max_bytes > 50 * 1024 * 1024 {
            return Err(invalid("max_bytes", "must not exceed 50MB"));
        }

        if self.timeout_ms < 100 {
            return Err(invalid("timeout_ms", "must be at least 100ms"));
        }
        if self.timeout_ms > 300_000 {
            return Err(invalid("timeout_ms", "must not exceed 5 minutes (300000ms)"));
        }

        if !(1..=16).contains(&self.max_concurrency) {
            return Err(invalid("max_concurrency", "must be between 1 and 16"));
        }

        if self.user_agent.is_empty() {
            return Err(invalid("user_agent", "must not be empty"));
        }

        if self.search.local_searxng_enabled && !is_http_url(&self.search.local_searxng_url) {
            return Err(invalid("search.local_searxng_url", "must be an http(s) URL"));
        }
        if let Some(bad) = self.search.public_instances.iter().find(|u| !is_http_url(u)) {
            return Err(ConfigError::Invalid {
                field: "search.public_instances".into(),
                reason: format!("{bad} is not an http(s) URL"),
            });
        }

        if self.summary.enabled && !is_http_url(&self.summary.endpoint) {
            return Err(invalid("summary.endpoint", "must be an http(s) URL"));
        }
        if self.summary.max_input_chars == 0 {
            return Err(invalid("summary.max_input_chars", "must be greater than 0"));
        }
        if self.summary.timeout_ms < 100 {
            return Err(invalid("summary.timeout_ms", "must be at least 100ms"));
        }

        if !self.search.primary_enabled
            && !self.search.local_searxng_enabled
            && self.scraper_api_key().is_none()
            && self.search.public_instances.is_empty()
        {
            tracing::warn!("every search provider is disabled; all queries will fail");
        }

        Ok(())
    }
}
