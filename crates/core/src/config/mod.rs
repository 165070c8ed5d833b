//! Application configuration with layered loading.
//!
//! Loading precedence (highest wins):
//! 1. Environment variables (`ISIS_*`, nested sections split on `__`)
//! 2. The bare `SCRAPER_API_KEY` variable
//! 3. TOML config file (if `ISIS_CONFIG_FILE` is set)
//! 4. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Public SearXNG mirrors tried, in order, after every other provider.
pub const DEFAULT_PUBLIC_INSTANCES: &[&str] =
    &["https://searx.be", "https://search.bus-hit.me", "https://searx.tiekoetter.com"];

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the SQLite page cache.
    ///
    /// Set via ISIS_DB_PATH. Defaults to `~/.isis-mcp-cache.db`.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// User-Agent for page fetches.
    ///
    /// Set via ISIS_USER_AGENT.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum bytes to fetch per page.
    ///
    /// Set via ISIS_MAX_BYTES.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// Default page fetch timeout in milliseconds.
    ///
    /// Set via ISIS_TIMEOUT_MS.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum pages acquired concurrently for one query.
    ///
    /// Set via ISIS_MAX_CONCURRENCY.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Whether javascript rendering (headless browser) is enabled.
    ///
    /// Set via ISIS_RENDER_ENABLED.
    #[serde(default)]
    pub render_enabled: bool,

    /// Allow page fetches to private, loopback and link-local addresses.
    ///
    /// Set via ISIS_ALLOW_PRIVATE_HOSTS.
    #[serde(default)]
    pub allow_private_hosts: bool,

    /// ScraperAPI key gating the paid search provider.
    ///
    /// Set via SCRAPER_API_KEY or ISIS_SCRAPER_API_KEY.
    #[serde(default)]
    pub scraper_api_key: Option<String>,

    /// Search provider chain settings.
    #[serde(default)]
    pub search: SearchConfig,

    /// Summarization service settings.
    #[serde(default)]
    pub summary: SummaryConfig,
}

/// Search provider chain settings (`ISIS_SEARCH__*`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Scrape the DuckDuckGo HTML endpoint as the first provider.
    #[serde(default = "default_true")]
    pub primary_enabled: bool,

    /// Query the self-hosted SearXNG instance.
    #[serde(default = "default_true")]
    pub local_searxng_enabled: bool,

    /// Base URL of the self-hosted SearXNG instance.
    #[serde(default = "default_local_searxng_url")]
    pub local_searxng_url: String,

    /// Public SearXNG mirrors, in fallback order.
    #[serde(default = "default_public_instances")]
    pub public_instances: Vec<String>,
}

/// Summarization service settings (`ISIS_SUMMARY__*`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryConfig {
    /// Whether summary mode may call the service at all.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Ollama-compatible base URL.
    #[serde(default = "default_summary_endpoint")]
    pub endpoint: String,

    /// Model used when the caller does not name one.
    #[serde(default = "default_summary_model")]
    pub model: String,

    /// Timeout for one summarization call in milliseconds.
    #[serde(default = "default_summary_timeout_ms")]
    pub timeout_ms: u64,

    /// Content is cut to this many characters before summarizing.
    #[serde(default = "default_max_input_chars")]
    pub max_input_chars: usize,
}

fn default_db_path() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".isis-mcp-cache.db"))
        .unwrap_or_else(|| PathBuf::from("./isis-mcp-cache.db"))
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (compatible; isis-mcp/0.1)".into()
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_max_concurrency() -> usize {
    4
}

fn default_true() -> bool {
    true
}

fn default_local_searxng_url() -> String {
    "http://localhost:8080".into()
}

fn default_public_instances() -> Vec<String> {
    DEFAULT_PUBLIC_INSTANCES.iter().map(|s| s.to_string()).collect()
}

fn default_summary_endpoint() -> String {
    "http://127.0.0.1:11434".into()
}

fn default_summary_model() -> String {
    "llama3.2:1b".into()
}

fn default_summary_timeout_ms() -> u64 {
    60_000
}

fn default_max_input_chars() -> usize {
    8_000
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            user_agent: default_user_agent(),
            max_bytes: default_max_bytes(),
            timeout_ms: default_timeout_ms(),
            max_concurrency: default_max_concurrency(),
            render_enabled: false,
            allow_private_hosts: false,
            scraper_api_key: None,
            search: SearchConfig::default(),
            summary: SummaryConfig::default(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            primary_enabled: true,
            local_searxng_enabled: true,
            local_searxng_url: default_local_searxng_url(),
            public_instances: default_public_instances(),
        }
    }
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: default_summary_endpoint(),
            model: default_summary_model(),
            timeout_ms: default_summary_timeout_ms(),
            max_input_chars: default_max_input_chars(),
        }
    }
}

impl SummaryConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl AppConfig {
    /// Page fetch timeout as a Duration.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file or environment cannot be parsed,
    /// or if validation fails after loading.
    pub fn load() -> Result<Self, ConfigError> {
        let config: Self = Self::figment()
            .extract()
            .map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    fn figment() -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("ISIS_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment
            .merge(Env::raw().only(&["SCRAPER_API_KEY"]).map(|key| key.as_str().to_lowercase().into()))
            .merge(
                Env::prefixed("ISIS_")
                    .ignore(&["CONFIG_FILE"])
                    .map(|key| key.as_str().to_lowercase().into())
                    .split("__"),
            )
    }

    /// The ScraperAPI key, treating a blank value as unset.
    pub fn scraper_api_key(&self) -> Option<&str> {
        self.scraper_api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }
}
