//! HTTP page acquisition with address gating and size limits.
//!
//! ### URL handling
//! - Trim whitespace, default scheme to `https`, lowercase host, drop fragment.
//! - Refuse hosts that are, or resolve to, private or reserved addresses
//!   unless private hosts are explicitly allowed. Redirect hops to literal
//!   private addresses are refused the same way.
//!
//! ### Limits
//! - Per-request timeout, overridable per call.
//! - Max redirects: 5.
//! - Body is read incrementally and abandoned once it passes `max_bytes`.
//!
//! ### Rendering
//! - A `WebPageFetcher` routes javascript requests to a `Renderer` when one
//!   is configured and falls back to a plain GET otherwise.
//! - Screenshots always need a renderer and fail with `RenderDisabled`
//!   without one.

pub mod guard;

use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use reqwest::{Client, header};
use url::Url;

pub use guard::{canonicalize, ensure_public, is_private_or_reserved};

use crate::render::{RenderOptions, Renderer, Screenshot, ScreenshotOptions};
use isis_core::{AppConfig, Error};

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub user_agent: String,

    /// Maximum response body size in bytes.
    pub max_bytes: usize,

    /// Default request timeout.
    pub timeout: Duration,

    pub max_redirects: usize,

    /// Permit loopback and private-range targets.
    pub allow_private_hosts: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (compatible; isis-mcp/0.1)".to_string(),
            max_bytes: 5 * 1024 * 1024,
            timeout: Duration::from_millis(30_000),
            max_redirects: 5,
            allow_private_hosts: false,
        }
    }
}

impl From<&AppConfig> for FetchConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            max_bytes: config.max_bytes,
            timeout: config.timeout(),
            allow_private_hosts: config.allow_private_hosts,
            ..Default::default()
        }
    }
}

/// Response from a fetch operation.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    /// The final URL after redirects.
    pub final_url: Url,
    pub bytes: Bytes,
}

impl FetchResponse {
    /// Body decoded as UTF-8, replacing invalid sequences.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}

/// HTTP fetch client with safety checks.
#[derive(Clone)]
pub struct FetchClient {
    http: Client,
    config: FetchConfig,
}

impl FetchClient {
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let max_redirects = config.max_redirects;
        let allow_private = config.allow_private_hosts;
        let redirect = reqwest::redirect::Policy::custom(move |attempt| {
            if attempt.previous().len() > max_redirects {
                return attempt.error("too many redirects");
            }
            let blocked = match attempt.url().host() {
                Some(url::Host::Ipv4(ip)) => is_private_or_reserved(ip.into()),
                Some(url::Host::Ipv6(ip)) => is_private_or_reserved(ip.into()),
                Some(url::Host::Domain(d)) => d.eq_ignore_ascii_case("localhost"),
                None => true,
            };
            if blocked && !allow_private {
                return attempt.error("redirect to non-public address");
            }
            attempt.follow()
        });

        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(redirect)
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::HttpError(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }

    /// Validate a URL for fetching: canonical form, then address gating.
    pub async fn prepare(&self, url_str: &str) -> Result<Url, Error> {
        let url = canonicalize(url_str)?;
        if !self.config.allow_private_hosts {
            ensure_public(&url).await?;
        }
        Ok(url)
    }

    /// Fetch a URL, returning raw bytes and metadata.
    ///
    /// `timeout` overrides the configured default for this request.
    pub async fn fetch(&self, url_str: &str, timeout: Option<Duration>) -> Result<FetchResponse, Error> {
        let start = Instant::now();
        let url = self.prepare(url_str).await?;
        let timeout = timeout.unwrap_or(self.config.timeout);

        let mut response = self
            .http
            .get(url.as_str())
            .timeout(timeout)
            .header(header::ACCEPT, "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8")
            .send()
            .await
            .map_err(|e| transport_error(e, timeout))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::HttpError(format!("status {}", status.as_u16())));
        }

        let max_bytes = self.config.max_bytes;
        if let Some(len) = response.content_length()
            && len as usize > max_bytes
        {
            return Err(Error::FetchTooLarge(format!("{} bytes exceeds {}", len, max_bytes)));
        }

        let final_url = response.url().clone();

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(|e| transport_error(e, timeout))? {
            if body.len() + chunk.len() > max_bytes {
                return Err(Error::FetchTooLarge(format!("body exceeds {} bytes", max_bytes)));
            }
            body.extend_from_slice(&chunk);
        }

        let fetch_ms = start.elapsed().as_millis() as u64;
        tracing::debug!(%url, %final_url, fetch_ms, bytes = body.len(), "fetched page");

        Ok(FetchResponse { final_url, bytes: Bytes::from(body) })
    }
}

fn transport_error(err: reqwest::Error, timeout: Duration) -> Error {
    if err.is_timeout() {
        Error::FetchTimeout(format!("no response within {}ms", timeout.as_millis()))
    } else {
        Error::HttpError(format!("network error: {}", err))
    }
}

/// Per-page acquisition options.
#[derive(Debug, Clone, Copy)]
pub struct FetchOptions {
    /// Render with a headless browser instead of a plain GET.
    pub javascript: bool,
    pub timeout: Duration,
}

/// Raw HTML of an acquired page.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub html: String,
    pub final_url: Url,
}

/// Source of page HTML (and, with a browser, screenshots) for the pipeline.
#[async_trait::async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch_page(&self, url: &str, opts: &FetchOptions) -> Result<FetchedPage, Error>;

    async fn screenshot(&self, _url: &str, _opts: &ScreenshotOptions) -> Result<Screenshot, Error> {
        Err(Error::RenderDisabled)
    }
}

/// Plain HTTP fetching with optional headless rendering.
pub struct WebPageFetcher {
    client: FetchClient,
    renderer: Option<Arc<dyn Renderer>>,
}

impl WebPageFetcher {
    pub fn new(client: FetchClient) -> Self {
        Self { client, renderer: None }
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn Renderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }
}

#[async_trait::async_trait]
impl PageFetcher for WebPageFetcher {
    async fn fetch_page(&self, url: &str, opts: &FetchOptions) -> Result<FetchedPage, Error> {
        if opts.javascript {
            match &self.renderer {
                Some(renderer) => {
                    let target = self.client.prepare(url).await?;
                    let render_opts =
                        RenderOptions { timeout_ms: opts.timeout.as_millis() as u64, ..Default::default() };
                    let rendered = renderer.render(&target, &render_opts).await?;
                    return Ok(FetchedPage { html: rendered.html, final_url: rendered.final_url });
                }
                None => tracing::warn!(url, "javascript requested but no renderer configured; using plain fetch"),
            }
        }

        let response = self.client.fetch(url, Some(opts.timeout)).await?;
        Ok(FetchedPage { html: response.text(), final_url: response.final_url })
    }

    async fn screenshot(&self, url: &str, opts: &ScreenshotOptions) -> Result<Screenshot, Error> {
        let Some(renderer) = &self.renderer else {
            return Err(Error::RenderDisabled);
        };
        let target = self.client.prepare(url).await?;
        Ok(renderer.screenshot(&target, opts).await?)
    }
}
