//! Headless browser rendering for javascript-dependent pages.
//!
//! The `Renderer` seam is always available; the chromiumoxide-backed
//! implementation is compiled only with the `render` feature.

use std::time::Duration;

use isis_core::Error;
use thiserror::Error;
use url::Url;

/// Errors that can occur during page rendering.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("browser launch failed: {0}")]
    BrowserLaunch(String),

    #[error("navigation failed: {0}")]
    Navigation(String),

    #[error("content retrieval failed: {0}")]
    ContentRetrieval(String),

    #[error("render timeout after {0}ms")]
    Timeout(u64),
}

impl From<RenderError> for Error {
    fn from(err: RenderError) -> Self {
        match err {
            RenderError::Timeout(ms) => Error::FetchTimeout(format!("render exceeded {}ms", ms)),
            other => Error::RenderFailed(other.to_string()),
        }
    }
}

/// Options for rendering a page.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Upper bound for navigation plus settling.
    pub timeout_ms: u64,

    /// Pause after navigation so client-side scripts can populate the DOM.
    pub settle: Duration,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self { timeout_ms: 30_000, settle: Duration::from_millis(1500) }
    }
}

/// Result of rendering a page.
#[derive(Debug, Clone)]
pub struct RenderedPage {
    pub html: String,
    pub final_url: Url,
    pub render_time_ms: u64,
}

/// Viewport and capture options for a screenshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenshotOptions {
    pub width: u32,
    pub height: u32,
    /// Capture the whole scrollable document instead of the viewport.
    pub full_page: bool,
    pub timeout_ms: u64,
}

impl Default for ScreenshotOptions {
    fn default() -> Self {
        Self { width: 1920, height: 1080, full_page: false, timeout_ms: 30_000 }
    }
}

/// A captured PNG and the dimensions it covers.
#[derive(Debug, Clone)]
pub struct Screenshot {
    pub png: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Produces post-javascript HTML and screenshots for a URL.
#[async_trait::async_trait]
pub trait Renderer: Send + Sync {
    async fn render(&self, url: &Url, opts: &RenderOptions) -> Result<RenderedPage, RenderError>;

    async fn screenshot(&self, url: &Url, opts: &ScreenshotOptions) -> Result<Screenshot, RenderError>;
}

#[cfg(feature = "render")]
pub use headless::HeadlessRenderer;

#[cfg(feature = "render")]
mod headless {
    use super::{RenderError, RenderOptions, RenderedPage, Renderer, Screenshot, ScreenshotOptions};
    use chromiumoxide::browser::{Browser, BrowserConfig};
    use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
    use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
    use chromiumoxide::page::ScreenshotParams;
    use futures_util::StreamExt;
    use std::time::{Duration, Instant};
    use url::Url;

    /// Headless Chrome/Chromium renderer using chromiumoxide.
    pub struct HeadlessRenderer {
        browser: Browser,
    }

    impl HeadlessRenderer {
        /// Launch a headless browser and drive its CDP event loop in the background.
        pub async fn launch() -> Result<Self, RenderError> {
            let config = BrowserConfig::builder().build().map_err(RenderError::BrowserLaunch)?;
            let (browser, mut handler) = Browser::launch(config)
                .await
                .map_err(|e| RenderError::BrowserLaunch(e.to_string()))?;

            tokio::spawn(async move {
                while let Some(event) = handler.next().await {
                    if let Err(e) = event {
                        tracing::debug!(error = %e, "browser handler stopped");
                        break;
                    }
                }
            });

            tracing::info!("headless browser launched");
            Ok(Self { browser })
        }
    }

    #[async_trait::async_trait]
    impl Renderer for HeadlessRenderer {
        async fn render(&self, url: &Url, opts: &RenderOptions) -> Result<RenderedPage, RenderError> {
            let start = Instant::now();
            let budget = Duration::from_millis(opts.timeout_ms);

            let page = tokio::time::timeout(budget, self.browser.new_page(url.as_str()))
                .await
                .map_err(|_| RenderError::Timeout(opts.timeout_ms))?
                .map_err(|e| RenderError::Navigation(e.to_string()))?;

            let remaining = budget.saturating_sub(start.elapsed());
            tokio::time::sleep(opts.settle.min(remaining)).await;

            let html = page
                .content()
                .await
                .map_err(|e| RenderError::ContentRetrieval(e.to_string()))?;
            let page_url = page
                .url()
                .await
                .map_err(|e| RenderError::ContentRetrieval(e.to_string()))?;
            let final_url = page_url
                .as_deref()
                .and_then(|u| Url::parse(u).ok())
                .unwrap_or_else(|| url.clone());

            if let Err(e) = page.close().await {
                tracing::debug!(error = %e, "failed to close rendered page");
            }

            Ok(RenderedPage { html, final_url, render_time_ms: start.elapsed().as_millis() as u64 })
        }

        async fn screenshot(&self, url: &Url, opts: &ScreenshotOptions) -> Result<Screenshot, RenderError> {
            let budget = Duration::from_millis(opts.timeout_ms);
            tokio::time::timeout(budget, self.capture(url, opts))
                .await
                .map_err(|_| RenderError::Timeout(opts.timeout_ms))?
        }
    }

    impl HeadlessRenderer {
        async fn capture(&self, url: &Url, opts: &ScreenshotOptions) -> Result<Screenshot, RenderError> {
            let page = self
                .browser
                .new_page("about:blank")
                .await
                .map_err(|e| RenderError::Navigation(e.to_string()))?;

            let viewport =
                SetDeviceMetricsOverrideParams::new(i64::from(opts.width), i64::from(opts.height), 1.0, false);
            page.execute(viewport)
                .await
                .map_err(|e| RenderError::Navigation(e.to_string()))?;
            page.goto(url.as_str())
                .await
                .map_err(|e| RenderError::Navigation(e.to_string()))?;
            tokio::time::sleep(RenderOptions::default().settle).await;

            let params = ScreenshotParams::builder()
                .format(CaptureScreenshotFormat::Png)
                .full_page(opts.full_page)
                .build();
            let png = page
                .screenshot(params)
                .await
                .map_err(|e| RenderError::ContentRetrieval(e.to_string()))?;

            let (width, height) = if opts.full_page {
                page.evaluate("[document.documentElement.scrollWidth, document.documentElement.scrollHeight]")
                    .await
                    .map_err(|e| RenderError::ContentRetrieval(e.to_string()))?
                    .into_value::<(u32, u32)>()
                    .map_err(|e| RenderError::ContentRetrieval(e.to_string()))?
            } else {
                (opts.width, opts.height)
            };

            if let Err(e) = page.close().await {
                tracing::debug!(error = %e, "failed to close screenshot page");
            }

            Ok(Screenshot { png, width, height })
        }
    }

}
