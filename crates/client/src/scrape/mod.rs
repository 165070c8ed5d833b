//! Single-page scraping: visible text, page metadata and an optional CSS
//! selection. Screenshots of a single page live here too.
//!
//! Text inside `script`, `style`, `noscript` and `iframe` is never part of
//! the output. Body text is whitespace-collapsed and capped at
//! `CONTENT_CHARS` characters.

use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::{SecondsFormat, Utc};
use isis_core::Error;
use schemars::JsonSchema;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};

use crate::fetch::{FetchOptions, PageFetcher};
use crate::render::ScreenshotOptions;

/// Maximum characters of body text returned.
pub const CONTENT_CHARS: usize = 10_000;

const HIDDEN_ELEMENTS: &[&str] = &["script", "style", "noscript", "iframe"];

/// What to scrape and how to fetch it.
#[derive(Debug, Clone)]
pub struct ScrapeRequest {
    pub url: String,
    /// CSS selector whose matches are reported separately.
    pub selector: Option<String>,
    pub javascript: bool,
    pub timeout: Duration,
}

/// `<meta>` values commonly used for previews.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PageMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keywords: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub og_image: Option<String>,
}

/// Scraped page.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeResult {
    pub url: String,
    pub title: String,
    pub content: String,
    /// Inner HTML of the first selector match.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    /// Text of every selector match; empty when the selector matched nothing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_element: Option<String>,
    pub metadata: PageMetadata,
    pub scraped_at: String,
}

/// Fetch `request.url` and scrape it.
///
/// # Errors
///
/// `InvalidInput` for an unparsable selector (checked before fetching),
/// `FetchTimeout` when the fetch outlives `request.timeout`, and any fetch
/// error otherwise.
pub async fn scrape_page(fetcher: &dyn PageFetcher, request: &ScrapeRequest) -> Result<ScrapeResult, Error> {
    let selector = request.selector.as_deref().map(parse_selector).transpose()?;

    let opts = FetchOptions { javascript: request.javascript, timeout: request.timeout };
    let page = tokio::time::timeout(request.timeout, fetcher.fetch_page(&request.url, &opts))
        .await
        .map_err(|_| Error::FetchTimeout(format!("{} exceeded {}ms", request.url, request.timeout.as_millis())))??;

    let mut result = scrape_html(&page.html, selector.as_ref());
    result.url = page.final_url.to_string();
    tracing::debug!(url = %result.url, chars = result.content.len(), "scraped page");
    Ok(result)
}

/// A PNG screenshot, base64-encoded for transport.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScreenshotResult {
    pub url: String,
    pub base64: String,
    pub width: u32,
    pub height: u32,
    pub captured_at: String,
}

/// Capture `url` through the fetcher's renderer.
///
/// # Errors
///
/// `RenderDisabled` when the fetcher has no browser; otherwise the
/// address-gating or render failure.
pub async fn capture_screenshot(
    fetcher: &dyn PageFetcher, url: &str, opts: &ScreenshotOptions,
) -> Result<ScreenshotResult, Error> {
    let shot = fetcher.screenshot(url, opts).await?;
    tracing::debug!(url, width = shot.width, height = shot.height, bytes = shot.png.len(), "captured screenshot");
    Ok(ScreenshotResult {
        url: url.to_string(),
        base64: STANDARD.encode(&shot.png),
        width: shot.width,
        height: shot.height,
        captured_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    })
}

fn parse_selector(css: &str) -> Result<Selector, Error> {
    Selector::parse(css).map_err(|e| Error::InvalidInput(format!("invalid selector {css:?}: {e}")))
}

/// Scrape already-fetched HTML. `url` is left empty for the caller to fill.
pub fn scrape_html(html: &str, selector: Option<&Selector>) -> ScrapeResult {
    let document = Html::parse_document(html);

    let title = select_first(&document, "title").map(visible_text).unwrap_or_default();
    let content = select_first(&document, "body")
        .map(visible_text)
        .unwrap_or_default()
        .chars()
        .take(CONTENT_CHARS)
        .collect();

    let (selected_element, html) = match selector {
        Some(selector) => {
            let matches: Vec<ElementRef<'_>> = document.select(selector).collect();
            let text = matches.iter().map(|el| visible_text(*el)).filter(|t| !t.is_empty()).collect::<Vec<_>>();
            (Some(text.join(" ")), matches.first().map(|el| el.inner_html()))
        }
        None => (None, None),
    };

    ScrapeResult {
        url: String::new(),
        title,
        content,
        html,
        selected_element,
        metadata: PageMetadata {
            description: meta_content(&document, r#"meta[name="description"]"#),
            keywords: meta_content(&document, r#"meta[name="keywords"]"#),
            author: meta_content(&document, r#"meta[name="author"]"#),
            og_image: meta_content(&document, r#"meta[property="og:image"]"#),
        },
        scraped_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    }
}

fn select_first<'a>(document: &'a Html, css: &str) -> Option<ElementRef<'a>> {
    let selector = Selector::parse(css).ok()?;
    document.select(&selector).next()
}

fn meta_content(document: &Html, css: &str) -> Option<String> {
    select_first(document, css)
        .and_then(|el| el.value().attr("content"))
        .map(|v| v.trim().to_string())
}

/// Whitespace-collapsed text under `root`, skipping hidden elements.
fn visible_text(root: ElementRef<'_>) -> String {
    let mut words = Vec::new();
    for node in root.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node
            .ancestors()
            .filter_map(ElementRef::wrap)
            .any(|el| HIDDEN_ELEMENTS.contains(&el.value().name()));
        if !hidden {
            words.extend(text.split_whitespace());
        }
    }
    words.join(" ")
}
