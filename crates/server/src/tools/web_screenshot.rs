//! web_screenshot tool implementation.
//!
//! Captures a PNG of a page with the headless browser. Returns the image
//! plus a JSON summary of the captured dimensions.

use isis_client::{RagPipeline, ScreenshotOptions};
use isis_core::Error;
use rmcp::{ErrorData as McpError, model::*};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Input parameters for web_screenshot tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WebScreenshotParams {
    /// URL to capture (required).
    pub url: String,

    /// Capture the whole scrollable page instead of the viewport (default false).
    #[serde(default)]
    pub full_page: bool,

    /// Viewport width in pixels (320-3840, default 1920).
    #[serde(default = "default_width")]
    pub width: u32,

    /// Viewport height in pixels (240-2160, default 1080).
    #[serde(default = "default_height")]
    pub height: u32,
}

fn default_width() -> u32 {
    1920
}

fn default_height() -> u32 {
    1080
}

impl WebScreenshotParams {
    fn validate(&self) -> Result<ScreenshotOptions, Error> {
        if self.url.trim().is_empty() {
            return Err(Error::InvalidInput("url cannot be empty".into()));
        }
        if !(320..=3840).contains(&self.width) || !(240..=2160).contains(&self.height) {
            return Err(Error::InvalidInput("viewport must be 320-3840 by 240-2160 pixels".into()));
        }

        Ok(ScreenshotOptions {
            width: self.width,
            height: self.height,
            full_page: self.full_page,
            ..Default::default()
        })
    }
}

/// Summary returned next to the image.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ScreenshotSummary<'a> {
    url: &'a str,
    width: u32,
    height: u32,
    captured_at: &'a str,
}

/// Implementation of the web_screenshot tool.
pub async fn screenshot_impl(
    pipeline: &RagPipeline, params: WebScreenshotParams,
) -> Result<CallToolResult, McpError> {
    let opts = params.validate()?;
    let url = params.url.trim();
    tracing::info!(url, full_page = opts.full_page, "web_screenshot");

    let shot = pipeline.screenshot(url, &opts).await?;
    let summary = ScreenshotSummary {
        url: &shot.url,
        width: shot.width,
        height: shot.height,
        captured_at: &shot.captured_at,
    };

    Ok(CallToolResult::success(vec![
        Content::text(serde_json::to_string_pretty(&summary).unwrap_or_default()),
        Content::image(shot.base64.clone(), "image/png"),
    ]))
}
