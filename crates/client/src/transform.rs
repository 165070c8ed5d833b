//! Content shaping: preview truncation, passthrough, or summary.

use std::sync::Arc;
use std::time::Duration;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::summarize::{SummarizeError, Summarizer};

/// Preview length in characters.
pub const PREVIEW_CHARS: usize = 300;

/// How much of each page to return.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ContentMode {
    /// First 300 characters plus a handle for fetching the rest.
    Preview,
    #[default]
    Full,
    /// Model-generated summary, falling back to a preview.
    Summary,
}

/// Which representation of the page to return.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Markdown,
    Text,
    Html,
}

/// Cut `content` to `max_chars` characters, appending `...` when anything was removed.
pub fn truncate_preview(content: &str, max_chars: usize) -> String {
    match content.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}...", &content[..byte_idx]),
        None => content.to_string(),
    }
}

/// Applies a `ContentMode` to a page's selected field.
#[derive(Clone)]
pub struct ContentTransformer {
    summarizer: Option<Arc<dyn Summarizer>>,
    max_input_chars: usize,
    timeout: Duration,
}

impl ContentTransformer {
    pub fn new(summarizer: Option<Arc<dyn Summarizer>>, max_input_chars: usize, timeout: Duration) -> Self {
        Self { summarizer, max_input_chars, timeout }
    }

    /// Transformer with no summarizer: summary mode always yields a preview.
    pub fn without_summarizer() -> Self {
        Self::new(None, 8_000, Duration::from_secs(60))
    }

    pub async fn apply(&self, content: &str, mode: ContentMode, model: Option<&str>) -> String {
        match mode {
            ContentMode::Full => content.to_string(),
            ContentMode::Preview => truncate_preview(content, PREVIEW_CHARS),
            ContentMode::Summary => match self.summarize(content, model).await {
                Ok(summary) => summary,
                Err(e) => {
                    tracing::warn!(error = %e, "summary unavailable; returning preview");
                    truncate_preview(content, PREVIEW_CHARS)
                }
            },
        }
    }

    async fn summarize(&self, content: &str, model: Option<&str>) -> Result<String, SummarizeError> {
        let Some(summarizer) = &self.summarizer else {
            return Err(SummarizeError::Unavailable("summarization disabled".into()));
        };

        let input: String = content.chars().take(self.max_input_chars).collect();
        match tokio::time::timeout(self.timeout, summarizer.summarize(&input, model)).await {
            Ok(result) => result,
            Err(_) => Err(SummarizeError::Timeout(self.timeout.as_millis() as u64)),
        }
    }
}
