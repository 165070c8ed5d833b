//! Local LLM summarization over an Ollama-compatible HTTP API.

use std::time::Duration;

use isis_core::SummaryConfig;
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;

/// Why a summary could not be produced. Callers fall back to a preview.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SummarizeError {
    #[error("summarization service unavailable: {0}")]
    Unavailable(String),

    #[error("summarization timed out after {0}ms")]
    Timeout(u64),

    #[error("summarization request failed: {0}")]
    Request(String),

    #[error("summarization returned no text")]
    Empty,
}

/// Condenses page content into a short summary.
#[async_trait::async_trait]
pub trait Summarizer: Send + Sync {
    /// `model` overrides the configured default model when given.
    async fn summarize(&self, content: &str, model: Option<&str>) -> Result<String, SummarizeError>;
}

/// Prompt asking for a 150-200 word summary of `content`.
pub fn summary_prompt(content: &str) -> String {
    format!(
        "Summarize the following content concisely in 150-200 words, \
         preserving the key facts and main insights:\n\n{}\n\nSummary:",
        content
    )
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    stream: bool,
    options: ChatOptions,
}

#[derive(Debug, Serialize)]
struct ChatOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ChatMessage,
}

/// Summarizer backed by a local Ollama server.
///
/// Availability is checked once per instance via `GET /api/tags`; an
/// unreachable server makes every later call fail fast with `Unavailable`.
pub struct OllamaSummarizer {
    http: reqwest::Client,
    endpoint: String,
    model: String,
    timeout: Duration,
    available: OnceCell<bool>,
}

impl OllamaSummarizer {
    pub fn new(http: reqwest::Client, config: &SummaryConfig) -> Self {
        Self {
            http,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            timeout: config.timeout(),
            available: OnceCell::new(),
        }
    }

    async fn is_available(&self) -> bool {
        *self
            .available
            .get_or_init(|| async {
                let tags = self
                    .http
                    .get(format!("{}/api/tags", self.endpoint))
                    .timeout(Duration::from_secs(3))
                    .send()
                    .await;
                match tags {
                    Ok(resp) if resp.status().is_success() => true,
                    Ok(resp) => {
                        let status = resp.status().as_u16();
                        tracing::warn!(endpoint = %self.endpoint, status, "summarizer availability check rejected");
                        false
                    }
                    Err(e) => {
                        tracing::warn!(endpoint = %self.endpoint, error = %e, "summarizer unreachable");
                        false
                    }
                }
            })
            .await
    }
}

#[async_trait::async_trait]
impl Summarizer for OllamaSummarizer {
    async fn summarize(&self, content: &str, model: Option<&str>) -> Result<String, SummarizeError> {
        if !self.is_available().await {
            return Err(SummarizeError::Unavailable(self.endpoint.clone()));
        }

        let model = model.map(str::trim).filter(|m| !m.is_empty()).unwrap_or(&self.model);
        let request = ChatRequest {
            model,
            messages: vec![ChatMessage { role: "user".into(), content: summary_prompt(content) }],
            stream: false,
            options: ChatOptions { temperature: 0.3, num_predict: 250 },
        };

        tracing::debug!(model, chars = content.len(), "requesting summary");

        let response = self
            .http
            .post(format!("{}/api/chat", self.endpoint))
            .timeout(self.timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SummarizeError::Timeout(self.timeout.as_millis() as u64)
                } else {
                    SummarizeError::Request(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SummarizeError::Request(format!("HTTP {}", status.as_u16())));
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| SummarizeError::Request(e.to_string()))?;
        let summary = parsed.message.content.trim().to_string();
        if summary.is_empty() {
            return Err(SummarizeError::Empty);
        }
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Json, Router, routing::get, routing::post};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn config(endpoint: &str) -> SummaryConfig {
        SummaryConfig { endpoint: endpoint.to_string(), timeout_ms: 2_000, ..Default::default() }
    }

    #[test]
    fn test_summary_prompt_shape() {
        let prompt = summary_prompt("Rust is fast.");
        assert!(prompt.starts_with("Summarize the following content concisely in 150-200 words"));
        assert!(prompt.contains("\n\nRust is fast.\n\n"));
        assert!(prompt.ends_with("Summary:"));
    }

    #[tokio::test]
    async fn test_summarize_uses_requested_model() {
        let router = Router::new()
            .route("/api/tags", get(|| async { Json(serde_json::json!({"models": []})) }))
            .route(
                "/api/chat",
                post(|Json(body): Json<serde_json::Value>| async move {
                    assert_eq!(body["model"], "qwen2.5:3b");
                    assert_eq!(body["stream"], false);
                    Json(serde_json::json!({"message": {"role": "assistant", "content": "  A short summary.  "}}))
                }),
            );
        let base = serve(router).await;

        let summarizer = OllamaSummarizer::new(reqwest::Client::new(), &config(&base));
        let summary = summarizer.summarize("long text", Some("qwen2.5:3b")).await.unwrap();
        assert_eq!(summary, "A short summary.");
    }

    #[tokio::test]
    async fn test_empty_summary_is_error() {
        let router = Router::new()
            .route("/api/tags", get(|| async { "{}" }))
            .route(
                "/api/chat",
                post(|| async { Json(serde_json::json!({"message": {"role": "assistant", "content": ""}})) }),
            );
        let base = serve(router).await;

        let summarizer = OllamaSummarizer::new(reqwest::Client::new(), &config(&base));
        assert_eq!(summarizer.summarize("text", None).await, Err(SummarizeError::Empty));
    }

    #[tokio::test]
    async fn test_unreachable_service_checked_once() {
        let checks = Arc::new(AtomicUsize::new(0));
        let counter = checks.clone();
        let router = Router::new().route(
            "/api/tags",
            get(move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    (axum::http::StatusCode::SERVICE_UNAVAILABLE, "loading")
                }
            }),
        );
        let base = serve(router).await;

        let summarizer = OllamaSummarizer::new(reqwest::Client::new(), &config(&base));
        for _ in 0..3 {
            assert!(matches!(summarizer.summarize("text", None).await, Err(SummarizeError::Unavailable(_))));
        }
        assert_eq!(checks.load(Ordering::SeqCst), 1);
    }
}
