//! Readable content extraction using Lectito.
//!
//! The `Extractor` trait keeps the pipeline independent of the extraction
//! engine. `ReadabilityExtractor` runs Lectito's Readability port and
//! derives the plain text, Markdown and a short excerpt from one parse.

use isis_core::Error;
use lectito_core::{Readability, ReadabilityConfig};
use url::Url;

/// Excerpt length in characters.
const EXCERPT_CHARS: usize = 200;

/// Readable content derived from one page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedPage {
    /// Page title; empty when the page has none.
    pub title: String,
    /// Cleaned article HTML.
    pub content: String,
    /// Plain text of the article.
    pub text: String,
    pub markdown: String,
    /// Opening sentence(s) of the article.
    pub excerpt: String,
}

/// Stable extractor trait so the engine can be swapped without touching callers.
pub trait Extractor: Send + Sync {
    fn extract(&self, html: &str, base_url: &Url) -> Result<ExtractedPage, Error>;
}

/// Tuning for the Readability pass.
#[derive(Debug, Clone)]
pub struct ExtractConfig {
    /// Minimum article length in characters.
    pub char_threshold: usize,
    pub max_top_candidates: usize,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self { char_threshold: 200, max_top_candidates: 5 }
    }
}

/// Lectito-backed extractor.
#[derive(Debug, Clone, Default)]
pub struct ReadabilityExtractor {
    config: ExtractConfig,
}

impl ReadabilityExtractor {
    pub fn new(config: ExtractConfig) -> Self {
        Self { config }
    }
}

impl Extractor for ReadabilityExtractor {
    fn extract(&self, html: &str, base_url: &Url) -> Result<ExtractedPage, Error> {
        let config = ReadabilityConfig::builder()
            .char_threshold(self.config.char_threshold)
            .nb_top_candidates(self.config.max_top_candidates)
            .build();

        let article = Readability::with_config(config)
            .parse_with_url(html, base_url.as_str())
            .map_err(|e| Error::ExtractFailed(format!("{}: {}", base_url, e)))?;

        let text = article.to_text();
        if text.trim().is_empty() {
            return Err(Error::ExtractFailed(format!("{}: no readable content", base_url)));
        }

        let markdown = article
            .to_markdown()
            .map_err(|e| Error::ExtractFailed(format!("markdown conversion failed: {}", e)))?;

        Ok(ExtractedPage {
            title: article.metadata.title.clone().unwrap_or_default().trim().to_string(),
            excerpt: excerpt(&text),
            content: article.content.clone(),
            text,
            markdown,
        })
    }
}

/// First non-blank line of the text, cut to `EXCERPT_CHARS` characters.
pub fn excerpt(text: &str) -> String {
    let line = text.lines().map(str::trim).find(|l| !l.is_empty()).unwrap_or_default();
    if line.chars().count() <= EXCERPT_CHARS {
        return line.to_string();
    }
    let cut: String = line.chars().take(EXCERPT_CHARS).collect();
    format!("{}...", cut.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;

    const ARTICLE_HTML: &str = r#"
        <!DOCTYPE html>
        <html>
        <head><title>Understanding Ownership</title></head>
        <body>
            <nav><a href="/">Home</a> | <a href="/docs">Docs</a></nav>
            <article>
                <h1>Understanding Ownership</h1>
                <p>Ownership is a set of rules that govern how a Rust program manages memory.
                All programs have to manage the way they use a computer's memory while running.</p>
                <p>Some languages have garbage collection that regularly looks for no-longer-used
                memory as the program runs; in other languages, the programmer must explicitly
                allocate and free the memory. Rust uses a third approach.</p>
                <p>Memory is managed through a system of ownership with a set of rules that the
                compiler checks. If any of the rules are violated, the program won't compile.</p>
            </article>
            <footer>Copyright</footer>
        </body>
        </html>
    "#;

    #[test]
    fn test_extract_article() {
        let base = Url::parse("https://doc.rust-lang.org/book/ch04-01-what-is-ownership.html").unwrap();
        let page = ReadabilityExtractor::default().extract(ARTICLE_HTML, &base).unwrap();

        assert_eq!(page.title, "Understanding Ownership");
        assert!(page.text.contains("set of rules that govern"));
        assert!(page.markdown.contains("garbage collection"));
        assert!(!page.content.is_empty());
        assert!(!page.excerpt.is_empty());
    }

    #[test]
    fn test_extract_empty_page_fails() {
        let base = Url::parse("https://example.com").unwrap();
        let result = ReadabilityExtractor::default().extract("<html><body></body></html>", &base);
        assert!(matches!(result, Err(Error::ExtractFailed(_))));
    }

    #[test]
    fn test_excerpt_first_line() {
        assert_eq!(excerpt("\n\n  First line.  \nSecond line"), "First line.");
        assert_eq!(excerpt(""), "");
    }

    #[test]
    fn test_excerpt_truncates_long_line() {
        let long = "word ".repeat(100);
        let result = excerpt(&long);
        assert!(result.ends_with("..."));
        assert!(result.chars().count() <= EXCERPT_CHARS + 3);
    }

    #[test]
    fn test_extract_config_default() {
        let config = ExtractConfig::default();
        assert_eq!(config.char_threshold, 200);
        assert_eq!(config.max_top_candidates, 5);
    }
}
