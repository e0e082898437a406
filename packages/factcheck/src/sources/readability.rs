//! Generic main-content extraction.
//!
//! Picks the main content container (`main`, `article`, common content ids
//! and classes), falls back to `<body>` with navigation, headers, footers and
//! ads stripped, and converts what remains to Markdown with `htmd`.

use std::sync::Arc;

use async_trait::async_trait;
use scraper::{Html, Selector};
use url::Url;

use super::{Candidate, ExtractionStrategy, StrategyError};
use crate::traits::fetcher::{FetchLimits, HttpFetcher};
use crate::types::content::FetchStrategy;

const MAIN_SELECTORS: &[&str] = &[
    "main",
    "article",
    "[role='main']",
    "#content",
    "#main",
    ".content",
    ".main",
    ".post-content",
    ".entry-content",
    ".article-body",
];

const UNWANTED_SELECTORS: &[&str] = &[
    "nav",
    "header",
    "footer",
    "aside",
    "form",
    ".nav",
    ".navbar",
    ".header",
    ".footer",
    ".sidebar",
    ".menu",
    ".advertisement",
    ".ads",
    ".share",
    ".related",
    "#nav",
    "#header",
    "#footer",
    "#sidebar",
    "script",
    "style",
    "noscript",
    "iframe",
    "svg",
];

/// Fetches a page and keeps its main content.
pub struct ReadabilityStrategy {
    fetcher: Arc<dyn HttpFetcher>,
    limits: FetchLimits,
}

impl ReadabilityStrategy {
    pub fn new(fetcher: Arc<dyn HttpFetcher>, limits: FetchLimits) -> Self {
        Self { fetcher, limits }
    }
}

#[async_trait]
impl ExtractionStrategy for ReadabilityStrategy {
    fn kind(&self) -> FetchStrategy {
        FetchStrategy::Readability
    }

    async fn attempt(&self, url: &Url) -> Result<Option<Candidate>, StrategyError> {
        let page = self.fetcher.get(url, &self.limits).await?;
        Ok(extract_main_text(&page.body))
    }
}

/// Main text of an HTML document, or `None` when nothing readable remains.
pub fn extract_main_text(html: &str) -> Option<Candidate> {
    let document = Html::parse_document(html);
    let title = document_title(&document);
    let main_html = main_content_html(&document);
    let text = html_to_text(&strip_unwanted(&main_html));

    if text.is_empty() {
        return None;
    }

    Some(Candidate {
        text,
        markup_len: html.len(),
        title,
        published_at: None,
        landed_on: None,
    })
}

pub(crate) fn document_title(document: &Html) -> Option<String> {
    let selector = Selector::parse("title").ok()?;
    document
        .select(&selector)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty())
}

fn main_content_html(document: &Html) -> String {
    for selector_str in MAIN_SELECTORS {
        if let Ok(selector) = Selector::parse(selector_str) {
            if let Some(main) = document.select(&selector).next() {
                return main.html();
            }
        }
    }

    if let Ok(body_selector) = Selector::parse("body") {
        if let Some(body) = document.select(&body_selector).next() {
            return body.html();
        }
    }

    document.html()
}

/// Remove navigation, chrome and script elements from an HTML fragment.
fn strip_unwanted(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let mut result = html.to_string();
    for selector_str in UNWANTED_SELECTORS {
        if let Ok(selector) = Selector::parse(selector_str) {
            for element in fragment.select(&selector) {
                result = result.replace(&element.html(), "");
            }
        }
    }
    result
}

/// HTML to Markdown, with image references and blank-line runs removed.
pub(crate) fn html_to_text(html: &str) -> String {
    let markdown = htmd::convert(html).unwrap_or_else(|_| {
        let document = Html::parse_fragment(html);
        document.root_element().text().collect::<Vec<_>>().join(" ")
    });

    let mut lines: Vec<&str> = Vec::new();
    for line in markdown.lines().map(str::trim) {
        if line.starts_with("![") {
            continue;
        }
        if line.is_empty() && lines.last().map_or(true, |l| l.is_empty()) {
            continue;
        }
        lines.push(line);
    }
    lines.join("\n").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::article_html;

    #[test]
    fn test_prefers_main_and_drops_chrome() {
        let html = article_html(
            "Ministry denies rumour",
            &["The health ministry denied the rumour on Tuesday."],
        );
        let candidate = extract_main_text(&html).unwrap();
        assert!(candidate.text.contains("denied the rumour"));
        assert!(!candidate.text.contains("Site header"));
        assert!(!candidate.text.contains("Copyright"));
        assert_eq!(candidate.title.as_deref(), Some("Ministry denies rumour"));
        assert_eq!(candidate.markup_len, html.len());
    }

    #[test]
    fn test_body_fallback_strips_scripts() {
        let html = "<html><body><nav>Menu</nav><div><p>Plain body text here.</p></div>\
                    <script>var x = 1;</script></body></html>";
        let candidate = extract_main_text(html).unwrap();
        assert!(candidate.text.contains("Plain body text here."));
        assert!(!candidate.text.contains("var x"));
        assert!(!candidate.text.contains("Menu"));
    }

    #[test]
    fn test_empty_page_yields_none() {
        assert!(extract_main_text("<html><body><script>app()</script></body></html>").is_none());
    }
}
