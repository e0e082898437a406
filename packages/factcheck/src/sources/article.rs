//! News-article extraction.
//!
//! Reads the article body from JSON-LD (`articleBody`) when a page publishes
//! one, otherwise from the paragraphs inside `<article>` (or, failing that,
//! every substantial `<p>`). Also picks up the headline and publish date.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scraper::{Html, Selector};
use serde_json::Value;
use url::Url;

use super::readability::document_title;
use super::{Candidate, ExtractionStrategy, StrategyError};
use crate::dates::parse_published_at;
use crate::text::collapse_whitespace;
use crate::traits::fetcher::{FetchLimits, HttpFetcher};
use crate::types::content::FetchStrategy;

/// Paragraphs shorter than this are bylines, captions or buttons.
const MIN_PARAGRAPH_CHARS: usize = 40;

const DATE_META_SELECTORS: &[(&str, &str)] = &[
    ("meta[property='article:published_time']", "content"),
    ("meta[name='article:published_time']", "content"),
    ("meta[itemprop='datePublished']", "content"),
    ("meta[name='date']", "content"),
    ("meta[name='pubdate']", "content"),
    ("time[datetime]", "datetime"),
];

const ARTICLE_TYPES: &[&str] = &[
    "Article",
    "NewsArticle",
    "ReportageNewsArticle",
    "BlogPosting",
    "AnalysisNewsArticle",
];

pub struct ArticleStrategy {
    fetcher: Arc<dyn HttpFetcher>,
    limits: FetchLimits,
}

impl ArticleStrategy {
    pub fn new(fetcher: Arc<dyn HttpFetcher>, limits: FetchLimits) -> Self {
        Self { fetcher, limits }
    }
}

#[async_trait]
impl ExtractionStrategy for ArticleStrategy {
    fn kind(&self) -> FetchStrategy {
        FetchStrategy::Article
    }

    async fn attempt(&self, url: &Url) -> Result<Option<Candidate>, StrategyError> {
        let page = self.fetcher.get(url, &self.limits).await?;
        Ok(extract_article(&page.body))
    }
}

/// Article body, headline and publish date of an HTML document.
pub fn extract_article(html: &str) -> Option<Candidate> {
    let document = Html::parse_document(html);
    let json_ld = json_ld_article(&document);

    let text = json_ld
        .as_ref()
        .and_then(|a| a.get("articleBody"))
        .and_then(Value::as_str)
        .map(clean_body)
        .filter(|t| !t.is_empty())
        .or_else(|| article_paragraphs(&document))?;

    let title = json_ld
        .as_ref()
        .and_then(|a| a.get("headline"))
        .and_then(Value::as_str)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .or_else(|| meta_content(&document, "meta[property='og:title']", "content"))
        .or_else(|| first_text(&document, "h1"))
        .or_else(|| document_title(&document));

    let published_at = json_ld
        .as_ref()
        .and_then(|a| a.get("datePublished"))
        .and_then(Value::as_str)
        .and_then(parse_published_at)
        .or_else(|| meta_date(&document));

    Some(Candidate {
        text,
        markup_len: html.len(),
        title,
        published_at,
        landed_on: None,
    })
}

/// First JSON-LD object whose `@type` is an article type, searching arrays
/// and `@graph` containers.
fn json_ld_article(document: &Html) -> Option<Value> {
    let selector = Selector::parse("script[type='application/ld+json']").ok()?;
    document
        .select(&selector)
        .filter_map(|el| serde_json::from_str::<Value>(&el.text().collect::<String>()).ok())
        .find_map(|value| find_article_node(&value).cloned())
}

fn find_article_node(value: &Value) -> Option<&Value> {
    match value {
        Value::Array(items) => items.iter().find_map(find_article_node),
        Value::Object(map) => {
            if is_article_type(map.get("@type")) {
                return Some(value);
            }
            map.get("@graph").and_then(find_article_node)
        }
        _ => None,
    }
}

fn is_article_type(kind: Option<&Value>) -> bool {
    match kind {
        Some(Value::String(s)) => ARTICLE_TYPES.contains(&s.as_str()),
        Some(Value::Array(kinds)) => kinds
            .iter()
            .filter_map(Value::as_str)
            .any(|s| ARTICLE_TYPES.contains(&s)),
        _ => false,
    }
}

fn article_paragraphs(document: &Html) -> Option<String> {
    let scoped = Selector::parse("article p").ok()?;
    let mut paragraphs = collect_paragraphs(document, &scoped);
    if paragraphs.is_empty() {
        let all = Selector::parse("p").ok()?;
        paragraphs = collect_paragraphs(document, &all);
    }
    if paragraphs.is_empty() {
        return None;
    }
    Some(paragraphs.join("\n\n"))
}

fn collect_paragraphs(document: &Html, selector: &Selector) -> Vec<String> {
    document
        .select(selector)
        .map(|p| collapse_whitespace(&p.text().collect::<String>()))
        .filter(|p| p.chars().count() >= MIN_PARAGRAPH_CHARS)
        .collect()
}

fn clean_body(body: &str) -> String {
    body.lines()
        .map(collapse_whitespace)
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn meta_content(document: &Html, selector: &str, attr: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    document
        .select(&selector)
        .filter_map(|el| el.value().attr(attr))
        .map(|v| v.trim().to_string())
        .find(|v| !v.is_empty())
}

fn first_text(document: &Html, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    document
        .select(&selector)
        .map(|el| collapse_whitespace(&el.text().collect::<String>()))
        .find(|t| !t.is_empty())
}

fn meta_date(document: &Html) -> Option<DateTime<Utc>> {
    DATE_META_SELECTORS
        .iter()
        .filter_map(|(selector, attr)| meta_content(document, selector, attr))
        .find_map(|raw| parse_published_at(&raw))
}
