//! Testing utilities including mock implementations.
//!
//! Deterministic stand-ins for every external capability, with call tracking
//! so tests can assert how much work the pipeline actually did.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use url::Url;

use crate::error::{
    CacheError, CacheResult, FetchError, FetchResult, GenerationError, GenerationResult,
    SearchError, SearchResult, SecurityError,
};
use crate::traits::{
    browser::{BrowserRuntime, RenderedPage},
    cache::{CachedValue, VerdictCache},
    fetcher::{FetchLimits, FetchedPage, HttpFetcher},
    generator::{GenerationRequest, StructuredGenerator},
    searcher::{SearchHit, SearchProvider},
};

type Handler = Arc<dyn Fn(&GenerationRequest) -> GenerationResult<Value> + Send + Sync>;

/// A mock structured generator.
///
/// Replies are queued per schema name; the last queued reply keeps being
/// returned once the queue is down to one. A handler, when set for a schema,
/// takes precedence over queued replies.
#[derive(Default)]
pub struct MockGenerator {
    replies: RwLock<HashMap<String, VecDeque<Value>>>,
    handlers: RwLock<HashMap<String, Handler>>,
    failure: Option<String>,
    delay: Option<Duration>,
    calls: RwLock<Vec<GenerationRequest>>,
}

impl MockGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a reply for a schema.
    pub fn with_reply(self, schema: &str, reply: Value) -> Self {
        self.replies
            .write()
            .unwrap()
            .entry(schema.to_string())
            .or_default()
            .push_back(reply);
        self
    }

    /// Compute replies for a schema from the request.
    pub fn with_handler(
        self,
        schema: &str,
        handler: impl Fn(&GenerationRequest) -> GenerationResult<Value> + Send + Sync + 'static,
    ) -> Self {
        self.handlers
            .write()
            .unwrap()
            .insert(schema.to_string(), Arc::new(handler));
        self
    }

    /// Fail every call with a transport error.
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    /// Sleep before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Get all calls made to this mock.
    pub fn calls(&self) -> Vec<GenerationRequest> {
        self.calls.read().unwrap().clone()
    }

    pub fn call_count(&self, schema: &str) -> usize {
        self.calls
            .read()
            .unwrap()
            .iter()
            .filter(|c| c.schema_name == schema)
            .count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.read().unwrap().len()
    }
}

#[async_trait]
impl StructuredGenerator for MockGenerator {
    fn name(&self) -> &str {
        "mock"
    }

    async fn generate(&self, request: &GenerationRequest) -> GenerationResult<Value> {
        self.calls.write().unwrap().push(request.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(message) = &self.failure {
            return Err(GenerationError::Transport(message.clone()));
        }

        let handler = self.handlers.read().unwrap().get(&request.schema_name).cloned();
        if let Some(handler) = handler {
            return handler(request);
        }

        let mut replies = self.replies.write().unwrap();
        match replies.get_mut(&request.schema_name) {
            Some(queue) if queue.len() > 1 => Ok(queue.pop_front().unwrap_or_default()),
            Some(queue) => queue
                .front()
                .cloned()
                .ok_or_else(|| GenerationError::Schema("empty reply queue".into())),
            None => Err(GenerationError::Schema(format!(
                "no mock reply for schema {}",
                request.schema_name
            ))),
        }
    }
}

/// A mock search provider.
pub struct MockSearchProvider {
    name: String,
    fact_check: bool,
    results: RwLock<HashMap<String, Vec<SearchHit>>>,
    default_results: Vec<SearchHit>,
    failure: Option<String>,
    delay: Option<Duration>,
    calls: RwLock<Vec<String>>,
}

impl MockSearchProvider {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fact_check: false,
            results: RwLock::new(HashMap::new()),
            default_results: Vec::new(),
            failure: None,
            delay: None,
            calls: RwLock::new(Vec::new()),
        }
    }

    /// Results for one exact query.
    pub fn with_results(self, query: &str, hits: Vec<SearchHit>) -> Self {
        self.results
            .write()
            .unwrap()
            .insert(query.to_string(), hits);
        self
    }

    /// Results for any query without specific results.
    pub fn with_default_results(mut self, hits: Vec<SearchHit>) -> Self {
        self.default_results = hits;
        self
    }

    pub fn as_fact_checker(mut self) -> Self {
        self.fact_check = true;
        self
    }

    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Queries received, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.read().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.read().unwrap().len()
    }
}

#[async_trait]
impl SearchProvider for MockSearchProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_fact_check_source(&self) -> bool {
        self.fact_check
    }

    async fn search(&self, query: &str) -> SearchResult<Vec<SearchHit>> {
        self.calls.write().unwrap().push(query.to_string());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(message) = &self.failure {
            return Err(SearchError::Http {
                provider: self.name.clone(),
                message: message.clone(),
            });
        }

        Ok(self
            .results
            .read()
            .unwrap()
            .get(query)
            .cloned()
            .unwrap_or_else(|| self.default_results.clone()))
    }
}

enum MockResponse {
    Page { status: u16, body: String },
    Error(String),
    BlockedRedirect(String),
}

/// A mock HTTP fetcher. Unknown URLs answer 404.
#[derive(Default)]
pub struct MockFetcher {
    responses: RwLock<HashMap<String, MockResponse>>,
    delay: Option<Duration>,
    calls: RwLock<Vec<String>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(self, url: &str, html: impl Into<String>) -> Self {
        self.insert(
            url,
            MockResponse::Page {
                status: 200,
                body: html.into(),
            },
        )
    }

    pub fn with_status(self, url: &str, status: u16) -> Self {
        self.insert(
            url,
            MockResponse::Page {
                status,
                body: String::new(),
            },
        )
    }

    pub fn with_error(self, url: &str, message: impl Into<String>) -> Self {
        self.insert(url, MockResponse::Error(message.into()))
    }

    /// `url` redirects to `target`, which the URL guard refuses.
    pub fn with_blocked_redirect(self, url: &str, target: &str) -> Self {
        self.insert(url, MockResponse::BlockedRedirect(target.to_string()))
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.read().unwrap().clone()
    }

    fn insert(self, url: &str, response: MockResponse) -> Self {
        let key = Url::parse(url)
            .map(|u| u.to_string())
            .unwrap_or_else(|_| url.to_string());
        self.responses.write().unwrap().insert(key, response);
        self
    }
}

#[async_trait]
impl HttpFetcher for MockFetcher {
    async fn get(&self, url: &Url, limits: &FetchLimits) -> FetchResult<FetchedPage> {
        self.calls.write().unwrap().push(url.to_string());

        if let Some(delay) = self.delay {
            if delay > limits.timeout {
                tokio::time::sleep(limits.timeout).await;
                return Err(FetchError::Timeout {
                    url: url.to_string(),
                });
            }
            tokio::time::sleep(delay).await;
        }

        match self.responses.read().unwrap().get(url.as_str()) {
            Some(MockResponse::Page { status, body }) if (200..300).contains(status) => {
                let truncated = body.len() > limits.max_bytes;
                let mut end = body.len().min(limits.max_bytes);
                while !body.is_char_boundary(end) {
                    end -= 1;
                }
                Ok(FetchedPage {
                    url: url.clone(),
                    status: *status,
                    content_type: Some("text/html; charset=utf-8".to_string()),
                    body: body[..end].to_string(),
                    truncated,
                })
            }
            Some(MockResponse::Page { status, .. }) => Err(FetchError::Status {
                url: url.to_string(),
                status: *status,
            }),
            Some(MockResponse::Error(message)) => Err(FetchError::Network(message.clone())),
            Some(MockResponse::BlockedRedirect(target)) => Err(FetchError::Security(
                SecurityError::BlockedRedirect(target.clone()),
            )),
            None => Err(FetchError::Status {
                url: url.to_string(),
                status: 404,
            }),
        }
    }
}

/// A mock browser runtime.
pub struct MockBrowser {
    available: bool,
    pages: RwLock<HashMap<String, String>>,
    redirects: RwLock<HashMap<String, Url>>,
    delay: Option<Duration>,
    calls: RwLock<Vec<String>>,
}

impl MockBrowser {
    /// An available runtime with no pages.
    pub fn new() -> Self {
        Self {
            available: true,
            pages: RwLock::new(HashMap::new()),
            redirects: RwLock::new(HashMap::new()),
            delay: None,
            calls: RwLock::new(Vec::new()),
        }
    }

    /// A runtime that reports itself missing.
    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new()
        }
    }

    pub fn with_page(self, url: &str, html: impl Into<String>) -> Self {
        let key = Url::parse(url)
            .map(|u| u.to_string())
            .unwrap_or_else(|_| url.to_string());
        self.pages.write().unwrap().insert(key, html.into());
        self
    }

    /// Navigating to `from` lands on `to`.
    pub fn with_redirect(self, from: &str, to: &str) -> Self {
        let from = Url::parse(from)
            .map(|u| u.to_string())
            .unwrap_or_else(|_| from.to_string());
        let to = Url::parse(to).expect("valid redirect target");
        self.redirects.write().unwrap().insert(from, to);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.read().unwrap().clone()
    }
}

impl Default for MockBrowser {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BrowserRuntime for MockBrowser {
    fn name(&self) -> &str {
        "mock-browser"
    }

    fn is_available(&self) -> bool {
        self.available
    }

    async fn render(&self, url: &Url, _limits: &FetchLimits) -> FetchResult<RenderedPage> {
        self.calls.write().unwrap().push(url.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let landed = self
            .redirects
            .read()
            .unwrap()
            .get(url.as_str())
            .cloned()
            .unwrap_or_else(|| url.clone());
        let html = self
            .pages
            .read()
            .unwrap()
            .get(landed.as_str())
            .cloned()
            .ok_or_else(|| FetchError::Runtime(format!("navigation failed: {}", landed)))?;
        Ok(RenderedPage { url: landed, html })
    }
}

/// A cache whose backend is always down.
#[derive(Debug, Default)]
pub struct BrokenCache;

#[async_trait]
impl VerdictCache for BrokenCache {
    async fn get(&self, _key: &str) -> CacheResult<Option<CachedValue>> {
        Err(CacheError::Backend("connection refused".into()))
    }

    async fn put(&self, _key: &str, _value: CachedValue, _ttl: Duration) -> CacheResult<()> {
        Err(CacheError::Backend("connection refused".into()))
    }

    async fn evict(&self, _key: &str) -> CacheResult<()> {
        Err(CacheError::Backend("connection refused".into()))
    }
}

/// A news-article page with enough body text to pass the quality gate.
pub fn article_html(title: &str, paragraphs: &[&str]) -> String {
    let body: String = paragraphs
        .iter()
        .map(|p| format!("<p>{}</p>\n", p))
        .collect();
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<title>{title}</title>
<meta property="og:title" content="{title}">
<meta property="article:published_time" content="2024-03-05T10:00:00Z">
</head>
<body>
<nav><a href="/">Home</a> <a href="/world">World</a></nav>
<header><h2>Site header</h2></header>
<main>
<article>
<h1>{title}</h1>
{body}
</article>
</main>
<footer>Copyright Example News</footer>
</body>
</html>"#
    )
}

/// A search hit with the given fields; snippet and date optional.
pub fn hit(url: &str, title: &str, snippet: &str, published_at: Option<&str>) -> SearchHit {
    let hit = SearchHit::new(url, title).with_snippet(snippet);
    match published_at {
        Some(date) => hit.with_published_at(date),
        None => hit,
    }
}
