//! Tavily web search.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{SearchError, SearchResult};
use crate::security::SecretString;
use crate::traits::searcher::{SearchHit, SearchProvider};

const DEFAULT_BASE_URL: &str = "https://api.tavily.com";
const PROVIDER: &str = "tavily";

/// Tavily search depth
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchDepth {
    Basic,
    Advanced,
}

/// General web search through the Tavily API.
#[derive(Debug, Clone)]
pub struct TavilyProvider {
    api_key: SecretString,
    base_url: String,
    max_results: usize,
    search_depth: SearchDepth,
    client: reqwest::Client,
}

/// Tavily API request
#[derive(Debug, Serialize)]
struct TavilyRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    search_depth: SearchDepth,
    max_results: usize,
}

/// Tavily API response
#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

/// Individual search result from Tavily
#[derive(Debug, Deserialize)]
struct TavilyResult {
    #[serde(default)]
    title: String,
    url: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    score: Option<f64>,
    #[serde(default)]
    published_date: Option<String>,
}

impl TavilyProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: SecretString::new(api_key),
            base_url: DEFAULT_BASE_URL.to_string(),
            max_results: 5,
            search_depth: SearchDepth::Basic,
            client: reqwest::Client::new(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    pub fn with_search_depth(mut self, depth: SearchDepth) -> Self {
        self.search_depth = depth;
        self
    }
}

#[async_trait]
impl SearchProvider for TavilyProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn search(&self, query: &str) -> SearchResult<Vec<SearchHit>> {
        if self.api_key.is_blank() {
            return Err(SearchError::NotConfigured {
                provider: PROVIDER.to_string(),
                reason: "API key is empty".to_string(),
            });
        }

        let request = TavilyRequest {
            api_key: self.api_key.expose(),
            query,
            search_depth: self.search_depth,
            max_results: self.max_results,
        };

        let response = self
            .client
            .post(format!("{}/search", self.base_url.trim_end_matches('/')))
            .json(&request)
            .send()
            .await
            .map_err(|e| SearchError::Http {
                provider: PROVIDER.to_string(),
                message: e.without_url().to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SearchError::Status {
                provider: PROVIDER.to_string(),
                status: status.as_u16(),
            });
        }

        let body: TavilyResponse = response.json().await.map_err(|e| SearchError::Decode {
            provider: PROVIDER.to_string(),
            message: e.without_url().to_string(),
        })?;

        let hits = into_hits(body);
        debug!(provider = PROVIDER, results = hits.len(), "Search completed");
        Ok(hits)
    }
}

fn into_hits(response: TavilyResponse) -> Vec<SearchHit> {
    response
        .results
        .into_iter()
        .filter(|r| !r.url.trim().is_empty())
        .map(|r| {
            let mut hit = SearchHit::new(r.url, r.title).with_snippet(r.content);
            if let Some(date) = r.published_date {
                hit = hit.with_published_at(date);
            }
            if let Some(score) = r.score {
                hit = hit.with_score(score as f32);
            }
            hit
        })
        .collect()
}
