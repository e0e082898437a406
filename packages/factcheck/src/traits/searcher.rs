//! Search / fact-check provider capability used by the evidence engine.

use async_trait::async_trait;

use crate::error::SearchResult;

/// One raw result as a provider returns it, before normalization.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchHit {
    pub url: String,
    pub title: String,
    pub snippet: String,
    /// Publisher name, when the provider reports one.
    pub publisher: Option<String>,
    /// Publication date in whatever format the provider uses.
    pub published_at: Option<String>,
    /// Textual rating for fact-check reviews.
    pub rating: Option<String>,
    /// Provider relevance score (0.0-1.0), if any.
    pub score: Option<f32>,
}

impl SearchHit {
    pub fn new(url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn with_snippet(mut self, snippet: impl Into<String>) -> Self {
        self.snippet = snippet.into();
        self
    }

    pub fn with_publisher(mut self, publisher: impl Into<String>) -> Self {
        self.publisher = Some(publisher.into());
        self
    }

    pub fn with_published_at(mut self, published_at: impl Into<String>) -> Self {
        self.published_at = Some(published_at.into());
        self
    }

    pub fn with_rating(mut self, rating: impl Into<String>) -> Self {
        self.rating = Some(rating.into());
        self
    }

    pub fn with_score(mut self, score: f32) -> Self {
        self.score = Some(score);
        self
    }
}

/// A search or fact-check API.
///
/// # Implementations
///
/// - `TavilyProvider` - general web search
/// - `GoogleFactCheckProvider` - published fact-check reviews
/// - `MockSearchProvider` - for testing
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Name used in logs, audit notes and for the circuit breaker.
    fn name(&self) -> &str;

    /// Whether every hit is a published fact-check review.
    fn is_fact_check_source(&self) -> bool {
        false
    }

    async fn search(&self, query: &str) -> SearchResult<Vec<SearchHit>>;
}
