//! Source Extractor: clean text from a URL through an ordered chain of
//! extraction strategies.
//!
//! Strategies run cheapest first; the first one whose output passes the
//! quality gate wins. A strategy whose runtime is missing is skipped, which
//! is not a failure.

pub mod article;
pub mod browser;
pub mod extractor;
pub mod quality;
pub mod readability;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use url::Url;

use crate::error::FetchError;
use crate::types::content::FetchStrategy;

pub use article::ArticleStrategy;
pub use browser::BrowserStrategy;
pub use extractor::SourceExtractor;
pub use quality::QualityGate;
pub use readability::ReadabilityStrategy;

/// Raw output of one strategy, before the quality gate.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub text: String,
    /// Length of the HTML the text came from.
    pub markup_len: usize,
    pub title: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    /// Set when the content came from a different URL than requested.
    pub landed_on: Option<Url>,
}

#[derive(Debug, Error)]
pub enum StrategyError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("circuit open")]
    CircuitOpen,

    #[error("timed out")]
    TimedOut,
}

/// One way of turning a URL into text.
#[async_trait]
pub trait ExtractionStrategy: Send + Sync {
    fn kind(&self) -> FetchStrategy;

    /// Capability check; `false` skips the strategy without counting it as
    /// a failure.
    fn is_available(&self) -> bool {
        true
    }

    /// `Ok(None)` means the page had nothing this strategy could use.
    async fn attempt(&self, url: &Url) -> Result<Option<Candidate>, StrategyError>;
}
