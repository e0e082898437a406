//! HTTP fetch capability used by the cheap extraction strategies.

use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use crate::error::FetchResult;

/// Bounds applied to a single GET.
#[derive(Debug, Clone, Copy)]
pub struct FetchLimits {
    pub timeout: Duration,
    pub max_bytes: usize,
}

/// A fetched document. `body` never exceeds the requested `max_bytes`.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Final URL after redirects.
    pub url: Url,
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
    /// The body was cut at `max_bytes`.
    pub truncated: bool,
}

impl FetchedPage {
    pub fn new(url: Url, body: impl Into<String>) -> Self {
        Self {
            url,
            status: 200,
            content_type: Some("text/html".to_string()),
            body: body.into(),
            truncated: false,
        }
    }
}

/// GET a URL as text, within the given limits.
#[async_trait]
pub trait HttpFetcher: Send + Sync {
    async fn get(&self, url: &Url, limits: &FetchLimits) -> FetchResult<FetchedPage>;
}
