//! Headless browser capability used by the heavy extraction strategy.

use async_trait::async_trait;
use url::Url;

use crate::error::FetchResult;
use crate::traits::fetcher::FetchLimits;

/// A rendered document. `html` never exceeds the requested `max_bytes`.
#[derive(Debug, Clone)]
pub struct RenderedPage {
    /// Where the browser ended up, after any redirects.
    pub url: Url,
    pub html: String,
}

/// Navigates to a page, lets its scripts run, and returns the rendered DOM.
///
/// Absence of a runtime is reported by [`BrowserRuntime::is_available`]; the
/// extractor skips the strategy instead of treating it as a failure.
#[async_trait]
pub trait BrowserRuntime: Send + Sync {
    /// Name used in logs and for the circuit breaker.
    fn name(&self) -> &str;

    /// Whether the runtime can be used in this environment.
    fn is_available(&self) -> bool;

    /// Render `url` within `limits`.
    async fn render(&self, url: &Url, limits: &FetchLimits) -> FetchResult<RenderedPage>;
}
