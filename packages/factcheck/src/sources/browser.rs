//! Heavy strategy: render the page in a headless browser, then extract the
//! main content from the resulting DOM.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;
use url::Url;

use super::readability::extract_main_text;
use super::{Candidate, ExtractionStrategy, StrategyError};
use crate::error::BreakerError;
use crate::resilience::CircuitBreaker;
use crate::traits::browser::BrowserRuntime;
use crate::traits::fetcher::FetchLimits;
use crate::types::content::FetchStrategy;

pub struct BrowserStrategy {
    runtime: Arc<dyn BrowserRuntime>,
    breaker: Arc<CircuitBreaker>,
    limits: FetchLimits,
}

impl BrowserStrategy {
    pub fn new(
        runtime: Arc<dyn BrowserRuntime>,
        breaker: Arc<CircuitBreaker>,
        limits: FetchLimits,
    ) -> Self {
        Self {
            runtime,
            breaker,
            limits,
        }
    }
}

#[async_trait]
impl ExtractionStrategy for BrowserStrategy {
    fn kind(&self) -> FetchStrategy {
        FetchStrategy::Browser
    }

    fn is_available(&self) -> bool {
        self.runtime.is_available()
    }

    /// The landing URL is reported on the candidate so the extractor can
    /// run it through the URL guard before accepting the content.
    async fn attempt(&self, url: &Url) -> Result<Option<Candidate>, StrategyError> {
        let page = self
            .breaker
            .call(
                self.limits.timeout,
                self.runtime.render(url, &self.limits),
                |_| true,
            )
            .await
            .map_err(|e| match e {
                BreakerError::Open(_) => StrategyError::CircuitOpen,
                BreakerError::TimedOut(_) => StrategyError::TimedOut,
                BreakerError::Inner(inner) => StrategyError::Fetch(inner),
            })?;

        let mut html = page.html;
        if html.len() > self.limits.max_bytes {
            let mut end = self.limits.max_bytes;
            while !html.is_char_boundary(end) {
                end -= 1;
            }
            html.truncate(end);
        }

        let landed_on = (page.url != *url).then_some(page.url);
        if let Some(landed) = &landed_on {
            debug!(url = %url, landed_on = %landed, "Browser was redirected");
        }
        Ok(extract_main_text(&html).map(|candidate| Candidate {
            landed_on,
            ..candidate
        }))
    }
}
