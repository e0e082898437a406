use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};
use url::Url;

use super::{
    ArticleStrategy, BrowserStrategy, Candidate, ExtractionStrategy, QualityGate,
    ReadabilityStrategy, StrategyError,
};
use crate::error::FetchError;
use crate::resilience::CircuitBreaker;
use crate::security::UrlGuard;
use crate::text::{clip_chars, collapse_whitespace, truncate_chars};
use crate::traits::browser::BrowserRuntime;
use crate::traits::fetcher::{FetchLimits, HttpFetcher};
use crate::types::config::SourceConfig;
use crate::types::content::{
    AttemptOutcome, ExtractedContent, ExtractionFailure, FetchStrategy, StrategyAttempt,
};

/// `extract(url) -> ExtractedContent | ExtractionFailure`.
pub struct SourceExtractor {
    strategies: Vec<Arc<dyn ExtractionStrategy>>,
    gate: QualityGate,
    guard: UrlGuard,
    content_limit: usize,
    summary_chars: usize,
}

impl SourceExtractor {
    /// The standard chain: readability, article, then the browser when a
    /// runtime is supplied.
    pub fn new(
        config: &SourceConfig,
        fetcher: Arc<dyn HttpFetcher>,
        browser: Option<(Arc<dyn BrowserRuntime>, Arc<CircuitBreaker>)>,
    ) -> Self {
        let limits = FetchLimits {
            timeout: config.cheap_timeout,
            max_bytes: config.max_page_bytes,
        };
        let mut strategies: Vec<Arc<dyn ExtractionStrategy>> = vec![
            Arc::new(ReadabilityStrategy::new(fetcher.clone(), limits)),
            Arc::new(ArticleStrategy::new(fetcher, limits)),
        ];
        if let Some((runtime, breaker)) = browser {
            let heavy_limits = FetchLimits {
                timeout: config.heavy_timeout,
                max_bytes: config.max_page_bytes,
            };
            strategies.push(Arc::new(BrowserStrategy::new(
                runtime,
                breaker,
                heavy_limits,
            )));
        }
        Self::with_strategies(config, strategies)
    }

    /// A custom chain, tried in the given order.
    pub fn with_strategies(
        config: &SourceConfig,
        strategies: Vec<Arc<dyn ExtractionStrategy>>,
    ) -> Self {
        Self {
            strategies,
            gate: QualityGate::from_config(config),
            guard: UrlGuard::new().with_dns_check(config.resolve_dns),
            content_limit: config.content_limit,
            summary_chars: config.summary_chars,
        }
    }

    /// Replace the URL guard (e.g. to allow a test host).
    pub fn with_guard(mut self, guard: UrlGuard) -> Self {
        self.guard = guard;
        self
    }

    pub fn strategy_kinds(&self) -> Vec<FetchStrategy> {
        self.strategies.iter().map(|s| s.kind()).collect()
    }

    pub async fn extract(&self, url: &Url) -> Result<ExtractedContent, ExtractionFailure> {
        if let Err(e) = self.guard.check(url).await {
            warn!(url = %url, error = %e, "Link refused by URL guard");
            return Err(ExtractionFailure::blocked(url.as_str(), e.to_string()));
        }

        let mut attempts = Vec::with_capacity(self.strategies.len());
        for strategy in &self.strategies {
            let kind = strategy.kind();
            if !strategy.is_available() {
                debug!(url = %url, strategy = %kind, "Strategy unavailable, skipping");
                attempts.push(StrategyAttempt {
                    strategy: kind,
                    outcome: AttemptOutcome::Unavailable,
                });
                continue;
            }

            let outcome = match strategy.attempt(url).await {
                Ok(Some(candidate)) => match self.guard_landing(&candidate).await {
                    Ok(()) => self.accept(url, kind, candidate),
                    Err(reason) => {
                        warn!(
                            url = %url,
                            strategy = %kind,
                            reason = %reason,
                            "Landing page refused by URL guard"
                        );
                        return Err(ExtractionFailure {
                            url: url.to_string(),
                            blocked: Some(reason),
                            attempts,
                        });
                    }
                },
                Ok(None) => Err(AttemptOutcome::Rejected {
                    reason: "no content found".to_string(),
                }),
                Err(StrategyError::Fetch(FetchError::Security(e))) => {
                    warn!(
                        url = %url,
                        strategy = %kind,
                        error = %e,
                        "Redirect refused by URL guard"
                    );
                    return Err(ExtractionFailure {
                        url: url.to_string(),
                        blocked: Some(e.to_string()),
                        attempts,
                    });
                }
                Err(StrategyError::CircuitOpen) => Err(AttemptOutcome::CircuitOpen),
                Err(StrategyError::TimedOut)
                | Err(StrategyError::Fetch(FetchError::Timeout { .. })) => {
                    Err(AttemptOutcome::TimedOut)
                }
                Err(StrategyError::Fetch(e)) => Err(AttemptOutcome::Failed {
                    error: e.to_string(),
                }),
            };
            let outcome = match outcome {
                Ok(content) => return Ok(content),
                Err(outcome) => outcome,
            };

            warn!(
                url = %url,
                strategy = %kind,
                outcome = ?outcome,
                "Strategy did not produce content"
            );
            attempts.push(StrategyAttempt {
                strategy: kind,
                outcome,
            });
        }

        Err(ExtractionFailure {
            url: url.to_string(),
            blocked: None,
            attempts,
        })
    }

    /// Gate the candidate's text; accepted candidates become content.
    fn accept(
        &self,
        url: &Url,
        kind: FetchStrategy,
        candidate: Candidate,
    ) -> Result<ExtractedContent, AttemptOutcome> {
        match self.gate.check(&candidate.text, candidate.markup_len) {
            Ok(()) => {
                info!(
                    url = %url,
                    strategy = %kind,
                    chars = candidate.text.chars().count(),
                    "Extracted link content"
                );
                Ok(self.build_content(url, kind, candidate))
            }
            Err(reason) => Err(AttemptOutcome::Rejected { reason }),
        }
    }

    /// A candidate that landed somewhere else must pass the guard too.
    async fn guard_landing(&self, candidate: &Candidate) -> Result<(), String> {
        match &candidate.landed_on {
            Some(landed) => self.guard.check(landed).await.map_err(|e| e.to_string()),
            None => Ok(()),
        }
    }

    fn build_content(
        &self,
        url: &Url,
        kind: FetchStrategy,
        candidate: Candidate,
    ) -> ExtractedContent {
        let text = clip_chars(&candidate.text, self.content_limit);
        let summary = summarize(candidate.title.as_deref(), &text, self.summary_chars);
        ExtractedContent {
            source_url: url.to_string(),
            title: candidate.title,
            text,
            summary,
            published_at: candidate.published_at,
            fetch_strategy_used: kind,
            fetched_at: Utc::now(),
        }
    }
}

/// Title plus the first paragraph that isn't a heading, cut to `max` chars.
fn summarize(title: Option<&str>, text: &str, max: usize) -> String {
    let first_paragraph = text
        .split("\n\n")
        .map(str::trim)
        .find(|p| !p.is_empty() && !p.starts_with('#'))
        .map(collapse_whitespace)
        .unwrap_or_default();
    let summary = match title {
        Some(title) if !first_paragraph.is_empty() => format!("{}: {}", title, first_paragraph),
        Some(title) => title.to_string(),
        None => first_paragraph,
    };
    truncate_chars(&summary, max)
}
