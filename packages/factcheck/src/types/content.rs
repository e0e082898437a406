//! Content extracted from linked pages.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which extraction strategy produced a piece of content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchStrategy {
    /// Generic main-content extraction from the raw HTML
    Readability,
    /// Article-specific extraction (JSON-LD body, `<article>` paragraphs)
    Article,
    /// Headless browser rendering, then main-content extraction
    Browser,
}

impl fmt::Display for FetchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Readability => "readability",
            Self::Article => "article",
            Self::Browser => "browser",
        };
        f.write_str(name)
    }
}

/// Clean text from one link. Lives only for the request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedContent {
    pub source_url: String,
    pub title: Option<String>,
    pub text: String,
    /// Title plus the opening of the first paragraph.
    pub summary: String,
    pub published_at: Option<DateTime<Utc>>,
    pub fetch_strategy_used: FetchStrategy,
    pub fetched_at: DateTime<Utc>,
}

/// What happened when one strategy was tried.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AttemptOutcome {
    /// Runtime capability missing; skipped without counting as a failure
    Unavailable,
    /// Circuit breaker for the runtime is open
    CircuitOpen,
    /// Text came back but failed the quality gate
    Rejected { reason: String },
    /// Fetch or render error
    Failed { error: String },
    TimedOut,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyAttempt {
    pub strategy: FetchStrategy,
    #[serde(flatten)]
    pub outcome: AttemptOutcome,
}

/// Every strategy was exhausted (or the link was refused up front).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionFailure {
    pub url: String,
    /// Set when the URL guard refused the link; no strategy ran.
    pub blocked: Option<String>,
    pub attempts: Vec<StrategyAttempt>,
}

impl ExtractionFailure {
    pub fn blocked(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            blocked: Some(reason.into()),
            attempts: Vec::new(),
        }
    }

    /// Whether any strategy failed for a reason that should mark the
    /// request degraded (anything but quality rejections and capability gaps).
    pub fn has_dependency_failure(&self) -> bool {
        self.attempts.iter().any(|a| {
            matches!(
                a.outcome,
                AttemptOutcome::Failed { .. }
                    | AttemptOutcome::TimedOut
                    | AttemptOutcome::CircuitOpen
            )
        })
    }
}

impl fmt::Display for ExtractionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(reason) = &self.blocked {
            return write!(f, "{} blocked: {}", self.url, reason);
        }
        write!(f, "{} failed all strategies", self.url)?;
        for attempt in &self.attempts {
            let detail = match &attempt.outcome {
                AttemptOutcome::Unavailable => "unavailable".to_string(),
                AttemptOutcome::CircuitOpen => "circuit open".to_string(),
                AttemptOutcome::Rejected { reason } => format!("rejected ({})", reason),
                AttemptOutcome::Failed { error } => format!("failed ({})", error),
                AttemptOutcome::TimedOut => "timed out".to_string(),
            };
            write!(f, "; {}: {}", attempt.strategy, detail)?;
        }
        Ok(())
    }
}

/// Per-link outcome carried on the final report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkReport {
    pub url: String,
    /// Absent when no strategy produced acceptable text.
    pub fetch_strategy_used: Option<FetchStrategy>,
    pub title: Option<String>,
    pub failure: Option<ExtractionFailure>,
}

impl LinkReport {
    pub fn from_result(url: &str, result: &Result<ExtractedContent, ExtractionFailure>) -> Self {
        match result {
            Ok(content) => Self {
                url: url.to_string(),
                fetch_strategy_used: Some(content.fetch_strategy_used),
                title: content.title.clone(),
                failure: None,
            },
            Err(failure) => Self {
                url: url.to_string(),
                fetch_strategy_used: None,
                title: None,
                failure: Some(failure.clone()),
            },
        }
    }

    /// Link that ran out of time before any strategy finished.
    pub fn timed_out(url: &str) -> Self {
        Self {
            url: url.to_string(),
            fetch_strategy_used: None,
            title: None,
            failure: Some(ExtractionFailure {
                url: url.to_string(),
                blocked: None,
                attempts: Vec::new(),
            }),
        }
    }
}
