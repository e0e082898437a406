//! Evidence gathered for a claim.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::claim::ClaimId;

/// Authority tier of a citation's domain. Lower sorts first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorityTier {
    /// Dedicated fact-checkers and primary institutional sources
    FactChecker,
    /// Established news organisations
    News,
    /// Everything else
    Web,
}

/// A normalized reference to an external source.
///
/// `url` is canonical and unique within one `ClaimEvidence`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub url: String,
    pub title: String,
    pub publisher: String,
    pub snippet: String,
    pub published_at: Option<DateTime<Utc>>,
    pub retrieved_at: DateTime<Utc>,
    /// Textual rating when the source is a fact-check review.
    #[serde(default)]
    pub rating: Option<String>,
    pub tier: AuthorityTier,
}

/// Citations for one claim, in rank order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimEvidence {
    pub claim_id: ClaimId,
    pub citations: Vec<Citation>,
    /// Every query string issued, for auditability.
    pub search_queries_used: Vec<String>,
    pub retrieval_notes: Vec<String>,
    /// Providers that errored, timed out or were short-circuited.
    pub provider_failures: Vec<String>,
    /// Set when any provider call failed.
    pub degraded: bool,
}

impl ClaimEvidence {
    /// No evidence at all, e.g. when the retrieval stage ran out of time.
    pub fn empty(claim_id: ClaimId, note: impl Into<String>) -> Self {
        Self {
            claim_id,
            citations: Vec::new(),
            search_queries_used: Vec::new(),
            retrieval_notes: vec![note.into()],
            provider_failures: Vec::new(),
            degraded: true,
        }
    }
}

/// Evidence keyed by claim, as handed to the Adjudicator.
pub type EvidenceMap = BTreeMap<ClaimId, ClaimEvidence>;
