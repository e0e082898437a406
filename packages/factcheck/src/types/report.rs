//! What `Orchestrator::process` hands back.

use serde::{Deserialize, Serialize};

use crate::types::claim::Claim;
use crate::types::content::LinkReport;
use crate::types::verdict::{OverallVerdict, Verdict};

/// Terminal pipeline state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompletionStatus {
    Completed,
    /// Some stage exhausted its fallback; cached with the shorter TTL.
    Degraded,
}

/// What kind of answer the caller got.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Outcome {
    /// One verdict per claim.
    Verdicts,
    /// The message held nothing verifiable; retrieval never ran.
    NoClaimFound { note: String },
    /// The request budget ran out or the caller went away; unresolved
    /// claims default to `unverifiable`.
    Incomplete { note: String },
}

/// The shared, cacheable result of one fingerprint's computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestOutcome {
    pub outcome: Outcome,
    pub status: CompletionStatus,
    pub claims: Vec<Claim>,
    pub verdicts: Vec<Verdict>,
    pub overall: Option<OverallVerdict>,
    pub links: Vec<LinkReport>,
    pub notes: Vec<String>,
}

impl RequestOutcome {
    pub fn is_degraded(&self) -> bool {
        self.status == CompletionStatus::Degraded
    }
}

/// How the result was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheStatus {
    /// Computed by this request.
    Miss,
    /// Served from the verdict cache.
    Hit,
    /// Joined a computation already in flight for the same fingerprint.
    Joined,
}

/// The structured verdict object returned to the messaging layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactCheckReport {
    pub channel_id: String,
    pub message_id: String,
    pub fingerprint: String,
    pub result: RequestOutcome,
    pub cache: CacheStatus,
    /// Wall-clock time for this call. On a cache hit, the lookup only.
    pub processing_time_ms: u64,
}

impl FactCheckReport {
    pub fn verdicts(&self) -> &[Verdict] {
        &self.result.verdicts
    }
}
