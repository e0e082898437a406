//! Pipeline Orchestrator: stage sequencing, budgets, caching and
//! single-flight deduplication.

pub mod fingerprint;
pub mod inflight;
pub mod orchestrator;

use std::fmt;

pub use fingerprint::{claim_fingerprint, request_fingerprint};
pub use inflight::{InFlight, Waiter};
pub use orchestrator::{Orchestrator, OrchestratorBuilder};

/// Per-request state machine:
/// `Received -> Extracting? -> ClaimExtraction -> EvidenceRetrieval ->
/// Adjudication -> Completed | Degraded`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    Extracting,
    ClaimExtraction,
    EvidenceRetrieval,
    Adjudication,
    Completed,
    Degraded,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Received => "received",
            Self::Extracting => "extracting",
            Self::ClaimExtraction => "claim_extraction",
            Self::EvidenceRetrieval => "evidence_retrieval",
            Self::Adjudication => "adjudication",
            Self::Completed => "completed",
            Self::Degraded => "degraded",
        };
        f.write_str(name)
    }
}
