//! Verdicts produced by the Adjudicator.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::citation::Citation;
use crate::types::claim::ClaimId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    True,
    False,
    Misleading,
    Unverifiable,
    Mixed,
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::True => "true",
            Self::False => "false",
            Self::Misleading => "misleading",
            Self::Unverifiable => "unverifiable",
            Self::Mixed => "mixed",
        };
        f.write_str(s)
    }
}

/// Terminal per-claim artifact.
///
/// `citations` is the subset of the claim's evidence the verdict relies on.
/// When it is empty the label is always [`Label::Unverifiable`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub claim_id: ClaimId,
    pub label: Label,
    pub confidence: f32,
    pub rationale: String,
    pub citations: Vec<Citation>,
    pub processing_time_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverallVerdict {
    pub label: Label,
    pub rationale: String,
}

impl OverallVerdict {
    /// The shared label when every verdict agrees, otherwise `mixed`.
    /// No verdicts at all aggregates to `unverifiable`.
    pub fn aggregate(verdicts: &[Verdict], rationale: impl Into<String>) -> Self {
        let label = match verdicts.split_first() {
            None => Label::Unverifiable,
            Some((first, rest)) if rest.iter().all(|v| v.label == first.label) => first.label,
            Some(_) => Label::Mixed,
        };
        Self {
            label,
            rationale: rationale.into(),
        }
    }
}

/// Output of one adjudication pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Adjudication {
    pub verdicts: Vec<Verdict>,
    pub overall: OverallVerdict,
    /// The LLM could not be used for at least one claim.
    pub degraded: bool,
}
