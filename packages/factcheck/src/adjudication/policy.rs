//! Label decision from per-source stances.
//!
//! The model only judges what each source says about a claim. The label
//! follows from those stances here, so it can never rest on anything but
//! the supplied citations.

use chrono::{DateTime, Duration, Utc};
use schemars::JsonSchema;
use serde::Deserialize;

use crate::types::citation::{AuthorityTier, Citation};
use crate::types::config::AdjudicationConfig;
use crate::types::verdict::Label;

/// What one source says about one claim.
///
/// Variants carry no doc comments so the schema stays a flat string enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Stance {
    Supports,
    Contradicts,
    // Confirms only part of the claim, or with caveats that change it
    Partial,
    Irrelevant,
}

/// A stance on the citation at `index` of the claim's evidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Judgement {
    pub index: usize,
    pub stance: Stance,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// Relevant sources agree
    Unanimous,
    /// Sources disagree; the more authoritative side won
    ByAuthority,
    /// Sources disagree at equal authority; the clearly newer side won
    ByRecency,
    /// Sources disagree and neither authority nor recency settles it
    Unresolved {
        supporting: Vec<String>,
        contradicting: Vec<String>,
    },
    /// Too few relevant sources
    Insufficient,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub label: Label,
    pub resolution: Resolution,
    /// Indexes of the citations the verdict relies on, in evidence order.
    pub used: Vec<usize>,
}

pub fn decide(
    citations: &[Citation],
    judgements: &[Judgement],
    misleading_framing: bool,
    config: &AdjudicationConfig,
) -> Decision {
    let mut relevant: Vec<Judgement> = Vec::new();
    for judgement in judgements {
        if judgement.index >= citations.len()
            || judgement.stance == Stance::Irrelevant
            || relevant.iter().any(|j| j.index == judgement.index)
        {
            continue;
        }
        relevant.push(*judgement);
    }
    relevant.sort_by_key(|j| j.index);
    let used: Vec<usize> = relevant.iter().map(|j| j.index).collect();

    if relevant.is_empty() || relevant.len() < config.min_citations {
        return Decision {
            label: Label::Unverifiable,
            resolution: Resolution::Insufficient,
            used,
        };
    }

    let supporting: Vec<&Citation> = relevant
        .iter()
        .filter(|j| matches!(j.stance, Stance::Supports | Stance::Partial))
        .map(|j| &citations[j.index])
        .collect();
    let contradicting: Vec<&Citation> = relevant
        .iter()
        .filter(|j| j.stance == Stance::Contradicts)
        .map(|j| &citations[j.index])
        .collect();
    let qualified = misleading_framing || relevant.iter().any(|j| j.stance == Stance::Partial);
    let supported_label = if qualified {
        Label::Misleading
    } else {
        Label::True
    };

    if contradicting.is_empty() {
        return Decision {
            label: supported_label,
            resolution: Resolution::Unanimous,
            used,
        };
    }
    if supporting.is_empty() {
        return Decision {
            label: Label::False,
            resolution: Resolution::Unanimous,
            used,
        };
    }

    let support_tier = best_tier(&supporting);
    let contra_tier = best_tier(&contradicting);
    if support_tier != contra_tier {
        let label = if support_tier < contra_tier {
            supported_label
        } else {
            Label::False
        };
        return Decision {
            label,
            resolution: Resolution::ByAuthority,
            used,
        };
    }

    let gap = Duration::days(config.recency_gap_days);
    match (newest(&supporting), newest(&contradicting)) {
        (Some(s), Some(c)) if s - c >= gap => Decision {
            label: supported_label,
            resolution: Resolution::ByRecency,
            used,
        },
        (Some(s), Some(c)) if c - s >= gap => Decision {
            label: Label::False,
            resolution: Resolution::ByRecency,
            used,
        },
        _ => Decision {
            label: Label::Unverifiable,
            resolution: Resolution::Unresolved {
                supporting: publishers(&supporting),
                contradicting: publishers(&contradicting),
            },
            used,
        },
    }
}

fn best_tier(citations: &[&Citation]) -> AuthorityTier {
    citations
        .iter()
        .map(|c| c.tier)
        .min()
        .unwrap_or(AuthorityTier::Web)
}

fn newest(citations: &[&Citation]) -> Option<DateTime<Utc>> {
    citations.iter().filter_map(|c| c.published_at).max()
}

fn publishers(citations: &[&Citation]) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for citation in citations {
        if !names.contains(&citation.publisher) {
            names.push(citation.publisher.clone());
        }
    }
    names
}
