//! Deduplication and ranking of citation candidates.

use std::cmp::{Ordering, Reverse};
use std::collections::BTreeSet;

use indexmap::IndexMap;

use super::normalize::{merge_duplicate, CitationCandidate};
use crate::text::tokenize;
use crate::types::citation::Citation;
use crate::types::config::RankOrder;

/// Merge candidates sharing a canonical URL, keeping first-seen order.
pub fn dedup(candidates: impl IntoIterator<Item = CitationCandidate>) -> Vec<CitationCandidate> {
    let mut by_url: IndexMap<String, CitationCandidate> = IndexMap::new();
    for candidate in candidates {
        match by_url.get_mut(&candidate.citation.url) {
            Some(kept) => merge_duplicate(kept, candidate),
            None => {
                by_url.insert(candidate.citation.url.clone(), candidate);
            }
        }
    }
    by_url.into_values().collect()
}

/// Share of `claim_terms` that occur in the citation's title or snippet.
pub fn match_score(claim_terms: &[String], citation: &Citation) -> f32 {
    if claim_terms.is_empty() {
        return 0.0;
    }
    let text: BTreeSet<String> = tokenize(&format!("{} {}", citation.title, citation.snippet))
        .into_iter()
        .collect();
    let found = claim_terms.iter().filter(|t| text.contains(*t)).count();
    found as f32 / claim_terms.len() as f32
}

/// Sort in place. The sort is stable, so ties keep provider order.
pub fn rank(candidates: &mut [CitationCandidate], order: RankOrder) {
    candidates.sort_by(|a, b| compare(a, b, order));
}

fn compare(a: &CitationCandidate, b: &CitationCandidate, order: RankOrder) -> Ordering {
    let tier = a.citation.tier.cmp(&b.citation.tier);
    let recency = Reverse(a.citation.published_at).cmp(&Reverse(b.citation.published_at));
    let strength = b.match_score.total_cmp(&a.match_score);
    let provider = a.provider_rank.cmp(&b.provider_rank);

    match order {
        RankOrder::AuthorityFirst => tier.then(recency).then(strength).then(provider),
        RankOrder::RecencyFirst => recency.then(tier).then(strength).then(provider),
    }
}
