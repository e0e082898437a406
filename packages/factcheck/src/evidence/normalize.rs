//! Search hits to citation candidates.

use chrono::{DateTime, Utc};

use super::canonical::{canonical_host, canonicalize_url};
use crate::dates::parse_published_at;
use crate::text::{collapse_whitespace, truncate_chars};
use crate::traits::searcher::SearchHit;
use crate::types::citation::{AuthorityTier, Citation};
use crate::types::config::RetrievalConfig;

const MAX_TITLE_CHARS: usize = 200;

/// A normalized hit plus what ranking needs to know about it.
#[derive(Debug, Clone)]
pub struct CitationCandidate {
    pub citation: Citation,
    /// Position of the provider that first returned it.
    pub provider_rank: usize,
    /// Share of the claim's terms found in title and snippet.
    pub match_score: f32,
}

/// Normalize one hit. Hits without a usable http(s) URL are dropped.
pub fn normalize_hit(
    hit: &SearchHit,
    from_fact_checker: bool,
    config: &RetrievalConfig,
    retrieved_at: DateTime<Utc>,
) -> Option<Citation> {
    let url = canonicalize_url(&hit.url)?;
    let host = canonical_host(&url)?;

    let title = collapse_whitespace(&hit.title);
    let title = if title.is_empty() {
        host.clone()
    } else {
        truncate_chars(&title, MAX_TITLE_CHARS)
    };
    let snippet = truncate_chars(&collapse_whitespace(&hit.snippet), config.snippet_chars);
    let publisher = hit
        .publisher
        .as_deref()
        .map(collapse_whitespace)
        .filter(|p| !p.is_empty())
        .unwrap_or_else(|| host.clone());
    let rating = hit
        .rating
        .as_deref()
        .map(collapse_whitespace)
        .filter(|r| !r.is_empty());

    let mut tier = config.authority.tier(&host);
    if from_fact_checker {
        tier = tier.min(AuthorityTier::FactChecker);
    }

    Some(Citation {
        url,
        title,
        publisher,
        snippet,
        published_at: hit.published_at.as_deref().and_then(parse_published_at),
        retrieved_at,
        rating,
        tier,
    })
}

/// Fold `other` into `kept`, which shares its canonical URL.
///
/// The snippet comes from the variant that has one, preferring the more
/// recent variant when both do; `published_at` keeps the most recent value.
pub fn merge_duplicate(kept: &mut CitationCandidate, other: CitationCandidate) {
    let other_newer = match (other.citation.published_at, kept.citation.published_at) {
        (Some(o), Some(k)) => o > k,
        (Some(_), None) => true,
        _ => false,
    };
    let other_has_snippet = !other.citation.snippet.is_empty();
    if other_has_snippet && (kept.citation.snippet.is_empty() || other_newer) {
        kept.citation.snippet = other.citation.snippet;
    }
    if other_newer {
        kept.citation.published_at = other.citation.published_at;
    }
    if kept.citation.rating.is_none() {
        kept.citation.rating = other.citation.rating;
    }
    kept.citation.tier = kept.citation.tier.min(other.citation.tier);
    kept.match_score = kept.match_score.max(other.match_score);
    kept.provider_rank = kept.provider_rank.min(other.provider_rank);
}
