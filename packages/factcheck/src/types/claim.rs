//! Verifiable claims isolated from a message.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::types::input::Language;

/// Stable identifier derived from the claim's normalized key, so the same
/// claim gets the same id across requests.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClaimId(String);

impl ClaimId {
    pub fn from_key(key: &str) -> Self {
        let digest = Sha256::digest(key.as_bytes());
        Self(hex::encode(&digest[..8]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClaimId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single, independently verifiable statement.
///
/// `normalized_text` is never empty; two claims from one message never share
/// a `key`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claim {
    pub id: ClaimId,
    pub normalized_text: String,
    /// Comparison key: folded, stopword-free tokens of `normalized_text`.
    pub key: String,
    pub entities: Vec<String>,
    /// URLs from the message that back this claim.
    pub source_links: Vec<String>,
    pub extraction_rationale: String,
}

impl Claim {
    /// Lowercase hostnames of the claim's source links, sorted and unique.
    pub fn domains(&self) -> Vec<String> {
        let mut domains: Vec<String> = self
            .source_links
            .iter()
            .filter_map(|l| url::Url::parse(l).ok())
            .filter_map(|u| u.host_str().map(|h| h.trim_start_matches("www.").to_lowercase()))
            .collect();
        domains.sort();
        domains.dedup();
        domains
    }
}

/// Output of the Claim Extractor for one message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimSet {
    pub claims: Vec<Claim>,
    pub language: Language,
    /// Why the set looks the way it does (e.g. "no verifiable claim found").
    pub notes: Vec<String>,
    /// The extractor could not complete (LLM failure or timeout).
    pub degraded: bool,
}

impl ClaimSet {
    pub fn empty(language: Language, note: impl Into<String>, degraded: bool) -> Self {
        Self {
            claims: Vec::new(),
            language,
            notes: vec![note.into()],
            degraded,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }
}
