use std::collections::BTreeSet;

use schemars::JsonSchema;
use serde::Deserialize;
use tracing::{info, warn};

use super::normalize::{
    claim_key, entity_in_source, grounding_overlap, normalize_claim_text, resolve_leading_pronoun,
};
use super::prompts::{format_system_prompt, format_user_prompt};
use crate::ai::{LlmClient, LlmOutcome};
use crate::text::{find_urls, truncate_chars};
use crate::traits::generator::StructuredOutput;
use crate::types::claim::{Claim, ClaimId, ClaimSet};
use crate::types::config::ClaimConfig;
use crate::types::content::ExtractedContent;
use crate::types::input::{detect_language, Locale};

/// Model output for claim extraction.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ClaimsResponse {
    pub claims: Vec<ExtractedClaim>,
    /// Empty unless `claims` is empty.
    pub no_claim_reason: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ExtractedClaim {
    pub text: String,
    pub entities: Vec<String>,
    pub links: Vec<String>,
    pub rationale: String,
}

impl StructuredOutput for ClaimsResponse {
    const SCHEMA_NAME: &'static str = "claims";
}

/// Everything the extractor looks at for one message.
#[derive(Debug, Clone, Copy)]
pub struct ClaimRequest<'a> {
    /// Message body plus OCR text.
    pub text: &'a str,
    pub locale: &'a Locale,
    pub entities_hint: &'a [String],
    /// Links that came with the message, explicit or found in the text.
    pub links: &'a [String],
    /// Content extracted from those links.
    pub link_context: &'a [ExtractedContent],
}

/// `extract(text, entities_hint?) -> Claim[]`, LLM-backed.
pub struct ClaimExtractor {
    llm: LlmClient,
    config: ClaimConfig,
}

impl ClaimExtractor {
    pub fn new(llm: LlmClient, config: ClaimConfig) -> Self {
        Self { llm, config }
    }

    /// Extract claims from bare text. URLs in the text count as its links.
    pub async fn extract(&self, text: &str, locale: &Locale, entities_hint: &[String]) -> ClaimSet {
        let links = find_urls(text);
        self.extract_request(ClaimRequest {
            text,
            locale,
            entities_hint,
            links: &links,
            link_context: &[],
        })
        .await
    }

    pub async fn extract_request(&self, request: ClaimRequest<'_>) -> ClaimSet {
        let language = request
            .locale
            .language()
            .unwrap_or_else(|| detect_language(request.text));

        let mut notes = Vec::new();
        if let Locale::Unsupported(tag) = request.locale {
            notes.push(format!(
                "Locale '{}' is not supported; claims are written in English",
                tag
            ));
        }

        let system = format_system_prompt(language, self.config.max_claims);
        let user = format_user_prompt(
            request.text,
            request.links,
            request.entities_hint,
            request.link_context,
            self.config.link_context_chars,
        );

        let response = match self
            .llm
            .generate_validated::<ClaimsResponse, _>(&system, &user, validate_response)
            .await
        {
            LlmOutcome::Valid(response) => response,
            LlmOutcome::Invalid { error } => {
                notes.push(format!("Claim extraction failed: {}", error));
                return ClaimSet {
                    claims: Vec::new(),
                    language,
                    notes,
                    degraded: true,
                };
            }
            LlmOutcome::Unavailable(error) => {
                notes.push(format!("Claim extraction unavailable: {}", error));
                return ClaimSet {
                    claims: Vec::new(),
                    language,
                    notes,
                    degraded: true,
                };
            }
        };

        let claims = self.build_claims(&request, response.claims, &mut notes);
        if claims.is_empty() {
            notes.push("No verifiable claim found".to_string());
            let reason = response.no_claim_reason.trim();
            if !reason.is_empty() {
                notes.push(reason.to_string());
            }
        }

        info!(
            claims = claims.len(),
            language = language.code(),
            "Claims extracted"
        );

        ClaimSet {
            claims,
            language,
            notes,
            degraded: false,
        }
    }

    fn build_claims(
        &self,
        request: &ClaimRequest<'_>,
        extracted: Vec<ExtractedClaim>,
        notes: &mut Vec<String>,
    ) -> Vec<Claim> {
        let mut source = request.text.to_string();
        for content in request.link_context {
            source.push('\n');
            source.push_str(&content.text);
        }

        let known_links: BTreeSet<String> = request
            .links
            .iter()
            .cloned()
            .chain(find_urls(request.text))
            .collect();
        let mut claims: Vec<Claim> = Vec::new();

        for candidate in extracted {
            let entities = grounded_entities(&candidate.entities, request.entities_hint, &source);
            let text = normalize_claim_text(&resolve_leading_pronoun(
                &normalize_claim_text(&candidate.text),
                &entities,
            ));
            let key = claim_key(&text);
            if key.is_empty() {
                continue;
            }

            let overlap = grounding_overlap(&text, &source);
            if overlap < self.config.min_grounding_overlap {
                warn!(claim = %text, overlap, "Discarding claim not grounded in the message");
                notes.push(format!(
                    "Discarded a claim not found in the message: {}",
                    truncate_chars(&text, 120)
                ));
                continue;
            }

            let links: Vec<String> = candidate
                .links
                .iter()
                .map(|l| l.trim().to_string())
                .filter(|l| known_links.contains(l))
                .collect();

            if let Some(existing) = claims.iter_mut().find(|c| c.key == key) {
                merge_unique(&mut existing.entities, entities);
                merge_unique(&mut existing.source_links, links);
                continue;
            }

            if claims.len() >= self.config.max_claims {
                notes.push(format!(
                    "Only the first {} claims were checked",
                    self.config.max_claims
                ));
                break;
            }

            claims.push(Claim {
                id: ClaimId::from_key(&key),
                normalized_text: text,
                key,
                entities,
                source_links: links,
                extraction_rationale: candidate.rationale.trim().to_string(),
            });
        }

        attach_unassigned_links(&mut claims, &known_links);
        claims
    }
}

fn validate_response(response: &ClaimsResponse) -> Result<(), String> {
    if let Some(i) = response.claims.iter().position(|c| c.text.trim().is_empty()) {
        return Err(format!("claims[{}].text is empty", i));
    }
    Ok(())
}

/// Entities that occur in the source or were supplied as hints, deduplicated
/// case-insensitively.
fn grounded_entities(entities: &[String], hints: &[String], source: &str) -> Vec<String> {
    let mut seen = BTreeSet::new();
    entities
        .iter()
        .map(|e| e.trim())
        .filter(|e| !e.is_empty())
        .filter(|e| {
            entity_in_source(e, source) || hints.iter().any(|h| h.trim().eq_ignore_ascii_case(e))
        })
        .filter(|e| seen.insert(e.to_lowercase()))
        .map(String::from)
        .collect()
}

fn merge_unique(target: &mut Vec<String>, items: Vec<String>) {
    for item in items {
        if !target.iter().any(|t| t.eq_ignore_ascii_case(&item)) {
            target.push(item);
        }
    }
}

/// Links the model didn't assign go to the claims that have none.
fn attach_unassigned_links(claims: &mut [Claim], known_links: &BTreeSet<String>) {
    let assigned: BTreeSet<&String> = claims.iter().flat_map(|c| &c.source_links).collect();
    let unassigned: Vec<String> = known_links
        .iter()
        .filter(|l| !assigned.contains(l))
        .cloned()
        .collect();
    if unassigned.is_empty() {
        return;
    }
    for claim in claims.iter_mut().filter(|c| c.source_links.is_empty()) {
        claim.source_links = unassigned.clone();
    }
}
