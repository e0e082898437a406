use std::collections::{BTreeSet, HashMap};
use std::time::Instant;

use schemars::JsonSchema;
use serde::Deserialize;
use tracing::{info, warn};

use super::policy::{decide, Judgement, Resolution, Stance};
use super::prompts::{
    adjudication_failed, claim_ref, conflict_note, format_system_prompt, format_user_prompt,
    insufficient_evidence, no_claims_overall, sources_suffix,
};
use crate::ai::{LlmClient, LlmOutcome};
use crate::text::{collapse_whitespace, truncate_chars};
use crate::traits::generator::StructuredOutput;
use crate::types::citation::{Citation, EvidenceMap};
use crate::types::claim::{Claim, ClaimId};
use crate::types::config::AdjudicationConfig;
use crate::types::input::{detect_language, Language};
use crate::types::verdict::{Adjudication, Label, OverallVerdict, Verdict};

/// Model output for adjudication.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct AdjudicationResponse {
    pub verdicts: Vec<ClaimAssessment>,
    pub overall_rationale: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ClaimAssessment {
    /// Claim identifier as given in the prompt (`C1`, `C2`, ...).
    pub claim: String,
    pub sources: Vec<SourceAssessment>,
    pub misleading_framing: bool,
    pub confidence: f32,
    pub rationale: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SourceAssessment {
    /// Source identifier as given under the claim (`S1`, `S2`, ...).
    pub source: String,
    pub stance: Stance,
}

impl StructuredOutput for AdjudicationResponse {
    const SCHEMA_NAME: &'static str = "adjudication";
}

/// `adjudicate(original_text, claims, evidence_by_claim) -> Verdict[]`.
///
/// The model only reports what each supplied source says; labels come from
/// [`decide`]. Claims without citations never reach the model.
pub struct Adjudicator {
    llm: LlmClient,
    config: AdjudicationConfig,
}

impl Adjudicator {
    pub fn new(llm: LlmClient, config: AdjudicationConfig) -> Self {
        Self { llm, config }
    }

    /// Adjudicate in the language detected from `original_text`.
    pub async fn adjudicate(
        &self,
        original_text: &str,
        claims: &[Claim],
        evidence: &EvidenceMap,
    ) -> Adjudication {
        let language = detect_language(original_text);
        self.adjudicate_in(original_text, claims, evidence, language)
            .await
    }

    pub async fn adjudicate_in(
        &self,
        original_text: &str,
        claims: &[Claim],
        evidence: &EvidenceMap,
        language: Language,
    ) -> Adjudication {
        let started = Instant::now();
        let evidenced: Vec<(&Claim, &[Citation])> = claims
            .iter()
            .filter_map(|claim| {
                let citations = citations_for(evidence, &claim.id);
                (!citations.is_empty()).then_some((claim, citations))
            })
            .collect();

        let mut assessments: HashMap<ClaimId, ClaimAssessment> = HashMap::new();
        let mut overall_rationale = String::new();
        let mut degraded = false;

        if !evidenced.is_empty() {
            let system = format_system_prompt(language, self.config.max_rationale_chars);
            let user = format_user_prompt(original_text, &evidenced);
            let outcome = self
                .llm
                .generate_validated::<AdjudicationResponse, _>(&system, &user, |response| {
                    validate_response(response, &evidenced)
                })
                .await;

            match outcome {
                LlmOutcome::Valid(response) => {
                    for assessment in response.verdicts {
                        let claim = parse_ref('C', &assessment.claim)
                            .and_then(|position| evidenced.get(position))
                            .map(|(claim, _)| claim.id.clone());
                        if let Some(id) = claim {
                            assessments.insert(id, assessment);
                        }
                    }
                    overall_rationale = collapse_whitespace(&response.overall_rationale);
                }
                LlmOutcome::Invalid { error } => {
                    warn!(error = %error, claims = evidenced.len(), "Adjudication output unusable");
                    degraded = true;
                }
                LlmOutcome::Unavailable(error) => {
                    warn!(error = %error, claims = evidenced.len(), "Adjudication unavailable");
                    degraded = true;
                }
            }
        }

        let elapsed_ms = started.elapsed().as_millis() as u64;
        let verdicts: Vec<Verdict> = claims
            .iter()
            .map(|claim| {
                let citations = citations_for(evidence, &claim.id);
                let mut verdict = if citations.is_empty() {
                    self.unverifiable(claim, insufficient_evidence(language))
                } else if let Some(assessment) = assessments.remove(&claim.id) {
                    self.grounded(claim, citations, assessment, language)
                } else {
                    self.unverifiable(claim, adjudication_failed(language))
                };
                verdict.processing_time_ms = elapsed_ms;
                verdict
            })
            .collect();

        if overall_rationale.is_empty() {
            overall_rationale = fallback_overall(&verdicts, language);
        }
        let overall = OverallVerdict::aggregate(
            &verdicts,
            truncate_chars(&overall_rationale, self.config.max_rationale_chars),
        );

        info!(
            claims = verdicts.len(),
            overall = %overall.label,
            degraded,
            elapsed_ms,
            "Adjudication complete"
        );

        Adjudication {
            verdicts,
            overall,
            degraded,
        }
    }

    fn unverifiable(&self, claim: &Claim, rationale: &str) -> Verdict {
        Verdict {
            claim_id: claim.id.clone(),
            label: Label::Unverifiable,
            confidence: self.config.low_confidence,
            rationale: truncate_chars(rationale, self.config.max_rationale_chars),
            citations: Vec::new(),
            processing_time_ms: 0,
        }
    }

    fn grounded(
        &self,
        claim: &Claim,
        citations: &[Citation],
        assessment: ClaimAssessment,
        language: Language,
    ) -> Verdict {
        let judgements: Vec<Judgement> = assessment
            .sources
            .iter()
            .filter_map(|s| {
                parse_ref('S', &s.source).map(|index| Judgement {
                    index,
                    stance: s.stance,
                })
            })
            .collect();
        let decision = decide(
            citations,
            &judgements,
            assessment.misleading_framing,
            &self.config,
        );
        let used: Vec<Citation> = decision
            .used
            .iter()
            .map(|&index| citations[index].clone())
            .collect();

        let model_confidence = assessment.confidence.clamp(0.0, 1.0);
        let (confidence, note) = match &decision.resolution {
            Resolution::Insufficient => (
                self.config.low_confidence,
                Some(insufficient_evidence(language).to_string()),
            ),
            Resolution::Unresolved {
                supporting,
                contradicting,
            } => (
                model_confidence.min(self.config.conflict_confidence_cap),
                Some(conflict_note(language, supporting, contradicting)),
            ),
            Resolution::Unanimous | Resolution::ByAuthority | Resolution::ByRecency => {
                (model_confidence, None)
            }
        };

        Verdict {
            claim_id: claim.id.clone(),
            label: decision.label,
            confidence,
            rationale: self.finish_rationale(note, &assessment.rationale, &used, language),
            citations: used,
            processing_time_ms: 0,
        }
    }

    /// Bound the rationale and make sure it names at least one publisher of
    /// the citations it relies on.
    fn finish_rationale(
        &self,
        note: Option<String>,
        rationale: &str,
        used: &[Citation],
        language: Language,
    ) -> String {
        let max = self.config.max_rationale_chars;
        let rationale = collapse_whitespace(rationale);
        let text = match note {
            Some(note) if rationale.is_empty() => note,
            Some(note) => format!("{} {}", note, rationale),
            None => rationale,
        };

        let mut publishers: Vec<String> = Vec::new();
        for citation in used {
            if !publishers.contains(&citation.publisher) {
                publishers.push(citation.publisher.clone());
            }
        }

        let bounded = truncate_chars(&text, max);
        if publishers.is_empty() || publishers.iter().any(|p| bounded.contains(p.as_str())) {
            return bounded;
        }

        let suffix = sources_suffix(language, &publishers);
        let budget = max.saturating_sub(suffix.chars().count());
        let combined = format!("{}{}", truncate_chars(&text, budget).trim_end(), suffix);
        truncate_chars(combined.trim_start(), max)
    }
}

fn citations_for<'a>(evidence: &'a EvidenceMap, id: &ClaimId) -> &'a [Citation] {
    evidence
        .get(id)
        .map(|e| e.citations.as_slice())
        .unwrap_or(&[])
}

/// `C3` (or `[c3]`) with prefix `C` gives position 2.
fn parse_ref(prefix: char, raw: &str) -> Option<usize> {
    let raw = raw.trim().trim_start_matches('[').trim_end_matches(']');
    let mut chars = raw.chars();
    let first = chars.next()?;
    if !first.eq_ignore_ascii_case(&prefix) {
        return None;
    }
    chars.as_str().trim().parse::<usize>().ok()?.checked_sub(1)
}

fn validate_response(
    response: &AdjudicationResponse,
    evidenced: &[(&Claim, &[Citation])],
) -> Result<(), String> {
    let mut seen = BTreeSet::new();
    for (i, assessment) in response.verdicts.iter().enumerate() {
        let position = parse_ref('C', &assessment.claim)
            .filter(|p| *p < evidenced.len())
            .ok_or_else(|| {
                format!("verdicts[{}].claim '{}' is not a listed claim", i, assessment.claim)
            })?;
        if !seen.insert(position) {
            return Err(format!("claim {} is assessed more than once", assessment.claim));
        }

        let sources = evidenced[position].1.len();
        for source in &assessment.sources {
            if parse_ref('S', &source.source).map_or(true, |s| s >= sources) {
                return Err(format!(
                    "verdicts[{}] references unknown source '{}'",
                    i, source.source
                ));
            }
        }

        if !assessment.confidence.is_finite() || !(0.0..=1.0).contains(&assessment.confidence) {
            return Err(format!("verdicts[{}].confidence must be between 0 and 1", i));
        }
        if assessment.rationale.trim().is_empty() {
            return Err(format!("verdicts[{}].rationale is empty", i));
        }
    }

    if let Some(missing) = (0..evidenced.len()).find(|p| !seen.contains(p)) {
        return Err(format!("claim {} was not assessed", claim_ref(missing)));
    }
    Ok(())
}

fn fallback_overall(verdicts: &[Verdict], language: Language) -> String {
    match verdicts {
        [] => no_claims_overall(language).to_string(),
        [only] => only.rationale.clone(),
        many => {
            let mut seen = BTreeSet::new();
            many.iter()
                .map(|v| v.rationale.as_str())
                .filter(|r| seen.insert(*r))
                .collect::<Vec<_>>()
                .join(" ")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use chrono::{TimeZone, Utc};
    use serde_json::{json, Value};

    use crate::resilience::CircuitBreaker;
    use crate::testing::MockGenerator;
    use crate::types::citation::{AuthorityTier, ClaimEvidence};
    use crate::types::config::BreakerConfig;

    fn adjudicator(mock: MockGenerator) -> (Adjudicator, Arc<MockGenerator>) {
        let mock = Arc::new(mock);
        let breaker = Arc::new(CircuitBreaker::new("llm:mock", BreakerConfig::default()));
        let llm = LlmClient::new(mock.clone(), breaker, Duration::from_secs(5));
        (Adjudicator::new(llm, AdjudicationConfig::default()), mock)
    }

    fn claim(text: &str) -> Claim {
        let key = text.to_lowercase();
        Claim {
            id: ClaimId::from_key(&key),
            normalized_text: text.into(),
            key,
            entities: vec![],
            source_links: vec![],
            extraction_rationale: String::new(),
        }
    }

    fn citation(publisher: &str, tier: AuthorityTier, year: i32) -> Citation {
        Citation {
            url: format!("https://{}.example/article", publisher.to_lowercase()),
            title: format!("{} report", publisher),
            publisher: publisher.into(),
            snippet: "snippet".into(),
            published_at: Some(Utc.with_ymd_and_hms(year, 1, 10, 0, 0, 0).unwrap()),
            retrieved_at: Utc::now(),
            rating: None,
            tier,
        }
    }

    fn evidence(entries: Vec<(&Claim, Vec<Citation>)>) -> EvidenceMap {
        entries
            .into_iter()
            .map(|(claim, citations)| {
                (
                    claim.id.clone(),
                    ClaimEvidence {
                        claim_id: claim.id.clone(),
                        citations,
                        search_queries_used: vec![claim.normalized_text.clone()],
                        retrieval_notes: vec![],
                        provider_failures: vec![],
                        degraded: false,
                    },
                )
            })
            .collect()
    }

    fn assessment(claim: &str, stances: &[&str], confidence: f32, rationale: &str) -> Value {
        let sources: Vec<Value> = stances
            .iter()
            .enumerate()
            .map(|(i, stance)| json!({"source": format!("S{}", i + 1), "stance": stance}))
            .collect();
        json!({
            "claim": claim,
            "sources": sources,
            "misleading_framing": false,
            "confidence": confidence,
            "rationale": rationale
        })
    }

    fn reply(verdicts: Vec<Value>) -> Value {
        json!({"verdicts": verdicts, "overall_rationale": "Summary for the sender."})
    }

    #[tokio::test]
    async fn test_unanimous_contradiction_is_false() {
        let c = claim("Vaccine X causes infertility in women");
        let map = evidence(vec![(
            &c,
            vec![
                citation("Reuters", AuthorityTier::News, 2023),
                citation("WHO", AuthorityTier::FactChecker, 2022),
            ],
        )]);
        let (adjudicator, mock) = adjudicator(MockGenerator::new().with_reply(
            "adjudication",
            reply(vec![assessment(
                "C1",
                &["contradicts", "contradicts"],
                0.9,
                "Reuters and WHO found no causal link.",
            )]),
        ));

        let result = adjudicator
            .adjudicate("Vaccine X causes infertility in women", &[c.clone()], &map)
            .await;
        let verdict = &result.verdicts[0];
        assert_eq!(verdict.label, Label::False);
        assert!(verdict.confidence >= 0.8);
        assert_eq!(verdict.citations.len(), 2);
        assert!(verdict.rationale.contains("Reuters"));
        assert_eq!(result.overall.label, Label::False);
        assert_eq!(result.overall.rationale, "Summary for the sender.");
        assert!(!result.degraded);
        assert_eq!(mock.call_count("adjudication"), 1);
    }

    #[tokio::test]
    async fn test_no_evidence_skips_the_model() {
        let c = claim("The bridge collapsed yesterday");
        let map = evidence(vec![(&c, vec![])]);
        let (adjudicator, mock) = adjudicator(MockGenerator::new());

        let result = adjudicator
            .adjudicate("The bridge collapsed yesterday", &[c], &map)
            .await;
        let verdict = &result.verdicts[0];
        assert_eq!(verdict.label, Label::Unverifiable);
        assert!(verdict.citations.is_empty());
        assert_eq!(verdict.confidence, 0.1);
        assert!(verdict.rationale.starts_with("Insufficient evidence"));
        assert_eq!(mock.total_calls(), 0);
        assert!(!result.degraded);
    }

    #[tokio::test]
    async fn test_missing_claim_in_evidence_map_is_unverifiable() {
        let c = claim("A ponte caiu ontem no Recife");
        let (adjudicator, _) = adjudicator(MockGenerator::new());

        let result = adjudicator
            .adjudicate_in(
                "A ponte caiu ontem no Recife",
                &[c],
                &EvidenceMap::new(),
                Language::Portuguese,
            )
            .await;
        assert_eq!(result.verdicts[0].label, Label::Unverifiable);
        assert!(result.verdicts[0].rationale.starts_with("Evidências insuficientes"));
    }

    #[tokio::test]
    async fn test_malformed_twice_is_unverifiable_and_degraded() {
        let c = claim("Prices rose 10% in March");
        let map = evidence(vec![(&c, vec![citation("Reuters", AuthorityTier::News, 2024)])]);
        let (adjudicator, mock) = adjudicator(
            MockGenerator::new().with_reply("adjudication", json!({"verdicts": "nope"})),
        );

        let result = adjudicator
            .adjudicate("Prices rose 10% in March", &[c], &map)
            .await;
        assert_eq!(result.verdicts[0].label, Label::Unverifiable);
        assert!(result.verdicts[0].citations.is_empty());
        assert!(result.degraded);
        assert_eq!(mock.call_count("adjudication"), 2);
    }

    #[tokio::test]
    async fn test_invalid_reference_is_retried() {
        let c = claim("Prices rose 10% in March");
        let map = evidence(vec![(&c, vec![citation("Reuters", AuthorityTier::News, 2024)])]);
        let (adjudicator, mock) = adjudicator(
            MockGenerator::new()
                .with_reply(
                    "adjudication",
                    reply(vec![assessment(
                        "C1",
                        &["supports", "supports"],
                        0.8,
                        "Reuters confirms.",
                    )]),
                )
                .with_reply(
                    "adjudication",
                    reply(vec![assessment("C1", &["supports"], 0.8, "Reuters confirms.")]),
                ),
        );

        let result = adjudicator
            .adjudicate("Prices rose 10% in March", &[c], &map)
            .await;
        assert_eq!(result.verdicts[0].label, Label::True);
        assert_eq!(mock.call_count("adjudication"), 2);
        assert!(mock.calls()[1].system.contains("previous answer was rejected"));
    }

    #[tokio::test]
    async fn test_unresolved_conflict_is_unverifiable() {
        let c = claim("The festival took place on 12 May");
        let map = evidence(vec![(
            &c,
            vec![
                citation("Reuters", AuthorityTier::News, 2024),
                citation("AP", AuthorityTier::News, 2024),
            ],
        )]);
        let (adjudicator, _) = adjudicator(MockGenerator::new().with_reply(
            "adjudication",
            reply(vec![assessment(
                "C1",
                &["supports", "contradicts"],
                0.8,
                "The reports give different dates.",
            )]),
        ));

        let result = adjudicator
            .adjudicate("The festival took place on 12 May", &[c], &map)
            .await;
        let verdict = &result.verdicts[0];
        assert_eq!(verdict.label, Label::Unverifiable);
        assert!(verdict.confidence <= 0.3);
        assert!(verdict.rationale.contains("conflict"));
        assert!(verdict.rationale.contains("Reuters"));
        assert!(verdict.rationale.contains("AP"));
    }

    #[tokio::test]
    async fn test_rationale_names_publishers_and_is_bounded() {
        let c = claim("Prices rose 10% in March");
        let map = evidence(vec![(&c, vec![citation("Reuters", AuthorityTier::News, 2024)])]);
        let long = "The figures match the official release. ".repeat(40);
        let (adjudicator, _) = adjudicator(MockGenerator::new().with_reply(
            "adjudication",
            reply(vec![assessment("C1", &["supports"], 0.7, &long)]),
        ));

        let result = adjudicator
            .adjudicate("Prices rose 10% in March", &[c], &map)
            .await;
        let rationale = &result.verdicts[0].rationale;
        assert!(rationale.chars().count() <= 700);
        assert!(rationale.ends_with("Sources: Reuters."));
    }

    #[tokio::test]
    async fn test_divergent_claims_are_mixed() {
        let first = claim("Vaccine X causes infertility in women");
        let second = claim("The city banned cars downtown");
        let map = evidence(vec![
            (&first, vec![citation("Reuters", AuthorityTier::News, 2023)]),
            (&second, vec![]),
        ]);
        let (adjudicator, mock) = adjudicator(MockGenerator::new().with_reply(
            "adjudication",
            reply(vec![assessment("C1", &["contradicts"], 0.9, "Reuters found no link.")]),
        ));

        let result = adjudicator
            .adjudicate("text", &[first, second], &map)
            .await;
        assert_eq!(result.verdicts[0].label, Label::False);
        assert_eq!(result.verdicts[1].label, Label::Unverifiable);
        assert_eq!(result.overall.label, Label::Mixed);
        assert!(!mock.calls()[0].user.contains("banned cars"));
    }

    #[tokio::test]
    async fn test_llm_unavailable_is_unverifiable() {
        let c = claim("Prices rose 10% in March");
        let map = evidence(vec![(&c, vec![citation("Reuters", AuthorityTier::News, 2024)])]);
        let (adjudicator, mock) = adjudicator(MockGenerator::new().failing("connection reset"));

        let result = adjudicator
            .adjudicate_in("Prices rose", &[c], &map, Language::English)
            .await;
        assert_eq!(result.verdicts[0].label, Label::Unverifiable);
        assert!(result.degraded);
        assert_eq!(mock.total_calls(), 1);
    }

    #[test]
    fn test_parse_ref() {
        assert_eq!(parse_ref('C', "C1"), Some(0));
        assert_eq!(parse_ref('S', "[s3]"), Some(2));
        assert_eq!(parse_ref('S', "S0"), None);
        assert_eq!(parse_ref('C', "S1"), None);
        assert_eq!(parse_ref('C', "claim one"), None);
    }
}
