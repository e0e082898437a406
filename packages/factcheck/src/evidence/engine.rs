use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use tracing::{debug, info, warn};

use super::normalize::{normalize_hit, CitationCandidate};
use super::queries::build_queries;
use super::rank::{dedup, match_score, rank};
use crate::error::BreakerError;
use crate::resilience::BreakerRegistry;
use crate::text::significant_tokens;
use crate::traits::searcher::{SearchHit, SearchProvider};
use crate::types::citation::ClaimEvidence;
use crate::types::claim::Claim;
use crate::types::config::RetrievalConfig;

/// `retrieve(claim) -> ClaimEvidence`.
///
/// Every query goes to every provider concurrently, each call behind the
/// provider's circuit breaker and timeout. Provider failures shrink the
/// evidence; they are never returned as errors.
pub struct EvidenceEngine {
    providers: Vec<Arc<dyn SearchProvider>>,
    breakers: Arc<BreakerRegistry>,
    config: RetrievalConfig,
}

struct CallResult {
    provider: usize,
    query: String,
    outcome: Result<Vec<SearchHit>, String>,
}

impl EvidenceEngine {
    pub fn new(
        providers: Vec<Arc<dyn SearchProvider>>,
        breakers: Arc<BreakerRegistry>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            providers,
            breakers,
            config,
        }
    }

    pub fn provider_names(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.name().to_string()).collect()
    }

    pub async fn retrieve(&self, claim: &Claim) -> ClaimEvidence {
        let queries = build_queries(claim, self.config.max_entity_queries);
        if self.providers.is_empty() {
            let mut evidence =
                ClaimEvidence::empty(claim.id.clone(), "No search providers configured");
            evidence.search_queries_used = queries;
            return evidence;
        }

        let calls = self.providers.iter().enumerate().flat_map(|(index, provider)| {
            queries
                .iter()
                .map(move |query| self.call_provider(index, provider.clone(), query.clone()))
        });
        let results = join_all(calls).await;

        let retrieved_at = Utc::now();
        let claim_terms = significant_tokens(&claim.normalized_text);
        let mut candidates = Vec::new();
        let mut hit_counts = vec![0usize; self.providers.len()];
        let mut provider_failures = Vec::new();

        for result in results {
            let provider = &self.providers[result.provider];
            match result.outcome {
                Ok(hits) => {
                    hit_counts[result.provider] += hits.len();
                    for hit in &hits {
                        let Some(citation) = normalize_hit(
                            hit,
                            provider.is_fact_check_source(),
                            &self.config,
                            retrieved_at,
                        ) else {
                            debug!(
                                provider = provider.name(),
                                url = %hit.url,
                                "Dropping hit without a usable URL"
                            );
                            continue;
                        };
                        let match_score = match_score(&claim_terms, &citation);
                        candidates.push(CitationCandidate {
                            citation,
                            provider_rank: result.provider,
                            match_score,
                        });
                    }
                }
                Err(error) => {
                    provider_failures.push(format!(
                        "{} ({}): {}",
                        provider.name(),
                        result.query,
                        error
                    ));
                }
            }
        }

        let total_calls = self.providers.len() * queries.len();
        let mut retrieval_notes: Vec<String> = self
            .providers
            .iter()
            .zip(&hit_counts)
            .filter(|(_, count)| **count > 0)
            .map(|(provider, count)| format!("Found {} results from {}", count, provider.name()))
            .collect();
        if provider_failures.len() == total_calls {
            retrieval_notes.push("All search providers failed; no evidence retrieved".to_string());
        }

        let mut ranked = dedup(candidates);
        rank(&mut ranked, self.config.rank_order);
        let cap = self.config.citation_cap();
        if ranked.len() > cap {
            retrieval_notes.push(format!(
                "Kept the top {} of {} unique results",
                cap,
                ranked.len()
            ));
            ranked.truncate(cap);
        }
        if ranked.is_empty() && provider_failures.len() < total_calls {
            retrieval_notes.push("Search returned no usable results".to_string());
        }

        let citations: Vec<_> = ranked.into_iter().map(|c| c.citation).collect();
        info!(
            claim_id = %claim.id,
            queries = queries.len(),
            citations = citations.len(),
            failures = provider_failures.len(),
            "Evidence retrieved"
        );

        ClaimEvidence {
            claim_id: claim.id.clone(),
            citations,
            search_queries_used: queries,
            retrieval_notes,
            degraded: !provider_failures.is_empty(),
            provider_failures,
        }
    }

    async fn call_provider(
        &self,
        index: usize,
        provider: Arc<dyn SearchProvider>,
        query: String,
    ) -> CallResult {
        let breaker = self.breakers.breaker(&format!("search:{}", provider.name()));
        let outcome = breaker
            .call(
                self.config.provider_timeout,
                provider.search(&query),
                |_| true,
            )
            .await
            .map_err(|e| {
                let message = match &e {
                    BreakerError::Open(_) => "circuit open".to_string(),
                    BreakerError::TimedOut(_) => format!(
                        "timed out after {}ms",
                        self.config.provider_timeout.as_millis()
                    ),
                    BreakerError::Inner(inner) => inner.to_string(),
                };
                warn!(
                    provider = provider.name(),
                    query = %query,
                    error = %message,
                    "Search call failed"
                );
                message
            });

        CallResult {
            provider: index,
            query,
            outcome,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::resilience::BreakerState;
    use crate::testing::{hit, MockSearchProvider};
    use crate::types::claim::ClaimId;
    use crate::types::config::BreakerConfig;

    fn claim() -> Claim {
        Claim {
            id: ClaimId::from_key("vaccine x cause infertility women"),
            normalized_text: "Vaccine X causes infertility in women".into(),
            key: "vaccine x cause infertility women".into(),
            entities: vec![],
            source_links: vec![],
            extraction_rationale: String::new(),
        }
    }

    fn engine(providers: Vec<Arc<dyn SearchProvider>>) -> EvidenceEngine {
        EvidenceEngine::new(
            providers,
            Arc::new(BreakerRegistry::new(BreakerConfig::default())),
            RetrievalConfig::default().with_provider_timeout(Duration::from_secs(2)),
        )
    }

    #[tokio::test]
    async fn test_duplicates_across_providers_collapse() {
        let web = Arc::new(MockSearchProvider::new("web").with_default_results(vec![
            hit(
                "https://www.reuters.com/fact-check/x/?utm_source=tw",
                "Fact check",
                "NO LINK to infertility",
                Some("2024-02-01"),
            ),
            hit(
                "https://blog.example.net/post",
                "Blog",
                "vaccine infertility rumours",
                None,
            ),
        ]));
        let checker = Arc::new(MockSearchProvider::new("checker").with_default_results(vec![hit(
            "http://reuters.com/fact-check/x#section",
            "Fact check",
            "no link to infertility",
            Some("2024-03-01"),
        )]));

        let evidence = engine(vec![web as Arc<dyn SearchProvider>, checker])
            .retrieve(&claim())
            .await;
        assert_eq!(evidence.citations.len(), 2);
        assert_eq!(evidence.citations[0].url, "https://reuters.com/fact-check/x");
        assert_eq!(
            evidence.citations[0].published_at.map(|d| d.to_rfc3339()),
            Some("2024-03-01T00:00:00+00:00".to_string())
        );
        assert!(!evidence.degraded);
        assert_eq!(
            evidence.search_queries_used,
            vec!["Vaccine X causes infertility in women"]
        );
        assert!(evidence
            .retrieval_notes
            .contains(&"Found 2 results from web".to_string()));
    }

    #[tokio::test]
    async fn test_every_query_is_recorded_and_issued() {
        let mut claim = claim();
        claim.entities = vec!["Vaccine X".into()];
        let provider = Arc::new(MockSearchProvider::new("web"));

        let evidence = engine(vec![provider.clone() as Arc<dyn SearchProvider>])
            .retrieve(&claim)
            .await;
        assert_eq!(evidence.search_queries_used.len(), 2);
        assert_eq!(provider.calls(), evidence.search_queries_used);
    }

    #[tokio::test]
    async fn test_failing_provider_is_skipped() {
        let good = Arc::new(MockSearchProvider::new("good").with_default_results(vec![hit(
            "https://apnews.com/a",
            "AP",
            "snippet",
            None,
        )]));
        let bad = Arc::new(MockSearchProvider::new("bad").failing("503"));

        let evidence = engine(vec![bad as Arc<dyn SearchProvider>, good]).retrieve(&claim()).await;
        assert_eq!(evidence.citations.len(), 1);
        assert!(evidence.degraded);
        assert_eq!(evidence.provider_failures.len(), 1);
        assert!(evidence.provider_failures[0].starts_with("bad"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_providers_timing_out_yields_empty_evidence() {
        let slow = Arc::new(
            MockSearchProvider::new("slow")
                .with_default_results(vec![hit("https://apnews.com/a", "AP", "s", None)])
                .with_delay(Duration::from_secs(60)),
        );

        let evidence = engine(vec![slow as Arc<dyn SearchProvider>]).retrieve(&claim()).await;
        assert!(evidence.citations.is_empty());
        assert!(evidence.degraded);
        assert!(evidence.provider_failures[0].contains("timed out"));
        assert!(evidence
            .retrieval_notes
            .iter()
            .any(|n| n.contains("All search providers failed")));
    }

    #[tokio::test]
    async fn test_open_circuit_skips_io() {
        let breakers = Arc::new(BreakerRegistry::new(BreakerConfig {
            failure_threshold: 1,
            ..BreakerConfig::default()
        }));
        let bad = Arc::new(MockSearchProvider::new("bad").failing("down"));
        let engine = EvidenceEngine::new(
            vec![bad.clone() as Arc<dyn SearchProvider>],
            breakers.clone(),
            RetrievalConfig::default(),
        );

        engine.retrieve(&claim()).await;
        assert_eq!(breakers.breaker("search:bad").state(), BreakerState::Open);

        let evidence = engine.retrieve(&claim()).await;
        assert_eq!(bad.call_count(), 1);
        assert!(evidence.provider_failures[0].contains("circuit open"));
    }

    #[tokio::test]
    async fn test_citations_are_capped() {
        let hits = (0..12)
            .map(|i| hit(&format!("https://site{}.example/a", i), "t", "s", None))
            .collect();
        let provider = Arc::new(MockSearchProvider::new("web").with_default_results(hits));

        let evidence = engine(vec![provider as Arc<dyn SearchProvider>]).retrieve(&claim()).await;
        assert_eq!(evidence.citations.len(), 5);
        assert_eq!(evidence.citations[0].url, "https://site0.example/a");
    }

    #[tokio::test]
    async fn test_no_providers() {
        let evidence = engine(vec![]).retrieve(&claim()).await;
        assert!(evidence.citations.is_empty());
        assert_eq!(evidence.search_queries_used.len(), 1);
    }
}
