use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::oneshot;
use tokio::time::{timeout_at, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use super::fingerprint::{claim_fingerprint, request_fingerprint};
use super::inflight::{InFlight, Waiter};
use super::Stage;
use crate::adjudication::prompts::adjudication_failed;
use crate::adjudication::Adjudicator;
use crate::ai::LlmClient;
use crate::claims::{ClaimExtractor, ClaimRequest};
use crate::error::{ConfigError, InputError};
use crate::evidence::EvidenceEngine;
use crate::fetchers::ReqwestFetcher;
use crate::resilience::BreakerRegistry;
use crate::security::UrlGuard;
use crate::sources::SourceExtractor;
use crate::stores::MemoryVerdictCache;
use crate::traits::browser::BrowserRuntime;
use crate::traits::cache::{CachedValue, VerdictCache};
use crate::traits::fetcher::HttpFetcher;
use crate::traits::generator::StructuredGenerator;
use crate::traits::searcher::SearchProvider;
use crate::types::citation::{ClaimEvidence, EvidenceMap};
use crate::types::claim::{Claim, ClaimSet};
use crate::types::config::PipelineConfig;
use crate::types::content::{ExtractedContent, LinkReport};
use crate::types::input::{Language, RawInput, ValidatedInput};
use crate::types::report::{CacheStatus, CompletionStatus, FactCheckReport, Outcome, RequestOutcome};
use crate::types::verdict::{Label, OverallVerdict, Verdict};

/// Slack on top of the request budget before a caller stops waiting on its
/// own. The computation enforces the budget itself and normally answers
/// first.
const CALLER_GRACE: Duration = Duration::from_secs(2);

/// `process(RawInput) -> Verdict[]`.
///
/// Constructed once at process start with every dependency injected; cheap to
/// share behind an `Arc`.
pub struct Orchestrator {
    pipeline: Arc<Pipeline>,
    inflight: InFlight<RequestOutcome>,
}

struct Pipeline {
    config: PipelineConfig,
    claim_flights: InFlight<Option<SharedVerdict>>,
    sources: SourceExtractor,
    claims: ClaimExtractor,
    evidence: EvidenceEngine,
    adjudicator: Adjudicator,
    cache: Arc<dyn VerdictCache>,
    breakers: Arc<BreakerRegistry>,
}

impl Orchestrator {
    pub fn builder(config: PipelineConfig) -> OrchestratorBuilder {
        OrchestratorBuilder::new(config)
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.pipeline.config
    }

    pub fn breakers(&self) -> &Arc<BreakerRegistry> {
        &self.pipeline.breakers
    }

    /// Request and claim computations currently in flight.
    pub fn in_flight(&self) -> usize {
        self.inflight.len() + self.pipeline.claim_flights.len()
    }

    /// Run the pipeline for one message. Only a malformed `RawInput` is an
    /// error; every other failure degrades the report instead.
    pub async fn process(&self, raw: RawInput) -> Result<FactCheckReport, InputError> {
        self.process_with_cancel(raw, CancellationToken::new()).await
    }

    /// Like [`Orchestrator::process`], but gives up when `cancel` fires.
    ///
    /// Giving up only withdraws this caller. The shared computation keeps
    /// running while other callers wait on it and is cancelled when none is
    /// left.
    pub async fn process_with_cancel(
        &self,
        raw: RawInput,
        cancel: CancellationToken,
    ) -> Result<FactCheckReport, InputError> {
        let started = Instant::now();
        let input = raw.validate(&self.pipeline.config.input)?;
        let fingerprint = request_fingerprint(&input);
        info!(
            stage = %Stage::Received,
            fingerprint = %fingerprint,
            channel_id = %input.channel_id,
            message_id = %input.message_id,
            links = input.links.len(),
            "Request received"
        );

        if let Some(mut cached) = self.pipeline.cached_request(&fingerprint).await {
            let elapsed_ms = started.elapsed().as_millis() as u64;
            for verdict in &mut cached.verdicts {
                verdict.processing_time_ms = elapsed_ms;
            }
            info!(fingerprint = %fingerprint, elapsed_ms, "Served from cache");
            return Ok(report(&input, fingerprint, cached, CacheStatus::Hit, started));
        }

        let pipeline = self.pipeline.clone();
        let flight_input = input.clone();
        let flight_key = fingerprint.clone();
        let waiter = self.inflight.join_or_start(&fingerprint, move |_| async move {
            pipeline.run(flight_input, flight_key).await
        });
        let status = if waiter.joined() {
            CacheStatus::Joined
        } else {
            CacheStatus::Miss
        };

        let budget = self.pipeline.config.timeouts.request + CALLER_GRACE;
        let result = tokio::select! {
            result = waiter.wait() => match result {
                Some(result) => result,
                None => abandoned(&input, "The computation for this message was abandoned"),
            },
            _ = cancel.cancelled() => {
                warn!(fingerprint = %fingerprint, "Caller cancelled; leaving computation");
                abandoned(&input, "The request was cancelled before it finished")
            }
            _ = tokio::time::sleep(budget) => {
                warn!(fingerprint = %fingerprint, "Caller budget exhausted");
                abandoned(&input, "The request ran out of time before it finished")
            }
        };

        Ok(report(&input, fingerprint, result, status, started))
    }
}

/// One claim's verdict as handed to concurrent requests for the same claim.
#[derive(Clone)]
struct SharedVerdict {
    verdict: Verdict,
    degraded: bool,
}

/// A claim this request computes. Holding the waiter keeps the flight open
/// for joiners until the verdict is sent.
struct OwnedClaim {
    index: usize,
    sender: oneshot::Sender<SharedVerdict>,
    _waiter: Waiter<Option<SharedVerdict>>,
}

fn report(
    input: &ValidatedInput,
    fingerprint: String,
    result: RequestOutcome,
    cache: CacheStatus,
    started: Instant,
) -> FactCheckReport {
    FactCheckReport {
        channel_id: input.channel_id.clone(),
        message_id: input.message_id.clone(),
        fingerprint,
        result,
        cache,
        processing_time_ms: started.elapsed().as_millis() as u64,
    }
}

/// What a caller that stopped waiting gets back. Nothing is known about the
/// claims at this point.
fn abandoned(input: &ValidatedInput, note: &str) -> RequestOutcome {
    RequestOutcome {
        outcome: Outcome::Incomplete {
            note: note.to_string(),
        },
        status: CompletionStatus::Degraded,
        claims: Vec::new(),
        verdicts: Vec::new(),
        overall: Some(OverallVerdict {
            label: Label::Unverifiable,
            rationale: adjudication_failed(input.language).to_string(),
        }),
        links: input
            .links
            .iter()
            .map(|url| LinkReport::timed_out(url.as_str()))
            .collect(),
        notes: vec![note.to_string()],
    }
}

impl Pipeline {
    async fn cached_request(&self, fingerprint: &str) -> Option<RequestOutcome> {
        match self.cache.get(fingerprint).await {
            Ok(Some(CachedValue::Request(result))) => Some(*result),
            Ok(Some(CachedValue::Claim(_))) => {
                warn!(key = %fingerprint, "Unexpected claim entry under a request key");
                None
            }
            Ok(None) => None,
            Err(e) => {
                warn!(key = %fingerprint, error = %e, "Cache read failed; computing");
                None
            }
        }
    }

    async fn cached_verdict(&self, key: &str) -> Option<Verdict> {
        match self.cache.get(key).await {
            Ok(Some(CachedValue::Claim(verdict))) => Some(*verdict),
            Ok(_) => None,
            Err(e) => {
                warn!(key = %key, error = %e, "Cache read failed; computing");
                None
            }
        }
    }

    async fn store(&self, key: &str, value: CachedValue, degraded: bool) {
        let ttl = if degraded {
            self.config.cache.degraded_ttl
        } else {
            self.config.cache.ttl
        };
        if let Err(e) = self.cache.put(key, value, ttl).await {
            warn!(key = %key, error = %e, "Cache write failed");
        }
    }

    fn enter(&self, stage: Stage, fingerprint: &str) {
        info!(stage = %stage, fingerprint = %fingerprint, "Stage started");
    }

    /// Time left for a stage: its own budget, cut short by the request's.
    fn stage_deadline(&self, stage_budget: Duration, request_deadline: Instant) -> Instant {
        (Instant::now() + stage_budget).min(request_deadline)
    }

    async fn run(&self, input: ValidatedInput, fingerprint: String) -> RequestOutcome {
        let started = Instant::now();
        let timeouts = &self.config.timeouts;
        let deadline = started + timeouts.request;
        let language = input.language;
        let mut degraded = false;
        let mut notes: Vec<String> = Vec::new();

        let (contents, links) = if input.links.is_empty() {
            (Vec::new(), Vec::new())
        } else {
            self.enter(Stage::Extracting, &fingerprint);
            let stage_deadline = self.stage_deadline(timeouts.source_extraction, deadline);
            self.extract_links(&input.links, stage_deadline, &mut degraded)
                .await
        };

        self.enter(Stage::ClaimExtraction, &fingerprint);
        let text = input.merged_text();
        let link_strings: Vec<String> = input.links.iter().map(|u| u.to_string()).collect();
        let request = ClaimRequest {
            text: &text,
            locale: &input.locale,
            entities_hint: &[],
            links: &link_strings,
            link_context: &contents,
        };
        let claim_deadline = self.stage_deadline(timeouts.claim_extraction, deadline);
        let claim_set = match timeout_at(claim_deadline, self.claims.extract_request(request)).await
        {
            Ok(set) => set,
            Err(_) => {
                warn!(fingerprint = %fingerprint, "Claim extraction timed out");
                ClaimSet::empty(language, "Claim extraction timed out", true)
            }
        };
        degraded |= claim_set.degraded;
        notes.extend(claim_set.notes.iter().cloned());

        if claim_set.is_empty() {
            let note = claim_set
                .notes
                .iter()
                .find(|n| n.starts_with("No verifiable claim"))
                .cloned()
                .unwrap_or_else(|| "No verifiable claim found".to_string());
            let result = RequestOutcome {
                outcome: Outcome::NoClaimFound { note },
                status: status_for(degraded),
                claims: Vec::new(),
                verdicts: Vec::new(),
                overall: None,
                links,
                notes,
            };
            return self.finish(&fingerprint, result, started).await;
        }

        let claims = claim_set.claims;
        let mut resolved: Vec<Option<Verdict>> = Vec::with_capacity(claims.len());
        for claim in &claims {
            resolved.push(self.cached_verdict(&claim_fingerprint(claim)).await);
        }
        let from_cache = resolved.iter().filter(|v| v.is_some()).count();

        // A claim another request is already checking is joined, not
        // recomputed. Owned claims publish their verdict through `sender`.
        let mut owned: Vec<OwnedClaim> = Vec::new();
        let mut joined: Vec<(usize, Waiter<Option<SharedVerdict>>)> = Vec::new();
        for (index, claim) in claims.iter().enumerate() {
            if resolved[index].is_some() {
                continue;
            }
            let (sender, receiver) = oneshot::channel();
            let waiter = self
                .claim_flights
                .join_or_start(&claim_fingerprint(claim), move |_| async move {
                    receiver.await.ok()
                });
            if waiter.joined() {
                joined.push((index, waiter));
            } else {
                owned.push(OwnedClaim {
                    index,
                    sender,
                    _waiter: waiter,
                });
            }
        }
        debug!(
            fingerprint = %fingerprint,
            claims = claims.len(),
            cached = from_cache,
            joined = joined.len(),
            "Claim verdict cache checked"
        );

        let pending: Vec<Claim> = owned.iter().map(|o| claims[o.index].clone()).collect();
        let mut fresh: Vec<Verdict> = Vec::new();
        let mut overall_rationale = None;
        let mut claim_degraded: Vec<bool> = Vec::new();
        if !pending.is_empty() {
            self.enter(Stage::EvidenceRetrieval, &fingerprint);
            let retrieval_deadline = self.stage_deadline(timeouts.retrieval, deadline);
            let evidence = self.retrieve_all(&pending, retrieval_deadline).await;
            for claim_evidence in evidence.values() {
                notes.extend(claim_evidence.retrieval_notes.iter().cloned());
            }

            self.enter(Stage::Adjudication, &fingerprint);
            let adjudication_deadline = self.stage_deadline(timeouts.adjudication, deadline);
            let adjudicated = timeout_at(
                adjudication_deadline,
                self.adjudicator
                    .adjudicate_in(&text, &pending, &evidence, language),
            )
            .await;

            let adjudication_degraded = match adjudicated {
                Ok(adjudication) => {
                    overall_rationale = Some(adjudication.overall.rationale);
                    fresh = adjudication.verdicts;
                    adjudication.degraded
                }
                Err(_) => {
                    warn!(fingerprint = %fingerprint, "Adjudication timed out");
                    notes.push("Adjudication timed out".to_string());
                    fresh = pending
                        .iter()
                        .map(|claim| self.unresolved(claim, language))
                        .collect();
                    true
                }
            };

            claim_degraded = pending
                .iter()
                .map(|claim| {
                    adjudication_degraded
                        || evidence.get(&claim.id).map_or(true, |e| e.degraded)
                })
                .collect();
            degraded |= claim_degraded.iter().any(|d| *d);
        }

        let elapsed_ms = started.elapsed().as_millis() as u64;
        for ((claim, mut verdict), (owner, claim_degraded)) in pending
            .iter()
            .zip(fresh)
            .zip(owned.into_iter().zip(claim_degraded))
        {
            verdict.processing_time_ms = elapsed_ms;
            self.store(
                &claim_fingerprint(claim),
                CachedValue::Claim(Box::new(verdict.clone())),
                claim_degraded,
            )
            .await;
            let _ = owner.sender.send(SharedVerdict {
                verdict: verdict.clone(),
                degraded: claim_degraded,
            });
            resolved[owner.index] = Some(verdict);
        }

        let shared = joined.len();
        for (index, waiter) in joined {
            let claim = &claims[index];
            match timeout_at(deadline, waiter.wait()).await {
                Ok(Some(Some(result))) => {
                    degraded |= result.degraded;
                    let mut verdict = result.verdict;
                    verdict.processing_time_ms = started.elapsed().as_millis() as u64;
                    resolved[index] = Some(verdict);
                }
                _ => {
                    warn!(claim_id = %claim.id, "Shared claim check did not finish");
                    notes.push(
                        "A claim checked by a concurrent request did not finish".to_string(),
                    );
                    degraded = true;
                    resolved[index] = Some(self.unresolved(claim, language));
                }
            }
        }

        let verdicts: Vec<Verdict> = resolved.into_iter().flatten().collect();
        let rationale = match overall_rationale {
            Some(rationale) if from_cache + shared == 0 => rationale,
            _ => joined_rationales(&verdicts, self.config.adjudication.max_rationale_chars),
        };
        let overall = OverallVerdict::aggregate(&verdicts, rationale);

        let outcome = if Instant::now() >= deadline {
            degraded = true;
            Outcome::Incomplete {
                note: "The request budget ran out; unresolved claims are unverifiable".to_string(),
            }
        } else {
            Outcome::Verdicts
        };

        let result = RequestOutcome {
            outcome,
            status: status_for(degraded),
            claims,
            verdicts,
            overall: Some(overall),
            links,
            notes,
        };
        self.finish(&fingerprint, result, started).await
    }

    async fn finish(
        &self,
        fingerprint: &str,
        result: RequestOutcome,
        started: Instant,
    ) -> RequestOutcome {
        let degraded = result.is_degraded();
        let stage = if degraded {
            Stage::Degraded
        } else {
            Stage::Completed
        };
        self.store(
            fingerprint,
            CachedValue::Request(Box::new(result.clone())),
            degraded,
        )
        .await;
        info!(
            stage = %stage,
            fingerprint = %fingerprint,
            claims = result.claims.len(),
            overall = ?result.overall.as_ref().map(|o| o.label),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Request finished"
        );
        result
    }

    /// Extract every link concurrently. Links still running at the deadline
    /// are reported as timed out; the rest keep their results.
    async fn extract_links(
        &self,
        links: &[Url],
        deadline: Instant,
        degraded: &mut bool,
    ) -> (Vec<ExtractedContent>, Vec<LinkReport>) {
        let results = join_all(
            links
                .iter()
                .map(|url| timeout_at(deadline, self.sources.extract(url))),
        )
        .await;

        let mut contents = Vec::new();
        let mut reports = Vec::with_capacity(links.len());
        for (url, result) in links.iter().zip(results) {
            match result {
                Ok(result) => {
                    let link_report = LinkReport::from_result(url.as_str(), &result);
                    match result {
                        Ok(content) => contents.push(content),
                        Err(failure) => {
                            warn!(error = %failure, "Link content unavailable");
                            *degraded |= failure.has_dependency_failure();
                        }
                    }
                    reports.push(link_report);
                }
                Err(_) => {
                    warn!(url = %url, "Link extraction timed out");
                    *degraded = true;
                    reports.push(LinkReport::timed_out(url.as_str()));
                }
            }
        }
        (contents, reports)
    }

    /// Retrieve evidence for every claim concurrently; a claim still running
    /// at the deadline gets empty evidence.
    async fn retrieve_all(&self, claims: &[Claim], deadline: Instant) -> EvidenceMap {
        join_all(claims.iter().map(|claim| async move {
            match timeout_at(deadline, self.evidence.retrieve(claim)).await {
                Ok(evidence) => evidence,
                Err(_) => {
                    warn!(claim_id = %claim.id, "Evidence retrieval timed out");
                    let mut evidence =
                        ClaimEvidence::empty(claim.id.clone(), "Evidence retrieval timed out");
                    evidence.provider_failures = self
                        .evidence
                        .provider_names()
                        .into_iter()
                        .map(|name| format!("{}: stage timed out", name))
                        .collect();
                    evidence
                }
            }
        }))
        .await
        .into_iter()
        .map(|evidence| (evidence.claim_id.clone(), evidence))
        .collect()
    }

    fn unresolved(&self, claim: &Claim, language: Language) -> Verdict {
        Verdict {
            claim_id: claim.id.clone(),
            label: Label::Unverifiable,
            confidence: self.config.adjudication.low_confidence,
            rationale: adjudication_failed(language).to_string(),
            citations: Vec::new(),
            processing_time_ms: 0,
        }
    }
}

fn status_for(degraded: bool) -> CompletionStatus {
    if degraded {
        CompletionStatus::Degraded
    } else {
        CompletionStatus::Completed
    }
}

fn joined_rationales(verdicts: &[Verdict], max: usize) -> String {
    let mut seen = std::collections::BTreeSet::new();
    let joined = verdicts
        .iter()
        .map(|v| v.rationale.as_str())
        .filter(|r| seen.insert(*r))
        .collect::<Vec<_>>()
        .join(" ");
    crate::text::truncate_chars(&joined, max)
}

/// Wires the pipeline from its capabilities.
///
/// Only the generator is required. Without a fetcher a reqwest client guarded
/// by the URL guard is used; without a cache, an in-memory one; without a
/// browser runtime, the heavy strategy is left out of the chain.
pub struct OrchestratorBuilder {
    config: PipelineConfig,
    generator: Option<Arc<dyn StructuredGenerator>>,
    providers: Vec<Arc<dyn SearchProvider>>,
    fetcher: Option<Arc<dyn HttpFetcher>>,
    browser: Option<Arc<dyn BrowserRuntime>>,
    cache: Option<Arc<dyn VerdictCache>>,
    breakers: Option<Arc<BreakerRegistry>>,
    url_guard: Option<UrlGuard>,
}

impl OrchestratorBuilder {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            generator: None,
            providers: Vec::new(),
            fetcher: None,
            browser: None,
            cache: None,
            breakers: None,
            url_guard: None,
        }
    }

    pub fn with_generator(mut self, generator: Arc<dyn StructuredGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn with_provider(mut self, provider: Arc<dyn SearchProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    pub fn with_fetcher(mut self, fetcher: Arc<dyn HttpFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn with_browser(mut self, browser: Arc<dyn BrowserRuntime>) -> Self {
        self.browser = Some(browser);
        self
    }

    pub fn with_cache(mut self, cache: Arc<dyn VerdictCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Share breakers with other components (or observe them in tests).
    pub fn with_breakers(mut self, breakers: Arc<BreakerRegistry>) -> Self {
        self.breakers = Some(breakers);
        self
    }

    pub fn with_url_guard(mut self, guard: UrlGuard) -> Self {
        self.url_guard = Some(guard);
        self
    }

    pub fn build(self) -> Result<Orchestrator, ConfigError> {
        let config = self.config;
        let generator = self
            .generator
            .ok_or(ConfigError::MissingComponent("structured generator"))?;
        let breakers = self
            .breakers
            .unwrap_or_else(|| Arc::new(BreakerRegistry::new(config.breaker.clone())));
        let guard = self
            .url_guard
            .unwrap_or_else(|| UrlGuard::new().with_dns_check(config.source.resolve_dns));

        let fetcher: Arc<dyn HttpFetcher> = match self.fetcher {
            Some(fetcher) => fetcher,
            None => Arc::new(ReqwestFetcher::with_guard(guard.clone())?),
        };
        let browser = self.browser.map(|runtime| {
            let breaker = breakers.breaker(&format!("browser:{}", runtime.name()));
            (runtime, breaker)
        });

        let llm_breaker = breakers.breaker(&format!("llm:{}", generator.name()));
        let llm = LlmClient::new(generator, llm_breaker, config.timeouts.llm_call);

        let sources = SourceExtractor::new(&config.source, fetcher, browser).with_guard(guard);
        let claims = ClaimExtractor::new(llm.clone(), config.claims.clone());
        let evidence =
            EvidenceEngine::new(self.providers, breakers.clone(), config.retrieval.clone());
        let adjudicator = Adjudicator::new(llm, config.adjudication.clone());
        let cache = self
            .cache
            .unwrap_or_else(|| Arc::new(MemoryVerdictCache::new()));

        info!(
            strategies = ?sources.strategy_kinds(),
            providers = ?evidence.provider_names(),
            "Orchestrator ready"
        );

        Ok(Orchestrator {
            pipeline: Arc::new(Pipeline {
                config,
                claim_flights: InFlight::new(),
                sources,
                claims,
                evidence,
                adjudicator,
                cache,
                breakers,
            }),
            inflight: InFlight::new(),
        })
    }
}
