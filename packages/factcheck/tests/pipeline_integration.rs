//! End-to-end tests for the fact-check pipeline.
//!
//! Every external capability is mocked; the assertions look at the final
//! report and at how many calls each mock received.

use std::sync::Arc;
use std::time::Duration;

use factcheck::resilience::BreakerState;
use factcheck::testing::{
    article_html, hit, BrokenCache, MockFetcher, MockGenerator, MockSearchProvider,
};
use factcheck::{
    BreakerConfig, BreakerRegistry, CacheStatus, CompletionStatus, FactCheckReport, Label,
    MemoryVerdictCache, Orchestrator, Outcome, PipelineConfig, RawInput, RetrievalConfig,
    SearchHit, SourceConfig, StageTimeouts,
};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

const VACCINE_CLAIM: &str = "Vaccine X causes infertility in women";
const NEGATED_CLAIM: &str = "Vaccine X does not cause infertility in women";

fn config() -> PipelineConfig {
    PipelineConfig::default().with_source(SourceConfig::default().with_dns_check(false))
}

fn claims_reply(texts: &[&str]) -> Value {
    let claims: Vec<Value> = texts
        .iter()
        .map(|text| {
            json!({"text": text, "entities": [], "links": [], "rationale": "stated as fact"})
        })
        .collect();
    json!({"claims": claims, "no_claim_reason": ""})
}

fn adjudication_reply(stances: &[&str], confidence: f32, rationale: &str) -> Value {
    let sources: Vec<Value> = stances
        .iter()
        .enumerate()
        .map(|(i, stance)| json!({"source": format!("S{}", i + 1), "stance": stance}))
        .collect();
    json!({
        "verdicts": [{
            "claim": "C1",
            "sources": sources,
            "misleading_framing": false,
            "confidence": confidence,
            "rationale": rationale
        }],
        "overall_rationale": rationale
    })
}

fn debunking_hits() -> Vec<SearchHit> {
    vec![
        hit(
            "https://www.reuters.com/fact-check/vaccine-x-infertility",
            "Fact check: no link between vaccine X and infertility",
            "There is no evidence that vaccine X causes infertility in women.",
            Some("2023-05-01"),
        ),
        hit(
            "https://www.who.int/news/vaccine-x-safety",
            "Vaccine X safety update",
            "Studies found vaccine X does not cause infertility.",
            Some("2022-11-20"),
        ),
    ]
}

fn vaccine_generator() -> MockGenerator {
    MockGenerator::new()
        .with_reply("claims", claims_reply(&[VACCINE_CLAIM]))
        .with_reply(
            "adjudication",
            adjudication_reply(
                &["contradicts", "contradicts"],
                0.9,
                "Reuters and WHO found no evidence of a link to infertility.",
            ),
        )
}

fn vaccine_message(message_id: &str) -> RawInput {
    RawInput::new("whatsapp", message_id, VACCINE_CLAIM).with_locale("en")
}

#[tokio::test]
async fn test_false_claim_is_debunked_with_citations() {
    let generator = Arc::new(vaccine_generator());
    let provider = Arc::new(MockSearchProvider::new("web").with_default_results(debunking_hits()));
    let orchestrator = Orchestrator::builder(config())
        .with_generator(generator.clone())
        .with_provider(provider.clone())
        .build()
        .unwrap();

    let report = orchestrator.process(vaccine_message("m1")).await.unwrap();

    assert_eq!(report.result.outcome, Outcome::Verdicts);
    assert_eq!(report.result.status, CompletionStatus::Completed);
    assert_eq!(report.cache, CacheStatus::Miss);
    let verdict = &report.verdicts()[0];
    assert_eq!(verdict.label, Label::False);
    assert!(verdict.citations.len() >= 2);
    assert!(verdict.rationale.contains("Reuters"));
    assert_eq!(report.result.overall.as_ref().unwrap().label, Label::False);
}

#[tokio::test]
async fn test_repeated_message_is_served_from_cache() {
    let generator = Arc::new(vaccine_generator());
    let provider = Arc::new(MockSearchProvider::new("web").with_default_results(debunking_hits()));
    let orchestrator = Orchestrator::builder(config())
        .with_generator(generator.clone())
        .with_provider(provider.clone())
        .build()
        .unwrap();

    let first = orchestrator.process(vaccine_message("m1")).await.unwrap();
    let llm_calls = generator.total_calls();
    let searches = provider.call_count();

    let second = orchestrator.process(vaccine_message("m2")).await.unwrap();

    assert_eq!(second.cache, CacheStatus::Hit);
    assert_eq!(second.fingerprint, first.fingerprint);
    assert_eq!(second.message_id, "m2");
    assert_eq!(generator.total_calls(), llm_calls);
    assert_eq!(provider.call_count(), searches);
    let labels = |r: &FactCheckReport| r.verdicts().iter().map(|v| v.label).collect::<Vec<_>>();
    assert_eq!(labels(&first), labels(&second));
}

#[tokio::test]
async fn test_concurrent_duplicates_share_one_computation() {
    let generator = Arc::new(vaccine_generator().with_delay(Duration::from_millis(50)));
    let provider = Arc::new(MockSearchProvider::new("web").with_default_results(debunking_hits()));
    let orchestrator = Orchestrator::builder(config())
        .with_generator(generator.clone())
        .with_provider(provider.clone())
        .build()
        .unwrap();

    let reports = futures::future::join_all(
        (0..5).map(|i| orchestrator.process(vaccine_message(&format!("m{}", i)))),
    )
    .await;

    let reports: Vec<_> = reports.into_iter().map(Result::unwrap).collect();
    assert_eq!(generator.call_count("claims"), 1);
    assert_eq!(generator.call_count("adjudication"), 1);
    assert_eq!(
        reports.iter().filter(|r| r.cache == CacheStatus::Miss).count(),
        1
    );
    assert_eq!(
        reports.iter().filter(|r| r.cache == CacheStatus::Joined).count(),
        4
    );
    assert!(reports.iter().all(|r| r.verdicts()[0].label == Label::False));
    assert_eq!(orchestrator.in_flight(), 0);
}

#[tokio::test]
async fn test_same_page_from_two_providers_is_cited_once() {
    let generator = Arc::new(
        MockGenerator::new()
            .with_reply("claims", claims_reply(&[VACCINE_CLAIM]))
            .with_reply(
                "adjudication",
                adjudication_reply(&["contradicts"], 0.85, "Reuters found no link."),
            ),
    );
    let web = Arc::new(MockSearchProvider::new("web").with_default_results(vec![hit(
        "https://www.reuters.com/fact-check/vaccine-x-infertility?utm_source=twitter",
        "Fact check: no link between vaccine X and infertility",
        "There is no evidence that vaccine X causes infertility in women.",
        Some("2023-05-01"),
    )]));
    let news = Arc::new(MockSearchProvider::new("news").with_default_results(vec![hit(
        "https://www.reuters.com/fact-check/vaccine-x-infertility",
        "Fact check: no link between vaccine X and infertility",
        "There is no evidence that vaccine X causes infertility in women.",
        Some("2023-05-01"),
    )]));
    let orchestrator = Orchestrator::builder(config())
        .with_generator(generator.clone())
        .with_provider(web)
        .with_provider(news)
        .build()
        .unwrap();

    let report = orchestrator.process(vaccine_message("m1")).await.unwrap();

    let verdict = &report.verdicts()[0];
    assert_eq!(verdict.citations.len(), 1);
    let prompt = generator
        .calls()
        .into_iter()
        .find(|c| c.schema_name == "adjudication")
        .unwrap()
        .user;
    assert!(prompt.contains("[S1]"));
    assert!(!prompt.contains("[S2]"));
}

#[tokio::test]
async fn test_no_evidence_is_unverifiable_without_adjudication() {
    let generator = Arc::new(vaccine_generator());
    let provider = Arc::new(MockSearchProvider::new("web"));
    let orchestrator = Orchestrator::builder(config())
        .with_generator(generator.clone())
        .with_provider(provider.clone())
        .build()
        .unwrap();

    let report = orchestrator.process(vaccine_message("m1")).await.unwrap();

    let verdict = &report.verdicts()[0];
    assert_eq!(verdict.label, Label::Unverifiable);
    assert!(verdict.citations.is_empty());
    assert!(verdict.rationale.starts_with("Insufficient evidence"));
    assert_eq!(generator.call_count("adjudication"), 0);
    assert!(provider.call_count() >= 1);
}

#[tokio::test(start_paused = true)]
async fn test_slow_providers_time_out_to_unverifiable() {
    let generator = Arc::new(vaccine_generator());
    let provider = Arc::new(
        MockSearchProvider::new("web")
            .with_default_results(debunking_hits())
            .with_delay(Duration::from_secs(60)),
    );
    let orchestrator = Orchestrator::builder(config())
        .with_generator(generator.clone())
        .with_provider(provider)
        .build()
        .unwrap();

    let report = orchestrator.process(vaccine_message("m1")).await.unwrap();

    assert_eq!(report.verdicts()[0].label, Label::Unverifiable);
    assert_eq!(report.result.status, CompletionStatus::Degraded);
    assert_eq!(generator.call_count("adjudication"), 0);
}

#[tokio::test]
async fn test_greeting_has_no_claim_and_skips_retrieval() {
    let generator = Arc::new(MockGenerator::new().with_reply(
        "claims",
        json!({"claims": [], "no_claim_reason": "Saudação sem afirmação verificável"}),
    ));
    let provider = Arc::new(MockSearchProvider::new("web").with_default_results(debunking_hits()));
    let orchestrator = Orchestrator::builder(config())
        .with_generator(generator.clone())
        .with_provider(provider.clone())
        .build()
        .unwrap();

    let report = orchestrator
        .process(RawInput::new("whatsapp", "m1", "Bom dia, pessoal!").with_locale("pt-BR"))
        .await
        .unwrap();

    assert!(matches!(report.result.outcome, Outcome::NoClaimFound { .. }));
    assert_eq!(report.result.status, CompletionStatus::Completed);
    assert!(report.verdicts().is_empty());
    assert!(report.result.overall.is_none());
    assert_eq!(provider.call_count(), 0);
    assert_eq!(generator.call_count("adjudication"), 0);
}

#[tokio::test]
async fn test_unreachable_link_still_checks_the_text() {
    let generator = Arc::new(vaccine_generator());
    let provider = Arc::new(MockSearchProvider::new("web").with_default_results(debunking_hits()));
    let fetcher = Arc::new(
        MockFetcher::new().with_error("https://news.example.org/story", "connection reset"),
    );
    let orchestrator = Orchestrator::builder(config())
        .with_generator(generator.clone())
        .with_provider(provider)
        .with_fetcher(fetcher.clone())
        .build()
        .unwrap();

    let report = orchestrator
        .process(vaccine_message("m1").with_link("https://news.example.org/story"))
        .await
        .unwrap();

    assert_eq!(report.result.outcome, Outcome::Verdicts);
    assert_eq!(report.result.links.len(), 1);
    let link = &report.result.links[0];
    assert!(link.fetch_strategy_used.is_none());
    assert!(link.failure.is_some());
    assert!(!fetcher.calls().is_empty());
    assert_eq!(report.verdicts()[0].label, Label::False);
}

#[tokio::test]
async fn test_linked_article_is_extracted() {
    let url = "https://news.example.org/vaccine-x";
    let paragraphs = [
        "Posts shared widely this week claim that vaccine X causes infertility in women, \
         citing an anonymous nurse.",
        "Health authorities say large trials involving thousands of participants found \
         no effect on fertility.",
        "Researchers who followed vaccinated women over two years reported pregnancy rates \
         matching the unvaccinated group.",
    ];
    let generator = Arc::new(vaccine_generator());
    let provider = Arc::new(MockSearchProvider::new("web").with_default_results(debunking_hits()));
    let fetcher = Arc::new(
        MockFetcher::new().with_page(url, article_html("Vaccine X and fertility", &paragraphs)),
    );
    let orchestrator = Orchestrator::builder(config())
        .with_generator(generator.clone())
        .with_provider(provider)
        .with_fetcher(fetcher)
        .build()
        .unwrap();

    let report = orchestrator
        .process(vaccine_message("m1").with_link(url))
        .await
        .unwrap();

    let link = &report.result.links[0];
    assert!(link.fetch_strategy_used.is_some());
    assert_eq!(link.title.as_deref(), Some("Vaccine X and fertility"));
    let claims_prompt = generator
        .calls()
        .into_iter()
        .find(|c| c.schema_name == "claims")
        .unwrap()
        .user;
    assert!(claims_prompt.contains("large trials"));
}

#[tokio::test]
async fn test_unresolved_conflict_is_unverifiable() {
    let claim = "The city festival took place on 12 May";
    let generator = Arc::new(
        MockGenerator::new()
            .with_reply("claims", claims_reply(&[claim]))
            .with_reply(
                "adjudication",
                adjudication_reply(
                    &["supports", "contradicts"],
                    0.8,
                    "The two reports give different dates for the festival.",
                ),
            ),
    );
    let provider = Arc::new(MockSearchProvider::new("web").with_default_results(vec![
        hit(
            "https://www.reuters.com/world/city-festival",
            "City festival draws crowds on 12 May",
            "The city festival took place on 12 May.",
            Some("2024-05-13"),
        ),
        hit(
            "https://apnews.com/article/city-festival",
            "City festival held on 19 May",
            "The city festival took place on 19 May, not 12 May.",
            Some("2024-05-20"),
        ),
    ]));
    let orchestrator = Orchestrator::builder(config())
        .with_generator(generator)
        .with_provider(provider)
        .build()
        .unwrap();

    let report = orchestrator
        .process(RawInput::new("whatsapp", "m1", claim).with_locale("en"))
        .await
        .unwrap();

    let verdict = &report.verdicts()[0];
    assert_eq!(verdict.label, Label::Unverifiable);
    assert!(verdict.confidence <= 0.3);
    assert!(verdict.rationale.contains("conflict"));
}

#[tokio::test]
async fn test_open_circuit_skips_provider() {
    let breakers = Arc::new(BreakerRegistry::new(BreakerConfig {
        failure_threshold: 1,
        ..BreakerConfig::default()
    }));
    let generator = Arc::new(
        MockGenerator::new()
            .with_reply("claims", claims_reply(&[VACCINE_CLAIM]))
            .with_reply("claims", claims_reply(&["Vaccine Y changes human DNA permanently"])),
    );
    let provider = Arc::new(MockSearchProvider::new("web").failing("503 service unavailable"));
    let orchestrator = Orchestrator::builder(config())
        .with_generator(generator)
        .with_provider(provider.clone())
        .with_breakers(breakers.clone())
        .build()
        .unwrap();

    let first = orchestrator.process(vaccine_message("m1")).await.unwrap();
    assert_eq!(first.result.status, CompletionStatus::Degraded);
    assert_eq!(breakers.breaker("search:web").state(), BreakerState::Open);
    let searches = provider.call_count();

    let second = orchestrator
        .process(
            RawInput::new("whatsapp", "m2", "Vaccine Y changes human DNA permanently")
                .with_locale("en"),
        )
        .await
        .unwrap();

    assert_eq!(provider.call_count(), searches);
    assert_eq!(second.verdicts()[0].label, Label::Unverifiable);
    assert_eq!(second.result.status, CompletionStatus::Degraded);
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_caller_gets_incomplete_report() {
    let generator = Arc::new(vaccine_generator().with_delay(Duration::from_secs(5)));
    let provider = Arc::new(MockSearchProvider::new("web").with_default_results(debunking_hits()));
    let orchestrator = Orchestrator::builder(config())
        .with_generator(generator.clone())
        .with_provider(provider.clone())
        .build()
        .unwrap();

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let report = orchestrator
        .process_with_cancel(vaccine_message("m1"), cancel)
        .await
        .unwrap();

    assert!(matches!(report.result.outcome, Outcome::Incomplete { .. }));
    assert_eq!(report.result.status, CompletionStatus::Degraded);
    assert_eq!(
        report.result.overall.as_ref().map(|o| o.label),
        Some(Label::Unverifiable)
    );
    assert_eq!(orchestrator.in_flight(), 0);

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(provider.call_count(), 0);
    assert_eq!(generator.call_count("adjudication"), 0);
}

#[tokio::test]
async fn test_cache_outage_is_not_fatal() {
    let generator = Arc::new(vaccine_generator());
    let provider = Arc::new(MockSearchProvider::new("web").with_default_results(debunking_hits()));
    let orchestrator = Orchestrator::builder(config())
        .with_generator(generator.clone())
        .with_provider(provider)
        .with_cache(Arc::new(BrokenCache))
        .build()
        .unwrap();

    let first = orchestrator.process(vaccine_message("m1")).await.unwrap();
    let second = orchestrator.process(vaccine_message("m2")).await.unwrap();

    assert_eq!(first.verdicts()[0].label, Label::False);
    assert_eq!(second.cache, CacheStatus::Miss);
    assert_eq!(generator.call_count("claims"), 2);
}

#[tokio::test]
async fn test_degraded_results_expire_sooner() {
    let cache = Arc::new(MemoryVerdictCache::new());
    let config = config();
    let degraded_ttl = config.cache.degraded_ttl;
    let full_ttl = config.cache.ttl;

    let degraded = Orchestrator::builder(config.clone())
        .with_generator(Arc::new(vaccine_generator()))
        .with_provider(Arc::new(MockSearchProvider::new("web").failing("down")))
        .with_cache(cache.clone())
        .build()
        .unwrap();
    let report = degraded.process(vaccine_message("m1")).await.unwrap();
    assert_eq!(report.result.status, CompletionStatus::Degraded);
    let remaining = cache.ttl_remaining(&report.fingerprint).unwrap();
    assert!(remaining <= degraded_ttl);

    let healthy = Orchestrator::builder(config)
        .with_generator(Arc::new(MockGenerator::new()
            .with_reply("claims", claims_reply(&["Vaccine Y changes human DNA permanently"]))
            .with_reply(
                "adjudication",
                adjudication_reply(&["contradicts"], 0.9, "Reuters found no such effect."),
            )))
        .with_provider(Arc::new(MockSearchProvider::new("web").with_default_results(vec![hit(
            "https://www.reuters.com/fact-check/vaccine-y-dna",
            "Fact check: vaccine Y does not change DNA",
            "Vaccine Y does not change human DNA.",
            Some("2023-02-01"),
        )])))
        .with_cache(cache.clone())
        .build()
        .unwrap();
    let report = healthy
        .process(
            RawInput::new("whatsapp", "m2", "Vaccine Y changes human DNA permanently")
                .with_locale("en"),
        )
        .await
        .unwrap();
    assert_eq!(report.result.status, CompletionStatus::Completed);
    let remaining = cache.ttl_remaining(&report.fingerprint).unwrap();
    assert!(remaining > degraded_ttl);
    assert!(remaining <= full_ttl);
}

#[tokio::test]
async fn test_llm_outage_degrades_instead_of_failing() {
    let generator = Arc::new(MockGenerator::new().failing("connection refused"));
    let orchestrator = Orchestrator::builder(config())
        .with_generator(generator)
        .with_provider(Arc::new(MockSearchProvider::new("web")))
        .build()
        .unwrap();

    let report = orchestrator.process(vaccine_message("m1")).await.unwrap();

    assert!(matches!(report.result.outcome, Outcome::NoClaimFound { .. }));
    assert_eq!(report.result.status, CompletionStatus::Degraded);
    assert!(report
        .result
        .notes
        .iter()
        .any(|n| n.starts_with("Claim extraction unavailable")));
}

#[tokio::test]
async fn test_negated_claim_is_not_served_its_opposites_verdict() {
    let generator = Arc::new(
        MockGenerator::new()
            .with_reply("claims", claims_reply(&[VACCINE_CLAIM]))
            .with_reply("claims", claims_reply(&[NEGATED_CLAIM]))
            .with_reply(
                "adjudication",
                adjudication_reply(&["contradicts", "contradicts"], 0.9, "No link was found."),
            )
            .with_reply(
                "adjudication",
                adjudication_reply(&["supports", "supports"], 0.9, "No link was found."),
            ),
    );
    let provider = Arc::new(MockSearchProvider::new("web").with_default_results(debunking_hits()));
    let orchestrator = Orchestrator::builder(config())
        .with_generator(generator.clone())
        .with_provider(provider)
        .build()
        .unwrap();

    let positive = orchestrator.process(vaccine_message("m1")).await.unwrap();
    let negated = orchestrator
        .process(RawInput::new("whatsapp", "m2", NEGATED_CLAIM).with_locale("en"))
        .await
        .unwrap();

    assert_eq!(positive.verdicts()[0].label, Label::False);
    assert_eq!(negated.verdicts()[0].label, Label::True);
    assert_ne!(positive.result.claims[0].id, negated.result.claims[0].id);
    assert_eq!(generator.call_count("adjudication"), 2);
}

#[tokio::test]
async fn test_concurrent_messages_with_the_same_claim_share_its_check() {
    let single = Arc::new(
        MockSearchProvider::new("web")
            .with_default_results(debunking_hits())
            .with_delay(Duration::from_millis(50)),
    );
    let baseline = Orchestrator::builder(config())
        .with_generator(Arc::new(vaccine_generator()))
        .with_provider(single.clone())
        .build()
        .unwrap();
    baseline.process(vaccine_message("m0")).await.unwrap();
    let searches_per_claim = single.call_count();

    let generator = Arc::new(vaccine_generator());
    let provider = Arc::new(
        MockSearchProvider::new("web")
            .with_default_results(debunking_hits())
            .with_delay(Duration::from_millis(50)),
    );
    let orchestrator = Orchestrator::builder(config())
        .with_generator(generator.clone())
        .with_provider(provider.clone())
        .build()
        .unwrap();

    let exclaimed = format!("{}!!", VACCINE_CLAIM);
    let (first, second) = tokio::join!(
        orchestrator.process(vaccine_message("m1")),
        orchestrator.process(RawInput::new("whatsapp", "m2", exclaimed).with_locale("en")),
    );
    let (first, second) = (first.unwrap(), second.unwrap());

    assert_ne!(first.fingerprint, second.fingerprint);
    assert_eq!(first.result.claims[0].key, second.result.claims[0].key);
    assert_eq!(generator.call_count("claims"), 2);
    assert_eq!(generator.call_count("adjudication"), 1);
    assert_eq!(provider.call_count(), searches_per_claim);
    assert_eq!(first.verdicts()[0].label, Label::False);
    assert_eq!(second.verdicts()[0].label, Label::False);
    assert_eq!(second.result.status, CompletionStatus::Completed);
    assert_eq!(orchestrator.in_flight(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_claim_extraction_over_budget_finds_no_claim() {
    let generator = Arc::new(vaccine_generator().with_delay(Duration::from_secs(10)));
    let provider = Arc::new(MockSearchProvider::new("web").with_default_results(debunking_hits()));
    let timeouts = StageTimeouts {
        claim_extraction: Duration::from_secs(5),
        ..StageTimeouts::default()
    };
    let orchestrator = Orchestrator::builder(config().with_timeouts(timeouts))
        .with_generator(generator.clone())
        .with_provider(provider.clone())
        .build()
        .unwrap();

    let report = orchestrator.process(vaccine_message("m1")).await.unwrap();

    assert!(matches!(report.result.outcome, Outcome::NoClaimFound { .. }));
    assert_eq!(report.result.status, CompletionStatus::Degraded);
    assert!(report
        .result
        .notes
        .iter()
        .any(|n| n == "Claim extraction timed out"));
    assert_eq!(provider.call_count(), 0);
    assert_eq!(generator.call_count("adjudication"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_retrieval_over_budget_leaves_claim_unverifiable() {
    let generator = Arc::new(vaccine_generator());
    let provider = Arc::new(
        MockSearchProvider::new("web")
            .with_default_results(debunking_hits())
            .with_delay(Duration::from_secs(60)),
    );
    let timeouts = StageTimeouts {
        retrieval: Duration::from_secs(5),
        ..StageTimeouts::default()
    };
    let config = config()
        .with_retrieval(RetrievalConfig::default().with_provider_timeout(Duration::from_secs(120)))
        .with_timeouts(timeouts);
    let orchestrator = Orchestrator::builder(config)
        .with_generator(generator.clone())
        .with_provider(provider)
        .build()
        .unwrap();

    let report = orchestrator.process(vaccine_message("m1")).await.unwrap();

    assert_eq!(report.result.outcome, Outcome::Verdicts);
    assert_eq!(report.result.status, CompletionStatus::Degraded);
    let verdict = &report.verdicts()[0];
    assert_eq!(verdict.label, Label::Unverifiable);
    assert!(verdict.citations.is_empty());
    assert!(report
        .result
        .notes
        .iter()
        .any(|n| n == "Evidence retrieval timed out"));
    assert_eq!(generator.call_count("adjudication"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_adjudication_over_budget_is_unresolved() {
    let generator = Arc::new(vaccine_generator().with_delay(Duration::from_secs(10)));
    let provider = Arc::new(MockSearchProvider::new("web").with_default_results(debunking_hits()));
    let timeouts = StageTimeouts {
        adjudication: Duration::from_secs(5),
        ..StageTimeouts::default()
    };
    let orchestrator = Orchestrator::builder(config().with_timeouts(timeouts))
        .with_generator(generator.clone())
        .with_provider(provider)
        .build()
        .unwrap();

    let report = orchestrator.process(vaccine_message("m1")).await.unwrap();

    assert_eq!(report.result.outcome, Outcome::Verdicts);
    assert_eq!(report.result.status, CompletionStatus::Degraded);
    let verdict = &report.verdicts()[0];
    assert_eq!(verdict.label, Label::Unverifiable);
    assert!(verdict.citations.is_empty());
    assert!(verdict.confidence <= 0.3);
    assert!(report
        .result
        .notes
        .iter()
        .any(|n| n == "Adjudication timed out"));
    assert_eq!(generator.call_count("adjudication"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_request_over_budget_is_incomplete() {
    let generator = Arc::new(vaccine_generator());
    let provider = Arc::new(
        MockSearchProvider::new("web")
            .with_default_results(debunking_hits())
            .with_delay(Duration::from_secs(60)),
    );
    let timeouts = StageTimeouts {
        request: Duration::from_secs(10),
        ..StageTimeouts::default()
    };
    let config = config()
        .with_retrieval(RetrievalConfig::default().with_provider_timeout(Duration::from_secs(120)))
        .with_timeouts(timeouts);
    let orchestrator = Orchestrator::builder(config)
        .with_generator(generator.clone())
        .with_provider(provider)
        .build()
        .unwrap();

    let report = orchestrator.process(vaccine_message("m1")).await.unwrap();

    assert_eq!(report.cache, CacheStatus::Miss);
    assert!(matches!(report.result.outcome, Outcome::Incomplete { .. }));
    assert_eq!(report.result.status, CompletionStatus::Degraded);
    assert_eq!(report.verdicts()[0].label, Label::Unverifiable);
    assert_eq!(
        report.result.overall.as_ref().unwrap().label,
        Label::Unverifiable
    );
    assert_eq!(generator.call_count("adjudication"), 0);
}
