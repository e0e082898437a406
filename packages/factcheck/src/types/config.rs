//! Pipeline configuration.
//!
//! Every tunable is a plain field with a documented default. Thresholds that
//! shape verdicts (citation cap, minimum citations, tier-vs-recency order) are
//! policy, not invariants, and tests override them freely.

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::types::citation::AuthorityTier;

/// Limits checked by `RawInput::validate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputLimits {
    /// Maximum characters in the message body (and in the OCR text).
    ///
    /// Default: 10000.
    pub max_text_length: usize,

    /// Links beyond this count are ignored. Default: 5.
    pub max_links: usize,
}

impl Default for InputLimits {
    fn default() -> Self {
        Self {
            max_text_length: 10_000,
            max_links: 5,
        }
    }
}

/// Source Extractor settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Minimum characters of extracted text for a strategy to win. Default: 200.
    pub min_text_chars: usize,

    /// Minimum ratio of extracted text to raw markup length. Default: 0.01.
    pub min_text_ratio: f64,

    /// Boilerplate markers (cookie walls, "enable JavaScript") only reject
    /// text shorter than this. Default: 1500.
    pub boilerplate_check_below: usize,

    /// Maximum bytes read from any page. Default: 2 MiB.
    pub max_page_bytes: usize,

    /// Fetch timeout for the cheap strategies. Default: 10s.
    pub cheap_timeout: Duration,

    /// Render timeout for the browser strategy. Default: 25s.
    pub heavy_timeout: Duration,

    /// Extracted text is cut to this many characters. Default: 5000.
    pub content_limit: usize,

    /// Summary length (title + first paragraph). Default: 200.
    pub summary_chars: usize,

    /// Re-check link hostnames against private ranges via DNS. Default: true.
    pub resolve_dns: bool,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            min_text_chars: 200,
            min_text_ratio: 0.01,
            boilerplate_check_below: 1500,
            max_page_bytes: 2 * 1024 * 1024,
            cheap_timeout: Duration::from_secs(10),
            heavy_timeout: Duration::from_secs(25),
            content_limit: 5000,
            summary_chars: 200,
            resolve_dns: true,
        }
    }
}

impl SourceConfig {
    pub fn with_min_text_chars(mut self, min: usize) -> Self {
        self.min_text_chars = min;
        self
    }

    pub fn with_dns_check(mut self, enabled: bool) -> Self {
        self.resolve_dns = enabled;
        self
    }
}

/// Claim Extractor settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimConfig {
    /// Claims beyond this count are dropped. Default: 5.
    pub max_claims: usize,

    /// Characters of each link's content included in the prompt. Default: 2000.
    pub link_context_chars: usize,

    /// Minimum share of a claim's significant tokens that must occur in
    /// the source text. Claims below it are discarded as fabricated.
    ///
    /// Default: 0.5.
    pub min_grounding_overlap: f32,
}

impl Default for ClaimConfig {
    fn default() -> Self {
        Self {
            max_claims: 5,
            link_context_chars: 2000,
            min_grounding_overlap: 0.5,
        }
    }
}

/// How authority tier and recency combine when ranking citations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankOrder {
    /// Tier, then recency, then query-match strength.
    AuthorityFirst,
    /// Recency, then tier, then query-match strength.
    RecencyFirst,
}

impl FromStr for RankOrder {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "authority_first" | "authority" => Ok(Self::AuthorityFirst),
            "recency_first" | "recency" => Ok(Self::RecencyFirst),
            _ => Err(()),
        }
    }
}

/// Domain allow-lists for authority tiers. A host matches a domain when it
/// equals it or is a subdomain of it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorityConfig {
    pub fact_checkers: Vec<String>,
    pub news: Vec<String>,
}

impl Default for AuthorityConfig {
    fn default() -> Self {
        let fact_checkers = [
            "aosfatos.org",
            "lupa.uol.com.br",
            "lupa.news",
            "boatos.org",
            "e-farsas.com",
            "projetocomprova.com.br",
            "checamos.afp.com",
            "factcheck.afp.com",
            "snopes.com",
            "politifact.com",
            "factcheck.org",
            "fullfact.org",
            "healthfeedback.org",
            "maldita.es",
            // primary institutional sources
            "who.int",
            "paho.org",
            "cdc.gov",
            "nih.gov",
            "fda.gov",
            "gov.br",
            "fiocruz.br",
            "ema.europa.eu",
        ];
        let news = [
            "reuters.com",
            "apnews.com",
            "bbc.com",
            "bbc.co.uk",
            "nytimes.com",
            "theguardian.com",
            "washingtonpost.com",
            "globo.com",
            "folha.uol.com.br",
            "estadao.com.br",
            "cnnbrasil.com.br",
            "nature.com",
            "science.org",
            "thelancet.com",
        ];
        Self {
            fact_checkers: fact_checkers.iter().map(|d| d.to_string()).collect(),
            news: news.iter().map(|d| d.to_string()).collect(),
        }
    }
}

impl AuthorityConfig {
    pub fn tier(&self, host: &str) -> AuthorityTier {
        let host = host.trim_end_matches('.').to_lowercase();
        let matches = |domain: &String| {
            host == *domain
                || host
                    .strip_suffix(domain.as_str())
                    .is_some_and(|prefix| prefix.ends_with('.'))
        };
        if self.fact_checkers.iter().any(matches) {
            AuthorityTier::FactChecker
        } else if self.news.iter().any(matches) {
            AuthorityTier::News
        } else {
            AuthorityTier::Web
        }
    }
}

/// Evidence Retrieval Engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Citation cap per claim, clamped to 3..=8 when read. Default: 5.
    pub max_citations: usize,

    /// Per provider call. Default: 8s.
    pub provider_timeout: Duration,

    /// Entity-focused queries issued in addition to the claim text. Default: 2.
    pub max_entity_queries: usize,

    /// Snippets are cut to this many characters. Default: 500.
    pub snippet_chars: usize,

    pub rank_order: RankOrder,

    pub authority: AuthorityConfig,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            max_citations: 5,
            provider_timeout: Duration::from_secs(8),
            max_entity_queries: 2,
            snippet_chars: 500,
            rank_order: RankOrder::AuthorityFirst,
            authority: AuthorityConfig::default(),
        }
    }
}

impl RetrievalConfig {
    pub const MIN_CITATIONS_CAP: usize = 3;
    pub const MAX_CITATIONS_CAP: usize = 8;

    pub fn citation_cap(&self) -> usize {
        self.max_citations
            .clamp(Self::MIN_CITATIONS_CAP, Self::MAX_CITATIONS_CAP)
    }

    pub fn with_max_citations(mut self, max: usize) -> Self {
        self.max_citations = max;
        self
    }

    pub fn with_provider_timeout(mut self, timeout: Duration) -> Self {
        self.provider_timeout = timeout;
        self
    }

    pub fn with_rank_order(mut self, order: RankOrder) -> Self {
        self.rank_order = order;
        self
    }
}

/// Adjudicator settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdjudicationConfig {
    /// Rationale length cap in characters. Default: 700.
    pub max_rationale_chars: usize,

    /// Confidence reported for evidence-free `unverifiable`. Default: 0.1.
    pub low_confidence: f32,

    /// Confidence ceiling for unresolved conflicts. Default: 0.3.
    pub conflict_confidence_cap: f32,

    /// Publication gap that lets the newer side of a conflict win among
    /// equally authoritative sources. Default: 365 days.
    pub recency_gap_days: i64,

    /// Relevant citations needed for anything but `unverifiable`. Default: 1.
    pub min_citations: usize,
}

impl Default for AdjudicationConfig {
    fn default() -> Self {
        Self {
            max_rationale_chars: 700,
            low_confidence: 0.1,
            conflict_confidence_cap: 0.3,
            recency_gap_days: 365,
            min_citations: 1,
        }
    }
}

/// Circuit breaker settings, shared by every dependency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakerConfig {
    /// Consecutive failures within `window` that open the breaker. Default: 5.
    pub failure_threshold: u32,

    /// Sliding window for counting failures. Default: 60s.
    pub window: Duration,

    /// How long an open breaker rejects calls. Default: 30s.
    pub cooldown: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            window: Duration::from_secs(60),
            cooldown: Duration::from_secs(30),
        }
    }
}

/// Verdict cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// TTL for completed results. Default: 24h.
    pub ttl: Duration,

    /// TTL for degraded results. Default: 10 minutes.
    pub degraded_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(24 * 60 * 60),
            degraded_ttl: Duration::from_secs(10 * 60),
        }
    }
}

/// Hard wall-clock budgets per stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageTimeouts {
    /// All links, extracted concurrently. Default: 35s.
    pub source_extraction: Duration,
    /// Default: 20s.
    pub claim_extraction: Duration,
    /// All claims, retrieved concurrently. Default: 15s.
    pub retrieval: Duration,
    /// Default: 30s.
    pub adjudication: Duration,
    /// Each individual LLM call. Default: 25s.
    pub llm_call: Duration,
    /// Whole request, as seen by one caller. Default: 90s.
    pub request: Duration,
}

impl Default for StageTimeouts {
    fn default() -> Self {
        Self {
            source_extraction: Duration::from_secs(35),
            claim_extraction: Duration::from_secs(20),
            retrieval: Duration::from_secs(15),
            adjudication: Duration::from_secs(30),
            llm_call: Duration::from_secs(25),
            request: Duration::from_secs(90),
        }
    }
}

/// Everything the pipeline can be tuned with.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub input: InputLimits,
    pub source: SourceConfig,
    pub claims: ClaimConfig,
    pub retrieval: RetrievalConfig,
    pub adjudication: AdjudicationConfig,
    pub breaker: BreakerConfig,
    pub cache: CacheConfig,
    pub timeouts: StageTimeouts,
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden by `FACTCHECK_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each
    /// `FACTCHECK_*` name.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let env = EnvReader { lookup: &lookup };

        env.set("FACTCHECK_MAX_TEXT_LENGTH", &mut config.input.max_text_length)?;
        env.set("FACTCHECK_MAX_LINKS", &mut config.input.max_links)?;

        env.set("FACTCHECK_MIN_TEXT_CHARS", &mut config.source.min_text_chars)?;
        env.set("FACTCHECK_MAX_PAGE_BYTES", &mut config.source.max_page_bytes)?;
        env.set("FACTCHECK_CONTENT_LIMIT", &mut config.source.content_limit)?;
        env.set_ms("FACTCHECK_FETCH_TIMEOUT_MS", &mut config.source.cheap_timeout)?;
        env.set_ms("FACTCHECK_BROWSER_TIMEOUT_MS", &mut config.source.heavy_timeout)?;
        env.set("FACTCHECK_RESOLVE_DNS", &mut config.source.resolve_dns)?;

        env.set("FACTCHECK_MAX_CLAIMS", &mut config.claims.max_claims)?;

        env.set("FACTCHECK_MAX_CITATIONS", &mut config.retrieval.max_citations)?;
        env.set_ms(
            "FACTCHECK_PROVIDER_TIMEOUT_MS",
            &mut config.retrieval.provider_timeout,
        )?;
        env.set("FACTCHECK_RANK_ORDER", &mut config.retrieval.rank_order)?;

        env.set("FACTCHECK_MIN_CITATIONS", &mut config.adjudication.min_citations)?;
        env.set(
            "FACTCHECK_RECENCY_GAP_DAYS",
            &mut config.adjudication.recency_gap_days,
        )?;

        env.set(
            "FACTCHECK_BREAKER_THRESHOLD",
            &mut config.breaker.failure_threshold,
        )?;
        env.set_secs("FACTCHECK_BREAKER_WINDOW_SECS", &mut config.breaker.window)?;
        env.set_secs("FACTCHECK_BREAKER_COOLDOWN_SECS", &mut config.breaker.cooldown)?;

        env.set_secs("FACTCHECK_CACHE_TTL_SECS", &mut config.cache.ttl)?;
        env.set_secs(
            "FACTCHECK_DEGRADED_TTL_SECS",
            &mut config.cache.degraded_ttl,
        )?;

        env.set_ms(
            "FACTCHECK_SOURCE_TIMEOUT_MS",
            &mut config.timeouts.source_extraction,
        )?;
        env.set_ms(
            "FACTCHECK_CLAIM_TIMEOUT_MS",
            &mut config.timeouts.claim_extraction,
        )?;
        env.set_ms("FACTCHECK_RETRIEVAL_TIMEOUT_MS", &mut config.timeouts.retrieval)?;
        env.set_ms(
            "FACTCHECK_ADJUDICATION_TIMEOUT_MS",
            &mut config.timeouts.adjudication,
        )?;
        env.set_ms("FACTCHECK_LLM_TIMEOUT_MS", &mut config.timeouts.llm_call)?;
        env.set_ms("FACTCHECK_REQUEST_TIMEOUT_MS", &mut config.timeouts.request)?;

        Ok(config)
    }

    pub fn with_retrieval(mut self, retrieval: RetrievalConfig) -> Self {
        self.retrieval = retrieval;
        self
    }

    pub fn with_source(mut self, source: SourceConfig) -> Self {
        self.source = source;
        self
    }

    pub fn with_breaker(mut self, breaker: BreakerConfig) -> Self {
        self.breaker = breaker;
        self
    }

    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_timeouts(mut self, timeouts: StageTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn with_adjudication(mut self, adjudication: AdjudicationConfig) -> Self {
        self.adjudication = adjudication;
        self
    }
}

struct EnvReader<'a, F: Fn(&str) -> Option<String>> {
    lookup: &'a F,
}

impl<F: Fn(&str) -> Option<String>> EnvReader<'_, F> {
    fn parse<T: FromStr>(&self, name: &str) -> Result<Option<T>, ConfigError> {
        let Some(raw) = (self.lookup)(name) else {
            return Ok(None);
        };
        raw.trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                name: name.to_string(),
                value: raw,
            })
    }

    fn set<T: FromStr>(&self, name: &str, slot: &mut T) -> Result<(), ConfigError> {
        if let Some(value) = self.parse(name)? {
            *slot = value;
        }
        Ok(())
    }

    fn set_ms(&self, name: &str, slot: &mut Duration) -> Result<(), ConfigError> {
        if let Some(ms) = self.parse::<u64>(name)? {
            *slot = Duration::from_millis(ms);
        }
        Ok(())
    }

    fn set_secs(&self, name: &str, slot: &mut Duration) -> Result<(), ConfigError> {
        if let Some(secs) = self.parse::<u64>(name)? {
            *slot = Duration::from_secs(secs);
        }
        Ok(())
    }
}
