//! Fact-Check Pipeline
//!
//! Takes a user message (text, optional OCR text, optional links), pulls the
//! readable content out of the linked pages, extracts the checkable claims,
//! retrieves evidence for each claim from search and fact-check providers,
//! and adjudicates every claim strictly against the retrieved sources.
//!
//! # Usage
//!
//! ```rust,ignore
//! use factcheck::{Orchestrator, PipelineConfig, RawInput};
//! use factcheck::ai::OpenAIGenerator;
//! use factcheck::providers::TavilyProvider;
//!
//! let orchestrator = Orchestrator::builder(PipelineConfig::from_env()?)
//!     .with_generator(Arc::new(OpenAIGenerator::new(api_key)))
//!     .with_provider(Arc::new(TavilyProvider::new(tavily_key)))
//!     .build()?;
//!
//! let report = orchestrator.process(RawInput::new("whatsapp", msg_id, text)).await?;
//! for verdict in report.verdicts() {
//!     println!("{}: {}", verdict.label, verdict.rationale);
//! }
//! ```
//!
//! # Modules
//!
//! - [`sources`] - Link content extraction with a strategy cascade
//! - [`claims`] - Claim extraction and normalization
//! - [`evidence`] - Query building, fan-out search, dedup and ranking
//! - [`adjudication`] - Grounded verdicts and conflict resolution
//! - [`pipeline`] - Orchestrator, fingerprints and single-flight
//! - [`resilience`] - Circuit breakers for external dependencies
//! - [`security`] - Credential handling and SSRF protection
//! - [`testing`] - Mock implementations for testing

pub mod adjudication;
pub mod ai;
pub mod claims;
pub mod dates;
pub mod error;
pub mod evidence;
pub mod fetchers;
pub mod pipeline;
pub mod providers;
pub mod resilience;
pub mod runtimes;
pub mod security;
pub mod sources;
pub mod stores;
pub mod testing;
pub mod text;
pub mod traits;
pub mod types;

// Re-export core types at crate root
pub use error::{
    BreakerError, CacheError, ConfigError, FetchError, GenerationError, InputError, SearchError,
    SecurityError,
};
pub use traits::{
    browser::BrowserRuntime,
    cache::{CachedValue, VerdictCache},
    fetcher::{FetchLimits, FetchedPage, HttpFetcher},
    generator::{GenerationRequest, StructuredGenerator, StructuredOutput},
    searcher::{SearchHit, SearchProvider},
};
pub use types::{
    citation::{AuthorityTier, Citation, ClaimEvidence, EvidenceMap},
    claim::{Claim, ClaimId, ClaimSet},
    config::{
        AdjudicationConfig, AuthorityConfig, BreakerConfig, CacheConfig, ClaimConfig,
        InputLimits, PipelineConfig, RankOrder, RetrievalConfig, SourceConfig, StageTimeouts,
    },
    content::{ExtractedContent, ExtractionFailure, FetchStrategy, LinkReport},
    input::{Language, Locale, RawInput, ValidatedInput},
    report::{CacheStatus, CompletionStatus, FactCheckReport, Outcome, RequestOutcome},
    verdict::{Adjudication, Label, OverallVerdict, Verdict},
};

// Re-export stage components
pub use adjudication::Adjudicator;
pub use claims::ClaimExtractor;
pub use evidence::EvidenceEngine;
pub use sources::SourceExtractor;

// Re-export the orchestrator
pub use pipeline::{Orchestrator, OrchestratorBuilder, Stage};

// Re-export implementations
pub use ai::{LlmClient, LlmOutcome, OpenAIGenerator};
pub use fetchers::ReqwestFetcher;
pub use providers::{GoogleFactCheckProvider, TavilyProvider};
pub use resilience::{BreakerRegistry, CircuitBreaker};
pub use runtimes::{ChromeRuntime, FirecrawlRuntime};
pub use stores::MemoryVerdictCache;

// Re-export testing utilities
pub use testing::{BrokenCache, MockBrowser, MockFetcher, MockGenerator, MockSearchProvider};
