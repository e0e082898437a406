//! Typed errors for the fact-check pipeline.
//!
//! Uses `thiserror` for library errors (not `anyhow`). Only [`InputError`]
//! ever reaches the caller of `Orchestrator::process`; everything else is
//! absorbed by the stage that owns it and turned into degraded output.

use thiserror::Error;

/// Malformed or invalid `RawInput`. Fails fast before the pipeline starts.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InputError {
    /// A required identifier is empty
    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    /// Neither text, OCR text nor links were supplied
    #[error("input has no text and no links")]
    Empty,

    /// Text exceeds the configured maximum
    #[error("text too long: {length} chars (max {max})")]
    TooLong { length: usize, max: usize },

    /// A supplied link is not an absolute http(s) URL
    #[error("invalid link: {url}")]
    InvalidLink { url: String },
}

/// Errors from the HTTP fetch and browser-rendering capabilities.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Non-success HTTP status
    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    /// Connection, TLS or protocol failure
    #[error("network error: {0}")]
    Network(String),

    /// The fetch exceeded its time budget
    #[error("timeout fetching: {url}")]
    Timeout { url: String },

    /// Response body is not a text document
    #[error("unsupported content type: {0}")]
    UnsupportedContent(String),

    /// The browser runtime failed to render the page
    #[error("browser runtime error: {0}")]
    Runtime(String),

    /// URL rejected by the SSRF guard
    #[error("security error: {0}")]
    Security(#[from] SecurityError),
}

/// Errors from search / fact-check providers.
#[derive(Debug, Error)]
pub enum SearchError {
    /// HTTP request failed
    #[error("{provider} request failed: {message}")]
    Http { provider: String, message: String },

    /// Provider answered with a non-success status
    #[error("{provider} returned HTTP {status}")]
    Status { provider: String, status: u16 },

    /// Response could not be decoded
    #[error("{provider} response decode failed: {message}")]
    Decode { provider: String, message: String },

    /// Provider is not configured (e.g. missing API key)
    #[error("{provider} not configured: {reason}")]
    NotConfigured { provider: String, reason: String },
}

/// Errors from the structured-generation (LLM) capability.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// Connection or protocol failure
    #[error("LLM transport error: {0}")]
    Transport(String),

    /// Provider answered with an error status
    #[error("LLM API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Output did not match the requested schema
    #[error("LLM output failed schema validation: {0}")]
    Schema(String),

    /// The model declined to answer
    #[error("LLM refused: {0}")]
    Refusal(String),
}

impl GenerationError {
    /// Whether this error reflects an unhealthy dependency (as opposed to a
    /// bad answer from a healthy one).
    pub fn is_dependency_failure(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Api { .. })
    }
}

/// Errors from the verdict cache backend.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Backend lock was poisoned by a panicking writer
    #[error("cache lock poisoned")]
    Poisoned,

    /// Backend-specific failure
    #[error("cache backend error: {0}")]
    Backend(String),
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable holds an unparsable value
    #[error("invalid value for {name}: {value}")]
    InvalidValue { name: String, value: String },

    /// A required component was not supplied to a builder
    #[error("missing component: {0}")]
    MissingComponent(&'static str),

    /// A client could not be constructed
    #[error("client construction failed: {0}")]
    Client(String),
}

/// Security-related errors, primarily for SSRF protection.
#[derive(Debug, Error)]
pub enum SecurityError {
    /// URL scheme not allowed (e.g., file://, ftp://)
    #[error("disallowed URL scheme: {0}")]
    DisallowedScheme(String),

    /// Host is blocked (e.g., localhost, metadata endpoints)
    #[error("blocked host: {0}")]
    BlockedHost(String),

    /// IP in blocked CIDR range (e.g., 10.0.0.0/8)
    #[error("blocked IP range: {0}")]
    BlockedCidr(String),

    /// A redirect pointed somewhere the guard refuses
    #[error("redirect blocked: {0}")]
    BlockedRedirect(String),

    /// URL has no host
    #[error("URL has no host")]
    NoHost,

    /// DNS resolution failed
    #[error("DNS resolution failed: {0}")]
    DnsResolution(String),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),
}

/// Outcome of a call made through a circuit breaker.
#[derive(Debug, Error)]
pub enum BreakerError<E> {
    /// Breaker is open; no I/O was attempted
    #[error("circuit open for {0}")]
    Open(String),

    /// The call exceeded its time budget (counts as a failure)
    #[error("call to {0} timed out")]
    TimedOut(String),

    /// The dependency itself failed
    #[error("{0}")]
    Inner(E),
}

/// Result type alias for fetch operations.
pub type FetchResult<T> = std::result::Result<T, FetchError>;

/// Result type alias for provider searches.
pub type SearchResult<T> = std::result::Result<T, SearchError>;

/// Result type alias for structured generation.
pub type GenerationResult<T> = std::result::Result<T, GenerationError>;

/// Result type alias for cache operations.
pub type CacheResult<T> = std::result::Result<T, CacheError>;

/// Result type alias for security operations.
pub type SecurityResult<T> = std::result::Result<T, SecurityError>;
