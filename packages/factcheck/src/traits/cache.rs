//! Verdict cache capability.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CacheResult;
use crate::types::report::RequestOutcome;
use crate::types::verdict::Verdict;

/// What the orchestrator stores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CachedValue {
    /// Whole-request result, keyed by request fingerprint.
    Request(Box<RequestOutcome>),
    /// Single-claim verdict, keyed by claim fingerprint.
    Claim(Box<Verdict>),
}

/// Key-value store with per-entry TTL.
///
/// Writes replace whole values (last writer wins) and readers never observe a
/// partially written entry. Expired entries are never returned.
#[async_trait]
pub trait VerdictCache: Send + Sync {
    async fn get(&self, key: &str) -> CacheResult<Option<CachedValue>>;

    async fn put(&self, key: &str, value: CachedValue, ttl: Duration) -> CacheResult<()>;

    async fn evict(&self, key: &str) -> CacheResult<()>;
}
