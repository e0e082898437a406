//! In-memory verdict cache.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::debug;

use crate::error::{CacheError, CacheResult};
use crate::traits::cache::{CachedValue, VerdictCache};

/// Writes between two sweeps of expired entries.
const DEFAULT_PURGE_INTERVAL: usize = 64;

struct Entry {
    value: CachedValue,
    expires_at: Instant,
}

/// Process-local verdict cache.
///
/// Entries are replaced whole under the write lock, so readers see either the
/// old value or the new one. Expired entries are dropped on read, and every
/// `purge_interval` writes the whole map is swept, so keys nobody reads again
/// do not pile up. Not shared across processes.
pub struct MemoryVerdictCache {
    entries: RwLock<HashMap<String, Entry>>,
    writes: AtomicUsize,
    purge_interval: usize,
}

impl Default for MemoryVerdictCache {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryVerdictCache {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            writes: AtomicUsize::new(0),
            purge_interval: DEFAULT_PURGE_INTERVAL,
        }
    }

    /// Sweep expired entries every `writes` puts (at least one).
    pub fn with_purge_interval(mut self, writes: usize) -> Self {
        self.purge_interval = writes.max(1);
        self
    }

    /// Number of entries, expired ones included until they are purged.
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> CacheResult<usize> {
        let now = Instant::now();
        let mut entries = self.entries.write().map_err(|_| CacheError::Poisoned)?;
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        Ok(before - entries.len())
    }

    /// Remaining lifetime of a live entry.
    pub fn ttl_remaining(&self, key: &str) -> Option<Duration> {
        let entries = self.entries.read().ok()?;
        let entry = entries.get(key)?;
        entry.expires_at.checked_duration_since(Instant::now())
    }
}

#[async_trait]
impl VerdictCache for MemoryVerdictCache {
    async fn get(&self, key: &str) -> CacheResult<Option<CachedValue>> {
        let now = Instant::now();
        {
            let entries = self.entries.read().map_err(|_| CacheError::Poisoned)?;
            match entries.get(key) {
                Some(entry) if entry.expires_at > now => return Ok(Some(entry.value.clone())),
                Some(_) => {}
                None => return Ok(None),
            }
        }

        let mut entries = self.entries.write().map_err(|_| CacheError::Poisoned)?;
        if entries.get(key).is_some_and(|e| e.expires_at <= now) {
            entries.remove(key);
        }
        Ok(None)
    }

    async fn put(&self, key: &str, value: CachedValue, ttl: Duration) -> CacheResult<()> {
        if ttl.is_zero() {
            return Ok(());
        }
        let now = Instant::now();
        let entry = Entry {
            value,
            expires_at: now + ttl,
        };
        let mut entries = self.entries.write().map_err(|_| CacheError::Poisoned)?;
        entries.insert(key.to_string(), entry);

        let writes = self.writes.fetch_add(1, Ordering::Relaxed) + 1;
        if writes % self.purge_interval == 0 {
            let before = entries.len();
            entries.retain(|_, entry| entry.expires_at > now);
            let purged = before - entries.len();
            if purged > 0 {
                debug!(purged, remaining = entries.len(), "Purged expired cache entries");
            }
        }
        Ok(())
    }

    async fn evict(&self, key: &str) -> CacheResult<()> {
        self.entries
            .write()
            .map_err(|_| CacheError::Poisoned)?
            .remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::claim::ClaimId;
    use crate::types::verdict::{Label, Verdict};

    fn value(label: Label) -> CachedValue {
        CachedValue::Claim(Box::new(Verdict {
            claim_id: ClaimId::from_key("k"),
            label,
            confidence: 0.9,
            rationale: "r".into(),
            citations: vec![],
            processing_time_ms: 3,
        }))
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let cache = MemoryVerdictCache::new();
        cache
            .put("k", value(Label::False), Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(cache.get("k").await.unwrap(), Some(value(Label::False)));
        assert_eq!(cache.get("other").await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_entries_expire() {
        let cache = MemoryVerdictCache::new();
        cache
            .put("k", value(Label::True), Duration::from_secs(10))
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(9)).await;
        assert!(cache.get("k").await.unwrap().is_some());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(cache.get("k").await.unwrap().is_none());
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_last_writer_wins() {
        let cache = MemoryVerdictCache::new();
        let ttl = Duration::from_secs(60);
        cache.put("k", value(Label::True), ttl).await.unwrap();
        cache.put("k", value(Label::False), ttl).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), Some(value(Label::False)));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_and_evict() {
        let cache = MemoryVerdictCache::new();
        cache
            .put("short", value(Label::True), Duration::from_secs(1))
            .await
            .unwrap();
        cache
            .put("long", value(Label::True), Duration::from_secs(100))
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(cache.purge_expired().unwrap(), 1);
        assert!(cache.ttl_remaining("long").unwrap() <= Duration::from_secs(95));

        cache.evict("long").await.unwrap();
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unread_expired_entries_are_swept_by_writes() {
        let cache = MemoryVerdictCache::new().with_purge_interval(3);
        let ttl = Duration::from_secs(10);
        cache.put("req:a", value(Label::True), ttl).await.unwrap();
        cache.put("req:b", value(Label::True), ttl).await.unwrap();

        tokio::time::advance(Duration::from_secs(11)).await;
        cache.put("req:c", value(Label::False), ttl).await.unwrap();

        assert_eq!(cache.len(), 1);
        assert!(cache.ttl_remaining("req:a").is_none());
        assert_eq!(cache.get("req:c").await.unwrap(), Some(value(Label::False)));
    }

    #[tokio::test]
    async fn test_zero_ttl_is_not_stored() {
        let cache = MemoryVerdictCache::new();
        cache.put("k", value(Label::True), Duration::ZERO).await.unwrap();
        assert!(cache.get("k").await.unwrap().is_none());
    }
}
