//! Analysis Cache.
//!
//! In-memory key/value store keyed by `{kind, sha256(content)}`, with a
//! per-entry TTL (default 3600s) and a periodic sweep that evicts expired
//! entries. Used by the Merge Engine to avoid re-parsing identical file
//! content across providers.
//!
//! Reads are concurrent (an `RwLock` read guard plus per-entry atomic
//! counters); inserts, evictions, and expiry removal take the write lock,
//! serializing mutation the way [`crate::queue::TaskQueue`] and
//! [`crate::tracker::TaskTracker`] serialize theirs behind a single gate.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use sha2::{Digest, Sha256};
use tokio::sync::RwLock;

const DEFAULT_TTL: Duration = Duration::from_secs(3600);
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Content-addressed cache key: an analysis kind plus the SHA-256 hex
/// digest of the content it was computed from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub kind: String,
    pub content_hash: String,
}

impl CacheKey {
    pub fn new(kind: impl Into<String>, content: &str) -> Self {
        Self {
            kind: kind.into(),
            content_hash: sha256_hex(content),
        }
    }
}

/// Hash arbitrary content to a hex-encoded SHA-256 digest, shared by the
/// cache key and the Merge Engine's conflict-detection hashes.
pub fn sha256_hex(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[derive(Debug)]
struct CacheEntry<V> {
    value: V,
    inserted_at: Instant,
    ttl: Duration,
    access_count: AtomicU64,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now.duration_since(self.inserted_at) >= self.ttl
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub entries: usize,
}

#[derive(Debug, Default)]
struct AtomicStats {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

struct Inner<V> {
    entries: HashMap<CacheKey, CacheEntry<V>>,
}

/// Analysis Cache handle. Cloning shares the same underlying store.
#[derive(Clone)]
pub struct AnalysisCache<V> {
    inner: Arc<RwLock<Inner<V>>>,
    stats: Arc<AtomicStats>,
    default_ttl: Duration,
}

impl<V: Clone + Send + Sync + 'static> AnalysisCache<V> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner { entries: HashMap::new() })),
            stats: Arc::new(AtomicStats::default()),
            default_ttl: DEFAULT_TTL,
        }
    }

    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Look up `key`. A live hit bumps both the entry's own
    /// `access_count` and the cache-wide hit counter, taking only a read
    /// lock; an expired entry is removed under a write lock.
    pub async fn get(&self, key: &CacheKey) -> Option<V> {
        let now = Instant::now();
        {
            let inner = self.inner.read().await;
            match inner.entries.get(key) {
                Some(entry) if !entry.is_expired(now) => {
                    entry.access_count.fetch_add(1, Ordering::Relaxed);
                    self.stats.hits.fetch_add(1, Ordering::Relaxed);
                    return Some(entry.value.clone());
                }
                Some(_) => {}
                None => {
                    self.stats.misses.fetch_add(1, Ordering::Relaxed);
                    return None;
                }
            }
        }

        // Entry was present but expired; drop the read guard and evict
        // under the write lock.
        let mut inner = self.inner.write().await;
        inner.entries.remove(key);
        self.stats.misses.fetch_add(1, Ordering::Relaxed);
        self.stats.evictions.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// The number of times `key` has been read while live, or `None` if
    /// it isn't currently cached.
    pub async fn access_count(&self, key: &CacheKey) -> Option<u64> {
        let inner = self.inner.read().await;
        inner.entries.get(key).map(|entry| entry.access_count.load(Ordering::Relaxed))
    }

    pub async fn put(&self, key: CacheKey, value: V) {
        self.put_with_ttl(key, value, self.default_ttl).await;
    }

    pub async fn put_with_ttl(&self, key: CacheKey, value: V, ttl: Duration) {
        let mut inner = self.inner.write().await;
        inner.entries.insert(
            key,
            CacheEntry {
                value,
                inserted_at: Instant::now(),
                ttl,
                access_count: AtomicU64::new(0),
            },
        );
    }

    /// Remove every expired entry, incrementing the eviction counter for
    /// each one removed. Call on a `SWEEP_INTERVAL` (60s) timer.
    pub async fn sweep(&self) -> usize {
        let mut inner = self.inner.write().await;
        let now = Instant::now();
        let before = inner.entries.len();
        inner.entries.retain(|_, entry| !entry.is_expired(now));
        let removed = before - inner.entries.len();
        self.stats.evictions.fetch_add(removed as u64, Ordering::Relaxed);
        removed
    }

    pub async fn stats(&self) -> CacheStats {
        let entries = self.inner.read().await.entries.len();
        CacheStats {
            hits: self.stats.hits.load(Ordering::Relaxed),
            misses: self.stats.misses.load(Ordering::Relaxed),
            evictions: self.stats.evictions.load(Ordering::Relaxed),
            entries,
        }
    }

    /// Spawn a background task that sweeps this cache every
    /// [`SWEEP_INTERVAL`] until cancelled.
    pub fn spawn_sweeper(&self) -> tokio::task::JoinHandle<()> {
        let cache = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(SWEEP_INTERVAL);
            loop {
                interval.tick().await;
                cache.sweep().await;
            }
        })
    }
}

impl<V: Clone + Send + Sync + 'static> Default for AnalysisCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_and_get_hit() {
        let cache: AnalysisCache<String> = AnalysisCache::new();
        let key = CacheKey::new("ast", "fn main() {}");
        cache.put(key.clone(), "parsed".to_string()).await;
        assert_eq!(cache.get(&key).await, Some("parsed".to_string()));
        assert_eq!(cache.stats().await.hits, 1);
    }

    #[tokio::test]
    async fn test_get_miss_on_unknown_key() {
        let cache: AnalysisCache<String> = AnalysisCache::new();
        let key = CacheKey::new("ast", "fn main() {}");
        assert_eq!(cache.get(&key).await, None);
        assert_eq!(cache.stats().await.misses, 1);
    }

    #[tokio::test]
    async fn test_expired_entry_treated_as_miss_and_evicted() {
        let cache: AnalysisCache<String> = AnalysisCache::new().with_default_ttl(Duration::from_millis(1));
        let key = CacheKey::new("ast", "content");
        cache.put(key.clone(), "v".to_string()).await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(cache.get(&key).await, None);
        assert_eq!(cache.stats().await.evictions, 1);
    }

    #[tokio::test]
    async fn test_sweep_removes_expired_entries() {
        let cache: AnalysisCache<String> = AnalysisCache::new().with_default_ttl(Duration::from_millis(1));
        cache.put(CacheKey::new("ast", "a"), "a".into()).await;
        cache.put(CacheKey::new("ast", "b"), "b".into()).await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        let removed = cache.sweep().await;
        assert_eq!(removed, 2);
        assert_eq!(cache.stats().await.entries, 0);
    }

    #[tokio::test]
    async fn test_access_count_increments_on_each_hit() {
        let cache: AnalysisCache<String> = AnalysisCache::new();
        let key = CacheKey::new("ast", "content");
        cache.put(key.clone(), "v".to_string()).await;
        assert_eq!(cache.access_count(&key).await, Some(0));
        cache.get(&key).await;
        cache.get(&key).await;
        assert_eq!(cache.access_count(&key).await, Some(2));
    }

    #[test]
    fn test_cache_key_is_content_addressed() {
        let k1 = CacheKey::new("ast", "same content");
        let k2 = CacheKey::new("ast", "same content");
        let k3 = CacheKey::new("ast", "different content");
        assert_eq!(k1, k2);
        assert_ne!(k1, k3);
    }
}
