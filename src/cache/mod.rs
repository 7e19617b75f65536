//! Response cache.
//!
//! # Data Flow
//! ```text
//! GET on a cacheable route
//!     → key.rs (method + normalized path + sorted query)
//!     → ResponseCache::get (store lookup, lazy TTL check)
//!     → hit: replay entry | miss: dispatch
//!     → 2xx response with known, bounded length → ResponseCache::put
//! ```
//!
//! # Design Decisions
//! - Expiry is checked at read time; stores may also expire physically
//! - Last writer wins; no versioning
//! - Store failures degrade to misses, never to request errors

pub mod entry;
pub mod key;
pub mod memory;
pub mod redis_store;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::{CacheConfig, CacheStoreKind};

pub use entry::{unix_millis, CacheEntry};
pub use key::cache_key;
pub use memory::MemoryStore;
pub use redis_store::RedisStore;

/// Errors raised by cache stores.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache store error: {0}")]
    Redis(#[from] ::redis::RedisError),

    #[error("cache entry encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("cache store did not answer within {0:?}")]
    Timeout(Duration),
}

/// Key-value store holding cache entries.
#[async_trait]
pub trait CacheStore: Send + Sync + std::fmt::Debug {
    /// Fetch the entry stored under `key`, fresh or not.
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, CacheError>;

    /// Store `entry` under `key`, replacing any previous entry.
    async fn put(&self, key: &str, entry: CacheEntry) -> Result<(), CacheError>;

    /// Remove entries whose TTL has elapsed. Returns how many were removed.
    async fn purge_expired(&self) -> Result<usize, CacheError> {
        Ok(0)
    }

    fn kind(&self) -> &'static str;
}

/// TTL-aware facade over a [`CacheStore`].
///
/// Every store call is bounded by the store timeout, so a stalled store costs
/// a request at most that long before it proceeds as a miss.
#[derive(Debug, Clone)]
pub struct ResponseCache {
    store: Arc<dyn CacheStore>,
    max_body_bytes: usize,
    store_timeout: Duration,
}

const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_millis(250);

impl ResponseCache {
    /// Wrap `store` with the default store timeout.
    pub fn new(store: Arc<dyn CacheStore>, max_body_bytes: usize) -> Self {
        Self {
            store,
            max_body_bytes,
            store_timeout: DEFAULT_STORE_TIMEOUT,
        }
    }

    /// Replace the per-call store deadline.
    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    /// Build the configured store. Redis is not contacted until first use.
    pub fn from_config(config: &CacheConfig) -> Result<Self, CacheError> {
        let store_timeout = Duration::from_millis(config.store_timeout_ms);
        let store: Arc<dyn CacheStore> = match config.store {
            CacheStoreKind::Memory => Arc::new(MemoryStore::new(config.max_entries)),
            CacheStoreKind::Redis => {
                Arc::new(RedisStore::open(&config.redis_url)?.with_timeouts(store_timeout))
            }
        };
        tracing::info!(store = store.kind(), timeout = ?store_timeout, "Response cache initialized");
        Ok(Self::new(store, config.max_body_bytes).with_store_timeout(store_timeout))
    }

    /// Largest body the cache stage will buffer.
    pub fn max_body_bytes(&self) -> usize {
        self.max_body_bytes
    }

    /// Fresh entry for `key`, if any.
    pub async fn get(&self, key: &str) -> Option<CacheEntry> {
        self.get_at(key, unix_millis()).await
    }

    /// Fresh entry for `key` as of `now_ms`; stale entries read as absent.
    pub async fn get_at(&self, key: &str, now_ms: u64) -> Option<CacheEntry> {
        match self.bounded(self.store.get(key)).await {
            Ok(Some(entry)) if entry.is_fresh_at(now_ms) => Some(entry),
            Ok(Some(_)) => {
                tracing::debug!(key = %key, "Cache entry expired");
                None
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Cache lookup failed, treating as miss");
                None
            }
        }
    }

    /// Store `entry`. Failures are logged and the write is skipped.
    pub async fn put(&self, key: &str, entry: CacheEntry) {
        let ttl = entry.ttl();
        match self.bounded(self.store.put(key, entry)).await {
            Ok(()) => tracing::debug!(key = %key, ttl = ?ttl, "Response cached"),
            Err(e) => tracing::warn!(key = %key, error = %e, "Cache write failed"),
        }
    }

    /// Sweep expired entries. Returns how many were removed.
    pub async fn purge_expired(&self) -> usize {
        match self.store.purge_expired().await {
            Ok(removed) => removed,
            Err(e) => {
                tracing::warn!(error = %e, "Cache sweep failed");
                0
            }
        }
    }

    async fn bounded<T, F>(&self, call: F) -> Result<T, CacheError>
    where
        F: std::future::Future<Output = Result<T, CacheError>>,
    {
        tokio::time::timeout(self.store_timeout, call)
            .await
            .unwrap_or(Err(CacheError::Timeout(self.store_timeout)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    /// Accepts every call and never answers.
    #[derive(Debug)]
    struct StalledStore;

    #[async_trait]
    impl CacheStore for StalledStore {
        async fn get(&self, _key: &str) -> Result<Option<CacheEntry>, CacheError> {
            std::future::pending().await
        }

        async fn put(&self, _key: &str, _entry: CacheEntry) -> Result<(), CacheError> {
            std::future::pending().await
        }

        fn kind(&self) -> &'static str {
            "stalled"
        }
    }

    fn entry(ttl: Duration) -> CacheEntry {
        CacheEntry::new(200, vec![], Bytes::from_static(b"[]"), ttl)
    }

    #[tokio::test]
    async fn test_stale_entry_reads_as_miss() {
        let cache = ResponseCache::new(Arc::new(MemoryStore::new(16)), 1024);
        let stored = entry(Duration::from_secs(600));
        let stored_at = stored.stored_at_ms;
        cache.put("GET:/api/products", stored).await;

        assert!(cache.get_at("GET:/api/products", stored_at + 599_999).await.is_some());
        assert!(cache.get_at("GET:/api/products", stored_at + 600_000).await.is_none());
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let cache = ResponseCache::new(Arc::new(MemoryStore::new(16)), 1024);
        cache.put("k", entry(Duration::from_secs(60))).await;
        let newer = CacheEntry::new(201, vec![], Bytes::from_static(b"new"), Duration::from_secs(60));
        cache.put("k", newer).await;

        let got = cache.get("k").await.unwrap();
        assert_eq!(got.status, 201);
        assert_eq!(got.body, Bytes::from_static(b"new"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_store_reads_as_miss() {
        let cache = ResponseCache::new(Arc::new(StalledStore), 1024)
            .with_store_timeout(Duration::from_millis(200));

        let started = tokio::time::Instant::now();
        assert!(cache.get("GET:/api/products").await.is_none());
        cache.put("GET:/api/products", entry(Duration::from_secs(60))).await;
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(400), "{elapsed:?}");
        assert!(elapsed < Duration::from_secs(1), "{elapsed:?}");
    }
}
