//! In-process cache store.

use async_trait::async_trait;
use dashmap::DashMap;

use crate::cache::{unix_millis, CacheEntry, CacheError, CacheStore};

/// Bounded in-memory store backed by a sharded map.
///
/// When full, expired entries are dropped first and then the oldest entry.
#[derive(Debug)]
pub struct MemoryStore {
    entries: DashMap<String, CacheEntry>,
    max_entries: usize,
}

impl MemoryStore {
    /// Create a store holding at most `max_entries` (at least one).
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: DashMap::new(),
            max_entries: max_entries.max(1),
        }
    }

    /// Number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn purge_at(&self, now_ms: u64) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_fresh_at(now_ms));
        before.saturating_sub(self.entries.len())
    }

    fn make_room(&self) {
        if self.purge_at(unix_millis()) > 0 && self.entries.len() < self.max_entries {
            return;
        }
        // Key is collected first; removing while iterating would deadlock the shard.
        let oldest = self
            .entries
            .iter()
            .min_by_key(|e| e.value().stored_at_ms)
            .map(|e| e.key().clone());
        if let Some(key) = oldest {
            self.entries.remove(&key);
            tracing::debug!(key = %key, "Evicted oldest cache entry");
        }
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, CacheError> {
        Ok(self.entries.get(key).map(|e| e.value().clone()))
    }

    async fn put(&self, key: &str, entry: CacheEntry) -> Result<(), CacheError> {
        if !self.entries.contains_key(key) && self.entries.len() >= self.max_entries {
            self.make_room();
        }
        self.entries.insert(key.to_string(), entry);
        Ok(())
    }

    async fn purge_expired(&self) -> Result<usize, CacheError> {
        Ok(self.purge_at(unix_millis()))
    }

    fn kind(&self) -> &'static str {
        "memory"
    }
}
