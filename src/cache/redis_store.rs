//! Redis-backed cache store, shared by every gateway replica.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::{AsyncCommands, Client};
use tokio::sync::OnceCell;

use crate::cache::{CacheEntry, CacheError, CacheStore};

const KEY_PREFIX: &str = "gateway:cache:";
const DEFAULT_TIMEOUT: Duration = Duration::from_millis(250);

/// Entries are JSON documents written with `SET .. EX`, so Redis drops them
/// on its own once the TTL passes.
///
/// One multiplexed connection is opened on first use and shared by every
/// request; it reconnects on its own after a failure.
pub struct RedisStore {
    client: Client,
    manager: OnceCell<ConnectionManager>,
    timeout: Duration,
    prefix: String,
}

impl RedisStore {
    /// Parse the URL. No connection is made until the first command.
    pub fn open(url: &str) -> Result<Self, CacheError> {
        Ok(Self {
            client: Client::open(url)?,
            manager: OnceCell::new(),
            timeout: DEFAULT_TIMEOUT,
            prefix: KEY_PREFIX.to_string(),
        })
    }

    /// Bound connection setup and each command's reply by `timeout`.
    pub fn with_timeouts(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Namespace keys under `prefix` instead of the default.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    fn prefixed(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    /// Handle to the shared connection, connecting on first use.
    async fn connection(&self) -> Result<ConnectionManager, CacheError> {
        let manager = self
            .manager
            .get_or_try_init(|| async {
                let config = ConnectionManagerConfig::new()
                    .set_connection_timeout(self.timeout)
                    .set_response_timeout(self.timeout)
                    .set_number_of_retries(1);
                let manager = self.client.get_connection_manager_with_config(config).await?;
                tracing::info!(prefix = %self.prefix, "Connected to Redis cache store");
                Ok::<_, CacheError>(manager)
            })
            .await?;
        Ok(manager.clone())
    }
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore")
            .field("prefix", &self.prefix)
            .field("timeout", &self.timeout)
            .field("connected", &self.manager.initialized())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl CacheStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, CacheError> {
        let mut conn = self.connection().await?;
        let raw: Option<String> = conn.get(self.prefixed(key)).await?;
        Ok(raw.map(|data| serde_json::from_str(&data)).transpose()?)
    }

    async fn put(&self, key: &str, entry: CacheEntry) -> Result<(), CacheError> {
        let data = serde_json::to_string(&entry)?;
        // Round up so Redis never drops an entry before the gateway would.
        let ttl_secs = entry.ttl_ms.div_ceil(1000).max(1);
        let mut conn = self.connection().await?;
        let _: () = conn.set_ex(self.prefixed(key), data, ttl_secs).await?;
        Ok(())
    }

    fn kind(&self) -> &'static str {
        "redis"
    }
}
