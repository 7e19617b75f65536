//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address, health endpoint).
    pub listener: ListenerConfig,

    /// Route definitions mapping path prefixes to backends.
    pub routes: Vec<RouteConfig>,

    /// Timeout configuration for backend calls.
    pub timeouts: TimeoutConfig,

    /// Process-wide rate limiting configuration.
    pub rate_limit: RateLimitConfig,

    /// Response cache configuration.
    pub cache: CacheConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl ProxyConfig {
    /// Configuration with the route table of the reference deployment.
    ///
    /// Used when no configuration file is supplied.
    pub fn with_builtin_routes() -> Self {
        Self {
            routes: vec![
                RouteConfig::new("users", "/api/users", "http://user-service:4001")
                    .with_cache_ttl(5 * 60),
                RouteConfig::new("products", "/api/products", "http://product-service:4002")
                    .with_cache_ttl(10 * 60),
                RouteConfig::new("orders", "/api/orders", "http://order-service:4003"),
            ],
            ..Self::default()
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:3000").
    pub bind_address: String,

    /// Path answered directly by the gateway for liveness checks.
    pub health_path: String,

    /// Use the first `X-Forwarded-For` entry as the client identifier.
    pub trust_forwarded_for: bool,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
            health_path: "/health".to_string(),
            trust_forwarded_for: false,
        }
    }
}

/// Route configuration mapping a path prefix to a backend.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteConfig {
    /// Route identifier for logging/metrics.
    pub name: String,

    /// Path prefix to match.
    pub path_prefix: String,

    /// Backend base URL (e.g., "http://product-service:4002").
    pub backend: String,

    /// Replacement for the matched prefix. Absent means identity.
    #[serde(default)]
    pub rewrite: Option<String>,

    /// Cache TTL in seconds. Absent means the route is not cacheable.
    #[serde(default)]
    pub cache_ttl_secs: Option<u64>,

    /// Route-specific limiter. Absent means the shared limiter applies.
    #[serde(default)]
    pub rate_limit: Option<RouteRateLimitConfig>,
}

impl RouteConfig {
    /// Create an uncached route using the shared limiter and identity rewrite.
    pub fn new(
        name: impl Into<String>,
        path_prefix: impl Into<String>,
        backend: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            path_prefix: path_prefix.into(),
            backend: backend.into(),
            rewrite: None,
            cache_ttl_secs: None,
            rate_limit: None,
        }
    }

    pub fn with_cache_ttl(mut self, secs: u64) -> Self {
        self.cache_ttl_secs = Some(secs);
        self
    }

    pub fn with_rewrite(mut self, target: impl Into<String>) -> Self {
        self.rewrite = Some(target.into());
        self
    }

    pub fn with_rate_limit(mut self, window_secs: u64, max_requests: u64) -> Self {
        self.rate_limit = Some(RouteRateLimitConfig {
            window_secs,
            max_requests,
        });
        self
    }
}

/// Limits for a route that does not share the process-wide limiter.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
pub struct RouteRateLimitConfig {
    pub window_secs: u64,
    pub max_requests: u64,
}

/// Timeout configuration for backend calls.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Time allowed for a backend to produce its response, in seconds.
    pub upstream_secs: u64,

    /// Idle pooled connection timeout in seconds.
    pub idle_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            upstream_secs: 30,
            idle_secs: 60,
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Length of one counting window in seconds.
    pub window_secs: u64,

    /// Maximum requests per client within one window.
    pub max_requests: u64,

    /// Message returned in the 429 body.
    pub message: String,
}

pub const DEFAULT_RATE_LIMIT_MESSAGE: &str =
    "Too many requests from this IP, please try again after 15 minutes";

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window_secs: 15 * 60,
            max_requests: 100,
            message: DEFAULT_RATE_LIMIT_MESSAGE.to_string(),
        }
    }
}

/// Which key-value store backs the response cache.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum CacheStoreKind {
    #[default]
    Memory,
    Redis,
}

/// Response cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Store backing the cache.
    pub store: CacheStoreKind,

    /// Redis connection URL, used when `store = "redis"`.
    pub redis_url: String,

    /// Maximum entries held by the in-memory store.
    pub max_entries: usize,

    /// Largest response body that will be buffered and cached.
    pub max_body_bytes: usize,

    /// Interval between expired-entry sweeps in seconds.
    pub sweep_interval_secs: u64,

    /// Deadline for a single store read or write in milliseconds. A store
    /// that misses it is treated as a miss or a skipped write.
    pub store_timeout_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            store: CacheStoreKind::Memory,
            redis_url: "redis://localhost:6379".to_string(),
            max_entries: 10_000,
            max_body_bytes: 1024 * 1024,
            sweep_interval_secs: 60,
            store_timeout_ms: 250,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log line format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
