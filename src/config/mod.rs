//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML) or built-in route table
//!     → loader.rs (parse, environment overrides)
//!     → validation.rs (semantic checks)
//!     → ProxyConfig (validated, immutable)
//!     → compiled into routing rules, limiters and cache at startup
//! ```
//!
//! # Design Decisions
//! - Config is static for the life of the process
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    CacheConfig, CacheStoreKind, ListenerConfig, LogFormat, ObservabilityConfig, ProxyConfig,
    RateLimitConfig, RouteConfig, RouteRateLimitConfig, TimeoutConfig,
};
