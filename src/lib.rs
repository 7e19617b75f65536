//! HTTP API gateway.
//!
//! Routes client requests by path prefix to backend services, limits each
//! client to a fixed number of requests per window, and serves repeated reads
//! of cacheable routes from a response cache.
//!
//! # Architecture Overview
//!
//! ```text
//!   Client ──▶ http::server ──▶ pipeline ─────────────────────────────────┐
//!                                 │                                        │
//!                                 ├─ RateLimitStage (security::rate_limit) │
//!                                 ├─ CacheStage     (cache)                │
//!                                 └─ DispatchStage  (proxy::forward) ──────┼──▶ Backend
//!                                                                          │
//!   Client ◀── on_response hooks (cache populate, rate-limit headers) ◀────┘
//!
//!   Cross-cutting: config, routing, error, observability, lifecycle
//! ```

// Core subsystems
pub mod config;
pub mod http;
pub mod pipeline;
pub mod proxy;
pub mod routing;

// Traffic management
pub mod cache;
pub mod security;

// Cross-cutting concerns
pub mod error;
pub mod lifecycle;
pub mod observability;

pub use config::ProxyConfig;
pub use error::GatewayError;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
