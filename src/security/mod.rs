//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → client id (peer IP, or first X-Forwarded-For hop when trusted)
//!     → rate_limit.rs (shared or route-specific fixed window)
//!     → Pass to cache lookup, or reject with 429
//! ```
//!
//! # Design Decisions
//! - Rejections are outcomes, not errors; nothing is queued
//! - Limiter state is owned by the server and injected, never global

pub mod rate_limit;

pub use rate_limit::{FixedWindowLimiter, RateLimitDecision, RateLimiters};
