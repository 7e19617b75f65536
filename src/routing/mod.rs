//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request path
//!     → router.rs (longest-prefix lookup)
//!     → matcher.rs (segment-aware prefix test)
//!     → Return: matched RouteRule or None
//!
//! Route Compilation (at startup):
//!     RouteConfig[]
//!     → rule.rs (parse backend, rewrite, cache and limiter policies)
//!     → Sort by prefix length
//!     → Freeze as immutable RouteTable
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - No regex in hot path (prefix matching only)
//! - Deterministic: same path always matches the same rule

pub mod matcher;
pub mod router;
pub mod rule;

pub use router::RouteTable;
pub use rule::{BackendTarget, CachePolicy, PathRewrite, RateLimitPolicy, RouteRule};
