//! Dispatch to backends.
//!
//! # Data Flow
//! ```text
//! RequestContext (route + rewritten path)
//!     → forward.rs (upstream URI, Host, X-Forwarded-For)
//!     → pooled hyper client, bounded by upstream timeout
//!     → response relayed as a stream
//! ```
//!
//! # Design Decisions
//! - No retries: a retried POST could duplicate side effects
//! - Unreachable or malformed backends → 502, deadline exceeded → 504

pub mod forward;

pub use forward::Forwarder;
