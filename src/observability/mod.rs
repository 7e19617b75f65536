//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Gateway stages and handler produce:
//!     → logging.rs (structured log events, pretty or JSON)
//!     → metrics.rs (request, rate-limit and cache counters)
//!
//! Consumers:
//!     → stdout (log aggregation)
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - Request ID is a field on every request-scoped event
//! - Metrics are cheap atomic increments; with no recorder installed they are no-ops
//! - `RUST_LOG` overrides the configured level

pub mod logging;
pub mod metrics;

pub use logging::init_tracing;
pub use metrics::init_metrics;
