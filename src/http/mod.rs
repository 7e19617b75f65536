//! HTTP front end.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum router, request-ID and trace layers)
//!     → request.rs (RequestContext: client identity, route, rewrite)
//!     → pipeline (rate limit → cache → dispatch)
//!     → response.rs (JSON errors, cache and rate-limit headers)
//!     → client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{RequestContext, X_FORWARDED_FOR, X_REQUEST_ID};
pub use server::{AppState, HttpServer, ServerError};
