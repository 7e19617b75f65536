//! Response helpers.
//!
//! # Responsibilities
//! - Render gateway-generated responses as JSON `{"message": ...}`
//! - Identify hop-by-hop headers that must not cross the gateway
//! - Decorate responses with rate-limit headers

use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;

use crate::security::RateLimitDecision;

/// Marks whether a response was served from the cache.
pub const X_CACHE: &str = "x-cache";

pub const X_RATELIMIT_LIMIT: &str = "x-ratelimit-limit";
pub const X_RATELIMIT_REMAINING: &str = "x-ratelimit-remaining";
pub const X_RATELIMIT_RESET: &str = "x-ratelimit-reset";

const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

pub fn json_message(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "message": message }))).into_response()
}

pub fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP.contains(&name.as_str())
}

/// Remove hop-by-hop headers, including any named in `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(axum::http::header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();
    for name in listed {
        headers.remove(name);
    }
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
}

/// Advertise the client's standing in its current window.
pub fn apply_rate_limit_headers(headers: &mut HeaderMap, decision: &RateLimitDecision) {
    if let RateLimitDecision::Allowed { limit, remaining, reset_after } = decision {
        headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(*limit));
        headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(*remaining));
        let reset = reset_after.as_secs() + u64::from(reset_after.subsec_nanos() > 0);
        headers.insert(X_RATELIMIT_RESET, HeaderValue::from(reset));
    }
}
