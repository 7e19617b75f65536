//! Cached response representation.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::body::Body;
use axum::http::{header, response, HeaderName, HeaderValue, StatusCode};
use axum::response::Response;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::http::response::{is_hop_by_hop, X_CACHE};

/// Milliseconds since the Unix epoch.
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// A stored backend response.
///
/// Wall-clock timestamps keep entries meaningful when they live in a store
/// shared by several gateway processes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
    pub stored_at_ms: u64,
    pub ttl_ms: u64,
}

impl CacheEntry {
    pub fn new(status: u16, headers: Vec<(String, String)>, body: Bytes, ttl: Duration) -> Self {
        Self {
            status,
            headers,
            body,
            stored_at_ms: unix_millis(),
            ttl_ms: ttl.as_millis() as u64,
        }
    }

    /// Capture a backend response, keeping only end-to-end headers.
    pub fn from_parts(parts: &response::Parts, body: Bytes, ttl: Duration) -> Self {
        let headers = parts
            .headers
            .iter()
            .filter(|(name, _)| is_storable(name))
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        Self::new(parts.status.as_u16(), headers, body, ttl)
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }

    pub fn age_at(&self, now_ms: u64) -> Duration {
        Duration::from_millis(now_ms.saturating_sub(self.stored_at_ms))
    }

    pub fn is_fresh_at(&self, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.stored_at_ms) < self.ttl_ms
    }

    /// Replay the entry as a client response marked as a cache hit.
    pub fn to_response(&self) -> Response {
        let mut response = Response::new(Body::from(self.body.clone()));
        *response.status_mut() = StatusCode::from_u16(self.status).unwrap_or(StatusCode::OK);

        let headers = response.headers_mut();
        for (name, value) in &self.headers {
            if let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                headers.append(name, value);
            }
        }
        headers.insert(X_CACHE, HeaderValue::from_static("HIT"));
        headers.insert(
            header::AGE,
            HeaderValue::from(self.age_at(unix_millis()).as_secs()),
        );
        response
    }
}

fn is_storable(name: &HeaderName) -> bool {
    !is_hop_by_hop(name)
        && name != header::SET_COOKIE
        && name != header::AGE
        && name.as_str() != X_CACHE
}
