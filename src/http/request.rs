//! Per-request context.
//!
//! # Responsibilities
//! - Identify the client for rate limiting
//! - Carry the request ID assigned by the request-id layer
//! - Record routing decisions as the request moves through the pipeline

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::http::{request, HeaderMap, Method};
use uuid::Uuid;

use crate::routing::{BackendTarget, RouteRule, RouteTable};
use crate::security::RateLimitDecision;

pub const X_REQUEST_ID: &str = "x-request-id";
pub const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// In-flight request state. Created on arrival, dropped with the response.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: String,
    pub client_id: String,
    pub peer: SocketAddr,
    pub method: Method,
    pub original_path: String,
    pub query: Option<String>,
    pub route: Option<Arc<RouteRule>>,
    pub rewritten_path: Option<String>,
    /// Set by the cache stage when the response may be stored.
    pub cache_key: Option<String>,
    /// Set by the rate-limit stage for response headers.
    pub rate_limit: Option<RateLimitDecision>,
    pub started_at: Instant,
}

impl RequestContext {
    /// Build the context and resolve the route. Matching is lock-free and
    /// happens up front so every stage sees the same rule.
    pub fn new(
        parts: &request::Parts,
        peer: SocketAddr,
        trust_forwarded_for: bool,
        routes: &RouteTable,
    ) -> Self {
        let path = parts.uri.path().to_string();
        let route = routes.match_path(&path);
        let rewritten_path = route.as_ref().map(|rule| rule.rewrite_path(&path));

        Self {
            request_id: request_id(&parts.headers),
            client_id: client_id(&parts.headers, peer, trust_forwarded_for),
            peer,
            method: parts.method.clone(),
            original_path: path,
            query: parts.uri.query().map(str::to_string),
            route,
            rewritten_path,
            cache_key: None,
            rate_limit: None,
            started_at: Instant::now(),
        }
    }

    pub fn route_name(&self) -> &str {
        self.route.as_ref().map(|r| r.name.as_str()).unwrap_or("none")
    }

    pub fn backend(&self) -> Option<&BackendTarget> {
        self.route.as_ref().map(|r| &r.backend)
    }

    /// Rewritten path plus the original query string.
    pub fn upstream_path_and_query(&self) -> String {
        let path = self.rewritten_path.as_deref().unwrap_or(&self.original_path);
        match &self.query {
            Some(query) => format!("{}?{}", path, query),
            None => path.to_string(),
        }
    }
}

fn request_id(headers: &HeaderMap) -> String {
    headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

/// Peer IP, or the first `X-Forwarded-For` hop when the gateway sits behind
/// a trusted proxy.
pub fn client_id(headers: &HeaderMap, peer: SocketAddr, trust_forwarded_for: bool) -> String {
    if trust_forwarded_for {
        let forwarded = headers
            .get(X_FORWARDED_FOR)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let Some(ip) = forwarded {
            return ip.to_string();
        }
    }
    peer.ip().to_string()
}
