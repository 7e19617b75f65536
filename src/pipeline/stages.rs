//! The gateway's pipeline stages.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, HeaderValue, Method};
use axum::response::{IntoResponse, Response};

use crate::cache::{cache_key, CacheEntry, ResponseCache};
use crate::error::GatewayError;
use crate::http::request::RequestContext;
use crate::http::response::{apply_rate_limit_headers, X_CACHE};
use crate::observability::metrics;
use crate::pipeline::{Exchange, Flow, Stage};
use crate::proxy::Forwarder;
use crate::security::{RateLimitDecision, RateLimiters};

/// Counts the request against the client's window.
pub struct RateLimitStage {
    limiters: Arc<RateLimiters>,
}

impl RateLimitStage {
    pub fn new(limiters: Arc<RateLimiters>) -> Self {
        Self { limiters }
    }
}

#[async_trait]
impl Stage for RateLimitStage {
    fn name(&self) -> &'static str {
        "rate_limit"
    }

    async fn on_request(&self, exchange: &mut Exchange) -> Result<Flow, GatewayError> {
        let ctx = &mut exchange.ctx;
        let limiter = self.limiters.for_route(ctx.route.as_deref());
        let decision = limiter.check(&ctx.client_id);
        ctx.rate_limit = Some(decision);

        match decision {
            RateLimitDecision::Allowed { .. } => Ok(Flow::Continue),
            RateLimitDecision::Denied { retry_after, .. } => {
                metrics::record_rate_limited(ctx.route_name());
                Err(GatewayError::RateLimited {
                    message: self.limiters.message().to_string(),
                    retry_after,
                })
            }
        }
    }

    async fn on_response(&self, ctx: &RequestContext, mut response: Response) -> Response {
        if let Some(decision) = &ctx.rate_limit {
            apply_rate_limit_headers(response.headers_mut(), decision);
        }
        response
    }
}

/// Serves fresh entries and stores successful responses on cacheable routes.
pub struct CacheStage {
    cache: ResponseCache,
    buffer_timeout: Duration,
}

impl CacheStage {
    pub fn new(cache: ResponseCache, buffer_timeout: Duration) -> Self {
        Self { cache, buffer_timeout }
    }

    async fn store(
        &self,
        ctx: &RequestContext,
        key: &str,
        ttl: Duration,
        response: Response,
    ) -> Response {
        let backend = || ctx.backend().map(ToString::to_string).unwrap_or_default();
        let (mut parts, body) = response.into_parts();
        let bytes = match tokio::time::timeout(
            self.buffer_timeout,
            axum::body::to_bytes(body, self.cache.max_body_bytes()),
        )
        .await
        {
            Ok(Ok(bytes)) => bytes,
            Ok(Err(e)) => {
                return GatewayError::MalformedUpstreamResponse {
                    backend: backend(),
                    reason: e.to_string(),
                }
                .into_response()
            }
            Err(_) => {
                return GatewayError::BackendTimeout {
                    backend: backend(),
                    after: self.buffer_timeout,
                }
                .into_response()
            }
        };

        self.cache
            .put(key, CacheEntry::from_parts(&parts, bytes.clone(), ttl))
            .await;
        parts.headers.insert(X_CACHE, HeaderValue::from_static("MISS"));
        Response::from_parts(parts, Body::from(bytes))
    }

    fn bufferable(&self, response: &Response) -> bool {
        response
            .headers()
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<usize>().ok())
            .is_some_and(|len| len <= self.cache.max_body_bytes())
    }
}

fn wants_fresh(exchange: &Exchange) -> bool {
    exchange
        .request()
        .and_then(|r| r.headers().get(header::CACHE_CONTROL))
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains("no-cache"))
}

#[async_trait]
impl Stage for CacheStage {
    fn name(&self) -> &'static str {
        "cache"
    }

    async fn on_request(&self, exchange: &mut Exchange) -> Result<Flow, GatewayError> {
        let cacheable = exchange.ctx.method == Method::GET
            && exchange.ctx.route.as_ref().is_some_and(|r| r.cache_ttl().is_some());
        if !cacheable {
            return Ok(Flow::Continue);
        }

        let ctx = &exchange.ctx;
        let key = cache_key(&ctx.method, &ctx.original_path, ctx.query.as_deref());

        if !wants_fresh(exchange) {
            if let Some(entry) = self.cache.get(&key).await {
                metrics::record_cache_lookup(ctx.route_name(), true);
                tracing::debug!(request_id = %ctx.request_id, key = %key, "Cache hit");
                return Ok(Flow::Respond(entry.to_response()));
            }
        }

        metrics::record_cache_lookup(ctx.route_name(), false);
        exchange.ctx.cache_key = Some(key);
        Ok(Flow::Continue)
    }

    async fn on_response(&self, ctx: &RequestContext, response: Response) -> Response {
        let (Some(key), Some(ttl)) = (
            ctx.cache_key.as_deref(),
            ctx.route.as_ref().and_then(|r| r.cache_ttl()),
        ) else {
            return response;
        };

        if response.status().is_success() && self.bufferable(&response) {
            self.store(ctx, key, ttl, response).await
        } else {
            let mut response = response;
            response
                .headers_mut()
                .insert(X_CACHE, HeaderValue::from_static("MISS"));
            response
        }
    }
}

/// Forwards to the matched backend. Always produces the response.
pub struct DispatchStage {
    forwarder: Forwarder,
}

impl DispatchStage {
    pub fn new(forwarder: Forwarder) -> Self {
        Self { forwarder }
    }
}

#[async_trait]
impl Stage for DispatchStage {
    fn name(&self) -> &'static str {
        "dispatch"
    }

    async fn on_request(&self, exchange: &mut Exchange) -> Result<Flow, GatewayError> {
        let Some(route) = exchange.ctx.route.clone() else {
            return Err(GatewayError::RouteNotFound {
                path: exchange.ctx.original_path.clone(),
            });
        };
        let Some(request) = exchange.take_request() else {
            return Err(GatewayError::BackendUnavailable {
                backend: route.backend.to_string(),
                reason: "request was consumed before dispatch".to_string(),
            });
        };

        let (parts, body) = request.into_parts();
        let response = self.forwarder.forward(&exchange.ctx, parts, body).await?;
        Ok(Flow::Respond(response))
    }
}
