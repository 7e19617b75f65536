//! Upstream forwarding.
//!
//! # Responsibilities
//! - Rebuild the client request against the backend authority
//! - Strip hop-by-hop headers in both directions
//! - Enforce the upstream deadline and classify failures
//!
//! Bodies are streamed in both directions; nothing is buffered here. The
//! response body inherits the upstream deadline as an idle limit between
//! frames, so a backend that stalls mid-body releases the connection.

use std::time::Duration;

use axum::body::Body;
use axum::http::{header, request, HeaderValue, Request, Uri, Version};
use axum::response::Response;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tower_http::timeout::TimeoutBody;

use crate::config::TimeoutConfig;
use crate::error::GatewayError;
use crate::http::request::{RequestContext, X_FORWARDED_FOR, X_REQUEST_ID};
use crate::http::response::strip_hop_by_hop;
use crate::routing::BackendTarget;

/// Pooled HTTP client with a per-call deadline.
#[derive(Clone)]
pub struct Forwarder {
    client: Client<HttpConnector, Body>,
    upstream_timeout: Duration,
}

impl Forwarder {
    pub fn new(timeouts: &TimeoutConfig) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(Duration::from_secs(timeouts.connect_secs)));
        connector.set_nodelay(true);

        let client = Client::builder(TokioExecutor::new())
            .pool_idle_timeout(Duration::from_secs(timeouts.idle_secs))
            .build(connector);

        Self {
            client,
            upstream_timeout: Duration::from_secs(timeouts.upstream_secs),
        }
    }

    /// Deadline for the response head, and the idle limit between body frames.
    pub fn upstream_timeout(&self) -> Duration {
        self.upstream_timeout
    }

    /// Forward to the context's backend and relay the response.
    ///
    /// Dropping the returned future (client went away) drops the upstream
    /// call with it.
    pub async fn forward(
        &self,
        ctx: &RequestContext,
        parts: request::Parts,
        body: Body,
    ) -> Result<Response, GatewayError> {
        let backend = ctx.backend().ok_or_else(|| GatewayError::RouteNotFound {
            path: ctx.original_path.clone(),
        })?;
        let request = build_upstream_request(ctx, backend, parts, body)?;

        tracing::debug!(
            request_id = %ctx.request_id,
            backend = %backend,
            uri = %request.uri(),
            "Forwarding request"
        );

        let response = match tokio::time::timeout(self.upstream_timeout, self.client.request(request)).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => return Err(classify_error(backend, &e)),
            Err(_) => {
                return Err(GatewayError::BackendTimeout {
                    backend: backend.to_string(),
                    after: self.upstream_timeout,
                })
            }
        };

        let (mut parts, body) = response.into_parts();
        strip_hop_by_hop(&mut parts.headers);
        let body = TimeoutBody::new(self.upstream_timeout, body);
        Ok(Response::from_parts(parts, Body::new(body)))
    }
}

fn build_upstream_request(
    ctx: &RequestContext,
    backend: &BackendTarget,
    parts: request::Parts,
    body: Body,
) -> Result<Request<Body>, GatewayError> {
    let uri = Uri::builder()
        .scheme(backend.scheme.clone())
        .authority(backend.authority.clone())
        .path_and_query(ctx.upstream_path_and_query())
        .build()
        .map_err(|e| GatewayError::BackendUnavailable {
            backend: backend.to_string(),
            reason: format!("cannot build upstream URI: {}", e),
        })?;

    let mut headers = parts.headers;
    strip_hop_by_hop(&mut headers);

    let host = HeaderValue::from_str(backend.authority.as_str()).map_err(|e| {
        GatewayError::BackendUnavailable {
            backend: backend.to_string(),
            reason: format!("invalid host header: {}", e),
        }
    })?;
    headers.insert(header::HOST, host);

    let peer_ip = ctx.peer.ip().to_string();
    let forwarded_for = match headers.get(X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
        Some(existing) => format!("{}, {}", existing, peer_ip),
        None => peer_ip,
    };
    if let Ok(value) = HeaderValue::from_str(&forwarded_for) {
        headers.insert(X_FORWARDED_FOR, value);
    }
    if let Ok(value) = HeaderValue::from_str(&ctx.request_id) {
        headers.insert(X_REQUEST_ID, value);
    }

    let mut request = Request::new(body);
    *request.method_mut() = parts.method;
    *request.uri_mut() = uri;
    *request.version_mut() = Version::HTTP_11;
    *request.headers_mut() = headers;
    Ok(request)
}

fn classify_error(backend: &BackendTarget, err: &hyper_util::client::legacy::Error) -> GatewayError {
    let malformed = std::error::Error::source(err)
        .and_then(|source| source.downcast_ref::<hyper::Error>())
        .is_some_and(|e| e.is_parse());
    let reason = match std::error::Error::source(err) {
        Some(source) => format!("{}: {}", err, source),
        None => err.to_string(),
    };

    if malformed {
        GatewayError::MalformedUpstreamResponse {
            backend: backend.to_string(),
            reason,
        }
    } else {
        GatewayError::BackendUnavailable {
            backend: backend.to_string(),
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RouteConfig;
    use crate::routing::RouteTable;
    use std::net::SocketAddr;

    #[test]
    fn test_upstream_request_shape() {
        let routes = RouteTable::from_config(&[RouteConfig::new(
            "orders",
            "/api/orders",
            "http://order-service:4003",
        )
        .with_rewrite("/orders")])
        .unwrap();
        let (parts, body) = Request::builder()
            .method("POST")
            .uri("/api/orders/user/7?limit=5")
            .header("host", "gateway.local")
            .header("connection", "keep-alive")
            .header("authorization", "Bearer t")
            .header(X_FORWARDED_FOR, "198.51.100.1")
            .body(Body::from("{}"))
            .unwrap()
            .into_parts();
        let peer: SocketAddr = "10.1.2.3:5555".parse().unwrap();
        let ctx = RequestContext::new(&parts, peer, false, &routes);
        let backend = ctx.backend().unwrap().clone();

        let upstream = build_upstream_request(&ctx, &backend, parts, body).unwrap();
        assert_eq!(upstream.method(), "POST");
        assert_eq!(
            upstream.uri().to_string(),
            "http://order-service:4003/orders/user/7?limit=5"
        );
        let headers = upstream.headers();
        assert_eq!(headers[header::HOST], "order-service:4003");
        assert_eq!(headers["authorization"], "Bearer t");
        assert_eq!(headers[X_FORWARDED_FOR], "198.51.100.1, 10.1.2.3");
        assert!(headers.contains_key(X_REQUEST_ID));
        assert!(!headers.contains_key("connection"));
    }
}
