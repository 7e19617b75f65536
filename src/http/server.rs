//! HTTP server setup.
//!
//! # Responsibilities
//! - Build the route table, limiters, cache and forwarder from config
//! - Assemble the pipeline in its fixed order
//! - Wire request-ID and trace layers around the Axum router
//! - Run background sweepers and serve until shutdown

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::cache::{CacheError, ResponseCache};
use crate::config::ProxyConfig;
use crate::http::request::{RequestContext, X_REQUEST_ID};
use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::pipeline::{CacheStage, DispatchStage, Exchange, Pipeline, RateLimitStage, Stage};
use crate::proxy::Forwarder;
use crate::routing::RouteTable;
use crate::security::RateLimiters;

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("invalid route table: {0}")]
    Routes(String),

    #[error("cache store: {0}")]
    Cache(#[from] CacheError),
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub routes: Arc<RouteTable>,
    pub pipeline: Pipeline,
    pub trust_forwarded_for: bool,
}

/// The gateway's HTTP front end.
pub struct HttpServer {
    router: Router,
    config: ProxyConfig,
    routes: Arc<RouteTable>,
    limiters: Arc<RateLimiters>,
    cache: ResponseCache,
}

impl HttpServer {
    pub fn new(config: ProxyConfig) -> Result<Self, ServerError> {
        let routes = Arc::new(RouteTable::from_config(&config.routes).map_err(ServerError::Routes)?);
        let limiters = Arc::new(RateLimiters::from_config(&config.rate_limit, &routes));
        let cache = ResponseCache::from_config(&config.cache)?;
        let forwarder = Forwarder::new(&config.timeouts);

        let mut stages: Vec<Arc<dyn Stage>> = Vec::with_capacity(3);
        if config.rate_limit.enabled {
            stages.push(Arc::new(RateLimitStage::new(limiters.clone())));
        }
        stages.push(Arc::new(CacheStage::new(cache.clone(), forwarder.upstream_timeout())));
        stages.push(Arc::new(DispatchStage::new(forwarder)));
        let pipeline = Pipeline::new(stages);

        for rule in routes.rules() {
            tracing::info!(
                route = %rule.name,
                prefix = %rule.matcher.prefix(),
                backend = %rule.backend,
                cache_ttl = ?rule.cache_ttl(),
                "Route registered"
            );
        }
        tracing::debug!(stages = ?pipeline.stage_names(), "Pipeline assembled");

        let state = AppState {
            routes: routes.clone(),
            pipeline,
            trust_forwarded_for: config.listener.trust_forwarded_for,
        };
        let router = Self::build_router(&config, state);

        Ok(Self {
            router,
            config,
            routes,
            limiters,
            cache,
        })
    }

    fn build_router(config: &ProxyConfig, state: AppState) -> Router {
        Router::new()
            .route(&config.listener.health_path, get(health_handler))
            .fallback(gateway_handler)
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                    .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                        let request_id = request
                            .headers()
                            .get(X_REQUEST_ID)
                            .and_then(|v| v.to_str().ok())
                            .unwrap_or("-");
                        tracing::info_span!(
                            "request",
                            request_id = %request_id,
                            method = %request.method(),
                            path = %request.uri().path(),
                        )
                    }))
                    .layer(PropagateRequestIdLayer::x_request_id()),
            )
    }

    /// Serve on `listener` until `shutdown` fires, then drain in-flight requests.
    pub async fn run(self, listener: TcpListener, shutdown: Shutdown) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        if self.config.rate_limit.enabled {
            spawn_limiter_sweeper(self.limiters.clone(), shutdown.clone());
        }
        spawn_cache_sweeper(
            self.cache.clone(),
            Duration::from_secs(self.config.cache.sweep_interval_secs.max(1)),
            shutdown.clone(),
        );

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown.notified())
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    pub fn route_count(&self) -> usize {
        self.routes.len()
    }
}

async fn health_handler() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// Every non-health request enters the pipeline here.
async fn gateway_handler(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    let (parts, body) = request.into_parts();
    let ctx = RequestContext::new(&parts, peer, state.trust_forwarded_for, &state.routes);

    let method = ctx.method.clone();
    let route = ctx.route_name().to_string();
    let request_id = ctx.request_id.clone();
    let started_at: Instant = ctx.started_at;

    let exchange = Exchange::new(ctx, Request::from_parts(parts, body));
    let response = state.pipeline.execute(exchange).await;

    let status = response.status();
    metrics::record_request(method.as_str(), status.as_u16(), &route, started_at);
    tracing::debug!(
        request_id = %request_id,
        route = %route,
        status = status.as_u16(),
        latency_ms = started_at.elapsed().as_millis() as u64,
        "Request completed"
    );
    response
}

fn spawn_limiter_sweeper(limiters: Arc<RateLimiters>, shutdown: Shutdown) {
    let mut stop = shutdown.subscribe();
    tokio::spawn(async move {
        let every = limiters.sweep_interval().max(Duration::from_secs(1));
        let mut ticker = tokio::time::interval(every);
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let removed = limiters.purge_expired(Instant::now());
                    if removed > 0 {
                        tracing::debug!(removed, "Purged expired rate-limit windows");
                    }
                }
                _ = stop.recv() => break,
            }
        }
    });
}

fn spawn_cache_sweeper(cache: ResponseCache, every: Duration, shutdown: Shutdown) {
    let mut stop = shutdown.subscribe();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let removed = cache.purge_expired().await;
                    if removed > 0 {
                        tracing::debug!(removed, "Purged expired cache entries");
                    }
                }
                _ = stop.recv() => break,
            }
        }
    });
}
