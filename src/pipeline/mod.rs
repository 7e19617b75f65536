//! Request pipeline.
//!
//! # Data Flow
//! ```text
//! RECEIVED
//!     → RateLimitStage   (REJECTED_429 | RATE_CHECKED)
//!     → CacheStage       (CACHE_HIT | CACHE_CHECKED)
//!     → DispatchStage    (BACKEND_OK | BACKEND_ERROR)
//!     ← on_response hooks, innermost first (cache populate, rate-limit headers)
//! ```
//!
//! # Design Decisions
//! - Stage order is an explicit list, not implicit layer stacking
//! - A stage either continues or produces the response; later stages are skipped
//! - Only stages that continued see the response on the way out
//! - No lock is held across a stage boundary

pub mod stages;

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::Request;
use axum::response::{IntoResponse, Response};

use crate::error::GatewayError;
use crate::http::request::RequestContext;

pub use stages::{CacheStage, DispatchStage, RateLimitStage};

/// A request moving through the pipeline.
#[derive(Debug)]
pub struct Exchange {
    pub ctx: RequestContext,
    request: Option<Request<Body>>,
}

impl Exchange {
    pub fn new(ctx: RequestContext, request: Request<Body>) -> Self {
        Self {
            ctx,
            request: Some(request),
        }
    }

    /// The inbound request, unless a stage has already taken it.
    pub fn request(&self) -> Option<&Request<Body>> {
        self.request.as_ref()
    }

    pub fn take_request(&mut self) -> Option<Request<Body>> {
        self.request.take()
    }
}

/// What a stage decided.
#[derive(Debug)]
pub enum Flow {
    Continue,
    Respond(Response),
}

/// One step of the pipeline.
#[async_trait]
pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;

    async fn on_request(&self, exchange: &mut Exchange) -> Result<Flow, GatewayError>;

    /// Runs for stages that returned `Flow::Continue`, innermost first.
    async fn on_response(&self, _ctx: &RequestContext, response: Response) -> Response {
        response
    }
}

/// Ordered list of stages.
#[derive(Clone)]
pub struct Pipeline {
    stages: Vec<Arc<dyn Stage>>,
}

impl Pipeline {
    pub fn new(stages: Vec<Arc<dyn Stage>>) -> Self {
        Self { stages }
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    pub async fn execute(&self, mut exchange: Exchange) -> Response {
        let mut passed = 0;
        let mut produced = None;

        for stage in &self.stages {
            match stage.on_request(&mut exchange).await {
                Ok(Flow::Continue) => passed += 1,
                Ok(Flow::Respond(response)) => {
                    produced = Some(response);
                    break;
                }
                Err(err) => {
                    log_error(stage.name(), &exchange.ctx, &err);
                    produced = Some(err.into_response());
                    break;
                }
            }
        }

        let mut response = produced.unwrap_or_else(|| {
            GatewayError::RouteNotFound {
                path: exchange.ctx.original_path.clone(),
            }
            .into_response()
        });

        for stage in self.stages[..passed].iter().rev() {
            response = stage.on_response(&exchange.ctx, response).await;
        }
        response
    }
}

fn log_error(stage: &str, ctx: &RequestContext, err: &GatewayError) {
    if err.status().is_server_error() {
        tracing::error!(
            request_id = %ctx.request_id,
            stage,
            route = ctx.route_name(),
            path = %ctx.original_path,
            error = %err,
            "Request failed"
        );
    } else {
        tracing::warn!(
            request_id = %ctx.request_id,
            stage,
            client = %ctx.client_id,
            path = %ctx.original_path,
            error = %err,
            "Request rejected"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::RouteTable;
    use axum::http::StatusCode;
    use std::sync::Mutex;

    type Log = Arc<Mutex<Vec<String>>>;

    struct Recording {
        name: &'static str,
        respond_with: Option<StatusCode>,
        log: Log,
    }

    #[async_trait]
    impl Stage for Recording {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn on_request(&self, _exchange: &mut Exchange) -> Result<Flow, GatewayError> {
            self.log.lock().unwrap().push(format!("{}:request", self.name));
            Ok(match self.respond_with {
                Some(status) => Flow::Respond(status.into_response()),
                None => Flow::Continue,
            })
        }

        async fn on_response(&self, _ctx: &RequestContext, response: Response) -> Response {
            self.log.lock().unwrap().push(format!("{}:response", self.name));
            response
        }
    }

    fn stage(name: &'static str, respond_with: Option<StatusCode>, log: &Log) -> Arc<dyn Stage> {
        Arc::new(Recording { name, respond_with, log: log.clone() })
    }

    fn exchange() -> Exchange {
        let request = Request::builder().uri("/api/users").body(Body::empty()).unwrap();
        let (parts, body) = request.into_parts();
        let ctx = RequestContext::new(
            &parts,
            "127.0.0.1:1234".parse().unwrap(),
            false,
            &RouteTable::default(),
        );
        Exchange::new(ctx, Request::from_parts(parts, body))
    }

    #[tokio::test]
    async fn test_short_circuit_skips_later_stages() {
        let log: Log = Arc::default();
        let pipeline = Pipeline::new(vec![
            stage("limit", None, &log),
            stage("cache", Some(StatusCode::OK), &log),
            stage("dispatch", Some(StatusCode::BAD_GATEWAY), &log),
        ]);

        let response = pipeline.execute(exchange()).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            *log.lock().unwrap(),
            vec!["limit:request", "cache:request", "limit:response"]
        );
    }

    #[tokio::test]
    async fn test_response_hooks_run_innermost_first() {
        let log: Log = Arc::default();
        let pipeline = Pipeline::new(vec![
            stage("limit", None, &log),
            stage("cache", None, &log),
            stage("dispatch", Some(StatusCode::CREATED), &log),
        ]);

        let response = pipeline.execute(exchange()).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(
            *log.lock().unwrap(),
            vec![
                "limit:request",
                "cache:request",
                "dispatch:request",
                "cache:response",
                "limit:response"
            ]
        );
    }

    #[tokio::test]
    async fn test_unanswered_request_is_not_found() {
        let log: Log = Arc::default();
        let pipeline = Pipeline::new(vec![stage("limit", None, &log)]);
        let response = pipeline.execute(exchange()).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
