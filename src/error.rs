//! Request-level error taxonomy.
//!
//! Every variant is terminal for the current request only and renders as an
//! HTTP status with a JSON `{"message": ...}` body.

use std::time::Duration;

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::http::response::json_message;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Client exceeded its window; recoverable by backing off.
    #[error("{message}")]
    RateLimited { message: String, retry_after: Duration },

    #[error("No route matches {path}")]
    RouteNotFound { path: String },

    #[error("Backend {backend} is unavailable: {reason}")]
    BackendUnavailable { backend: String, reason: String },

    #[error("Backend {backend} did not respond within {after:?}")]
    BackendTimeout { backend: String, after: Duration },

    #[error("Backend {backend} sent a malformed response: {reason}")]
    MalformedUpstreamResponse { backend: String, reason: String },
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            GatewayError::RouteNotFound { .. } => StatusCode::NOT_FOUND,
            GatewayError::BackendUnavailable { .. }
            | GatewayError::MalformedUpstreamResponse { .. } => StatusCode::BAD_GATEWAY,
            GatewayError::BackendTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    /// Body text shown to clients. Backend internals are not exposed.
    fn client_message(&self) -> String {
        match self {
            GatewayError::RateLimited { message, .. } => message.clone(),
            GatewayError::RouteNotFound { .. } => self.to_string(),
            GatewayError::BackendUnavailable { .. }
            | GatewayError::MalformedUpstreamResponse { .. } => {
                "Upstream request failed".to_string()
            }
            GatewayError::BackendTimeout { .. } => "Upstream request timed out".to_string(),
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let mut response = json_message(self.status(), &self.client_message());
        if let GatewayError::RateLimited { retry_after, .. } = &self {
            let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::DEFAULT_RATE_LIMIT_MESSAGE;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_rate_limited_response() {
        let err = GatewayError::RateLimited {
            message: DEFAULT_RATE_LIMIT_MESSAGE.to_string(),
            retry_after: Duration::from_millis(1500),
        };
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "2");
        assert_eq!(
            body_json(response).await,
            serde_json::json!({
                "message": "Too many requests from this IP, please try again after 15 minutes"
            })
        );
    }

    #[tokio::test]
    async fn test_backend_errors_hide_details() {
        let err = GatewayError::MalformedUpstreamResponse {
            backend: "10.0.0.1:4002".into(),
            reason: "invalid HTTP version".into(),
        };
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(body_json(response).await["message"], "Upstream request failed");

        let err = GatewayError::BackendTimeout {
            backend: "10.0.0.1:4002".into(),
            after: Duration::from_secs(30),
        };
        assert_eq!(err.status(), StatusCode::GATEWAY_TIMEOUT);
    }
}
