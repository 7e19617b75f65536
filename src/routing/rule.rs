//! Compiled route rules.
//!
//! A [`RouteRule`] is the typed, validated form of a [`RouteConfig`]. Rules are
//! built once at startup and never change afterwards.

use std::time::Duration;

use axum::http::uri::{Authority, Scheme};
use url::Url;

use crate::config::validation::check_backend_url;
use crate::config::RouteConfig;
use crate::routing::matcher::PathPrefixMatcher;

/// Whether responses on a route may be cached, and for how long.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePolicy {
    Disabled,
    Ttl(Duration),
}

/// Which limiter instance guards a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitPolicy {
    /// The process-wide limiter.
    Shared,
    /// An isolated limiter with its own window and maximum.
    RouteSpecific { window: Duration, max_requests: u64 },
}

/// Replaces the matched prefix with a target before forwarding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathRewrite {
    from: String,
    to: Option<String>,
}

impl PathRewrite {
    pub fn identity(from: impl Into<String>) -> Self {
        Self { from: from.into(), to: None }
    }

    pub fn replace(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self { from: from.into(), to: Some(to.into()) }
    }

    /// Rewrite a path the owning rule has already matched.
    pub fn apply(&self, path: &str) -> String {
        let Some(to) = &self.to else {
            return path.to_string();
        };
        let rest = if self.from == "/" {
            path
        } else {
            path.strip_prefix(self.from.as_str()).unwrap_or(path)
        };

        let base = to.trim_end_matches('/');
        let rewritten = if rest.is_empty() {
            to.clone()
        } else if rest.starts_with('/') {
            format!("{}{}", base, rest)
        } else {
            format!("{}/{}", base, rest)
        };

        if rewritten.is_empty() {
            "/".to_string()
        } else {
            rewritten
        }
    }
}

/// Backend address split into the parts needed to build upstream URIs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendTarget {
    pub url: Url,
    pub scheme: Scheme,
    pub authority: Authority,
}

impl BackendTarget {
    fn parse(raw: &str) -> Result<Self, String> {
        let url = check_backend_url(raw)?;
        let host = url.host_str().ok_or_else(|| format!("'{}' has no host", raw))?;
        let authority = match url.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        };
        let authority = authority
            .parse::<Authority>()
            .map_err(|e| format!("'{}' has an invalid authority: {}", raw, e))?;
        Ok(Self {
            url,
            scheme: Scheme::HTTP,
            authority,
        })
    }
}

impl std::fmt::Display for BackendTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.authority)
    }
}

/// Static mapping from a path prefix to a backend and its policies.
#[derive(Debug, Clone)]
pub struct RouteRule {
    pub name: String,
    pub matcher: PathPrefixMatcher,
    pub backend: BackendTarget,
    pub rewrite: PathRewrite,
    pub cache: CachePolicy,
    pub rate_limit: RateLimitPolicy,
}

impl RouteRule {
    pub fn matches(&self, path: &str) -> bool {
        self.matcher.matches(path)
    }

    pub fn rewrite_path(&self, path: &str) -> String {
        self.rewrite.apply(path)
    }

    pub fn cache_ttl(&self) -> Option<Duration> {
        match self.cache {
            CachePolicy::Ttl(ttl) => Some(ttl),
            CachePolicy::Disabled => None,
        }
    }
}

impl TryFrom<&RouteConfig> for RouteRule {
    type Error = String;

    fn try_from(config: &RouteConfig) -> Result<Self, Self::Error> {
        let matcher = PathPrefixMatcher::new(config.path_prefix.clone());
        let backend = BackendTarget::parse(&config.backend)?;
        let rewrite = match &config.rewrite {
            Some(to) => PathRewrite::replace(matcher.prefix(), to.clone()),
            None => PathRewrite::identity(matcher.prefix()),
        };
        let cache = match config.cache_ttl_secs {
            Some(0) => return Err(format!("route '{}' has a zero cache TTL", config.name)),
            Some(secs) => CachePolicy::Ttl(Duration::from_secs(secs)),
            None => CachePolicy::Disabled,
        };
        let rate_limit = match config.rate_limit {
            Some(limit) => RateLimitPolicy::RouteSpecific {
                window: Duration::from_secs(limit.window_secs),
                max_requests: limit.max_requests,
            },
            None => RateLimitPolicy::Shared,
        };

        Ok(Self {
            name: config.name.clone(),
            matcher,
            backend,
            rewrite,
            cache,
            rate_limit,
        })
    }
}
