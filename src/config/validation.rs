//! Configuration validation.
//!
//! Semantic checks run once before the configuration is accepted. Every
//! problem is collected so an operator sees the whole list in one pass.

use std::collections::HashSet;
use std::net::SocketAddr;

use url::Url;

use crate::config::schema::{ProxyConfig, RouteConfig};

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Validate a configuration, returning all problems found.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }
    if !config.listener.health_path.starts_with('/') {
        errors.push(ValidationError::new("listener.health_path", "must start with '/'"));
    }

    if config.timeouts.upstream_secs == 0 {
        errors.push(ValidationError::new("timeouts.upstream_secs", "must be greater than zero"));
    }
    if config.timeouts.connect_secs == 0 {
        errors.push(ValidationError::new("timeouts.connect_secs", "must be greater than zero"));
    }

    if config.rate_limit.enabled {
        if config.rate_limit.window_secs == 0 {
            errors.push(ValidationError::new("rate_limit.window_secs", "must be greater than zero"));
        }
        if config.rate_limit.max_requests == 0 {
            errors.push(ValidationError::new("rate_limit.max_requests", "must be greater than zero"));
        }
    }

    if config.cache.max_entries == 0 {
        errors.push(ValidationError::new("cache.max_entries", "must be greater than zero"));
    }
    if config.cache.sweep_interval_secs == 0 {
        errors.push(ValidationError::new("cache.sweep_interval_secs", "must be greater than zero"));
    }
    if config.cache.store_timeout_ms == 0 {
        errors.push(ValidationError::new("cache.store_timeout_ms", "must be greater than zero"));
    }

    let mut names = HashSet::new();
    let mut prefixes = HashSet::new();
    for (i, route) in config.routes.iter().enumerate() {
        let field = format!("routes[{}]", i);
        if !names.insert(route.name.as_str()) {
            errors.push(ValidationError::new(
                format!("{}.name", field),
                format!("duplicate route name '{}'", route.name),
            ));
        }
        if !prefixes.insert(normalize_prefix(&route.path_prefix)) {
            errors.push(ValidationError::new(
                format!("{}.path_prefix", field),
                format!("prefix '{}' is configured more than once", route.path_prefix),
            ));
        }
        validate_route(&field, route, &mut errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_route(field: &str, route: &RouteConfig, errors: &mut Vec<ValidationError>) {
    if route.name.trim().is_empty() {
        errors.push(ValidationError::new(format!("{}.name", field), "must not be empty"));
    }
    if !route.path_prefix.starts_with('/') {
        errors.push(ValidationError::new(
            format!("{}.path_prefix", field),
            format!("'{}' must start with '/'", route.path_prefix),
        ));
    }
    if let Some(rewrite) = &route.rewrite {
        if !rewrite.starts_with('/') {
            errors.push(ValidationError::new(
                format!("{}.rewrite", field),
                format!("'{}' must start with '/'", rewrite),
            ));
        }
    }
    if route.cache_ttl_secs == Some(0) {
        errors.push(ValidationError::new(
            format!("{}.cache_ttl_secs", field),
            "must be greater than zero; omit it to disable caching",
        ));
    }
    if let Some(limit) = route.rate_limit {
        if limit.window_secs == 0 || limit.max_requests == 0 {
            errors.push(ValidationError::new(
                format!("{}.rate_limit", field),
                "window_secs and max_requests must be greater than zero",
            ));
        }
    }
    if let Err(message) = check_backend_url(&route.backend) {
        errors.push(ValidationError::new(format!("{}.backend", field), message));
    }
}

/// Backend must be a bare `http://host[:port]` base URL.
pub(crate) fn check_backend_url(raw: &str) -> Result<Url, String> {
    let url = Url::parse(raw).map_err(|e| format!("'{}' is not a valid URL: {}", raw, e))?;
    if url.scheme() != "http" {
        return Err(format!("'{}' must use the http scheme", raw));
    }
    if url.host_str().is_none() {
        return Err(format!("'{}' has no host", raw));
    }
    if url.path() != "/" || url.query().is_some() || url.fragment().is_some() {
        return Err(format!("'{}' must not carry a path, query or fragment", raw));
    }
    Ok(url)
}

fn normalize_prefix(prefix: &str) -> &str {
    if prefix.len() > 1 {
        prefix.trim_end_matches('/')
    } else {
        prefix
    }
}
