//! Configuration loading from disk and the environment.

use std::fs;
use std::path::Path;

use crate::config::schema::{CacheStoreKind, ProxyConfig};
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load, override from the process environment, and validate.
///
/// Without a path the built-in route table is used.
pub fn load_config(path: Option<&Path>) -> Result<ProxyConfig, ConfigError> {
    let mut config = match path {
        Some(path) => parse_config(&fs::read_to_string(path)?)?,
        None => ProxyConfig::with_builtin_routes(),
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());

    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Parse a TOML document without validating it.
pub fn parse_config(content: &str) -> Result<ProxyConfig, ConfigError> {
    Ok(toml::from_str(content)?)
}

/// Apply value-only overrides.
///
/// - `PORT` rebinds the listener on all interfaces.
/// - `REDIS_URL`, or `REDIS_HOST` with optional `REDIS_PORT`, moves the cache to Redis.
/// - `<ROUTE_NAME>_BACKEND_URL` replaces a route's backend.
pub fn apply_env_overrides<F>(config: &mut ProxyConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(port) = lookup("PORT") {
        config.listener.bind_address = format!("0.0.0.0:{}", port.trim());
    }

    let redis_url = lookup("REDIS_URL").or_else(|| {
        lookup("REDIS_HOST").map(|host| {
            let port = lookup("REDIS_PORT").unwrap_or_else(|| "6379".to_string());
            format!("redis://{}:{}", host, port)
        })
    });
    if let Some(url) = redis_url {
        config.cache.store = CacheStoreKind::Redis;
        config.cache.redis_url = url;
    }

    for route in &mut config.routes {
        let key = format!("{}_BACKEND_URL", env_key(&route.name));
        if let Some(backend) = lookup(&key) {
            tracing::debug!(route = %route.name, backend = %backend, "Backend overridden from environment");
            route.backend = backend;
        }
    }
}

fn env_key(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
        .collect()
}
