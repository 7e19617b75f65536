//! Cache key derivation.
//!
//! Keys cover method, normalized path and sorted query only. Headers and
//! bodies are ignored, so caching is only safe on public read routes.

use axum::http::Method;

/// Build the cache key for a request signature.
pub fn cache_key(method: &Method, path: &str, query: Option<&str>) -> String {
    let mut key = format!("{}:{}", method, normalize_path(path));
    if let Some(query) = query.map(sort_query).filter(|q| !q.is_empty()) {
        key.push('?');
        key.push_str(&query);
    }
    key
}

/// Collapse repeated slashes and drop a trailing slash (root excepted).
fn normalize_path(path: &str) -> String {
    let mut normalized = String::with_capacity(path.len() + 1);
    let mut last_was_slash = false;

    for c in path.chars() {
        if c == '/' {
            if !last_was_slash {
                normalized.push(c);
            }
            last_was_slash = true;
        } else {
            normalized.push(c);
            last_was_slash = false;
        }
    }

    if !normalized.starts_with('/') {
        normalized.insert(0, '/');
    }
    if normalized.len() > 1 && normalized.ends_with('/') {
        normalized.pop();
    }
    normalized
}

fn sort_query(query: &str) -> String {
    let mut pairs: Vec<&str> = query.split('&').filter(|p| !p.is_empty()).collect();
    pairs.sort_unstable();
    pairs.join("&")
}
