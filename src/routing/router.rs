//! Route lookup.
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - Rules kept sorted by prefix length, longest first, so the first hit is
//!   the longest-prefix match
//! - Explicit `None` rather than a silent default route

use std::sync::Arc;

use crate::config::RouteConfig;
use crate::routing::rule::RouteRule;

/// The compiled route table.
#[derive(Debug, Default)]
pub struct RouteTable {
    rules: Vec<Arc<RouteRule>>,
}

impl RouteTable {
    /// Compile route configs. Fails on the first invalid route.
    pub fn from_config(routes: &[RouteConfig]) -> Result<Self, String> {
        let rules = routes
            .iter()
            .map(RouteRule::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(rules))
    }

    /// Build a table from compiled rules, longest prefix first.
    pub fn new(rules: Vec<RouteRule>) -> Self {
        let mut rules: Vec<Arc<RouteRule>> = rules.into_iter().map(Arc::new).collect();
        // Stable: equal lengths keep configuration order.
        rules.sort_by(|a, b| b.matcher.len().cmp(&a.matcher.len()));
        Self { rules }
    }

    /// Longest-prefix match for a request path.
    pub fn match_path(&self, path: &str) -> Option<Arc<RouteRule>> {
        self.rules.iter().find(|rule| rule.matches(path)).cloned()
    }

    /// Rules in match order.
    pub fn rules(&self) -> &[Arc<RouteRule>] {
        &self.rules
    }

    /// Number of routes.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether no routes are configured.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
