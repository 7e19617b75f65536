//! Fixed-window rate limiting.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::config::RateLimitConfig;
use crate::routing::{RateLimitPolicy, RouteRule, RouteTable};

/// Counting state for one client.
#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u64,
}

impl Window {
    fn is_expired(&self, now: Instant, size: Duration) -> bool {
        now.saturating_duration_since(self.started) >= size
    }

    fn remaining_time(&self, now: Instant, size: Duration) -> Duration {
        size.saturating_sub(now.saturating_duration_since(self.started))
    }
}

/// Outcome of a limiter check. A denial is a defined result, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed {
        limit: u64,
        remaining: u64,
        reset_after: Duration,
    },
    Denied {
        limit: u64,
        retry_after: Duration,
    },
}

impl RateLimitDecision {
    /// Whether the request may proceed.
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateLimitDecision::Allowed { .. })
    }
}

/// Per-client fixed-window counter.
///
/// The window table is a sharded map, so concurrent checks for different
/// clients rarely contend and checks for one client are serialized.
#[derive(Debug)]
pub struct FixedWindowLimiter {
    windows: DashMap<String, Window>,
    window: Duration,
    max_requests: u64,
}

impl FixedWindowLimiter {
    /// Create a limiter allowing `max_requests` per client per `window`.
    pub fn new(window: Duration, max_requests: u64) -> Self {
        Self {
            windows: DashMap::new(),
            window,
            max_requests,
        }
    }

    /// Length of one counting window.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Requests allowed per client within one window.
    pub fn max_requests(&self) -> u64 {
        self.max_requests
    }

    /// Check and count one request from `client_id` now.
    pub fn check(&self, client_id: &str) -> RateLimitDecision {
        self.check_at(client_id, Instant::now())
    }

    /// Check and count one request from `client_id` observed at `now`.
    pub fn check_at(&self, client_id: &str, now: Instant) -> RateLimitDecision {
        let mut entry = self
            .windows
            .entry(client_id.to_string())
            .or_insert(Window { started: now, count: 0 });
        let window = entry.value_mut();

        if window.is_expired(now, self.window) {
            *window = Window { started: now, count: 0 };
        }

        if window.count >= self.max_requests {
            return RateLimitDecision::Denied {
                limit: self.max_requests,
                retry_after: window.remaining_time(now, self.window),
            };
        }

        window.count += 1;
        RateLimitDecision::Allowed {
            limit: self.max_requests,
            remaining: self.max_requests - window.count,
            reset_after: window.remaining_time(now, self.window),
        }
    }

    /// Drop windows that have expired. Returns how many were removed.
    pub fn purge_expired(&self, now: Instant) -> usize {
        let before = self.windows.len();
        self.windows.retain(|_, w| !w.is_expired(now, self.window));
        before.saturating_sub(self.windows.len())
    }

    /// Number of clients with a window, expired ones included.
    pub fn tracked_clients(&self) -> usize {
        self.windows.len()
    }
}

/// The shared limiter plus one isolated limiter per route that asks for it.
#[derive(Debug)]
pub struct RateLimiters {
    shared: Arc<FixedWindowLimiter>,
    per_route: HashMap<String, Arc<FixedWindowLimiter>>,
    message: String,
}

impl RateLimiters {
    /// Build the shared limiter and one limiter per route with its own policy.
    pub fn from_config(config: &RateLimitConfig, routes: &RouteTable) -> Self {
        let shared = Arc::new(FixedWindowLimiter::new(
            Duration::from_secs(config.window_secs),
            config.max_requests,
        ));
        let per_route = routes
            .rules()
            .iter()
            .filter_map(|rule| match rule.rate_limit {
                RateLimitPolicy::RouteSpecific { window, max_requests } => Some((
                    rule.name.clone(),
                    Arc::new(FixedWindowLimiter::new(window, max_requests)),
                )),
                RateLimitPolicy::Shared => None,
            })
            .collect();

        Self {
            shared,
            per_route,
            message: config.message.clone(),
        }
    }

    /// Limiter guarding a request; unmatched requests count against the shared one.
    pub fn for_route(&self, route: Option<&RouteRule>) -> &Arc<FixedWindowLimiter> {
        route
            .and_then(|rule| self.per_route.get(&rule.name))
            .unwrap_or(&self.shared)
    }

    /// Body text for 429 responses.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Sweep every limiter. Returns the number of windows removed.
    pub fn purge_expired(&self, now: Instant) -> usize {
        self.per_route
            .values()
            .chain(std::iter::once(&self.shared))
            .map(|limiter| limiter.purge_expired(now))
            .sum()
    }

    /// Shortest window among all limiters, used as the sweep interval.
    pub fn sweep_interval(&self) -> Duration {
        self.per_route
            .values()
            .map(|l| l.window())
            .fold(self.shared.window(), |a, b| a.min(b))
    }
}
