//! Per-client rate limiting for `/api`.
//!
//! Flow Overview: derive a client key (trusted proxy hop or peer address),
//! count requests in a fixed window, and answer `429` once the window is
//! spent. Prefixes marked exempt in the [`RouteTable`] are never counted.

use axum::{
    Json,
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};
use tracing::debug;

use super::routes::RouteTable;

const DEFAULT_WINDOW: Duration = Duration::from_secs(15 * 60);
const DEFAULT_MAX_REQUESTS: u32 = 300;
const DEFAULT_MAX_CLIENTS: usize = 100_000;
// Expired windows are dropped at most once per interval (or per window, if shorter).
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);
// Clients first seen while the table is full share this window.
const OVERFLOW_KEY: &str = "overflow";

const HEADER_LIMIT: HeaderName = HeaderName::from_static("ratelimit-limit");
const HEADER_REMAINING: HeaderName = HeaderName::from_static("ratelimit-remaining");
const HEADER_RESET: HeaderName = HeaderName::from_static("ratelimit-reset");

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed {
        limit: u32,
        remaining: u32,
        reset_after: Duration,
    },
    Limited {
        limit: u32,
        reset_after: Duration,
    },
    Unlimited,
}

pub trait RateLimiter: Send + Sync {
    fn check(&self, key: &str) -> RateLimitDecision;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoopRateLimiter;

impl RateLimiter for NoopRateLimiter {
    fn check(&self, _key: &str) -> RateLimitDecision {
        RateLimitDecision::Unlimited
    }
}

#[derive(Debug)]
struct Window {
    started: Instant,
    count: u32,
}

#[derive(Debug)]
struct Windows {
    entries: HashMap<String, Window>,
    last_sweep: Instant,
}

/// Fixed-window counter per client key.
///
/// At most `max_clients` keys are tracked (plus the shared overflow window),
/// so the sweep under the lock stays bounded.
#[derive(Debug)]
pub struct FixedWindowRateLimiter {
    window: Duration,
    max_requests: u32,
    max_clients: usize,
    windows: Mutex<Windows>,
}

impl FixedWindowRateLimiter {
    #[must_use]
    pub fn new(window: Duration, max_requests: u32) -> Self {
        Self {
            window,
            max_requests,
            max_clients: DEFAULT_MAX_CLIENTS,
            windows: Mutex::new(Windows {
                entries: HashMap::new(),
                last_sweep: Instant::now(),
            }),
        }
    }

    #[cfg(test)]
    fn with_max_clients(mut self, max_clients: usize) -> Self {
        self.max_clients = max_clients.max(1);
        self
    }

    fn check_at(&self, key: &str, now: Instant) -> RateLimitDecision {
        let mut windows = match self.windows.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if now.duration_since(windows.last_sweep) >= self.window.min(SWEEP_INTERVAL) {
            let window = self.window;
            windows
                .entries
                .retain(|_, entry| now.duration_since(entry.started) < window);
            windows.last_sweep = now;
        }

        let key = if windows.entries.contains_key(key)
            || windows.entries.len() < self.max_clients
        {
            key
        } else {
            debug!("rate limiter full, counting {key} in the overflow window");
            OVERFLOW_KEY
        };

        let entry = windows.entries.entry(key.to_string()).or_insert(Window {
            started: now,
            count: 0,
        });
        if now.duration_since(entry.started) >= self.window {
            entry.started = now;
            entry.count = 0;
        }

        let reset_after = self
            .window
            .saturating_sub(now.duration_since(entry.started));

        if entry.count >= self.max_requests {
            return RateLimitDecision::Limited {
                limit: self.max_requests,
                reset_after,
            };
        }

        entry.count += 1;
        RateLimitDecision::Allowed {
            limit: self.max_requests,
            remaining: self.max_requests - entry.count,
            reset_after,
        }
    }

    #[cfg(test)]
    fn tracked_clients(&self) -> usize {
        self.windows
            .lock()
            .map(|windows| windows.entries.len())
            .unwrap_or_default()
    }
}

impl Default for FixedWindowRateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW, DEFAULT_MAX_REQUESTS)
    }
}

impl RateLimiter for FixedWindowRateLimiter {
    fn check(&self, key: &str) -> RateLimitDecision {
        self.check_at(key, Instant::now())
    }
}

#[derive(Clone)]
pub struct RateLimitState {
    pub limiter: Arc<dyn RateLimiter>,
    pub routes: RouteTable,
}

/// Client identity for rate limiting.
///
/// One proxy hop is trusted: the right-most `x-forwarded-for` entry is the
/// address that proxy saw.
fn client_key(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.rsplit(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .map(str::to_string)
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

fn insert_number(headers: &mut HeaderMap, name: HeaderName, value: u64) {
    headers.insert(name, HeaderValue::from(value));
}

pub async fn rate_limit(
    State(state): State<RateLimitState>,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path();
    if !path.starts_with("/api") || !state.routes.is_rate_limited(path) {
        return next.run(request).await;
    }

    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0);
    let key = client_key(request.headers(), peer);

    match state.limiter.check(&key) {
        RateLimitDecision::Unlimited => next.run(request).await,
        RateLimitDecision::Allowed {
            limit,
            remaining,
            reset_after,
        } => {
            let mut response = next.run(request).await;
            let headers = response.headers_mut();
            insert_number(headers, HEADER_LIMIT, u64::from(limit));
            insert_number(headers, HEADER_REMAINING, u64::from(remaining));
            insert_number(headers, HEADER_RESET, reset_after.as_secs());
            response
        }
        RateLimitDecision::Limited { limit, reset_after } => {
            debug!("rate limit exceeded for {key}");
            let mut response = (
                StatusCode::TOO_MANY_REQUESTS,
                Json(json!({ "ok": false, "message": "too_many_requests" })),
            )
                .into_response();
            let headers = response.headers_mut();
            insert_number(headers, HEADER_LIMIT, u64::from(limit));
            insert_number(headers, HEADER_REMAINING, 0);
            insert_number(headers, HEADER_RESET, reset_after.as_secs());
            insert_number(headers, axum::http::header::RETRY_AFTER, reset_after.as_secs());
            response
        }
    }
}
