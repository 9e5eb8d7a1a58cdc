//! Authentication and rate limiting middleware.

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use dashmap::DashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Shared secret the external scheduler must present on the trigger route.
#[derive(Clone)]
pub struct CheckSecret(pub Arc<String>);

/// Middleware that requires the shared check secret.
///
/// Accepts `X-Check-Secret: <secret>` or `Authorization: Bearer <secret>`.
pub async fn require_check_secret(
    State(secret): State<CheckSecret>,
    request: Request,
    next: Next,
) -> Response {
    let presented = request
        .headers()
        .get("X-Check-Secret")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .or_else(|| {
            request
                .headers()
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.strip_prefix("Bearer "))
                .map(|s| s.trim().to_string())
        });

    match presented {
        Some(token) if token == *secret.0 => next.run(request).await,
        _ => (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({
                "error": "Missing or invalid check secret",
                "hint": "Send header: X-Check-Secret: <secret>"
            })),
        )
            .into_response(),
    }
}

/// Simple per-IP rate limiter. Owned state, not a module global, so each
/// router instance carries its own request log.
#[derive(Clone)]
pub struct RateLimiter {
    requests: Arc<DashMap<String, Vec<Instant>>>,
    last_cleanup: Arc<Mutex<Instant>>,
    cleanup_interval: Duration,
    max_rps: u32,
    enabled: bool,
    trust_proxy: bool,
}

impl RateLimiter {
    pub fn new(max_rps: u32, enabled: bool, trust_proxy: bool) -> Self {
        Self {
            requests: Arc::new(DashMap::new()),
            last_cleanup: Arc::new(Mutex::new(Instant::now())),
            cleanup_interval: Duration::from_secs(60),
            max_rps,
            enabled,
            trust_proxy,
        }
    }

    /// Check if request should be allowed. Returns true if allowed.
    pub fn check(&self, ip: &str) -> bool {
        if !self.enabled {
            return true;
        }

        let now = Instant::now();
        let window = Duration::from_secs(1);
        let do_cleanup = {
            let mut last_cleanup = self
                .last_cleanup
                .lock()
                .expect("Rate limiter cleanup lock poisoned");
            if now.duration_since(*last_cleanup) >= self.cleanup_interval {
                *last_cleanup = now;
                true
            } else {
                false
            }
        };
        if do_cleanup {
            self.purge_stale_entries(now, window);
        }

        let mut entry = self.requests.entry(ip.to_string()).or_default();
        let timestamps = entry.value_mut();

        timestamps.retain(|t| now.duration_since(*t) < window);

        if timestamps.len() < self.max_rps as usize {
            timestamps.push(now);
            true
        } else {
            false
        }
    }

    fn purge_stale_entries(&self, now: Instant, window: Duration) {
        let stale: Vec<String> = self
            .requests
            .iter()
            .filter(|entry| entry.value().iter().all(|t| now.duration_since(*t) >= window))
            .map(|entry| entry.key().clone())
            .collect();
        for ip in stale {
            self.requests.remove(&ip);
        }
    }
}

/// Rate limiting middleware.
pub async fn rate_limit(
    State(limiter): State<RateLimiter>,
    request: Request,
    next: Next,
) -> Response {
    let ip = if limiter.trust_proxy {
        request
            .headers()
            .get("X-Forwarded-For")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.split(',').next().unwrap_or("unknown").trim().to_string())
    } else {
        None
    }
    .or_else(|| {
        request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|info| info.0.ip().to_string())
    })
    .unwrap_or_else(|| "unknown".to_string());

    if limiter.check(&ip) {
        next.run(request).await
    } else {
        (
            StatusCode::TOO_MANY_REQUESTS,
            Json(serde_json::json!({
                "error": "Rate limit exceeded",
                "retry_after": "1 second"
            })),
        )
            .into_response()
    }
}
