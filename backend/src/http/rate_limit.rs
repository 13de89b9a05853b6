//! Fixed-window rate limiting keyed by client IP and request path.

use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use parking_lot::Mutex;
use serde_json::json;
use std::collections::HashMap;

use super::state::AppState;
use crate::config::RateLimitSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitCategory {
    Default,
    Auth,
    Payment,
    Api,
    Webhook,
    Admin,
}

impl RateLimitCategory {
    /// Category for a request path. Webhooks win over payments.
    pub fn for_path(path: &str) -> Self {
        if path.contains("/webhook") {
            RateLimitCategory::Webhook
        } else if path.contains("/auth") {
            RateLimitCategory::Auth
        } else if path.starts_with("/v1/payments") {
            RateLimitCategory::Payment
        } else if path.starts_with("/v1/maintenance") || path.starts_with("/v1/admin") {
            RateLimitCategory::Admin
        } else if path.starts_with("/v1/") {
            RateLimitCategory::Api
        } else {
            RateLimitCategory::Default
        }
    }

    pub fn limit(self, settings: &RateLimitSettings) -> u32 {
        match self {
            RateLimitCategory::Default => settings.default,
            RateLimitCategory::Auth => settings.auth,
            RateLimitCategory::Payment => settings.payment,
            RateLimitCategory::Api => settings.api,
            RateLimitCategory::Webhook => settings.webhook,
            RateLimitCategory::Admin => settings.admin,
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            RateLimitCategory::Auth => "Demasiados intentos de login",
            RateLimitCategory::Payment => "Demasiadas solicitudes de pago",
            _ => "Too many requests",
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Window {
    count: u32,
    reset_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    pub reset_at: DateTime<Utc>,
}

impl RateDecision {
    /// Whole seconds until the window resets, rounded up.
    pub fn retry_after_secs(&self, now: DateTime<Utc>) -> i64 {
        let millis = (self.reset_at - now).num_milliseconds().max(0);
        (millis + 999) / 1000
    }
}

/// In-memory counters; one window per key.
#[derive(Debug, Default)]
pub struct RateLimiter {
    windows: Mutex<HashMap<String, Window>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one request for `key`. The first request after a window
    /// expires opens a new one.
    pub fn check(
        &self,
        key: &str,
        limit: u32,
        window: Duration,
        now: DateTime<Utc>,
    ) -> RateDecision {
        let mut windows = self.windows.lock();
        let state = windows
            .entry(key.to_string())
            .and_modify(|w| {
                if now > w.reset_at {
                    *w = Window {
                        count: 0,
                        reset_at: now + window,
                    };
                }
            })
            .or_insert(Window {
                count: 0,
                reset_at: now + window,
            });
        state.count += 1;

        RateDecision {
            allowed: state.count <= limit,
            limit,
            remaining: limit.saturating_sub(state.count),
            reset_at: state.reset_at,
        }
    }

    /// Drop expired windows; returns how many were removed.
    pub fn cleanup(&self, now: DateTime<Utc>) -> usize {
        let mut windows = self.windows.lock();
        let before = windows.len();
        windows.retain(|_, w| now <= w.reset_at);
        before - windows.len()
    }

    pub fn tracked_keys(&self) -> usize {
        self.windows.lock().len()
    }
}

/// First `x-forwarded-for` entry, else `x-real-ip`, else `"unknown"`.
pub fn client_ip(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
        })
        .unwrap_or("unknown")
        .to_string()
}

fn set_headers(headers: &mut HeaderMap, decision: &RateDecision) {
    let pairs = [
        ("x-ratelimit-limit", decision.limit.to_string()),
        ("x-ratelimit-remaining", decision.remaining.to_string()),
        (
            "x-ratelimit-reset",
            decision.reset_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        ),
    ];
    for (name, value) in pairs {
        if let Ok(value) = HeaderValue::from_str(&value) {
            headers.insert(name, value);
        }
    }
}

/// Axum middleware enforcing the per-category limits from the config.
pub async fn rate_limit(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let settings = &state.config.rate_limit;
    if !settings.enabled {
        return next.run(request).await;
    }

    let path = request.uri().path().to_string();
    let category = RateLimitCategory::for_path(&path);
    let key = format!("{}:{}", client_ip(request.headers()), path);
    let now = Utc::now();
    let decision = state.rate_limiter.check(
        &key,
        category.limit(settings),
        Duration::seconds(settings.window_secs as i64),
        now,
    );

    if !decision.allowed {
        log::warn!("Rate limit exceeded for {}", key);
        let body = json!({
            "error": category.message(),
            "retryAfter": decision.retry_after_secs(now),
        });
        let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
        set_headers(response.headers_mut(), &decision);
        return response;
    }

    let mut response = next.run(request).await;
    set_headers(response.headers_mut(), &decision);
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories() {
        assert_eq!(
            RateLimitCategory::for_path("/v1/payments/checkout"),
            RateLimitCategory::Payment
        );
        assert_eq!(
            RateLimitCategory::for_path("/v1/payments/webhook"),
            RateLimitCategory::Webhook
        );
        assert_eq!(
            RateLimitCategory::for_path("/v1/maintenance/capacity"),
            RateLimitCategory::Admin
        );
        assert_eq!(
            RateLimitCategory::for_path("/v1/products"),
            RateLimitCategory::Api
        );
        assert_eq!(
            RateLimitCategory::for_path("/health"),
            RateLimitCategory::Default
        );
    }

    #[test]
    fn test_fixed_window() {
        let limiter = RateLimiter::new();
        let now = Utc::now();
        let window = Duration::seconds(60);

        let first = limiter.check("1.2.3.4:/x", 2, window, now);
        assert!(first.allowed);
        assert_eq!(first.remaining, 1);
        assert!(limiter.check("1.2.3.4:/x", 2, window, now).allowed);

        let blocked = limiter.check("1.2.3.4:/x", 2, window, now);
        assert!(!blocked.allowed);
        assert_eq!(blocked.remaining, 0);
        assert_eq!(blocked.retry_after_secs(now), 60);

        // Other keys are independent.
        assert!(limiter.check("5.6.7.8:/x", 2, window, now).allowed);

        let later = now + Duration::seconds(61);
        let reopened = limiter.check("1.2.3.4:/x", 2, window, later);
        assert!(reopened.allowed);
        assert_eq!(reopened.remaining, 1);
    }

    #[test]
    fn test_cleanup_drops_expired_windows() {
        let limiter = RateLimiter::new();
        let now = Utc::now();
        limiter.check("a", 5, Duration::seconds(10), now);
        limiter.check("b", 5, Duration::seconds(120), now);
        assert_eq!(limiter.cleanup(now + Duration::seconds(30)), 1);
        assert_eq!(limiter.tracked_keys(), 1);
    }

    #[test]
    fn test_client_ip_resolution() {
        let mut headers = HeaderMap::new();
        assert_eq!(client_ip(&headers), "unknown");
        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.2"));
        assert_eq!(client_ip(&headers), "10.0.0.2");
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.7, 10.0.0.1"),
        );
        assert_eq!(client_ip(&headers), "203.0.113.7");
    }
}
