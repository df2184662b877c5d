//! Per-IP request rate limiting.
//!
//! Uses a keyed token bucket: each client IP may spend `requests` requests per
//! `window`, refilled continuously.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{Quota, RateLimiter, clock::DefaultClock, state::keyed::DefaultKeyedStateStore};
use std::{num::NonZeroU32, sync::Arc, time::Duration};
use tracing::debug;

use crate::auth::extract_client_ip;

/// Default budget: 500 requests per 15 minutes.
pub const DEFAULT_REQUESTS: NonZeroU32 = NonZeroU32::new(500).unwrap();
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(15 * 60);

/// Per-IP rate limiter.
pub type IpLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

#[derive(Clone)]
pub struct RateLimitConfig {
    pub limiter: Arc<IpLimiter>,
    /// Key clients by `X-Forwarded-For` instead of the socket address
    pub trust_forwarded_for: bool,
}

impl RateLimitConfig {
    pub fn new(requests: NonZeroU32, window: Duration, trust_forwarded_for: bool) -> Self {
        let quota = Quota::with_period(window / requests.get())
            .unwrap_or_else(|| Quota::per_second(requests))
            .allow_burst(requests);

        Self {
            limiter: Arc::new(RateLimiter::keyed(quota)),
            trust_forwarded_for,
        }
    }

    pub fn with_defaults(trust_forwarded_for: bool) -> Self {
        Self::new(DEFAULT_REQUESTS, DEFAULT_WINDOW, trust_forwarded_for)
    }
}

/// Middleware applying the per-IP limit to every route.
pub async fn rate_limit(
    State(config): State<Arc<RateLimitConfig>>,
    request: Request,
    next: Next,
) -> Response {
    let ip = match extract_client_ip(&request, config.trust_forwarded_for) {
        Ok(ip) => ip,
        Err(reason) => {
            debug!(reason, "Rejected request without client IP");
            return (StatusCode::FORBIDDEN, "Unable to determine client IP.").into_response();
        }
    };

    match config.limiter.check_key(&ip) {
        Ok(_) => next.run(request).await,
        Err(_) => (
            StatusCode::TOO_MANY_REQUESTS,
            "Too many requests. Please try again later.",
        )
            .into_response(),
    }
}
