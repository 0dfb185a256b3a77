//! Rate limiting for the login endpoint.
//!
//! Uses a token bucket per client IP to slow down password guessing.

use axum::{
    Json,
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{Quota, RateLimiter, clock::DefaultClock, state::keyed::DefaultKeyedStateStore};
use serde_json::json;
use std::{num::NonZeroU32, sync::Arc};
use tracing::warn;

use crate::auth::client_ip;

/// Per-IP rate limiter.
pub type IpLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

/// Default number of login attempts allowed per IP per minute.
pub const DEFAULT_LOGIN_ATTEMPTS_PER_MINUTE: NonZeroU32 = NonZeroU32::new(10).unwrap();

/// Rate limiting configuration for authentication endpoints.
#[derive(Clone)]
pub struct RateLimitConfig {
    /// Per-IP limiter for login attempts
    pub login: Arc<IpLimiter>,
    /// Key clients by `X-Forwarded-For` instead of the peer address
    pub trust_forwarded_for: bool,
}

impl RateLimitConfig {
    pub fn new(login_per_minute: NonZeroU32, trust_forwarded_for: bool) -> Self {
        Self {
            login: Arc::new(RateLimiter::keyed(Quota::per_minute(login_per_minute))),
            trust_forwarded_for,
        }
    }
}

/// Middleware for rate limiting login attempts.
///
/// Requests whose client IP cannot be determined share a single bucket.
pub async fn rate_limit_login(
    State(config): State<Arc<RateLimitConfig>>,
    request: Request,
    next: Next,
) -> Response {
    let ip = client_ip(&request, config.trust_forwarded_for).unwrap_or_else(|| "unknown".into());

    match config.login.check_key(&ip) {
        Ok(_) => next.run(request).await,
        Err(_) => {
            warn!(ip = %ip, "Login rate limit exceeded");
            (
                StatusCode::TOO_MANY_REQUESTS,
                Json(json!({ "error": "Too many login attempts. Please wait before trying again." })),
            )
                .into_response()
        }
    }
}
