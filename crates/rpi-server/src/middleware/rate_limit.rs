//! Governor-based rate limiting for the unauthenticated auth routes.

use std::num::NonZeroU32;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};

use crate::context::AppContext;
use crate::error::error_response;

/// A shared rate limiter instance.
pub type SharedLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

const FALLBACK_PER_MINUTE: NonZeroU32 = NonZeroU32::MIN.saturating_add(29);

/// Create a rate limiter with the given requests-per-minute quota.
///
/// A quota of zero falls back to 30 per minute.
pub fn create_limiter(requests_per_minute: u32) -> SharedLimiter {
    let per_minute = NonZeroU32::new(requests_per_minute).unwrap_or(FALLBACK_PER_MINUTE);
    Arc::new(RateLimiter::direct(Quota::per_minute(per_minute)))
}

/// Returns 429 Too Many Requests once the auth limiter is exhausted.
pub async fn auth_rate_limit(
    State(ctx): State<AppContext>,
    request: Request<axum::body::Body>,
    next: Next,
) -> Response {
    if ctx.auth_limiter.check().is_err() {
        tracing::warn!(path = %request.uri().path(), "Auth rate limit exceeded");
        return error_response(
            StatusCode::TOO_MANY_REQUESTS,
            "rate_limited",
            "Rate limit exceeded".into(),
            None,
        );
    }

    next.run(request).await
}
