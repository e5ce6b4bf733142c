//! Bearer token authentication.
//!
//! Protected routes accept only `Authorization: Bearer <access-token>`. A
//! token that verifies is resolved to its account; the resulting
//! [`AuthUser`] is inserted into request extensions for the handlers.

use axum::extract::State;
use axum::http::{header, HeaderMap, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use rpi_core::{Error, Result};

use crate::accounts::{self, AuthUser};
use crate::context::AppContext;
use crate::error::AppError;
use crate::routes::blocking;
use crate::token::{TokenKind, INVALID_TOKEN};

const MISSING_CREDENTIALS: &str = "Authentication credentials were not provided.";

/// Pull the bearer token out of the `Authorization` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Resolve request headers to the authenticated user.
pub fn authenticate(ctx: &AppContext, headers: &HeaderMap) -> Result<AuthUser> {
    let token =
        bearer_token(headers).ok_or_else(|| Error::Unauthorized(MISSING_CREDENTIALS.into()))?;
    let claims = ctx.tokens.verify(token, TokenKind::Access)?;

    accounts::resolve_user(&ctx.db, claims.user_id)?.ok_or_else(|| {
        tracing::debug!(user_id = %claims.user_id, "Token for a user that no longer exists");
        Error::Unauthorized(INVALID_TOKEN.into())
    })
}

/// Authentication middleware. Applied to protected routes only. The user
/// lookup runs on the blocking pool.
pub async fn auth_middleware(
    State(ctx): State<AppContext>,
    mut request: Request<axum::body::Body>,
    next: Next,
) -> Response {
    let headers = request.headers().clone();
    match blocking(move || authenticate(&ctx, &headers)).await {
        Ok(user) => {
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Err(e) => AppError::from(e).into_response(),
    }
}
