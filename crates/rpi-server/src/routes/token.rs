//! Token issue and refresh.

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use rpi_core::FieldErrors;

use crate::accounts;
use crate::context::AppContext;
use crate::error::{ApiJson, AppError};
use crate::routes::blocking;

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct TokenRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct TokenPairResponse {
    pub access: String,
    pub refresh: String,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct RefreshRequest {
    pub refresh: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct AccessTokenResponse {
    pub access: String,
}

/// Record a missing or empty field.
fn require(errors: &mut FieldErrors, field: &str, value: Option<String>) -> String {
    match value {
        Some(v) if !v.is_empty() => v,
        Some(_) => {
            errors.add(field, "This field may not be blank.");
            String::new()
        }
        None => {
            errors.add(field, "This field is required.");
            String::new()
        }
    }
}

/// POST /api/v1/token
#[utoipa::path(
    post,
    path = "/api/v1/token",
    request_body = TokenRequest,
    responses(
        (status = 200, description = "Token pair issued", body = TokenPairResponse),
        (status = 400, description = "Missing fields"),
        (status = 401, description = "Invalid credentials"),
        (status = 429, description = "Too many requests")
    )
)]
pub async fn obtain_token(
    State(ctx): State<AppContext>,
    ApiJson(payload): ApiJson<TokenRequest>,
) -> Result<Json<TokenPairResponse>, AppError> {
    let mut errors = FieldErrors::new();
    let username = require(&mut errors, "username", payload.username);
    let password = require(&mut errors, "password", payload.password);
    errors.into_result()?;

    let pair = blocking(move || accounts::login(&ctx, &username, &password)).await?;
    Ok(Json(TokenPairResponse {
        access: pair.access,
        refresh: pair.refresh,
    }))
}

/// POST /api/v1/token/refresh
#[utoipa::path(
    post,
    path = "/api/v1/token/refresh",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "New access token", body = AccessTokenResponse),
        (status = 400, description = "Missing refresh token"),
        (status = 401, description = "Refresh token invalid or expired")
    )
)]
pub async fn refresh_token(
    State(ctx): State<AppContext>,
    ApiJson(payload): ApiJson<RefreshRequest>,
) -> Result<Json<AccessTokenResponse>, AppError> {
    let mut errors = FieldErrors::new();
    let refresh = require(&mut errors, "refresh", payload.refresh);
    errors.into_result()?;

    let (_, access) = ctx.tokens.refresh(&refresh)?;
    Ok(Json(AccessTokenResponse { access }))
}
