//! Account registration.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use crate::accounts::{self, RegisterRequest, RegisteredUser};
use crate::context::AppContext;
use crate::error::{ApiJson, AppError};
use crate::routes::blocking;

/// POST /api/v1/register
#[utoipa::path(
    post,
    path = "/api/v1/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = RegisteredUser),
        (status = 400, description = "Invalid or duplicate fields"),
        (status = 429, description = "Too many requests")
    )
)]
pub async fn register(
    State(ctx): State<AppContext>,
    ApiJson(payload): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisteredUser>), AppError> {
    let created = blocking(move || accounts::register(&ctx, payload)).await?;
    Ok((StatusCode::CREATED, Json(created)))
}
