//! Image upload and listing for the authenticated user.

use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};

use crate::accounts::AuthUser;
use crate::context::AppContext;
use crate::error::{ApiJson, AppError};
use crate::images::{self, ImageView, UploadImageRequest};
use crate::routes::blocking;

/// POST /api/v1/upload
#[utoipa::path(
    post,
    path = "/api/v1/upload",
    request_body = UploadImageRequest,
    security(("bearer" = [])),
    responses(
        (status = 201, description = "Image stored", body = ImageView),
        (status = 400, description = "Image missing or not a valid image"),
        (status = 401, description = "Missing or invalid access token")
    )
)]
pub async fn upload_image(
    State(ctx): State<AppContext>,
    Extension(user): Extension<AuthUser>,
    ApiJson(payload): ApiJson<UploadImageRequest>,
) -> Result<(StatusCode, Json<ImageView>), AppError> {
    let view = blocking(move || images::upload_image(&ctx, &user, payload)).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// GET /api/v1/images
#[utoipa::path(
    get,
    path = "/api/v1/images",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Caller's images, newest first", body = Vec<ImageView>),
        (status = 401, description = "Missing or invalid access token")
    )
)]
pub async fn list_images(
    State(ctx): State<AppContext>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<ImageView>>, AppError> {
    let views = blocking(move || images::list_images(&ctx, &user)).await?;
    Ok(Json(views))
}
