//! Axum router construction.
//!
//! Builds the full application router with the API routes, middleware
//! layers, stored media, and the OpenAPI docs.

use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{get, post, MethodRouter};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use crate::context::AppContext;
use crate::middleware::auth::auth_middleware;
use crate::middleware::rate_limit::auth_rate_limit;
use crate::middleware::request_id::request_id_middleware;
use crate::routes;
use crate::storage::{MEDIA_URL_PREFIX, UPLOADS_DIR};

/// Request bodies beyond the base64 payload itself (JSON framing, data URI
/// prefix, other fields).
const BODY_OVERHEAD: usize = 64 * 1024;

#[derive(OpenApi)]
#[openapi(
    paths(
        routes::health::health_check,
        routes::accounts::register,
        routes::token::obtain_token,
        routes::token::refresh_token,
        routes::images::upload_image,
        routes::images::list_images,
    ),
    components(schemas(
        routes::health::HealthResponse,
        crate::accounts::RegisterRequest,
        crate::accounts::RegisteredUser,
        routes::token::TokenRequest,
        routes::token::TokenPairResponse,
        routes::token::RefreshRequest,
        routes::token::AccessTokenResponse,
        crate::images::UploadImageRequest,
        crate::images::ImageView,
    )),
    modifiers(&BearerAuth)
)]
struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

/// Register `path` and `path/` with the same handler.
fn with_slash(
    router: Router<AppContext>,
    path: &str,
    handler: MethodRouter<AppContext>,
) -> Router<AppContext> {
    router
        .route(path, handler.clone())
        .route(&format!("{path}/"), handler)
}

/// Largest request body accepted, sized to the base64 form of the biggest
/// allowed image.
pub fn body_limit(max_image_bytes: usize) -> usize {
    max_image_bytes
        .saturating_add(2)
        .saturating_div(3)
        .saturating_mul(4)
        .saturating_add(BODY_OVERHEAD)
}

/// Build the complete Axum router.
pub fn build_router(ctx: AppContext) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Unauthenticated, throttled.
    let mut auth_routes = Router::new();
    auth_routes = with_slash(auth_routes, "/register", post(routes::accounts::register));
    auth_routes = with_slash(auth_routes, "/token", post(routes::token::obtain_token));
    auth_routes = with_slash(auth_routes, "/token/refresh", post(routes::token::refresh_token));
    let auth_routes =
        auth_routes.route_layer(middleware::from_fn_with_state(ctx.clone(), auth_rate_limit));

    // Bearer token required.
    let mut protected_routes = Router::new();
    protected_routes = with_slash(protected_routes, "/upload", post(routes::images::upload_image));
    protected_routes = with_slash(protected_routes, "/images", get(routes::images::list_images));
    let protected_routes =
        protected_routes.route_layer(middleware::from_fn_with_state(ctx.clone(), auth_middleware));

    let api = auth_routes.merge(protected_routes);

    let uploads_dir = ctx.blobs.root().join(UPLOADS_DIR);
    tracing::info!("Serving uploads from {}", uploads_dir.display());

    Router::new()
        .route("/health", get(routes::health::health_check))
        .nest("/api/v1", api)
        .nest_service(
            &format!("{MEDIA_URL_PREFIX}/{UPLOADS_DIR}"),
            ServeDir::new(uploads_dir),
        )
        .merge(SwaggerUi::new("/api-docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(DefaultBodyLimit::max(body_limit(ctx.config.uploads.max_bytes)))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}
