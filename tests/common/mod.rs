//! Shared test harness for integration tests.
//!
//! Provides [`TestHarness`] which creates an in-memory DB, a temporary media
//! directory, a fast-hashing config, and the full [`AppContext`]. The
//! [`TestHarness::with_server`] constructor starts Axum on a random port for
//! HTTP-level testing.

#![allow(dead_code)]

use std::io::Cursor;
use std::net::SocketAddr;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde_json::{json, Value};

use rpi_core::config::Config;
use rpi_db::pool::{init_memory_pool, DbPool, PooledConnection};
use rpi_server::context::AppContext;
use rpi_server::router::build_router;

pub const PASSWORD: &str = "correct-horse-battery";

/// Test harness wrapping a fully-constructed [`AppContext`] backed by an
/// in-memory database.
pub struct TestHarness {
    pub ctx: AppContext,
    pub db: DbPool,
    pub addr: SocketAddr,
    pub client: reqwest::Client,
    _media: tempfile::TempDir,
}

/// Config suitable for tests: cheap bcrypt, fixed secret, generous limits.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.auth.bcrypt_cost = 4;
    config.auth.jwt_secret = Some("integration-secret-integration-secret".into());
    config.auth.rate_limit_per_minute = 10_000;
    config
}

impl TestHarness {
    /// Start an Axum server with default test config on a random port.
    pub async fn with_server() -> Self {
        Self::with_server_config(test_config()).await
    }

    /// Start an Axum server with custom config on a random port.
    pub async fn with_server_config(mut config: Config) -> Self {
        let media = tempfile::tempdir().expect("failed to create media dir");
        config.server.media_dir = media.path().to_path_buf();

        let db = init_memory_pool().expect("failed to create in-memory pool");
        let ctx = AppContext::new(db.clone(), config);
        let app = build_router(ctx.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind random port");
        let addr = listener.local_addr().expect("failed to get local addr");

        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        Self {
            ctx,
            db,
            addr,
            client: reqwest::Client::new(),
            _media: media,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    /// Get a database connection from the pool.
    pub fn conn(&self) -> PooledConnection {
        rpi_db::pool::get_conn(&self.db).expect("failed to get db connection")
    }

    pub fn user_count(&self) -> i64 {
        rpi_db::queries::users::count_users(&self.conn()).unwrap()
    }

    pub fn image_count(&self) -> i64 {
        rpi_db::queries::images::count_images(&self.conn()).unwrap()
    }

    /// Number of files in the uploads directory.
    pub fn blob_count(&self) -> usize {
        std::fs::read_dir(self.ctx.blobs.root().join("uploads"))
            .map(|dir| dir.count())
            .unwrap_or(0)
    }

    pub async fn post_json(&self, path: &str, body: &Value) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .unwrap()
    }

    /// Register a user through the API and return the response.
    pub async fn register(&self, username: &str, password: &str) -> reqwest::Response {
        self.post_json(
            "/api/v1/register/",
            &json!({
                "username": username,
                "email": format!("{username}@example.com"),
                "password": password,
            }),
        )
        .await
    }

    /// Register `username` and return its access token.
    pub async fn login_new_user(&self, username: &str) -> String {
        assert_eq!(self.register(username, PASSWORD).await.status(), 201);
        let tokens: Value = self
            .post_json(
                "/api/v1/token/",
                &json!({"username": username, "password": PASSWORD}),
            )
            .await
            .json()
            .await
            .unwrap();
        tokens["access"].as_str().unwrap().to_string()
    }

    pub async fn upload(&self, token: Option<&str>, body: &Value) -> reqwest::Response {
        let mut req = self.client.post(self.url("/api/v1/upload/")).json(body);
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        req.send().await.unwrap()
    }

    pub async fn list(&self, token: Option<&str>) -> reqwest::Response {
        let mut req = self.client.get(self.url("/api/v1/images/"));
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        req.send().await.unwrap()
    }
}

/// A small PNG encoded as base64.
pub fn png_base64() -> String {
    let img = image::RgbImage::from_pixel(8, 6, image::Rgb([12, 200, 34]));
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, image::ImageFormat::Png).unwrap();
    STANDARD.encode(buf.into_inner())
}
