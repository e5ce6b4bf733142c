//! Shared application state.
//!
//! [`AppContext`] is handed to every route handler through axum state. All
//! fields are cheap to clone: the pool is reference counted internally and
//! everything else sits behind an `Arc`.

use std::sync::Arc;

use rpi_core::config::Config;
use rpi_db::pool::DbPool;

use crate::middleware::rate_limit::{create_limiter, SharedLimiter};
use crate::storage::BlobStore;
use crate::token::TokenSigner;
use crate::uploads::ImageDecoder;

#[derive(Clone)]
pub struct AppContext {
    pub db: DbPool,
    pub config: Arc<Config>,
    pub tokens: Arc<TokenSigner>,
    pub blobs: Arc<BlobStore>,
    pub decoder: Arc<ImageDecoder>,
    /// Throttles the unauthenticated register and token routes.
    pub auth_limiter: SharedLimiter,
}

impl AppContext {
    pub fn new(db: DbPool, config: Config) -> Self {
        Self {
            db,
            tokens: Arc::new(TokenSigner::from_config(&config.auth)),
            blobs: Arc::new(BlobStore::new(&config.server.media_dir)),
            decoder: Arc::new(ImageDecoder::from_config(&config.uploads)),
            auth_limiter: create_limiter(config.auth.rate_limit_per_minute),
            config: Arc::new(config),
        }
    }
}
