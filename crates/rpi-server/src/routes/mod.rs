//! Route handlers for the HTTP API.

pub mod accounts;
pub mod health;
pub mod images;
pub mod token;

use rpi_core::{Error, Result};

/// Run blocking work (SQLite, bcrypt, image decoding) off the async workers.
pub(crate) async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| Error::Internal(format!("spawn_blocking join error: {e}")))?
}
