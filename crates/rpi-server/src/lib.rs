//! rpi-server: HTTP API for account registration, token auth, and image
//! uploads.
//!
//! This crate ties rpi-core and rpi-db together into a running server:
//!
//! - Axum router with bearer-token authentication and rate-limited auth routes
//! - Account and image services the handlers (and the CLI) call into
//! - HS256 token signing, base64 image decoding, and blob storage
//! - Graceful shutdown via signal handling

pub mod accounts;
pub mod context;
pub mod error;
pub mod images;
pub mod middleware;
pub mod router;
pub mod routes;
pub mod storage;
pub mod token;
pub mod uploads;

use std::net::SocketAddr;

use rpi_core::config::Config;
use rpi_core::Error;
use tokio_util::sync::CancellationToken;

use crate::context::AppContext;

/// Open (or create) the database at the configured path.
pub fn open_database(config: &Config) -> rpi_core::Result<rpi_db::pool::DbPool> {
    let db_path = &config.server.db_path;
    let existed = db_path.exists();
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
            tracing::info!("Created database directory {}", parent.display());
        }
    }

    let db = rpi_db::pool::init_pool(db_path)?;
    if existed {
        tracing::info!("Database opened (existing) at {}", db_path.display());
    } else {
        tracing::info!("Database created (new) at {}", db_path.display());
    }
    Ok(db)
}

/// Start the rpimage server.
///
/// Initializes the database and media directory, builds the
/// [`AppContext`], and serves HTTP until a shutdown signal arrives.
pub async fn start(config: Config) -> rpi_core::Result<()> {
    start_with_cancel(config, CancellationToken::new()).await
}

/// Like [`start`], but also stops when `cancel` is triggered.
pub async fn start_with_cancel(config: Config, cancel: CancellationToken) -> rpi_core::Result<()> {
    for warning in config.validate() {
        tracing::warn!("Config warning: {warning}");
    }

    let db = open_database(&config)?;

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .map_err(|e| Error::Internal(format!("Invalid server address: {e}")))?;

    let ctx = AppContext::new(db, config);
    ctx.blobs.ensure_dirs()?;

    let app = router::build_router(ctx);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Internal(format!("Failed to bind to {addr}: {e}")))?;
    let local = listener.local_addr()?;
    tracing::info!("Listening on {local}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel))
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C, SIGTERM, or cancellation of the token.
async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
        _ = cancel.cancelled() => {}
    }

    tracing::info!("Shutdown signal received");
}
