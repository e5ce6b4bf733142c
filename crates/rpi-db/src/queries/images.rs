//! Uploaded image records.
//!
//! Every query that reads images is keyed by the owning user; there is no
//! way to list another user's images through this module.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Connection;
use rpi_core::{Error, ImageId, Result, UserId};

use crate::models::ImageRecord;

const COLS: &str = "id, user_id, path, uploaded_at";

/// Render a timestamp the way `uploaded_at` is stored.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Record an image for `user_id`, stamped with the current time.
pub fn create_image(conn: &Connection, user_id: UserId, path: &str) -> Result<ImageRecord> {
    create_image_at(conn, user_id, path, Utc::now())
}

/// Record an image for `user_id` with an explicit upload time.
///
/// Returns [`Error::NotFound`] if the user does not exist.
pub fn create_image_at(
    conn: &Connection,
    user_id: UserId,
    path: &str,
    uploaded_at: DateTime<Utc>,
) -> Result<ImageRecord> {
    let id = ImageId::new();
    let uploaded_at = format_timestamp(uploaded_at);

    conn.execute(
        "INSERT INTO images (id, user_id, path, uploaded_at) VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![id.to_string(), user_id.to_string(), path, uploaded_at],
    )
    .map_err(|e| match &e {
        rusqlite::Error::SqliteFailure(f, _)
            if f.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY =>
        {
            Error::not_found("user", user_id)
        }
        _ => Error::database(e.to_string()),
    })?;

    Ok(ImageRecord {
        id,
        user_id,
        path: path.to_string(),
        uploaded_at,
    })
}

/// Images owned by `user_id`, most recent first.
///
/// Rows sharing a timestamp come back in reverse insertion order.
pub fn list_images_by_user(conn: &Connection, user_id: UserId) -> Result<Vec<ImageRecord>> {
    let q = format!(
        "SELECT {COLS} FROM images WHERE user_id = ?1 ORDER BY uploaded_at DESC, rowid DESC"
    );
    let mut stmt = conn.prepare(&q).map_err(|e| Error::database(e.to_string()))?;
    let rows = stmt
        .query_map([user_id.to_string()], ImageRecord::from_row)
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(rows)
}

/// Total number of image records across all users.
pub fn count_images(conn: &Connection) -> Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM images", [], |row| row.get(0))
        .map_err(|e| Error::database(e.to_string()))
}
