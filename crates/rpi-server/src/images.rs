//! Image upload and listing on behalf of an authenticated user.

use serde::{Deserialize, Serialize};

use rpi_core::{Error, Result};
use rpi_db::models::ImageRecord;
use rpi_db::queries::images;

use crate::accounts::AuthUser;
use crate::context::AppContext;
use crate::storage::BlobStore;

/// Upload payload. Anything besides `image` (such as a client-supplied
/// `user`) is ignored; ownership always comes from the token.
#[derive(Debug, Default, Deserialize, utoipa::ToSchema)]
pub struct UploadImageRequest {
    /// Base64 image data, optionally as a `data:image/...;base64,` URI.
    pub image: Option<String>,
}

/// An image record as returned to clients.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ImageView {
    pub id: String,
    /// Username of the owner.
    pub user: String,
    /// URL path of the stored image.
    pub image: String,
    pub uploaded_at: String,
}

impl ImageView {
    fn from_record(record: ImageRecord, owner: &AuthUser) -> Self {
        Self {
            id: record.id.to_string(),
            user: owner.username.clone(),
            image: BlobStore::url(&record.path),
            uploaded_at: record.uploaded_at,
        }
    }
}

/// Decode, store, and record an image owned by `user`.
pub fn upload_image(ctx: &AppContext, user: &AuthUser, req: UploadImageRequest) -> Result<ImageView> {
    let Some(encoded) = req.image else {
        return Err(Error::field("image", "No file was submitted."));
    };

    let decoded = ctx
        .decoder
        .decode(&encoded)
        .map_err(|failure| Error::field("image", failure.to_string()))?;

    let path = ctx.blobs.store(&decoded.bytes, decoded.extension())?;

    let record = rpi_db::pool::get_conn(&ctx.db)
        .and_then(|conn| images::create_image(&conn, user.id, &path));
    let record = match record {
        Ok(record) => record,
        Err(e) => {
            if let Err(cleanup) = ctx.blobs.remove(&path) {
                tracing::warn!(path = %path, "Failed to remove orphaned blob: {cleanup}");
            }
            return Err(e);
        }
    };

    tracing::info!(
        image_id = %record.id,
        user_id = %user.id,
        format = ?decoded.format,
        width = decoded.width,
        height = decoded.height,
        size = decoded.bytes.len(),
        "Stored image"
    );

    Ok(ImageView::from_record(record, user))
}

/// All images owned by `user`, newest first.
pub fn list_images(ctx: &AppContext, user: &AuthUser) -> Result<Vec<ImageView>> {
    let conn = rpi_db::pool::get_conn(&ctx.db)?;
    Ok(images::list_images_by_user(&conn, user.id)?
        .into_iter()
        .map(|record| ImageView::from_record(record, user))
        .collect())
}
