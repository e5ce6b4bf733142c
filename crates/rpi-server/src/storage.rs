//! Blob storage for uploaded images.
//!
//! Blobs live under `<root>/uploads/<uuid>.<ext>`. Paths handed to callers
//! are relative to `root` so the database never records where the media
//! directory happens to be mounted.

use std::path::{Component, Path, PathBuf};

use rpi_core::{Error, Result};

/// Subdirectory of the media root that holds uploads.
pub const UPLOADS_DIR: &str = "uploads";

/// URL prefix under which the media root is served.
pub const MEDIA_URL_PREFIX: &str = "/media";

#[derive(Debug, Clone)]
pub struct BlobStore {
    root: PathBuf,
}

impl BlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the uploads directory if it does not exist.
    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(self.root.join(UPLOADS_DIR))?;
        Ok(())
    }

    /// Write `bytes` as a new blob and return its relative path.
    ///
    /// The data goes to a hidden temp file first and is renamed into place,
    /// so a reader never sees a partially written image.
    pub fn store(&self, bytes: &[u8], extension: &str) -> Result<String> {
        self.ensure_dirs()?;

        let name = format!("{}.{extension}", uuid::Uuid::new_v4().simple());
        let relative = format!("{UPLOADS_DIR}/{name}");
        let dir = self.root.join(UPLOADS_DIR);
        let tmp = dir.join(format!(".{name}.tmp"));
        let dest = dir.join(&name);

        if let Err(e) = std::fs::write(&tmp, bytes) {
            let _ = std::fs::remove_file(&tmp);
            return Err(e.into());
        }
        if let Err(e) = std::fs::rename(&tmp, &dest) {
            let _ = std::fs::remove_file(&tmp);
            return Err(e.into());
        }

        tracing::debug!(path = %relative, size = bytes.len(), "Stored blob");
        Ok(relative)
    }

    /// Resolve a relative blob path to a location on disk.
    ///
    /// Rejects absolute paths and anything containing `..`.
    pub fn absolute(&self, relative: &str) -> Result<PathBuf> {
        let rel = Path::new(relative);
        let safe = rel
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if !safe || relative.is_empty() {
            return Err(Error::Validation(format!("invalid blob path: {relative}")));
        }
        Ok(self.root.join(rel))
    }

    /// Delete a blob. A blob that is already gone is not an error.
    pub fn remove(&self, relative: &str) -> Result<()> {
        let path = self.absolute(relative)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Public URL path for a stored blob.
    pub fn url(relative: &str) -> String {
        format!("{MEDIA_URL_PREFIX}/{relative}")
    }
}
