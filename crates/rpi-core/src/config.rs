//! Application configuration types.
//!
//! The top-level [`Config`] struct is deserialized from JSON and carries the
//! server, auth and upload sections. Every section defaults sensibly so a
//! completely empty `{}` file is valid.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::Error;

/// Image formats the upload decoder knows how to verify.
pub const KNOWN_IMAGE_FORMATS: &[&str] = &["png", "jpeg", "gif", "webp", "bmp", "tiff"];

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub uploads: UploadConfig,
}

impl Config {
    /// Deserialize a `Config` from a JSON string.
    pub fn from_json(json_str: &str) -> Result<Self> {
        serde_json::from_str(json_str)
            .map_err(|e| Error::Validation(format!("config parse error: {e}")))
    }

    /// Load configuration from a file, failing if it cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.server.port == 0 {
            warnings.push("server.port is 0; a random port will be assigned".into());
        }

        match &self.auth.jwt_secret {
            None => warnings.push(
                "auth.jwt_secret is not set; a random secret will be generated and \
                 issued tokens will not survive a restart"
                    .into(),
            ),
            Some(secret) if secret.len() < 32 => {
                warnings.push("auth.jwt_secret is shorter than 32 bytes".into());
            }
            Some(_) => {}
        }

        if !(4..=31).contains(&self.auth.bcrypt_cost) {
            warnings.push(format!(
                "auth.bcrypt_cost {} is outside the supported range 4..=31",
                self.auth.bcrypt_cost
            ));
        }

        if self.auth.access_token_minutes == 0 {
            warnings.push("auth.access_token_minutes is 0; every access token is expired".into());
        }

        if self.auth.refresh_token_hours.saturating_mul(60) < self.auth.access_token_minutes {
            warnings.push("auth.refresh_token_hours is shorter than the access token lifetime".into());
        }

        if self.uploads.max_bytes == 0 {
            warnings.push("uploads.max_bytes is 0; every upload will be rejected".into());
        }

        if self.uploads.max_pixels == 0 {
            warnings.push("uploads.max_pixels is 0; every upload will be rejected".into());
        }

        for format in &self.uploads.allowed_formats {
            if !KNOWN_IMAGE_FORMATS.contains(&format.as_str()) {
                warnings.push(format!(
                    "uploads.allowed_formats entry '{}' is not a recognized format (valid: {})",
                    format,
                    KNOWN_IMAGE_FORMATS.join(", ")
                ));
            }
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// HTTP server and storage locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    /// Root of the blob area; uploads land in `<media_dir>/uploads/`.
    pub media_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8000,
            db_path: PathBuf::from("data/rpimage.db"),
            media_dir: PathBuf::from("data/media"),
        }
    }
}

/// Token signing, password hashing and auth route throttling.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HMAC key for signing tokens.
    pub jwt_secret: Option<String>,
    pub access_token_minutes: u64,
    pub refresh_token_hours: u64,
    pub bcrypt_cost: u32,
    /// Requests per minute allowed on the register/token routes.
    pub rate_limit_per_minute: u32,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            access_token_minutes: 5,
            refresh_token_hours: 24,
            bcrypt_cost: 12,
            rate_limit_per_minute: 30,
        }
    }
}

/// Limits applied to uploaded images.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Maximum decoded image size in bytes.
    pub max_bytes: usize,
    /// Maximum width × height of a decoded image.
    pub max_pixels: u64,
    pub allowed_formats: Vec<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_bytes: 10 * 1024 * 1024,
            max_pixels: 24_000_000,
            allowed_formats: vec!["png".into(), "jpeg".into(), "gif".into(), "webp".into()],
        }
    }
}
