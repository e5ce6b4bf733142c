//! Decoding of base64-embedded image payloads.
//!
//! Clients send images inline as base64 text, optionally wrapped in a
//! `data:image/<type>;base64,` URI. [`ImageDecoder::decode`] turns that text
//! into verified image bytes or a [`DecodeFailure`] saying why it could not.

use std::io::Cursor;

use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD};
use base64::Engine as _;
use image::error::ImageError;
use image::{ImageFormat, ImageReader, Limits};

use rpi_core::config::UploadConfig;

/// An uploaded image whose content has been decoded and verified.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub bytes: Vec<u8>,
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
}

impl DecodedImage {
    /// File extension for the stored blob.
    pub fn extension(&self) -> &'static str {
        self.format.extensions_str().first().copied().unwrap_or("img")
    }
}

/// Why an embedded image was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeFailure {
    #[error("No image data was submitted.")]
    Empty,

    #[error("Image data is not valid base64.")]
    InvalidEncoding,

    #[error("Image exceeds the maximum size of {limit} bytes.")]
    TooLarge { limit: usize },

    #[error("Image exceeds the maximum of {limit} pixels.")]
    TooManyPixels { limit: u64 },

    #[error("Unsupported image type. Allowed types: {allowed}.")]
    UnsupportedFormat { allowed: String },

    #[error("Upload a valid image. The data submitted was either not an image or a corrupted image.")]
    Corrupt,
}

/// Validates embedded images against the configured size, pixel and format
/// limits.
#[derive(Debug, Clone)]
pub struct ImageDecoder {
    max_bytes: usize,
    max_pixels: u64,
    allowed: Vec<ImageFormat>,
}

impl ImageDecoder {
    pub fn new(max_bytes: usize, max_pixels: u64, allowed: Vec<ImageFormat>) -> Self {
        Self {
            max_bytes,
            max_pixels,
            allowed,
        }
    }

    pub fn from_config(config: &UploadConfig) -> Self {
        let allowed = config
            .allowed_formats
            .iter()
            .filter_map(|name| {
                let format = ImageFormat::from_extension(name);
                if format.is_none() {
                    tracing::warn!("Ignoring unknown upload format '{name}'");
                }
                format
            })
            .collect();
        Self::new(config.max_bytes, config.max_pixels, allowed)
    }

    /// Decode `encoded` and verify it is a complete image of an allowed type.
    pub fn decode(&self, encoded: &str) -> Result<DecodedImage, DecodeFailure> {
        let payload = strip_data_uri(encoded.trim())?;
        let compact: String = payload
            .chars()
            .filter(|c| !c.is_ascii_whitespace())
            .collect();

        if compact.is_empty() {
            return Err(DecodeFailure::Empty);
        }

        // Reject oversized input before allocating the decoded buffer.
        if compact.len() / 4 * 3 > self.max_bytes.saturating_add(3) {
            return Err(DecodeFailure::TooLarge {
                limit: self.max_bytes,
            });
        }

        let bytes = STANDARD
            .decode(&compact)
            .or_else(|_| STANDARD_NO_PAD.decode(&compact))
            .map_err(|_| DecodeFailure::InvalidEncoding)?;

        if bytes.is_empty() {
            return Err(DecodeFailure::Empty);
        }
        if bytes.len() > self.max_bytes {
            return Err(DecodeFailure::TooLarge {
                limit: self.max_bytes,
            });
        }

        let format = image::guess_format(&bytes).map_err(|_| DecodeFailure::Corrupt)?;
        if !self.allowed.contains(&format) {
            return Err(DecodeFailure::UnsupportedFormat {
                allowed: self.allowed_names(),
            });
        }

        // Header dimensions are checked before any pixel buffer is allocated.
        let (width, height) = ImageReader::with_format(Cursor::new(&bytes), format)
            .into_dimensions()
            .map_err(|_| DecodeFailure::Corrupt)?;
        if u64::from(width) * u64::from(height) > self.max_pixels {
            return Err(DecodeFailure::TooManyPixels {
                limit: self.max_pixels,
            });
        }

        let mut reader = ImageReader::with_format(Cursor::new(&bytes), format);
        reader.limits(self.limits());
        let img = reader.decode().map_err(|e| match e {
            ImageError::Limits(_) => DecodeFailure::TooManyPixels {
                limit: self.max_pixels,
            },
            _ => DecodeFailure::Corrupt,
        })?;

        Ok(DecodedImage {
            width: img.width(),
            height: img.height(),
            bytes,
            format,
        })
    }

    /// Decoder allocation limits matching the pixel cap, at up to 16 bytes
    /// per pixel (RGBA with 32-bit float channels).
    fn limits(&self) -> Limits {
        let mut limits = Limits::default();
        limits.max_alloc = Some(self.max_pixels.saturating_mul(16).max(1024 * 1024));
        limits
    }

    fn allowed_names(&self) -> String {
        self.allowed
            .iter()
            .filter_map(|f| f.extensions_str().first().copied())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Strip a `data:<mime>;base64,` prefix if present.
fn strip_data_uri(input: &str) -> Result<&str, DecodeFailure> {
    let Some(rest) = input.strip_prefix("data:") else {
        return Ok(input);
    };
    let (meta, data) = rest
        .split_once(',')
        .ok_or(DecodeFailure::InvalidEncoding)?;
    if !meta.ends_with(";base64") {
        return Err(DecodeFailure::InvalidEncoding);
    }
    Ok(data)
}
