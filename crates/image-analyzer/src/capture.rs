//! Image loading, size limiting and encoding for submission.

use std::io::Cursor;
use std::path::Path;

use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, GenericImageView, ImageFormat};
use serde::{Deserialize, Serialize};

use crate::types::{AnalyzerError, AnalyzerResult};

/// Images above this size are logged as large.
pub const LARGE_IMAGE_MEGAPIXELS: f64 = 20.0;

/// Images above this size are downscaled before submission.
pub const MAX_MEGAPIXELS: f64 = 50.0;

/// Longest side after downscaling.
pub const MAX_DIMENSION: u32 = 5000;

/// Longest side the JPEG encoder accepts.
pub const MAX_JPEG_DIMENSION: u32 = u16::MAX as u32;

/// JPEG quality used for submission.
const SUBMISSION_QUALITY: u8 = 90;

/// Where an image came from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ImageSource {
    File { path: String },
    Base64 { mime: String },
    Bytes,
}

/// An RGB image ready to be encoded.
#[derive(Debug, Clone)]
pub struct PreparedImage {
    pub image: DynamicImage,
    pub original_size: (u32, u32),
    pub resized: bool,
}

impl PreparedImage {
    pub fn size(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}

/// Encoded image bytes shared by every candidate attempt.
#[derive(Debug, Clone)]
pub struct EncodedImage {
    pub bytes: Vec<u8>,
    pub mime: &'static str,
    pub width: u32,
    pub height: u32,
}

impl EncodedImage {
    /// Standard base64 of the encoded bytes.
    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.bytes)
    }
}

/// Load an image from a file path.
pub fn load_from_file(path: &str) -> AnalyzerResult<(DynamicImage, ImageSource)> {
    let img = image::open(path)?;
    let source = ImageSource::File {
        path: path.to_string(),
    };
    Ok((img, source))
}

/// Load an image from base64-encoded data.
pub fn load_from_base64(data: &str, mime: &str) -> AnalyzerResult<(DynamicImage, ImageSource)> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(data.trim())
        .map_err(|e| AnalyzerError::InvalidInput(format!("Invalid base64: {e}")))?;

    let format = match mime {
        "image/png" => Some(ImageFormat::Png),
        "image/jpeg" | "image/jpg" => Some(ImageFormat::Jpeg),
        "image/webp" => Some(ImageFormat::WebP),
        "image/gif" => Some(ImageFormat::Gif),
        _ => None,
    };

    let img = if let Some(fmt) = format {
        image::load_from_memory_with_format(&bytes, fmt)?
    } else {
        image::load_from_memory(&bytes)?
    };

    let source = ImageSource::Base64 {
        mime: mime.to_string(),
    };
    Ok((img, source))
}

/// Load an image from raw encoded bytes, guessing the format.
pub fn load_from_bytes(bytes: &[u8]) -> AnalyzerResult<(DynamicImage, ImageSource)> {
    let img = image::load_from_memory(bytes)?;
    Ok((img, ImageSource::Bytes))
}

/// Size in megapixels.
pub fn megapixels(width: u32, height: u32) -> f64 {
    (width as f64 * height as f64) / 1_000_000.0
}

/// Target size for an oversized image, or `None` if it can be sent as is.
///
/// Above [`MAX_MEGAPIXELS`] the longer side is capped at [`MAX_DIMENSION`].
/// Images within the pixel budget but with a side longer than JPEG allows
/// are capped at [`MAX_JPEG_DIMENSION`]. The shorter side is scaled by the
/// same factor and rounded down.
pub fn downscaled_dimensions(width: u32, height: u32) -> Option<(u32, u32)> {
    let cap = if megapixels(width, height) > MAX_MEGAPIXELS {
        MAX_DIMENSION
    } else if width.max(height) > MAX_JPEG_DIMENSION {
        MAX_JPEG_DIMENSION
    } else {
        return None;
    };

    let (new_width, new_height) = if width > height {
        let new_width = width.min(cap);
        let new_height = (height as u64 * new_width as u64 / width as u64) as u32;
        (new_width, new_height)
    } else {
        let new_height = height.min(cap);
        let new_width = (width as u64 * new_height as u64 / height as u64) as u32;
        (new_width, new_height)
    };

    Some((new_width.max(1), new_height.max(1)))
}

/// Downscale oversized images and convert to RGB.
pub fn prepare_image(img: DynamicImage) -> PreparedImage {
    let (width, height) = img.dimensions();
    let mp = megapixels(width, height);
    tracing::info!("Image dimensions: {width}x{height} ({mp:.2} MP)");

    if mp > LARGE_IMAGE_MEGAPIXELS {
        tracing::warn!("Large image detected: {mp:.2} MP");
    }

    let (img, resized) = match downscaled_dimensions(width, height) {
        Some((w, h)) => {
            tracing::info!("Resizing image to {w}x{h}");
            (
                img.resize_exact(w, h, image::imageops::FilterType::Lanczos3),
                true,
            )
        }
        None => (img, false),
    };

    let image = DynamicImage::ImageRgb8(img.to_rgb8());
    PreparedImage {
        image,
        original_size: (width, height),
        resized,
    }
}

/// Encode a prepared image as JPEG.
pub fn encode_image(prepared: &PreparedImage) -> AnalyzerResult<EncodedImage> {
    let rgb = prepared.image.to_rgb8();
    let mut bytes = Vec::new();
    let mut cursor = Cursor::new(&mut bytes);
    let encoder = JpegEncoder::new_with_quality(&mut cursor, SUBMISSION_QUALITY);
    rgb.write_with_encoder(encoder)?;

    let (width, height) = rgb.dimensions();
    tracing::debug!("Encoded {width}x{height} image as JPEG ({} bytes)", bytes.len());

    Ok(EncodedImage {
        bytes,
        mime: "image/jpeg",
        width,
        height,
    })
}

/// Check if a file path points to a supported image format.
pub fn is_supported_format(path: &str) -> bool {
    let ext = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    matches!(
        ext.as_str(),
        "png" | "jpg" | "jpeg" | "webp" | "gif" | "bmp" | "tiff" | "tif" | "ico"
    )
}
