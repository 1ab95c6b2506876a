//! Loading textures from and saving them to image files.
//!
//! Decoding goes through the `image` crate into a [`PixelBuffer`]; encoding
//! picks PNG, BMP or TGA from the file extension.

use crate::error::ResourceError;
use crate::pixels::{PixelBuffer, PixelLayout};
use std::path::Path;

/// Image file error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageIoError {
    /// The extension names no supported codec
    UnsupportedFormat(String),
    /// Decoding or encoding failed
    Codec(String),
    /// IO error
    Io(String),
    /// The texture could not be uploaded or read back
    Readback(ResourceError),
}

impl std::fmt::Display for ImageIoError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnsupportedFormat(ext) => write!(f, "Unsupported image format: {:?}", ext),
            Self::Codec(msg) => write!(f, "Image codec failed: {}", msg),
            Self::Io(msg) => write!(f, "IO error: {}", msg),
            Self::Readback(e) => write!(f, "Texture transfer failed: {}", e),
        }
    }
}

impl std::error::Error for ImageIoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Readback(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ResourceError> for ImageIoError {
    fn from(e: ResourceError) -> Self {
        Self::Readback(e)
    }
}

impl From<image::ImageError> for ImageIoError {
    fn from(e: image::ImageError) -> Self {
        match e {
            image::ImageError::IoError(io) => Self::Io(io.to_string()),
            other => Self::Codec(other.to_string()),
        }
    }
}

/// Encoder for `path`, chosen by its extension, ignoring case.
pub fn format_for_path(path: &Path) -> Result<image::ImageFormat, ImageIoError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "png" => Ok(image::ImageFormat::Png),
        "bmp" => Ok(image::ImageFormat::Bmp),
        "tga" => Ok(image::ImageFormat::Tga),
        _ => Err(ImageIoError::UnsupportedFormat(ext)),
    }
}

/// Decode an image file. Images with an alpha channel keep it; everything
/// else becomes packed RGB.
pub fn load_pixels(path: &Path) -> Result<PixelBuffer, ImageIoError> {
    let decoded = image::ImageReader::open(path)
        .map_err(|e| ImageIoError::Io(e.to_string()))?
        .with_guessed_format()
        .map_err(|e| ImageIoError::Io(e.to_string()))?
        .decode()?;

    let (width, height) = (decoded.width(), decoded.height());
    let pixels = if decoded.color().has_alpha() {
        PixelBuffer::new(width, height, PixelLayout::Rgba, decoded.to_rgba8().into_raw())
    } else {
        PixelBuffer::new(width, height, PixelLayout::Rgb, decoded.to_rgb8().into_raw())
    };
    let pixels = pixels.map_err(|e| ImageIoError::Codec(e.to_string()))?;

    tracing::debug!("Loaded {}x{} image from {}", width, height, path.display());
    Ok(pixels)
}

/// Encode `pixels` to `path`, converting to RGB or RGBA first.
pub fn save_pixels(pixels: &PixelBuffer, path: &Path) -> Result<(), ImageIoError> {
    let format = format_for_path(path)?;
    let native = pixels.preferred_format();
    let data = pixels.convert_to(native);
    let color = match native.channels() {
        4 => image::ExtendedColorType::Rgba8,
        _ => image::ExtendedColorType::Rgb8,
    };

    image::save_buffer_with_format(path, &data, pixels.width(), pixels.height(), color, format)?;
    tracing::debug!("Saved {}x{} image to {}", pixels.width(), pixels.height(), path.display());
    Ok(())
}
