//! CPU-side pixel buffers.
//!
//! Decoded images arrive in whatever channel order their codec produced. The
//! device only accepts tightly packed RGB or RGBA, so every other layout goes
//! through [`PixelBuffer::convert_to`] before upload.

use crate::error::PixelError;
use glint_core::geometry::Rect;
use glint_test_utils::PixelFormat;

/// Channel order of a [`PixelBuffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelLayout {
    Rgb,
    Bgr,
    Rgba,
    Bgra,
    Argb,
}

impl PixelLayout {
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Rgb | Self::Bgr => 3,
            Self::Rgba | Self::Bgra | Self::Argb => 4,
        }
    }

    pub const fn has_alpha(self) -> bool {
        matches!(self, Self::Rgba | Self::Bgra | Self::Argb)
    }

    /// The device format this layout maps to without conversion, if any.
    pub const fn native_format(self) -> Option<PixelFormat> {
        match self {
            Self::Rgb => Some(PixelFormat::Rgb),
            Self::Rgba => Some(PixelFormat::Rgba),
            _ => None,
        }
    }

    /// Offsets of red, green, blue and alpha within one pixel.
    const fn offsets(self) -> ([usize; 3], Option<usize>) {
        match self {
            Self::Rgb => ([0, 1, 2], None),
            Self::Bgr => ([2, 1, 0], None),
            Self::Rgba => ([0, 1, 2], Some(3)),
            Self::Bgra => ([2, 1, 0], Some(3)),
            Self::Argb => ([1, 2, 3], Some(0)),
        }
    }
}

impl From<PixelFormat> for PixelLayout {
    fn from(format: PixelFormat) -> Self {
        match format {
            PixelFormat::Rgb => Self::Rgb,
            PixelFormat::Rgba => Self::Rgba,
        }
    }
}

/// A tightly packed image in host memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    layout: PixelLayout,
    color_key: Option<[u8; 3]>,
    data: Vec<u8>,
}

impl PixelBuffer {
    pub fn new(width: u32, height: u32, layout: PixelLayout, data: Vec<u8>) -> Result<Self, PixelError> {
        if width == 0 || height == 0 {
            return Err(PixelError::ZeroSize);
        }
        let expected = width as usize * height as usize * layout.bytes_per_pixel();
        if data.len() != expected {
            return Err(PixelError::LengthMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            layout,
            color_key: None,
            data,
        })
    }

    /// A buffer filled with one RGBA value.
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Result<Self, PixelError> {
        let data = rgba.repeat(width as usize * height as usize);
        Self::new(width, height, PixelLayout::Rgba, data)
    }

    /// Pixels whose RGB equals `key` become transparent when converted to RGBA.
    pub fn with_color_key(mut self, key: [u8; 3]) -> Self {
        self.color_key = Some(key);
        self
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn layout(&self) -> PixelLayout {
        self.layout
    }

    pub fn color_key(&self) -> Option<[u8; 3]> {
        self.color_key
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// The device format an upload of this buffer should use: RGBA when the
    /// buffer carries alpha or a color key, RGB otherwise.
    pub fn preferred_format(&self) -> PixelFormat {
        if self.layout.has_alpha() || self.color_key.is_some() {
            PixelFormat::Rgba
        } else {
            PixelFormat::Rgb
        }
    }

    /// Tightly packed bytes in `format`.
    ///
    /// Missing alpha becomes opaque, except for color-keyed pixels, which
    /// become fully transparent.
    pub fn convert_to(&self, format: PixelFormat) -> Vec<u8> {
        if self.layout.native_format() == Some(format) && (self.color_key.is_none() || format == PixelFormat::Rgb) {
            return self.data.clone();
        }

        let ([r, g, b], alpha) = self.layout.offsets();
        let src_bpp = self.layout.bytes_per_pixel();
        let dst_bpp = format.bytes_per_pixel();
        let mut out = Vec::with_capacity(self.data.len() / src_bpp * dst_bpp);

        for px in self.data.chunks_exact(src_bpp) {
            let rgb = [px[r], px[g], px[b]];
            out.extend_from_slice(&rgb);
            if format == PixelFormat::Rgba {
                let a = match (self.color_key, alpha) {
                    (Some(key), _) if key == rgb => 0,
                    (_, Some(i)) => px[i],
                    (_, None) => 255,
                };
                out.push(a);
            }
        }
        out
    }

    /// Copy of the pixels inside `rect`.
    pub fn crop(&self, rect: Rect<i32>) -> Result<Self, PixelError> {
        if rect.width <= 0 || rect.height <= 0 {
            return Err(PixelError::ZeroSize);
        }
        if rect.x < 0
            || rect.y < 0
            || rect.x as u64 + rect.width as u64 > self.width as u64
            || rect.y as u64 + rect.height as u64 > self.height as u64
        {
            return Err(PixelError::OutOfBounds);
        }

        let bpp = self.layout.bytes_per_pixel();
        let stride = self.width as usize * bpp;
        let row_bytes = rect.width as usize * bpp;
        let mut data = Vec::with_capacity(row_bytes * rect.height as usize);
        for row in rect.y as usize..(rect.y + rect.height) as usize {
            let start = row * stride + rect.x as usize * bpp;
            data.extend_from_slice(&self.data[start..start + row_bytes]);
        }

        Ok(Self {
            width: rect.width as u32,
            height: rect.height as u32,
            layout: self.layout,
            color_key: self.color_key,
            data,
        })
    }
}
