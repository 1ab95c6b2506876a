//! Value types exchanged across the [`RenderDevice`](crate::RenderDevice) seam.
//!
//! Everything here is plain data: handles are opaque numbers minted by the
//! device, rectangles are integer pixel rectangles, and vertices are laid out
//! exactly as the device consumes them.

use std::fmt;
use std::num::NonZeroU32;

/// Opaque texture name issued by a device. Never zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureHandle(NonZeroU32);

impl TextureHandle {
    pub fn new(raw: u32) -> Option<Self> {
        NonZeroU32::new(raw).map(Self)
    }

    pub fn raw(self) -> u32 {
        self.0.get()
    }
}

/// Opaque framebuffer name issued by a device. Never zero; the display
/// framebuffer has no handle and is addressed as `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FramebufferHandle(NonZeroU32);

impl FramebufferHandle {
    pub fn new(raw: u32) -> Option<Self> {
        NonZeroU32::new(raw).map(Self)
    }

    pub fn raw(self) -> u32 {
        self.0.get()
    }
}

/// Storage layout of a device texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    Rgb,
    Rgba,
}

impl PixelFormat {
    pub fn from_channels(channels: u8) -> Option<Self> {
        match channels {
            3 => Some(Self::Rgb),
            4 => Some(Self::Rgba),
            _ => None,
        }
    }

    pub const fn channels(self) -> u8 {
        match self {
            Self::Rgb => 3,
            Self::Rgba => 4,
        }
    }

    pub const fn bytes_per_pixel(self) -> usize {
        self.channels() as usize
    }
}

/// Integer pixel rectangle.
///
/// Viewports and scissors are expressed with a bottom-left origin in
/// framebuffer rows; upload and readback regions index storage rows directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DeviceRect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl DeviceRect {
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Rect at the origin covering `width x height`.
    pub const fn sized(width: u32, height: u32) -> Self {
        Self::new(0, 0, width, height)
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Whether the rect is non-empty and lies inside a `width x height` surface.
    pub fn fits(&self, width: u32, height: u32) -> bool {
        self.width > 0
            && self.height > 0
            && self.x >= 0
            && self.y >= 0
            && self.x as u64 + self.width as u64 <= width as u64
            && self.y as u64 + self.height as u64 <= height as u64
    }

    /// Edges `(x0, y0, x1, y1)` clamped to a `width x height` surface.
    pub fn clamp_to(&self, width: u32, height: u32) -> (u32, u32, u32, u32) {
        let clamp_x = |v: i64| v.clamp(0, width as i64) as u32;
        let clamp_y = |v: i64| v.clamp(0, height as i64) as u32;
        let (x, y) = (self.x as i64, self.y as i64);
        (
            clamp_x(x),
            clamp_y(y),
            clamp_x(x + self.width as i64),
            clamp_y(y + self.height as i64),
        )
    }
}

pub type Viewport = DeviceRect;
pub type ScissorRect = DeviceRect;

/// Minification filter, including the mipmapped variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MinFilter {
    Nearest,
    Linear,
    LinearMipmapNearest,
    LinearMipmapLinear,
}

impl MinFilter {
    pub fn uses_mipmaps(self) -> bool {
        matches!(self, Self::LinearMipmapNearest | Self::LinearMipmapLinear)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MagFilter {
    Nearest,
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureFilter {
    pub min: MinFilter,
    pub mag: MagFilter,
}

impl TextureFilter {
    pub const NEAREST: Self = Self {
        min: MinFilter::Nearest,
        mag: MagFilter::Nearest,
    };
    pub const LINEAR: Self = Self {
        min: MinFilter::Linear,
        mag: MagFilter::Linear,
    };
}

impl Default for TextureFilter {
    fn default() -> Self {
        Self::LINEAR
    }
}

/// Source and destination factors for the color and alpha channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlendFunction {
    pub src_color: wgpu::BlendFactor,
    pub dst_color: wgpu::BlendFactor,
    pub src_alpha: wgpu::BlendFactor,
    pub dst_alpha: wgpu::BlendFactor,
}

impl BlendFunction {
    /// Standard `src * a + dst * (1 - a)` on every channel.
    pub const NORMAL: Self = Self::uniform(
        wgpu::BlendFactor::SrcAlpha,
        wgpu::BlendFactor::OneMinusSrcAlpha,
    );

    /// The same factors for color and alpha.
    pub const fn uniform(src: wgpu::BlendFactor, dst: wgpu::BlendFactor) -> Self {
        Self {
            src_color: src,
            dst_color: dst,
            src_alpha: src,
            dst_alpha: dst,
        }
    }

    pub const fn separate(
        src_color: wgpu::BlendFactor,
        dst_color: wgpu::BlendFactor,
        src_alpha: wgpu::BlendFactor,
        dst_alpha: wgpu::BlendFactor,
    ) -> Self {
        Self {
            src_color,
            dst_color,
            src_alpha,
            dst_alpha,
        }
    }

    /// Combine with an equation into a full blend state.
    pub fn with_equation(self, equation: BlendEquation) -> wgpu::BlendState {
        wgpu::BlendState {
            color: wgpu::BlendComponent {
                src_factor: self.src_color,
                dst_factor: self.dst_color,
                operation: equation,
            },
            alpha: wgpu::BlendComponent {
                src_factor: self.src_alpha,
                dst_factor: self.dst_alpha,
                operation: equation,
            },
        }
    }
}

impl Default for BlendFunction {
    fn default() -> Self {
        Self::NORMAL
    }
}

/// One equation applies to both color and alpha.
pub type BlendEquation = wgpu::BlendOperation;

/// One vertex of a batched quad: position (z is reserved) and texture coordinate.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, bytemuck::Pod, bytemuck::Zeroable)]
pub struct BatchVertex {
    pub position: [f32; 3],
    pub tex_coords: [f32; 2],
}

impl BatchVertex {
    pub const fn new(x: f32, y: f32, s: f32, t: f32) -> Self {
        Self {
            position: [x, y, 0.0],
            tex_coords: [s, t],
        }
    }

    pub const fn x(&self) -> f32 {
        self.position[0]
    }

    pub const fn y(&self) -> f32 {
        self.position[1]
    }
}

/// Which family of graphics API a device exposes. Extension naming and the
/// set of always-present capabilities differ between the two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceApi {
    Desktop,
    Embedded,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub api: DeviceApi,
    pub name: String,
    pub extensions: Vec<String>,
}

impl DeviceInfo {
    pub fn new(api: DeviceApi, name: impl Into<String>) -> Self {
        Self {
            api,
            name: name.into(),
            extensions: Vec::new(),
        }
    }

    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions.extend(extensions.into_iter().map(Into::into));
        self
    }

    pub fn has_extension(&self, name: &str) -> bool {
        self.extensions.iter().any(|ext| ext == name)
    }
}

/// Errors reported by a device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    /// The device could not mint a new texture or framebuffer name.
    HandleAllocation,
    /// A handle that the device does not know about.
    InvalidHandle,
    /// The framebuffer has no usable color attachment.
    FramebufferIncomplete,
    /// A region outside the surface, or data of the wrong length.
    InvalidRegion,
    /// Anything the backend reports on its own terms.
    Backend(String),
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceError::HandleAllocation => write!(f, "Failed to allocate a device handle"),
            DeviceError::InvalidHandle => write!(f, "Unknown device handle"),
            DeviceError::FramebufferIncomplete => write!(f, "Framebuffer is incomplete"),
            DeviceError::InvalidRegion => write!(f, "Region or data size does not match the surface"),
            DeviceError::Backend(msg) => write!(f, "Device error: {}", msg),
        }
    }
}

impl std::error::Error for DeviceError {}

static_assertions::const_assert_eq!(std::mem::size_of::<BatchVertex>(), 20);
static_assertions::assert_eq_size!(TextureHandle, Option<TextureHandle>);
