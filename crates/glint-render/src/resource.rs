//! Texture and target identities and the records behind them.
//!
//! Ids are weak: they carry the issuing renderer and a generational slot key,
//! so a destroyed texture or target simply stops resolving instead of
//! dangling.

use glint_core::alloc::SlotKey;
use glint_core::geometry::{Rect, Size};
use glint_test_utils::{FramebufferHandle, MagFilter, MinFilter, PixelFormat, TextureFilter, TextureHandle};
use std::sync::atomic::{AtomicU32, Ordering};

static NEXT_RENDERER_ID: AtomicU32 = AtomicU32::new(1);

/// Identifies one renderer instance. Resources remember which renderer made
/// them so they are never mixed across renderers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RendererId(u32);

impl RendererId {
    pub(crate) fn next() -> Self {
        Self(NEXT_RENDERER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId {
    pub(crate) renderer: RendererId,
    pub(crate) key: SlotKey,
}

impl TextureId {
    pub fn renderer(&self) -> RendererId {
        self.renderer
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId {
    pub(crate) renderer: RendererId,
    pub(crate) key: SlotKey,
}

impl TargetId {
    pub fn renderer(&self) -> RendererId {
        self.renderer
    }
}

/// Sampling filter requested by callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Filter {
    Nearest,
    #[default]
    Linear,
    /// Trilinear when the texture has mipmaps.
    LinearMipmap,
}

impl Filter {
    /// The device filter for this setting, given whether mipmaps exist.
    pub fn resolve(self, has_mipmaps: bool) -> TextureFilter {
        match self {
            Filter::Nearest => TextureFilter::NEAREST,
            Filter::Linear => TextureFilter {
                min: if has_mipmaps {
                    MinFilter::LinearMipmapNearest
                } else {
                    MinFilter::Linear
                },
                mag: MagFilter::Linear,
            },
            Filter::LinearMipmap => TextureFilter {
                min: if has_mipmaps {
                    MinFilter::LinearMipmapLinear
                } else {
                    MinFilter::Linear
                },
                mag: MagFilter::Linear,
            },
        }
    }
}

/// Scissor settings of a target, in its logical coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Clip {
    pub enabled: bool,
    pub rect: Rect<i32>,
}

impl Clip {
    /// Disabled, covering the whole target.
    pub fn full(size: Size<u32>) -> Self {
        Self {
            enabled: false,
            rect: Rect::new(0, 0, size.width as i32, size.height as i32),
        }
    }
}

#[derive(Debug)]
pub(crate) struct TextureData {
    pub handle: TextureHandle,
    pub format: PixelFormat,
    pub logical: Size<u32>,
    pub storage: Size<u32>,
    pub has_mipmaps: bool,
    pub filter: TextureFilter,
    pub target: Option<TargetId>,
}

#[derive(Debug)]
pub(crate) struct TargetData {
    /// `None` for the display.
    pub framebuffer: Option<FramebufferHandle>,
    pub size: Size<u32>,
    pub clip: Clip,
    /// `None` for the display.
    pub texture: Option<TextureId>,
}

impl TargetData {
    pub fn is_display(&self) -> bool {
        self.texture.is_none()
    }
}

/// Read-only view of a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureInfo {
    /// Requested size; all coordinate math uses this.
    pub size: Size<u32>,
    /// Allocated size, padded to powers of two when the device needs it.
    pub storage_size: Size<u32>,
    pub channels: u8,
    pub format: PixelFormat,
    pub has_mipmaps: bool,
    pub filter: TextureFilter,
    pub target: Option<TargetId>,
}

impl From<&TextureData> for TextureInfo {
    fn from(data: &TextureData) -> Self {
        Self {
            size: data.logical,
            storage_size: data.storage,
            channels: data.format.channels(),
            format: data.format,
            has_mipmaps: data.has_mipmaps,
            filter: data.filter,
            target: data.target,
        }
    }
}

/// Read-only view of a render target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetInfo {
    pub size: Size<u32>,
    pub clip: Clip,
    pub is_display: bool,
    pub texture: Option<TextureId>,
}

impl From<&TargetData> for TargetInfo {
    fn from(data: &TargetData) -> Self {
        Self {
            size: data.size,
            clip: data.clip,
            is_display: data.is_display(),
            texture: data.texture,
        }
    }
}
