//! Renderer configuration.

use crate::batch::DEFAULT_BATCH_CAPACITY;
use crate::features::GpuFeatures;
use bitflags::bitflags;

bitflags! {
    /// Presentation hints forwarded to the windowing layer.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct InitFlags: u32 {
        const DOUBLE_BUFFER = 1 << 0;
        const VSYNC = 1 << 1;
        const RESIZABLE = 1 << 2;
    }
}

/// Settings for [`GpuRenderer::new`](crate::GpuRenderer::new).
///
/// # Example
///
/// ```
/// use glint_render::{GpuFeatures, RendererConfig};
///
/// let config = RendererConfig::new(640, 480)
///     .with_required_features(GpuFeatures::RENDER_TARGETS)
///     .with_disabled_features(GpuFeatures::NON_POWER_OF_TWO);
/// assert_eq!(config.width, 640);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RendererConfig {
    /// Logical width of the display target.
    pub width: u32,
    /// Logical height of the display target.
    pub height: u32,
    pub flags: InitFlags,
    /// Creation fails unless the device provides all of these.
    pub required_features: GpuFeatures,
    /// Masked out of the probed capabilities, to exercise fallback paths.
    pub disabled_features: GpuFeatures,
    /// Vertices the batch holds before it must flush.
    pub batch_capacity: usize,
}

impl RendererConfig {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..Default::default()
        }
    }

    pub fn with_flags(mut self, flags: InitFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_required_features(mut self, features: GpuFeatures) -> Self {
        self.required_features = features;
        self
    }

    pub fn with_disabled_features(mut self, features: GpuFeatures) -> Self {
        self.disabled_features = features;
        self
    }

    pub fn with_batch_capacity(mut self, vertices: usize) -> Self {
        self.batch_capacity = vertices;
        self
    }
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            flags: InitFlags::DOUBLE_BUFFER | InitFlags::VSYNC,
            required_features: GpuFeatures::empty(),
            disabled_features: GpuFeatures::empty(),
            batch_capacity: DEFAULT_BATCH_CAPACITY,
        }
    }
}
