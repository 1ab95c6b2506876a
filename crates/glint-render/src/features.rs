//! Capability gate.
//!
//! Optional device capabilities are probed once, when the renderer is
//! created, and every dependent code path checks the resulting flags.

use bitflags::bitflags;
use glint_test_utils::{DeviceApi, DeviceInfo};

bitflags! {
    /// Optional device capabilities the renderer can take advantage of.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct GpuFeatures: u32 {
        /// Texture storage may have any dimensions. Without it, storage is
        /// padded up to the next power of two.
        const NON_POWER_OF_TWO = 1 << 0;

        /// Offscreen framebuffers. Without it only the display can be drawn to.
        const RENDER_TARGETS = 1 << 1;

        /// Blend equations other than add.
        const BLEND_EQUATIONS = 1 << 2;

        /// Separate blend factors for color and alpha.
        const BLEND_FUNC_SEPARATE = 1 << 3;
    }
}

/// Extensions granting [`GpuFeatures::NON_POWER_OF_TWO`].
const NPOT_EXTENSIONS: &[(DeviceApi, &str)] = &[
    (DeviceApi::Desktop, "GL_ARB_texture_non_power_of_two"),
    (DeviceApi::Embedded, "GL_OES_texture_npot"),
];

/// Extensions granting [`GpuFeatures::RENDER_TARGETS`].
const FBO_EXTENSIONS: &[(DeviceApi, &str)] = &[
    (DeviceApi::Desktop, "GL_EXT_framebuffer_object"),
    (DeviceApi::Embedded, "GL_OES_framebuffer_object"),
];

const BLEND_SUBTRACT_EXTENSION: &str = "GL_OES_blend_subtract";
const BLEND_FUNC_SEPARATE_EXTENSION: &str = "GL_OES_blend_func_separate";

fn any_extension(info: &DeviceInfo, table: &[(DeviceApi, &str)]) -> bool {
    table
        .iter()
        .any(|(api, name)| *api == info.api && info.has_extension(name))
}

impl GpuFeatures {
    /// Derive the capability set from a device's extension surface.
    ///
    /// Desktop devices always provide both blend capabilities; embedded
    /// devices advertise them as extensions.
    pub fn probe(info: &DeviceInfo) -> Self {
        let mut features = GpuFeatures::empty();

        if any_extension(info, NPOT_EXTENSIONS) {
            features |= GpuFeatures::NON_POWER_OF_TWO;
        }
        if any_extension(info, FBO_EXTENSIONS) {
            features |= GpuFeatures::RENDER_TARGETS;
        }
        match info.api {
            DeviceApi::Desktop => {
                features |= GpuFeatures::BLEND_EQUATIONS | GpuFeatures::BLEND_FUNC_SEPARATE;
            }
            DeviceApi::Embedded => {
                if info.has_extension(BLEND_SUBTRACT_EXTENSION) {
                    features |= GpuFeatures::BLEND_EQUATIONS;
                }
                if info.has_extension(BLEND_FUNC_SEPARATE_EXTENSION) {
                    features |= GpuFeatures::BLEND_FUNC_SEPARATE;
                }
            }
        }

        for (name, flag) in features.iter_names() {
            tracing::debug!("Device capability {name} enabled ({:#x})", flag.bits());
        }
        for (name, _) in (GpuFeatures::all() - features).iter_names() {
            tracing::warn!("Device capability {name} unavailable, using fallback path");
        }

        features
    }

    /// Check that every flag in `self` is present in `available`.
    pub fn check_support(self, available: GpuFeatures) -> FeatureSupportResult {
        let missing = self - available;

        if missing.is_empty() {
            FeatureSupportResult::Supported
        } else {
            FeatureSupportResult::Missing(missing)
        }
    }
}

impl Default for GpuFeatures {
    fn default() -> Self {
        GpuFeatures::empty()
    }
}

/// Result of checking feature support.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureSupportResult {
    /// All requested features are supported.
    Supported,
    /// Some features are missing.
    Missing(GpuFeatures),
}

impl FeatureSupportResult {
    pub fn is_supported(&self) -> bool {
        matches!(self, FeatureSupportResult::Supported)
    }

    pub fn missing(&self) -> Option<GpuFeatures> {
        match self {
            FeatureSupportResult::Supported => None,
            FeatureSupportResult::Missing(features) => Some(*features),
        }
    }
}

/// Smallest power of two that is `>= n`. Zero maps to one.
pub fn next_power_of_two(n: u32) -> u32 {
    n.max(1).next_power_of_two()
}

/// Storage dimensions for a texture of logical size `width x height`.
pub fn storage_size(width: u32, height: u32, features: GpuFeatures) -> (u32, u32) {
    if features.contains(GpuFeatures::NON_POWER_OF_TWO) {
        (width, height)
    } else {
        (next_power_of_two(width), next_power_of_two(height))
    }
}
