//! Error types for the renderer.
//!
//! Every failure is logged where it happens and leaves the renderer usable;
//! these types tell the caller what went wrong.

use crate::features::GpuFeatures;
use glint_test_utils::DeviceError;
use std::fmt;

/// Errors that prevent a renderer from being created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitError {
    /// The device reported a zero-sized drawable, or the config asked for one.
    ZeroSize,
    /// The device lacks capabilities the config marked as required.
    MissingFeatures(GpuFeatures),
    /// The device failed while setting up.
    Device(DeviceError),
}

impl fmt::Display for InitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InitError::ZeroSize => write!(f, "Renderer resolution must be non-zero"),
            InitError::MissingFeatures(missing) => {
                write!(f, "Required device capabilities missing: {:?}", missing)
            }
            InitError::Device(e) => write!(f, "Device initialization failed: {}", e),
        }
    }
}

impl std::error::Error for InitError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            InitError::Device(e) => Some(e),
            _ => None,
        }
    }
}

impl From<DeviceError> for InitError {
    fn from(e: DeviceError) -> Self {
        InitError::Device(e)
    }
}

/// Why a blit did not queue any geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlitError {
    /// The texture or target id is stale or was never issued.
    InvalidArgument,
    /// The texture or target belongs to a different renderer.
    RendererMismatch,
    /// The target cannot be bound on this device.
    Unsupported,
    /// The batch had no room even after flushing.
    BatchFull,
}

impl BlitError {
    /// Integer status code for callers that speak in return codes.
    pub fn code(self) -> i32 {
        match self {
            BlitError::InvalidArgument => -1,
            BlitError::RendererMismatch => -2,
            BlitError::Unsupported => -3,
            BlitError::BatchFull => -4,
        }
    }
}

impl fmt::Display for BlitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlitError::InvalidArgument => write!(f, "Blit given an invalid texture or target"),
            BlitError::RendererMismatch => write!(f, "Blit mixes resources from different renderers"),
            BlitError::Unsupported => write!(f, "Blit target cannot be bound on this device"),
            BlitError::BatchFull => write!(f, "Blit batch could not make room for a quad"),
        }
    }
}

impl std::error::Error for BlitError {}

/// Errors from texture and target management.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceError {
    /// Textures hold 3 or 4 channels.
    InvalidChannels(u8),
    /// A stale id, a zero size, or a region outside the texture.
    InvalidArgument(&'static str),
    /// The resource belongs to a different renderer.
    RendererMismatch,
    /// The device lacks a capability the operation needs.
    Unsupported(GpuFeatures),
    /// Pixel data could not be converted for upload.
    Pixels(PixelError),
    /// The device failed.
    Device(DeviceError),
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceError::InvalidChannels(n) => {
                write!(f, "Cannot create a texture with {} color channels, try 3 or 4", n)
            }
            ResourceError::InvalidArgument(what) => write!(f, "Invalid argument: {}", what),
            ResourceError::RendererMismatch => write!(f, "Resource belongs to a different renderer"),
            ResourceError::Unsupported(needs) => write!(f, "Device lacks {:?}", needs),
            ResourceError::Pixels(e) => write!(f, "Pixel conversion failed: {}", e),
            ResourceError::Device(e) => write!(f, "Device error: {}", e),
        }
    }
}

impl std::error::Error for ResourceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ResourceError::Pixels(e) => Some(e),
            ResourceError::Device(e) => Some(e),
            _ => None,
        }
    }
}

impl From<DeviceError> for ResourceError {
    fn from(e: DeviceError) -> Self {
        ResourceError::Device(e)
    }
}

impl From<PixelError> for ResourceError {
    fn from(e: PixelError) -> Self {
        ResourceError::Pixels(e)
    }
}

/// Errors from building or converting CPU pixel buffers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PixelError {
    /// The byte count does not match `width * height * bytes_per_pixel`.
    LengthMismatch { expected: usize, actual: usize },
    /// Width or height is zero.
    ZeroSize,
    /// A crop rectangle falls outside the buffer.
    OutOfBounds,
}

impl fmt::Display for PixelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PixelError::LengthMismatch { expected, actual } => {
                write!(f, "Expected {} bytes of pixel data, got {}", expected, actual)
            }
            PixelError::ZeroSize => write!(f, "Pixel buffer has zero width or height"),
            PixelError::OutOfBounds => write!(f, "Region lies outside the pixel buffer"),
        }
    }
}

impl std::error::Error for PixelError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blit_codes() {
        assert_eq!(BlitError::InvalidArgument.code(), -1);
        assert_eq!(BlitError::RendererMismatch.code(), -2);
        assert!(BlitError::Unsupported.code() < 0);
    }

    #[test]
    fn test_resource_error_source() {
        use std::error::Error;
        let err = ResourceError::from(DeviceError::HandleAllocation);
        assert!(err.source().is_some());
        assert!(ResourceError::InvalidChannels(2).source().is_none());
        assert!(err.to_string().contains("allocate"));
    }
}
