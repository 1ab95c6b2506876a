//! The device seam the renderer draws through.
//!
//! [`RenderDevice`] models a state-machine graphics device: it keeps one bound
//! texture, one bound framebuffer, a viewport, a projection, a scissor and a
//! blend configuration, and every draw uses whatever is current. The renderer
//! decides *when* state changes; a device only has to apply them.

use crate::gpu_types::*;
use glam::Mat4;

/// State-machine graphics device.
///
/// # Coordinate conventions
///
/// - Viewport and scissor rectangles have a bottom-left origin.
/// - Offscreen framebuffers keep rows in upload order, so row 0 of the
///   attached texture is framebuffer row 0.
/// - The display framebuffer stores rows bottom-up.
/// - Projections map into a clip space where `+y` points up.
///
/// # Borrow checking pattern
///
/// Methods take `&self`. Implementations keep their state behind a mutex so a
/// device can be shared through an `Arc` between the renderer and the code
/// that inspects it.
///
/// # Example
///
/// ```rust,no_run
/// use glint_test_utils::{PixelFormat, RenderDevice};
///
/// fn upload_white(device: &dyn RenderDevice) {
///     let texture = device.create_texture(2, 2, PixelFormat::Rgba).unwrap();
///     let pixels = [255u8; 16];
///     device
///         .write_texture(texture, glint_test_utils::DeviceRect::sized(2, 2), PixelFormat::Rgba, &pixels)
///         .unwrap();
/// }
/// ```
pub trait RenderDevice: Send + Sync {
    // Context

    /// Static description of the device, including its extension list.
    fn info(&self) -> DeviceInfo;

    /// Physical size of the display framebuffer in pixels.
    fn drawable_size(&self) -> (u32, u32);

    /// Ask the windowing layer for a new drawable size. Returns `false` when
    /// the request is refused; the drawable keeps its old size.
    fn resize_drawable(&self, width: u32, height: u32) -> bool;

    // Textures

    /// Allocate storage for a `width x height` texture. Contents are undefined
    /// until written.
    fn create_texture(
        &self,
        width: u32,
        height: u32,
        format: PixelFormat,
    ) -> Result<TextureHandle, DeviceError>;

    /// Replace `region` of the texture with tightly packed `data` in `format`.
    fn write_texture(
        &self,
        texture: TextureHandle,
        region: DeviceRect,
        format: PixelFormat,
        data: &[u8],
    ) -> Result<(), DeviceError>;

    fn set_texture_filter(&self, texture: TextureHandle, filter: TextureFilter);

    /// Rebuild the mip chain of the texture from level 0.
    fn generate_mipmaps(&self, texture: TextureHandle) -> Result<(), DeviceError>;

    fn destroy_texture(&self, texture: TextureHandle);

    fn bind_texture(&self, texture: Option<TextureHandle>);

    // Framebuffers

    fn create_framebuffer(&self) -> Result<FramebufferHandle, DeviceError>;

    fn attach_color_texture(
        &self,
        framebuffer: FramebufferHandle,
        texture: TextureHandle,
    ) -> Result<(), DeviceError>;

    fn framebuffer_complete(&self, framebuffer: FramebufferHandle) -> bool;

    fn destroy_framebuffer(&self, framebuffer: FramebufferHandle);

    /// Bind an offscreen framebuffer, or the display for `None`.
    fn bind_framebuffer(&self, framebuffer: Option<FramebufferHandle>);

    // Fixed state

    fn viewport(&self) -> Viewport;
    fn set_viewport(&self, viewport: Viewport);
    fn projection(&self) -> Mat4;
    fn set_projection(&self, projection: Mat4);
    fn set_scissor(&self, scissor: Option<ScissorRect>);
    fn set_blending(&self, enabled: bool);
    fn set_blend_function(&self, function: BlendFunction);
    fn set_blend_equation(&self, equation: BlendEquation);

    /// Tint multiplied into every sampled texel.
    fn set_color(&self, color: [f32; 4]);

    // Commands

    /// Fill the bound framebuffer with `color`, limited to the scissor if set.
    fn clear(&self, color: [f32; 4]);

    /// Draw `vertices` as a triangle list with the current state.
    fn draw_triangles(&self, vertices: &[BatchVertex]) -> Result<(), DeviceError>;

    /// Read `region` of the bound framebuffer as tightly packed `format` bytes.
    fn read_pixels(&self, region: DeviceRect, format: PixelFormat) -> Result<Vec<u8>, DeviceError>;

    /// Present the display framebuffer.
    fn swap_buffers(&self) -> Result<(), DeviceError>;
}
