//! The renderer and its public interface.

use crate::batch::BatchBuffer;
use crate::binding::BindingState;
use crate::blend::BlendMode;
use crate::color::Color;
use crate::config::RendererConfig;
use crate::error::{BlitError, InitError, ResourceError};
use crate::features::GpuFeatures;
use crate::flush::display_projection;
use crate::pixels::PixelBuffer;
use crate::resource::{
    Clip, Filter, RendererId, TargetData, TargetId, TargetInfo, TextureData, TextureId, TextureInfo,
};
use glam::Affine2;
use glint_core::alloc::SlotMap;
use glint_core::geometry::{Rect, Size};
use glint_test_utils::{BlendFunction, RenderDevice, Viewport};
use std::sync::Arc;

/// A 2D renderer: textures, render targets, batched blits and draw state.
///
/// Callers hold this as `dyn Renderer2D` (or generically) rather than naming
/// a backend. [`GpuRenderer`] is the implementation; the device it draws
/// through is chosen at construction.
pub trait Renderer2D {
    fn id(&self) -> RendererId;

    // Display

    /// The window-backed target. Always valid for this renderer's lifetime.
    fn display(&self) -> TargetId;
    fn features(&self) -> GpuFeatures;
    /// Whether every flag in `features` is available.
    fn is_feature_enabled(&self, features: GpuFeatures) -> bool {
        self.features().contains(features)
    }
    /// Physical drawable size.
    fn window_size(&self) -> Size<u32>;
    /// Resize the window. Returns `false` when the device refuses.
    fn set_window_resolution(&mut self, width: u32, height: u32) -> bool;
    /// Change the display's logical size; drawing scales to the window.
    fn set_virtual_resolution(&mut self, width: u32, height: u32);

    // Textures

    fn create_texture(&mut self, width: u32, height: u32, channels: u8) -> Result<TextureId, ResourceError>;
    fn create_texture_from_pixels(&mut self, pixels: &PixelBuffer) -> Result<TextureId, ResourceError>;
    fn update_texture(
        &mut self,
        texture: TextureId,
        region: Option<Rect<i32>>,
        pixels: &PixelBuffer,
    ) -> Result<(), ResourceError>;
    fn copy_texture(&mut self, texture: TextureId) -> Result<TextureId, ResourceError>;
    fn copy_from_pixels(
        &mut self,
        pixels: &PixelBuffer,
        src: Option<Rect<i32>>,
        dest: TargetId,
        x: i32,
        y: i32,
    ) -> Result<(), ResourceError>;
    fn destroy_texture(&mut self, texture: TextureId);
    fn generate_mipmaps(&mut self, texture: TextureId) -> Result<(), ResourceError>;
    fn set_texture_filter(&mut self, texture: TextureId, filter: Filter);
    fn replace_rgb(&mut self, texture: TextureId, from: [u8; 3], to: [u8; 3]) -> Result<(), ResourceError>;
    fn make_rgb_transparent(&mut self, texture: TextureId, rgb: [u8; 3]) -> Result<(), ResourceError>;
    /// The texture's logical area, read back as tightly packed bytes in its
    /// own format.
    fn read_texture(&mut self, texture: TextureId) -> Result<PixelBuffer, ResourceError>;
    fn texture_info(&self, texture: TextureId) -> Option<TextureInfo>;

    /// Decode an image file into a new texture.
    #[cfg(feature = "image")]
    fn load_texture(&mut self, path: &std::path::Path) -> Result<TextureId, crate::image_io::ImageIoError> {
        let pixels = crate::image_io::load_pixels(path)?;
        Ok(self.create_texture_from_pixels(&pixels)?)
    }

    /// Read a texture back and encode it to `path`. The extension picks the
    /// codec: png, bmp or tga.
    #[cfg(feature = "image")]
    fn save_texture(&mut self, texture: TextureId, path: &std::path::Path) -> Result<(), crate::image_io::ImageIoError> {
        crate::image_io::format_for_path(path)?;
        let pixels = self.read_texture(texture)?;
        crate::image_io::save_pixels(&pixels, path)
    }

    // Targets

    fn load_target(&mut self, texture: TextureId) -> Option<TargetId>;
    fn destroy_target(&mut self, target: TargetId);
    fn target_info(&self, target: TargetId) -> Option<TargetInfo>;
    /// Enable clipping to `rect`. Returns the previous clip rectangle.
    fn set_clip(&mut self, target: TargetId, rect: Rect<i32>) -> Option<Rect<i32>>;
    fn clear_clip(&mut self, target: TargetId);
    fn clear(&mut self, target: TargetId);
    fn clear_rgba(&mut self, target: TargetId, color: Color);
    /// Color at `(x, y)`, top-left origin. Transparent black when out of range.
    fn get_pixel(&mut self, target: TargetId, x: i32, y: i32) -> Color;

    // Draw state

    fn blending(&self) -> bool;
    fn set_blending(&mut self, enabled: bool);
    fn blend_mode(&self) -> BlendMode;
    fn set_blend_mode(&mut self, mode: BlendMode);
    fn rgba(&self) -> Color;
    fn set_rgba(&mut self, color: Color);
    fn z(&self) -> f32;
    /// Returns the previous value.
    fn set_z(&mut self, z: f32) -> f32;

    // Blits

    fn blit(&mut self, texture: TextureId, src: Option<Rect<i32>>, dest: TargetId, x: f32, y: f32)
    -> Result<(), BlitError>;
    fn blit_rotate(
        &mut self,
        texture: TextureId,
        src: Option<Rect<i32>>,
        dest: TargetId,
        x: f32,
        y: f32,
        angle: f32,
    ) -> Result<(), BlitError>;
    fn blit_scale(
        &mut self,
        texture: TextureId,
        src: Option<Rect<i32>>,
        dest: TargetId,
        x: f32,
        y: f32,
        scale_x: f32,
        scale_y: f32,
    ) -> Result<(), BlitError>;
    fn blit_transform(
        &mut self,
        texture: TextureId,
        src: Option<Rect<i32>>,
        dest: TargetId,
        x: f32,
        y: f32,
        angle: f32,
        scale_x: f32,
        scale_y: f32,
    ) -> Result<(), BlitError>;
    /// Like [`blit_transform`](Renderer2D::blit_transform), rotating and
    /// scaling about `(pivot_x, pivot_y)` in texture pixels.
    fn blit_transform_x(
        &mut self,
        texture: TextureId,
        src: Option<Rect<i32>>,
        dest: TargetId,
        x: f32,
        y: f32,
        pivot_x: f32,
        pivot_y: f32,
        angle: f32,
        scale_x: f32,
        scale_y: f32,
    ) -> Result<(), BlitError>;
    /// Blit through a column-major 3x3 matrix positioned at `(x, y)`.
    fn blit_transform_matrix(
        &mut self,
        texture: TextureId,
        src: Option<Rect<i32>>,
        dest: TargetId,
        x: f32,
        y: f32,
        matrix: &[f32; 9],
    ) -> Result<(), BlitError>;

    // Submission

    fn flush(&mut self);
    fn present(&mut self);
}

/// [`Renderer2D`] over any [`RenderDevice`].
///
/// # Example
///
/// ```rust
/// use glint_render::{GpuRenderer, Renderer2D, RendererConfig};
/// use glint_test_utils::MockDevice;
/// use std::sync::Arc;
///
/// let device = Arc::new(MockDevice::new());
/// let mut renderer = GpuRenderer::new(device.clone(), RendererConfig::new(320, 240)).unwrap();
///
/// let sprite = renderer.create_texture(16, 16, 4).unwrap();
/// let display = renderer.display();
/// renderer.blit(sprite, None, display, 160.0, 120.0).unwrap();
/// renderer.present();
///
/// assert_eq!(device.count_draws(), 1);
/// ```
pub struct GpuRenderer {
    pub(crate) id: RendererId,
    pub(crate) device: Arc<dyn RenderDevice>,
    pub(crate) features: GpuFeatures,
    pub(crate) config: RendererConfig,
    pub(crate) textures: SlotMap<TextureData>,
    pub(crate) targets: SlotMap<TargetData>,
    pub(crate) display: TargetId,
    pub(crate) window: Size<u32>,
    pub(crate) batch: BatchBuffer,
    pub(crate) bindings: BindingState,
    /// Applied to blit geometry as it is queued.
    pub(crate) model: Affine2,
    pub(crate) blend_mode: BlendMode,
    pub(crate) color: Color,
}

impl GpuRenderer {
    /// Probe the device, check the required capabilities and put the device
    /// into its initial state: full-window viewport, top-left projection,
    /// cleared display, white tint and normal alpha blending.
    pub fn new(device: Arc<dyn RenderDevice>, config: RendererConfig) -> Result<Self, InitError> {
        if config.width == 0 || config.height == 0 {
            return Err(InitError::ZeroSize);
        }

        let info = device.info();
        tracing::info!("Initializing renderer on {} ({:?})", info.name, info.api);

        let features = GpuFeatures::probe(&info) - config.disabled_features;
        if !config.disabled_features.is_empty() {
            tracing::warn!("Capabilities disabled by configuration: {:?}", config.disabled_features);
        }
        if let Some(missing) = config.required_features.check_support(features).missing() {
            tracing::error!("Device is missing required capabilities: {:?}", missing);
            return Err(InitError::MissingFeatures(missing));
        }

        if device.drawable_size() != (config.width, config.height)
            && !device.resize_drawable(config.width, config.height)
        {
            tracing::warn!(
                "Device refused a {}x{} drawable, keeping {:?}",
                config.width,
                config.height,
                device.drawable_size()
            );
        }
        let (window_w, window_h) = device.drawable_size();
        if window_w == 0 || window_h == 0 {
            return Err(InitError::ZeroSize);
        }
        let window = Size::new(window_w, window_h);

        device.bind_framebuffer(None);
        device.set_viewport(Viewport::sized(window_w, window_h));
        device.set_projection(display_projection(window));
        device.set_scissor(None);
        device.clear(Color::TRANSPARENT.to_normalized());
        device.set_color(Color::WHITE.to_tint());
        device.set_blend_function(BlendFunction::NORMAL);
        device.set_blending(true);

        let id = RendererId::next();
        let mut targets = SlotMap::new();
        let display_key = targets.insert(TargetData {
            framebuffer: None,
            size: window,
            clip: Clip::full(window),
            texture: None,
        });

        let batch = BatchBuffer::with_capacity(config.batch_capacity);
        tracing::debug!(
            "Renderer ready: {}x{} window, batch of {} vertices, flags {:?}",
            window_w,
            window_h,
            batch.capacity(),
            config.flags
        );

        Ok(Self {
            id,
            device,
            features,
            config,
            textures: SlotMap::new(),
            targets,
            display: TargetId {
                renderer: id,
                key: display_key,
            },
            window,
            batch,
            bindings: BindingState::default(),
            model: Affine2::IDENTITY,
            blend_mode: BlendMode::Normal,
            color: Color::WHITE,
        })
    }

    pub fn device(&self) -> &Arc<dyn RenderDevice> {
        &self.device
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    /// Vertices currently queued.
    pub fn pending_vertices(&self) -> usize {
        self.batch.len()
    }

    pub fn batch_capacity(&self) -> usize {
        self.batch.capacity()
    }

    /// Logical size of the display.
    pub(crate) fn display_size(&self) -> Size<u32> {
        self.targets
            .get(self.display.key)
            .map(|t| t.size)
            .unwrap_or(self.window)
    }

    pub(crate) fn texture_data(&self, texture: TextureId) -> Result<&TextureData, ResourceError> {
        if texture.renderer != self.id {
            return Err(ResourceError::RendererMismatch);
        }
        self.textures
            .get(texture.key)
            .ok_or(ResourceError::InvalidArgument("unknown or destroyed texture"))
    }

    pub(crate) fn target_data(&self, target: TargetId) -> Result<&TargetData, ResourceError> {
        if target.renderer != self.id {
            return Err(ResourceError::RendererMismatch);
        }
        self.targets
            .get(target.key)
            .ok_or(ResourceError::InvalidArgument("unknown or destroyed target"))
    }

    pub fn set_window_resolution(&mut self, width: u32, height: u32) -> bool {
        self.flush();
        if width == 0 || height == 0 || !self.device.resize_drawable(width, height) {
            tracing::error!("Failed to resize window to {}x{}", width, height);
            return false;
        }

        let (w, h) = self.device.drawable_size();
        self.window = Size::new(w, h);
        let virtual_size = self.display_size();

        self.device.bind_framebuffer(None);
        self.bindings.target = None;
        self.device.set_viewport(Viewport::sized(w, h));
        self.device.clear(Color::TRANSPARENT.to_normalized());
        self.device.set_color(Color::WHITE.to_tint());
        self.color = Color::WHITE;
        self.device.set_projection(display_projection(virtual_size));
        self.device.set_blend_function(BlendFunction::NORMAL);
        self.device.set_blending(true);
        self.bindings.blending = true;

        let display = self.display;
        self.clear_clip(display);
        tracing::debug!("Window resized to {}x{}", w, h);
        true
    }

    pub fn set_virtual_resolution(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            tracing::error!("Virtual resolution must be non-zero, got {}x{}", width, height);
            return;
        }
        self.flush();
        if let Some(display) = self.targets.get_mut(self.display.key) {
            display.size = Size::new(width, height);
        }
        self.device.set_projection(display_projection(Size::new(width, height)));
    }

    pub fn set_blending(&mut self, enabled: bool) {
        self.flush();
        self.device.set_blending(enabled);
        self.bindings.blending = enabled;
    }

    pub fn set_blend_mode(&mut self, mode: BlendMode) {
        self.flush();
        let plan = mode.plan(self.features);
        if let Some(function) = plan.function {
            self.device.set_blend_function(function);
        }
        if let Some(equation) = plan.equation {
            self.device.set_blend_equation(equation);
        }
        if !plan.is_complete() {
            tracing::warn!("Blend mode {:?} partially applied, device lacks {:?}", mode, plan.missing);
        }
        self.blend_mode = mode;
    }

    pub fn set_rgba(&mut self, color: Color) {
        self.flush();
        self.device.set_color(color.to_tint());
        self.color = color;
    }

    /// Run `f` with `model` composed onto the current model transform.
    pub(crate) fn with_model_transform<R>(&mut self, model: Affine2, f: impl FnOnce(&mut Self) -> R) -> R {
        let saved = self.model;
        self.model = saved * model;
        let result = f(self);
        self.model = saved;
        result
    }
}

impl Renderer2D for GpuRenderer {
    fn id(&self) -> RendererId {
        self.id
    }

    fn display(&self) -> TargetId {
        self.display
    }

    fn features(&self) -> GpuFeatures {
        self.features
    }

    fn window_size(&self) -> Size<u32> {
        self.window
    }

    fn set_window_resolution(&mut self, width: u32, height: u32) -> bool {
        GpuRenderer::set_window_resolution(self, width, height)
    }

    fn set_virtual_resolution(&mut self, width: u32, height: u32) {
        GpuRenderer::set_virtual_resolution(self, width, height)
    }

    fn create_texture(&mut self, width: u32, height: u32, channels: u8) -> Result<TextureId, ResourceError> {
        GpuRenderer::create_texture(self, width, height, channels)
    }

    fn create_texture_from_pixels(&mut self, pixels: &PixelBuffer) -> Result<TextureId, ResourceError> {
        GpuRenderer::create_texture_from_pixels(self, pixels)
    }

    fn update_texture(
        &mut self,
        texture: TextureId,
        region: Option<Rect<i32>>,
        pixels: &PixelBuffer,
    ) -> Result<(), ResourceError> {
        GpuRenderer::update_texture(self, texture, region, pixels)
    }

    fn copy_texture(&mut self, texture: TextureId) -> Result<TextureId, ResourceError> {
        GpuRenderer::copy_texture(self, texture)
    }

    fn copy_from_pixels(
        &mut self,
        pixels: &PixelBuffer,
        src: Option<Rect<i32>>,
        dest: TargetId,
        x: i32,
        y: i32,
    ) -> Result<(), ResourceError> {
        GpuRenderer::copy_from_pixels(self, pixels, src, dest, x, y)
    }

    fn destroy_texture(&mut self, texture: TextureId) {
        GpuRenderer::destroy_texture(self, texture)
    }

    fn generate_mipmaps(&mut self, texture: TextureId) -> Result<(), ResourceError> {
        GpuRenderer::generate_mipmaps(self, texture)
    }

    fn set_texture_filter(&mut self, texture: TextureId, filter: Filter) {
        GpuRenderer::set_texture_filter(self, texture, filter)
    }

    fn replace_rgb(&mut self, texture: TextureId, from: [u8; 3], to: [u8; 3]) -> Result<(), ResourceError> {
        GpuRenderer::replace_rgb(self, texture, from, to)
    }

    fn make_rgb_transparent(&mut self, texture: TextureId, rgb: [u8; 3]) -> Result<(), ResourceError> {
        GpuRenderer::make_rgb_transparent(self, texture, rgb)
    }

    fn read_texture(&mut self, texture: TextureId) -> Result<PixelBuffer, ResourceError> {
        GpuRenderer::read_texture(self, texture)
    }

    fn texture_info(&self, texture: TextureId) -> Option<TextureInfo> {
        self.texture_data(texture).ok().map(TextureInfo::from)
    }

    fn load_target(&mut self, texture: TextureId) -> Option<TargetId> {
        GpuRenderer::load_target(self, texture)
    }

    fn destroy_target(&mut self, target: TargetId) {
        GpuRenderer::destroy_target(self, target)
    }

    fn target_info(&self, target: TargetId) -> Option<TargetInfo> {
        self.target_data(target).ok().map(TargetInfo::from)
    }

    fn set_clip(&mut self, target: TargetId, rect: Rect<i32>) -> Option<Rect<i32>> {
        GpuRenderer::set_clip(self, target, rect)
    }

    fn clear_clip(&mut self, target: TargetId) {
        GpuRenderer::clear_clip(self, target)
    }

    fn clear(&mut self, target: TargetId) {
        GpuRenderer::clear_rgba(self, target, Color::TRANSPARENT)
    }

    fn clear_rgba(&mut self, target: TargetId, color: Color) {
        GpuRenderer::clear_rgba(self, target, color)
    }

    fn get_pixel(&mut self, target: TargetId, x: i32, y: i32) -> Color {
        GpuRenderer::get_pixel(self, target, x, y)
    }

    fn blending(&self) -> bool {
        self.bindings.blending
    }

    fn set_blending(&mut self, enabled: bool) {
        GpuRenderer::set_blending(self, enabled)
    }

    fn blend_mode(&self) -> BlendMode {
        self.blend_mode
    }

    fn set_blend_mode(&mut self, mode: BlendMode) {
        GpuRenderer::set_blend_mode(self, mode)
    }

    fn rgba(&self) -> Color {
        self.color
    }

    fn set_rgba(&mut self, color: Color) {
        GpuRenderer::set_rgba(self, color)
    }

    fn z(&self) -> f32 {
        self.bindings.z
    }

    fn set_z(&mut self, z: f32) -> f32 {
        std::mem::replace(&mut self.bindings.z, z)
    }

    fn blit(&mut self, texture: TextureId, src: Option<Rect<i32>>, dest: TargetId, x: f32, y: f32)
    -> Result<(), BlitError> {
        GpuRenderer::blit(self, texture, src, dest, x, y)
    }

    fn blit_rotate(
        &mut self,
        texture: TextureId,
        src: Option<Rect<i32>>,
        dest: TargetId,
        x: f32,
        y: f32,
        angle: f32,
    ) -> Result<(), BlitError> {
        GpuRenderer::blit_rotate(self, texture, src, dest, x, y, angle)
    }

    fn blit_scale(
        &mut self,
        texture: TextureId,
        src: Option<Rect<i32>>,
        dest: TargetId,
        x: f32,
        y: f32,
        scale_x: f32,
        scale_y: f32,
    ) -> Result<(), BlitError> {
        GpuRenderer::blit_scale(self, texture, src, dest, x, y, scale_x, scale_y)
    }

    fn blit_transform(
        &mut self,
        texture: TextureId,
        src: Option<Rect<i32>>,
        dest: TargetId,
        x: f32,
        y: f32,
        angle: f32,
        scale_x: f32,
        scale_y: f32,
    ) -> Result<(), BlitError> {
        GpuRenderer::blit_transform(self, texture, src, dest, x, y, angle, scale_x, scale_y)
    }

    fn blit_transform_x(
        &mut self,
        texture: TextureId,
        src: Option<Rect<i32>>,
        dest: TargetId,
        x: f32,
        y: f32,
        pivot_x: f32,
        pivot_y: f32,
        angle: f32,
        scale_x: f32,
        scale_y: f32,
    ) -> Result<(), BlitError> {
        GpuRenderer::blit_transform_x(
            self, texture, src, dest, x, y, pivot_x, pivot_y, angle, scale_x, scale_y,
        )
    }

    fn blit_transform_matrix(
        &mut self,
        texture: TextureId,
        src: Option<Rect<i32>>,
        dest: TargetId,
        x: f32,
        y: f32,
        matrix: &[f32; 9],
    ) -> Result<(), BlitError> {
        GpuRenderer::blit_transform_matrix(self, texture, src, dest, x, y, matrix)
    }

    fn flush(&mut self) {
        GpuRenderer::flush(self)
    }

    fn present(&mut self) {
        GpuRenderer::present(self)
    }
}

impl Drop for GpuRenderer {
    fn drop(&mut self) {
        let framebuffers: Vec<_> = self.targets.iter().filter_map(|(_, t)| t.framebuffer).collect();
        for framebuffer in framebuffers {
            self.device.destroy_framebuffer(framebuffer);
        }
        let textures: Vec<_> = self.textures.iter().map(|(_, t)| t.handle).collect();
        for texture in textures {
            self.device.destroy_texture(texture);
        }
        tracing::debug!(
            "Renderer shut down, released {} targets and {} textures",
            self.targets.len().saturating_sub(1),
            self.textures.len()
        );
    }
}

impl std::fmt::Debug for GpuRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuRenderer")
            .field("id", &self.id)
            .field("features", &self.features)
            .field("window", &self.window)
            .field("textures", &self.textures.len())
            .field("targets", &self.targets.len())
            .field("pending_vertices", &self.batch.len())
            .finish()
    }
}
