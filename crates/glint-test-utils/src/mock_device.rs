//! Recording implementation of [`RenderDevice`] for tests.
//!
//! [`MockDevice`] never touches a GPU. It records every call, keeps CPU
//! copies of texture and display storage so uploads, clears and readbacks
//! are observable, and can be told to fail allocations or report incomplete
//! framebuffers.

use crate::{gpu_types::*, render_device::RenderDevice};
use glam::Mat4;
use parking_lot::Mutex;
use glint_core::alloc::HashMap;

/// Extensions reported by a default [`MockDevice`].
pub const DESKTOP_EXTENSIONS: &[&str] = &[
    "GL_ARB_texture_non_power_of_two",
    "GL_EXT_framebuffer_object",
    "GL_ARB_framebuffer_object",
];

/// Snapshot of the device state a draw was issued with.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawRecord {
    pub vertices: Vec<BatchVertex>,
    pub texture: Option<TextureHandle>,
    pub framebuffer: Option<FramebufferHandle>,
    pub viewport: Viewport,
    pub projection: Mat4,
    pub scissor: Option<ScissorRect>,
    pub blending: bool,
    pub blend_function: BlendFunction,
    pub blend_equation: BlendEquation,
    pub color: [f32; 4],
}

/// Records a device operation for verification in tests.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCall {
    ResizeDrawable { width: u32, height: u32 },
    CreateTexture { handle: TextureHandle, width: u32, height: u32, format: PixelFormat },
    WriteTexture { handle: TextureHandle, region: DeviceRect, format: PixelFormat },
    SetTextureFilter { handle: TextureHandle, filter: TextureFilter },
    GenerateMipmaps { handle: TextureHandle },
    DestroyTexture { handle: TextureHandle },
    BindTexture(Option<TextureHandle>),
    CreateFramebuffer { handle: FramebufferHandle },
    AttachColorTexture { framebuffer: FramebufferHandle, texture: TextureHandle },
    DestroyFramebuffer { handle: FramebufferHandle },
    BindFramebuffer(Option<FramebufferHandle>),
    SetViewport(Viewport),
    SetProjection(Mat4),
    SetScissor(Option<ScissorRect>),
    SetBlending(bool),
    SetBlendFunction(BlendFunction),
    SetBlendEquation(BlendEquation),
    SetColor([f32; 4]),
    Clear { color: [f32; 4], framebuffer: Option<FramebufferHandle> },
    Draw(DrawRecord),
    ReadPixels { region: DeviceRect, format: PixelFormat },
    SwapBuffers,
}

#[derive(Debug)]
struct MockTexture {
    width: u32,
    height: u32,
    /// Always RGBA; RGB uploads get an opaque alpha.
    pixels: Vec<u8>,
    filter: TextureFilter,
    mipmapped: bool,
}

#[derive(Debug)]
struct MockState {
    info: DeviceInfo,
    drawable: (u32, u32),
    display: Vec<u8>,
    textures: HashMap<u32, MockTexture>,
    framebuffers: HashMap<u32, Option<TextureHandle>>,
    next_texture: u32,
    next_framebuffer: u32,
    bound_texture: Option<TextureHandle>,
    bound_framebuffer: Option<FramebufferHandle>,
    viewport: Viewport,
    projection: Mat4,
    scissor: Option<ScissorRect>,
    blending: bool,
    blend_function: BlendFunction,
    blend_equation: BlendEquation,
    color: [f32; 4],
    fail_texture_allocations: bool,
    fail_framebuffer_allocations: bool,
    incomplete_framebuffers: bool,
    refuse_resize: bool,
    short_reads: bool,
}

impl MockState {
    /// Storage of the bound framebuffer as `(pixels, width, height)`.
    fn surface_mut(&mut self) -> Option<(&mut Vec<u8>, u32, u32)> {
        match self.bound_framebuffer {
            None => {
                let (w, h) = self.drawable;
                Some((&mut self.display, w, h))
            }
            Some(fb) => {
                let texture = (*self.framebuffers.get(&fb.raw())?)?;
                let tex = self.textures.get_mut(&texture.raw())?;
                Some((&mut tex.pixels, tex.width, tex.height))
            }
        }
    }
}

fn to_rgba8(color: [f32; 4]) -> [u8; 4] {
    color.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8)
}

/// Mock implementation of [`RenderDevice`].
///
/// # Example
///
/// ```rust
/// use glint_test_utils::{MockDevice, PixelFormat, RenderDevice};
///
/// let mock = MockDevice::new();
/// let texture = mock.create_texture(4, 4, PixelFormat::Rgba).unwrap();
///
/// assert_eq!(mock.count_texture_creates(), 1);
/// assert_eq!(mock.texture_size(texture), Some((4, 4)));
/// ```
pub struct MockDevice {
    calls: Mutex<Vec<DeviceCall>>,
    state: Mutex<MockState>,
}

impl MockDevice {
    /// A desktop-class device with every optional capability and an
    /// 800x600 drawable.
    pub fn new() -> Self {
        Self::with_info(
            DeviceInfo::new(DeviceApi::Desktop, "mock").with_extensions(DESKTOP_EXTENSIONS.iter().copied()),
        )
    }

    pub fn with_info(info: DeviceInfo) -> Self {
        let drawable = (800, 600);
        Self {
            calls: Mutex::new(Vec::new()),
            state: Mutex::new(MockState {
                info,
                drawable,
                display: vec![0; drawable.0 as usize * drawable.1 as usize * 4],
                textures: HashMap::new(),
                framebuffers: HashMap::new(),
                next_texture: 1,
                next_framebuffer: 1,
                bound_texture: None,
                bound_framebuffer: None,
                viewport: Viewport::sized(drawable.0, drawable.1),
                projection: Mat4::IDENTITY,
                scissor: None,
                blending: false,
                blend_function: BlendFunction::NORMAL,
                blend_equation: wgpu::BlendOperation::Add,
                color: [1.0; 4],
                fail_texture_allocations: false,
                fail_framebuffer_allocations: false,
                incomplete_framebuffers: false,
                refuse_resize: false,
                short_reads: false,
            }),
        }
    }

    /// An embedded-class device reporting exactly `extensions`.
    pub fn embedded(extensions: &[&str]) -> Self {
        Self::with_info(DeviceInfo::new(DeviceApi::Embedded, "mock-es").with_extensions(extensions.iter().copied()))
    }

    pub fn with_drawable_size(self, width: u32, height: u32) -> Self {
        {
            let mut state = self.state.lock();
            state.drawable = (width, height);
            state.display = vec![0; width as usize * height as usize * 4];
            state.viewport = Viewport::sized(width, height);
        }
        self
    }

    // Failure injection

    pub fn fail_texture_allocations(&self, fail: bool) {
        self.state.lock().fail_texture_allocations = fail;
    }

    pub fn fail_framebuffer_allocations(&self, fail: bool) {
        self.state.lock().fail_framebuffer_allocations = fail;
    }

    pub fn report_incomplete_framebuffers(&self, incomplete: bool) {
        self.state.lock().incomplete_framebuffers = incomplete;
    }

    pub fn refuse_resize(&self, refuse: bool) {
        self.state.lock().refuse_resize = refuse;
    }

    /// Drop the last byte of every readback, like a backend returning a
    /// truncated buffer.
    pub fn short_reads(&self, short: bool) {
        self.state.lock().short_reads = short;
    }

    // Call log

    /// Get a copy of all recorded calls.
    pub fn calls(&self) -> Vec<DeviceCall> {
        self.calls.lock().clone()
    }

    /// Clear recorded calls (useful between test steps).
    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    fn count(&self, pred: impl Fn(&DeviceCall) -> bool) -> usize {
        self.calls.lock().iter().filter(|call| pred(call)).count()
    }

    /// Every draw issued so far, in order.
    pub fn draws(&self) -> Vec<DrawRecord> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                DeviceCall::Draw(record) => Some(record.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn count_draws(&self) -> usize {
        self.count(|call| matches!(call, DeviceCall::Draw(_)))
    }

    pub fn count_texture_creates(&self) -> usize {
        self.count(|call| matches!(call, DeviceCall::CreateTexture { .. }))
    }

    pub fn count_texture_writes(&self) -> usize {
        self.count(|call| matches!(call, DeviceCall::WriteTexture { .. }))
    }

    pub fn count_framebuffer_creates(&self) -> usize {
        self.count(|call| matches!(call, DeviceCall::CreateFramebuffer { .. }))
    }

    pub fn count_texture_binds(&self) -> usize {
        self.count(|call| matches!(call, DeviceCall::BindTexture(_)))
    }

    pub fn count_framebuffer_binds(&self) -> usize {
        self.count(|call| matches!(call, DeviceCall::BindFramebuffer(_)))
    }

    pub fn count_swaps(&self) -> usize {
        self.count(|call| matches!(call, DeviceCall::SwapBuffers))
    }

    // Storage inspection

    pub fn live_textures(&self) -> usize {
        self.state.lock().textures.len()
    }

    pub fn live_framebuffers(&self) -> usize {
        self.state.lock().framebuffers.len()
    }

    pub fn texture_size(&self, texture: TextureHandle) -> Option<(u32, u32)> {
        self.state
            .lock()
            .textures
            .get(&texture.raw())
            .map(|tex| (tex.width, tex.height))
    }

    /// RGBA copy of the texture storage, rows in upload order.
    pub fn texture_pixels(&self, texture: TextureHandle) -> Option<Vec<u8>> {
        self.state
            .lock()
            .textures
            .get(&texture.raw())
            .map(|tex| tex.pixels.clone())
    }

    pub fn texture_filter(&self, texture: TextureHandle) -> Option<TextureFilter> {
        self.state.lock().textures.get(&texture.raw()).map(|tex| tex.filter)
    }

    pub fn is_mipmapped(&self, texture: TextureHandle) -> bool {
        self.state
            .lock()
            .textures
            .get(&texture.raw())
            .is_some_and(|tex| tex.mipmapped)
    }

    /// RGBA copy of the display storage, rows bottom-up.
    pub fn display_pixels(&self) -> Vec<u8> {
        self.state.lock().display.clone()
    }

    pub fn bound_texture(&self) -> Option<TextureHandle> {
        self.state.lock().bound_texture
    }

    pub fn bound_framebuffer(&self) -> Option<FramebufferHandle> {
        self.state.lock().bound_framebuffer
    }

    pub fn scissor(&self) -> Option<ScissorRect> {
        self.state.lock().scissor
    }

    pub fn blending(&self) -> bool {
        self.state.lock().blending
    }

    pub fn blend_function(&self) -> BlendFunction {
        self.state.lock().blend_function
    }

    pub fn blend_equation(&self) -> BlendEquation {
        self.state.lock().blend_equation
    }

    pub fn color(&self) -> [f32; 4] {
        self.state.lock().color
    }

    fn record(&self, call: DeviceCall) {
        self.calls.lock().push(call);
    }
}

impl Default for MockDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderDevice for MockDevice {
    fn info(&self) -> DeviceInfo {
        self.state.lock().info.clone()
    }

    fn drawable_size(&self) -> (u32, u32) {
        self.state.lock().drawable
    }

    fn resize_drawable(&self, width: u32, height: u32) -> bool {
        {
            let mut state = self.state.lock();
            if state.refuse_resize || width == 0 || height == 0 {
                return false;
            }
            state.drawable = (width, height);
            state.display = vec![0; width as usize * height as usize * 4];
        }
        self.record(DeviceCall::ResizeDrawable { width, height });
        true
    }

    fn create_texture(
        &self,
        width: u32,
        height: u32,
        format: PixelFormat,
    ) -> Result<TextureHandle, DeviceError> {
        let handle = {
            let mut state = self.state.lock();
            if state.fail_texture_allocations {
                return Err(DeviceError::HandleAllocation);
            }
            let handle = TextureHandle::new(state.next_texture).ok_or(DeviceError::HandleAllocation)?;
            state.next_texture += 1;
            state.textures.insert(
                handle.raw(),
                MockTexture {
                    width,
                    height,
                    pixels: vec![0; width as usize * height as usize * 4],
                    filter: TextureFilter::default(),
                    mipmapped: false,
                },
            );
            handle
        };
        self.record(DeviceCall::CreateTexture {
            handle,
            width,
            height,
            format,
        });
        Ok(handle)
    }

    fn write_texture(
        &self,
        texture: TextureHandle,
        region: DeviceRect,
        format: PixelFormat,
        data: &[u8],
    ) -> Result<(), DeviceError> {
        {
            let mut state = self.state.lock();
            let tex = state
                .textures
                .get_mut(&texture.raw())
                .ok_or(DeviceError::InvalidHandle)?;
            let bpp = format.bytes_per_pixel();
            if !region.fits(tex.width, tex.height) || data.len() != region.pixel_count() * bpp {
                return Err(DeviceError::InvalidRegion);
            }
            for row in 0..region.height as usize {
                for col in 0..region.width as usize {
                    let src = (row * region.width as usize + col) * bpp;
                    let dst = ((region.y as usize + row) * tex.width as usize + region.x as usize + col) * 4;
                    tex.pixels[dst..dst + 3].copy_from_slice(&data[src..src + 3]);
                    tex.pixels[dst + 3] = if bpp == 4 { data[src + 3] } else { 255 };
                }
            }
        }
        self.record(DeviceCall::WriteTexture {
            handle: texture,
            region,
            format,
        });
        Ok(())
    }

    fn set_texture_filter(&self, texture: TextureHandle, filter: TextureFilter) {
        if let Some(tex) = self.state.lock().textures.get_mut(&texture.raw()) {
            tex.filter = filter;
        }
        self.record(DeviceCall::SetTextureFilter {
            handle: texture,
            filter,
        });
    }

    fn generate_mipmaps(&self, texture: TextureHandle) -> Result<(), DeviceError> {
        self.state
            .lock()
            .textures
            .get_mut(&texture.raw())
            .ok_or(DeviceError::InvalidHandle)?
            .mipmapped = true;
        self.record(DeviceCall::GenerateMipmaps { handle: texture });
        Ok(())
    }

    fn destroy_texture(&self, texture: TextureHandle) {
        {
            let mut state = self.state.lock();
            state.textures.remove(&texture.raw());
            if state.bound_texture == Some(texture) {
                state.bound_texture = None;
            }
        }
        self.record(DeviceCall::DestroyTexture { handle: texture });
    }

    fn bind_texture(&self, texture: Option<TextureHandle>) {
        self.state.lock().bound_texture = texture;
        self.record(DeviceCall::BindTexture(texture));
    }

    fn create_framebuffer(&self) -> Result<FramebufferHandle, DeviceError> {
        let handle = {
            let mut state = self.state.lock();
            if state.fail_framebuffer_allocations {
                return Err(DeviceError::HandleAllocation);
            }
            let handle = FramebufferHandle::new(state.next_framebuffer).ok_or(DeviceError::HandleAllocation)?;
            state.next_framebuffer += 1;
            state.framebuffers.insert(handle.raw(), None);
            handle
        };
        self.record(DeviceCall::CreateFramebuffer { handle });
        Ok(handle)
    }

    fn attach_color_texture(
        &self,
        framebuffer: FramebufferHandle,
        texture: TextureHandle,
    ) -> Result<(), DeviceError> {
        {
            let mut state = self.state.lock();
            if !state.textures.contains_key(&texture.raw()) {
                return Err(DeviceError::InvalidHandle);
            }
            let slot = state
                .framebuffers
                .get_mut(&framebuffer.raw())
                .ok_or(DeviceError::InvalidHandle)?;
            *slot = Some(texture);
        }
        self.record(DeviceCall::AttachColorTexture {
            framebuffer,
            texture,
        });
        Ok(())
    }

    fn framebuffer_complete(&self, framebuffer: FramebufferHandle) -> bool {
        let state = self.state.lock();
        if state.incomplete_framebuffers {
            return false;
        }
        match state.framebuffers.get(&framebuffer.raw()) {
            Some(Some(texture)) => state.textures.contains_key(&texture.raw()),
            _ => false,
        }
    }

    fn destroy_framebuffer(&self, framebuffer: FramebufferHandle) {
        {
            let mut state = self.state.lock();
            state.framebuffers.remove(&framebuffer.raw());
            if state.bound_framebuffer == Some(framebuffer) {
                state.bound_framebuffer = None;
            }
        }
        self.record(DeviceCall::DestroyFramebuffer {
            handle: framebuffer,
        });
    }

    fn bind_framebuffer(&self, framebuffer: Option<FramebufferHandle>) {
        self.state.lock().bound_framebuffer = framebuffer;
        self.record(DeviceCall::BindFramebuffer(framebuffer));
    }

    fn viewport(&self) -> Viewport {
        self.state.lock().viewport
    }

    fn set_viewport(&self, viewport: Viewport) {
        self.state.lock().viewport = viewport;
        self.record(DeviceCall::SetViewport(viewport));
    }

    fn projection(&self) -> Mat4 {
        self.state.lock().projection
    }

    fn set_projection(&self, projection: Mat4) {
        self.state.lock().projection = projection;
        self.record(DeviceCall::SetProjection(projection));
    }

    fn set_scissor(&self, scissor: Option<ScissorRect>) {
        self.state.lock().scissor = scissor;
        self.record(DeviceCall::SetScissor(scissor));
    }

    fn set_blending(&self, enabled: bool) {
        self.state.lock().blending = enabled;
        self.record(DeviceCall::SetBlending(enabled));
    }

    fn set_blend_function(&self, function: BlendFunction) {
        self.state.lock().blend_function = function;
        self.record(DeviceCall::SetBlendFunction(function));
    }

    fn set_blend_equation(&self, equation: BlendEquation) {
        self.state.lock().blend_equation = equation;
        self.record(DeviceCall::SetBlendEquation(equation));
    }

    fn set_color(&self, color: [f32; 4]) {
        self.state.lock().color = color;
        self.record(DeviceCall::SetColor(color));
    }

    fn clear(&self, color: [f32; 4]) {
        let framebuffer = {
            let mut state = self.state.lock();
            let scissor = state.scissor;
            let framebuffer = state.bound_framebuffer;
            if let Some((pixels, width, height)) = state.surface_mut() {
                let (x0, y0, x1, y1) = match scissor {
                    Some(r) => r.clamp_to(width, height),
                    None => (0, 0, width, height),
                };
                let rgba = to_rgba8(color);
                for y in y0..y1 {
                    for x in x0..x1 {
                        let i = (y as usize * width as usize + x as usize) * 4;
                        pixels[i..i + 4].copy_from_slice(&rgba);
                    }
                }
            }
            framebuffer
        };
        self.record(DeviceCall::Clear { color, framebuffer });
    }

    fn draw_triangles(&self, vertices: &[BatchVertex]) -> Result<(), DeviceError> {
        let record = {
            let state = self.state.lock();
            if let Some(texture) = state.bound_texture
                && !state.textures.contains_key(&texture.raw())
            {
                return Err(DeviceError::InvalidHandle);
            }
            if let Some(fb) = state.bound_framebuffer
                && !state.framebuffers.contains_key(&fb.raw())
            {
                return Err(DeviceError::InvalidHandle);
            }
            DrawRecord {
                vertices: vertices.to_vec(),
                texture: state.bound_texture,
                framebuffer: state.bound_framebuffer,
                viewport: state.viewport,
                projection: state.projection,
                scissor: state.scissor,
                blending: state.blending,
                blend_function: state.blend_function,
                blend_equation: state.blend_equation,
                color: state.color,
            }
        };
        self.record(DeviceCall::Draw(record));
        Ok(())
    }

    fn read_pixels(&self, region: DeviceRect, format: PixelFormat) -> Result<Vec<u8>, DeviceError> {
        let out = {
            let mut state = self.state.lock();
            let (pixels, width, height) = state.surface_mut().ok_or(DeviceError::FramebufferIncomplete)?;
            if !region.fits(width, height) {
                return Err(DeviceError::InvalidRegion);
            }
            let bpp = format.bytes_per_pixel();
            let mut out = Vec::with_capacity(region.pixel_count() * bpp);
            for row in 0..region.height as usize {
                for col in 0..region.width as usize {
                    let i = ((region.y as usize + row) * width as usize + region.x as usize + col) * 4;
                    out.extend_from_slice(&pixels[i..i + bpp]);
                }
            }
            if state.short_reads {
                out.pop();
            }
            out
        };
        self.record(DeviceCall::ReadPixels { region, format });
        Ok(out)
    }

    fn swap_buffers(&self) -> Result<(), DeviceError> {
        self.record(DeviceCall::SwapBuffers);
        Ok(())
    }
}
