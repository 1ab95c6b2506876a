//! [`RenderDevice`] on wgpu.
//!
//! The device renders headlessly: the display is an RGBA texture owned by the
//! device and "framebuffers" are attachments of renderer textures. Every
//! texture is stored as `Rgba8Unorm` with a full mip chain; RGB uploads gain
//! an opaque alpha and RGB reads drop it.
//!
//! The seam speaks in bottom-left rectangles. Display rows are converted
//! with `H - (y + h)`; offscreen targets keep upload-order rows by flipping
//! clip-space y in the vertex shader instead.

use glint_core::alloc::HashMap;
use bytemuck::{Pod, Zeroable};
use glam::Mat4;
use glint_core::profiling::profile_function;
use glint_test_utils::{
    BatchVertex, BlendEquation, BlendFunction, DeviceApi, DeviceError, DeviceInfo, DeviceRect, FramebufferHandle,
    MagFilter, MinFilter, PixelFormat, RenderDevice, ScissorRect, TextureFilter, TextureHandle, Viewport,
};
use parking_lot::Mutex;
use wgpu::util::DeviceExt;

/// Extension names the renderer's capability probe understands. wgpu always
/// provides non-power-of-two textures and render attachments.
const WGPU_EXTENSIONS: &[&str] = &["GL_ARB_texture_non_power_of_two", "GL_EXT_framebuffer_object"];

const TEXTURE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Configuration for [`WgpuDevice`].
#[derive(Debug, Clone)]
pub struct WgpuDeviceDescriptor {
    /// GPU backends to use
    pub backends: wgpu::Backends,
    /// Power preference for adapter selection
    pub power_preference: wgpu::PowerPreference,
    /// Whether to force fallback adapter
    pub force_fallback_adapter: bool,
    /// Initial display size
    pub width: u32,
    pub height: u32,
    /// Optional label for debugging
    pub label: Option<&'static str>,
}

impl Default for WgpuDeviceDescriptor {
    fn default() -> Self {
        Self {
            backends: wgpu::Backends::all(),
            power_preference: wgpu::PowerPreference::HighPerformance,
            force_fallback_adapter: false,
            width: 800,
            height: 600,
            label: None,
        }
    }
}

impl WgpuDeviceDescriptor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the power preference.
    pub fn power_preference(mut self, preference: wgpu::PowerPreference) -> Self {
        self.power_preference = preference;
        self
    }

    /// Set the backends to use.
    pub fn backends(mut self, backends: wgpu::Backends) -> Self {
        self.backends = backends;
        self
    }

    pub fn force_fallback_adapter(mut self, force: bool) -> Self {
        self.force_fallback_adapter = force;
        self
    }

    pub fn size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Set the debug label.
    pub fn label(mut self, label: &'static str) -> Self {
        self.label = Some(label);
        self
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct Uniforms {
    projection: [[f32; 4]; 4],
    color: [f32; 4],
    flip_y: f32,
    _padding: [f32; 3],
}

static_assertions::const_assert_eq!(std::mem::size_of::<Uniforms>(), 96);

struct GpuTexture {
    texture: wgpu::Texture,
    /// All mip levels, for sampling.
    view: wgpu::TextureView,
    /// Level 0 only, for rendering into.
    attachment: wgpu::TextureView,
    width: u32,
    height: u32,
    mip_levels: u32,
    filter: TextureFilter,
}

impl GpuTexture {
    fn new(device: &wgpu::Device, width: u32, height: u32, mip_levels: u32, label: &str) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: mip_levels,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: TEXTURE_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::COPY_SRC
                | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let attachment = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some("glint attachment view"),
            base_mip_level: 0,
            mip_level_count: Some(1),
            ..Default::default()
        });
        Self {
            texture,
            view,
            attachment,
            width,
            height,
            mip_levels,
            filter: TextureFilter::LINEAR,
        }
    }
}

struct WgpuState {
    display: GpuTexture,
    textures: HashMap<u32, GpuTexture>,
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
    pipelines: HashMap<Option<wgpu::BlendState>, wgpu::RenderPipeline>,
    samplers: HashMap<TextureFilter, wgpu::Sampler>,
}

impl WgpuState {
    /// The texture the bound framebuffer draws into.
    fn surface(&self) -> Result<(&GpuTexture, bool), DeviceError> {
        match self.bound_framebuffer {
            None => Ok((&self.display, true)),
            Some(fb) => {
                let texture = self
                    .framebuffers
                    .get(&fb.raw())
                    .copied()
                    .flatten()
                    .ok_or(DeviceError::FramebufferIncomplete)?;
                let texture = self.textures.get(&texture.raw()).ok_or(DeviceError::InvalidHandle)?;
                Ok((texture, false))
            }
        }
    }
}

/// Number of levels in a full mip chain for `width x height`.
fn mip_level_count(width: u32, height: u32) -> u32 {
    32 - width.max(height).max(1).leading_zeros()
}

/// Convert a bottom-left rectangle into wgpu's top-left rows on a surface
/// `height` rows tall. Offscreen surfaces already share row order.
fn to_top_left(rect: DeviceRect, height: u32, is_display: bool) -> DeviceRect {
    if is_display {
        let y = height as i64 - (rect.y as i64 + rect.height as i64);
        DeviceRect::new(rect.x, y.clamp(i32::MIN as i64, i32::MAX as i64) as i32, rect.width, rect.height)
    } else {
        rect
    }
}

/// Clamp a scissor to the surface; wgpu rejects rectangles that leave it.
fn clamp_scissor(rect: DeviceRect, width: u32, height: u32) -> (u32, u32, u32, u32) {
    let (x0, y0, x1, y1) = rect.clamp_to(width, height);
    (x0, y0, x1 - x0, y1 - y0)
}

/// Average 2x2 blocks of an RGBA level into the next level down.
fn downsample(src: &[u8], width: u32, height: u32) -> (Vec<u8>, u32, u32) {
    let (dw, dh) = ((width / 2).max(1), (height / 2).max(1));
    let mut out = Vec::with_capacity(dw as usize * dh as usize * 4);
    for y in 0..dh {
        for x in 0..dw {
            let xs = [(2 * x).min(width - 1), (2 * x + 1).min(width - 1)];
            let ys = [(2 * y).min(height - 1), (2 * y + 1).min(height - 1)];
            for c in 0..4 {
                let sum: u32 = ys
                    .iter()
                    .flat_map(|&sy| xs.iter().map(move |&sx| (sy, sx)))
                    .map(|(sy, sx)| src[((sy * width + sx) * 4) as usize + c] as u32)
                    .sum();
                out.push(((sum + 2) / 4) as u8);
            }
        }
    }
    (out, dw, dh)
}

fn expand_to_rgba(data: &[u8], format: PixelFormat) -> Vec<u8> {
    match format {
        PixelFormat::Rgba => data.to_vec(),
        PixelFormat::Rgb => data.chunks_exact(3).flat_map(|px| [px[0], px[1], px[2], 255]).collect(),
    }
}

/// Headless wgpu implementation of [`RenderDevice`].
///
/// # Example
///
/// ```rust,no_run
/// use glint_render::{GpuRenderer, RendererConfig, WgpuDevice, WgpuDeviceDescriptor};
/// use std::sync::Arc;
///
/// let device = WgpuDevice::new(WgpuDeviceDescriptor::new().size(640, 480)).unwrap();
/// let renderer = GpuRenderer::new(Arc::new(device), RendererConfig::new(640, 480)).unwrap();
/// ```
pub struct WgpuDevice {
    device: wgpu::Device,
    queue: wgpu::Queue,
    adapter_name: String,
    bind_group_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    shader: wgpu::ShaderModule,
    white: GpuTexture,
    state: Mutex<WgpuState>,
}

impl WgpuDevice {
    /// Create a device synchronously.
    pub fn new(descriptor: WgpuDeviceDescriptor) -> Result<Self, DeviceError> {
        pollster::block_on(Self::new_async(descriptor))
    }

    pub async fn new_async(descriptor: WgpuDeviceDescriptor) -> Result<Self, DeviceError> {
        if descriptor.width == 0 || descriptor.height == 0 {
            return Err(DeviceError::InvalidRegion);
        }
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: descriptor.backends,
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: descriptor.power_preference,
                compatible_surface: None,
                force_fallback_adapter: descriptor.force_fallback_adapter,
            })
            .await
            .map_err(|e| DeviceError::Backend(format!("no suitable adapter: {e}")))?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: descriptor.label,
                ..Default::default()
            })
            .await
            .map_err(|e| DeviceError::Backend(format!("device request failed: {e}")))?;

        let adapter_name = adapter.get_info().name;
        tracing::info!("Created wgpu device on {}", adapter_name);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("glint blit shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/blit.wgsl").into()),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("glint bind group layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        multisampled: false,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("glint pipeline layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let white = GpuTexture::new(&device, 1, 1, 1, "glint white texel");
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &white.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &[255; 4],
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4),
                rows_per_image: Some(1),
            },
            wgpu::Extent3d {
                width: 1,
                height: 1,
                depth_or_array_layers: 1,
            },
        );

        let display = GpuTexture::new(&device, descriptor.width, descriptor.height, 1, "glint display");
        let state = WgpuState {
            display,
            textures: HashMap::default(),
            framebuffers: HashMap::default(),
            next_texture: 1,
            next_framebuffer: 1,
            bound_texture: None,
            bound_framebuffer: None,
            viewport: Viewport::sized(descriptor.width, descriptor.height),
            projection: Mat4::IDENTITY,
            scissor: None,
            blending: false,
            blend_function: BlendFunction::NORMAL,
            blend_equation: wgpu::BlendOperation::Add,
            color: [1.0; 4],
            pipelines: HashMap::default(),
            samplers: HashMap::default(),
        };

        Ok(Self {
            device,
            queue,
            adapter_name,
            bind_group_layout,
            pipeline_layout,
            shader,
            white,
            state: Mutex::new(state),
        })
    }

    pub fn wgpu_device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Run `f`, turning wgpu validation errors raised meanwhile into
    /// [`DeviceError::Backend`].
    fn validated<R>(&self, what: &str, f: impl FnOnce() -> R) -> Result<R, DeviceError> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let result = f();
        match pollster::block_on(self.device.pop_error_scope()) {
            Some(e) => {
                tracing::error!("wgpu rejected {}: {}", what, e);
                Err(DeviceError::Backend(format!("{what}: {e}")))
            }
            None => Ok(result),
        }
    }

    fn create_pipeline(&self, blend: Option<wgpu::BlendState>) -> wgpu::RenderPipeline {
        tracing::debug!("Creating blit pipeline for blend state {:?}", blend);
        self.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("glint blit pipeline"),
            layout: Some(&self.pipeline_layout),
            vertex: wgpu::VertexState {
                module: &self.shader,
                entry_point: Some("vs_main"),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: std::mem::size_of::<BatchVertex>() as wgpu::BufferAddress,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x2],
                }],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &self.shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: TEXTURE_FORMAT,
                    blend,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState {
                count: 1,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            multiview: None,
            cache: None,
        })
    }

    fn create_sampler(&self, filter: TextureFilter) -> wgpu::Sampler {
        let (min_filter, mipmap_filter, lod_max_clamp) = match filter.min {
            MinFilter::Nearest => (wgpu::FilterMode::Nearest, wgpu::FilterMode::Nearest, 0.0),
            MinFilter::Linear => (wgpu::FilterMode::Linear, wgpu::FilterMode::Nearest, 0.0),
            MinFilter::LinearMipmapNearest => (wgpu::FilterMode::Linear, wgpu::FilterMode::Nearest, 32.0),
            MinFilter::LinearMipmapLinear => (wgpu::FilterMode::Linear, wgpu::FilterMode::Linear, 32.0),
        };
        self.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("glint sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: match filter.mag {
                MagFilter::Nearest => wgpu::FilterMode::Nearest,
                MagFilter::Linear => wgpu::FilterMode::Linear,
            },
            min_filter,
            mipmap_filter,
            lod_max_clamp,
            ..Default::default()
        })
    }

    /// Encode one triangle-list pass into the bound surface.
    fn submit_pass(
        &self,
        state: &mut WgpuState,
        vertices: &[BatchVertex],
        uniforms: Uniforms,
        blend: Option<wgpu::BlendState>,
        texture: Option<TextureHandle>,
    ) -> Result<(), DeviceError> {
        if !state.pipelines.contains_key(&blend) {
            let pipeline = self.create_pipeline(blend);
            state.pipelines.insert(blend, pipeline);
        }
        let filter = match texture {
            Some(handle) => {
                state
                    .textures
                    .get(&handle.raw())
                    .ok_or(DeviceError::InvalidHandle)?
                    .filter
            }
            None => TextureFilter::NEAREST,
        };
        if !state.samplers.contains_key(&filter) {
            let sampler = self.create_sampler(filter);
            state.samplers.insert(filter, sampler);
        }

        let (surface, is_display) = state.surface()?;
        let source = match texture {
            Some(handle) => state.textures.get(&handle.raw()).ok_or(DeviceError::InvalidHandle)?,
            None => &self.white,
        };
        let (pipeline, sampler) = match (state.pipelines.get(&blend), state.samplers.get(&filter)) {
            (Some(pipeline), Some(sampler)) => (pipeline, sampler),
            _ => return Err(DeviceError::Backend("pipeline cache miss".into())),
        };

        let vertex_buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("glint batch vertices"),
            contents: bytemuck::cast_slice(vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let uniform_buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("glint uniforms"),
            contents: bytemuck::bytes_of(&uniforms),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("glint bind group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&source.view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
            ],
        });

        let viewport = to_top_left(state.viewport, surface.height, is_display);
        let scissor = state
            .scissor
            .map(|s| clamp_scissor(to_top_left(s, surface.height, is_display), surface.width, surface.height));

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("glint draw encoder"),
        });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("glint draw pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &surface.attachment,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_viewport(
                viewport.x as f32,
                viewport.y as f32,
                viewport.width as f32,
                viewport.height as f32,
                0.0,
                1.0,
            );
            if let Some((x, y, w, h)) = scissor {
                pass.set_scissor_rect(x, y, w, h);
            }
            pass.set_pipeline(pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.set_vertex_buffer(0, vertex_buffer.slice(..));
            pass.draw(0..vertices.len() as u32, 0..1);
        }
        self.queue.submit(Some(encoder.finish()));
        Ok(())
    }

    /// Copy `region` (top-left rows) of level 0 out as tightly packed RGBA.
    fn read_rgba(&self, texture: &wgpu::Texture, region: DeviceRect) -> Result<Vec<u8>, DeviceError> {
        let unpadded = region.width * 4;
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let bytes_per_row = unpadded.div_ceil(align) * align;

        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("glint readback buffer"),
            size: (bytes_per_row * region.height) as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("glint readback encoder"),
        });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d {
                    x: region.x as u32,
                    y: region.y as u32,
                    z: 0,
                },
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(bytes_per_row),
                    rows_per_image: Some(region.height),
                },
            },
            wgpu::Extent3d {
                width: region.width,
                height: region.height,
                depth_or_array_layers: 1,
            },
        );
        self.queue.submit(Some(encoder.finish()));

        let slice = buffer.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        let _ = self.device.poll(wgpu::PollType::Wait {
            submission_index: None,
            timeout: None,
        });
        rx.recv()
            .map_err(|e| DeviceError::Backend(format!("readback channel closed: {e}")))?
            .map_err(|e| DeviceError::Backend(format!("readback map failed: {e}")))?;

        let data = slice.get_mapped_range();
        let mut out = Vec::with_capacity((unpadded * region.height) as usize);
        for row in 0..region.height {
            let start = (row * bytes_per_row) as usize;
            out.extend_from_slice(&data[start..start + unpadded as usize]);
        }
        drop(data);
        buffer.unmap();
        Ok(out)
    }

    fn upload(&self, texture: &wgpu::Texture, mip_level: u32, x: u32, y: u32, width: u32, height: u32, rgba: &[u8]) {
        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture,
                mip_level,
                origin: wgpu::Origin3d { x, y, z: 0 },
                aspect: wgpu::TextureAspect::All,
            },
            rgba,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(width * 4),
                rows_per_image: Some(height),
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
    }
}

impl RenderDevice for WgpuDevice {
    fn info(&self) -> DeviceInfo {
        DeviceInfo::new(DeviceApi::Desktop, self.adapter_name.clone()).with_extensions(WGPU_EXTENSIONS.iter().copied())
    }

    fn drawable_size(&self) -> (u32, u32) {
        let state = self.state.lock();
        (state.display.width, state.display.height)
    }

    fn resize_drawable(&self, width: u32, height: u32) -> bool {
        let max = self.device.limits().max_texture_dimension_2d;
        if width == 0 || height == 0 || width > max || height > max {
            return false;
        }
        self.state.lock().display = GpuTexture::new(&self.device, width, height, 1, "glint display");
        tracing::debug!("Display resized to {}x{}", width, height);
        true
    }

    fn create_texture(&self, width: u32, height: u32, format: PixelFormat) -> Result<TextureHandle, DeviceError> {
        let max = self.device.limits().max_texture_dimension_2d;
        if width == 0 || height == 0 || width > max || height > max {
            tracing::error!("Texture size {}x{} outside device limit {}", width, height, max);
            return Err(DeviceError::InvalidRegion);
        }
        let texture = GpuTexture::new(&self.device, width, height, mip_level_count(width, height), "glint texture");

        let mut state = self.state.lock();
        let handle = TextureHandle::new(state.next_texture).ok_or(DeviceError::HandleAllocation)?;
        state.next_texture += 1;
        state.textures.insert(handle.raw(), texture);
        tracing::trace!("Created {}x{} {:?} texture {}", width, height, format, handle.raw());
        Ok(handle)
    }

    fn write_texture(
        &self,
        texture: TextureHandle,
        region: DeviceRect,
        format: PixelFormat,
        data: &[u8],
    ) -> Result<(), DeviceError> {
        let state = self.state.lock();
        let tex = state.textures.get(&texture.raw()).ok_or(DeviceError::InvalidHandle)?;
        if !region.fits(tex.width, tex.height) || data.len() != region.pixel_count() * format.bytes_per_pixel() {
            return Err(DeviceError::InvalidRegion);
        }
        let rgba = expand_to_rgba(data, format);
        self.upload(
            &tex.texture,
            0,
            region.x as u32,
            region.y as u32,
            region.width,
            region.height,
            &rgba,
        );
        Ok(())
    }

    fn set_texture_filter(&self, texture: TextureHandle, filter: TextureFilter) {
        if let Some(tex) = self.state.lock().textures.get_mut(&texture.raw()) {
            tex.filter = filter;
        }
    }

    fn generate_mipmaps(&self, texture: TextureHandle) -> Result<(), DeviceError> {
        profile_function!();
        let state = self.state.lock();
        let tex = state.textures.get(&texture.raw()).ok_or(DeviceError::InvalidHandle)?;
        let (mut width, mut height) = (tex.width, tex.height);
        let mut level = self.read_rgba(&tex.texture, DeviceRect::sized(width, height))?;

        for mip in 1..tex.mip_levels {
            let (next, w, h) = downsample(&level, width, height);
            self.upload(&tex.texture, mip, 0, 0, w, h, &next);
            (level, width, height) = (next, w, h);
        }
        Ok(())
    }

    fn destroy_texture(&self, texture: TextureHandle) {
        let mut state = self.state.lock();
        if let Some(tex) = state.textures.remove(&texture.raw()) {
            tex.texture.destroy();
        }
        if state.bound_texture == Some(texture) {
            state.bound_texture = None;
        }
    }

    fn bind_texture(&self, texture: Option<TextureHandle>) {
        self.state.lock().bound_texture = texture;
    }

    fn create_framebuffer(&self) -> Result<FramebufferHandle, DeviceError> {
        let mut state = self.state.lock();
        let handle = FramebufferHandle::new(state.next_framebuffer).ok_or(DeviceError::HandleAllocation)?;
        state.next_framebuffer += 1;
        state.framebuffers.insert(handle.raw(), None);
        Ok(handle)
    }

    fn attach_color_texture(&self, framebuffer: FramebufferHandle, texture: TextureHandle) -> Result<(), DeviceError> {
        let mut state = self.state.lock();
        if !state.textures.contains_key(&texture.raw()) {
            return Err(DeviceError::InvalidHandle);
        }
        let slot = state
            .framebuffers
            .get_mut(&framebuffer.raw())
            .ok_or(DeviceError::InvalidHandle)?;
        *slot = Some(texture);
        Ok(())
    }

    fn framebuffer_complete(&self, framebuffer: FramebufferHandle) -> bool {
        let state = self.state.lock();
        match state.framebuffers.get(&framebuffer.raw()) {
            Some(Some(texture)) => state.textures.contains_key(&texture.raw()),
            _ => false,
        }
    }

    fn destroy_framebuffer(&self, framebuffer: FramebufferHandle) {
        let mut state = self.state.lock();
        state.framebuffers.remove(&framebuffer.raw());
        if state.bound_framebuffer == Some(framebuffer) {
            state.bound_framebuffer = None;
        }
    }

    fn bind_framebuffer(&self, framebuffer: Option<FramebufferHandle>) {
        self.state.lock().bound_framebuffer = framebuffer;
    }

    fn viewport(&self) -> Viewport {
        self.state.lock().viewport
    }

    fn set_viewport(&self, viewport: Viewport) {
        self.state.lock().viewport = viewport;
    }

    fn projection(&self) -> Mat4 {
        self.state.lock().projection
    }

    fn set_projection(&self, projection: Mat4) {
        self.state.lock().projection = projection;
    }

    fn set_scissor(&self, scissor: Option<ScissorRect>) {
        self.state.lock().scissor = scissor;
    }

    fn set_blending(&self, enabled: bool) {
        self.state.lock().blending = enabled;
    }

    fn set_blend_function(&self, function: BlendFunction) {
        self.state.lock().blend_function = function;
    }

    fn set_blend_equation(&self, equation: BlendEquation) {
        self.state.lock().blend_equation = equation;
    }

    fn set_color(&self, color: [f32; 4]) {
        self.state.lock().color = color;
    }

    fn clear(&self, color: [f32; 4]) {
        profile_function!();
        let mut state = self.state.lock();
        let result = self.validated("clear", || {
            if state.scissor.is_some() {
                // Load ops ignore the scissor, so scissored clears draw a quad.
                #[rustfmt::skip]
                let quad = [
                    BatchVertex::new(-1.0, -1.0, 0.5, 0.5),
                    BatchVertex::new(1.0, -1.0, 0.5, 0.5),
                    BatchVertex::new(1.0, 1.0, 0.5, 0.5),
                    BatchVertex::new(-1.0, -1.0, 0.5, 0.5),
                    BatchVertex::new(1.0, 1.0, 0.5, 0.5),
                    BatchVertex::new(-1.0, 1.0, 0.5, 0.5),
                ];
                let uniforms = Uniforms {
                    projection: Mat4::IDENTITY.to_cols_array_2d(),
                    color,
                    flip_y: 1.0,
                    _padding: [0.0; 3],
                };
                let saved = state.viewport;
                let (width, height) = {
                    let (surface, _) = state.surface()?;
                    (surface.width, surface.height)
                };
                state.viewport = Viewport::sized(width, height);
                let drawn = self.submit_pass(&mut state, &quad, uniforms, None, None);
                state.viewport = saved;
                return drawn;
            }

            let (surface, _) = state.surface()?;
            let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("glint clear encoder"),
            });
            {
                let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("glint clear pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: &surface.attachment,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Clear(wgpu::Color {
                                r: color[0] as f64,
                                g: color[1] as f64,
                                b: color[2] as f64,
                                a: color[3] as f64,
                            }),
                            store: wgpu::StoreOp::Store,
                        },
                        depth_slice: None,
                    })],
                    depth_stencil_attachment: None,
                    timestamp_writes: None,
                    occlusion_query_set: None,
                });
            }
            self.queue.submit(Some(encoder.finish()));
            Ok(())
        });
        if let Err(e) | Ok(Err(e)) = result {
            tracing::error!("Clear failed: {}", e);
        }
    }

    fn draw_triangles(&self, vertices: &[BatchVertex]) -> Result<(), DeviceError> {
        profile_function!();
        if vertices.is_empty() {
            return Ok(());
        }
        let mut state = self.state.lock();
        let (_, is_display) = state.surface()?;
        let uniforms = Uniforms {
            projection: state.projection.to_cols_array_2d(),
            color: state.color,
            flip_y: if is_display { 1.0 } else { -1.0 },
            _padding: [0.0; 3],
        };
        let blend = state
            .blending
            .then(|| state.blend_function.with_equation(state.blend_equation));
        let texture = state.bound_texture;
        self.validated("draw", || self.submit_pass(&mut state, vertices, uniforms, blend, texture))?
    }

    fn read_pixels(&self, region: DeviceRect, format: PixelFormat) -> Result<Vec<u8>, DeviceError> {
        let state = self.state.lock();
        let (surface, is_display) = state.surface()?;
        if !region.fits(surface.width, surface.height) {
            return Err(DeviceError::InvalidRegion);
        }

        let rgba = self.read_rgba(&surface.texture, to_top_left(region, surface.height, is_display))?;
        let row_bytes = region.width as usize * 4;
        let rows: Vec<&[u8]> = if is_display {
            rgba.chunks_exact(row_bytes).rev().collect()
        } else {
            rgba.chunks_exact(row_bytes).collect()
        };

        let bpp = format.bytes_per_pixel();
        Ok(rows
            .into_iter()
            .flat_map(|row| row.chunks_exact(4).flat_map(move |px| px[..bpp].iter().copied()))
            .collect())
    }

    fn swap_buffers(&self) -> Result<(), DeviceError> {
        self.device
            .poll(wgpu::PollType::Poll)
            .map(|_| ())
            .map_err(|e| DeviceError::Backend(format!("present failed: {e}")))
    }
}

impl std::fmt::Debug for WgpuDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (width, height) = self.drawable_size();
        f.debug_struct("WgpuDevice")
            .field("adapter", &self.adapter_name)
            .field("display", &(width, height))
            .finish_non_exhaustive()
    }
}
