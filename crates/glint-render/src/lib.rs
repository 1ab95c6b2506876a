//! glint: a batched 2D blit renderer.
//!
//! Textures are drawn onto render targets (the display or an offscreen
//! texture) as textured quads. Quads sharing a texture and a target are
//! accumulated on the CPU and submitted in a single draw, so a frame of
//! sprites costs one draw per texture/target run rather than one per sprite.
//!
//! # Overview
//!
//! - [`Renderer2D`] - The renderer interface: textures, targets, blits, state
//! - [`GpuRenderer`] - Implementation over any [`RenderDevice`]
//! - [`WgpuDevice`] - Headless wgpu backend
//! - [`GpuFeatures`] - Optional capabilities probed at startup
//!
//! # Example
//!
//! ```rust
//! use glint_render::{Color, GpuRenderer, Renderer2D, RendererConfig};
//! use glint_test_utils::MockDevice;
//! use std::sync::Arc;
//!
//! let device = Arc::new(MockDevice::new());
//! let mut renderer = GpuRenderer::new(device.clone(), RendererConfig::new(640, 480)).unwrap();
//! let display = renderer.display();
//!
//! let sprite = renderer.create_texture(32, 32, 4).unwrap();
//! renderer.set_rgba(Color::rgb(255, 128, 0));
//! for i in 0..100 {
//!     renderer.blit(sprite, None, display, i as f32 * 6.0, 240.0).unwrap();
//! }
//! renderer.present();
//!
//! assert_eq!(device.count_draws(), 1);
//! ```

pub mod batch;
mod binding;
pub mod blend;
mod blit;
pub mod color;
pub mod config;
pub mod error;
pub mod features;
pub mod flush;
pub mod geometry;
#[cfg(feature = "image")]
pub mod image_io;
pub mod pixels;
pub mod renderer;
pub mod resource;
mod target;
mod texture;
pub mod wgpu_device;

pub use batch::{BatchBuffer, DEFAULT_BATCH_CAPACITY};
pub use blend::{BlendMode, BlendPlan};
pub use color::Color;
pub use config::{InitFlags, RendererConfig};
pub use error::{BlitError, InitError, PixelError, ResourceError};
pub use features::{FeatureSupportResult, GpuFeatures};
#[cfg(feature = "image")]
pub use image_io::ImageIoError;
pub use pixels::{PixelBuffer, PixelLayout};
pub use renderer::{GpuRenderer, Renderer2D};
pub use resource::{Clip, Filter, RendererId, TargetId, TargetInfo, TextureId, TextureInfo};
pub use wgpu_device::{WgpuDevice, WgpuDeviceDescriptor};

pub use glint_core::geometry::{Rect, Size};
pub use glint_test_utils::RenderDevice;
