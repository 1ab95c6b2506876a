//! Device seam for the glint renderer.
//!
//! This crate defines the boundary between the renderer and a graphics
//! device, plus a mock device for exercising the renderer without a GPU.
//!
//! # Overview
//!
//! - [`RenderDevice`] - State-machine device trait the renderer draws through
//! - Value types crossing the seam ([`TextureHandle`], [`BatchVertex`],
//!   [`DeviceRect`], [`BlendFunction`], ...)
//! - `MockDevice` - Recording implementation for tests (requires `mock` feature)
//!
//! # Example
//!
//! ```rust
//! # #[cfg(feature = "mock")]
//! # {
//! use glint_test_utils::{BatchVertex, MockDevice, RenderDevice};
//!
//! let mock = MockDevice::new();
//! mock.set_blending(true);
//! mock.draw_triangles(&[BatchVertex::default(); 6]).unwrap();
//!
//! assert_eq!(mock.count_draws(), 1);
//! assert!(mock.draws()[0].blending);
//! # }
//! ```
//!
//! # Design
//!
//! ## Handles, not objects
//!
//! Devices hand out small `Copy` handles. Ownership of what a handle names
//! lives in the renderer, which is the only place that decides when a
//! resource dies.
//!
//! ## Interior mutability
//!
//! Trait methods take `&self`; the mock keeps its call log and storage behind
//! `parking_lot::Mutex`, so tests can hold an `Arc<MockDevice>` next to the
//! renderer and inspect it at any point.

pub mod gpu_types;
#[cfg(feature = "mock")]
pub mod mock_device;
pub mod render_device;

pub use gpu_types::*;
#[cfg(feature = "mock")]
pub use mock_device::*;
pub use render_device::*;
