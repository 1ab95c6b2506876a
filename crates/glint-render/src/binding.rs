//! Binding tracker.
//!
//! The renderer remembers which texture and which target the device last had
//! bound for drawing. Queued geometry always belongs to that pair, so any
//! change to either one, and any mutation or destruction of the resources
//! behind them, must drain the batch first.
//!
//! A tracked value of `None` means "unknown". Operations that bind a
//! resource for their own purposes (uploads, readbacks) leave the tracker
//! unknown so the next blit rebinds explicitly.

use crate::features::GpuFeatures;
use crate::renderer::GpuRenderer;
use crate::resource::{TargetId, TextureId};
use glint_test_utils::{FramebufferHandle, TextureHandle};

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct BindingState {
    pub texture: Option<TextureId>,
    pub target: Option<TargetId>,
    pub blending: bool,
    /// Reserved; geometry is always emitted at z = 0.
    pub z: f32,
}

impl Default for BindingState {
    fn default() -> Self {
        Self {
            texture: None,
            target: None,
            blending: true,
            z: 0.0,
        }
    }
}

impl GpuRenderer {
    /// Make `texture` current for drawing, flushing geometry queued under the
    /// previous texture.
    pub(crate) fn bind_texture(&mut self, texture: TextureId, handle: TextureHandle) {
        if self.bindings.texture != Some(texture) {
            self.flush();
            self.device.bind_texture(Some(handle));
            self.bindings.texture = Some(texture);
        }
    }

    /// Make `target` current for drawing. Returns `false` when the target
    /// cannot be drawn to on this device.
    ///
    /// Without render target support only the display can be bound. It is
    /// always bound on the device, so only the tracker changes.
    pub(crate) fn bind_target(&mut self, target: TargetId) -> bool {
        let Some(framebuffer) = self.targets.get(target.key).map(|t| t.framebuffer) else {
            return false;
        };

        if !self.features.contains(GpuFeatures::RENDER_TARGETS) && target != self.display {
            return false;
        }

        if self.bindings.target != Some(target) {
            self.flush();
            if self.features.contains(GpuFeatures::RENDER_TARGETS) {
                self.device.bind_framebuffer(framebuffer);
            }
            self.bindings.target = Some(target);
        }
        true
    }

    pub(crate) fn flush_and_bind_texture(&mut self, handle: TextureHandle) {
        self.flush();
        self.device.bind_texture(Some(handle));
        self.bindings.texture = None;
    }

    pub(crate) fn flush_and_bind_framebuffer(&mut self, framebuffer: Option<FramebufferHandle>) {
        self.flush();
        if self.features.contains(GpuFeatures::RENDER_TARGETS) {
            self.device.bind_framebuffer(framebuffer);
        }
        self.bindings.target = None;
    }

    pub(crate) fn flush_if_current_texture(&mut self, texture: TextureId) {
        if self.bindings.texture == Some(texture) {
            self.flush();
        }
    }

    pub(crate) fn flush_and_clear_if_current_texture(&mut self, texture: TextureId) {
        if self.bindings.texture == Some(texture) {
            self.flush();
            self.bindings.texture = None;
        }
    }

    /// Flush when `target` is current, or when nothing is tracked and the
    /// pending geometry could be going anywhere.
    pub(crate) fn flush_if_current_target(&mut self, target: Option<TargetId>) {
        if self.bindings.target.is_none() || self.bindings.target == target {
            self.flush();
        }
    }

    pub(crate) fn flush_and_clear_if_current_target(&mut self, target: TargetId) {
        if self.bindings.target.is_none() || self.bindings.target == Some(target) {
            self.flush();
            self.bindings.target = None;
        }
    }
}
