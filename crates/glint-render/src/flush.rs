//! Submitting the batch to the device.

use crate::renderer::GpuRenderer;
use crate::resource::TargetData;
use glam::Mat4;
use glint_core::geometry::Size;
use glint_core::profiling::{new_frame, profile_function};
use glint_test_utils::{RenderDevice, ScissorRect, Viewport};

/// Orthographic projection for drawing into an offscreen target.
///
/// Offscreen storage keeps rows in upload order, so the y axis is not
/// flipped: logical row 0 lands on framebuffer row 0.
pub fn offscreen_projection(size: Size<u32>) -> Mat4 {
    Mat4::orthographic_rh_gl(0.0, size.width as f32, 0.0, size.height as f32, -1.0, 1.0)
}

/// Top-left-origin projection for the display.
pub fn display_projection(size: Size<u32>) -> Mat4 {
    Mat4::orthographic_rh_gl(0.0, size.width as f32, size.height as f32, 0.0, -1.0, 1.0)
}

/// Device state changed for the duration of one submission and put back when
/// the scope ends, however it ends.
pub(crate) struct SubmitScope<'a> {
    device: &'a dyn RenderDevice,
    saved: Option<(Viewport, Mat4)>,
    scissor: bool,
}

impl<'a> SubmitScope<'a> {
    pub fn new(device: &'a dyn RenderDevice) -> Self {
        Self {
            device,
            saved: None,
            scissor: false,
        }
    }

    /// Switch to a viewport and projection covering an offscreen target.
    pub fn offscreen(mut self, size: Size<u32>) -> Self {
        self.saved = Some((self.device.viewport(), self.device.projection()));
        self.device.set_viewport(Viewport::sized(size.width, size.height));
        self.device.set_projection(offscreen_projection(size));
        self
    }

    /// Switch the viewport only, for clears.
    pub fn viewport(mut self, size: Size<u32>) -> Self {
        let saved = (self.device.viewport(), self.device.projection());
        self.device.set_viewport(Viewport::sized(size.width, size.height));
        self.saved = Some(saved);
        self
    }

    pub fn scissor(mut self, rect: Option<ScissorRect>) -> Self {
        if let Some(rect) = rect {
            self.device.set_scissor(Some(rect));
            self.scissor = true;
        }
        self
    }
}

impl Drop for SubmitScope<'_> {
    fn drop(&mut self) {
        if self.scissor {
            self.device.set_scissor(None);
        }
        if let Some((viewport, projection)) = self.saved.take() {
            self.device.set_viewport(viewport);
            self.device.set_projection(projection);
        }
    }
}

/// Device scissor for a target's clip, or `None` when clipping is off.
///
/// Display clips are flipped into bottom-up rows and scaled from the virtual
/// resolution to the window. Offscreen targets are drawn 1:1 in upload-order
/// rows and need neither.
pub(crate) fn clip_to_scissor(target: &TargetData, display: Size<u32>, window: Size<u32>) -> Option<ScissorRect> {
    if !target.clip.enabled {
        return None;
    }
    let clip = target.clip.rect;

    if !target.is_display() {
        return Some(ScissorRect::new(
            clip.x,
            clip.y,
            clip.width.max(0) as u32,
            clip.height.max(0) as u32,
        ));
    }

    // Float-to-int casts saturate, so extreme clips pin to the i32 range.
    let x_factor = window.width as f64 / display.width.max(1) as f64;
    let y_factor = window.height as f64 / display.height.max(1) as f64;
    let y = display.height as i64 - (clip.y as i64 + clip.height as i64);
    Some(ScissorRect::new(
        (clip.x as f64 * x_factor) as i32,
        (y as f64 * y_factor) as i32,
        (clip.width.max(0) as f64 * x_factor) as u32,
        (clip.height.max(0) as f64 * y_factor) as u32,
    ))
}

impl GpuRenderer {
    /// Submit every queued quad in one draw.
    ///
    /// Does nothing when the batch is empty or when either binding is
    /// unknown. Device errors are logged and the batch is still drained, so
    /// one bad submission cannot wedge the renderer.
    pub fn flush(&mut self) {
        if self.batch.is_empty() {
            return;
        }
        let (Some(_), Some(target)) = (self.bindings.texture, self.bindings.target) else {
            return;
        };
        profile_function!();

        let display_size = self.display_size();
        let Some(dest) = self.targets.get(target.key) else {
            tracing::error!("Flush found a stale target binding; dropping {} vertices", self.batch.len());
            self.bindings.target = None;
            self.batch.reset();
            return;
        };

        let result = {
            let mut scope = SubmitScope::new(self.device.as_ref());
            if !dest.is_display() {
                scope = scope.offscreen(dest.size);
            }
            let _scope = scope.scissor(clip_to_scissor(dest, display_size, self.window));
            self.device.draw_triangles(self.batch.vertices())
        };

        match result {
            Ok(()) => tracing::debug!(
                "Flushed {} quads to {}",
                self.batch.quad_count(),
                if dest.is_display() { "display" } else { "offscreen target" }
            ),
            Err(e) => tracing::error!("Failed to submit {} quads: {}", self.batch.quad_count(), e),
        }
        self.batch.reset();
    }

    /// Flush, then show the display.
    pub fn present(&mut self) {
        profile_function!();
        self.flush();
        if let Err(e) = self.device.swap_buffers() {
            tracing::error!("Failed to present: {}", e);
        }
        new_frame();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::Clip;
    use glint_core::geometry::Rect;

    fn display_target(size: Size<u32>, clip: Rect<i32>) -> TargetData {
        TargetData {
            framebuffer: None,
            size,
            clip: Clip { enabled: true, rect: clip },
            texture: None,
        }
    }

    #[test]
    fn test_display_scissor_is_flipped() {
        let target = display_target(Size::new(800, 600), Rect::new(10, 20, 100, 50));
        let scissor = clip_to_scissor(&target, Size::new(800, 600), Size::new(800, 600));
        assert_eq!(scissor, Some(ScissorRect::new(10, 530, 100, 50)));
    }

    #[test]
    fn test_display_scissor_scales_to_window() {
        let target = display_target(Size::new(400, 300), Rect::new(10, 20, 100, 50));
        let scissor = clip_to_scissor(&target, Size::new(400, 300), Size::new(800, 600));
        assert_eq!(scissor, Some(ScissorRect::new(20, 460, 200, 100)));
    }

    #[test]
    fn test_extreme_display_clip_saturates() {
        let target = display_target(Size::new(800, 600), Rect::new(i32::MAX, i32::MAX, 10, i32::MAX));
        let scissor = clip_to_scissor(&target, Size::new(800, 600), Size::new(800, 600)).unwrap();
        assert_eq!(scissor.x, i32::MAX);
        assert_eq!(scissor.y, i32::MIN);
        assert_eq!(scissor.height, i32::MAX as u32);
    }

    #[test]
    fn test_disabled_clip_has_no_scissor() {
        let mut target = display_target(Size::new(8, 8), Rect::new(0, 0, 8, 8));
        target.clip.enabled = false;
        assert_eq!(clip_to_scissor(&target, Size::new(8, 8), Size::new(8, 8)), None);
    }

    #[test]
    fn test_offscreen_projection_keeps_rows() {
        let proj = offscreen_projection(Size::new(64, 32));
        let top = proj.project_point3(glam::Vec3::new(0.0, 0.0, 0.0));
        assert!((top.y + 1.0).abs() < 1e-6);

        let proj = display_projection(Size::new(64, 32));
        let top = proj.project_point3(glam::Vec3::new(0.0, 0.0, 0.0));
        assert!((top.y - 1.0).abs() < 1e-6);
    }
}
