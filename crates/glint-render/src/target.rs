//! Render targets: creation, clipping, clears and pixel reads.

use crate::color::Color;
use crate::features::GpuFeatures;
use crate::flush::{clip_to_scissor, SubmitScope};
use crate::renderer::GpuRenderer;
use crate::resource::{Clip, TargetData, TargetId, TextureId};
use glint_core::geometry::Rect;
use glint_test_utils::{DeviceRect, PixelFormat};

impl GpuRenderer {
    /// The render target drawing into `texture`, created on first use.
    ///
    /// Returns `None` when the texture is invalid, the device has no render
    /// target support, or the framebuffer could not be completed.
    pub fn load_target(&mut self, texture: TextureId) -> Option<TargetId> {
        let (handle, logical, existing) = match self.texture_data(texture) {
            Ok(data) => (data.handle, data.logical, data.target),
            Err(e) => {
                tracing::error!("Cannot load a target for texture: {}", e);
                return None;
            }
        };
        if existing.is_some() {
            return existing;
        }
        if !self.features.contains(GpuFeatures::RENDER_TARGETS) {
            tracing::warn!("Render targets are not supported on this device");
            return None;
        }

        let framebuffer = match self.device.create_framebuffer() {
            Ok(framebuffer) => framebuffer,
            Err(e) => {
                tracing::error!("Failed to create framebuffer: {}", e);
                return None;
            }
        };
        self.flush_and_bind_framebuffer(Some(framebuffer));

        let attached = self.device.attach_color_texture(framebuffer, handle);
        if let Err(e) = attached {
            tracing::error!("Failed to attach texture to framebuffer: {}", e);
            self.device.destroy_framebuffer(framebuffer);
            return None;
        }
        if !self.device.framebuffer_complete(framebuffer) {
            tracing::error!("Framebuffer for {}x{} texture is incomplete", logical.width, logical.height);
            self.device.destroy_framebuffer(framebuffer);
            return None;
        }

        let key = self.targets.insert(TargetData {
            framebuffer: Some(framebuffer),
            size: logical,
            clip: Clip::full(logical),
            texture: Some(texture),
        });
        let target = TargetId { renderer: self.id, key };
        if let Some(data) = self.textures.get_mut(texture.key) {
            data.target = Some(target);
        }
        tracing::debug!("Loaded {}x{} render target", logical.width, logical.height);
        Some(target)
    }

    /// Release an offscreen target. The texture behind it stays alive;
    /// destroying the display target does nothing.
    pub fn destroy_target(&mut self, target: TargetId) {
        let (framebuffer, texture) = match self.target_data(target) {
            Ok(data) if data.is_display() => return,
            Ok(data) => (data.framebuffer, data.texture),
            Err(e) => {
                tracing::error!("Ignoring destroy of target: {}", e);
                return;
            }
        };

        if self.features.contains(GpuFeatures::RENDER_TARGETS) {
            self.flush_and_clear_if_current_target(target);
            if let Some(framebuffer) = framebuffer {
                self.device.destroy_framebuffer(framebuffer);
            }
        }
        self.targets.remove(target.key);
        if self.bindings.target == Some(target) {
            self.bindings.target = None;
        }

        if let Some(texture) = texture
            && let Some(data) = self.textures.get_mut(texture.key)
        {
            data.target = None;
        }
    }

    /// Restrict drawing on `target` to `rect`. Returns the previous clip
    /// rectangle, or `None` for an invalid target.
    pub fn set_clip(&mut self, target: TargetId, rect: Rect<i32>) -> Option<Rect<i32>> {
        if let Err(e) = self.target_data(target) {
            tracing::error!("Cannot clip target: {}", e);
            return None;
        }
        self.flush_if_current_target(Some(target));

        let data = self.targets.get_mut(target.key)?;
        let old = data.clip.rect;
        data.clip = Clip { enabled: true, rect };
        Some(old)
    }

    /// Turn clipping off and reset the clip to the whole target.
    pub fn clear_clip(&mut self, target: TargetId) {
        if let Err(e) = self.target_data(target) {
            tracing::error!("Cannot unclip target: {}", e);
            return;
        }
        self.flush_if_current_target(Some(target));

        if let Some(data) = self.targets.get_mut(target.key) {
            data.clip = Clip::full(data.size);
        }
    }

    /// Fill `target` with `color`, respecting its clip.
    pub fn clear_rgba(&mut self, target: TargetId, color: Color) {
        let (viewport, scissor) = match self.target_data(target) {
            Ok(data) => {
                let size = if data.is_display() { self.window } else { data.size };
                (size, clip_to_scissor(data, self.display_size(), self.window))
            }
            Err(e) => {
                tracing::error!("Cannot clear target: {}", e);
                return;
            }
        };

        self.flush_if_current_target(Some(target));
        if !self.bind_target(target) {
            tracing::error!("Cannot bind target for clearing");
            return;
        }

        let _scope = SubmitScope::new(self.device.as_ref())
            .viewport(viewport)
            .scissor(scissor);
        self.device.clear(color.to_normalized());
    }

    /// Color at `(x, y)` in the target's logical coordinates, top-left
    /// origin. Out-of-range positions read as transparent black.
    pub fn get_pixel(&mut self, target: TargetId, x: i32, y: i32) -> Color {
        let (size, is_display) = match self.target_data(target) {
            Ok(data) => (data.size, data.is_display()),
            Err(e) => {
                tracing::error!("Cannot read pixel: {}", e);
                return Color::TRANSPARENT;
            }
        };
        if x < 0 || y < 0 || x >= size.width as i32 || y >= size.height as i32 {
            return Color::TRANSPARENT;
        }

        self.flush_if_current_target(Some(target));
        if !self.bind_target(target) {
            return Color::TRANSPARENT;
        }

        let (px, py) = if is_display {
            // Display rows are stored bottom-up at window resolution.
            let sx = x as i64 * self.window.width as i64 / size.width as i64;
            let sy = y as i64 * self.window.height as i64 / size.height as i64;
            (sx as i32, self.window.height as i32 - 1 - sy as i32)
        } else {
            (x, y)
        };

        match self.device.read_pixels(DeviceRect::new(px, py, 1, 1), PixelFormat::Rgba) {
            Ok(bytes) if bytes.len() == 4 => Color::rgba(bytes[0], bytes[1], bytes[2], bytes[3]),
            Ok(_) => Color::TRANSPARENT,
            Err(e) => {
                tracing::error!("Failed to read pixel ({}, {}): {}", x, y, e);
                Color::TRANSPARENT
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{Color, GpuFeatures, GpuRenderer, Renderer2D, RendererConfig};
    use glint_core::geometry::Rect;
    use glint_test_utils::MockDevice;
    use std::sync::Arc;

    #[test]
    fn test_load_target_is_idempotent() {
        let mock = Arc::new(MockDevice::new());
        let mut r = GpuRenderer::new(mock.clone(), RendererConfig::new(64, 64)).unwrap();
        let tex = r.create_texture(16, 8, 4).unwrap();

        let a = r.load_target(tex).unwrap();
        let b = r.load_target(tex).unwrap();
        assert_eq!(a, b);
        assert_eq!(mock.count_framebuffer_creates(), 1);
    }

    #[test]
    fn test_no_targets_without_capability() {
        let mock = Arc::new(MockDevice::new());
        let config = RendererConfig::new(64, 64).with_disabled_features(GpuFeatures::RENDER_TARGETS);
        let mut r = GpuRenderer::new(mock.clone(), config).unwrap();
        let tex = r.create_texture(16, 8, 4).unwrap();

        assert_eq!(r.load_target(tex), None);
        assert_eq!(mock.count_framebuffer_creates(), 0);
    }

    #[test]
    fn test_incomplete_framebuffer_is_released() {
        let mock = Arc::new(MockDevice::new());
        let mut r = GpuRenderer::new(mock.clone(), RendererConfig::new(64, 64)).unwrap();
        let tex = r.create_texture(16, 8, 4).unwrap();
        mock.report_incomplete_framebuffers(true);

        assert_eq!(r.load_target(tex), None);
        assert_eq!(mock.live_framebuffers(), 0);
        assert_eq!(r.texture_info(tex).unwrap().target, None);
    }

    #[test]
    fn test_set_clip_returns_previous_rect() {
        let mock = Arc::new(MockDevice::new());
        let mut r = GpuRenderer::new(mock, RendererConfig::new(64, 48)).unwrap();
        let display = r.display();

        let old = r.set_clip(display, Rect::new(1, 2, 3, 4));
        assert_eq!(old, Some(Rect::new(0, 0, 64, 48)));
        assert_eq!(r.set_clip(display, Rect::new(0, 0, 8, 8)), Some(Rect::new(1, 2, 3, 4)));

        r.clear_clip(display);
        let info = r.target_info(display).unwrap();
        assert!(!info.clip.enabled);
        assert_eq!(info.clip.rect, Rect::new(0, 0, 64, 48));
    }

    #[test]
    fn test_get_pixel_reads_display_top_down() {
        let mock = Arc::new(MockDevice::new());
        let mut r = GpuRenderer::new(mock, RendererConfig::new(8, 8)).unwrap();
        let display = r.display();

        r.set_clip(display, Rect::new(0, 0, 8, 2));
        r.clear_rgba(display, Color::rgb(255, 0, 0));

        assert_eq!(r.get_pixel(display, 3, 1), Color::rgb(255, 0, 0));
        assert_eq!(r.get_pixel(display, 3, 6), Color::TRANSPARENT);
        assert_eq!(r.get_pixel(display, 8, 0), Color::TRANSPARENT);
    }
}
