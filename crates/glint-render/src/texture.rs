//! Texture lifecycle and pixel operations.

use crate::color::Color;
use crate::error::ResourceError;
use crate::features::{storage_size, GpuFeatures};
use crate::pixels::{PixelBuffer, PixelLayout};
use crate::renderer::GpuRenderer;
use crate::resource::{Filter, TargetId, TextureData, TextureId};
use glint_core::geometry::{Rect, Size};
use glint_test_utils::{DeviceError, DeviceRect, MinFilter, PixelFormat, TextureFilter};

impl GpuRenderer {
    /// Allocate an uninitialized `width x height` texture with 3 or 4
    /// channels. Storage is padded to powers of two when the device needs it.
    pub fn create_texture(&mut self, width: u32, height: u32, channels: u8) -> Result<TextureId, ResourceError> {
        let Some(format) = PixelFormat::from_channels(channels) else {
            tracing::error!("Cannot create a texture with {} color channels, try 3 or 4", channels);
            return Err(ResourceError::InvalidChannels(channels));
        };
        if width == 0 || height == 0 {
            tracing::error!("Cannot create a {}x{} texture", width, height);
            return Err(ResourceError::InvalidArgument("texture size must be non-zero"));
        }
        self.allocate_texture(Size::new(width, height), format)
    }

    fn allocate_texture(&mut self, logical: Size<u32>, format: PixelFormat) -> Result<TextureId, ResourceError> {
        let (storage_w, storage_h) = storage_size(logical.width, logical.height, self.features);
        let handle = self
            .device
            .create_texture(storage_w, storage_h, format)
            .inspect_err(|e| tracing::error!("Failed to allocate a {}x{} texture: {}", storage_w, storage_h, e))?;
        self.device.set_texture_filter(handle, TextureFilter::LINEAR);

        let key = self.textures.insert(TextureData {
            handle,
            format,
            logical,
            storage: Size::new(storage_w, storage_h),
            has_mipmaps: false,
            filter: TextureFilter::LINEAR,
            target: None,
        });
        tracing::debug!(
            "Created {}x{} texture ({}x{} storage, {} channels)",
            logical.width,
            logical.height,
            storage_w,
            storage_h,
            format.channels()
        );
        Ok(TextureId { renderer: self.id, key })
    }

    /// Create a texture holding `pixels`. Keyed or alpha-carrying buffers get
    /// four channels, everything else three.
    pub fn create_texture_from_pixels(&mut self, pixels: &PixelBuffer) -> Result<TextureId, ResourceError> {
        let format = pixels.preferred_format();
        let texture = self.allocate_texture(Size::new(pixels.width(), pixels.height()), format)?;
        let data = pixels.convert_to(format);

        let handle = self.textures.get(texture.key).map(|t| t.handle);
        if let Some(handle) = handle {
            self.flush_and_bind_texture(handle);
            let region = DeviceRect::sized(pixels.width(), pixels.height());
            if let Err(e) = self.device.write_texture(handle, region, format, &data) {
                tracing::error!("Failed to upload initial texture data: {}", e);
                self.destroy_texture(texture);
                return Err(e.into());
            }
        }
        Ok(texture)
    }

    /// Replace `region` (default: the buffer's extent at the origin) with
    /// `pixels`, converted to the texture's format.
    pub fn update_texture(
        &mut self,
        texture: TextureId,
        region: Option<Rect<i32>>,
        pixels: &PixelBuffer,
    ) -> Result<(), ResourceError> {
        let (handle, format, storage, target) = {
            let data = self.texture_data(texture)?;
            (data.handle, data.format, data.storage, data.target)
        };
        let region = region.unwrap_or(Rect::new(0, 0, pixels.width() as i32, pixels.height() as i32));
        if region.width as u32 != pixels.width() || region.height as u32 != pixels.height() {
            return Err(ResourceError::InvalidArgument("update region does not match the pixel buffer"));
        }
        if !region.fits_within(storage) {
            return Err(ResourceError::InvalidArgument("update region lies outside the texture"));
        }

        let data = pixels.convert_to(format);
        self.flush_before_mutation(texture, target);
        self.bind_texture(texture, handle);
        self.device.write_texture(
            handle,
            DeviceRect::new(region.x, region.y, region.width as u32, region.height as u32),
            format,
            &data,
        )?;
        Ok(())
    }

    /// Geometry queued from or into a texture must render before the texture
    /// changes. With no target tracked the pending batch could be going
    /// anywhere.
    fn flush_before_mutation(&mut self, texture: TextureId, target: Option<TargetId>) {
        self.flush_if_current_target(target);
        self.flush_if_current_texture(texture);
    }

    /// A new texture with the same size and channels, drawn from `texture`
    /// with blending off.
    pub fn copy_texture(&mut self, texture: TextureId) -> Result<TextureId, ResourceError> {
        let (size, format) = {
            let data = self.texture_data(texture)?;
            (data.logical, data.format)
        };
        if !self.features.contains(GpuFeatures::RENDER_TARGETS) {
            tracing::error!("Copying a texture needs render target support");
            return Err(ResourceError::Unsupported(GpuFeatures::RENDER_TARGETS));
        }

        let old_blending = self.bindings.blending;
        if old_blending {
            self.set_blending(false);
        }

        let result = self.copy_into_new_texture(texture, size, format);

        if old_blending {
            self.set_blending(true);
        }
        result
    }

    fn copy_into_new_texture(
        &mut self,
        source: TextureId,
        size: Size<u32>,
        format: PixelFormat,
    ) -> Result<TextureId, ResourceError> {
        let copy = self.create_texture(size.width, size.height, format.channels())?;
        let Some(target) = self.load_target(copy) else {
            self.destroy_texture(copy);
            return Err(ResourceError::Unsupported(GpuFeatures::RENDER_TARGETS));
        };

        let blitted = self.blit(
            source,
            None,
            target,
            size.width as f32 / 2.0,
            size.height as f32 / 2.0,
        );
        self.destroy_target(target);

        match blitted {
            Ok(()) => Ok(copy),
            Err(e) => {
                tracing::error!("Failed to copy texture: {}", e);
                self.destroy_texture(copy);
                Err(ResourceError::InvalidArgument("copy source could not be drawn"))
            }
        }
    }

    /// Draw part of a CPU buffer onto `dest` with its top-left corner at
    /// `(x, y)`, without blending. `dest` must be backed by a texture.
    pub fn copy_from_pixels(
        &mut self,
        pixels: &PixelBuffer,
        src: Option<Rect<i32>>,
        dest: TargetId,
        x: i32,
        y: i32,
    ) -> Result<(), ResourceError> {
        let dest_texture = self
            .target_data(dest)?
            .texture
            .ok_or(ResourceError::InvalidArgument("destination has no backing texture"))?;
        self.texture_data(dest_texture)?;

        let region = src.unwrap_or(Rect::new(0, 0, pixels.width() as i32, pixels.height() as i32));
        let cropped = pixels.crop(region)?;

        let temp = self.create_texture_from_pixels(&cropped)?;

        let old_blending = self.bindings.blending;
        self.set_blending(false);
        let blitted = self.blit(
            temp,
            None,
            dest,
            (x + region.width / 2) as f32,
            (y + region.height / 2) as f32,
        );
        self.set_blending(old_blending);

        self.destroy_texture(temp);
        blitted.map_err(|e| {
            tracing::error!("Failed to copy pixels onto target: {}", e);
            ResourceError::InvalidArgument("copy destination could not be drawn to")
        })
    }

    /// Release a texture, its attached target first.
    pub fn destroy_texture(&mut self, texture: TextureId) {
        let Ok(data) = self.texture_data(texture) else {
            tracing::error!("Ignoring destroy of an invalid texture");
            return;
        };
        if let Some(target) = data.target {
            self.destroy_target(target);
        }

        self.flush_and_clear_if_current_texture(texture);
        if let Some(data) = self.textures.remove(texture.key) {
            self.device.destroy_texture(data.handle);
            tracing::debug!("Destroyed {}x{} texture", data.logical.width, data.logical.height);
        }
    }

    /// Build the mip chain. A plain linear min filter becomes
    /// linear-mipmap-nearest.
    pub fn generate_mipmaps(&mut self, texture: TextureId) -> Result<(), ResourceError> {
        let (handle, target, filter) = {
            let data = self.texture_data(texture)?;
            (data.handle, data.target, data.filter)
        };
        self.flush_before_mutation(texture, target);
        self.bind_texture(texture, handle);
        self.device.generate_mipmaps(handle)?;

        let filter = if filter.min == MinFilter::Linear {
            let filter = TextureFilter {
                min: MinFilter::LinearMipmapNearest,
                mag: filter.mag,
            };
            self.device.set_texture_filter(handle, filter);
            filter
        } else {
            filter
        };

        if let Some(data) = self.textures.get_mut(texture.key) {
            data.has_mipmaps = true;
            data.filter = filter;
        }
        Ok(())
    }

    pub fn set_texture_filter(&mut self, texture: TextureId, filter: Filter) {
        let Ok(data) = self.texture_data(texture) else {
            tracing::error!("Ignoring filter change on an invalid texture");
            return;
        };
        let handle = data.handle;
        let resolved = filter.resolve(data.has_mipmaps);

        self.flush_if_current_texture(texture);
        self.bind_texture(texture, handle);
        self.device.set_texture_filter(handle, resolved);
        if let Some(data) = self.textures.get_mut(texture.key) {
            data.filter = resolved;
        }
    }

    /// Rewrite every texel whose color is `from` to `to`, alpha untouched.
    pub fn replace_rgb(&mut self, texture: TextureId, from: [u8; 3], to: [u8; 3]) -> Result<(), ResourceError> {
        self.rewrite_storage(texture, None, |px| {
            if px[..3] == from {
                px[..3].copy_from_slice(&to);
            }
        })
    }

    /// Zero the alpha of every texel whose color is `rgb`. Needs four channels.
    pub fn make_rgb_transparent(&mut self, texture: TextureId, rgb: [u8; 3]) -> Result<(), ResourceError> {
        self.rewrite_storage(texture, Some(PixelFormat::Rgba), |px| {
            if px[..3] == rgb {
                px[3] = 0;
            }
        })
    }

    /// Read the whole storage, apply `f` to every texel and upload it again.
    fn rewrite_storage(
        &mut self,
        texture: TextureId,
        required: Option<PixelFormat>,
        f: impl Fn(&mut [u8]),
    ) -> Result<(), ResourceError> {
        let (handle, format, storage, target) = {
            let data = self.texture_data(texture)?;
            (data.handle, data.format, data.storage, data.target)
        };
        if let Some(required) = required
            && format != required
        {
            return Err(ResourceError::InvalidChannels(format.channels()));
        }

        self.flush_before_mutation(texture, target);
        let region = DeviceRect::sized(storage.width, storage.height);
        let mut data = self.read_storage(texture, region)?;
        for px in data.chunks_exact_mut(format.bytes_per_pixel()) {
            f(px);
        }

        self.bind_texture(texture, handle);
        self.device.write_texture(handle, region, format, &data)?;
        Ok(())
    }

    /// Read `region` of a texture's storage through its render target,
    /// borrowing a temporary target when it has none.
    pub(crate) fn read_storage(&mut self, texture: TextureId, region: DeviceRect) -> Result<Vec<u8>, ResourceError> {
        let (format, existing) = {
            let data = self.texture_data(texture)?;
            (data.format, data.target)
        };

        let target = match existing {
            Some(target) => target,
            None => self
                .load_target(texture)
                .ok_or(ResourceError::Unsupported(GpuFeatures::RENDER_TARGETS))?,
        };

        self.flush_if_current_target(Some(target));
        let result = if self.bind_target(target) {
            match self.device.read_pixels(region, format) {
                Ok(bytes) if bytes.len() == region.pixel_count() * format.bytes_per_pixel() => Ok(bytes),
                Ok(bytes) => {
                    tracing::error!(
                        "Readback returned {} bytes for a {}x{} region",
                        bytes.len(),
                        region.width,
                        region.height
                    );
                    Err(ResourceError::Device(DeviceError::InvalidRegion))
                }
                Err(e) => Err(e.into()),
            }
        } else {
            Err(ResourceError::Unsupported(GpuFeatures::RENDER_TARGETS))
        };

        if existing.is_none() {
            self.destroy_target(target);
        }
        result
    }

    /// The texture's logical area as a tightly packed buffer in its format.
    pub fn read_texture(&mut self, texture: TextureId) -> Result<PixelBuffer, ResourceError> {
        let (size, format) = {
            let data = self.texture_data(texture)?;
            (data.logical, data.format)
        };
        let bytes = self.read_storage(texture, DeviceRect::sized(size.width, size.height))?;
        Ok(PixelBuffer::new(size.width, size.height, PixelLayout::from(format), bytes)?)
    }

    /// Color of one texel in a texture's logical area.
    pub fn texture_pixel(&mut self, texture: TextureId, x: u32, y: u32) -> Result<Color, ResourceError> {
        let (size, format) = {
            let data = self.texture_data(texture)?;
            (data.logical, data.format)
        };
        if x >= size.width || y >= size.height {
            return Err(ResourceError::InvalidArgument("texel lies outside the texture"));
        }
        let bytes = self.read_storage(texture, DeviceRect::new(x as i32, y as i32, 1, 1))?;
        match (format, bytes.as_slice()) {
            (PixelFormat::Rgb, &[r, g, b]) => Ok(Color::rgb(r, g, b)),
            (PixelFormat::Rgba, &[r, g, b, a]) => Ok(Color::rgba(r, g, b, a)),
            _ => Err(ResourceError::Device(DeviceError::InvalidRegion)),
        }
    }
}
