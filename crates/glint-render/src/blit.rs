//! Blits: one textured quad queued per call.
//!
//! Every variant resolves its source region, builds six vertices on the CPU,
//! runs them through the current model transform and appends them to the
//! batch. Nothing reaches the device until the batch flushes.

use crate::batch::BatchFull;
use crate::error::BlitError;
use crate::geometry::{apply_model, blit_quad, matrix_model, transform_quad, Quad, QuadTransform, SourceRegion};
use crate::renderer::GpuRenderer;
use crate::resource::{TargetId, TextureId};
use glam::Vec2;
use glint_core::geometry::{Rect, Size};
use glint_core::profiling::profile_function;

impl GpuRenderer {
    /// Validate, bind and queue one quad built by `build` from the resolved
    /// source region and the texture's storage size.
    fn queue_quad(
        &mut self,
        texture: TextureId,
        src: Option<Rect<i32>>,
        dest: TargetId,
        build: impl FnOnce(&SourceRegion, Size<u32>, Size<u32>) -> Quad,
    ) -> Result<(), BlitError> {
        profile_function!();
        if texture.renderer != self.id || dest.renderer != self.id {
            return Err(BlitError::RendererMismatch);
        }
        let (handle, logical, storage) = match self.textures.get(texture.key) {
            Some(data) => (data.handle, data.logical, data.storage),
            None => return Err(BlitError::InvalidArgument),
        };
        if !self.targets.contains(dest.key) {
            return Err(BlitError::InvalidArgument);
        }

        self.bind_texture(texture, handle);
        if !self.bind_target(dest) {
            return Err(BlitError::Unsupported);
        }

        let region = SourceRegion::resolve(src, logical);
        let mut quad = build(&region, storage, logical);
        apply_model(&mut quad, &self.model);

        if !self.batch.has_room_for_quad() {
            self.flush();
        }
        self.batch
            .try_push_quad(&quad)
            .map_err(|BatchFull| BlitError::BatchFull)?;

        tracing::trace!(
            "Queued quad at ({}, {}), {} vertices pending",
            quad[0].x(),
            quad[0].y(),
            self.batch.len()
        );
        Ok(())
    }

    /// Draw `src` of `texture` (the whole texture by default) centered on
    /// `(x, y)`.
    pub fn blit(
        &mut self,
        texture: TextureId,
        src: Option<Rect<i32>>,
        dest: TargetId,
        x: f32,
        y: f32,
    ) -> Result<(), BlitError> {
        self.queue_quad(texture, src, dest, |region, storage, _| blit_quad(region, storage, x, y))
    }

    /// Like [`blit`](Self::blit), rotated `angle` degrees about the center.
    pub fn blit_rotate(
        &mut self,
        texture: TextureId,
        src: Option<Rect<i32>>,
        dest: TargetId,
        x: f32,
        y: f32,
        angle: f32,
    ) -> Result<(), BlitError> {
        let transform = QuadTransform::rotation(angle);
        self.queue_quad(texture, src, dest, |region, storage, _| {
            transform_quad(region, storage, x, y, &transform)
        })
    }

    /// Like [`blit`](Self::blit), scaled about the center.
    pub fn blit_scale(
        &mut self,
        texture: TextureId,
        src: Option<Rect<i32>>,
        dest: TargetId,
        x: f32,
        y: f32,
        scale_x: f32,
        scale_y: f32,
    ) -> Result<(), BlitError> {
        let transform = QuadTransform::scaling(scale_x, scale_y);
        self.queue_quad(texture, src, dest, |region, storage, _| {
            transform_quad(region, storage, x, y, &transform)
        })
    }

    /// Scale, then rotate, about the center.
    #[allow(clippy::too_many_arguments)]
    pub fn blit_transform(
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
        let transform = QuadTransform {
            pivot: Vec2::ZERO,
            angle,
            scale: Vec2::new(scale_x, scale_y),
        };
        self.queue_quad(texture, src, dest, |region, storage, _| {
            transform_quad(region, storage, x, y, &transform)
        })
    }

    /// Scale and rotate about `(pivot_x, pivot_y)`, measured in pixels from
    /// the texture's top-left corner. The pivot lands on `(x, y)`.
    #[allow(clippy::too_many_arguments)]
    pub fn blit_transform_x(
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
        self.queue_quad(texture, src, dest, |region, storage, logical| {
            let transform = QuadTransform {
                pivot: Vec2::new(
                    pivot_x - logical.width as f32 / 2.0,
                    pivot_y - logical.height as f32 / 2.0,
                ),
                angle,
                scale: Vec2::new(scale_x, scale_y),
            };
            transform_quad(region, storage, x, y, &transform)
        })
    }

    /// Draw through a column-major 3x3 matrix, then translate to `(x, y)`.
    pub fn blit_transform_matrix(
        &mut self,
        texture: TextureId,
        src: Option<Rect<i32>>,
        dest: TargetId,
        x: f32,
        y: f32,
        matrix: &[f32; 9],
    ) -> Result<(), BlitError> {
        let model = matrix_model(x, y, matrix);
        self.with_model_transform(model, |r| r.blit(texture, src, dest, 0.0, 0.0))
    }
}
