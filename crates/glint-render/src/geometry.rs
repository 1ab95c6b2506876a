//! Quad geometry for blits.
//!
//! Every blit becomes two triangles. Positions are in target pixels with the
//! quad centered on the destination point; texture coordinates are normalized
//! against the texture's *storage* size so padded textures sample only their
//! logical area.

use glam::{Affine2, Vec2};
use glint_core::geometry::{Rect, Size};
use glint_test_utils::BatchVertex;

/// Texel inset applied on every edge of the sampled region, to keep filtering
/// from pulling in neighboring texels.
pub const TEXEL_INSET: f32 = 0.1;

/// Vertices per quad.
pub const QUAD_VERTICES: usize = 6;

pub type Quad = [BatchVertex; QUAD_VERTICES];

/// The part of a texture a blit samples, in texels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceRegion {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl SourceRegion {
    /// `src`, or the whole logical texture when `None`.
    pub fn resolve(src: Option<Rect<i32>>, logical: Size<u32>) -> Self {
        match src {
            Some(rect) => Self {
                x: rect.x as f32,
                y: rect.y as f32,
                width: rect.width as f32,
                height: rect.height as f32,
            },
            None => Self {
                x: 0.0,
                y: 0.0,
                width: logical.width as f32,
                height: logical.height as f32,
            },
        }
    }

    fn half_extent(&self) -> Vec2 {
        Vec2::new(self.width, self.height) / 2.0
    }
}

/// Normalized texture coordinates of a region's corners.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TexCoords {
    pub s1: f32,
    pub t1: f32,
    pub s2: f32,
    pub t2: f32,
}

impl TexCoords {
    pub fn new(region: &SourceRegion, storage: Size<u32>) -> Self {
        // Zero-sized storage never reaches a device, but must not divide by zero.
        let tex_w = storage.width.max(1) as f32;
        let tex_h = storage.height.max(1) as f32;
        Self {
            s1: (region.x + TEXEL_INSET) / tex_w,
            t1: (region.y + TEXEL_INSET) / tex_h,
            s2: (region.x + region.width - TEXEL_INSET) / tex_w,
            t2: (region.y + region.height - TEXEL_INSET) / tex_h,
        }
    }
}

/// Corner order: top-left, top-right, bottom-right, bottom-left.
fn quad_from_corners(corners: [Vec2; 4], tc: TexCoords) -> Quad {
    let [c1, c3, c2, c4] = corners;
    [
        BatchVertex::new(c1.x, c1.y, tc.s1, tc.t1),
        BatchVertex::new(c3.x, c3.y, tc.s2, tc.t1),
        BatchVertex::new(c2.x, c2.y, tc.s2, tc.t2),
        BatchVertex::new(c1.x, c1.y, tc.s1, tc.t1),
        BatchVertex::new(c2.x, c2.y, tc.s2, tc.t2),
        BatchVertex::new(c4.x, c4.y, tc.s1, tc.t2),
    ]
}

/// Axis-aligned quad centered on `(x, y)`.
pub fn blit_quad(region: &SourceRegion, storage: Size<u32>, x: f32, y: f32) -> Quad {
    let half = region.half_extent();
    let (x1, y1) = (x - half.x, y - half.y);
    let (x2, y2) = (x + half.x, y + half.y);
    quad_from_corners(
        [
            Vec2::new(x1, y1),
            Vec2::new(x2, y1),
            Vec2::new(x2, y2),
            Vec2::new(x1, y2),
        ],
        TexCoords::new(region, storage),
    )
}

/// Rotation, scale and pivot for [`transform_quad`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuadTransform {
    /// Pivot position relative to the quad center, before scaling.
    pub pivot: Vec2,
    /// Clockwise on screen, in degrees.
    pub angle: f32,
    pub scale: Vec2,
}

impl QuadTransform {
    pub const IDENTITY: Self = Self {
        pivot: Vec2::ZERO,
        angle: 0.0,
        scale: Vec2::ONE,
    };

    pub fn rotation(angle: f32) -> Self {
        Self { angle, ..Self::IDENTITY }
    }

    pub fn scaling(scale_x: f32, scale_y: f32) -> Self {
        Self {
            scale: Vec2::new(scale_x, scale_y),
            ..Self::IDENTITY
        }
    }
}

impl Default for QuadTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Rotate `p` about the origin by `degrees`.
pub fn rotate_point(p: Vec2, degrees: f32) -> Vec2 {
    let (sin, cos) = degrees.to_radians().sin_cos();
    Vec2::new(p.x * cos - p.y * sin, p.x * sin + p.y * cos)
}

/// Quad scaled about its center, moved so the pivot sits at the origin,
/// rotated about the pivot, then translated to `(x, y)`.
pub fn transform_quad(
    region: &SourceRegion,
    storage: Size<u32>,
    x: f32,
    y: f32,
    transform: &QuadTransform,
) -> Quad {
    let half = region.half_extent() * transform.scale;
    let shift = transform.pivot * transform.scale;

    let mut corners = [
        Vec2::new(-half.x, -half.y),
        Vec2::new(half.x, -half.y),
        Vec2::new(half.x, half.y),
        Vec2::new(-half.x, half.y),
    ]
    .map(|c| c - shift);

    if transform.angle != 0.0 {
        corners = corners.map(|c| rotate_point(c, transform.angle));
    }

    let origin = Vec2::new(x, y);
    quad_from_corners(corners.map(|c| c + origin), TexCoords::new(region, storage))
}

/// Map every vertex position through `model`.
pub fn apply_model(quad: &mut Quad, model: &Affine2) {
    if *model == Affine2::IDENTITY {
        return;
    }
    for vertex in quad.iter_mut() {
        let p = model.transform_point2(Vec2::new(vertex.x(), vertex.y()));
        vertex.position[0] = p.x;
        vertex.position[1] = p.y;
    }
}

/// Model transform for a column-major 3x3 matrix placed at `(x, y)`.
///
/// The linear part is `(m0, m1; m3, m4)` and the translation `(m6, m7)`. The
/// remaining terms only touch z, which this renderer keeps at zero.
pub fn matrix_model(x: f32, y: f32, m: &[f32; 9]) -> Affine2 {
    Affine2::from_translation(Vec2::new(x, y)) * Affine2::from_cols_array(&[m[0], m[1], m[3], m[4], m[6], m[7]])
}
