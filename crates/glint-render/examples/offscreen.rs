//! Offscreen Blitting Demo
//!
//! Draws a ring of rotated sprites into an offscreen target on a headless
//! wgpu device and writes the result to `offscreen.png`.
//!
//! Run with: cargo run -p glint-render --example offscreen --features image

use glint_core::geometry::Rect;
use glint_render::{
    BlendMode, Color, GpuRenderer, PixelBuffer, PixelLayout, Renderer2D, RendererConfig, WgpuDevice,
    WgpuDeviceDescriptor,
};
use std::path::Path;
use std::sync::Arc;

const CANVAS: u32 = 256;
const SPRITE: u32 = 16;

/// A 16x16 checkerboard with a magenta color key in the dark squares.
fn checker_sprite() -> PixelBuffer {
    let mut data = Vec::with_capacity((SPRITE * SPRITE * 3) as usize);
    for y in 0..SPRITE {
        for x in 0..SPRITE {
            let light = ((x / 4) + (y / 4)) % 2 == 0;
            data.extend_from_slice(if light { &[240, 200, 60] } else { &[255, 0, 255] });
        }
    }
    PixelBuffer::new(SPRITE, SPRITE, PixelLayout::Rgb, data)
        .expect("Sprite buffer size mismatch")
        .with_color_key([255, 0, 255])
}

fn main() {
    glint_core::logging::init();

    let device = WgpuDevice::new(WgpuDeviceDescriptor::default().size(CANVAS, CANVAS).label("offscreen demo"))
        .expect("Failed to create wgpu device");
    let mut renderer =
        GpuRenderer::new(Arc::new(device), RendererConfig::new(CANVAS, CANVAS)).expect("Failed to create renderer");

    let sprite = renderer
        .create_texture_from_pixels(&checker_sprite())
        .expect("Failed to upload sprite");
    let canvas = renderer
        .create_texture(CANVAS, CANVAS, 4)
        .expect("Failed to create canvas");
    let target = renderer.load_target(canvas).expect("Render targets are not supported");

    renderer.clear_rgba(target, Color::from_hex(0x1e1e2e));

    let center = CANVAS as f32 / 2.0;
    for i in 0..24 {
        let angle = i as f32 * 15.0;
        let (sin, cos) = angle.to_radians().sin_cos();
        let scale = 1.0 + (i % 3) as f32 * 0.5;
        renderer
            .blit_transform(sprite, None, target, center + cos * 90.0, center + sin * 90.0, angle, scale, scale)
            .expect("Failed to queue sprite");
    }

    renderer.set_blend_mode(BlendMode::Add);
    renderer.set_rgba(Color::rgba(80, 160, 255, 200));
    renderer.set_clip(target, Rect::new(64, 64, 128, 128));
    renderer
        .blit_scale(sprite, Some(Rect::new(0, 0, 8, 8)), target, center, center, 12.0, 12.0)
        .expect("Failed to queue overlay");
    renderer.clear_clip(target);
    renderer.set_blend_mode(BlendMode::Normal);
    renderer.set_rgba(Color::WHITE);

    renderer.generate_mipmaps(canvas).expect("Failed to build mipmaps");
    let display = renderer.display();
    renderer
        .blit_rotate(canvas, None, display, center, center, 10.0)
        .expect("Failed to draw canvas to display");
    renderer.present();

    renderer
        .save_texture(canvas, Path::new("offscreen.png"))
        .expect("Failed to save offscreen.png");
    println!("Wrote offscreen.png ({CANVAS}x{CANVAS})");
}
