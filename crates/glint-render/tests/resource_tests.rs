//! Texture and target lifecycle and pixel operation tests.

use glint_render::{
    BlitError, Color, Filter, GpuFeatures, GpuRenderer, PixelBuffer, PixelLayout, Rect, Renderer2D,
    RendererConfig, ResourceError, Size,
};
use glint_test_utils::{DeviceCall, MagFilter, MinFilter, MockDevice, PixelFormat, TextureFilter};
use std::sync::Arc;

fn renderer() -> (Arc<MockDevice>, GpuRenderer) {
    glint_core::logging::try_init();
    let mock = Arc::new(MockDevice::new());
    let r = GpuRenderer::new(mock.clone(), RendererConfig::new(64, 64)).unwrap();
    (mock, r)
}

fn rgb_2x2() -> PixelBuffer {
    PixelBuffer::new(
        2,
        2,
        PixelLayout::Rgb,
        vec![255, 0, 0, 0, 255, 0, 0, 0, 255, 255, 255, 255],
    )
    .unwrap()
}

// Creation

#[test]
fn test_create_texture_validates_arguments() {
    let (mock, mut r) = renderer();

    assert_eq!(r.create_texture(4, 4, 2), Err(ResourceError::InvalidChannels(2)));
    assert!(matches!(r.create_texture(0, 4, 4), Err(ResourceError::InvalidArgument(_))));
    assert_eq!(mock.count_texture_creates(), 0);
}

#[test]
fn test_create_texture_reports_device_failure() {
    let (mock, mut r) = renderer();
    mock.fail_texture_allocations(true);

    assert!(matches!(r.create_texture(4, 4, 4), Err(ResourceError::Device(_))));
    mock.fail_texture_allocations(false);
    assert!(r.create_texture(4, 4, 4).is_ok());
}

#[test]
fn test_new_texture_defaults() {
    let (_mock, mut r) = renderer();
    let tex = r.create_texture(30, 20, 3).unwrap();
    let info = r.texture_info(tex).unwrap();

    assert_eq!(info.size, Size::new(30, 20));
    assert_eq!(info.storage_size, Size::new(30, 20));
    assert_eq!(info.channels, 3);
    assert_eq!(info.format, PixelFormat::Rgb);
    assert_eq!(info.filter, TextureFilter::LINEAR);
    assert!(!info.has_mipmaps);
    assert_eq!(info.target, None);
}

#[test]
fn test_texture_from_pixels_round_trips() {
    let (_mock, mut r) = renderer();
    let pixels = rgb_2x2();
    let tex = r.create_texture_from_pixels(&pixels).unwrap();

    assert_eq!(r.texture_info(tex).unwrap().channels, 3);
    let back = r.read_texture(tex).unwrap();
    assert_eq!(back.layout(), PixelLayout::Rgb);
    assert_eq!(back.data(), pixels.data());
}

#[test]
fn test_texture_from_bgra_is_swizzled() {
    let (_mock, mut r) = renderer();
    let pixels = PixelBuffer::new(1, 1, PixelLayout::Bgra, vec![10, 20, 30, 40]).unwrap();
    let tex = r.create_texture_from_pixels(&pixels).unwrap();

    assert_eq!(r.texture_pixel(tex, 0, 0).unwrap(), Color::rgba(30, 20, 10, 40));
}

#[test]
fn test_color_key_becomes_transparent() {
    let (_mock, mut r) = renderer();
    let pixels = rgb_2x2().with_color_key([0, 255, 0]);
    let tex = r.create_texture_from_pixels(&pixels).unwrap();

    assert_eq!(r.texture_info(tex).unwrap().channels, 4);
    assert_eq!(r.texture_pixel(tex, 1, 0).unwrap(), Color::rgba(0, 255, 0, 0));
    assert_eq!(r.texture_pixel(tex, 0, 0).unwrap(), Color::rgba(255, 0, 0, 255));
}

#[test]
fn test_texture_pixel_bounds() {
    let (_mock, mut r) = renderer();
    let tex = r.create_texture_from_pixels(&rgb_2x2()).unwrap();
    assert!(matches!(r.texture_pixel(tex, 2, 0), Err(ResourceError::InvalidArgument(_))));
}

#[test]
fn test_truncated_readback_is_an_error() {
    let (mock, mut r) = renderer();
    let tex = r.create_texture_from_pixels(&rgb_2x2()).unwrap();
    mock.short_reads(true);

    assert!(matches!(r.texture_pixel(tex, 0, 0), Err(ResourceError::Device(_))));
    assert!(matches!(r.read_texture(tex), Err(ResourceError::Device(_))));
    assert_eq!(mock.live_framebuffers(), 0);

    mock.short_reads(false);
    assert_eq!(r.texture_pixel(tex, 0, 0).unwrap(), Color::rgb(255, 0, 0));
}

// Updates

#[test]
fn test_update_texture_region() {
    let (_mock, mut r) = renderer();
    let tex = r.create_texture_from_pixels(&rgb_2x2()).unwrap();
    let patch = PixelBuffer::new(1, 1, PixelLayout::Rgb, vec![9, 8, 7]).unwrap();

    r.update_texture(tex, Some(Rect::new(1, 1, 1, 1)), &patch).unwrap();

    assert_eq!(r.texture_pixel(tex, 1, 1).unwrap(), Color::rgb(9, 8, 7));
    assert_eq!(r.texture_pixel(tex, 0, 0).unwrap(), Color::rgb(255, 0, 0));
}

#[test]
fn test_update_texture_rejects_bad_regions() {
    let (_mock, mut r) = renderer();
    let tex = r.create_texture(2, 2, 3).unwrap();
    let patch = PixelBuffer::new(1, 1, PixelLayout::Rgb, vec![9, 8, 7]).unwrap();

    assert!(matches!(
        r.update_texture(tex, Some(Rect::new(0, 0, 2, 2)), &patch),
        Err(ResourceError::InvalidArgument(_))
    ));
    assert!(matches!(
        r.update_texture(tex, Some(Rect::new(2, 0, 1, 1)), &patch),
        Err(ResourceError::InvalidArgument(_))
    ));
    assert!(matches!(
        r.update_texture(tex, Some(Rect::new(i32::MAX, 0, 1, 1)), &patch),
        Err(ResourceError::InvalidArgument(_))
    ));
    assert!(matches!(
        r.update_texture(tex, Some(Rect::new(0, i32::MAX, 1, 1)), &patch),
        Err(ResourceError::InvalidArgument(_))
    ));
}

#[test]
fn test_update_flushes_quads_using_texture() {
    let (mock, mut r) = renderer();
    let tex = r.create_texture(2, 2, 3).unwrap();
    let display = r.display();
    let patch = PixelBuffer::new(2, 2, PixelLayout::Rgb, vec![0; 12]).unwrap();

    r.blit(tex, None, display, 10.0, 10.0).unwrap();
    mock.clear_calls();
    r.update_texture(tex, None, &patch).unwrap();

    let calls = mock.calls();
    let draw = calls.iter().position(|c| matches!(c, DeviceCall::Draw(_))).unwrap();
    let write = calls
        .iter()
        .position(|c| matches!(c, DeviceCall::WriteTexture { .. }))
        .unwrap();
    assert!(draw < write);
}

#[test]
fn test_replace_rgb_keeps_alpha() {
    let (_mock, mut r) = renderer();
    let pixels = PixelBuffer::new(2, 1, PixelLayout::Rgba, vec![255, 0, 0, 255, 0, 255, 0, 128]).unwrap();
    let tex = r.create_texture_from_pixels(&pixels).unwrap();

    r.replace_rgb(tex, [255, 0, 0], [0, 0, 255]).unwrap();

    let back = r.read_texture(tex).unwrap();
    assert_eq!(back.data(), &[0, 0, 255, 255, 0, 255, 0, 128]);
}

#[test]
fn test_make_rgb_transparent_needs_alpha() {
    let (_mock, mut r) = renderer();
    let rgb = r.create_texture_from_pixels(&rgb_2x2()).unwrap();
    assert_eq!(r.make_rgb_transparent(rgb, [255, 0, 0]), Err(ResourceError::InvalidChannels(3)));

    let rgba = PixelBuffer::new(2, 1, PixelLayout::Rgba, vec![1, 2, 3, 255, 4, 5, 6, 255]).unwrap();
    let tex = r.create_texture_from_pixels(&rgba).unwrap();
    r.make_rgb_transparent(tex, [4, 5, 6]).unwrap();

    assert_eq!(r.texture_pixel(tex, 1, 0).unwrap(), Color::rgba(4, 5, 6, 0));
    assert_eq!(r.texture_pixel(tex, 0, 0).unwrap(), Color::rgba(1, 2, 3, 255));
}

#[test]
fn test_readback_leaves_no_framebuffer_behind() {
    let (mock, mut r) = renderer();
    let tex = r.create_texture_from_pixels(&rgb_2x2()).unwrap();

    r.read_texture(tex).unwrap();
    assert_eq!(mock.live_framebuffers(), 0);
    assert_eq!(r.texture_info(tex).unwrap().target, None);

    let target = r.load_target(tex).unwrap();
    r.read_texture(tex).unwrap();
    assert_eq!(r.texture_info(tex).unwrap().target, Some(target));
    assert_eq!(mock.live_framebuffers(), 1);
}

#[test]
fn test_readback_needs_render_targets() {
    let mock = Arc::new(MockDevice::new());
    let config = RendererConfig::new(16, 16).with_disabled_features(GpuFeatures::RENDER_TARGETS);
    let mut r = GpuRenderer::new(mock, config).unwrap();
    let tex = r.create_texture_from_pixels(&rgb_2x2()).unwrap();

    assert_eq!(
        r.read_texture(tex),
        Err(ResourceError::Unsupported(GpuFeatures::RENDER_TARGETS))
    );
}

// Filtering

#[test]
fn test_mipmaps_upgrade_linear_filter() {
    let (mock, mut r) = renderer();
    let tex = r.create_texture(16, 16, 4).unwrap();

    r.generate_mipmaps(tex).unwrap();

    let info = r.texture_info(tex).unwrap();
    assert!(info.has_mipmaps);
    assert_eq!(info.filter.min, MinFilter::LinearMipmapNearest);
    assert!(mock.calls().iter().any(|c| matches!(c, DeviceCall::GenerateMipmaps { .. })));
}

#[test]
fn test_filter_resolves_against_mipmaps() {
    let (_mock, mut r) = renderer();
    let tex = r.create_texture(16, 16, 4).unwrap();

    r.set_texture_filter(tex, Filter::LinearMipmap);
    assert_eq!(r.texture_info(tex).unwrap().filter, TextureFilter::LINEAR);

    r.generate_mipmaps(tex).unwrap();
    r.set_texture_filter(tex, Filter::LinearMipmap);
    assert_eq!(
        r.texture_info(tex).unwrap().filter,
        TextureFilter {
            min: MinFilter::LinearMipmapLinear,
            mag: MagFilter::Linear
        }
    );

    r.set_texture_filter(tex, Filter::Nearest);
    assert_eq!(r.texture_info(tex).unwrap().filter, TextureFilter::NEAREST);
}

// Copies

#[test]
fn test_copy_texture_draws_without_blending() {
    let (mock, mut r) = renderer();
    let tex = r.create_texture(8, 4, 4).unwrap();

    let copy = r.copy_texture(tex).unwrap();

    let info = r.texture_info(copy).unwrap();
    assert_eq!(info.size, Size::new(8, 4));
    assert_eq!(info.channels, 4);
    assert_eq!(info.target, None);

    let draws = mock.draws();
    assert_eq!(draws.len(), 1);
    assert!(!draws[0].blending);
    assert!(draws[0].framebuffer.is_some());
    assert_eq!((draws[0].vertices[0].x(), draws[0].vertices[0].y()), (0.0, 0.0));

    assert!(r.blending());
    assert!(mock.blending());
    assert_eq!(mock.live_framebuffers(), 0);
}

#[test]
fn test_copy_texture_needs_render_targets() {
    let mock = Arc::new(MockDevice::new());
    let config = RendererConfig::new(16, 16).with_disabled_features(GpuFeatures::RENDER_TARGETS);
    let mut r = GpuRenderer::new(mock.clone(), config).unwrap();
    let tex = r.create_texture(4, 4, 4).unwrap();

    assert_eq!(
        r.copy_texture(tex),
        Err(ResourceError::Unsupported(GpuFeatures::RENDER_TARGETS))
    );
    assert_eq!(mock.live_textures(), 1);
}

#[test]
fn test_copy_from_pixels_onto_target() {
    let (mock, mut r) = renderer();
    let canvas = r.create_texture(16, 16, 4).unwrap();
    let target = r.load_target(canvas).unwrap();
    let pixels = PixelBuffer::filled(4, 2, [1, 2, 3, 255]).unwrap();

    r.copy_from_pixels(&pixels, None, target, 2, 1).unwrap();

    let draws = mock.draws();
    assert_eq!(draws.len(), 1);
    assert!(!draws[0].blending);
    assert_eq!((draws[0].vertices[0].x(), draws[0].vertices[0].y()), (2.0, 1.0));
    assert_eq!(mock.live_textures(), 1);
    assert!(r.blending());
}

#[test]
fn test_copy_from_pixels_needs_texture_target() {
    let (mock, mut r) = renderer();
    let display = r.display();
    let pixels = PixelBuffer::filled(4, 2, [1, 2, 3, 255]).unwrap();

    assert!(matches!(
        r.copy_from_pixels(&pixels, None, display, 0, 0),
        Err(ResourceError::InvalidArgument(_))
    ));
    assert_eq!(mock.count_texture_creates(), 0);
}

#[test]
fn test_copy_from_pixels_rejects_bad_source() {
    let (_mock, mut r) = renderer();
    let canvas = r.create_texture(16, 16, 4).unwrap();
    let target = r.load_target(canvas).unwrap();
    let pixels = PixelBuffer::filled(4, 2, [1, 2, 3, 255]).unwrap();

    assert!(matches!(
        r.copy_from_pixels(&pixels, Some(Rect::new(2, 0, 4, 2)), target, 0, 0),
        Err(ResourceError::Pixels(_))
    ));
}

// Targets

#[test]
fn test_offscreen_clear_and_read() {
    let (_mock, mut r) = renderer();
    let canvas = r.create_texture(4, 4, 4).unwrap();
    let target = r.load_target(canvas).unwrap();

    r.set_clip(target, Rect::new(0, 0, 2, 1));
    r.clear_rgba(target, Color::rgb(255, 0, 0));

    assert_eq!(r.get_pixel(target, 1, 0), Color::rgb(255, 0, 0));
    assert_eq!(r.get_pixel(target, 1, 1), Color::TRANSPARENT);
    assert_eq!(r.texture_pixel(canvas, 0, 0).unwrap(), Color::rgb(255, 0, 0));
}

#[test]
fn test_target_info_reports_backing_texture() {
    let (_mock, mut r) = renderer();
    let canvas = r.create_texture(24, 12, 4).unwrap();
    let target = r.load_target(canvas).unwrap();

    let info = r.target_info(target).unwrap();
    assert!(!info.is_display);
    assert_eq!(info.texture, Some(canvas));
    assert_eq!(info.size, Size::new(24, 12));
    assert!(!info.clip.enabled);

    assert!(r.target_info(r.display()).unwrap().is_display);
}

#[test]
fn test_load_target_failure_leaves_texture_usable() {
    let (mock, mut r) = renderer();
    let canvas = r.create_texture(8, 8, 4).unwrap();
    mock.fail_framebuffer_allocations(true);

    assert_eq!(r.load_target(canvas), None);
    mock.fail_framebuffer_allocations(false);
    assert!(r.load_target(canvas).is_some());
}

// Destruction

#[test]
fn test_destroy_flushes_pending_quads_first() {
    let (mock, mut r) = renderer();
    let tex = r.create_texture(4, 4, 4).unwrap();
    let display = r.display();

    r.blit(tex, None, display, 8.0, 8.0).unwrap();
    r.destroy_texture(tex);

    let calls = mock.calls();
    let draw = calls.iter().position(|c| matches!(c, DeviceCall::Draw(_))).unwrap();
    let destroy = calls
        .iter()
        .position(|c| matches!(c, DeviceCall::DestroyTexture { .. }))
        .unwrap();
    assert!(draw < destroy);
    assert_eq!(r.pending_vertices(), 0);
    assert_eq!(r.texture_info(tex), None);
}

#[test]
fn test_destroy_texture_releases_its_target() {
    let (mock, mut r) = renderer();
    let canvas = r.create_texture(8, 8, 4).unwrap();
    let target = r.load_target(canvas).unwrap();

    r.destroy_texture(canvas);

    assert_eq!(r.target_info(target), None);
    assert_eq!(mock.live_framebuffers(), 0);
    assert_eq!(mock.live_textures(), 0);
}

#[test]
fn test_destroy_target_keeps_texture() {
    let (mock, mut r) = renderer();
    let tex = r.create_texture(4, 4, 4).unwrap();
    let canvas = r.create_texture(8, 8, 4).unwrap();
    let target = r.load_target(canvas).unwrap();

    r.blit(tex, None, target, 4.0, 4.0).unwrap();
    r.destroy_target(target);

    assert_eq!(mock.count_draws(), 1);
    assert_eq!(r.texture_info(canvas).unwrap().target, None);
    assert_eq!(mock.live_framebuffers(), 0);
    assert_eq!(r.blit(tex, None, target, 4.0, 4.0), Err(BlitError::InvalidArgument));
}

#[test]
fn test_destroying_display_is_ignored() {
    let (_mock, mut r) = renderer();
    let display = r.display();
    r.destroy_target(display);
    assert!(r.target_info(display).is_some());
}

#[test]
fn test_destroyed_slot_reuse_does_not_revive_id() {
    let (_mock, mut r) = renderer();
    let old = r.create_texture(4, 4, 4).unwrap();
    r.destroy_texture(old);
    let new = r.create_texture(4, 4, 4).unwrap();

    assert_ne!(old, new);
    assert_eq!(r.texture_info(old), None);
    assert!(r.texture_info(new).is_some());
}

#[test]
fn test_drop_releases_device_resources() {
    let (mock, mut r) = renderer();
    for _ in 0..3 {
        let tex = r.create_texture(8, 8, 4).unwrap();
        r.load_target(tex).unwrap();
    }
    r.create_texture(8, 8, 3).unwrap();
    assert_eq!(mock.live_textures(), 4);
    assert_eq!(mock.live_framebuffers(), 3);

    drop(r);

    assert_eq!(mock.live_textures(), 0);
    assert_eq!(mock.live_framebuffers(), 0);
}

#[test]
fn test_foreign_texture_is_rejected_by_resource_calls() {
    let (_a_mock, mut a) = renderer();
    let (_b_mock, mut b) = renderer();
    let tex = b.create_texture(4, 4, 4).unwrap();

    assert_eq!(a.generate_mipmaps(tex), Err(ResourceError::RendererMismatch));
    assert_eq!(a.texture_info(tex), None);
    assert_eq!(a.load_target(tex), None);
}
