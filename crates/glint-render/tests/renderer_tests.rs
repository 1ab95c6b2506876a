//! Renderer lifecycle, batching and state tests against the mock device.

use glint_render::{
    BlendMode, Color, GpuFeatures, GpuRenderer, InitError, Rect, Renderer2D, RendererConfig, Size,
};
use glint_test_utils::{
    BlendFunction, DeviceApi, DeviceCall, DeviceInfo, MockDevice, ScissorRect, Viewport,
};
use std::sync::Arc;
use wgpu::{BlendFactor, BlendOperation};

fn renderer(width: u32, height: u32) -> (Arc<MockDevice>, GpuRenderer) {
    glint_core::logging::try_init();
    let mock = Arc::new(MockDevice::new());
    let r = GpuRenderer::new(mock.clone(), RendererConfig::new(width, height)).unwrap();
    (mock, r)
}

fn index_of(calls: &[DeviceCall], pred: impl Fn(&DeviceCall) -> bool) -> usize {
    calls.iter().position(pred).expect("call not recorded")
}

// Initialization

#[test]
fn test_init_sets_up_device_state_in_order() {
    let (mock, _r) = renderer(800, 600);
    let calls = mock.calls();

    assert!(matches!(calls[0], DeviceCall::BindFramebuffer(None)));
    assert_eq!(calls[1], DeviceCall::SetViewport(Viewport::sized(800, 600)));
    assert!(matches!(calls[2], DeviceCall::SetProjection(_)));
    assert_eq!(calls[3], DeviceCall::SetScissor(None));
    assert!(matches!(calls[4], DeviceCall::Clear { framebuffer: None, .. }));
    assert_eq!(calls[5], DeviceCall::SetColor(Color::WHITE.to_tint()));
    assert_eq!(calls[6], DeviceCall::SetBlendFunction(BlendFunction::NORMAL));
    assert_eq!(calls[7], DeviceCall::SetBlending(true));
    assert_eq!(calls.len(), 8);
}

#[test]
fn test_init_resizes_drawable_to_config() {
    let (mock, r) = renderer(320, 200);

    assert_eq!(mock.calls()[0], DeviceCall::ResizeDrawable { width: 320, height: 200 });
    assert_eq!(r.window_size(), Size::new(320, 200));
    assert_eq!(r.target_info(r.display()).unwrap().size, Size::new(320, 200));
}

#[test]
fn test_init_rejects_zero_size() {
    let mock = Arc::new(MockDevice::new());
    let result = GpuRenderer::new(mock, RendererConfig::new(0, 480));
    assert!(matches!(result, Err(InitError::ZeroSize)));
}

#[test]
fn test_init_reports_missing_required_features() {
    let mock = Arc::new(MockDevice::embedded(&[]));
    let config = RendererConfig::new(64, 64).with_required_features(GpuFeatures::RENDER_TARGETS);

    match GpuRenderer::new(mock, config) {
        Err(InitError::MissingFeatures(missing)) => assert_eq!(missing, GpuFeatures::RENDER_TARGETS),
        other => panic!("expected missing features, got {:?}", other),
    }
}

#[test]
fn test_disabled_features_are_masked() {
    let mock = Arc::new(MockDevice::new());
    let config = RendererConfig::new(64, 64).with_disabled_features(GpuFeatures::NON_POWER_OF_TWO);
    let r = GpuRenderer::new(mock, config).unwrap();

    assert!(!r.is_feature_enabled(GpuFeatures::NON_POWER_OF_TWO));
    assert!(r.is_feature_enabled(GpuFeatures::RENDER_TARGETS));
}

#[test]
fn test_embedded_probe_reads_extensions() {
    let mock = Arc::new(MockDevice::embedded(&["GL_OES_framebuffer_object", "GL_OES_blend_subtract"]));
    let r = GpuRenderer::new(mock, RendererConfig::new(64, 64)).unwrap();

    assert_eq!(r.features(), GpuFeatures::RENDER_TARGETS | GpuFeatures::BLEND_EQUATIONS);
}

#[test]
fn test_renderer_ids_are_unique() {
    let (_a_mock, a) = renderer(16, 16);
    let (_b_mock, b) = renderer(16, 16);
    assert_ne!(a.id(), b.id());
    assert_eq!(a.display().renderer(), a.id());
}

// Batching

#[test]
fn test_one_draw_per_texture_run() {
    let (mock, mut r) = renderer(320, 240);
    let tex = r.create_texture(16, 16, 4).unwrap();
    let display = r.display();

    for i in 0..100 {
        r.blit(tex, None, display, i as f32, 10.0).unwrap();
    }
    r.present();

    assert_eq!(mock.count_draws(), 1);
    assert_eq!(mock.draws()[0].vertices.len(), 600);
    assert_eq!(mock.count_swaps(), 1);
}

#[test]
fn test_texture_switch_flushes() {
    let (mock, mut r) = renderer(320, 240);
    let a = r.create_texture(8, 8, 4).unwrap();
    let b = r.create_texture(8, 8, 4).unwrap();
    let display = r.display();

    r.blit(a, None, display, 10.0, 10.0).unwrap();
    r.blit(b, None, display, 20.0, 10.0).unwrap();
    assert_eq!(mock.count_draws(), 1);
    r.blit(a, None, display, 30.0, 10.0).unwrap();
    r.flush();

    let draws = mock.draws();
    assert_eq!(draws.len(), 3);
    assert_ne!(draws[0].texture, draws[1].texture);
    assert_eq!(draws[0].texture, draws[2].texture);
}

#[test]
fn test_target_switch_flushes() {
    let (mock, mut r) = renderer(320, 240);
    let tex = r.create_texture(8, 8, 4).unwrap();
    let canvas = r.create_texture(64, 32, 4).unwrap();
    let target = r.load_target(canvas).unwrap();
    let display = r.display();

    r.blit(tex, None, display, 10.0, 10.0).unwrap();
    r.blit(tex, None, target, 10.0, 10.0).unwrap();
    r.flush();

    let draws = mock.draws();
    assert_eq!(draws.len(), 2);
    assert_eq!(draws[0].framebuffer, None);
    assert!(draws[1].framebuffer.is_some());
    assert_eq!(draws[1].viewport, Viewport::sized(64, 32));
}

#[test]
fn test_offscreen_draw_restores_display_viewport() {
    let (mock, mut r) = renderer(320, 240);
    let tex = r.create_texture(8, 8, 4).unwrap();
    let canvas = r.create_texture(64, 32, 4).unwrap();
    let target = r.load_target(canvas).unwrap();
    mock.clear_calls();

    r.blit(tex, None, target, 10.0, 10.0).unwrap();
    r.flush();

    let calls = mock.calls();
    let draw = index_of(&calls, |c| matches!(c, DeviceCall::Draw(_)));
    let restored = calls[draw..]
        .iter()
        .any(|c| *c == DeviceCall::SetViewport(Viewport::sized(320, 240)));
    assert!(restored);
}

#[test]
fn test_full_batch_flushes_before_append() {
    let mock = Arc::new(MockDevice::new());
    let config = RendererConfig::new(64, 64).with_batch_capacity(12);
    let mut r = GpuRenderer::new(mock.clone(), config).unwrap();
    let tex = r.create_texture(4, 4, 4).unwrap();
    let display = r.display();

    for i in 0..3 {
        r.blit(tex, None, display, i as f32 * 4.0, 4.0).unwrap();
    }

    assert_eq!(mock.count_draws(), 1);
    assert_eq!(mock.draws()[0].vertices.len(), 12);
    assert_eq!(r.pending_vertices(), 6);
}

#[test]
fn test_empty_flush_draws_nothing() {
    let (mock, mut r) = renderer(64, 64);
    r.flush();
    r.present();
    assert_eq!(mock.count_draws(), 0);
    assert_eq!(mock.count_swaps(), 1);
}

#[test]
fn test_power_of_two_storage_shapes_vertices() {
    let info = DeviceInfo::new(DeviceApi::Desktop, "legacy").with_extensions(["GL_EXT_framebuffer_object"]);
    let mock = Arc::new(MockDevice::with_info(info));
    let mut r = GpuRenderer::new(mock.clone(), RendererConfig::new(320, 240)).unwrap();
    let tex = r.create_texture(50, 30, 4).unwrap();
    let display = r.display();

    let info = r.texture_info(tex).unwrap();
    assert_eq!(info.size, Size::new(50, 30));
    assert_eq!(info.storage_size, Size::new(64, 32));

    r.blit(tex, None, display, 100.0, 100.0).unwrap();
    r.flush();

    let v = mock.draws()[0].vertices[0];
    assert!((v.x() - 75.0).abs() < 1e-4);
    assert!((v.y() - 85.0).abs() < 1e-4);
    assert!((v.tex_coords[0] - 0.1 / 64.0).abs() < 1e-6);
    assert!((v.tex_coords[1] - 0.1 / 32.0).abs() < 1e-6);
}

// State

#[test]
fn test_tint_change_flushes_with_old_tint() {
    let (mock, mut r) = renderer(64, 64);
    let tex = r.create_texture(4, 4, 4).unwrap();
    let display = r.display();

    r.blit(tex, None, display, 8.0, 8.0).unwrap();
    r.set_rgba(Color::rgba(255, 0, 0, 128));
    r.blit(tex, None, display, 8.0, 8.0).unwrap();
    r.flush();

    let draws = mock.draws();
    assert_eq!(draws.len(), 2);
    assert_eq!(draws[0].color, Color::WHITE.to_tint());
    assert_eq!(draws[1].color, Color::rgba(255, 0, 0, 128).to_tint());
    assert_eq!(r.rgba(), Color::rgba(255, 0, 0, 128));
}

#[test]
fn test_blending_toggle_flushes() {
    let (mock, mut r) = renderer(64, 64);
    let tex = r.create_texture(4, 4, 4).unwrap();
    let display = r.display();

    r.blit(tex, None, display, 8.0, 8.0).unwrap();
    r.set_blending(false);
    r.blit(tex, None, display, 8.0, 8.0).unwrap();
    r.flush();

    let draws = mock.draws();
    assert!(draws[0].blending);
    assert!(!draws[1].blending);
    assert!(!r.blending());
}

#[test]
fn test_set_z_returns_previous() {
    let (_mock, mut r) = renderer(64, 64);
    assert_eq!(r.set_z(0.5), 0.0);
    assert_eq!(r.z(), 0.5);
}

#[test]
fn test_blend_mode_full_support() {
    let (mock, mut r) = renderer(64, 64);
    r.set_blend_mode(BlendMode::Subtract);

    assert_eq!(mock.blend_function(), BlendFunction::uniform(BlendFactor::One, BlendFactor::One));
    assert_eq!(mock.blend_equation(), BlendOperation::Subtract);
    assert_eq!(r.blend_mode(), BlendMode::Subtract);
}

#[test]
fn test_blend_mode_gated_on_embedded() {
    let mock = Arc::new(MockDevice::embedded(&[]));
    let mut r = GpuRenderer::new(mock.clone(), RendererConfig::new(64, 64)).unwrap();
    mock.clear_calls();

    r.set_blend_mode(BlendMode::Subtract);
    let touched = mock
        .calls()
        .iter()
        .any(|c| matches!(c, DeviceCall::SetBlendFunction(_) | DeviceCall::SetBlendEquation(_)));
    assert!(!touched);

    r.set_blend_mode(BlendMode::Add);
    assert_eq!(mock.blend_function(), BlendFunction::uniform(BlendFactor::One, BlendFactor::One));
    assert_eq!(mock.blend_equation(), BlendOperation::Add);
    assert!(!mock.calls().iter().any(|c| matches!(c, DeviceCall::SetBlendEquation(_))));
}

// Clipping and resolution

#[test]
fn test_display_clip_becomes_flipped_scissor() {
    let (mock, mut r) = renderer(800, 600);
    let tex = r.create_texture(4, 4, 4).unwrap();
    let display = r.display();

    r.set_clip(display, Rect::new(10, 20, 100, 50));
    r.blit(tex, None, display, 50.0, 50.0).unwrap();
    r.flush();

    assert_eq!(mock.draws()[0].scissor, Some(ScissorRect::new(10, 530, 100, 50)));
    assert_eq!(mock.scissor(), None);
}

#[test]
fn test_virtual_resolution_scales_scissor() {
    let (mock, mut r) = renderer(800, 600);
    let tex = r.create_texture(4, 4, 4).unwrap();
    let display = r.display();

    r.set_virtual_resolution(400, 300);
    r.set_clip(display, Rect::new(10, 20, 100, 50));
    r.blit(tex, None, display, 50.0, 50.0).unwrap();
    r.flush();

    assert_eq!(mock.draws()[0].scissor, Some(ScissorRect::new(20, 460, 200, 100)));
    assert_eq!(r.target_info(display).unwrap().size, Size::new(400, 300));
    assert_eq!(r.window_size(), Size::new(800, 600));
}

#[test]
fn test_offscreen_clip_is_not_flipped() {
    let (mock, mut r) = renderer(64, 64);
    let tex = r.create_texture(4, 4, 4).unwrap();
    let canvas = r.create_texture(32, 32, 4).unwrap();
    let target = r.load_target(canvas).unwrap();

    r.set_clip(target, Rect::new(2, 4, 8, 6));
    r.blit(tex, None, target, 5.0, 5.0).unwrap();
    r.flush();

    assert_eq!(mock.draws()[0].scissor, Some(ScissorRect::new(2, 4, 8, 6)));
}

#[test]
fn test_clip_change_flushes_pending_quads() {
    let (mock, mut r) = renderer(64, 64);
    let tex = r.create_texture(4, 4, 4).unwrap();
    let display = r.display();

    r.blit(tex, None, display, 5.0, 5.0).unwrap();
    r.set_clip(display, Rect::new(0, 0, 16, 16));
    assert_eq!(mock.count_draws(), 1);
    assert_eq!(mock.draws()[0].scissor, None);
}

#[test]
fn test_extreme_clip_draws_and_clears_nothing_visible() {
    let (mock, mut r) = renderer(64, 64);
    let tex = r.create_texture(4, 4, 4).unwrap();
    let display = r.display();

    r.set_clip(display, Rect::new(0, i32::MAX, 10, 10));
    r.blit(tex, None, display, 5.0, 5.0).unwrap();
    r.flush();
    assert_eq!(mock.count_draws(), 1);
    assert_eq!(mock.draws()[0].scissor.map(|s| s.width), Some(10));

    r.clear_rgba(display, Color::rgb(0, 0, 255));
    r.clear_clip(display);
    assert_ne!(r.get_pixel(display, 0, 0), Color::rgb(0, 0, 255));
    assert_ne!(r.get_pixel(display, 0, 63), Color::rgb(0, 0, 255));
}

#[test]
fn test_window_resize_resets_state() {
    let (mock, mut r) = renderer(64, 64);
    let display = r.display();
    r.set_clip(display, Rect::new(0, 0, 8, 8));
    r.set_rgba(Color::rgb(1, 2, 3));

    assert!(r.set_window_resolution(128, 96));
    assert_eq!(r.window_size(), Size::new(128, 96));
    assert_eq!(r.rgba(), Color::WHITE);
    assert!(!r.target_info(display).unwrap().clip.enabled);
    assert!(mock.blending());

    mock.refuse_resize(true);
    assert!(!r.set_window_resolution(256, 256));
    assert_eq!(r.window_size(), Size::new(128, 96));
}

#[test]
fn test_clear_respects_clip_and_keeps_tint() {
    let (mock, mut r) = renderer(8, 8);
    let display = r.display();
    r.set_rgba(Color::rgb(0, 255, 0));

    r.clear_rgba(display, Color::rgb(0, 0, 255));
    r.set_clip(display, Rect::new(0, 0, 4, 4));
    r.clear(display);

    assert_eq!(r.get_pixel(display, 1, 1), Color::TRANSPARENT);
    assert_eq!(r.get_pixel(display, 6, 6), Color::rgb(0, 0, 255));
    assert_eq!(r.rgba(), Color::rgb(0, 255, 0));
    assert_eq!(mock.color(), Color::rgb(0, 255, 0).to_tint());
}

#[test]
fn test_get_pixel_maps_virtual_to_window() {
    let (_mock, mut r) = renderer(8, 8);
    let display = r.display();
    r.set_virtual_resolution(4, 4);

    r.set_clip(display, Rect::new(2, 2, 2, 2));
    r.clear_rgba(display, Color::rgb(9, 9, 9));

    assert_eq!(r.get_pixel(display, 3, 3), Color::rgb(9, 9, 9));
    assert_eq!(r.get_pixel(display, 0, 0), Color::TRANSPARENT);
    assert_eq!(r.get_pixel(display, 4, 0), Color::TRANSPARENT);
}
