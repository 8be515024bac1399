//! Integration tests for the GraphicsEngine frame loop with the Vulkan backend
//!
//! These tests open a hidden window and present to it.
//! All tests require a GPU and are marked with #[ignore].
//!
//! Run with: cargo test --test engine_integration_tests -- --ignored


use gpu_test_utils::{create_test_window, test_config, vulkan_registry, window_handles};
use prism_rhi::prism::rhi::{BufferDesc, CommandListType, ResourceState};
use prism_rhi::prism::{FramePhase, GraphicsEngine, RhiConfig};
use serial_test::serial;

fn start_engine(config: RhiConfig) -> (GraphicsEngine, winit::window::Window, winit::event_loop::EventLoop<()>) {
    let (window, event_loop) = create_test_window();
    let engine = GraphicsEngine::start_up(&vulkan_registry(), config, window_handles(&window))
        .expect("Failed to start the engine");
    (engine, window, event_loop)
}

// ============================================================================
// LIFECYCLE TESTS
// ============================================================================

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_integration_engine_start_up_and_shut_down() {
    let (engine, _window, _event_loop) = start_engine(test_config());

    assert_eq!(engine.phase(), FramePhase::Idle);
    assert_eq!(engine.frame_count(), 0);
    assert!(!engine.is_device_lost());
    assert!(engine.swapchain().buffer_count() >= 2);
    for index in 0..engine.swapchain().buffer_count() as usize {
        assert!(engine.frame_buffer(index).is_some());
    }

    engine.shut_down().unwrap();
}

// ============================================================================
// FRAME LOOP TESTS
// ============================================================================

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_integration_clear_frames() {
    let (mut engine, _window, _event_loop) = start_engine(RhiConfig {
        vsync_interval: 0,
        clear_color: [0.2, 0.3, 0.4, 1.0],
        ..test_config()
    });

    for _ in 0..10 {
        assert!(engine.begin_draw_frame().unwrap());
        assert_eq!(engine.phase(), FramePhase::Recording);
        engine.begin_swapchain_render_pass().unwrap();
        engine.end_draw_frame().unwrap();
    }

    assert_eq!(engine.frame_count(), 10);
    engine.shut_down().unwrap();
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_integration_copy_queue_feeds_frame() {
    let (mut engine, _window, _event_loop) = start_engine(test_config());
    let device_buffer = engine
        .device()
        .create_buffer(BufferDesc::vertex(16, 64).with_name("vertices"))
        .unwrap();
    let upload = engine.device().create_buffer(BufferDesc::upload(16 * 64)).unwrap();

    for _ in 0..3 {
        assert!(engine.begin_draw_frame().unwrap());

        let copy = engine.command_list(CommandListType::Copy).unwrap();
        copy.transition_buffer(&device_buffer, ResourceState::CopyDestination).unwrap();
        copy.copy_buffer_region(&device_buffer, 0, &upload, 0, 16 * 64).unwrap();
        copy.transition_buffer(&device_buffer, ResourceState::Common).unwrap();
        let value = engine.flush_gpu_commands(CommandListType::Copy, false).unwrap();
        engine.wait_execution_gpu_commands(CommandListType::Copy, value, false).unwrap();

        engine.begin_swapchain_render_pass().unwrap();
        engine.end_draw_frame().unwrap();
    }

    assert_eq!(engine.frame_count(), 3);
    engine.shut_down().unwrap();
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_integration_resize_between_frames() {
    let (mut engine, _window, _event_loop) = start_engine(test_config());

    assert!(engine.begin_draw_frame().unwrap());
    engine.end_draw_frame().unwrap();

    engine.on_resize(640, 480).unwrap();
    assert!(engine.begin_draw_frame().unwrap());
    engine.begin_swapchain_render_pass().unwrap();
    engine.end_draw_frame().unwrap();

    // Minimised windows skip frames
    engine.on_resize(0, 0).unwrap();
    assert!(!engine.begin_draw_frame().unwrap());
    assert_eq!(engine.phase(), FramePhase::Idle);

    engine.shut_down().unwrap();
}
