//! GPU tests for VulkanDevice and VulkanSwapchain
//!
//! These tests verify that the Vulkan backend correctly implements the
//! GraphicsDevice and Swapchain traits and drives a full RenderContext.
//! They require a GPU and a display and are marked with #[ignore].
//!
//! winit allows one event loop per process, so every scenario runs inside a
//! single test sharing one hidden window.
//!
//! Run with: cargo test --test vulkan_device_tests -- --ignored

use lumen_engine::lumen::Config;
use lumen_engine::lumen::device::{
    BufferDesc, BufferUsage, Extent2D, GraphicsDevice, ImageAspect, ImageDesc, ImageUsage,
    MemoryUsage, Resource, Swapchain, TextureFormat,
};
use lumen_engine::lumen::render::{CameraData, DeletionQueue, FrameOutcome, RenderContext, SceneData};
use lumen_engine::lumen::resource::Vertex;
use lumen_engine::lumen::scene::RenderObject;
use lumen_engine::glam::{Mat4, Vec3};
use lumen_engine_renderer_vulkan::VulkanDevice;
use winit::event_loop::EventLoop;
use winit::window::Window;

/// Helper to create a hidden test window
#[allow(deprecated)]
fn create_test_window() -> (Window, EventLoop<()>) {
    let mut builder = EventLoop::builder();
    #[cfg(all(unix, not(target_os = "macos")))]
    {
        use winit::platform::x11::EventLoopBuilderExtX11;
        builder.with_any_thread(true);
    }
    let event_loop = builder.build().unwrap();
    let window_attrs = Window::default_attributes()
        .with_title("Vulkan Device Test")
        .with_inner_size(winit::dpi::PhysicalSize::new(800, 600))
        .with_visible(false);
    let window = event_loop.create_window(window_attrs).unwrap();
    (window, event_loop)
}

fn test_config() -> Config {
    Config {
        window_extent: Extent2D::new(800, 600),
        max_objects: 16,
        ..Config::default()
    }
}

// ============================================================================
// DEVICE SCENARIOS
// ============================================================================

fn check_limits(device: &VulkanDevice) {
    let limits = device.limits();
    assert!(limits.min_uniform_buffer_offset_alignment.is_power_of_two());
    assert!(limits.max_push_constants_size >= 128);
}

fn check_buffer_lifecycle(device: &mut VulkanDevice) {
    let before = device.live_allocations();

    let buffer = device
        .create_buffer(&BufferDesc {
            size: 256,
            usage: BufferUsage::UNIFORM,
            memory: MemoryUsage::CpuToGpu,
        })
        .unwrap();
    assert_eq!(buffer.size, 256);
    assert!(!buffer.buffer.is_null());
    assert_eq!(device.live_allocations(), before + 1);

    device.write_buffer(&buffer, 0, &[7u8; 64]).unwrap();
    device.write_buffer(&buffer, 192, &[1u8; 64]).unwrap();
    assert!(device.write_buffer(&buffer, 200, &[1u8; 64]).is_err());

    let mut queue = DeletionQueue::new();
    queue.push(Resource::Buffer(buffer));
    queue.flush(device);
    assert_eq!(device.live_allocations(), before);
}

fn check_gpu_only_buffer_is_not_writable(device: &mut VulkanDevice) {
    let buffer = device
        .create_buffer(&BufferDesc {
            size: 64,
            usage: BufferUsage::VERTEX | BufferUsage::TRANSFER_DST,
            memory: MemoryUsage::GpuOnly,
        })
        .unwrap();
    // Device-local memory may or may not be host visible; either way no panic
    let _ = device.write_buffer(&buffer, 0, &[0u8; 16]);
    device.destroy_resource(Resource::Buffer(buffer));
}

fn check_image_and_view(device: &mut VulkanDevice) {
    let image = device
        .create_image(&ImageDesc {
            extent: Extent2D::new(64, 64),
            format: TextureFormat::R8G8B8A8_SRGB,
            usage: ImageUsage::SAMPLED | ImageUsage::TRANSFER_DST,
        })
        .unwrap();
    let view = device.create_image_view(&image, ImageAspect::Color).unwrap();

    let mut queue = DeletionQueue::new();
    queue.push(Resource::Image(image));
    queue.push(Resource::ImageView(view));
    // View goes first (reverse order)
    queue.flush(device);
}

fn check_fence_wait(device: &mut VulkanDevice) {
    let signaled = device.create_fence(true).unwrap();
    device.wait_for_fence(signaled, 1_000_000).unwrap();

    let unsignaled = device.create_fence(false).unwrap();
    let err = device.wait_for_fence(unsignaled, 1_000).unwrap_err();
    assert!(matches!(err, lumen_engine::lumen::Error::Timeout(_)));

    device.destroy_resource(Resource::Fence(signaled));
    device.destroy_resource(Resource::Fence(unsignaled));
}

fn check_swapchain(device: &VulkanDevice) {
    let mut swapchain = device.create_swapchain(Extent2D::new(800, 600)).unwrap();
    assert!(swapchain.image_count() >= 2);
    assert!(!swapchain.render_pass().is_null());
    assert!(swapchain.framebuffer(0).is_some());
    assert!(swapchain.framebuffer(swapchain.image_count()).is_none());

    swapchain.recreate(Extent2D::new(640, 480)).unwrap();
    assert!(swapchain.framebuffer(0).is_some());
    assert!(swapchain.recreate(Extent2D::new(0, 0)).is_err());
}

// ============================================================================
// RENDER CONTEXT SCENARIO
// ============================================================================

fn check_render_context_frames(window: &Window) {
    let config = test_config();
    let device = VulkanDevice::new(window, &config).unwrap();
    let swapchain = device.create_swapchain(config.window_extent).unwrap();
    let mut context = RenderContext::new(Box::new(device), Box::new(swapchain), config).unwrap();

    let triangle = [
        Vertex::new(Vec3::new(1.0, 1.0, 0.0), Vec3::Z, Vec3::X),
        Vertex::new(Vec3::new(-1.0, 1.0, 0.0), Vec3::Z, Vec3::Y),
        Vertex::new(Vec3::new(0.0, -1.0, 0.0), Vec3::Z, Vec3::Z),
    ];
    let mesh = context.upload_mesh("triangle", &triangle, None).unwrap();
    assert!(context.mesh("triangle").is_some());

    // No shaders on disk here: frames with no objects still exercise the full protocol
    let camera = CameraData::new(Mat4::IDENTITY, Mat4::IDENTITY);
    let scene = SceneData::default();
    for frame in 0..4u64 {
        match context.draw_frame(&[], &camera, &scene).unwrap() {
            FrameOutcome::Presented(stats) => assert_eq!(stats.draw_calls, 0),
            FrameOutcome::SwapchainRecreated | FrameOutcome::Skipped => {}
        }
        assert!(context.frame_number() <= frame + 1);
    }

    // Unknown material: skipped, not fatal
    let orphan = RenderObject::new(mesh, lumen_engine::lumen::resource::MaterialId(99), Mat4::IDENTITY);
    if let FrameOutcome::Presented(stats) = context.draw_frame(&[orphan], &camera, &scene).unwrap() {
        assert_eq!(stats.skipped, 1);
    }

    context.shutdown().unwrap();
}

#[test]
#[ignore] // Requires GPU
fn test_vulkan_backend() {
    let (window, _event_loop) = create_test_window();

    {
        let mut device = VulkanDevice::new(&window, &test_config()).unwrap();
        check_limits(&device);
        check_buffer_lifecycle(&mut device);
        check_gpu_only_buffer_is_not_writable(&mut device);
        check_image_and_view(&mut device);
        check_fence_wait(&mut device);
        check_swapchain(&device);
        assert_eq!(device.live_allocations(), 0);
    }

    check_render_context_frames(&window);
}
