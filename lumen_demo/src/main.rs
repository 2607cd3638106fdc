//! Lumen demo
//!
//! Opens a window, uploads a triangle and a quad, and draws a grid of
//! triangles around the quad. Space toggles between the two materials.
//!
//! Shaders must be compiled first with `shaders/compile.sh`.

use std::path::PathBuf;
use std::time::Instant;

use lumen_engine::glam::{Mat4, Vec3, Vec4};
use lumen_engine::lumen::device::{Extent2D, ShaderStage};
use lumen_engine::lumen::log::LogSeverity;
use lumen_engine::lumen::render::{CameraData, FrameOutcome, RenderContext, SceneData};
use lumen_engine::lumen::resource::{MaterialId, MeshId, Vertex};
use lumen_engine::lumen::scene::RenderObject;
use lumen_engine::lumen::{Config, Engine, Result};
use lumen_engine::{engine_debug, engine_error, engine_info, engine_warn};
use lumen_engine_renderer_vulkan::{print_validation_stats_report, VulkanDevice};
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

const SOURCE: &str = "lumen::demo";

/// Half-width of the triangle grid, in cells
const GRID_HALF: i32 = 20;

/// Meshes and materials the demo draws with
struct Scene {
    triangle: MeshId,
    quad: MeshId,
    materials: Vec<MaterialId>,
}

struct App {
    config: Config,
    // Dropped before the window: the surface must not outlive it
    context: Option<RenderContext>,
    window: Option<Window>,
    scene: Option<Scene>,
    start: Instant,
}

impl App {
    fn new(config: Config) -> Self {
        Self {
            config,
            context: None,
            window: None,
            scene: None,
            start: Instant::now(),
        }
    }

    fn init(&mut self, window: &Window) -> Result<(RenderContext, Scene)> {
        let device = VulkanDevice::new(window, &self.config)?;
        let size = window.inner_size();
        let swapchain = device.create_swapchain(Extent2D::new(size.width, size.height))?;
        let mut context = RenderContext::new(Box::new(device), Box::new(swapchain), self.config.clone())?;
        let scene = build_scene(&mut context)?;
        Ok((context, scene))
    }

    fn render(&mut self, event_loop: &ActiveEventLoop) {
        let (Some(context), Some(scene)) = (self.context.as_mut(), self.scene.as_ref()) else {
            return;
        };

        let extent = context.swapchain_extent();
        let aspect = extent.width.max(1) as f32 / extent.height.max(1) as f32;
        let camera = CameraData::perspective(
            Vec3::new(0.0, 6.0, 10.0),
            Vec3::ZERO,
            70f32.to_radians(),
            aspect,
        );

        let t = self.start.elapsed().as_secs_f32();
        let scene_data = SceneData {
            ambient_color: Vec4::new(t.sin() * 0.5 + 0.5, 0.0, t.cos() * 0.5 + 0.5, 1.0),
            ..SceneData::default()
        };

        let material = scene.materials[context.selected_shader() % scene.materials.len()];
        let objects = scene_objects(scene, material);

        match context.draw_frame(&objects, &camera, &scene_data) {
            Ok(FrameOutcome::Presented(stats)) => {
                if context.frame_number() % 600 == 0 {
                    engine_debug!(
                        SOURCE,
                        "Frame {}: {} draws, {} pipeline binds, {} mesh binds",
                        context.frame_number(),
                        stats.draw_calls,
                        stats.pipeline_binds,
                        stats.mesh_binds
                    );
                }
            }
            Ok(FrameOutcome::SwapchainRecreated) | Ok(FrameOutcome::Skipped) => {}
            Err(e) if e.is_fatal() => {
                engine_error!(SOURCE, "Fatal render error: {}", e);
                event_loop.exit();
            }
            Err(e) => engine_warn!(SOURCE, "Frame dropped: {}", e),
        }
    }

    fn toggle_material(&mut self) {
        if let Some(context) = self.context.as_mut() {
            let next = (context.selected_shader() + 1) % 2;
            context.set_selected_shader(next);
            engine_info!(SOURCE, "Selected shader {}", next);
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let attributes = Window::default_attributes()
            .with_title(self.config.app_name.clone())
            .with_inner_size(PhysicalSize::new(
                self.config.window_extent.width,
                self.config.window_extent.height,
            ));
        let window = match event_loop.create_window(attributes) {
            Ok(window) => window,
            Err(e) => {
                engine_error!(SOURCE, "Failed to create window: {}", e);
                event_loop.exit();
                return;
            }
        };

        match self.init(&window) {
            Ok((context, scene)) => {
                engine_info!(SOURCE, "Initialization complete, entering main loop");
                self.context = Some(context);
                self.scene = Some(scene);
                self.window = Some(window);
            }
            Err(e) => {
                engine_error!(SOURCE, "Failed to initialize renderer: {}", e);
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                engine_info!(SOURCE, "Close requested, shutting down");
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                if let Some(context) = self.context.as_mut() {
                    context.resize(Extent2D::new(size.width, size.height));
                }
            }
            WindowEvent::RedrawRequested => self.render(event_loop),
            WindowEvent::KeyboardInput { event, .. } => {
                if event.state.is_pressed() && !event.repeat {
                    match event.physical_key {
                        PhysicalKey::Code(KeyCode::Space) => self.toggle_material(),
                        PhysicalKey::Code(KeyCode::Escape) => event_loop.exit(),
                        _ => {}
                    }
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = self.window.as_ref() {
            window.request_redraw();
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(mut context) = self.context.take() {
            if let Err(e) = context.shutdown() {
                engine_error!(SOURCE, "Shutdown failed: {}", e);
            }
            let stats = context.stats();
            engine_info!(SOURCE, "Rendered {} frames", stats.frame_number);
        }
        self.scene = None;
        self.window = None;
    }
}

fn shader_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("shaders").join(name)
}

/// Upload meshes, build both pipelines and register their materials
fn build_scene(context: &mut RenderContext) -> Result<Scene> {
    let triangle = context.upload_mesh(
        "triangle",
        &[
            Vertex::new(Vec3::new(1.0, 1.0, 0.0), Vec3::Z, Vec3::new(0.0, 1.0, 0.0)),
            Vertex::new(Vec3::new(-1.0, 1.0, 0.0), Vec3::Z, Vec3::new(0.0, 1.0, 0.0)),
            Vertex::new(Vec3::new(0.0, -1.0, 0.0), Vec3::Z, Vec3::new(0.0, 1.0, 0.0)),
        ],
        None,
    )?;

    let quad = context.upload_mesh(
        "quad",
        &[
            Vertex::new(Vec3::new(-1.0, 0.0, -1.0), Vec3::Y, Vec3::new(0.8, 0.8, 0.8)),
            Vertex::new(Vec3::new(1.0, 0.0, -1.0), Vec3::Y, Vec3::new(0.8, 0.8, 0.8)),
            Vertex::new(Vec3::new(1.0, 0.0, 1.0), Vec3::Y, Vec3::new(0.5, 0.5, 0.5)),
            Vertex::new(Vec3::new(-1.0, 0.0, 1.0), Vec3::Y, Vec3::new(0.5, 0.5, 0.5)),
        ],
        Some(&[0u32, 1, 2, 2, 3, 0][..]),
    )?;

    let vertex = context.load_shader_module(shader_path("mesh.vert.spv"))?;
    let fragments = ["colored.frag.spv", "red.frag.spv"];
    let names = ["defaultmesh", "redmesh"];

    let mut materials = Vec::with_capacity(fragments.len());
    let mut result = Ok(());
    for (fragment_file, name) in fragments.iter().zip(names) {
        let fragment = match context.load_shader_module(shader_path(fragment_file)) {
            Ok(module) => module,
            Err(e) => {
                result = Err(e);
                break;
            }
        };
        let builder = context
            .pipeline_builder()
            .add_stage(ShaderStage::Vertex, vertex)
            .add_stage(ShaderStage::Fragment, fragment);
        let built = context.build_pipeline(&builder);
        context.destroy_shader_module(fragment);

        let layout = context.mesh_pipeline_layout();
        match built.and_then(|pipeline| context.create_material(name, pipeline, layout, None)) {
            Ok(material) => materials.push(material),
            Err(e) => {
                result = Err(e);
                break;
            }
        }
    }
    context.destroy_shader_module(vertex);
    result?;

    engine_info!(SOURCE, "Scene ready: {} materials", materials.len());
    Ok(Scene { triangle, quad, materials })
}

/// Ground quad plus a grid of small triangles
fn scene_objects(scene: &Scene, material: MaterialId) -> Vec<RenderObject> {
    let mut objects = Vec::with_capacity(((GRID_HALF * 2 + 1) * (GRID_HALF * 2 + 1) + 1) as usize);
    objects.push(RenderObject::new(
        scene.quad,
        material,
        Mat4::from_scale(Vec3::splat(5.0)),
    ));

    for x in -GRID_HALF..=GRID_HALF {
        for y in -GRID_HALF..=GRID_HALF {
            let transform = Mat4::from_translation(Vec3::new(x as f32, 0.0, y as f32))
                * Mat4::from_scale(Vec3::splat(0.2));
            objects.push(RenderObject::new(scene.triangle, material, transform));
        }
    }
    objects
}

fn main() {
    if cfg!(debug_assertions) {
        Engine::set_min_severity(LogSeverity::Debug);
    } else {
        Engine::set_min_severity(LogSeverity::Info);
    }

    let config = Config {
        app_name: "Lumen Demo".to_string(),
        ..Config::default()
    };
    engine_info!(SOURCE, "Starting {}", config.app_name);

    let event_loop = match EventLoop::new() {
        Ok(event_loop) => event_loop,
        Err(e) => {
            engine_error!(SOURCE, "Failed to create event loop: {}", e);
            return;
        }
    };
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(config);
    if let Err(e) = event_loop.run_app(&mut app) {
        engine_error!(SOURCE, "Event loop error: {}", e);
    }
    drop(app);

    print_validation_stats_report();
}
