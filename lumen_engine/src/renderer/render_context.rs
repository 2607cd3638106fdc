/// Render context - the explicitly constructed owner of every engine GPU object
///
/// Drives the per-frame protocol for frame N on slot `N % FRAME_OVERLAP`:
///
/// 1. wait on the slot's fence, then flush the slot's teardown queue
/// 2. acquire a swapchain image (signals the slot's present semaphore)
/// 3. reset and record the slot's command buffer (uniforms, render pass, draws)
/// 4. reset the fence and submit: wait present semaphore, signal render
///    semaphore and fence
/// 5. present waiting on the render semaphore, then advance the frame number
///
/// The fence is only reset right before the submit that will signal it again,
/// so an early return (out-of-date swapchain, recording error) never leaves a
/// slot whose next wait can not complete.

use std::path::Path;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::graphics_device::{
    AcquireOutcome, BufferUsage, ClearValue, DescriptorBinding, DescriptorPoolHandle,
    DescriptorPoolSize, DescriptorResource, DescriptorSetLayoutHandle, DescriptorType,
    DescriptorWrite, Extent2D, FramebufferHandle, GraphicsDevice, ImageAspect, IndexType,
    PipelineHandle, PipelineLayoutDesc, PipelineLayoutHandle, PipelineStage, PushConstantRange,
    RenderPassBegin, Resource, SamplerDesc, ShaderModuleHandle, ShaderStageFlags, SubmitDesc,
    Swapchain, TextureFormat, CompareOp, DepthStencilState,
};
use crate::renderer::{
    slot_index, upload_buffer, upload_image, CameraData, DeletionQueue, DynamicUniformLayout,
    FrameSlot, FrameSlotDesc, FrameState, GlobalUniformLayout, MeshPushConstants, ObjectData,
    PipelineBuilder, SceneData, UploadContext, FRAME_OVERLAP,
};
use crate::resource::{
    Material, MaterialId, MaterialRegistry, Mesh, MeshId, MeshIndices, MeshRegistry, Texture,
    TextureId, TextureRegistry, Vertex,
};
use crate::scene::{draw_objects, DrawStats, FrameBindings, RenderObject};

/// What a call to [`RenderContext::draw_frame`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Frame recorded, submitted and handed to present
    Presented(DrawStats),
    /// The swapchain was out of date and has been rebuilt; no frame was recorded
    SwapchainRecreated,
    /// The surface has zero area (minimized window); nothing was recorded
    Skipped,
}

/// Counters exposed to the host application
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    /// Frames completed so far
    pub frame_number: u64,
    /// Draw statistics of the last presented frame
    pub last_frame: DrawStats,
}

/// Engine-lifetime objects created once in `new`
struct EngineLayouts {
    global_set_layout: DescriptorSetLayoutHandle,
    object_set_layout: DescriptorSetLayoutHandle,
    texture_set_layout: DescriptorSetLayoutHandle,
    descriptor_pool: DescriptorPoolHandle,
    mesh_pipeline_layout: PipelineLayoutHandle,
}

pub struct RenderContext {
    // Declared (and therefore dropped) before the device it was created from
    swapchain: Box<dyn Swapchain>,
    device: Box<dyn GraphicsDevice>,
    config: Config,
    main_deletion_queue: DeletionQueue,
    frames: [FrameSlot; FRAME_OVERLAP],
    frame_number: u64,
    upload: UploadContext,
    layouts: EngineLayouts,
    global_layout: GlobalUniformLayout,
    object_layout: DynamicUniformLayout,
    materials: MaterialRegistry,
    meshes: MeshRegistry,
    textures: TextureRegistry,
    swapchain_dirty: bool,
    pending_extent: Option<Extent2D>,
    last_stats: DrawStats,
    shut_down: bool,
}

impl RenderContext {
    /// Create the descriptor layouts, pool, frame slots and upload channel
    ///
    /// Everything created here is registered in the engine-global teardown
    /// queue. If creation fails midway, what was already created is released
    /// before the error is returned.
    pub fn new(
        mut device: Box<dyn GraphicsDevice>,
        swapchain: Box<dyn Swapchain>,
        config: Config,
    ) -> Result<Self> {
        let alignment = device.limits().min_uniform_buffer_offset_alignment;
        let global_layout = GlobalUniformLayout::new(alignment);
        let object_layout = DynamicUniformLayout::for_type::<ObjectData>(alignment, config.max_objects)?;

        let mut main_deletion_queue = DeletionQueue::new();
        let created = Self::create_engine_objects(
            device.as_mut(),
            &config,
            global_layout,
            object_layout,
            &mut main_deletion_queue,
        );
        let (layouts, frames, upload) = match created {
            Ok(parts) => parts,
            Err(e) => {
                crate::engine_error!("lumen::RenderContext", "Render context creation failed: {}", e);
                main_deletion_queue.flush(device.as_mut());
                return Err(e);
            }
        };

        crate::engine_info!(
            "lumen::RenderContext",
            "Render context ready: {} frames in flight, {}x{} swapchain, object stride {} bytes",
            FRAME_OVERLAP,
            swapchain.extent().width,
            swapchain.extent().height,
            object_layout.stride
        );

        Ok(Self {
            swapchain,
            device,
            config,
            main_deletion_queue,
            frames,
            frame_number: 0,
            upload,
            layouts,
            global_layout,
            object_layout,
            materials: MaterialRegistry::new(),
            meshes: MeshRegistry::new(),
            textures: TextureRegistry::new(),
            swapchain_dirty: false,
            pending_extent: None,
            last_stats: DrawStats::default(),
            shut_down: false,
        })
    }

    fn create_engine_objects(
        device: &mut dyn GraphicsDevice,
        config: &Config,
        global_layout: GlobalUniformLayout,
        object_layout: DynamicUniformLayout,
        main_queue: &mut DeletionQueue,
    ) -> Result<(EngineLayouts, [FrameSlot; FRAME_OVERLAP], UploadContext)> {
        let all_stages = ShaderStageFlags::VERTEX | ShaderStageFlags::FRAGMENT;

        let global_set_layout = device.create_descriptor_set_layout(&[
            DescriptorBinding {
                binding: 0,
                descriptor_type: DescriptorType::UniformBuffer,
                stages: all_stages,
            },
            DescriptorBinding {
                binding: 1,
                descriptor_type: DescriptorType::UniformBuffer,
                stages: all_stages,
            },
        ])?;
        main_queue.push(Resource::DescriptorSetLayout(global_set_layout));

        let object_set_layout = device.create_descriptor_set_layout(&[DescriptorBinding {
            binding: 0,
            descriptor_type: DescriptorType::UniformBufferDynamic,
            stages: ShaderStageFlags::VERTEX,
        }])?;
        main_queue.push(Resource::DescriptorSetLayout(object_set_layout));

        let texture_set_layout = device.create_descriptor_set_layout(&[DescriptorBinding {
            binding: 0,
            descriptor_type: DescriptorType::CombinedImageSampler,
            stages: ShaderStageFlags::FRAGMENT,
        }])?;
        main_queue.push(Resource::DescriptorSetLayout(texture_set_layout));

        let max_sets = config.max_descriptor_sets;
        let descriptor_pool = device.create_descriptor_pool(
            max_sets,
            &[
                DescriptorPoolSize { descriptor_type: DescriptorType::UniformBuffer, count: max_sets },
                DescriptorPoolSize { descriptor_type: DescriptorType::UniformBufferDynamic, count: max_sets },
                DescriptorPoolSize { descriptor_type: DescriptorType::CombinedImageSampler, count: max_sets },
            ],
        )?;
        main_queue.push(Resource::DescriptorPool(descriptor_pool));

        let mesh_pipeline_layout = device.create_pipeline_layout(&PipelineLayoutDesc {
            set_layouts: vec![global_set_layout, object_set_layout, texture_set_layout],
            push_constant_ranges: vec![PushConstantRange {
                stages: ShaderStageFlags::VERTEX,
                offset: 0,
                size: std::mem::size_of::<MeshPushConstants>() as u32,
            }],
        })?;
        main_queue.push(Resource::PipelineLayout(mesh_pipeline_layout));

        let slot_desc = FrameSlotDesc {
            descriptor_pool,
            global_set_layout,
            object_set_layout,
            global_layout,
            object_layout,
        };
        let frames: Vec<FrameSlot> = (0..FRAME_OVERLAP)
            .map(|_| FrameSlot::create(device, &slot_desc, main_queue))
            .collect::<Result<_>>()?;
        let frames: [FrameSlot; FRAME_OVERLAP] = frames
            .try_into()
            .map_err(|_| Error::InitializationFailed("frame slot count mismatch".to_string()))?;

        let upload = UploadContext::create(device, main_queue, config.upload_timeout_ns)?;

        Ok((
            EngineLayouts {
                global_set_layout,
                object_set_layout,
                texture_set_layout,
                descriptor_pool,
                mesh_pipeline_layout,
            },
            frames,
            upload,
        ))
    }

    // ===== FRAME LOOP =====

    /// Record, submit and present one frame of `objects`
    ///
    /// Blocks until the slot's previous frame has finished on the GPU (bounded
    /// by `Config::fence_timeout_ns`; exceeding it is `Error::Timeout`).
    pub fn draw_frame(
        &mut self,
        objects: &[RenderObject],
        camera: &CameraData,
        scene: &SceneData,
    ) -> Result<FrameOutcome> {
        if self.shut_down {
            crate::engine_bail!("lumen::RenderContext", "draw_frame called after shutdown");
        }

        if self.swapchain_dirty && !self.recreate_swapchain()? {
            return Ok(FrameOutcome::Skipped);
        }

        let slot = slot_index(self.frame_number);
        self.frames[slot].wait_and_reclaim(self.device.as_mut(), self.config.fence_timeout_ns)?;

        let present_semaphore = self.frames[slot].present_semaphore;
        let image_index = match self
            .swapchain
            .acquire_next_image(present_semaphore, self.config.acquire_timeout_ns)?
        {
            AcquireOutcome::Ready(index) => index,
            AcquireOutcome::Suboptimal(index) => {
                crate::engine_debug!("lumen::RenderContext", "Swapchain suboptimal on acquire");
                self.swapchain_dirty = true;
                index
            }
            AcquireOutcome::OutOfDate => {
                crate::engine_debug!("lumen::RenderContext", "Swapchain out of date on acquire, recreating");
                self.swapchain_dirty = true;
                return Ok(match self.recreate_swapchain()? {
                    true => FrameOutcome::SwapchainRecreated,
                    false => FrameOutcome::Skipped,
                });
            }
        };

        let framebuffer = self.swapchain.framebuffer(image_index).ok_or_else(|| {
            crate::engine_err!("lumen::RenderContext", "No framebuffer for swapchain image {}", image_index)
        })?;

        self.frames[slot].transition(FrameState::Recording)?;
        let stats = self.record_frame(slot, framebuffer, objects, camera, scene)?;

        let frame = &mut self.frames[slot];
        self.device.reset_fence(frame.render_fence)?;
        self.device.submit(&SubmitDesc {
            command_buffers: &[frame.command_buffer],
            wait_semaphores: &[(frame.present_semaphore, PipelineStage::ColorAttachmentOutput)],
            signal_semaphores: &[frame.render_semaphore],
            fence: Some(frame.render_fence),
        })?;
        frame.transition(FrameState::Submitted)?;

        let presented = self.swapchain.present(frame.render_semaphore, image_index)?;
        frame.transition(FrameState::Presented)?;
        if presented.needs_recreate() {
            crate::engine_debug!("lumen::RenderContext", "Present returned {:?}, swapchain flagged", presented);
            self.swapchain_dirty = true;
        }

        self.frame_number += 1;
        self.last_stats = stats;
        Ok(FrameOutcome::Presented(stats))
    }

    /// Shared borrow only: uploads need `&mut self`, so none can start mid-recording
    fn record_frame(
        &self,
        slot: usize,
        framebuffer: FramebufferHandle,
        objects: &[RenderObject],
        camera: &CameraData,
        scene: &SceneData,
    ) -> Result<DrawStats> {
        let device = self.device.as_ref();
        let frame = &self.frames[slot];
        let cmd = frame.command_buffer;

        device.reset_command_buffer(cmd)?;
        device.begin_command_buffer(cmd, true)?;

        device.write_buffer(&frame.global_buffer, self.global_layout.camera_offset, bytemuck::bytes_of(camera))?;
        device.write_buffer(&frame.global_buffer, self.global_layout.scene_offset, bytemuck::bytes_of(scene))?;

        let clear_values = [
            ClearValue::Color(self.config.clear_color),
            ClearValue::DepthStencil { depth: 1.0, stencil: 0 },
        ];
        device.cmd_begin_render_pass(
            cmd,
            &RenderPassBegin {
                render_pass: self.swapchain.render_pass(),
                framebuffer,
                extent: self.swapchain.extent(),
                clear_values: &clear_values,
            },
        );

        let bindings = FrameBindings {
            command_buffer: cmd,
            global_set: frame.global_set,
            object_set: frame.object_set,
            object_buffer: frame.object_buffer,
            object_layout: self.object_layout,
        };
        let stats = draw_objects(device, &bindings, objects, &self.materials, &self.meshes, camera.view_proj)?;

        device.cmd_end_render_pass(cmd);
        device.end_command_buffer(cmd)?;
        Ok(stats)
    }

    /// Rebuild the swapchain for the pending (or current) extent
    ///
    /// Returns `false` when the target extent has zero area; the swapchain
    /// stays flagged until a usable size arrives.
    fn recreate_swapchain(&mut self) -> Result<bool> {
        let extent = self.pending_extent.unwrap_or_else(|| self.swapchain.extent());
        if extent.is_empty() {
            return Ok(false);
        }

        self.device.wait_idle()?;
        self.swapchain.recreate(extent).map_err(|e| {
            crate::engine_error!("lumen::RenderContext", "Swapchain recreation failed: {}", e);
            e
        })?;
        self.pending_extent = None;
        self.swapchain_dirty = false;
        crate::engine_info!("lumen::RenderContext", "Swapchain recreated at {}x{}", extent.width, extent.height);
        Ok(true)
    }

    /// Window resized: the swapchain is rebuilt before the next frame
    pub fn resize(&mut self, extent: Extent2D) {
        self.pending_extent = Some(extent);
        self.swapchain_dirty = true;
    }

    /// Queue `resource` for release once the most recently submitted frame is done with it
    pub fn defer_release(&mut self, resource: Resource) {
        let slot = self.frame_number.checked_sub(1).map(slot_index).unwrap_or(0);
        self.frames[slot].deletion_queue.push(resource);
    }

    // ===== ASSETS =====

    /// Upload `vertices` (and optional 32-bit `indices`) and register the mesh as `name`
    ///
    /// Re-uploading an existing name keeps its id; the previous buffers stay
    /// alive until shutdown since in-flight frames may still read them.
    pub fn upload_mesh(&mut self, name: &str, vertices: &[Vertex], indices: Option<&[u32]>) -> Result<MeshId> {
        let vertex_buffer = upload_buffer(
            self.device.as_mut(),
            &mut self.upload,
            BufferUsage::VERTEX,
            bytemuck::cast_slice(vertices),
        )?;
        self.main_deletion_queue.push(Resource::Buffer(vertex_buffer));

        let index_buffer = match indices {
            Some(indices) if !indices.is_empty() => {
                let buffer = upload_buffer(
                    self.device.as_mut(),
                    &mut self.upload,
                    BufferUsage::INDEX,
                    bytemuck::cast_slice(indices),
                )?;
                self.main_deletion_queue.push(Resource::Buffer(buffer));
                Some(MeshIndices {
                    buffer,
                    count: indices.len() as u32,
                    index_type: IndexType::U32,
                })
            }
            _ => None,
        };

        let (id, replaced) = self.meshes.insert(
            name,
            Mesh {
                vertex_buffer,
                index_buffer,
                vertex_count: vertices.len() as u32,
            },
        );
        if replaced.is_some() {
            crate::engine_debug!("lumen::RenderContext", "Mesh '{}' replaced", name);
        }
        Ok(id)
    }

    /// Upload tightly packed `pixels` and register the sampled texture as `name`
    pub fn upload_texture(
        &mut self,
        name: &str,
        extent: Extent2D,
        format: TextureFormat,
        pixels: &[u8],
    ) -> Result<TextureId> {
        let image = upload_image(self.device.as_mut(), &mut self.upload, extent, format, pixels)?;
        self.main_deletion_queue.push(Resource::Image(image));

        let view = self.device.create_image_view(&image, ImageAspect::Color)?;
        self.main_deletion_queue.push(Resource::ImageView(view));

        let sampler = self.device.create_sampler(&SamplerDesc::default())?;
        self.main_deletion_queue.push(Resource::Sampler(sampler));

        let descriptor_set = self
            .device
            .allocate_descriptor_set(self.layouts.descriptor_pool, self.layouts.texture_set_layout)?;
        self.device.update_descriptor_set(
            descriptor_set,
            &[DescriptorWrite {
                binding: 0,
                descriptor_type: DescriptorType::CombinedImageSampler,
                resource: DescriptorResource::Image { view, sampler },
            }],
        )?;

        let (id, _) = self.textures.insert(
            name,
            Texture {
                image,
                view,
                sampler,
                descriptor_set,
            },
        );
        Ok(id)
    }

    /// Register a material; `texture` selects the set bound at set 2
    pub fn create_material(
        &mut self,
        name: &str,
        pipeline: PipelineHandle,
        pipeline_layout: PipelineLayoutHandle,
        texture: Option<TextureId>,
    ) -> Result<MaterialId> {
        let mut material = Material::new(pipeline, pipeline_layout);
        if let Some(texture) = texture {
            let texture = self.textures.get_by_id(texture).ok_or_else(|| {
                Error::InvalidResource(format!("material '{}' uses unknown texture {:?}", name, texture))
            })?;
            material = material.with_texture_set(texture.descriptor_set);
        }
        Ok(self.materials.insert(name, material).0)
    }

    pub fn material(&self, name: &str) -> Option<&Material> {
        self.materials.get(name)
    }

    pub fn material_id(&self, name: &str) -> Option<MaterialId> {
        self.materials.id(name)
    }

    pub fn mesh(&self, name: &str) -> Option<&Mesh> {
        self.meshes.get(name)
    }

    pub fn mesh_id(&self, name: &str) -> Option<MeshId> {
        self.meshes.id(name)
    }

    pub fn texture(&self, name: &str) -> Option<&Texture> {
        self.textures.get(name)
    }

    pub fn texture_id(&self, name: &str) -> Option<TextureId> {
        self.textures.id(name)
    }

    // ===== PIPELINES =====

    /// Load a SPIR-V module; the caller destroys it once its pipelines are built
    pub fn load_shader_module(&mut self, path: impl AsRef<Path>) -> Result<ShaderModuleHandle> {
        crate::renderer::load_shader_module(self.device.as_mut(), path)
    }

    pub fn destroy_shader_module(&mut self, module: ShaderModuleHandle) {
        self.device.destroy_resource(Resource::ShaderModule(module));
    }

    /// Builder preset for mesh pipelines: vertex layout, mesh pipeline layout, depth test
    pub fn pipeline_builder(&self) -> PipelineBuilder {
        PipelineBuilder::new(self.swapchain.extent())
            .vertex_input(Vertex::layout())
            .layout(self.layouts.mesh_pipeline_layout)
            .depth_stencil(DepthStencilState::depth(CompareOp::LessOrEqual))
    }

    /// Build a pipeline against the swapchain render pass and register it for teardown
    pub fn build_pipeline(&mut self, builder: &PipelineBuilder) -> Result<PipelineHandle> {
        let pipeline = builder.build(self.device.as_mut(), self.swapchain.render_pass())?;
        self.main_deletion_queue.push(Resource::Pipeline(pipeline));
        Ok(pipeline)
    }

    /// Layout shared by all mesh pipelines (sets 0..=2 + push constants)
    pub fn mesh_pipeline_layout(&self) -> PipelineLayoutHandle {
        self.layouts.mesh_pipeline_layout
    }

    // ===== STATE =====

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn selected_shader(&self) -> usize {
        self.config.selected_shader
    }

    pub fn set_selected_shader(&mut self, index: usize) {
        self.config.selected_shader = index;
    }

    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    pub fn frames(&self) -> &[FrameSlot; FRAME_OVERLAP] {
        &self.frames
    }

    pub fn swapchain_extent(&self) -> Extent2D {
        self.swapchain.extent()
    }

    pub fn stats(&self) -> RenderStats {
        RenderStats {
            frame_number: self.frame_number,
            last_frame: self.last_stats,
        }
    }

    /// Wait for the GPU, then release every frame-scoped and engine-lifetime object
    ///
    /// Idempotent; also run on drop.
    pub fn shutdown(&mut self) -> Result<()> {
        if self.shut_down {
            return Ok(());
        }
        self.shut_down = true;

        let idle = self.device.wait_idle();
        if let Err(e) = &idle {
            crate::engine_error!("lumen::RenderContext", "wait_idle failed during shutdown: {}", e);
        }

        self.upload.release_retired(self.device.as_mut());
        for frame in self.frames.iter_mut() {
            frame.deletion_queue.flush(self.device.as_mut());
        }
        self.main_deletion_queue.flush(self.device.as_mut());

        crate::engine_info!(
            "lumen::RenderContext",
            "Render context shut down after {} frames",
            self.frame_number
        );
        idle
    }
}

impl Drop for RenderContext {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            crate::engine_error!("lumen::RenderContext", "Shutdown error: {}", e);
        }
    }
}

#[cfg(test)]
#[path = "render_context_tests.rs"]
mod tests;
