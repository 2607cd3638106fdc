/// GraphicsDevice trait - the seam between the frame core and the GPU API
///
/// Creation calls take `&mut self` (the backend tracks allocations); queue and
/// recording calls take `&self`. Recording calls (`cmd_*`) cannot fail: invalid
/// usage is a programming error caught by the validation layers, exactly as with
/// the underlying API.

use crate::error::Result;
use crate::graphics_device::{
    AllocatedBuffer, AllocatedImage, BufferCopy, BufferDesc, BufferHandle, CommandBufferHandle,
    CommandPoolHandle, DescriptorPoolHandle, DescriptorPoolSize, DescriptorBinding,
    DescriptorSetHandle, DescriptorSetLayoutHandle, DescriptorWrite, FenceHandle,
    FramebufferHandle, GraphicsPipelineDesc, ImageAspect, ImageDesc, ImageLayout,
    ImageViewHandle, IndexType, PipelineHandle, PipelineLayoutDesc, PipelineLayoutHandle,
    RenderPassHandle, Resource, SamplerDesc, SamplerHandle, SemaphoreHandle,
    ShaderModuleHandle, ShaderStageFlags,
};

/// 2D size in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Extent2D {
    pub width: u32,
    pub height: u32,
}

impl Extent2D {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// A minimized window reports a zero-area surface
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn aspect_ratio(&self) -> f32 {
        if self.height == 0 {
            1.0
        } else {
            self.width as f32 / self.height as f32
        }
    }
}

/// Device limits consumed by the core
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceLimits {
    /// Required alignment of dynamic uniform buffer offsets
    pub min_uniform_buffer_offset_alignment: u64,
    /// Maximum size of the push constant block in bytes
    pub max_push_constants_size: u32,
}

impl Default for DeviceLimits {
    fn default() -> Self {
        Self {
            min_uniform_buffer_offset_alignment: 256,
            max_push_constants_size: 128,
        }
    }
}

/// Pipeline stage at which a submission waits on a semaphore
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    ColorAttachmentOutput,
    Transfer,
    AllCommands,
}

/// One queue submission
#[derive(Debug, Clone, Copy)]
pub struct SubmitDesc<'a> {
    pub command_buffers: &'a [CommandBufferHandle],
    /// Semaphores waited on, each at its paired stage
    pub wait_semaphores: &'a [(SemaphoreHandle, PipelineStage)],
    pub signal_semaphores: &'a [SemaphoreHandle],
    /// Fence signaled once every command buffer has completed
    pub fence: Option<FenceHandle>,
}

/// Clear value of one render pass attachment
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClearValue {
    Color([f32; 4]),
    DepthStencil { depth: f32, stencil: u32 },
}

/// Arguments of `cmd_begin_render_pass`
#[derive(Debug, Clone, Copy)]
pub struct RenderPassBegin<'a> {
    pub render_pass: RenderPassHandle,
    pub framebuffer: FramebufferHandle,
    pub extent: Extent2D,
    pub clear_values: &'a [ClearValue],
}

/// GPU device abstraction
///
/// Implemented by the Vulkan backend and by the in-crate mock used in tests.
pub trait GraphicsDevice {
    /// Limits reported by the physical device
    fn limits(&self) -> DeviceLimits;

    // ===== ALLOCATION FACADE =====

    /// Create a buffer and its backing memory
    fn create_buffer(&mut self, desc: &BufferDesc) -> Result<AllocatedBuffer>;

    /// Copy `data` into a host-visible buffer at `offset`
    fn write_buffer(&self, buffer: &AllocatedBuffer, offset: u64, data: &[u8]) -> Result<()>;

    /// Create a 2D image and its backing memory
    fn create_image(&mut self, desc: &ImageDesc) -> Result<AllocatedImage>;

    fn create_image_view(&mut self, image: &AllocatedImage, aspect: ImageAspect) -> Result<ImageViewHandle>;

    fn create_sampler(&mut self, desc: &SamplerDesc) -> Result<SamplerHandle>;

    // ===== PIPELINES =====

    /// Wrap SPIR-V words into a shader module
    fn create_shader_module(&mut self, code: &[u32]) -> Result<ShaderModuleHandle>;

    fn create_pipeline_layout(&mut self, desc: &PipelineLayoutDesc) -> Result<PipelineLayoutHandle>;

    /// Materialize a graphics pipeline compatible with `render_pass`
    fn create_graphics_pipeline(
        &mut self,
        desc: &GraphicsPipelineDesc,
        render_pass: RenderPassHandle,
    ) -> Result<PipelineHandle>;

    // ===== DESCRIPTORS =====

    fn create_descriptor_set_layout(&mut self, bindings: &[DescriptorBinding]) -> Result<DescriptorSetLayoutHandle>;

    fn create_descriptor_pool(&mut self, max_sets: u32, sizes: &[DescriptorPoolSize]) -> Result<DescriptorPoolHandle>;

    fn allocate_descriptor_set(
        &mut self,
        pool: DescriptorPoolHandle,
        layout: DescriptorSetLayoutHandle,
    ) -> Result<DescriptorSetHandle>;

    fn update_descriptor_set(&self, set: DescriptorSetHandle, writes: &[DescriptorWrite]) -> Result<()>;

    // ===== SYNCHRONIZATION =====

    fn create_fence(&mut self, signaled: bool) -> Result<FenceHandle>;

    fn create_semaphore(&mut self) -> Result<SemaphoreHandle>;

    /// Block until `fence` is signaled. Elapsed timeout is `Error::Timeout`.
    fn wait_for_fence(&self, fence: FenceHandle, timeout_ns: u64) -> Result<()>;

    fn reset_fence(&self, fence: FenceHandle) -> Result<()>;

    /// Block until the device has finished all submitted work
    fn wait_idle(&self) -> Result<()>;

    // ===== COMMANDS =====

    /// Create a command pool on the graphics queue family (buffers individually resettable)
    fn create_command_pool(&mut self) -> Result<CommandPoolHandle>;

    fn allocate_command_buffer(&mut self, pool: CommandPoolHandle) -> Result<CommandBufferHandle>;

    fn reset_command_buffer(&self, cmd: CommandBufferHandle) -> Result<()>;

    fn begin_command_buffer(&self, cmd: CommandBufferHandle, one_time_submit: bool) -> Result<()>;

    fn end_command_buffer(&self, cmd: CommandBufferHandle) -> Result<()>;

    /// Submit to the graphics queue
    fn submit(&self, desc: &SubmitDesc<'_>) -> Result<()>;

    // ===== TEARDOWN =====

    /// Release one GPU object. Called by `DeletionQueue::flush`.
    fn destroy_resource(&mut self, resource: Resource);

    // ===== RECORDING =====

    fn cmd_begin_render_pass(&self, cmd: CommandBufferHandle, begin: &RenderPassBegin<'_>);

    fn cmd_end_render_pass(&self, cmd: CommandBufferHandle);

    fn cmd_bind_pipeline(&self, cmd: CommandBufferHandle, pipeline: PipelineHandle);

    fn cmd_bind_descriptor_set(
        &self,
        cmd: CommandBufferHandle,
        layout: PipelineLayoutHandle,
        set_index: u32,
        set: DescriptorSetHandle,
        dynamic_offsets: &[u32],
    );

    fn cmd_bind_vertex_buffer(&self, cmd: CommandBufferHandle, buffer: BufferHandle, offset: u64);

    fn cmd_bind_index_buffer(&self, cmd: CommandBufferHandle, buffer: BufferHandle, offset: u64, index_type: IndexType);

    fn cmd_push_constants(
        &self,
        cmd: CommandBufferHandle,
        layout: PipelineLayoutHandle,
        stages: ShaderStageFlags,
        offset: u32,
        data: &[u8],
    );

    fn cmd_draw(&self, cmd: CommandBufferHandle, vertex_count: u32, instance_count: u32, first_vertex: u32, first_instance: u32);

    fn cmd_draw_indexed(
        &self,
        cmd: CommandBufferHandle,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    );

    fn cmd_copy_buffer(&self, cmd: CommandBufferHandle, src: BufferHandle, dst: BufferHandle, regions: &[BufferCopy]);

    /// Copy tightly packed texels from `src` into mip 0 of `dst` (which must be in TransferDst)
    fn cmd_copy_buffer_to_image(&self, cmd: CommandBufferHandle, src: BufferHandle, dst: &AllocatedImage);

    fn cmd_transition_image_layout(
        &self,
        cmd: CommandBufferHandle,
        image: &AllocatedImage,
        old_layout: ImageLayout,
        new_layout: ImageLayout,
    );
}
