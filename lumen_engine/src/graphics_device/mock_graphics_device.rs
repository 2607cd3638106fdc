/// Mock graphics device and swapchain for unit tests (no GPU required)
///
/// Every call is recorded as a short string in a shared event log so tests can
/// assert on ordering ("wait_fence:3" before "reset_cmd:5"). Fences carry a
/// signaled flag: submissions unsignal them, waits signal them back unless the
/// simulated GPU is stalled, in which case the wait times out.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::{Error, Result};
use crate::graphics_device::{
    AcquireOutcome, AllocatedBuffer, AllocatedImage, AllocationHandle, BufferCopy, BufferDesc,
    BufferHandle, CommandBufferHandle, CommandPoolHandle, DescriptorBinding, DescriptorPoolHandle,
    DescriptorPoolSize, DescriptorSetHandle, DescriptorSetLayoutHandle, DescriptorWrite,
    DeviceLimits, Extent2D, FenceHandle, FramebufferHandle, GraphicsDevice, GraphicsPipelineDesc,
    ImageAspect, ImageDesc, ImageHandle, ImageLayout, ImageViewHandle, IndexType, PipelineHandle,
    PipelineLayoutDesc, PipelineLayoutHandle, PresentOutcome, RenderPassBegin, RenderPassHandle,
    Resource, SamplerDesc, SamplerHandle, SemaphoreHandle, ShaderModuleHandle, ShaderStageFlags,
    SubmitDesc, Swapchain,
};

pub type EventLog = Arc<Mutex<Vec<String>>>;

// ============================================================================
// Mock device state
// ============================================================================

#[derive(Default)]
struct MockState {
    next_handle: u64,
    /// Fence handle -> signaled
    fences: FxHashMap<u64, bool>,
    /// Raw handles of live (created, not yet destroyed) resources
    live: FxHashSet<u64>,
    /// Host-visible contents of every buffer
    buffers: FxHashMap<u64, Vec<u8>>,
    /// Raw handles destroyed more than once or never created
    bad_destroys: Vec<u64>,
    gpu_stalled: bool,
    /// The next wait on an unsignaled fence times out even on a running GPU
    timeout_next_wait: bool,
    fail_pipelines: bool,
    pipeline_descs: Vec<GraphicsPipelineDesc>,
}

impl MockState {
    fn next(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }

    fn create(&mut self) -> u64 {
        let id = self.next();
        self.live.insert(id);
        id
    }
}

/// Recording GraphicsDevice
///
/// Cloning shares the state, so a test can keep a handle for assertions after boxing the device.
#[derive(Clone)]
pub struct MockGraphicsDevice {
    state: Arc<Mutex<MockState>>,
    events: EventLog,
    limits: DeviceLimits,
}

impl MockGraphicsDevice {
    pub fn new() -> Self {
        Self::with_limits(DeviceLimits::default())
    }

    pub fn with_limits(limits: DeviceLimits) -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState::default())),
            events: Arc::new(Mutex::new(Vec::new())),
            limits,
        }
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    fn record(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }

    /// Shared event log (pass it to `MockSwapchain::new` to interleave both)
    pub fn event_log(&self) -> EventLog {
        self.events.clone()
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn clear_events(&self) {
        self.events.lock().unwrap().clear();
    }

    /// Number of recorded events starting with `prefix`
    pub fn count(&self, prefix: &str) -> usize {
        self.events.lock().unwrap().iter().filter(|e| e.starts_with(prefix)).count()
    }

    /// Index of the first event equal to `event`
    pub fn position(&self, event: &str) -> Option<usize> {
        self.events.lock().unwrap().iter().position(|e| e == event)
    }

    /// While stalled, waits on unsignaled fences time out
    pub fn set_gpu_stalled(&self, stalled: bool) {
        self.state().gpu_stalled = stalled;
    }

    /// Make the next wait on an unsignaled fence time out; `wait_idle` still completes the work
    pub fn time_out_next_fence_wait(&self) {
        self.state().timeout_next_wait = true;
    }

    /// Simulate the GPU finishing the work guarded by `fence`
    pub fn signal_fence(&self, fence: FenceHandle) {
        self.state().fences.insert(fence.raw(), true);
    }

    pub fn is_fence_signaled(&self, fence: FenceHandle) -> bool {
        self.state().fences.get(&fence.raw()).copied().unwrap_or(false)
    }

    pub fn set_fail_pipelines(&self, fail: bool) {
        self.state().fail_pipelines = fail;
    }

    pub fn buffer_contents(&self, buffer: BufferHandle) -> Vec<u8> {
        self.state().buffers.get(&buffer.raw()).cloned().unwrap_or_default()
    }

    pub fn pipeline_descs(&self) -> Vec<GraphicsPipelineDesc> {
        self.state().pipeline_descs.clone()
    }

    pub fn live_count(&self) -> usize {
        self.state().live.len()
    }

    pub fn is_live(&self, raw: u64) -> bool {
        self.state().live.contains(&raw)
    }

    pub fn bad_destroys(&self) -> Vec<u64> {
        self.state().bad_destroys.clone()
    }
}

impl GraphicsDevice for MockGraphicsDevice {
    fn limits(&self) -> DeviceLimits {
        self.limits
    }

    fn create_buffer(&mut self, desc: &BufferDesc) -> Result<AllocatedBuffer> {
        if desc.size == 0 {
            return Err(Error::InvalidResource("zero-sized buffer".to_string()));
        }
        let (buffer, allocation) = {
            let mut state = self.state();
            let buffer = state.create();
            let allocation = state.next();
            state.buffers.insert(buffer, vec![0; desc.size as usize]);
            (buffer, allocation)
        };
        self.record(format!("create_buffer:{}", buffer));
        Ok(AllocatedBuffer {
            buffer: BufferHandle(buffer),
            allocation: AllocationHandle(allocation),
            size: desc.size,
        })
    }

    fn write_buffer(&self, buffer: &AllocatedBuffer, offset: u64, data: &[u8]) -> Result<()> {
        {
            let mut state = self.state();
            let contents = state
                .buffers
                .get_mut(&buffer.buffer.raw())
                .ok_or_else(|| Error::InvalidResource("write to unknown buffer".to_string()))?;
            let start = offset as usize;
            let end = start + data.len();
            if end > contents.len() {
                return Err(Error::InvalidResource(format!(
                    "write {}..{} past end of {}-byte buffer",
                    start,
                    end,
                    contents.len()
                )));
            }
            contents[start..end].copy_from_slice(data);
        }
        self.record(format!("write_buffer:{}@{}+{}", buffer.buffer.raw(), offset, data.len()));
        Ok(())
    }

    fn create_image(&mut self, desc: &ImageDesc) -> Result<AllocatedImage> {
        let (image, allocation) = {
            let mut state = self.state();
            (state.create(), state.next())
        };
        self.record(format!("create_image:{}", image));
        Ok(AllocatedImage {
            image: ImageHandle(image),
            allocation: AllocationHandle(allocation),
            extent: desc.extent,
            format: desc.format,
        })
    }

    fn create_image_view(&mut self, image: &AllocatedImage, _aspect: ImageAspect) -> Result<ImageViewHandle> {
        let id = self.state().create();
        self.record(format!("create_image_view:{}:{}", image.image.raw(), id));
        Ok(ImageViewHandle(id))
    }

    fn create_sampler(&mut self, _desc: &SamplerDesc) -> Result<SamplerHandle> {
        let id = self.state().create();
        self.record(format!("create_sampler:{}", id));
        Ok(SamplerHandle(id))
    }

    fn create_shader_module(&mut self, code: &[u32]) -> Result<ShaderModuleHandle> {
        let id = self.state().create();
        self.record(format!("create_shader_module:{}:{}", id, code.len()));
        Ok(ShaderModuleHandle(id))
    }

    fn create_pipeline_layout(&mut self, desc: &PipelineLayoutDesc) -> Result<PipelineLayoutHandle> {
        let id = self.state().create();
        self.record(format!("create_pipeline_layout:{}:{}", id, desc.set_layouts.len()));
        Ok(PipelineLayoutHandle(id))
    }

    fn create_graphics_pipeline(
        &mut self,
        desc: &GraphicsPipelineDesc,
        render_pass: RenderPassHandle,
    ) -> Result<PipelineHandle> {
        let id = {
            let mut state = self.state();
            if state.fail_pipelines {
                return Err(Error::BackendError("vkCreateGraphicsPipelines failed".to_string()));
            }
            state.pipeline_descs.push(desc.clone());
            state.create()
        };
        self.record(format!("create_pipeline:{}:pass={}", id, render_pass.raw()));
        Ok(PipelineHandle(id))
    }

    fn create_descriptor_set_layout(&mut self, bindings: &[DescriptorBinding]) -> Result<DescriptorSetLayoutHandle> {
        let id = self.state().create();
        self.record(format!("create_set_layout:{}:{}", id, bindings.len()));
        Ok(DescriptorSetLayoutHandle(id))
    }

    fn create_descriptor_pool(&mut self, max_sets: u32, _sizes: &[DescriptorPoolSize]) -> Result<DescriptorPoolHandle> {
        let id = self.state().create();
        self.record(format!("create_descriptor_pool:{}:{}", id, max_sets));
        Ok(DescriptorPoolHandle(id))
    }

    fn allocate_descriptor_set(
        &mut self,
        pool: DescriptorPoolHandle,
        _layout: DescriptorSetLayoutHandle,
    ) -> Result<DescriptorSetHandle> {
        let id = self.state().next();
        self.record(format!("allocate_set:{}:pool={}", id, pool.raw()));
        Ok(DescriptorSetHandle(id))
    }

    fn update_descriptor_set(&self, set: DescriptorSetHandle, writes: &[DescriptorWrite]) -> Result<()> {
        self.record(format!("update_set:{}:{}", set.raw(), writes.len()));
        Ok(())
    }

    fn create_fence(&mut self, signaled: bool) -> Result<FenceHandle> {
        let id = {
            let mut state = self.state();
            let id = state.create();
            state.fences.insert(id, signaled);
            id
        };
        self.record(format!("create_fence:{}", id));
        Ok(FenceHandle(id))
    }

    fn create_semaphore(&mut self) -> Result<SemaphoreHandle> {
        let id = self.state().create();
        self.record(format!("create_semaphore:{}", id));
        Ok(SemaphoreHandle(id))
    }

    fn wait_for_fence(&self, fence: FenceHandle, _timeout_ns: u64) -> Result<()> {
        self.record(format!("wait_fence:{}", fence.raw()));
        let mut state = self.state();
        let signaled = *state
            .fences
            .get(&fence.raw())
            .ok_or_else(|| Error::InvalidResource(format!("unknown fence {}", fence.raw())))?;
        if signaled {
            return Ok(());
        }
        if state.gpu_stalled {
            return Err(Error::Timeout(format!("fence {}", fence.raw())));
        }
        if state.timeout_next_wait {
            state.timeout_next_wait = false;
            return Err(Error::Timeout(format!("fence {}", fence.raw())));
        }
        state.fences.insert(fence.raw(), true);
        Ok(())
    }

    fn reset_fence(&self, fence: FenceHandle) -> Result<()> {
        self.state().fences.insert(fence.raw(), false);
        self.record(format!("reset_fence:{}", fence.raw()));
        Ok(())
    }

    fn wait_idle(&self) -> Result<()> {
        let mut state = self.state();
        if !state.gpu_stalled {
            for signaled in state.fences.values_mut() {
                *signaled = true;
            }
        }
        drop(state);
        self.record("wait_idle".to_string());
        Ok(())
    }

    fn create_command_pool(&mut self) -> Result<CommandPoolHandle> {
        let id = self.state().create();
        self.record(format!("create_command_pool:{}", id));
        Ok(CommandPoolHandle(id))
    }

    fn allocate_command_buffer(&mut self, pool: CommandPoolHandle) -> Result<CommandBufferHandle> {
        let id = self.state().next();
        self.record(format!("allocate_cmd:{}:pool={}", id, pool.raw()));
        Ok(CommandBufferHandle(id))
    }

    fn reset_command_buffer(&self, cmd: CommandBufferHandle) -> Result<()> {
        self.record(format!("reset_cmd:{}", cmd.raw()));
        Ok(())
    }

    fn begin_command_buffer(&self, cmd: CommandBufferHandle, _one_time_submit: bool) -> Result<()> {
        self.record(format!("begin_cmd:{}", cmd.raw()));
        Ok(())
    }

    fn end_command_buffer(&self, cmd: CommandBufferHandle) -> Result<()> {
        self.record(format!("end_cmd:{}", cmd.raw()));
        Ok(())
    }

    fn submit(&self, desc: &SubmitDesc<'_>) -> Result<()> {
        if let Some(fence) = desc.fence {
            self.state().fences.insert(fence.raw(), false);
        }
        let cmds: Vec<u64> = desc.command_buffers.iter().map(|c| c.raw()).collect();
        let waits: Vec<u64> = desc.wait_semaphores.iter().map(|(s, _)| s.raw()).collect();
        let signals: Vec<u64> = desc.signal_semaphores.iter().map(|s| s.raw()).collect();
        self.record(format!(
            "submit:cmd={:?}:wait={:?}:signal={:?}:fence={}",
            cmds,
            waits,
            signals,
            desc.fence.map(|f| f.raw()).unwrap_or(0)
        ));
        Ok(())
    }

    fn destroy_resource(&mut self, resource: Resource) {
        let raw = resource.raw();
        {
            let mut state = self.state();
            if !state.live.remove(&raw) {
                state.bad_destroys.push(raw);
            }
            state.buffers.remove(&raw);
            state.fences.remove(&raw);
        }
        self.record(format!("destroy:{}:{}", resource.kind(), raw));
    }

    fn cmd_begin_render_pass(&self, cmd: CommandBufferHandle, begin: &RenderPassBegin<'_>) {
        self.record(format!("begin_render_pass:{}:fb={}", cmd.raw(), begin.framebuffer.raw()));
    }

    fn cmd_end_render_pass(&self, cmd: CommandBufferHandle) {
        self.record(format!("end_render_pass:{}", cmd.raw()));
    }

    fn cmd_bind_pipeline(&self, _cmd: CommandBufferHandle, pipeline: PipelineHandle) {
        self.record(format!("bind_pipeline:{}", pipeline.raw()));
    }

    fn cmd_bind_descriptor_set(
        &self,
        _cmd: CommandBufferHandle,
        _layout: PipelineLayoutHandle,
        set_index: u32,
        set: DescriptorSetHandle,
        dynamic_offsets: &[u32],
    ) {
        self.record(format!("bind_set:{}:{}:{:?}", set_index, set.raw(), dynamic_offsets));
    }

    fn cmd_bind_vertex_buffer(&self, _cmd: CommandBufferHandle, buffer: BufferHandle, _offset: u64) {
        self.record(format!("bind_vertex:{}", buffer.raw()));
    }

    fn cmd_bind_index_buffer(&self, _cmd: CommandBufferHandle, buffer: BufferHandle, _offset: u64, _index_type: IndexType) {
        self.record(format!("bind_index:{}", buffer.raw()));
    }

    fn cmd_push_constants(
        &self,
        _cmd: CommandBufferHandle,
        _layout: PipelineLayoutHandle,
        _stages: ShaderStageFlags,
        offset: u32,
        data: &[u8],
    ) {
        self.record(format!("push_constants:{}+{}", offset, data.len()));
    }

    fn cmd_draw(&self, _cmd: CommandBufferHandle, vertex_count: u32, instance_count: u32, _first_vertex: u32, first_instance: u32) {
        self.record(format!("draw:{}x{}@{}", vertex_count, instance_count, first_instance));
    }

    fn cmd_draw_indexed(
        &self,
        _cmd: CommandBufferHandle,
        index_count: u32,
        instance_count: u32,
        _first_index: u32,
        _vertex_offset: i32,
        first_instance: u32,
    ) {
        self.record(format!("draw_indexed:{}x{}@{}", index_count, instance_count, first_instance));
    }

    fn cmd_copy_buffer(&self, _cmd: CommandBufferHandle, src: BufferHandle, dst: BufferHandle, regions: &[BufferCopy]) {
        let copied: Vec<(u64, u64, u64)> = regions
            .iter()
            .map(|r| (r.src_offset, r.dst_offset, r.size))
            .collect();
        {
            let mut state = self.state();
            let src_data = state.buffers.get(&src.raw()).cloned().unwrap_or_default();
            if let Some(dst_data) = state.buffers.get_mut(&dst.raw()) {
                for (src_offset, dst_offset, size) in &copied {
                    let (s, d, n) = (*src_offset as usize, *dst_offset as usize, *size as usize);
                    if s + n <= src_data.len() && d + n <= dst_data.len() {
                        dst_data[d..d + n].copy_from_slice(&src_data[s..s + n]);
                    }
                }
            }
        }
        self.record(format!("copy_buffer:{}->{}", src.raw(), dst.raw()));
    }

    fn cmd_copy_buffer_to_image(&self, _cmd: CommandBufferHandle, src: BufferHandle, dst: &AllocatedImage) {
        self.record(format!("copy_buffer_to_image:{}->{}", src.raw(), dst.image.raw()));
    }

    fn cmd_transition_image_layout(
        &self,
        _cmd: CommandBufferHandle,
        image: &AllocatedImage,
        old_layout: ImageLayout,
        new_layout: ImageLayout,
    ) {
        self.record(format!("transition:{}:{:?}->{:?}", image.image.raw(), old_layout, new_layout));
    }
}

// ============================================================================
// Mock swapchain
// ============================================================================

struct MockSwapchainState {
    extent: Extent2D,
    image_count: u32,
    next_image: u32,
    acquire_script: VecDeque<AcquireOutcome>,
    present_script: VecDeque<PresentOutcome>,
    recreate_count: u32,
    framebuffer_base: u64,
}

/// Scriptable Swapchain sharing its event log with a MockGraphicsDevice
///
/// Without a script, acquire cycles through the images and present succeeds.
#[derive(Clone)]
pub struct MockSwapchain {
    state: Arc<Mutex<MockSwapchainState>>,
    events: EventLog,
}

impl MockSwapchain {
    pub const RENDER_PASS: RenderPassHandle = RenderPassHandle(0xAA00);

    pub fn new(events: EventLog, extent: Extent2D, image_count: u32) -> Self {
        Self {
            state: Arc::new(Mutex::new(MockSwapchainState {
                extent,
                image_count,
                next_image: 0,
                acquire_script: VecDeque::new(),
                present_script: VecDeque::new(),
                recreate_count: 0,
                framebuffer_base: 0xFB00,
            })),
            events,
        }
    }

    fn record(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }

    /// Queue the outcome of the next acquire call
    pub fn script_acquire(&self, outcome: AcquireOutcome) {
        self.state.lock().unwrap().acquire_script.push_back(outcome);
    }

    /// Queue the outcome of the next present call
    pub fn script_present(&self, outcome: PresentOutcome) {
        self.state.lock().unwrap().present_script.push_back(outcome);
    }

    pub fn recreate_count(&self) -> u32 {
        self.state.lock().unwrap().recreate_count
    }
}

impl Swapchain for MockSwapchain {
    fn acquire_next_image(&mut self, signal: SemaphoreHandle, _timeout_ns: u64) -> Result<AcquireOutcome> {
        let outcome = {
            let mut state = self.state.lock().unwrap();
            match state.acquire_script.pop_front() {
                Some(outcome) => outcome,
                None => {
                    let index = state.next_image;
                    state.next_image = (index + 1) % state.image_count;
                    AcquireOutcome::Ready(index)
                }
            }
        };
        self.record(format!("acquire:sem={}:{:?}", signal.raw(), outcome));
        Ok(outcome)
    }

    fn present(&mut self, wait: SemaphoreHandle, image_index: u32) -> Result<PresentOutcome> {
        let outcome = self
            .state
            .lock()
            .unwrap()
            .present_script
            .pop_front()
            .unwrap_or(PresentOutcome::Presented);
        self.record(format!("present:sem={}:image={}:{:?}", wait.raw(), image_index, outcome));
        Ok(outcome)
    }

    fn recreate(&mut self, extent: Extent2D) -> Result<()> {
        {
            let mut state = self.state.lock().unwrap();
            state.extent = extent;
            state.recreate_count += 1;
            state.framebuffer_base += 0x100;
            state.next_image = 0;
        }
        self.record(format!("recreate_swapchain:{}x{}", extent.width, extent.height));
        Ok(())
    }

    fn extent(&self) -> Extent2D {
        self.state.lock().unwrap().extent
    }

    fn image_count(&self) -> u32 {
        self.state.lock().unwrap().image_count
    }

    fn render_pass(&self) -> RenderPassHandle {
        Self::RENDER_PASS
    }

    fn framebuffer(&self, image_index: u32) -> Option<FramebufferHandle> {
        let state = self.state.lock().unwrap();
        (image_index < state.image_count)
            .then(|| FramebufferHandle(state.framebuffer_base + image_index as u64))
    }
}

#[cfg(test)]
#[path = "mock_graphics_device_tests.rs"]
mod tests;
