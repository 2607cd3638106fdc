/// Frame slots - the fixed ring of per-frame GPU state
///
/// Frame N always uses slot `N % FRAME_OVERLAP`. A slot is only touched by the
/// host after its render fence has been observed signaled, which is what keeps
/// at most `FRAME_OVERLAP` frames in flight.

use crate::error::Result;
use crate::graphics_device::{
    AllocatedBuffer, BufferDesc, BufferUsage, CommandBufferHandle, CommandPoolHandle,
    DescriptorPoolHandle, DescriptorResource, DescriptorSetHandle, DescriptorSetLayoutHandle,
    DescriptorType, DescriptorWrite, FenceHandle, GraphicsDevice, MemoryUsage, Resource,
    SemaphoreHandle,
};
use crate::renderer::{pad_uniform_buffer_size, CameraData, DeletionQueue, DynamicUniformLayout, ObjectData, SceneData};

/// Number of frames that may be in flight at once
pub const FRAME_OVERLAP: usize = 2;

/// Slot used by frame `frame_number`
pub fn slot_index(frame_number: u64) -> usize {
    (frame_number % FRAME_OVERLAP as u64) as usize
}

/// Lifecycle of a slot within one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    /// Never used yet
    Idle,
    /// Host is recording the command buffer
    Recording,
    /// Command buffer submitted, fence pending
    Submitted,
    /// Present requested (whatever its outcome)
    Presented,
}

impl FrameState {
    fn can_transition_to(self, next: FrameState) -> bool {
        matches!(
            (self, next),
            (FrameState::Idle, FrameState::Recording)
                | (FrameState::Presented, FrameState::Recording)
                | (FrameState::Recording, FrameState::Submitted)
                | (FrameState::Submitted, FrameState::Presented)
        )
    }
}

/// Byte layout of the per-frame global uniform buffer: camera, then scene
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlobalUniformLayout {
    pub camera_offset: u64,
    pub scene_offset: u64,
    pub size: u64,
}

impl GlobalUniformLayout {
    pub fn new(alignment: u64) -> Self {
        let camera_size = pad_uniform_buffer_size(std::mem::size_of::<CameraData>() as u64, alignment);
        let scene_size = pad_uniform_buffer_size(std::mem::size_of::<SceneData>() as u64, alignment);
        Self {
            camera_offset: 0,
            scene_offset: camera_size,
            size: camera_size + scene_size,
        }
    }
}

/// Everything a slot needs at creation time
pub struct FrameSlotDesc {
    pub descriptor_pool: DescriptorPoolHandle,
    pub global_set_layout: DescriptorSetLayoutHandle,
    pub object_set_layout: DescriptorSetLayoutHandle,
    pub global_layout: GlobalUniformLayout,
    pub object_layout: DynamicUniformLayout,
}

/// One entry of the frame ring
pub struct FrameSlot {
    /// Signaled by swapchain acquire, waited on by the submit
    pub present_semaphore: SemaphoreHandle,
    /// Signaled by the submit, waited on by present
    pub render_semaphore: SemaphoreHandle,
    /// Signaled when the GPU has finished this slot's last submission
    pub render_fence: FenceHandle,
    pub command_pool: CommandPoolHandle,
    pub command_buffer: CommandBufferHandle,
    /// Frame-scoped releases, flushed when the slot is next reused
    pub deletion_queue: DeletionQueue,
    pub global_buffer: AllocatedBuffer,
    pub global_set: DescriptorSetHandle,
    pub object_buffer: AllocatedBuffer,
    pub object_set: DescriptorSetHandle,
    state: FrameState,
}

impl FrameSlot {
    /// Create the slot's sync primitives, command buffer and uniform buffers
    ///
    /// Everything long-lived is registered in `main_queue`; the slot's own queue
    /// starts empty.
    pub fn create(
        device: &mut dyn GraphicsDevice,
        desc: &FrameSlotDesc,
        main_queue: &mut DeletionQueue,
    ) -> Result<Self> {
        let command_pool = device.create_command_pool()?;
        main_queue.push(Resource::CommandPool(command_pool));
        let command_buffer = device.allocate_command_buffer(command_pool)?;

        // Signaled so the first wait on a fresh slot returns immediately
        let render_fence = device.create_fence(true)?;
        main_queue.push(Resource::Fence(render_fence));
        let present_semaphore = device.create_semaphore()?;
        main_queue.push(Resource::Semaphore(present_semaphore));
        let render_semaphore = device.create_semaphore()?;
        main_queue.push(Resource::Semaphore(render_semaphore));

        let global_buffer = device.create_buffer(&BufferDesc {
            size: desc.global_layout.size,
            usage: BufferUsage::UNIFORM,
            memory: MemoryUsage::CpuToGpu,
        })?;
        main_queue.push(Resource::Buffer(global_buffer));

        let object_buffer = device.create_buffer(&BufferDesc {
            size: desc.object_layout.buffer_size(),
            usage: BufferUsage::UNIFORM,
            memory: MemoryUsage::CpuToGpu,
        })?;
        main_queue.push(Resource::Buffer(object_buffer));

        let global_set = device.allocate_descriptor_set(desc.descriptor_pool, desc.global_set_layout)?;
        device.update_descriptor_set(
            global_set,
            &[
                DescriptorWrite {
                    binding: 0,
                    descriptor_type: DescriptorType::UniformBuffer,
                    resource: DescriptorResource::Buffer {
                        buffer: global_buffer.buffer,
                        offset: desc.global_layout.camera_offset,
                        range: std::mem::size_of::<CameraData>() as u64,
                    },
                },
                DescriptorWrite {
                    binding: 1,
                    descriptor_type: DescriptorType::UniformBuffer,
                    resource: DescriptorResource::Buffer {
                        buffer: global_buffer.buffer,
                        offset: desc.global_layout.scene_offset,
                        range: std::mem::size_of::<SceneData>() as u64,
                    },
                },
            ],
        )?;

        let object_set = device.allocate_descriptor_set(desc.descriptor_pool, desc.object_set_layout)?;
        device.update_descriptor_set(
            object_set,
            &[DescriptorWrite {
                binding: 0,
                descriptor_type: DescriptorType::UniformBufferDynamic,
                resource: DescriptorResource::Buffer {
                    buffer: object_buffer.buffer,
                    offset: 0,
                    range: std::mem::size_of::<ObjectData>() as u64,
                },
            }],
        )?;

        Ok(Self {
            present_semaphore,
            render_semaphore,
            render_fence,
            command_pool,
            command_buffer,
            deletion_queue: DeletionQueue::new(),
            global_buffer,
            global_set,
            object_buffer,
            object_set,
            state: FrameState::Idle,
        })
    }

    pub fn state(&self) -> FrameState {
        self.state
    }

    /// Move to `next`, rejecting transitions outside Idle/Presented -> Recording -> Submitted -> Presented
    pub fn transition(&mut self, next: FrameState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            crate::engine_bail!(
                "lumen::Frame",
                "Invalid frame slot transition {:?} -> {:?}",
                self.state,
                next
            );
        }
        self.state = next;
        Ok(())
    }

    /// Wait for the slot's previous submission, then release its frame-scoped resources
    ///
    /// After this returns the host may freely rewrite the slot's command buffer
    /// and uniform buffers.
    pub fn wait_and_reclaim(&mut self, device: &mut dyn GraphicsDevice, timeout_ns: u64) -> Result<()> {
        device.wait_for_fence(self.render_fence, timeout_ns).map_err(|e| {
            crate::engine_error!("lumen::Frame", "Render fence wait failed: {}", e);
            e
        })?;
        self.deletion_queue.flush(device);
        Ok(())
    }
}

#[cfg(test)]
#[path = "frame_tests.rs"]
mod tests;
