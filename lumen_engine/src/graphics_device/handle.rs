/// Opaque GPU object handles
///
/// Backends hand out raw 64-bit identifiers (Vulkan: `vk::Handle::as_raw`); the core
/// never interprets them beyond equality. Zero is the null handle.

use crate::graphics_device::{AllocatedBuffer, AllocatedImage};

macro_rules! define_handle {
    ($($(#[$meta:meta])* $name:ident),* $(,)?) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
            pub struct $name(pub u64);

            impl $name {
                /// The null handle
                pub const NULL: Self = Self(0);

                /// Raw backend value
                pub fn raw(self) -> u64 {
                    self.0
                }

                pub fn is_null(self) -> bool {
                    self.0 == 0
                }
            }
        )*
    };
}

define_handle!(
    /// GPU buffer object
    BufferHandle,
    /// GPU image object
    ImageHandle,
    ImageViewHandle,
    SamplerHandle,
    ShaderModuleHandle,
    /// Compiled graphics pipeline
    PipelineHandle,
    PipelineLayoutHandle,
    DescriptorSetLayoutHandle,
    DescriptorPoolHandle,
    /// Descriptor set (freed with its pool, never individually)
    DescriptorSetHandle,
    /// Host-observable completion signal
    FenceHandle,
    /// Queue-to-queue ordering signal
    SemaphoreHandle,
    CommandPoolHandle,
    /// Primary command buffer (freed with its pool)
    CommandBufferHandle,
    RenderPassHandle,
    FramebufferHandle,
    /// Memory block handed out by the backend allocator
    AllocationHandle,
);

/// A releasable GPU object, as queued for deferred teardown
///
/// Each variant carries exactly what the backend needs to release the object.
/// Descriptor sets and command buffers have no variant: they go away with the
/// pool they were allocated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Buffer(AllocatedBuffer),
    Image(AllocatedImage),
    ImageView(ImageViewHandle),
    Sampler(SamplerHandle),
    ShaderModule(ShaderModuleHandle),
    Pipeline(PipelineHandle),
    PipelineLayout(PipelineLayoutHandle),
    DescriptorSetLayout(DescriptorSetLayoutHandle),
    DescriptorPool(DescriptorPoolHandle),
    Fence(FenceHandle),
    Semaphore(SemaphoreHandle),
    CommandPool(CommandPoolHandle),
}

impl Resource {
    /// Short kind name, used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            Resource::Buffer(_) => "buffer",
            Resource::Image(_) => "image",
            Resource::ImageView(_) => "image_view",
            Resource::Sampler(_) => "sampler",
            Resource::ShaderModule(_) => "shader_module",
            Resource::Pipeline(_) => "pipeline",
            Resource::PipelineLayout(_) => "pipeline_layout",
            Resource::DescriptorSetLayout(_) => "descriptor_set_layout",
            Resource::DescriptorPool(_) => "descriptor_pool",
            Resource::Fence(_) => "fence",
            Resource::Semaphore(_) => "semaphore",
            Resource::CommandPool(_) => "command_pool",
        }
    }

    /// Raw value of the primary handle
    pub fn raw(&self) -> u64 {
        match self {
            Resource::Buffer(b) => b.buffer.raw(),
            Resource::Image(i) => i.image.raw(),
            Resource::ImageView(h) => h.raw(),
            Resource::Sampler(h) => h.raw(),
            Resource::ShaderModule(h) => h.raw(),
            Resource::Pipeline(h) => h.raw(),
            Resource::PipelineLayout(h) => h.raw(),
            Resource::DescriptorSetLayout(h) => h.raw(),
            Resource::DescriptorPool(h) => h.raw(),
            Resource::Fence(h) => h.raw(),
            Resource::Semaphore(h) => h.raw(),
            Resource::CommandPool(h) => h.raw(),
        }
    }
}
