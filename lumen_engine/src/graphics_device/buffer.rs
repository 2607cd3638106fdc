/// Buffer allocation facade types

use bitflags::bitflags;
use crate::graphics_device::{AllocationHandle, BufferHandle};

bitflags! {
    /// How a buffer is going to be used by the device
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferUsage: u32 {
        const VERTEX       = 1 << 0;
        const INDEX        = 1 << 1;
        const UNIFORM      = 1 << 2;
        const STORAGE      = 1 << 3;
        const TRANSFER_SRC = 1 << 4;
        const TRANSFER_DST = 1 << 5;
    }
}

/// Where the allocator should place the memory block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryUsage {
    /// Device-local, not host visible (mesh data after upload)
    GpuOnly,
    /// Host-visible and persistently mapped (uniforms, staging)
    CpuToGpu,
    /// Host-visible, read back by the host
    GpuToCpu,
}

/// Descriptor for creating a buffer
#[derive(Debug, Clone)]
pub struct BufferDesc {
    /// Size in bytes
    pub size: u64,
    pub usage: BufferUsage,
    pub memory: MemoryUsage,
}

/// Buffer + backing allocation, as returned by the allocation facade
///
/// Plain data: copying it does not duplicate ownership. Whoever created it must
/// eventually hand it to a [`DeletionQueue`](crate::renderer::DeletionQueue).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocatedBuffer {
    pub buffer: BufferHandle,
    pub allocation: AllocationHandle,
    /// Size in bytes
    pub size: u64,
}

/// One region of a buffer-to-buffer copy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferCopy {
    pub src_offset: u64,
    pub dst_offset: u64,
    pub size: u64,
}

/// Index buffer element type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexType {
    /// 16-bit indices (max 65535 vertices)
    U16,
    /// 32-bit indices
    U32,
}

impl IndexType {
    /// Size in bytes of one index element
    pub fn size_bytes(&self) -> u32 {
        match self {
            IndexType::U16 => 2,
            IndexType::U32 => 4,
        }
    }
}
