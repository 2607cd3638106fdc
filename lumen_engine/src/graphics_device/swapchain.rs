/// Swapchain trait - presentation collaborator consumed by the frame loop

use crate::error::Result;
use crate::graphics_device::{Extent2D, FramebufferHandle, RenderPassHandle, SemaphoreHandle};

/// Result of asking the swapchain for the next image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// Image acquired; the semaphore will be signaled when it is ready
    Ready(u32),
    /// Image acquired, but the swapchain no longer matches the surface exactly
    Suboptimal(u32),
    /// No image acquired; the swapchain must be recreated before retrying
    OutOfDate,
}

impl AcquireOutcome {
    /// Acquired image index, if any
    pub fn image_index(&self) -> Option<u32> {
        match self {
            AcquireOutcome::Ready(i) | AcquireOutcome::Suboptimal(i) => Some(*i),
            AcquireOutcome::OutOfDate => None,
        }
    }
}

/// Result of a present request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentOutcome {
    Presented,
    /// Presented, but the swapchain should be recreated
    Suboptimal,
    /// Not presented; the swapchain must be recreated
    OutOfDate,
}

impl PresentOutcome {
    pub fn needs_recreate(&self) -> bool {
        !matches!(self, PresentOutcome::Presented)
    }
}

/// Presentation surface plus the resources that depend on its size
///
/// The implementation owns the render pass, one framebuffer per image and the
/// depth attachment, and rebuilds the size-dependent ones in `recreate`.
/// Fatal failures are `Err`; out-of-date and suboptimal are outcomes.
pub trait Swapchain {
    /// Acquire the next presentable image, signaling `signal` when it is ready
    fn acquire_next_image(&mut self, signal: SemaphoreHandle, timeout_ns: u64) -> Result<AcquireOutcome>;

    /// Queue `image_index` for presentation once `wait` is signaled
    fn present(&mut self, wait: SemaphoreHandle, image_index: u32) -> Result<PresentOutcome>;

    /// Rebuild the swapchain and its framebuffers/depth image for `extent`
    fn recreate(&mut self, extent: Extent2D) -> Result<()>;

    fn extent(&self) -> Extent2D;

    fn image_count(&self) -> u32;

    /// Render pass every pipeline and framebuffer is compatible with
    fn render_pass(&self) -> RenderPassHandle;

    fn framebuffer(&self, image_index: u32) -> Option<FramebufferHandle>;
}
