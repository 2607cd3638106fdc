/// Graphics device module - the GPU-facing traits and plain data they exchange

pub mod graphics_device;
pub mod handle;
pub mod buffer;
pub mod texture;
pub mod pipeline;
pub mod descriptor;
pub mod swapchain;

pub use graphics_device::*;
pub use handle::*;
pub use buffer::*;
pub use texture::*;
pub use pipeline::*;
pub use descriptor::*;
pub use swapchain::*;

// Mock graphics device and swapchain for tests (no GPU required)
#[cfg(test)]
pub mod mock_graphics_device;
