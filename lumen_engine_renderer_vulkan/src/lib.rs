/*!
# Lumen Engine - Vulkan Backend

Vulkan implementation of the `lumen_engine` device traits.

This crate provides [`VulkanDevice`] (implements `GraphicsDevice`) and
[`VulkanSwapchain`] (implements `Swapchain`) using the Ash library for Vulkan
bindings and gpu-allocator for memory management.

```no_run
use lumen_engine::lumen::Config;
use lumen_engine::lumen::render::RenderContext;
use lumen_engine_renderer_vulkan::VulkanDevice;
# fn run(window: &winit::window::Window) -> lumen_engine::lumen::Result<()> {
let config = Config::default();
let device = VulkanDevice::new(window, &config)?;
let swapchain = device.create_swapchain(config.window_extent)?;
let context = RenderContext::new(Box::new(device), Box::new(swapchain), config)?;
# Ok(())
# }
```
*/

mod debug;
mod vulkan_context;
mod vulkan_convert;
mod vulkan_device;
mod vulkan_swapchain;

pub use vulkan_device::VulkanDevice;
pub use vulkan_swapchain::VulkanSwapchain;

// Re-export debug utilities
pub use debug::{get_validation_stats, print_validation_stats_report, ValidationStats};
