/// GpuContext - Vulkan objects shared by the device and the swapchain
///
/// Owns the instance, the surface, the logical device and the allocator. Both
/// `VulkanDevice` and `VulkanSwapchain` hold an `Arc<GpuContext>`; whichever
/// drops last tears the Vulkan instance down.

use ash::vk;
use gpu_allocator::vulkan::Allocator;
use lumen_engine::lumen::Result;
use lumen_engine::engine_err;
use std::mem::ManuallyDrop;
use std::sync::{Mutex, MutexGuard};

/// Shared GPU context for all Vulkan objects.
pub struct GpuContext {
    /// Vulkan entry (keeps the loader library alive)
    _entry: ash::Entry,

    pub(crate) instance: ash::Instance,

    /// Debug utils loader and messenger (validation builds only)
    pub(crate) debug_utils: Option<(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)>,

    /// Window surface and its loader
    pub(crate) surface: vk::SurfaceKHR,
    pub(crate) surface_loader: ash::khr::surface::Instance,

    pub(crate) physical_device: vk::PhysicalDevice,

    /// Vulkan logical device
    pub(crate) device: ash::Device,

    /// Graphics queue, also used for presentation
    pub(crate) graphics_queue: vk::Queue,
    pub(crate) graphics_queue_family: u32,

    /// GPU memory allocator.
    /// ManuallyDrop: its memory pages must be released before the device.
    allocator: ManuallyDrop<Mutex<Allocator>>,
}

impl GpuContext {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        entry: ash::Entry,
        instance: ash::Instance,
        debug_utils: Option<(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)>,
        surface: vk::SurfaceKHR,
        surface_loader: ash::khr::surface::Instance,
        physical_device: vk::PhysicalDevice,
        device: ash::Device,
        graphics_queue: vk::Queue,
        graphics_queue_family: u32,
        allocator: Allocator,
    ) -> Self {
        Self {
            _entry: entry,
            instance,
            debug_utils,
            surface,
            surface_loader,
            physical_device,
            device,
            graphics_queue,
            graphics_queue_family,
            allocator: ManuallyDrop::new(Mutex::new(allocator)),
        }
    }

    /// Lock the allocator. A poisoned lock is a backend error.
    pub(crate) fn allocator(&self) -> Result<MutexGuard<'_, Allocator>> {
        self.allocator
            .lock()
            .map_err(|_| engine_err!("lumen::vulkan", "GPU allocator lock poisoned"))
    }
}

impl Drop for GpuContext {
    fn drop(&mut self) {
        unsafe {
            self.device.device_wait_idle().ok();

            // 1. Allocator: free VkDeviceMemory pages while the device is alive
            ManuallyDrop::drop(&mut self.allocator);

            // 2. Device
            self.device.destroy_device(None);

            // 3. Surface
            self.surface_loader.destroy_surface(self.surface, None);

            // 4. Debug messenger, before the instance
            crate::debug::cleanup_debug_config();
            if let Some((debug_utils, messenger)) = self.debug_utils.take() {
                debug_utils.destroy_debug_utils_messenger(messenger, None);
            }

            // 5. Instance
            self.instance.destroy_instance(None);
        }
    }
}
