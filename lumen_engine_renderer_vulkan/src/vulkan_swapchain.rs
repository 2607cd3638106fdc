/// VulkanSwapchain - Vulkan implementation of the Swapchain trait
///
/// Owns the swapchain, its image views, the depth attachment, the main render
/// pass and one framebuffer per swapchain image. The render pass survives
/// recreation (the surface format does not change); everything sized by the
/// surface is rebuilt in `recreate`.

use ash::vk;
use ash::vk::Handle;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use gpu_allocator::MemoryLocation;
use lumen_engine::lumen::{Error, Result};
use lumen_engine::lumen::device::{
    AcquireOutcome, Extent2D, FramebufferHandle, PresentOutcome, RenderPassHandle,
    SemaphoreHandle, Swapchain,
};
use lumen_engine::{engine_debug, engine_error, engine_info, engine_err};
use std::sync::Arc;

use crate::vulkan_context::GpuContext;
use crate::vulkan_convert::{handle, vk_error};

/// Format of the depth attachment
const DEPTH_FORMAT: vk::Format = vk::Format::D32_SFLOAT;

/// Prefer an sRGB 8-bit surface format, else whatever the surface lists first
pub(crate) fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> Option<vk::SurfaceFormatKHR> {
    formats
        .iter()
        .find(|f| {
            (f.format == vk::Format::B8G8R8A8_SRGB || f.format == vk::Format::R8G8B8A8_SRGB)
                && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
        })
        .or_else(|| formats.first())
        .copied()
}

/// Surface-dictated extent, or the requested one clamped to the surface limits
pub(crate) fn choose_extent(capabilities: &vk::SurfaceCapabilitiesKHR, requested: Extent2D) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        capabilities.current_extent
    } else {
        vk::Extent2D {
            width: requested.width.clamp(
                capabilities.min_image_extent.width,
                capabilities.max_image_extent.width,
            ),
            height: requested.height.clamp(
                capabilities.min_image_extent.height,
                capabilities.max_image_extent.height,
            ),
        }
    }
}

/// One image more than the minimum, capped by the maximum (0 = unbounded)
pub(crate) fn choose_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let count = capabilities.min_image_count + 1;
    if capabilities.max_image_count > 0 {
        count.min(capabilities.max_image_count)
    } else {
        count
    }
}

/// Vulkan swapchain implementation
pub struct VulkanSwapchain {
    context: Arc<GpuContext>,
    loader: ash::khr::swapchain::Device,
    swapchain: vk::SwapchainKHR,
    surface_format: vk::SurfaceFormatKHR,
    extent: Extent2D,

    images: Vec<vk::Image>,
    image_views: Vec<vk::ImageView>,

    /// Depth attachment shared by every framebuffer
    depth_image: vk::Image,
    depth_view: vk::ImageView,
    depth_allocation: Option<Allocation>,

    render_pass: vk::RenderPass,
    framebuffers: Vec<vk::Framebuffer>,
}

impl VulkanSwapchain {
    /// Create a swapchain on the context's surface
    pub(crate) fn new(context: Arc<GpuContext>, extent: Extent2D) -> Result<Self> {
        let formats = unsafe {
            context
                .surface_loader
                .get_physical_device_surface_formats(context.physical_device, context.surface)
        }
        .map_err(|e| {
            engine_error!("lumen::vulkan", "Failed to query surface formats: {:?}", e);
            Error::InitializationFailed(format!("Failed to get surface formats: {:?}", e))
        })?;

        let surface_format = choose_surface_format(&formats).ok_or_else(|| {
            engine_error!("lumen::vulkan", "Surface reports no formats");
            Error::InitializationFailed("Surface reports no formats".to_string())
        })?;

        let render_pass = Self::create_render_pass(&context.device, surface_format.format)?;
        let loader = ash::khr::swapchain::Device::new(&context.instance, &context.device);

        let mut swapchain = Self {
            context,
            loader,
            swapchain: vk::SwapchainKHR::null(),
            surface_format,
            extent,
            images: Vec::new(),
            image_views: Vec::new(),
            depth_image: vk::Image::null(),
            depth_view: vk::ImageView::null(),
            depth_allocation: None,
            render_pass,
            framebuffers: Vec::new(),
        };

        // On failure, Drop releases whatever was built so far
        swapchain.build(extent)?;

        engine_info!(
            "lumen::vulkan",
            "Swapchain created: {}x{}, {} images, {:?}",
            swapchain.extent.width,
            swapchain.extent.height,
            swapchain.images.len(),
            swapchain.surface_format.format
        );

        Ok(swapchain)
    }

    fn create_render_pass(device: &ash::Device, color_format: vk::Format) -> Result<vk::RenderPass> {
        let attachments = [
            vk::AttachmentDescription::default()
                .format(color_format)
                .samples(vk::SampleCountFlags::TYPE_1)
                .load_op(vk::AttachmentLoadOp::CLEAR)
                .store_op(vk::AttachmentStoreOp::STORE)
                .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
                .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
                .initial_layout(vk::ImageLayout::UNDEFINED)
                .final_layout(vk::ImageLayout::PRESENT_SRC_KHR),
            vk::AttachmentDescription::default()
                .format(DEPTH_FORMAT)
                .samples(vk::SampleCountFlags::TYPE_1)
                .load_op(vk::AttachmentLoadOp::CLEAR)
                .store_op(vk::AttachmentStoreOp::DONT_CARE)
                .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
                .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
                .initial_layout(vk::ImageLayout::UNDEFINED)
                .final_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL),
        ];

        let color_attachment_ref = vk::AttachmentReference::default()
            .attachment(0)
            .layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL);
        let depth_attachment_ref = vk::AttachmentReference::default()
            .attachment(1)
            .layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL);

        let subpass = vk::SubpassDescription::default()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(std::slice::from_ref(&color_attachment_ref))
            .depth_stencil_attachment(&depth_attachment_ref);

        let stages = vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
            | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS;
        let dependency = vk::SubpassDependency::default()
            .src_subpass(vk::SUBPASS_EXTERNAL)
            .dst_subpass(0)
            .src_stage_mask(stages)
            .src_access_mask(vk::AccessFlags::empty())
            .dst_stage_mask(stages)
            .dst_access_mask(
                vk::AccessFlags::COLOR_ATTACHMENT_WRITE | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
            );

        let render_pass_info = vk::RenderPassCreateInfo::default()
            .attachments(&attachments)
            .subpasses(std::slice::from_ref(&subpass))
            .dependencies(std::slice::from_ref(&dependency));

        unsafe { device.create_render_pass(&render_pass_info, None) }.map_err(|e| {
            engine_error!("lumen::vulkan", "Failed to create render pass: {:?}", e);
            Error::InitializationFailed(format!("Failed to create render pass: {:?}", e))
        })
    }

    /// (Re)build the swapchain and everything sized by it, retiring the current swapchain
    fn build(&mut self, requested: Extent2D) -> Result<()> {
        let context = Arc::clone(&self.context);
        let device = &context.device;

        unsafe {
            let capabilities = context
                .surface_loader
                .get_physical_device_surface_capabilities(context.physical_device, context.surface)
                .map_err(|e| vk_error("Failed to get surface capabilities", e))?;

            let extent = choose_extent(&capabilities, requested);
            if extent.width == 0 || extent.height == 0 {
                return Err(Error::InvalidResource(format!(
                    "surface extent {}x{} is empty",
                    extent.width, extent.height
                )));
            }

            let old_swapchain = self.swapchain;
            let create_info = vk::SwapchainCreateInfoKHR::default()
                .surface(context.surface)
                .min_image_count(choose_image_count(&capabilities))
                .image_format(self.surface_format.format)
                .image_color_space(self.surface_format.color_space)
                .image_extent(extent)
                .image_array_layers(1)
                .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
                .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
                .pre_transform(capabilities.current_transform)
                .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
                .present_mode(vk::PresentModeKHR::FIFO)
                .clipped(true)
                .old_swapchain(old_swapchain);

            let swapchain = self.loader
                .create_swapchain(&create_info, None)
                .map_err(|e| vk_error("Failed to create swapchain", e))?;

            if old_swapchain != vk::SwapchainKHR::null() {
                self.loader.destroy_swapchain(old_swapchain, None);
            }
            self.swapchain = swapchain;
            self.extent = Extent2D::new(extent.width, extent.height);

            self.images = self.loader
                .get_swapchain_images(swapchain)
                .map_err(|e| vk_error("Failed to get swapchain images", e))?;

            for &image in &self.images {
                let create_info = vk::ImageViewCreateInfo::default()
                    .image(image)
                    .view_type(vk::ImageViewType::TYPE_2D)
                    .format(self.surface_format.format)
                    .components(vk::ComponentMapping {
                        r: vk::ComponentSwizzle::IDENTITY,
                        g: vk::ComponentSwizzle::IDENTITY,
                        b: vk::ComponentSwizzle::IDENTITY,
                        a: vk::ComponentSwizzle::IDENTITY,
                    })
                    .subresource_range(vk::ImageSubresourceRange {
                        aspect_mask: vk::ImageAspectFlags::COLOR,
                        base_mip_level: 0,
                        level_count: 1,
                        base_array_layer: 0,
                        layer_count: 1,
                    });
                let view = device.create_image_view(&create_info, None)
                    .map_err(|e| vk_error("Failed to create swapchain image view", e))?;
                self.image_views.push(view);
            }

            self.create_depth_attachment(extent)?;

            for &view in &self.image_views {
                let attachments = [view, self.depth_view];
                let framebuffer_info = vk::FramebufferCreateInfo::default()
                    .render_pass(self.render_pass)
                    .attachments(&attachments)
                    .width(extent.width)
                    .height(extent.height)
                    .layers(1);
                let framebuffer = device.create_framebuffer(&framebuffer_info, None)
                    .map_err(|e| vk_error("Failed to create framebuffer", e))?;
                self.framebuffers.push(framebuffer);
            }
        }

        Ok(())
    }

    fn create_depth_attachment(&mut self, extent: vk::Extent2D) -> Result<()> {
        let device = &self.context.device;

        unsafe {
            let image_info = vk::ImageCreateInfo::default()
                .image_type(vk::ImageType::TYPE_2D)
                .format(DEPTH_FORMAT)
                .extent(vk::Extent3D {
                    width: extent.width,
                    height: extent.height,
                    depth: 1,
                })
                .mip_levels(1)
                .array_layers(1)
                .samples(vk::SampleCountFlags::TYPE_1)
                .tiling(vk::ImageTiling::OPTIMAL)
                .usage(vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT)
                .sharing_mode(vk::SharingMode::EXCLUSIVE)
                .initial_layout(vk::ImageLayout::UNDEFINED);

            self.depth_image = device.create_image(&image_info, None)
                .map_err(|e| vk_error("Failed to create depth image", e))?;

            let requirements = device.get_image_memory_requirements(self.depth_image);
            let allocation = self.context
                .allocator()?
                .allocate(&AllocationCreateDesc {
                    name: "depth_attachment",
                    requirements,
                    location: MemoryLocation::GpuOnly,
                    linear: false,
                    allocation_scheme: AllocationScheme::GpuAllocatorManaged,
                })
                .map_err(|e| engine_err!("lumen::vulkan", "Failed to allocate depth attachment: {:?}", e))?;

            let bind = device.bind_image_memory(self.depth_image, allocation.memory(), allocation.offset());
            self.depth_allocation = Some(allocation);
            bind.map_err(|e| vk_error("Failed to bind depth image memory", e))?;

            let view_info = vk::ImageViewCreateInfo::default()
                .image(self.depth_image)
                .view_type(vk::ImageViewType::TYPE_2D)
                .format(DEPTH_FORMAT)
                .subresource_range(vk::ImageSubresourceRange {
                    aspect_mask: vk::ImageAspectFlags::DEPTH,
                    base_mip_level: 0,
                    level_count: 1,
                    base_array_layer: 0,
                    layer_count: 1,
                });
            self.depth_view = device.create_image_view(&view_info, None)
                .map_err(|e| vk_error("Failed to create depth image view", e))?;
        }

        Ok(())
    }

    /// Destroy framebuffers, depth attachment and image views (not the swapchain itself)
    fn destroy_size_dependent(&mut self) {
        let device = &self.context.device;
        unsafe {
            for framebuffer in self.framebuffers.drain(..) {
                device.destroy_framebuffer(framebuffer, None);
            }
            if self.depth_view != vk::ImageView::null() {
                device.destroy_image_view(self.depth_view, None);
                self.depth_view = vk::ImageView::null();
            }
            if self.depth_image != vk::Image::null() {
                device.destroy_image(self.depth_image, None);
                self.depth_image = vk::Image::null();
            }
            for view in self.image_views.drain(..) {
                device.destroy_image_view(view, None);
            }
        }
        self.images.clear();

        if let Some(allocation) = self.depth_allocation.take() {
            match self.context.allocator() {
                Ok(mut allocator) => {
                    if let Err(e) = allocator.free(allocation) {
                        engine_error!("lumen::vulkan", "Failed to free depth attachment memory: {:?}", e);
                    }
                }
                Err(_) => engine_error!("lumen::vulkan", "Depth attachment memory leaked: allocator unavailable"),
            }
        }
    }

    /// Surface format of the swapchain images
    pub fn format(&self) -> vk::Format {
        self.surface_format.format
    }
}

impl Swapchain for VulkanSwapchain {
    fn acquire_next_image(&mut self, signal: SemaphoreHandle, timeout_ns: u64) -> Result<AcquireOutcome> {
        let result = unsafe {
            self.loader.acquire_next_image(
                self.swapchain,
                timeout_ns,
                handle(signal.raw()),
                vk::Fence::null(),
            )
        };

        match result {
            Ok((index, false)) => Ok(AcquireOutcome::Ready(index)),
            Ok((index, true)) => Ok(AcquireOutcome::Suboptimal(index)),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(AcquireOutcome::OutOfDate),
            Err(vk::Result::TIMEOUT) | Err(vk::Result::NOT_READY) => {
                engine_error!("lumen::vulkan", "No swapchain image available within {} ns", timeout_ns);
                Err(Error::Timeout(format!("swapchain acquire exceeded {} ns", timeout_ns)))
            }
            Err(e) => Err(vk_error("Failed to acquire next swapchain image", e)),
        }
    }

    fn present(&mut self, wait: SemaphoreHandle, image_index: u32) -> Result<PresentOutcome> {
        let swapchains = [self.swapchain];
        let image_indices = [image_index];
        let wait_semaphores = [handle::<vk::Semaphore>(wait.raw())];

        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        match unsafe { self.loader.queue_present(self.context.graphics_queue, &present_info) } {
            Ok(false) => Ok(PresentOutcome::Presented),
            Ok(true) => Ok(PresentOutcome::Suboptimal),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(PresentOutcome::OutOfDate),
            Err(e) => Err(vk_error("Failed to present swapchain image", e)),
        }
    }

    fn recreate(&mut self, extent: Extent2D) -> Result<()> {
        if extent.is_empty() {
            return Err(Error::InvalidResource(format!(
                "cannot recreate swapchain at {}x{}",
                extent.width, extent.height
            )));
        }

        unsafe { self.context.device.device_wait_idle() }
            .map_err(|e| vk_error("Failed to wait idle before swapchain recreate", e))?;

        self.destroy_size_dependent();
        self.build(extent)?;

        engine_debug!(
            "lumen::vulkan",
            "Swapchain recreated: {}x{}",
            self.extent.width,
            self.extent.height
        );
        Ok(())
    }

    fn extent(&self) -> Extent2D {
        self.extent
    }

    fn image_count(&self) -> u32 {
        self.images.len() as u32
    }

    fn render_pass(&self) -> RenderPassHandle {
        RenderPassHandle(self.render_pass.as_raw())
    }

    fn framebuffer(&self, image_index: u32) -> Option<FramebufferHandle> {
        self.framebuffers
            .get(image_index as usize)
            .map(|framebuffer| FramebufferHandle(framebuffer.as_raw()))
    }
}

impl Drop for VulkanSwapchain {
    fn drop(&mut self) {
        unsafe {
            self.context.device.device_wait_idle().ok();
        }

        self.destroy_size_dependent();

        unsafe {
            if self.swapchain != vk::SwapchainKHR::null() {
                self.loader.destroy_swapchain(self.swapchain, None);
            }
            self.context.device.destroy_render_pass(self.render_pass, None);
        }
    }
}

#[cfg(test)]
#[path = "vulkan_swapchain_tests.rs"]
mod tests;
