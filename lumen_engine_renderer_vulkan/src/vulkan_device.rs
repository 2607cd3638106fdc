/// VulkanDevice - Vulkan implementation of the GraphicsDevice trait
///
/// Creates the instance, picks a GPU with a queue family that can both draw
/// and present to the window surface, and exposes the allocation facade,
/// object creation, queue submission and command recording the frame core
/// needs. Memory comes from gpu-allocator; every live allocation is tracked
/// by an `AllocationHandle` until its buffer or image is destroyed.

use ash::vk;
use ash::vk::Handle;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme, Allocator, AllocatorCreateDesc};
use gpu_allocator::{AllocationError, MemoryLocation};
use lumen_engine::lumen::{Config, Error, Result};
use lumen_engine::lumen::device::{
    AllocatedBuffer, AllocatedImage, AllocationHandle, BufferCopy, BufferDesc, BufferHandle,
    CommandBufferHandle, CommandPoolHandle, DescriptorBinding, DescriptorPoolHandle,
    DescriptorPoolSize, DescriptorResource, DescriptorSetHandle, DescriptorSetLayoutHandle,
    DescriptorWrite, DeviceLimits, Extent2D, FenceHandle, GraphicsDevice, GraphicsPipelineDesc,
    ImageAspect, ImageDesc, ImageHandle, ImageLayout, ImageViewHandle, IndexType,
    PipelineHandle, PipelineLayoutDesc, PipelineLayoutHandle, RenderPassBegin, RenderPassHandle,
    Resource, SamplerDesc, SamplerHandle, SemaphoreHandle, ShaderModuleHandle, ShaderStageFlags,
    SubmitDesc,
};
use lumen_engine::{engine_debug, engine_error, engine_info, engine_warn, engine_err};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use rustc_hash::FxHashMap;
use std::ffi::CString;
use std::sync::Arc;

use crate::debug;
use crate::vulkan_context::GpuContext;
use crate::vulkan_convert::*;
use crate::vulkan_swapchain::VulkanSwapchain;

/// Vulkan device
///
/// Shares its `GpuContext` with the swapchains it creates.
pub struct VulkanDevice {
    context: Arc<GpuContext>,
    limits: DeviceLimits,
    /// Live memory blocks, keyed by `AllocationHandle` value
    allocations: FxHashMap<u64, Allocation>,
    next_allocation: u64,
}

fn init_error(what: &str, detail: impl std::fmt::Debug) -> Error {
    engine_error!("lumen::vulkan", "{}: {:?}", what, detail);
    Error::InitializationFailed(format!("{}: {:?}", what, detail))
}

/// Tear down what `VulkanDevice::new` created before the `GpuContext` existed
unsafe fn destroy_partial_instance(
    instance: &ash::Instance,
    debug_utils: Option<(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)>,
    surface: Option<(&ash::khr::surface::Instance, vk::SurfaceKHR)>,
) {
    if let Some((loader, surface)) = surface {
        loader.destroy_surface(surface, None);
    }
    if let Some((debug_utils, messenger)) = debug_utils {
        debug::cleanup_debug_config();
        debug_utils.destroy_debug_utils_messenger(messenger, None);
    }
    instance.destroy_instance(None);
}

/// First queue family of `physical_device` that supports graphics and can present to `surface`
unsafe fn find_graphics_present_family(
    instance: &ash::Instance,
    surface_loader: &ash::khr::surface::Instance,
    surface: vk::SurfaceKHR,
    physical_device: vk::PhysicalDevice,
) -> Option<u32> {
    instance
        .get_physical_device_queue_family_properties(physical_device)
        .iter()
        .enumerate()
        .find(|(index, family)| {
            family.queue_flags.contains(vk::QueueFlags::GRAPHICS)
                && surface_loader
                    .get_physical_device_surface_support(physical_device, *index as u32, surface)
                    .unwrap_or(false)
        })
        .map(|(index, _)| index as u32)
}

impl VulkanDevice {
    /// Create a new Vulkan device for `window`
    pub fn new<W: HasDisplayHandle + HasWindowHandle>(window: &W, config: &Config) -> Result<Self> {
        unsafe {
            let entry = ash::Entry::load()
                .map_err(|e| init_error("Failed to load Vulkan library", e))?;

            let app_name = CString::new(config.app_name.as_str())
                .map_err(|e| init_error("Invalid application name", e))?;

            let app_info = vk::ApplicationInfo::default()
                .application_name(&app_name)
                .application_version(vk::make_api_version(0, 1, 0, 0))
                .engine_name(c"Lumen")
                .engine_version(vk::make_api_version(0, 0, 1, 0))
                .api_version(vk::API_VERSION_1_1);

            let display_handle = window.display_handle()
                .map_err(|e| init_error("Failed to get display handle", e))?;
            let window_handle = window.window_handle()
                .map_err(|e| init_error("Failed to get window handle", e))?;

            let mut extension_names = ash_window::enumerate_required_extensions(display_handle.as_raw())
                .map_err(|e| init_error("Failed to get required extensions", e))?
                .to_vec();

            // Validation only when requested, compiled in, and installed
            let mut enable_validation = debug::validation_requested(config.enable_validation);
            if enable_validation {
                let layers = entry.enumerate_instance_layer_properties().unwrap_or_default();
                let available = layers
                    .iter()
                    .any(|layer| layer.layer_name_as_c_str().is_ok_and(|name| name == debug::VALIDATION_LAYER));
                if !available {
                    engine_warn!("lumen::vulkan", "Validation layer not installed, continuing without validation");
                    enable_validation = false;
                }
            } else if config.enable_validation {
                engine_debug!("lumen::vulkan", "Validation requested but the vulkan-validation feature is disabled");
            }

            if enable_validation {
                extension_names.push(ash::ext::debug_utils::NAME.as_ptr());
            }
            let layer_names = if enable_validation {
                vec![debug::VALIDATION_LAYER.as_ptr()]
            } else {
                vec![]
            };

            let create_info = vk::InstanceCreateInfo::default()
                .application_info(&app_info)
                .enabled_layer_names(&layer_names)
                .enabled_extension_names(&extension_names);

            let instance = entry
                .create_instance(&create_info, None)
                .map_err(|e| init_error("Failed to create Vulkan instance", e))?;

            let debug_utils = if enable_validation {
                match debug::create_debug_messenger(&entry, &instance) {
                    Ok(debug_utils) => Some(debug_utils),
                    Err(e) => {
                        destroy_partial_instance(&instance, None, None);
                        return Err(e);
                    }
                }
            } else {
                None
            };

            let surface = match ash_window::create_surface(
                &entry,
                &instance,
                display_handle.as_raw(),
                window_handle.as_raw(),
                None,
            ) {
                Ok(surface) => surface,
                Err(e) => {
                    destroy_partial_instance(&instance, debug_utils, None);
                    return Err(init_error("Failed to create surface", e));
                }
            };
            let surface_loader = ash::khr::surface::Instance::new(&entry, &instance);

            // Pick a GPU that can draw and present from one queue, discrete first
            let physical_devices = match instance.enumerate_physical_devices() {
                Ok(devices) => devices,
                Err(e) => {
                    destroy_partial_instance(&instance, debug_utils, Some((&surface_loader, surface)));
                    return Err(init_error("Failed to enumerate physical devices", e));
                }
            };

            let mut candidates: Vec<(vk::PhysicalDevice, u32, vk::PhysicalDeviceProperties)> = physical_devices
                .into_iter()
                .filter_map(|physical_device| {
                    find_graphics_present_family(&instance, &surface_loader, surface, physical_device)
                        .map(|family| {
                            (physical_device, family, instance.get_physical_device_properties(physical_device))
                        })
                })
                .collect();
            candidates.sort_by_key(|(_, _, properties)| {
                properties.device_type != vk::PhysicalDeviceType::DISCRETE_GPU
            });

            let Some((physical_device, graphics_queue_family, properties)) = candidates.into_iter().next() else {
                destroy_partial_instance(&instance, debug_utils, Some((&surface_loader, surface)));
                return Err(init_error("No suitable GPU", "no queue family supports both graphics and present"));
            };

            engine_info!(
                "lumen::vulkan",
                "Using GPU: {}",
                properties.device_name_as_c_str().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default()
            );

            let queue_priorities = [1.0];
            let queue_create_infos = [vk::DeviceQueueCreateInfo::default()
                .queue_family_index(graphics_queue_family)
                .queue_priorities(&queue_priorities)];

            let device_extension_names = [ash::khr::swapchain::NAME.as_ptr()];

            // Wireframe pipelines need fillModeNonSolid
            let supported = instance.get_physical_device_features(physical_device);
            let device_features = vk::PhysicalDeviceFeatures::default()
                .fill_mode_non_solid(supported.fill_mode_non_solid == vk::TRUE);

            let device_create_info = vk::DeviceCreateInfo::default()
                .queue_create_infos(&queue_create_infos)
                .enabled_extension_names(&device_extension_names)
                .enabled_features(&device_features);

            let device = match instance.create_device(physical_device, &device_create_info, None) {
                Ok(device) => device,
                Err(e) => {
                    destroy_partial_instance(&instance, debug_utils, Some((&surface_loader, surface)));
                    return Err(init_error("Failed to create logical device", e));
                }
            };

            let graphics_queue = device.get_device_queue(graphics_queue_family, 0);

            let allocator = match Allocator::new(&AllocatorCreateDesc {
                instance: instance.clone(),
                device: device.clone(),
                physical_device,
                debug_settings: Default::default(),
                buffer_device_address: false,
                allocation_sizes: Default::default(),
            }) {
                Ok(allocator) => allocator,
                Err(e) => {
                    device.destroy_device(None);
                    destroy_partial_instance(&instance, debug_utils, Some((&surface_loader, surface)));
                    return Err(init_error("Failed to create GPU allocator", e));
                }
            };

            let limits = DeviceLimits {
                min_uniform_buffer_offset_alignment: properties.limits.min_uniform_buffer_offset_alignment,
                max_push_constants_size: properties.limits.max_push_constants_size,
            };

            engine_debug!(
                "lumen::vulkan",
                "Device limits: uniform offset alignment {}, push constants {} bytes",
                limits.min_uniform_buffer_offset_alignment,
                limits.max_push_constants_size
            );

            let context = Arc::new(GpuContext::new(
                entry,
                instance,
                debug_utils,
                surface,
                surface_loader,
                physical_device,
                device,
                graphics_queue,
                graphics_queue_family,
                allocator,
            ));

            Ok(Self {
                context,
                limits,
                allocations: FxHashMap::default(),
                next_allocation: 1,
            })
        }
    }

    /// Create a swapchain on this device's window surface
    pub fn create_swapchain(&self, extent: Extent2D) -> Result<VulkanSwapchain> {
        VulkanSwapchain::new(Arc::clone(&self.context), extent)
    }

    /// Number of memory blocks currently handed out
    pub fn live_allocations(&self) -> usize {
        self.allocations.len()
    }

    fn allocate(
        &mut self,
        name: &str,
        requirements: vk::MemoryRequirements,
        location: MemoryLocation,
        linear: bool,
    ) -> Result<Allocation> {
        self.context
            .allocator()?
            .allocate(&AllocationCreateDesc {
                name,
                requirements,
                location,
                linear,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            })
            .map_err(|e| match e {
                AllocationError::OutOfMemory => {
                    let size_mb = requirements.size as f64 / (1024.0 * 1024.0);
                    engine_error!("lumen::vulkan", "Out of GPU memory for {} (required: {:.2} MB)", name, size_mb);
                    Error::OutOfMemory
                }
                other => engine_err!("lumen::vulkan", "Failed to allocate memory for {}: {:?}", name, other),
            })
    }

    fn track(&mut self, allocation: Allocation) -> AllocationHandle {
        let id = self.next_allocation;
        self.next_allocation += 1;
        self.allocations.insert(id, allocation);
        AllocationHandle(id)
    }

    fn release_allocation(&mut self, allocation: Allocation) {
        match self.context.allocator() {
            Ok(mut allocator) => {
                if let Err(e) = allocator.free(allocation) {
                    engine_error!("lumen::vulkan", "Failed to free GPU allocation: {:?}", e);
                }
            }
            Err(_) => {
                engine_error!("lumen::vulkan", "GPU allocation leaked: allocator unavailable");
            }
        }
    }

    fn free_allocation(&mut self, handle: AllocationHandle) {
        match self.allocations.remove(&handle.raw()) {
            Some(allocation) => self.release_allocation(allocation),
            None => engine_warn!("lumen::vulkan", "Freeing unknown allocation {}", handle.raw()),
        }
    }
}

impl GraphicsDevice for VulkanDevice {
    fn limits(&self) -> DeviceLimits {
        self.limits
    }

    // ===== ALLOCATION FACADE =====

    fn create_buffer(&mut self, desc: &BufferDesc) -> Result<AllocatedBuffer> {
        if desc.size == 0 {
            return Err(Error::InvalidResource("buffer size must be non-zero".to_string()));
        }

        let context = Arc::clone(&self.context);
        let device = &context.device;

        unsafe {
            let buffer_create_info = vk::BufferCreateInfo::default()
                .size(desc.size)
                .usage(buffer_usage_to_vk(desc.usage))
                .sharing_mode(vk::SharingMode::EXCLUSIVE);

            let buffer = device.create_buffer(&buffer_create_info, None)
                .map_err(|e| vk_error(&format!("Failed to create buffer of size {} bytes", desc.size), e))?;

            let requirements = device.get_buffer_memory_requirements(buffer);
            let allocation = match self.allocate("buffer", requirements, memory_usage_to_location(desc.memory), true) {
                Ok(allocation) => allocation,
                Err(e) => {
                    device.destroy_buffer(buffer, None);
                    return Err(e);
                }
            };

            if let Err(e) = device.bind_buffer_memory(buffer, allocation.memory(), allocation.offset()) {
                self.release_allocation(allocation);
                device.destroy_buffer(buffer, None);
                return Err(vk_error("Failed to bind buffer memory", e));
            }

            Ok(AllocatedBuffer {
                buffer: BufferHandle(buffer.as_raw()),
                allocation: self.track(allocation),
                size: desc.size,
            })
        }
    }

    fn write_buffer(&self, buffer: &AllocatedBuffer, offset: u64, data: &[u8]) -> Result<()> {
        let end = offset.checked_add(data.len() as u64).unwrap_or(u64::MAX);
        if end > buffer.size {
            return Err(Error::InvalidResource(format!(
                "write of {} bytes at offset {} overflows buffer of {} bytes",
                data.len(),
                offset,
                buffer.size
            )));
        }

        let allocation = self.allocations.get(&buffer.allocation.raw()).ok_or_else(|| {
            Error::InvalidResource(format!("unknown allocation {}", buffer.allocation.raw()))
        })?;
        let mapped = allocation.mapped_ptr().ok_or_else(|| {
            Error::InvalidResource("buffer memory is not host visible".to_string())
        })?;

        unsafe {
            std::ptr::copy_nonoverlapping(
                data.as_ptr(),
                (mapped.as_ptr() as *mut u8).add(offset as usize),
                data.len(),
            );
        }
        Ok(())
    }

    fn create_image(&mut self, desc: &ImageDesc) -> Result<AllocatedImage> {
        if desc.extent.is_empty() {
            return Err(Error::InvalidResource("image extent must be non-zero".to_string()));
        }

        let context = Arc::clone(&self.context);
        let device = &context.device;

        unsafe {
            let image_create_info = vk::ImageCreateInfo::default()
                .image_type(vk::ImageType::TYPE_2D)
                .format(texture_format_to_vk(desc.format))
                .extent(vk::Extent3D {
                    width: desc.extent.width,
                    height: desc.extent.height,
                    depth: 1,
                })
                .mip_levels(1)
                .array_layers(1)
                .samples(vk::SampleCountFlags::TYPE_1)
                .tiling(vk::ImageTiling::OPTIMAL)
                .usage(image_usage_to_vk(desc.usage))
                .sharing_mode(vk::SharingMode::EXCLUSIVE)
                .initial_layout(vk::ImageLayout::UNDEFINED);

            let image = device.create_image(&image_create_info, None)
                .map_err(|e| vk_error("Failed to create image", e))?;

            let requirements = device.get_image_memory_requirements(image);
            let allocation = match self.allocate("image", requirements, MemoryLocation::GpuOnly, false) {
                Ok(allocation) => allocation,
                Err(e) => {
                    device.destroy_image(image, None);
                    return Err(e);
                }
            };

            if let Err(e) = device.bind_image_memory(image, allocation.memory(), allocation.offset()) {
                self.release_allocation(allocation);
                device.destroy_image(image, None);
                return Err(vk_error("Failed to bind image memory", e));
            }

            Ok(AllocatedImage {
                image: ImageHandle(image.as_raw()),
                allocation: self.track(allocation),
                extent: desc.extent,
                format: desc.format,
            })
        }
    }

    fn create_image_view(&mut self, image: &AllocatedImage, aspect: ImageAspect) -> Result<ImageViewHandle> {
        let create_info = vk::ImageViewCreateInfo::default()
            .image(handle(image.image.raw()))
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(texture_format_to_vk(image.format))
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: image_aspect_to_vk(aspect),
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            });

        let view = unsafe { self.context.device.create_image_view(&create_info, None) }
            .map_err(|e| vk_error("Failed to create image view", e))?;
        Ok(ImageViewHandle(view.as_raw()))
    }

    fn create_sampler(&mut self, desc: &SamplerDesc) -> Result<SamplerHandle> {
        let filter = filter_to_vk(desc.filter);
        let address_mode = address_mode_to_vk(desc.address_mode);
        let create_info = vk::SamplerCreateInfo::default()
            .mag_filter(filter)
            .min_filter(filter)
            .mipmap_mode(vk::SamplerMipmapMode::NEAREST)
            .address_mode_u(address_mode)
            .address_mode_v(address_mode)
            .address_mode_w(address_mode)
            .max_lod(0.0);

        let sampler = unsafe { self.context.device.create_sampler(&create_info, None) }
            .map_err(|e| vk_error("Failed to create sampler", e))?;
        Ok(SamplerHandle(sampler.as_raw()))
    }

    // ===== PIPELINES =====

    fn create_shader_module(&mut self, code: &[u32]) -> Result<ShaderModuleHandle> {
        let create_info = vk::ShaderModuleCreateInfo::default().code(code);
        let module = unsafe { self.context.device.create_shader_module(&create_info, None) }
            .map_err(|e| vk_error("Failed to create shader module", e))?;
        Ok(ShaderModuleHandle(module.as_raw()))
    }

    fn create_pipeline_layout(&mut self, desc: &PipelineLayoutDesc) -> Result<PipelineLayoutHandle> {
        let set_layouts: Vec<vk::DescriptorSetLayout> = desc.set_layouts
            .iter()
            .map(|layout| handle(layout.raw()))
            .collect();

        let push_constant_ranges: Vec<vk::PushConstantRange> = desc.push_constant_ranges
            .iter()
            .map(|range| vk::PushConstantRange {
                stage_flags: stage_flags_to_vk(range.stages),
                offset: range.offset,
                size: range.size,
            })
            .collect();

        let create_info = vk::PipelineLayoutCreateInfo::default()
            .set_layouts(&set_layouts)
            .push_constant_ranges(&push_constant_ranges);

        let layout = unsafe { self.context.device.create_pipeline_layout(&create_info, None) }
            .map_err(|e| vk_error("Failed to create pipeline layout", e))?;
        Ok(PipelineLayoutHandle(layout.as_raw()))
    }

    fn create_graphics_pipeline(
        &mut self,
        desc: &GraphicsPipelineDesc,
        render_pass: RenderPassHandle,
    ) -> Result<PipelineHandle> {
        let entry_points = desc.stages
            .iter()
            .map(|stage| CString::new(stage.entry_point.as_str()))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::InvalidResource(format!("invalid shader entry point: {}", e)))?;

        let shader_stages: Vec<vk::PipelineShaderStageCreateInfo> = desc.stages
            .iter()
            .zip(&entry_points)
            .map(|(stage, entry_point)| {
                vk::PipelineShaderStageCreateInfo::default()
                    .stage(shader_stage_to_vk(stage.stage))
                    .module(handle(stage.module.raw()))
                    .name(entry_point)
            })
            .collect();

        // Vertex input state
        let vertex_bindings: Vec<vk::VertexInputBindingDescription> = desc.vertex_layout.bindings
            .iter()
            .map(|binding| vk::VertexInputBindingDescription {
                binding: binding.binding,
                stride: binding.stride,
                input_rate: vertex_input_rate_to_vk(binding.input_rate),
            })
            .collect();

        let vertex_attributes: Vec<vk::VertexInputAttributeDescription> = desc.vertex_layout.attributes
            .iter()
            .map(|attribute| vk::VertexInputAttributeDescription {
                location: attribute.location,
                binding: attribute.binding,
                format: buffer_format_to_vk(attribute.format),
                offset: attribute.offset,
            })
            .collect();

        let vertex_input_state = vk::PipelineVertexInputStateCreateInfo::default()
            .vertex_binding_descriptions(&vertex_bindings)
            .vertex_attribute_descriptions(&vertex_attributes);

        let input_assembly_state = vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(topology_to_vk(desc.topology))
            .primitive_restart_enable(false);

        // Viewport and scissor are dynamic; the baked values are overridden at render pass begin
        let viewports = [vk::Viewport {
            x: desc.viewport.x,
            y: desc.viewport.y,
            width: desc.viewport.width,
            height: desc.viewport.height,
            min_depth: desc.viewport.min_depth,
            max_depth: desc.viewport.max_depth,
        }];
        let scissors = [vk::Rect2D {
            offset: vk::Offset2D { x: desc.scissor.x, y: desc.scissor.y },
            extent: vk::Extent2D { width: desc.scissor.width, height: desc.scissor.height },
        }];
        let viewport_state = vk::PipelineViewportStateCreateInfo::default()
            .viewports(&viewports)
            .scissors(&scissors);

        let rasterization_state = vk::PipelineRasterizationStateCreateInfo::default()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(polygon_mode_to_vk(desc.rasterization.polygon_mode))
            .line_width(desc.rasterization.line_width)
            .cull_mode(cull_mode_to_vk(desc.rasterization.cull_mode))
            .front_face(front_face_to_vk(desc.rasterization.front_face))
            .depth_bias_enable(false);

        let depth_stencil_state = vk::PipelineDepthStencilStateCreateInfo::default()
            .depth_test_enable(desc.depth_stencil.depth_test_enable)
            .depth_write_enable(desc.depth_stencil.depth_write_enable)
            .depth_compare_op(compare_op_to_vk(desc.depth_stencil.depth_compare_op))
            .depth_bounds_test_enable(false)
            .stencil_test_enable(false)
            .min_depth_bounds(0.0)
            .max_depth_bounds(1.0);

        let multisample_state = vk::PipelineMultisampleStateCreateInfo::default()
            .rasterization_samples(sample_count_to_vk(desc.multisample.sample_count))
            .sample_shading_enable(desc.multisample.sample_shading)
            .min_sample_shading(desc.multisample.min_sample_shading)
            .alpha_to_coverage_enable(desc.multisample.alpha_to_coverage);

        let blend = &desc.color_blend;
        let color_blend_attachment = vk::PipelineColorBlendAttachmentState::default()
            .color_write_mask(color_write_mask_to_vk(&blend.color_write_mask))
            .blend_enable(blend.blend_enable)
            .src_color_blend_factor(blend_factor_to_vk(blend.src_color_factor))
            .dst_color_blend_factor(blend_factor_to_vk(blend.dst_color_factor))
            .color_blend_op(blend_op_to_vk(blend.color_blend_op))
            .src_alpha_blend_factor(blend_factor_to_vk(blend.src_alpha_factor))
            .dst_alpha_blend_factor(blend_factor_to_vk(blend.dst_alpha_factor))
            .alpha_blend_op(blend_op_to_vk(blend.alpha_blend_op));

        let color_blend_state = vk::PipelineColorBlendStateCreateInfo::default()
            .logic_op_enable(false)
            .attachments(std::slice::from_ref(&color_blend_attachment));

        let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic_state = vk::PipelineDynamicStateCreateInfo::default()
            .dynamic_states(&dynamic_states);

        let pipeline_create_info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&shader_stages)
            .vertex_input_state(&vertex_input_state)
            .input_assembly_state(&input_assembly_state)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization_state)
            .depth_stencil_state(&depth_stencil_state)
            .multisample_state(&multisample_state)
            .color_blend_state(&color_blend_state)
            .dynamic_state(&dynamic_state)
            .layout(handle(desc.layout.raw()))
            .render_pass(handle(render_pass.raw()))
            .subpass(0);

        let pipelines = unsafe {
            self.context.device.create_graphics_pipelines(
                vk::PipelineCache::null(),
                &[pipeline_create_info],
                None,
            )
        }
        .map_err(|(_, e)| vk_error("Failed to create graphics pipeline", e))?;

        pipelines
            .first()
            .map(|pipeline| PipelineHandle(pipeline.as_raw()))
            .ok_or_else(|| engine_err!("lumen::vulkan", "Driver returned no pipeline"))
    }

    // ===== DESCRIPTORS =====

    fn create_descriptor_set_layout(&mut self, bindings: &[DescriptorBinding]) -> Result<DescriptorSetLayoutHandle> {
        let vk_bindings: Vec<vk::DescriptorSetLayoutBinding> = bindings
            .iter()
            .map(|binding| {
                vk::DescriptorSetLayoutBinding::default()
                    .binding(binding.binding)
                    .descriptor_type(descriptor_type_to_vk(binding.descriptor_type))
                    .descriptor_count(1)
                    .stage_flags(stage_flags_to_vk(binding.stages))
            })
            .collect();

        let create_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(&vk_bindings);
        let layout = unsafe { self.context.device.create_descriptor_set_layout(&create_info, None) }
            .map_err(|e| vk_error("Failed to create descriptor set layout", e))?;
        Ok(DescriptorSetLayoutHandle(layout.as_raw()))
    }

    fn create_descriptor_pool(&mut self, max_sets: u32, sizes: &[DescriptorPoolSize]) -> Result<DescriptorPoolHandle> {
        let pool_sizes: Vec<vk::DescriptorPoolSize> = sizes
            .iter()
            .map(|size| vk::DescriptorPoolSize {
                ty: descriptor_type_to_vk(size.descriptor_type),
                descriptor_count: size.count,
            })
            .collect();

        let create_info = vk::DescriptorPoolCreateInfo::default()
            .pool_sizes(&pool_sizes)
            .max_sets(max_sets);
        let pool = unsafe { self.context.device.create_descriptor_pool(&create_info, None) }
            .map_err(|e| vk_error("Failed to create descriptor pool", e))?;
        Ok(DescriptorPoolHandle(pool.as_raw()))
    }

    fn allocate_descriptor_set(
        &mut self,
        pool: DescriptorPoolHandle,
        layout: DescriptorSetLayoutHandle,
    ) -> Result<DescriptorSetHandle> {
        let set_layouts = [handle::<vk::DescriptorSetLayout>(layout.raw())];
        let allocate_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(handle(pool.raw()))
            .set_layouts(&set_layouts);

        let sets = unsafe { self.context.device.allocate_descriptor_sets(&allocate_info) }
            .map_err(|e| vk_error("Failed to allocate descriptor set", e))?;
        sets.first()
            .map(|set| DescriptorSetHandle(set.as_raw()))
            .ok_or_else(|| engine_err!("lumen::vulkan", "Driver returned no descriptor set"))
    }

    fn update_descriptor_set(&self, set: DescriptorSetHandle, writes: &[DescriptorWrite]) -> Result<()> {
        let buffer_infos: Vec<vk::DescriptorBufferInfo> = writes
            .iter()
            .map(|write| match write.resource {
                DescriptorResource::Buffer { buffer, offset, range } => vk::DescriptorBufferInfo {
                    buffer: handle(buffer.raw()),
                    offset,
                    range,
                },
                DescriptorResource::Image { .. } => vk::DescriptorBufferInfo::default(),
            })
            .collect();

        let image_infos: Vec<vk::DescriptorImageInfo> = writes
            .iter()
            .map(|write| match write.resource {
                DescriptorResource::Image { view, sampler } => vk::DescriptorImageInfo {
                    sampler: handle(sampler.raw()),
                    image_view: handle(view.raw()),
                    image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                },
                DescriptorResource::Buffer { .. } => vk::DescriptorImageInfo::default(),
            })
            .collect();

        let vk_writes: Vec<vk::WriteDescriptorSet> = writes
            .iter()
            .enumerate()
            .map(|(i, write)| {
                let vk_write = vk::WriteDescriptorSet::default()
                    .dst_set(handle(set.raw()))
                    .dst_binding(write.binding)
                    .dst_array_element(0)
                    .descriptor_type(descriptor_type_to_vk(write.descriptor_type));
                match write.resource {
                    DescriptorResource::Buffer { .. } => {
                        vk_write.buffer_info(std::slice::from_ref(&buffer_infos[i]))
                    }
                    DescriptorResource::Image { .. } => {
                        vk_write.image_info(std::slice::from_ref(&image_infos[i]))
                    }
                }
            })
            .collect();

        unsafe { self.context.device.update_descriptor_sets(&vk_writes, &[]) };
        Ok(())
    }

    // ===== SYNCHRONIZATION =====

    fn create_fence(&mut self, signaled: bool) -> Result<FenceHandle> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };
        let create_info = vk::FenceCreateInfo::default().flags(flags);
        let fence = unsafe { self.context.device.create_fence(&create_info, None) }
            .map_err(|e| vk_error("Failed to create fence", e))?;
        Ok(FenceHandle(fence.as_raw()))
    }

    fn create_semaphore(&mut self) -> Result<SemaphoreHandle> {
        let create_info = vk::SemaphoreCreateInfo::default();
        let semaphore = unsafe { self.context.device.create_semaphore(&create_info, None) }
            .map_err(|e| vk_error("Failed to create semaphore", e))?;
        Ok(SemaphoreHandle(semaphore.as_raw()))
    }

    fn wait_for_fence(&self, fence: FenceHandle, timeout_ns: u64) -> Result<()> {
        let fences = [handle::<vk::Fence>(fence.raw())];
        match unsafe { self.context.device.wait_for_fences(&fences, true, timeout_ns) } {
            Ok(()) => Ok(()),
            Err(vk::Result::TIMEOUT) => {
                engine_error!("lumen::vulkan", "Fence {:#x} not signaled within {} ns", fence.raw(), timeout_ns);
                Err(Error::Timeout(format!("fence wait exceeded {} ns", timeout_ns)))
            }
            Err(e) => Err(vk_error("Failed to wait for fence", e)),
        }
    }

    fn reset_fence(&self, fence: FenceHandle) -> Result<()> {
        let fences = [handle::<vk::Fence>(fence.raw())];
        unsafe { self.context.device.reset_fences(&fences) }
            .map_err(|e| vk_error("Failed to reset fence", e))
    }

    fn wait_idle(&self) -> Result<()> {
        unsafe { self.context.device.device_wait_idle() }
            .map_err(|e| vk_error("Failed to wait idle", e))
    }

    // ===== COMMANDS =====

    fn create_command_pool(&mut self) -> Result<CommandPoolHandle> {
        let create_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(self.context.graphics_queue_family)
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
        let pool = unsafe { self.context.device.create_command_pool(&create_info, None) }
            .map_err(|e| vk_error("Failed to create command pool", e))?;
        Ok(CommandPoolHandle(pool.as_raw()))
    }

    fn allocate_command_buffer(&mut self, pool: CommandPoolHandle) -> Result<CommandBufferHandle> {
        let allocate_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(handle(pool.raw()))
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);
        let buffers = unsafe { self.context.device.allocate_command_buffers(&allocate_info) }
            .map_err(|e| vk_error("Failed to allocate command buffer", e))?;
        buffers
            .first()
            .map(|cmd| CommandBufferHandle(cmd.as_raw()))
            .ok_or_else(|| engine_err!("lumen::vulkan", "Driver returned no command buffer"))
    }

    fn reset_command_buffer(&self, cmd: CommandBufferHandle) -> Result<()> {
        unsafe {
            self.context.device.reset_command_buffer(handle(cmd.raw()), vk::CommandBufferResetFlags::empty())
        }
        .map_err(|e| vk_error("Failed to reset command buffer", e))
    }

    fn begin_command_buffer(&self, cmd: CommandBufferHandle, one_time_submit: bool) -> Result<()> {
        let flags = if one_time_submit {
            vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT
        } else {
            vk::CommandBufferUsageFlags::empty()
        };
        let begin_info = vk::CommandBufferBeginInfo::default().flags(flags);
        unsafe { self.context.device.begin_command_buffer(handle(cmd.raw()), &begin_info) }
            .map_err(|e| vk_error("Failed to begin command buffer", e))
    }

    fn end_command_buffer(&self, cmd: CommandBufferHandle) -> Result<()> {
        unsafe { self.context.device.end_command_buffer(handle(cmd.raw())) }
            .map_err(|e| vk_error("Failed to end command buffer", e))
    }

    fn submit(&self, desc: &SubmitDesc<'_>) -> Result<()> {
        let command_buffers: Vec<vk::CommandBuffer> = desc.command_buffers
            .iter()
            .map(|cmd| handle(cmd.raw()))
            .collect();
        let wait_semaphores: Vec<vk::Semaphore> = desc.wait_semaphores
            .iter()
            .map(|(semaphore, _)| handle(semaphore.raw()))
            .collect();
        let wait_stages: Vec<vk::PipelineStageFlags> = desc.wait_semaphores
            .iter()
            .map(|(_, stage)| pipeline_stage_to_vk(*stage))
            .collect();
        let signal_semaphores: Vec<vk::Semaphore> = desc.signal_semaphores
            .iter()
            .map(|semaphore| handle(semaphore.raw()))
            .collect();

        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        let fence = desc.fence
            .map(|fence| handle::<vk::Fence>(fence.raw()))
            .unwrap_or_else(vk::Fence::null);

        unsafe {
            self.context.device.queue_submit(self.context.graphics_queue, &[submit_info], fence)
        }
        .map_err(|e| vk_error("Failed to submit commands to GPU queue", e))
    }

    // ===== TEARDOWN =====

    fn destroy_resource(&mut self, resource: Resource) {
        let context = Arc::clone(&self.context);
        let device = &context.device;
        unsafe {
            match resource {
                Resource::Buffer(buffer) => {
                    device.destroy_buffer(handle(buffer.buffer.raw()), None);
                    self.free_allocation(buffer.allocation);
                }
                Resource::Image(image) => {
                    device.destroy_image(handle(image.image.raw()), None);
                    self.free_allocation(image.allocation);
                }
                Resource::ImageView(view) => device.destroy_image_view(handle(view.raw()), None),
                Resource::Sampler(sampler) => device.destroy_sampler(handle(sampler.raw()), None),
                Resource::ShaderModule(module) => device.destroy_shader_module(handle(module.raw()), None),
                Resource::Pipeline(pipeline) => device.destroy_pipeline(handle(pipeline.raw()), None),
                Resource::PipelineLayout(layout) => device.destroy_pipeline_layout(handle(layout.raw()), None),
                Resource::DescriptorSetLayout(layout) => {
                    device.destroy_descriptor_set_layout(handle(layout.raw()), None)
                }
                Resource::DescriptorPool(pool) => device.destroy_descriptor_pool(handle(pool.raw()), None),
                Resource::Fence(fence) => device.destroy_fence(handle(fence.raw()), None),
                Resource::Semaphore(semaphore) => device.destroy_semaphore(handle(semaphore.raw()), None),
                Resource::CommandPool(pool) => device.destroy_command_pool(handle(pool.raw()), None),
            }
        }
    }

    // ===== RECORDING =====

    fn cmd_begin_render_pass(&self, cmd: CommandBufferHandle, begin: &RenderPassBegin<'_>) {
        let device = &self.context.device;
        let cmd: vk::CommandBuffer = handle(cmd.raw());
        let clear_values: Vec<vk::ClearValue> = begin.clear_values.iter().map(clear_value_to_vk).collect();
        let extent = vk::Extent2D {
            width: begin.extent.width,
            height: begin.extent.height,
        };

        let begin_info = vk::RenderPassBeginInfo::default()
            .render_pass(handle(begin.render_pass.raw()))
            .framebuffer(handle(begin.framebuffer.raw()))
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent,
            })
            .clear_values(&clear_values);

        let viewport = vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        };
        let scissor = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent,
        };

        unsafe {
            device.cmd_begin_render_pass(cmd, &begin_info, vk::SubpassContents::INLINE);
            device.cmd_set_viewport(cmd, 0, &[viewport]);
            device.cmd_set_scissor(cmd, 0, &[scissor]);
        }
    }

    fn cmd_end_render_pass(&self, cmd: CommandBufferHandle) {
        unsafe { self.context.device.cmd_end_render_pass(handle(cmd.raw())) }
    }

    fn cmd_bind_pipeline(&self, cmd: CommandBufferHandle, pipeline: PipelineHandle) {
        unsafe {
            self.context.device.cmd_bind_pipeline(
                handle(cmd.raw()),
                vk::PipelineBindPoint::GRAPHICS,
                handle(pipeline.raw()),
            )
        }
    }

    fn cmd_bind_descriptor_set(
        &self,
        cmd: CommandBufferHandle,
        layout: PipelineLayoutHandle,
        set_index: u32,
        set: DescriptorSetHandle,
        dynamic_offsets: &[u32],
    ) {
        unsafe {
            self.context.device.cmd_bind_descriptor_sets(
                handle(cmd.raw()),
                vk::PipelineBindPoint::GRAPHICS,
                handle(layout.raw()),
                set_index,
                &[handle(set.raw())],
                dynamic_offsets,
            )
        }
    }

    fn cmd_bind_vertex_buffer(&self, cmd: CommandBufferHandle, buffer: BufferHandle, offset: u64) {
        unsafe {
            self.context.device.cmd_bind_vertex_buffers(
                handle(cmd.raw()),
                0,
                &[handle(buffer.raw())],
                &[offset],
            )
        }
    }

    fn cmd_bind_index_buffer(&self, cmd: CommandBufferHandle, buffer: BufferHandle, offset: u64, index_type: IndexType) {
        unsafe {
            self.context.device.cmd_bind_index_buffer(
                handle(cmd.raw()),
                handle(buffer.raw()),
                offset,
                index_type_to_vk(index_type),
            )
        }
    }

    fn cmd_push_constants(
        &self,
        cmd: CommandBufferHandle,
        layout: PipelineLayoutHandle,
        stages: ShaderStageFlags,
        offset: u32,
        data: &[u8],
    ) {
        unsafe {
            self.context.device.cmd_push_constants(
                handle(cmd.raw()),
                handle(layout.raw()),
                stage_flags_to_vk(stages),
                offset,
                data,
            )
        }
    }

    fn cmd_draw(&self, cmd: CommandBufferHandle, vertex_count: u32, instance_count: u32, first_vertex: u32, first_instance: u32) {
        unsafe {
            self.context.device.cmd_draw(handle(cmd.raw()), vertex_count, instance_count, first_vertex, first_instance)
        }
    }

    fn cmd_draw_indexed(
        &self,
        cmd: CommandBufferHandle,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    ) {
        unsafe {
            self.context.device.cmd_draw_indexed(
                handle(cmd.raw()),
                index_count,
                instance_count,
                first_index,
                vertex_offset,
                first_instance,
            )
        }
    }

    fn cmd_copy_buffer(&self, cmd: CommandBufferHandle, src: BufferHandle, dst: BufferHandle, regions: &[BufferCopy]) {
        let vk_regions: Vec<vk::BufferCopy> = regions
            .iter()
            .map(|region| vk::BufferCopy {
                src_offset: region.src_offset,
                dst_offset: region.dst_offset,
                size: region.size,
            })
            .collect();
        unsafe {
            self.context.device.cmd_copy_buffer(handle(cmd.raw()), handle(src.raw()), handle(dst.raw()), &vk_regions)
        }
    }

    fn cmd_copy_buffer_to_image(&self, cmd: CommandBufferHandle, src: BufferHandle, dst: &AllocatedImage) {
        let region = vk::BufferImageCopy {
            buffer_offset: 0,
            buffer_row_length: 0,
            buffer_image_height: 0,
            image_subresource: vk::ImageSubresourceLayers {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                mip_level: 0,
                base_array_layer: 0,
                layer_count: 1,
            },
            image_offset: vk::Offset3D { x: 0, y: 0, z: 0 },
            image_extent: vk::Extent3D {
                width: dst.extent.width,
                height: dst.extent.height,
                depth: 1,
            },
        };
        unsafe {
            self.context.device.cmd_copy_buffer_to_image(
                handle(cmd.raw()),
                handle(src.raw()),
                handle(dst.image.raw()),
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &[region],
            )
        }
    }

    fn cmd_transition_image_layout(
        &self,
        cmd: CommandBufferHandle,
        image: &AllocatedImage,
        old_layout: ImageLayout,
        new_layout: ImageLayout,
    ) {
        let (src_access, src_stage) = layout_access(old_layout);
        let (dst_access, dst_stage) = layout_access(new_layout);
        let aspect_mask = if image.format.is_depth() {
            vk::ImageAspectFlags::DEPTH
        } else {
            vk::ImageAspectFlags::COLOR
        };

        let barrier = vk::ImageMemoryBarrier::default()
            .old_layout(image_layout_to_vk(old_layout))
            .new_layout(image_layout_to_vk(new_layout))
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(handle(image.image.raw()))
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            })
            .src_access_mask(src_access)
            .dst_access_mask(dst_access);

        unsafe {
            self.context.device.cmd_pipeline_barrier(
                handle(cmd.raw()),
                src_stage,
                dst_stage,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[barrier],
            );
        }
    }
}

impl Drop for VulkanDevice {
    fn drop(&mut self) {
        unsafe {
            self.context.device.device_wait_idle().ok();
        }

        // Anything still tracked was never handed to a deletion queue
        if !self.allocations.is_empty() {
            engine_warn!(
                "lumen::vulkan",
                "{} GPU allocation(s) still live at device drop, freeing memory",
                self.allocations.len()
            );
            let leftover: Vec<Allocation> = self.allocations.drain().map(|(_, allocation)| allocation).collect();
            for allocation in leftover {
                self.release_allocation(allocation);
            }
        }
    }
}
