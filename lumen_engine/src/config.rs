/// Renderer configuration
///
/// Host-visible knobs: window size, which shader variant the demo scene uses,
/// and the bounds of the blocking waits on the frame path.

use crate::graphics_device::Extent2D;

#[derive(Debug, Clone)]
pub struct Config {
    /// Application name reported to the driver
    pub app_name: String,

    /// Initial window / swapchain extent
    pub window_extent: Extent2D,

    /// Index of the active shader variant
    pub selected_shader: usize,

    /// Enable Vulkan validation layers (requires the `vulkan-validation` backend feature)
    pub enable_validation: bool,

    /// Bound on the per-frame fence wait, in nanoseconds
    pub fence_timeout_ns: u64,

    /// Bound on the swapchain image acquire, in nanoseconds
    pub acquire_timeout_ns: u64,

    /// Bound on immediate-submit waits, in nanoseconds
    pub upload_timeout_ns: u64,

    /// Clear color of the main pass
    pub clear_color: [f32; 4],

    /// Capacity of the per-frame object buffer
    pub max_objects: u32,

    /// Capacity of the engine descriptor pool
    pub max_descriptor_sets: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_name: "Lumen Application".to_string(),
            window_extent: Extent2D::new(1700, 900),
            selected_shader: 0,
            enable_validation: cfg!(debug_assertions),
            fence_timeout_ns: 1_000_000_000,
            acquire_timeout_ns: 1_000_000_000,
            upload_timeout_ns: 9_999_999_999,
            clear_color: [0.0, 0.0, 0.1, 1.0],
            max_objects: 10_000,
            max_descriptor_sets: 64,
        }
    }
}
