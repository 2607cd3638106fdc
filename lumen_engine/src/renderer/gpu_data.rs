/// Host-side mirrors of the shader uniform and push constant blocks
///
/// All layouts are `#[repr(C)]` and only contain 16-byte-aligned glam types,
/// so they match std140 without manual padding.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec4};

/// Camera matrices (set 0, binding 0)
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct CameraData {
    pub view: Mat4,
    pub proj: Mat4,
    pub view_proj: Mat4,
}

impl CameraData {
    /// Build from view and projection, computing `view_proj`
    pub fn new(view: Mat4, proj: Mat4) -> Self {
        Self {
            view,
            proj,
            view_proj: proj * view,
        }
    }

    /// Right-handed perspective camera with Vulkan's flipped clip-space Y
    pub fn perspective(eye: glam::Vec3, target: glam::Vec3, fov_y_radians: f32, aspect: f32) -> Self {
        let view = Mat4::look_at_rh(eye, target, glam::Vec3::Y);
        let mut proj = Mat4::perspective_rh(fov_y_radians, aspect, 0.1, 200.0);
        proj.y_axis.y *= -1.0;
        Self::new(view, proj)
    }
}

impl Default for CameraData {
    fn default() -> Self {
        Self::new(Mat4::IDENTITY, Mat4::IDENTITY)
    }
}

/// Global lighting parameters (set 0, binding 1)
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct SceneData {
    pub fog_color: Vec4,
    /// x = min, y = max, zw unused
    pub fog_distances: Vec4,
    pub ambient_color: Vec4,
    /// w = sun power
    pub sunlight_direction: Vec4,
    pub sunlight_color: Vec4,
}

impl Default for SceneData {
    fn default() -> Self {
        Self {
            fog_color: Vec4::ZERO,
            fog_distances: Vec4::ZERO,
            ambient_color: Vec4::new(0.1, 0.1, 0.1, 1.0),
            sunlight_direction: Vec4::new(0.0, -1.0, 0.0, 1.0),
            sunlight_color: Vec4::ONE,
        }
    }
}

/// Per-object record of the dynamic uniform buffer (set 1, binding 0)
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ObjectData {
    pub model: Mat4,
}

/// Per-draw push constant block
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct MeshPushConstants {
    pub data: Vec4,
    pub render_matrix: Mat4,
}
