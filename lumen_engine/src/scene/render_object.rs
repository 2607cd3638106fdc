/// Render objects: what the draw loop iterates

use glam::Mat4;
use rdst::{RadixKey, RadixSort};
use crate::resource::{MaterialId, MeshId};

/// One drawable instance
///
/// Refers to its mesh and material by registry id and owns neither. Rebuilt
/// or mutated freely between frames.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderObject {
    pub mesh: MeshId,
    pub material: MaterialId,
    pub transform: Mat4,
}

impl RenderObject {
    pub fn new(mesh: MeshId, material: MaterialId, transform: Mat4) -> Self {
        Self { mesh, material, transform }
    }

    /// Material in the high half, mesh in the low half
    pub fn sort_key(&self) -> u64 {
        ((self.material.0 as u64) << 32) | self.mesh.0 as u64
    }
}

impl RadixKey for RenderObject {
    const LEVELS: usize = 8;

    fn get_level(&self, level: usize) -> u8 {
        (self.sort_key() >> (level * 8)) as u8
    }
}

/// Group objects by material, then mesh, to minimize binds
///
/// Purely an optimization: the draw loop gives the same image for any order.
pub fn sort_render_objects(objects: &mut [RenderObject]) {
    objects.radix_sort_unstable();
}

#[cfg(test)]
#[path = "render_object_tests.rs"]
mod tests;
