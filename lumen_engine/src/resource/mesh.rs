/// GPU-resident meshes

use bytemuck::{Pod, Zeroable};
use glam::Vec3;
use crate::graphics_device::{
    AllocatedBuffer, BufferFormat, IndexType, VertexAttribute, VertexBinding, VertexInputRate,
    VertexLayout,
};
use crate::resource::registry::define_registry_id;

define_registry_id!(
    /// Index of a mesh in the mesh registry
    MeshId,
);

/// Interleaved vertex as consumed by the mesh pipelines
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub color: Vec3,
}

impl Vertex {
    pub fn new(position: Vec3, normal: Vec3, color: Vec3) -> Self {
        Self { position, normal, color }
    }

    /// Single binding, locations 0..=2 = position, normal, color
    pub fn layout() -> VertexLayout {
        let stride = std::mem::size_of::<Vertex>() as u32;
        let attribute = |location: u32, offset: u32| VertexAttribute {
            location,
            binding: 0,
            format: BufferFormat::R32G32B32_SFLOAT,
            offset,
        };
        VertexLayout {
            bindings: vec![VertexBinding {
                binding: 0,
                stride,
                input_rate: VertexInputRate::Vertex,
            }],
            attributes: vec![attribute(0, 0), attribute(1, 12), attribute(2, 24)],
        }
    }
}

/// Index buffer of a mesh
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeshIndices {
    pub buffer: AllocatedBuffer,
    pub count: u32,
    pub index_type: IndexType,
}

/// Immutable GPU geometry: vertex buffer, optional index buffer, vertex count
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mesh {
    pub vertex_buffer: AllocatedBuffer,
    pub index_buffer: Option<MeshIndices>,
    pub vertex_count: u32,
}

impl Mesh {
    pub fn is_indexed(&self) -> bool {
        self.index_buffer.is_some()
    }

    /// Number of elements one draw of this mesh consumes
    pub fn element_count(&self) -> u32 {
        self.index_buffer.map_or(self.vertex_count, |indices| indices.count)
    }
}

#[cfg(test)]
#[path = "mesh_tests.rs"]
mod tests;
