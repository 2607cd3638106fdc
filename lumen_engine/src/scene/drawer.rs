/// Draw orchestration
///
/// Walks the frame's render objects once, in the given order, and records the
/// minimal set of binds: a pipeline is bound only when it differs from the
/// last one, a mesh's buffers only when the mesh changes, and the global
/// camera/scene set once per frame. Per-object data is addressed with a
/// dynamic offset into the slot's object buffer. Sorting the objects first
/// (see [`sort_render_objects`](crate::scene::sort_render_objects)) only
/// reduces the number of binds.

use glam::{Mat4, Vec4};
use crate::error::Result;
use crate::graphics_device::{
    AllocatedBuffer, CommandBufferHandle, DescriptorSetHandle, GraphicsDevice, PipelineHandle,
    ShaderStageFlags,
};
use crate::renderer::{DynamicUniformLayout, MeshPushConstants, ObjectData};
use crate::resource::{MaterialRegistry, MeshId, MeshRegistry};
use crate::scene::RenderObject;

/// Descriptor set index of the camera + scene uniforms
pub const GLOBAL_SET: u32 = 0;
/// Descriptor set index of the per-object dynamic uniform buffer
pub const OBJECT_SET: u32 = 1;
/// Descriptor set index of a material's texture
pub const TEXTURE_SET: u32 = 2;

/// Per-frame state the draw loop records against
#[derive(Debug, Clone, Copy)]
pub struct FrameBindings {
    pub command_buffer: CommandBufferHandle,
    pub global_set: DescriptorSetHandle,
    pub object_set: DescriptorSetHandle,
    pub object_buffer: AllocatedBuffer,
    pub object_layout: DynamicUniformLayout,
}

/// What one pass of the draw loop recorded
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrawStats {
    pub draw_calls: u32,
    pub pipeline_binds: u32,
    pub mesh_binds: u32,
    /// Objects not drawn (unknown mesh/material, or beyond the object buffer)
    pub skipped: u32,
}

/// Record the draws of `objects` into `frame.command_buffer`
///
/// Must be called inside the frame's render pass. Object `i` reads its model
/// matrix at `i * stride` of the object buffer.
pub fn draw_objects(
    device: &dyn GraphicsDevice,
    frame: &FrameBindings,
    objects: &[RenderObject],
    materials: &MaterialRegistry,
    meshes: &MeshRegistry,
    view_proj: Mat4,
) -> Result<DrawStats> {
    let mut stats = DrawStats::default();
    let cmd = frame.command_buffer;
    let capacity = frame.object_layout.capacity as usize;

    let object_data: Vec<ObjectData> = objects
        .iter()
        .take(capacity)
        .map(|object| ObjectData { model: object.transform })
        .collect();
    if !object_data.is_empty() {
        let bytes = frame.object_layout.pack(&object_data);
        device.write_buffer(&frame.object_buffer, 0, &bytes)?;
    }

    let mut last_pipeline: Option<PipelineHandle> = None;
    let mut last_mesh: Option<MeshId> = None;
    let mut last_texture_set: Option<DescriptorSetHandle> = None;
    let mut global_bound = false;

    for (index, object) in objects.iter().enumerate() {
        if index >= capacity {
            stats.skipped += (objects.len() - index) as u32;
            crate::engine_warn!(
                "lumen::Drawer",
                "{} objects exceed the per-frame capacity of {}, not drawn",
                objects.len() - index,
                capacity
            );
            break;
        }

        let (material, mesh) = match (
            materials.get_by_id(object.material),
            meshes.get_by_id(object.mesh),
        ) {
            (Some(material), Some(mesh)) => (material, mesh),
            _ => {
                crate::engine_warn!(
                    "lumen::Drawer",
                    "Skipping object {}: material {:?} or mesh {:?} not loaded",
                    index,
                    object.material,
                    object.mesh
                );
                stats.skipped += 1;
                continue;
            }
        };

        // In range for every index below capacity; checked when the layout was built
        let Some(dynamic_offset) = frame.object_layout.dynamic_offset(index as u32) else {
            stats.skipped += 1;
            continue;
        };

        if last_pipeline != Some(material.pipeline) {
            device.cmd_bind_pipeline(cmd, material.pipeline);
            last_pipeline = Some(material.pipeline);
            stats.pipeline_binds += 1;

            if !global_bound {
                device.cmd_bind_descriptor_set(cmd, material.pipeline_layout, GLOBAL_SET, frame.global_set, &[]);
                global_bound = true;
            }
        }

        device.cmd_bind_descriptor_set(
            cmd,
            material.pipeline_layout,
            OBJECT_SET,
            frame.object_set,
            &[dynamic_offset],
        );

        if let Some(texture_set) = material.texture_set {
            if last_texture_set != Some(texture_set) {
                device.cmd_bind_descriptor_set(cmd, material.pipeline_layout, TEXTURE_SET, texture_set, &[]);
                last_texture_set = Some(texture_set);
            }
        }

        if last_mesh != Some(object.mesh) {
            device.cmd_bind_vertex_buffer(cmd, mesh.vertex_buffer.buffer, 0);
            if let Some(indices) = mesh.index_buffer {
                device.cmd_bind_index_buffer(cmd, indices.buffer.buffer, 0, indices.index_type);
            }
            last_mesh = Some(object.mesh);
            stats.mesh_binds += 1;
        }

        let constants = MeshPushConstants {
            data: Vec4::ZERO,
            render_matrix: view_proj * object.transform,
        };
        device.cmd_push_constants(
            cmd,
            material.pipeline_layout,
            ShaderStageFlags::VERTEX,
            0,
            bytemuck::bytes_of(&constants),
        );

        match mesh.index_buffer {
            Some(indices) => device.cmd_draw_indexed(cmd, indices.count, 1, 0, 0, 0),
            None => device.cmd_draw(cmd, mesh.vertex_count, 1, 0, 0),
        }
        stats.draw_calls += 1;
    }

    Ok(stats)
}

#[cfg(test)]
#[path = "drawer_tests.rs"]
mod tests;
