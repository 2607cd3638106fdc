/// Materials: a pipeline plus the state it is bound with

use crate::graphics_device::{DescriptorSetHandle, PipelineHandle, PipelineLayoutHandle};
use crate::resource::registry::define_registry_id;

define_registry_id!(
    /// Index of a material in the material registry
    MaterialId,
);

/// Immutable (pipeline, layout) pair, shared by any number of render objects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Material {
    pub pipeline: PipelineHandle,
    pub pipeline_layout: PipelineLayoutHandle,
    /// Bound at set 2 when present
    pub texture_set: Option<DescriptorSetHandle>,
}

impl Material {
    pub fn new(pipeline: PipelineHandle, pipeline_layout: PipelineLayoutHandle) -> Self {
        Self {
            pipeline,
            pipeline_layout,
            texture_set: None,
        }
    }

    pub fn with_texture_set(mut self, set: DescriptorSetHandle) -> Self {
        self.texture_set = Some(set);
        self
    }
}
