/// Graphics pipeline builder
///
/// Plain configuration: accumulates stage and fixed-function state, then asks
/// the device for one pipeline compatible with a given render pass. Holds no
/// GPU resources and can be dropped (or reused for a variant) after `build`.

use crate::error::{Error, Result};
use crate::graphics_device::{
    ColorBlendState, CullMode, DepthStencilState, Extent2D, GraphicsDevice, GraphicsPipelineDesc,
    MultisampleState, PipelineHandle, PipelineLayoutHandle, PolygonMode, PrimitiveTopology,
    RasterizationState, Rect2D, RenderPassHandle, ShaderModuleHandle, ShaderStage, ShaderStageDesc,
    VertexLayout, Viewport,
};

#[derive(Debug, Clone)]
pub struct PipelineBuilder {
    pub shader_stages: Vec<ShaderStageDesc>,
    pub vertex_input: VertexLayout,
    pub topology: PrimitiveTopology,
    pub viewport: Viewport,
    pub scissor: Rect2D,
    pub rasterizer: RasterizationState,
    pub color_blend_attachment: ColorBlendState,
    pub multisampling: MultisampleState,
    pub depth_stencil: DepthStencilState,
    pub pipeline_layout: Option<PipelineLayoutHandle>,
}

impl PipelineBuilder {
    /// Builder with full-extent viewport/scissor and default fixed-function state
    ///
    /// Defaults: triangle list, filled polygons without culling, one opaque
    /// blend attachment writing RGBA, single sample, depth test off.
    pub fn new(extent: Extent2D) -> Self {
        Self {
            shader_stages: Vec::new(),
            vertex_input: VertexLayout::default(),
            topology: PrimitiveTopology::TriangleList,
            viewport: Viewport {
                x: 0.0,
                y: 0.0,
                width: extent.width as f32,
                height: extent.height as f32,
                min_depth: 0.0,
                max_depth: 1.0,
            },
            scissor: Rect2D {
                x: 0,
                y: 0,
                width: extent.width,
                height: extent.height,
            },
            rasterizer: RasterizationState::default(),
            color_blend_attachment: ColorBlendState::default(),
            multisampling: MultisampleState::default(),
            depth_stencil: DepthStencilState::default(),
            pipeline_layout: None,
        }
    }

    /// Append a programmable stage with entry point "main"
    pub fn add_stage(mut self, stage: ShaderStage, module: ShaderModuleHandle) -> Self {
        self.shader_stages.push(ShaderStageDesc {
            stage,
            module,
            entry_point: "main".to_string(),
        });
        self
    }

    /// Drop all stages (to reuse the builder for another shader pair)
    pub fn clear_stages(mut self) -> Self {
        self.shader_stages.clear();
        self
    }

    pub fn vertex_input(mut self, layout: VertexLayout) -> Self {
        self.vertex_input = layout;
        self
    }

    pub fn topology(mut self, topology: PrimitiveTopology) -> Self {
        self.topology = topology;
        self
    }

    pub fn polygon_mode(mut self, mode: PolygonMode) -> Self {
        self.rasterizer.polygon_mode = mode;
        self
    }

    pub fn cull_mode(mut self, mode: CullMode) -> Self {
        self.rasterizer.cull_mode = mode;
        self
    }

    pub fn color_blend(mut self, state: ColorBlendState) -> Self {
        self.color_blend_attachment = state;
        self
    }

    pub fn multisampling(mut self, state: MultisampleState) -> Self {
        self.multisampling = state;
        self
    }

    pub fn depth_stencil(mut self, state: DepthStencilState) -> Self {
        self.depth_stencil = state;
        self
    }

    pub fn layout(mut self, layout: PipelineLayoutHandle) -> Self {
        self.pipeline_layout = Some(layout);
        self
    }

    /// Viewport and scissor covering `extent`
    pub fn extent(mut self, extent: Extent2D) -> Self {
        let fresh = Self::new(extent);
        self.viewport = fresh.viewport;
        self.scissor = fresh.scissor;
        self
    }

    /// Check the accumulated state and produce the device-facing description
    pub fn desc(&self) -> Result<GraphicsPipelineDesc> {
        if self.shader_stages.is_empty() {
            return Err(Error::InvalidResource("pipeline has no shader stages".to_string()));
        }

        let vertex_stages = self
            .shader_stages
            .iter()
            .filter(|s| s.stage == ShaderStage::Vertex)
            .count();
        if vertex_stages != 1 {
            return Err(Error::InvalidResource(format!(
                "pipeline needs exactly one vertex stage, got {}",
                vertex_stages
            )));
        }

        let layout = self
            .pipeline_layout
            .ok_or_else(|| Error::InvalidResource("pipeline has no layout".to_string()))?;

        if self.viewport.width <= 0.0 || self.viewport.height <= 0.0 {
            return Err(Error::InvalidResource(format!(
                "pipeline viewport is empty ({}x{})",
                self.viewport.width, self.viewport.height
            )));
        }

        Ok(GraphicsPipelineDesc {
            stages: self.shader_stages.clone(),
            vertex_layout: self.vertex_input.clone(),
            topology: self.topology,
            viewport: self.viewport,
            scissor: self.scissor,
            rasterization: self.rasterizer,
            color_blend: self.color_blend_attachment,
            multisample: self.multisampling,
            depth_stencil: self.depth_stencil,
            layout,
        })
    }

    /// Validate and create the pipeline for `render_pass`
    ///
    /// The caller owns the returned pipeline and is expected to register it
    /// for teardown.
    pub fn build(&self, device: &mut dyn GraphicsDevice, render_pass: RenderPassHandle) -> Result<PipelineHandle> {
        let desc = self.desc().map_err(|e| {
            crate::engine_error!("lumen::PipelineBuilder", "Invalid pipeline state: {}", e);
            e
        })?;

        let pipeline = device.create_graphics_pipeline(&desc, render_pass).map_err(|e| {
            crate::engine_error!("lumen::PipelineBuilder", "Failed to create graphics pipeline: {}", e);
            e
        })?;

        crate::engine_debug!(
            "lumen::PipelineBuilder",
            "Created pipeline {} ({} stages, {:?})",
            pipeline.raw(),
            desc.stages.len(),
            desc.topology
        );
        Ok(pipeline)
    }
}

#[cfg(test)]
#[path = "pipeline_builder_tests.rs"]
mod tests;
