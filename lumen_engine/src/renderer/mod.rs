/// Renderer module - frame orchestration on top of a GraphicsDevice

// Module declarations
pub mod deletion_queue;
pub mod uniform_layout;
pub mod gpu_data;
pub mod frame;
pub mod upload;
pub mod pipeline_builder;
pub mod shader;
pub mod render_context;

pub use deletion_queue::DeletionQueue;
pub use uniform_layout::{pad_uniform_buffer_size, DynamicUniformLayout};
pub use gpu_data::{CameraData, MeshPushConstants, ObjectData, SceneData};
pub use frame::{slot_index, FrameSlot, FrameSlotDesc, FrameState, GlobalUniformLayout, FRAME_OVERLAP};
pub use upload::{upload_buffer, upload_image, UploadContext};
pub use pipeline_builder::PipelineBuilder;
pub use shader::{load_shader_module, parse_spirv, SPIRV_MAGIC};
pub use render_context::{FrameOutcome, RenderContext, RenderStats};
