//! Scene-side drawing: render objects and the per-frame draw loop

pub mod render_object;
pub mod drawer;

pub use render_object::{sort_render_objects, RenderObject};
pub use drawer::{draw_objects, DrawStats, FrameBindings, GLOBAL_SET, OBJECT_SET, TEXTURE_SET};
