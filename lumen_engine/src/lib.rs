/*!
# Lumen Engine

Frame-orchestration core of the Lumen real-time renderer.

This crate owns everything between "a list of objects to draw" and "commands
submitted to the GPU": the double-buffered frame protocol (fences and
semaphores), deferred teardown of GPU objects, pipeline construction, blocking
uploads, dynamic uniform layout and the bind-minimizing draw loop. It talks to
the GPU only through the [`GraphicsDevice`](graphics_device::GraphicsDevice)
and [`Swapchain`](graphics_device::Swapchain) traits; the Vulkan implementation
lives in `lumen_engine_renderer_vulkan`.

## Architecture

- **RenderContext**: explicitly constructed owner of every engine GPU object, drives `draw_frame`
- **FrameSlot**: one of the `FRAME_OVERLAP` per-frame states (sync, command buffer, uniforms)
- **DeletionQueue**: reverse-order release of GPU objects
- **PipelineBuilder**: declarative pipeline state
- **UploadContext**: blocking host-to-device transfers
- **Registries**: name-keyed materials, meshes and textures
- **Drawer**: per-frame draw loop with bind elision
*/

// Internal modules
mod error;
mod engine;
pub mod config;
pub mod log;
pub mod graphics_device;
pub mod renderer;
pub mod resource;
pub mod scene;

// Main lumen namespace module
pub mod lumen {
    // Error types
    pub use crate::error::{Error, Result};

    // Logging facade
    pub use crate::engine::Engine;

    pub use crate::config::Config;

    // Logging sub-module (types only, NOT macros)
    pub mod log {
        pub use crate::log::{Logger, LogEntry, LogSeverity, DefaultLogger};
    }

    // GPU-facing traits and the plain data they exchange
    pub mod device {
        pub use crate::graphics_device::*;
    }

    // Frame orchestration
    pub mod render {
        pub use crate::renderer::*;
    }

    // Resource registries
    pub mod resource {
        pub use crate::resource::*;
    }

    // Render objects and the draw loop
    pub mod scene {
        pub use crate::scene::*;
    }
}

// Re-export math library at crate root
pub use glam;
