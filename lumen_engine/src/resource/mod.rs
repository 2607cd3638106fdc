//! Resource registries
//!
//! Name-keyed tables of the GPU-ready assets render objects refer to.

pub mod registry;
pub mod material;
pub mod mesh;
pub mod texture;

pub use registry::{NamedRegistry, RegistryId};
pub use material::{Material, MaterialId};
pub use mesh::{Mesh, MeshId, MeshIndices, Vertex};
pub use texture::{Texture, TextureId};

pub type MaterialRegistry = NamedRegistry<MaterialId, Material>;
pub type MeshRegistry = NamedRegistry<MeshId, Mesh>;
pub type TextureRegistry = NamedRegistry<TextureId, Texture>;
