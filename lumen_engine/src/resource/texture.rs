/// Sampled textures

use crate::graphics_device::{AllocatedImage, DescriptorSetHandle, ImageViewHandle, SamplerHandle};
use crate::resource::registry::define_registry_id;

define_registry_id!(
    /// Index of a texture in the texture registry
    TextureId,
);

/// Image + view pair, plus the sampler and descriptor set materials bind it with
///
/// All GPU objects are registered for teardown by the code that created them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Texture {
    pub image: AllocatedImage,
    pub view: ImageViewHandle,
    pub sampler: SamplerHandle,
    /// Set 2 descriptor pointing at this texture
    pub descriptor_set: DescriptorSetHandle,
}
