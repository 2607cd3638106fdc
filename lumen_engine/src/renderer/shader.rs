/// SPIR-V shader module loading
///
/// A missing or malformed shader file is reported as `ShaderLoadFailed`, which
/// is not fatal by itself: the caller decides whether to fall back to another
/// variant or abort.

use std::path::Path;
use crate::error::{Error, Result};
use crate::graphics_device::{GraphicsDevice, ShaderModuleHandle};

/// First word of every SPIR-V binary
pub const SPIRV_MAGIC: u32 = 0x0723_0203;

/// Decode a SPIR-V binary into 32-bit words
///
/// Accepts both byte orders (the magic number tells which one was used).
pub fn parse_spirv(bytes: &[u8]) -> Result<Vec<u32>> {
    if bytes.is_empty() || bytes.len() % 4 != 0 {
        return Err(Error::ShaderLoadFailed(format!(
            "SPIR-V size must be a non-zero multiple of 4, got {} bytes",
            bytes.len()
        )));
    }

    let little: Vec<u32> = bytes
        .chunks_exact(4)
        .map(|w| u32::from_le_bytes([w[0], w[1], w[2], w[3]]))
        .collect();

    if little[0] == SPIRV_MAGIC {
        Ok(little)
    } else if little[0].swap_bytes() == SPIRV_MAGIC {
        Ok(little.into_iter().map(u32::swap_bytes).collect())
    } else {
        Err(Error::ShaderLoadFailed(format!(
            "bad SPIR-V magic number 0x{:08x}",
            little[0]
        )))
    }
}

/// Read the SPIR-V file at `path` and create a shader module from it
///
/// The module is owned by the caller; it is only needed until the pipelines
/// using it have been built.
pub fn load_shader_module(device: &mut dyn GraphicsDevice, path: impl AsRef<Path>) -> Result<ShaderModuleHandle> {
    let path = path.as_ref();

    let bytes = std::fs::read(path).map_err(|e| {
        crate::engine_warn!("lumen::Shader", "Cannot read shader '{}': {}", path.display(), e);
        Error::ShaderLoadFailed(format!("{}: {}", path.display(), e))
    })?;

    let words = parse_spirv(&bytes).map_err(|e| {
        crate::engine_warn!("lumen::Shader", "Invalid shader '{}': {}", path.display(), e);
        e
    })?;

    let module = device.create_shader_module(&words).map_err(|e| {
        crate::engine_warn!("lumen::Shader", "Shader module creation failed for '{}': {}", path.display(), e);
        Error::ShaderLoadFailed(format!("{}: {}", path.display(), e))
    })?;

    crate::engine_debug!("lumen::Shader", "Loaded shader '{}' ({} words)", path.display(), words.len());
    Ok(module)
}

#[cfg(test)]
#[path = "shader_tests.rs"]
mod tests;
