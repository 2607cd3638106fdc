/// Unit tests for SPIR-V loading

use std::path::PathBuf;
use crate::renderer::{load_shader_module, parse_spirv, SPIRV_MAGIC};
use crate::graphics_device::mock_graphics_device::MockGraphicsDevice;
use crate::error::Error;

fn spirv_bytes(extra_words: u32) -> Vec<u8> {
    let mut bytes = SPIRV_MAGIC.to_le_bytes().to_vec();
    for word in 0..extra_words {
        bytes.extend_from_slice(&word.to_le_bytes());
    }
    bytes
}

fn temp_shader(name: &str, bytes: &[u8]) -> PathBuf {
    let path = std::env::temp_dir().join(format!("lumen_{}_{}.spv", name, std::process::id()));
    std::fs::write(&path, bytes).unwrap();
    path
}

// ============================================================================
// PARSING
// ============================================================================

#[test]
fn test_parse_little_endian() {
    let words = parse_spirv(&spirv_bytes(3)).unwrap();
    assert_eq!(words, vec![SPIRV_MAGIC, 0, 1, 2]);
}

#[test]
fn test_parse_big_endian() {
    let mut bytes = SPIRV_MAGIC.to_be_bytes().to_vec();
    bytes.extend_from_slice(&7u32.to_be_bytes());

    let words = parse_spirv(&bytes).unwrap();

    assert_eq!(words, vec![SPIRV_MAGIC, 7]);
}

#[test]
fn test_parse_rejects_bad_length() {
    assert!(matches!(parse_spirv(&[]), Err(Error::ShaderLoadFailed(_))));
    assert!(matches!(parse_spirv(&[0x03, 0x02, 0x23]), Err(Error::ShaderLoadFailed(_))));
}

#[test]
fn test_parse_rejects_bad_magic() {
    assert!(matches!(parse_spirv(&[1, 2, 3, 4]), Err(Error::ShaderLoadFailed(_))));
}

// ============================================================================
// LOADING
// ============================================================================

#[test]
fn test_load_creates_module() {
    let mut device = MockGraphicsDevice::new();
    let path = temp_shader("ok", &spirv_bytes(5));

    let module = load_shader_module(&mut device, &path).unwrap();

    assert!(device.position(&format!("create_shader_module:{}:6", module.raw())).is_some());
    std::fs::remove_file(path).ok();
}

#[test]
fn test_missing_file_is_not_fatal() {
    let mut device = MockGraphicsDevice::new();

    let err = load_shader_module(&mut device, "/nonexistent/lumen/shader.spv").unwrap_err();

    assert!(matches!(err, Error::ShaderLoadFailed(_)));
    assert!(!err.is_fatal());
    assert_eq!(device.count("create_shader_module"), 0);
}

#[test]
fn test_corrupt_file_rejected() {
    let mut device = MockGraphicsDevice::new();
    let path = temp_shader("corrupt", b"not a shader");

    let result = load_shader_module(&mut device, &path);

    assert!(matches!(result, Err(Error::ShaderLoadFailed(_))));
    assert_eq!(device.count("create_shader_module"), 0);
    std::fs::remove_file(path).ok();
}
