/// Unit tests for dynamic uniform layout

use crate::renderer::{pad_uniform_buffer_size, DynamicUniformLayout, ObjectData};
use crate::error::Error;
use glam::Mat4;

// ============================================================================
// STRIDE
// ============================================================================

#[test]
fn test_pad_rounds_up_to_alignment() {
    assert_eq!(pad_uniform_buffer_size(68, 256), 256);
    assert_eq!(pad_uniform_buffer_size(300, 256), 512);
    assert_eq!(pad_uniform_buffer_size(64, 64), 64);
    assert_eq!(pad_uniform_buffer_size(65, 64), 128);
}

#[test]
fn test_pad_with_trivial_alignment_keeps_size() {
    assert_eq!(pad_uniform_buffer_size(68, 1), 68);
    assert_eq!(pad_uniform_buffer_size(68, 0), 68);
}

#[test]
fn test_pad_does_not_assume_power_of_two() {
    assert_eq!(pad_uniform_buffer_size(100, 48), 144);
    assert_eq!(pad_uniform_buffer_size(96, 48), 96);
}

#[test]
fn test_pad_zero_size() {
    assert_eq!(pad_uniform_buffer_size(0, 256), 0);
}

#[test]
fn test_stride_is_smallest_aligned_multiple() {
    for alignment in [2u64, 16, 48, 64, 256] {
        for size in 1u64..600 {
            let stride = pad_uniform_buffer_size(size, alignment);
            assert!(stride >= size);
            assert_eq!(stride % alignment, 0);
            assert!(stride - size < alignment);
        }
    }
}

// ============================================================================
// LAYOUT
// ============================================================================

#[test]
fn test_layout_offsets() {
    let layout = DynamicUniformLayout::new(64, 256, 4).unwrap();

    assert_eq!(layout.stride, 256);
    assert_eq!(layout.offset(0), 0);
    assert_eq!(layout.offset(3), 768);
    assert_eq!(layout.dynamic_offset(2), Some(512));
    assert_eq!(layout.dynamic_offset(4), None);
    assert_eq!(layout.buffer_size(), 1024);
}

#[test]
fn test_layout_for_object_data() {
    let layout = DynamicUniformLayout::for_type::<ObjectData>(256, 10).unwrap();

    assert_eq!(layout.element_size, 64);
    assert_eq!(layout.stride, 256);
}

#[test]
fn test_pack_places_records_at_stride() {
    let layout = DynamicUniformLayout::for_type::<ObjectData>(256, 8).unwrap();
    let records = [
        ObjectData { model: Mat4::from_scale(glam::Vec3::splat(2.0)) },
        ObjectData { model: Mat4::IDENTITY },
    ];

    let bytes = layout.pack(&records);

    assert_eq!(bytes.len(), 512);
    assert_eq!(&bytes[0..64], bytemuck::bytes_of(&records[0]));
    assert!(bytes[64..256].iter().all(|&b| b == 0));
    assert_eq!(&bytes[256..320], bytemuck::bytes_of(&records[1]));
}

#[test]
fn test_pack_truncates_to_capacity() {
    let layout = DynamicUniformLayout::new(4, 4, 2).unwrap();

    let bytes = layout.pack(&[1u32, 2, 3]);

    assert_eq!(bytes, vec![1, 0, 0, 0, 2, 0, 0, 0]);
}

#[test]
fn test_layout_rejects_offsets_beyond_u32() {
    // 2^24 records of 256 bytes put the last offset at 2^32 - 256: still fits
    let fits = DynamicUniformLayout::new(64, 256, 1 << 24).unwrap();
    assert_eq!(fits.dynamic_offset((1 << 24) - 1), Some(u32::MAX - 255));

    let result = DynamicUniformLayout::new(64, 256, (1 << 24) + 1);
    assert!(matches!(result, Err(Error::InvalidResource(_))));
}

#[test]
fn test_layout_with_zero_capacity_is_empty() {
    let layout = DynamicUniformLayout::new(64, 256, 0).unwrap();

    assert_eq!(layout.buffer_size(), 0);
    assert_eq!(layout.dynamic_offset(0), None);
}
