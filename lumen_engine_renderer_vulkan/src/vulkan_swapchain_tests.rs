//! Unit tests for swapchain parameter selection
//!
//! Surface queries are replaced by hand-built capability structs; no GPU needed.

use super::*;

fn capabilities(current: (u32, u32), min_count: u32, max_count: u32) -> vk::SurfaceCapabilitiesKHR {
    vk::SurfaceCapabilitiesKHR {
        min_image_count: min_count,
        max_image_count: max_count,
        current_extent: vk::Extent2D { width: current.0, height: current.1 },
        min_image_extent: vk::Extent2D { width: 1, height: 1 },
        max_image_extent: vk::Extent2D { width: 4096, height: 4096 },
        ..Default::default()
    }
}

fn surface_format(format: vk::Format) -> vk::SurfaceFormatKHR {
    vk::SurfaceFormatKHR {
        format,
        color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
    }
}

// ============================================================================
// SURFACE FORMAT
// ============================================================================

#[test]
fn test_choose_surface_format_prefers_srgb() {
    let formats = [
        surface_format(vk::Format::B8G8R8A8_UNORM),
        surface_format(vk::Format::B8G8R8A8_SRGB),
    ];
    let chosen = choose_surface_format(&formats).unwrap();
    assert_eq!(chosen.format, vk::Format::B8G8R8A8_SRGB);
}

#[test]
fn test_choose_surface_format_falls_back_to_first() {
    let formats = [
        surface_format(vk::Format::A2B10G10R10_UNORM_PACK32),
        surface_format(vk::Format::B8G8R8A8_UNORM),
    ];
    let chosen = choose_surface_format(&formats).unwrap();
    assert_eq!(chosen.format, vk::Format::A2B10G10R10_UNORM_PACK32);
}

#[test]
fn test_choose_surface_format_empty() {
    assert!(choose_surface_format(&[]).is_none());
}

// ============================================================================
// EXTENT
// ============================================================================

#[test]
fn test_choose_extent_uses_surface_extent() {
    let caps = capabilities((1280, 720), 2, 3);
    let extent = choose_extent(&caps, Extent2D::new(1700, 900));
    assert_eq!((extent.width, extent.height), (1280, 720));
}

#[test]
fn test_choose_extent_clamps_requested_when_surface_undefined() {
    let caps = capabilities((u32::MAX, u32::MAX), 2, 3);
    let extent = choose_extent(&caps, Extent2D::new(8000, 900));
    assert_eq!((extent.width, extent.height), (4096, 900));
}

#[test]
fn test_choose_extent_minimized_surface_is_zero() {
    let caps = vk::SurfaceCapabilitiesKHR {
        current_extent: vk::Extent2D { width: 0, height: 0 },
        ..Default::default()
    };
    let extent = choose_extent(&caps, Extent2D::new(800, 600));
    assert_eq!((extent.width, extent.height), (0, 0));
}

// ============================================================================
// IMAGE COUNT
// ============================================================================

#[test]
fn test_choose_image_count_one_above_minimum() {
    assert_eq!(choose_image_count(&capabilities((800, 600), 2, 8)), 3);
}

#[test]
fn test_choose_image_count_capped_by_maximum() {
    assert_eq!(choose_image_count(&capabilities((800, 600), 3, 3)), 3);
}

#[test]
fn test_choose_image_count_unbounded_maximum() {
    assert_eq!(choose_image_count(&capabilities((800, 600), 4, 0)), 5);
}
