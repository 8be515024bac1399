//! Unit tests for texture.rs
//!
//! Tests TextureDesc factories, builders, validation and upload footprint helpers.

use super::*;

// ============================================================================
// FACTORIES
// ============================================================================

#[test]
fn test_texture_2d_is_shader_resource_only() {
    let desc = TextureDesc::texture_2d(256, 128, PixelFormat::R8G8B8A8_UNORM);
    assert_eq!(desc.dimension, TextureDimension::Texture2D);
    assert_eq!(desc.usage, TextureUsage::SHADER_RESOURCE);
    assert_eq!(desc.mip_levels, 1);
    assert_eq!(desc.array_size, 1);
    assert!(desc.validate().is_ok());
}

#[test]
fn test_render_target_factory_adds_render_target_usage() {
    let desc = TextureDesc::render_target(800, 600, PixelFormat::R16G16B16A16_FLOAT);
    assert!(desc.usage.contains(TextureUsage::RENDER_TARGET));
    assert!(desc.usage.contains(TextureUsage::SHADER_RESOURCE));
    assert!(desc.validate().is_ok());
}

#[test]
fn test_depth_stencil_factory() {
    let desc = TextureDesc::depth_stencil(800, 600, PixelFormat::D24_UNORM_S8_UINT);
    assert_eq!(desc.usage, TextureUsage::DEPTH_STENCIL);
    assert!(desc.validate().is_ok());
}

#[test]
fn test_cube_and_array_factories() {
    let cube = TextureDesc::texture_cube(64, PixelFormat::R8G8B8A8_SRGB);
    assert_eq!(cube.array_size, 6);
    assert!(cube.validate().is_ok());

    let array = TextureDesc::texture_2d_array(32, 32, 4, PixelFormat::R8G8B8A8_UNORM);
    assert_eq!(array.array_size, 4);
    assert_eq!(array.dimension, TextureDimension::Texture2D);
    assert!(array.validate().is_ok());
}

#[test]
fn test_builders() {
    let desc = TextureDesc::texture_2d(64, 64, PixelFormat::R8G8B8A8_UNORM)
        .with_mip_levels(7)
        .with_usage(TextureUsage::SHADER_RESOURCE | TextureUsage::UNORDERED_ACCESS)
        .with_name("noise");
    assert_eq!(desc.mip_levels, 7);
    assert!(desc.usage.contains(TextureUsage::UNORDERED_ACCESS));
    assert_eq!(desc.name, "noise");
    assert!(desc.validate().is_ok());
}

// ============================================================================
// VALIDATION
// ============================================================================

#[test]
fn test_zero_extent_rejected() {
    let desc = TextureDesc::texture_2d(0, 16, PixelFormat::R8G8B8A8_UNORM);
    assert!(matches!(desc.validate(), Err(Error::InvalidResource(_))));
}

#[test]
fn test_depth_format_requires_depth_usage() {
    let desc = TextureDesc::texture_2d(16, 16, PixelFormat::D32_FLOAT);
    assert!(desc.validate().is_err());

    let desc = TextureDesc::texture_2d(16, 16, PixelFormat::R8G8B8A8_UNORM)
        .with_usage(TextureUsage::DEPTH_STENCIL);
    assert!(desc.validate().is_err());
}

#[test]
fn test_3d_texture_cannot_be_array() {
    let desc = TextureDesc::texture_3d(16, 16, 16, PixelFormat::R8_UNORM).with_array_size(2);
    assert!(desc.validate().is_err());
}

#[test]
fn test_mip_count_bounded_by_extent() {
    let desc = TextureDesc::texture_2d(64, 16, PixelFormat::R8_UNORM);
    assert_eq!(desc.max_mip_levels(), 7);
    assert!(desc.clone().with_mip_levels(7).validate().is_ok());
    assert!(desc.with_mip_levels(8).validate().is_err());
}

#[test]
fn test_sample_count_validation() {
    let desc = TextureDesc::render_target(64, 64, PixelFormat::R8G8B8A8_UNORM);
    assert!(desc.clone().with_sample_count(4).validate().is_ok());
    assert!(desc.clone().with_sample_count(3).validate().is_err());
    assert!(desc.with_sample_count(4).with_mip_levels(2).validate().is_err());
}

#[test]
fn test_cube_must_be_square() {
    let mut desc = TextureDesc::texture_cube(64, PixelFormat::R8G8B8A8_UNORM);
    desc.height = 32;
    assert!(desc.validate().is_err());
}

// ============================================================================
// UPLOAD FOOTPRINT
// ============================================================================

#[test]
fn test_upload_row_pitch_is_aligned() {
    let desc = TextureDesc::texture_2d(100, 10, PixelFormat::R8G8B8A8_UNORM);
    // 100 * 4 = 400 -> 512
    assert_eq!(desc.upload_row_pitch(0), 512);
    assert_eq!(desc.upload_size(0), 512 * 10);
    // mip 2: 25 * 4 = 100 -> 256, height 2
    assert_eq!(desc.mip_extent(2), (25, 2, 1));
    assert_eq!(desc.upload_size(2), 256 * 2);
}

#[test]
fn test_mip_extent_never_below_one() {
    let desc = TextureDesc::texture_2d(8, 2, PixelFormat::R8_UNORM);
    assert_eq!(desc.mip_extent(3), (1, 1, 1));
}
