//! Unit tests for command recording helpers

use super::*;
use prism_rhi::prism::rhi::PixelFormat;

#[test]
fn test_viewport_is_flipped() {
    let viewport = Viewport {
        x: 10.0,
        y: 20.0,
        width: 800.0,
        height: 600.0,
        min_depth: 0.0,
        max_depth: 1.0,
    };
    let vk_viewport = flipped_viewport(&viewport);
    assert_eq!(vk_viewport.x, 10.0);
    assert_eq!(vk_viewport.y, 620.0);
    assert_eq!(vk_viewport.width, 800.0);
    assert_eq!(vk_viewport.height, -600.0);
    assert_eq!(vk_viewport.max_depth, 1.0);
}

#[test]
fn test_clear_values() {
    let color = clear_value(&ClearValue::Color([0.1, 0.2, 0.3, 1.0]));
    assert_eq!(unsafe { color.color.float32 }, [0.1, 0.2, 0.3, 1.0]);

    let depth = clear_value(&ClearValue::DepthStencil { depth: 1.0, stencil: 7 });
    let depth = unsafe { depth.depth_stencil };
    assert_eq!(depth.depth, 1.0);
    assert_eq!(depth.stencil, 7);
}

#[test]
fn test_upload_region_uses_aligned_row_pitch() {
    // 100 texels * 4 bytes = 400 bytes, padded to 512 = 128 texels
    let desc = TextureDesc::texture_2d(100, 50, PixelFormat::R8G8B8A8_UNORM).with_mip_levels(2);
    let region = upload_copy_region(&desc, TextureSubresource { mip: 0, layer: 0 }, 1024);
    assert_eq!(region.buffer_offset, 1024);
    assert_eq!(region.buffer_row_length, 128);
    assert_eq!(region.buffer_image_height, 50);
    assert_eq!((region.image_extent.width, region.image_extent.height), (100, 50));
    assert_eq!(region.image_subresource.mip_level, 0);
}

#[test]
fn test_upload_region_for_mip_and_layer() {
    let desc = TextureDesc::texture_2d_array(64, 64, 4, PixelFormat::R8G8B8A8_UNORM).with_mip_levels(3);
    let region = upload_copy_region(&desc, TextureSubresource { mip: 2, layer: 3 }, 0);
    assert_eq!((region.image_extent.width, region.image_extent.height, region.image_extent.depth), (16, 16, 1));
    // 16 * 4 = 64 bytes, padded to 256 = 64 texels
    assert_eq!(region.buffer_row_length, 64);
    assert_eq!(region.image_subresource.base_array_layer, 3);
    assert_eq!(region.image_subresource.layer_count, 1);
}

#[test]
fn test_bind_points() {
    assert_eq!(bind_point(PipelineKind::Graphics), vk::PipelineBindPoint::GRAPHICS);
    assert_eq!(bind_point(PipelineKind::Compute), vk::PipelineBindPoint::COMPUTE);
}
