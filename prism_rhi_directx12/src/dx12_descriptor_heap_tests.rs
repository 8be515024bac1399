//! Unit tests for descriptor handles and view descriptions

use super::*;
use prism_rhi::prism::rhi::TextureUsage;
use windows::Win32::Graphics::Dxgi::Common::{DXGI_FORMAT_D32_FLOAT, DXGI_FORMAT_R32_FLOAT};

#[test]
fn test_offset_handle() {
    assert_eq!(offset_handle(0x1000, 0, 32), 0x1000);
    assert_eq!(offset_handle(0x1000, 3, 32), 0x1000 + 96);
    // No u32 overflow for large heaps
    assert_eq!(offset_handle(0, 1_000_000, 64), 64_000_000);
}

#[test]
fn test_cbv_size_is_256_aligned() {
    assert_eq!(cbv_size(1), 256);
    assert_eq!(cbv_size(256), 256);
    assert_eq!(cbv_size(257), 512);
}

#[test]
fn test_srv_dimensions() {
    let plain = texture_srv_desc(&TextureDesc::texture_2d(64, 64, PixelFormat::R8G8B8A8_UNORM).with_mip_levels(3));
    assert_eq!(plain.ViewDimension, D3D12_SRV_DIMENSION_TEXTURE2D);
    assert_eq!(unsafe { plain.Anonymous.Texture2D.MipLevels }, 3);
    assert_eq!(plain.Shader4ComponentMapping, D3D12_DEFAULT_SHADER_4_COMPONENT_MAPPING);

    let array = texture_srv_desc(&TextureDesc::texture_2d_array(64, 64, 4, PixelFormat::R8G8B8A8_UNORM));
    assert_eq!(array.ViewDimension, D3D12_SRV_DIMENSION_TEXTURE2DARRAY);
    assert_eq!(unsafe { array.Anonymous.Texture2DArray.ArraySize }, 4);

    let cube = texture_srv_desc(&TextureDesc::texture_cube(64, PixelFormat::R8G8B8A8_UNORM));
    assert_eq!(cube.ViewDimension, D3D12_SRV_DIMENSION_TEXTURECUBE);

    let cube_array =
        texture_srv_desc(&TextureDesc::texture_cube(64, PixelFormat::R8G8B8A8_UNORM).with_array_size(12));
    assert_eq!(cube_array.ViewDimension, D3D12_SRV_DIMENSION_TEXTURECUBEARRAY);
    assert_eq!(unsafe { cube_array.Anonymous.TextureCubeArray.NumCubes }, 2);

    let volume = texture_srv_desc(&TextureDesc::texture_3d(16, 16, 16, PixelFormat::R32_FLOAT));
    assert_eq!(volume.ViewDimension, D3D12_SRV_DIMENSION_TEXTURE3D);

    let msaa = texture_srv_desc(&TextureDesc::render_target(64, 64, PixelFormat::R8G8B8A8_UNORM).with_sample_count(4));
    assert_eq!(msaa.ViewDimension, D3D12_SRV_DIMENSION_TEXTURE2DMS);
}

#[test]
fn test_depth_srv_reads_depth_plane() {
    let desc = TextureDesc::depth_stencil(64, 64, PixelFormat::D32_FLOAT)
        .with_usage(TextureUsage::DEPTH_STENCIL | TextureUsage::SHADER_RESOURCE);
    assert_eq!(texture_srv_desc(&desc).Format, DXGI_FORMAT_R32_FLOAT);
    assert_eq!(dsv_desc(desc.format, 1).Format, DXGI_FORMAT_D32_FLOAT);
}

#[test]
fn test_dsv_dimension_follows_sample_count() {
    assert_eq!(dsv_desc(PixelFormat::D32_FLOAT, 1).ViewDimension, D3D12_DSV_DIMENSION_TEXTURE2D);
    assert_eq!(dsv_desc(PixelFormat::D32_FLOAT, 4).ViewDimension, D3D12_DSV_DIMENSION_TEXTURE2DMS);
}

#[test]
fn test_uav_dimensions() {
    let plain = texture_uav_desc(&TextureDesc::texture_2d(64, 64, PixelFormat::R32_FLOAT));
    assert_eq!(plain.ViewDimension, D3D12_UAV_DIMENSION_TEXTURE2D);

    let cube = texture_uav_desc(&TextureDesc::texture_cube(64, PixelFormat::R32_FLOAT));
    assert_eq!(cube.ViewDimension, D3D12_UAV_DIMENSION_TEXTURE2DARRAY);
    assert_eq!(unsafe { cube.Anonymous.Texture2DArray.ArraySize }, 6);

    let volume = texture_uav_desc(&TextureDesc::texture_3d(16, 16, 8, PixelFormat::R32_FLOAT));
    assert_eq!(volume.ViewDimension, D3D12_UAV_DIMENSION_TEXTURE3D);
    assert_eq!(unsafe { volume.Anonymous.Texture3D.WSize }, 8);
}

#[test]
fn test_structured_buffer_views() {
    let srv = buffer_srv_desc(48, 100);
    assert_eq!(srv.ViewDimension, D3D12_SRV_DIMENSION_BUFFER);
    assert_eq!(srv.Format, DXGI_FORMAT_UNKNOWN);
    assert_eq!(unsafe { srv.Anonymous.Buffer.NumElements }, 100);
    assert_eq!(unsafe { srv.Anonymous.Buffer.StructureByteStride }, 48);

    let uav = buffer_uav_desc(16, 10);
    assert_eq!(uav.ViewDimension, D3D12_UAV_DIMENSION_BUFFER);
    assert_eq!(unsafe { uav.Anonymous.Buffer.NumElements }, 10);
    assert_eq!(unsafe { uav.Anonymous.Buffer.CounterOffsetInBytes }, 0);
}
