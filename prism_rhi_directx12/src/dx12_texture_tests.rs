//! Unit tests for texture resource descriptions

use super::*;
use windows::Win32::Graphics::Direct3D12::{
    D3D12_RESOURCE_DIMENSION_TEXTURE2D, D3D12_RESOURCE_DIMENSION_TEXTURE3D,
    D3D12_RESOURCE_FLAG_ALLOW_RENDER_TARGET, D3D12_RESOURCE_FLAG_DENY_SHADER_RESOURCE,
};
use windows::Win32::Graphics::Dxgi::Common::{
    DXGI_FORMAT_D32_FLOAT, DXGI_FORMAT_R32_TYPELESS, DXGI_FORMAT_R8G8B8A8_UNORM,
};

#[test]
fn test_2d_texture_desc() {
    let desc = TextureDesc::texture_2d(256, 128, PixelFormat::R8G8B8A8_UNORM).with_mip_levels(4);
    let resource = texture_resource_desc(&desc);
    assert_eq!(resource.Dimension, D3D12_RESOURCE_DIMENSION_TEXTURE2D);
    assert_eq!(resource.Width, 256);
    assert_eq!(resource.Height, 128);
    assert_eq!(resource.DepthOrArraySize, 1);
    assert_eq!(resource.MipLevels, 4);
    assert_eq!(resource.Format, DXGI_FORMAT_R8G8B8A8_UNORM);
    assert_eq!(resource.SampleDesc.Count, 1);
}

#[test]
fn test_3d_texture_uses_depth() {
    let desc = TextureDesc::texture_3d(32, 32, 16, PixelFormat::R32_FLOAT);
    let resource = texture_resource_desc(&desc);
    assert_eq!(resource.Dimension, D3D12_RESOURCE_DIMENSION_TEXTURE3D);
    assert_eq!(resource.DepthOrArraySize, 16);
}

#[test]
fn test_cube_texture_keeps_face_count() {
    let desc = TextureDesc::texture_cube(64, PixelFormat::R8G8B8A8_UNORM);
    let resource = texture_resource_desc(&desc);
    assert_eq!(resource.Dimension, D3D12_RESOURCE_DIMENSION_TEXTURE2D);
    assert_eq!(resource.DepthOrArraySize, 6);
}

#[test]
fn test_depth_texture_formats() {
    let depth_only = TextureDesc::depth_stencil(64, 64, PixelFormat::D32_FLOAT);
    let resource = texture_resource_desc(&depth_only);
    assert_eq!(resource.Format, DXGI_FORMAT_D32_FLOAT);
    assert!(resource.Flags.contains(D3D12_RESOURCE_FLAG_DENY_SHADER_RESOURCE));

    let sampled = depth_only.with_usage(TextureUsage::DEPTH_STENCIL | TextureUsage::SHADER_RESOURCE);
    let resource = texture_resource_desc(&sampled);
    assert_eq!(resource.Format, DXGI_FORMAT_R32_TYPELESS);
    assert!(!resource.Flags.contains(D3D12_RESOURCE_FLAG_DENY_SHADER_RESOURCE));
}

#[test]
fn test_clear_values_only_for_attachments() {
    assert!(optimized_clear_value(&TextureDesc::texture_2d(8, 8, PixelFormat::R8G8B8A8_UNORM)).is_none());

    let color = optimized_clear_value(&TextureDesc::render_target(8, 8, PixelFormat::R8G8B8A8_UNORM)).unwrap();
    assert_eq!(color.Format, DXGI_FORMAT_R8G8B8A8_UNORM);
    assert_eq!(unsafe { color.Anonymous.Color }, [0.0, 0.0, 0.0, 1.0]);

    let sampled_depth = TextureDesc::depth_stencil(8, 8, PixelFormat::D32_FLOAT)
        .with_usage(TextureUsage::DEPTH_STENCIL | TextureUsage::SHADER_RESOURCE);
    let depth = optimized_clear_value(&sampled_depth).unwrap();
    // Clear values use the typed format even when the resource is typeless
    assert_eq!(depth.Format, DXGI_FORMAT_D32_FLOAT);
    assert_eq!(unsafe { depth.Anonymous.DepthStencil.Depth }, 1.0);
}

#[test]
fn test_render_target_flags() {
    let desc = TextureDesc::render_target(8, 8, PixelFormat::B8G8R8A8_UNORM);
    let resource = texture_resource_desc(&desc);
    assert!(resource.Flags.contains(D3D12_RESOURCE_FLAG_ALLOW_RENDER_TARGET));
}
