//! Unit tests for buffer resource descriptions

use super::*;
use prism_rhi::prism::rhi::BufferUsage;
use windows::Win32::Graphics::Direct3D12::{D3D12_RESOURCE_FLAG_ALLOW_UNORDERED_ACCESS, D3D12_RESOURCE_FLAG_NONE};

#[test]
fn test_buffer_desc_is_row_major_with_full_size() {
    let desc = BufferDesc::vertex(32, 100);
    let resource = buffer_resource_desc(&desc);
    assert_eq!(resource.Dimension, D3D12_RESOURCE_DIMENSION_BUFFER);
    assert_eq!(resource.Width, 3200);
    assert_eq!(resource.Height, 1);
    assert_eq!(resource.Layout, D3D12_TEXTURE_LAYOUT_ROW_MAJOR);
    assert_eq!(resource.Format, DXGI_FORMAT_UNKNOWN);
    assert_eq!(resource.Flags, D3D12_RESOURCE_FLAG_NONE);
}

#[test]
fn test_constant_buffer_width_is_aligned() {
    let desc = BufferDesc::constant(64, 3);
    assert_eq!(buffer_resource_desc(&desc).Width, 768);
}

#[test]
fn test_unordered_access_flag() {
    let desc = BufferDesc::vertex(16, 4).with_usage(BufferUsage::VERTEX | BufferUsage::UNORDERED_ACCESS);
    assert!(buffer_resource_desc(&desc).Flags.contains(D3D12_RESOURCE_FLAG_ALLOW_UNORDERED_ACCESS));
}
