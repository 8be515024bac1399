//! Unit tests for resource_view.rs
//!
//! Tests view creation rules, weak targets and in-place re-pointing.

use super::*;
use crate::rhi::mock_backend::{mock_device, MockDescriptorHeap};
use crate::rhi::{BufferDesc, PixelFormat, SamplerDesc, TextureDesc};

fn slot_contents(view: &ResourceView) -> Option<String> {
    view.heap()
        .backend_as::<MockDescriptorHeap>()
        .and_then(|heap| heap.slot_contents(view.slot()))
}

#[test]
fn test_shader_resource_view_of_texture() {
    let (device, _gpu) = mock_device();
    let texture = device
        .create_texture(TextureDesc::texture_2d(64, 64, PixelFormat::R8G8B8A8_UNORM).with_name("albedo"))
        .unwrap();

    let view = device.create_shader_resource_view(&texture).unwrap();
    assert_eq!(view.kind(), ViewKind::ShaderResource);
    assert_eq!(view.heap().heap_type(), DescriptorHeapType::CbvSrvUav);
    assert!(!view.is_buffer_view());
    assert!(Arc::ptr_eq(&view.texture().unwrap(), &texture));
    assert_eq!(slot_contents(&view).as_deref(), Some("albedo"));
}

#[test]
fn test_view_does_not_keep_resource_alive() {
    let (device, _gpu) = mock_device();
    let texture = device
        .create_texture(TextureDesc::texture_2d(8, 8, PixelFormat::R8_UNORM))
        .unwrap();
    let view = device.create_shader_resource_view(&texture).unwrap();

    assert!(view.is_valid());
    drop(texture);
    assert!(!view.is_valid());
    assert!(view.texture().is_none());
}

#[test]
fn test_render_target_view_requires_usage() {
    let (device, _gpu) = mock_device();
    let sampled = device
        .create_texture(TextureDesc::texture_2d(32, 32, PixelFormat::R8G8B8A8_UNORM))
        .unwrap();
    assert!(matches!(device.create_render_target_view(&sampled), Err(Error::InvalidResource(_))));

    let before = device.view_heaps().render_target.issued_count();
    let target = device
        .create_texture(TextureDesc::render_target(32, 32, PixelFormat::R8G8B8A8_UNORM))
        .unwrap();
    assert!(device.create_render_target_view(&target).is_ok());
    assert_eq!(device.view_heaps().render_target.issued_count(), before + 1);
}

#[test]
fn test_buffer_views_follow_buffer_usage() {
    let (device, _gpu) = mock_device();
    let constants = device.create_buffer(BufferDesc::constant(64, 1).with_name("camera")).unwrap();
    let structured = device.create_buffer(BufferDesc::structured(16, 32)).unwrap();

    let cbv = device.create_constant_buffer_view(&constants).unwrap();
    assert!(cbv.is_buffer_view());
    assert_eq!(slot_contents(&cbv).as_deref(), Some("camera"));

    assert!(device.create_unordered_access_view(&structured).is_ok());
    assert!(device.create_shader_resource_view(&structured).is_ok());
    assert!(device.create_unordered_access_view(&constants).is_err());
}

#[test]
fn test_set_texture_reuses_slot() {
    let (device, _gpu) = mock_device();
    let a = device
        .create_texture(TextureDesc::texture_2d(16, 16, PixelFormat::R8G8B8A8_UNORM).with_name("a"))
        .unwrap();
    let b = device
        .create_texture(TextureDesc::texture_2d(16, 16, PixelFormat::R8G8B8A8_UNORM).with_name("b"))
        .unwrap();

    let view = device.create_shader_resource_view(&a).unwrap();
    let slot = view.slot();
    let issued = view.heap().issued_count();

    view.set_texture(&b).unwrap();
    assert_eq!(view.slot(), slot);
    assert_eq!(view.heap().issued_count(), issued);
    assert!(Arc::ptr_eq(&view.texture().unwrap(), &b));
    assert_eq!(slot_contents(&view).as_deref(), Some("b"));
}

#[test]
fn test_set_texture_rejects_incompatible_texture() {
    let (device, _gpu) = mock_device();
    let target = device
        .create_texture(TextureDesc::render_target(16, 16, PixelFormat::R8G8B8A8_UNORM).with_name("rt"))
        .unwrap();
    let sampled = device
        .create_texture(TextureDesc::texture_2d(16, 16, PixelFormat::R8G8B8A8_UNORM))
        .unwrap();

    let rtv = device.create_render_target_view(&target).unwrap();
    assert!(rtv.set_texture(&sampled).is_err());
    assert!(Arc::ptr_eq(&rtv.texture().unwrap(), &target));
}

#[test]
fn test_drop_clears_slot_and_live_count() {
    let (device, _gpu) = mock_device();
    let sampler = device.create_sampler(SamplerDesc::linear_clamp()).unwrap();
    let heap = Arc::clone(&device.view_heaps().sampler);

    let view = device.create_sampler_view(&sampler).unwrap();
    let slot = view.slot();
    assert_eq!(heap.live_views(), 1);
    assert_eq!(view.sampler().map(|s| Arc::ptr_eq(&s, &sampler)), Some(true));

    drop(view);
    assert_eq!(heap.live_views(), 0);
    assert!(heap.backend_as::<MockDescriptorHeap>().unwrap().slot_contents(slot).is_none());
}

#[test]
fn test_view_in_wrong_heap_rejected() {
    let (device, _gpu) = mock_device();
    let texture = device
        .create_texture(TextureDesc::texture_2d(16, 16, PixelFormat::R8G8B8A8_UNORM))
        .unwrap();
    let rtv_heap = &device.view_heaps().render_target;
    let issued = rtv_heap.issued_count();

    let result = ResourceView::for_texture(rtv_heap, ViewKind::ShaderResource, &texture);
    assert!(matches!(result, Err(Error::InvalidResource(_))));
    assert_eq!(rtv_heap.issued_count(), issued);
}

#[test]
fn test_failed_view_write_does_not_use_a_slot() {
    let (device, gpu) = mock_device();
    let sampler = device.create_sampler(SamplerDesc::linear_clamp()).unwrap();
    let heap = Arc::clone(&device.view_heaps().sampler);
    let issued = heap.issued_count();

    gpu.fail_next_view_write();
    assert!(device.create_sampler_view(&sampler).is_err());
    assert_eq!(heap.issued_count(), issued);
    assert_eq!(heap.live_views(), 0);

    let view = device.create_sampler_view(&sampler).unwrap();
    assert_eq!(view.slot(), issued);
    assert_eq!(heap.live_views(), 1);
}
