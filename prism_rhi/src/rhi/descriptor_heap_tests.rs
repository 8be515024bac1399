//! Unit tests for descriptor_heap.rs
//!
//! Tests slot issuing, overflow, reset rules and handle arithmetic.

use super::*;
use std::sync::Arc;
use crate::rhi::mock_backend::mock_device;
use crate::rhi::{Device, PixelFormat, ResourceView, TextureDesc};

fn heap(device: &Device, heap_type: DescriptorHeapType, capacity: u32, shader_visible: bool) -> Arc<DescriptorHeap> {
    device
        .create_descriptor_heap(DescriptorHeapDesc {
            heap_type,
            capacity,
            shader_visible,
            name: "test_heap".to_string(),
        })
        .unwrap()
}

#[test]
fn test_issue_id_strictly_increasing() {
    let (device, _gpu) = mock_device();
    let heap = heap(&device, DescriptorHeapType::CbvSrvUav, 8, false);
    let ids: Vec<u32> = (0..8).map(|_| heap.issue_id().unwrap()).collect();
    assert_eq!(ids, (0..8).collect::<Vec<_>>());
    assert_eq!(heap.issued_count(), 8);
}

#[test]
fn test_overflow_on_capacity_plus_one() {
    let (device, _gpu) = mock_device();
    let heap = heap(&device, DescriptorHeapType::RenderTarget, 4, false);
    for _ in 0..4 {
        heap.issue_id().unwrap();
    }
    assert_eq!(
        heap.issue_id(),
        Err(Error::DescriptorHeapOverflow { heap: "test_heap".to_string(), capacity: 4 })
    );
    // Still full, never wraps
    assert!(heap.issue_id().is_err());
    assert_eq!(heap.issued_count(), 4);
}

#[test]
fn test_cpu_handle_arithmetic_and_range() {
    let (device, _gpu) = mock_device();
    let heap = heap(&device, DescriptorHeapType::CbvSrvUav, 16, true);

    let base = heap.cpu_handle(0).unwrap();
    let fifth = heap.cpu_handle(5).unwrap();
    assert_eq!(fifth.0 - base.0, 5 * heap.descriptor_size() as u64);
    assert_eq!(
        heap.cpu_handle(16),
        Err(Error::DescriptorHandleOutOfRange { offset: 16, capacity: 16 })
    );
}

#[test]
fn test_gpu_handle_needs_shader_visible_heap() {
    let (device, _gpu) = mock_device();
    let visible = heap(&device, DescriptorHeapType::Sampler, 4, true);
    let hidden = heap(&device, DescriptorHeapType::Sampler, 4, false);

    let h0 = visible.gpu_handle(0).unwrap();
    let h3 = visible.gpu_handle(3).unwrap();
    assert_eq!(h3.0 - h0.0, 3 * visible.descriptor_size() as u64);
    assert!(matches!(visible.gpu_handle(4), Err(Error::DescriptorHandleOutOfRange { .. })));
    assert!(matches!(hidden.gpu_handle(0), Err(Error::InvalidState(_))));
}

#[test]
fn test_render_target_heap_cannot_be_shader_visible() {
    let desc = DescriptorHeapDesc {
        heap_type: DescriptorHeapType::RenderTarget,
        capacity: 4,
        shader_visible: true,
        name: "rtv".to_string(),
    };
    assert!(desc.validate().is_err());

    let empty = DescriptorHeapDesc { capacity: 0, shader_visible: false, ..desc };
    assert!(empty.validate().is_err());
}

#[test]
fn test_reset_id_rejected_while_views_live() {
    let (device, _gpu) = mock_device();
    let heap = heap(&device, DescriptorHeapType::CbvSrvUav, 4, true);
    let texture = device
        .create_texture(TextureDesc::texture_2d(16, 16, PixelFormat::R8G8B8A8_UNORM))
        .unwrap();

    let view = ResourceView::for_texture(&heap, ViewKind::ShaderResource, &texture).unwrap();
    assert_eq!(heap.live_views(), 1);
    assert!(matches!(heap.reset_id(), Err(Error::InvalidState(_))));

    drop(view);
    assert_eq!(heap.live_views(), 0);
    heap.reset_id().unwrap();
    assert_eq!(heap.issued_count(), 0);
    assert_eq!(heap.issue_id().unwrap(), 0);
}

#[test]
fn test_concurrent_issue_hands_out_unique_ids() {
    let (device, _gpu) = mock_device();
    let heap = heap(&device, DescriptorHeapType::CbvSrvUav, 400, false);

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let heap = Arc::clone(&heap);
            std::thread::spawn(move || (0..100).map(|_| heap.issue_id().unwrap()).collect::<Vec<_>>())
        })
        .collect();
    let mut ids: Vec<u32> = handles.into_iter().flat_map(|h| h.join().unwrap()).collect();
    ids.sort_unstable();
    assert_eq!(ids, (0..400).collect::<Vec<_>>());
}

#[test]
fn test_view_kind_to_heap_type() {
    assert_eq!(DescriptorHeapType::for_view(ViewKind::RenderTarget), DescriptorHeapType::RenderTarget);
    assert_eq!(DescriptorHeapType::for_view(ViewKind::UnorderedAccess), DescriptorHeapType::CbvSrvUav);
    assert_eq!(DescriptorHeapType::for_view(ViewKind::Sampler), DescriptorHeapType::Sampler);
}
