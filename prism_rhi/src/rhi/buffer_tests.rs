//! Unit tests for buffer.rs
//!
//! Tests BufferDesc factories, validation and the scoped CPU mapping.

use super::*;
use crate::rhi::mock_backend::{mock_device, MockBuffer};

#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
struct Vertex {
    position: [f32; 3],
    color: u32,
}

// ============================================================================
// DESCRIPTORS
// ============================================================================

#[test]
fn test_constant_stride_rounded_to_256() {
    let desc = BufferDesc::constant(64, 3);
    assert_eq!(desc.stride, 256);
    assert_eq!(desc.size(), 768);
    assert_eq!(desc.heap, MemoryHeap::Upload);
    assert!(desc.validate().is_ok());

    assert_eq!(BufferDesc::constant(257, 1).stride, 512);
}

#[test]
fn test_initial_state_follows_heap() {
    assert_eq!(BufferDesc::vertex(16, 4).initial_state(), ResourceState::Common);
    assert_eq!(BufferDesc::upload(64).initial_state(), ResourceState::GeneralRead);
    assert_eq!(BufferDesc::readback(64).initial_state(), ResourceState::CopyDestination);
}

#[test]
fn test_index_stride_must_be_2_or_4() {
    assert!(BufferDesc::index(2, 6).validate().is_ok());
    assert!(BufferDesc::index(4, 6).validate().is_ok());
    assert!(matches!(BufferDesc::index(3, 6).validate(), Err(Error::InvalidResource(_))));
}

#[test]
fn test_zero_sized_buffer_rejected() {
    assert!(BufferDesc::vertex(0, 10).validate().is_err());
    assert!(BufferDesc::upload(0).validate().is_err());
}

#[test]
fn test_readback_cannot_be_unordered_access() {
    let desc = BufferDesc::readback(64).with_usage(BufferUsage::UNORDERED_ACCESS);
    assert!(desc.validate().is_err());
}

// ============================================================================
// MAPPING
// ============================================================================

#[test]
fn test_copy_total_data_writes_backend_memory() {
    let (device, _gpu) = mock_device();
    let buffer = device.create_buffer(BufferDesc::upload(8).with_name("staging")).unwrap();

    let mut mapping = buffer.copy_start().unwrap();
    assert!(buffer.is_mapped());
    mapping.copy_total_data(&[1, 2, 3, 4, 5, 6, 7, 8]).unwrap();
    mapping.copy_end();

    assert!(!buffer.is_mapped());
    let mock = buffer.backend_as::<MockBuffer>().unwrap();
    assert_eq!(mock.contents(), vec![1, 2, 3, 4, 5, 6, 7, 8]);
}

#[test]
fn test_copy_total_data_requires_exact_size() {
    let (device, _gpu) = mock_device();
    let buffer = device.create_buffer(BufferDesc::upload(8)).unwrap();
    let mut mapping = buffer.copy_start().unwrap();
    assert!(mapping.copy_total_data(&[0; 4]).is_err());
}

#[test]
fn test_copy_data_out_of_range_rejected() {
    let (device, _gpu) = mock_device();
    let buffer = device.create_buffer(BufferDesc::upload(16)).unwrap();
    let mut mapping = buffer.copy_start().unwrap();
    assert!(mapping.copy_data(12, &[0; 4]).is_ok());
    assert!(matches!(mapping.copy_data(13, &[0; 4]), Err(Error::InvalidResource(_))));
    assert!(mapping.copy_data(u64::MAX, &[0; 1]).is_err());
}

#[test]
fn test_copy_element_uses_stride() {
    let (device, _gpu) = mock_device();
    let desc = BufferDesc::vertex(16, 2).with_heap(MemoryHeap::Upload);
    let buffer = device.create_buffer(desc).unwrap();

    let vertex = Vertex { position: [1.0, 2.0, 3.0], color: 0xFF00FF00 };
    {
        let mut mapping = buffer.copy_start().unwrap();
        mapping.copy_element(1, &vertex).unwrap();
    }

    let contents = buffer.backend_as::<MockBuffer>().unwrap().contents();
    assert!(contents[..16].iter().all(|&b| b == 0));
    assert_eq!(&contents[16..], bytemuck::bytes_of(&vertex));
}

#[test]
fn test_copy_element_huge_index_rejected() {
    let (device, _gpu) = mock_device();
    let buffer = device.create_buffer(BufferDesc::constant(256, 4)).unwrap();

    let mut mapping = buffer.copy_start().unwrap();
    let result = mapping.copy_element(1u64 << 56, &[7u8; 16]);
    assert!(matches!(result, Err(Error::InvalidResource(_))));
    mapping.copy_end();

    let contents = buffer.backend_as::<MockBuffer>().unwrap().contents();
    assert!(contents.iter().all(|&b| b == 0));
}

#[test]
fn test_default_heap_cannot_be_mapped() {
    let (device, _gpu) = mock_device();
    let buffer = device.create_buffer(BufferDesc::vertex(16, 4)).unwrap();
    assert!(matches!(buffer.copy_start(), Err(Error::InvalidState(_))));
    assert!(!buffer.is_mapped());
}

#[test]
fn test_second_copy_start_rejected_until_guard_dropped() {
    let (device, _gpu) = mock_device();
    let buffer = device.create_buffer(BufferDesc::upload(8)).unwrap();

    let mapping = buffer.copy_start().unwrap();
    assert!(matches!(buffer.copy_start(), Err(Error::InvalidState(_))));
    drop(mapping);
    assert!(buffer.copy_start().is_ok());
}

#[test]
fn test_mapping_released_on_early_return() {
    fn fill(buffer: &Buffer) -> Result<()> {
        let mut mapping = buffer.copy_start()?;
        mapping.copy_data(0, &[1, 2])?;
        mapping.copy_data(100, &[3])?;
        mapping.copy_end();
        Ok(())
    }

    let (device, _gpu) = mock_device();
    let buffer = device.create_buffer(BufferDesc::upload(8)).unwrap();
    assert!(fill(&buffer).is_err());
    assert!(!buffer.is_mapped());
}

#[test]
fn test_read_data_from_readback_buffer() {
    let (device, _gpu) = mock_device();
    let buffer = device.create_buffer(BufferDesc::readback(4)).unwrap();
    let mapping = buffer.copy_start().unwrap();
    let mut out = [0xAAu8; 4];
    mapping.read_data(0, &mut out).unwrap();
    assert_eq!(out, [0; 4]);
}
