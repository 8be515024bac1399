//! Unit tests for adapter descriptions

use super::*;

fn desc(name: &str, dedicated: usize, flags: DXGI_ADAPTER_FLAG) -> DXGI_ADAPTER_DESC1 {
    let mut desc = DXGI_ADAPTER_DESC1 {
        VendorId: 0x10de,
        DeviceId: 0x2684,
        DedicatedVideoMemory: dedicated,
        SharedSystemMemory: 16 << 30,
        Flags: flags.0 as u32,
        ..Default::default()
    };
    for (dst, src) in desc.Description.iter_mut().zip(name.encode_utf16()) {
        *dst = src;
    }
    desc
}

#[test]
fn test_name_stops_at_nul() {
    let info = adapter_info(&desc("NVIDIA GeForce RTX 4090", 24 << 30, DXGI_ADAPTER_FLAG_NONE));
    assert_eq!(info.name, "NVIDIA GeForce RTX 4090");
    assert_eq!(info.vendor_id, 0x10de);
    assert_eq!(info.device_id, 0x2684);
}

#[test]
fn test_memory_sizes_are_reported() {
    let info = adapter_info(&desc("GPU", 8 << 30, DXGI_ADAPTER_FLAG_NONE));
    assert_eq!(info.dedicated_video_memory, 8 << 30);
    assert_eq!(info.shared_system_memory, 16 << 30);
}

#[test]
fn test_adapter_types() {
    assert_eq!(
        adapter_info(&desc("Discrete", 8 << 30, DXGI_ADAPTER_FLAG_NONE)).adapter_type,
        AdapterType::Discrete
    );
    assert_eq!(
        adapter_info(&desc("Integrated", 128 << 20, DXGI_ADAPTER_FLAG_NONE)).adapter_type,
        AdapterType::Integrated
    );
    assert_eq!(
        adapter_info(&desc("Microsoft Basic Render Driver", 0, DXGI_ADAPTER_FLAG_SOFTWARE)).adapter_type,
        AdapterType::Software
    );
}
