/// Dx12Buffer - committed buffer resource, persistently mapped on CPU heaps

use prism_rhi::prism::rhi::{BufferBackend, BufferDesc, MemoryHeap};
use prism_rhi::prism::Result;
use prism_rhi::{engine_bail, engine_err, engine_trace};
use std::any::Any;
use std::ptr::NonNull;
use windows::Win32::Graphics::Direct3D12::{
    ID3D12Resource, D3D12_HEAP_FLAG_NONE, D3D12_HEAP_PROPERTIES, D3D12_RESOURCE_DESC,
    D3D12_RESOURCE_DIMENSION_BUFFER, D3D12_RESOURCE_STATES, D3D12_TEXTURE_LAYOUT_ROW_MAJOR,
};
use windows::Win32::Graphics::Dxgi::Common::{DXGI_FORMAT_UNKNOWN, DXGI_SAMPLE_DESC};

use crate::dx12_context::{map_hr_error, set_debug_name, Dx12Context, LOG_SOURCE};
use crate::dx12_format::{buffer_flags, heap_type, resource_state};

pub(crate) fn buffer_resource_desc(desc: &BufferDesc) -> D3D12_RESOURCE_DESC {
    D3D12_RESOURCE_DESC {
        Dimension: D3D12_RESOURCE_DIMENSION_BUFFER,
        Alignment: 0,
        Width: desc.size(),
        Height: 1,
        DepthOrArraySize: 1,
        MipLevels: 1,
        Format: DXGI_FORMAT_UNKNOWN,
        SampleDesc: DXGI_SAMPLE_DESC { Count: 1, Quality: 0 },
        Layout: D3D12_TEXTURE_LAYOUT_ROW_MAJOR,
        Flags: buffer_flags(desc.usage),
    }
}

/// DirectX 12 implementation of `BufferBackend`
///
/// Upload and readback buffers are mapped once at creation and stay mapped
/// until the buffer is dropped; `map` hands out that pointer.
pub struct Dx12Buffer {
    resource: ID3D12Resource,
    heap: MemoryHeap,
    size: u64,
    mapped: Option<NonNull<u8>>,
}

// The mapped pointer is only written through `BufferMapping`, which the core serializes
unsafe impl Send for Dx12Buffer {}
unsafe impl Sync for Dx12Buffer {}

impl Dx12Buffer {
    pub(crate) fn new(ctx: &Dx12Context, desc: &BufferDesc) -> Result<Self> {
        let resource_desc = buffer_resource_desc(desc);
        let heap = D3D12_HEAP_PROPERTIES {
            Type: heap_type(desc.heap),
            ..Default::default()
        };
        let initial_state: D3D12_RESOURCE_STATES = resource_state(desc.initial_state());

        let mut resource: Option<ID3D12Resource> = None;
        unsafe {
            ctx.device.CreateCommittedResource(
                &heap,
                D3D12_HEAP_FLAG_NONE,
                &resource_desc,
                initial_state,
                None,
                &mut resource,
            )
        }
        .map_err(|e| map_hr_error("ID3D12Device::CreateCommittedResource (buffer)", e))?;
        let resource =
            resource.ok_or_else(|| engine_err!(LOG_SOURCE, "CreateCommittedResource returned no buffer"))?;
        set_debug_name(&resource, &desc.name);

        let mapped = match desc.heap {
            MemoryHeap::Default => None,
            MemoryHeap::Upload | MemoryHeap::Readback => {
                let mut data = std::ptr::null_mut();
                unsafe { resource.Map(0, None, Some(&mut data)) }
                    .map_err(|e| map_hr_error("ID3D12Resource::Map", e))?;
                Some(
                    NonNull::new(data as *mut u8)
                        .ok_or_else(|| engine_err!(LOG_SOURCE, "Map returned a null pointer for '{}'", desc.name))?,
                )
            }
        };

        engine_trace!(
            LOG_SOURCE,
            "Buffer '{}' created ({} bytes, {:?})",
            desc.name, desc.size(), desc.heap
        );

        Ok(Self {
            resource,
            heap: desc.heap,
            size: desc.size(),
            mapped,
        })
    }

    pub fn resource(&self) -> &ID3D12Resource {
        &self.resource
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn gpu_address(&self) -> u64 {
        unsafe { self.resource.GetGPUVirtualAddress() }
    }
}

impl BufferBackend for Dx12Buffer {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn map(&self) -> Result<NonNull<u8>> {
        match self.mapped {
            Some(ptr) => Ok(ptr),
            None => engine_bail!(LOG_SOURCE, "Buffers in the {:?} heap cannot be mapped", self.heap),
        }
    }

    fn unmap(&self) {}
}

impl Drop for Dx12Buffer {
    fn drop(&mut self) {
        if self.mapped.is_some() {
            unsafe { self.resource.Unmap(0, None) };
        }
    }
}

#[cfg(test)]
#[path = "dx12_buffer_tests.rs"]
mod tests;
