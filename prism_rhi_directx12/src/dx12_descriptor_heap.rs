/// Dx12DescriptorHeap - ID3D12DescriptorHeap addressed by slot
///
/// Views are written straight into the heap slot the core issued. Shader
/// visible CBV/SRV/UAV and sampler heaps also expose a GPU base address so
/// descriptor tables can point into them.

use prism_rhi::prism::rhi::{
    Buffer, DescriptorHeapBackend, DescriptorHeapDesc, DescriptorHeapType, PixelFormat, Texture,
    TextureDesc, TextureDimension, ViewKind, ViewWrite, CONSTANT_BUFFER_ALIGNMENT,
};
use prism_rhi::prism::{Error, Result};
use prism_rhi::{engine_bail, engine_debug, engine_error};
use std::any::Any;
use std::sync::Arc;
use windows::Win32::Graphics::Direct3D12::*;
use windows::Win32::Graphics::Dxgi::Common::{DXGI_FORMAT_R8G8B8A8_UNORM, DXGI_FORMAT_UNKNOWN};

use crate::dx12_buffer::Dx12Buffer;
use crate::dx12_context::{map_hr_error, set_debug_name, Dx12Context, LOG_SOURCE};
use crate::dx12_format::{descriptor_heap_type, pixel_format_to_dxgi, srv_format};
use crate::dx12_sampler::Dx12Sampler;
use crate::dx12_texture::Dx12Texture;

/// `base + slot * increment`
pub(crate) fn offset_handle(base: u64, slot: u32, increment: u32) -> u64 {
    base + slot as u64 * increment as u64
}

// ===== VIEW DESCRIPTIONS =====

pub(crate) fn texture_srv_desc(desc: &TextureDesc) -> D3D12_SHADER_RESOURCE_VIEW_DESC {
    let mips = desc.mip_levels;
    let (dimension, anonymous) = match desc.dimension {
        TextureDimension::Texture1D if desc.array_size > 1 => (
            D3D12_SRV_DIMENSION_TEXTURE1DARRAY,
            D3D12_SHADER_RESOURCE_VIEW_DESC_0 {
                Texture1DArray: D3D12_TEX1D_ARRAY_SRV {
                    MipLevels: mips,
                    ArraySize: desc.array_size,
                    ..Default::default()
                },
            },
        ),
        TextureDimension::Texture1D => (
            D3D12_SRV_DIMENSION_TEXTURE1D,
            D3D12_SHADER_RESOURCE_VIEW_DESC_0 {
                Texture1D: D3D12_TEX1D_SRV { MipLevels: mips, ..Default::default() },
            },
        ),
        TextureDimension::Texture2D if desc.sample_count > 1 => (
            D3D12_SRV_DIMENSION_TEXTURE2DMS,
            D3D12_SHADER_RESOURCE_VIEW_DESC_0 { Texture2DMS: D3D12_TEX2DMS_SRV::default() },
        ),
        TextureDimension::Texture2D if desc.array_size > 1 => (
            D3D12_SRV_DIMENSION_TEXTURE2DARRAY,
            D3D12_SHADER_RESOURCE_VIEW_DESC_0 {
                Texture2DArray: D3D12_TEX2D_ARRAY_SRV {
                    MipLevels: mips,
                    ArraySize: desc.array_size,
                    ..Default::default()
                },
            },
        ),
        TextureDimension::Texture2D => (
            D3D12_SRV_DIMENSION_TEXTURE2D,
            D3D12_SHADER_RESOURCE_VIEW_DESC_0 {
                Texture2D: D3D12_TEX2D_SRV { MipLevels: mips, ..Default::default() },
            },
        ),
        TextureDimension::Texture3D => (
            D3D12_SRV_DIMENSION_TEXTURE3D,
            D3D12_SHADER_RESOURCE_VIEW_DESC_0 {
                Texture3D: D3D12_TEX3D_SRV { MipLevels: mips, ..Default::default() },
            },
        ),
        TextureDimension::TextureCube if desc.array_size > 6 => (
            D3D12_SRV_DIMENSION_TEXTURECUBEARRAY,
            D3D12_SHADER_RESOURCE_VIEW_DESC_0 {
                TextureCubeArray: D3D12_TEXCUBE_ARRAY_SRV {
                    MipLevels: mips,
                    NumCubes: desc.array_size / 6,
                    ..Default::default()
                },
            },
        ),
        TextureDimension::TextureCube => (
            D3D12_SRV_DIMENSION_TEXTURECUBE,
            D3D12_SHADER_RESOURCE_VIEW_DESC_0 {
                TextureCube: D3D12_TEXCUBE_SRV { MipLevels: mips, ..Default::default() },
            },
        ),
    };
    D3D12_SHADER_RESOURCE_VIEW_DESC {
        Format: srv_format(desc.format),
        ViewDimension: dimension,
        Shader4ComponentMapping: D3D12_DEFAULT_SHADER_4_COMPONENT_MAPPING,
        Anonymous: anonymous,
    }
}

/// Storage view of mip 0; cube maps are written as 2D arrays
pub(crate) fn texture_uav_desc(desc: &TextureDesc) -> D3D12_UNORDERED_ACCESS_VIEW_DESC {
    let (dimension, anonymous) = match desc.dimension {
        TextureDimension::Texture1D if desc.array_size > 1 => (
            D3D12_UAV_DIMENSION_TEXTURE1DARRAY,
            D3D12_UNORDERED_ACCESS_VIEW_DESC_0 {
                Texture1DArray: D3D12_TEX1D_ARRAY_UAV {
                    ArraySize: desc.array_size,
                    ..Default::default()
                },
            },
        ),
        TextureDimension::Texture1D => (
            D3D12_UAV_DIMENSION_TEXTURE1D,
            D3D12_UNORDERED_ACCESS_VIEW_DESC_0 { Texture1D: D3D12_TEX1D_UAV::default() },
        ),
        TextureDimension::Texture2D | TextureDimension::TextureCube if desc.array_size > 1 => (
            D3D12_UAV_DIMENSION_TEXTURE2DARRAY,
            D3D12_UNORDERED_ACCESS_VIEW_DESC_0 {
                Texture2DArray: D3D12_TEX2D_ARRAY_UAV {
                    ArraySize: desc.array_size,
                    ..Default::default()
                },
            },
        ),
        TextureDimension::Texture2D | TextureDimension::TextureCube => (
            D3D12_UAV_DIMENSION_TEXTURE2D,
            D3D12_UNORDERED_ACCESS_VIEW_DESC_0 { Texture2D: D3D12_TEX2D_UAV::default() },
        ),
        TextureDimension::Texture3D => (
            D3D12_UAV_DIMENSION_TEXTURE3D,
            D3D12_UNORDERED_ACCESS_VIEW_DESC_0 {
                Texture3D: D3D12_TEX3D_UAV {
                    MipSlice: 0,
                    FirstWSlice: 0,
                    WSize: desc.depth,
                },
            },
        ),
    };
    D3D12_UNORDERED_ACCESS_VIEW_DESC {
        Format: pixel_format_to_dxgi(desc.format),
        ViewDimension: dimension,
        Anonymous: anonymous,
    }
}

pub(crate) fn dsv_desc(format: PixelFormat, sample_count: u32) -> D3D12_DEPTH_STENCIL_VIEW_DESC {
    let (dimension, anonymous) = if sample_count > 1 {
        (
            D3D12_DSV_DIMENSION_TEXTURE2DMS,
            D3D12_DEPTH_STENCIL_VIEW_DESC_0 { Texture2DMS: D3D12_TEX2DMS_DSV::default() },
        )
    } else {
        (
            D3D12_DSV_DIMENSION_TEXTURE2D,
            D3D12_DEPTH_STENCIL_VIEW_DESC_0 { Texture2D: D3D12_TEX2D_DSV { MipSlice: 0 } },
        )
    };
    D3D12_DEPTH_STENCIL_VIEW_DESC {
        Format: pixel_format_to_dxgi(format),
        ViewDimension: dimension,
        Flags: D3D12_DSV_FLAG_NONE,
        Anonymous: anonymous,
    }
}

/// Structured buffer SRV over every element
pub(crate) fn buffer_srv_desc(stride: u64, count: u64) -> D3D12_SHADER_RESOURCE_VIEW_DESC {
    D3D12_SHADER_RESOURCE_VIEW_DESC {
        Format: DXGI_FORMAT_UNKNOWN,
        ViewDimension: D3D12_SRV_DIMENSION_BUFFER,
        Shader4ComponentMapping: D3D12_DEFAULT_SHADER_4_COMPONENT_MAPPING,
        Anonymous: D3D12_SHADER_RESOURCE_VIEW_DESC_0 {
            Buffer: D3D12_BUFFER_SRV {
                FirstElement: 0,
                NumElements: count as u32,
                StructureByteStride: stride as u32,
                Flags: D3D12_BUFFER_SRV_FLAG_NONE,
            },
        },
    }
}

/// Structured buffer UAV over every element, no counter
pub(crate) fn buffer_uav_desc(stride: u64, count: u64) -> D3D12_UNORDERED_ACCESS_VIEW_DESC {
    D3D12_UNORDERED_ACCESS_VIEW_DESC {
        Format: DXGI_FORMAT_UNKNOWN,
        ViewDimension: D3D12_UAV_DIMENSION_BUFFER,
        Anonymous: D3D12_UNORDERED_ACCESS_VIEW_DESC_0 {
            Buffer: D3D12_BUFFER_UAV {
                FirstElement: 0,
                NumElements: count as u32,
                StructureByteStride: stride as u32,
                CounterOffsetInBytes: 0,
                Flags: D3D12_BUFFER_UAV_FLAG_NONE,
            },
        },
    }
}

/// Constant buffer views cover whole 256-byte blocks
pub(crate) fn cbv_size(size: u64) -> u32 {
    (size.div_ceil(CONSTANT_BUFFER_ALIGNMENT) * CONSTANT_BUFFER_ALIGNMENT) as u32
}

// ===== HEAP =====

/// DirectX 12 implementation of `DescriptorHeapBackend`
pub struct Dx12DescriptorHeap {
    ctx: Arc<Dx12Context>,
    heap: ID3D12DescriptorHeap,
    heap_type: DescriptorHeapType,
    cpu_start: u64,
    gpu_start: Option<u64>,
    increment: u32,
    capacity: u32,
    name: String,
}

unsafe impl Send for Dx12DescriptorHeap {}
unsafe impl Sync for Dx12DescriptorHeap {}

impl Dx12DescriptorHeap {
    pub(crate) fn new(ctx: Arc<Dx12Context>, desc: &DescriptorHeapDesc) -> Result<Self> {
        let native_type = descriptor_heap_type(desc.heap_type);
        let heap_desc = D3D12_DESCRIPTOR_HEAP_DESC {
            Type: native_type,
            NumDescriptors: desc.capacity,
            Flags: if desc.shader_visible {
                D3D12_DESCRIPTOR_HEAP_FLAG_SHADER_VISIBLE
            } else {
                D3D12_DESCRIPTOR_HEAP_FLAG_NONE
            },
            NodeMask: 0,
        };
        let heap: ID3D12DescriptorHeap = unsafe { ctx.device.CreateDescriptorHeap(&heap_desc) }
            .map_err(|e| map_hr_error("ID3D12Device::CreateDescriptorHeap", e))?;
        set_debug_name(&heap, &desc.name);

        let increment = unsafe { ctx.device.GetDescriptorHandleIncrementSize(native_type) };
        let cpu_start = unsafe { heap.GetCPUDescriptorHandleForHeapStart() }.ptr as u64;
        let gpu_start = desc
            .shader_visible
            .then(|| unsafe { heap.GetGPUDescriptorHandleForHeapStart() }.ptr);

        engine_debug!(
            LOG_SOURCE,
            "Descriptor heap '{}' created ({:?}, {} slots, shader visible: {})",
            desc.name, desc.heap_type, desc.capacity, desc.shader_visible
        );

        Ok(Self {
            ctx,
            heap,
            heap_type: desc.heap_type,
            cpu_start,
            gpu_start,
            increment,
            capacity: desc.capacity,
            name: desc.name.clone(),
        })
    }

    pub fn heap(&self) -> &ID3D12DescriptorHeap {
        &self.heap
    }

    fn check_slot(&self, slot: u32) -> Result<()> {
        if slot >= self.capacity {
            engine_error!(LOG_SOURCE, "Heap '{}': slot {} >= capacity {}", self.name, slot, self.capacity);
            return Err(Error::DescriptorHandleOutOfRange {
                offset: slot,
                capacity: self.capacity,
            });
        }
        Ok(())
    }

    pub(crate) fn cpu_handle(&self, slot: u32) -> Result<D3D12_CPU_DESCRIPTOR_HANDLE> {
        self.check_slot(slot)?;
        Ok(D3D12_CPU_DESCRIPTOR_HANDLE {
            ptr: offset_handle(self.cpu_start, slot, self.increment) as usize,
        })
    }

    pub(crate) fn gpu_handle(&self, slot: u32) -> Result<D3D12_GPU_DESCRIPTOR_HANDLE> {
        self.check_slot(slot)?;
        match self.gpu_start {
            Some(base) => Ok(D3D12_GPU_DESCRIPTOR_HANDLE {
                ptr: offset_handle(base, slot, self.increment),
            }),
            None => engine_bail!(LOG_SOURCE, "Heap '{}' is not shader visible", self.name),
        }
    }

    fn write_texture(&self, handle: D3D12_CPU_DESCRIPTOR_HANDLE, kind: ViewKind, texture: &Texture) -> Result<()> {
        let Some(native) = texture.backend_as::<Dx12Texture>() else {
            engine_bail!(LOG_SOURCE, "Texture '{}' was not created by the DirectX 12 backend", texture.name());
        };
        let resource = native.resource();
        let desc = texture.desc();
        let device = &self.ctx.device;
        unsafe {
            match kind {
                ViewKind::RenderTarget => device.CreateRenderTargetView(resource, None, handle),
                ViewKind::DepthStencil => {
                    let view = dsv_desc(desc.format, desc.sample_count);
                    device.CreateDepthStencilView(resource, Some(&view), handle)
                }
                ViewKind::ShaderResource => {
                    let view = texture_srv_desc(desc);
                    device.CreateShaderResourceView(resource, Some(&view), handle)
                }
                ViewKind::UnorderedAccess => {
                    let view = texture_uav_desc(desc);
                    device.CreateUnorderedAccessView(resource, None, Some(&view), handle)
                }
                ViewKind::ConstantBuffer | ViewKind::Sampler => {
                    engine_bail!(LOG_SOURCE, "{:?} views cannot be created on texture '{}'", kind, texture.name())
                }
            }
        }
        Ok(())
    }

    fn write_buffer(&self, handle: D3D12_CPU_DESCRIPTOR_HANDLE, kind: ViewKind, buffer: &Buffer) -> Result<()> {
        let Some(native) = buffer.backend_as::<Dx12Buffer>() else {
            engine_bail!(LOG_SOURCE, "Buffer '{}' was not created by the DirectX 12 backend", buffer.name());
        };
        let device = &self.ctx.device;
        unsafe {
            match kind {
                ViewKind::ConstantBuffer => {
                    let view = D3D12_CONSTANT_BUFFER_VIEW_DESC {
                        BufferLocation: native.gpu_address(),
                        SizeInBytes: cbv_size(buffer.size()),
                    };
                    device.CreateConstantBufferView(Some(&view), handle)
                }
                ViewKind::ShaderResource => {
                    let view = buffer_srv_desc(buffer.stride(), buffer.count());
                    device.CreateShaderResourceView(native.resource(), Some(&view), handle)
                }
                ViewKind::UnorderedAccess => {
                    let view = buffer_uav_desc(buffer.stride(), buffer.count());
                    device.CreateUnorderedAccessView(native.resource(), None, Some(&view), handle)
                }
                ViewKind::RenderTarget | ViewKind::DepthStencil | ViewKind::Sampler => {
                    engine_bail!(LOG_SOURCE, "{:?} views cannot be created on buffer '{}'", kind, buffer.name())
                }
            }
        }
        Ok(())
    }
}

impl DescriptorHeapBackend for Dx12DescriptorHeap {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn descriptor_size(&self) -> u32 {
        self.increment
    }

    fn cpu_base(&self) -> u64 {
        self.cpu_start
    }

    fn gpu_base(&self) -> Option<u64> {
        self.gpu_start
    }

    fn write_view(&self, slot: u32, write: &ViewWrite<'_>) -> Result<()> {
        if DescriptorHeapType::for_view(write.kind()) != self.heap_type {
            engine_bail!(
                LOG_SOURCE,
                "{:?} view cannot be written into {:?} heap '{}'",
                write.kind(), self.heap_type, self.name
            );
        }
        let handle = self.cpu_handle(slot)?;
        match write {
            ViewWrite::Texture { kind, texture } => self.write_texture(handle, *kind, texture),
            ViewWrite::Buffer { kind, buffer } => self.write_buffer(handle, *kind, buffer),
            ViewWrite::Sampler { sampler } => {
                let Some(native) = sampler.backend_as::<Dx12Sampler>() else {
                    engine_bail!(LOG_SOURCE, "Sampler was not created by the DirectX 12 backend");
                };
                unsafe { self.ctx.device.CreateSampler(native.desc(), handle) };
                Ok(())
            }
        }
    }

    fn clear_slot(&self, slot: u32) {
        // Null descriptors are only written to CBV/SRV/UAV heaps
        if self.heap_type != DescriptorHeapType::CbvSrvUav {
            return;
        }
        let Ok(handle) = self.cpu_handle(slot) else {
            return;
        };
        let null_view = D3D12_SHADER_RESOURCE_VIEW_DESC {
            Format: DXGI_FORMAT_R8G8B8A8_UNORM,
            ViewDimension: D3D12_SRV_DIMENSION_TEXTURE2D,
            Shader4ComponentMapping: D3D12_DEFAULT_SHADER_4_COMPONENT_MAPPING,
            Anonymous: D3D12_SHADER_RESOURCE_VIEW_DESC_0 {
                Texture2D: D3D12_TEX2D_SRV { MipLevels: 1, ..Default::default() },
            },
        };
        unsafe {
            self.ctx
                .device
                .CreateShaderResourceView(None::<&ID3D12Resource>, Some(&null_view), handle)
        };
    }
}

#[cfg(test)]
#[path = "dx12_descriptor_heap_tests.rs"]
mod tests;
