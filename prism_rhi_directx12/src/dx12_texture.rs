/// Dx12Texture - committed ID3D12Resource for textures and swapchain images

use prism_rhi::prism::rhi::{PixelFormat, TextureBackend, TextureDesc, TextureDimension, TextureUsage};
use prism_rhi::prism::Result;
use prism_rhi::{engine_err, engine_trace};
use std::any::Any;
use windows::Win32::Graphics::Direct3D12::{
    ID3D12Resource, D3D12_CLEAR_VALUE, D3D12_CLEAR_VALUE_0, D3D12_DEPTH_STENCIL_VALUE, D3D12_HEAP_FLAG_NONE,
    D3D12_HEAP_PROPERTIES, D3D12_HEAP_TYPE_DEFAULT, D3D12_RESOURCE_DESC, D3D12_RESOURCE_STATE_COMMON,
    D3D12_TEXTURE_LAYOUT_UNKNOWN,
};
use windows::Win32::Graphics::Dxgi::Common::{DXGI_FORMAT, DXGI_SAMPLE_DESC};

use crate::dx12_context::{map_hr_error, set_debug_name, Dx12Context, LOG_SOURCE};
use crate::dx12_format::{pixel_format_to_dxgi, resource_dimension, resource_format, texture_flags};

/// Resource description for a texture
///
/// Cube maps are 2D arrays whose layer count already includes the faces.
pub(crate) fn texture_resource_desc(desc: &TextureDesc) -> D3D12_RESOURCE_DESC {
    let depth_or_array_size = match desc.dimension {
        TextureDimension::Texture3D => desc.depth,
        _ => desc.array_size,
    };
    D3D12_RESOURCE_DESC {
        Dimension: resource_dimension(desc.dimension),
        Alignment: 0,
        Width: desc.width as u64,
        Height: desc.height,
        DepthOrArraySize: depth_or_array_size as u16,
        MipLevels: desc.mip_levels as u16,
        Format: resource_format(desc.format, desc.usage),
        SampleDesc: DXGI_SAMPLE_DESC {
            Count: desc.sample_count,
            Quality: 0,
        },
        Layout: D3D12_TEXTURE_LAYOUT_UNKNOWN,
        Flags: texture_flags(desc.usage),
    }
}

/// Optimized clear value for attachments, `None` for everything else
pub(crate) fn optimized_clear_value(desc: &TextureDesc) -> Option<D3D12_CLEAR_VALUE> {
    let format = pixel_format_to_dxgi(desc.format);
    if desc.usage.contains(TextureUsage::DEPTH_STENCIL) {
        Some(D3D12_CLEAR_VALUE {
            Format: format,
            Anonymous: D3D12_CLEAR_VALUE_0 {
                DepthStencil: D3D12_DEPTH_STENCIL_VALUE { Depth: 1.0, Stencil: 0 },
            },
        })
    } else if desc.usage.contains(TextureUsage::RENDER_TARGET) {
        Some(D3D12_CLEAR_VALUE {
            Format: format,
            Anonymous: D3D12_CLEAR_VALUE_0 { Color: [0.0, 0.0, 0.0, 1.0] },
        })
    } else {
        None
    }
}

/// DirectX 12 implementation of `TextureBackend`
pub struct Dx12Texture {
    resource: ID3D12Resource,
    format: PixelFormat,
    /// Format of the resource itself, typeless for sampled depth textures
    resource_format: DXGI_FORMAT,
    mip_levels: u32,
}

unsafe impl Send for Dx12Texture {}
unsafe impl Sync for Dx12Texture {}

impl Dx12Texture {
    pub(crate) fn new(ctx: &Dx12Context, desc: &TextureDesc) -> Result<Self> {
        let resource_desc = texture_resource_desc(desc);
        let heap = D3D12_HEAP_PROPERTIES {
            Type: D3D12_HEAP_TYPE_DEFAULT,
            ..Default::default()
        };
        let clear_value = optimized_clear_value(desc);

        let mut resource: Option<ID3D12Resource> = None;
        unsafe {
            ctx.device.CreateCommittedResource(
                &heap,
                D3D12_HEAP_FLAG_NONE,
                &resource_desc,
                D3D12_RESOURCE_STATE_COMMON,
                clear_value.as_ref().map(|value| value as *const D3D12_CLEAR_VALUE),
                &mut resource,
            )
        }
        .map_err(|e| map_hr_error("ID3D12Device::CreateCommittedResource (texture)", e))?;
        let resource =
            resource.ok_or_else(|| engine_err!(LOG_SOURCE, "CreateCommittedResource returned no texture"))?;
        set_debug_name(&resource, &desc.name);

        engine_trace!(
            LOG_SOURCE,
            "Texture '{}' created ({}x{}x{}, {} mips, {:?})",
            desc.name, desc.width, desc.height, desc.depth, desc.mip_levels, desc.format
        );

        Ok(Self {
            resource,
            format: desc.format,
            resource_format: resource_desc.Format,
            mip_levels: desc.mip_levels,
        })
    }

    /// Wrap a swapchain buffer
    pub(crate) fn swapchain_image(resource: ID3D12Resource, format: PixelFormat) -> Self {
        Self {
            resource,
            format,
            resource_format: pixel_format_to_dxgi(format),
            mip_levels: 1,
        }
    }

    pub fn resource(&self) -> &ID3D12Resource {
        &self.resource
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub(crate) fn resource_format(&self) -> DXGI_FORMAT {
        self.resource_format
    }

    pub(crate) fn mip_levels(&self) -> u32 {
        self.mip_levels
    }
}

impl TextureBackend for Dx12Texture {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
#[path = "dx12_texture_tests.rs"]
mod tests;
