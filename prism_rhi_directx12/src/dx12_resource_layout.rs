/// Dx12ResourceLayout - root signature with one descriptor table per element
///
/// Element `i` of the layout is root parameter `i`, a table holding a single
/// descriptor at the element's register and space. `bind_view` points that
/// table at the view's slot in a shader visible heap.

use prism_rhi::prism::rhi::{ResourceLayoutBackend, ResourceLayoutDesc, ResourceLayoutElement};
use prism_rhi::prism::{Error, Result};
use prism_rhi::{engine_debug, engine_err, engine_error};
use std::any::Any;
use windows::Win32::Graphics::Direct3D::ID3DBlob;
use windows::Win32::Graphics::Direct3D12::{
    D3D12SerializeRootSignature, ID3D12RootSignature, D3D12_DESCRIPTOR_RANGE, D3D12_ROOT_DESCRIPTOR_TABLE,
    D3D12_ROOT_PARAMETER, D3D12_ROOT_PARAMETER_0, D3D12_ROOT_PARAMETER_TYPE_DESCRIPTOR_TABLE,
    D3D12_ROOT_SIGNATURE_DESC, D3D12_ROOT_SIGNATURE_FLAG_ALLOW_INPUT_ASSEMBLER_INPUT_LAYOUT,
    D3D12_STATIC_SAMPLER_DESC, D3D_ROOT_SIGNATURE_VERSION_1,
};

use crate::dx12_context::{map_hr_error, set_debug_name, Dx12Context, LOG_SOURCE};
use crate::dx12_format::{descriptor_range_type, shader_visibility};
use crate::dx12_sampler::static_sampler_desc;

pub(crate) fn descriptor_range(element: &ResourceLayoutElement) -> D3D12_DESCRIPTOR_RANGE {
    D3D12_DESCRIPTOR_RANGE {
        RangeType: descriptor_range_type(element.kind),
        NumDescriptors: 1,
        BaseShaderRegister: element.register,
        RegisterSpace: element.space,
        OffsetInDescriptorsFromTableStart: 0,
    }
}

/// Root parameters pointing into `ranges`, which must outlive serialization
pub(crate) fn root_parameters(
    elements: &[ResourceLayoutElement],
    ranges: &[D3D12_DESCRIPTOR_RANGE],
) -> Vec<D3D12_ROOT_PARAMETER> {
    elements
        .iter()
        .zip(ranges)
        .map(|(element, range)| D3D12_ROOT_PARAMETER {
            ParameterType: D3D12_ROOT_PARAMETER_TYPE_DESCRIPTOR_TABLE,
            Anonymous: D3D12_ROOT_PARAMETER_0 {
                DescriptorTable: D3D12_ROOT_DESCRIPTOR_TABLE {
                    NumDescriptorRanges: 1,
                    pDescriptorRanges: range,
                },
            },
            ShaderVisibility: shader_visibility(element.visibility),
        })
        .collect()
}

fn blob_bytes(blob: &ID3DBlob) -> &[u8] {
    unsafe { std::slice::from_raw_parts(blob.GetBufferPointer() as *const u8, blob.GetBufferSize()) }
}

/// DirectX 12 implementation of `ResourceLayoutBackend`
pub struct Dx12ResourceLayout {
    root_signature: ID3D12RootSignature,
    table_count: u32,
}

unsafe impl Send for Dx12ResourceLayout {}
unsafe impl Sync for Dx12ResourceLayout {}

impl Dx12ResourceLayout {
    pub(crate) fn new(ctx: &Dx12Context, desc: &ResourceLayoutDesc) -> Result<Self> {
        let ranges: Vec<D3D12_DESCRIPTOR_RANGE> = desc.elements.iter().map(descriptor_range).collect();
        let parameters = root_parameters(&desc.elements, &ranges);
        let static_samplers: Vec<D3D12_STATIC_SAMPLER_DESC> =
            desc.static_samplers.iter().map(static_sampler_desc).collect();

        let root_desc = D3D12_ROOT_SIGNATURE_DESC {
            NumParameters: parameters.len() as u32,
            pParameters: parameters.as_ptr(),
            NumStaticSamplers: static_samplers.len() as u32,
            pStaticSamplers: static_samplers.as_ptr(),
            Flags: D3D12_ROOT_SIGNATURE_FLAG_ALLOW_INPUT_ASSEMBLER_INPUT_LAYOUT,
        };

        let mut blob: Option<ID3DBlob> = None;
        let mut error_blob: Option<ID3DBlob> = None;
        let serialized = unsafe {
            D3D12SerializeRootSignature(&root_desc, D3D_ROOT_SIGNATURE_VERSION_1, &mut blob, Some(&mut error_blob))
        };
        if let Err(e) = serialized {
            let details = error_blob
                .as_ref()
                .map(|b| String::from_utf8_lossy(blob_bytes(b)).trim_end_matches('\0').to_string())
                .unwrap_or_else(|| e.message());
            engine_error!(LOG_SOURCE, "Resource layout '{}' rejected: {}", desc.name, details);
            return Err(Error::InvalidResource(format!("resource layout '{}': {}", desc.name, details)));
        }
        let blob = blob.ok_or_else(|| engine_err!(LOG_SOURCE, "Root signature serialization returned no blob"))?;

        let root_signature: ID3D12RootSignature = unsafe { ctx.device.CreateRootSignature(0, blob_bytes(&blob)) }
            .map_err(|e| map_hr_error("ID3D12Device::CreateRootSignature", e))?;
        set_debug_name(&root_signature, &desc.name);

        engine_debug!(
            LOG_SOURCE,
            "Resource layout '{}' created ({} tables, {} static samplers)",
            desc.name, parameters.len(), static_samplers.len()
        );

        Ok(Self {
            root_signature,
            table_count: parameters.len() as u32,
        })
    }

    pub fn root_signature(&self) -> &ID3D12RootSignature {
        &self.root_signature
    }

    pub fn table_count(&self) -> u32 {
        self.table_count
    }
}

impl ResourceLayoutBackend for Dx12ResourceLayout {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
#[path = "dx12_resource_layout_tests.rs"]
mod tests;
