/// Dx12Sampler - D3D12_SAMPLER_DESC kept until written into a sampler heap

use prism_rhi::prism::rhi::{SamplerBackend, SamplerDesc, StaticSamplerDesc};
use std::any::Any;
use windows::Win32::Graphics::Direct3D12::{
    D3D12_COMPARISON_FUNC_NEVER, D3D12_SAMPLER_DESC, D3D12_STATIC_SAMPLER_DESC,
};

use crate::dx12_format::{
    address_mode, border_color, comparison_func, filter, shader_visibility, static_border_color,
};

pub(crate) fn sampler_desc(desc: &SamplerDesc) -> D3D12_SAMPLER_DESC {
    let max_anisotropy = desc.max_anisotropy.clamp(1, 16);
    D3D12_SAMPLER_DESC {
        Filter: filter(
            desc.min_filter,
            desc.mag_filter,
            desc.mip_filter,
            max_anisotropy,
            desc.compare.is_some(),
        ),
        AddressU: address_mode(desc.address_u),
        AddressV: address_mode(desc.address_v),
        AddressW: address_mode(desc.address_w),
        MipLODBias: desc.mip_lod_bias,
        MaxAnisotropy: max_anisotropy,
        ComparisonFunc: desc.compare.map(comparison_func).unwrap_or(D3D12_COMPARISON_FUNC_NEVER),
        BorderColor: border_color(desc.border_color),
        MinLOD: desc.min_lod,
        MaxLOD: desc.max_lod,
    }
}

/// Root signature sampler; static samplers only support the three fixed border colors
pub(crate) fn static_sampler_desc(desc: &StaticSamplerDesc) -> D3D12_STATIC_SAMPLER_DESC {
    let sampler = sampler_desc(&desc.sampler);
    D3D12_STATIC_SAMPLER_DESC {
        Filter: sampler.Filter,
        AddressU: sampler.AddressU,
        AddressV: sampler.AddressV,
        AddressW: sampler.AddressW,
        MipLODBias: sampler.MipLODBias,
        MaxAnisotropy: sampler.MaxAnisotropy,
        ComparisonFunc: sampler.ComparisonFunc,
        BorderColor: static_border_color(desc.sampler.border_color),
        MinLOD: sampler.MinLOD,
        MaxLOD: sampler.MaxLOD,
        ShaderRegister: desc.register,
        RegisterSpace: desc.space,
        ShaderVisibility: shader_visibility(desc.visibility),
    }
}

/// DirectX 12 implementation of `SamplerBackend`
pub struct Dx12Sampler {
    desc: D3D12_SAMPLER_DESC,
}

impl Dx12Sampler {
    pub(crate) fn new(desc: &SamplerDesc) -> Self {
        Self { desc: sampler_desc(desc) }
    }

    pub fn desc(&self) -> &D3D12_SAMPLER_DESC {
        &self.desc
    }
}

impl SamplerBackend for Dx12Sampler {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
#[path = "dx12_sampler_tests.rs"]
mod tests;
