/// Sampler - VkSampler built from a SamplerDesc
///
/// Also used for the immutable samplers of resource layouts.

use ash::vk;
use prism_rhi::prism::rhi::{SamplerBackend, SamplerDesc};
use prism_rhi::prism::Result;
use std::any::Any;
use std::sync::Arc;

use crate::vulkan_context::{map_vk_error, GpuContext};
use crate::vulkan_format::{address_mode, border_color, compare_op, filter, mipmap_mode};

/// Create a raw VkSampler; anisotropy is clamped to the device limit
pub(crate) fn create_vk_sampler(ctx: &GpuContext, desc: &SamplerDesc) -> Result<vk::Sampler> {
    let anisotropy = (desc.max_anisotropy as f32).min(ctx.max_sampler_anisotropy);
    let mut create_info = vk::SamplerCreateInfo::default()
        .mag_filter(filter(desc.mag_filter))
        .min_filter(filter(desc.min_filter))
        .mipmap_mode(mipmap_mode(desc.mip_filter))
        .address_mode_u(address_mode(desc.address_u))
        .address_mode_v(address_mode(desc.address_v))
        .address_mode_w(address_mode(desc.address_w))
        .mip_lod_bias(desc.mip_lod_bias)
        .anisotropy_enable(anisotropy > 1.0)
        .max_anisotropy(anisotropy.max(1.0))
        .min_lod(desc.min_lod)
        .max_lod(desc.max_lod)
        .border_color(border_color(desc.border_color))
        .unnormalized_coordinates(false);
    if let Some(op) = desc.compare {
        create_info = create_info.compare_enable(true).compare_op(compare_op(op));
    }

    unsafe { ctx.device.create_sampler(&create_info, None) }
        .map_err(|e| map_vk_error("vkCreateSampler", e))
}

pub struct VulkanSampler {
    ctx: Arc<GpuContext>,
    pub(crate) sampler: vk::Sampler,
}

impl VulkanSampler {
    pub(crate) fn new(ctx: Arc<GpuContext>, desc: &SamplerDesc) -> Result<Self> {
        let sampler = create_vk_sampler(&ctx, desc)?;
        Ok(Self { ctx, sampler })
    }

    pub fn sampler(&self) -> vk::Sampler {
        self.sampler
    }
}

impl SamplerBackend for VulkanSampler {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanSampler {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_sampler(self.sampler, None);
        }
    }
}
