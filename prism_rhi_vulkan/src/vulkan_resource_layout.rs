/// ResourceLayout - push-descriptor set layout + pipeline layout
///
/// Element `i` of the layout is binding `i` of set 0. Static samplers follow
/// the elements as immutable sampler bindings. Register spaces have no
/// Vulkan counterpart and are ignored.

use ash::vk;
use prism_rhi::prism::rhi::{ResourceLayoutBackend, ResourceLayoutDesc};
use prism_rhi::prism::Result;
use std::any::Any;
use std::sync::Arc;

use crate::vulkan_context::{map_vk_error, GpuContext};
use crate::vulkan_format::{descriptor_type, shader_stages};
use crate::vulkan_sampler::create_vk_sampler;

/// Binding number, descriptor type and stages of every set 0 binding
pub(crate) fn layout_bindings(desc: &ResourceLayoutDesc) -> Vec<(u32, vk::DescriptorType, vk::ShaderStageFlags)> {
    let elements = desc
        .elements
        .iter()
        .map(|element| (descriptor_type(element), shader_stages(element.visibility)));
    let samplers = desc
        .static_samplers
        .iter()
        .map(|sampler| (vk::DescriptorType::SAMPLER, shader_stages(sampler.visibility)));
    elements
        .chain(samplers)
        .enumerate()
        .map(|(binding, (descriptor_type, stages))| (binding as u32, descriptor_type, stages))
        .collect()
}

pub struct VulkanResourceLayout {
    ctx: Arc<GpuContext>,
    pub(crate) set_layout: vk::DescriptorSetLayout,
    pub(crate) pipeline_layout: vk::PipelineLayout,
    /// Descriptor type of each element, indexed like the elements
    pub(crate) descriptor_types: Vec<vk::DescriptorType>,
    static_samplers: Vec<vk::Sampler>,
}

impl VulkanResourceLayout {
    pub(crate) fn new(ctx: Arc<GpuContext>, desc: &ResourceLayoutDesc) -> Result<Self> {
        let mut static_samplers = Vec::with_capacity(desc.static_samplers.len());
        for sampler in &desc.static_samplers {
            match create_vk_sampler(&ctx, &sampler.sampler) {
                Ok(vk_sampler) => static_samplers.push(vk_sampler),
                Err(e) => {
                    destroy_samplers(&ctx, &static_samplers);
                    return Err(e);
                }
            }
        }

        let element_count = desc.elements.len();
        let bindings: Vec<vk::DescriptorSetLayoutBinding<'_>> = layout_bindings(desc)
            .into_iter()
            .map(|(binding, descriptor_type, stages)| {
                let layout_binding = vk::DescriptorSetLayoutBinding::default()
                    .binding(binding)
                    .descriptor_type(descriptor_type)
                    .descriptor_count(1)
                    .stage_flags(stages);
                match (binding as usize).checked_sub(element_count) {
                    Some(index) => layout_binding.immutable_samplers(std::slice::from_ref(&static_samplers[index])),
                    None => layout_binding,
                }
            })
            .collect();

        let set_info = vk::DescriptorSetLayoutCreateInfo::default()
            .flags(vk::DescriptorSetLayoutCreateFlags::PUSH_DESCRIPTOR_KHR)
            .bindings(&bindings);
        let set_layout = match unsafe { ctx.device.create_descriptor_set_layout(&set_info, None) } {
            Ok(layout) => layout,
            Err(e) => {
                destroy_samplers(&ctx, &static_samplers);
                return Err(map_vk_error("vkCreateDescriptorSetLayout", e));
            }
        };

        let set_layouts = [set_layout];
        let layout_info = vk::PipelineLayoutCreateInfo::default().set_layouts(&set_layouts);
        let pipeline_layout = match unsafe { ctx.device.create_pipeline_layout(&layout_info, None) } {
            Ok(layout) => layout,
            Err(e) => {
                unsafe { ctx.device.destroy_descriptor_set_layout(set_layout, None) };
                destroy_samplers(&ctx, &static_samplers);
                return Err(map_vk_error("vkCreatePipelineLayout", e));
            }
        };

        let descriptor_types = desc.elements.iter().map(descriptor_type).collect();
        Ok(Self {
            ctx,
            set_layout,
            pipeline_layout,
            descriptor_types,
            static_samplers,
        })
    }

    pub fn pipeline_layout(&self) -> vk::PipelineLayout {
        self.pipeline_layout
    }
}

fn destroy_samplers(ctx: &GpuContext, samplers: &[vk::Sampler]) {
    for &sampler in samplers {
        unsafe { ctx.device.destroy_sampler(sampler, None) };
    }
}

impl ResourceLayoutBackend for VulkanResourceLayout {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanResourceLayout {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_pipeline_layout(self.pipeline_layout, None);
            self.ctx.device.destroy_descriptor_set_layout(self.set_layout, None);
        }
        destroy_samplers(&self.ctx, &self.static_samplers);
    }
}

#[cfg(test)]
#[path = "vulkan_resource_layout_tests.rs"]
mod tests;
