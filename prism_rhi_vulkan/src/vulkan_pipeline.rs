/// PipelineState - graphics and compute VkPipelines
///
/// Graphics pipelines target dynamic rendering (no VkRenderPass): the
/// attachment formats come from the RenderPass object. Viewport and scissor
/// are dynamic state.

use ash::vk;
use prism_rhi::prism::rhi::{
    ComputePipelineDesc, GraphicsPipelineDesc, PipelineStateBackend, RenderPass, ResourceLayout, ShaderBytecode,
    ShaderStage,
};
use prism_rhi::prism::{Error, Result};
use prism_rhi::engine_bail;
use std::any::Any;
use std::ffi::CString;
use std::io::Cursor;
use std::sync::Arc;

use crate::vulkan_context::{map_vk_error, GpuContext, LOG_SOURCE};
use crate::vulkan_format::{
    blend_factor, blend_op, color_write_mask, compare_op, cull_mode, front_face, input_rate, pixel_format_to_vk,
    polygon_mode, topology,
};
use crate::vulkan_render_pass::VulkanRenderPass;
use crate::vulkan_resource_layout::VulkanResourceLayout;

/// Decode SPIR-V bytecode into words (handles either endianness)
pub(crate) fn spirv_words(code: &[u8]) -> Result<Vec<u32>> {
    ash::util::read_spv(&mut Cursor::new(code))
        .map_err(|e| Error::InvalidResource(format!("invalid SPIR-V bytecode: {}", e)))
}

fn shader_stage(stage: ShaderStage) -> vk::ShaderStageFlags {
    match stage {
        ShaderStage::Vertex => vk::ShaderStageFlags::VERTEX,
        ShaderStage::Pixel => vk::ShaderStageFlags::FRAGMENT,
        ShaderStage::Compute => vk::ShaderStageFlags::COMPUTE,
    }
}

/// Shader module destroyed when dropped (pipelines do not keep modules)
struct ShaderModule<'a> {
    ctx: &'a GpuContext,
    module: vk::ShaderModule,
    stage: vk::ShaderStageFlags,
    entry_point: CString,
}

impl<'a> ShaderModule<'a> {
    fn new(ctx: &'a GpuContext, shader: &ShaderBytecode) -> Result<Self> {
        let words = spirv_words(&shader.code)?;
        let entry_point = CString::new(shader.entry_point.as_str())
            .map_err(|_| Error::InvalidResource(format!("entry point '{}' contains a NUL byte", shader.entry_point)))?;
        let create_info = vk::ShaderModuleCreateInfo::default().code(&words);
        let module = unsafe { ctx.device.create_shader_module(&create_info, None) }
            .map_err(|e| map_vk_error("vkCreateShaderModule", e))?;
        Ok(Self {
            ctx,
            module,
            stage: shader_stage(shader.stage),
            entry_point,
        })
    }

    fn stage_info(&self) -> vk::PipelineShaderStageCreateInfo<'_> {
        vk::PipelineShaderStageCreateInfo::default()
            .stage(self.stage)
            .module(self.module)
            .name(&self.entry_point)
    }
}

impl Drop for ShaderModule<'_> {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_shader_module(self.module, None);
        }
    }
}

fn vulkan_layout(layout: &ResourceLayout) -> Result<&VulkanResourceLayout> {
    match layout.backend_as::<VulkanResourceLayout>() {
        Some(layout) => Ok(layout),
        None => engine_bail!(LOG_SOURCE, "Resource layout was not created by the Vulkan backend"),
    }
}

fn vulkan_render_pass(render_pass: &RenderPass) -> Result<&VulkanRenderPass> {
    match render_pass.backend_as::<VulkanRenderPass>() {
        Some(render_pass) => Ok(render_pass),
        None => engine_bail!(LOG_SOURCE, "Render pass was not created by the Vulkan backend"),
    }
}

pub struct VulkanPipeline {
    ctx: Arc<GpuContext>,
    pub(crate) pipeline: vk::Pipeline,
    pub(crate) bind_point: vk::PipelineBindPoint,
}

impl VulkanPipeline {
    pub(crate) fn new_graphics(ctx: Arc<GpuContext>, desc: &GraphicsPipelineDesc) -> Result<Self> {
        let layout = vulkan_layout(&desc.resource_layout)?;
        let render_pass = vulkan_render_pass(&desc.render_pass)?;

        let vertex = ShaderModule::new(&ctx, &desc.vertex_shader)?;
        let pixel = desc
            .pixel_shader
            .as_ref()
            .map(|shader| ShaderModule::new(&ctx, shader))
            .transpose()?;
        let mut stages = vec![vertex.stage_info()];
        if let Some(pixel) = &pixel {
            stages.push(pixel.stage_info());
        }

        let vertex_bindings: Vec<vk::VertexInputBindingDescription> = desc
            .vertex_buffers
            .iter()
            .map(|layout| vk::VertexInputBindingDescription {
                binding: layout.slot,
                stride: layout.stride,
                input_rate: input_rate(layout.input_rate),
            })
            .collect();
        let vertex_attributes: Vec<vk::VertexInputAttributeDescription> = desc
            .input_elements
            .iter()
            .map(|element| vk::VertexInputAttributeDescription {
                location: element.location,
                binding: element.buffer_slot,
                format: pixel_format_to_vk(element.format),
                offset: element.offset,
            })
            .collect();
        let vertex_input_state = vk::PipelineVertexInputStateCreateInfo::default()
            .vertex_binding_descriptions(&vertex_bindings)
            .vertex_attribute_descriptions(&vertex_attributes);

        let input_assembly_state = vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(topology(desc.topology))
            .primitive_restart_enable(false);

        // Counts only, the values are dynamic
        let viewport_state = vk::PipelineViewportStateCreateInfo::default()
            .viewport_count(1)
            .scissor_count(1);

        let rasterizer = &desc.rasterizer;
        let depth_bias = rasterizer.depth_bias != 0 || rasterizer.slope_scaled_depth_bias != 0.0;
        let rasterization_state = vk::PipelineRasterizationStateCreateInfo::default()
            .depth_clamp_enable(!rasterizer.depth_clip)
            .rasterizer_discard_enable(false)
            .polygon_mode(polygon_mode(rasterizer.fill_mode))
            .line_width(1.0)
            .cull_mode(cull_mode(rasterizer.cull_mode))
            .front_face(front_face(rasterizer.front_face))
            .depth_bias_enable(depth_bias)
            .depth_bias_constant_factor(rasterizer.depth_bias as f32)
            .depth_bias_slope_factor(rasterizer.slope_scaled_depth_bias);

        let depth_stencil_state = vk::PipelineDepthStencilStateCreateInfo::default()
            .depth_test_enable(desc.depth_stencil.depth_test)
            .depth_write_enable(desc.depth_stencil.depth_write)
            .depth_compare_op(compare_op(desc.depth_stencil.depth_compare))
            .depth_bounds_test_enable(false)
            .stencil_test_enable(false);

        let multisample_state = vk::PipelineMultisampleStateCreateInfo::default()
            .sample_shading_enable(false)
            .rasterization_samples(render_pass.samples());

        let blend = &desc.blend;
        let blend_attachment = vk::PipelineColorBlendAttachmentState::default()
            .blend_enable(blend.enabled)
            .src_color_blend_factor(blend_factor(blend.src_color))
            .dst_color_blend_factor(blend_factor(blend.dst_color))
            .color_blend_op(blend_op(blend.color_op))
            .src_alpha_blend_factor(blend_factor(blend.src_alpha))
            .dst_alpha_blend_factor(blend_factor(blend.dst_alpha))
            .alpha_blend_op(blend_op(blend.alpha_op))
            .color_write_mask(color_write_mask(blend.write_mask));
        let blend_attachments = vec![blend_attachment; render_pass.color_attachments.len()];
        let color_blend_state = vk::PipelineColorBlendStateCreateInfo::default()
            .logic_op_enable(false)
            .attachments(&blend_attachments);

        let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic_state = vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&dynamic_states);

        let color_formats = render_pass.color_formats();
        let depth_format = render_pass.depth_format();
        let stencil_format = if render_pass.has_stencil { depth_format } else { vk::Format::UNDEFINED };
        let mut rendering_info = vk::PipelineRenderingCreateInfo::default()
            .color_attachment_formats(&color_formats)
            .depth_attachment_format(depth_format)
            .stencil_attachment_format(stencil_format);

        let create_info = vk::GraphicsPipelineCreateInfo::default()
            .push_next(&mut rendering_info)
            .stages(&stages)
            .vertex_input_state(&vertex_input_state)
            .input_assembly_state(&input_assembly_state)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization_state)
            .depth_stencil_state(&depth_stencil_state)
            .multisample_state(&multisample_state)
            .color_blend_state(&color_blend_state)
            .dynamic_state(&dynamic_state)
            .layout(layout.pipeline_layout);

        let pipelines = unsafe {
            ctx.device
                .create_graphics_pipelines(vk::PipelineCache::null(), &[create_info], None)
        }
        .map_err(|(_, e)| map_vk_error("vkCreateGraphicsPipelines", e))?;

        drop(stages);
        drop(vertex);
        drop(pixel);
        Ok(Self {
            pipeline: pipelines[0],
            bind_point: vk::PipelineBindPoint::GRAPHICS,
            ctx,
        })
    }

    pub(crate) fn new_compute(ctx: Arc<GpuContext>, desc: &ComputePipelineDesc) -> Result<Self> {
        let layout = vulkan_layout(&desc.resource_layout)?;
        let compute = ShaderModule::new(&ctx, &desc.compute_shader)?;
        let create_info = vk::ComputePipelineCreateInfo::default()
            .stage(compute.stage_info())
            .layout(layout.pipeline_layout);

        let pipelines = unsafe {
            ctx.device
                .create_compute_pipelines(vk::PipelineCache::null(), &[create_info], None)
        }
        .map_err(|(_, e)| map_vk_error("vkCreateComputePipelines", e))?;

        drop(compute);
        Ok(Self {
            pipeline: pipelines[0],
            bind_point: vk::PipelineBindPoint::COMPUTE,
            ctx,
        })
    }

    pub fn pipeline(&self) -> vk::Pipeline {
        self.pipeline
    }
}

impl PipelineStateBackend for VulkanPipeline {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanPipeline {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_pipeline(self.pipeline, None);
        }
    }
}

#[cfg(test)]
#[path = "vulkan_pipeline_tests.rs"]
mod tests;
