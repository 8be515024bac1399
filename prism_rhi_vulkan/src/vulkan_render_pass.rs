/// RenderPass - attachment formats and ops for dynamic rendering
///
/// No VkRenderPass is created: passes are recorded with
/// vkCmdBeginRendering and pipelines are built against the attachment
/// formats through VkPipelineRenderingCreateInfo.

use ash::vk;
use prism_rhi::prism::rhi::{AttachmentDesc, RenderPassBackend, RenderPassDesc};
use std::any::Any;

use crate::vulkan_format::{load_op, pixel_format_to_vk, sample_count, store_op};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct AttachmentOps {
    pub format: vk::Format,
    pub samples: vk::SampleCountFlags,
    pub load_op: vk::AttachmentLoadOp,
    pub store_op: vk::AttachmentStoreOp,
    pub stencil_load_op: vk::AttachmentLoadOp,
    pub stencil_store_op: vk::AttachmentStoreOp,
}

impl AttachmentOps {
    fn from_desc(desc: &AttachmentDesc) -> Self {
        Self {
            format: pixel_format_to_vk(desc.format),
            samples: sample_count(desc.samples),
            load_op: load_op(desc.load_op),
            store_op: store_op(desc.store_op),
            stencil_load_op: load_op(desc.stencil_load_op),
            stencil_store_op: store_op(desc.stencil_store_op),
        }
    }
}

pub struct VulkanRenderPass {
    pub(crate) color_attachments: Vec<AttachmentOps>,
    pub(crate) depth_attachment: Option<AttachmentOps>,
    /// Depth attachment carries a stencil aspect
    pub(crate) has_stencil: bool,
}

impl VulkanRenderPass {
    pub(crate) fn new(desc: &RenderPassDesc) -> Self {
        Self {
            color_attachments: desc.color_attachments.iter().map(AttachmentOps::from_desc).collect(),
            depth_attachment: desc.depth_attachment.as_ref().map(AttachmentOps::from_desc),
            has_stencil: desc
                .depth_attachment
                .as_ref()
                .is_some_and(|attachment| attachment.format.has_stencil()),
        }
    }

    pub(crate) fn color_formats(&self) -> Vec<vk::Format> {
        self.color_attachments.iter().map(|attachment| attachment.format).collect()
    }

    pub(crate) fn depth_format(&self) -> vk::Format {
        self.depth_attachment.map_or(vk::Format::UNDEFINED, |attachment| attachment.format)
    }

    /// Rasterization samples shared by every attachment
    pub(crate) fn samples(&self) -> vk::SampleCountFlags {
        self.color_attachments
            .first()
            .or(self.depth_attachment.as_ref())
            .map_or(vk::SampleCountFlags::TYPE_1, |attachment| attachment.samples)
    }
}

impl RenderPassBackend for VulkanRenderPass {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
#[path = "vulkan_render_pass_tests.rs"]
mod tests;
