/// VulkanDevice - DeviceBackend factory over a shared GpuContext

use prism_rhi::prism::rhi::{
    BufferBackend, BufferDesc, CommandAllocatorBackend, CommandListBackend, CommandListType, CommandQueueBackend,
    ComputePipelineDesc, DescriptorHeapBackend, DescriptorHeapDesc, DeviceBackend, FenceBackend,
    GraphicsPipelineDesc, PipelineStateBackend, RenderPassBackend, RenderPassDesc, ResourceLayoutBackend,
    ResourceLayoutDesc, SamplerBackend, SamplerDesc, SwapchainBackend, SwapchainDesc, TextureBackend, TextureDesc,
};
use prism_rhi::prism::Result;
use prism_rhi::engine_trace;
use std::any::Any;
use std::sync::Arc;

use crate::vulkan_buffer::VulkanBuffer;
use crate::vulkan_command_list::{VulkanCommandAllocator, VulkanCommandList};
use crate::vulkan_command_queue::VulkanCommandQueue;
use crate::vulkan_context::{map_vk_error, GpuContext, LOG_SOURCE};
use crate::vulkan_descriptor_heap::VulkanDescriptorHeap;
use crate::vulkan_fence::VulkanFence;
use crate::vulkan_pipeline::VulkanPipeline;
use crate::vulkan_render_pass::VulkanRenderPass;
use crate::vulkan_resource_layout::VulkanResourceLayout;
use crate::vulkan_sampler::VulkanSampler;
use crate::vulkan_swapchain::VulkanSwapchain;
use crate::vulkan_texture::VulkanTexture;

/// Vulkan implementation of `DeviceBackend`
pub struct VulkanDevice {
    ctx: Arc<GpuContext>,
}

impl VulkanDevice {
    pub(crate) fn new(ctx: Arc<GpuContext>) -> Self {
        Self { ctx }
    }
}

impl DeviceBackend for VulkanDevice {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn create_fence(&self, initial_value: u64) -> Result<Box<dyn FenceBackend>> {
        Ok(Box::new(VulkanFence::new(Arc::clone(&self.ctx), initial_value)?))
    }

    fn create_command_queue(&self, queue_type: CommandListType) -> Result<Box<dyn CommandQueueBackend>> {
        engine_trace!(LOG_SOURCE, "{:?} queue on family {}", queue_type, self.ctx.queue_family(queue_type));
        Ok(Box::new(VulkanCommandQueue::new(Arc::clone(&self.ctx), queue_type)))
    }

    fn create_command_allocator(&self, list_type: CommandListType) -> Result<Box<dyn CommandAllocatorBackend>> {
        Ok(Box::new(VulkanCommandAllocator::new(Arc::clone(&self.ctx), list_type)?))
    }

    fn create_command_list(
        &self,
        _list_type: CommandListType,
        allocator: &dyn CommandAllocatorBackend,
        name: &str,
    ) -> Result<Box<dyn CommandListBackend>> {
        Ok(Box::new(VulkanCommandList::new(Arc::clone(&self.ctx), allocator, name)?))
    }

    fn create_swapchain(
        &self,
        queue: &dyn CommandQueueBackend,
        desc: &SwapchainDesc,
    ) -> Result<Box<dyn SwapchainBackend>> {
        Ok(Box::new(VulkanSwapchain::new(Arc::clone(&self.ctx), queue, desc)?))
    }

    fn create_descriptor_heap(&self, desc: &DescriptorHeapDesc) -> Result<Box<dyn DescriptorHeapBackend>> {
        Ok(Box::new(VulkanDescriptorHeap::new(Arc::clone(&self.ctx), desc)))
    }

    fn create_buffer(&self, desc: &BufferDesc) -> Result<Box<dyn BufferBackend>> {
        Ok(Box::new(VulkanBuffer::new(Arc::clone(&self.ctx), desc)?))
    }

    fn create_texture(&self, desc: &TextureDesc) -> Result<Box<dyn TextureBackend>> {
        Ok(Box::new(VulkanTexture::new(Arc::clone(&self.ctx), desc)?))
    }

    fn create_sampler(&self, desc: &SamplerDesc) -> Result<Box<dyn SamplerBackend>> {
        Ok(Box::new(VulkanSampler::new(Arc::clone(&self.ctx), desc)?))
    }

    fn create_render_pass(&self, desc: &RenderPassDesc) -> Result<Box<dyn RenderPassBackend>> {
        Ok(Box::new(VulkanRenderPass::new(desc)))
    }

    fn create_resource_layout(&self, desc: &ResourceLayoutDesc) -> Result<Box<dyn ResourceLayoutBackend>> {
        Ok(Box::new(VulkanResourceLayout::new(Arc::clone(&self.ctx), desc)?))
    }

    fn create_graphics_pipeline(&self, desc: &GraphicsPipelineDesc) -> Result<Box<dyn PipelineStateBackend>> {
        Ok(Box::new(VulkanPipeline::new_graphics(Arc::clone(&self.ctx), desc)?))
    }

    fn create_compute_pipeline(&self, desc: &ComputePipelineDesc) -> Result<Box<dyn PipelineStateBackend>> {
        Ok(Box::new(VulkanPipeline::new_compute(Arc::clone(&self.ctx), desc)?))
    }

    fn wait_idle(&self) -> Result<()> {
        unsafe { self.ctx.device.device_wait_idle() }.map_err(|e| map_vk_error("vkDeviceWaitIdle", e))
    }
}
