/// Dx12Device - DeviceBackend factory over a shared Dx12Context

use prism_rhi::prism::rhi::{
    BufferBackend, BufferDesc, CommandAllocatorBackend, CommandListBackend, CommandListType, CommandQueueBackend,
    ComputePipelineDesc, DescriptorHeapBackend, DescriptorHeapDesc, DeviceBackend, FenceBackend,
    GraphicsPipelineDesc, PipelineStateBackend, RenderPassBackend, RenderPassDesc, ResourceLayoutBackend,
    ResourceLayoutDesc, SamplerBackend, SamplerDesc, SwapchainBackend, SwapchainDesc, TextureBackend, TextureDesc,
};
use prism_rhi::prism::Result;
use std::any::Any;
use std::sync::Arc;

use crate::dx12_buffer::Dx12Buffer;
use crate::dx12_command_list::{Dx12CommandAllocator, Dx12CommandList};
use crate::dx12_command_queue::Dx12CommandQueue;
use crate::dx12_context::Dx12Context;
use crate::dx12_descriptor_heap::Dx12DescriptorHeap;
use crate::dx12_fence::Dx12Fence;
use crate::dx12_pipeline::Dx12Pipeline;
use crate::dx12_render_pass::Dx12RenderPass;
use crate::dx12_resource_layout::Dx12ResourceLayout;
use crate::dx12_sampler::Dx12Sampler;
use crate::dx12_swapchain::Dx12Swapchain;
use crate::dx12_texture::Dx12Texture;

/// DirectX 12 implementation of `DeviceBackend`
pub struct Dx12Device {
    ctx: Arc<Dx12Context>,
}

impl Dx12Device {
    pub(crate) fn new(ctx: Arc<Dx12Context>) -> Self {
        Self { ctx }
    }
}

impl DeviceBackend for Dx12Device {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn create_fence(&self, initial_value: u64) -> Result<Box<dyn FenceBackend>> {
        Ok(Box::new(Dx12Fence::new(&self.ctx.device, initial_value)?))
    }

    fn create_command_queue(&self, queue_type: CommandListType) -> Result<Box<dyn CommandQueueBackend>> {
        Ok(Box::new(Dx12CommandQueue::new(Arc::clone(&self.ctx), queue_type)))
    }

    fn create_command_allocator(&self, list_type: CommandListType) -> Result<Box<dyn CommandAllocatorBackend>> {
        Ok(Box::new(Dx12CommandAllocator::new(&self.ctx, list_type)?))
    }

    fn create_command_list(
        &self,
        list_type: CommandListType,
        allocator: &dyn CommandAllocatorBackend,
        name: &str,
    ) -> Result<Box<dyn CommandListBackend>> {
        Ok(Box::new(Dx12CommandList::new(&self.ctx, list_type, allocator, name)?))
    }

    fn create_swapchain(
        &self,
        queue: &dyn CommandQueueBackend,
        desc: &SwapchainDesc,
    ) -> Result<Box<dyn SwapchainBackend>> {
        Ok(Box::new(Dx12Swapchain::new(Arc::clone(&self.ctx), queue, desc)?))
    }

    fn create_descriptor_heap(&self, desc: &DescriptorHeapDesc) -> Result<Box<dyn DescriptorHeapBackend>> {
        Ok(Box::new(Dx12DescriptorHeap::new(Arc::clone(&self.ctx), desc)?))
    }

    fn create_buffer(&self, desc: &BufferDesc) -> Result<Box<dyn BufferBackend>> {
        Ok(Box::new(Dx12Buffer::new(&self.ctx, desc)?))
    }

    fn create_texture(&self, desc: &TextureDesc) -> Result<Box<dyn TextureBackend>> {
        Ok(Box::new(Dx12Texture::new(&self.ctx, desc)?))
    }

    fn create_sampler(&self, desc: &SamplerDesc) -> Result<Box<dyn SamplerBackend>> {
        Ok(Box::new(Dx12Sampler::new(desc)))
    }

    fn create_render_pass(&self, desc: &RenderPassDesc) -> Result<Box<dyn RenderPassBackend>> {
        Ok(Box::new(Dx12RenderPass::new(desc)))
    }

    fn create_resource_layout(&self, desc: &ResourceLayoutDesc) -> Result<Box<dyn ResourceLayoutBackend>> {
        Ok(Box::new(Dx12ResourceLayout::new(&self.ctx, desc)?))
    }

    fn create_graphics_pipeline(&self, desc: &GraphicsPipelineDesc) -> Result<Box<dyn PipelineStateBackend>> {
        Ok(Box::new(Dx12Pipeline::new_graphics(&self.ctx, desc)?))
    }

    fn create_compute_pipeline(&self, desc: &ComputePipelineDesc) -> Result<Box<dyn PipelineStateBackend>> {
        Ok(Box::new(Dx12Pipeline::new_compute(&self.ctx, desc)?))
    }

    fn wait_idle(&self) -> Result<()> {
        self.ctx.wait_all_queues_idle()
    }
}
