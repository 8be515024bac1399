/// Device - factory for every RHI object
///
/// Each factory validates its descriptor before the backend sees it, so
/// backends only ever receive well-formed requests. The device owns the
/// default descriptor heaps that all views created through it live in.

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;
use crate::config::RhiConfig;
use crate::error::{Error, Result};
use crate::rhi::{
    AdapterInfo, Buffer, BufferBackend, BufferDesc, CommandAllocator, CommandAllocatorBackend,
    CommandList, CommandListBackend, CommandListType, CommandQueue, CommandQueueBackend,
    ComputePipelineDesc, DescriptorHeap, DescriptorHeapBackend, DescriptorHeapDesc,
    DescriptorHeapType, Fence, FenceBackend, FrameBuffer, FrameBufferDesc, GraphicsPipelineDesc,
    PipelineState, PipelineStateBackend, RenderPass, RenderPassBackend, RenderPassDesc,
    ResourceLayout, ResourceLayoutBackend, ResourceLayoutDesc, ResourceView, Sampler,
    SamplerBackend, SamplerDesc, Swapchain, SwapchainBackend, SwapchainDesc, Texture,
    TextureBackend, TextureDesc, ViewHeaps, ViewKind, ViewResource,
};
use crate::{engine_debug, engine_error};

/// Backend part of a device (ID3D12Device, VkDevice)
pub trait DeviceBackend: Send + Sync {
    fn as_any(&self) -> &dyn Any;

    fn create_fence(&self, initial_value: u64) -> Result<Box<dyn FenceBackend>>;
    fn create_command_queue(&self, queue_type: CommandListType) -> Result<Box<dyn CommandQueueBackend>>;
    fn create_command_allocator(&self, list_type: CommandListType) -> Result<Box<dyn CommandAllocatorBackend>>;
    fn create_command_list(
        &self,
        list_type: CommandListType,
        allocator: &dyn CommandAllocatorBackend,
        name: &str,
    ) -> Result<Box<dyn CommandListBackend>>;
    fn create_swapchain(
        &self,
        queue: &dyn CommandQueueBackend,
        desc: &SwapchainDesc,
    ) -> Result<Box<dyn SwapchainBackend>>;
    fn create_descriptor_heap(&self, desc: &DescriptorHeapDesc) -> Result<Box<dyn DescriptorHeapBackend>>;
    fn create_buffer(&self, desc: &BufferDesc) -> Result<Box<dyn BufferBackend>>;
    fn create_texture(&self, desc: &TextureDesc) -> Result<Box<dyn TextureBackend>>;
    fn create_sampler(&self, desc: &SamplerDesc) -> Result<Box<dyn SamplerBackend>>;
    fn create_render_pass(&self, desc: &RenderPassDesc) -> Result<Box<dyn RenderPassBackend>>;
    fn create_resource_layout(&self, desc: &ResourceLayoutDesc) -> Result<Box<dyn ResourceLayoutBackend>>;
    fn create_graphics_pipeline(&self, desc: &GraphicsPipelineDesc) -> Result<Box<dyn PipelineStateBackend>>;
    fn create_compute_pipeline(&self, desc: &ComputePipelineDesc) -> Result<Box<dyn PipelineStateBackend>>;

    /// Block until every queue of the device is idle
    fn wait_idle(&self) -> Result<()>;
}

/// Logical GPU device
pub struct Device {
    adapter_info: AdapterInfo,
    fence_timeout: Duration,
    heaps: ViewHeaps,
    backend: Box<dyn DeviceBackend>,
}

fn invalid(error: Error) -> Error {
    engine_error!("prism::Device", "{}", error);
    error
}

impl Device {
    pub(crate) fn new(adapter_info: AdapterInfo, config: &RhiConfig, backend: Box<dyn DeviceBackend>) -> Result<Self> {
        let sizes = &config.descriptor_heaps;
        let create_heap = |heap_type, capacity, shader_visible, name: &str| -> Result<Arc<DescriptorHeap>> {
            let desc = DescriptorHeapDesc {
                heap_type,
                capacity,
                shader_visible,
                name: name.to_string(),
            };
            desc.validate()?;
            let heap_backend = backend.create_descriptor_heap(&desc)?;
            Ok(Arc::new(DescriptorHeap::new(desc, heap_backend)))
        };
        let heaps = ViewHeaps {
            render_target: create_heap(DescriptorHeapType::RenderTarget, sizes.render_target, false, "default_rtv")?,
            depth_stencil: create_heap(DescriptorHeapType::DepthStencil, sizes.depth_stencil, false, "default_dsv")?,
            cbv_srv_uav: create_heap(DescriptorHeapType::CbvSrvUav, sizes.cbv_srv_uav(), true, "default_cbv_srv_uav")?,
            sampler: create_heap(DescriptorHeapType::Sampler, sizes.max_sampler, true, "default_sampler")?,
        };

        Ok(Self {
            adapter_info,
            fence_timeout: config.fence_timeout,
            heaps,
            backend,
        })
    }

    pub fn adapter_info(&self) -> &AdapterInfo {
        &self.adapter_info
    }

    /// Timeout applied to every fence created by this device
    pub fn fence_timeout(&self) -> Duration {
        self.fence_timeout
    }

    /// Default heaps views are created in
    pub fn view_heaps(&self) -> &ViewHeaps {
        &self.heaps
    }

    pub fn descriptor_heap(&self, heap_type: DescriptorHeapType) -> &Arc<DescriptorHeap> {
        match heap_type {
            DescriptorHeapType::RenderTarget => &self.heaps.render_target,
            DescriptorHeapType::DepthStencil => &self.heaps.depth_stencil,
            DescriptorHeapType::CbvSrvUav => &self.heaps.cbv_srv_uav,
            DescriptorHeapType::Sampler => &self.heaps.sampler,
        }
    }

    // ===== SYNCHRONIZATION AND SUBMISSION =====

    pub fn create_fence(&self, name: impl Into<String>, initial_value: u64) -> Result<Arc<Fence>> {
        let backend = self.backend.create_fence(initial_value)?;
        Ok(Arc::new(Fence::new(name, initial_value, self.fence_timeout, backend)))
    }

    /// Create the queue of `queue_type` together with its fence
    pub fn create_command_queue(&self, queue_type: CommandListType) -> Result<CommandQueue> {
        let fence = self.create_fence(format!("{:?} queue fence", queue_type), 0)?;
        let backend = self.backend.create_command_queue(queue_type)?;
        engine_debug!("prism::Device", "{:?} command queue created", queue_type);
        Ok(CommandQueue::new(queue_type, fence, backend))
    }

    /// Create a command list with its own allocator
    pub fn create_command_list(&self, list_type: CommandListType, name: impl Into<String>) -> Result<CommandList> {
        let name = name.into();
        let allocator = CommandAllocator::new(list_type, self.backend.create_command_allocator(list_type)?);
        let backend = self.backend.create_command_list(list_type, allocator.backend(), &name)?;
        Ok(CommandList::new(list_type, name, allocator, backend))
    }

    /// Create a swapchain presenting from `queue`
    pub fn create_swapchain(&self, queue: &CommandQueue, desc: &SwapchainDesc) -> Result<Swapchain> {
        if queue.queue_type() != CommandListType::Graphics {
            return Err(invalid(Error::InvalidState(format!(
                "swapchains present from the graphics queue, not {:?}",
                queue.queue_type()
            ))));
        }
        if desc.window.width == 0 || desc.window.height == 0 {
            return Err(invalid(Error::InitializationFailed(format!(
                "swapchain window is {}x{}",
                desc.window.width, desc.window.height
            ))));
        }
        if !(2..=3).contains(&desc.buffer_count) || desc.vsync_interval > 4 {
            return Err(invalid(Error::InitializationFailed(format!(
                "swapchain needs 2 or 3 buffers and vsync 0..=4 (got {} and {})",
                desc.buffer_count, desc.vsync_interval
            ))));
        }
        if desc.format.is_depth() || desc.format == crate::rhi::PixelFormat::Unknown {
            return Err(invalid(Error::InitializationFailed(format!(
                "{:?} is not a presentable format",
                desc.format
            ))));
        }
        let backend = self.backend.create_swapchain(queue.backend(), desc)?;
        Swapchain::new(desc, backend)
    }

    pub fn create_descriptor_heap(&self, desc: DescriptorHeapDesc) -> Result<Arc<DescriptorHeap>> {
        desc.validate().map_err(invalid)?;
        let backend = self.backend.create_descriptor_heap(&desc)?;
        Ok(Arc::new(DescriptorHeap::new(desc, backend)))
    }

    // ===== RESOURCES =====

    pub fn create_buffer(&self, desc: BufferDesc) -> Result<Arc<Buffer>> {
        desc.validate().map_err(invalid)?;
        let backend = self.backend.create_buffer(&desc)?;
        Ok(Arc::new(Buffer::new(desc, backend)))
    }

    pub fn create_texture(&self, desc: TextureDesc) -> Result<Arc<Texture>> {
        desc.validate().map_err(invalid)?;
        let backend = self.backend.create_texture(&desc)?;
        Ok(Arc::new(Texture::new(desc, backend)))
    }

    pub fn create_sampler(&self, desc: SamplerDesc) -> Result<Arc<Sampler>> {
        desc.validate().map_err(invalid)?;
        let backend = self.backend.create_sampler(&desc)?;
        Ok(Arc::new(Sampler::new(desc, backend)))
    }

    pub fn create_render_pass(&self, desc: RenderPassDesc) -> Result<Arc<RenderPass>> {
        desc.validate().map_err(invalid)?;
        let backend = self.backend.create_render_pass(&desc)?;
        Ok(Arc::new(RenderPass::new(desc, backend)))
    }

    pub fn create_resource_layout(&self, desc: ResourceLayoutDesc) -> Result<Arc<ResourceLayout>> {
        desc.validate().map_err(invalid)?;
        let backend = self.backend.create_resource_layout(&desc)?;
        Ok(Arc::new(ResourceLayout::new(desc, backend)))
    }

    pub fn create_graphics_pipeline(&self, desc: &GraphicsPipelineDesc) -> Result<Arc<PipelineState>> {
        desc.validate().map_err(invalid)?;
        let backend = self.backend.create_graphics_pipeline(desc)?;
        engine_debug!("prism::Device", "Graphics pipeline '{}' created", desc.name);
        Ok(Arc::new(PipelineState::graphics(desc, backend)))
    }

    pub fn create_compute_pipeline(&self, desc: &ComputePipelineDesc) -> Result<Arc<PipelineState>> {
        desc.validate().map_err(invalid)?;
        let backend = self.backend.create_compute_pipeline(desc)?;
        engine_debug!("prism::Device", "Compute pipeline '{}' created", desc.name);
        Ok(Arc::new(PipelineState::compute(desc, backend)))
    }

    /// Frame buffer with views in the default heaps
    pub fn create_frame_buffer(&self, desc: FrameBufferDesc) -> Result<FrameBuffer> {
        FrameBuffer::new(&self.heaps, desc)
    }

    /// Frame buffer with views in caller-owned heaps
    pub fn create_frame_buffer_in(&self, heaps: &ViewHeaps, desc: FrameBufferDesc) -> Result<FrameBuffer> {
        FrameBuffer::new(heaps, desc)
    }

    // ===== VIEWS =====

    fn resource_view<'a>(&self, kind: ViewKind, resource: ViewResource<'a>) -> Result<ResourceView> {
        match resource {
            ViewResource::Texture(texture) => self.heaps.texture_view(kind, texture),
            ViewResource::Buffer(buffer) => self.heaps.buffer_view(kind, buffer),
        }
    }

    pub fn create_shader_resource_view<'a>(&self, resource: impl Into<ViewResource<'a>>) -> Result<ResourceView> {
        self.resource_view(ViewKind::ShaderResource, resource.into())
    }

    pub fn create_unordered_access_view<'a>(&self, resource: impl Into<ViewResource<'a>>) -> Result<ResourceView> {
        self.resource_view(ViewKind::UnorderedAccess, resource.into())
    }

    pub fn create_render_target_view(&self, texture: &Arc<Texture>) -> Result<ResourceView> {
        self.heaps.texture_view(ViewKind::RenderTarget, texture)
    }

    pub fn create_depth_stencil_view(&self, texture: &Arc<Texture>) -> Result<ResourceView> {
        self.heaps.texture_view(ViewKind::DepthStencil, texture)
    }

    pub fn create_constant_buffer_view(&self, buffer: &Arc<Buffer>) -> Result<ResourceView> {
        self.heaps.buffer_view(ViewKind::ConstantBuffer, buffer)
    }

    pub fn create_sampler_view(&self, sampler: &Arc<Sampler>) -> Result<ResourceView> {
        self.heaps.sampler_view(sampler)
    }

    /// Block until the GPU finished all submitted work
    pub fn wait_idle(&self) -> Result<()> {
        self.backend.wait_idle()
    }

    pub fn backend(&self) -> &dyn DeviceBackend {
        self.backend.as_ref()
    }

    /// Downcast the backend part to its concrete type
    pub fn backend_as<T: 'static>(&self) -> Option<&T> {
        self.backend.as_any().downcast_ref::<T>()
    }
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("adapter", &self.adapter_info.name)
            .field("fence_timeout", &self.fence_timeout)
            .finish()
    }
}

#[cfg(test)]
#[path = "device_tests.rs"]
mod tests;
