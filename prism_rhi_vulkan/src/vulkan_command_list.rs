/// CommandAllocator and CommandList - VkCommandPool / VkCommandBuffer recording
///
/// The allocator owns a command pool and counts its resets. A list takes a
/// command buffer from the pool every time it begins: buffers recorded since
/// the last reset may still be pending on the GPU (mid-frame flushes), so
/// they only become reusable once the pool generation has moved on.
///
/// Render passes use dynamic rendering; bindings are pushed with
/// VK_KHR_push_descriptor, one write per bound view.

use ash::vk;
use prism_rhi::prism::rhi::{
    Buffer, ClearValue, CommandAllocatorBackend, CommandListBackend, CommandListType, DescriptorHeap, FrameBuffer,
    IndexFormat, PipelineKind, PipelineState, RenderPass, ResourceBarrier, ResourceLayout, ResourceState,
    ResourceView, ScissorRect, Texture, TextureDesc, TextureSubresource, VertexBufferBinding, Viewport,
};
use prism_rhi::prism::Result;
use prism_rhi::{engine_bail, engine_trace};
use std::any::Any;
use std::sync::{Arc, Mutex};

use crate::vulkan_buffer::VulkanBuffer;
use crate::vulkan_context::{lock, map_vk_error, GpuContext, LOG_SOURCE};
use crate::vulkan_descriptor_heap::{Slot, VulkanDescriptorHeap};
use crate::vulkan_format::{index_type, state_access};
use crate::vulkan_pipeline::VulkanPipeline;
use crate::vulkan_render_pass::VulkanRenderPass;
use crate::vulkan_resource_layout::VulkanResourceLayout;
use crate::vulkan_texture::VulkanTexture;

// ===== HELPERS =====

/// Viewport with the Y axis flipped so clip space matches DirectX 12
pub(crate) fn flipped_viewport(viewport: &Viewport) -> vk::Viewport {
    vk::Viewport {
        x: viewport.x,
        y: viewport.y + viewport.height,
        width: viewport.width,
        height: -viewport.height,
        min_depth: viewport.min_depth,
        max_depth: viewport.max_depth,
    }
}

pub(crate) fn clear_value(value: &ClearValue) -> vk::ClearValue {
    match *value {
        ClearValue::Color(float32) => vk::ClearValue {
            color: vk::ClearColorValue { float32 },
        },
        ClearValue::DepthStencil { depth, stencil } => vk::ClearValue {
            depth_stencil: vk::ClearDepthStencilValue {
                depth,
                stencil: u32::from(stencil),
            },
        },
    }
}

/// Copy region for one subresource uploaded with `TextureDesc::upload_row_pitch`
pub(crate) fn upload_copy_region(
    desc: &TextureDesc,
    subresource: TextureSubresource,
    src_offset: u64,
) -> vk::BufferImageCopy {
    let (width, height, depth) = desc.mip_extent(subresource.mip);
    let bytes_per_pixel = desc.format.bytes_per_pixel().max(1);
    vk::BufferImageCopy {
        buffer_offset: src_offset,
        buffer_row_length: desc.upload_row_pitch(subresource.mip) / bytes_per_pixel,
        buffer_image_height: height,
        image_subresource: vk::ImageSubresourceLayers {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            mip_level: subresource.mip,
            base_array_layer: subresource.layer,
            layer_count: 1,
        },
        image_offset: vk::Offset3D::default(),
        image_extent: vk::Extent3D { width, height, depth },
    }
}

fn bind_point(kind: PipelineKind) -> vk::PipelineBindPoint {
    match kind {
        PipelineKind::Graphics => vk::PipelineBindPoint::GRAPHICS,
        PipelineKind::Compute => vk::PipelineBindPoint::COMPUTE,
    }
}

fn vulkan_buffer(buffer: &Buffer) -> Result<&VulkanBuffer> {
    match buffer.backend_as::<VulkanBuffer>() {
        Some(buffer) => Ok(buffer),
        None => engine_bail!(LOG_SOURCE, "Buffer '{}' was not created by the Vulkan backend", buffer.name()),
    }
}

fn vulkan_texture(texture: &Texture) -> Result<&VulkanTexture> {
    match texture.backend_as::<VulkanTexture>() {
        Some(texture) => Ok(texture),
        None => engine_bail!(LOG_SOURCE, "Texture '{}' was not created by the Vulkan backend", texture.name()),
    }
}

fn attachment_view(view: &ResourceView) -> Result<vk::ImageView> {
    match view.heap().backend_as::<VulkanDescriptorHeap>() {
        Some(heap) => heap.image_view(view.slot()),
        None => engine_bail!(LOG_SOURCE, "Descriptor heap was not created by the Vulkan backend"),
    }
}

// ===== ALLOCATOR =====

/// Command pool shared by an allocator and the lists recorded through it
pub(crate) struct CommandPool {
    ctx: Arc<GpuContext>,
    pool: vk::CommandPool,
    /// Incremented by every reset
    generation: Mutex<u64>,
}

impl Drop for CommandPool {
    fn drop(&mut self) {
        unsafe {
            // Frees every command buffer allocated from the pool
            self.ctx.device.destroy_command_pool(self.pool, None);
        }
    }
}

pub struct VulkanCommandAllocator {
    pool: Arc<CommandPool>,
}

impl VulkanCommandAllocator {
    pub(crate) fn new(ctx: Arc<GpuContext>, list_type: CommandListType) -> Result<Self> {
        let create_info = vk::CommandPoolCreateInfo::default()
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
            .queue_family_index(ctx.queue_family(list_type));
        let pool = unsafe { ctx.device.create_command_pool(&create_info, None) }
            .map_err(|e| map_vk_error("vkCreateCommandPool", e))?;
        Ok(Self {
            pool: Arc::new(CommandPool {
                ctx,
                pool,
                generation: Mutex::new(0),
            }),
        })
    }
}

impl CommandAllocatorBackend for VulkanCommandAllocator {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn reset(&self) -> Result<()> {
        let mut generation = lock(&self.pool.generation);
        unsafe {
            self.pool
                .ctx
                .device
                .reset_command_pool(self.pool.pool, vk::CommandPoolResetFlags::empty())
        }
        .map_err(|e| map_vk_error("vkResetCommandPool", e))?;
        *generation += 1;
        Ok(())
    }
}

// ===== COMMAND LIST =====

pub struct VulkanCommandList {
    ctx: Arc<GpuContext>,
    pool: Arc<CommandPool>,
    name: String,
    current: vk::CommandBuffer,
    /// Buffers begun since the pool generation below
    used: Vec<vk::CommandBuffer>,
    /// Buffers reset with the pool, ready to be recorded again
    free: Vec<vk::CommandBuffer>,
    generation: u64,
}

impl VulkanCommandList {
    pub(crate) fn new(ctx: Arc<GpuContext>, allocator: &dyn CommandAllocatorBackend, name: &str) -> Result<Self> {
        let Some(allocator) = allocator.as_any().downcast_ref::<VulkanCommandAllocator>() else {
            engine_bail!(LOG_SOURCE, "Command allocator was not created by the Vulkan backend");
        };
        let generation = *lock(&allocator.pool.generation);
        Ok(Self {
            ctx,
            pool: Arc::clone(&allocator.pool),
            name: name.to_string(),
            current: vk::CommandBuffer::null(),
            used: Vec::new(),
            free: Vec::new(),
            generation,
        })
    }

    /// Command buffer of the current (or last) recording
    pub fn command_buffer(&self) -> vk::CommandBuffer {
        self.current
    }

    fn next_command_buffer(&mut self) -> Result<vk::CommandBuffer> {
        if let Some(buffer) = self.free.pop() {
            return Ok(buffer);
        }
        let allocate_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(self.pool.pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);
        let buffers = unsafe { self.ctx.device.allocate_command_buffers(&allocate_info) }
            .map_err(|e| map_vk_error("vkAllocateCommandBuffers", e))?;
        engine_trace!(LOG_SOURCE, "Command list '{}' allocated command buffer #{}", self.name, self.used.len() + 1);
        Ok(buffers[0])
    }
}

impl CommandListBackend for VulkanCommandList {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn begin(&mut self, allocator: &dyn CommandAllocatorBackend) -> Result<()> {
        let same_pool = allocator
            .as_any()
            .downcast_ref::<VulkanCommandAllocator>()
            .is_some_and(|allocator| Arc::ptr_eq(&allocator.pool, &self.pool));
        if !same_pool {
            engine_bail!(LOG_SOURCE, "Command list '{}' begun with a foreign allocator", self.name);
        }

        // The pool stays locked while a buffer is taken from it and begun
        let pool = Arc::clone(&self.pool);
        let generation = lock(&pool.generation);
        if *generation != self.generation {
            self.free.append(&mut self.used);
            self.generation = *generation;
        }
        let buffer = self.next_command_buffer()?;
        self.used.push(buffer);
        self.current = buffer;

        let begin_info = vk::CommandBufferBeginInfo::default().flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        unsafe { self.ctx.device.begin_command_buffer(buffer, &begin_info) }
            .map_err(|e| map_vk_error("vkBeginCommandBuffer", e))
    }

    fn end(&mut self) -> Result<()> {
        unsafe { self.ctx.device.end_command_buffer(self.current) }
            .map_err(|e| map_vk_error("vkEndCommandBuffer", e))
    }

    fn resource_barriers(&mut self, barriers: &[ResourceBarrier<'_>]) -> Result<()> {
        let mut image_barriers = Vec::new();
        let mut buffer_barriers = Vec::new();

        for barrier in barriers {
            match barrier {
                ResourceBarrier::Texture { texture, before, after } => {
                    let vk_texture = vulkan_texture(texture)?;
                    let depth = vk_texture.is_depth();
                    let src = state_access(*before, depth);
                    let dst = state_access(*after, depth);
                    let already_initialized = vk_texture.mark_initialized();
                    // Present images and never-written images have no content to keep
                    let old_layout = if *before == ResourceState::Present || !already_initialized {
                        vk::ImageLayout::UNDEFINED
                    } else {
                        src.layout
                    };
                    image_barriers.push(
                        vk::ImageMemoryBarrier2::default()
                            .src_stage_mask(src.stages)
                            .src_access_mask(src.access)
                            .dst_stage_mask(dst.stages)
                            .dst_access_mask(dst.access)
                            .old_layout(old_layout)
                            .new_layout(dst.layout)
                            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                            .image(vk_texture.image)
                            .subresource_range(vk_texture.full_range()),
                    );
                }
                ResourceBarrier::Buffer { buffer, before, after } => {
                    let vk_buffer = vulkan_buffer(buffer)?;
                    let src = state_access(*before, false);
                    let dst = state_access(*after, false);
                    buffer_barriers.push(
                        vk::BufferMemoryBarrier2::default()
                            .src_stage_mask(src.stages)
                            .src_access_mask(src.access)
                            .dst_stage_mask(dst.stages)
                            .dst_access_mask(dst.access)
                            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                            .buffer(vk_buffer.buffer)
                            .offset(0)
                            .size(vk::WHOLE_SIZE),
                    );
                }
            }
        }

        let dependency = vk::DependencyInfo::default()
            .image_memory_barriers(&image_barriers)
            .buffer_memory_barriers(&buffer_barriers);
        unsafe {
            self.ctx.device.cmd_pipeline_barrier2(self.current, &dependency);
        }
        Ok(())
    }

    fn begin_render_pass(
        &mut self,
        _allocator: &dyn CommandAllocatorBackend,
        render_pass: &RenderPass,
        frame_buffer: &FrameBuffer,
        clear_values: &[ClearValue],
    ) -> Result<()> {
        let Some(pass) = render_pass.backend_as::<VulkanRenderPass>() else {
            engine_bail!(LOG_SOURCE, "Render pass was not created by the Vulkan backend");
        };
        let clear_at = |index: usize| clear_values.get(index).map(clear_value).unwrap_or_default();

        let mut color_attachments = Vec::with_capacity(pass.color_attachments.len());
        for (index, ops) in pass.color_attachments.iter().enumerate() {
            let Some(view) = frame_buffer.render_target_view(index) else {
                engine_bail!(LOG_SOURCE, "Frame buffer '{}' has no render target {}", frame_buffer.name(), index);
            };
            color_attachments.push(
                vk::RenderingAttachmentInfo::default()
                    .image_view(attachment_view(view)?)
                    .image_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
                    .load_op(ops.load_op)
                    .store_op(ops.store_op)
                    .clear_value(clear_at(index)),
            );
        }

        let depth_attachment = match (pass.depth_attachment, frame_buffer.depth_stencil_view()) {
            (Some(ops), Some(view)) => Some((
                ops,
                vk::RenderingAttachmentInfo::default()
                    .image_view(attachment_view(view)?)
                    .image_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL)
                    .load_op(ops.load_op)
                    .store_op(ops.store_op)
                    .clear_value(clear_at(color_attachments.len())),
            )),
            _ => None,
        };
        let stencil_attachment = depth_attachment
            .filter(|_| pass.has_stencil)
            .map(|(ops, info)| info.load_op(ops.stencil_load_op).store_op(ops.stencil_store_op));

        let mut rendering_info = vk::RenderingInfo::default()
            .render_area(vk::Rect2D {
                offset: vk::Offset2D::default(),
                extent: vk::Extent2D {
                    width: frame_buffer.width(),
                    height: frame_buffer.height(),
                },
            })
            .layer_count(1)
            .color_attachments(&color_attachments);
        if let Some((_, depth)) = &depth_attachment {
            rendering_info = rendering_info.depth_attachment(depth);
        }
        if let Some(stencil) = &stencil_attachment {
            rendering_info = rendering_info.stencil_attachment(stencil);
        }

        unsafe {
            self.ctx.device.cmd_begin_rendering(self.current, &rendering_info);
        }
        Ok(())
    }

    fn end_render_pass(&mut self) -> Result<()> {
        unsafe {
            self.ctx.device.cmd_end_rendering(self.current);
        }
        Ok(())
    }

    fn set_viewport(&mut self, viewport: &Viewport) -> Result<()> {
        unsafe {
            self.ctx.device.cmd_set_viewport(self.current, 0, &[flipped_viewport(viewport)]);
        }
        Ok(())
    }

    fn set_scissor(&mut self, scissor: &ScissorRect) -> Result<()> {
        let rect = vk::Rect2D {
            offset: vk::Offset2D { x: scissor.x, y: scissor.y },
            extent: vk::Extent2D {
                width: scissor.width,
                height: scissor.height,
            },
        };
        unsafe {
            self.ctx.device.cmd_set_scissor(self.current, 0, &[rect]);
        }
        Ok(())
    }

    fn set_descriptor_heaps(&mut self, _heaps: &[&DescriptorHeap]) -> Result<()> {
        // Push descriptors read the heaps on the CPU at bind time
        Ok(())
    }

    fn set_resource_layout(&mut self, _kind: PipelineKind, layout: &ResourceLayout) -> Result<()> {
        if layout.backend_as::<VulkanResourceLayout>().is_none() {
            engine_bail!(LOG_SOURCE, "Resource layout '{}' was not created by the Vulkan backend", layout.desc().name);
        }
        Ok(())
    }

    fn set_pipeline_state(&mut self, pipeline: &PipelineState) -> Result<()> {
        let Some(vk_pipeline) = pipeline.backend_as::<VulkanPipeline>() else {
            engine_bail!(LOG_SOURCE, "Pipeline '{}' was not created by the Vulkan backend", pipeline.name());
        };
        unsafe {
            self.ctx
                .device
                .cmd_bind_pipeline(self.current, vk_pipeline.bind_point, vk_pipeline.pipeline);
        }
        Ok(())
    }

    fn bind_view(
        &mut self,
        kind: PipelineKind,
        layout: &ResourceLayout,
        element_index: u32,
        view: &ResourceView,
    ) -> Result<()> {
        let Some(vk_layout) = layout.backend_as::<VulkanResourceLayout>() else {
            engine_bail!(LOG_SOURCE, "Resource layout '{}' was not created by the Vulkan backend", layout.desc().name);
        };
        let Some(&descriptor_type) = vk_layout.descriptor_types.get(element_index as usize) else {
            engine_bail!(LOG_SOURCE, "Layout '{}' has no element {}", layout.desc().name, element_index);
        };
        let Some(heap) = view.heap().backend_as::<VulkanDescriptorHeap>() else {
            engine_bail!(LOG_SOURCE, "Descriptor heap was not created by the Vulkan backend");
        };

        let write = vk::WriteDescriptorSet::default()
            .dst_binding(element_index)
            .descriptor_type(descriptor_type);
        let image_info;
        let buffer_info;
        let write = match heap.slot(view.slot()) {
            Slot::Image { view: image_view, layout: image_layout } => {
                image_info = [vk::DescriptorImageInfo::default()
                    .image_view(image_view)
                    .image_layout(image_layout)];
                write.image_info(&image_info)
            }
            Slot::Buffer { buffer, range } => {
                buffer_info = [vk::DescriptorBufferInfo::default().buffer(buffer).offset(0).range(range)];
                write.buffer_info(&buffer_info)
            }
            Slot::Sampler(sampler) => {
                image_info = [vk::DescriptorImageInfo::default().sampler(sampler)];
                write.image_info(&image_info)
            }
            Slot::Empty => {
                engine_bail!(LOG_SOURCE, "Descriptor slot {} is empty", view.slot());
            }
        };

        unsafe {
            self.ctx.push_descriptor.cmd_push_descriptor_set(
                self.current,
                bind_point(kind),
                vk_layout.pipeline_layout,
                0,
                &[write],
            );
        }
        Ok(())
    }

    fn set_vertex_buffers(&mut self, start_slot: u32, bindings: &[VertexBufferBinding<'_>]) -> Result<()> {
        let mut buffers = Vec::with_capacity(bindings.len());
        let mut offsets = Vec::with_capacity(bindings.len());
        for binding in bindings {
            buffers.push(vulkan_buffer(binding.buffer)?.buffer);
            offsets.push(binding.offset);
        }
        unsafe {
            self.ctx
                .device
                .cmd_bind_vertex_buffers(self.current, start_slot, &buffers, &offsets);
        }
        Ok(())
    }

    fn set_index_buffer(&mut self, buffer: &Buffer, offset: u64, format: IndexFormat) -> Result<()> {
        let vk_buffer = vulkan_buffer(buffer)?;
        unsafe {
            self.ctx
                .device
                .cmd_bind_index_buffer(self.current, vk_buffer.buffer, offset, index_type(format));
        }
        Ok(())
    }

    fn draw_instanced(
        &mut self,
        vertex_count: u32,
        instance_count: u32,
        start_vertex: u32,
        start_instance: u32,
    ) -> Result<()> {
        unsafe {
            self.ctx
                .device
                .cmd_draw(self.current, vertex_count, instance_count, start_vertex, start_instance);
        }
        Ok(())
    }

    fn draw_indexed_instanced(
        &mut self,
        index_count: u32,
        instance_count: u32,
        start_index: u32,
        base_vertex: i32,
        start_instance: u32,
    ) -> Result<()> {
        unsafe {
            self.ctx.device.cmd_draw_indexed(
                self.current,
                index_count,
                instance_count,
                start_index,
                base_vertex,
                start_instance,
            );
        }
        Ok(())
    }

    fn dispatch(&mut self, x: u32, y: u32, z: u32) -> Result<()> {
        unsafe {
            self.ctx.device.cmd_dispatch(self.current, x, y, z);
        }
        Ok(())
    }

    fn copy_buffer_region(
        &mut self,
        dst: &Buffer,
        dst_offset: u64,
        src: &Buffer,
        src_offset: u64,
        size: u64,
    ) -> Result<()> {
        let region = vk::BufferCopy {
            src_offset,
            dst_offset,
            size,
        };
        unsafe {
            self.ctx.device.cmd_copy_buffer(
                self.current,
                vulkan_buffer(src)?.buffer,
                vulkan_buffer(dst)?.buffer,
                &[region],
            );
        }
        Ok(())
    }

    fn copy_buffer_to_texture(
        &mut self,
        dst: &Texture,
        subresource: TextureSubresource,
        src: &Buffer,
        src_offset: u64,
    ) -> Result<()> {
        let region = upload_copy_region(dst.desc(), subresource, src_offset);
        unsafe {
            self.ctx.device.cmd_copy_buffer_to_image(
                self.current,
                vulkan_buffer(src)?.buffer,
                vulkan_texture(dst)?.image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &[region],
            );
        }
        Ok(())
    }
}

impl Drop for VulkanCommandList {
    fn drop(&mut self) {
        let buffers: Vec<vk::CommandBuffer> = self.used.drain(..).chain(self.free.drain(..)).collect();
        if buffers.is_empty() {
            return;
        }
        let _guard = lock(&self.pool.generation);
        unsafe {
            self.ctx.device.free_command_buffers(self.pool.pool, &buffers);
        }
    }
}

#[cfg(test)]
#[path = "vulkan_command_list_tests.rs"]
mod tests;
