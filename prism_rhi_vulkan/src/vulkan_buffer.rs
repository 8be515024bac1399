/// Buffer - VkBuffer backed by a gpu-allocator allocation

use ash::vk;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use prism_rhi::prism::rhi::{BufferBackend, BufferDesc};
use prism_rhi::prism::{Error, Result};
use prism_rhi::{engine_bail, engine_error};
use std::any::Any;
use std::ptr::NonNull;
use std::sync::Arc;

use crate::vulkan_context::{map_vk_error, GpuContext, LOG_SOURCE};
use crate::vulkan_format::{buffer_usage, memory_location};

/// Vulkan buffer implementation
///
/// Upload and readback buffers stay persistently mapped; `map` hands out
/// the pointer gpu-allocator mapped at allocation time.
pub struct VulkanBuffer {
    ctx: Arc<GpuContext>,
    pub(crate) buffer: vk::Buffer,
    allocation: Option<Allocation>,
    pub(crate) size: u64,
}

impl VulkanBuffer {
    pub(crate) fn new(ctx: Arc<GpuContext>, desc: &BufferDesc) -> Result<Self> {
        let size = desc.size();
        let (sharing_mode, families) = ctx.sharing();
        let create_info = vk::BufferCreateInfo::default()
            .size(size)
            .usage(buffer_usage(desc.usage))
            .sharing_mode(sharing_mode)
            .queue_family_indices(&families);

        unsafe {
            let buffer = ctx
                .device
                .create_buffer(&create_info, None)
                .map_err(|e| map_vk_error("vkCreateBuffer", e))?;
            let requirements = ctx.device.get_buffer_memory_requirements(buffer);

            let allocation = ctx.allocator().allocate(&AllocationCreateDesc {
                name: if desc.name.is_empty() { "buffer" } else { desc.name.as_str() },
                requirements,
                location: memory_location(desc.heap),
                linear: true,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            });
            let allocation = match allocation {
                Ok(allocation) => allocation,
                Err(e) => {
                    ctx.device.destroy_buffer(buffer, None);
                    engine_error!(LOG_SOURCE, "Out of GPU memory for buffer '{}' ({} bytes): {:?}", desc.name, size, e);
                    return Err(Error::OutOfMemory);
                }
            };

            if let Err(e) = ctx.device.bind_buffer_memory(buffer, allocation.memory(), allocation.offset()) {
                ctx.allocator().free(allocation).ok();
                ctx.device.destroy_buffer(buffer, None);
                return Err(map_vk_error("vkBindBufferMemory", e));
            }

            Ok(Self {
                ctx,
                buffer,
                allocation: Some(allocation),
                size,
            })
        }
    }

    pub fn buffer(&self) -> vk::Buffer {
        self.buffer
    }
}

impl BufferBackend for VulkanBuffer {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn map(&self) -> Result<NonNull<u8>> {
        match self.allocation.as_ref().and_then(|allocation| allocation.mapped_ptr()) {
            Some(ptr) => Ok(ptr.cast::<u8>()),
            None => engine_bail!(LOG_SOURCE, "Buffer is not CPU-accessible"),
        }
    }

    fn unmap(&self) {}
}

impl Drop for VulkanBuffer {
    fn drop(&mut self) {
        unsafe {
            if let Some(allocation) = self.allocation.take() {
                self.ctx.allocator().free(allocation).ok();
            }
            self.ctx.device.destroy_buffer(self.buffer, None);
        }
    }
}
