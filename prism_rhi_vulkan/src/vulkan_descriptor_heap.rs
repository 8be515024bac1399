/// Descriptor heap - CPU-side slot table
///
/// Vulkan has no descriptor heap object. Bindings are pushed into the
/// command buffer with VK_KHR_push_descriptor when a view is bound, so a
/// heap only has to remember what each slot refers to. Texture slots own
/// the VkImageView created for them; it is destroyed when the slot is
/// cleared or overwritten.

use ash::vk;
use prism_rhi::prism::rhi::{DescriptorHeapBackend, DescriptorHeapDesc, ResourceState, ViewKind, ViewWrite};
use prism_rhi::prism::{Error, Result};
use prism_rhi::engine_bail;
use std::any::Any;
use std::sync::{Arc, Mutex};

use crate::vulkan_buffer::VulkanBuffer;
use crate::vulkan_context::{lock, GpuContext, LOG_SOURCE};
use crate::vulkan_format::state_access;
use crate::vulkan_sampler::VulkanSampler;
use crate::vulkan_texture::VulkanTexture;

/// Content of one heap slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Slot {
    Empty,
    Image { view: vk::ImageView, layout: vk::ImageLayout },
    Buffer { buffer: vk::Buffer, range: vk::DeviceSize },
    Sampler(vk::Sampler),
}

/// Layout an image is expected in while a view of `kind` is used
fn view_layout(kind: ViewKind, depth_format: bool) -> vk::ImageLayout {
    match kind {
        ViewKind::RenderTarget => state_access(ResourceState::RenderTarget, false).layout,
        ViewKind::DepthStencil => state_access(ResourceState::DepthStencilWrite, true).layout,
        ViewKind::UnorderedAccess => state_access(ResourceState::UnorderedAccess, depth_format).layout,
        _ => state_access(ResourceState::GeneralRead, depth_format).layout,
    }
}

pub struct VulkanDescriptorHeap {
    ctx: Arc<GpuContext>,
    shader_visible: bool,
    slots: Mutex<Vec<Slot>>,
    /// Address of slot 0; the slot vector never reallocates
    base: u64,
}

impl VulkanDescriptorHeap {
    pub(crate) fn new(ctx: Arc<GpuContext>, desc: &DescriptorHeapDesc) -> Self {
        let slots = vec![Slot::Empty; desc.capacity as usize];
        let base = slots.as_ptr() as u64;
        Self {
            ctx,
            shader_visible: desc.shader_visible,
            slots: Mutex::new(slots),
            base,
        }
    }

    pub(crate) fn slot(&self, slot: u32) -> Slot {
        lock(&self.slots).get(slot as usize).copied().unwrap_or(Slot::Empty)
    }

    /// Image view stored in a render target or depth stencil slot
    pub(crate) fn image_view(&self, slot: u32) -> Result<vk::ImageView> {
        match self.slot(slot) {
            Slot::Image { view, .. } => Ok(view),
            other => engine_bail!(LOG_SOURCE, "Descriptor slot {} holds no image view ({:?})", slot, other),
        }
    }

    fn release(&self, slot: Slot) {
        if let Slot::Image { view, .. } = slot {
            unsafe {
                self.ctx.device.destroy_image_view(view, None);
            }
        }
    }

    fn store(&self, slot: u32, content: Slot) -> Result<()> {
        let previous = {
            let mut slots = lock(&self.slots);
            let capacity = slots.len() as u32;
            match slots.get_mut(slot as usize) {
                Some(entry) => std::mem::replace(entry, content),
                None => {
                    // The new content is never stored, do not leak it
                    self.release(content);
                    return Err(Error::DescriptorHandleOutOfRange { offset: slot, capacity });
                }
            }
        };
        self.release(previous);
        Ok(())
    }
}

impl DescriptorHeapBackend for VulkanDescriptorHeap {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn descriptor_size(&self) -> u32 {
        std::mem::size_of::<Slot>() as u32
    }

    fn cpu_base(&self) -> u64 {
        self.base
    }

    fn gpu_base(&self) -> Option<u64> {
        self.shader_visible.then_some(self.base)
    }

    fn write_view(&self, slot: u32, write: &ViewWrite<'_>) -> Result<()> {
        let content = match write {
            ViewWrite::Texture { kind, texture } => {
                let Some(vk_texture) = texture.backend_as::<VulkanTexture>() else {
                    engine_bail!(LOG_SOURCE, "Texture '{}' was not created by the Vulkan backend", texture.name());
                };
                Slot::Image {
                    view: vk_texture.create_view(*kind)?,
                    layout: view_layout(*kind, vk_texture.is_depth()),
                }
            }
            ViewWrite::Buffer { buffer, .. } => {
                let Some(vk_buffer) = buffer.backend_as::<VulkanBuffer>() else {
                    engine_bail!(LOG_SOURCE, "Buffer '{}' was not created by the Vulkan backend", buffer.name());
                };
                Slot::Buffer {
                    buffer: vk_buffer.buffer,
                    range: vk_buffer.size,
                }
            }
            ViewWrite::Sampler { sampler } => {
                let Some(vk_sampler) = sampler.backend_as::<VulkanSampler>() else {
                    engine_bail!(LOG_SOURCE, "Sampler was not created by the Vulkan backend");
                };
                Slot::Sampler(vk_sampler.sampler)
            }
        };
        self.store(slot, content)
    }

    fn clear_slot(&self, slot: u32) {
        self.store(slot, Slot::Empty).ok();
    }
}

impl Drop for VulkanDescriptorHeap {
    fn drop(&mut self) {
        let slots = std::mem::take(&mut *lock(&self.slots));
        for slot in slots {
            self.release(slot);
        }
    }
}

#[cfg(test)]
#[path = "vulkan_descriptor_heap_tests.rs"]
mod tests;
