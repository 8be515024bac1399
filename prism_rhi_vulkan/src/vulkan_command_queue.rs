/// CommandQueue - VkQueue submission with timeline semaphore signal/wait

use ash::vk;
use prism_rhi::prism::rhi::{CommandListBackend, CommandListType, CommandQueueBackend, FenceBackend};
use prism_rhi::prism::Result;
use prism_rhi::engine_bail;
use std::any::Any;
use std::sync::Arc;

use crate::vulkan_command_list::VulkanCommandList;
use crate::vulkan_context::{lock, map_vk_error, GpuContext, LOG_SOURCE};
use crate::vulkan_fence::VulkanFence;

pub struct VulkanCommandQueue {
    ctx: Arc<GpuContext>,
    queue_type: CommandListType,
}

impl VulkanCommandQueue {
    pub(crate) fn new(ctx: Arc<GpuContext>, queue_type: CommandListType) -> Self {
        Self { ctx, queue_type }
    }

    pub fn queue_type(&self) -> CommandListType {
        self.queue_type
    }

    pub fn family_index(&self) -> u32 {
        self.ctx.queue_family(self.queue_type)
    }

    /// Run `f` with exclusive access to the underlying VkQueue
    pub(crate) fn with_queue<R>(&self, f: impl FnOnce(vk::Queue) -> R) -> R {
        let queue = lock(&self.ctx.queue_slot(self.queue_type).queue);
        f(*queue)
    }

    pub(crate) fn submit(&self, submit: vk::SubmitInfo2<'_>) -> Result<()> {
        self.with_queue(|queue| unsafe {
            self.ctx.device.queue_submit2(queue, &[submit], vk::Fence::null())
        })
        .map_err(|e| map_vk_error("vkQueueSubmit2", e))
    }
}

pub(crate) fn timeline(fence: &dyn FenceBackend) -> Result<vk::Semaphore> {
    match fence.as_any().downcast_ref::<VulkanFence>() {
        Some(fence) => Ok(fence.semaphore),
        None => engine_bail!(LOG_SOURCE, "Fence was not created by the Vulkan backend"),
    }
}

impl CommandQueueBackend for VulkanCommandQueue {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn execute(&self, lists: &[&dyn CommandListBackend]) -> Result<()> {
        let mut buffers = Vec::with_capacity(lists.len());
        for list in lists {
            let Some(list) = list.as_any().downcast_ref::<VulkanCommandList>() else {
                engine_bail!(LOG_SOURCE, "Command list was not created by the Vulkan backend");
            };
            buffers.push(vk::CommandBufferSubmitInfo::default().command_buffer(list.command_buffer()));
        }
        self.submit(vk::SubmitInfo2::default().command_buffer_infos(&buffers))
    }

    fn signal(&self, fence: &dyn FenceBackend, value: u64) -> Result<()> {
        let signal = [vk::SemaphoreSubmitInfo::default()
            .semaphore(timeline(fence)?)
            .value(value)
            .stage_mask(vk::PipelineStageFlags2::ALL_COMMANDS)];
        self.submit(vk::SubmitInfo2::default().signal_semaphore_infos(&signal))
    }

    fn wait(&self, fence: &dyn FenceBackend, value: u64) -> Result<()> {
        let wait = [vk::SemaphoreSubmitInfo::default()
            .semaphore(timeline(fence)?)
            .value(value)
            .stage_mask(vk::PipelineStageFlags2::ALL_COMMANDS)];
        self.submit(vk::SubmitInfo2::default().wait_semaphore_infos(&wait))
    }

    fn wait_idle(&self) -> Result<()> {
        self.with_queue(|queue| unsafe { self.ctx.device.queue_wait_idle(queue) })
            .map_err(|e| map_vk_error("vkQueueWaitIdle", e))
    }
}
