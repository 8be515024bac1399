/// Fence - Vulkan timeline semaphore

use ash::vk;
use prism_rhi::prism::rhi::{FenceBackend, FenceWaitStatus};
use prism_rhi::prism::Result;
use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use crate::vulkan_context::{map_vk_error, GpuContext};

pub struct VulkanFence {
    ctx: Arc<GpuContext>,
    pub(crate) semaphore: vk::Semaphore,
}

impl VulkanFence {
    pub(crate) fn new(ctx: Arc<GpuContext>, initial_value: u64) -> Result<Self> {
        let mut type_info = vk::SemaphoreTypeCreateInfo::default()
            .semaphore_type(vk::SemaphoreType::TIMELINE)
            .initial_value(initial_value);
        let create_info = vk::SemaphoreCreateInfo::default().push_next(&mut type_info);
        let semaphore = unsafe { ctx.device.create_semaphore(&create_info, None) }
            .map_err(|e| map_vk_error("vkCreateSemaphore (timeline)", e))?;
        Ok(Self { ctx, semaphore })
    }

    pub fn semaphore(&self) -> vk::Semaphore {
        self.semaphore
    }
}

impl FenceBackend for VulkanFence {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn completed_value(&self) -> u64 {
        // A lost device reports 0; the caller's bounded wait turns that into DeviceLost
        unsafe { self.ctx.device.get_semaphore_counter_value(self.semaphore) }.unwrap_or(0)
    }

    fn signal(&self, value: u64) -> Result<()> {
        let signal_info = vk::SemaphoreSignalInfo::default()
            .semaphore(self.semaphore)
            .value(value);
        unsafe { self.ctx.device.signal_semaphore(&signal_info) }
            .map_err(|e| map_vk_error("vkSignalSemaphore", e))
    }

    fn wait(&self, value: u64, timeout: Duration) -> Result<FenceWaitStatus> {
        let semaphores = [self.semaphore];
        let values = [value];
        let wait_info = vk::SemaphoreWaitInfo::default()
            .semaphores(&semaphores)
            .values(&values);
        let timeout_ns = u64::try_from(timeout.as_nanos()).unwrap_or(u64::MAX);
        match unsafe { self.ctx.device.wait_semaphores(&wait_info, timeout_ns) } {
            Ok(()) => Ok(FenceWaitStatus::Completed),
            Err(vk::Result::TIMEOUT) => Ok(FenceWaitStatus::TimedOut),
            Err(e) => Err(map_vk_error("vkWaitSemaphores", e)),
        }
    }
}

impl Drop for VulkanFence {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_semaphore(self.semaphore, None);
        }
    }
}
