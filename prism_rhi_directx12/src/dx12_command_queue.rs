/// CommandQueue - ID3D12CommandQueue submission with fence signal/wait

use prism_rhi::prism::rhi::{CommandListBackend, CommandListType, CommandQueueBackend, FenceBackend};
use prism_rhi::prism::Result;
use prism_rhi::engine_bail;
use std::any::Any;
use std::sync::Arc;
use windows::core::Interface;
use windows::Win32::Graphics::Direct3D12::{ID3D12CommandList, ID3D12CommandQueue, ID3D12Fence};

use crate::dx12_command_list::Dx12CommandList;
use crate::dx12_context::{map_hr_error, Dx12Context, LOG_SOURCE};
use crate::dx12_fence::Dx12Fence;

pub struct Dx12CommandQueue {
    ctx: Arc<Dx12Context>,
    queue_type: CommandListType,
}

impl Dx12CommandQueue {
    pub(crate) fn new(ctx: Arc<Dx12Context>, queue_type: CommandListType) -> Self {
        Self { ctx, queue_type }
    }

    pub fn queue_type(&self) -> CommandListType {
        self.queue_type
    }

    pub fn queue(&self) -> &ID3D12CommandQueue {
        self.ctx.queue(self.queue_type)
    }
}

pub(crate) fn d3d12_fence(fence: &dyn FenceBackend) -> Result<&ID3D12Fence> {
    match fence.as_any().downcast_ref::<Dx12Fence>() {
        Some(fence) => Ok(&fence.fence),
        None => engine_bail!(LOG_SOURCE, "Fence was not created by the DirectX 12 backend"),
    }
}

impl CommandQueueBackend for Dx12CommandQueue {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn execute(&self, lists: &[&dyn CommandListBackend]) -> Result<()> {
        let mut command_lists = Vec::with_capacity(lists.len());
        for list in lists {
            let Some(list) = list.as_any().downcast_ref::<Dx12CommandList>() else {
                engine_bail!(LOG_SOURCE, "Command list was not created by the DirectX 12 backend");
            };
            let list = list
                .list()
                .cast::<ID3D12CommandList>()
                .map_err(|e| map_hr_error("ID3D12GraphicsCommandList::QueryInterface", e))?;
            command_lists.push(Some(list));
        }
        unsafe {
            self.queue().ExecuteCommandLists(&command_lists);
        }
        self.ctx.flush_debug_messages();
        Ok(())
    }

    fn signal(&self, fence: &dyn FenceBackend, value: u64) -> Result<()> {
        unsafe { self.queue().Signal(d3d12_fence(fence)?, value) }
            .map_err(|e| map_hr_error("ID3D12CommandQueue::Signal", e))
    }

    fn wait(&self, fence: &dyn FenceBackend, value: u64) -> Result<()> {
        unsafe { self.queue().Wait(d3d12_fence(fence)?, value) }
            .map_err(|e| map_hr_error("ID3D12CommandQueue::Wait", e))
    }

    fn wait_idle(&self) -> Result<()> {
        self.ctx.wait_queue_idle(self.queue())
    }
}
