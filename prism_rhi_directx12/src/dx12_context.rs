/// Shared DirectX 12 state
///
/// `Dx12Context` owns the D3D12 device, the DXGI factory swapchains are
/// created from and one hardware queue per `CommandListType`. Backend
/// objects hold an `Arc` to it so the device outlives everything created
/// from it.

use prism_rhi::prism::rhi::CommandListType;
use prism_rhi::prism::{Error, Result};
use prism_rhi::engine_error;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use windows::core::HSTRING;
use windows::Win32::Foundation::{E_OUTOFMEMORY, E_INVALIDARG};
use windows::Win32::Graphics::Direct3D12::{
    ID3D12CommandQueue, ID3D12Device4, ID3D12InfoQueue, ID3D12Object, D3D12_COMMAND_QUEUE_DESC,
};
use windows::Win32::Graphics::Dxgi::{
    IDXGIFactory4, DXGI_ERROR_DEVICE_HUNG, DXGI_ERROR_DEVICE_REMOVED, DXGI_ERROR_DEVICE_RESET,
    DXGI_ERROR_DRIVER_INTERNAL_ERROR,
};

use crate::dx12_debug::drain_messages;
use crate::dx12_fence::Dx12Fence;
use crate::dx12_format::command_list_type;

pub(crate) const LOG_SOURCE: &str = "prism::directx12";

/// Upper bound for queue drains; a queue that stays busy longer is considered hung
const IDLE_TIMEOUT: Duration = Duration::from_secs(10);

/// Convert a failed D3D12/DXGI call into the RHI error taxonomy (and log it)
pub(crate) fn map_hr_error(what: &str, error: windows::core::Error) -> Error {
    engine_error!(LOG_SOURCE, "{} failed: {}", what, error);
    let code = error.code();
    if code == DXGI_ERROR_DEVICE_REMOVED
        || code == DXGI_ERROR_DEVICE_RESET
        || code == DXGI_ERROR_DEVICE_HUNG
        || code == DXGI_ERROR_DRIVER_INTERNAL_ERROR
    {
        Error::DeviceLost(format!("{}: {}", what, error))
    } else if code == E_OUTOFMEMORY {
        Error::OutOfMemory
    } else if code == E_INVALIDARG {
        Error::InvalidResource(format!("{}: {}", what, error))
    } else {
        Error::BackendError(format!("{}: {}", what, error))
    }
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Attach a debug name shown by PIX and the debug layer
pub(crate) fn set_debug_name(object: &ID3D12Object, name: &str) {
    if name.is_empty() {
        return;
    }
    unsafe {
        object.SetName(&HSTRING::from(name)).ok();
    }
}

/// D3D12 device shared by every GPU object
pub(crate) struct Dx12Context {
    pub(crate) factory: IDXGIFactory4,
    pub(crate) device: ID3D12Device4,
    /// Indexed by `CommandListType::index`
    queues: [ID3D12CommandQueue; 3],
    /// Signaled by `wait_queue_idle`
    idle_fence: Dx12Fence,
    idle_value: Mutex<u64>,
    /// Present when the debug layer is enabled
    info_queue: Option<ID3D12InfoQueue>,
}

// D3D12 and DXGI objects are free-threaded
unsafe impl Send for Dx12Context {}
unsafe impl Sync for Dx12Context {}

impl Dx12Context {
    pub(crate) fn new(
        factory: IDXGIFactory4,
        device: ID3D12Device4,
        info_queue: Option<ID3D12InfoQueue>,
    ) -> Result<Self> {
        let create_queue = |queue_type: CommandListType| -> Result<ID3D12CommandQueue> {
            let desc = D3D12_COMMAND_QUEUE_DESC {
                Type: command_list_type(queue_type),
                ..Default::default()
            };
            let queue: ID3D12CommandQueue = unsafe { device.CreateCommandQueue(&desc) }
                .map_err(|e| map_hr_error("CreateCommandQueue", e))?;
            set_debug_name(&queue, &format!("{:?} queue", queue_type));
            Ok(queue)
        };
        let queues = [
            create_queue(CommandListType::Graphics)?,
            create_queue(CommandListType::Compute)?,
            create_queue(CommandListType::Copy)?,
        ];
        let idle_fence = Dx12Fence::new(&device, 0)?;

        Ok(Self {
            factory,
            device,
            queues,
            idle_fence,
            idle_value: Mutex::new(0),
            info_queue,
        })
    }

    pub(crate) fn queue(&self, queue_type: CommandListType) -> &ID3D12CommandQueue {
        &self.queues[queue_type.index()]
    }

    /// Block until every submission made to `queue` so far has completed
    pub(crate) fn wait_queue_idle(&self, queue: &ID3D12CommandQueue) -> Result<()> {
        let value = {
            let mut idle_value = lock(&self.idle_value);
            *idle_value += 1;
            unsafe { queue.Signal(&self.idle_fence.fence, *idle_value) }
                .map_err(|e| map_hr_error("ID3D12CommandQueue::Signal", e))?;
            *idle_value
        };
        self.idle_fence.wait_for(value, IDLE_TIMEOUT)?.then_some(()).ok_or_else(|| {
            self.flush_debug_messages();
            engine_error!(LOG_SOURCE, "Queue did not drain within {:?}", IDLE_TIMEOUT);
            Error::DeviceLost(format!("queue did not drain within {:?}", IDLE_TIMEOUT))
        })
    }

    pub(crate) fn wait_all_queues_idle(&self) -> Result<()> {
        for queue in &self.queues {
            self.wait_queue_idle(queue)?;
        }
        self.flush_debug_messages();
        Ok(())
    }

    /// Forward pending debug layer messages to the logger
    pub(crate) fn flush_debug_messages(&self) {
        if let Some(info_queue) = &self.info_queue {
            drain_messages(info_queue);
        }
    }
}

impl Drop for Dx12Context {
    fn drop(&mut self) {
        self.wait_all_queues_idle().ok();
    }
}
