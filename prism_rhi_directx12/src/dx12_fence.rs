/// Fence - ID3D12Fence waited on through a Win32 event

use prism_rhi::prism::rhi::{FenceBackend, FenceWaitStatus};
use prism_rhi::prism::{Error, Result};
use prism_rhi::{engine_bail, engine_error};
use std::any::Any;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use windows::Win32::Foundation::{CloseHandle, HANDLE, WAIT_OBJECT_0, WAIT_TIMEOUT};
use windows::Win32::Graphics::Direct3D12::{ID3D12Device, ID3D12Device4, ID3D12Fence, D3D12_FENCE_FLAG_NONE};
use windows::Win32::System::Threading::{CreateEventA, WaitForSingleObject};

use crate::dx12_context::{lock, map_hr_error, LOG_SOURCE};

/// `GetCompletedValue` reports `u64::MAX` once the device is removed
fn completed_or_removed(raw: u64) -> Option<u64> {
    (raw != u64::MAX).then_some(raw)
}

pub struct Dx12Fence {
    pub(crate) fence: ID3D12Fence,
    event: HANDLE,
    /// One waiter at a time arms the shared event
    wait_lock: Mutex<()>,
}

unsafe impl Send for Dx12Fence {}
unsafe impl Sync for Dx12Fence {}

impl Dx12Fence {
    pub(crate) fn new(device: &ID3D12Device4, initial_value: u64) -> Result<Self> {
        let fence: ID3D12Fence = unsafe { device.CreateFence(initial_value, D3D12_FENCE_FLAG_NONE) }
            .map_err(|e| map_hr_error("CreateFence", e))?;
        let event = unsafe { CreateEventA(None, false, false, None) }
            .map_err(|e| map_hr_error("CreateEvent", e))?;
        Ok(Self {
            fence,
            event,
            wait_lock: Mutex::new(()),
        })
    }

    pub fn fence(&self) -> &ID3D12Fence {
        &self.fence
    }

    fn device_removed(&self) -> Error {
        let reason = unsafe { self.fence.GetDevice::<ID3D12Device>() }
            .and_then(|device| unsafe { device.GetDeviceRemovedReason() });
        let detail = match reason {
            Ok(()) => "no removal reason reported".to_string(),
            Err(e) => e.to_string(),
        };
        engine_error!(LOG_SOURCE, "Device removed while reading fence: {}", detail);
        Error::DeviceLost(format!("device removed: {}", detail))
    }

    /// Completed value, `DeviceLost` once the device is removed
    fn read_completed(&self) -> Result<u64> {
        completed_or_removed(unsafe { self.fence.GetCompletedValue() })
            .ok_or_else(|| self.device_removed())
    }

    /// Block until `value` is reached; `false` when `timeout` expires first
    pub(crate) fn wait_for(&self, value: u64, timeout: Duration) -> Result<bool> {
        if self.read_completed()? >= value {
            return Ok(true);
        }

        let _guard = lock(&self.wait_lock);
        let deadline = Instant::now() + timeout;
        loop {
            if self.read_completed()? >= value {
                return Ok(true);
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(false);
            }

            unsafe { self.fence.SetEventOnCompletion(value, self.event) }
                .map_err(|e| map_hr_error("ID3D12Fence::SetEventOnCompletion", e))?;
            let millis = u32::try_from(remaining.as_millis()).unwrap_or(u32::MAX).max(1);
            let result = unsafe { WaitForSingleObject(self.event, millis) };
            // The event may have been set by a stale request, so re-check the value
            if result != WAIT_OBJECT_0 && result != WAIT_TIMEOUT {
                engine_bail!(LOG_SOURCE, "WaitForSingleObject on fence event returned {:?}", result);
            }
        }
    }
}

impl FenceBackend for Dx12Fence {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn completed_value(&self) -> u64 {
        // A removed device reads as nothing completed; the next wait reports it
        completed_or_removed(unsafe { self.fence.GetCompletedValue() }).unwrap_or(0)
    }

    fn signal(&self, value: u64) -> Result<()> {
        unsafe { self.fence.Signal(value) }.map_err(|e| map_hr_error("ID3D12Fence::Signal", e))
    }

    fn wait(&self, value: u64, timeout: Duration) -> Result<FenceWaitStatus> {
        if self.wait_for(value, timeout)? {
            Ok(FenceWaitStatus::Completed)
        } else {
            Ok(FenceWaitStatus::TimedOut)
        }
    }
}

impl Drop for Dx12Fence {
    fn drop(&mut self) {
        unsafe {
            CloseHandle(self.event).ok();
        }
    }
}

#[cfg(test)]
#[path = "dx12_fence_tests.rs"]
mod tests;
