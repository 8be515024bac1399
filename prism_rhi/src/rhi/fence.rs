/// Fence: monotonically increasing counter shared by the CPU and GPU timelines
///
/// Values are scheduled (by `CommandQueue::signal`, `Swapchain::prepare_next_image`
/// or a CPU `signal`) strictly in increasing order, and observed through
/// `completed_value`, which never goes backwards. Waiting longer than the
/// configured timeout means the GPU stopped making progress and is reported
/// as device loss.

use std::any::Any;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use crate::error::{Error, Result};
use crate::{engine_error, engine_trace, engine_warn};

/// Outcome of a bounded backend wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FenceWaitStatus {
    Completed,
    TimedOut,
}

/// Backend part of a fence (ID3D12Fence, Vulkan timeline semaphore)
pub trait FenceBackend: Send + Sync {
    fn as_any(&self) -> &dyn Any;

    /// Last value reached by the GPU timeline
    fn completed_value(&self) -> u64;

    /// Set the value from the CPU
    fn signal(&self, value: u64) -> Result<()>;

    /// Block until `value` is reached or `timeout` expires
    fn wait(&self, value: u64, timeout: Duration) -> Result<FenceWaitStatus>;
}

/// CPU/GPU synchronization counter
pub struct Fence {
    name: String,
    /// Highest value scheduled to be signaled
    scheduled: AtomicU64,
    /// Highest value observed as completed
    observed: AtomicU64,
    timeout: Duration,
    backend: Box<dyn FenceBackend>,
}

impl Fence {
    pub(crate) fn new(
        name: impl Into<String>,
        initial_value: u64,
        timeout: Duration,
        backend: Box<dyn FenceBackend>,
    ) -> Self {
        Self {
            name: name.into(),
            scheduled: AtomicU64::new(initial_value),
            observed: AtomicU64::new(initial_value),
            timeout,
            backend,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Highest value scheduled so far
    pub fn last_scheduled_value(&self) -> u64 {
        self.scheduled.load(Ordering::Acquire)
    }

    /// Value the next `schedule` should use
    pub fn next_value(&self) -> u64 {
        self.last_scheduled_value() + 1
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Non-blocking read of the completed value (non-decreasing)
    pub fn completed_value(&self) -> u64 {
        let current = self.backend.completed_value();
        let previous = self.observed.fetch_max(current, Ordering::AcqRel);
        previous.max(current)
    }

    /// Record that `value` will be signaled
    ///
    /// # Errors
    ///
    /// * `InvalidFenceValue` if `value` is not above the last scheduled value
    pub(crate) fn schedule(&self, value: u64) -> Result<()> {
        self.scheduled
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                (value > current).then_some(value)
            })
            .map(|_| ())
            .map_err(|current| {
                engine_error!("prism::Fence", "Fence '{}': value {} is not above {}", self.name, value, current);
                Error::InvalidFenceValue { requested: value, current }
            })
    }

    /// Signal `value` from the CPU
    pub fn signal(&self, value: u64) -> Result<()> {
        self.schedule(value)?;
        self.backend.signal(value)
    }

    /// Block until the completed value reaches `value`, bounded by the fence timeout
    pub fn wait(&self, value: u64) -> Result<()> {
        self.wait_timeout(value, self.timeout)
    }

    /// Block until the completed value reaches `value` or `timeout` expires
    ///
    /// # Errors
    ///
    /// * `DeviceLost` when the timeout expires
    pub fn wait_timeout(&self, value: u64, timeout: Duration) -> Result<()> {
        if self.completed_value() >= value {
            return Ok(());
        }
        if value > self.last_scheduled_value() {
            engine_warn!("prism::Fence", "Fence '{}': waiting on value {} that was never scheduled", self.name, value);
        }

        engine_trace!("prism::Fence", "Fence '{}': waiting for {}", self.name, value);
        match self.backend.wait(value, timeout)? {
            FenceWaitStatus::Completed => {
                self.observed.fetch_max(value, Ordering::AcqRel);
                Ok(())
            }
            FenceWaitStatus::TimedOut => {
                engine_error!("prism::Fence", "Fence '{}': wait for {} timed out after {:?} (completed {})",
                    self.name, value, timeout, self.completed_value());
                Err(Error::DeviceLost(format!(
                    "fence '{}' did not reach {} within {:?}",
                    self.name, value, timeout
                )))
            }
        }
    }

    pub fn backend(&self) -> &dyn FenceBackend {
        self.backend.as_ref()
    }

    /// Downcast the backend part to its concrete type
    pub fn backend_as<T: 'static>(&self) -> Option<&T> {
        self.backend.as_any().downcast_ref::<T>()
    }
}

impl std::fmt::Debug for Fence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fence")
            .field("name", &self.name)
            .field("scheduled", &self.last_scheduled_value())
            .field("observed", &self.observed.load(Ordering::Acquire))
            .finish()
    }
}

#[cfg(test)]
#[path = "fence_tests.rs"]
mod tests;
