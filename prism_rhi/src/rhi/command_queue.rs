/// CommandQueue - submits closed command lists and orders work with fences
///
/// One queue exists per `CommandListType`. Every queue owns the fence that
/// tracks its own progress (`signal_next`, `flush`). Cross-queue ordering is
/// only expressed through `wait` on another queue's fence.

use std::any::Any;
use std::sync::Arc;
use crate::error::{Error, Result};
use crate::rhi::{CommandListBackend, CommandList, CommandListState, CommandListType, Fence, FenceBackend};
use crate::{engine_error, engine_trace, engine_warn};

/// Backend part of a command queue
pub trait CommandQueueBackend: Send + Sync {
    fn as_any(&self) -> &dyn Any;

    /// Submit lists in order
    fn execute(&self, lists: &[&dyn CommandListBackend]) -> Result<()>;

    /// GPU-side signal once all prior submissions complete
    fn signal(&self, fence: &dyn FenceBackend, value: u64) -> Result<()>;

    /// Make later submissions wait for `fence` to reach `value`
    fn wait(&self, fence: &dyn FenceBackend, value: u64) -> Result<()>;

    /// Block until the queue has drained
    fn wait_idle(&self) -> Result<()>;
}

/// GPU submission queue
pub struct CommandQueue {
    queue_type: CommandListType,
    fence: Arc<Fence>,
    backend: Box<dyn CommandQueueBackend>,
}

impl CommandQueue {
    pub(crate) fn new(queue_type: CommandListType, fence: Arc<Fence>, backend: Box<dyn CommandQueueBackend>) -> Self {
        Self { queue_type, fence, backend }
    }

    pub fn queue_type(&self) -> CommandListType {
        self.queue_type
    }

    /// Fence advanced by `signal_next`
    pub fn fence(&self) -> &Arc<Fence> {
        &self.fence
    }

    /// Submit closed command lists, in order
    ///
    /// # Errors
    ///
    /// * `InvalidState` if a list is not closed or has another type
    pub fn execute(&self, lists: &mut [&mut CommandList]) -> Result<()> {
        for list in lists.iter() {
            if list.state() != CommandListState::Closed {
                engine_error!("prism::CommandQueue", "{:?} queue: list '{}' is {:?}, expected Closed",
                    self.queue_type, list.name(), list.state());
                return Err(Error::InvalidState(format!(
                    "command list '{}' must be closed before execute (state {:?})",
                    list.name(),
                    list.state()
                )));
            }
            if list.list_type() != self.queue_type {
                engine_error!("prism::CommandQueue", "{:?} queue: list '{}' is a {:?} list",
                    self.queue_type, list.name(), list.list_type());
                return Err(Error::InvalidState(format!(
                    "{:?} list '{}' submitted to the {:?} queue",
                    list.list_type(),
                    list.name(),
                    self.queue_type
                )));
            }
        }
        if lists.is_empty() {
            return Ok(());
        }

        let backends: Vec<&dyn CommandListBackend> = lists.iter().map(|list| list.backend()).collect();
        self.backend.execute(&backends)?;
        for list in lists.iter_mut() {
            list.mark_submitted();
        }
        engine_trace!("prism::CommandQueue", "{:?} queue: executed {} list(s)", self.queue_type, lists.len());
        Ok(())
    }

    /// Signal `fence` to `value` after all prior work on this queue
    pub fn signal(&self, fence: &Fence, value: u64) -> Result<()> {
        fence.schedule(value)?;
        self.backend.signal(fence.backend(), value)
    }

    /// Signal the next value of this queue's own fence and return it
    pub fn signal_next(&self) -> Result<u64> {
        let value = self.fence.next_value();
        self.signal(&self.fence, value)?;
        Ok(value)
    }

    /// Make subsequent submissions wait for `fence` to reach `value`
    pub fn wait(&self, fence: &Fence, value: u64) -> Result<()> {
        if value > fence.last_scheduled_value() {
            engine_warn!("prism::CommandQueue", "{:?} queue waits on '{}' value {} that is not scheduled yet",
                self.queue_type, fence.name(), value);
        }
        self.backend.wait(fence.backend(), value)
    }

    /// Signal and block until everything submitted so far completed
    pub fn flush(&self) -> Result<u64> {
        let value = self.signal_next()?;
        self.fence.wait(value)?;
        Ok(value)
    }

    pub fn backend(&self) -> &dyn CommandQueueBackend {
        self.backend.as_ref()
    }

    /// Downcast the backend part to its concrete type
    pub fn backend_as<T: 'static>(&self) -> Option<&T> {
        self.backend.as_any().downcast_ref::<T>()
    }
}

impl std::fmt::Debug for CommandQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandQueue")
            .field("type", &self.queue_type)
            .field("fence", &self.fence)
            .finish()
    }
}

#[cfg(test)]
#[path = "command_queue_tests.rs"]
mod tests;
