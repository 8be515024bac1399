/// ThreadManager - Update and Render pools and their per-frame rendezvous
///
/// The update and render main pools each run one task per frame; the two
/// sub-worker pools take the fan-out work those tasks submit. `execute_frame`
/// is the only point where Update and Render are synchronised: it returns
/// after both main tasks released the frame semaphore.

use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::Duration;
use crate::config::ThreadingConfig;
use crate::error::Result;
use crate::threading::ThreadPool;
use crate::{engine_error, engine_info};

/// Counting semaphore of pools that finished their frame task
#[derive(Default)]
pub struct FrameSemaphore {
    count: Mutex<u32>,
    released: Condvar,
}

impl FrameSemaphore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, u32> {
        match self.count.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn release(&self) {
        *self.lock() += 1;
        self.released.notify_all();
    }

    /// Block until `count` releases happened, then consume them
    pub fn acquire(&self, count: u32) {
        let guard = self.lock();
        let mut guard = match self.released.wait_while(guard, |current| *current < count) {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard -= count;
    }

    /// Like `acquire` but gives up after `timeout`
    pub fn acquire_timeout(&self, count: u32, timeout: Duration) -> bool {
        let guard = self.lock();
        let (mut guard, _) = match self.released.wait_timeout_while(guard, timeout, |current| *current < count) {
            Ok(result) => result,
            Err(poisoned) => poisoned.into_inner(),
        };
        if *guard >= count {
            *guard -= count;
            true
        } else {
            false
        }
    }

    pub fn available(&self) -> u32 {
        *self.lock()
    }
}

/// Releases the semaphore when dropped, including during a panic unwind
struct ReleaseOnDrop(Arc<FrameSemaphore>);

impl Drop for ReleaseOnDrop {
    fn drop(&mut self) {
        self.0.release();
    }
}

/// Owner of the four engine thread pools
pub struct ThreadManager {
    update: ThreadPool,
    render: ThreadPool,
    update_workers: Arc<ThreadPool>,
    render_workers: Arc<ThreadPool>,
    frame_done: Arc<FrameSemaphore>,
}

impl ThreadManager {
    pub fn new(config: &ThreadingConfig) -> Result<Self> {
        let manager = Self {
            update: ThreadPool::new("update", 1)?,
            render: ThreadPool::new("render", 1)?,
            update_workers: Arc::new(ThreadPool::new("update-worker", config.update_workers)?),
            render_workers: Arc::new(ThreadPool::new("render-worker", config.render_workers)?),
            frame_done: Arc::new(FrameSemaphore::new()),
        };
        engine_info!("prism::ThreadManager", "Thread manager started ({} update workers, {} render workers)",
            config.update_workers, config.render_workers);
        Ok(manager)
    }

    /// Pool for fan-out work of the update task
    pub fn update_workers(&self) -> &Arc<ThreadPool> {
        &self.update_workers
    }

    /// Pool for fan-out work of the render task
    pub fn render_workers(&self) -> &Arc<ThreadPool> {
        &self.render_workers
    }

    /// Run one frame: `update` on the update pool and `render` on the render pool
    ///
    /// Each task receives its sub-worker pool. Returns once both tasks are done.
    ///
    /// # Errors
    ///
    /// * `ThreadPoolStopped` after `shut_down`
    /// * `TaskAborted` if either task panicked
    pub fn execute_frame<U, R, A, B>(&self, update: U, render: R) -> Result<(A, B)>
    where
        U: FnOnce(&ThreadPool) -> A + Send + 'static,
        R: FnOnce(&ThreadPool) -> B + Send + 'static,
        A: Send + 'static,
        B: Send + 'static,
    {
        let update_future = {
            let workers = Arc::clone(&self.update_workers);
            let done = ReleaseOnDrop(Arc::clone(&self.frame_done));
            self.update.submit(move || {
                let _done = done;
                update(&workers)
            })?
        };
        let render_future = {
            let workers = Arc::clone(&self.render_workers);
            let done = ReleaseOnDrop(Arc::clone(&self.frame_done));
            match self.render.submit(move || {
                let _done = done;
                render(&workers)
            }) {
                Ok(future) => future,
                Err(e) => {
                    // Keep the semaphore balanced for the update task already queued
                    self.frame_done.acquire(1);
                    return Err(e);
                }
            }
        };

        self.frame_done.acquire(2);
        let updated = update_future.wait();
        let rendered = render_future.wait();
        match (updated, rendered) {
            (Ok(a), Ok(b)) => Ok((a, b)),
            (Err(e), _) | (_, Err(e)) => {
                engine_error!("prism::ThreadManager", "Frame task failed: {}", e);
                Err(e)
            }
        }
    }

    /// Stop the main pools first, then the sub-worker pools they feed
    pub fn shut_down(&self) {
        self.update.shutdown();
        self.render.shutdown();
        self.update_workers.shutdown();
        self.render_workers.shutdown();
        engine_info!("prism::ThreadManager", "Thread manager stopped");
    }
}

impl Drop for ThreadManager {
    fn drop(&mut self) {
        if self.update.is_running() {
            self.shut_down();
        }
    }
}

impl std::fmt::Debug for ThreadManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadManager")
            .field("update_workers", &self.update_workers.worker_count())
            .field("render_workers", &self.render_workers.worker_count())
            .finish()
    }
}

impl From<&ThreadManager> for ThreadingConfig {
    fn from(manager: &ThreadManager) -> Self {
        Self {
            update_workers: manager.update_workers.worker_count(),
            render_workers: manager.render_workers.worker_count(),
        }
    }
}

#[cfg(test)]
#[path = "thread_manager_tests.rs"]
mod tests;
