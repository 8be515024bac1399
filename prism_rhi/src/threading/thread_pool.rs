/// ThreadPool - fixed set of workers draining one FIFO task queue
///
/// The queue and the running flag share one mutex; workers sleep on a
/// condition variable while the queue is empty. Shutdown flips the flag,
/// wakes everyone and joins: workers keep draining until the queue is empty,
/// so every task accepted before shutdown still runs.

use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::Duration;
use crate::error::{Error, Result};
use crate::{engine_debug, engine_error};

type Job = Box<dyn FnOnce() + Send + 'static>;

struct QueueState {
    jobs: VecDeque<Job>,
    running: bool,
}

struct Shared {
    name: String,
    queue: Mutex<QueueState>,
    available: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        match self.queue.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Handle to the result of a submitted task
pub struct TaskFuture<T> {
    receiver: flume::Receiver<Result<T>>,
}

impl<T> TaskFuture<T> {
    /// Block until the task finished
    ///
    /// # Errors
    ///
    /// * `TaskAborted` if the task panicked or was dropped unexecuted
    pub fn wait(self) -> Result<T> {
        self.receiver.recv().unwrap_or(Err(Error::TaskAborted))
    }

    /// Block at most `timeout`; `None` if the task is still running
    pub fn wait_timeout(&self, timeout: Duration) -> Option<Result<T>> {
        match self.receiver.recv_timeout(timeout) {
            Ok(result) => Some(result),
            Err(flume::RecvTimeoutError::Timeout) => None,
            Err(flume::RecvTimeoutError::Disconnected) => Some(Err(Error::TaskAborted)),
        }
    }

    /// True once the result is available (or the task is gone)
    pub fn is_ready(&self) -> bool {
        !self.receiver.is_empty() || self.receiver.is_disconnected()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}

fn worker_loop(shared: Arc<Shared>) {
    loop {
        let job = {
            let mut state = shared.lock();
            loop {
                if let Some(job) = state.jobs.pop_front() {
                    break Some(job);
                }
                if !state.running {
                    break None;
                }
                state = match shared.available.wait(state) {
                    Ok(guard) => guard,
                    Err(poisoned) => poisoned.into_inner(),
                };
            }
        };
        match job {
            Some(job) => job(),
            None => return,
        }
    }
}

/// Fixed-size worker pool
pub struct ThreadPool {
    shared: Arc<Shared>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    worker_count: usize,
}

impl ThreadPool {
    /// Spawn `worker_count` workers named `{name}-{i}`
    pub fn new(name: impl Into<String>, worker_count: usize) -> Result<Self> {
        let name = name.into();
        if worker_count == 0 {
            return Err(Error::InitializationFailed(format!("thread pool '{}' needs at least one worker", name)));
        }
        let shared = Arc::new(Shared {
            name,
            queue: Mutex::new(QueueState { jobs: VecDeque::new(), running: true }),
            available: Condvar::new(),
        });

        let pool = Self {
            shared: Arc::clone(&shared),
            workers: Mutex::new(Vec::with_capacity(worker_count)),
            worker_count,
        };
        for index in 0..worker_count {
            let worker_shared = Arc::clone(&shared);
            let handle = std::thread::Builder::new()
                .name(format!("{}-{}", shared.name, index))
                .spawn(move || worker_loop(worker_shared))
                .map_err(|e| {
                    engine_error!("prism::ThreadPool", "Pool '{}': cannot spawn worker {}: {}", shared.name, index, e);
                    Error::InitializationFailed(format!("thread pool '{}': {}", shared.name, e))
                })?;
            pool.lock_workers().push(handle);
        }
        engine_debug!("prism::ThreadPool", "Pool '{}' started with {} workers", shared.name, worker_count);
        Ok(pool)
    }

    fn lock_workers(&self) -> MutexGuard<'_, Vec<JoinHandle<()>>> {
        match self.workers.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Tasks waiting for a worker
    pub fn pending_tasks(&self) -> usize {
        self.shared.lock().jobs.len()
    }

    pub fn is_running(&self) -> bool {
        self.shared.lock().running
    }

    /// Queue `task` and return a future for its result
    ///
    /// # Errors
    ///
    /// * `ThreadPoolStopped` once shutdown has begun
    pub fn submit<F, T>(&self, task: F) -> Result<TaskFuture<T>>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (sender, receiver) = flume::bounded(1);
        let pool_name = self.shared.name.clone();
        let job: Job = Box::new(move || {
            let result = catch_unwind(AssertUnwindSafe(task)).map_err(|payload| {
                engine_error!("prism::ThreadPool", "Pool '{}': task panicked: {}", pool_name, panic_message(payload.as_ref()));
                Error::TaskAborted
            });
            // The caller may have dropped the future
            let _ = sender.send(result);
        });

        let mut state = self.shared.lock();
        if !state.running {
            return Err(Error::ThreadPoolStopped);
        }
        state.jobs.push_back(job);
        drop(state);
        self.shared.available.notify_one();
        Ok(TaskFuture { receiver })
    }

    /// Stop accepting tasks, run everything already queued, join the workers
    ///
    /// Calling it again is a no-op.
    pub fn shutdown(&self) {
        {
            let mut state = self.shared.lock();
            if !state.running {
                return;
            }
            state.running = false;
        }
        self.shared.available.notify_all();

        let workers: Vec<JoinHandle<()>> = self.lock_workers().drain(..).collect();
        for worker in workers {
            if worker.join().is_err() {
                engine_error!("prism::ThreadPool", "Pool '{}': a worker thread panicked", self.shared.name);
            }
        }
        engine_debug!("prism::ThreadPool", "Pool '{}' stopped", self.shared.name);
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for ThreadPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadPool")
            .field("name", &self.shared.name)
            .field("workers", &self.worker_count)
            .finish()
    }
}

#[cfg(test)]
#[path = "thread_pool_tests.rs"]
mod tests;
