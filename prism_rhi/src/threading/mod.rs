/// Engine threading: worker pools and the Update/Render frame rendezvous

mod thread_pool;
mod thread_manager;

pub use thread_pool::{TaskFuture, ThreadPool};
pub use thread_manager::{FrameSemaphore, ThreadManager};
