/*!
# Prism RHI

API-agnostic rendering hardware interface.

This crate defines the objects every draw call depends on (devices, queues,
fences, command lists, swapchains, frame buffers, descriptor heaps and
views) and all of their validation. Each object wraps one backend trait
object; backend crates (`prism_rhi_vulkan`, `prism_rhi_directx12`) implement
those traits and register a factory in a `BackendRegistry`.

## Architecture

- **Instance / DisplayAdapter / Device**: bootstrap and factory chain
- **Fence / CommandQueue / CommandList**: submission and CPU/GPU synchronization
- **Swapchain**: back buffer ring and frame pacing
- **FrameBuffer / DescriptorHeap / ResourceView**: attachment and binding records
- **GraphicsEngine**: explicitly owned context driving the frame loop
- **ThreadManager**: Update/Render worker pools and their frame rendezvous
*/

// Internal modules
mod error;
mod engine;
pub mod config;
pub mod log;
pub mod rhi;
pub mod threading;

// Main prism namespace module
pub mod prism {
    // Error types
    pub use crate::error::{Error, Result};

    // Configuration fixed at start up
    pub use crate::config::{AdapterPreference, DescriptorHeapSizes, GraphicsApi, RhiConfig, ThreadingConfig};

    // Frame loop driver
    pub use crate::engine::{FramePhase, GraphicsEngine};

    // Logging sub-module (types only, NOT macros)
    pub mod log {
        pub use crate::log::{
            DefaultLogger, LogEntry, LogSeverity, Logger, min_severity, reset_logger, set_logger,
            set_min_severity,
        };
    }

    // RHI objects and backend traits
    pub mod rhi {
        pub use crate::rhi::*;
    }

    // Worker pools
    pub mod threading {
        pub use crate::threading::*;
    }
}
