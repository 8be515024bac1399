//! RHI configuration
//!
//! Everything here is fixed at `GraphicsEngine::start_up` and read-only afterwards.

use std::time::Duration;
use crate::error::{Error, Result};
use crate::rhi::PixelFormat;

/// Native graphics API selected at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GraphicsApi {
    /// Microsoft DirectX 12 (Windows only)
    DirectX12,
    /// Khronos Vulkan 1.3
    Vulkan,
}

/// Adapter selection policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterPreference {
    /// Prefer discrete GPUs with the most dedicated memory
    HighPerformance,
    /// Prefer integrated GPUs
    MinimumPower,
}

/// Capacities of the four default descriptor heaps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorHeapSizes {
    /// Render target views
    pub render_target: u32,
    /// Depth stencil views
    pub depth_stencil: u32,
    /// Constant buffer views (shares the CBV/SRV/UAV heap)
    pub constant_buffer: u32,
    /// Shader resource views (shares the CBV/SRV/UAV heap)
    pub shader_resource: u32,
    /// Unordered access views (shares the CBV/SRV/UAV heap)
    pub unordered_access: u32,
    /// Sampler views
    pub max_sampler: u32,
}

impl DescriptorHeapSizes {
    /// Capacity of the combined CBV/SRV/UAV heap
    pub fn cbv_srv_uav(&self) -> u32 {
        self.constant_buffer + self.shader_resource + self.unordered_access
    }
}

impl Default for DescriptorHeapSizes {
    fn default() -> Self {
        Self {
            render_target: 64,
            depth_stencil: 16,
            constant_buffer: 512,
            shader_resource: 1024,
            unordered_access: 128,
            max_sampler: 64,
        }
    }
}

/// Engine configuration
#[derive(Debug, Clone)]
pub struct RhiConfig {
    /// Backend to instantiate from the registry
    pub api: GraphicsApi,

    /// Application name reported to the driver
    pub app_name: String,

    /// Enable validation layers / debug layer
    pub enable_validation: bool,

    /// Adapter selection policy
    pub adapter_preference: AdapterPreference,

    /// Number of back buffers and frames in flight (2 or 3)
    pub frame_buffer_count: u32,

    /// Present sync interval (0 = immediate, 1 = every vblank, up to 4)
    pub vsync_interval: u32,

    /// Swapchain back buffer format
    pub back_buffer_format: PixelFormat,

    /// Swapchain depth buffer format
    pub depth_format: PixelFormat,

    /// Clear color of the "draw clear" render pass
    pub clear_color: [f32; 4],

    /// Longest CPU wait on a fence before the device is considered lost
    pub fence_timeout: Duration,

    /// Default descriptor heap capacities
    pub descriptor_heaps: DescriptorHeapSizes,
}

impl Default for RhiConfig {
    fn default() -> Self {
        Self {
            api: GraphicsApi::Vulkan,
            app_name: "Prism Application".to_string(),
            enable_validation: cfg!(debug_assertions),
            adapter_preference: AdapterPreference::HighPerformance,
            frame_buffer_count: 3,
            vsync_interval: 1,
            back_buffer_format: PixelFormat::B8G8R8A8_UNORM,
            depth_format: PixelFormat::D32_FLOAT,
            clear_color: [0.0, 0.0, 0.0, 1.0],
            fence_timeout: Duration::from_secs(5),
            descriptor_heaps: DescriptorHeapSizes::default(),
        }
    }
}

impl RhiConfig {
    /// Check every value against its allowed range
    pub fn validate(&self) -> Result<()> {
        if !(2..=3).contains(&self.frame_buffer_count) {
            return Err(Error::InitializationFailed(format!(
                "frame_buffer_count must be 2 or 3 (got {})",
                self.frame_buffer_count
            )));
        }
        if self.vsync_interval > 4 {
            return Err(Error::InitializationFailed(format!(
                "vsync_interval must be in 0..=4 (got {})",
                self.vsync_interval
            )));
        }
        if self.back_buffer_format == PixelFormat::Unknown || self.back_buffer_format.is_depth() {
            return Err(Error::InitializationFailed(format!(
                "back_buffer_format {:?} is not a color format",
                self.back_buffer_format
            )));
        }
        if !self.depth_format.is_depth() {
            return Err(Error::InitializationFailed(format!(
                "depth_format {:?} is not a depth format",
                self.depth_format
            )));
        }
        if self.fence_timeout.is_zero() {
            return Err(Error::InitializationFailed("fence_timeout must be non-zero".to_string()));
        }

        let heaps = &self.descriptor_heaps;
        // The swapchain frame buffers alone need one RTV per back buffer and one DSV
        if heaps.render_target < self.frame_buffer_count || heaps.depth_stencil == 0 {
            return Err(Error::InitializationFailed(format!(
                "descriptor heaps too small for {} frame buffers (rtv {}, dsv {})",
                self.frame_buffer_count, heaps.render_target, heaps.depth_stencil
            )));
        }
        if heaps.cbv_srv_uav() == 0 || heaps.max_sampler == 0 {
            return Err(Error::InitializationFailed(
                "shader visible descriptor heaps must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}

/// Worker counts of the thread manager pools
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadingConfig {
    /// Workers of the update sub-task pool
    pub update_workers: usize,
    /// Workers of the render sub-task pool
    pub render_workers: usize,
}

impl Default for ThreadingConfig {
    fn default() -> Self {
        let available = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        let half = (available / 2).max(1);
        Self {
            update_workers: half,
            render_workers: half,
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
