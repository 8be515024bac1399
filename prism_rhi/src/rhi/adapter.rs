/// DisplayAdapter - one physical GPU reported by the instance

use std::any::Any;
use std::cmp::Reverse;
use crate::config::RhiConfig;
use crate::error::Result;
use crate::rhi::{Device, DeviceBackend};
use crate::engine_info;

/// Kind of adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdapterType {
    Discrete,
    Integrated,
    Virtual,
    /// CPU rasterizer (WARP, lavapipe)
    Software,
    Other,
}

/// Adapter identity and memory sizes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterInfo {
    pub name: String,
    pub vendor_id: u32,
    pub device_id: u32,
    /// Bytes of device-local memory
    pub dedicated_video_memory: u64,
    /// Bytes of system memory the adapter can use
    pub shared_system_memory: u64,
    pub adapter_type: AdapterType,
}

impl AdapterInfo {
    /// Sort key for `search_high_performance_adapter` (smaller is better)
    pub(crate) fn high_performance_rank(&self) -> (u8, Reverse<u64>) {
        let class = match self.adapter_type {
            AdapterType::Discrete => 0,
            AdapterType::Integrated => 1,
            AdapterType::Virtual | AdapterType::Other => 2,
            AdapterType::Software => 3,
        };
        (class, Reverse(self.dedicated_video_memory))
    }

    /// Sort key for `search_minimum_power_adapter` (smaller is better)
    pub(crate) fn minimum_power_rank(&self) -> (u8, Reverse<u64>) {
        let class = match self.adapter_type {
            AdapterType::Integrated => 0,
            AdapterType::Discrete => 1,
            AdapterType::Virtual | AdapterType::Other => 2,
            AdapterType::Software => 3,
        };
        (class, Reverse(self.dedicated_video_memory))
    }
}

/// Options for creating a logical device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDesc {
    pub enable_validation: bool,
    pub name: String,
}

/// Backend part of an adapter (IDXGIAdapter1, VkPhysicalDevice)
pub trait AdapterBackend: Send + Sync {
    fn as_any(&self) -> &dyn Any;

    fn info(&self) -> AdapterInfo;

    fn create_device(&self, desc: &DeviceDesc) -> Result<Box<dyn DeviceBackend>>;
}

/// Physical GPU
pub struct DisplayAdapter {
    info: AdapterInfo,
    backend: Box<dyn AdapterBackend>,
}

impl DisplayAdapter {
    pub(crate) fn new(backend: Box<dyn AdapterBackend>) -> Self {
        Self { info: backend.info(), backend }
    }

    pub fn info(&self) -> &AdapterInfo {
        &self.info
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    /// Create the logical device and its default descriptor heaps
    pub fn create_device(&self, config: &RhiConfig) -> Result<Device> {
        config.validate()?;
        let desc = DeviceDesc {
            enable_validation: config.enable_validation,
            name: format!("{} device", config.app_name),
        };
        let backend = self.backend.create_device(&desc)?;
        engine_info!("prism::Adapter", "Device created on '{}' ({:?}, {} MiB dedicated)",
            self.info.name, self.info.adapter_type, self.info.dedicated_video_memory >> 20);
        Device::new(self.info.clone(), config, backend)
    }

    /// Downcast the backend part to its concrete type
    pub fn backend_as<T: 'static>(&self) -> Option<&T> {
        self.backend.as_any().downcast_ref::<T>()
    }
}

impl std::fmt::Debug for DisplayAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DisplayAdapter").field("info", &self.info).finish()
    }
}
