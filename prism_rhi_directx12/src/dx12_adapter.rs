/// Dx12Adapter - one IDXGIAdapter1 and D3D12 device creation

use prism_rhi::prism::rhi::{AdapterBackend, AdapterInfo, AdapterType, DeviceBackend, DeviceDesc};
use prism_rhi::prism::{Error, Result};
use prism_rhi::{engine_error, engine_info, engine_warn};
use std::any::Any;
use std::sync::Arc;
use windows::core::Interface;
use windows::Win32::Graphics::Direct3D::D3D_FEATURE_LEVEL_11_0;
use windows::Win32::Graphics::Direct3D12::{D3D12CreateDevice, ID3D12Device4, ID3D12InfoQueue};
use windows::Win32::Graphics::Dxgi::{
    IDXGIAdapter1, IDXGIFactory4, DXGI_ADAPTER_DESC1, DXGI_ADAPTER_FLAG, DXGI_ADAPTER_FLAG_NONE,
    DXGI_ADAPTER_FLAG_SOFTWARE,
};

use crate::dx12_context::{set_debug_name, Dx12Context, LOG_SOURCE};
use crate::dx12_debug::reset_debug_message_counts;
use crate::dx12_device::Dx12Device;

/// Adapters with less dedicated memory than this are treated as integrated
const DISCRETE_MEMORY_THRESHOLD: u64 = 512 << 20;

/// Adapter identity from a DXGI description
///
/// DXGI does not say whether a hardware adapter is integrated, so the amount
/// of dedicated video memory decides.
pub(crate) fn adapter_info(desc: &DXGI_ADAPTER_DESC1) -> AdapterInfo {
    let name_len = desc.Description.iter().position(|&c| c == 0).unwrap_or(desc.Description.len());
    let name = String::from_utf16_lossy(&desc.Description[..name_len]);
    let dedicated = desc.DedicatedVideoMemory as u64;

    let software = (DXGI_ADAPTER_FLAG(desc.Flags as i32) & DXGI_ADAPTER_FLAG_SOFTWARE) != DXGI_ADAPTER_FLAG_NONE;
    let adapter_type = if software {
        AdapterType::Software
    } else if dedicated > DISCRETE_MEMORY_THRESHOLD {
        AdapterType::Discrete
    } else {
        AdapterType::Integrated
    };

    AdapterInfo {
        name,
        vendor_id: desc.VendorId,
        device_id: desc.DeviceId,
        dedicated_video_memory: dedicated,
        shared_system_memory: desc.SharedSystemMemory as u64,
        adapter_type,
    }
}

/// DirectX 12 implementation of `AdapterBackend`
pub struct Dx12Adapter {
    factory: IDXGIFactory4,
    adapter: IDXGIAdapter1,
    info: AdapterInfo,
    validation: bool,
}

unsafe impl Send for Dx12Adapter {}
unsafe impl Sync for Dx12Adapter {}

impl Dx12Adapter {
    pub(crate) fn new(
        factory: IDXGIFactory4,
        adapter: IDXGIAdapter1,
        desc: &DXGI_ADAPTER_DESC1,
        validation: bool,
    ) -> Self {
        Self {
            factory,
            adapter,
            info: adapter_info(desc),
            validation,
        }
    }

    pub fn adapter(&self) -> &IDXGIAdapter1 {
        &self.adapter
    }
}

impl AdapterBackend for Dx12Adapter {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn info(&self) -> AdapterInfo {
        self.info.clone()
    }

    fn create_device(&self, desc: &DeviceDesc) -> Result<Box<dyn DeviceBackend>> {
        let mut device: Option<ID3D12Device4> = None;
        unsafe { D3D12CreateDevice(&self.adapter, D3D_FEATURE_LEVEL_11_0, &mut device) }.map_err(|e| {
            engine_error!(LOG_SOURCE, "Failed to create D3D12 device on '{}': {}", self.info.name, e);
            Error::InitializationFailed(format!("Failed to create device: {}", e))
        })?;
        let device = device.ok_or_else(|| {
            engine_error!(LOG_SOURCE, "D3D12CreateDevice returned no device");
            Error::InitializationFailed("D3D12CreateDevice returned no device".to_string())
        })?;
        set_debug_name(&device, &desc.name);

        let info_queue = if self.validation && desc.enable_validation {
            match device.cast::<ID3D12InfoQueue>() {
                Ok(queue) => {
                    reset_debug_message_counts();
                    Some(queue)
                }
                Err(e) => {
                    engine_warn!(LOG_SOURCE, "Debug layer enabled but no info queue: {}", e);
                    None
                }
            }
        } else {
            None
        };

        let ctx = Dx12Context::new(self.factory.clone(), device, info_queue)?;
        engine_info!(LOG_SOURCE, "Device '{}' created on '{}'", desc.name, self.info.name);
        Ok(Box::new(Dx12Device::new(Arc::new(ctx))))
    }
}

#[cfg(test)]
#[path = "dx12_adapter_tests.rs"]
mod tests;
