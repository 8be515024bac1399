/// Dx12Instance - backend factory, DXGI factory creation and adapter enumeration

use prism_rhi::prism::rhi::{AdapterBackend, BackendFactory, InstanceBackend, InstanceDesc};
use prism_rhi::prism::{Error, GraphicsApi, Result};
use prism_rhi::{engine_debug, engine_error, engine_info, engine_warn};
use std::any::Any;
use windows::Win32::Graphics::Direct3D::D3D_FEATURE_LEVEL_11_0;
use windows::Win32::Graphics::Direct3D12::{D3D12CreateDevice, D3D12GetDebugInterface, ID3D12Debug, ID3D12Device};
use windows::Win32::Graphics::Dxgi::{
    CreateDXGIFactory2, IDXGIFactory4, DXGI_CREATE_FACTORY_DEBUG, DXGI_CREATE_FACTORY_FLAGS,
    DXGI_ERROR_NOT_FOUND,
};

use crate::dx12_adapter::Dx12Adapter;
use crate::dx12_context::{map_hr_error, LOG_SOURCE};

/// Registers the DirectX 12 backend under `GraphicsApi::DirectX12`
#[derive(Debug, Default, Clone, Copy)]
pub struct Dx12BackendFactory;

impl BackendFactory for Dx12BackendFactory {
    fn api(&self) -> GraphicsApi {
        GraphicsApi::DirectX12
    }

    fn create_instance(&self, desc: &InstanceDesc) -> Result<Box<dyn InstanceBackend>> {
        Ok(Box::new(Dx12Instance::new(desc)?))
    }
}

/// DirectX 12 implementation of `InstanceBackend`
pub struct Dx12Instance {
    factory: IDXGIFactory4,
    /// Debug layer enabled (devices then also get an info queue)
    validation: bool,
}

unsafe impl Send for Dx12Instance {}
unsafe impl Sync for Dx12Instance {}

impl Dx12Instance {
    pub fn new(desc: &InstanceDesc) -> Result<Self> {
        // The debug layer must be on before the first device is created
        let validation = desc.enable_validation && Self::enable_debug_layer();
        let flags = if validation {
            DXGI_CREATE_FACTORY_DEBUG
        } else {
            DXGI_CREATE_FACTORY_FLAGS(0)
        };

        let factory: IDXGIFactory4 = unsafe { CreateDXGIFactory2(flags) }.map_err(|e| {
            engine_error!(LOG_SOURCE, "Failed to create DXGI factory: {}", e);
            Error::InitializationFailed(format!("Failed to create DXGI factory: {}", e))
        })?;

        engine_info!(
            LOG_SOURCE,
            "DirectX 12 instance created for '{}' (debug layer: {})",
            desc.app_name, validation
        );
        Ok(Self { factory, validation })
    }

    fn enable_debug_layer() -> bool {
        unsafe {
            let mut debug: Option<ID3D12Debug> = None;
            match D3D12GetDebugInterface(&mut debug).ok().and(debug) {
                Some(debug) => {
                    debug.EnableDebugLayer();
                    true
                }
                None => {
                    engine_warn!(LOG_SOURCE, "Validation requested but the D3D12 debug layer is not installed");
                    false
                }
            }
        }
    }

    pub fn factory(&self) -> &IDXGIFactory4 {
        &self.factory
    }
}

impl InstanceBackend for Dx12Instance {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn enumerate_adapters(&self) -> Result<Vec<Box<dyn AdapterBackend>>> {
        let mut adapters: Vec<Box<dyn AdapterBackend>> = Vec::new();
        for index in 0.. {
            let adapter = match unsafe { self.factory.EnumAdapters1(index) } {
                Ok(adapter) => adapter,
                Err(e) if e.code() == DXGI_ERROR_NOT_FOUND => break,
                Err(e) => return Err(map_hr_error("IDXGIFactory1::EnumAdapters1", e)),
            };

            let supported = unsafe {
                D3D12CreateDevice(
                    &adapter,
                    D3D_FEATURE_LEVEL_11_0,
                    std::ptr::null_mut::<Option<ID3D12Device>>(),
                )
            }
            .is_ok();
            if !supported {
                engine_debug!(LOG_SOURCE, "Skipping adapter {} without feature level 11_0", index);
                continue;
            }

            let desc = unsafe { adapter.GetDesc1() }.map_err(|e| map_hr_error("IDXGIAdapter1::GetDesc1", e))?;
            adapters.push(Box::new(Dx12Adapter::new(
                self.factory.clone(),
                adapter,
                &desc,
                self.validation,
            )));
        }
        Ok(adapters)
    }
}
