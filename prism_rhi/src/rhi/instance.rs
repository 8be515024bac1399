/// Instance - backend entry point and adapter enumeration
///
/// Backends are not linked into the core. Each backend crate registers a
/// `BackendFactory` into an explicitly constructed `BackendRegistry`, and
/// `Instance::new` picks the factory for the configured `GraphicsApi`.

use std::any::Any;
use raw_window_handle::RawDisplayHandle;
use rustc_hash::FxHashMap;
use crate::config::{AdapterPreference, GraphicsApi};
use crate::error::{Error, Result};
use crate::rhi::{AdapterBackend, DisplayAdapter};
use crate::{engine_debug, engine_error, engine_info, engine_warn};

/// Options for creating an instance
#[derive(Debug, Clone)]
pub struct InstanceDesc {
    pub app_name: String,
    /// Validation layers (Vulkan) or debug layer (DirectX 12)
    pub enable_validation: bool,
    /// Display the instance must be able to present to, if any
    pub display: Option<RawDisplayHandle>,
}

/// Backend part of an instance (IDXGIFactory6, VkInstance)
pub trait InstanceBackend: Send + Sync {
    fn as_any(&self) -> &dyn Any;

    fn enumerate_adapters(&self) -> Result<Vec<Box<dyn AdapterBackend>>>;
}

/// Creates the backend instance for one API
pub trait BackendFactory: Send + Sync {
    fn api(&self) -> GraphicsApi;

    fn create_instance(&self, desc: &InstanceDesc) -> Result<Box<dyn InstanceBackend>>;
}

/// Backends available to `Instance::new`
#[derive(Default)]
pub struct BackendRegistry {
    factories: FxHashMap<GraphicsApi, Box<dyn BackendFactory>>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a backend, replacing any earlier factory for the same API
    pub fn register(&mut self, factory: Box<dyn BackendFactory>) {
        let api = factory.api();
        if self.factories.insert(api, factory).is_some() {
            engine_warn!("prism::Instance", "Backend {:?} registered twice, keeping the last one", api);
        } else {
            engine_debug!("prism::Instance", "Backend {:?} registered", api);
        }
    }

    pub fn is_registered(&self, api: GraphicsApi) -> bool {
        self.factories.contains_key(&api)
    }

    pub fn factory(&self, api: GraphicsApi) -> Option<&dyn BackendFactory> {
        self.factories.get(&api).map(|factory| factory.as_ref())
    }
}

/// Graphics API instance and its adapters
pub struct Instance {
    api: GraphicsApi,
    // Adapters are declared first so they are released before the instance
    adapters: Vec<DisplayAdapter>,
    backend: Box<dyn InstanceBackend>,
}

impl Instance {
    /// Create the instance of `api` and enumerate its adapters
    ///
    /// # Errors
    ///
    /// * `InitializationFailed` if `api` is not registered or has no adapter
    pub fn new(registry: &BackendRegistry, api: GraphicsApi, desc: InstanceDesc) -> Result<Self> {
        let Some(factory) = registry.factory(api) else {
            engine_error!("prism::Instance", "No backend registered for {:?}", api);
            return Err(Error::InitializationFailed(format!("no backend registered for {:?}", api)));
        };

        let backend = factory.create_instance(&desc)?;
        let adapters: Vec<DisplayAdapter> = backend
            .enumerate_adapters()?
            .into_iter()
            .map(DisplayAdapter::new)
            .collect();
        if adapters.is_empty() {
            engine_error!("prism::Instance", "{:?} instance reports no adapter", api);
            return Err(Error::InitializationFailed(format!("no {:?} adapter found", api)));
        }

        engine_info!("prism::Instance", "{:?} instance created for '{}' (validation: {})",
            api, desc.app_name, desc.enable_validation);
        for adapter in &adapters {
            engine_debug!("prism::Instance", "  adapter '{}' {:?}, {} MiB dedicated",
                adapter.name(), adapter.info().adapter_type, adapter.info().dedicated_video_memory >> 20);
        }

        Ok(Self { api, adapters, backend })
    }

    pub fn api(&self) -> GraphicsApi {
        self.api
    }

    pub fn adapters(&self) -> &[DisplayAdapter] {
        &self.adapters
    }

    /// Discrete first, then integrated, then the rest; most dedicated memory wins ties
    pub fn search_high_performance_adapter(&self) -> Option<&DisplayAdapter> {
        self.adapters.iter().min_by_key(|adapter| adapter.info().high_performance_rank())
    }

    /// Integrated first; software adapters only as a last resort
    pub fn search_minimum_power_adapter(&self) -> Option<&DisplayAdapter> {
        self.adapters.iter().min_by_key(|adapter| adapter.info().minimum_power_rank())
    }

    /// Adapter chosen by `preference`
    pub fn select_adapter(&self, preference: AdapterPreference) -> Option<&DisplayAdapter> {
        match preference {
            AdapterPreference::HighPerformance => self.search_high_performance_adapter(),
            AdapterPreference::MinimumPower => self.search_minimum_power_adapter(),
        }
    }

    /// Downcast the backend part to its concrete type
    pub fn backend_as<T: 'static>(&self) -> Option<&T> {
        self.backend.as_any().downcast_ref::<T>()
    }
}

impl std::fmt::Debug for Instance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instance")
            .field("api", &self.api)
            .field("adapters", &self.adapters)
            .finish()
    }
}

#[cfg(test)]
#[path = "instance_tests.rs"]
mod tests;
