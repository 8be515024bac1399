/// VulkanInstance - backend factory, VkInstance creation and adapter enumeration

use ash::vk;
use prism_rhi::prism::rhi::{AdapterBackend, BackendFactory, InstanceBackend, InstanceDesc};
use prism_rhi::prism::{Error, GraphicsApi, Result};
use prism_rhi::{engine_debug, engine_error, engine_info, engine_warn};
use std::any::Any;
use std::ffi::{CStr, CString};
use std::sync::Arc;

use crate::vulkan_adapter::VulkanAdapter;
use crate::vulkan_context::{map_vk_error, InstanceContext, LOG_SOURCE};

const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

/// Registers the Vulkan backend under `GraphicsApi::Vulkan`
#[derive(Debug, Default, Clone, Copy)]
pub struct VulkanBackendFactory;

impl BackendFactory for VulkanBackendFactory {
    fn api(&self) -> GraphicsApi {
        GraphicsApi::Vulkan
    }

    fn create_instance(&self, desc: &InstanceDesc) -> Result<Box<dyn InstanceBackend>> {
        Ok(Box::new(VulkanInstance::new(desc)?))
    }
}

/// Vulkan implementation of `InstanceBackend`
pub struct VulkanInstance {
    ctx: Arc<InstanceContext>,
}

impl VulkanInstance {
    pub fn new(desc: &InstanceDesc) -> Result<Self> {
        unsafe {
            let entry = ash::Entry::load().map_err(|e| {
                engine_error!(LOG_SOURCE, "Failed to load Vulkan library: {:?}", e);
                Error::InitializationFailed(format!("Failed to load Vulkan library: {:?}", e))
            })?;

            let app_name = CString::new(desc.app_name.as_str()).unwrap_or_default();
            let app_info = vk::ApplicationInfo::default()
                .application_name(&app_name)
                .application_version(vk::make_api_version(0, 1, 0, 0))
                .engine_name(c"Prism")
                .engine_version(vk::make_api_version(0, 0, 1, 0))
                .api_version(vk::API_VERSION_1_3);

            let mut extension_names = vec![ash::khr::surface::NAME.as_ptr()];
            if let Some(display) = desc.display {
                let required = ash_window::enumerate_required_extensions(display).map_err(|e| {
                    engine_error!(LOG_SOURCE, "Failed to get required surface extensions: {:?}", e);
                    Error::InitializationFailed(format!("Failed to get required extensions: {:?}", e))
                })?;
                for &name in required {
                    if !extension_names.contains(&name) {
                        extension_names.push(name);
                    }
                }
            }

            let validation = desc.enable_validation && Self::has_validation_layer(&entry);
            if desc.enable_validation && !validation {
                engine_warn!(LOG_SOURCE, "Validation requested but {:?} is not installed", VALIDATION_LAYER);
            }
            if validation {
                extension_names.push(ash::ext::debug_utils::NAME.as_ptr());
            }
            let layer_names = if validation {
                vec![VALIDATION_LAYER.as_ptr()]
            } else {
                vec![]
            };

            let create_info = vk::InstanceCreateInfo::default()
                .application_info(&app_info)
                .enabled_layer_names(&layer_names)
                .enabled_extension_names(&extension_names);

            let instance = entry.create_instance(&create_info, None).map_err(|e| {
                engine_error!(LOG_SOURCE, "Failed to create Vulkan instance: {:?}", e);
                Error::InitializationFailed(format!("Failed to create instance: {:?}", e))
            })?;

            let debug_utils = if validation {
                crate::debug::reset_validation_stats();
                let loader = ash::ext::debug_utils::Instance::new(&entry, &instance);
                let debug_info = vk::DebugUtilsMessengerCreateInfoEXT::default()
                    .message_severity(crate::debug::messenger_severities())
                    .message_type(
                        vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                            | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                            | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
                    )
                    .pfn_user_callback(Some(crate::debug::vulkan_debug_callback));
                match loader.create_debug_utils_messenger(&debug_info, None) {
                    Ok(messenger) => Some((loader, messenger)),
                    Err(e) => {
                        instance.destroy_instance(None);
                        engine_error!(LOG_SOURCE, "Failed to create debug messenger: {:?}", e);
                        return Err(Error::InitializationFailed(format!(
                            "Failed to create debug messenger: {:?}",
                            e
                        )));
                    }
                }
            } else {
                None
            };

            let surface_loader = ash::khr::surface::Instance::new(&entry, &instance);
            engine_info!(LOG_SOURCE, "Vulkan instance created (validation: {})", validation);

            Ok(Self {
                ctx: Arc::new(InstanceContext {
                    entry,
                    instance,
                    surface_loader,
                    debug_utils,
                }),
            })
        }
    }

    fn has_validation_layer(entry: &ash::Entry) -> bool {
        unsafe { entry.enumerate_instance_layer_properties() }
            .map(|layers| {
                layers
                    .iter()
                    .any(|layer| layer.layer_name_as_c_str().is_ok_and(|name| name == VALIDATION_LAYER))
            })
            .unwrap_or(false)
    }
}

impl InstanceBackend for VulkanInstance {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn enumerate_adapters(&self) -> Result<Vec<Box<dyn AdapterBackend>>> {
        let physical_devices = unsafe { self.ctx.instance.enumerate_physical_devices() }
            .map_err(|e| map_vk_error("vkEnumeratePhysicalDevices", e))?;

        let mut adapters: Vec<Box<dyn AdapterBackend>> = Vec::new();
        for physical_device in physical_devices {
            match VulkanAdapter::new(Arc::clone(&self.ctx), physical_device) {
                Some(adapter) => adapters.push(Box::new(adapter)),
                None => engine_debug!(LOG_SOURCE, "Skipping physical device without Vulkan 1.3 support"),
            }
        }
        Ok(adapters)
    }
}
