/// VulkanAdapter - one VkPhysicalDevice and logical device creation

use ash::vk;
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};
use prism_rhi::prism::rhi::{AdapterBackend, AdapterInfo, AdapterType, DeviceBackend, DeviceDesc};
use prism_rhi::prism::{Error, Result};
use prism_rhi::{engine_error, engine_info};
use std::any::Any;
use std::ffi::CStr;
use std::sync::{Arc, Mutex};

use crate::vulkan_context::{GpuContext, InstanceContext, QueueSlot, LOG_SOURCE};
use crate::vulkan_device::VulkanDevice;
use crate::vulkan_format::adapter_type;

/// Device extensions every adapter must expose
const REQUIRED_EXTENSIONS: [&CStr; 2] = [ash::khr::swapchain::NAME, ash::khr::push_descriptor::NAME];

/// Queue family used for each `CommandListType` (graphics, compute, copy)
///
/// Compute and copy prefer dedicated families and fall back to the next
/// more capable one.
pub(crate) fn select_queue_families(families: &[vk::QueueFamilyProperties]) -> Option<[u32; 3]> {
    let find = |accept: &dyn Fn(vk::QueueFlags) -> bool| {
        families
            .iter()
            .position(|family| family.queue_count > 0 && accept(family.queue_flags))
            .map(|index| index as u32)
    };

    let graphics = find(&|flags| flags.contains(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE))?;
    let compute = find(&|flags| flags.contains(vk::QueueFlags::COMPUTE) && !flags.contains(vk::QueueFlags::GRAPHICS))
        .unwrap_or(graphics);
    let copy = find(&|flags| {
        flags.contains(vk::QueueFlags::TRANSFER)
            && !flags.intersects(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE)
    })
    .unwrap_or(compute);
    Some([graphics, compute, copy])
}

/// (dedicated video memory, shared system memory) in bytes
pub(crate) fn memory_sizes(kind: AdapterType, heaps: &[vk::MemoryHeap]) -> (u64, u64) {
    let mut device_local = 0;
    let mut host = 0;
    for heap in heaps {
        if heap.flags.contains(vk::MemoryHeapFlags::DEVICE_LOCAL) {
            device_local += heap.size;
        } else {
            host += heap.size;
        }
    }
    match kind {
        // Integrated and software adapters carve their "VRAM" out of system memory
        AdapterType::Integrated | AdapterType::Software => (0, device_local + host),
        _ => (device_local, host),
    }
}

/// Vulkan implementation of `AdapterBackend`
pub struct VulkanAdapter {
    instance: Arc<InstanceContext>,
    physical_device: vk::PhysicalDevice,
    info: AdapterInfo,
}

impl VulkanAdapter {
    /// `None` when the device lacks Vulkan 1.3 or a required extension
    pub(crate) fn new(instance: Arc<InstanceContext>, physical_device: vk::PhysicalDevice) -> Option<Self> {
        unsafe {
            let properties = instance.instance.get_physical_device_properties(physical_device);
            if properties.api_version < vk::API_VERSION_1_3 {
                return None;
            }
            let extensions = instance
                .instance
                .enumerate_device_extension_properties(physical_device)
                .ok()?;
            let supported = REQUIRED_EXTENSIONS.iter().all(|required| {
                extensions
                    .iter()
                    .any(|ext| ext.extension_name_as_c_str().is_ok_and(|name| name == *required))
            });
            if !supported {
                return None;
            }

            let memory = instance.instance.get_physical_device_memory_properties(physical_device);
            let kind = adapter_type(properties.device_type);
            let (dedicated, shared) = memory_sizes(kind, memory.memory_heaps_as_slice());
            let name = properties
                .device_name_as_c_str()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|_| "Unknown Vulkan device".to_string());

            Some(Self {
                instance,
                physical_device,
                info: AdapterInfo {
                    name,
                    vendor_id: properties.vendor_id,
                    device_id: properties.device_id,
                    dedicated_video_memory: dedicated,
                    shared_system_memory: shared,
                    adapter_type: kind,
                },
            })
        }
    }

    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }
}

impl AdapterBackend for VulkanAdapter {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn info(&self) -> AdapterInfo {
        self.info.clone()
    }

    fn create_device(&self, desc: &DeviceDesc) -> Result<Box<dyn DeviceBackend>> {
        unsafe {
            let vk_instance = &self.instance.instance;
            let families = vk_instance.get_physical_device_queue_family_properties(self.physical_device);
            let per_type = select_queue_families(&families).ok_or_else(|| {
                engine_error!(LOG_SOURCE, "'{}' has no graphics queue family", self.info.name);
                Error::InitializationFailed("No graphics queue family found".to_string())
            })?;

            let mut unique: Vec<u32> = Vec::with_capacity(3);
            for family in per_type {
                if !unique.contains(&family) {
                    unique.push(family);
                }
            }
            let queue_priorities = [1.0];
            let queue_create_infos: Vec<vk::DeviceQueueCreateInfo> = unique
                .iter()
                .map(|&family| {
                    vk::DeviceQueueCreateInfo::default()
                        .queue_family_index(family)
                        .queue_priorities(&queue_priorities)
                })
                .collect();

            let supported = vk_instance.get_physical_device_features(self.physical_device);
            let features = vk::PhysicalDeviceFeatures::default()
                .sampler_anisotropy(supported.sampler_anisotropy == vk::TRUE)
                .fill_mode_non_solid(supported.fill_mode_non_solid == vk::TRUE)
                .image_cube_array(supported.image_cube_array == vk::TRUE)
                .depth_clamp(supported.depth_clamp == vk::TRUE);
            let mut features12 = vk::PhysicalDeviceVulkan12Features::default().timeline_semaphore(true);
            let mut features13 = vk::PhysicalDeviceVulkan13Features::default()
                .dynamic_rendering(true)
                .synchronization2(true);

            let extension_names: Vec<*const std::os::raw::c_char> =
                REQUIRED_EXTENSIONS.iter().map(|name| name.as_ptr()).collect();
            let device_create_info = vk::DeviceCreateInfo::default()
                .queue_create_infos(&queue_create_infos)
                .enabled_extension_names(&extension_names)
                .enabled_features(&features)
                .push_next(&mut features12)
                .push_next(&mut features13);

            let device = vk_instance
                .create_device(self.physical_device, &device_create_info, None)
                .map_err(|e| {
                    engine_error!(LOG_SOURCE, "Failed to create logical device: {:?}", e);
                    Error::InitializationFailed(format!("Failed to create device: {:?}", e))
                })?;

            let allocator = match Allocator::new(&AllocatorCreateDesc {
                instance: vk_instance.clone(),
                device: device.clone(),
                physical_device: self.physical_device,
                debug_settings: Default::default(),
                buffer_device_address: false,
                allocation_sizes: Default::default(),
            }) {
                Ok(allocator) => allocator,
                Err(e) => {
                    device.destroy_device(None);
                    engine_error!(LOG_SOURCE, "Failed to create GPU allocator: {:?}", e);
                    return Err(Error::InitializationFailed(format!("Failed to create allocator: {:?}", e)));
                }
            };

            let queues: Vec<QueueSlot> = unique
                .iter()
                .map(|&family| QueueSlot {
                    family,
                    queue: Mutex::new(device.get_device_queue(family, 0)),
                })
                .collect();
            let mut queue_for_type = [0usize; 3];
            for (slot, family) in queue_for_type.iter_mut().zip(per_type) {
                *slot = unique.iter().position(|&f| f == family).unwrap_or(0);
            }

            let limits = vk_instance.get_physical_device_properties(self.physical_device).limits;
            let max_anisotropy = if supported.sampler_anisotropy == vk::TRUE {
                limits.max_sampler_anisotropy
            } else {
                1.0
            };

            engine_info!(
                LOG_SOURCE,
                "Device '{}' created on '{}' (queue families: graphics {}, compute {}, copy {})",
                desc.name, self.info.name, per_type[0], per_type[1], per_type[2]
            );

            let ctx = GpuContext::new(
                Arc::clone(&self.instance),
                self.physical_device,
                device,
                allocator,
                queue_for_type,
                queues,
                max_anisotropy,
            );
            Ok(Box::new(VulkanDevice::new(Arc::new(ctx))))
        }
    }
}

#[cfg(test)]
#[path = "vulkan_adapter_tests.rs"]
mod tests;
