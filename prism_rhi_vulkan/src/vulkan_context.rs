/// Shared Vulkan state
///
/// `InstanceContext` owns the instance (and the debug messenger), `GpuContext`
/// owns the logical device, its queues and the memory allocator. Every
/// backend object holds an `Arc` to the context it was created from, so the
/// device outlives the last buffer, texture or pipeline and the instance
/// outlives the last device.

use ash::vk;
use gpu_allocator::vulkan::Allocator;
use prism_rhi::prism::rhi::CommandListType;
use prism_rhi::prism::Error;
use prism_rhi::engine_error;
use std::mem::ManuallyDrop;
use std::sync::{Arc, Mutex, MutexGuard};

pub(crate) const LOG_SOURCE: &str = "prism::vulkan";

/// Convert a failed Vulkan call into the RHI error taxonomy (and log it)
pub(crate) fn map_vk_error(what: &str, result: vk::Result) -> Error {
    engine_error!(LOG_SOURCE, "{} failed: {:?}", what, result);
    match result {
        vk::Result::ERROR_DEVICE_LOST => Error::DeviceLost(format!("{}: {:?}", what, result)),
        vk::Result::ERROR_OUT_OF_HOST_MEMORY | vk::Result::ERROR_OUT_OF_DEVICE_MEMORY => Error::OutOfMemory,
        vk::Result::ERROR_OUT_OF_DATE_KHR | vk::Result::ERROR_SURFACE_LOST_KHR => Error::SurfaceOutOfDate,
        _ => Error::BackendError(format!("{}: {:?}", what, result)),
    }
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

// ===== INSTANCE =====

/// Vulkan instance and the instance-level loaders
pub(crate) struct InstanceContext {
    pub entry: ash::Entry,
    pub instance: ash::Instance,
    pub surface_loader: ash::khr::surface::Instance,
    pub debug_utils: Option<(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)>,
}

impl Drop for InstanceContext {
    fn drop(&mut self) {
        unsafe {
            if let Some((loader, messenger)) = self.debug_utils.take() {
                loader.destroy_debug_utils_messenger(messenger, None);
                crate::debug::log_validation_summary();
            }
            self.instance.destroy_instance(None);
        }
    }
}

// ===== DEVICE =====

/// One hardware queue; submissions to it are externally synchronized
pub(crate) struct QueueSlot {
    pub family: u32,
    pub queue: Mutex<vk::Queue>,
}

/// Logical device shared by every GPU object
pub(crate) struct GpuContext {
    pub(crate) instance: Arc<InstanceContext>,
    pub(crate) physical_device: vk::PhysicalDevice,
    pub(crate) device: ash::Device,
    /// Dropped before the device is destroyed
    pub(crate) allocator: ManuallyDrop<Mutex<Allocator>>,
    pub(crate) swapchain_loader: ash::khr::swapchain::Device,
    pub(crate) push_descriptor: ash::khr::push_descriptor::Device,
    /// Index into `queues` for each `CommandListType`
    queue_for_type: [usize; 3],
    queues: Vec<QueueSlot>,
    pub(crate) max_sampler_anisotropy: f32,
}

impl GpuContext {
    pub(crate) fn new(
        instance: Arc<InstanceContext>,
        physical_device: vk::PhysicalDevice,
        device: ash::Device,
        allocator: Allocator,
        queue_for_type: [usize; 3],
        queues: Vec<QueueSlot>,
        max_sampler_anisotropy: f32,
    ) -> Self {
        let swapchain_loader = ash::khr::swapchain::Device::new(&instance.instance, &device);
        let push_descriptor = ash::khr::push_descriptor::Device::new(&instance.instance, &device);
        Self {
            instance,
            physical_device,
            device,
            allocator: ManuallyDrop::new(Mutex::new(allocator)),
            swapchain_loader,
            push_descriptor,
            queue_for_type,
            queues,
            max_sampler_anisotropy,
        }
    }

    pub(crate) fn queue_slot(&self, queue_type: CommandListType) -> &QueueSlot {
        &self.queues[self.queue_for_type[queue_type.index()]]
    }

    pub(crate) fn queue_family(&self, queue_type: CommandListType) -> u32 {
        self.queue_slot(queue_type).family
    }

    /// Sharing mode for resources used from every queue family
    pub(crate) fn sharing(&self) -> (vk::SharingMode, Vec<u32>) {
        let families: Vec<u32> = self.queues.iter().map(|slot| slot.family).collect();
        if families.len() > 1 {
            (vk::SharingMode::CONCURRENT, families)
        } else {
            (vk::SharingMode::EXCLUSIVE, Vec::new())
        }
    }

    pub(crate) fn allocator(&self) -> MutexGuard<'_, Allocator> {
        lock(&self.allocator)
    }
}

impl Drop for GpuContext {
    fn drop(&mut self) {
        unsafe {
            self.device.device_wait_idle().ok();
            // Allocator pages must be freed while the device is alive
            ManuallyDrop::drop(&mut self.allocator);
            self.device.destroy_device(None);
        }
    }
}
