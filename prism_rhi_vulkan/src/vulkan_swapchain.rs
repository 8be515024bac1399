/// Swapchain - VkSurfaceKHR + VkSwapchainKHR bridged to timeline fences
///
/// Acquire and present are expressed with binary semaphores, the RHI speaks
/// timeline values. Each acquire waits on a binary semaphore from a ring
/// (image count + 1) and signals the requested fence value in the same
/// submission. Each present first converts the fence value into the
/// image's render-finished semaphore, then hands that to vkQueuePresentKHR.

use ash::vk;
use prism_rhi::prism::rhi::{
    AcquireOutcome, CommandListType, CommandQueueBackend, FenceBackend, PixelFormat, PresentOutcome,
    SwapchainBackend, SwapchainDesc, TextureBackend,
};
use prism_rhi::prism::{Error, Result};
use prism_rhi::{engine_bail, engine_debug, engine_error, engine_info, engine_warn};
use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use crate::vulkan_command_queue::{timeline, VulkanCommandQueue};
use crate::vulkan_context::{map_vk_error, GpuContext, LOG_SOURCE};
use crate::vulkan_format::{pixel_format_to_vk, vk_format_to_pixel_format};
use crate::vulkan_texture::VulkanTexture;

// ===== SURFACE NEGOTIATION =====

/// vsync 0 prefers MAILBOX then IMMEDIATE; FIFO is the fallback and the vsync mode
pub(crate) fn choose_present_mode(vsync_interval: u32, available: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    if vsync_interval == 0 {
        for mode in [vk::PresentModeKHR::MAILBOX, vk::PresentModeKHR::IMMEDIATE] {
            if available.contains(&mode) {
                return mode;
            }
        }
    }
    vk::PresentModeKHR::FIFO
}

/// Requested image count clamped to the surface limits (max 0 = unbounded)
pub(crate) fn choose_image_count(requested: u32, capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let count = requested.max(capabilities.min_image_count);
    if capabilities.max_image_count > 0 {
        count.min(capabilities.max_image_count)
    } else {
        count
    }
}

/// Surface extent, or the window size clamped to the limits when the surface lets us choose
pub(crate) fn choose_extent(capabilities: &vk::SurfaceCapabilitiesKHR, width: u32, height: u32) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        capabilities.current_extent
    } else {
        vk::Extent2D {
            width: width.clamp(capabilities.min_image_extent.width, capabilities.max_image_extent.width),
            height: height.clamp(capabilities.min_image_extent.height, capabilities.max_image_extent.height),
        }
    }
}

/// Requested format if the surface supports it, else the first one reported
pub(crate) fn choose_surface_format(
    requested: vk::Format,
    available: &[vk::SurfaceFormatKHR],
) -> Option<vk::SurfaceFormatKHR> {
    available
        .iter()
        .find(|format| format.format == requested)
        .or_else(|| available.first())
        .copied()
}

// ===== ACQUIRE =====

/// Acquire timeout in nanoseconds; `u64::MAX` would mean no timeout at all
pub(crate) fn acquire_timeout_ns(timeout: Duration) -> u64 {
    u64::try_from(timeout.as_nanos()).unwrap_or(u64::MAX).min(u64::MAX - 1)
}

/// Failed vkAcquireNextImageKHR; an image that never frees up is device loss
pub(crate) fn acquire_failure(result: vk::Result, timeout: Duration) -> Result<AcquireOutcome> {
    match result {
        vk::Result::ERROR_OUT_OF_DATE_KHR => Ok(AcquireOutcome::OutOfDate),
        vk::Result::TIMEOUT | vk::Result::NOT_READY => {
            engine_error!(LOG_SOURCE, "No swapchain image available after {:?}", timeout);
            Err(Error::DeviceLost(format!(
                "vkAcquireNextImageKHR returned {:?} after {:?}",
                result, timeout
            )))
        }
        _ => Err(map_vk_error("vkAcquireNextImageKHR", result)),
    }
}

// ===== SWAPCHAIN =====

pub struct VulkanSwapchain {
    ctx: Arc<GpuContext>,
    queue: VulkanCommandQueue,
    surface: vk::SurfaceKHR,
    swapchain: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    surface_format: vk::SurfaceFormatKHR,
    extent: vk::Extent2D,
    present_mode: vk::PresentModeKHR,
    requested_count: u32,
    /// Acquire semaphores, used round robin
    acquire_semaphores: Vec<vk::Semaphore>,
    next_acquire: usize,
    /// One per image, signaled when rendering into it is done
    render_finished: Vec<vk::Semaphore>,
}

impl VulkanSwapchain {
    pub(crate) fn new(ctx: Arc<GpuContext>, queue: &dyn CommandQueueBackend, desc: &SwapchainDesc) -> Result<Self> {
        let Some(queue) = queue.as_any().downcast_ref::<VulkanCommandQueue>() else {
            engine_bail!(LOG_SOURCE, "Command queue was not created by the Vulkan backend");
        };
        if queue.queue_type() != CommandListType::Graphics {
            return Err(Error::InvalidState("swapchains present from the graphics queue".to_string()));
        }
        let queue = VulkanCommandQueue::new(Arc::clone(&ctx), CommandListType::Graphics);
        let instance = &ctx.instance;

        let surface = unsafe {
            ash_window::create_surface(
                &instance.entry,
                &instance.instance,
                desc.window.display,
                desc.window.window,
                None,
            )
        }
        .map_err(|e| {
            engine_error!(LOG_SOURCE, "Failed to create window surface: {:?}", e);
            Error::InitializationFailed(format!("Failed to create window surface: {:?}", e))
        })?;

        let supported = unsafe {
            instance
                .surface_loader
                .get_physical_device_surface_support(ctx.physical_device, queue.family_index(), surface)
        }
        .unwrap_or(false);
        if !supported {
            unsafe { instance.surface_loader.destroy_surface(surface, None) };
            engine_error!(LOG_SOURCE, "Graphics queue family {} cannot present to this window", queue.family_index());
            return Err(Error::InitializationFailed("graphics queue cannot present to the window".to_string()));
        }

        let (surface_format, present_mode) = match Self::negotiate(&ctx, surface, desc) {
            Ok(negotiated) => negotiated,
            Err(e) => {
                unsafe { instance.surface_loader.destroy_surface(surface, None) };
                return Err(e);
            }
        };

        let mut swapchain = Self {
            ctx: Arc::clone(&ctx),
            queue,
            surface,
            swapchain: vk::SwapchainKHR::null(),
            images: Vec::new(),
            surface_format,
            extent: vk::Extent2D::default(),
            present_mode,
            requested_count: desc.buffer_count,
            acquire_semaphores: Vec::new(),
            next_acquire: 0,
            render_finished: Vec::new(),
        };
        // On failure the partially built swapchain is cleaned up by Drop
        swapchain.build(desc.window.width, desc.window.height)?;

        engine_info!(LOG_SOURCE, "Swapchain created: {}x{}, {} images, {:?}, {:?}",
            swapchain.extent.width, swapchain.extent.height, swapchain.images.len(),
            swapchain.surface_format.format, swapchain.present_mode);
        Ok(swapchain)
    }

    fn negotiate(
        ctx: &GpuContext,
        surface: vk::SurfaceKHR,
        desc: &SwapchainDesc,
    ) -> Result<(vk::SurfaceFormatKHR, vk::PresentModeKHR)> {
        let loader = &ctx.instance.surface_loader;
        let formats = unsafe { loader.get_physical_device_surface_formats(ctx.physical_device, surface) }
            .map_err(|e| map_vk_error("vkGetPhysicalDeviceSurfaceFormatsKHR", e))?;
        let modes = unsafe { loader.get_physical_device_surface_present_modes(ctx.physical_device, surface) }
            .map_err(|e| map_vk_error("vkGetPhysicalDeviceSurfacePresentModesKHR", e))?;

        let requested = pixel_format_to_vk(desc.format);
        let Some(surface_format) = choose_surface_format(requested, &formats) else {
            return Err(Error::InitializationFailed("surface reports no formats".to_string()));
        };
        if surface_format.format != requested {
            engine_warn!(LOG_SOURCE, "Surface does not support {:?}, using {:?}", desc.format, surface_format.format);
        }
        Ok((surface_format, choose_present_mode(desc.vsync_interval, &modes)))
    }

    /// (Re)create the VkSwapchainKHR and its semaphores
    fn build(&mut self, width: u32, height: u32) -> Result<()> {
        let ctx = Arc::clone(&self.ctx);
        let capabilities = unsafe {
            ctx.instance
                .surface_loader
                .get_physical_device_surface_capabilities(ctx.physical_device, self.surface)
        }
        .map_err(|e| map_vk_error("vkGetPhysicalDeviceSurfaceCapabilitiesKHR", e))?;

        let extent = choose_extent(&capabilities, width, height);
        let old_swapchain = self.swapchain;
        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(self.surface)
            .min_image_count(choose_image_count(self.requested_count, &capabilities))
            .image_format(self.surface_format.format)
            .image_color_space(self.surface_format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSFER_DST)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .pre_transform(capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(self.present_mode)
            .clipped(true)
            .old_swapchain(old_swapchain);

        let swapchain = unsafe { ctx.swapchain_loader.create_swapchain(&create_info, None) }
            .map_err(|e| map_vk_error("vkCreateSwapchainKHR", e))?;
        if old_swapchain != vk::SwapchainKHR::null() {
            unsafe { ctx.swapchain_loader.destroy_swapchain(old_swapchain, None) };
        }
        self.swapchain = swapchain;
        self.extent = extent;
        self.images = unsafe { ctx.swapchain_loader.get_swapchain_images(swapchain) }
            .map_err(|e| map_vk_error("vkGetSwapchainImagesKHR", e))?;

        self.destroy_semaphores();
        let semaphore_info = vk::SemaphoreCreateInfo::default();
        for _ in 0..=self.images.len() {
            let semaphore = unsafe { ctx.device.create_semaphore(&semaphore_info, None) }
                .map_err(|e| map_vk_error("vkCreateSemaphore", e))?;
            self.acquire_semaphores.push(semaphore);
        }
        for _ in 0..self.images.len() {
            let semaphore = unsafe { ctx.device.create_semaphore(&semaphore_info, None) }
                .map_err(|e| map_vk_error("vkCreateSemaphore", e))?;
            self.render_finished.push(semaphore);
        }
        self.next_acquire = 0;
        Ok(())
    }

    fn destroy_semaphores(&mut self) {
        for semaphore in self.acquire_semaphores.drain(..).chain(self.render_finished.drain(..)) {
            unsafe { self.ctx.device.destroy_semaphore(semaphore, None) };
        }
    }
}

impl SwapchainBackend for VulkanSwapchain {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn acquire_next_image(
        &mut self,
        fence: &dyn FenceBackend,
        signal_value: u64,
        timeout: Duration,
    ) -> Result<AcquireOutcome> {
        let semaphore = self.acquire_semaphores[self.next_acquire];
        let acquired = unsafe {
            self.ctx.swapchain_loader.acquire_next_image(
                self.swapchain,
                acquire_timeout_ns(timeout),
                semaphore,
                vk::Fence::null(),
            )
        };
        let index = match acquired {
            Ok((index, suboptimal)) => {
                if suboptimal {
                    engine_debug!(LOG_SOURCE, "Acquired suboptimal swapchain image {}", index);
                }
                index
            }
            Err(e) => return acquire_failure(e, timeout),
        };
        self.next_acquire = (self.next_acquire + 1) % self.acquire_semaphores.len();

        let wait = [vk::SemaphoreSubmitInfo::default()
            .semaphore(semaphore)
            .stage_mask(vk::PipelineStageFlags2::ALL_COMMANDS)];
        let signal = [vk::SemaphoreSubmitInfo::default()
            .semaphore(timeline(fence)?)
            .value(signal_value)
            .stage_mask(vk::PipelineStageFlags2::ALL_COMMANDS)];
        self.queue.submit(
            vk::SubmitInfo2::default()
                .wait_semaphore_infos(&wait)
                .signal_semaphore_infos(&signal),
        )?;
        Ok(AcquireOutcome::Acquired(index))
    }

    fn present(
        &mut self,
        index: u32,
        fence: &dyn FenceBackend,
        wait_value: u64,
        _vsync_interval: u32,
    ) -> Result<PresentOutcome> {
        let Some(&render_finished) = self.render_finished.get(index as usize) else {
            engine_bail!(LOG_SOURCE, "Present of image {} out of {}", index, self.images.len());
        };

        let wait = [vk::SemaphoreSubmitInfo::default()
            .semaphore(timeline(fence)?)
            .value(wait_value)
            .stage_mask(vk::PipelineStageFlags2::ALL_COMMANDS)];
        let signal = [vk::SemaphoreSubmitInfo::default()
            .semaphore(render_finished)
            .stage_mask(vk::PipelineStageFlags2::ALL_COMMANDS)];
        self.queue.submit(
            vk::SubmitInfo2::default()
                .wait_semaphore_infos(&wait)
                .signal_semaphore_infos(&signal),
        )?;

        let wait_semaphores = [render_finished];
        let swapchains = [self.swapchain];
        let image_indices = [index];
        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        let presented = self.queue.with_queue(|queue| unsafe {
            self.ctx.swapchain_loader.queue_present(queue, &present_info)
        });
        match presented {
            Ok(_) => Ok(PresentOutcome::Presented),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR | vk::Result::ERROR_SURFACE_LOST_KHR) => Ok(PresentOutcome::OutOfDate),
            Err(e) => Err(map_vk_error("vkQueuePresentKHR", e)),
        }
    }

    fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        unsafe { self.ctx.device.device_wait_idle() }.map_err(|e| map_vk_error("vkDeviceWaitIdle", e))?;
        self.build(width, height)?;
        engine_debug!(LOG_SOURCE, "Swapchain rebuilt: {}x{}, {} images",
            self.extent.width, self.extent.height, self.images.len());
        Ok(())
    }

    fn back_buffers(&self) -> Result<Vec<Box<dyn TextureBackend>>> {
        let format = self.format();
        Ok(self
            .images
            .iter()
            .map(|&image| {
                Box::new(VulkanTexture::swapchain_image(Arc::clone(&self.ctx), image, format)) as Box<dyn TextureBackend>
            })
            .collect())
    }

    fn extent(&self) -> (u32, u32) {
        (self.extent.width, self.extent.height)
    }

    fn format(&self) -> PixelFormat {
        vk_format_to_pixel_format(self.surface_format.format)
    }
}

impl Drop for VulkanSwapchain {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.device_wait_idle().ok();
        }
        self.destroy_semaphores();
        unsafe {
            if self.swapchain != vk::SwapchainKHR::null() {
                self.ctx.swapchain_loader.destroy_swapchain(self.swapchain, None);
            }
            self.ctx.instance.surface_loader.destroy_surface(self.surface, None);
        }
    }
}

#[cfg(test)]
#[path = "vulkan_swapchain_tests.rs"]
mod tests;
