/// Dx12Swapchain - flip-model IDXGISwapChain3 bound to the graphics queue
///
/// DXGI hands images out in a fixed ring, so acquiring only signals the
/// fence on the queue. Present makes the queue wait for the rendering
/// fence value first. DXGI never reports an out of date surface; resizing
/// is driven by the application.

use prism_rhi::prism::rhi::{
    AcquireOutcome, CommandListType, CommandQueueBackend, FenceBackend, PixelFormat, PresentOutcome,
    SwapchainBackend, SwapchainDesc, TextureBackend,
};
use prism_rhi::prism::{Error, Result};
use prism_rhi::{engine_bail, engine_debug, engine_error, engine_warn};
use raw_window_handle::RawWindowHandle;
use std::any::Any;
use std::ffi::c_void;
use std::sync::Arc;
use std::time::Duration;
use windows::core::Interface;
use windows::Win32::Foundation::HWND;
use windows::Win32::Graphics::Direct3D12::{ID3D12CommandQueue, ID3D12Resource};
use windows::Win32::Graphics::Dxgi::Common::{DXGI_ALPHA_MODE_IGNORE, DXGI_FORMAT_UNKNOWN, DXGI_SAMPLE_DESC};
use windows::Win32::Graphics::Dxgi::{
    IDXGISwapChain3, DXGI_MWA_NO_ALT_ENTER, DXGI_PRESENT, DXGI_SCALING_STRETCH, DXGI_SWAP_CHAIN_DESC1,
    DXGI_SWAP_CHAIN_FLAG, DXGI_SWAP_EFFECT_FLIP_DISCARD, DXGI_USAGE_RENDER_TARGET_OUTPUT,
};

use crate::dx12_command_queue::{d3d12_fence, Dx12CommandQueue};
use crate::dx12_context::{map_hr_error, set_debug_name, Dx12Context, LOG_SOURCE};
use crate::dx12_format::pixel_format_to_dxgi;
use crate::dx12_texture::Dx12Texture;

const MIN_BUFFER_COUNT: u32 = 2;
const MAX_BUFFER_COUNT: u32 = 16;
const MAX_SYNC_INTERVAL: u32 = 4;

/// Format of the swapchain buffers for a requested format
///
/// Flip-model swapchains only hold linear 8-bit, 10-bit and half float
/// buffers; sRGB requests get their linear counterpart.
pub(crate) fn swapchain_buffer_format(requested: PixelFormat) -> PixelFormat {
    match requested {
        PixelFormat::R8G8B8A8_UNORM
        | PixelFormat::B8G8R8A8_UNORM
        | PixelFormat::R10G10B10A2_UNORM
        | PixelFormat::R16G16B16A16_FLOAT => requested,
        PixelFormat::R8G8B8A8_SRGB => PixelFormat::R8G8B8A8_UNORM,
        _ => PixelFormat::B8G8R8A8_UNORM,
    }
}

pub(crate) fn buffer_count(requested: u32) -> u32 {
    requested.clamp(MIN_BUFFER_COUNT, MAX_BUFFER_COUNT)
}

pub(crate) fn sync_interval(vsync_interval: u32) -> u32 {
    vsync_interval.min(MAX_SYNC_INTERVAL)
}

fn window_hwnd(window: RawWindowHandle) -> Result<HWND> {
    match window {
        RawWindowHandle::Win32(handle) => Ok(HWND(handle.hwnd.get() as *mut c_void)),
        other => {
            engine_error!(LOG_SOURCE, "DirectX 12 swapchains need a Win32 window, got {:?}", other);
            Err(Error::InitializationFailed("window is not a Win32 window".to_string()))
        }
    }
}

/// DirectX 12 implementation of `SwapchainBackend`
pub struct Dx12Swapchain {
    ctx: Arc<Dx12Context>,
    queue: ID3D12CommandQueue,
    swapchain: IDXGISwapChain3,
    format: PixelFormat,
    buffer_count: u32,
    extent: (u32, u32),
}

unsafe impl Send for Dx12Swapchain {}
unsafe impl Sync for Dx12Swapchain {}

impl Dx12Swapchain {
    pub(crate) fn new(ctx: Arc<Dx12Context>, queue: &dyn CommandQueueBackend, desc: &SwapchainDesc) -> Result<Self> {
        let Some(queue) = queue.as_any().downcast_ref::<Dx12CommandQueue>() else {
            engine_bail!(LOG_SOURCE, "Command queue was not created by the DirectX 12 backend");
        };
        if queue.queue_type() != CommandListType::Graphics {
            return Err(Error::InvalidState("swapchains present from the graphics queue".to_string()));
        }
        let hwnd = window_hwnd(desc.window.window)?;

        let format = swapchain_buffer_format(desc.format);
        if format != desc.format {
            engine_warn!(LOG_SOURCE, "Swapchain format {:?} is not presentable, using {:?}", desc.format, format);
        }
        let count = buffer_count(desc.buffer_count);

        let swapchain_desc = DXGI_SWAP_CHAIN_DESC1 {
            Width: desc.window.width,
            Height: desc.window.height,
            Format: pixel_format_to_dxgi(format),
            Stereo: false.into(),
            SampleDesc: DXGI_SAMPLE_DESC { Count: 1, Quality: 0 },
            BufferUsage: DXGI_USAGE_RENDER_TARGET_OUTPUT,
            BufferCount: count,
            Scaling: DXGI_SCALING_STRETCH,
            SwapEffect: DXGI_SWAP_EFFECT_FLIP_DISCARD,
            AlphaMode: DXGI_ALPHA_MODE_IGNORE,
            Flags: 0,
        };

        let swapchain = unsafe {
            ctx.factory
                .CreateSwapChainForHwnd(queue.queue(), hwnd, &swapchain_desc, None, None)
        }
        .map_err(|e| {
            engine_error!(LOG_SOURCE, "CreateSwapChainForHwnd failed: {}", e);
            Error::InitializationFailed(format!("CreateSwapChainForHwnd: {}", e))
        })?;
        let swapchain: IDXGISwapChain3 = swapchain
            .cast()
            .map_err(|e| map_hr_error("IDXGISwapChain1::QueryInterface(IDXGISwapChain3)", e))?;

        // Fullscreen switching is left to the application
        if let Err(e) = unsafe { ctx.factory.MakeWindowAssociation(hwnd, DXGI_MWA_NO_ALT_ENTER) } {
            engine_warn!(LOG_SOURCE, "MakeWindowAssociation failed: {}", e);
        }

        let mut swapchain = Self {
            queue: queue.queue().clone(),
            swapchain,
            format,
            buffer_count: count,
            extent: (desc.window.width, desc.window.height),
            ctx,
        };
        swapchain.refresh_extent()?;

        engine_debug!(
            LOG_SOURCE,
            "Swapchain created: {}x{} {:?}, {} buffers",
            swapchain.extent.0, swapchain.extent.1, format, count
        );
        Ok(swapchain)
    }

    /// A zero size at creation takes the window's client size; read back what DXGI chose
    fn refresh_extent(&mut self) -> Result<()> {
        let desc = unsafe { self.swapchain.GetDesc1() }.map_err(|e| map_hr_error("IDXGISwapChain1::GetDesc1", e))?;
        self.extent = (desc.Width, desc.Height);
        self.buffer_count = desc.BufferCount;
        Ok(())
    }

    pub fn swapchain(&self) -> &IDXGISwapChain3 {
        &self.swapchain
    }
}

impl SwapchainBackend for Dx12Swapchain {
    fn as_any(&self) -> &dyn Any {
        self
    }

    /// Never blocks: DXGI hands out the next ring image immediately
    fn acquire_next_image(
        &mut self,
        fence: &dyn FenceBackend,
        signal_value: u64,
        _timeout: Duration,
    ) -> Result<AcquireOutcome> {
        let index = unsafe { self.swapchain.GetCurrentBackBufferIndex() };
        unsafe { self.queue.Signal(d3d12_fence(fence)?, signal_value) }
            .map_err(|e| map_hr_error("ID3D12CommandQueue::Signal", e))?;
        Ok(AcquireOutcome::Acquired(index))
    }

    fn present(
        &mut self,
        index: u32,
        fence: &dyn FenceBackend,
        wait_value: u64,
        vsync_interval: u32,
    ) -> Result<PresentOutcome> {
        let current = unsafe { self.swapchain.GetCurrentBackBufferIndex() };
        if current != index {
            engine_bail!(LOG_SOURCE, "Presenting image {} but DXGI expects image {}", index, current);
        }
        unsafe { self.queue.Wait(d3d12_fence(fence)?, wait_value) }
            .map_err(|e| map_hr_error("ID3D12CommandQueue::Wait", e))?;

        let hr = unsafe { self.swapchain.Present(sync_interval(vsync_interval), DXGI_PRESENT(0)) };
        if let Err(e) = hr.ok() {
            self.ctx.flush_debug_messages();
            return Err(map_hr_error("IDXGISwapChain::Present", e));
        }
        Ok(PresentOutcome::Presented)
    }

    fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        self.ctx.wait_queue_idle(&self.queue)?;
        unsafe {
            self.swapchain
                .ResizeBuffers(0, width, height, DXGI_FORMAT_UNKNOWN, DXGI_SWAP_CHAIN_FLAG(0))
        }
        .map_err(|e| map_hr_error("IDXGISwapChain::ResizeBuffers", e))?;
        self.refresh_extent()?;
        engine_debug!(LOG_SOURCE, "Swapchain resized: {}x{}", self.extent.0, self.extent.1);
        Ok(())
    }

    fn back_buffers(&self) -> Result<Vec<Box<dyn TextureBackend>>> {
        (0..self.buffer_count)
            .map(|index| {
                let resource: ID3D12Resource = unsafe { self.swapchain.GetBuffer(index) }
                    .map_err(|e| map_hr_error("IDXGISwapChain::GetBuffer", e))?;
                set_debug_name(&resource, &format!("back_buffer_{}", index));
                Ok(Box::new(Dx12Texture::swapchain_image(resource, self.format)) as Box<dyn TextureBackend>)
            })
            .collect()
    }

    fn extent(&self) -> (u32, u32) {
        self.extent
    }

    fn format(&self) -> PixelFormat {
        self.format
    }
}

impl Drop for Dx12Swapchain {
    fn drop(&mut self) {
        // Buffers may still be referenced by in-flight presents
        if let Err(e) = self.ctx.wait_queue_idle(&self.queue) {
            engine_warn!(LOG_SOURCE, "Swapchain dropped while the queue did not drain: {}", e);
        }
    }
}

#[cfg(test)]
#[path = "dx12_swapchain_tests.rs"]
mod tests;
