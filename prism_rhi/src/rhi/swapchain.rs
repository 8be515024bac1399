/// Swapchain - ring of presentable back buffers and frame pacing
///
/// `prepare_next_image` and `present` form the backpressure loop: present
/// records the fence value that marks the end of the GPU work rendering into
/// the image, and the next time the ring hands that image out the CPU waits
/// for that value. With N back buffers the CPU can never run more than N
/// frames ahead of the GPU. Both calls must use the same fence.

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};
use crate::error::{Error, Result};
use crate::rhi::{Fence, FenceBackend, PixelFormat, Texture, TextureBackend, TextureDesc, TextureUsage};
use crate::{engine_debug, engine_error, engine_info, engine_warn};

/// Native window the swapchain presents to
#[derive(Debug, Clone, Copy)]
pub struct WindowHandles {
    pub window: RawWindowHandle,
    pub display: RawDisplayHandle,
    /// Initial client area size in pixels
    pub width: u32,
    pub height: u32,
}

/// Descriptor for creating a swapchain
#[derive(Debug, Clone, Copy)]
pub struct SwapchainDesc {
    pub window: WindowHandles,
    pub buffer_count: u32,
    pub format: PixelFormat,
    /// 0 = no vsync, n = present every n-th vertical blank
    pub vsync_interval: u32,
}

/// Result of a backend acquire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    Acquired(u32),
    OutOfDate,
}

/// Result of a backend present
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentOutcome {
    Presented,
    OutOfDate,
}

/// What `Swapchain::present` observed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentStatus {
    Presented,
    /// The image was not shown; the swapchain must be rebuilt before the next frame
    SurfaceLost,
}

/// Swapchain lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapchainState {
    Idle,
    Acquiring,
    Acquired,
    Presenting,
}

/// Backend part of a swapchain (IDXGISwapChain3, VkSwapchainKHR)
pub trait SwapchainBackend: Send + Sync {
    fn as_any(&self) -> &dyn Any;

    /// Get the next image and arrange for `fence` to reach `signal_value`
    /// once it can be rendered to
    ///
    /// A wait for the presentation engine longer than `timeout` is `DeviceLost`.
    fn acquire_next_image(
        &mut self,
        fence: &dyn FenceBackend,
        signal_value: u64,
        timeout: Duration,
    ) -> Result<AcquireOutcome>;

    /// Queue `index` for display once `fence` reaches `wait_value`
    fn present(
        &mut self,
        index: u32,
        fence: &dyn FenceBackend,
        wait_value: u64,
        vsync_interval: u32,
    ) -> Result<PresentOutcome>;

    /// Recreate the images; every texture returned by `back_buffers` has been dropped
    fn resize(&mut self, width: u32, height: u32) -> Result<()>;

    /// Fresh texture backends for the current images, in ring order
    fn back_buffers(&self) -> Result<Vec<Box<dyn TextureBackend>>>;

    fn extent(&self) -> (u32, u32);
    fn format(&self) -> PixelFormat;
}

/// Presentable back buffer ring
pub struct Swapchain {
    state: SwapchainState,
    back_buffers: Vec<Arc<Texture>>,
    /// Fence value that completes the last rendering into each image
    image_fence_values: Vec<u64>,
    current_index: u32,
    vsync_interval: u32,
    backend: Box<dyn SwapchainBackend>,
}

fn wrap_back_buffers(backend: &dyn SwapchainBackend) -> Result<Vec<Arc<Texture>>> {
    let (width, height) = backend.extent();
    let format = backend.format();
    let textures = backend
        .back_buffers()?
        .into_iter()
        .enumerate()
        .map(|(index, texture_backend)| {
            let desc = TextureDesc::render_target(width, height, format)
                .with_usage(TextureUsage::RENDER_TARGET)
                .with_name(format!("back_buffer_{}", index));
            Arc::new(Texture::back_buffer(desc, texture_backend))
        })
        .collect::<Vec<_>>();
    if textures.is_empty() {
        return Err(Error::InitializationFailed("swapchain has no images".to_string()));
    }
    Ok(textures)
}

impl Swapchain {
    pub(crate) fn new(desc: &SwapchainDesc, backend: Box<dyn SwapchainBackend>) -> Result<Self> {
        let back_buffers = wrap_back_buffers(backend.as_ref())?;
        if back_buffers.len() != desc.buffer_count as usize {
            engine_warn!("prism::Swapchain", "Requested {} back buffers, surface gave {}",
                desc.buffer_count, back_buffers.len());
        }
        let (width, height) = backend.extent();
        engine_info!("prism::Swapchain", "Swapchain created: {}x{} {:?}, {} images, vsync {}",
            width, height, backend.format(), back_buffers.len(), desc.vsync_interval);

        Ok(Self {
            state: SwapchainState::Idle,
            image_fence_values: vec![0; back_buffers.len()],
            back_buffers,
            current_index: 0,
            vsync_interval: desc.vsync_interval,
            backend,
        })
    }

    fn contract(&self, reason: &str) -> Error {
        engine_error!("prism::Swapchain", "{} (state {:?})", reason, self.state);
        Error::InvalidState(format!("swapchain: {} (state {:?})", reason, self.state))
    }

    pub fn state(&self) -> SwapchainState {
        self.state
    }

    pub fn buffer_count(&self) -> u32 {
        self.back_buffers.len() as u32
    }

    pub fn width(&self) -> u32 {
        self.backend.extent().0
    }

    pub fn height(&self) -> u32 {
        self.backend.extent().1
    }

    pub fn format(&self) -> PixelFormat {
        self.backend.format()
    }

    pub fn vsync_interval(&self) -> u32 {
        self.vsync_interval
    }

    /// Index of the acquired image, `None` unless an image is acquired
    pub fn current_buffer_index(&self) -> Option<u32> {
        (self.state == SwapchainState::Acquired).then_some(self.current_index)
    }

    pub fn back_buffer(&self, index: u32) -> Option<&Arc<Texture>> {
        self.back_buffers.get(index as usize)
    }

    pub fn back_buffers(&self) -> &[Arc<Texture>] {
        &self.back_buffers
    }

    /// Acquire the next image
    ///
    /// `fence` reaches `signal_value` on the GPU once the image is usable.
    /// Blocks while the GPU still renders into the previous use of the
    /// returned image.
    ///
    /// # Errors
    ///
    /// * `SurfaceOutOfDate` when the surface must be rebuilt (state returns to Idle)
    /// * `DeviceLost` when the image never becomes free
    pub fn prepare_next_image(&mut self, fence: &Fence, signal_value: u64) -> Result<u32> {
        if self.state != SwapchainState::Idle {
            return Err(self.contract("prepare_next_image while an image is in use"));
        }
        fence.schedule(signal_value)?;

        self.state = SwapchainState::Acquiring;
        let outcome = self.backend.acquire_next_image(fence.backend(), signal_value, fence.timeout());
        let index = match outcome {
            Ok(AcquireOutcome::Acquired(index)) if (index as usize) < self.back_buffers.len() => index,
            Ok(AcquireOutcome::Acquired(index)) => {
                self.state = SwapchainState::Idle;
                return Err(Error::BackendError(format!(
                    "swapchain returned image {} of {}",
                    index,
                    self.back_buffers.len()
                )));
            }
            Ok(AcquireOutcome::OutOfDate) => {
                self.state = SwapchainState::Idle;
                engine_warn!("prism::Swapchain", "Surface out of date on acquire");
                return Err(Error::SurfaceOutOfDate);
            }
            Err(e) => {
                self.state = SwapchainState::Idle;
                return Err(e);
            }
        };

        // Backpressure: the previous frame that rendered into this image must be done
        if let Err(e) = fence.wait(self.image_fence_values[index as usize]) {
            self.state = SwapchainState::Idle;
            return Err(e);
        }

        self.current_index = index;
        self.state = SwapchainState::Acquired;
        Ok(index)
    }

    /// Present the acquired image once `fence` reaches `wait_value`
    ///
    /// The back buffer must have been transitioned back to `Present`.
    pub fn present(&mut self, fence: &Fence, wait_value: u64) -> Result<PresentStatus> {
        if self.state != SwapchainState::Acquired {
            return Err(self.contract("present without an acquired image"));
        }
        let index = self.current_index;
        let back_buffer = &self.back_buffers[index as usize];
        if back_buffer.state() != crate::rhi::ResourceState::Present {
            let reason = format!("back buffer {} is in {:?}, expected Present", index, back_buffer.state());
            return Err(self.contract(&reason));
        }
        if wait_value > fence.last_scheduled_value() {
            return Err(self.contract("present waits on a fence value that is never signaled"));
        }

        self.state = SwapchainState::Presenting;
        let outcome = self.backend.present(index, fence.backend(), wait_value, self.vsync_interval);
        self.image_fence_values[index as usize] = wait_value;
        self.state = SwapchainState::Idle;

        match outcome? {
            PresentOutcome::Presented => Ok(PresentStatus::Presented),
            PresentOutcome::OutOfDate => {
                engine_warn!("prism::Swapchain", "Surface out of date on present (image {})", index);
                Ok(PresentStatus::SurfaceLost)
            }
        }
    }

    /// Destroy and recreate the back buffers
    ///
    /// All GPU work referencing the old images must be complete and every
    /// other holder of a back buffer (frame buffers, views) released.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        if width == 0 || height == 0 {
            return Err(Error::InvalidResource(format!("swapchain resize to {}x{}", width, height)));
        }
        match self.state {
            SwapchainState::Idle => {}
            SwapchainState::Acquired => {
                engine_warn!("prism::Swapchain", "Resizing with image {} acquired, the image is dropped", self.current_index);
            }
            SwapchainState::Acquiring | SwapchainState::Presenting => {
                return Err(self.contract("resize during acquire or present"));
            }
        }
        if let Some(shared) = self.back_buffers.iter().find(|texture| Arc::strong_count(texture) > 1) {
            let reason = format!("back buffer '{}' is still referenced", shared.name());
            return Err(self.contract(&reason));
        }

        self.back_buffers.clear();
        self.backend.resize(width, height)?;
        self.back_buffers = wrap_back_buffers(self.backend.as_ref())?;
        self.image_fence_values = vec![0; self.back_buffers.len()];
        self.current_index = 0;
        self.state = SwapchainState::Idle;

        engine_debug!("prism::Swapchain", "Swapchain resized to {}x{}", self.width(), self.height());
        Ok(())
    }

    pub fn backend(&self) -> &dyn SwapchainBackend {
        self.backend.as_ref()
    }

    /// Downcast the backend part to its concrete type
    pub fn backend_as<T: 'static>(&self) -> Option<&T> {
        self.backend.as_any().downcast_ref::<T>()
    }
}

impl std::fmt::Debug for Swapchain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Swapchain")
            .field("state", &self.state)
            .field("buffers", &self.back_buffers.len())
            .field("current_index", &self.current_index)
            .finish()
    }
}

#[cfg(test)]
#[path = "swapchain_tests.rs"]
mod tests;
