/// GraphicsEngine - explicitly owned RHI context driving the frame loop
///
/// Created once by `start_up` and passed by reference to every subsystem
/// that renders. Per frame the calls must come in this order:
/// `begin_draw_frame`, `begin_swapchain_render_pass` (any number of times),
/// `end_draw_frame`. `on_resize` may be called at any time; it is applied
/// between frames.
///
/// Frame pacing uses the graphics queue fence: the swapchain arms it with
/// the acquire value, the graphics queue waits on that value before the
/// frame's work, and the value signaled after the frame is what `present`
/// waits on and what the next use of the same image blocks on.

use std::sync::Arc;
use crate::config::RhiConfig;
use crate::error::{Error, Result};
use crate::rhi::{
    AttachmentDesc, BackendRegistry, ClearValue, CommandList, CommandListType, CommandQueue,
    DescriptorHeapDesc, DescriptorHeapType, Device, FrameBuffer, FrameBufferDesc, Instance,
    InstanceDesc, LoadOp, PresentStatus, RenderPass, RenderPassDesc, ResourceState, ScissorRect,
    StoreOp, Swapchain, SwapchainDesc, Texture, TextureDesc, ViewHeaps, Viewport, WindowHandles,
};
use crate::{engine_debug, engine_error, engine_info, engine_trace, engine_warn};

/// Where the engine is inside the frame sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramePhase {
    /// Between `end_draw_frame` and the next `begin_draw_frame`
    Idle,
    /// An image is acquired and the graphics list is recording
    Recording,
}

/// Owner of every long-lived RHI object
///
/// Fields drop in declaration order: views and frame buffers before the
/// swapchain, lists before queues, everything before the device and the
/// instance.
pub struct GraphicsEngine {
    frame_buffers: Vec<FrameBuffer>,
    depth_buffer: Arc<Texture>,
    draw_clear_pass: Arc<RenderPass>,
    draw_continue_pass: Arc<RenderPass>,
    /// Private RTV/DSV heaps of the swapchain frame buffers
    swapchain_heaps: ViewHeaps,
    swapchain: Swapchain,
    /// One list per frame in flight, per queue type
    command_lists: [Vec<CommandList>; 3],
    /// Queue fence value that completes the last submission of each list
    list_fence_values: [Vec<u64>; 3],
    queues: [CommandQueue; 3],
    device: Device,
    instance: Instance,

    config: RhiConfig,
    phase: FramePhase,
    current_frame: usize,
    /// The swapchain clear pass was already begun this frame
    cleared_this_frame: bool,
    frame_count: u64,
    pending_resize: Option<(u32, u32)>,
    device_lost: Option<String>,
    released: bool,
}

fn list_name(list_type: CommandListType, index: usize) -> String {
    format!("{:?}_list_{}", list_type, index).to_lowercase()
}

/// Grow the per-frame lists of `list_type` to `count`
fn ensure_lists(
    device: &Device,
    list_type: CommandListType,
    count: usize,
    lists: &mut Vec<CommandList>,
    fence_values: &mut Vec<u64>,
) -> Result<()> {
    while lists.len() < count {
        lists.push(device.create_command_list(list_type, list_name(list_type, lists.len()))?);
    }
    if fence_values.len() < count {
        fence_values.resize(count, 0);
    }
    Ok(())
}

/// RTV and DSV heaps sized for `count` frame buffers, sharing the device shader-visible heaps
fn create_swapchain_heaps(device: &Device, count: u32) -> Result<ViewHeaps> {
    let heap = |heap_type, name: &str| {
        device.create_descriptor_heap(DescriptorHeapDesc {
            heap_type,
            capacity: count,
            shader_visible: false,
            name: name.to_string(),
        })
    };
    Ok(ViewHeaps {
        render_target: heap(DescriptorHeapType::RenderTarget, "swapchain_rtv")?,
        depth_stencil: heap(DescriptorHeapType::DepthStencil, "swapchain_dsv")?,
        ..device.view_heaps().clone()
    })
}

fn create_swapchain_pass(device: &Device, swapchain: &Swapchain, config: &RhiConfig, load_op: LoadOp) -> Result<Arc<RenderPass>> {
    let name = match load_op {
        LoadOp::Clear => "draw_clear",
        _ => "draw_continue",
    };
    device.create_render_pass(RenderPassDesc {
        color_attachments: vec![AttachmentDesc::new(swapchain.format(), load_op, StoreOp::Store)],
        depth_attachment: Some(AttachmentDesc::new(config.depth_format, load_op, StoreOp::Store)),
        name: name.to_string(),
    })
}

/// Depth buffer and one frame buffer per back buffer
fn create_swapchain_targets(
    device: &Device,
    swapchain: &Swapchain,
    heaps: &ViewHeaps,
    pass: &Arc<RenderPass>,
    config: &RhiConfig,
) -> Result<(Arc<Texture>, Vec<FrameBuffer>)> {
    let depth = device.create_texture(
        TextureDesc::depth_stencil(swapchain.width(), swapchain.height(), config.depth_format)
            .with_name("swapchain_depth"),
    )?;
    let frame_buffers = swapchain
        .back_buffers()
        .iter()
        .enumerate()
        .map(|(index, back_buffer)| {
            device.create_frame_buffer_in(
                heaps,
                FrameBufferDesc {
                    render_pass: Arc::clone(pass),
                    render_targets: vec![Arc::clone(back_buffer)],
                    depth_stencil: Some(Arc::clone(&depth)),
                    name: format!("swapchain_fb_{}", index),
                },
            )
        })
        .collect::<Result<Vec<_>>>()?;
    Ok((depth, frame_buffers))
}

impl GraphicsEngine {
    /// Bring up instance, device, queues, swapchain and the swapchain frame buffers
    ///
    /// # Errors
    ///
    /// * `InitializationFailed` if the configuration is invalid, the API is
    ///   not registered or no adapter is usable
    pub fn start_up(registry: &BackendRegistry, config: RhiConfig, window: WindowHandles) -> Result<Self> {
        config.validate().inspect_err(|e| {
            engine_error!("prism::GraphicsEngine", "Invalid configuration: {}", e);
        })?;

        let instance = Instance::new(
            registry,
            config.api,
            InstanceDesc {
                app_name: config.app_name.clone(),
                enable_validation: config.enable_validation,
                display: Some(window.display),
            },
        )?;
        let adapter = instance.select_adapter(config.adapter_preference).ok_or_else(|| {
            engine_error!("prism::GraphicsEngine", "No adapter matches {:?}", config.adapter_preference);
            Error::InitializationFailed("no usable display adapter".to_string())
        })?;
        let device = adapter.create_device(&config)?;

        let queues = [
            device.create_command_queue(CommandListType::Graphics)?,
            device.create_command_queue(CommandListType::Compute)?,
            device.create_command_queue(CommandListType::Copy)?,
        ];
        let swapchain = device.create_swapchain(
            &queues[CommandListType::Graphics.index()],
            &SwapchainDesc {
                window,
                buffer_count: config.frame_buffer_count,
                format: config.back_buffer_format,
                vsync_interval: config.vsync_interval,
            },
        )?;

        let frames = swapchain.buffer_count() as usize;
        let mut command_lists: [Vec<CommandList>; 3] = Default::default();
        let mut list_fence_values: [Vec<u64>; 3] = Default::default();
        for list_type in CommandListType::ALL {
            let index = list_type.index();
            ensure_lists(&device, list_type, frames, &mut command_lists[index], &mut list_fence_values[index])?;
        }

        let draw_clear_pass = create_swapchain_pass(&device, &swapchain, &config, LoadOp::Clear)?;
        let draw_continue_pass = create_swapchain_pass(&device, &swapchain, &config, LoadOp::Load)?;
        let swapchain_heaps = create_swapchain_heaps(&device, swapchain.buffer_count())?;
        let (depth_buffer, frame_buffers) =
            create_swapchain_targets(&device, &swapchain, &swapchain_heaps, &draw_clear_pass, &config)?;

        engine_info!("prism::GraphicsEngine", "Started {:?} on '{}' ({}x{}, {} frames in flight)",
            config.api, device.adapter_info().name, swapchain.width(), swapchain.height(), frames);

        Ok(Self {
            frame_buffers,
            depth_buffer,
            draw_clear_pass,
            draw_continue_pass,
            swapchain_heaps,
            swapchain,
            command_lists,
            list_fence_values,
            queues,
            device,
            instance,
            config,
            phase: FramePhase::Idle,
            current_frame: 0,
            cleared_this_frame: false,
            frame_count: 0,
            pending_resize: None,
            device_lost: None,
            released: false,
        })
    }

    // ===== ACCESSORS =====

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn instance(&self) -> &Instance {
        &self.instance
    }

    pub fn config(&self) -> &RhiConfig {
        &self.config
    }

    pub fn swapchain(&self) -> &Swapchain {
        &self.swapchain
    }

    pub fn command_queue(&self, queue_type: CommandListType) -> &CommandQueue {
        &self.queues[queue_type.index()]
    }

    /// Index of the frame being recorded (the acquired back buffer)
    pub fn current_frame_index(&self) -> usize {
        self.current_frame
    }

    pub fn phase(&self) -> FramePhase {
        self.phase
    }

    /// Number of frames presented so far
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Swapchain pass that clears color and depth
    pub fn draw_clear_render_pass(&self) -> &Arc<RenderPass> {
        &self.draw_clear_pass
    }

    /// Swapchain pass that keeps the content drawn earlier in the frame
    pub fn draw_continue_render_pass(&self) -> &Arc<RenderPass> {
        &self.draw_continue_pass
    }

    pub fn frame_buffer(&self, index: usize) -> Option<&FrameBuffer> {
        self.frame_buffers.get(index)
    }

    pub fn depth_buffer(&self) -> &Arc<Texture> {
        &self.depth_buffer
    }

    pub fn is_device_lost(&self) -> bool {
        self.device_lost.is_some()
    }

    /// The list of `list_type` for the current frame, opened for recording
    ///
    /// A closed list is reopened after the CPU waited for its previous
    /// submission, so its allocator can be reset.
    pub fn command_list(&mut self, list_type: CommandListType) -> Result<&mut CommandList> {
        self.check_device()?;
        let result = self.open_list(list_type);
        self.latch(result)?;
        Ok(&mut self.command_lists[list_type.index()][self.current_frame])
    }

    // ===== FRAME LOOP =====

    /// Acquire the next back buffer and open the frame's graphics list
    ///
    /// Returns `Ok(false)` without starting a frame while the window is
    /// minimised.
    ///
    /// # Errors
    ///
    /// * `InvalidState` if a frame is already open
    /// * `DeviceLost` when the GPU stopped responding (latched)
    pub fn begin_draw_frame(&mut self) -> Result<bool> {
        self.check_device()?;
        if self.phase != FramePhase::Idle {
            return Err(self.contract("begin_draw_frame inside a frame"));
        }
        let result = self.begin_frame();
        self.latch(result)
    }

    fn begin_frame(&mut self) -> Result<bool> {
        if let Some((width, height)) = self.pending_resize {
            if width == 0 || height == 0 {
                return Ok(false);
            }
            self.rebuild_swapchain(width, height)?;
            self.pending_resize = None;
        }

        let index = match self.acquire() {
            Err(Error::SurfaceOutOfDate) => {
                self.rebuild_swapchain(self.swapchain.width(), self.swapchain.height())?;
                self.acquire()?
            }
            other => other?,
        };
        self.current_frame = index as usize;
        self.cleared_this_frame = false;

        self.open_list(CommandListType::Graphics)?;
        let heaps = self.device.view_heaps().clone();
        let back_buffer = self.current_back_buffer()?;
        let list = &mut self.command_lists[CommandListType::Graphics.index()][self.current_frame];
        list.set_descriptor_heaps(&heaps.shader_visible())?;
        list.transition_texture(&back_buffer, ResourceState::RenderTarget)?;
        list.transition_texture(&self.depth_buffer, ResourceState::DepthStencilWrite)?;

        self.phase = FramePhase::Recording;
        engine_trace!("prism::GraphicsEngine", "Frame {} begins on image {}", self.frame_count, index);
        Ok(true)
    }

    /// Acquire an image and make the graphics queue wait until it is usable
    fn acquire(&mut self) -> Result<u32> {
        let queue = &self.queues[CommandListType::Graphics.index()];
        let fence = Arc::clone(queue.fence());
        let acquire_value = fence.next_value();
        let index = self.swapchain.prepare_next_image(&fence, acquire_value)?;
        queue.wait(&fence, acquire_value)?;
        Ok(index)
    }

    /// Begin the swapchain render pass of the current frame
    ///
    /// The first call of a frame uses the clear pass; later calls continue
    /// on top of what was drawn.
    pub fn begin_swapchain_render_pass(&mut self) -> Result<()> {
        self.check_device()?;
        if self.phase != FramePhase::Recording {
            return Err(self.contract("begin_swapchain_render_pass outside a frame"));
        }
        let frame_buffer = &self.frame_buffers[self.current_frame];
        let (width, height) = (frame_buffer.width(), frame_buffer.height());
        let list = &mut self.command_lists[CommandListType::Graphics.index()][self.current_frame];

        if self.cleared_this_frame {
            list.begin_render_pass(&self.draw_continue_pass, frame_buffer, &[])?;
        } else {
            let clear_values = [
                ClearValue::Color(self.config.clear_color),
                ClearValue::DepthStencil { depth: 1.0, stencil: 0 },
            ];
            list.begin_render_pass(&self.draw_clear_pass, frame_buffer, &clear_values)?;
            self.cleared_this_frame = true;
        }
        list.set_viewport(&Viewport::from_extent(width, height))?;
        list.set_scissor(&ScissorRect::from_extent(width, height))
    }

    /// Submit the frame's graphics list and present the image
    ///
    /// # Errors
    ///
    /// * `InvalidState` without a matching `begin_draw_frame`
    /// * `DeviceLost` when the GPU stopped responding (latched)
    pub fn end_draw_frame(&mut self) -> Result<()> {
        self.check_device()?;
        if self.phase != FramePhase::Recording {
            return Err(self.contract("end_draw_frame without begin_draw_frame"));
        }
        let result = self.end_frame();
        self.phase = FramePhase::Idle;
        self.latch(result)
    }

    fn end_frame(&mut self) -> Result<()> {
        let graphics = CommandListType::Graphics.index();
        let frame = self.current_frame;
        // Reopens the list if it was flushed without `still_mid_frame`
        self.open_list(CommandListType::Graphics)?;

        let back_buffer = self.current_back_buffer()?;
        let list = &mut self.command_lists[graphics][frame];
        if list.in_render_pass() {
            list.end_render_pass()?;
        }
        list.transition_texture(&back_buffer, ResourceState::Present)?;
        list.end_recording()?;
        // A surface rebuild below needs the only reference to each back buffer
        drop(back_buffer);

        let queue = &self.queues[graphics];
        queue.execute(&mut [list])?;
        let value = queue.signal_next()?;
        self.list_fence_values[graphics][frame] = value;

        let fence = Arc::clone(queue.fence());
        match self.swapchain.present(&fence, value)? {
            PresentStatus::Presented => {
                self.frame_count += 1;
            }
            PresentStatus::SurfaceLost => {
                let (width, height) = self.pending_resize.unwrap_or((self.swapchain.width(), self.swapchain.height()));
                if width != 0 && height != 0 {
                    self.rebuild_swapchain(width, height)?;
                    self.pending_resize = None;
                }
            }
        }
        Ok(())
    }

    // ===== SUBMISSION =====

    /// Close, execute and signal the current list of `list_type`
    ///
    /// With `still_mid_frame` the list is reopened right away without
    /// resetting its allocator, so recording continues in the same frame.
    /// Otherwise it stays closed until the next `command_list` call.
    /// Returns the queue fence value marking completion of the submission.
    pub fn flush_gpu_commands(&mut self, list_type: CommandListType, still_mid_frame: bool) -> Result<u64> {
        self.check_device()?;
        let result = self.flush_list(list_type, still_mid_frame);
        self.latch(result)
    }

    fn flush_list(&mut self, list_type: CommandListType, still_mid_frame: bool) -> Result<u64> {
        let index = list_type.index();
        let frame = self.current_frame;
        let list = &mut self.command_lists[index][frame];
        if !list.is_recording() {
            let reason = format!("flush of {:?} list '{}' that is not recording", list_type, list.name());
            return Err(self.contract(&reason));
        }
        list.end_recording()?;

        let queue = &self.queues[index];
        queue.execute(&mut [&mut *list])?;
        let value = queue.signal_next()?;
        self.list_fence_values[index][frame] = value;

        if still_mid_frame {
            list.begin_recording(true)?;
        }
        engine_trace!("prism::GraphicsEngine", "Flushed {:?} list {} (fence {})", list_type, frame, value);
        Ok(value)
    }

    /// Wait for the `list_type` queue to reach `value`
    ///
    /// With `stop_cpu` the calling thread blocks. Otherwise the graphics
    /// queue waits on the GPU, ordering later graphics submissions after the
    /// work of the other queue.
    pub fn wait_execution_gpu_commands(&mut self, list_type: CommandListType, value: u64, stop_cpu: bool) -> Result<()> {
        self.check_device()?;
        let fence = Arc::clone(self.queues[list_type.index()].fence());
        let result = if stop_cpu {
            fence.wait(value)
        } else {
            self.queues[CommandListType::Graphics.index()].wait(&fence, value)
        };
        self.latch(result)
    }

    // ===== RESIZE =====

    /// Record a new window size
    ///
    /// A zero size (minimised window) pauses rendering until a non-zero size
    /// arrives. Inside a frame the resize is applied at the next
    /// `begin_draw_frame`.
    pub fn on_resize(&mut self, width: u32, height: u32) -> Result<()> {
        self.check_device()?;
        if width == 0 || height == 0 || self.phase != FramePhase::Idle {
            engine_debug!("prism::GraphicsEngine", "Resize to {}x{} deferred", width, height);
            self.pending_resize = Some((width, height));
            return Ok(());
        }
        let result = self.rebuild_swapchain(width, height);
        if result.is_ok() {
            self.pending_resize = None;
        }
        self.latch(result)
    }

    /// Flush the GPU, then recreate back buffers, depth buffer and frame buffers
    fn rebuild_swapchain(&mut self, width: u32, height: u32) -> Result<()> {
        self.device.wait_idle()?;

        self.frame_buffers.clear();
        self.swapchain_heaps.render_target.reset_id()?;
        self.swapchain_heaps.depth_stencil.reset_id()?;
        self.swapchain.resize(width, height)?;

        let frames = self.swapchain.buffer_count();
        if frames > self.swapchain_heaps.render_target.capacity() {
            engine_warn!("prism::GraphicsEngine", "Swapchain grew to {} images, recreating its heaps", frames);
            self.swapchain_heaps = create_swapchain_heaps(&self.device, frames)?;
        }
        for list_type in CommandListType::ALL {
            let index = list_type.index();
            ensure_lists(
                &self.device,
                list_type,
                frames as usize,
                &mut self.command_lists[index],
                &mut self.list_fence_values[index],
            )?;
        }

        let (depth_buffer, frame_buffers) = create_swapchain_targets(
            &self.device,
            &self.swapchain,
            &self.swapchain_heaps,
            &self.draw_clear_pass,
            &self.config,
        )?;
        self.depth_buffer = depth_buffer;
        self.frame_buffers = frame_buffers;
        self.current_frame = 0;

        engine_info!("prism::GraphicsEngine", "Swapchain rebuilt at {}x{}", width, height);
        Ok(())
    }

    // ===== SHUTDOWN =====

    /// Wait for the GPU and release everything
    ///
    /// Still succeeds after a device loss; the GPU is not waited for then.
    pub fn shut_down(mut self) -> Result<()> {
        let result = self.drain_gpu();
        self.frame_buffers.clear();
        self.released = true;
        engine_info!("prism::GraphicsEngine", "Shut down after {} frames", self.frame_count);
        result
    }

    fn drain_gpu(&self) -> Result<()> {
        if self.device_lost.is_some() {
            return Ok(());
        }
        self.device.wait_idle()
    }

    // ===== HELPERS =====

    /// Reopen the current list of `list_type` unless it is recording
    fn open_list(&mut self, list_type: CommandListType) -> Result<()> {
        let index = list_type.index();
        let list = &mut self.command_lists[index][self.current_frame];
        if list.is_recording() {
            return Ok(());
        }
        self.queues[index].fence().wait(self.list_fence_values[index][self.current_frame])?;
        list.begin_recording(false)
    }

    fn current_back_buffer(&self) -> Result<Arc<Texture>> {
        match self.swapchain.back_buffer(self.current_frame as u32) {
            Some(texture) => Ok(Arc::clone(texture)),
            None => Err(self.contract("no back buffer for the current frame")),
        }
    }

    fn check_device(&self) -> Result<()> {
        match &self.device_lost {
            Some(reason) => Err(Error::DeviceLost(reason.clone())),
            None => Ok(()),
        }
    }

    fn latch<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(Error::DeviceLost(reason)) = &result {
            if self.device_lost.is_none() {
                engine_error!("prism::GraphicsEngine", "Device lost, rendering stops: {}", reason);
                self.device_lost = Some(reason.clone());
            }
        }
        result
    }

    fn contract(&self, reason: &str) -> Error {
        engine_error!("prism::GraphicsEngine", "{} (phase {:?})", reason, self.phase);
        Error::InvalidState(format!("{} (phase {:?})", reason, self.phase))
    }
}

impl Drop for GraphicsEngine {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = self.drain_gpu() {
            engine_warn!("prism::GraphicsEngine", "GPU did not go idle before release: {}", e);
        }
    }
}

impl std::fmt::Debug for GraphicsEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphicsEngine")
            .field("api", &self.config.api)
            .field("phase", &self.phase)
            .field("current_frame", &self.current_frame)
            .field("frame_count", &self.frame_count)
            .field("device_lost", &self.device_lost.is_some())
            .finish()
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
