/// Mock backend for unit tests (no GPU required)
///
/// A `MockGpu` is shared by every object of one mock device. It executes
/// nothing: command lists record strings that land in the GPU log when a
/// queue executes them. Fence signals either apply immediately or, in
/// deferred mode, wait for `complete_pending`, which lets tests hold the GPU
/// "behind" the CPU.

use std::any::Any;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;
use raw_window_handle::{
    RawDisplayHandle, RawWindowHandle, XlibDisplayHandle, XlibWindowHandle,
};
use crate::config::{GraphicsApi, RhiConfig};
use crate::error::{Error, Result};
use crate::rhi::{
    AcquireOutcome, AdapterBackend, AdapterInfo, AdapterType, BackendFactory, BackendRegistry,
    Buffer, BufferBackend, BufferDesc, ClearValue, CommandAllocatorBackend, CommandListBackend,
    CommandListType, CommandQueueBackend, ComputePipelineDesc, DescriptorHeap,
    DescriptorHeapBackend, DescriptorHeapDesc, Device, DeviceBackend, DeviceDesc, FenceBackend,
    FenceWaitStatus, FrameBuffer, GraphicsPipelineDesc, IndexFormat, InstanceBackend,
    InstanceDesc, PipelineKind, PipelineState, PipelineStateBackend, PixelFormat, PresentOutcome,
    RenderPass, RenderPassBackend, RenderPassDesc, ResourceBarrier, ResourceLayout,
    ResourceLayoutBackend, ResourceLayoutDesc, ResourceView, SamplerBackend, SamplerDesc,
    ScissorRect, SwapchainBackend, SwapchainDesc, Texture, TextureBackend, TextureDesc,
    TextureSubresource, VertexBufferBinding, ViewWrite, Viewport, WindowHandles,
};

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

// ============================================================================
// Mock GPU
// ============================================================================

#[derive(Default)]
struct GpuState {
    deferred: bool,
    pending: Vec<(Arc<FenceState>, u64)>,
    log: Vec<String>,
    fail_next_acquire: bool,
    fail_next_present: bool,
    fail_next_view_write: bool,
}

/// Timeline shared by every object of a mock device
#[derive(Default)]
pub struct MockGpu {
    state: Mutex<GpuState>,
}

impl MockGpu {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Hold GPU-side signals until `complete_pending`
    pub fn set_deferred(&self, deferred: bool) {
        lock(&self.state).deferred = deferred;
    }

    /// Apply every held signal in submission order
    pub fn complete_pending(&self) {
        let pending = std::mem::take(&mut lock(&self.state).pending);
        for (fence, value) in pending {
            fence.set(value);
        }
    }

    pub fn pending_signals(&self) -> usize {
        lock(&self.state).pending.len()
    }

    pub fn fail_next_acquire(&self) {
        lock(&self.state).fail_next_acquire = true;
    }

    pub fn fail_next_present(&self) {
        lock(&self.state).fail_next_present = true;
    }

    pub fn fail_next_view_write(&self) {
        lock(&self.state).fail_next_view_write = true;
    }

    /// Commands executed so far, in order
    pub fn executed(&self) -> Vec<String> {
        lock(&self.state).log.clone()
    }

    pub fn clear_log(&self) {
        lock(&self.state).log.clear();
    }

    fn record(&self, entry: String) {
        lock(&self.state).log.push(entry);
    }

    fn gpu_signal(&self, fence: &dyn FenceBackend, value: u64) -> Result<()> {
        let fence = mock_fence(fence)?;
        let mut state = lock(&self.state);
        if state.deferred {
            state.pending.push((Arc::clone(&fence.state), value));
        } else {
            drop(state);
            fence.state.set(value);
        }
        Ok(())
    }

    fn take_flag(&self, flag: fn(&mut GpuState) -> &mut bool) -> bool {
        std::mem::take(flag(&mut lock(&self.state)))
    }
}

// ============================================================================
// Mock Fence
// ============================================================================

#[derive(Default)]
struct FenceState {
    value: Mutex<u64>,
    reached: Condvar,
}

impl FenceState {
    fn set(&self, value: u64) {
        let mut current = lock(&self.value);
        *current = (*current).max(value);
        self.reached.notify_all();
    }
}

pub struct MockFence {
    state: Arc<FenceState>,
}

fn mock_fence(fence: &dyn FenceBackend) -> Result<&MockFence> {
    fence
        .as_any()
        .downcast_ref::<MockFence>()
        .ok_or_else(|| Error::BackendError("not a mock fence".to_string()))
}

impl FenceBackend for MockFence {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn completed_value(&self) -> u64 {
        *lock(&self.state.value)
    }

    fn signal(&self, value: u64) -> Result<()> {
        self.state.set(value);
        Ok(())
    }

    fn wait(&self, value: u64, timeout: Duration) -> Result<FenceWaitStatus> {
        let guard = lock(&self.state.value);
        let (guard, _) = match self.state.reached.wait_timeout_while(guard, timeout, |current| *current < value) {
            Ok(result) => result,
            Err(poisoned) => poisoned.into_inner(),
        };
        if *guard >= value {
            Ok(FenceWaitStatus::Completed)
        } else {
            Ok(FenceWaitStatus::TimedOut)
        }
    }
}

// ============================================================================
// Mock Queue / Allocator / Command List
// ============================================================================

pub struct MockQueue {
    queue_type: CommandListType,
    gpu: Arc<MockGpu>,
}

impl CommandQueueBackend for MockQueue {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn execute(&self, lists: &[&dyn CommandListBackend]) -> Result<()> {
        for list in lists {
            let Some(list) = list.as_any().downcast_ref::<MockCommandList>() else {
                return Err(Error::BackendError("not a mock command list".to_string()));
            };
            for command in &list.commands {
                self.gpu.record(format!("{}: {}", list.name, command));
            }
        }
        Ok(())
    }

    fn signal(&self, fence: &dyn FenceBackend, value: u64) -> Result<()> {
        self.gpu.gpu_signal(fence, value)
    }

    fn wait(&self, _fence: &dyn FenceBackend, value: u64) -> Result<()> {
        self.gpu.record(format!("{:?} queue: wait {}", self.queue_type, value));
        Ok(())
    }

    fn wait_idle(&self) -> Result<()> {
        self.gpu.complete_pending();
        Ok(())
    }
}

#[derive(Default)]
pub struct MockCommandAllocator {
    resets: AtomicU32,
}

impl MockCommandAllocator {
    pub fn reset_count(&self) -> u32 {
        self.resets.load(Ordering::Acquire)
    }
}

impl CommandAllocatorBackend for MockCommandAllocator {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn reset(&self) -> Result<()> {
        self.resets.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }
}

pub struct MockCommandList {
    pub name: String,
    pub commands: Vec<String>,
}

impl MockCommandList {
    fn push(&mut self, command: String) -> Result<()> {
        self.commands.push(command);
        Ok(())
    }
}

impl CommandListBackend for MockCommandList {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn begin(&mut self, _allocator: &dyn CommandAllocatorBackend) -> Result<()> {
        self.commands.clear();
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        Ok(())
    }

    fn resource_barriers(&mut self, barriers: &[ResourceBarrier<'_>]) -> Result<()> {
        for barrier in barriers {
            let entry = match barrier {
                ResourceBarrier::Texture { texture, before, after } => {
                    format!("barrier {} {:?}->{:?}", texture.name(), before, after)
                }
                ResourceBarrier::Buffer { buffer, before, after } => {
                    format!("barrier {} {:?}->{:?}", buffer.name(), before, after)
                }
            };
            self.commands.push(entry);
        }
        Ok(())
    }

    fn begin_render_pass(
        &mut self,
        _allocator: &dyn CommandAllocatorBackend,
        _render_pass: &RenderPass,
        frame_buffer: &FrameBuffer,
        clear_values: &[ClearValue],
    ) -> Result<()> {
        self.push(format!("begin_render_pass {} clears={}", frame_buffer.name(), clear_values.len()))
    }

    fn end_render_pass(&mut self) -> Result<()> {
        self.push("end_render_pass".to_string())
    }

    fn set_viewport(&mut self, viewport: &Viewport) -> Result<()> {
        self.push(format!("viewport {}x{}", viewport.width, viewport.height))
    }

    fn set_scissor(&mut self, scissor: &ScissorRect) -> Result<()> {
        self.push(format!("scissor {}x{}", scissor.width, scissor.height))
    }

    fn set_descriptor_heaps(&mut self, heaps: &[&DescriptorHeap]) -> Result<()> {
        self.push(format!("descriptor_heaps {}", heaps.len()))
    }

    fn set_resource_layout(&mut self, kind: PipelineKind, layout: &ResourceLayout) -> Result<()> {
        self.push(format!("layout {:?} {}", kind, layout.desc().name))
    }

    fn set_pipeline_state(&mut self, pipeline: &PipelineState) -> Result<()> {
        self.push(format!("pipeline {}", pipeline.name()))
    }

    fn bind_view(
        &mut self,
        _kind: PipelineKind,
        _layout: &ResourceLayout,
        element_index: u32,
        view: &ResourceView,
    ) -> Result<()> {
        self.push(format!("bind {} slot {}", element_index, view.slot()))
    }

    fn set_vertex_buffers(&mut self, start_slot: u32, bindings: &[VertexBufferBinding<'_>]) -> Result<()> {
        self.push(format!("vertex_buffers {} x{}", start_slot, bindings.len()))
    }

    fn set_index_buffer(&mut self, buffer: &Buffer, _offset: u64, format: IndexFormat) -> Result<()> {
        self.push(format!("index_buffer {} {:?}", buffer.name(), format))
    }

    fn draw_instanced(&mut self, vertex_count: u32, instance_count: u32, _: u32, _: u32) -> Result<()> {
        self.push(format!("draw {} {}", vertex_count, instance_count))
    }

    fn draw_indexed_instanced(&mut self, index_count: u32, instance_count: u32, _: u32, _: i32, _: u32) -> Result<()> {
        self.push(format!("draw_indexed {} {}", index_count, instance_count))
    }

    fn dispatch(&mut self, x: u32, y: u32, z: u32) -> Result<()> {
        self.push(format!("dispatch {} {} {}", x, y, z))
    }

    fn copy_buffer_region(&mut self, dst: &Buffer, _: u64, src: &Buffer, _: u64, size: u64) -> Result<()> {
        self.push(format!("copy {}->{} {}", src.name(), dst.name(), size))
    }

    fn copy_buffer_to_texture(
        &mut self,
        dst: &Texture,
        subresource: TextureSubresource,
        src: &Buffer,
        _src_offset: u64,
    ) -> Result<()> {
        self.push(format!("copy {}->{} mip {}", src.name(), dst.name(), subresource.mip))
    }
}

// ============================================================================
// Mock Swapchain
// ============================================================================

pub struct MockSwapchain {
    gpu: Arc<MockGpu>,
    buffer_count: u32,
    next_index: u32,
    width: u32,
    height: u32,
    format: PixelFormat,
    /// Presented image indices, in order
    pub presented: Vec<u32>,
    pub acquire_timeouts: Vec<Duration>,
}

impl SwapchainBackend for MockSwapchain {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn acquire_next_image(
        &mut self,
        fence: &dyn FenceBackend,
        signal_value: u64,
        timeout: Duration,
    ) -> Result<AcquireOutcome> {
        self.acquire_timeouts.push(timeout);
        if self.gpu.take_flag(|state| &mut state.fail_next_acquire) {
            return Ok(AcquireOutcome::OutOfDate);
        }
        let index = self.next_index;
        self.next_index = (self.next_index + 1) % self.buffer_count;
        self.gpu.gpu_signal(fence, signal_value)?;
        Ok(AcquireOutcome::Acquired(index))
    }

    fn present(&mut self, index: u32, _fence: &dyn FenceBackend, wait_value: u64, _vsync: u32) -> Result<PresentOutcome> {
        if self.gpu.take_flag(|state| &mut state.fail_next_present) {
            return Ok(PresentOutcome::OutOfDate);
        }
        self.gpu.record(format!("present {} after {}", index, wait_value));
        self.presented.push(index);
        Ok(PresentOutcome::Presented)
    }

    fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        self.width = width;
        self.height = height;
        self.next_index = 0;
        Ok(())
    }

    fn back_buffers(&self) -> Result<Vec<Box<dyn TextureBackend>>> {
        Ok((0..self.buffer_count)
            .map(|_| Box::new(MockTexture) as Box<dyn TextureBackend>)
            .collect())
    }

    fn extent(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn format(&self) -> PixelFormat {
        self.format
    }
}

// ============================================================================
// Mock Descriptor Heap
// ============================================================================

pub struct MockDescriptorHeap {
    gpu: Arc<MockGpu>,
    shader_visible: bool,
    /// Name of the resource written into each slot
    slots: Mutex<Vec<Option<String>>>,
}

impl MockDescriptorHeap {
    pub fn slot_contents(&self, slot: u32) -> Option<String> {
        lock(&self.slots).get(slot as usize).cloned().flatten()
    }
}

impl DescriptorHeapBackend for MockDescriptorHeap {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn descriptor_size(&self) -> u32 {
        32
    }

    fn cpu_base(&self) -> u64 {
        0x1000
    }

    fn gpu_base(&self) -> Option<u64> {
        self.shader_visible.then_some(0x8000_0000)
    }

    fn write_view(&self, slot: u32, write: &ViewWrite<'_>) -> Result<()> {
        if self.gpu.take_flag(|state| &mut state.fail_next_view_write) {
            return Err(Error::BackendError(format!("view write into slot {} failed", slot)));
        }
        let name = match write {
            ViewWrite::Texture { texture, .. } => texture.name().to_string(),
            ViewWrite::Buffer { buffer, .. } => buffer.name().to_string(),
            ViewWrite::Sampler { .. } => "sampler".to_string(),
        };
        let mut slots = lock(&self.slots);
        match slots.get_mut(slot as usize) {
            Some(entry) => {
                *entry = Some(name);
                Ok(())
            }
            None => Err(Error::BackendError(format!("slot {} out of range", slot))),
        }
    }

    fn clear_slot(&self, slot: u32) {
        if let Some(entry) = lock(&self.slots).get_mut(slot as usize) {
            *entry = None;
        }
    }
}

// ============================================================================
// Mock Resources
// ============================================================================

pub struct MockBuffer {
    data: Mutex<Vec<u8>>,
}

impl MockBuffer {
    pub fn contents(&self) -> Vec<u8> {
        lock(&self.data).clone()
    }
}

impl BufferBackend for MockBuffer {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn map(&self) -> Result<NonNull<u8>> {
        let mut data = lock(&self.data);
        NonNull::new(data.as_mut_ptr()).ok_or_else(|| Error::BackendError("empty buffer".to_string()))
    }

    fn unmap(&self) {}
}

pub struct MockTexture;

impl TextureBackend for MockTexture {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub struct MockSampler;

impl SamplerBackend for MockSampler {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub struct MockRenderPass;

impl RenderPassBackend for MockRenderPass {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub struct MockResourceLayout;

impl ResourceLayoutBackend for MockResourceLayout {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub struct MockPipeline;

impl PipelineStateBackend for MockPipeline {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ============================================================================
// Mock Device / Adapter / Instance
// ============================================================================

pub struct MockDevice {
    gpu: Arc<MockGpu>,
}

impl MockDevice {
    pub fn new(gpu: Arc<MockGpu>) -> Self {
        Self { gpu }
    }
}

impl DeviceBackend for MockDevice {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn create_fence(&self, initial_value: u64) -> Result<Box<dyn FenceBackend>> {
        let state = FenceState::default();
        state.set(initial_value);
        Ok(Box::new(MockFence { state: Arc::new(state) }))
    }

    fn create_command_queue(&self, queue_type: CommandListType) -> Result<Box<dyn CommandQueueBackend>> {
        Ok(Box::new(MockQueue { queue_type, gpu: Arc::clone(&self.gpu) }))
    }

    fn create_command_allocator(&self, _list_type: CommandListType) -> Result<Box<dyn CommandAllocatorBackend>> {
        Ok(Box::new(MockCommandAllocator::default()))
    }

    fn create_command_list(
        &self,
        _list_type: CommandListType,
        _allocator: &dyn CommandAllocatorBackend,
        name: &str,
    ) -> Result<Box<dyn CommandListBackend>> {
        Ok(Box::new(MockCommandList { name: name.to_string(), commands: Vec::new() }))
    }

    fn create_swapchain(&self, _queue: &dyn CommandQueueBackend, desc: &SwapchainDesc) -> Result<Box<dyn SwapchainBackend>> {
        Ok(Box::new(MockSwapchain {
            gpu: Arc::clone(&self.gpu),
            buffer_count: desc.buffer_count,
            next_index: 0,
            width: desc.window.width,
            height: desc.window.height,
            format: desc.format,
            presented: Vec::new(),
            acquire_timeouts: Vec::new(),
        }))
    }

    fn create_descriptor_heap(&self, desc: &DescriptorHeapDesc) -> Result<Box<dyn DescriptorHeapBackend>> {
        Ok(Box::new(MockDescriptorHeap {
            gpu: Arc::clone(&self.gpu),
            shader_visible: desc.shader_visible,
            slots: Mutex::new(vec![None; desc.capacity as usize]),
        }))
    }

    fn create_buffer(&self, desc: &BufferDesc) -> Result<Box<dyn BufferBackend>> {
        Ok(Box::new(MockBuffer { data: Mutex::new(vec![0; desc.size() as usize]) }))
    }

    fn create_texture(&self, _desc: &TextureDesc) -> Result<Box<dyn TextureBackend>> {
        Ok(Box::new(MockTexture))
    }

    fn create_sampler(&self, _desc: &SamplerDesc) -> Result<Box<dyn SamplerBackend>> {
        Ok(Box::new(MockSampler))
    }

    fn create_render_pass(&self, _desc: &RenderPassDesc) -> Result<Box<dyn RenderPassBackend>> {
        Ok(Box::new(MockRenderPass))
    }

    fn create_resource_layout(&self, _desc: &ResourceLayoutDesc) -> Result<Box<dyn ResourceLayoutBackend>> {
        Ok(Box::new(MockResourceLayout))
    }

    fn create_graphics_pipeline(&self, _desc: &GraphicsPipelineDesc) -> Result<Box<dyn PipelineStateBackend>> {
        Ok(Box::new(MockPipeline))
    }

    fn create_compute_pipeline(&self, _desc: &ComputePipelineDesc) -> Result<Box<dyn PipelineStateBackend>> {
        Ok(Box::new(MockPipeline))
    }

    fn wait_idle(&self) -> Result<()> {
        self.gpu.complete_pending();
        Ok(())
    }
}

pub struct MockAdapter {
    info: AdapterInfo,
    gpu: Arc<MockGpu>,
}

impl AdapterBackend for MockAdapter {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn info(&self) -> AdapterInfo {
        self.info.clone()
    }

    fn create_device(&self, _desc: &DeviceDesc) -> Result<Box<dyn DeviceBackend>> {
        Ok(Box::new(MockDevice::new(Arc::clone(&self.gpu))))
    }
}

pub struct MockInstance {
    adapters: Vec<AdapterInfo>,
    gpu: Arc<MockGpu>,
}

impl InstanceBackend for MockInstance {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn enumerate_adapters(&self) -> Result<Vec<Box<dyn AdapterBackend>>> {
        Ok(self
            .adapters
            .iter()
            .map(|info| {
                Box::new(MockAdapter { info: info.clone(), gpu: Arc::clone(&self.gpu) }) as Box<dyn AdapterBackend>
            })
            .collect())
    }
}

/// Registers as the Vulkan backend
pub struct MockBackendFactory {
    pub adapters: Vec<AdapterInfo>,
    pub gpu: Arc<MockGpu>,
}

impl BackendFactory for MockBackendFactory {
    fn api(&self) -> GraphicsApi {
        GraphicsApi::Vulkan
    }

    fn create_instance(&self, _desc: &InstanceDesc) -> Result<Box<dyn InstanceBackend>> {
        Ok(Box::new(MockInstance {
            adapters: self.adapters.clone(),
            gpu: Arc::clone(&self.gpu),
        }))
    }
}

// ============================================================================
// Helpers
// ============================================================================

pub fn adapter_info(name: &str, adapter_type: AdapterType, dedicated_mib: u64) -> AdapterInfo {
    AdapterInfo {
        name: name.to_string(),
        vendor_id: 0x1234,
        device_id: 0x5678,
        dedicated_video_memory: dedicated_mib << 20,
        shared_system_memory: 1 << 30,
        adapter_type,
    }
}

/// Registry with the mock backend and the given adapters
pub fn registry_with(gpu: &Arc<MockGpu>, adapters: Vec<AdapterInfo>) -> BackendRegistry {
    let mut registry = BackendRegistry::new();
    registry.register(Box::new(MockBackendFactory { adapters, gpu: Arc::clone(gpu) }));
    registry
}

/// Registry with one discrete mock adapter
pub fn registry(gpu: &Arc<MockGpu>) -> BackendRegistry {
    registry_with(gpu, vec![adapter_info("Mock GPU", AdapterType::Discrete, 4096)])
}

/// Configuration with a short fence timeout so blocking tests stay fast
pub fn test_config() -> RhiConfig {
    RhiConfig {
        enable_validation: false,
        fence_timeout: Duration::from_millis(100),
        ..RhiConfig::default()
    }
}

pub fn mock_device_with(config: &RhiConfig) -> (Device, Arc<MockGpu>) {
    let gpu = MockGpu::new();
    let backend = Box::new(MockDevice::new(Arc::clone(&gpu)));
    let info = adapter_info("Mock GPU", AdapterType::Discrete, 4096);
    match Device::new(info, config, backend) {
        Ok(device) => (device, gpu),
        Err(e) => panic!("mock device creation failed: {}", e),
    }
}

pub fn mock_device() -> (Device, Arc<MockGpu>) {
    mock_device_with(&test_config())
}

/// Window handles that no mock object ever dereferences
pub fn window_handles(width: u32, height: u32) -> WindowHandles {
    WindowHandles {
        window: RawWindowHandle::Xlib(XlibWindowHandle::new(1)),
        display: RawDisplayHandle::Xlib(XlibDisplayHandle::new(None, 0)),
        width,
        height,
    }
}

pub fn swapchain_desc(width: u32, height: u32, buffer_count: u32) -> SwapchainDesc {
    SwapchainDesc {
        window: window_handles(width, height),
        buffer_count,
        format: PixelFormat::B8G8R8A8_UNORM,
        vsync_interval: 1,
    }
}
