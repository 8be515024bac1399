/// CommandAllocator and CommandList - recording GPU work
///
/// A command list owns the allocator backing its memory. The allocator is
/// reset only when the list starts a new frame (`begin_recording(false)`),
/// which the caller does once the GPU work previously recorded through it
/// is known to be complete. Mid-frame flushes re-open the list without
/// touching the allocator.
///
/// All validation happens here, before anything reaches the backend:
/// lifecycle (Initial -> Recording -> Closed -> Submitted), resource state
/// transitions, render pass attachment states and resource bindings.

use std::any::Any;
use std::sync::Arc;
use crate::error::{Error, Result};
use crate::rhi::{
    Buffer, BufferUsage, DescriptorHeap, FrameBuffer, IndexFormat, MemoryHeap, PipelineKind,
    PipelineState, RenderPass, ResourceLayout, ResourceState, ResourceView, Texture,
    TEXTURE_PLACEMENT_ALIGNMENT, ViewKind, BoundResource,
};
use crate::{engine_error, engine_trace};

/// Queue / command list type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandListType {
    Graphics,
    Compute,
    Copy,
}

impl CommandListType {
    pub const ALL: [CommandListType; 3] = [
        CommandListType::Graphics,
        CommandListType::Compute,
        CommandListType::Copy,
    ];

    /// Dense index for per-type arrays
    pub fn index(self) -> usize {
        match self {
            CommandListType::Graphics => 0,
            CommandListType::Compute => 1,
            CommandListType::Copy => 2,
        }
    }
}

/// Viewport dimensions and depth range
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}

impl Viewport {
    /// Full-target viewport with depth range [0, 1]
    pub fn from_extent(width: u32, height: u32) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: width as f32,
            height: height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }
}

/// Scissor rectangle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScissorRect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl ScissorRect {
    pub fn from_extent(width: u32, height: u32) -> Self {
        Self { x: 0, y: 0, width, height }
    }
}

/// Clear value for an attachment
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClearValue {
    /// Color clear value (RGBA)
    Color([f32; 4]),
    /// Depth/stencil clear value
    DepthStencil { depth: f32, stencil: u8 },
}

/// One state transition handed to the backend
pub enum ResourceBarrier<'a> {
    Texture {
        texture: &'a Texture,
        before: ResourceState,
        after: ResourceState,
    },
    Buffer {
        buffer: &'a Buffer,
        before: ResourceState,
        after: ResourceState,
    },
}

/// Vertex buffer binding
#[derive(Clone, Copy)]
pub struct VertexBufferBinding<'a> {
    pub buffer: &'a Buffer,
    /// Offset in bytes
    pub offset: u64,
}

/// Texture subresource addressed by a copy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TextureSubresource {
    pub mip: u32,
    pub layer: u32,
}

/// Backend part of a command allocator (ID3D12CommandAllocator, VkCommandPool)
pub trait CommandAllocatorBackend: Send + Sync {
    fn as_any(&self) -> &dyn Any;

    /// Recycle the memory of every list recorded through this allocator
    fn reset(&self) -> Result<()>;
}

/// Backend part of a command list
pub trait CommandListBackend: Send {
    fn as_any(&self) -> &dyn Any;

    fn begin(&mut self, allocator: &dyn CommandAllocatorBackend) -> Result<()>;
    fn end(&mut self) -> Result<()>;

    fn resource_barriers(&mut self, barriers: &[ResourceBarrier<'_>]) -> Result<()>;

    fn begin_render_pass(
        &mut self,
        allocator: &dyn CommandAllocatorBackend,
        render_pass: &RenderPass,
        frame_buffer: &FrameBuffer,
        clear_values: &[ClearValue],
    ) -> Result<()>;
    fn end_render_pass(&mut self) -> Result<()>;

    fn set_viewport(&mut self, viewport: &Viewport) -> Result<()>;
    fn set_scissor(&mut self, scissor: &ScissorRect) -> Result<()>;

    fn set_descriptor_heaps(&mut self, heaps: &[&DescriptorHeap]) -> Result<()>;
    fn set_resource_layout(&mut self, kind: PipelineKind, layout: &ResourceLayout) -> Result<()>;
    fn set_pipeline_state(&mut self, pipeline: &PipelineState) -> Result<()>;
    fn bind_view(
        &mut self,
        kind: PipelineKind,
        layout: &ResourceLayout,
        element_index: u32,
        view: &ResourceView,
    ) -> Result<()>;

    fn set_vertex_buffers(&mut self, start_slot: u32, bindings: &[VertexBufferBinding<'_>]) -> Result<()>;
    fn set_index_buffer(&mut self, buffer: &Buffer, offset: u64, format: IndexFormat) -> Result<()>;

    fn draw_instanced(
        &mut self,
        vertex_count: u32,
        instance_count: u32,
        start_vertex: u32,
        start_instance: u32,
    ) -> Result<()>;
    fn draw_indexed_instanced(
        &mut self,
        index_count: u32,
        instance_count: u32,
        start_index: u32,
        base_vertex: i32,
        start_instance: u32,
    ) -> Result<()>;
    fn dispatch(&mut self, x: u32, y: u32, z: u32) -> Result<()>;

    fn copy_buffer_region(
        &mut self,
        dst: &Buffer,
        dst_offset: u64,
        src: &Buffer,
        src_offset: u64,
        size: u64,
    ) -> Result<()>;
    fn copy_buffer_to_texture(
        &mut self,
        dst: &Texture,
        subresource: TextureSubresource,
        src: &Buffer,
        src_offset: u64,
    ) -> Result<()>;
}

/// Command memory pool
pub struct CommandAllocator {
    list_type: CommandListType,
    backend: Box<dyn CommandAllocatorBackend>,
}

impl CommandAllocator {
    pub(crate) fn new(list_type: CommandListType, backend: Box<dyn CommandAllocatorBackend>) -> Self {
        Self { list_type, backend }
    }

    pub fn list_type(&self) -> CommandListType {
        self.list_type
    }

    pub fn backend(&self) -> &dyn CommandAllocatorBackend {
        self.backend.as_ref()
    }

    fn reset(&self) -> Result<()> {
        self.backend.reset()
    }
}

/// Lifecycle of a command list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandListState {
    /// Created, never recorded
    Initial,
    Recording,
    /// Recorded, ready for `CommandQueue::execute`
    Closed,
    /// Handed to a queue
    Submitted,
}

/// Command list with its own allocator
pub struct CommandList {
    list_type: CommandListType,
    name: String,
    state: CommandListState,
    allocator: CommandAllocator,
    in_render_pass: bool,
    graphics_layout: Option<Arc<ResourceLayout>>,
    compute_layout: Option<Arc<ResourceLayout>>,
    pipeline: Option<Arc<PipelineState>>,
    index_buffer_bound: bool,
    recorded_commands: u32,
    backend: Box<dyn CommandListBackend>,
}

impl CommandList {
    pub(crate) fn new(
        list_type: CommandListType,
        name: impl Into<String>,
        allocator: CommandAllocator,
        backend: Box<dyn CommandListBackend>,
    ) -> Self {
        Self {
            list_type,
            name: name.into(),
            state: CommandListState::Initial,
            allocator,
            in_render_pass: false,
            graphics_layout: None,
            compute_layout: None,
            pipeline: None,
            index_buffer_bound: false,
            recorded_commands: 0,
            backend,
        }
    }

    pub fn list_type(&self) -> CommandListType {
        self.list_type
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> CommandListState {
        self.state
    }

    pub fn is_recording(&self) -> bool {
        self.state == CommandListState::Recording
    }

    pub fn in_render_pass(&self) -> bool {
        self.in_render_pass
    }

    /// Commands recorded since the last `begin_recording`
    pub fn recorded_commands(&self) -> u32 {
        self.recorded_commands
    }

    pub fn allocator(&self) -> &CommandAllocator {
        &self.allocator
    }

    fn contract(&self, reason: String) -> Error {
        engine_error!("prism::CommandList", "Command list '{}': {}", self.name, reason);
        Error::InvalidState(format!("command list '{}': {}", self.name, reason))
    }

    fn require_recording(&self) -> Result<()> {
        if self.state != CommandListState::Recording {
            return Err(self.contract(format!("not recording (state {:?})", self.state)));
        }
        Ok(())
    }

    fn require_graphics(&self, operation: &str) -> Result<()> {
        if self.list_type != CommandListType::Graphics {
            return Err(self.contract(format!("{} needs a graphics list", operation)));
        }
        Ok(())
    }

    fn require_compute_capable(&self, operation: &str) -> Result<()> {
        if self.list_type == CommandListType::Copy {
            return Err(self.contract(format!("{} is not available on copy lists", operation)));
        }
        Ok(())
    }

    fn layout_for(&self, kind: PipelineKind) -> Option<&Arc<ResourceLayout>> {
        match kind {
            PipelineKind::Graphics => self.graphics_layout.as_ref(),
            PipelineKind::Compute => self.compute_layout.as_ref(),
        }
    }

    fn recorded(&mut self) {
        self.recorded_commands += 1;
    }

    /// Open the list for recording
    ///
    /// `still_mid_frame` keeps the allocator memory: work recorded earlier
    /// in the frame may still be executing. Otherwise the allocator is reset,
    /// so the caller must have waited for the previous use of this list.
    pub fn begin_recording(&mut self, still_mid_frame: bool) -> Result<()> {
        if self.state == CommandListState::Recording {
            return Err(self.contract("begin_recording while already recording".to_string()));
        }
        if !still_mid_frame {
            self.allocator.reset()?;
        }
        self.backend.begin(self.allocator.backend())?;

        self.state = CommandListState::Recording;
        self.in_render_pass = false;
        self.graphics_layout = None;
        self.compute_layout = None;
        self.pipeline = None;
        self.index_buffer_bound = false;
        self.recorded_commands = 0;
        engine_trace!("prism::CommandList", "Command list '{}' recording (allocator reset: {})", self.name, !still_mid_frame);
        Ok(())
    }

    /// Close the list so it can be executed
    pub fn end_recording(&mut self) -> Result<()> {
        self.require_recording()?;
        if self.in_render_pass {
            return Err(self.contract("end_recording inside a render pass".to_string()));
        }
        self.backend.end()?;
        self.state = CommandListState::Closed;
        Ok(())
    }

    pub(crate) fn mark_submitted(&mut self) {
        self.state = CommandListState::Submitted;
    }

    // ===== STATE TRANSITIONS =====

    /// Move `texture` to `after`, recording one barrier
    ///
    /// A request for the current state records nothing.
    pub fn transition_texture(&mut self, texture: &Texture, after: ResourceState) -> Result<()> {
        self.require_recording()?;
        if self.in_render_pass {
            return Err(self.contract(format!("transition of '{}' inside a render pass", texture.name())));
        }
        let before = texture.state();
        if before == after {
            return Ok(());
        }
        texture.check_state(after).inspect_err(|e| {
            engine_error!("prism::CommandList", "Command list '{}': {}", self.name, e);
        })?;

        self.backend.resource_barriers(&[ResourceBarrier::Texture { texture, before, after }])?;
        texture.set_state(after);
        self.recorded();
        engine_trace!("prism::CommandList", "'{}': {:?} -> {:?}", texture.name(), before, after);
        Ok(())
    }

    /// Move `buffer` to `after`, recording one barrier
    pub fn transition_buffer(&mut self, buffer: &Buffer, after: ResourceState) -> Result<()> {
        self.require_recording()?;
        if self.in_render_pass {
            return Err(self.contract(format!("transition of '{}' inside a render pass", buffer.name())));
        }
        let before = buffer.state();
        if before == after {
            return Ok(());
        }
        buffer.check_state(after).inspect_err(|e| {
            engine_error!("prism::CommandList", "Command list '{}': {}", self.name, e);
        })?;

        self.backend.resource_barriers(&[ResourceBarrier::Buffer { buffer, before, after }])?;
        buffer.set_state(after);
        self.recorded();
        Ok(())
    }

    // ===== RENDER PASSES =====

    /// Begin `render_pass` on `frame_buffer`
    ///
    /// Every color attachment must already be in `RenderTarget` and the depth
    /// attachment in `DepthStencilWrite`; nothing is transitioned here.
    pub fn begin_render_pass(
        &mut self,
        render_pass: &RenderPass,
        frame_buffer: &FrameBuffer,
        clear_values: &[ClearValue],
    ) -> Result<()> {
        self.require_recording()?;
        self.require_graphics("begin_render_pass")?;
        if self.in_render_pass {
            return Err(self.contract("render passes cannot nest".to_string()));
        }
        if !render_pass.is_compatible_with(frame_buffer.render_pass()) {
            return Err(self.contract(format!(
                "render pass '{}' is not compatible with frame buffer '{}'",
                render_pass.desc().name,
                frame_buffer.name()
            )));
        }
        for texture in frame_buffer.render_targets() {
            if texture.state() != ResourceState::RenderTarget {
                return Err(self.contract(format!(
                    "render target '{}' is in {:?}, expected RenderTarget",
                    texture.name(),
                    texture.state()
                )));
            }
        }
        if let Some(depth) = frame_buffer.depth_stencil() {
            if depth.state() != ResourceState::DepthStencilWrite {
                return Err(self.contract(format!(
                    "depth target '{}' is in {:?}, expected DepthStencilWrite",
                    depth.name(),
                    depth.state()
                )));
            }
        }
        let attachments = frame_buffer.render_target_count() + usize::from(frame_buffer.depth_stencil().is_some());
        if !clear_values.is_empty() && clear_values.len() != attachments {
            return Err(self.contract(format!(
                "{} clear values for {} attachments",
                clear_values.len(),
                attachments
            )));
        }

        self.backend.begin_render_pass(self.allocator.backend(), render_pass, frame_buffer, clear_values)?;
        self.in_render_pass = true;
        self.recorded();
        Ok(())
    }

    pub fn end_render_pass(&mut self) -> Result<()> {
        self.require_recording()?;
        if !self.in_render_pass {
            return Err(self.contract("end_render_pass without begin_render_pass".to_string()));
        }
        self.backend.end_render_pass()?;
        self.in_render_pass = false;
        self.recorded();
        Ok(())
    }

    pub fn set_viewport(&mut self, viewport: &Viewport) -> Result<()> {
        self.require_recording()?;
        self.require_graphics("set_viewport")?;
        self.backend.set_viewport(viewport)
    }

    pub fn set_scissor(&mut self, scissor: &ScissorRect) -> Result<()> {
        self.require_recording()?;
        self.require_graphics("set_scissor")?;
        self.backend.set_scissor(scissor)
    }

    // ===== BINDING =====

    /// Make shader visible heaps current (DirectX 12 requirement, no-op on Vulkan)
    pub fn set_descriptor_heaps(&mut self, heaps: &[&DescriptorHeap]) -> Result<()> {
        self.require_recording()?;
        self.require_compute_capable("set_descriptor_heaps")?;
        if let Some(heap) = heaps.iter().find(|heap| !heap.is_shader_visible()) {
            return Err(self.contract(format!("heap '{}' is not shader visible", heap.desc().name)));
        }
        self.backend.set_descriptor_heaps(heaps)
    }

    pub fn set_graphics_resource_layout(&mut self, layout: &Arc<ResourceLayout>) -> Result<()> {
        self.require_recording()?;
        self.require_graphics("set_graphics_resource_layout")?;
        self.backend.set_resource_layout(PipelineKind::Graphics, layout)?;
        self.graphics_layout = Some(Arc::clone(layout));
        Ok(())
    }

    pub fn set_compute_resource_layout(&mut self, layout: &Arc<ResourceLayout>) -> Result<()> {
        self.require_recording()?;
        self.require_compute_capable("set_compute_resource_layout")?;
        self.backend.set_resource_layout(PipelineKind::Compute, layout)?;
        self.compute_layout = Some(Arc::clone(layout));
        Ok(())
    }

    /// Bind a graphics or compute pipeline
    pub fn set_pipeline_state(&mut self, pipeline: &Arc<PipelineState>) -> Result<()> {
        self.require_recording()?;
        match pipeline.kind() {
            PipelineKind::Graphics => self.require_graphics("graphics pipeline")?,
            PipelineKind::Compute => self.require_compute_capable("compute pipeline")?,
        }
        self.backend.set_pipeline_state(pipeline)?;
        self.pipeline = Some(Arc::clone(pipeline));
        Ok(())
    }

    /// Bind `view` to element `element_index` of the current layout
    pub fn bind_view(&mut self, kind: PipelineKind, element_index: u32, view: &ResourceView) -> Result<()> {
        self.require_recording()?;
        let Some(layout) = self.layout_for(kind).cloned() else {
            return Err(self.contract(format!("bind_view without a {:?} resource layout", kind)));
        };
        let Some(element) = layout.element(element_index) else {
            return Err(self.contract(format!(
                "layout '{}' has {} elements, bind_view used index {}",
                layout.desc().name,
                layout.element_count(),
                element_index
            )));
        };
        if element.kind.view_kind() != view.kind() {
            return Err(self.contract(format!(
                "element {} expects a {:?} view, got {:?}",
                element_index,
                element.kind.view_kind(),
                view.kind()
            )));
        }
        if matches!(view.kind(), ViewKind::ShaderResource | ViewKind::UnorderedAccess) {
            let is_buffer = view.is_buffer_view();
            let expects_buffer = element.resource == BoundResource::Buffer;
            if is_buffer != expects_buffer {
                return Err(self.contract(format!(
                    "element {} expects a {:?} view",
                    element_index, element.resource
                )));
            }
        }
        if !view.is_valid() {
            return Err(Error::InvalidResource(format!(
                "view in slot {} points at a destroyed resource",
                view.slot()
            )));
        }
        self.backend.bind_view(kind, &layout, element_index, view)?;
        self.recorded();
        Ok(())
    }

    // ===== INPUT ASSEMBLY =====

    pub fn set_vertex_buffers(&mut self, start_slot: u32, bindings: &[VertexBufferBinding<'_>]) -> Result<()> {
        self.require_recording()?;
        self.require_graphics("set_vertex_buffers")?;
        for binding in bindings {
            let buffer = binding.buffer;
            if !buffer.usage().contains(BufferUsage::VERTEX) {
                return Err(Error::InvalidResource(format!("buffer '{}' is not a vertex buffer", buffer.name())));
            }
            if !matches!(buffer.state(), ResourceState::VertexAndConstantBuffer | ResourceState::GeneralRead) {
                return Err(self.contract(format!(
                    "vertex buffer '{}' is in {:?}",
                    buffer.name(),
                    buffer.state()
                )));
            }
            if binding.offset >= buffer.size() {
                return Err(Error::InvalidResource(format!(
                    "offset {} past the end of vertex buffer '{}'",
                    binding.offset,
                    buffer.name()
                )));
            }
        }
        self.backend.set_vertex_buffers(start_slot, bindings)
    }

    pub fn set_index_buffer(&mut self, buffer: &Buffer, offset: u64, format: IndexFormat) -> Result<()> {
        self.require_recording()?;
        self.require_graphics("set_index_buffer")?;
        if !buffer.usage().contains(BufferUsage::INDEX) {
            return Err(Error::InvalidResource(format!("buffer '{}' is not an index buffer", buffer.name())));
        }
        if !matches!(buffer.state(), ResourceState::IndexBuffer | ResourceState::GeneralRead) {
            return Err(self.contract(format!("index buffer '{}' is in {:?}", buffer.name(), buffer.state())));
        }
        if offset % format.size() as u64 != 0 || offset >= buffer.size() {
            return Err(Error::InvalidResource(format!(
                "index buffer offset {} is misaligned or out of range",
                offset
            )));
        }
        self.backend.set_index_buffer(buffer, offset, format)?;
        self.index_buffer_bound = true;
        Ok(())
    }

    // ===== DRAW / DISPATCH =====

    fn check_pipeline(&self, kind: PipelineKind) -> Result<()> {
        let Some(pipeline) = &self.pipeline else {
            return Err(self.contract("no pipeline bound".to_string()));
        };
        if pipeline.kind() != kind {
            return Err(self.contract(format!("bound pipeline '{}' is not a {:?} pipeline", pipeline.name(), kind)));
        }
        let bound = self.layout_for(kind);
        if !bound.is_some_and(|layout| Arc::ptr_eq(layout, pipeline.resource_layout())) {
            return Err(self.contract(format!(
                "pipeline '{}' was built for another resource layout than the bound one",
                pipeline.name()
            )));
        }
        Ok(())
    }

    fn check_draw(&self) -> Result<()> {
        self.require_recording()?;
        if !self.in_render_pass {
            return Err(self.contract("draw outside a render pass".to_string()));
        }
        self.check_pipeline(PipelineKind::Graphics)
    }

    pub fn draw_instanced(
        &mut self,
        vertex_count: u32,
        instance_count: u32,
        start_vertex: u32,
        start_instance: u32,
    ) -> Result<()> {
        self.check_draw()?;
        self.backend.draw_instanced(vertex_count, instance_count, start_vertex, start_instance)?;
        self.recorded();
        Ok(())
    }

    pub fn draw_indexed_instanced(
        &mut self,
        index_count: u32,
        instance_count: u32,
        start_index: u32,
        base_vertex: i32,
        start_instance: u32,
    ) -> Result<()> {
        self.check_draw()?;
        if !self.index_buffer_bound {
            return Err(self.contract("indexed draw without an index buffer".to_string()));
        }
        self.backend.draw_indexed_instanced(index_count, instance_count, start_index, base_vertex, start_instance)?;
        self.recorded();
        Ok(())
    }

    pub fn dispatch(&mut self, x: u32, y: u32, z: u32) -> Result<()> {
        self.require_recording()?;
        self.require_compute_capable("dispatch")?;
        if self.in_render_pass {
            return Err(self.contract("dispatch inside a render pass".to_string()));
        }
        self.check_pipeline(PipelineKind::Compute)?;
        self.backend.dispatch(x, y, z)?;
        self.recorded();
        Ok(())
    }

    // ===== COPIES =====

    fn check_copy_source(&self, buffer: &Buffer) -> Result<()> {
        let ok = match buffer.heap() {
            MemoryHeap::Upload => true,
            MemoryHeap::Default => buffer.state() == ResourceState::CopySource,
            MemoryHeap::Readback => false,
        };
        if !ok {
            return Err(self.contract(format!(
                "copy source '{}' is in {:?} ({:?} heap)",
                buffer.name(),
                buffer.state(),
                buffer.heap()
            )));
        }
        Ok(())
    }

    /// Copy `size` bytes between buffers
    pub fn copy_buffer_region(
        &mut self,
        dst: &Buffer,
        dst_offset: u64,
        src: &Buffer,
        src_offset: u64,
        size: u64,
    ) -> Result<()> {
        self.require_recording()?;
        if self.in_render_pass {
            return Err(self.contract("copy inside a render pass".to_string()));
        }
        self.check_copy_source(src)?;
        if dst.state() != ResourceState::CopyDestination {
            return Err(self.contract(format!("copy destination '{}' is in {:?}", dst.name(), dst.state())));
        }
        if std::ptr::eq(dst, src) {
            return Err(Error::InvalidResource(format!("copy of '{}' onto itself", dst.name())));
        }
        let in_range = |offset: u64, buffer: &Buffer| offset.checked_add(size).is_some_and(|end| end <= buffer.size());
        if size == 0 || !in_range(src_offset, src) || !in_range(dst_offset, dst) {
            return Err(Error::InvalidResource(format!(
                "copy of {} bytes ('{}'@{} -> '{}'@{}) is out of range",
                size,
                src.name(),
                src_offset,
                dst.name(),
                dst_offset
            )));
        }
        self.backend.copy_buffer_region(dst, dst_offset, src, src_offset, size)?;
        self.recorded();
        Ok(())
    }

    /// Copy one subresource from a buffer laid out with `TextureDesc::upload_row_pitch`
    pub fn copy_buffer_to_texture(
        &mut self,
        dst: &Texture,
        subresource: TextureSubresource,
        src: &Buffer,
        src_offset: u64,
    ) -> Result<()> {
        self.require_recording()?;
        if self.in_render_pass {
            return Err(self.contract("copy inside a render pass".to_string()));
        }
        self.check_copy_source(src)?;
        if dst.state() != ResourceState::CopyDestination {
            return Err(self.contract(format!("copy destination '{}' is in {:?}", dst.name(), dst.state())));
        }
        let desc = dst.desc();
        if subresource.mip >= desc.mip_levels || subresource.layer >= desc.array_size {
            return Err(Error::InvalidResource(format!(
                "texture '{}' has no mip {} layer {}",
                dst.name(),
                subresource.mip,
                subresource.layer
            )));
        }
        if dst.format().is_depth() || desc.sample_count > 1 {
            return Err(Error::InvalidResource(format!(
                "texture '{}' cannot be a buffer copy destination",
                dst.name()
            )));
        }
        let needed = desc.upload_size(subresource.mip);
        if src_offset % TEXTURE_PLACEMENT_ALIGNMENT != 0
            || src_offset.checked_add(needed).map_or(true, |end| end > src.size())
        {
            return Err(Error::InvalidResource(format!(
                "buffer '{}' needs {} bytes at an offset aligned to {} (offset {}, size {})",
                src.name(),
                needed,
                TEXTURE_PLACEMENT_ALIGNMENT,
                src_offset,
                src.size()
            )));
        }
        self.backend.copy_buffer_to_texture(dst, subresource, src, src_offset)?;
        self.recorded();
        Ok(())
    }

    pub fn backend(&self) -> &dyn CommandListBackend {
        self.backend.as_ref()
    }

    /// Downcast the backend part to its concrete type
    pub fn backend_as<T: 'static>(&self) -> Option<&T> {
        self.backend.as_any().downcast_ref::<T>()
    }
}

impl std::fmt::Debug for CommandList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandList")
            .field("name", &self.name)
            .field("type", &self.list_type)
            .field("state", &self.state)
            .field("in_render_pass", &self.in_render_pass)
            .finish()
    }
}

#[cfg(test)]
#[path = "command_list_tests.rs"]
mod tests;
