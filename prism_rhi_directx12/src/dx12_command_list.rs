/// CommandAllocator and CommandList - ID3D12CommandAllocator / ID3D12GraphicsCommandList
///
/// Lists are created closed and bound to one allocator for life; `begin`
/// resets the list onto it. Render passes are plain OMSetRenderTargets plus
/// the clears their load ops ask for, and every layout element is a root
/// descriptor table pointed at a slot of a shader visible heap.

use prism_rhi::prism::rhi::{
    Buffer, ClearValue, CommandAllocatorBackend, CommandListBackend, CommandListType, DescriptorHeap, FrameBuffer,
    IndexFormat, PipelineKind, PipelineState, RenderPass, ResourceBarrier, ResourceLayout, ResourceState,
    ResourceView, ScissorRect, Texture, TextureDesc, TextureSubresource, VertexBufferBinding, Viewport,
};
use prism_rhi::prism::Result;
use prism_rhi::{engine_bail, engine_trace};
use std::any::Any;
use std::mem::ManuallyDrop;
use windows::Win32::Foundation::RECT;
use windows::Win32::Graphics::Direct3D12::*;
use windows::Win32::Graphics::Dxgi::Common::DXGI_FORMAT;

use crate::dx12_buffer::Dx12Buffer;
use crate::dx12_context::{map_hr_error, set_debug_name, Dx12Context, LOG_SOURCE};
use crate::dx12_descriptor_heap::Dx12DescriptorHeap;
use crate::dx12_format::{command_list_type, index_format, resource_state};
use crate::dx12_pipeline::Dx12Pipeline;
use crate::dx12_render_pass::Dx12RenderPass;
use crate::dx12_resource_layout::Dx12ResourceLayout;
use crate::dx12_texture::Dx12Texture;

// ===== HELPERS =====

/// Subresource index of plane 0
pub(crate) fn subresource_index(mip: u32, layer: u32, mip_levels: u32) -> u32 {
    mip + layer * mip_levels
}

/// Footprint of one subresource uploaded with `TextureDesc::upload_row_pitch`
pub(crate) fn placed_footprint(
    desc: &TextureDesc,
    format: DXGI_FORMAT,
    subresource: TextureSubresource,
    src_offset: u64,
) -> D3D12_PLACED_SUBRESOURCE_FOOTPRINT {
    let (width, height, depth) = desc.mip_extent(subresource.mip);
    D3D12_PLACED_SUBRESOURCE_FOOTPRINT {
        Offset: src_offset,
        Footprint: D3D12_SUBRESOURCE_FOOTPRINT {
            Format: format,
            Width: width,
            Height: height,
            Depth: depth,
            RowPitch: desc.upload_row_pitch(subresource.mip),
        },
    }
}

pub(crate) fn scissor_rect(scissor: &ScissorRect) -> RECT {
    RECT {
        left: scissor.x,
        top: scissor.y,
        right: scissor.x + scissor.width as i32,
        bottom: scissor.y + scissor.height as i32,
    }
}

pub(crate) fn viewport(viewport: &Viewport) -> D3D12_VIEWPORT {
    D3D12_VIEWPORT {
        TopLeftX: viewport.x,
        TopLeftY: viewport.y,
        Width: viewport.width,
        Height: viewport.height,
        MinDepth: viewport.min_depth,
        MaxDepth: viewport.max_depth,
    }
}

/// Non-owning resource pointer for barrier and copy descriptions
fn borrowed(resource: &ID3D12Resource) -> ManuallyDrop<Option<ID3D12Resource>> {
    unsafe { std::mem::transmute_copy(resource) }
}

fn transition(resource: &ID3D12Resource, before: ResourceState, after: ResourceState) -> D3D12_RESOURCE_BARRIER {
    if before == ResourceState::UnorderedAccess && after == ResourceState::UnorderedAccess {
        return D3D12_RESOURCE_BARRIER {
            Type: D3D12_RESOURCE_BARRIER_TYPE_UAV,
            Flags: D3D12_RESOURCE_BARRIER_FLAG_NONE,
            Anonymous: D3D12_RESOURCE_BARRIER_0 {
                UAV: ManuallyDrop::new(D3D12_RESOURCE_UAV_BARRIER { pResource: borrowed(resource) }),
            },
        };
    }
    D3D12_RESOURCE_BARRIER {
        Type: D3D12_RESOURCE_BARRIER_TYPE_TRANSITION,
        Flags: D3D12_RESOURCE_BARRIER_FLAG_NONE,
        Anonymous: D3D12_RESOURCE_BARRIER_0 {
            Transition: ManuallyDrop::new(D3D12_RESOURCE_TRANSITION_BARRIER {
                pResource: borrowed(resource),
                Subresource: D3D12_RESOURCE_BARRIER_ALL_SUBRESOURCES,
                StateBefore: resource_state(before),
                StateAfter: resource_state(after),
            }),
        },
    }
}

/// Transitions between equal states are dropped, except UAV to UAV which orders shader writes
pub(crate) fn needs_barrier(before: ResourceState, after: ResourceState) -> bool {
    before != after || before == ResourceState::UnorderedAccess
}

fn dx12_buffer(buffer: &Buffer) -> Result<&Dx12Buffer> {
    match buffer.backend_as::<Dx12Buffer>() {
        Some(buffer) => Ok(buffer),
        None => engine_bail!(LOG_SOURCE, "Buffer '{}' was not created by the DirectX 12 backend", buffer.name()),
    }
}

fn dx12_texture(texture: &Texture) -> Result<&Dx12Texture> {
    match texture.backend_as::<Dx12Texture>() {
        Some(texture) => Ok(texture),
        None => engine_bail!(LOG_SOURCE, "Texture '{}' was not created by the DirectX 12 backend", texture.name()),
    }
}

fn dx12_heap(heap: &DescriptorHeap) -> Result<&Dx12DescriptorHeap> {
    match heap.backend_as::<Dx12DescriptorHeap>() {
        Some(heap) => Ok(heap),
        None => engine_bail!(LOG_SOURCE, "Descriptor heap was not created by the DirectX 12 backend"),
    }
}

fn dx12_layout(layout: &ResourceLayout) -> Result<&Dx12ResourceLayout> {
    match layout.backend_as::<Dx12ResourceLayout>() {
        Some(layout) => Ok(layout),
        None => engine_bail!(LOG_SOURCE, "Resource layout '{}' was not created by the DirectX 12 backend", layout.desc().name),
    }
}

fn attachment_handle(view: &ResourceView) -> Result<D3D12_CPU_DESCRIPTOR_HANDLE> {
    dx12_heap(view.heap())?.cpu_handle(view.slot())
}

// ===== ALLOCATOR =====

/// DirectX 12 implementation of `CommandAllocatorBackend`
pub struct Dx12CommandAllocator {
    allocator: ID3D12CommandAllocator,
    list_type: CommandListType,
}

unsafe impl Send for Dx12CommandAllocator {}
unsafe impl Sync for Dx12CommandAllocator {}

impl Dx12CommandAllocator {
    pub(crate) fn new(ctx: &Dx12Context, list_type: CommandListType) -> Result<Self> {
        let allocator: ID3D12CommandAllocator =
            unsafe { ctx.device.CreateCommandAllocator(command_list_type(list_type)) }
                .map_err(|e| map_hr_error("ID3D12Device::CreateCommandAllocator", e))?;
        Ok(Self { allocator, list_type })
    }

    pub fn allocator(&self) -> &ID3D12CommandAllocator {
        &self.allocator
    }
}

impl CommandAllocatorBackend for Dx12CommandAllocator {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn reset(&self) -> Result<()> {
        unsafe { self.allocator.Reset() }.map_err(|e| map_hr_error("ID3D12CommandAllocator::Reset", e))
    }
}

fn dx12_allocator(allocator: &dyn CommandAllocatorBackend) -> Result<&Dx12CommandAllocator> {
    match allocator.as_any().downcast_ref::<Dx12CommandAllocator>() {
        Some(allocator) => Ok(allocator),
        None => engine_bail!(LOG_SOURCE, "Command allocator was not created by the DirectX 12 backend"),
    }
}

// ===== COMMAND LIST =====

/// DirectX 12 implementation of `CommandListBackend`
pub struct Dx12CommandList {
    list: ID3D12GraphicsCommandList,
    list_type: CommandListType,
    name: String,
}

unsafe impl Send for Dx12CommandList {}

impl Dx12CommandList {
    pub(crate) fn new(
        ctx: &Dx12Context,
        list_type: CommandListType,
        allocator: &dyn CommandAllocatorBackend,
        name: &str,
    ) -> Result<Self> {
        let allocator = dx12_allocator(allocator)?;
        if allocator.list_type != list_type {
            engine_bail!(
                LOG_SOURCE,
                "Command list '{}' ({:?}) cannot use a {:?} allocator",
                name, list_type, allocator.list_type
            );
        }
        let list: ID3D12GraphicsCommandList = unsafe {
            ctx.device
                .CreateCommandList1(0, command_list_type(list_type), D3D12_COMMAND_LIST_FLAG_NONE)
        }
        .map_err(|e| map_hr_error("ID3D12Device4::CreateCommandList1", e))?;
        set_debug_name(&list, name);

        Ok(Self {
            list,
            list_type,
            name: name.to_string(),
        })
    }

    pub fn list(&self) -> &ID3D12GraphicsCommandList {
        &self.list
    }

    pub fn list_type(&self) -> CommandListType {
        self.list_type
    }
}

impl CommandListBackend for Dx12CommandList {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn begin(&mut self, allocator: &dyn CommandAllocatorBackend) -> Result<()> {
        let allocator = dx12_allocator(allocator)?;
        unsafe { self.list.Reset(&allocator.allocator, None) }
            .map_err(|e| map_hr_error("ID3D12GraphicsCommandList::Reset", e))?;
        engine_trace!(LOG_SOURCE, "Command list '{}' recording", self.name);
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        unsafe { self.list.Close() }.map_err(|e| map_hr_error("ID3D12GraphicsCommandList::Close", e))
    }

    fn resource_barriers(&mut self, barriers: &[ResourceBarrier<'_>]) -> Result<()> {
        let mut native = Vec::with_capacity(barriers.len());
        for barrier in barriers {
            let (resource, before, after) = match barrier {
                ResourceBarrier::Texture { texture, before, after } => (dx12_texture(texture)?.resource(), *before, *after),
                ResourceBarrier::Buffer { buffer, before, after } => (dx12_buffer(buffer)?.resource(), *before, *after),
            };
            if needs_barrier(before, after) {
                native.push(transition(resource, before, after));
            }
        }
        if !native.is_empty() {
            unsafe { self.list.ResourceBarrier(&native) };
        }
        Ok(())
    }

    fn begin_render_pass(
        &mut self,
        _allocator: &dyn CommandAllocatorBackend,
        render_pass: &RenderPass,
        frame_buffer: &FrameBuffer,
        clear_values: &[ClearValue],
    ) -> Result<()> {
        let Some(pass) = render_pass.backend_as::<Dx12RenderPass>() else {
            engine_bail!(LOG_SOURCE, "Render pass was not created by the DirectX 12 backend");
        };

        let mut render_targets = Vec::with_capacity(frame_buffer.render_target_count());
        for index in 0..frame_buffer.render_target_count() {
            let Some(view) = frame_buffer.render_target_view(index) else {
                engine_bail!(LOG_SOURCE, "Frame buffer '{}' has no view for target {}", frame_buffer.name(), index);
            };
            render_targets.push(attachment_handle(view)?);
        }
        let depth_stencil = frame_buffer.depth_stencil_view().map(attachment_handle).transpose()?;

        unsafe {
            self.list.OMSetRenderTargets(
                render_targets.len() as u32,
                (!render_targets.is_empty()).then_some(render_targets.as_ptr()),
                false,
                depth_stencil.as_ref().map(|handle| handle as *const _),
            );

            for (index, handle) in render_targets.iter().enumerate() {
                if pass.clears_color(index) {
                    let color = match clear_values.get(index) {
                        Some(ClearValue::Color(color)) => *color,
                        _ => [0.0, 0.0, 0.0, 1.0],
                    };
                    self.list.ClearRenderTargetView(*handle, &color, None);
                }
            }

            let flags = pass.depth_clear_flags();
            if let Some(handle) = depth_stencil.filter(|_| flags.0 != 0) {
                let (depth, stencil) = match clear_values.get(render_targets.len()) {
                    Some(ClearValue::DepthStencil { depth, stencil }) => (*depth, *stencil),
                    _ => (1.0, 0),
                };
                self.list.ClearDepthStencilView(handle, flags, depth, stencil, None);
            }
        }
        Ok(())
    }

    fn end_render_pass(&mut self) -> Result<()> {
        Ok(())
    }

    fn set_viewport(&mut self, viewport_desc: &Viewport) -> Result<()> {
        unsafe { self.list.RSSetViewports(&[viewport(viewport_desc)]) };
        Ok(())
    }

    fn set_scissor(&mut self, scissor: &ScissorRect) -> Result<()> {
        unsafe { self.list.RSSetScissorRects(&[scissor_rect(scissor)]) };
        Ok(())
    }

    fn set_descriptor_heaps(&mut self, heaps: &[&DescriptorHeap]) -> Result<()> {
        let mut native = Vec::with_capacity(heaps.len());
        for heap in heaps {
            if !heap.is_shader_visible() {
                engine_bail!(LOG_SOURCE, "Heap '{}' is not shader visible", heap.desc().name);
            }
            native.push(Some(dx12_heap(heap)?.heap().clone()));
        }
        unsafe { self.list.SetDescriptorHeaps(&native) };
        Ok(())
    }

    fn set_resource_layout(&mut self, kind: PipelineKind, layout: &ResourceLayout) -> Result<()> {
        let root_signature = dx12_layout(layout)?.root_signature();
        unsafe {
            match kind {
                PipelineKind::Graphics => self.list.SetGraphicsRootSignature(root_signature),
                PipelineKind::Compute => self.list.SetComputeRootSignature(root_signature),
            }
        }
        Ok(())
    }

    fn set_pipeline_state(&mut self, pipeline: &PipelineState) -> Result<()> {
        let Some(native) = pipeline.backend_as::<Dx12Pipeline>() else {
            engine_bail!(LOG_SOURCE, "Pipeline '{}' was not created by the DirectX 12 backend", pipeline.name());
        };
        unsafe {
            self.list.SetPipelineState(native.pso());
            if native.kind() == PipelineKind::Graphics {
                self.list.IASetPrimitiveTopology(native.topology());
            }
        }
        Ok(())
    }

    fn bind_view(
        &mut self,
        kind: PipelineKind,
        _layout: &ResourceLayout,
        element_index: u32,
        view: &ResourceView,
    ) -> Result<()> {
        let table = dx12_heap(view.heap())?.gpu_handle(view.slot())?;
        unsafe {
            match kind {
                PipelineKind::Graphics => self.list.SetGraphicsRootDescriptorTable(element_index, table),
                PipelineKind::Compute => self.list.SetComputeRootDescriptorTable(element_index, table),
            }
        }
        Ok(())
    }

    fn set_vertex_buffers(&mut self, start_slot: u32, bindings: &[VertexBufferBinding<'_>]) -> Result<()> {
        let mut views = Vec::with_capacity(bindings.len());
        for binding in bindings {
            let buffer = dx12_buffer(binding.buffer)?;
            views.push(D3D12_VERTEX_BUFFER_VIEW {
                BufferLocation: buffer.gpu_address() + binding.offset,
                SizeInBytes: (buffer.size() - binding.offset) as u32,
                StrideInBytes: binding.buffer.stride() as u32,
            });
        }
        unsafe { self.list.IASetVertexBuffers(start_slot, Some(&views)) };
        Ok(())
    }

    fn set_index_buffer(&mut self, buffer: &Buffer, offset: u64, format: IndexFormat) -> Result<()> {
        let native = dx12_buffer(buffer)?;
        let view = D3D12_INDEX_BUFFER_VIEW {
            BufferLocation: native.gpu_address() + offset,
            SizeInBytes: (native.size() - offset) as u32,
            Format: index_format(format),
        };
        unsafe { self.list.IASetIndexBuffer(Some(&view)) };
        Ok(())
    }

    fn draw_instanced(
        &mut self,
        vertex_count: u32,
        instance_count: u32,
        start_vertex: u32,
        start_instance: u32,
    ) -> Result<()> {
        unsafe {
            self.list
                .DrawInstanced(vertex_count, instance_count, start_vertex, start_instance)
        };
        Ok(())
    }

    fn draw_indexed_instanced(
        &mut self,
        index_count: u32,
        instance_count: u32,
        start_index: u32,
        base_vertex: i32,
        start_instance: u32,
    ) -> Result<()> {
        unsafe {
            self.list
                .DrawIndexedInstanced(index_count, instance_count, start_index, base_vertex, start_instance)
        };
        Ok(())
    }

    fn dispatch(&mut self, x: u32, y: u32, z: u32) -> Result<()> {
        unsafe { self.list.Dispatch(x, y, z) };
        Ok(())
    }

    fn copy_buffer_region(
        &mut self,
        dst: &Buffer,
        dst_offset: u64,
        src: &Buffer,
        src_offset: u64,
        size: u64,
    ) -> Result<()> {
        let (dst, src) = (dx12_buffer(dst)?, dx12_buffer(src)?);
        unsafe {
            self.list
                .CopyBufferRegion(dst.resource(), dst_offset, src.resource(), src_offset, size)
        };
        Ok(())
    }

    fn copy_buffer_to_texture(
        &mut self,
        dst: &Texture,
        subresource: TextureSubresource,
        src: &Buffer,
        src_offset: u64,
    ) -> Result<()> {
        let texture = dx12_texture(dst)?;
        let buffer = dx12_buffer(src)?;

        let dst_location = D3D12_TEXTURE_COPY_LOCATION {
            pResource: borrowed(texture.resource()),
            Type: D3D12_TEXTURE_COPY_TYPE_SUBRESOURCE_INDEX,
            Anonymous: D3D12_TEXTURE_COPY_LOCATION_0 {
                SubresourceIndex: subresource_index(subresource.mip, subresource.layer, texture.mip_levels()),
            },
        };
        let src_location = D3D12_TEXTURE_COPY_LOCATION {
            pResource: borrowed(buffer.resource()),
            Type: D3D12_TEXTURE_COPY_TYPE_PLACED_FOOTPRINT,
            Anonymous: D3D12_TEXTURE_COPY_LOCATION_0 {
                PlacedFootprint: placed_footprint(dst.desc(), texture.resource_format(), subresource, src_offset),
            },
        };
        unsafe { self.list.CopyTextureRegion(&dst_location, 0, 0, 0, &src_location, None) };
        Ok(())
    }
}

#[cfg(test)]
#[path = "dx12_command_list_tests.rs"]
mod tests;
