/// Resource state machine shared by buffers and textures
///
/// A resource is always in exactly one `ResourceState`. Moving it to another
/// state is explicit: `CommandList::transition_texture` / `transition_buffer`
/// check the request against the resource usage flags, record one barrier
/// and update the tracked state. Nothing in the RHI transitions implicitly.

use bitflags::bitflags;
use crate::error::{Error, Result};

/// Current usage mode of a GPU resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceState {
    /// No particular usage, initial state of default-heap resources
    Common,
    /// Read as vertex or constant buffer (buffers only)
    VertexAndConstantBuffer,
    /// Read as index buffer (buffers only)
    IndexBuffer,
    /// Color attachment
    RenderTarget,
    /// Shader read/write
    UnorderedAccess,
    /// Depth attachment with depth writes
    DepthStencilWrite,
    /// Depth attachment, read-only
    DepthStencilRead,
    /// Any shader or fixed-function read
    GeneralRead,
    /// Source of a copy
    CopySource,
    /// Destination of a copy
    CopyDestination,
    /// Handed to the presentation engine (swapchain back buffers only)
    Present,
}

impl ResourceState {
    /// States that only make sense for buffers
    pub fn is_buffer_only(self) -> bool {
        matches!(self, ResourceState::VertexAndConstantBuffer | ResourceState::IndexBuffer)
    }

    /// States that only make sense for textures
    pub fn is_texture_only(self) -> bool {
        matches!(
            self,
            ResourceState::RenderTarget
                | ResourceState::DepthStencilWrite
                | ResourceState::DepthStencilRead
                | ResourceState::Present
        )
    }
}

/// Memory heap a resource lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemoryHeap {
    /// GPU-only memory
    Default,
    /// CPU-writable, GPU-readable memory
    Upload,
    /// GPU-writable, CPU-readable memory
    Readback,
}

impl MemoryHeap {
    /// Only upload and readback memory can be mapped
    pub fn is_cpu_visible(self) -> bool {
        !matches!(self, MemoryHeap::Default)
    }
}

bitflags! {
    /// Ways a texture may be used over its lifetime
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TextureUsage: u32 {
        /// Sampled or loaded in shaders
        const SHADER_RESOURCE = 1 << 0;
        /// Color attachment of a frame buffer
        const RENDER_TARGET = 1 << 1;
        /// Depth attachment of a frame buffer
        const DEPTH_STENCIL = 1 << 2;
        /// Shader read/write
        const UNORDERED_ACCESS = 1 << 3;
    }
}

bitflags! {
    /// Ways a buffer may be used over its lifetime
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferUsage: u32 {
        /// Vertex buffer
        const VERTEX = 1 << 0;
        /// Index buffer
        const INDEX = 1 << 1;
        /// Constant (uniform) buffer
        const CONSTANT = 1 << 2;
        /// Structured buffer read in shaders
        const SHADER_RESOURCE = 1 << 3;
        /// Structured buffer written in shaders
        const UNORDERED_ACCESS = 1 << 4;
    }
}

/// Check that a texture with `usage` may enter `state`
pub(crate) fn check_texture_state(
    name: &str,
    usage: TextureUsage,
    is_back_buffer: bool,
    state: ResourceState,
) -> Result<()> {
    let allowed = match state {
        ResourceState::Common | ResourceState::CopySource | ResourceState::CopyDestination => true,
        ResourceState::VertexAndConstantBuffer | ResourceState::IndexBuffer => false,
        ResourceState::RenderTarget => usage.contains(TextureUsage::RENDER_TARGET),
        ResourceState::DepthStencilWrite | ResourceState::DepthStencilRead => {
            usage.contains(TextureUsage::DEPTH_STENCIL)
        }
        ResourceState::UnorderedAccess => usage.contains(TextureUsage::UNORDERED_ACCESS),
        ResourceState::GeneralRead => usage.contains(TextureUsage::SHADER_RESOURCE),
        ResourceState::Present => is_back_buffer,
    };

    if allowed {
        Ok(())
    } else {
        Err(Error::InvalidStateTransition(format!(
            "texture '{}' with usage {:?} cannot enter {:?}",
            name, usage, state
        )))
    }
}

/// Check that a buffer with `usage` living in `heap` may enter `state`
pub(crate) fn check_buffer_state(
    name: &str,
    usage: BufferUsage,
    heap: MemoryHeap,
    state: ResourceState,
) -> Result<()> {
    // Upload and readback memory is pinned to one state for its whole life
    match heap {
        MemoryHeap::Upload if state != ResourceState::GeneralRead => {
            return Err(Error::InvalidStateTransition(format!(
                "upload buffer '{}' must stay in GeneralRead (requested {:?})",
                name, state
            )));
        }
        MemoryHeap::Readback if state != ResourceState::CopyDestination => {
            return Err(Error::InvalidStateTransition(format!(
                "readback buffer '{}' must stay in CopyDestination (requested {:?})",
                name, state
            )));
        }
        _ => {}
    }

    let allowed = match state {
        ResourceState::Common
        | ResourceState::GeneralRead
        | ResourceState::CopySource
        | ResourceState::CopyDestination => true,
        ResourceState::VertexAndConstantBuffer => {
            usage.intersects(BufferUsage::VERTEX | BufferUsage::CONSTANT)
        }
        ResourceState::IndexBuffer => usage.contains(BufferUsage::INDEX),
        ResourceState::UnorderedAccess => usage.contains(BufferUsage::UNORDERED_ACCESS),
        ResourceState::RenderTarget
        | ResourceState::DepthStencilWrite
        | ResourceState::DepthStencilRead
        | ResourceState::Present => false,
    };

    if allowed {
        Ok(())
    } else {
        Err(Error::InvalidStateTransition(format!(
            "buffer '{}' with usage {:?} cannot enter {:?}",
            name, usage, state
        )))
    }
}

#[cfg(test)]
#[path = "resource_tests.rs"]
mod tests;
