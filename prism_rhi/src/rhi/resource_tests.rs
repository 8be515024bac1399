//! Unit tests for resource.rs

use super::*;

#[test]
fn test_state_classification() {
    assert!(ResourceState::IndexBuffer.is_buffer_only());
    assert!(ResourceState::VertexAndConstantBuffer.is_buffer_only());
    assert!(!ResourceState::GeneralRead.is_buffer_only());

    assert!(ResourceState::Present.is_texture_only());
    assert!(ResourceState::DepthStencilRead.is_texture_only());
    assert!(!ResourceState::CopySource.is_texture_only());
}

#[test]
fn test_memory_heap_visibility() {
    assert!(!MemoryHeap::Default.is_cpu_visible());
    assert!(MemoryHeap::Upload.is_cpu_visible());
    assert!(MemoryHeap::Readback.is_cpu_visible());
}

#[test]
fn test_render_target_state_requires_usage() {
    let sampled = TextureUsage::SHADER_RESOURCE;
    let target = TextureUsage::SHADER_RESOURCE | TextureUsage::RENDER_TARGET;

    assert!(matches!(
        check_texture_state("albedo", sampled, false, ResourceState::RenderTarget),
        Err(Error::InvalidStateTransition(_))
    ));
    assert!(check_texture_state("gbuffer", target, false, ResourceState::RenderTarget).is_ok());
    assert!(check_texture_state("gbuffer", target, false, ResourceState::GeneralRead).is_ok());
}

#[test]
fn test_depth_states_require_depth_usage() {
    let depth = TextureUsage::DEPTH_STENCIL;
    assert!(check_texture_state("depth", depth, false, ResourceState::DepthStencilWrite).is_ok());
    assert!(check_texture_state("depth", depth, false, ResourceState::DepthStencilRead).is_ok());
    assert!(check_texture_state("depth", depth, false, ResourceState::GeneralRead).is_err());
    assert!(check_texture_state(
        "color",
        TextureUsage::RENDER_TARGET,
        false,
        ResourceState::DepthStencilWrite
    )
    .is_err());
}

#[test]
fn test_present_only_for_back_buffers() {
    let usage = TextureUsage::RENDER_TARGET;
    assert!(check_texture_state("back buffer", usage, true, ResourceState::Present).is_ok());
    assert!(check_texture_state("offscreen", usage, false, ResourceState::Present).is_err());
}

#[test]
fn test_textures_never_enter_buffer_states() {
    let all = TextureUsage::all();
    assert!(check_texture_state("t", all, true, ResourceState::IndexBuffer).is_err());
    assert!(check_texture_state("t", all, true, ResourceState::VertexAndConstantBuffer).is_err());
}

#[test]
fn test_copy_and_common_always_legal_for_textures() {
    let usage = TextureUsage::SHADER_RESOURCE;
    for state in [ResourceState::Common, ResourceState::CopySource, ResourceState::CopyDestination] {
        assert!(check_texture_state("t", usage, false, state).is_ok());
    }
}

#[test]
fn test_buffer_states_follow_usage() {
    let vertex = BufferUsage::VERTEX;
    let heap = MemoryHeap::Default;

    assert!(check_buffer_state("vb", vertex, heap, ResourceState::VertexAndConstantBuffer).is_ok());
    assert!(check_buffer_state("vb", vertex, heap, ResourceState::IndexBuffer).is_err());
    assert!(check_buffer_state("vb", vertex, heap, ResourceState::UnorderedAccess).is_err());
    assert!(check_buffer_state("ib", BufferUsage::INDEX, heap, ResourceState::IndexBuffer).is_ok());
    assert!(check_buffer_state(
        "cb",
        BufferUsage::CONSTANT,
        heap,
        ResourceState::VertexAndConstantBuffer
    )
    .is_ok());
}

#[test]
fn test_buffers_never_enter_texture_states() {
    let all = BufferUsage::all();
    for state in [
        ResourceState::RenderTarget,
        ResourceState::DepthStencilWrite,
        ResourceState::DepthStencilRead,
        ResourceState::Present,
    ] {
        assert!(check_buffer_state("b", all, MemoryHeap::Default, state).is_err());
    }
}

#[test]
fn test_cpu_visible_buffers_are_pinned() {
    let usage = BufferUsage::VERTEX;
    assert!(check_buffer_state("up", usage, MemoryHeap::Upload, ResourceState::GeneralRead).is_ok());
    assert!(check_buffer_state("up", usage, MemoryHeap::Upload, ResourceState::CopySource).is_err());
    assert!(check_buffer_state("rb", usage, MemoryHeap::Readback, ResourceState::CopyDestination).is_ok());
    assert!(check_buffer_state("rb", usage, MemoryHeap::Readback, ResourceState::Common).is_err());
}
