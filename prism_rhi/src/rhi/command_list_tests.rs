//! Unit tests for command_list.rs
//!
//! Tests recording lifecycle, state tracking and the draw/dispatch/copy
//! preconditions. Commands are checked through the mock GPU log.

use super::*;
use crate::rhi::mock_backend::{mock_device, MockCommandAllocator, MockCommandList};
use crate::rhi::{
    AttachmentDesc, BufferDesc, ComputePipelineDesc, Device, FrameBuffer, FrameBufferDesc,
    GraphicsPipelineDesc, LoadOp, PixelFormat, RenderPassDesc, ResourceLayoutDesc,
    ResourceLayoutElement, ShaderBytecode, ShaderStage, StoreOp, TextureDesc,
};

const COLOR: PixelFormat = PixelFormat::R8G8B8A8_UNORM;

struct Scene {
    render_pass: Arc<RenderPass>,
    target: Arc<Texture>,
    frame_buffer: FrameBuffer,
    layout: Arc<ResourceLayout>,
    pipeline: Arc<PipelineState>,
}

fn scene(device: &Device) -> Scene {
    let render_pass = device
        .create_render_pass(RenderPassDesc {
            color_attachments: vec![AttachmentDesc::new(COLOR, LoadOp::Clear, StoreOp::Store)],
            depth_attachment: None,
            name: "main".to_string(),
        })
        .unwrap();
    let target = device
        .create_texture(TextureDesc::render_target(64, 64, COLOR).with_name("color"))
        .unwrap();
    let frame_buffer = device
        .create_frame_buffer(FrameBufferDesc {
            render_pass: Arc::clone(&render_pass),
            render_targets: vec![Arc::clone(&target)],
            depth_stencil: None,
            name: "main_fb".to_string(),
        })
        .unwrap();
    let layout = device
        .create_resource_layout(ResourceLayoutDesc {
            elements: vec![
                ResourceLayoutElement::constant_buffer(0),
                ResourceLayoutElement::texture(0),
            ],
            name: "mesh_layout".to_string(),
            ..Default::default()
        })
        .unwrap();
    let mut desc = GraphicsPipelineDesc::new(
        ShaderBytecode::new(ShaderStage::Vertex, vec![1, 2, 3, 4], "vs_main"),
        Some(ShaderBytecode::new(ShaderStage::Pixel, vec![1, 2, 3, 4], "ps_main")),
        Arc::clone(&layout),
        Arc::clone(&render_pass),
    );
    desc.name = "mesh".to_string();
    let pipeline = device.create_graphics_pipeline(&desc).unwrap();
    Scene { render_pass, target, frame_buffer, layout, pipeline }
}

fn recording(device: &Device, list_type: CommandListType) -> CommandList {
    let mut list = device.create_command_list(list_type, "test_list").unwrap();
    list.begin_recording(false).unwrap();
    list
}

fn commands(list: &CommandList) -> Vec<String> {
    list.backend_as::<MockCommandList>().unwrap().commands.clone()
}

fn reset_count(list: &CommandList) -> u32 {
    list.allocator()
        .backend()
        .as_any()
        .downcast_ref::<MockCommandAllocator>()
        .unwrap()
        .reset_count()
}

// ============================================================================
// LIFECYCLE
// ============================================================================

#[test]
fn test_recording_lifecycle() {
    let (device, _gpu) = mock_device();
    let mut list = device.create_command_list(CommandListType::Graphics, "frame").unwrap();
    assert_eq!(list.state(), CommandListState::Initial);
    assert!(matches!(list.end_recording(), Err(Error::InvalidState(_))));

    list.begin_recording(false).unwrap();
    assert!(list.is_recording());
    assert!(list.begin_recording(false).is_err());

    list.end_recording().unwrap();
    assert_eq!(list.state(), CommandListState::Closed);
}

#[test]
fn test_allocator_reset_skipped_mid_frame() {
    let (device, _gpu) = mock_device();
    let mut list = device.create_command_list(CommandListType::Compute, "async").unwrap();

    list.begin_recording(false).unwrap();
    list.end_recording().unwrap();
    assert_eq!(reset_count(&list), 1);

    list.begin_recording(true).unwrap();
    list.end_recording().unwrap();
    assert_eq!(reset_count(&list), 1);

    list.begin_recording(false).unwrap();
    assert_eq!(reset_count(&list), 2);
}

#[test]
fn test_commands_rejected_when_not_recording() {
    let (device, _gpu) = mock_device();
    let mut list = device.create_command_list(CommandListType::Graphics, "idle").unwrap();
    let viewport = Viewport::from_extent(64, 64);
    assert!(matches!(list.set_viewport(&viewport), Err(Error::InvalidState(_))));
    assert!(list.draw_instanced(3, 1, 0, 0).is_err());
}

// ============================================================================
// STATE TRANSITIONS
// ============================================================================

#[test]
fn test_transition_records_barrier_and_tracks_state() {
    let (device, _gpu) = mock_device();
    let texture = device
        .create_texture(TextureDesc::texture_2d(16, 16, COLOR).with_name("albedo"))
        .unwrap();
    let mut list = recording(&device, CommandListType::Graphics);

    list.transition_texture(&texture, ResourceState::CopyDestination).unwrap();
    list.transition_texture(&texture, ResourceState::CopyDestination).unwrap();
    list.transition_texture(&texture, ResourceState::GeneralRead).unwrap();

    assert_eq!(texture.state(), ResourceState::GeneralRead);
    assert_eq!(
        commands(&list),
        vec![
            "barrier albedo Common->CopyDestination".to_string(),
            "barrier albedo CopyDestination->GeneralRead".to_string(),
        ]
    );
    assert_eq!(list.recorded_commands(), 2);
}

#[test]
fn test_invalid_transition_leaves_state_untouched() {
    let (device, _gpu) = mock_device();
    let texture = device.create_texture(TextureDesc::texture_2d(16, 16, COLOR)).unwrap();
    let buffer = device.create_buffer(BufferDesc::vertex(12, 3)).unwrap();
    let mut list = recording(&device, CommandListType::Graphics);

    assert!(matches!(
        list.transition_texture(&texture, ResourceState::RenderTarget),
        Err(Error::InvalidStateTransition(_))
    ));
    assert_eq!(texture.state(), ResourceState::Common);

    assert!(list.transition_buffer(&buffer, ResourceState::IndexBuffer).is_err());
    assert_eq!(buffer.state(), ResourceState::Common);
    assert!(commands(&list).is_empty());
}

// ============================================================================
// RENDER PASSES AND DRAWS
// ============================================================================

#[test]
fn test_render_pass_needs_targets_in_render_target_state() {
    let (device, _gpu) = mock_device();
    let scene = scene(&device);
    let mut list = recording(&device, CommandListType::Graphics);

    let clear = [ClearValue::Color([0.0, 0.0, 0.0, 1.0])];
    assert!(list.begin_render_pass(&scene.render_pass, &scene.frame_buffer, &clear).is_err());

    list.transition_texture(&scene.target, ResourceState::RenderTarget).unwrap();
    list.begin_render_pass(&scene.render_pass, &scene.frame_buffer, &clear).unwrap();
    assert!(list.in_render_pass());
    assert!(list.begin_render_pass(&scene.render_pass, &scene.frame_buffer, &clear).is_err());
    assert!(list.end_recording().is_err());
    assert!(list.transition_texture(&scene.target, ResourceState::GeneralRead).is_err());

    list.end_render_pass().unwrap();
    assert!(list.end_render_pass().is_err());
    list.end_recording().unwrap();
}

#[test]
fn test_clear_value_count_must_match_attachments() {
    let (device, _gpu) = mock_device();
    let scene = scene(&device);
    let mut list = recording(&device, CommandListType::Graphics);
    list.transition_texture(&scene.target, ResourceState::RenderTarget).unwrap();

    let two = [ClearValue::Color([0.0; 4]), ClearValue::Color([1.0; 4])];
    assert!(list.begin_render_pass(&scene.render_pass, &scene.frame_buffer, &two).is_err());
    // No clear values at all is fine
    assert!(list.begin_render_pass(&scene.render_pass, &scene.frame_buffer, &[]).is_ok());
}

#[test]
fn test_render_pass_only_on_graphics_lists() {
    let (device, _gpu) = mock_device();
    let scene = scene(&device);
    let mut list = recording(&device, CommandListType::Compute);
    list.transition_texture(&scene.target, ResourceState::RenderTarget).unwrap();
    assert!(list.begin_render_pass(&scene.render_pass, &scene.frame_buffer, &[]).is_err());
}

#[test]
fn test_draw_preconditions() {
    let (device, _gpu) = mock_device();
    let scene = scene(&device);
    let other_layout = device
        .create_resource_layout(ResourceLayoutDesc { name: "other".to_string(), ..Default::default() })
        .unwrap();
    let mut list = recording(&device, CommandListType::Graphics);
    list.transition_texture(&scene.target, ResourceState::RenderTarget).unwrap();

    // Outside a pass
    list.set_graphics_resource_layout(&scene.layout).unwrap();
    list.set_pipeline_state(&scene.pipeline).unwrap();
    assert!(list.draw_instanced(3, 1, 0, 0).is_err());

    list.begin_render_pass(&scene.render_pass, &scene.frame_buffer, &[]).unwrap();

    // Pipeline built for another layout than the bound one
    list.set_graphics_resource_layout(&other_layout).unwrap();
    assert!(list.draw_instanced(3, 1, 0, 0).is_err());

    list.set_graphics_resource_layout(&scene.layout).unwrap();
    list.draw_instanced(3, 1, 0, 0).unwrap();

    // Indexed draw without an index buffer
    assert!(list.draw_indexed_instanced(6, 1, 0, 0, 0).is_err());
}

#[test]
fn test_executed_frame_reaches_gpu_in_order() {
    let (device, gpu) = mock_device();
    let scene = scene(&device);
    let queue = device.create_command_queue(CommandListType::Graphics).unwrap();
    let mut list = recording(&device, CommandListType::Graphics);

    list.transition_texture(&scene.target, ResourceState::RenderTarget).unwrap();
    list.begin_render_pass(&scene.render_pass, &scene.frame_buffer, &[ClearValue::Color([0.0; 4])]).unwrap();
    list.set_viewport(&Viewport::from_extent(64, 64)).unwrap();
    list.set_graphics_resource_layout(&scene.layout).unwrap();
    list.set_pipeline_state(&scene.pipeline).unwrap();
    list.draw_instanced(3, 1, 0, 0).unwrap();
    list.end_render_pass().unwrap();
    list.end_recording().unwrap();
    queue.execute(&mut [&mut list]).unwrap();

    assert_eq!(list.state(), CommandListState::Submitted);
    assert_eq!(
        gpu.executed(),
        vec![
            "test_list: barrier color Common->RenderTarget",
            "test_list: begin_render_pass main_fb clears=1",
            "test_list: viewport 64x64",
            "test_list: layout Graphics mesh_layout",
            "test_list: pipeline mesh",
            "test_list: draw 3 1",
            "test_list: end_render_pass",
        ]
    );
}

// ============================================================================
// BINDING
// ============================================================================

#[test]
fn test_bind_view_checks_layout_element() {
    let (device, _gpu) = mock_device();
    let scene = scene(&device);
    let constants = device.create_buffer(BufferDesc::constant(64, 1)).unwrap();
    let structured = device.create_buffer(BufferDesc::structured(16, 4)).unwrap();
    let texture = device.create_texture(TextureDesc::texture_2d(8, 8, COLOR)).unwrap();
    let cbv = device.create_constant_buffer_view(&constants).unwrap();
    let buffer_srv = device.create_shader_resource_view(&structured).unwrap();
    let texture_srv = device.create_shader_resource_view(&texture).unwrap();

    let mut list = recording(&device, CommandListType::Graphics);
    assert!(list.bind_view(PipelineKind::Graphics, 0, &cbv).is_err());

    list.set_graphics_resource_layout(&scene.layout).unwrap();
    list.bind_view(PipelineKind::Graphics, 0, &cbv).unwrap();
    list.bind_view(PipelineKind::Graphics, 1, &texture_srv).unwrap();
    // Wrong kind, wrong resource, out of range, no compute layout
    assert!(list.bind_view(PipelineKind::Graphics, 0, &texture_srv).is_err());
    assert!(list.bind_view(PipelineKind::Graphics, 1, &buffer_srv).is_err());
    assert!(list.bind_view(PipelineKind::Graphics, 2, &cbv).is_err());
    assert!(list.bind_view(PipelineKind::Compute, 0, &cbv).is_err());

    drop(texture);
    assert!(matches!(
        list.bind_view(PipelineKind::Graphics, 1, &texture_srv),
        Err(Error::InvalidResource(_))
    ));
}

#[test]
fn test_descriptor_heaps_must_be_shader_visible() {
    let (device, _gpu) = mock_device();
    let mut list = recording(&device, CommandListType::Graphics);
    let heaps = device.view_heaps();

    let [resources, samplers] = heaps.shader_visible();
    list.set_descriptor_heaps(&[resources, samplers]).unwrap();
    assert!(list.set_descriptor_heaps(&[heaps.render_target.as_ref()]).is_err());
}

#[test]
fn test_vertex_and_index_buffers_need_usage_and_state() {
    let (device, _gpu) = mock_device();
    let vertices = device.create_buffer(BufferDesc::vertex(12, 3)).unwrap();
    let indices = device.create_buffer(BufferDesc::index(2, 6)).unwrap();
    let mut list = recording(&device, CommandListType::Graphics);

    let binding = [VertexBufferBinding { buffer: &vertices, offset: 0 }];
    assert!(list.set_vertex_buffers(0, &binding).is_err());
    list.transition_buffer(&vertices, ResourceState::VertexAndConstantBuffer).unwrap();
    list.set_vertex_buffers(0, &binding).unwrap();

    let wrong = [VertexBufferBinding { buffer: &indices, offset: 0 }];
    assert!(matches!(list.set_vertex_buffers(0, &wrong), Err(Error::InvalidResource(_))));

    list.transition_buffer(&indices, ResourceState::IndexBuffer).unwrap();
    assert!(list.set_index_buffer(&indices, 1, IndexFormat::U16).is_err());
    assert!(list.set_index_buffer(&indices, 12, IndexFormat::U16).is_err());
    list.set_index_buffer(&indices, 2, IndexFormat::U16).unwrap();
}

// ============================================================================
// DISPATCH
// ============================================================================

#[test]
fn test_dispatch_rules() {
    let (device, _gpu) = mock_device();
    let layout = device
        .create_resource_layout(ResourceLayoutDesc {
            elements: vec![ResourceLayoutElement::storage_buffer(0)],
            name: "cs_layout".to_string(),
            ..Default::default()
        })
        .unwrap();
    let pipeline = device
        .create_compute_pipeline(&ComputePipelineDesc {
            compute_shader: ShaderBytecode::new(ShaderStage::Compute, vec![1, 2, 3, 4], "cs_main"),
            resource_layout: Arc::clone(&layout),
            name: "cull".to_string(),
        })
        .unwrap();

    let mut copy = recording(&device, CommandListType::Copy);
    assert!(copy.set_pipeline_state(&pipeline).is_err());
    assert!(copy.dispatch(1, 1, 1).is_err());

    let mut compute = recording(&device, CommandListType::Compute);
    assert!(compute.dispatch(1, 1, 1).is_err());
    compute.set_compute_resource_layout(&layout).unwrap();
    compute.set_pipeline_state(&pipeline).unwrap();
    compute.dispatch(8, 4, 1).unwrap();
    assert_eq!(commands(&compute).last().map(String::as_str), Some("dispatch 8 4 1"));
}

// ============================================================================
// COPIES
// ============================================================================

#[test]
fn test_copy_buffer_region_rules() {
    let (device, _gpu) = mock_device();
    let staging = device.create_buffer(BufferDesc::upload(256).with_name("staging")).unwrap();
    let vertices = device.create_buffer(BufferDesc::vertex(16, 16).with_name("vertices")).unwrap();
    let mut list = recording(&device, CommandListType::Copy);

    // Destination not in CopyDestination yet
    assert!(list.copy_buffer_region(&vertices, 0, &staging, 0, 256).is_err());

    list.transition_buffer(&vertices, ResourceState::CopyDestination).unwrap();
    assert!(list.copy_buffer_region(&vertices, 128, &staging, 0, 256).is_err());
    assert!(list.copy_buffer_region(&vertices, 0, &staging, 0, 0).is_err());
    list.copy_buffer_region(&vertices, 0, &staging, 0, 256).unwrap();
    assert_eq!(commands(&list).last().map(String::as_str), Some("copy staging->vertices 256"));

    // Default heap source must be in CopySource
    let other = device.create_buffer(BufferDesc::vertex(16, 16)).unwrap();
    assert!(list.copy_buffer_region(&other, 0, &vertices, 0, 16).is_err());
}

#[test]
fn test_copy_buffer_to_texture_rules() {
    let (device, _gpu) = mock_device();
    let desc = TextureDesc::texture_2d(64, 64, COLOR).with_mip_levels(2).with_name("albedo");
    let mip0 = desc.upload_size(0);
    let texture = device.create_texture(desc).unwrap();
    let staging = device.create_buffer(BufferDesc::upload(mip0 + 512)).unwrap();
    let mut list = recording(&device, CommandListType::Copy);
    list.transition_texture(&texture, ResourceState::CopyDestination).unwrap();

    let top = TextureSubresource::default();
    assert!(list.copy_buffer_to_texture(&texture, top, &staging, 256).is_err());
    assert!(list.copy_buffer_to_texture(&texture, top, &staging, 1024).is_err());
    assert!(list.copy_buffer_to_texture(&texture, TextureSubresource { mip: 2, layer: 0 }, &staging, 0).is_err());

    list.copy_buffer_to_texture(&texture, top, &staging, 512).unwrap();
    list.copy_buffer_to_texture(&texture, TextureSubresource { mip: 1, layer: 0 }, &staging, 0).unwrap();
    assert_eq!(commands(&list).last().map(String::as_str), Some("copy ->albedo mip 1"));
}
