//! Unit tests for pipeline_state.rs

use super::*;
use crate::rhi::mock_backend::mock_device;
use crate::rhi::{
    AttachmentDesc, Device, LoadOp, RenderPassDesc, ResourceLayoutDesc, ResourceLayoutElement, StoreOp,
};

fn shader(stage: ShaderStage) -> ShaderBytecode {
    ShaderBytecode::new(stage, vec![0x03, 0x02, 0x23, 0x07], "main")
}

fn layout(device: &Device) -> Arc<ResourceLayout> {
    device
        .create_resource_layout(ResourceLayoutDesc {
            elements: vec![ResourceLayoutElement::constant_buffer(0)],
            name: "layout".to_string(),
            ..Default::default()
        })
        .unwrap()
}

fn pass(device: &Device, depth: bool) -> Arc<RenderPass> {
    device
        .create_render_pass(RenderPassDesc {
            color_attachments: vec![AttachmentDesc::new(PixelFormat::B8G8R8A8_UNORM, LoadOp::Clear, StoreOp::Store)],
            depth_attachment: depth.then(|| AttachmentDesc::new(PixelFormat::D32_FLOAT, LoadOp::Clear, StoreOp::DontCare)),
            name: "pass".to_string(),
        })
        .unwrap()
}

fn position_input() -> (Vec<VertexBufferLayout>, Vec<InputElement>) {
    let buffers = vec![VertexBufferLayout { slot: 0, stride: 12, input_rate: VertexInputRate::Vertex }];
    let elements = vec![InputElement {
        semantic: "POSITION".to_string(),
        semantic_index: 0,
        location: 0,
        format: PixelFormat::R32G32B32_FLOAT,
        buffer_slot: 0,
        offset: 0,
    }];
    (buffers, elements)
}

#[test]
fn test_new_disables_depth_without_depth_attachment() {
    let (device, _gpu) = mock_device();
    let desc = GraphicsPipelineDesc::new(shader(ShaderStage::Vertex), None, layout(&device), pass(&device, false));
    assert!(!desc.depth_stencil.depth_test);
    assert!(desc.validate().is_ok());

    let with_depth = GraphicsPipelineDesc::new(shader(ShaderStage::Vertex), None, layout(&device), pass(&device, true));
    assert!(with_depth.depth_stencil.depth_test);
}

#[test]
fn test_depth_test_needs_depth_attachment() {
    let (device, _gpu) = mock_device();
    let mut desc = GraphicsPipelineDesc::new(shader(ShaderStage::Vertex), None, layout(&device), pass(&device, false));
    desc.depth_stencil = DepthStencilState::default();
    assert!(matches!(desc.validate(), Err(Error::InvalidResource(_))));
}

#[test]
fn test_shader_stage_must_match_slot() {
    let (device, _gpu) = mock_device();
    let desc = GraphicsPipelineDesc::new(
        shader(ShaderStage::Pixel),
        Some(shader(ShaderStage::Pixel)),
        layout(&device),
        pass(&device, false),
    );
    assert!(desc.validate().is_err());

    let compute = ComputePipelineDesc {
        compute_shader: shader(ShaderStage::Vertex),
        resource_layout: layout(&device),
        name: "cs".to_string(),
    };
    assert!(compute.validate().is_err());
}

#[test]
fn test_empty_bytecode_rejected() {
    let (device, _gpu) = mock_device();
    let empty = ShaderBytecode::new(ShaderStage::Vertex, Vec::new(), "main");
    let desc = GraphicsPipelineDesc::new(empty, None, layout(&device), pass(&device, false));
    assert!(desc.validate().is_err());
}

#[test]
fn test_input_elements_reference_declared_slots() {
    let (device, _gpu) = mock_device();
    let (buffers, mut elements) = position_input();
    let mut desc = GraphicsPipelineDesc::new(shader(ShaderStage::Vertex), None, layout(&device), pass(&device, false));
    desc.vertex_buffers = buffers;
    desc.input_elements = elements.clone();
    assert!(desc.validate().is_ok());

    elements[0].buffer_slot = 1;
    desc.input_elements = elements;
    assert!(desc.validate().is_err());
}

#[test]
fn test_input_element_cannot_overflow_stride() {
    let (device, _gpu) = mock_device();
    let (buffers, mut elements) = position_input();
    elements[0].offset = 4;
    let mut desc = GraphicsPipelineDesc::new(shader(ShaderStage::Vertex), None, layout(&device), pass(&device, false));
    desc.vertex_buffers = buffers;
    desc.input_elements = elements;
    assert!(desc.validate().is_err());
}

#[test]
fn test_created_pipelines_keep_layout_and_pass() {
    let (device, _gpu) = mock_device();
    let layout = layout(&device);
    let render_pass = pass(&device, true);
    let mut desc = GraphicsPipelineDesc::new(
        shader(ShaderStage::Vertex),
        Some(shader(ShaderStage::Pixel)),
        Arc::clone(&layout),
        Arc::clone(&render_pass),
    );
    desc.name = "opaque".to_string();

    let pipeline = device.create_graphics_pipeline(&desc).unwrap();
    assert_eq!(pipeline.kind(), PipelineKind::Graphics);
    assert_eq!(pipeline.name(), "opaque");
    assert!(Arc::ptr_eq(pipeline.resource_layout(), &layout));
    assert!(Arc::ptr_eq(pipeline.render_pass().unwrap(), &render_pass));

    let compute = device
        .create_compute_pipeline(&ComputePipelineDesc {
            compute_shader: shader(ShaderStage::Compute),
            resource_layout: Arc::clone(&layout),
            name: "blur".to_string(),
        })
        .unwrap();
    assert_eq!(compute.kind(), PipelineKind::Compute);
    assert!(compute.render_pass().is_none());
}
