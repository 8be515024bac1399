//! Unit tests for VulkanRenderPass attachment conversion

use super::*;
use prism_rhi::prism::rhi::{LoadOp, PixelFormat, StoreOp};

#[test]
fn test_color_and_depth_formats() {
    let desc = RenderPassDesc {
        color_attachments: vec![
            AttachmentDesc::new(PixelFormat::B8G8R8A8_SRGB, LoadOp::Clear, StoreOp::Store),
            AttachmentDesc::new(PixelFormat::R16G16B16A16_FLOAT, LoadOp::Load, StoreOp::Store),
        ],
        depth_attachment: Some(AttachmentDesc::new(PixelFormat::D32_FLOAT, LoadOp::Clear, StoreOp::DontCare)),
        name: "gbuffer".to_string(),
    };
    let pass = VulkanRenderPass::new(&desc);

    assert_eq!(
        pass.color_formats(),
        vec![vk::Format::B8G8R8A8_SRGB, vk::Format::R16G16B16A16_SFLOAT]
    );
    assert_eq!(pass.depth_format(), vk::Format::D32_SFLOAT);
    assert!(!pass.has_stencil);
    assert_eq!(pass.color_attachments[0].load_op, vk::AttachmentLoadOp::CLEAR);
    assert_eq!(pass.color_attachments[1].load_op, vk::AttachmentLoadOp::LOAD);
    assert_eq!(pass.depth_attachment.map(|d| d.store_op), Some(vk::AttachmentStoreOp::DONT_CARE));
}

#[test]
fn test_depth_only_pass() {
    let desc = RenderPassDesc {
        color_attachments: Vec::new(),
        depth_attachment: Some(
            AttachmentDesc::new(PixelFormat::D24_UNORM_S8_UINT, LoadOp::Clear, StoreOp::Store)
                .with_samples(4)
                .with_stencil_ops(LoadOp::Clear, StoreOp::DontCare),
        ),
        name: "shadow".to_string(),
    };
    let pass = VulkanRenderPass::new(&desc);

    assert!(pass.color_formats().is_empty());
    assert!(pass.has_stencil);
    assert_eq!(pass.samples(), vk::SampleCountFlags::TYPE_4);
    assert_eq!(pass.depth_attachment.map(|d| d.stencil_load_op), Some(vk::AttachmentLoadOp::CLEAR));
}

#[test]
fn test_no_depth_format_is_undefined() {
    let desc = RenderPassDesc {
        color_attachments: vec![AttachmentDesc::new(PixelFormat::R8G8B8A8_UNORM, LoadOp::DontCare, StoreOp::Store)],
        depth_attachment: None,
        name: String::new(),
    };
    let pass = VulkanRenderPass::new(&desc);
    assert_eq!(pass.depth_format(), vk::Format::UNDEFINED);
    assert_eq!(pass.samples(), vk::SampleCountFlags::TYPE_1);
}
