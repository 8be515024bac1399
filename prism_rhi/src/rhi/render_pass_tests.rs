//! Unit tests for render_pass.rs

use super::*;

fn color(format: PixelFormat) -> AttachmentDesc {
    AttachmentDesc::new(format, LoadOp::Clear, StoreOp::Store)
}

fn depth() -> AttachmentDesc {
    AttachmentDesc::new(PixelFormat::D32_FLOAT, LoadOp::Clear, StoreOp::DontCare)
}

#[test]
fn test_color_and_depth_pass_is_valid() {
    let desc = RenderPassDesc {
        color_attachments: vec![color(PixelFormat::B8G8R8A8_UNORM)],
        depth_attachment: Some(depth()),
        name: "main".to_string(),
    };
    assert!(desc.validate().is_ok());
    assert_eq!(desc.sample_count(), 1);
}

#[test]
fn test_empty_pass_rejected() {
    assert!(RenderPassDesc::default().validate().is_err());
}

#[test]
fn test_depth_only_pass_is_valid() {
    let desc = RenderPassDesc {
        depth_attachment: Some(depth()),
        ..Default::default()
    };
    assert!(desc.validate().is_ok());
}

#[test]
fn test_too_many_color_attachments() {
    let desc = RenderPassDesc {
        color_attachments: vec![color(PixelFormat::R8G8B8A8_UNORM); MAX_COLOR_ATTACHMENTS + 1],
        ..Default::default()
    };
    assert!(desc.validate().is_err());
}

#[test]
fn test_attachment_formats_checked() {
    let desc = RenderPassDesc {
        color_attachments: vec![color(PixelFormat::D32_FLOAT)],
        ..Default::default()
    };
    assert!(desc.validate().is_err());

    let desc = RenderPassDesc {
        color_attachments: vec![color(PixelFormat::R8G8B8A8_UNORM)],
        depth_attachment: Some(color(PixelFormat::R8G8B8A8_UNORM)),
        ..Default::default()
    };
    assert!(desc.validate().is_err());
}

#[test]
fn test_sample_counts_must_agree() {
    let desc = RenderPassDesc {
        color_attachments: vec![color(PixelFormat::R8G8B8A8_UNORM).with_samples(4)],
        depth_attachment: Some(depth()),
        ..Default::default()
    };
    assert!(desc.validate().is_err());

    let desc = RenderPassDesc {
        color_attachments: vec![color(PixelFormat::R8G8B8A8_UNORM).with_samples(4)],
        depth_attachment: Some(depth().with_samples(4)),
        ..Default::default()
    };
    assert!(desc.validate().is_ok());
    assert_eq!(desc.sample_count(), 4);
}
