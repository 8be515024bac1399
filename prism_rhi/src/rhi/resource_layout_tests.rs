//! Unit tests for resource_layout.rs

use super::*;

#[test]
fn test_element_factories() {
    let cb = ResourceLayoutElement::constant_buffer(0);
    assert_eq!(cb.kind, DescriptorKind::ConstantBuffer);
    assert_eq!(cb.resource, BoundResource::Other);

    let tex = ResourceLayoutElement::texture(3)
        .with_space(1)
        .with_visibility(ShaderVisibility::Pixel);
    assert_eq!(tex.kind, DescriptorKind::ShaderResource);
    assert_eq!(tex.resource, BoundResource::Texture);
    assert_eq!(tex.register, 3);
    assert_eq!(tex.space, 1);
    assert_eq!(tex.visibility, ShaderVisibility::Pixel);

    assert_eq!(ResourceLayoutElement::storage_buffer(0).resource, BoundResource::Buffer);
}

#[test]
fn test_view_kind_mapping() {
    assert_eq!(DescriptorKind::ConstantBuffer.view_kind(), ViewKind::ConstantBuffer);
    assert_eq!(DescriptorKind::UnorderedAccess.view_kind(), ViewKind::UnorderedAccess);
    assert_eq!(DescriptorKind::Sampler.view_kind(), ViewKind::Sampler);
}

#[test]
fn test_same_register_different_kinds_allowed() {
    let desc = ResourceLayoutDesc {
        elements: vec![
            ResourceLayoutElement::constant_buffer(0),
            ResourceLayoutElement::texture(0),
            ResourceLayoutElement::sampler(0),
        ],
        ..Default::default()
    };
    assert!(desc.validate().is_ok());
}

#[test]
fn test_duplicate_triple_rejected() {
    let desc = ResourceLayoutDesc {
        elements: vec![
            ResourceLayoutElement::texture(2),
            ResourceLayoutElement::structured_buffer(2),
        ],
        name: "dup".to_string(),
        ..Default::default()
    };
    assert!(matches!(desc.validate(), Err(Error::InvalidResource(_))));
}

#[test]
fn test_same_register_other_space_allowed() {
    let desc = ResourceLayoutDesc {
        elements: vec![
            ResourceLayoutElement::texture(2),
            ResourceLayoutElement::texture(2).with_space(1),
        ],
        ..Default::default()
    };
    assert!(desc.validate().is_ok());
}

#[test]
fn test_static_sampler_conflicts_with_sampler_element() {
    let desc = ResourceLayoutDesc {
        elements: vec![ResourceLayoutElement::sampler(0)],
        static_samplers: vec![StaticSamplerDesc {
            register: 0,
            space: 0,
            visibility: ShaderVisibility::Pixel,
            sampler: SamplerDesc::linear_clamp(),
        }],
        ..Default::default()
    };
    assert!(desc.validate().is_err());
}

#[test]
fn test_inconsistent_element_rejected() {
    let mut element = ResourceLayoutElement::texture(0);
    element.kind = DescriptorKind::ConstantBuffer;
    let desc = ResourceLayoutDesc {
        elements: vec![element],
        ..Default::default()
    };
    assert!(desc.validate().is_err());
}
