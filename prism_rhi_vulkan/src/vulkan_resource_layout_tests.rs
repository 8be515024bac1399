//! Unit tests for push-descriptor binding assignment

use super::*;
use prism_rhi::prism::rhi::{ResourceLayoutElement, SamplerDesc, ShaderVisibility, StaticSamplerDesc};

#[test]
fn test_elements_bind_in_order() {
    let desc = ResourceLayoutDesc {
        elements: vec![
            ResourceLayoutElement::constant_buffer(0).with_visibility(ShaderVisibility::Vertex),
            ResourceLayoutElement::texture(0).with_visibility(ShaderVisibility::Pixel),
            ResourceLayoutElement::sampler(0).with_visibility(ShaderVisibility::Pixel),
        ],
        static_samplers: Vec::new(),
        name: "material".to_string(),
    };
    assert_eq!(
        layout_bindings(&desc),
        vec![
            (0, vk::DescriptorType::UNIFORM_BUFFER, vk::ShaderStageFlags::VERTEX),
            (1, vk::DescriptorType::SAMPLED_IMAGE, vk::ShaderStageFlags::FRAGMENT),
            (2, vk::DescriptorType::SAMPLER, vk::ShaderStageFlags::FRAGMENT),
        ]
    );
}

#[test]
fn test_static_samplers_follow_elements() {
    let desc = ResourceLayoutDesc {
        elements: vec![ResourceLayoutElement::storage_buffer(0).with_space(3)],
        static_samplers: vec![StaticSamplerDesc {
            register: 0,
            space: 0,
            visibility: ShaderVisibility::All,
            sampler: SamplerDesc::linear_clamp(),
        }],
        name: String::new(),
    };
    assert_eq!(
        layout_bindings(&desc),
        vec![
            (0, vk::DescriptorType::STORAGE_BUFFER, vk::ShaderStageFlags::ALL),
            (1, vk::DescriptorType::SAMPLER, vk::ShaderStageFlags::ALL),
        ]
    );
}

#[test]
fn test_empty_layout_has_no_bindings() {
    assert!(layout_bindings(&ResourceLayoutDesc::default()).is_empty());
}
