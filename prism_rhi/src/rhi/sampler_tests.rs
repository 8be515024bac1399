//! Unit tests for sampler.rs

use super::*;

#[test]
fn test_presets_are_valid() {
    for desc in [
        SamplerDesc::linear_wrap(),
        SamplerDesc::linear_clamp(),
        SamplerDesc::point_clamp(),
        SamplerDesc::shadow(),
    ] {
        assert!(desc.validate().is_ok(), "{:?}", desc);
    }
}

#[test]
fn test_point_clamp_preset() {
    let desc = SamplerDesc::point_clamp();
    assert_eq!(desc.min_filter, Filter::Nearest);
    assert_eq!(desc.address_v, AddressMode::Clamp);
    assert!(desc.compare.is_none());
}

#[test]
fn test_shadow_preset_compares() {
    assert_eq!(SamplerDesc::shadow().compare, Some(CompareOp::LessOrEqual));
}

#[test]
fn test_anisotropy_range() {
    let desc = SamplerDesc { max_anisotropy: 0, ..Default::default() };
    assert!(desc.validate().is_err());
    let desc = SamplerDesc { max_anisotropy: 17, ..Default::default() };
    assert!(desc.validate().is_err());
    let desc = SamplerDesc { max_anisotropy: 16, ..Default::default() };
    assert!(desc.validate().is_ok());
}

#[test]
fn test_lod_range() {
    let desc = SamplerDesc { min_lod: 4.0, max_lod: 2.0, ..Default::default() };
    assert!(matches!(desc.validate(), Err(Error::InvalidResource(_))));
}
