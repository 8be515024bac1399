/// Sampler object and sampler descriptor

use std::any::Any;
use crate::error::{Error, Result};

/// Texel filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Filter {
    Nearest,
    Linear,
}

/// Addressing outside [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressMode {
    Wrap,
    Mirror,
    Clamp,
    Border,
}

/// Comparison function (depth test, comparison samplers)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Never,
    Less,
    Equal,
    LessOrEqual,
    Greater,
    NotEqual,
    GreaterOrEqual,
    Always,
}

/// Border color for `AddressMode::Border`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BorderColor {
    TransparentBlack,
    OpaqueBlack,
    OpaqueWhite,
}

/// Descriptor for creating a sampler
#[derive(Debug, Clone, PartialEq)]
pub struct SamplerDesc {
    pub min_filter: Filter,
    pub mag_filter: Filter,
    pub mip_filter: Filter,
    pub address_u: AddressMode,
    pub address_v: AddressMode,
    pub address_w: AddressMode,
    pub mip_lod_bias: f32,
    /// 1 disables anisotropic filtering, up to 16
    pub max_anisotropy: u32,
    /// Comparison sampler when set
    pub compare: Option<CompareOp>,
    pub min_lod: f32,
    pub max_lod: f32,
    pub border_color: BorderColor,
}

impl Default for SamplerDesc {
    fn default() -> Self {
        Self::linear_wrap()
    }
}

impl SamplerDesc {
    /// Trilinear filtering, wrapping
    pub fn linear_wrap() -> Self {
        Self {
            min_filter: Filter::Linear,
            mag_filter: Filter::Linear,
            mip_filter: Filter::Linear,
            address_u: AddressMode::Wrap,
            address_v: AddressMode::Wrap,
            address_w: AddressMode::Wrap,
            mip_lod_bias: 0.0,
            max_anisotropy: 1,
            compare: None,
            min_lod: 0.0,
            max_lod: f32::MAX,
            border_color: BorderColor::OpaqueBlack,
        }
    }

    /// Trilinear filtering, clamped
    pub fn linear_clamp() -> Self {
        Self {
            address_u: AddressMode::Clamp,
            address_v: AddressMode::Clamp,
            address_w: AddressMode::Clamp,
            ..Self::linear_wrap()
        }
    }

    /// Point filtering, clamped
    pub fn point_clamp() -> Self {
        Self {
            min_filter: Filter::Nearest,
            mag_filter: Filter::Nearest,
            mip_filter: Filter::Nearest,
            ..Self::linear_clamp()
        }
    }

    /// Comparison sampler for shadow maps
    pub fn shadow() -> Self {
        Self {
            compare: Some(CompareOp::LessOrEqual),
            address_u: AddressMode::Border,
            address_v: AddressMode::Border,
            address_w: AddressMode::Border,
            border_color: BorderColor::OpaqueWhite,
            ..Self::linear_wrap()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(1..=16).contains(&self.max_anisotropy) {
            return Err(Error::InvalidResource(format!(
                "sampler max_anisotropy {} outside 1..=16",
                self.max_anisotropy
            )));
        }
        if self.min_lod.is_nan() || self.max_lod.is_nan() || self.min_lod > self.max_lod {
            return Err(Error::InvalidResource(format!(
                "sampler lod range {}..{} is invalid",
                self.min_lod, self.max_lod
            )));
        }
        Ok(())
    }
}

/// Backend part of a sampler
pub trait SamplerBackend: Send + Sync {
    fn as_any(&self) -> &dyn Any;
}

/// Sampler object
pub struct Sampler {
    desc: SamplerDesc,
    backend: Box<dyn SamplerBackend>,
}

impl Sampler {
    pub(crate) fn new(desc: SamplerDesc, backend: Box<dyn SamplerBackend>) -> Self {
        Self { desc, backend }
    }

    pub fn desc(&self) -> &SamplerDesc {
        &self.desc
    }

    /// Downcast the backend part to its concrete type
    pub fn backend_as<T: 'static>(&self) -> Option<&T> {
        self.backend.as_any().downcast_ref::<T>()
    }
}

#[cfg(test)]
#[path = "sampler_tests.rs"]
mod tests;
