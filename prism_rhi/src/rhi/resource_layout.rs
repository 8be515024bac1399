/// ResourceLayout - binding schema shared by pipelines and command lists
///
/// Each element is one binding slot (one descriptor) addressed by its index
/// in `ResourceLayoutDesc::elements`. DirectX 12 turns every element into a
/// root descriptor table, Vulkan into one binding of a push-descriptor set.

use std::any::Any;
use crate::error::{Error, Result};
use crate::rhi::{SamplerDesc, ViewKind};
use crate::engine_error;

/// Kind of descriptor an element expects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorKind {
    ConstantBuffer,
    ShaderResource,
    UnorderedAccess,
    Sampler,
}

impl DescriptorKind {
    /// View kind that can be bound to an element of this kind
    pub fn view_kind(self) -> ViewKind {
        match self {
            DescriptorKind::ConstantBuffer => ViewKind::ConstantBuffer,
            DescriptorKind::ShaderResource => ViewKind::ShaderResource,
            DescriptorKind::UnorderedAccess => ViewKind::UnorderedAccess,
            DescriptorKind::Sampler => ViewKind::Sampler,
        }
    }
}

/// Resource behind a shader resource / unordered access element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BoundResource {
    Texture,
    Buffer,
    /// Constant buffers and samplers
    Other,
}

/// Shader stages that can see an element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderVisibility {
    All,
    Vertex,
    Pixel,
    Compute,
}

/// One binding slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceLayoutElement {
    pub kind: DescriptorKind,
    pub resource: BoundResource,
    /// Shader register (b#, t#, u#, s#)
    pub register: u32,
    pub space: u32,
    pub visibility: ShaderVisibility,
}

impl ResourceLayoutElement {
    fn new(kind: DescriptorKind, resource: BoundResource, register: u32) -> Self {
        Self {
            kind,
            resource,
            register,
            space: 0,
            visibility: ShaderVisibility::All,
        }
    }

    /// Constant buffer at `b{register}`
    pub fn constant_buffer(register: u32) -> Self {
        Self::new(DescriptorKind::ConstantBuffer, BoundResource::Other, register)
    }

    /// Sampled texture at `t{register}`
    pub fn texture(register: u32) -> Self {
        Self::new(DescriptorKind::ShaderResource, BoundResource::Texture, register)
    }

    /// Read-only structured buffer at `t{register}`
    pub fn structured_buffer(register: u32) -> Self {
        Self::new(DescriptorKind::ShaderResource, BoundResource::Buffer, register)
    }

    /// Read/write texture at `u{register}`
    pub fn storage_texture(register: u32) -> Self {
        Self::new(DescriptorKind::UnorderedAccess, BoundResource::Texture, register)
    }

    /// Read/write structured buffer at `u{register}`
    pub fn storage_buffer(register: u32) -> Self {
        Self::new(DescriptorKind::UnorderedAccess, BoundResource::Buffer, register)
    }

    /// Sampler at `s{register}`
    pub fn sampler(register: u32) -> Self {
        Self::new(DescriptorKind::Sampler, BoundResource::Other, register)
    }

    pub fn with_space(mut self, space: u32) -> Self {
        self.space = space;
        self
    }

    pub fn with_visibility(mut self, visibility: ShaderVisibility) -> Self {
        self.visibility = visibility;
        self
    }
}

/// Sampler baked into the layout
#[derive(Debug, Clone, PartialEq)]
pub struct StaticSamplerDesc {
    pub register: u32,
    pub space: u32,
    pub visibility: ShaderVisibility,
    pub sampler: SamplerDesc,
}

/// Descriptor for creating a resource layout
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResourceLayoutDesc {
    pub elements: Vec<ResourceLayoutElement>,
    pub static_samplers: Vec<StaticSamplerDesc>,
    pub name: String,
}

impl ResourceLayoutDesc {
    /// Reject duplicate (kind, register, space) triples and invalid static samplers
    pub fn validate(&self) -> Result<()> {
        let mut seen = rustc_hash::FxHashSet::default();
        for element in &self.elements {
            let consistent = match element.kind {
                DescriptorKind::ShaderResource | DescriptorKind::UnorderedAccess => {
                    element.resource != BoundResource::Other
                }
                DescriptorKind::ConstantBuffer | DescriptorKind::Sampler => {
                    element.resource == BoundResource::Other
                }
            };
            if !consistent {
                return Err(Error::InvalidResource(format!(
                    "resource layout '{}': {:?} element cannot bind a {:?}",
                    self.name, element.kind, element.resource
                )));
            }
            if !seen.insert((element.kind, element.register, element.space)) {
                engine_error!("prism::ResourceLayout", "Layout '{}': register {} space {} declared twice for {:?}",
                    self.name, element.register, element.space, element.kind);
                return Err(Error::InvalidResource(format!(
                    "resource layout '{}': duplicate {:?} register {} space {}",
                    self.name, element.kind, element.register, element.space
                )));
            }
        }
        for sampler in &self.static_samplers {
            if !seen.insert((DescriptorKind::Sampler, sampler.register, sampler.space)) {
                return Err(Error::InvalidResource(format!(
                    "resource layout '{}': static sampler register {} space {} already used",
                    self.name, sampler.register, sampler.space
                )));
            }
            sampler.sampler.validate()?;
        }
        Ok(())
    }
}

/// Backend part of a resource layout (root signature, pipeline layout)
pub trait ResourceLayoutBackend: Send + Sync {
    fn as_any(&self) -> &dyn Any;
}

/// Binding schema object
pub struct ResourceLayout {
    desc: ResourceLayoutDesc,
    backend: Box<dyn ResourceLayoutBackend>,
}

impl ResourceLayout {
    pub(crate) fn new(desc: ResourceLayoutDesc, backend: Box<dyn ResourceLayoutBackend>) -> Self {
        Self { desc, backend }
    }

    pub fn desc(&self) -> &ResourceLayoutDesc {
        &self.desc
    }

    pub fn element(&self, index: u32) -> Option<&ResourceLayoutElement> {
        self.desc.elements.get(index as usize)
    }

    pub fn element_count(&self) -> u32 {
        self.desc.elements.len() as u32
    }

    /// Downcast the backend part to its concrete type
    pub fn backend_as<T: 'static>(&self) -> Option<&T> {
        self.backend.as_any().downcast_ref::<T>()
    }
}

impl std::fmt::Debug for ResourceLayout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceLayout").field("desc", &self.desc).finish()
    }
}

#[cfg(test)]
#[path = "resource_layout_tests.rs"]
mod tests;
