/// ResourceView: typed binding record living in one descriptor heap slot
///
/// A view never owns its resource. It keeps a weak reference to whatever
/// it currently points at and can be re-pointed (`set_texture`, `set_buffer`)
/// without issuing a new slot.

use std::sync::{Arc, Mutex, MutexGuard, Weak};
use crate::error::{Error, Result};
use crate::rhi::{
    Buffer, BufferUsage, DescriptorHeap, DescriptorHeapType, Sampler, Texture,
    TextureDimension, TextureUsage, ViewWrite,
};
use crate::engine_error;

/// Kind of binding record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewKind {
    ShaderResource,
    UnorderedAccess,
    RenderTarget,
    DepthStencil,
    ConstantBuffer,
    Sampler,
}

/// Resource a view is created for
#[derive(Clone, Copy)]
pub enum ViewResource<'a> {
    Texture(&'a Arc<Texture>),
    Buffer(&'a Arc<Buffer>),
}

impl<'a> From<&'a Arc<Texture>> for ViewResource<'a> {
    fn from(texture: &'a Arc<Texture>) -> Self {
        ViewResource::Texture(texture)
    }
}

impl<'a> From<&'a Arc<Buffer>> for ViewResource<'a> {
    fn from(buffer: &'a Arc<Buffer>) -> Self {
        ViewResource::Buffer(buffer)
    }
}

enum ViewTarget {
    Texture(Weak<Texture>),
    Buffer(Weak<Buffer>),
    Sampler(Weak<Sampler>),
}

/// Check that `texture` can be viewed as `kind`
pub(crate) fn check_texture_view(kind: ViewKind, texture: &Texture) -> Result<()> {
    let usage = texture.usage();
    let ok = match kind {
        ViewKind::ShaderResource => usage.contains(TextureUsage::SHADER_RESOURCE),
        ViewKind::UnorderedAccess => usage.contains(TextureUsage::UNORDERED_ACCESS),
        ViewKind::RenderTarget => {
            usage.contains(TextureUsage::RENDER_TARGET)
                && texture.desc().dimension == TextureDimension::Texture2D
        }
        ViewKind::DepthStencil => usage.contains(TextureUsage::DEPTH_STENCIL),
        ViewKind::ConstantBuffer | ViewKind::Sampler => false,
    };
    if ok {
        Ok(())
    } else {
        Err(Error::InvalidResource(format!(
            "texture '{}' (usage {:?}, {:?}) cannot back a {:?} view",
            texture.name(),
            usage,
            texture.desc().dimension,
            kind
        )))
    }
}

/// Check that `buffer` can be viewed as `kind`
pub(crate) fn check_buffer_view(kind: ViewKind, buffer: &Buffer) -> Result<()> {
    let usage = buffer.usage();
    let ok = match kind {
        ViewKind::ConstantBuffer => usage.contains(BufferUsage::CONSTANT),
        ViewKind::ShaderResource => usage.contains(BufferUsage::SHADER_RESOURCE),
        ViewKind::UnorderedAccess => usage.contains(BufferUsage::UNORDERED_ACCESS),
        ViewKind::RenderTarget | ViewKind::DepthStencil | ViewKind::Sampler => false,
    };
    if ok {
        Ok(())
    } else {
        Err(Error::InvalidResource(format!(
            "buffer '{}' (usage {:?}) cannot back a {:?} view",
            buffer.name(),
            usage,
            kind
        )))
    }
}

/// Typed view in a descriptor heap slot
pub struct ResourceView {
    kind: ViewKind,
    heap: Arc<DescriptorHeap>,
    slot: u32,
    target: Mutex<ViewTarget>,
}

impl ResourceView {
    fn check_heap(kind: ViewKind, heap: &DescriptorHeap) -> Result<()> {
        let expected = DescriptorHeapType::for_view(kind);
        if heap.heap_type() != expected {
            return Err(Error::InvalidResource(format!(
                "{:?} views live in {:?} heaps, not in '{}' ({:?})",
                kind,
                expected,
                heap.desc().name,
                heap.heap_type()
            )));
        }
        Ok(())
    }

    /// Issue a slot in `heap` and write the view into it
    fn create(heap: &Arc<DescriptorHeap>, kind: ViewKind, write: &ViewWrite<'_>, target: ViewTarget) -> Result<Self> {
        Self::check_heap(kind, heap)?;
        let slot = heap.issue_view(write)?;
        Ok(Self {
            kind,
            heap: Arc::clone(heap),
            slot,
            target: Mutex::new(target),
        })
    }

    pub(crate) fn for_texture(heap: &Arc<DescriptorHeap>, kind: ViewKind, texture: &Arc<Texture>) -> Result<Self> {
        check_texture_view(kind, texture).inspect_err(|e| {
            engine_error!("prism::ResourceView", "{}", e);
        })?;
        Self::create(
            heap,
            kind,
            &ViewWrite::Texture { kind, texture },
            ViewTarget::Texture(Arc::downgrade(texture)),
        )
    }

    pub(crate) fn for_buffer(heap: &Arc<DescriptorHeap>, kind: ViewKind, buffer: &Arc<Buffer>) -> Result<Self> {
        check_buffer_view(kind, buffer).inspect_err(|e| {
            engine_error!("prism::ResourceView", "{}", e);
        })?;
        Self::create(
            heap,
            kind,
            &ViewWrite::Buffer { kind, buffer },
            ViewTarget::Buffer(Arc::downgrade(buffer)),
        )
    }

    pub(crate) fn for_sampler(heap: &Arc<DescriptorHeap>, sampler: &Arc<Sampler>) -> Result<Self> {
        Self::create(
            heap,
            ViewKind::Sampler,
            &ViewWrite::Sampler { sampler },
            ViewTarget::Sampler(Arc::downgrade(sampler)),
        )
    }

    fn target(&self) -> MutexGuard<'_, ViewTarget> {
        match self.target.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn kind(&self) -> ViewKind {
        self.kind
    }

    pub fn heap(&self) -> &Arc<DescriptorHeap> {
        &self.heap
    }

    /// Slot index inside the heap
    pub fn slot(&self) -> u32 {
        self.slot
    }

    /// Re-point the view at another texture, reusing the same slot
    pub fn set_texture(&self, texture: &Arc<Texture>) -> Result<()> {
        check_texture_view(self.kind, texture).inspect_err(|e| {
            engine_error!("prism::ResourceView", "{}", e);
        })?;
        let mut target = self.target();
        self.heap.write_view(self.slot, &ViewWrite::Texture { kind: self.kind, texture })?;
        *target = ViewTarget::Texture(Arc::downgrade(texture));
        Ok(())
    }

    /// Re-point the view at another buffer, reusing the same slot
    pub fn set_buffer(&self, buffer: &Arc<Buffer>) -> Result<()> {
        check_buffer_view(self.kind, buffer).inspect_err(|e| {
            engine_error!("prism::ResourceView", "{}", e);
        })?;
        let mut target = self.target();
        self.heap.write_view(self.slot, &ViewWrite::Buffer { kind: self.kind, buffer })?;
        *target = ViewTarget::Buffer(Arc::downgrade(buffer));
        Ok(())
    }

    /// Texture currently pointed at, if it is still alive
    pub fn texture(&self) -> Option<Arc<Texture>> {
        match &*self.target() {
            ViewTarget::Texture(weak) => weak.upgrade(),
            _ => None,
        }
    }

    /// Buffer currently pointed at, if it is still alive
    pub fn buffer(&self) -> Option<Arc<Buffer>> {
        match &*self.target() {
            ViewTarget::Buffer(weak) => weak.upgrade(),
            _ => None,
        }
    }

    /// Sampler currently pointed at, if it is still alive
    pub fn sampler(&self) -> Option<Arc<Sampler>> {
        match &*self.target() {
            ViewTarget::Sampler(weak) => weak.upgrade(),
            _ => None,
        }
    }

    /// True for views created on a buffer
    pub fn is_buffer_view(&self) -> bool {
        matches!(&*self.target(), ViewTarget::Buffer(_))
    }

    /// True while the viewed resource is alive
    pub fn is_valid(&self) -> bool {
        match &*self.target() {
            ViewTarget::Texture(weak) => weak.strong_count() > 0,
            ViewTarget::Buffer(weak) => weak.strong_count() > 0,
            ViewTarget::Sampler(weak) => weak.strong_count() > 0,
        }
    }
}

/// One heap per descriptor heap type, the place views get their slots from
///
/// The device owns the default set. A caller that rebuilds a group of views
/// wholesale (the swapchain frame buffers on resize) can use its own set and
/// `reset_id` it once every view in it is gone.
#[derive(Debug, Clone)]
pub struct ViewHeaps {
    pub render_target: Arc<DescriptorHeap>,
    pub depth_stencil: Arc<DescriptorHeap>,
    pub cbv_srv_uav: Arc<DescriptorHeap>,
    pub sampler: Arc<DescriptorHeap>,
}

impl ViewHeaps {
    /// Heap that holds views of `kind`
    pub fn for_kind(&self, kind: ViewKind) -> &Arc<DescriptorHeap> {
        match DescriptorHeapType::for_view(kind) {
            DescriptorHeapType::RenderTarget => &self.render_target,
            DescriptorHeapType::DepthStencil => &self.depth_stencil,
            DescriptorHeapType::CbvSrvUav => &self.cbv_srv_uav,
            DescriptorHeapType::Sampler => &self.sampler,
        }
    }

    /// Texture view of `kind` in the matching heap
    pub fn texture_view(&self, kind: ViewKind, texture: &Arc<Texture>) -> Result<ResourceView> {
        ResourceView::for_texture(self.for_kind(kind), kind, texture)
    }

    /// Buffer view of `kind` in the matching heap
    pub fn buffer_view(&self, kind: ViewKind, buffer: &Arc<Buffer>) -> Result<ResourceView> {
        ResourceView::for_buffer(self.for_kind(kind), kind, buffer)
    }

    pub fn sampler_view(&self, sampler: &Arc<Sampler>) -> Result<ResourceView> {
        ResourceView::for_sampler(&self.sampler, sampler)
    }

    /// Heaps a command list binds for shader access
    pub fn shader_visible(&self) -> [&DescriptorHeap; 2] {
        [&self.cbv_srv_uav, &self.sampler]
    }
}

impl Drop for ResourceView {
    fn drop(&mut self) {
        self.heap.release_view(self.slot);
    }
}

impl std::fmt::Debug for ResourceView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceView")
            .field("kind", &self.kind)
            .field("heap", &self.heap.desc().name)
            .field("slot", &self.slot)
            .field("valid", &self.is_valid())
            .finish()
    }
}

#[cfg(test)]
#[path = "resource_view_tests.rs"]
mod tests;
