/// Descriptor heap: fixed-capacity arena of binding slots
///
/// Slot IDs are handed out in strictly increasing order by `issue_id` under
/// one coarse lock. Running past the capacity is a configuration error, never
/// a silent wrap. `reset_id` starts over from slot 0 and is only legal once
/// every view issued from the heap has been dropped.

use std::any::Any;
use std::sync::{Mutex, MutexGuard};
use crate::error::{Error, Result};
use crate::rhi::{Buffer, Sampler, Texture, ViewKind};
use crate::{engine_debug, engine_error};

/// Kind of descriptors a heap stores
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorHeapType {
    RenderTarget,
    DepthStencil,
    /// Constant buffer, shader resource and unordered access views
    CbvSrvUav,
    Sampler,
}

impl DescriptorHeapType {
    /// Heap type that stores views of `kind`
    pub fn for_view(kind: ViewKind) -> Self {
        match kind {
            ViewKind::RenderTarget => DescriptorHeapType::RenderTarget,
            ViewKind::DepthStencil => DescriptorHeapType::DepthStencil,
            ViewKind::ConstantBuffer | ViewKind::ShaderResource | ViewKind::UnorderedAccess => {
                DescriptorHeapType::CbvSrvUav
            }
            ViewKind::Sampler => DescriptorHeapType::Sampler,
        }
    }

    /// Only CBV/SRV/UAV and sampler heaps can be shader visible
    pub fn can_be_shader_visible(self) -> bool {
        matches!(self, DescriptorHeapType::CbvSrvUav | DescriptorHeapType::Sampler)
    }
}

/// Descriptor for creating a descriptor heap
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptorHeapDesc {
    pub heap_type: DescriptorHeapType,
    pub capacity: u32,
    pub shader_visible: bool,
    pub name: String,
}

impl DescriptorHeapDesc {
    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(Error::InvalidResource(format!(
                "descriptor heap '{}' has zero capacity",
                self.name
            )));
        }
        if self.shader_visible && !self.heap_type.can_be_shader_visible() {
            return Err(Error::InvalidResource(format!(
                "{:?} heap '{}' cannot be shader visible",
                self.heap_type, self.name
            )));
        }
        Ok(())
    }
}

/// CPU descriptor handle (address of a slot for view creation)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CpuDescriptorHandle(pub u64);

/// GPU descriptor handle (address of a slot for binding)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GpuDescriptorHandle(pub u64);

/// Content written into a slot
pub enum ViewWrite<'a> {
    Texture { kind: ViewKind, texture: &'a Texture },
    Buffer { kind: ViewKind, buffer: &'a Buffer },
    Sampler { sampler: &'a Sampler },
}

impl ViewWrite<'_> {
    pub fn kind(&self) -> ViewKind {
        match self {
            ViewWrite::Texture { kind, .. } | ViewWrite::Buffer { kind, .. } => *kind,
            ViewWrite::Sampler { .. } => ViewKind::Sampler,
        }
    }
}

/// Backend part of a descriptor heap
pub trait DescriptorHeapBackend: Send + Sync {
    fn as_any(&self) -> &dyn Any;

    /// Distance in bytes between two consecutive slots
    fn descriptor_size(&self) -> u32;

    /// CPU address of slot 0
    fn cpu_base(&self) -> u64;

    /// GPU address of slot 0 (shader visible heaps only)
    fn gpu_base(&self) -> Option<u64>;

    /// Write a view into `slot`, replacing its previous content
    fn write_view(&self, slot: u32, write: &ViewWrite<'_>) -> Result<()>;

    /// Release whatever `slot` holds
    fn clear_slot(&self, slot: u32);
}

struct SlotState {
    next_id: u32,
    live_views: u32,
}

/// Fixed-capacity descriptor arena
pub struct DescriptorHeap {
    desc: DescriptorHeapDesc,
    descriptor_size: u32,
    slots: Mutex<SlotState>,
    backend: Box<dyn DescriptorHeapBackend>,
}

impl DescriptorHeap {
    pub(crate) fn new(desc: DescriptorHeapDesc, backend: Box<dyn DescriptorHeapBackend>) -> Self {
        let descriptor_size = backend.descriptor_size();
        engine_debug!("prism::DescriptorHeap", "Created {:?} heap '{}' ({} slots, {} bytes each)",
            desc.heap_type, desc.name, desc.capacity, descriptor_size);
        Self {
            desc,
            descriptor_size,
            slots: Mutex::new(SlotState { next_id: 0, live_views: 0 }),
            backend,
        }
    }

    fn lock(&self) -> MutexGuard<'_, SlotState> {
        match self.slots.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn desc(&self) -> &DescriptorHeapDesc {
        &self.desc
    }

    pub fn heap_type(&self) -> DescriptorHeapType {
        self.desc.heap_type
    }

    pub fn capacity(&self) -> u32 {
        self.desc.capacity
    }

    pub fn is_shader_visible(&self) -> bool {
        self.desc.shader_visible
    }

    pub fn descriptor_size(&self) -> u32 {
        self.descriptor_size
    }

    /// Number of slot IDs handed out since creation or the last reset
    pub fn issued_count(&self) -> u32 {
        self.lock().next_id
    }

    /// Number of views currently referencing this heap
    pub fn live_views(&self) -> u32 {
        self.lock().live_views
    }

    /// Hand out the next slot ID
    ///
    /// # Errors
    ///
    /// * `DescriptorHeapOverflow` once `capacity` IDs have been issued
    pub fn issue_id(&self) -> Result<u32> {
        let mut slots = self.lock();
        let id = self.check_free(&slots)?;
        slots.next_id += 1;
        Ok(id)
    }

    fn check_free(&self, slots: &SlotState) -> Result<u32> {
        if slots.next_id >= self.desc.capacity {
            engine_error!("prism::DescriptorHeap", "Heap '{}' overflow: all {} slots are issued",
                self.desc.name, self.desc.capacity);
            return Err(Error::DescriptorHeapOverflow {
                heap: self.desc.name.clone(),
                capacity: self.desc.capacity,
            });
        }
        Ok(slots.next_id)
    }

    /// Restart slot issuing from 0
    ///
    /// # Errors
    ///
    /// * `InvalidState` while views issued from this heap are still alive
    pub fn reset_id(&self) -> Result<()> {
        let mut slots = self.lock();
        if slots.live_views > 0 {
            engine_error!("prism::DescriptorHeap", "Heap '{}' reset with {} live views",
                self.desc.name, slots.live_views);
            return Err(Error::InvalidState(format!(
                "descriptor heap '{}' still has {} live views",
                self.desc.name, slots.live_views
            )));
        }
        slots.next_id = 0;
        Ok(())
    }

    fn check_offset(&self, offset: u32) -> Result<()> {
        if offset >= self.desc.capacity {
            engine_error!("prism::DescriptorHeap", "Heap '{}': handle offset {} >= capacity {}",
                self.desc.name, offset, self.desc.capacity);
            return Err(Error::DescriptorHandleOutOfRange {
                offset,
                capacity: self.desc.capacity,
            });
        }
        Ok(())
    }

    /// `cpu_base + offset * descriptor_size`
    pub fn cpu_handle(&self, offset: u32) -> Result<CpuDescriptorHandle> {
        self.check_offset(offset)?;
        Ok(CpuDescriptorHandle(
            self.backend.cpu_base() + offset as u64 * self.descriptor_size as u64,
        ))
    }

    /// `gpu_base + offset * descriptor_size`
    ///
    /// # Errors
    ///
    /// * `DescriptorHandleOutOfRange` for an offset past the capacity
    /// * `InvalidState` for heaps that are not shader visible
    pub fn gpu_handle(&self, offset: u32) -> Result<GpuDescriptorHandle> {
        self.check_offset(offset)?;
        match self.backend.gpu_base() {
            Some(base) if self.desc.shader_visible => Ok(GpuDescriptorHandle(
                base + offset as u64 * self.descriptor_size as u64,
            )),
            _ => Err(Error::InvalidState(format!(
                "descriptor heap '{}' is not shader visible",
                self.desc.name
            ))),
        }
    }

    pub(crate) fn write_view(&self, slot: u32, write: &ViewWrite<'_>) -> Result<()> {
        self.check_offset(slot)?;
        self.backend.write_view(slot, write)
    }

    /// Write a new view into the next slot
    ///
    /// The slot is only issued, and counted as live, once the backend write
    /// succeeded.
    pub(crate) fn issue_view(&self, write: &ViewWrite<'_>) -> Result<u32> {
        let mut slots = self.lock();
        let slot = self.check_free(&slots)?;
        self.backend.write_view(slot, write)?;
        slots.next_id += 1;
        slots.live_views += 1;
        Ok(slot)
    }

    pub(crate) fn release_view(&self, slot: u32) {
        self.backend.clear_slot(slot);
        let mut slots = self.lock();
        slots.live_views = slots.live_views.saturating_sub(1);
    }

    pub fn backend(&self) -> &dyn DescriptorHeapBackend {
        self.backend.as_ref()
    }

    /// Downcast the backend part to its concrete type
    pub fn backend_as<T: 'static>(&self) -> Option<&T> {
        self.backend.as_any().downcast_ref::<T>()
    }
}

impl std::fmt::Debug for DescriptorHeap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DescriptorHeap")
            .field("desc", &self.desc)
            .field("issued", &self.issued_count())
            .field("live_views", &self.live_views())
            .finish()
    }
}

#[cfg(test)]
#[path = "descriptor_heap_tests.rs"]
mod tests;
