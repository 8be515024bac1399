/// Buffer resource, buffer descriptor and scoped CPU mapping

use std::any::Any;
use std::ptr::NonNull;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use bytemuck::Pod;
use crate::error::{Error, Result};
use crate::rhi::{BufferUsage, MemoryHeap, ResourceState, check_buffer_state};
use crate::engine_error;

/// Constant buffers are placed on this boundary (bytes)
pub const CONSTANT_BUFFER_ALIGNMENT: u64 = 256;

/// Descriptor for creating a buffer
#[derive(Debug, Clone, PartialEq)]
pub struct BufferDesc {
    /// Size of one element in bytes
    pub stride: u64,
    /// Number of elements
    pub count: u64,
    pub usage: BufferUsage,
    pub heap: MemoryHeap,
    pub name: String,
}

impl BufferDesc {
    /// GPU-only vertex buffer
    pub fn vertex(stride: u64, count: u64) -> Self {
        Self {
            stride,
            count,
            usage: BufferUsage::VERTEX,
            heap: MemoryHeap::Default,
            name: String::new(),
        }
    }

    /// GPU-only index buffer (stride 2 or 4)
    pub fn index(stride: u64, count: u64) -> Self {
        Self {
            usage: BufferUsage::INDEX,
            ..Self::vertex(stride, count)
        }
    }

    /// CPU-written constant buffer, stride rounded up to 256 bytes
    pub fn constant(stride: u64, count: u64) -> Self {
        let aligned = stride.div_ceil(CONSTANT_BUFFER_ALIGNMENT) * CONSTANT_BUFFER_ALIGNMENT;
        Self {
            stride: aligned,
            count,
            usage: BufferUsage::CONSTANT,
            heap: MemoryHeap::Upload,
            name: String::new(),
        }
    }

    /// GPU-only structured buffer readable and writable in shaders
    pub fn structured(stride: u64, count: u64) -> Self {
        Self {
            usage: BufferUsage::SHADER_RESOURCE | BufferUsage::UNORDERED_ACCESS,
            ..Self::vertex(stride, count)
        }
    }

    /// Staging buffer for CPU to GPU copies
    pub fn upload(size: u64) -> Self {
        Self {
            stride: 1,
            count: size,
            usage: BufferUsage::empty(),
            heap: MemoryHeap::Upload,
            name: String::new(),
        }
    }

    /// Staging buffer for GPU to CPU copies
    pub fn readback(size: u64) -> Self {
        Self {
            heap: MemoryHeap::Readback,
            ..Self::upload(size)
        }
    }

    pub fn with_usage(mut self, usage: BufferUsage) -> Self {
        self.usage = usage;
        self
    }

    pub fn with_heap(mut self, heap: MemoryHeap) -> Self {
        self.heap = heap;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Total size in bytes
    pub fn size(&self) -> u64 {
        self.stride * self.count
    }

    /// State the buffer starts in, fixed by its heap
    pub fn initial_state(&self) -> ResourceState {
        match self.heap {
            MemoryHeap::Default => ResourceState::Common,
            MemoryHeap::Upload => ResourceState::GeneralRead,
            MemoryHeap::Readback => ResourceState::CopyDestination,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.stride == 0 || self.count == 0 {
            return Err(Error::InvalidResource(format!(
                "buffer '{}': stride and count must be non-zero",
                self.name
            )));
        }
        if self.usage.contains(BufferUsage::INDEX) && !matches!(self.stride, 2 | 4) {
            return Err(Error::InvalidResource(format!(
                "buffer '{}': index stride must be 2 or 4 (got {})",
                self.name, self.stride
            )));
        }
        if self.usage.contains(BufferUsage::CONSTANT) && self.stride % CONSTANT_BUFFER_ALIGNMENT != 0 {
            return Err(Error::InvalidResource(format!(
                "buffer '{}': constant stride {} is not a multiple of {}",
                self.name, self.stride, CONSTANT_BUFFER_ALIGNMENT
            )));
        }
        if self.heap == MemoryHeap::Readback && self.usage.contains(BufferUsage::UNORDERED_ACCESS) {
            return Err(Error::InvalidResource(format!(
                "buffer '{}': readback buffers cannot be written by shaders",
                self.name
            )));
        }
        Ok(())
    }
}

/// Backend part of a buffer
pub trait BufferBackend: Send + Sync {
    fn as_any(&self) -> &dyn Any;

    /// Map the whole buffer and return its first byte
    fn map(&self) -> Result<NonNull<u8>>;

    /// Release the mapping returned by `map`
    fn unmap(&self);
}

/// GPU buffer
pub struct Buffer {
    desc: BufferDesc,
    state: Mutex<ResourceState>,
    mapped: AtomicBool,
    backend: Box<dyn BufferBackend>,
}

impl Buffer {
    pub(crate) fn new(desc: BufferDesc, backend: Box<dyn BufferBackend>) -> Self {
        let state = desc.initial_state();
        Self {
            desc,
            state: Mutex::new(state),
            mapped: AtomicBool::new(false),
            backend,
        }
    }

    pub fn desc(&self) -> &BufferDesc {
        &self.desc
    }

    pub fn name(&self) -> &str {
        &self.desc.name
    }

    pub fn size(&self) -> u64 {
        self.desc.size()
    }

    pub fn stride(&self) -> u64 {
        self.desc.stride
    }

    pub fn count(&self) -> u64 {
        self.desc.count
    }

    pub fn usage(&self) -> BufferUsage {
        self.desc.usage
    }

    pub fn heap(&self) -> MemoryHeap {
        self.desc.heap
    }

    pub fn state(&self) -> ResourceState {
        match self.state.lock() {
            Ok(state) => *state,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    /// Check that this buffer may enter `state`
    pub fn check_state(&self, state: ResourceState) -> Result<()> {
        check_buffer_state(&self.desc.name, self.desc.usage, self.desc.heap, state)
    }

    pub(crate) fn set_state(&self, state: ResourceState) {
        match self.state.lock() {
            Ok(mut current) => *current = state,
            Err(poisoned) => *poisoned.into_inner() = state,
        }
    }

    /// True while a `BufferMapping` is alive
    pub fn is_mapped(&self) -> bool {
        self.mapped.load(Ordering::Acquire)
    }

    /// Map the buffer for CPU access
    ///
    /// The returned guard unmaps on drop, so every path out of the caller
    /// (including `?`) releases the mapping.
    ///
    /// # Errors
    ///
    /// * `InvalidState` if the buffer lives in GPU-only memory or is already mapped
    pub fn copy_start(&self) -> Result<BufferMapping<'_>> {
        if !self.desc.heap.is_cpu_visible() {
            engine_error!("prism::Buffer", "Buffer '{}' lives in the Default heap and cannot be mapped", self.desc.name);
            return Err(Error::InvalidState(format!(
                "buffer '{}' is not CPU visible",
                self.desc.name
            )));
        }
        if self.mapped.swap(true, Ordering::AcqRel) {
            engine_error!("prism::Buffer", "Buffer '{}' is already mapped", self.desc.name);
            return Err(Error::InvalidState(format!(
                "buffer '{}' is already mapped",
                self.desc.name
            )));
        }

        match self.backend.map() {
            Ok(ptr) => Ok(BufferMapping { buffer: self, ptr }),
            Err(e) => {
                self.mapped.store(false, Ordering::Release);
                Err(e)
            }
        }
    }

    pub fn backend(&self) -> &dyn BufferBackend {
        self.backend.as_ref()
    }

    /// Downcast the backend part to its concrete type
    pub fn backend_as<T: 'static>(&self) -> Option<&T> {
        self.backend.as_any().downcast_ref::<T>()
    }
}

impl std::fmt::Debug for Buffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Buffer")
            .field("desc", &self.desc)
            .field("state", &self.state())
            .field("mapped", &self.is_mapped())
            .finish()
    }
}

/// Scoped CPU mapping of a buffer (`copy_start` .. `copy_end`)
pub struct BufferMapping<'a> {
    buffer: &'a Buffer,
    ptr: NonNull<u8>,
}

impl<'a> BufferMapping<'a> {
    fn check_range(&self, offset: u64, len: u64) -> Result<()> {
        let size = self.buffer.size();
        match offset.checked_add(len) {
            Some(end) if end <= size => Ok(()),
            _ => Err(Error::InvalidResource(format!(
                "write of {} bytes at offset {} overflows buffer '{}' ({} bytes)",
                len,
                offset,
                self.buffer.name(),
                size
            ))),
        }
    }

    /// Replace the whole buffer content (`data` must be exactly the buffer size)
    pub fn copy_total_data(&mut self, data: &[u8]) -> Result<()> {
        if data.len() as u64 != self.buffer.size() {
            return Err(Error::InvalidResource(format!(
                "buffer '{}' holds {} bytes, got {}",
                self.buffer.name(),
                self.buffer.size(),
                data.len()
            )));
        }
        self.copy_data(0, data)
    }

    /// Write bytes at `offset`
    pub fn copy_data(&mut self, offset: u64, data: &[u8]) -> Result<()> {
        self.check_range(offset, data.len() as u64)?;
        // SAFETY: the range was checked against the mapped size and the mapping is
        // exclusive (a second copy_start on the same buffer is rejected).
        unsafe {
            std::ptr::copy_nonoverlapping(
                data.as_ptr(),
                self.ptr.as_ptr().add(offset as usize),
                data.len(),
            );
        }
        Ok(())
    }

    /// Write one element at `index * stride`
    pub fn copy_element<T: Pod>(&mut self, index: u64, value: &T) -> Result<()> {
        let bytes = bytemuck::bytes_of(value);
        if bytes.len() as u64 > self.buffer.stride() {
            return Err(Error::InvalidResource(format!(
                "element of {} bytes does not fit stride {} of buffer '{}'",
                bytes.len(),
                self.buffer.stride(),
                self.buffer.name()
            )));
        }
        let offset = index.checked_mul(self.buffer.stride()).ok_or_else(|| {
            Error::InvalidResource(format!(
                "element {} is out of range of buffer '{}'",
                index,
                self.buffer.name()
            ))
        })?;
        self.copy_data(offset, bytes)
    }

    /// Read bytes at `offset` (readback buffers)
    pub fn read_data(&self, offset: u64, out: &mut [u8]) -> Result<()> {
        self.check_range(offset, out.len() as u64)?;
        // SAFETY: same range and exclusivity argument as `copy_data`.
        unsafe {
            std::ptr::copy_nonoverlapping(
                self.ptr.as_ptr().add(offset as usize),
                out.as_mut_ptr(),
                out.len(),
            );
        }
        Ok(())
    }

    /// Unmap now instead of at the end of scope
    pub fn copy_end(self) {}
}

impl Drop for BufferMapping<'_> {
    fn drop(&mut self) {
        self.buffer.backend.unmap();
        self.buffer.mapped.store(false, Ordering::Release);
    }
}

#[cfg(test)]
#[path = "buffer_tests.rs"]
mod tests;
