//! Error types for the Prism RHI
//!
//! This module defines the error types used throughout the RHI,
//! including configuration errors, device loss, backend failures
//! and thread pool errors.

use std::fmt;

/// Result type for Prism RHI operations
pub type Result<T> = std::result::Result<T, Error>;

/// Prism RHI errors
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Backend-specific error (Vulkan, DirectX 12)
    BackendError(String),

    /// Out of GPU memory
    OutOfMemory,

    /// Invalid resource (texture, buffer, view, descriptor, etc.)
    InvalidResource(String),

    /// Initialization failed (instance, adapter, device, swapchain)
    InitializationFailed(String),

    /// Render target or depth attachment does not fit the frame buffer
    FormatMismatch(String),

    /// A descriptor heap ran out of slots
    DescriptorHeapOverflow {
        /// Heap debug name
        heap: String,
        /// Fixed heap capacity
        capacity: u32,
    },

    /// A descriptor handle was requested past the end of its heap
    DescriptorHandleOutOfRange {
        /// Requested slot offset
        offset: u32,
        /// Fixed heap capacity
        capacity: u32,
    },

    /// A resource state transition is not legal for the resource
    InvalidStateTransition(String),

    /// A fence value would move the fence backwards
    InvalidFenceValue {
        /// Value that was requested
        requested: u64,
        /// Last value already scheduled on the fence
        current: u64,
    },

    /// An object was used in the wrong lifecycle state (caller contract violation)
    InvalidState(String),

    /// The GPU stopped responding (fence timeout, device removed)
    DeviceLost(String),

    /// The presentation surface is lost or out of date and must be rebuilt
    SurfaceOutOfDate,

    /// A task was submitted to a thread pool that is shutting down
    ThreadPoolStopped,

    /// A task was dropped or panicked before producing its result
    TaskAborted,
}

impl Error {
    /// Returns true for errors that must terminate the render loop
    pub fn is_device_lost(&self) -> bool {
        matches!(self, Error::DeviceLost(_))
    }

    /// Returns true for programming defects detected at call time.
    ///
    /// These are never recoverable by retrying the same call.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidResource(_)
                | Error::FormatMismatch(_)
                | Error::DescriptorHeapOverflow { .. }
                | Error::DescriptorHandleOutOfRange { .. }
                | Error::InvalidStateTransition(_)
                | Error::InvalidFenceValue { .. }
                | Error::InvalidState(_)
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::OutOfMemory => write!(f, "Out of GPU memory"),
            Error::InvalidResource(msg) => write!(f, "Invalid resource: {}", msg),
            Error::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            Error::FormatMismatch(msg) => write!(f, "Format mismatch: {}", msg),
            Error::DescriptorHeapOverflow { heap, capacity } => write!(
                f,
                "Descriptor heap overflow: heap '{}' is full ({} descriptors)",
                heap, capacity
            ),
            Error::DescriptorHandleOutOfRange { offset, capacity } => write!(
                f,
                "Descriptor handle out of range: offset {} >= capacity {}",
                offset, capacity
            ),
            Error::InvalidStateTransition(msg) => write!(f, "Invalid state transition: {}", msg),
            Error::InvalidFenceValue { requested, current } => write!(
                f,
                "Invalid fence value: {} is not above the last scheduled value {}",
                requested, current
            ),
            Error::InvalidState(msg) => write!(f, "Invalid state: {}", msg),
            Error::DeviceLost(msg) => write!(f, "Device lost: {}", msg),
            Error::SurfaceOutOfDate => write!(f, "Presentation surface out of date"),
            Error::ThreadPoolStopped => write!(f, "Thread pool is stopped"),
            Error::TaskAborted => write!(f, "Task aborted before completion"),
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
