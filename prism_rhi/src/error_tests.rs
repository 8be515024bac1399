//! Unit tests for error.rs
//!
//! Tests Error variants, their Display output and the classification helpers.

use super::*;

// ============================================================================
// ERROR DISPLAY TESTS
// ============================================================================

#[test]
fn test_backend_error_display() {
    let err = Error::BackendError("vkQueueSubmit2 failed".to_string());
    let display = format!("{}", err);
    assert!(display.contains("Backend error"));
    assert!(display.contains("vkQueueSubmit2 failed"));
}

#[test]
fn test_out_of_memory_display() {
    let err = Error::OutOfMemory;
    assert_eq!(format!("{}", err), "Out of GPU memory");
}

#[test]
fn test_format_mismatch_display() {
    let err = Error::FormatMismatch("render target 0 lacks RENDER_TARGET usage".to_string());
    let display = format!("{}", err);
    assert!(display.starts_with("Format mismatch"));
    assert!(display.contains("RENDER_TARGET"));
}

#[test]
fn test_descriptor_heap_overflow_display() {
    let err = Error::DescriptorHeapOverflow { heap: "rtv".to_string(), capacity: 8 };
    let display = format!("{}", err);
    assert!(display.contains("'rtv'"));
    assert!(display.contains("8 descriptors"));
}

#[test]
fn test_invalid_fence_value_display() {
    let err = Error::InvalidFenceValue { requested: 3, current: 5 };
    let display = format!("{}", err);
    assert!(display.contains('3'));
    assert!(display.contains('5'));
}

#[test]
fn test_surface_out_of_date_display() {
    assert_eq!(format!("{}", Error::SurfaceOutOfDate), "Presentation surface out of date");
}

// ============================================================================
// CLASSIFICATION TESTS
// ============================================================================

#[test]
fn test_device_lost_classification() {
    assert!(Error::DeviceLost("fence timeout".to_string()).is_device_lost());
    assert!(!Error::OutOfMemory.is_device_lost());
    assert!(!Error::SurfaceOutOfDate.is_device_lost());
}

#[test]
fn test_configuration_error_classification() {
    assert!(Error::FormatMismatch(String::new()).is_configuration_error());
    assert!(Error::DescriptorHeapOverflow { heap: String::new(), capacity: 1 }.is_configuration_error());
    assert!(Error::InvalidStateTransition(String::new()).is_configuration_error());
    assert!(Error::InvalidState(String::new()).is_configuration_error());

    assert!(!Error::DeviceLost(String::new()).is_configuration_error());
    assert!(!Error::BackendError(String::new()).is_configuration_error());
    assert!(!Error::ThreadPoolStopped.is_configuration_error());
}

// ============================================================================
// ERROR TRAIT IMPLEMENTATIONS
// ============================================================================

#[test]
fn test_error_is_std_error() {
    let err = Error::OutOfMemory;
    let _: &dyn std::error::Error = &err;
}

#[test]
fn test_error_debug() {
    let debug = format!("{:?}", Error::InvalidResource("view".to_string()));
    assert!(debug.contains("InvalidResource"));
}

#[test]
fn test_result_propagation() {
    fn inner() -> Result<u32> {
        Err(Error::TaskAborted)
    }
    fn outer() -> Result<u32> {
        let value = inner()?;
        Ok(value + 1)
    }
    assert_eq!(outer(), Err(Error::TaskAborted));
}
