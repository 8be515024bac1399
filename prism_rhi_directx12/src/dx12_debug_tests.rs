//! Unit tests for dx12_debug.rs

use super::*;
use serial_test::serial;
use windows::Win32::Graphics::Direct3D12::D3D12_MESSAGE_SEVERITY_MESSAGE;

#[test]
fn test_severity_classification() {
    assert_eq!(classify(D3D12_MESSAGE_SEVERITY_CORRUPTION), Severity::Error);
    assert_eq!(classify(D3D12_MESSAGE_SEVERITY_ERROR), Severity::Error);
    assert_eq!(classify(D3D12_MESSAGE_SEVERITY_WARNING), Severity::Warning);
    assert_eq!(classify(D3D12_MESSAGE_SEVERITY_INFO), Severity::Info);
    assert_eq!(classify(D3D12_MESSAGE_SEVERITY_MESSAGE), Severity::Message);
}

#[test]
#[serial]
fn test_counts_per_severity() {
    reset_debug_message_counts();
    report(Severity::Error, 1, "resource state mismatch");
    report(Severity::Warning, 2, "clear value mismatch");
    report(Severity::Warning, 2, "clear value mismatch");
    report(Severity::Message, 3, "live object");

    let counts = debug_message_counts();
    assert_eq!(counts, DebugMessageCounts { errors: 1, warnings: 2, info: 0, messages: 1 });
    assert_eq!(counts.total(), 4);

    reset_debug_message_counts();
    assert_eq!(debug_message_counts().total(), 0);
}

#[test]
#[serial]
fn test_identical_messages_are_grouped() {
    reset_debug_message_counts();
    assert_eq!(track_message("CLEARRENDERTARGETVIEW_MISMATCHINGCLEARVALUE"), 1);
    assert_eq!(track_message("CLEARRENDERTARGETVIEW_MISMATCHINGCLEARVALUE"), 2);
    assert_eq!(track_message("RESOURCE_BARRIER_BEFORE_AFTER_MISMATCH"), 1);
}
