//! Unit tests for log.rs
//!
//! Tests Logger trait, LogEntry, LogSeverity, DefaultLogger, the logger
//! registry and the logging macros.

use super::*;
use serial_test::serial;
use std::sync::{Arc, Mutex};

/// Logger that keeps the entries emitted by these tests.
///
/// Other tests run in parallel and log through the same global logger,
/// so only the "prism::test" source is recorded.
#[derive(Clone, Default)]
struct CaptureLogger {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl Logger for CaptureLogger {
    fn log(&self, entry: &LogEntry) {
        if entry.source == "prism::test" {
            self.entries.lock().unwrap().push(entry.clone());
        }
    }
}

// ============================================================================
// LOG SEVERITY TESTS
// ============================================================================

#[test]
fn test_log_severity_ordering() {
    assert!(LogSeverity::Trace < LogSeverity::Debug);
    assert!(LogSeverity::Debug < LogSeverity::Info);
    assert!(LogSeverity::Info < LogSeverity::Warn);
    assert!(LogSeverity::Warn < LogSeverity::Error);
}

#[test]
fn test_log_severity_debug() {
    assert_eq!(format!("{:?}", LogSeverity::Trace), "Trace");
    assert_eq!(format!("{:?}", LogSeverity::Error), "Error");
}

// ============================================================================
// LOG ENTRY TESTS
// ============================================================================

#[test]
fn test_log_entry_creation_with_file_line() {
    let entry = LogEntry {
        severity: LogSeverity::Error,
        timestamp: SystemTime::now(),
        source: "prism::vulkan".to_string(),
        message: "vkCreateDevice failed".to_string(),
        file: Some("vulkan_adapter.rs"),
        line: Some(42),
    };

    assert_eq!(entry.severity, LogSeverity::Error);
    assert_eq!(entry.source, "prism::vulkan");
    assert_eq!(entry.file, Some("vulkan_adapter.rs"));
    assert_eq!(entry.line, Some(42));
}

// ============================================================================
// DEFAULT LOGGER TESTS
// ============================================================================

#[test]
fn test_default_logger_all_severities() {
    let logger = DefaultLogger;
    for severity in [
        LogSeverity::Trace,
        LogSeverity::Debug,
        LogSeverity::Info,
        LogSeverity::Warn,
        LogSeverity::Error,
    ] {
        // Just verify it doesn't panic
        logger.log(&LogEntry {
            severity,
            timestamp: SystemTime::now(),
            source: "test".to_string(),
            message: "message".to_string(),
            file: Some("log_tests.rs"),
            line: Some(1),
        });
    }
}

// ============================================================================
// REGISTRY AND MACRO TESTS
// ============================================================================

#[test]
#[serial]
fn test_set_logger_receives_macro_output() {
    let capture = CaptureLogger::default();
    set_logger(capture.clone());

    crate::engine_info!("prism::test", "frame {}", 7);
    crate::engine_warn!("prism::test", "slow frame");

    reset_logger();

    let entries = capture.entries.lock().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].severity, LogSeverity::Info);
    assert_eq!(entries[0].message, "frame 7");
    assert_eq!(entries[0].source, "prism::test");
    assert!(entries[0].file.is_none());
    assert_eq!(entries[1].severity, LogSeverity::Warn);
}

#[test]
#[serial]
fn test_engine_error_carries_file_and_line() {
    let capture = CaptureLogger::default();
    set_logger(capture.clone());

    crate::engine_error!("prism::test", "broken");

    reset_logger();

    let entries = capture.entries.lock().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].file, Some(file!()));
    assert!(entries[0].line.is_some());
}

#[test]
#[serial]
fn test_engine_err_logs_and_builds_backend_error() {
    let capture = CaptureLogger::default();
    set_logger(capture.clone());

    let error = crate::engine_err!("prism::test", "submit failed: {}", -3);

    reset_logger();

    assert_eq!(error, crate::error::Error::BackendError("submit failed: -3".to_string()));
    assert_eq!(capture.entries.lock().unwrap().len(), 1);
}

#[test]
#[serial]
fn test_engine_bail_returns_early() {
    fn failing() -> crate::error::Result<u32> {
        crate::engine_bail!("prism::test", "bail out");
    }

    set_logger(CaptureLogger::default());
    let result = failing();
    reset_logger();

    assert!(matches!(result, Err(crate::error::Error::BackendError(_))));
}

#[test]
#[serial]
fn test_min_severity_filters_entries() {
    let capture = CaptureLogger::default();
    set_logger(capture.clone());
    set_min_severity(LogSeverity::Warn);
    assert_eq!(min_severity(), LogSeverity::Warn);

    crate::engine_debug!("prism::test", "hidden");
    crate::engine_info!("prism::test", "hidden");
    crate::engine_warn!("prism::test", "shown");
    crate::engine_error!("prism::test", "shown");

    reset_logger();
    assert_eq!(min_severity(), LogSeverity::Trace);

    let entries = capture.entries.lock().unwrap();
    assert_eq!(entries.len(), 2);
    assert!(entries.iter().all(|e| e.message == "shown"));
}
