//! Logging for the Prism RHI
//!
//! Every RHI object reports through the `engine_*!` macros. Entries go to
//! one replaceable `Logger`; `DefaultLogger` prints them in colour, warnings
//! and errors on stderr. A minimum severity drops entries before they reach
//! the logger. ERROR entries carry the file and line of the macro call.
//!
//! The active logger is the only process-wide state of the RHI. Engine
//! state itself lives in an explicitly constructed `GraphicsEngine`.

use colored::*;
use chrono::{DateTime, Local};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{OnceLock, RwLock};
use std::time::SystemTime;

static LOGGER: OnceLock<RwLock<Box<dyn Logger>>> = OnceLock::new();

/// Stored as `LogSeverity as u8`
static MIN_SEVERITY: AtomicU8 = AtomicU8::new(LogSeverity::Trace as u8);

/// Destination of every log entry
///
/// ```no_run
/// use prism_rhi::prism::log::{Logger, LogEntry};
/// use std::sync::Mutex;
///
/// struct MemoryLogger(Mutex<Vec<String>>);
///
/// impl Logger for MemoryLogger {
///     fn log(&self, entry: &LogEntry) {
///         if let Ok(mut lines) = self.0.lock() {
///             lines.push(entry.message.clone());
///         }
///     }
/// }
/// ```
pub trait Logger: Send + Sync {
    fn log(&self, entry: &LogEntry);
}

#[derive(Debug, Clone)]
pub struct LogEntry {
    pub severity: LogSeverity,
    pub timestamp: SystemTime,
    /// Reporting subsystem, e.g. "prism::Swapchain" or "prism::vulkan"
    pub source: String,
    pub message: String,
    /// Call site, set for ERROR entries
    pub file: Option<&'static str>,
    pub line: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum LogSeverity {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogSeverity {
    fn label(self) -> ColoredString {
        match self {
            LogSeverity::Trace => "TRACE".bright_black(),
            LogSeverity::Debug => "DEBUG".cyan(),
            LogSeverity::Info => "INFO ".green(),
            LogSeverity::Warn => "WARN ".yellow(),
            LogSeverity::Error => "ERROR".red().bold(),
        }
    }
}

/// Coloured console logger
///
/// Lines read `[time] [SEVERITY] [source] message`, followed by
/// `(file:line)` when the entry has a call site.
pub struct DefaultLogger;

impl Logger for DefaultLogger {
    fn log(&self, entry: &LogEntry) {
        let time: DateTime<Local> = entry.timestamp.into();
        let location = match (entry.file, entry.line) {
            (Some(file), Some(line)) => format!(" ({}:{})", file, line),
            _ => String::new(),
        };
        let line = format!(
            "[{}] [{}] [{}] {}{}",
            time.format("%H:%M:%S%.3f"),
            entry.severity.label(),
            entry.source.bright_blue(),
            entry.message,
            location
        );
        if entry.severity >= LogSeverity::Warn {
            eprintln!("{}", line);
        } else {
            println!("{}", line);
        }
    }
}

// ===== LOGGER REGISTRY =====

fn logger_lock() -> &'static RwLock<Box<dyn Logger>> {
    LOGGER.get_or_init(|| RwLock::new(Box::new(DefaultLogger)))
}

/// Replace the active logger
///
/// # Example
///
/// ```no_run
/// use prism_rhi::prism::log::{self, Logger, LogEntry};
///
/// struct SilentLogger;
/// impl Logger for SilentLogger {
///     fn log(&self, _entry: &LogEntry) {}
/// }
///
/// log::set_logger(SilentLogger);
/// ```
pub fn set_logger<L: Logger + 'static>(logger: L) {
    if let Ok(mut lock) = logger_lock().write() {
        *lock = Box::new(logger);
    }
}

/// Reset logger to default (DefaultLogger) and clear the severity filter
pub fn reset_logger() {
    if let Ok(mut lock) = logger_lock().write() {
        *lock = Box::new(DefaultLogger);
    }
    MIN_SEVERITY.store(LogSeverity::Trace as u8, Ordering::Relaxed);
}

/// Drop every entry below `severity`
pub fn set_min_severity(severity: LogSeverity) {
    MIN_SEVERITY.store(severity as u8, Ordering::Relaxed);
}

/// Current minimum severity
pub fn min_severity() -> LogSeverity {
    match MIN_SEVERITY.load(Ordering::Relaxed) {
        0 => LogSeverity::Trace,
        1 => LogSeverity::Debug,
        2 => LogSeverity::Info,
        3 => LogSeverity::Warn,
        _ => LogSeverity::Error,
    }
}

fn dispatch(entry: LogEntry) {
    if entry.severity < min_severity() {
        return;
    }
    if let Ok(lock) = logger_lock().read() {
        lock.log(&entry);
    }
}

/// Entry point of `engine_trace!` .. `engine_warn!`
#[doc(hidden)]
pub fn log(severity: LogSeverity, source: &str, message: String) {
    dispatch(LogEntry {
        severity,
        timestamp: SystemTime::now(),
        source: source.to_string(),
        message,
        file: None,
        line: None,
    });
}

/// Entry point of `engine_error!`, records the call site
#[doc(hidden)]
pub fn log_detailed(
    severity: LogSeverity,
    source: &str,
    message: String,
    file: &'static str,
    line: u32,
) {
    dispatch(LogEntry {
        severity,
        timestamp: SystemTime::now(),
        source: source.to_string(),
        message,
        file: Some(file),
        line: Some(line),
    });
}

// ===== LOGGING MACROS =====

/// Log a TRACE message (very verbose, typically disabled)
///
/// # Example
///
/// ```no_run
/// prism_rhi::engine_trace!("prism::Fence", "Polling completed value");
/// ```
#[macro_export]
macro_rules! engine_trace {
    ($source:expr, $($arg:tt)*) => {
        $crate::log::log(
            $crate::log::LogSeverity::Trace,
            $source,
            format!($($arg)*)
        )
    };
}

/// Log a DEBUG message (development information)
///
/// # Example
///
/// ```no_run
/// let index = 2;
/// prism_rhi::engine_debug!("prism::Swapchain", "Acquired back buffer {}", index);
/// ```
#[macro_export]
macro_rules! engine_debug {
    ($source:expr, $($arg:tt)*) => {
        $crate::log::log(
            $crate::log::LogSeverity::Debug,
            $source,
            format!($($arg)*)
        )
    };
}

/// Log an INFO message (important events)
///
/// # Example
///
/// ```no_run
/// prism_rhi::engine_info!("prism::GraphicsEngine", "Device created");
/// ```
#[macro_export]
macro_rules! engine_info {
    ($source:expr, $($arg:tt)*) => {
        $crate::log::log(
            $crate::log::LogSeverity::Info,
            $source,
            format!($($arg)*)
        )
    };
}

/// Log a WARN message (potential issues)
///
/// # Example
///
/// ```no_run
/// let value = 12;
/// prism_rhi::engine_warn!("prism::Fence", "Waiting on unscheduled value {}", value);
/// ```
#[macro_export]
macro_rules! engine_warn {
    ($source:expr, $($arg:tt)*) => {
        $crate::log::log(
            $crate::log::LogSeverity::Warn,
            $source,
            format!($($arg)*)
        )
    };
}

/// Log an ERROR message with file:line information
///
/// # Example
///
/// ```no_run
/// let error = "timeout";
/// prism_rhi::engine_error!("prism::Fence", "Wait failed: {}", error);
/// ```
#[macro_export]
macro_rules! engine_error {
    ($source:expr, $($arg:tt)*) => {
        $crate::log::log_detailed(
            $crate::log::LogSeverity::Error,
            $source,
            format!($($arg)*),
            file!(),
            line!()
        )
    };
}

/// Log an ERROR message and evaluate to `Error::BackendError` with the same text
///
/// # Example
///
/// ```no_run
/// let code = -4;
/// let error = prism_rhi::engine_err!("prism::vulkan", "vkQueueSubmit2 failed: {}", code);
/// ```
#[macro_export]
macro_rules! engine_err {
    ($source:expr, $($arg:tt)*) => {{
        let message = format!($($arg)*);
        $crate::log::log_detailed(
            $crate::log::LogSeverity::Error,
            $source,
            message.clone(),
            file!(),
            line!()
        );
        $crate::prism::Error::BackendError(message)
    }};
}

/// Log an ERROR message and return `Err(Error::BackendError)` from the current function
#[macro_export]
macro_rules! engine_bail {
    ($source:expr, $($arg:tt)*) => {
        return Err($crate::engine_err!($source, $($arg)*))
    };
}

#[cfg(test)]
#[path = "log_tests.rs"]
mod tests;
