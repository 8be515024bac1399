/// Vulkan debug messenger - validation layer messages into the prism logger
///
/// Counts are kept per severity. Repeats of the same message text are
/// tagged with their occurrence count, and the instance logs a summary when
/// its messenger is destroyed.

use ash::vk;
use prism_rhi::{engine_debug, engine_error, engine_info, engine_trace, engine_warn};
use rustc_hash::FxHashMap;
use std::borrow::Cow;
use std::ffi::{c_char, c_void, CStr};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use crate::vulkan_context::lock;

const VALIDATION_SOURCE: &str = "prism::vulkan::validation";

const ERROR: usize = 0;
const WARNING: usize = 1;
const INFO: usize = 2;
const VERBOSE: usize = 3;

static COUNTS: [AtomicU32; 4] = [AtomicU32::new(0), AtomicU32::new(0), AtomicU32::new(0), AtomicU32::new(0)];

static REPEATS: Mutex<Option<FxHashMap<String, u32>>> = Mutex::new(None);

/// Validation message counts since the last validating instance was created
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidationStats {
    pub errors: u32,
    pub warnings: u32,
    pub info: u32,
    pub verbose: u32,
}

impl ValidationStats {
    pub fn total(&self) -> u32 {
        self.errors + self.warnings + self.info + self.verbose
    }
}

fn severity_slot(severity: vk::DebugUtilsMessageSeverityFlagsEXT) -> usize {
    if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        ERROR
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        WARNING
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
        INFO
    } else {
        VERBOSE
    }
}

/// Occurrences of `message` including this one
fn count_repeat(message: &str) -> u32 {
    let mut repeats = lock(&REPEATS);
    let seen = repeats
        .get_or_insert_with(FxHashMap::default)
        .entry(message.to_string())
        .or_insert(0);
    *seen += 1;
    *seen
}

pub fn reset_validation_stats() {
    for count in &COUNTS {
        count.store(0, Ordering::Relaxed);
    }
    *lock(&REPEATS) = None;
}

pub fn get_validation_stats() -> ValidationStats {
    ValidationStats {
        errors: COUNTS[ERROR].load(Ordering::Relaxed),
        warnings: COUNTS[WARNING].load(Ordering::Relaxed),
        info: COUNTS[INFO].load(Ordering::Relaxed),
        verbose: COUNTS[VERBOSE].load(Ordering::Relaxed),
    }
}

/// Log the counts gathered since the messenger was created
pub fn log_validation_summary() {
    let stats = get_validation_stats();
    let repeated = lock(&REPEATS)
        .as_ref()
        .map_or(0, |repeats| repeats.values().filter(|&&seen| seen > 1).count());

    if stats.errors > 0 || stats.warnings > 0 {
        engine_warn!(
            VALIDATION_SOURCE,
            "Validation summary: {} errors, {} warnings, {} info, {} verbose ({} repeated)",
            stats.errors, stats.warnings, stats.info, stats.verbose, repeated
        );
    } else {
        engine_info!(VALIDATION_SOURCE, "Validation summary: no errors or warnings ({} messages)", stats.total());
    }
}

pub(crate) fn messenger_severities() -> vk::DebugUtilsMessageSeverityFlagsEXT {
    vk::DebugUtilsMessageSeverityFlagsEXT::ERROR
        | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
        | vk::DebugUtilsMessageSeverityFlagsEXT::INFO
        | vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
}

fn type_name(message_type: vk::DebugUtilsMessageTypeFlagsEXT) -> &'static str {
    if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION) {
        "Validation"
    } else if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE) {
        "Performance"
    } else {
        "General"
    }
}

unsafe fn text<'a>(ptr: *const c_char, fallback: &'a str) -> Cow<'a, str> {
    if ptr.is_null() {
        Cow::Borrowed(fallback)
    } else {
        CStr::from_ptr(ptr).to_string_lossy()
    }
}

/// Errors and warnings keep their severity; info goes to DEBUG and verbose to TRACE
pub(crate) unsafe extern "system" fn vulkan_debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _user_data: *mut c_void,
) -> vk::Bool32 {
    if p_callback_data.is_null() {
        return vk::FALSE;
    }
    let data = &*p_callback_data;
    let id = text(data.p_message_id_name, "Unknown");
    let message = text(data.p_message, "No message");

    let slot = severity_slot(message_severity);
    COUNTS[slot].fetch_add(1, Ordering::Relaxed);
    let seen = count_repeat(&message);
    let repeat = if seen > 1 { format!(" [x{}]", seen) } else { String::new() };
    let kind = type_name(message_type);

    match slot {
        ERROR => engine_error!(VALIDATION_SOURCE, "[{}]{} {}: {}", kind, repeat, id, message),
        WARNING => engine_warn!(VALIDATION_SOURCE, "[{}]{} {}: {}", kind, repeat, id, message),
        INFO => engine_debug!(VALIDATION_SOURCE, "[{}]{} {}: {}", kind, repeat, id, message),
        _ => engine_trace!(VALIDATION_SOURCE, "[{}]{} {}: {}", kind, repeat, id, message),
    }

    // Returning TRUE would abort the triggering call
    vk::FALSE
}

#[cfg(test)]
#[path = "debug_tests.rs"]
mod tests;
