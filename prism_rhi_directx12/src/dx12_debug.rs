/// D3D12 debug layer - routes info queue messages to the prism logger
///
/// The info queue is drained after submissions and device waits. Messages
/// are counted per severity and identical messages are grouped, so a
/// repeated debug layer error is reported with its occurrence count.

use prism_rhi::{engine_debug, engine_error, engine_info, engine_warn};
use rustc_hash::FxHashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use windows::Win32::Graphics::Direct3D12::{
    ID3D12InfoQueue, D3D12_MESSAGE, D3D12_MESSAGE_SEVERITY, D3D12_MESSAGE_SEVERITY_CORRUPTION,
    D3D12_MESSAGE_SEVERITY_ERROR, D3D12_MESSAGE_SEVERITY_INFO, D3D12_MESSAGE_SEVERITY_WARNING,
};

use crate::dx12_context::lock;

const DEBUG_LAYER_SOURCE: &str = "prism::directx12::debug_layer";

static MESSAGE_COUNTS: MessageCounter = MessageCounter::new();

/// Occurrences of each message text since `reset_debug_message_counts`
static MESSAGE_TRACKER: Mutex<Option<FxHashMap<String, u32>>> = Mutex::new(None);

/// Debug layer message counts per severity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DebugMessageCounts {
    /// Corruption and error messages
    pub errors: u32,
    pub warnings: u32,
    pub info: u32,
    pub messages: u32,
}

impl DebugMessageCounts {
    pub fn total(&self) -> u32 {
        self.errors + self.warnings + self.info + self.messages
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Severity {
    Error,
    Warning,
    Info,
    Message,
}

fn classify(severity: D3D12_MESSAGE_SEVERITY) -> Severity {
    match severity {
        D3D12_MESSAGE_SEVERITY_CORRUPTION | D3D12_MESSAGE_SEVERITY_ERROR => Severity::Error,
        D3D12_MESSAGE_SEVERITY_WARNING => Severity::Warning,
        D3D12_MESSAGE_SEVERITY_INFO => Severity::Info,
        _ => Severity::Message,
    }
}

struct MessageCounter {
    errors: AtomicU32,
    warnings: AtomicU32,
    info: AtomicU32,
    messages: AtomicU32,
}

impl MessageCounter {
    const fn new() -> Self {
        Self {
            errors: AtomicU32::new(0),
            warnings: AtomicU32::new(0),
            info: AtomicU32::new(0),
            messages: AtomicU32::new(0),
        }
    }

    fn record(&self, severity: Severity) {
        let counter = match severity {
            Severity::Error => &self.errors,
            Severity::Warning => &self.warnings,
            Severity::Info => &self.info,
            Severity::Message => &self.messages,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> DebugMessageCounts {
        DebugMessageCounts {
            errors: self.errors.load(Ordering::Relaxed),
            warnings: self.warnings.load(Ordering::Relaxed),
            info: self.info.load(Ordering::Relaxed),
            messages: self.messages.load(Ordering::Relaxed),
        }
    }

    fn reset(&self) {
        self.errors.store(0, Ordering::Relaxed);
        self.warnings.store(0, Ordering::Relaxed);
        self.info.store(0, Ordering::Relaxed);
        self.messages.store(0, Ordering::Relaxed);
    }
}

fn track_message(message: &str) -> u32 {
    let mut tracker = lock(&MESSAGE_TRACKER);
    let count = tracker
        .get_or_insert_with(FxHashMap::default)
        .entry(message.to_string())
        .or_insert(0);
    *count += 1;
    *count
}

/// Debug layer messages seen since the last reset
pub fn debug_message_counts() -> DebugMessageCounts {
    MESSAGE_COUNTS.snapshot()
}

/// Clear the counters (called when a device with the debug layer is created)
pub fn reset_debug_message_counts() {
    MESSAGE_COUNTS.reset();
    *lock(&MESSAGE_TRACKER) = None;
}

fn report(severity: Severity, id: i32, description: &str) {
    MESSAGE_COUNTS.record(severity);
    let occurrences = track_message(description);
    let repeat = if occurrences > 1 {
        format!(" [x{}]", occurrences)
    } else {
        String::new()
    };

    match severity {
        Severity::Error => engine_error!(DEBUG_LAYER_SOURCE, "[ID {}]{} {}", id, repeat, description),
        Severity::Warning => engine_warn!(DEBUG_LAYER_SOURCE, "[ID {}]{} {}", id, repeat, description),
        Severity::Info => engine_info!(DEBUG_LAYER_SOURCE, "[ID {}]{} {}", id, repeat, description),
        Severity::Message => engine_debug!(DEBUG_LAYER_SOURCE, "[ID {}]{} {}", id, repeat, description),
    }
}

/// Log and clear every message stored in `info_queue`
pub(crate) fn drain_messages(info_queue: &ID3D12InfoQueue) {
    unsafe {
        let count = info_queue.GetNumStoredMessages();
        for index in 0..count {
            let mut length: usize = 0;
            if info_queue.GetMessage(index, None, &mut length).is_err() || length == 0 {
                continue;
            }
            // u64 storage keeps the D3D12_MESSAGE header aligned
            let mut storage = vec![0u64; length.div_ceil(8)];
            let message = storage.as_mut_ptr() as *mut D3D12_MESSAGE;
            if info_queue.GetMessage(index, Some(message), &mut length).is_err() {
                continue;
            }
            let bytes = std::slice::from_raw_parts(
                (*message).pDescription as *const u8,
                (*message).DescriptionByteLength,
            );
            let description = String::from_utf8_lossy(bytes);
            report(
                classify((*message).Severity),
                (*message).ID.0,
                description.trim_end_matches('\0').trim(),
            );
        }
        info_queue.ClearStoredMessages();
    }
}

#[cfg(test)]
#[path = "dx12_debug_tests.rs"]
mod tests;
