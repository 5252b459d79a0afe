//! Host process information consumed by the view manager.

use std::sync::atomic::{AtomicBool, Ordering};

/// Platform view of the host process.
pub trait ProcessInfo: Send + Sync {
    /// Whether the process is currently in the foreground.
    fn is_foreground(&self) -> bool;

    /// Monotonic tick (ns) at which the process started.
    fn process_start_nanos(&self) -> i64;
}

/// Process info with a fixed start tick and a switchable foreground flag.
#[derive(Debug, Default)]
pub struct StaticProcessInfo {
    foreground: AtomicBool,
    start_nanos: i64,
}

impl StaticProcessInfo {
    pub fn new(foreground: bool, start_nanos: i64) -> Self {
        Self {
            foreground: AtomicBool::new(foreground),
            start_nanos,
        }
    }

    /// Updates the foreground flag.
    pub fn set_foreground(&self, foreground: bool) {
        self.foreground.store(foreground, Ordering::Relaxed);
    }
}

impl ProcessInfo for StaticProcessInfo {
    fn is_foreground(&self) -> bool {
        self.foreground.load(Ordering::Relaxed)
    }

    fn process_start_nanos(&self) -> i64 {
        self.start_nanos
    }
}
