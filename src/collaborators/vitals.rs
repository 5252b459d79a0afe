//! Pull interface to external vital samplers (CPU, memory, refresh rate).

use std::sync::Arc;

/// Aggregated samples reported by a vital monitor.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct VitalInfo {
    pub sample_count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

/// Source of vital samples.
///
/// For CPU, `max` is the cumulative tick count since process start.
pub trait VitalMonitor: Send + Sync {
    /// Latest aggregate, or `None` when nothing was sampled yet.
    fn snapshot(&self) -> Option<VitalInfo>;
}

/// The three monitors a foreground view reads.
#[derive(Clone, Default)]
pub struct Vitals {
    pub cpu: Option<Arc<dyn VitalMonitor>>,
    pub memory: Option<Arc<dyn VitalMonitor>>,
    pub frame_rate: Option<Arc<dyn VitalMonitor>>,
}

impl Vitals {
    /// Vitals that report nothing (background and launch views).
    pub fn none() -> Self {
        Self::default()
    }

    pub(crate) fn cpu(&self) -> Option<VitalInfo> {
        self.cpu.as_ref().and_then(|m| m.snapshot())
    }

    pub(crate) fn memory(&self) -> Option<VitalInfo> {
        self.memory.as_ref().and_then(|m| m.snapshot())
    }

    pub(crate) fn frame_rate(&self) -> Option<VitalInfo> {
        self.frame_rate.as_ref().and_then(|m| m.snapshot())
    }
}

impl std::fmt::Debug for Vitals {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vitals")
            .field("cpu", &self.cpu.is_some())
            .field("memory", &self.memory.is_some())
            .field("frame_rate", &self.frame_rate.is_some())
            .finish()
    }
}
