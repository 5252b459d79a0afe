//! # Runtime configuration.
//!
//! Provides [`RumConfig`], the settings the scope tree and its worker consume.
//!
//! Config is used in two ways:
//! 1. **Monitor creation**: `RumMonitorBuilder::new(config, storage)`
//! 2. **Scope thresholds**: every scope reads its timeouts from the shared config
//!
//! ## Sentinel values
//! - `resource_key_ttl = 0s` → keys never expire on their own (only `AbandonResource` releases them)
//! - `sample_rate` outside `0..=100` is rejected by [`RumConfig::validate`] and clamped by
//!   [`RumConfig::sample_rate_clamped`]

use std::time::Duration;

use crate::error::RumError;

/// Configuration of the RUM core.
///
/// ## Field semantics
/// - `sample_rate`: percentage of sessions whose records are kept (`0..=100`)
/// - `background_tracking`: open a background view for orphan actions/resources/errors
/// - `track_frustrations`: flag taps that produced errors (`error_tap`)
/// - `session_inactivity` / `session_max_duration`: session renewal thresholds
/// - `action_inactivity` / `action_max_duration`: action finalization thresholds
/// - `frozen_frame_threshold`: long tasks above it count as frozen frames
/// - `resource_key_ttl`: age after which an unstopped resource key is unreachable (`0s` = never)
/// - `queue_capacity`: ingress queue size (min 1)
/// - `bus_capacity`: feature bus ring buffer size (min 1)
///
/// ## Notes
/// All fields are public for flexibility. Prefer the helper accessors to avoid
/// sprinkling sentinel checks across the codebase.
#[derive(Clone, Debug)]
pub struct RumConfig {
    /// Application id stamped on every record.
    pub application_id: String,

    /// Percentage of sessions kept, `0.0..=100.0`.
    pub sample_rate: f32,

    /// Whether events arriving with no active view open a background view.
    pub background_tracking: bool,

    /// Whether actions report frustration signals.
    pub track_frustrations: bool,

    /// Time without interaction after which a session expires.
    pub session_inactivity: Duration,

    /// Maximum lifetime of a session.
    pub session_max_duration: Duration,

    /// Time without activity after which an action finalizes.
    pub action_inactivity: Duration,

    /// Maximum lifetime of an action.
    pub action_max_duration: Duration,

    /// Long tasks strictly above this duration are frozen frames.
    pub frozen_frame_threshold: Duration,

    /// Age after which an in-flight resource key counts as unreachable.
    ///
    /// - `Duration::ZERO` = keys never expire
    pub resource_key_ttl: Duration,

    /// Capacity of the ingress event queue.
    pub queue_capacity: usize,

    /// Capacity of the feature bus broadcast channel.
    pub bus_capacity: usize,
}

impl RumConfig {
    /// Returns a copy with the given application id.
    #[must_use]
    pub fn with_application_id(mut self, id: impl Into<String>) -> Self {
        self.application_id = id.into();
        self
    }

    /// Returns a copy with the given sample rate.
    #[must_use]
    pub fn with_sample_rate(mut self, rate: f32) -> Self {
        self.sample_rate = rate;
        self
    }

    /// Checks every field the core cannot recover from.
    pub fn validate(&self) -> Result<(), RumError> {
        if !(0.0..=100.0).contains(&self.sample_rate) {
            return Err(RumError::InvalidConfig {
                field: "sample_rate",
                reason: format!("{} is outside 0..=100", self.sample_rate),
            });
        }
        if self.session_inactivity.is_zero() {
            return Err(RumError::InvalidConfig {
                field: "session_inactivity",
                reason: "must be greater than zero".into(),
            });
        }
        if self.session_max_duration.is_zero() {
            return Err(RumError::InvalidConfig {
                field: "session_max_duration",
                reason: "must be greater than zero".into(),
            });
        }
        if self.action_max_duration < self.action_inactivity {
            return Err(RumError::InvalidConfig {
                field: "action_max_duration",
                reason: "must not be shorter than action_inactivity".into(),
            });
        }
        Ok(())
    }

    /// Returns the sample rate clamped to `0..=100`.
    #[inline]
    pub fn sample_rate_clamped(&self) -> f32 {
        if self.sample_rate.is_nan() {
            0.0
        } else {
            self.sample_rate.clamp(0.0, 100.0)
        }
    }

    /// Returns the resource key TTL as an `Option`.
    ///
    /// - `None` → keys never expire
    #[inline]
    pub fn resource_key_ttl(&self) -> Option<Duration> {
        if self.resource_key_ttl.is_zero() {
            None
        } else {
            Some(self.resource_key_ttl)
        }
    }

    /// Returns a queue capacity clamped to a minimum of 1.
    #[inline]
    pub fn queue_capacity_clamped(&self) -> usize {
        self.queue_capacity.max(1)
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for RumConfig {
    /// Default configuration:
    ///
    /// - `sample_rate = 100` (keep every session)
    /// - `background_tracking = false`
    /// - `track_frustrations = true`
    /// - `session_inactivity = 15min`, `session_max_duration = 4h`
    /// - `action_inactivity = 100ms`, `action_max_duration = 5s`
    /// - `frozen_frame_threshold = 700ms`
    /// - `resource_key_ttl = 5min`
    /// - `queue_capacity = 1024`, `bus_capacity = 64`
    fn default() -> Self {
        Self {
            application_id: String::new(),
            sample_rate: 100.0,
            background_tracking: false,
            track_frustrations: true,
            session_inactivity: Duration::from_secs(15 * 60),
            session_max_duration: Duration::from_secs(4 * 60 * 60),
            action_inactivity: Duration::from_millis(100),
            action_max_duration: Duration::from_secs(5),
            frozen_frame_threshold: Duration::from_millis(700),
            resource_key_ttl: Duration::from_secs(5 * 60),
            queue_capacity: 1024,
            bus_capacity: 64,
        }
    }
}
