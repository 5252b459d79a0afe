//! # Shared feature context.
//!
//! A process-wide map `feature name -> (key -> value)` through which SDK features
//! share correlation data:
//!
//! ```text
//! "rum"            ◄── ApplicationScope publishes application/session/view ids
//! "session-replay" ──► ViewScope reads has_replay and per-view records count,
//!                      and removes its view id once complete
//! ```

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::events::Attributes;

/// Feature key under which the RUM context is published.
pub const RUM_FEATURE: &str = "rum";
/// Feature key of the session replay feature.
pub const SESSION_REPLAY_FEATURE: &str = "session-replay";
/// Session replay entry telling whether replay is recording.
pub const HAS_REPLAY_KEY: &str = "has_replay";

/// Thread-safe, cloneable feature context map.
#[derive(Debug, Clone, Default)]
pub struct FeatureContext {
    inner: Arc<RwLock<HashMap<String, Attributes>>>,
}

impl FeatureContext {
    /// Creates an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the entries of `feature` (empty when unknown).
    pub fn get(&self, feature: &str) -> Attributes {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(feature)
            .cloned()
            .unwrap_or_default()
    }

    /// Replaces the entries of `feature`.
    pub fn set(&self, feature: &str, entries: Attributes) {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(feature.to_string(), entries);
    }

    /// Mutates the entries of `feature` in place.
    pub fn update<F>(&self, feature: &str, f: F)
    where
        F: FnOnce(&mut Attributes),
    {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        f(guard.entry(feature.to_string()).or_default());
    }

    /// Whether session replay reported recording for `view_id`'s session.
    pub fn has_replay(&self, view_id: &str) -> bool {
        let replay = self.get(SESSION_REPLAY_FEATURE);
        replay
            .get(HAS_REPLAY_KEY)
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false)
            || replay.get(view_id).and_then(serde_json::Value::as_u64).unwrap_or(0) > 0
    }

    /// Replay records reported for `view_id`.
    pub fn replay_records_count(&self, view_id: &str) -> Option<u64> {
        self.get(SESSION_REPLAY_FEATURE)
            .get(view_id)
            .and_then(serde_json::Value::as_u64)
    }
}
