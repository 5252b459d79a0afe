//! Callbacks the scope tree notifies. All default to no-ops.

use uuid::Uuid;

use crate::events::{Attributes, ViewKey};

/// Notified when a session id is assigned.
pub trait SessionListener: Send + Sync {
    /// `is_discarded` is `true` when the session was sampled out.
    fn on_session_started(&self, session_id: Uuid, is_discarded: bool);
}

/// Snapshot of a view passed to [`ViewChangedListener`].
#[derive(Debug, Clone, PartialEq)]
pub struct ViewInfo {
    pub key: ViewKey,
    pub attributes: Attributes,
    pub is_active: bool,
}

/// Notified when a view starts, stops or changes its feature flags.
pub trait ViewChangedListener: Send + Sync {
    fn on_view_changed(&self, info: ViewInfo);
}

/// Feeds "time to network settled" computations.
pub trait NetworkSettledListener: Send + Sync {
    fn on_resource_started(&self, resource_id: Uuid, start_nanos: i64);
    fn on_resource_stopped(&self, resource_id: Uuid, stop_nanos: i64);
}

/// Listener that ignores every callback.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopListener;

impl SessionListener for NoopListener {
    fn on_session_started(&self, _session_id: Uuid, _is_discarded: bool) {}
}

impl ViewChangedListener for NoopListener {
    fn on_view_changed(&self, _info: ViewInfo) {}
}

impl NetworkSettledListener for NoopListener {
    fn on_resource_started(&self, _resource_id: Uuid, _start_nanos: i64) {}
    fn on_resource_stopped(&self, _resource_id: Uuid, _stop_nanos: i64) {}
}
