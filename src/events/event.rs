//! # Raw events fed into the scope tree.
//!
//! [`RawEvent`] is the closed set of inputs the scope tree reacts to. Variants fall
//! into three groups:
//! - **Instrumentation events**: produced by call sites (views, actions, resources,
//!   errors, long tasks, timings, feature flags, session control).
//! - **Confirmation events**: produced by the storage boundary after a write attempt
//!   (`*Sent` / `*Dropped`); they drain a view's pending counters.
//! - **Internal events**: synthesized by scopes themselves (`ApplicationStarted`,
//!   `KeepAlive`, `SendCustomActionNow`).
//!
//! Every variant carries an [`EventTime`]: a wall-clock timestamp (ms) used for
//! record dates, and a monotonic tick (ns) used for every duration and timeout.
//!
//! ## Example
//! ```rust
//! use rumscope::{EventTime, RawEvent, ViewKey};
//!
//! let time = EventTime::new(1_700_000_000_000, 5_000_000);
//! let ev = RawEvent::start_view(ViewKey::new("home", "app/home", "Home"), time);
//!
//! assert!(ev.is_interaction());
//! assert_eq!(ev.time().nanos, 5_000_000);
//! ```

use std::collections::BTreeMap;
use std::sync::OnceLock;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Free-form attribute map attached to events, views and records.
pub type Attributes = BTreeMap<String, serde_json::Value>;

/// Process-wide anchor for monotonic ticks produced by [`EventTime::now`].
static MONOTONIC_ANCHOR: OnceLock<Instant> = OnceLock::new();

/// Timestamp pair carried by every event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EventTime {
    /// Wall-clock time in milliseconds since the Unix epoch.
    pub timestamp_ms: i64,
    /// Monotonic tick in nanoseconds. Only differences between ticks are meaningful.
    pub nanos: i64,
}

impl EventTime {
    /// Creates a timestamp pair from explicit values.
    #[must_use]
    pub const fn new(timestamp_ms: i64, nanos: i64) -> Self {
        Self {
            timestamp_ms,
            nanos,
        }
    }

    /// Captures the current wall clock and monotonic tick.
    #[must_use]
    pub fn now() -> Self {
        let anchor = MONOTONIC_ANCHOR.get_or_init(Instant::now);
        let nanos = i64::try_from(anchor.elapsed().as_nanos()).unwrap_or(i64::MAX);
        let timestamp_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
            .unwrap_or(0);
        Self {
            timestamp_ms,
            nanos,
        }
    }

    /// Returns a copy shifted back by `nanos` on both clocks.
    #[must_use]
    pub fn rewind(self, nanos: i64) -> Self {
        Self {
            timestamp_ms: self.timestamp_ms - nanos / 1_000_000,
            nanos: self.nanos - nanos,
        }
    }
}

/// Identity of a view as supplied by the instrumentation layer.
///
/// Two keys refer to the same view when their `id` matches; `url` and `name`
/// are descriptive only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewKey {
    /// Caller-side identity of the view.
    pub id: String,
    /// View url, reported in records.
    pub url: String,
    /// Human-readable view name.
    pub name: String,
}

impl ViewKey {
    /// Creates a new view key.
    pub fn new(id: impl Into<String>, url: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            name: name.into(),
        }
    }

    /// Returns `true` when both keys identify the same view.
    #[inline]
    pub fn same_view(&self, other: &ViewKey) -> bool {
        self.id == other.id
    }
}

/// Kind of user action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Tap,
    Scroll,
    Swipe,
    Click,
    Back,
    Custom,
    ApplicationStart,
}

/// Kind of network resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Xhr,
    Fetch,
    Native,
    Image,
    Font,
    Css,
    Js,
    Media,
    Document,
    Beacon,
    Other,
    #[default]
    Unknown,
}

/// Origin of a reported error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorSource {
    Network,
    Source,
    Console,
    Logger,
    Agent,
    WebView,
}

/// Network timing breakdown of a resource, in nanoseconds.
///
/// Each phase is expressed as a start offset (relative to the resource start)
/// and a duration; a phase with a zero or negative duration is omitted from the
/// emitted record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceTiming {
    pub dns_start: i64,
    pub dns_duration: i64,
    pub connect_start: i64,
    pub connect_duration: i64,
    pub ssl_start: i64,
    pub ssl_duration: i64,
    pub first_byte_start: i64,
    pub first_byte_duration: i64,
    pub download_start: i64,
    pub download_duration: i64,
}

/// Record category the storage boundary reports back on.
///
/// Scopes hand one of these to the writer together with the record; the writer
/// turns it into the matching `*Sent` or `*Dropped` event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageEvent {
    Action {
        view_id: Uuid,
        frustration_count: u32,
        action_type: ActionType,
        end_nanos: i64,
    },
    Resource {
        view_id: Uuid,
    },
    Error {
        view_id: Uuid,
    },
    LongTask {
        view_id: Uuid,
        is_frozen_frame: bool,
    },
}

impl StorageEvent {
    /// Confirmation emitted after a successful write.
    #[must_use]
    pub fn sent(self, time: EventTime) -> RawEvent {
        match self {
            StorageEvent::Action {
                view_id,
                frustration_count,
                action_type,
                end_nanos,
            } => RawEvent::ActionSent {
                view_id,
                frustration_count,
                action_type,
                end_nanos,
                time,
            },
            StorageEvent::Resource { view_id } => RawEvent::ResourceSent { view_id, time },
            StorageEvent::Error { view_id } => RawEvent::ErrorSent { view_id, time },
            StorageEvent::LongTask {
                view_id,
                is_frozen_frame,
            } => RawEvent::LongTaskSent {
                view_id,
                is_frozen_frame,
                time,
            },
        }
    }

    /// Confirmation emitted after a failed or swallowed write.
    #[must_use]
    pub fn dropped(self, time: EventTime) -> RawEvent {
        match self {
            StorageEvent::Action { view_id, .. } => RawEvent::ActionDropped { view_id, time },
            StorageEvent::Resource { view_id } => RawEvent::ResourceDropped { view_id, time },
            StorageEvent::Error { view_id } => RawEvent::ErrorDropped { view_id, time },
            StorageEvent::LongTask {
                view_id,
                is_frozen_frame,
            } => RawEvent::LongTaskDropped {
                view_id,
                is_frozen_frame,
                time,
            },
        }
    }
}

/// Input of the scope tree.
///
/// Matching on this enum is exhaustive in every scope: adding a variant forces
/// each scope to decide how it reacts.
#[derive(Debug, Clone, PartialEq)]
pub enum RawEvent {
    // === Views ===
    /// A view became visible.
    StartView {
        key: ViewKey,
        attributes: Attributes,
        time: EventTime,
    },
    /// A view is no longer visible.
    StopView {
        key: ViewKey,
        attributes: Attributes,
        time: EventTime,
    },
    /// The caller lost its handle on the view `key`; the next `StopView`
    /// stops that view whatever key it carries.
    AbandonView { key: ViewKey, time: EventTime },
    /// Adds attributes to the active view.
    AddViewAttributes {
        attributes: Attributes,
        time: EventTime,
    },
    /// Removes attributes from the active view.
    RemoveViewAttributes {
        keys: Vec<String>,
        time: EventTime,
    },
    /// Marks the active view as loaded.
    AddViewLoadingTime {
        overwrite: bool,
        time: EventTime,
    },
    /// Records a named timing relative to the view start.
    AddCustomTiming {
        name: String,
        time: EventTime,
    },
    /// Records one feature flag evaluation on the active view.
    AddFeatureFlagEvaluation {
        name: String,
        value: serde_json::Value,
        time: EventTime,
    },
    /// Records several feature flag evaluations at once.
    AddFeatureFlagEvaluations {
        flags: Attributes,
        time: EventTime,
    },

    // === Actions ===
    /// A user action started.
    StartAction {
        action_type: ActionType,
        name: String,
        wait_for_stop: bool,
        attributes: Attributes,
        time: EventTime,
    },
    /// A user action that waited for stop was stopped; may rename or retype it.
    StopAction {
        action_type: Option<ActionType>,
        name: Option<String>,
        attributes: Attributes,
        time: EventTime,
    },
    /// Forces an action to emit now.
    SendCustomActionNow { time: EventTime },

    // === Resources ===
    /// A network call started.
    StartResource {
        key: String,
        url: String,
        method: String,
        attributes: Attributes,
        time: EventTime,
    },
    /// Timing for `key` will arrive later through `AddResourceTiming`.
    WaitForResourceTiming { key: String, time: EventTime },
    /// Timing details for `key`.
    AddResourceTiming {
        key: String,
        timing: ResourceTiming,
        time: EventTime,
    },
    /// A network call completed.
    StopResource {
        key: String,
        status_code: Option<i64>,
        size: Option<i64>,
        kind: ResourceKind,
        attributes: Attributes,
        time: EventTime,
    },
    /// A network call failed with an error value.
    StopResourceWithError {
        key: String,
        status_code: Option<i64>,
        message: String,
        source: ErrorSource,
        error_type: Option<String>,
        stacktrace: Option<String>,
        attributes: Attributes,
        time: EventTime,
    },
    /// A network call failed and only a textual stack trace is available.
    StopResourceWithStackTrace {
        key: String,
        status_code: Option<i64>,
        message: String,
        source: ErrorSource,
        stacktrace: String,
        error_type: Option<String>,
        attributes: Attributes,
        time: EventTime,
    },
    /// The caller lost its handle on `key`; the resource will never be stopped.
    AbandonResource { key: String, time: EventTime },

    // === Errors & long tasks ===
    /// An error was reported.
    AddError {
        message: String,
        source: ErrorSource,
        stacktrace: Option<String>,
        error_type: Option<String>,
        is_fatal: bool,
        is_anr: bool,
        attributes: Attributes,
        time: EventTime,
    },
    /// The main thread was blocked for `duration_nanos`.
    AddLongTask {
        duration_nanos: i64,
        target: String,
        time: EventTime,
    },

    // === Application & session ===
    /// The application finished starting; `startup_nanos` is the launch latency.
    ApplicationStarted { startup_nanos: i64, time: EventTime },
    /// Refreshes the active view without changing its state.
    KeepAlive { time: EventTime },
    /// Forces a new session on the next event.
    ResetSession { time: EventTime },
    /// Ends the current session.
    StopSession { time: EventTime },
    /// Tags subsequent records with a synthetics test.
    SetSyntheticsTestAttribute {
        test_id: String,
        result_id: String,
        time: EventTime,
    },

    // === Confirmations ===
    ActionSent {
        view_id: Uuid,
        frustration_count: u32,
        action_type: ActionType,
        end_nanos: i64,
        time: EventTime,
    },
    ActionDropped { view_id: Uuid, time: EventTime },
    ResourceSent { view_id: Uuid, time: EventTime },
    ResourceDropped { view_id: Uuid, time: EventTime },
    ErrorSent { view_id: Uuid, time: EventTime },
    ErrorDropped { view_id: Uuid, time: EventTime },
    LongTaskSent {
        view_id: Uuid,
        is_frozen_frame: bool,
        time: EventTime,
    },
    LongTaskDropped {
        view_id: Uuid,
        is_frozen_frame: bool,
        time: EventTime,
    },
}

impl RawEvent {
    /// Returns the event time.
    pub fn time(&self) -> EventTime {
        match self {
            RawEvent::StartView { time, .. }
            | RawEvent::StopView { time, .. }
            | RawEvent::AbandonView { time, .. }
            | RawEvent::AddViewAttributes { time, .. }
            | RawEvent::RemoveViewAttributes { time, .. }
            | RawEvent::AddViewLoadingTime { time, .. }
            | RawEvent::AddCustomTiming { time, .. }
            | RawEvent::AddFeatureFlagEvaluation { time, .. }
            | RawEvent::AddFeatureFlagEvaluations { time, .. }
            | RawEvent::StartAction { time, .. }
            | RawEvent::StopAction { time, .. }
            | RawEvent::SendCustomActionNow { time }
            | RawEvent::StartResource { time, .. }
            | RawEvent::WaitForResourceTiming { time, .. }
            | RawEvent::AddResourceTiming { time, .. }
            | RawEvent::StopResource { time, .. }
            | RawEvent::StopResourceWithError { time, .. }
            | RawEvent::StopResourceWithStackTrace { time, .. }
            | RawEvent::AbandonResource { time, .. }
            | RawEvent::AddError { time, .. }
            | RawEvent::AddLongTask { time, .. }
            | RawEvent::ApplicationStarted { time, .. }
            | RawEvent::KeepAlive { time }
            | RawEvent::ResetSession { time }
            | RawEvent::StopSession { time }
            | RawEvent::SetSyntheticsTestAttribute { time, .. }
            | RawEvent::ActionSent { time, .. }
            | RawEvent::ActionDropped { time, .. }
            | RawEvent::ResourceSent { time, .. }
            | RawEvent::ResourceDropped { time, .. }
            | RawEvent::ErrorSent { time, .. }
            | RawEvent::ErrorDropped { time, .. }
            | RawEvent::LongTaskSent { time, .. }
            | RawEvent::LongTaskDropped { time, .. } => *time,
        }
    }

    /// Returns `true` for events that count as a user interaction
    /// (they may start or renew a session).
    #[inline]
    pub fn is_interaction(&self) -> bool {
        matches!(
            self,
            RawEvent::StartView { .. } | RawEvent::StartAction { .. }
        )
    }

    /// Returns `true` for events allowed to open a background view when no
    /// foreground view is active.
    #[inline]
    pub fn is_background_eligible(&self) -> bool {
        matches!(
            self,
            RawEvent::AddError { .. } | RawEvent::StartAction { .. } | RawEvent::StartResource { .. }
        )
    }

    /// Returns `true` for events that reach a view-less session without a warning.
    pub fn is_silent_orphan(&self) -> bool {
        match self {
            RawEvent::ApplicationStarted { .. }
            | RawEvent::KeepAlive { .. }
            | RawEvent::ResetSession { .. }
            | RawEvent::StopView { .. }
            | RawEvent::AbandonView { .. }
            | RawEvent::ActionSent { .. }
            | RawEvent::ActionDropped { .. }
            | RawEvent::ResourceSent { .. }
            | RawEvent::ResourceDropped { .. }
            | RawEvent::ErrorSent { .. }
            | RawEvent::ErrorDropped { .. }
            | RawEvent::LongTaskSent { .. }
            | RawEvent::LongTaskDropped { .. } => true,
            RawEvent::StartView { .. }
            | RawEvent::AddViewAttributes { .. }
            | RawEvent::RemoveViewAttributes { .. }
            | RawEvent::AddViewLoadingTime { .. }
            | RawEvent::AddCustomTiming { .. }
            | RawEvent::AddFeatureFlagEvaluation { .. }
            | RawEvent::AddFeatureFlagEvaluations { .. }
            | RawEvent::StartAction { .. }
            | RawEvent::StopAction { .. }
            | RawEvent::SendCustomActionNow { .. }
            | RawEvent::StartResource { .. }
            | RawEvent::WaitForResourceTiming { .. }
            | RawEvent::AddResourceTiming { .. }
            | RawEvent::StopResource { .. }
            | RawEvent::StopResourceWithError { .. }
            | RawEvent::StopResourceWithStackTrace { .. }
            | RawEvent::AbandonResource { .. }
            | RawEvent::AddError { .. }
            | RawEvent::AddLongTask { .. }
            | RawEvent::StopSession { .. }
            | RawEvent::SetSyntheticsTestAttribute { .. } => false,
        }
    }

    /// Short stable name of the variant, used in log fields.
    pub fn as_label(&self) -> &'static str {
        match self {
            RawEvent::StartView { .. } => "start_view",
            RawEvent::StopView { .. } => "stop_view",
            RawEvent::AbandonView { .. } => "abandon_view",
            RawEvent::AddViewAttributes { .. } => "add_view_attributes",
            RawEvent::RemoveViewAttributes { .. } => "remove_view_attributes",
            RawEvent::AddViewLoadingTime { .. } => "add_view_loading_time",
            RawEvent::AddCustomTiming { .. } => "add_custom_timing",
            RawEvent::AddFeatureFlagEvaluation { .. } => "add_feature_flag_evaluation",
            RawEvent::AddFeatureFlagEvaluations { .. } => "add_feature_flag_evaluations",
            RawEvent::StartAction { .. } => "start_action",
            RawEvent::StopAction { .. } => "stop_action",
            RawEvent::SendCustomActionNow { .. } => "send_custom_action_now",
            RawEvent::StartResource { .. } => "start_resource",
            RawEvent::WaitForResourceTiming { .. } => "wait_for_resource_timing",
            RawEvent::AddResourceTiming { .. } => "add_resource_timing",
            RawEvent::StopResource { .. } => "stop_resource",
            RawEvent::StopResourceWithError { .. } => "stop_resource_with_error",
            RawEvent::StopResourceWithStackTrace { .. } => "stop_resource_with_stack_trace",
            RawEvent::AbandonResource { .. } => "abandon_resource",
            RawEvent::AddError { .. } => "add_error",
            RawEvent::AddLongTask { .. } => "add_long_task",
            RawEvent::ApplicationStarted { .. } => "application_started",
            RawEvent::KeepAlive { .. } => "keep_alive",
            RawEvent::ResetSession { .. } => "reset_session",
            RawEvent::StopSession { .. } => "stop_session",
            RawEvent::SetSyntheticsTestAttribute { .. } => "set_synthetics_test_attribute",
            RawEvent::ActionSent { .. } => "action_sent",
            RawEvent::ActionDropped { .. } => "action_dropped",
            RawEvent::ResourceSent { .. } => "resource_sent",
            RawEvent::ResourceDropped { .. } => "resource_dropped",
            RawEvent::ErrorSent { .. } => "error_sent",
            RawEvent::ErrorDropped { .. } => "error_dropped",
            RawEvent::LongTaskSent { .. } => "long_task_sent",
            RawEvent::LongTaskDropped { .. } => "long_task_dropped",
        }
    }

    // --- constructors for the common shapes ---

    /// `StartView` without attributes.
    pub fn start_view(key: ViewKey, time: EventTime) -> Self {
        RawEvent::StartView {
            key,
            attributes: Attributes::new(),
            time,
        }
    }

    /// `StopView` without attributes.
    pub fn stop_view(key: ViewKey, time: EventTime) -> Self {
        RawEvent::StopView {
            key,
            attributes: Attributes::new(),
            time,
        }
    }

    /// `StartAction` without attributes.
    pub fn start_action(
        action_type: ActionType,
        name: impl Into<String>,
        wait_for_stop: bool,
        time: EventTime,
    ) -> Self {
        RawEvent::StartAction {
            action_type,
            name: name.into(),
            wait_for_stop,
            attributes: Attributes::new(),
            time,
        }
    }

    /// `StartResource` without attributes.
    pub fn start_resource(
        key: impl Into<String>,
        url: impl Into<String>,
        method: impl Into<String>,
        time: EventTime,
    ) -> Self {
        RawEvent::StartResource {
            key: key.into(),
            url: url.into(),
            method: method.into(),
            attributes: Attributes::new(),
            time,
        }
    }

    /// `StopResource` without attributes.
    pub fn stop_resource(
        key: impl Into<String>,
        status_code: Option<i64>,
        size: Option<i64>,
        kind: ResourceKind,
        time: EventTime,
    ) -> Self {
        RawEvent::StopResource {
            key: key.into(),
            status_code,
            size,
            kind,
            attributes: Attributes::new(),
            time,
        }
    }

    /// Non-ANR `AddError` without attributes.
    pub fn add_error(
        message: impl Into<String>,
        source: ErrorSource,
        is_fatal: bool,
        time: EventTime,
    ) -> Self {
        RawEvent::AddError {
            message: message.into(),
            source,
            stacktrace: None,
            error_type: None,
            is_fatal,
            is_anr: false,
            attributes: Attributes::new(),
            time,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rewind_moves_both_clocks() {
        let t = EventTime::new(10_000, 5_000_000_000).rewind(2_000_000_000);
        assert_eq!(t, EventTime::new(8_000, 3_000_000_000));
    }

    #[test]
    fn test_now_is_monotonic() {
        let a = EventTime::now();
        let b = EventTime::now();
        assert!(b.nanos >= a.nanos);
        assert!(a.timestamp_ms > 0);
    }

    #[test]
    fn test_storage_event_confirmations() {
        let view_id = Uuid::new_v4();
        let time = EventTime::new(1, 1);
        let sent = StorageEvent::LongTask {
            view_id,
            is_frozen_frame: true,
        }
        .sent(time);
        assert_eq!(
            sent,
            RawEvent::LongTaskSent {
                view_id,
                is_frozen_frame: true,
                time
            }
        );

        let dropped = StorageEvent::Action {
            view_id,
            frustration_count: 1,
            action_type: ActionType::Tap,
            end_nanos: 9,
        }
        .dropped(time);
        assert_eq!(dropped, RawEvent::ActionDropped { view_id, time });
    }

    #[test]
    fn test_event_classification() {
        let t = EventTime::new(0, 0);
        assert!(RawEvent::start_action(ActionType::Tap, "ok", false, t).is_interaction());
        assert!(!RawEvent::KeepAlive { time: t }.is_interaction());
        assert!(RawEvent::start_resource("k", "u", "GET", t).is_background_eligible());
        assert!(RawEvent::KeepAlive { time: t }.is_silent_orphan());
        assert!(!RawEvent::add_error("e", ErrorSource::Source, false, t).is_silent_orphan());
        let abandon = RawEvent::AbandonView {
            key: ViewKey::new("v", "v", "V"),
            time: t,
        };
        assert!(abandon.is_silent_orphan());
        assert!(!abandon.is_background_eligible());
        assert_eq!(RawEvent::StopSession { time: t }.as_label(), "stop_session");
    }

    #[test]
    fn test_resource_timing_tolerates_partial_json() {
        let timing: ResourceTiming =
            serde_json::from_value(serde_json::json!({ "dns_start": 5, "dns_duration": 10 }))
                .unwrap();
        assert_eq!(timing.dns_duration, 10);
        assert_eq!(timing.download_duration, 0);
    }
}
