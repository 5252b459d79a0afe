//! # ViewManagerScope: the views of one session.
//!
//! ```text
//! event ──► app-launch view? (first foreground event, once)
//!       ──► delegate to every view, prune completed ones
//!       ──► StartView   ──► new foreground view
//!       ──► StopSession ──► stopped
//!       ──► no active view ──► orphan handling
//! ```
//!
//! ## Orphans
//! An event reaching the manager while no view is active is an orphan. Once the
//! application has displayed a view, or while the process is in the background,
//! background-eligible events open a background view when background tracking is
//! on. Everything else logs a "missing view" warning, unless the event belongs to
//! the silent set (confirmations, keep-alive, ...).

use std::time::Duration;

use crate::collaborators::Services;
use crate::events::{Attributes, EventTime, RawEvent, ViewKey};
use crate::scopes::{Dispatch, Lifecycle, RumContext, Scope, ScopeArena, ViewScope, ViewType};

/// Caller-side id of the synthetic app-launch view.
pub const APP_LAUNCH_VIEW_ID: &str = "com.datadog.application-launch.view";
/// Url of the synthetic app-launch view.
pub const APP_LAUNCH_VIEW_URL: &str = "com/datadog/application-launch/view";
/// Name of the synthetic app-launch view.
pub const APP_LAUNCH_VIEW_NAME: &str = "ApplicationLaunch";

/// Caller-side id of the synthetic background view.
pub const BACKGROUND_VIEW_ID: &str = "com.datadog.background.view";
/// Url of the synthetic background view.
pub const BACKGROUND_VIEW_URL: &str = "com/datadog/background/view";
/// Name of the synthetic background view.
pub const BACKGROUND_VIEW_NAME: &str = "Background";

/// Gaps between two views shorter than this are reported.
const VIEW_GAP_THRESHOLD: Duration = Duration::from_secs(3);

/// Owns the views of one session.
#[derive(Debug)]
pub struct ViewManagerScope {
    views: ScopeArena<ViewScope>,
    parent: RumContext,
    application_displayed: bool,
    launch_started: bool,
    stopped: bool,
    last_stopped_view: Option<EventTime>,
}

impl ViewManagerScope {
    /// Creates a manager. `application_displayed` is `true` when the session replaces
    /// one that already showed a view, so no app-launch view is synthesized.
    pub fn new(parent: &RumContext, application_displayed: bool) -> Self {
        Self {
            views: ScopeArena::default(),
            parent: parent.clone(),
            application_displayed,
            launch_started: false,
            stopped: false,
            last_stopped_view: None,
        }
    }

    /// Whether a foreground view was ever started.
    pub fn application_displayed(&self) -> bool {
        self.application_displayed
    }

    /// Number of views still tracked, completed ones excluded.
    pub fn view_count(&self) -> usize {
        self.views.len()
    }

    /// Key and attributes of the active foreground view, if any.
    pub fn active_view(&self) -> Option<(ViewKey, Attributes)> {
        self.views
            .iter()
            .find(|v| v.is_active() && v.view_type() == ViewType::Foreground)
            .map(|v| (v.key().clone(), v.attributes().clone()))
    }

    /// Gives every active view a new id, after the session id changed.
    pub(crate) fn renew_views(&mut self, time: EventTime, services: &Services) {
        for view in self.views.iter_mut().filter(|v| v.is_active()) {
            view.renew(time, services);
        }
    }

    fn start_launch_view(&mut self, event: &RawEvent, dispatch: Dispatch<'_>) {
        let explicit = matches!(event, RawEvent::ApplicationStarted { .. });
        if self.launch_started || self.application_displayed || self.stopped {
            return;
        }
        if !explicit && !dispatch.services.process.is_foreground() {
            return;
        }

        let time = event.time();
        let startup_nanos = time.nanos - dispatch.services.process.process_start_nanos();
        let key = ViewKey::new(APP_LAUNCH_VIEW_ID, APP_LAUNCH_VIEW_URL, APP_LAUNCH_VIEW_NAME);
        let mut view = ViewScope::new(
            key,
            Attributes::new(),
            time.rewind(startup_nanos),
            ViewType::ApplicationLaunch,
            &self.parent,
            dispatch.services,
        );
        self.launch_started = true;
        tracing::debug!(startup_nanos, explicit, "app-launch view started");

        // An explicit ApplicationStarted reaches the view through the normal delegation.
        if !explicit {
            let started = RawEvent::ApplicationStarted { startup_nanos, time };
            if view.handle(&started, &self.parent, dispatch) == Lifecycle::Destruct {
                return;
            }
        }
        self.views.insert(view);
    }

    fn start_foreground_view(
        &mut self,
        key: &ViewKey,
        attributes: &Attributes,
        time: EventTime,
        dispatch: Dispatch<'_>,
    ) {
        let services = dispatch.services;
        let mut view = ViewScope::new(
            key.clone(),
            attributes.clone(),
            time,
            ViewType::Foreground,
            &self.parent,
            services,
        );
        self.application_displayed = true;
        view.handle(&RawEvent::KeepAlive { time }, &self.parent, dispatch);
        view.notify_changed(services);
        self.views.insert(view);

        if let Some(stopped) = self.last_stopped_view {
            let gap = time.nanos - stopped.nanos;
            let threshold = i64::try_from(VIEW_GAP_THRESHOLD.as_nanos()).unwrap_or(i64::MAX);
            if (1..threshold).contains(&gap) {
                tracing::info!(target: "rumscope::telemetry", gap_ns = gap, view = %key.name, "gap between views");
            } else if gap < 0 {
                tracing::info!(target: "rumscope::telemetry", gap_ns = gap, view = %key.name, "negative gap between views");
            }
        }
    }

    fn start_background_view(&mut self, event: &RawEvent, dispatch: Dispatch<'_>) {
        let key = ViewKey::new(BACKGROUND_VIEW_ID, BACKGROUND_VIEW_URL, BACKGROUND_VIEW_NAME);
        let mut view = ViewScope::new(
            key,
            Attributes::new(),
            event.time(),
            ViewType::Background,
            &self.parent,
            dispatch.services,
        );
        tracing::debug!(event = event.as_label(), "background view started");
        if view.handle(event, &self.parent, dispatch) == Lifecycle::Keep {
            self.views.insert(view);
        }
    }

    fn handle_orphan(&mut self, event: &RawEvent, dispatch: Dispatch<'_>) {
        let services = dispatch.services;
        let in_background = self.application_displayed || !services.process.is_foreground();

        if in_background {
            if matches!(event, RawEvent::AddError { is_anr: true, .. }) {
                tracing::debug!("ANR with no active view ignored");
                return;
            }
            if services.config.background_tracking && event.is_background_eligible() {
                self.start_background_view(event, dispatch);
                return;
            }
        }

        if matches!(event, RawEvent::AddViewLoadingTime { .. }) {
            tracing::warn!(
                target: "rumscope::user",
                "no active view to add the loading time to"
            );
        } else if !event.is_silent_orphan() {
            tracing::warn!(
                target: "rumscope::user",
                event = event.as_label(),
                "a RUM event was detected, but no view is active"
            );
        }
    }
}

impl Scope for ViewManagerScope {
    fn handle(&mut self, event: &RawEvent, parent: &RumContext, dispatch: Dispatch<'_>) -> Lifecycle {
        self.parent = parent.clone();
        self.start_launch_view(event, dispatch);

        self.views.delegate(event, parent, dispatch);

        match event {
            RawEvent::StartView {
                key,
                attributes,
                time,
            } => {
                if !self.stopped {
                    self.start_foreground_view(key, attributes, *time, dispatch);
                }
            }
            RawEvent::StopView { time, .. } => {
                self.last_stopped_view = Some(*time);
                if self.views.active_count() == 0 {
                    self.handle_orphan(event, dispatch);
                }
            }
            RawEvent::StopSession { .. } => {
                self.stopped = true;
            }
            RawEvent::AbandonView { .. }
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
            | RawEvent::ApplicationStarted { .. }
            | RawEvent::KeepAlive { .. }
            | RawEvent::ResetSession { .. }
            | RawEvent::SetSyntheticsTestAttribute { .. }
            | RawEvent::ActionSent { .. }
            | RawEvent::ActionDropped { .. }
            | RawEvent::ResourceSent { .. }
            | RawEvent::ResourceDropped { .. }
            | RawEvent::ErrorSent { .. }
            | RawEvent::ErrorDropped { .. }
            | RawEvent::LongTaskSent { .. }
            | RawEvent::LongTaskDropped { .. } => {
                if !self.stopped && self.views.active_count() == 0 {
                    self.handle_orphan(event, dispatch);
                }
            }
        }

        let active = self.views.active_count();
        if active > 1 {
            tracing::warn!(
                target: "rumscope::telemetry",
                active,
                event = event.as_label(),
                "more than one active view"
            );
        }

        Lifecycle::keep_if(!(self.stopped && self.views.is_empty()))
    }

    fn context(&self) -> RumContext {
        self.views
            .iter()
            .find(|v| v.is_active())
            .map_or_else(|| self.parent.clone(), Scope::context)
    }

    fn is_active(&self) -> bool {
        !self.stopped
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use uuid::Uuid;

    use super::*;
    use crate::collaborators::StaticProcessInfo;
    use crate::core::RumConfig;
    use crate::events::{ActionType, ErrorSource};
    use crate::scopes::SessionState;
    use crate::testing::{Harness, RecordingViewListener, at};

    fn session_ctx() -> RumContext {
        RumContext {
            session_id: Uuid::new_v4(),
            session_state: SessionState::Tracked,
            is_session_active: true,
            ..RumContext::for_application("app-test")
        }
    }

    fn key(id: &str) -> ViewKey {
        ViewKey::new(id, id, id)
    }

    #[test]
    fn test_start_view_replaces_previous() {
        let mut h = Harness::default();
        let listener = Arc::new(RecordingViewListener::default());
        h.services.view_changed = listener.clone();
        let parent = session_ctx();
        let mut vm = ViewManagerScope::new(&parent, false);

        h.run(&mut vm, &parent, RawEvent::start_view(key("a"), at(0)));
        h.run(&mut vm, &parent, RawEvent::start_view(key("b"), at(10)));

        assert_eq!(vm.view_count(), 1);
        assert_eq!(vm.context().view_name.as_deref(), Some("b"));
        assert!(vm.application_displayed());
        assert_eq!(vm.active_view().map(|(k, _)| k.id), Some("b".to_string()));

        let infos = listener.0.lock().unwrap();
        assert_eq!(infos.len(), 3);
        assert!(!infos[1].is_active);
    }

    #[test]
    fn test_launch_view_in_foreground() {
        let mut h = Harness::default();
        h.services.process = Arc::new(StaticProcessInfo::new(true, 0));
        let parent = session_ctx();
        let mut vm = ViewManagerScope::new(&parent, false);

        h.run(&mut vm, &parent, RawEvent::start_action(ActionType::Tap, "go", false, at(400)));

        let actions = h.storage.actions();
        assert_eq!(actions[0].action_type, ActionType::ApplicationStart);
        assert_eq!(actions[0].loading_time_nanos, 400_000_000);
        assert_eq!(actions[0].header.view.name.as_deref(), Some(APP_LAUNCH_VIEW_NAME));
        assert_eq!(vm.context().view_type, ViewType::ApplicationLaunch);

        // Only once per manager.
        h.run(&mut vm, &parent, RawEvent::start_view(key("home"), at(500)));
        h.run(&mut vm, &parent, RawEvent::KeepAlive { time: at(600) });
        assert_eq!(
            h.storage
                .actions()
                .iter()
                .filter(|a| a.action_type == ActionType::ApplicationStart)
                .count(),
            1
        );
    }

    #[test]
    fn test_explicit_application_started_counted_once() {
        let mut h = Harness::default();
        h.services.process = Arc::new(StaticProcessInfo::new(true, 0));
        let parent = session_ctx();
        let mut vm = ViewManagerScope::new(&parent, false);

        h.run(
            &mut vm,
            &parent,
            RawEvent::ApplicationStarted {
                startup_nanos: 120_000_000,
                time: at(120),
            },
        );
        assert_eq!(h.storage.actions().len(), 1);
    }

    #[test]
    fn test_no_launch_view_in_background() {
        let h = Harness::default();
        let parent = session_ctx();
        let mut vm = ViewManagerScope::new(&parent, false);

        h.run(&mut vm, &parent, RawEvent::KeepAlive { time: at(0) });
        assert_eq!(vm.view_count(), 0);
        assert_eq!(h.storage.len(), 0);
    }

    #[test]
    fn test_orphan_opens_background_view_when_tracking() {
        let config = RumConfig {
            background_tracking: true,
            ..RumConfig::default()
        };
        let h = Harness::with_config(config);
        let parent = session_ctx();
        let mut vm = ViewManagerScope::new(&parent, false);

        h.run(&mut vm, &parent, RawEvent::add_error("bg", ErrorSource::Source, false, at(5)));

        assert_eq!(vm.view_count(), 1);
        assert_eq!(vm.context().view_type, ViewType::Background);
        let errors = h.storage.errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].header.view.url, BACKGROUND_VIEW_URL);
    }

    #[test]
    fn test_orphan_without_tracking_is_dropped() {
        let h = Harness::default();
        let parent = session_ctx();
        let mut vm = ViewManagerScope::new(&parent, true);

        h.run(&mut vm, &parent, RawEvent::add_error("lost", ErrorSource::Source, false, at(5)));
        assert_eq!(vm.view_count(), 0);
        assert_eq!(h.storage.len(), 0);
    }

    #[test]
    fn test_background_anr_is_ignored() {
        let config = RumConfig {
            background_tracking: true,
            ..RumConfig::default()
        };
        let h = Harness::with_config(config);
        let parent = session_ctx();
        let mut vm = ViewManagerScope::new(&parent, true);
        let anr = RawEvent::AddError {
            message: "anr".into(),
            source: ErrorSource::Source,
            stacktrace: None,
            error_type: None,
            is_fatal: false,
            is_anr: true,
            attributes: Attributes::new(),
            time: at(1),
        };
        h.run(&mut vm, &parent, anr);
        assert_eq!(vm.view_count(), 0);
    }

    #[test]
    fn test_stop_session_drains_then_destructs() {
        let h = Harness::default();
        let parent = session_ctx();
        let mut vm = ViewManagerScope::new(&parent, false);

        h.run(&mut vm, &parent, RawEvent::start_view(key("a"), at(0)));
        h.run(&mut vm, &parent, RawEvent::start_resource("r", "u", "GET", at(1)));
        assert_eq!(
            h.run(&mut vm, &parent, RawEvent::StopSession { time: at(2) }),
            Lifecycle::Keep
        );
        assert!(!vm.is_active());

        h.run(&mut vm, &parent, RawEvent::start_view(key("b"), at(3)));
        assert_eq!(vm.view_count(), 1);

        let lc = h.run(
            &mut vm,
            &parent,
            RawEvent::stop_resource("r", Some(200), None, Default::default(), at(4)),
        );
        assert_eq!(lc, Lifecycle::Destruct);
    }

    #[test]
    fn test_renew_views_changes_active_ids() {
        let h = Harness::default();
        let parent = session_ctx();
        let mut vm = ViewManagerScope::new(&parent, false);
        h.run(&mut vm, &parent, RawEvent::start_view(key("a"), at(0)));
        let before = vm.context().view_id;

        vm.renew_views(at(5), &h.services);
        assert_ne!(vm.context().view_id, before);
        assert_eq!(vm.context().view_name.as_deref(), Some("a"));
    }
}
