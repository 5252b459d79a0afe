//! # SessionScope: sampling and session lifetime.
//!
//! The session owns the sampling decision and the session id, bound together at
//! renewal. It evaluates its timeouts lazily against every event:
//!
//! ```text
//! expired   = now - last_interaction >= session_inactivity   (no interaction yet ⇒ expired)
//! timed_out = now - session_start    >= session_max_duration
//!
//! launch    = ApplicationStarted while the process is in the foreground
//!
//! (interaction || launch) && (no id || expired || timed_out) ──► renew
//! !interaction && expired ──► (background-eligible || ApplicationStarted) && background_tracking
//!                              ? renew : Expired
//! !interaction && timed_out ──► renew
//! ```
//!
//! Records of a session that is not `Tracked` are swallowed by a muted writer;
//! the subtree still runs its bookkeeping.

use uuid::Uuid;

use crate::events::{Attributes, EventTime, FeatureMessage, RawEvent, ViewKey};
use crate::scopes::timing::nanos;
use crate::scopes::{
    Dispatch, Lifecycle, RumContext, Scope, SessionState, StartReason, ViewManagerScope,
};

/// Tracks one session and its view manager.
#[derive(Debug)]
pub struct SessionScope {
    id: Uuid,
    state: SessionState,
    start_reason: StartReason,
    session_start: i64,
    last_interaction: Option<i64>,
    active: bool,
    parent: RumContext,
    view_manager: Option<ViewManagerScope>,
}

impl SessionScope {
    /// Creates a session with no id yet. The first interaction renews it.
    pub fn new(parent: &RumContext, application_displayed: bool, time: EventTime) -> Self {
        let mut session = Self {
            id: Uuid::nil(),
            state: SessionState::NotTracked,
            start_reason: StartReason::UserAppLaunch,
            session_start: time.nanos,
            last_interaction: None,
            active: true,
            parent: parent.clone(),
            view_manager: None,
        };
        let ctx = session.context();
        session.view_manager = Some(ViewManagerScope::new(&ctx, application_displayed));
        session
    }

    pub fn session_id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn start_reason(&self) -> StartReason {
        self.start_reason
    }

    /// Whether the session already displayed a foreground view.
    pub fn application_displayed(&self) -> bool {
        self.view_manager
            .as_ref()
            .is_some_and(ViewManagerScope::application_displayed)
    }

    /// Deepest context of the session: the active view's (and action's) when there
    /// is one, the session's own otherwise.
    pub fn current_context(&self) -> RumContext {
        self.view_manager
            .as_ref()
            .map_or_else(|| self.context(), Scope::context)
    }

    /// Key and attributes of the active foreground view, if any.
    pub fn active_view(&self) -> Option<(ViewKey, Attributes)> {
        self.view_manager.as_ref().and_then(ViewManagerScope::active_view)
    }

    fn renew(&mut self, reason: StartReason, time: EventTime, dispatch: Dispatch<'_>) {
        let services = dispatch.services;
        let keep = services.sampler.keep(services.config.sample_rate_clamped());
        let previous = self.id;

        self.state = if keep {
            SessionState::Tracked
        } else {
            SessionState::NotTracked
        };
        self.id = Uuid::new_v4();
        self.start_reason = reason;
        self.session_start = time.nanos;
        self.last_interaction = Some(time.nanos);

        if let Some(vm) = self.view_manager.as_mut() {
            vm.renew_views(time, services);
        }
        services.session_listener.on_session_started(self.id, !keep);
        tracing::debug!(
            previous = %previous,
            session_id = %self.id,
            reason = reason.as_str(),
            tracked = keep,
            "session renewed"
        );
    }

    fn update_session(&mut self, event: &RawEvent, dispatch: Dispatch<'_>) {
        let config = &dispatch.services.config;
        let time = event.time();
        let now = time.nanos;

        let expired = self
            .last_interaction
            .is_none_or(|last| now - last >= nanos(config.session_inactivity));
        let timed_out = now - self.session_start >= nanos(config.session_max_duration);
        let launch = matches!(event, RawEvent::ApplicationStarted { .. });
        let foreground_launch = launch && dispatch.services.process.is_foreground();

        if event.is_interaction() || foreground_launch {
            let reason = if self.id.is_nil() {
                Some(StartReason::UserAppLaunch)
            } else if expired {
                Some(StartReason::InactivityTimeout)
            } else if timed_out {
                Some(StartReason::MaxDuration)
            } else {
                None
            };
            if let Some(reason) = reason {
                self.renew(reason, time, dispatch);
            }
            self.last_interaction = Some(now);
        } else if expired {
            if config.background_tracking && (event.is_background_eligible() || launch) {
                self.renew(StartReason::BackgroundLaunch, time, dispatch);
            } else {
                self.state = SessionState::Expired;
            }
        } else if timed_out {
            self.renew(StartReason::MaxDuration, time, dispatch);
        }
    }
}

impl Scope for SessionScope {
    fn handle(&mut self, event: &RawEvent, parent: &RumContext, dispatch: Dispatch<'_>) -> Lifecycle {
        self.parent = parent.clone();
        let before = (self.id, self.state);

        match event {
            RawEvent::ResetSession { time } => {
                if self.active {
                    self.renew(StartReason::ExplicitStop, *time, dispatch);
                }
            }
            RawEvent::StopSession { .. } => {
                self.active = false;
                tracing::debug!(session_id = %self.id, "session stopped");
            }
            RawEvent::StartView { .. }
            | RawEvent::StopView { .. }
            | RawEvent::AbandonView { .. }
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
            | RawEvent::SetSyntheticsTestAttribute { .. }
            | RawEvent::ActionSent { .. }
            | RawEvent::ActionDropped { .. }
            | RawEvent::ResourceSent { .. }
            | RawEvent::ResourceDropped { .. }
            | RawEvent::ErrorSent { .. }
            | RawEvent::ErrorDropped { .. }
            | RawEvent::LongTaskSent { .. }
            | RawEvent::LongTaskDropped { .. } => {}
        }

        if self.active {
            self.update_session(event, dispatch);
        }

        if (self.id, self.state) != before && !self.id.is_nil() {
            dispatch.services.bus.publish(FeatureMessage::SessionRenewed {
                session_id: self.id,
                keep_session: self.state == SessionState::Tracked,
            });
        }

        let ctx = self.context();
        let dispatch = dispatch.muted(self.state != SessionState::Tracked);
        if let Some(vm) = self.view_manager.as_mut() {
            if vm.handle(event, &ctx, dispatch) == Lifecycle::Destruct {
                tracing::debug!(session_id = %self.id, "view manager drained");
                self.view_manager = None;
            }
        }

        Lifecycle::keep_if(self.active || self.view_manager.is_some())
    }

    fn context(&self) -> RumContext {
        RumContext {
            session_id: self.id,
            session_state: self.state,
            session_start_reason: self.start_reason,
            is_session_active: self.active,
            ..self.parent.clone()
        }
    }

    fn is_active(&self) -> bool {
        self.active
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::core::RumConfig;
    use crate::events::{ActionType, ErrorSource};
    use crate::testing::{Harness, RecordingSessionListener, at};

    const MINUTE_MS: i64 = 60_000;

    fn root() -> RumContext {
        RumContext::for_application("app-test")
    }

    fn home() -> ViewKey {
        ViewKey::new("home", "home", "Home")
    }

    #[test]
    fn test_first_interaction_assigns_id() {
        let h = Harness::default();
        let mut s = SessionScope::new(&root(), false, at(0));
        assert!(s.session_id().is_nil());

        h.run(&mut s, &root(), RawEvent::start_view(home(), at(0)));

        assert!(!s.session_id().is_nil());
        assert_eq!(s.state(), SessionState::Tracked);
        assert_eq!(s.start_reason(), StartReason::UserAppLaunch);
        assert_eq!(h.storage.views()[0].header.session.id, s.session_id());
    }

    #[test]
    fn test_unsampled_session_writes_nothing() {
        let h = Harness::with_config(RumConfig::default().with_sample_rate(0.0));
        let mut s = SessionScope::new(&root(), false, at(0));

        h.run(&mut s, &root(), RawEvent::start_view(home(), at(0)));
        assert_eq!(s.state(), SessionState::NotTracked);

        h.run(&mut s, &root(), RawEvent::add_error("e", ErrorSource::Source, false, at(1)));
        h.run(&mut s, &root(), RawEvent::start_resource("r", "u", "GET", at(2)));
        h.run(
            &mut s,
            &root(),
            RawEvent::stop_resource("r", Some(200), None, Default::default(), at(3)),
        );
        h.run(&mut s, &root(), RawEvent::StopSession { time: at(4) });

        assert_eq!(h.storage.len(), 0);
        // Pending counters drained through the dropped confirmations.
        assert_eq!(
            h.run(&mut s, &root(), RawEvent::KeepAlive { time: at(5) }),
            Lifecycle::Destruct
        );
    }

    #[test]
    fn test_inactivity_renews_on_interaction() {
        let h = Harness::default();
        let mut s = SessionScope::new(&root(), false, at(0));
        h.run(&mut s, &root(), RawEvent::start_view(home(), at(0)));
        let first = s.session_id();

        h.run(&mut s, &root(), RawEvent::KeepAlive { time: at(16 * MINUTE_MS) });
        assert_eq!(s.state(), SessionState::Expired);
        assert_eq!(s.session_id(), first);

        h.run(
            &mut s,
            &root(),
            RawEvent::start_action(ActionType::Tap, "b", false, at(17 * MINUTE_MS)),
        );
        assert_ne!(s.session_id(), first);
        assert_eq!(s.start_reason(), StartReason::InactivityTimeout);
        assert_eq!(s.state(), SessionState::Tracked);
    }

    #[test]
    fn test_background_event_renews_when_tracking() {
        let config = RumConfig {
            background_tracking: true,
            ..RumConfig::default()
        };
        let h = Harness::with_config(config);
        let mut s = SessionScope::new(&root(), false, at(0));
        h.run(&mut s, &root(), RawEvent::start_view(home(), at(0)));
        let first = s.session_id();

        h.run(
            &mut s,
            &root(),
            RawEvent::add_error("bg", ErrorSource::Source, false, at(20 * MINUTE_MS)),
        );
        assert_ne!(s.session_id(), first);
        assert_eq!(s.start_reason(), StartReason::BackgroundLaunch);
    }

    #[test]
    fn test_max_duration_renews() {
        let config = RumConfig {
            session_max_duration: Duration::from_secs(60),
            ..RumConfig::default()
        };
        let h = Harness::with_config(config);
        let mut s = SessionScope::new(&root(), false, at(0));
        h.run(&mut s, &root(), RawEvent::start_view(home(), at(0)));
        let first = s.session_id();

        h.run(&mut s, &root(), RawEvent::start_action(ActionType::Tap, "a", false, at(30_000)));
        assert_eq!(s.session_id(), first);
        h.run(&mut s, &root(), RawEvent::KeepAlive { time: at(61_000) });
        assert_ne!(s.session_id(), first);
        assert_eq!(s.start_reason(), StartReason::MaxDuration);
    }

    #[test]
    fn test_reset_renews_and_keeps_view_alive() {
        let h = Harness::default();
        let mut s = SessionScope::new(&root(), false, at(0));
        h.run(&mut s, &root(), RawEvent::start_view(home(), at(0)));
        let first = s.session_id();
        let first_view = h.storage.views()[0].header.view.id;

        h.run(&mut s, &root(), RawEvent::ResetSession { time: at(10) });
        assert_ne!(s.session_id(), first);
        assert_eq!(s.start_reason(), StartReason::ExplicitStop);
        assert_eq!(s.active_view().map(|(k, _)| k.id), Some("home".to_string()));

        h.run(&mut s, &root(), RawEvent::KeepAlive { time: at(20) });
        let last = h.storage.views().pop().unwrap();
        assert_eq!(last.header.session.id, s.session_id());
        assert_ne!(last.header.view.id, first_view);
    }

    #[test]
    fn test_session_ids_are_unique_and_sampling_converges() {
        let listener = Arc::new(RecordingSessionListener::default());
        let mut h = Harness::with_config(RumConfig::default().with_sample_rate(40.0));
        h.services.session_listener = listener.clone();
        let mut s = SessionScope::new(&root(), false, at(0));

        for i in 0..2_000 {
            s.handle(&RawEvent::ResetSession { time: at(i) }, &root(), h.dispatch());
        }

        let started = listener.0.lock().unwrap();
        assert_eq!(started.len(), 2_000);
        let ids: HashSet<Uuid> = started.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids.len(), 2_000);
        let kept = started.iter().filter(|(_, discarded)| !discarded).count();
        let ratio = kept as f64 * 100.0 / 2_000.0;
        assert!((35.0..=45.0).contains(&ratio), "ratio {ratio}");
    }

    #[tokio::test]
    async fn test_renewal_published_on_bus() {
        let h = Harness::default();
        let mut rx = h.services.bus.subscribe();
        let mut s = SessionScope::new(&root(), false, at(0));

        h.run(&mut s, &root(), RawEvent::start_view(home(), at(0)));
        h.run(&mut s, &root(), RawEvent::KeepAlive { time: at(1) });

        let msg = rx.recv().await.unwrap();
        assert_eq!(
            msg,
            FeatureMessage::SessionRenewed {
                session_id: s.session_id(),
                keep_session: true
            }
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_stopped_session_destructs_after_drain() {
        let h = Harness::default();
        let mut s = SessionScope::new(&root(), false, at(0));
        h.run(&mut s, &root(), RawEvent::start_view(home(), at(0)));

        let lc = h.run(&mut s, &root(), RawEvent::StopSession { time: at(5) });
        assert_eq!(lc, Lifecycle::Destruct);
        assert!(!s.is_active());
        assert!(!s.context().is_session_active);
    }
}
