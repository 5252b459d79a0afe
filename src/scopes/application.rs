//! # ApplicationScope: root of the scope tree.
//!
//! Holds every session still alive: at most one active, older ones draining their
//! pending records. The first event of any kind opens a session with no id yet, so
//! the session rules (background launch, foreground launch) see it. Afterwards an
//! interaction arriving with no active session creates a new one before delegation,
//! so the interaction itself is not lost.
//!
//! ```text
//! event ──► SetSyntheticsTestAttribute? ──► store test/result ids
//!       ──► first event ever ──► new SessionScope
//!       ──► no active session && interaction ──► new SessionScope
//!                                  └─ StartAction: replay StartView(last known view)
//!       ──► delegate to every session, prune drained ones
//!       ──► publish the current context under "rum"
//! ```

use crate::collaborators::RUM_FEATURE;
use crate::events::{Attributes, RawEvent, ViewKey};
use crate::scopes::{Dispatch, Lifecycle, RumContext, Scope, ScopeArena, SessionScope};

/// Root scope. Always active.
#[derive(Debug)]
pub struct ApplicationScope {
    application_id: String,
    synthetics: Option<(String, String)>,
    sessions: ScopeArena<SessionScope>,
    last_view: Option<(ViewKey, Attributes)>,
    published: Option<RumContext>,
    bootstrapped: bool,
}

impl ApplicationScope {
    pub fn new(application_id: impl Into<String>) -> Self {
        Self {
            application_id: application_id.into(),
            synthetics: None,
            sessions: ScopeArena::default(),
            last_view: None,
            published: None,
            bootstrapped: false,
        }
    }

    /// Feeds one event through the whole tree.
    pub fn process(&mut self, event: &RawEvent, dispatch: Dispatch<'_>) {
        let root = self.root_context();
        self.handle(event, &root, dispatch);
    }

    /// First session still accepting work.
    pub fn active_session(&self) -> Option<&SessionScope> {
        self.sessions.iter().find(|s| s.is_active())
    }

    /// Number of sessions alive, draining ones included.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    fn root_context(&self) -> RumContext {
        let (test_id, result_id) = self
            .synthetics
            .clone()
            .map_or((None, None), |(t, r)| (Some(t), Some(r)));
        RumContext {
            synthetics_test_id: test_id,
            synthetics_result_id: result_id,
            ..RumContext::for_application(self.application_id.clone())
        }
    }

    fn start_session(&mut self, event: &RawEvent, root: &RumContext, dispatch: Dispatch<'_>) {
        let displayed = self.sessions.iter().any(SessionScope::application_displayed);
        let mut session = SessionScope::new(root, displayed, event.time());

        if matches!(event, RawEvent::StartAction { .. }) {
            if let Some((key, attributes)) = self.last_view.clone() {
                tracing::debug!(view = %key.name, "replaying last known view into new session");
                let replay = RawEvent::StartView {
                    key,
                    attributes,
                    time: event.time(),
                };
                session.handle(&replay, root, dispatch);
            }
        }
        self.sessions.insert(session);
    }

    fn publish_context(&mut self, force: bool, dispatch: Dispatch<'_>) {
        let ctx = self
            .active_session()
            .map_or_else(|| self.root_context(), SessionScope::current_context);
        if !force && self.published.as_ref() == Some(&ctx) {
            return;
        }
        dispatch
            .services
            .feature_context
            .set(RUM_FEATURE, ctx.to_feature_entries());
        self.published = Some(ctx);
    }
}

impl Scope for ApplicationScope {
    fn handle(&mut self, event: &RawEvent, _parent: &RumContext, dispatch: Dispatch<'_>) -> Lifecycle {
        if let RawEvent::SetSyntheticsTestAttribute {
            test_id, result_id, ..
        } = event
        {
            tracing::info!(target: "rumscope::user", test_id, result_id, "synthetics test attributes set");
            self.synthetics = Some((test_id.clone(), result_id.clone()));
        }
        let root = self.root_context();

        let first = !self.bootstrapped;
        self.bootstrapped = true;
        if self.active_session().is_none() && (first || event.is_interaction()) {
            self.start_session(event, &root, dispatch);
        }

        self.sessions.delegate(event, &root, dispatch);

        if let Some(view) = self.active_session().and_then(SessionScope::active_view) {
            self.last_view = Some(view);
        }

        let active = self.sessions.active_count();
        if active > 1 {
            tracing::warn!(
                target: "rumscope::telemetry",
                active,
                event = event.as_label(),
                "more than one active session"
            );
        }

        self.publish_context(matches!(event, RawEvent::StopSession { .. }), dispatch);
        Lifecycle::Keep
    }

    fn context(&self) -> RumContext {
        self.root_context()
    }

    fn is_active(&self) -> bool {
        true
    }
}
