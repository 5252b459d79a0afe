//! # The scope tree.
//!
//! A tree of stateful event handlers, one per RUM entity:
//!
//! ```text
//! ApplicationScope
//!   └─► SessionScope (one active, older ones draining)
//!         └─► ViewManagerScope
//!               └─► ViewScope (foreground / background / app-launch)
//!                     ├─► ActionScope   (at most one active)
//!                     └─► ResourceScope (one per correlation key)
//! ```
//!
//! ## Rules
//! - Every event enters at the root and flows down; each level may react before and
//!   after delegating.
//! - A scope returning [`Lifecycle::Destruct`] is pruned by its parent once the
//!   delegation pass over its siblings is over.
//! - Timeouts are evaluated lazily against the event time of whatever event flows
//!   through next; nothing is scheduled.
//! - All records leave through the [`Writer`](crate::Writer) carried by [`Dispatch`].

mod action;
mod application;
mod children;
mod context;
mod resource;
mod session;
mod timing;
mod view;
mod view_manager;

pub use action::ActionScope;
pub use application::ApplicationScope;
pub use context::{RumContext, SessionState, StartReason, ViewType};
pub use resource::ResourceScope;
pub use session::SessionScope;
pub use view::ViewScope;
pub use view_manager::{
    APP_LAUNCH_VIEW_ID, APP_LAUNCH_VIEW_NAME, APP_LAUNCH_VIEW_URL, BACKGROUND_VIEW_ID,
    BACKGROUND_VIEW_NAME, BACKGROUND_VIEW_URL, ViewManagerScope,
};

pub(crate) use children::ScopeArena;

use crate::collaborators::Services;
use crate::events::{Attributes, EventTime, RawEvent};
use crate::storage::{RecordHeader, Writer};

/// Outcome of handling one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// The scope keeps receiving events.
    Keep,
    /// The scope is done and must be pruned by its parent.
    Destruct,
}

impl Lifecycle {
    #[inline]
    pub(crate) fn keep_if(keep: bool) -> Self {
        if keep { Lifecycle::Keep } else { Lifecycle::Destruct }
    }
}

/// What a scope needs from the outside while handling an event.
#[derive(Clone, Copy)]
pub struct Dispatch<'a> {
    pub services: &'a Services,
    pub writer: Writer<'a>,
}

impl<'a> Dispatch<'a> {
    pub fn new(services: &'a Services, writer: Writer<'a>) -> Self {
        Self { services, writer }
    }

    /// Same services, with a writer muted or not.
    #[must_use]
    pub fn muted(self, muted: bool) -> Self {
        Self {
            writer: self.writer.muted(muted),
            ..self
        }
    }
}

/// Builds the shared record fields: global attributes snapshotted now, overlaid with
/// the entity's own attributes.
pub(crate) fn record_header(
    ctx: &RumContext,
    dispatch: Dispatch<'_>,
    time: EventTime,
    attributes: &Attributes,
) -> RecordHeader {
    let services = dispatch.services;
    let mut context = services.attributes.snapshot();
    context.extend(attributes.iter().map(|(k, v)| (k.clone(), v.clone())));
    let has_replay = ctx
        .view_id
        .is_some_and(|id| services.feature_context.has_replay(&id.to_string()));
    RecordHeader::new(
        ctx,
        dispatch.writer.sdk_context(),
        time,
        services.config.sample_rate_clamped(),
        has_replay,
        context,
    )
}

/// Common contract of every node in the tree.
pub trait Scope {
    /// Reacts to `event`. `parent` is the parent's current context.
    fn handle(&mut self, event: &RawEvent, parent: &RumContext, dispatch: Dispatch<'_>) -> Lifecycle;

    /// Parent context overlaid with the fields this scope owns.
    fn context(&self) -> RumContext;

    /// Whether the scope still accepts new work.
    fn is_active(&self) -> bool;
}
