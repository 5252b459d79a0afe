//! # ActionScope: one user action window.
//!
//! An action stays open while something keeps happening "because of" it. Every
//! event re-evaluates, in order:
//!
//! ```text
//! inactive && no ongoing keys && !waiting ──► emit (ends at last interaction)
//! open longer than max duration           ──► emit (ends now)
//! SendCustomActionNow                     ──► emit (ends at last interaction)
//! StartView / StopView / StopSession      ──► emit (ends now)
//! StopAction                              ──► rename/retype, start inactivity clock
//! StartResource / StopResource            ──► track key, extend window
//! AddError                                ──► count; fatal emits now
//! StopResourceWith{Error,StackTrace}      ──► resource becomes an error in the tally
//! AbandonResource                         ──► forget key
//! AddLongTask                             ──► count, extend window
//! ```
//!
//! The action emits at most once and destructs right after.

use uuid::Uuid;

use crate::core::RumConfig;
use crate::events::{ActionType, Attributes, EventTime, RawEvent, StorageEvent};
use crate::scopes::timing::{at_least_one, nanos};
use crate::scopes::{Dispatch, Lifecycle, RumContext, Scope, record_header};
use crate::storage::{ActionRecord, Frustration, RumRecord};

/// Resource key the action waits for.
#[derive(Debug)]
struct OngoingKey {
    key: String,
    started_nanos: i64,
}

/// Tracks one user action and the work it triggered.
#[derive(Debug)]
pub struct ActionScope {
    id: Uuid,
    action_type: ActionType,
    name: String,
    attributes: Attributes,
    wait_for_stop: bool,
    started: EventTime,
    last_interaction: i64,
    ongoing: Vec<OngoingKey>,

    resource_count: u64,
    error_count: u64,
    crash_count: u64,
    long_task_count: u64,

    parent: RumContext,
    inactivity: i64,
    max_duration: i64,
    key_ttl: Option<i64>,
    track_frustrations: bool,

    stopped: bool,
    sent: bool,
}

impl ActionScope {
    /// Opens an action at `time`. `attributes` should already contain the host
    /// view's attributes overlaid with the action's own.
    pub fn new(
        action_type: ActionType,
        name: impl Into<String>,
        wait_for_stop: bool,
        attributes: Attributes,
        time: EventTime,
        parent: &RumContext,
        config: &RumConfig,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            action_type,
            name: name.into(),
            attributes,
            wait_for_stop,
            started: time,
            last_interaction: time.nanos,
            ongoing: Vec::new(),
            resource_count: 0,
            error_count: 0,
            crash_count: 0,
            long_task_count: 0,
            parent: parent.clone(),
            inactivity: nanos(config.action_inactivity),
            max_duration: nanos(config.action_max_duration),
            key_ttl: config.resource_key_ttl().map(nanos),
            track_frustrations: config.track_frustrations,
            stopped: false,
            sent: false,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    fn remove_key(&mut self, key: &str) -> bool {
        let before = self.ongoing.len();
        self.ongoing.retain(|k| k.key != key);
        self.ongoing.len() != before
    }

    fn on_stop_action(
        &mut self,
        action_type: Option<ActionType>,
        name: Option<&String>,
        attributes: &Attributes,
        now: i64,
    ) {
        if let Some(t) = action_type {
            self.action_type = t;
        }
        if let Some(n) = name {
            self.name.clone_from(n);
        }
        self.attributes
            .extend(attributes.iter().map(|(k, v)| (k.clone(), v.clone())));
        self.stopped = true;
        self.last_interaction = now;
    }

    fn frustrations(&self) -> Vec<Frustration> {
        if self.track_frustrations && self.error_count > 0 && self.action_type == ActionType::Tap {
            vec![Frustration::ErrorTap]
        } else {
            Vec::new()
        }
    }

    /// Writes the action record once. `end_nanos` closes the loading time;
    /// `time` stamps the confirmation.
    fn send(&mut self, end_nanos: i64, time: EventTime, dispatch: Dispatch<'_>) {
        if self.sent {
            return;
        }

        let ctx = self.context();
        let frustrations = self.frustrations();
        let frustration_count = u32::try_from(frustrations.len()).unwrap_or(u32::MAX);
        let record = ActionRecord {
            header: record_header(&ctx, dispatch, self.started, &self.attributes),
            id: self.id,
            action_type: self.action_type,
            name: self.name.clone(),
            loading_time_nanos: at_least_one(self.started.nanos, end_nanos),
            resource_count: self.resource_count,
            error_count: self.error_count,
            crash_count: self.crash_count,
            long_task_count: self.long_task_count,
            frustrations,
        };

        self.sent = true;
        dispatch.writer.submit(
            RumRecord::Action(record),
            Some(StorageEvent::Action {
                view_id: ctx.view_id.unwrap_or_else(Uuid::nil),
                frustration_count,
                action_type: self.action_type,
                end_nanos,
            }),
            time,
        );
    }
}

impl Scope for ActionScope {
    fn handle(&mut self, event: &RawEvent, parent: &RumContext, dispatch: Dispatch<'_>) -> Lifecycle {
        if self.sent {
            return Lifecycle::Destruct;
        }
        self.parent = parent.clone();

        let time = event.time();
        let now = time.nanos;
        if let Some(ttl) = self.key_ttl {
            self.ongoing.retain(|k| now - k.started_nanos <= ttl);
        }

        let is_inactive = now - self.last_interaction > self.inactivity;
        let is_long = now - self.started.nanos > self.max_duration;
        let is_ongoing = self.wait_for_stop && !self.stopped;
        let should_stop = is_inactive && self.ongoing.is_empty() && !is_ongoing;

        if should_stop {
            self.send(self.last_interaction, time, dispatch);
        } else if is_long {
            self.send(now, time, dispatch);
        } else {
            match event {
                RawEvent::SendCustomActionNow { .. } => {
                    self.send(self.last_interaction, time, dispatch);
                }
                RawEvent::StartView { .. }
                | RawEvent::StopView { .. }
                | RawEvent::StopSession { .. } => {
                    self.ongoing.clear();
                    self.send(now, time, dispatch);
                }
                RawEvent::StopAction {
                    action_type,
                    name,
                    attributes,
                    ..
                } => self.on_stop_action(*action_type, name.as_ref(), attributes, now),
                RawEvent::StartResource { key, .. } => {
                    self.last_interaction = now;
                    self.resource_count += 1;
                    self.ongoing.push(OngoingKey {
                        key: key.clone(),
                        started_nanos: now,
                    });
                }
                RawEvent::StopResource { key, .. } => {
                    if self.remove_key(key) {
                        self.last_interaction = now;
                    }
                }
                RawEvent::StopResourceWithError { key, .. }
                | RawEvent::StopResourceWithStackTrace { key, .. } => {
                    if self.remove_key(key) {
                        self.last_interaction = now;
                        self.resource_count = self.resource_count.saturating_sub(1);
                        self.error_count += 1;
                    }
                }
                RawEvent::AbandonResource { key, .. } => {
                    self.remove_key(key);
                }
                RawEvent::AddError { is_fatal, .. } => {
                    self.last_interaction = now;
                    self.error_count += 1;
                    if *is_fatal {
                        self.crash_count += 1;
                        self.send(now, time, dispatch);
                    }
                }
                RawEvent::AddLongTask { .. } => {
                    self.last_interaction = now;
                    self.long_task_count += 1;
                }
                RawEvent::AddViewAttributes { .. }
                | RawEvent::RemoveViewAttributes { .. }
                | RawEvent::AddViewLoadingTime { .. }
                | RawEvent::AddCustomTiming { .. }
                | RawEvent::AddFeatureFlagEvaluation { .. }
                | RawEvent::AddFeatureFlagEvaluations { .. }
                | RawEvent::StartAction { .. }
                | RawEvent::WaitForResourceTiming { .. }
                | RawEvent::AddResourceTiming { .. }
                | RawEvent::ApplicationStarted { .. }
                | RawEvent::KeepAlive { .. }
                | RawEvent::ResetSession { .. }
                | RawEvent::AbandonView { .. }
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
        }

        Lifecycle::keep_if(!self.sent)
    }

    fn context(&self) -> RumContext {
        RumContext {
            action_id: Some(self.id),
            ..self.parent.clone()
        }
    }

    fn is_active(&self) -> bool {
        !self.stopped
    }
}
