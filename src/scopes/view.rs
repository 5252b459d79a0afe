//! # ViewScope: one screen, and everything that happens on it.
//!
//! A view owns at most one [`ActionScope`] and one [`ResourceScope`] per in-flight
//! key. It emits a new version of its View record whenever something it reports
//! changes, and stays alive after being stopped until every record it started has
//! been confirmed.
//!
//! ```text
//!  StartAction ──► ActionScope      pending.action   += 1
//!  StartResource ► ResourceScope    pending.resource += 1
//!  AddError ────► Error record      pending.error    += 1   (fatal: counted now)
//!  AddLongTask ─► LongTask record   pending.long_task += 1
//!
//!  *Sent(view_id)    ──► pending -= 1, confirmed += 1, View update
//!  *Dropped(view_id) ──► pending -= 1
//! ```
//!
//! ## Stopping
//! `StopView` stops the view when its key matches. Once the caller sends
//! `AbandonView` for the view key, any later `StopView` stops it.
//!
//! ## Completion
//! `stopped && no resource scope left && sum(pending) <= 0`. On completion the view
//! id is removed from the session replay feature context.
//!
//! ## Renewal
//! When the session is renewed underneath an active view, the view takes a new id.
//! Confirmations for superseded ids still drain the pending counters.

use std::collections::BTreeMap;

use serde_json::Value;
use uuid::Uuid;

use crate::collaborators::{SESSION_REPLAY_FEATURE, Services, ViewInfo};
use crate::events::{
    ActionType, Attributes, ErrorSource, EventTime, RawEvent, StorageEvent, ViewKey,
};
use crate::scopes::timing::{at_least_one, nanos};
use crate::scopes::{
    ActionScope, Dispatch, Lifecycle, ResourceScope, RumContext, Scope, ScopeArena, ViewType,
    record_header,
};
use crate::storage::{
    ActionRecord, ErrorCategory, ErrorRecord, LongTaskRecord, RumRecord, ViewRecord, ViewVitals,
};

const ONE_SECOND_NS: i64 = 1_000_000_000;
const SLOW_RENDERED_THRESHOLD_FPS: f64 = 55.0;
const APPLICATION_START_ACTION_NAME: &str = "application_start";

/// Confirmed totals reported in the View record.
#[derive(Debug, Default, Clone, Copy)]
struct Counts {
    action: u64,
    resource: u64,
    error: u64,
    crash: u64,
    long_task: u64,
    frozen_frame: u64,
    frustration: u64,
}

/// Started but not yet confirmed records. Signed: a stray confirmation must not
/// underflow, it just makes the view eligible for completion sooner.
#[derive(Debug, Default, Clone, Copy)]
struct Pending {
    action: i64,
    resource: i64,
    error: i64,
    long_task: i64,
    frozen_frame: i64,
}

impl Pending {
    fn total(&self) -> i64 {
        self.action + self.resource + self.error + self.long_task
    }
}

/// Tracks one view and its children.
#[derive(Debug)]
pub struct ViewScope {
    key: ViewKey,
    url: String,
    id: Uuid,
    superseded_ids: Vec<Uuid>,
    view_type: ViewType,
    initial_attributes: Attributes,
    attributes: Attributes,
    parent: RumContext,

    started: EventTime,
    stopped_nanos: i64,
    stopped: bool,
    key_abandoned: bool,
    version: u64,
    loading_time: Option<i64>,
    custom_timings: BTreeMap<String, i64>,
    feature_flags: Attributes,

    action: Option<ActionScope>,
    resources: ScopeArena<ResourceScope>,
    counts: Counts,
    pending: Pending,

    cpu_initial: Option<f64>,
    frozen_frame_threshold: i64,
    key_ttl: Option<i64>,
}

impl ViewScope {
    /// Opens a view at `time` under `parent`.
    pub fn new(
        key: ViewKey,
        attributes: Attributes,
        time: EventTime,
        view_type: ViewType,
        parent: &RumContext,
        services: &Services,
    ) -> Self {
        let id = Uuid::new_v4();
        if let Some((test_id, result_id)) = parent.synthetics() {
            tracing::info!(
                target: "rumscope::user",
                test_id,
                result_id,
                view_id = %id,
                "synthetics view started"
            );
        }
        let cpu_initial = if view_type == ViewType::Foreground {
            services.vitals.cpu().map(|info| info.max)
        } else {
            None
        };

        Self {
            url: key.url.replace('.', "/"),
            key,
            id,
            superseded_ids: Vec::new(),
            view_type,
            initial_attributes: attributes.clone(),
            attributes,
            parent: parent.clone(),
            started: time,
            stopped_nanos: time.nanos,
            stopped: false,
            key_abandoned: false,
            version: 1,
            loading_time: None,
            custom_timings: BTreeMap::new(),
            feature_flags: Attributes::new(),
            action: None,
            resources: ScopeArena::default(),
            counts: Counts::default(),
            pending: Pending::default(),
            cpu_initial,
            frozen_frame_threshold: nanos(services.config.frozen_frame_threshold),
            key_ttl: services.config.resource_key_ttl().map(nanos),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn key(&self) -> &ViewKey {
        &self.key
    }

    pub fn view_type(&self) -> ViewType {
        self.view_type
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// Whether the view is done and can be pruned.
    pub fn is_complete(&self) -> bool {
        self.stopped && self.resources.is_empty() && self.pending.total() <= 0
    }

    /// Gives the view a new identity after a session renewal. Counters, timings and
    /// flags restart from scratch; pending records still drain through the old id.
    pub(crate) fn renew(&mut self, time: EventTime, services: &Services) {
        let old = std::mem::replace(&mut self.id, Uuid::new_v4());
        self.superseded_ids.push(old);
        self.started = time;
        self.stopped_nanos = time.nanos;
        self.version = 1;
        self.attributes = self.initial_attributes.clone();
        self.loading_time = None;
        self.custom_timings.clear();
        self.feature_flags.clear();
        self.counts = Counts::default();
        if self.view_type == ViewType::Foreground {
            self.cpu_initial = services.vitals.cpu().map(|info| info.max);
        }
        tracing::debug!(old = %old, new = %self.id, "view renewed");
    }

    /// Notifies the view-changed listener with the current state.
    pub(crate) fn notify_changed(&self, services: &Services) {
        services.view_changed.on_view_changed(ViewInfo {
            key: self.key.clone(),
            attributes: self.attributes.clone(),
            is_active: !self.stopped,
        });
    }

    /// Context without the active action.
    fn view_context(&self) -> RumContext {
        RumContext {
            view_id: Some(self.id),
            view_name: Some(self.key.name.clone()),
            view_url: Some(self.url.clone()),
            view_type: self.view_type,
            action_id: None,
            ..self.parent.clone()
        }
    }

    fn owns(&self, view_id: &Uuid) -> bool {
        self.id == *view_id
    }

    fn superseded(&self, view_id: &Uuid) -> bool {
        self.superseded_ids.contains(view_id)
    }

    fn merged_attributes(&self, extra: &Attributes) -> Attributes {
        let mut out = self.attributes.clone();
        out.extend(extra.iter().map(|(k, v)| (k.clone(), v.clone())));
        out
    }

    // --- delegation ---

    fn delegate_to_children(&mut self, event: &RawEvent, dispatch: Dispatch<'_>) {
        let ctx = self.context();
        for finished in self.resources.delegate(event, &ctx, dispatch) {
            if finished.ended_with_error() {
                self.pending.resource -= 1;
                self.pending.error += 1;
            }
        }

        let view_ctx = self.view_context();
        if let Some(action) = self.action.as_mut() {
            if action.handle(event, &view_ctx, dispatch) == Lifecycle::Destruct {
                self.action = None;
            }
        }
    }

    /// Finalizes resources the caller can no longer stop. Only runs once the view
    /// is stopped so that a live resource is never cut short.
    fn finalize_unreachable(&mut self, time: EventTime, dispatch: Dispatch<'_>) {
        let ttl = self.key_ttl;
        let mut finalized = 0usize;
        for resource in self.resources.iter_mut() {
            if !resource.is_finished() && resource.is_unreachable(time.nanos, ttl) {
                resource.finalize_unreachable(time, dispatch);
                finalized += 1;
            }
        }
        if finalized > 0 {
            tracing::debug!(view_id = %self.id, finalized, "unreachable resources finalized");
        }
        self.resources.retain(|r| !r.is_finished());
    }

    // --- lifecycle ---

    fn stop(&mut self, event: &RawEvent, dispatch: Dispatch<'_>) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        self.resolve_duration(event);
        self.send_update(event.time(), dispatch);
        self.delegate_to_children(event, dispatch);
        self.notify_changed(dispatch.services);
    }

    fn resolve_duration(&mut self, event: &RawEvent) {
        self.stopped_nanos = event.time().nanos;
        let duration = self.stopped_nanos - self.started.nanos;
        if duration == 0 {
            let legit = self.view_type == ViewType::Background
                && matches!(event, RawEvent::AddError { is_fatal: true, .. });
            if !legit {
                tracing::warn!(
                    target: "rumscope::user",
                    view = %self.key.name,
                    "view duration was 0, forcing it to 1ns"
                );
            }
            self.stopped_nanos = self.started.nanos + 1;
        } else if duration < 0 {
            tracing::warn!(
                target: "rumscope::user",
                view = %self.key.name,
                start_ns = self.started.nanos,
                end_ns = event.time().nanos,
                "view duration was negative, forcing it to 1ns"
            );
            self.stopped_nanos = self.started.nanos + 1;
        }
    }

    // --- emission ---

    fn vitals(&self, services: &Services, duration: i64) -> ViewVitals {
        if self.view_type != ViewType::Foreground {
            return ViewVitals::default();
        }
        let vitals = &services.vitals;
        let cpu_ticks = match (self.cpu_initial, vitals.cpu()) {
            (Some(initial), Some(now)) => Some(now.max - initial),
            _ => None,
        };
        let memory = vitals.memory();
        let frame_rate = vitals.frame_rate();
        ViewVitals {
            cpu_ticks_count: cpu_ticks,
            cpu_ticks_per_second: cpu_ticks
                .filter(|_| duration >= ONE_SECOND_NS)
                .map(|ticks| ticks * ONE_SECOND_NS as f64 / duration as f64),
            memory_average: memory.map(|m| m.mean),
            memory_max: memory.map(|m| m.max),
            refresh_rate_average: frame_rate.map(|f| f.mean),
            refresh_rate_min: frame_rate.map(|f| f.min),
            is_slow_rendered: frame_rate.map(|f| f.mean < SLOW_RENDERED_THRESHOLD_FPS),
        }
    }

    fn send_update(&mut self, time: EventTime, dispatch: Dispatch<'_>) {
        let complete = self.is_complete();
        self.version += 1;
        if !self.stopped {
            self.stopped_nanos = time.nanos;
        }
        let duration = (self.stopped_nanos - self.started.nanos).max(1);
        let ctx = self.context();
        let services = dispatch.services;
        let id = self.id.to_string();

        let record = ViewRecord {
            header: record_header(&ctx, dispatch, self.started, &self.attributes),
            document_version: self.version,
            is_active: !complete,
            time_spent_nanos: duration,
            loading_time_nanos: self.loading_time,
            action_count: self.counts.action,
            resource_count: self.counts.resource,
            error_count: self.counts.error,
            crash_count: self.counts.crash,
            long_task_count: self.counts.long_task,
            frozen_frame_count: self.counts.frozen_frame,
            frustration_count: self.counts.frustration,
            custom_timings: self.custom_timings.clone(),
            feature_flags: self.feature_flags.clone(),
            vitals: self.vitals(services, duration),
            replay_records_count: services.feature_context.replay_records_count(&id),
        };
        dispatch.writer.submit(RumRecord::View(record), None, time);
    }

    // --- handlers ---

    fn on_start_action(
        &mut self,
        action_type: ActionType,
        name: &str,
        wait_for_stop: bool,
        attributes: &Attributes,
        event: &RawEvent,
        dispatch: Dispatch<'_>,
    ) {
        self.delegate_to_children(event, dispatch);
        if self.stopped {
            return;
        }

        let time = event.time();
        let view_ctx = self.view_context();
        let attributes = self.merged_attributes(attributes);
        let config = &dispatch.services.config;

        if action_type == ActionType::Custom && !wait_for_stop {
            let mut custom =
                ActionScope::new(action_type, name, false, attributes, time, &view_ctx, config);
            self.pending.action += 1;
            custom.handle(&RawEvent::SendCustomActionNow { time }, &view_ctx, dispatch);
            return;
        }

        if self.action.is_some() {
            tracing::warn!(
                target: "rumscope::user",
                action_type = ?action_type,
                name,
                "action dropped because another action is still active on the same view"
            );
            return;
        }

        self.action = Some(ActionScope::new(
            action_type,
            name,
            wait_for_stop,
            attributes,
            time,
            &view_ctx,
            config,
        ));
        self.pending.action += 1;
    }

    fn on_start_resource(
        &mut self,
        key: &str,
        url: &str,
        method: &str,
        attributes: &Attributes,
        event: &RawEvent,
        dispatch: Dispatch<'_>,
    ) {
        self.delegate_to_children(event, dispatch);
        if self.stopped {
            return;
        }

        if self.resources.iter().any(|r| r.key() == key && !r.is_finished()) {
            tracing::warn!(
                target: "rumscope::user",
                key,
                "a resource with the same key is already in flight, ignoring the new one"
            );
            return;
        }

        let resource = ResourceScope::new(
            key,
            url,
            method,
            attributes.clone(),
            event.time(),
            self.context(),
            dispatch.services,
        );
        self.resources.insert(resource);
        self.pending.resource += 1;
    }

    #[allow(clippy::too_many_arguments)]
    fn on_add_error(
        &mut self,
        message: &str,
        source: ErrorSource,
        stacktrace: Option<&String>,
        error_type: Option<&String>,
        is_fatal: bool,
        is_anr: bool,
        attributes: &Attributes,
        event: &RawEvent,
        dispatch: Dispatch<'_>,
    ) {
        self.delegate_to_children(event, dispatch);
        if self.stopped {
            return;
        }
        if is_fatal && self.counts.crash > 0 {
            tracing::debug!(view_id = %self.id, "crash already reported for this view");
            return;
        }

        let time = event.time();
        let category = if is_anr {
            Some(ErrorCategory::Anr)
        } else if stacktrace.is_some() {
            Some(ErrorCategory::Exception)
        } else {
            None
        };
        let ctx = self.context();
        let record = ErrorRecord {
            header: record_header(&ctx, dispatch, time, &self.merged_attributes(attributes)),
            id: Uuid::new_v4(),
            message: message.to_string(),
            source,
            stack: stacktrace.cloned(),
            error_type: error_type.cloned(),
            is_crash: is_fatal,
            category,
            resource: None,
        };

        // A crash leaves no time for the confirmation round-trip.
        let confirmation = (!is_fatal).then_some(StorageEvent::Error { view_id: self.id });
        dispatch.writer.submit(RumRecord::Error(record), confirmation, time);

        if is_fatal {
            self.counts.error += 1;
            self.counts.crash += 1;
            self.send_update(time, dispatch);
        } else {
            self.pending.error += 1;
        }
    }

    fn on_add_long_task(
        &mut self,
        duration_nanos: i64,
        target: &str,
        event: &RawEvent,
        dispatch: Dispatch<'_>,
    ) {
        self.delegate_to_children(event, dispatch);
        if self.stopped {
            return;
        }

        let time = event.time();
        let is_frozen_frame = duration_nanos > self.frozen_frame_threshold;
        let ctx = self.context();
        let record = LongTaskRecord {
            header: record_header(&ctx, dispatch, time.rewind(duration_nanos), &self.attributes),
            id: Uuid::new_v4(),
            duration_nanos,
            is_frozen_frame,
            target: target.to_string(),
        };
        dispatch.writer.submit(
            RumRecord::LongTask(record),
            Some(StorageEvent::LongTask {
                view_id: self.id,
                is_frozen_frame,
            }),
            time,
        );

        self.pending.long_task += 1;
        if is_frozen_frame {
            self.pending.frozen_frame += 1;
        }
    }

    fn on_application_started(&mut self, startup_nanos: i64, time: EventTime, dispatch: Dispatch<'_>) {
        let ctx = self.view_context();
        let record = ActionRecord {
            header: record_header(&ctx, dispatch, self.started, &self.attributes),
            id: Uuid::new_v4(),
            action_type: ActionType::ApplicationStart,
            name: APPLICATION_START_ACTION_NAME.to_string(),
            loading_time_nanos: startup_nanos.max(1),
            resource_count: 0,
            error_count: 0,
            crash_count: 0,
            long_task_count: 0,
            frustrations: Vec::new(),
        };
        self.pending.action += 1;
        dispatch.writer.submit(
            RumRecord::Action(record),
            Some(StorageEvent::Action {
                view_id: self.id,
                frustration_count: 0,
                action_type: ActionType::ApplicationStart,
                end_nanos: time.nanos,
            }),
            time,
        );
    }

    fn on_add_view_loading_time(&mut self, overwrite: bool, time: EventTime, dispatch: Dispatch<'_>) {
        if self.stopped || (self.loading_time.is_some() && !overwrite) {
            return;
        }
        let loading = time.nanos - self.started.nanos;
        match self.loading_time {
            None => tracing::debug!(
                target: "rumscope::user",
                loading,
                view = %self.key.name,
                "view loading time added"
            ),
            Some(previous) => tracing::warn!(
                target: "rumscope::user",
                view = %self.key.name,
                previous,
                loading,
                "view loading time already set, overwriting it"
            ),
        }
        self.loading_time = Some(loading);
        self.send_update(time, dispatch);
    }

    fn set_feature_flag(&mut self, name: &str, value: &Value) -> bool {
        if self.feature_flags.get(name) == Some(value) {
            false
        } else {
            self.feature_flags.insert(name.to_string(), value.clone());
            true
        }
    }

    fn on_feature_flags_changed(&mut self, time: EventTime, dispatch: Dispatch<'_>) {
        self.send_update(time, dispatch);
        self.notify_changed(dispatch.services);
    }
}

impl Scope for ViewScope {
    fn handle(&mut self, event: &RawEvent, parent: &RumContext, dispatch: Dispatch<'_>) -> Lifecycle {
        if !self.stopped {
            self.parent = parent.clone();
        }

        match event {
            RawEvent::ResourceSent { view_id, time } => {
                if self.owns(view_id) {
                    self.pending.resource -= 1;
                    self.counts.resource += 1;
                    self.send_update(*time, dispatch);
                } else if self.superseded(view_id) {
                    self.pending.resource -= 1;
                }
            }
            RawEvent::ActionSent {
                view_id,
                frustration_count,
                time,
                ..
            } => {
                if self.owns(view_id) {
                    self.pending.action -= 1;
                    self.counts.action += 1;
                    self.counts.frustration += u64::from(*frustration_count);
                    self.send_update(*time, dispatch);
                } else if self.superseded(view_id) {
                    self.pending.action -= 1;
                }
            }
            RawEvent::ErrorSent { view_id, time } => {
                if self.owns(view_id) {
                    self.pending.error -= 1;
                    self.counts.error += 1;
                    self.send_update(*time, dispatch);
                } else if self.superseded(view_id) {
                    self.pending.error -= 1;
                }
            }
            RawEvent::LongTaskSent {
                view_id,
                is_frozen_frame,
                time,
            } => {
                if self.owns(view_id) {
                    self.pending.long_task -= 1;
                    self.counts.long_task += 1;
                    if *is_frozen_frame {
                        self.pending.frozen_frame -= 1;
                        self.counts.frozen_frame += 1;
                    }
                    self.send_update(*time, dispatch);
                } else if self.superseded(view_id) {
                    self.pending.long_task -= 1;
                    if *is_frozen_frame {
                        self.pending.frozen_frame -= 1;
                    }
                }
            }
            RawEvent::ResourceDropped { view_id, .. } => {
                if self.owns(view_id) || self.superseded(view_id) {
                    self.pending.resource -= 1;
                }
            }
            RawEvent::ActionDropped { view_id, .. } => {
                if self.owns(view_id) || self.superseded(view_id) {
                    self.pending.action -= 1;
                }
            }
            RawEvent::ErrorDropped { view_id, .. } => {
                if self.owns(view_id) || self.superseded(view_id) {
                    self.pending.error -= 1;
                }
            }
            RawEvent::LongTaskDropped {
                view_id,
                is_frozen_frame,
                ..
            } => {
                if self.owns(view_id) || self.superseded(view_id) {
                    self.pending.long_task -= 1;
                    if *is_frozen_frame {
                        self.pending.frozen_frame -= 1;
                    }
                }
            }

            RawEvent::StartView { .. } | RawEvent::StopSession { .. } => self.stop(event, dispatch),
            RawEvent::StopView { key, attributes, .. } => {
                if !self.stopped && (self.key_abandoned || key.same_view(&self.key)) {
                    self.attributes
                        .extend(attributes.iter().map(|(k, v)| (k.clone(), v.clone())));
                    self.stop(event, dispatch);
                } else {
                    self.delegate_to_children(event, dispatch);
                }
            }
            RawEvent::AbandonView { key, .. } => {
                self.delegate_to_children(event, dispatch);
                if !self.stopped && key.same_view(&self.key) {
                    self.key_abandoned = true;
                    tracing::debug!(view_id = %self.id, view = %self.key.name, "view key abandoned");
                }
            }
            RawEvent::StartAction {
                action_type,
                name,
                wait_for_stop,
                attributes,
                ..
            } => self.on_start_action(*action_type, name, *wait_for_stop, attributes, event, dispatch),
            RawEvent::StartResource {
                key,
                url,
                method,
                attributes,
                ..
            } => self.on_start_resource(key, url, method, attributes, event, dispatch),
            RawEvent::AddError {
                message,
                source,
                stacktrace,
                error_type,
                is_fatal,
                is_anr,
                attributes,
                ..
            } => self.on_add_error(
                message,
                *source,
                stacktrace.as_ref(),
                error_type.as_ref(),
                *is_fatal,
                *is_anr,
                attributes,
                event,
                dispatch,
            ),
            RawEvent::AddLongTask {
                duration_nanos,
                target,
                ..
            } => self.on_add_long_task(*duration_nanos, target, event, dispatch),
            RawEvent::ApplicationStarted {
                startup_nanos,
                time,
            } => {
                self.delegate_to_children(event, dispatch);
                if !self.stopped && self.view_type == ViewType::ApplicationLaunch {
                    self.on_application_started(*startup_nanos, *time, dispatch);
                }
            }
            RawEvent::AddViewLoadingTime { overwrite, time } => {
                self.on_add_view_loading_time(*overwrite, *time, dispatch);
            }
            RawEvent::AddCustomTiming { name, time } => {
                if !self.stopped {
                    self.custom_timings
                        .insert(name.clone(), at_least_one(self.started.nanos, time.nanos));
                    self.send_update(*time, dispatch);
                }
            }
            RawEvent::AddFeatureFlagEvaluation { name, value, time } => {
                if !self.stopped && self.set_feature_flag(name, value) {
                    self.on_feature_flags_changed(*time, dispatch);
                }
            }
            RawEvent::AddFeatureFlagEvaluations { flags, time } => {
                if !self.stopped {
                    let mut modified = false;
                    for (name, value) in flags {
                        modified |= self.set_feature_flag(name, value);
                    }
                    if modified {
                        self.on_feature_flags_changed(*time, dispatch);
                    }
                }
            }
            RawEvent::AddViewAttributes { attributes, .. } => {
                if !self.stopped {
                    self.attributes
                        .extend(attributes.iter().map(|(k, v)| (k.clone(), v.clone())));
                }
            }
            RawEvent::RemoveViewAttributes { keys, .. } => {
                if !self.stopped {
                    for key in keys {
                        self.attributes.remove(key);
                    }
                }
            }
            RawEvent::KeepAlive { time } => {
                self.delegate_to_children(event, dispatch);
                if !self.stopped {
                    self.send_update(*time, dispatch);
                }
            }
            RawEvent::StopAction { .. }
            | RawEvent::SendCustomActionNow { .. }
            | RawEvent::WaitForResourceTiming { .. }
            | RawEvent::AddResourceTiming { .. }
            | RawEvent::StopResource { .. }
            | RawEvent::StopResourceWithError { .. }
            | RawEvent::StopResourceWithStackTrace { .. }
            | RawEvent::AbandonResource { .. }
            | RawEvent::ResetSession { .. }
            | RawEvent::SetSyntheticsTestAttribute { .. } => {
                self.delegate_to_children(event, dispatch);
            }
        }

        if self.stopped {
            self.finalize_unreachable(event.time(), dispatch);
        }

        if self.is_complete() {
            let id = self.id.to_string();
            dispatch
                .services
                .feature_context
                .update(SESSION_REPLAY_FEATURE, |entries| {
                    entries.remove(&id);
                });
            tracing::debug!(view_id = %self.id, view = %self.key.name, "view complete");
            Lifecycle::Destruct
        } else {
            Lifecycle::Keep
        }
    }

    fn context(&self) -> RumContext {
        RumContext {
            action_id: self.action.as_ref().map(ActionScope::id),
            ..self.view_context()
        }
    }

    fn is_active(&self) -> bool {
        !self.stopped
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::collaborators::{VitalInfo, Vitals};
    use crate::events::ResourceKind;
    use crate::scopes::SessionState;
    use crate::testing::{FakeVital, Harness, RecordingViewListener, at};

    fn session_ctx() -> RumContext {
        RumContext {
            session_id: Uuid::new_v4(),
            session_state: SessionState::Tracked,
            is_session_active: true,
            ..RumContext::for_application("app-test")
        }
    }

    fn home() -> ViewKey {
        ViewKey::new("home", "com.shop.Home", "Home")
    }

    fn view(h: &Harness, parent: &RumContext) -> ViewScope {
        ViewScope::new(home(), Attributes::new(), at(0), ViewType::Foreground, parent, &h.services)
    }

    #[test]
    fn test_double_start_view_stops_once() {
        let h = Harness::default();
        let parent = session_ctx();
        let mut v = view(&h, &parent);

        let next = RawEvent::start_view(ViewKey::new("cart", "cart", "Cart"), at(100));
        assert_eq!(h.run(&mut v, &parent, next.clone()), Lifecycle::Destruct);
        let before = h.storage.views().len();
        h.run(&mut v, &parent, next);

        let views = h.storage.views();
        assert_eq!(before, 1);
        assert_eq!(views.len(), 1);
        assert!(!views[0].is_active);
        assert_eq!(views[0].time_spent_nanos, 100_000_000);
        assert_eq!(views[0].header.view.url, "com/shop/Home");
    }

    #[test]
    fn test_stop_view_with_other_key_keeps_view() {
        let h = Harness::default();
        let parent = session_ctx();
        let mut v = view(&h, &parent);

        let other = ViewKey::new("cart", "cart", "Cart");
        let lc = h.run(&mut v, &parent, RawEvent::stop_view(other, at(10)));

        assert_eq!(lc, Lifecycle::Keep);
        assert!(v.is_active());
        assert!(h.storage.views().is_empty());
    }

    #[test]
    fn test_abandoned_key_stops_on_any_stop_view() {
        let h = Harness::default();
        let parent = session_ctx();
        let mut v = view(&h, &parent);

        h.run(&mut v, &parent, RawEvent::AbandonView { key: home(), time: at(5) });
        assert!(v.is_active());

        let other = ViewKey::new("cart", "cart", "Cart");
        let lc = h.run(&mut v, &parent, RawEvent::stop_view(other, at(20)));

        assert_eq!(lc, Lifecycle::Destruct);
        let last = h.storage.views().pop().unwrap();
        assert!(!last.is_active);
        assert_eq!(last.time_spent_nanos, 20_000_000);
    }

    #[test]
    fn test_abandon_other_key_is_ignored() {
        let h = Harness::default();
        let parent = session_ctx();
        let mut v = view(&h, &parent);

        let other = ViewKey::new("cart", "cart", "Cart");
        h.run(&mut v, &parent, RawEvent::AbandonView { key: other.clone(), time: at(5) });
        h.run(&mut v, &parent, RawEvent::stop_view(other, at(10)));

        assert!(v.is_active());
    }

    #[test]
    fn test_stop_view_reaches_open_action_once() {
        let h = Harness::default();
        let parent = session_ctx();
        let mut v = view(&h, &parent);

        v.handle(&RawEvent::start_action(ActionType::Scroll, "list", true, at(1)), &parent, h.dispatch());
        let lc = v.handle(&RawEvent::stop_view(home(), at(10)), &parent, h.dispatch());

        assert_eq!(lc, Lifecycle::Keep);
        assert_eq!(h.storage.actions().len(), 1);
        let confirmations = h.feedback.take();
        assert!(matches!(confirmations[..], [RawEvent::ActionSent { .. }]));
        let mut last = Lifecycle::Keep;
        for ev in confirmations {
            last = v.handle(&ev, &parent, h.dispatch());
        }
        assert_eq!(last, Lifecycle::Destruct);
        assert_eq!(h.storage.views().pop().unwrap().action_count, 1);
    }

    #[test]
    fn test_attributes_frozen_after_stop() {
        let h = Harness::default();
        let parent = session_ctx();
        let mut initial = Attributes::new();
        initial.insert("screen".into(), json!("home"));
        let mut v = ViewScope::new(home(), initial, at(0), ViewType::Foreground, &parent, &h.services);

        v.handle(&RawEvent::start_resource("r", "u", "GET", at(1)), &parent, h.dispatch());
        v.handle(&RawEvent::stop_view(home(), at(5)), &parent, h.dispatch());
        let before = v.attributes().clone();
        assert_eq!(before.get("screen"), Some(&json!("home")));

        let mut added = Attributes::new();
        added.insert("late".into(), json!(1));
        v.handle(&RawEvent::AddViewAttributes { attributes: added, time: at(6) }, &parent, h.dispatch());
        v.handle(
            &RawEvent::RemoveViewAttributes {
                keys: before.keys().cloned().collect(),
                time: at(7),
            },
            &parent,
            h.dispatch(),
        );

        assert_eq!(v.attributes(), &before);
    }

    #[test]
    fn test_pending_drains_to_zero() {
        let h = Harness::default();
        let parent = session_ctx();
        let mut v = view(&h, &parent);

        v.handle(&RawEvent::start_resource("r1", "https://a.io", "GET", at(1)), &parent, h.dispatch());
        v.handle(&RawEvent::add_error("oops", ErrorSource::Source, false, at(2)), &parent, h.dispatch());
        v.handle(
            &RawEvent::AddLongTask {
                duration_nanos: 800_000_000,
                target: "main".into(),
                time: at(3),
            },
            &parent,
            h.dispatch(),
        );

        assert_eq!(v.handle(&RawEvent::stop_view(home(), at(10)), &parent, h.dispatch()), Lifecycle::Keep);
        let confirmations = h.feedback.take();
        assert_eq!(confirmations.len(), 2);

        v.handle(
            &RawEvent::stop_resource("r1", Some(200), None, ResourceKind::Native, at(11)),
            &parent,
            h.dispatch(),
        );
        let mut last = Lifecycle::Keep;
        for ev in confirmations.into_iter().chain(h.feedback.take()) {
            last = v.handle(&ev, &parent, h.dispatch());
        }
        assert_eq!(last, Lifecycle::Destruct);

        let final_view = h.storage.views().pop().unwrap();
        assert_eq!(final_view.resource_count, 1);
        assert_eq!(final_view.error_count, 1);
        assert_eq!(final_view.long_task_count, 1);
        assert_eq!(final_view.frozen_frame_count, 1);
        assert!(!final_view.is_active);
    }

    #[test]
    fn test_resource_error_moves_pending_to_errors() {
        let h = Harness::default();
        let parent = session_ctx();
        let mut v = view(&h, &parent);

        v.handle(&RawEvent::start_resource("r", "u", "GET", at(1)), &parent, h.dispatch());
        let failed = RawEvent::StopResourceWithStackTrace {
            key: "r".into(),
            status_code: None,
            message: "reset".into(),
            source: ErrorSource::Network,
            stacktrace: "trace".into(),
            error_type: None,
            attributes: Attributes::new(),
            time: at(5),
        };
        h.run(&mut v, &parent, failed);
        let lc = h.run(&mut v, &parent, RawEvent::stop_view(home(), at(6)));

        assert_eq!(lc, Lifecycle::Destruct);
        assert_eq!(h.storage.errors().len(), 1);
        assert_eq!(h.storage.views().pop().unwrap().error_count, 1);
    }

    #[test]
    fn test_second_action_is_dropped_but_custom_fires() {
        let h = Harness::default();
        let parent = session_ctx();
        let mut v = view(&h, &parent);

        v.handle(&RawEvent::start_action(ActionType::Scroll, "list", true, at(0)), &parent, h.dispatch());
        let first = v.context().action_id;
        assert!(first.is_some());

        v.handle(&RawEvent::start_action(ActionType::Tap, "buy", false, at(1)), &parent, h.dispatch());
        assert_eq!(v.context().action_id, first);
        assert_eq!(h.storage.actions().len(), 0);

        v.handle(&RawEvent::start_action(ActionType::Custom, "ping", false, at(2)), &parent, h.dispatch());
        let actions = h.storage.actions();
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].name, "ping");
        assert_eq!(actions[0].header.action_id, Some(actions[0].id));
    }

    #[test]
    fn test_resource_tagged_with_active_action() {
        let h = Harness::default();
        let parent = session_ctx();
        let mut v = view(&h, &parent);

        v.handle(&RawEvent::start_action(ActionType::Tap, "buy", false, at(0)), &parent, h.dispatch());
        let action_id = v.context().action_id;
        v.handle(&RawEvent::start_resource("r", "u", "GET", at(10)), &parent, h.dispatch());
        v.handle(
            &RawEvent::stop_resource("r", Some(200), None, ResourceKind::Xhr, at(20)),
            &parent,
            h.dispatch(),
        );
        assert_eq!(h.storage.resources()[0].header.action_id, action_id);
    }

    #[test]
    fn test_fatal_error_counts_once() {
        let h = Harness::default();
        let parent = session_ctx();
        let mut v = view(&h, &parent);

        v.handle(&RawEvent::add_error("boom", ErrorSource::Source, true, at(5)), &parent, h.dispatch());
        v.handle(&RawEvent::add_error("boom", ErrorSource::Source, true, at(6)), &parent, h.dispatch());

        assert_eq!(h.storage.errors().len(), 1);
        assert!(h.storage.errors()[0].is_crash);
        let last = h.storage.views().pop().unwrap();
        assert_eq!(last.crash_count, 1);
        assert_eq!(last.error_count, 1);
        assert!(h.feedback.take().is_empty());
    }

    #[test]
    fn test_anr_error_category() {
        let h = Harness::default();
        let parent = session_ctx();
        let mut v = view(&h, &parent);
        let anr = RawEvent::AddError {
            message: "not responding".into(),
            source: ErrorSource::Source,
            stacktrace: Some("main".into()),
            error_type: None,
            is_fatal: false,
            is_anr: true,
            attributes: Attributes::new(),
            time: at(1),
        };
        v.handle(&anr, &parent, h.dispatch());
        assert_eq!(h.storage.errors()[0].category, Some(ErrorCategory::Anr));
    }

    #[test]
    fn test_timings_flags_and_loading_time() {
        let mut h = Harness::default();
        let listener = Arc::new(RecordingViewListener::default());
        h.services.view_changed = listener.clone();
        let parent = session_ctx();
        let mut v = view(&h, &parent);

        v.handle(&RawEvent::AddCustomTiming { name: "hero".into(), time: at(0) }, &parent, h.dispatch());
        v.handle(
            &RawEvent::AddFeatureFlagEvaluation {
                name: "dark".into(),
                value: json!(true),
                time: at(1),
            },
            &parent,
            h.dispatch(),
        );
        v.handle(
            &RawEvent::AddFeatureFlagEvaluation {
                name: "dark".into(),
                value: json!(true),
                time: at(2),
            },
            &parent,
            h.dispatch(),
        );
        v.handle(&RawEvent::AddViewLoadingTime { overwrite: false, time: at(30) }, &parent, h.dispatch());
        v.handle(&RawEvent::AddViewLoadingTime { overwrite: false, time: at(40) }, &parent, h.dispatch());
        v.handle(&RawEvent::AddViewLoadingTime { overwrite: true, time: at(50) }, &parent, h.dispatch());

        let views = h.storage.views();
        assert_eq!(views.len(), 4);
        let last = views.last().unwrap();
        assert_eq!(last.custom_timings["hero"], 1);
        assert_eq!(last.feature_flags["dark"], json!(true));
        assert_eq!(last.loading_time_nanos, Some(50_000_000));
        assert_eq!(last.document_version, 5);
        assert_eq!(listener.0.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_vitals_for_foreground_views() {
        let mut h = Harness::default();
        let cpu = Arc::new(FakeVital::default());
        let fps = Arc::new(FakeVital::default());
        cpu.set(VitalInfo { sample_count: 1, min: 100.0, max: 100.0, mean: 100.0 });
        h.services.vitals = Vitals {
            cpu: Some(cpu.clone()),
            memory: None,
            frame_rate: Some(fps.clone()),
        };
        let parent = session_ctx();
        let mut v = view(&h, &parent);

        cpu.set(VitalInfo { sample_count: 2, min: 100.0, max: 300.0, mean: 200.0 });
        fps.set(VitalInfo { sample_count: 10, min: 30.0, max: 60.0, mean: 50.0 });
        v.handle(&RawEvent::KeepAlive { time: at(2_000) }, &parent, h.dispatch());

        let vitals = h.storage.views()[0].vitals.clone();
        assert_eq!(vitals.cpu_ticks_count, Some(200.0));
        assert_eq!(vitals.cpu_ticks_per_second, Some(100.0));
        assert_eq!(vitals.refresh_rate_min, Some(30.0));
        assert_eq!(vitals.is_slow_rendered, Some(true));
        assert_eq!(vitals.memory_average, None);
    }

    #[test]
    fn test_renewed_view_drains_superseded_confirmations() {
        let h = Harness::default();
        let parent = session_ctx();
        let mut v = view(&h, &parent);

        v.handle(&RawEvent::add_error("e", ErrorSource::Source, false, at(1)), &parent, h.dispatch());
        let old = v.id();
        v.renew(at(5), &h.services);
        assert_ne!(v.id(), old);

        for ev in h.feedback.take() {
            v.handle(&ev, &parent, h.dispatch());
        }
        let lc = v.handle(&RawEvent::stop_view(home(), at(9)), &parent, h.dispatch());
        assert_eq!(lc, Lifecycle::Destruct);
        let last = h.storage.views().pop().unwrap();
        assert_eq!(last.header.view.id, v.id());
        assert_eq!(last.error_count, 0);
    }

    #[test]
    fn test_abandoned_resource_finalized_on_stop() {
        let h = Harness::default();
        let parent = session_ctx();
        let mut v = view(&h, &parent);

        v.handle(&RawEvent::start_resource("lost", "u", "GET", at(1)), &parent, h.dispatch());
        v.handle(&RawEvent::AbandonResource { key: "lost".into(), time: at(2) }, &parent, h.dispatch());
        let lc = h.run(&mut v, &parent, RawEvent::stop_view(home(), at(10)));

        assert_eq!(lc, Lifecycle::Destruct);
        assert_eq!(h.storage.resources().len(), 1);
    }

    #[test]
    fn test_completion_clears_replay_entry() {
        let h = Harness::default();
        let parent = session_ctx();
        let mut v = view(&h, &parent);
        let id = v.id().to_string();
        h.services.feature_context.update(SESSION_REPLAY_FEATURE, |m| {
            m.insert(id.clone(), json!(4));
        });

        h.run(&mut v, &parent, RawEvent::KeepAlive { time: at(1) });
        assert_eq!(h.storage.views()[0].replay_records_count, Some(4));
        assert!(h.storage.views()[0].header.session.has_replay);

        h.run(&mut v, &parent, RawEvent::stop_view(home(), at(2)));
        assert_eq!(h.services.feature_context.replay_records_count(&id), None);
    }

    #[test]
    fn test_app_launch_view_emits_start_action() {
        let h = Harness::default();
        let parent = session_ctx();
        let mut v = ViewScope::new(
            ViewKey::new("launch", "launch", "Launch"),
            Attributes::new(),
            at(0),
            ViewType::ApplicationLaunch,
            &parent,
            &h.services,
        );
        h.run(
            &mut v,
            &parent,
            RawEvent::ApplicationStarted {
                startup_nanos: 250_000_000,
                time: at(250),
            },
        );
        let actions = h.storage.actions();
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].action_type, ActionType::ApplicationStart);
        assert_eq!(actions[0].loading_time_nanos, 250_000_000);
        assert_eq!(h.storage.views().pop().unwrap().action_count, 1);
    }
}
