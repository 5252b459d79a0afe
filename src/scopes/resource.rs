//! # ResourceScope: one in-flight network call.
//!
//! ```text
//! StartResource(key) ──► ResourceScope
//!    ├─ WaitForResourceTiming(key) ──► hold emission until timing arrives
//!    ├─ AddResourceTiming(key)     ──► merge timing (emit if already stopped)
//!    ├─ StopResource(key)          ──► Resource record
//!    ├─ StopResourceWithError(key) ──► Error record (category = exception)
//!    ├─ StopResourceWithStackTrace ──► Error record (exception iff stack non-empty)
//!    └─ AbandonResource(key)       ──► unreachable; the host view finalizes it
//! ```
//!
//! ## Rules
//! - Events for another key are ignored.
//! - Exactly one record per instance; the scope destructs once it has emitted.
//! - The context (view and action ids) is the one captured at creation.

use serde_json::Value;
use uuid::Uuid;

use crate::collaborators::Services;
use crate::events::{
    Attributes, ErrorSource, EventTime, RawEvent, ResourceKind, ResourceTiming, StorageEvent,
};
use crate::scopes::{Dispatch, Lifecycle, RumContext, Scope, record_header};
use crate::storage::{
    ErrorCategory, ErrorRecord, ErrorResource, Provider, ProviderType, ResourceRecord, RumRecord,
};

pub(crate) const TRACE_ID_KEY: &str = "_dd.trace_id";
pub(crate) const SPAN_ID_KEY: &str = "_dd.span_id";
pub(crate) const RULE_PSR_KEY: &str = "_dd.rule_psr";
pub(crate) const RESOURCE_TIMINGS_KEY: &str = "_dd.resource_timings";

/// Error details of a failed resource.
struct ResourceFailure<'e> {
    message: &'e str,
    source: ErrorSource,
    status_code: Option<i64>,
    stack: Option<String>,
    error_type: Option<String>,
    category: Option<ErrorCategory>,
}

/// Tracks one network call identified by its correlation key.
#[derive(Debug)]
pub struct ResourceScope {
    id: Uuid,
    key: String,
    url: String,
    method: String,
    attributes: Attributes,
    context: RumContext,
    started: EventTime,
    timing: Option<ResourceTiming>,
    wait_for_timing: bool,
    stopped: bool,
    sent: bool,
    abandoned: bool,
    ended_with_error: bool,
    kind: ResourceKind,
    status_code: Option<i64>,
    size: Option<i64>,
}

impl ResourceScope {
    /// Starts tracking `key`; `context` is the host view context at creation.
    pub fn new(
        key: impl Into<String>,
        url: impl Into<String>,
        method: impl Into<String>,
        attributes: Attributes,
        time: EventTime,
        context: RumContext,
        services: &Services,
    ) -> Self {
        let id = Uuid::new_v4();
        services.network_settled.on_resource_started(id, time.nanos);
        Self {
            id,
            key: key.into(),
            url: url.into(),
            method: method.into(),
            attributes,
            context,
            started: time,
            timing: None,
            wait_for_timing: false,
            stopped: false,
            sent: false,
            abandoned: false,
            ended_with_error: false,
            kind: ResourceKind::Unknown,
            status_code: None,
            size: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Whether the emitted record was an error instead of a resource.
    pub(crate) fn ended_with_error(&self) -> bool {
        self.ended_with_error
    }

    /// Whether the single record of this resource was written.
    pub(crate) fn is_finished(&self) -> bool {
        self.sent
    }

    /// A key is unreachable once abandoned, or once older than `ttl_nanos`.
    pub(crate) fn is_unreachable(&self, now: i64, ttl_nanos: Option<i64>) -> bool {
        self.abandoned || ttl_nanos.is_some_and(|ttl| now - self.started.nanos > ttl)
    }

    /// Emits the resource with whatever is known so far. Used by the host view when
    /// the caller can no longer stop it.
    pub(crate) fn finalize_unreachable(&mut self, time: EventTime, dispatch: Dispatch<'_>) {
        if self.sent {
            return;
        }
        tracing::debug!(key = %self.key, "finalizing unreachable resource");
        self.stopped = true;
        self.send_resource(time, dispatch);
    }

    fn on_stop(
        &mut self,
        kind: ResourceKind,
        status_code: Option<i64>,
        size: Option<i64>,
        attributes: &Attributes,
        time: EventTime,
        dispatch: Dispatch<'_>,
    ) {
        self.stopped = true;
        merge(&mut self.attributes, attributes);
        self.kind = kind;
        self.status_code = status_code;
        self.size = size;

        if !(self.wait_for_timing && self.timing.is_none()) {
            self.send_resource(time, dispatch);
        }
    }

    fn on_add_timing(&mut self, timing: ResourceTiming, time: EventTime, dispatch: Dispatch<'_>) {
        self.timing = Some(timing);
        if self.stopped && !self.sent {
            self.send_resource(time, dispatch);
        }
    }

    fn resolve_duration(&self, end: EventTime) -> i64 {
        let duration = end.nanos - self.started.nanos;
        if duration <= 0 {
            tracing::warn!(
                target: "rumscope::user",
                url = %self.url,
                duration,
                "resource duration is zero or negative, using 1ns instead"
            );
            1
        } else {
            duration
        }
    }

    fn provider(&self, services: &Services) -> Option<Provider> {
        services.first_party_domain(&self.url).map(|domain| Provider {
            domain,
            kind: ProviderType::FirstParty,
        })
    }

    fn view_id(&self) -> Uuid {
        self.context.view_id.unwrap_or_else(Uuid::nil)
    }

    fn send_resource(&mut self, end: EventTime, dispatch: Dispatch<'_>) {
        let trace_id = self.attributes.remove(TRACE_ID_KEY).map(value_to_string);
        let span_id = self.attributes.remove(SPAN_ID_KEY).map(value_to_string);
        let rule_psr = self
            .attributes
            .remove(RULE_PSR_KEY)
            .and_then(|v| v.as_f64());
        let attached_timing = self
            .attributes
            .remove(RESOURCE_TIMINGS_KEY)
            .and_then(|v| serde_json::from_value::<ResourceTiming>(v).ok());
        let timing = self.timing.or(attached_timing);

        let record = ResourceRecord {
            header: record_header(&self.context, dispatch, self.started, &self.attributes),
            id: self.id,
            kind: self.kind,
            url: self.url.clone(),
            method: self.method.clone(),
            status_code: self.status_code,
            size: self.size,
            duration_nanos: self.resolve_duration(end),
            timing,
            provider: self.provider(dispatch.services),
            trace_id,
            span_id,
            rule_psr,
        };

        self.sent = true;
        dispatch.writer.submit(
            RumRecord::Resource(record),
            Some(StorageEvent::Resource {
                view_id: self.view_id(),
            }),
            end,
        );
        dispatch
            .services
            .network_settled
            .on_resource_stopped(self.id, end.nanos);
    }

    fn send_error(&mut self, failure: ResourceFailure<'_>, time: EventTime, dispatch: Dispatch<'_>) {
        let record = ErrorRecord {
            header: record_header(&self.context, dispatch, time, &self.attributes),
            id: Uuid::new_v4(),
            message: failure.message.to_string(),
            source: failure.source,
            stack: failure.stack,
            error_type: failure.error_type,
            is_crash: false,
            category: failure.category,
            resource: Some(ErrorResource {
                url: self.url.clone(),
                method: self.method.clone(),
                status_code: failure.status_code,
                provider: self.provider(dispatch.services),
            }),
        };

        self.stopped = true;
        self.sent = true;
        self.ended_with_error = true;
        dispatch.writer.submit(
            RumRecord::Error(record),
            Some(StorageEvent::Error {
                view_id: self.view_id(),
            }),
            time,
        );
        dispatch
            .services
            .network_settled
            .on_resource_stopped(self.id, time.nanos);
    }
}

impl Scope for ResourceScope {
    fn handle(&mut self, event: &RawEvent, _parent: &RumContext, dispatch: Dispatch<'_>) -> Lifecycle {
        if self.sent {
            return Lifecycle::Destruct;
        }

        match event {
            RawEvent::WaitForResourceTiming { key, .. } => {
                if *key == self.key {
                    self.wait_for_timing = true;
                }
            }
            RawEvent::AddResourceTiming { key, timing, time } => {
                if *key == self.key {
                    self.on_add_timing(*timing, *time, dispatch);
                }
            }
            RawEvent::StopResource {
                key,
                status_code,
                size,
                kind,
                attributes,
                time,
            } => {
                if *key == self.key {
                    self.on_stop(*kind, *status_code, *size, attributes, *time, dispatch);
                }
            }
            RawEvent::StopResourceWithError {
                key,
                status_code,
                message,
                source,
                error_type,
                stacktrace,
                attributes,
                time,
            } => {
                if *key == self.key {
                    merge(&mut self.attributes, attributes);
                    let failure = ResourceFailure {
                        message,
                        source: *source,
                        status_code: *status_code,
                        stack: stacktrace.clone(),
                        error_type: error_type.clone(),
                        category: Some(ErrorCategory::Exception),
                    };
                    self.send_error(failure, *time, dispatch);
                }
            }
            RawEvent::StopResourceWithStackTrace {
                key,
                status_code,
                message,
                source,
                stacktrace,
                error_type,
                attributes,
                time,
            } => {
                if *key == self.key {
                    merge(&mut self.attributes, attributes);
                    let category = if stacktrace.is_empty() {
                        None
                    } else {
                        Some(ErrorCategory::Exception)
                    };
                    let failure = ResourceFailure {
                        message,
                        source: *source,
                        status_code: *status_code,
                        stack: Some(stacktrace.clone()),
                        error_type: error_type.clone(),
                        category,
                    };
                    self.send_error(failure, *time, dispatch);
                }
            }
            RawEvent::AbandonResource { key, .. } => {
                if *key == self.key {
                    self.abandoned = true;
                }
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
            | RawEvent::AddError { .. }
            | RawEvent::AddLongTask { .. }
            | RawEvent::ApplicationStarted { .. }
            | RawEvent::KeepAlive { .. }
            | RawEvent::ResetSession { .. }
            | RawEvent::StopSession { .. }
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

        Lifecycle::keep_if(!self.sent)
    }

    fn context(&self) -> RumContext {
        self.context.clone()
    }

    fn is_active(&self) -> bool {
        !self.stopped
    }
}

fn merge(into: &mut Attributes, from: &Attributes) {
    into.extend(from.iter().map(|(k, v)| (k.clone(), v.clone())));
}

fn value_to_string(v: Value) -> String {
    match v {
        Value::String(s) => s,
        other => other.to_string(),
    }
}
