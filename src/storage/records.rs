//! # Output records.
//!
//! Every finalized RUM entity becomes one [`RumRecord`]. Records are plain
//! serializable DTOs: the storage collaborator decides how they are batched and
//! encoded. A view produces many records over its life (one per update, with an
//! increasing `document_version`); every other entity produces exactly one.

use std::collections::BTreeMap;

use serde::Serialize;
use uuid::Uuid;

use crate::events::{ActionType, Attributes, ErrorSource, EventTime, ResourceKind, ResourceTiming};
use crate::scopes::{RumContext, StartReason};
use crate::storage::SdkContext;

/// One finalized record.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RumRecord {
    View(ViewRecord),
    Action(ActionRecord),
    Resource(ResourceRecord),
    Error(ErrorRecord),
    LongTask(LongTaskRecord),
}

impl RumRecord {
    /// Common fields of the record.
    pub fn header(&self) -> &RecordHeader {
        match self {
            RumRecord::View(r) => &r.header,
            RumRecord::Action(r) => &r.header,
            RumRecord::Resource(r) => &r.header,
            RumRecord::Error(r) => &r.header,
            RumRecord::LongTask(r) => &r.header,
        }
    }

    /// Short stable label of the record kind.
    pub fn as_label(&self) -> &'static str {
        match self {
            RumRecord::View(_) => "view",
            RumRecord::Action(_) => "action",
            RumRecord::Resource(_) => "resource",
            RumRecord::Error(_) => "error",
            RumRecord::LongTask(_) => "long_task",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionType {
    User,
    Synthetics,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionRef {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: SessionType,
    pub has_replay: bool,
    pub start_reason: StartReason,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewRef {
    pub id: Uuid,
    pub name: Option<String>,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Synthetics {
    pub test_id: String,
    pub result_id: String,
}

/// Fields shared by every record.
#[derive(Debug, Clone, Serialize)]
pub struct RecordHeader {
    /// Server-corrected wall-clock time in milliseconds.
    pub date: i64,
    pub application_id: String,
    pub session: SessionRef,
    pub view: ViewRef,
    /// Action the record happened during, if any.
    pub action_id: Option<Uuid>,
    pub synthetics: Option<Synthetics>,
    pub service: String,
    pub version: String,
    pub source: String,
    pub sample_rate: f32,
    /// Snapshot of the SDK context at emission time.
    pub sdk: SdkContext,
    /// Global attributes merged with entity attributes.
    pub context: Attributes,
}

impl RecordHeader {
    /// Builds the shared fields from the emitting scope's context.
    pub fn new(
        ctx: &RumContext,
        sdk: SdkContext,
        time: EventTime,
        sample_rate: f32,
        has_replay: bool,
        context: Attributes,
    ) -> Self {
        let synthetics = ctx.synthetics().map(|(test_id, result_id)| Synthetics {
            test_id: test_id.to_string(),
            result_id: result_id.to_string(),
        });
        let kind = if synthetics.is_some() {
            SessionType::Synthetics
        } else {
            SessionType::User
        };
        Self {
            date: time.timestamp_ms + sdk.server_time_offset_ms,
            application_id: ctx.application_id.clone(),
            session: SessionRef {
                id: ctx.session_id,
                kind,
                has_replay,
                start_reason: ctx.session_start_reason,
            },
            view: ViewRef {
                id: ctx.view_id.unwrap_or_else(Uuid::nil),
                name: ctx.view_name.clone(),
                url: ctx.view_url.clone().unwrap_or_default(),
            },
            action_id: ctx.action_id,
            synthetics,
            service: sdk.service.clone(),
            version: sdk.version.clone(),
            source: sdk.source.clone(),
            sample_rate,
            sdk,
            context,
        }
    }
}

/// Performance figures pulled from vital monitors.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ViewVitals {
    pub cpu_ticks_count: Option<f64>,
    pub cpu_ticks_per_second: Option<f64>,
    pub memory_average: Option<f64>,
    pub memory_max: Option<f64>,
    pub refresh_rate_average: Option<f64>,
    pub refresh_rate_min: Option<f64>,
    pub is_slow_rendered: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ViewRecord {
    #[serde(flatten)]
    pub header: RecordHeader,
    pub document_version: u64,
    pub is_active: bool,
    pub time_spent_nanos: i64,
    pub loading_time_nanos: Option<i64>,
    pub action_count: u64,
    pub resource_count: u64,
    pub error_count: u64,
    pub crash_count: u64,
    pub long_task_count: u64,
    pub frozen_frame_count: u64,
    pub frustration_count: u64,
    pub custom_timings: BTreeMap<String, i64>,
    pub feature_flags: Attributes,
    pub vitals: ViewVitals,
    pub replay_records_count: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Frustration {
    ErrorTap,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActionRecord {
    #[serde(flatten)]
    pub header: RecordHeader,
    pub id: Uuid,
    pub action_type: ActionType,
    pub name: String,
    pub loading_time_nanos: i64,
    pub resource_count: u64,
    pub error_count: u64,
    pub crash_count: u64,
    pub long_task_count: u64,
    pub frustrations: Vec<Frustration>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderType {
    FirstParty,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Provider {
    pub domain: String,
    #[serde(rename = "type")]
    pub kind: ProviderType,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResourceRecord {
    #[serde(flatten)]
    pub header: RecordHeader,
    pub id: Uuid,
    pub kind: ResourceKind,
    pub url: String,
    pub method: String,
    pub status_code: Option<i64>,
    pub size: Option<i64>,
    pub duration_nanos: i64,
    pub timing: Option<ResourceTiming>,
    pub provider: Option<Provider>,
    pub trace_id: Option<String>,
    pub span_id: Option<String>,
    pub rule_psr: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Anr,
    Exception,
}

/// Resource an error was raised for.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorResource {
    pub url: String,
    pub method: String,
    pub status_code: Option<i64>,
    pub provider: Option<Provider>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorRecord {
    #[serde(flatten)]
    pub header: RecordHeader,
    pub id: Uuid,
    pub message: String,
    pub source: ErrorSource,
    pub stack: Option<String>,
    pub error_type: Option<String>,
    pub is_crash: bool,
    pub category: Option<ErrorCategory>,
    pub resource: Option<ErrorResource>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LongTaskRecord {
    #[serde(flatten)]
    pub header: RecordHeader,
    pub id: Uuid,
    pub duration_nanos: i64,
    pub is_frozen_frame: bool,
    pub target: String,
}
