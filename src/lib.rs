//! # rumscope
//!
//! **rumscope** is the event-processing core of a mobile Real User Monitoring SDK.
//!
//! It turns a stream of raw instrumentation events (view starts, user actions,
//! network resources, errors, long tasks) into RUM records, attributed to the
//! right session and view, sampled per session, and written to a pluggable
//! [`Storage`].
//!
//! ## Architecture
//! ### Overview
//! ```text
//!  producers (any thread)
//!       │  RumMonitor::send(RawEvent)
//!       ▼
//! ┌──────────────────────────────────────────────────────────────────┐
//! │  Worker (single task, owns the scope tree)                       │
//! │                                                                  │
//! │  ApplicationScope                                                │
//! │   └─ SessionScope        (sampling, renewal, state)              │
//! │       └─ ViewManagerScope (launch / background views)            │
//! │           └─ ViewScope   (counters, vitals, versioned updates)   │
//! │               ├─ ActionScope   (one at a time)                   │
//! │               └─ ResourceScope (keyed by request)                │
//! └───────┬───────────────────────────────────────┬──────────────────┘
//!         │ Writer::submit(record)                │ Bus::publish(FeatureMessage)
//!         ▼                                       ▼
//!     Storage::write ──► Feedback::confirm   SubscriberSet (per-sub queues)
//!            (Sent / Dropped re-enter the worker)      ▼
//!                                              sub1 .. subN on_message()
//! ```
//!
//! ### Event flow
//! ```text
//! RawEvent ──► ApplicationScope::handle
//!                  ├─ no active session && interaction ──► new SessionScope
//!                  └─ every child scope handles the event and returns
//!                     Lifecycle::Keep or Lifecycle::Destruct
//! ```
//!
//! - Scopes are plain structs mutated by the worker; nothing in the tree is shared.
//! - Records are emitted only for tracked sessions; unsampled sessions still
//!   update their state so renewals keep working.
//! - Write confirmations are processed right after the event that caused them.
//!
//! ## Features
//! | Area            | Description                                                 | Key types                                   |
//! |-----------------|-------------------------------------------------------------|---------------------------------------------|
//! | **Ingress**     | Thread-safe bounded queue with graceful shutdown.           | [`RumMonitor`], [`RumMonitorBuilder`]       |
//! | **Scopes**      | Session, view, action and resource state machines.          | [`ApplicationScope`], [`Scope`]             |
//! | **Records**     | Serializable RUM records and their shared header.           | [`RumRecord`], [`RecordHeader`]             |
//! | **Sampling**    | Per-session sampling decision.                              | [`Sampler`], [`RandomSampler`]              |
//! | **Subscribers** | Cross-feature messages (session renewals).                  | [`Subscribe`], [`FeatureMessage`]           |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in [`LogWriter`] subscriber *(demo/reference only)*.
//!
//! ## Example
//! ```rust,no_run
//! use std::sync::Arc;
//! use rumscope::{
//!     ActionType, EventTime, RawEvent, RumConfig, RumMonitorBuilder, RumRecord, SdkContext,
//!     Storage, ViewKey, WriteError,
//! };
//!
//! struct Stdout;
//!
//! impl Storage for Stdout {
//!     fn sdk_context(&self) -> SdkContext {
//!         SdkContext::default()
//!     }
//!
//!     fn write(&self, record: &RumRecord) -> Result<(), WriteError> {
//!         let line = serde_json::to_string(record)?;
//!         println!("{line}");
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), rumscope::RumError> {
//!     let config = RumConfig::default().with_application_id("demo-app");
//!     let monitor = RumMonitorBuilder::new(config, Arc::new(Stdout)).build()?;
//!
//!     monitor.send(RawEvent::start_view(
//!         ViewKey::new("home", "app/home", "Home"),
//!         EventTime::now(),
//!     ))?;
//!     monitor.send(RawEvent::start_action(ActionType::Tap, "login", false, EventTime::now()))?;
//!
//!     monitor.shutdown().await;
//!     Ok(())
//! }
//! ```
mod collaborators;
mod core;
mod error;
mod events;
mod policies;
mod scopes;
mod storage;
mod subscribers;

#[cfg(test)]
mod testing;

// ---- Public re-exports ----

pub use collaborators::{
    FeatureContext, FirstPartyHosts, GlobalAttributes, HAS_REPLAY_KEY, HostList,
    NetworkSettledListener, NoopListener, ProcessInfo, RUM_FEATURE, SESSION_REPLAY_FEATURE,
    Services, SessionListener, StaticProcessInfo, ViewChangedListener, ViewInfo, VitalInfo,
    VitalMonitor, Vitals,
};
pub use core::{RumConfig, RumMonitor, RumMonitorBuilder};
pub use error::{RumError, WriteError};
pub use events::{
    ActionType, Attributes, Bus, ErrorSource, EventTime, FeatureMessage, KEEP_SESSION_KEY,
    MESSAGE_TYPE_KEY, RawEvent, ResourceKind, ResourceTiming, SESSION_ID_KEY,
    SESSION_RENEWED_MESSAGE, StorageEvent, ViewKey,
};
pub use policies::{RandomSampler, Sampler, SeededSampler};
pub use scopes::{
    APP_LAUNCH_VIEW_ID, APP_LAUNCH_VIEW_NAME, APP_LAUNCH_VIEW_URL, ActionScope,
    ApplicationScope, BACKGROUND_VIEW_ID, BACKGROUND_VIEW_NAME, BACKGROUND_VIEW_URL, Dispatch,
    Lifecycle, ResourceScope, RumContext, Scope, SessionScope, SessionState, StartReason,
    ViewManagerScope, ViewScope, ViewType,
};
pub use storage::{
    ActionRecord, DeviceInfo, ErrorCategory, ErrorRecord, ErrorResource, Feedback, Frustration,
    LongTaskRecord, OsInfo, Provider, ProviderType, RecordHeader, ResourceRecord, RumRecord,
    SdkContext, SessionRef, SessionType, Storage, Synthetics, UserInfo, ViewRecord, ViewRef,
    ViewVitals, Writer,
};
pub use subscribers::{Subscribe, SubscriberSet};

// Optional: expose a simple built-in logger subscriber (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
