//! In-memory fakes shared by unit tests.

use std::sync::{Arc, Mutex};

use uuid::Uuid;

use crate::collaborators::{
    NetworkSettledListener, SessionListener, Services, StaticProcessInfo, ViewChangedListener,
    ViewInfo, VitalInfo, VitalMonitor,
};
use crate::core::RumConfig;
use crate::error::WriteError;
use crate::events::{EventTime, RawEvent};
use crate::policies::SeededSampler;
use crate::scopes::{Dispatch, Lifecycle, RumContext, Scope};
use crate::storage::{
    ActionRecord, ErrorRecord, Feedback, LongTaskRecord, ResourceRecord, RumRecord, SdkContext,
    Storage, ViewRecord, Writer,
};

/// Wall clock of the first test tick.
pub(crate) const BASE_MS: i64 = 1_700_000_000_000;

/// Event time `ms` milliseconds after the test origin.
pub(crate) fn at(ms: i64) -> EventTime {
    EventTime::new(BASE_MS + ms, ms * 1_000_000)
}

/// Storage that keeps every record in memory.
#[derive(Default)]
pub(crate) struct RecordingStorage {
    records: Mutex<Vec<RumRecord>>,
    fail: bool,
}

impl RecordingStorage {
    pub(crate) fn failing() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    pub(crate) fn records(&self) -> Vec<RumRecord> {
        self.records.lock().unwrap().clone()
    }

    pub(crate) fn views(&self) -> Vec<ViewRecord> {
        self.records()
            .into_iter()
            .filter_map(|r| match r {
                RumRecord::View(v) => Some(v),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn actions(&self) -> Vec<ActionRecord> {
        self.records()
            .into_iter()
            .filter_map(|r| match r {
                RumRecord::Action(a) => Some(a),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn resources(&self) -> Vec<ResourceRecord> {
        self.records()
            .into_iter()
            .filter_map(|r| match r {
                RumRecord::Resource(a) => Some(a),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn errors(&self) -> Vec<ErrorRecord> {
        self.records()
            .into_iter()
            .filter_map(|r| match r {
                RumRecord::Error(a) => Some(a),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn long_tasks(&self) -> Vec<LongTaskRecord> {
        self.records()
            .into_iter()
            .filter_map(|r| match r {
                RumRecord::LongTask(a) => Some(a),
                _ => None,
            })
            .collect()
    }
}

impl Storage for RecordingStorage {
    fn sdk_context(&self) -> SdkContext {
        SdkContext {
            service: "test-service".into(),
            source: "android".into(),
            ..SdkContext::default()
        }
    }

    fn write(&self, record: &RumRecord) -> Result<(), WriteError> {
        if self.fail {
            return Err(WriteError::Rejected {
                reason: "test storage rejects everything".into(),
            });
        }
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }
}

/// Feedback that queues confirmations until the test takes them.
#[derive(Default)]
pub(crate) struct QueuedFeedback {
    queue: Mutex<Vec<RawEvent>>,
}

impl QueuedFeedback {
    pub(crate) fn take(&self) -> Vec<RawEvent> {
        std::mem::take(&mut *self.queue.lock().unwrap())
    }
}

impl Feedback for QueuedFeedback {
    fn confirm(&self, event: RawEvent) {
        self.queue.lock().unwrap().push(event);
    }
}

/// Vital monitor returning whatever the test sets.
#[derive(Default)]
pub(crate) struct FakeVital(Mutex<Option<VitalInfo>>);

impl FakeVital {
    pub(crate) fn set(&self, info: VitalInfo) {
        *self.0.lock().unwrap() = Some(info);
    }
}

impl VitalMonitor for FakeVital {
    fn snapshot(&self) -> Option<VitalInfo> {
        *self.0.lock().unwrap()
    }
}

#[derive(Default)]
pub(crate) struct RecordingSessionListener(pub(crate) Mutex<Vec<(Uuid, bool)>>);

impl SessionListener for RecordingSessionListener {
    fn on_session_started(&self, session_id: Uuid, is_discarded: bool) {
        self.0.lock().unwrap().push((session_id, is_discarded));
    }
}

#[derive(Default)]
pub(crate) struct RecordingViewListener(pub(crate) Mutex<Vec<ViewInfo>>);

impl ViewChangedListener for RecordingViewListener {
    fn on_view_changed(&self, info: ViewInfo) {
        self.0.lock().unwrap().push(info);
    }
}

/// Records network-settled callbacks as `(resource id, timestamp)` pairs.
#[derive(Default)]
pub(crate) struct RecordingNetworkListener {
    started: Mutex<Vec<(Uuid, i64)>>,
    stopped: Mutex<Vec<(Uuid, i64)>>,
}

impl RecordingNetworkListener {
    pub(crate) fn started(&self) -> Vec<(Uuid, i64)> {
        self.started.lock().unwrap().clone()
    }

    pub(crate) fn stopped(&self) -> Vec<(Uuid, i64)> {
        self.stopped.lock().unwrap().clone()
    }
}

impl NetworkSettledListener for RecordingNetworkListener {
    fn on_resource_started(&self, resource_id: Uuid, start_nanos: i64) {
        self.started.lock().unwrap().push((resource_id, start_nanos));
    }

    fn on_resource_stopped(&self, resource_id: Uuid, stop_nanos: i64) {
        self.stopped.lock().unwrap().push((resource_id, stop_nanos));
    }
}

/// Services plus in-memory storage and feedback.
pub(crate) struct Harness {
    pub(crate) services: Services,
    pub(crate) storage: RecordingStorage,
    pub(crate) feedback: QueuedFeedback,
}

impl Default for Harness {
    fn default() -> Self {
        Self::with_config(RumConfig::default())
    }
}

impl Harness {
    pub(crate) fn with_config(config: RumConfig) -> Self {
        let mut services = Services::new(config.with_application_id("app-test"));
        services.sampler = Arc::new(SeededSampler::new(7));
        services.process = Arc::new(StaticProcessInfo::new(false, 0));
        Self {
            services,
            storage: RecordingStorage::default(),
            feedback: QueuedFeedback::default(),
        }
    }

    pub(crate) fn dispatch(&self) -> Dispatch<'_> {
        Dispatch::new(&self.services, Writer::new(&self.storage, &self.feedback))
    }

    /// Handles `event`, then feeds every confirmation back into `scope` until none
    /// is left. Returns the lifecycle of the last call.
    pub(crate) fn run<S: Scope>(&self, scope: &mut S, parent: &RumContext, event: RawEvent) -> Lifecycle {
        let mut last = scope.handle(&event, parent, self.dispatch());
        loop {
            let pending = self.feedback.take();
            if pending.is_empty() {
                return last;
            }
            for ev in pending {
                last = scope.handle(&ev, parent, self.dispatch());
            }
        }
    }
}
