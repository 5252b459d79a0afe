//! # Worker: the single execution context of the scope tree.
//!
//! ```text
//! RumMonitor::send ──► mpsc (bounded) ──► Worker::run
//!                                           │
//!                                           ├─► ApplicationScope::process(event)
//!                                           │       └─► Writer::submit ──► Storage::write
//!                                           │                    └──► WorkerFeedback (confirmations)
//!                                           └─► drain confirmations before the next ingress event
//! ```
//!
//! ## Rules
//! - One event at a time; scopes never run concurrently.
//! - Confirmations are queued by the writer and processed right after the event that
//!   produced them, ahead of any later ingress event.
//! - A panic while processing one event is caught, logged on `rumscope::telemetry`,
//!   and the worker moves on to the next event.
//! - On cancellation the ingress queue is closed and drained before the worker exits.

use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::collaborators::Services;
use crate::events::RawEvent;
use crate::scopes::{ApplicationScope, Dispatch};
use crate::storage::{Feedback, Storage, Writer};
use crate::subscribers::panic_message;

/// Confirmations waiting for the worker, in write order.
#[derive(Default)]
pub(crate) struct WorkerFeedback {
    queue: Mutex<VecDeque<RawEvent>>,
}

impl WorkerFeedback {
    fn pop(&self) -> Option<RawEvent> {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
    }
}

impl Feedback for WorkerFeedback {
    fn confirm(&self, event: RawEvent) {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(event);
    }
}

/// Owns the scope tree and drains the ingress queue.
pub(crate) struct Worker {
    app: ApplicationScope,
    services: Arc<Services>,
    storage: Arc<dyn Storage>,
    feedback: WorkerFeedback,
    processed: u64,
}

impl Worker {
    pub(crate) fn new(services: Arc<Services>, storage: Arc<dyn Storage>) -> Self {
        let app = ApplicationScope::new(services.config.application_id.clone());
        Self {
            app,
            services,
            storage,
            feedback: WorkerFeedback::default(),
            processed: 0,
        }
    }

    /// Runs until `token` is cancelled or every sender is dropped.
    pub(crate) async fn run(mut self, mut rx: mpsc::Receiver<RawEvent>, token: CancellationToken) {
        tracing::debug!(application_id = %self.services.config.application_id, "rum worker started");
        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                ev = rx.recv() => match ev {
                    Some(ev) => self.process(ev),
                    None => break,
                },
            }
        }

        rx.close();
        while let Ok(ev) = rx.try_recv() {
            self.process(ev);
        }
        tracing::debug!(processed = self.processed, "rum worker stopped");
    }

    /// Handles one ingress event and every confirmation it causes.
    fn process(&mut self, event: RawEvent) {
        self.dispatch_one(&event);
        while let Some(confirmation) = self.feedback.pop() {
            self.dispatch_one(&confirmation);
        }
    }

    fn dispatch_one(&mut self, event: &RawEvent) {
        self.processed += 1;
        let writer = Writer::new(self.storage.as_ref(), &self.feedback);
        let dispatch = Dispatch::new(&self.services, writer);
        let app = &mut self.app;

        let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| app.process(event, dispatch)));
        if let Err(panic_err) = outcome {
            tracing::error!(
                target: "rumscope::telemetry",
                event = event.as_label(),
                info = %panic_message(panic_err.as_ref()),
                "panic while handling a RUM event"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::RumConfig;
    use crate::error::WriteError;
    use crate::events::ViewKey;
    use crate::storage::{RumRecord, SdkContext};
    use crate::testing::{RecordingStorage, at};

    /// Panics on the first write, then behaves.
    #[derive(Default)]
    struct FlakyStorage {
        inner: RecordingStorage,
        tripped: std::sync::atomic::AtomicBool,
    }

    impl Storage for FlakyStorage {
        fn sdk_context(&self) -> SdkContext {
            self.inner.sdk_context()
        }

        fn write(&self, record: &RumRecord) -> Result<(), WriteError> {
            if !self.tripped.swap(true, std::sync::atomic::Ordering::SeqCst) {
                panic!("disk on fire");
            }
            self.inner.write(record)
        }
    }

    fn services() -> Arc<Services> {
        Arc::new(Services::new(RumConfig::default().with_application_id("app-w")))
    }

    #[tokio::test]
    async fn test_drains_queue_on_cancel() {
        let storage = Arc::new(RecordingStorage::default());
        let worker = Worker::new(services(), storage.clone());
        let (tx, rx) = mpsc::channel(8);
        let token = CancellationToken::new();

        tx.try_send(RawEvent::start_view(ViewKey::new("a", "a", "A"), at(0))).unwrap();
        tx.try_send(RawEvent::KeepAlive { time: at(5) }).unwrap();
        token.cancel();
        worker.run(rx, token).await;

        assert_eq!(storage.views().len(), 2);
        assert_eq!(storage.views()[0].header.application_id, "app-w");
    }

    #[tokio::test]
    async fn test_panic_is_isolated() {
        let storage = Arc::new(FlakyStorage::default());
        let worker = Worker::new(services(), storage.clone());
        let (tx, rx) = mpsc::channel(8);

        tx.try_send(RawEvent::start_view(ViewKey::new("a", "a", "A"), at(0))).unwrap();
        tx.try_send(RawEvent::start_view(ViewKey::new("b", "b", "B"), at(5))).unwrap();
        drop(tx);
        worker.run(rx, CancellationToken::new()).await;

        let views = storage.inner.views();
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].header.view.name.as_deref(), Some("B"));
    }
}
