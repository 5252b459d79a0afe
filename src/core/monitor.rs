//! # RumMonitor: the thread-safe ingress handle.
//!
//! Producers on any thread push [`RawEvent`]s with [`RumMonitor::send`]; a single
//! worker task owns the scope tree and drains them in order.
//!
//! ```text
//! producers ──► send(event) ──try_send──► [ingress queue] ──► Worker
//!                   │
//!                   ├─ Full   ──► RumError::QueueFull
//!                   └─ Closed ──► RumError::WorkerClosed
//!
//! shutdown() ──► token.cancel() ──► worker drains the queue ──► join
//!            ──► listener token.cancel() ──► listener drains the bus ──► join
//! ```
//!
//! ## Example
//! ```rust,no_run
//! use std::sync::Arc;
//! use rumscope::{EventTime, RawEvent, RumConfig, RumMonitorBuilder, Storage, ViewKey};
//!
//! # async fn demo(storage: Arc<dyn Storage>) -> Result<(), rumscope::RumError> {
//! let config = RumConfig::default().with_application_id("my-app");
//! let monitor = RumMonitorBuilder::new(config, storage).build()?;
//!
//! monitor.send(RawEvent::start_view(
//!     ViewKey::new("home", "app/home", "Home"),
//!     EventTime::now(),
//! ))?;
//! monitor.shutdown().await;
//! # Ok(())
//! # }
//! ```

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::collaborators::{FeatureContext, GlobalAttributes, Services};
use crate::error::RumError;
use crate::events::{FeatureMessage, RawEvent};

/// Handle to a running scope tree.
pub struct RumMonitor {
    tx: mpsc::Sender<RawEvent>,
    capacity: usize,
    services: Arc<Services>,
    token: CancellationToken,
    listener_token: CancellationToken,
    worker: Mutex<Option<JoinHandle<()>>>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl RumMonitor {
    pub(crate) fn new(
        tx: mpsc::Sender<RawEvent>,
        services: Arc<Services>,
        token: CancellationToken,
        worker: JoinHandle<()>,
        listener: Option<(CancellationToken, JoinHandle<()>)>,
    ) -> Self {
        let capacity = services.config.queue_capacity_clamped();
        let (listener_token, listener) = match listener {
            Some((token, handle)) => (token, Some(handle)),
            None => (CancellationToken::new(), None),
        };
        Self {
            tx,
            capacity,
            services,
            token,
            listener_token,
            worker: Mutex::new(Some(worker)),
            listener: Mutex::new(listener),
        }
    }

    /// Enqueues `event` without blocking.
    ///
    /// # Errors
    /// - [`RumError::QueueFull`] when the ingress queue is saturated (the event is dropped)
    /// - [`RumError::WorkerClosed`] after [`shutdown`](Self::shutdown)
    pub fn send(&self, event: RawEvent) -> Result<(), RumError> {
        if self.token.is_cancelled() {
            return Err(RumError::WorkerClosed);
        }
        self.tx.try_send(event).map_err(|err| match err {
            mpsc::error::TrySendError::Full(ev) => {
                tracing::debug!(event = ev.as_label(), "ingress queue full, event dropped");
                RumError::QueueFull {
                    capacity: self.capacity,
                }
            }
            mpsc::error::TrySendError::Closed(_) => RumError::WorkerClosed,
        })
    }

    /// Global attributes merged into every record.
    pub fn attributes(&self) -> &GlobalAttributes {
        &self.services.attributes
    }

    /// Shared feature context (`"rum"` holds the current ids).
    pub fn feature_context(&self) -> &FeatureContext {
        &self.services.feature_context
    }

    /// Receiver for the messages the scope tree publishes to sibling features.
    pub fn subscribe(&self) -> broadcast::Receiver<FeatureMessage> {
        self.services.bus.subscribe()
    }

    /// Whether [`shutdown`](Self::shutdown) was requested.
    pub fn is_closed(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Stops accepting events, lets the worker drain what was already queued, then
    /// stops the feature listener once the last message is published. Idempotent.
    pub async fn shutdown(&self) {
        self.token.cancel();

        let worker = self.worker.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(handle) = worker {
            if let Err(err) = handle.await {
                tracing::error!(target: "rumscope::telemetry", error = %err, "rum worker aborted");
            }
        }

        self.listener_token.cancel();
        let listener = self.listener.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(handle) = listener {
            let _ = handle.await;
        }
    }
}

impl Drop for RumMonitor {
    fn drop(&mut self) {
        self.token.cancel();
        self.listener_token.cancel();
    }
}
