//! # Non-blocking message fan-out to multiple subscribers.
//!
//! Provides [`SubscriberSet`], which distributes [`FeatureMessage`]s to several
//! subscribers concurrently without blocking the publisher.
//!
//! ## Architecture
//! ```text
//! emit(msg)
//!     │
//!     ├──► [queue 1] ──► worker 1 ──► subscriber1.on_message()
//!     │    (bounded)         └──────► panic → telemetry log
//!     ├──► [queue 2] ──► worker 2 ──► subscriber2.on_message()
//!     │    (bounded)
//!     └──► [queue N] ──► worker N ──► subscriberN.on_message()
//! ```
//!
//! ## Rules
//! - **No cross-subscriber ordering**: subscriber A may process message N while B processes N+5
//! - **Overflow**: message dropped for that subscriber only, logged on `rumscope::telemetry`
//! - **Non-blocking**: `emit()` returns immediately (uses `try_send`)
//! - **Isolation**: a slow or panicking subscriber doesn't affect others
//! - **Per-subscriber FIFO**: each subscriber sees messages in order
//!
//! **Warning**: `AssertUnwindSafe` is used, which can leave shared state inconsistent
//! if a subscriber uses `Arc<Mutex<T>>` and panics while holding the lock.

use std::sync::Arc;

use futures::FutureExt;
use tokio::{sync::broadcast, sync::mpsc, task::JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::events::{Bus, FeatureMessage};
use crate::subscribers::Subscribe;

/// Per-subscriber channel metadata.
struct SubscriberChannel {
    name: &'static str,
    sender: mpsc::Sender<Arc<FeatureMessage>>,
}

/// Fan-out coordinator for multiple feature subscribers.
pub struct SubscriberSet {
    channels: Vec<SubscriberChannel>,
    workers: Vec<JoinHandle<()>>,
}

impl SubscriberSet {
    /// Creates a new set and spawns one worker task per subscriber.
    ///
    /// ### Notes
    /// - Must be called from within a tokio runtime.
    /// - Minimum queue capacity is 1 (enforced).
    #[must_use]
    pub fn new(subs: Vec<Arc<dyn Subscribe>>) -> Self {
        let mut channels = Vec::with_capacity(subs.len());
        let mut workers = Vec::with_capacity(subs.len());

        for sub in subs {
            let cap = sub.queue_capacity().max(1);
            let name = sub.name();
            let (tx, mut rx) = mpsc::channel::<Arc<FeatureMessage>>(cap);
            let s = Arc::clone(&sub);

            let handle = tokio::spawn(async move {
                while let Some(msg) = rx.recv().await {
                    let fut = s.on_message(msg.as_ref());

                    if let Err(panic_err) = std::panic::AssertUnwindSafe(fut).catch_unwind().await {
                        tracing::error!(
                            target: "rumscope::telemetry",
                            subscriber = s.name(),
                            info = %panic_message(panic_err.as_ref()),
                            "feature subscriber panicked"
                        );
                    }
                }
            });
            channels.push(SubscriberChannel { name, sender: tx });
            workers.push(handle);
        }
        Self { channels, workers }
    }

    /// Returns `true` when no subscriber is registered.
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Emits a message to all subscribers.
    ///
    /// - Uses `try_send` (non-blocking)
    /// - On queue full or closed: drops the message for that subscriber and logs it
    pub fn emit(&self, msg: &FeatureMessage) {
        let msg = Arc::new(msg.clone());
        for channel in &self.channels {
            match channel.sender.try_send(Arc::clone(&msg)) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    tracing::warn!(
                        target: "rumscope::telemetry",
                        subscriber = channel.name,
                        reason = "full",
                        "feature subscriber overflow"
                    );
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    tracing::warn!(
                        target: "rumscope::telemetry",
                        subscriber = channel.name,
                        reason = "closed",
                        "feature subscriber overflow"
                    );
                }
            }
        }
    }

    /// Forwards every message published on `bus` until `token` is cancelled or the
    /// bus closes, then shuts the subscriber workers down.
    pub fn listen(self, bus: &Bus, token: CancellationToken) -> JoinHandle<()> {
        let mut rx = bus.subscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    msg = rx.recv() => match msg {
                        Ok(msg) => self.emit(&msg),
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::warn!(
                                target: "rumscope::telemetry",
                                skipped,
                                "feature listener lagged behind the bus"
                            );
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                }
            }
            // Drain what was already published before cancellation.
            while let Ok(msg) = rx.try_recv() {
                self.emit(&msg);
            }
            self.shutdown().await;
        })
    }

    /// Gracefully shuts down all subscriber workers.
    ///
    /// 1. Drops all channel senders (workers see channel closed)
    /// 2. Awaits all worker tasks to finish
    pub async fn shutdown(self) {
        drop(self.channels);

        for h in self.workers {
            let _ = h.await;
        }
    }
}

/// Extracts a readable message from a panic payload.
pub(crate) fn panic_message(any: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = any.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = any.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
