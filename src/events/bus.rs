//! # Bus for broadcasting cross-feature messages.
//!
//! [`Bus`] is a thin wrapper around [`tokio::sync::broadcast`] that lets the scope
//! tree publish [`FeatureMessage`]s without blocking the event worker.
//!
//! ## Architecture
//! ```text
//! Publisher (one):                   Subscribers (many):
//!                                  ┌──► feature_listener ──► SubscriberSet
//!   SessionScope ──► Bus ──────────┼──► session replay receiver
//!               (broadcast chan)   └──► any other `subscribe()` caller
//! ```
//!
//! ## Rules
//! - **Non-blocking publish**: `publish()` never blocks; it calls `broadcast::Sender::send`.
//! - **Bounded capacity**: a single ring buffer stores recent messages for all receivers.
//! - **Lag handling**: slow receivers get `RecvError::Lagged(n)` and skip `n` oldest items.
//! - **No persistence**: messages are lost if there are no active receivers at send time.

use tokio::sync::broadcast;

use super::message::FeatureMessage;

/// Broadcast channel for cross-feature messages.
///
/// ### Properties
/// - **Non-blocking**: `publish()` returns immediately.
/// - **Fire-and-forget**: no delivery or durability guarantees.
/// - **Cloneable**: cheap to clone (internally holds an `Arc`-backed sender).
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<FeatureMessage>,
}

impl Bus {
    /// Creates a new bus with the given channel capacity.
    ///
    /// ### Notes
    /// - Capacity is **shared** across all receivers (not per-subscriber).
    /// - The minimum capacity is 1 (clamped).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, _rx) = broadcast::channel::<FeatureMessage>(capacity);
        Self { tx }
    }

    /// Publishes a message to all active receivers.
    ///
    /// If there are no receivers, the message is dropped.
    pub fn publish(&self, msg: FeatureMessage) {
        let _ = self.tx.send(msg);
    }

    /// Creates a new receiver that will observe subsequent messages.
    pub fn subscribe(&self) -> broadcast::Receiver<FeatureMessage> {
        self.tx.subscribe()
    }
}

impl Default for Bus {
    fn default() -> Self {
        Self::new(64)
    }
}
