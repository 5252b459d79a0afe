//! Event model and cross-feature bus.
//!
//! This module groups the **input** data model of the scope tree and the **bus**
//! used to publish messages to sibling SDK features.
//!
//! ## Contents
//! - [`RawEvent`], [`EventTime`] and payload types: everything the tree reacts to
//! - [`StorageEvent`]: record category turned into `*Sent` / `*Dropped` confirmations
//! - [`FeatureMessage`]: what the tree tells other features
//! - [`Bus`]: thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Producers of raw events**: instrumentation call sites through
//!   [`RumMonitor::send`](crate::RumMonitor::send), and the storage boundary through
//!   [`Feedback`](crate::Feedback).
//! - **Publisher on the bus**: `SessionScope` (session renewal).
//! - **Consumers of the bus**: `SubscriberSet` workers and any direct `subscribe()` caller.

mod bus;
mod event;
mod message;

pub use bus::Bus;
pub use event::{
    ActionType, Attributes, ErrorSource, EventTime, RawEvent, ResourceKind, ResourceTiming,
    StorageEvent, ViewKey,
};
pub use message::{
    FeatureMessage, KEEP_SESSION_KEY, MESSAGE_TYPE_KEY, SESSION_ID_KEY, SESSION_RENEWED_MESSAGE,
};
