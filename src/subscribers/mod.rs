//! # Feature subscribers.
//!
//! This module provides the [`Subscribe`] trait and the [`SubscriberSet`] fan-out
//! used to deliver [`FeatureMessage`](crate::FeatureMessage)s published on the
//! [`Bus`](crate::Bus) to sibling SDK features.
//!
//! ## Architecture
//! ```text
//! SessionScope ── publish(SessionRenewed) ──► Bus ──► SubscriberSet::listen
//!                                                         │
//!                                               ┌─────────┼─────────┐
//!                                               ▼         ▼         ▼
//!                                         LogWriter  SessionReplay  Custom
//! ```

mod subscriber;
mod subscriber_set;

#[cfg(feature = "logging")]
mod embedded;

#[cfg(feature = "logging")]
pub use embedded::LogWriter;
pub use subscriber::Subscribe;
pub use subscriber_set::SubscriberSet;
pub(crate) use subscriber_set::panic_message;
