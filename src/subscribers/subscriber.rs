//! # Feature subscriber trait.
//!
//! Provides [`Subscribe`], the extension point for sibling features that want to
//! react to [`FeatureMessage`]s (session replay, logs correlation, custom sinks).
//!
//! Each subscriber gets:
//! - **Dedicated worker task** (runs independently)
//! - **Per-subscriber bounded queue** (capacity via [`Subscribe::queue_capacity`])
//! - **Panic isolation** (panics are caught and logged on the `rumscope::telemetry` target)
//!
//! ## Architecture
//! ```text
//! SubscriberSet ──► [bounded queue] ──► worker task ──► subscriber.on_message()
//!                                    └─► panic caught → telemetry log
//! ```
//!
//! ## Rules
//! - A slow subscriber only affects its own queue.
//! - Queue overflow drops the message **for this subscriber only**.
//! - Messages are processed sequentially (FIFO) per subscriber.
//! - Subscribers never block the event worker or each other.
//!
//! ## Example
//! ```rust
//! use async_trait::async_trait;
//! use rumscope::{FeatureMessage, Subscribe};
//!
//! struct SessionReplay;
//!
//! #[async_trait]
//! impl Subscribe for SessionReplay {
//!     async fn on_message(&self, msg: &FeatureMessage) {
//!         if let FeatureMessage::SessionRenewed { keep_session, .. } = msg {
//!             // start or stop recording
//!             let _ = keep_session;
//!         }
//!     }
//!
//!     fn name(&self) -> &'static str { "session-replay" }
//! }
//! ```

use async_trait::async_trait;

use crate::events::FeatureMessage;

/// Receiver of cross-feature messages.
///
/// ### Implementation requirements
/// - Use async I/O; avoid blocking the executor.
/// - Handle errors internally; do not panic.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Processes a single message.
    ///
    /// Called from a dedicated worker task, never from the event worker.
    async fn on_message(&self, msg: &FeatureMessage);

    /// Returns the subscriber name used in logs.
    ///
    /// The default uses `type_name::<Self>()`, which can be verbose; override it when possible.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Returns the preferred queue capacity for this subscriber.
    ///
    /// The runtime clamps capacity to a minimum of 1.
    ///
    /// Default: 64.
    fn queue_capacity(&self) -> usize {
        64
    }
}
