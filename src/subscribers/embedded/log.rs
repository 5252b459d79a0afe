//! # LogWriter: feature message printer
//!
//! A minimal subscriber that reports incoming [`FeatureMessage`]s through `tracing`.
//! Use it for tests or demos.
//!
//! ## Example output
//! ```text
//! INFO rumscope::features: feature message kind="rum_session_renewed" session_id=3f1c… keep_session=true
//! ```

use async_trait::async_trait;

use crate::events::FeatureMessage;
use crate::subscribers::Subscribe;

/// Feature message writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_message(&self, msg: &FeatureMessage) {
        match msg {
            FeatureMessage::SessionRenewed {
                session_id,
                keep_session,
            } => {
                tracing::info!(
                    target: "rumscope::features",
                    kind = msg.as_label(),
                    %session_id,
                    keep_session,
                    "feature message"
                );
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
