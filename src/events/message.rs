//! # Cross-feature messages.
//!
//! [`FeatureMessage`] is what the RUM core tells sibling SDK features (session
//! replay, logs, traces) through the [`Bus`](super::Bus). The wire form consumed by
//! those features is a flat key/value map, produced by [`FeatureMessage::to_key_values`].
//!
//! ## Wire form
//! ```text
//! SessionRenewed ──► { "type": "rum_session_renewed", "keepSession": bool, "sessionId": "<uuid>" }
//! ```

use serde_json::{Map, Value, json};
use uuid::Uuid;

/// Key/value wire constants shared with sibling features.
pub const MESSAGE_TYPE_KEY: &str = "type";
pub const SESSION_RENEWED_MESSAGE: &str = "rum_session_renewed";
pub const KEEP_SESSION_KEY: &str = "keepSession";
pub const SESSION_ID_KEY: &str = "sessionId";

/// Message published by the scope tree for other features.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum FeatureMessage {
    /// A session got a new id or changed its sampling state.
    ///
    /// `keep_session` is `true` only when the session is tracked.
    SessionRenewed { session_id: Uuid, keep_session: bool },
}

impl FeatureMessage {
    /// Returns a short stable label for logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            FeatureMessage::SessionRenewed { .. } => SESSION_RENEWED_MESSAGE,
        }
    }

    /// Flat key/value form understood by sibling features.
    pub fn to_key_values(&self) -> Map<String, Value> {
        match self {
            FeatureMessage::SessionRenewed {
                session_id,
                keep_session,
            } => {
                let mut map = Map::new();
                map.insert(MESSAGE_TYPE_KEY.into(), json!(SESSION_RENEWED_MESSAGE));
                map.insert(KEEP_SESSION_KEY.into(), json!(keep_session));
                map.insert(SESSION_ID_KEY.into(), json!(session_id.to_string()));
                map
            }
        }
    }
}
