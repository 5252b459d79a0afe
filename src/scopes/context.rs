//! # RumContext: identifiers overlaid level by level.
//!
//! Each scope receives its parent's context on every `handle` call and overlays only
//! the fields it owns:
//!
//! ```text
//! ApplicationScope  ──► application_id, synthetics ids
//!   SessionScope    ──► session_id, session_state, session_start_reason, is_session_active
//!     ViewScope     ──► view_id, view_name, view_url, view_type, action_id
//! ```
//!
//! The value is read-only for callers; only the owning scope mutates its fields.

use serde::Serialize;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::events::Attributes;

/// Sampling/lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionState {
    /// Session was sampled out; its records are swallowed.
    #[default]
    NotTracked,
    /// Session was sampled in; its records reach storage.
    Tracked,
    /// No interaction within the inactivity window; waiting for renewal.
    Expired,
}

impl SessionState {
    /// Returns the wire name of the state.
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::NotTracked => "NOT_TRACKED",
            SessionState::Tracked => "TRACKED",
            SessionState::Expired => "EXPIRED",
        }
    }
}

/// Why the current session id was assigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StartReason {
    /// First interaction of the process.
    #[default]
    UserAppLaunch,
    /// Interaction after the inactivity window elapsed.
    InactivityTimeout,
    /// The previous session reached its maximum duration.
    MaxDuration,
    /// Background event after expiry, with background tracking enabled.
    BackgroundLaunch,
    /// Explicit `ResetSession`.
    ExplicitStop,
}

impl StartReason {
    /// Returns the wire name of the reason.
    pub fn as_str(&self) -> &'static str {
        match self {
            StartReason::UserAppLaunch => "user_app_launch",
            StartReason::InactivityTimeout => "inactivity_timeout",
            StartReason::MaxDuration => "max_duration",
            StartReason::BackgroundLaunch => "background_launch",
            StartReason::ExplicitStop => "explicit_stop",
        }
    }
}

/// Kind of view a view scope tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewType {
    /// No view in context.
    #[default]
    None,
    /// A screen started by `StartView`.
    Foreground,
    /// Synthetic view hosting events that arrive with no foreground view.
    Background,
    /// Synthetic view covering the application launch.
    ApplicationLaunch,
}

/// Identifiers describing where an event happened.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct RumContext {
    pub application_id: String,
    /// Nil until the first renewal.
    pub session_id: Uuid,
    pub session_state: SessionState,
    pub session_start_reason: StartReason,
    pub is_session_active: bool,
    pub view_id: Option<Uuid>,
    pub view_name: Option<String>,
    pub view_url: Option<String>,
    pub view_type: ViewType,
    pub action_id: Option<Uuid>,
    pub synthetics_test_id: Option<String>,
    pub synthetics_result_id: Option<String>,
}

impl RumContext {
    /// Root context for an application.
    pub fn for_application(application_id: impl Into<String>) -> Self {
        Self {
            application_id: application_id.into(),
            ..Self::default()
        }
    }

    /// Returns `(test_id, result_id)` when both synthetics ids are non-blank.
    pub fn synthetics(&self) -> Option<(&str, &str)> {
        let test = self.synthetics_test_id.as_deref().filter(|s| !s.trim().is_empty())?;
        let result = self
            .synthetics_result_id
            .as_deref()
            .filter(|s| !s.trim().is_empty())?;
        Some((test, result))
    }

    /// Flat form published to the shared feature context under `"rum"`.
    pub fn to_feature_entries(&self) -> Attributes {
        let mut out = Attributes::new();
        out.insert("application_id".into(), json!(self.application_id));
        out.insert("session_id".into(), json!(self.session_id.to_string()));
        out.insert("session_state".into(), json!(self.session_state.as_str()));
        out.insert("session_active".into(), json!(self.is_session_active));
        out.insert("view_type".into(), serde_json::to_value(self.view_type).unwrap_or(Value::Null));
        out.insert(
            "view_id".into(),
            self.view_id.map_or(Value::Null, |id| json!(id.to_string())),
        );
        out.insert(
            "action_id".into(),
            self.action_id.map_or(Value::Null, |id| json!(id.to_string())),
        );
        out
    }
}
