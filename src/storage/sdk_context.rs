//! Global SDK context supplied by the storage collaborator at emission time.

use serde::Serialize;

use crate::events::Attributes;

/// Immutable snapshot of device, user and SDK information.
///
/// Captured once per emitted record, so every record reflects the state at the
/// moment it is written rather than when its event was enqueued.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SdkContext {
    pub service: String,
    pub env: String,
    pub version: String,
    pub sdk_version: String,
    /// Platform the records come from (`"android"`, `"ios"`, ...).
    pub source: String,
    /// Offset to add to device wall-clock times to get server time.
    pub server_time_offset_ms: i64,
    pub device: DeviceInfo,
    pub os: OsInfo,
    pub user: Option<UserInfo>,
    /// Connectivity label (`"wifi"`, `"cellular"`, ...), when known.
    pub connectivity: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DeviceInfo {
    pub name: String,
    pub model: String,
    pub brand: String,
    pub architecture: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OsInfo {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UserInfo {
    pub id: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
    #[serde(flatten)]
    pub extra: Attributes,
}
