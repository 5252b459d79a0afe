//! Storage boundary: records, SDK context and the writer.
//!
//! ## Contents
//! - [`RumRecord`] and its per-entity payloads
//! - [`SdkContext`] global context supplied at emission time
//! - [`Storage`] / [`Feedback`] collaborator traits
//! - [`Writer`] the handle scopes emit through

mod records;
mod sdk_context;
mod writer;

pub use records::{
    ActionRecord, ErrorCategory, ErrorRecord, ErrorResource, Frustration, LongTaskRecord,
    Provider, ProviderType, RecordHeader, ResourceRecord, RumRecord, SessionRef, SessionType,
    Synthetics, ViewRecord, ViewRef, ViewVitals,
};
pub use sdk_context::{DeviceInfo, OsInfo, SdkContext, UserInfo};
pub use writer::{Feedback, Storage, Writer};
