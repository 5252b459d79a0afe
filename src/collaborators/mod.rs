//! Injected services the scope tree consults.
//!
//! Every collaborator is an externally synchronized, shared service: the core
//! holds it behind an `Arc` and never assumes exclusive ownership.
//!
//! ## Contents
//! - [`GlobalAttributes`] attribute store snapshotted at emission
//! - [`FeatureContext`] shared `feature -> entries` map
//! - [`VitalMonitor`] / [`Vitals`] pull interface to vital samplers
//! - [`SessionListener`], [`ViewChangedListener`], [`NetworkSettledListener`] callbacks
//! - [`FirstPartyHosts`] / [`HostList`] provider resolution for resources
//! - [`ProcessInfo`] / [`StaticProcessInfo`] foreground flag and process start tick
//! - [`Services`] the bundle handed to every scope

mod attributes;
mod feature_context;
mod hosts;
mod listeners;
mod process;
mod vitals;

use std::sync::Arc;

pub use attributes::GlobalAttributes;
pub use feature_context::{
    FeatureContext, HAS_REPLAY_KEY, RUM_FEATURE, SESSION_REPLAY_FEATURE,
};
pub use hosts::{FirstPartyHosts, HostList};
pub use listeners::{
    NetworkSettledListener, NoopListener, SessionListener, ViewChangedListener, ViewInfo,
};
pub use process::{ProcessInfo, StaticProcessInfo};
pub use vitals::{VitalInfo, VitalMonitor, Vitals};

use crate::core::RumConfig;
use crate::events::Bus;
use crate::policies::{RandomSampler, Sampler};

/// Everything a scope may consult besides its own state.
pub struct Services {
    pub config: RumConfig,
    pub sampler: Arc<dyn Sampler>,
    pub attributes: GlobalAttributes,
    pub feature_context: FeatureContext,
    pub bus: Bus,
    pub vitals: Vitals,
    pub session_listener: Arc<dyn SessionListener>,
    pub view_changed: Arc<dyn ViewChangedListener>,
    pub network_settled: Arc<dyn NetworkSettledListener>,
    pub first_party_hosts: Arc<dyn FirstPartyHosts>,
    pub process: Arc<dyn ProcessInfo>,
}

impl Services {
    /// Services with no-op collaborators, a background process started at tick 0,
    /// and a random sampler.
    pub fn new(config: RumConfig) -> Self {
        let bus = Bus::new(config.bus_capacity_clamped());
        Self {
            config,
            sampler: Arc::new(RandomSampler),
            attributes: GlobalAttributes::new(),
            feature_context: FeatureContext::new(),
            bus,
            vitals: Vitals::none(),
            session_listener: Arc::new(NoopListener),
            view_changed: Arc::new(NoopListener),
            network_settled: Arc::new(NoopListener),
            first_party_hosts: Arc::new(HostList::default()),
            process: Arc::new(StaticProcessInfo::new(false, 0)),
        }
    }

    /// Resolved first-party domain of `url`.
    pub(crate) fn first_party_domain(&self, url: &str) -> Option<String> {
        self.first_party_hosts.first_party_domain(url)
    }
}
