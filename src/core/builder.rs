use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::{RumConfig, monitor::RumMonitor, worker::Worker};
use crate::{
    collaborators::{
        FeatureContext, FirstPartyHosts, GlobalAttributes, NetworkSettledListener, ProcessInfo,
        Services, SessionListener, ViewChangedListener, Vitals,
    },
    error::RumError,
    policies::Sampler,
    storage::Storage,
    subscribers::{Subscribe, SubscriberSet},
};

/// Builder for a [`RumMonitor`] with optional collaborators.
///
/// Every collaborator defaults to a no-op (or, for the sampler, to the thread rng).
pub struct RumMonitorBuilder {
    config: RumConfig,
    storage: Arc<dyn Storage>,
    sampler: Option<Arc<dyn Sampler>>,
    vitals: Vitals,
    attributes: Option<GlobalAttributes>,
    feature_context: Option<FeatureContext>,
    session_listener: Option<Arc<dyn SessionListener>>,
    view_changed: Option<Arc<dyn ViewChangedListener>>,
    network_settled: Option<Arc<dyn NetworkSettledListener>>,
    first_party_hosts: Option<Arc<dyn FirstPartyHosts>>,
    process: Option<Arc<dyn ProcessInfo>>,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl RumMonitorBuilder {
    /// Creates a builder writing records to `storage`.
    pub fn new(config: RumConfig, storage: Arc<dyn Storage>) -> Self {
        Self {
            config,
            storage,
            sampler: None,
            vitals: Vitals::none(),
            attributes: None,
            feature_context: None,
            session_listener: None,
            view_changed: None,
            network_settled: None,
            first_party_hosts: None,
            process: None,
            subscribers: Vec::new(),
        }
    }

    /// Replaces the session sampler.
    pub fn with_sampler(mut self, sampler: Arc<dyn Sampler>) -> Self {
        self.sampler = Some(sampler);
        self
    }

    /// Sets the vital monitors read by foreground views.
    pub fn with_vitals(mut self, vitals: Vitals) -> Self {
        self.vitals = vitals;
        self
    }

    /// Shares an existing global attribute store.
    pub fn with_global_attributes(mut self, attributes: GlobalAttributes) -> Self {
        self.attributes = Some(attributes);
        self
    }

    /// Shares an existing feature context.
    pub fn with_feature_context(mut self, context: FeatureContext) -> Self {
        self.feature_context = Some(context);
        self
    }

    pub fn with_session_listener(mut self, listener: Arc<dyn SessionListener>) -> Self {
        self.session_listener = Some(listener);
        self
    }

    pub fn with_view_changed_listener(mut self, listener: Arc<dyn ViewChangedListener>) -> Self {
        self.view_changed = Some(listener);
        self
    }

    pub fn with_network_settled_listener(
        mut self,
        listener: Arc<dyn NetworkSettledListener>,
    ) -> Self {
        self.network_settled = Some(listener);
        self
    }

    /// Sets the resolver deciding which resource hosts are first party.
    pub fn with_first_party_hosts(mut self, hosts: Arc<dyn FirstPartyHosts>) -> Self {
        self.first_party_hosts = Some(hosts);
        self
    }

    /// Sets the host process information (foreground flag, start tick).
    pub fn with_process_info(mut self, process: Arc<dyn ProcessInfo>) -> Self {
        self.process = Some(process);
        self
    }

    /// Sets feature subscribers.
    ///
    /// Subscribers receive cross-feature messages (session renewals) through
    /// dedicated workers with bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Validates the configuration and spawns the worker.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    /// [`RumError::InvalidConfig`] when [`RumConfig::validate`] rejects the config.
    pub fn build(self) -> Result<RumMonitor, RumError> {
        self.config.validate()?;

        let mut services = Services::new(self.config);
        services.vitals = self.vitals;
        if let Some(sampler) = self.sampler {
            services.sampler = sampler;
        }
        if let Some(attributes) = self.attributes {
            services.attributes = attributes;
        }
        if let Some(context) = self.feature_context {
            services.feature_context = context;
        }
        if let Some(listener) = self.session_listener {
            services.session_listener = listener;
        }
        if let Some(listener) = self.view_changed {
            services.view_changed = listener;
        }
        if let Some(listener) = self.network_settled {
            services.network_settled = listener;
        }
        if let Some(hosts) = self.first_party_hosts {
            services.first_party_hosts = hosts;
        }
        if let Some(process) = self.process {
            services.process = process;
        }
        let services = Arc::new(services);

        let token = CancellationToken::new();
        let listener = if self.subscribers.is_empty() {
            None
        } else {
            let listener_token = CancellationToken::new();
            let set = SubscriberSet::new(self.subscribers);
            let handle = set.listen(&services.bus, listener_token.clone());
            Some((listener_token, handle))
        };

        let (tx, rx) = mpsc::channel(services.config.queue_capacity_clamped());
        let worker = Worker::new(Arc::clone(&services), self.storage);
        let handle = tokio::spawn(worker.run(rx, token.clone()));

        Ok(RumMonitor::new(tx, services, token, handle, listener))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::collaborators::{RUM_FEATURE, StaticProcessInfo};
    use crate::events::{ActionType, FeatureMessage, RawEvent, ViewKey};
    use crate::policies::SeededSampler;
    use crate::testing::{RecordingStorage, at};

    struct Collect(Arc<Mutex<Vec<FeatureMessage>>>);

    #[async_trait]
    impl Subscribe for Collect {
        async fn on_message(&self, msg: &FeatureMessage) {
            self.0.lock().unwrap().push(msg.clone());
        }
    }

    fn config() -> RumConfig {
        RumConfig::default().with_application_id("app-b")
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let storage = Arc::new(RecordingStorage::default());
        let err = RumMonitorBuilder::new(config().with_sample_rate(101.0), storage)
            .build()
            .err()
            .unwrap();
        assert_eq!(err.as_label(), "rum_invalid_config");
    }

    #[tokio::test]
    async fn test_events_flow_to_storage_and_subscribers() {
        let storage = Arc::new(RecordingStorage::default());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let monitor = RumMonitorBuilder::new(config(), storage.clone())
            .with_sampler(Arc::new(SeededSampler::new(3)))
            .with_process_info(Arc::new(StaticProcessInfo::new(false, 0)))
            .with_subscribers(vec![Arc::new(Collect(seen.clone()))])
            .build()
            .unwrap();

        monitor.attributes().set("tier", serde_json::json!("gold"));
        monitor
            .send(RawEvent::start_view(ViewKey::new("home", "home", "Home"), at(0)))
            .unwrap();
        monitor
            .send(RawEvent::start_action(ActionType::Custom, "ping", false, at(10)))
            .unwrap();
        monitor.shutdown().await;

        assert_eq!(storage.actions().len(), 1);
        let views = storage.views();
        assert_eq!(views.last().unwrap().action_count, 1);
        assert_eq!(views[0].header.context["tier"], serde_json::json!("gold"));
        assert!(!monitor.feature_context().get(RUM_FEATURE).is_empty());

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(matches!(
            seen[0],
            FeatureMessage::SessionRenewed {
                keep_session: true,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_queue_full_and_closed() {
        let storage = Arc::new(RecordingStorage::default());
        let cfg = RumConfig {
            queue_capacity: 1,
            ..config()
        };
        let monitor = RumMonitorBuilder::new(cfg, storage).build().unwrap();

        // The current-thread runtime has not polled the worker yet.
        monitor.send(RawEvent::KeepAlive { time: at(0) }).unwrap();
        let err = monitor.send(RawEvent::KeepAlive { time: at(1) }).unwrap_err();
        assert_eq!(err, RumError::QueueFull { capacity: 1 });

        monitor.shutdown().await;
        monitor.shutdown().await;
        assert!(monitor.is_closed());
        assert_eq!(
            monitor.send(RawEvent::KeepAlive { time: at(2) }),
            Err(RumError::WorkerClosed)
        );
    }
}
