//! # Example: Session Flow
//!
//! Drives one short session through the monitor and prints every record the
//! scope tree emits as a JSON line.
//!
//! Flow:
//! 1) `home` view starts, a tap opens an action
//! 2) a network call runs during the action and completes
//! 3) an error is reported, then the view stops
//! 4) `shutdown()` drains the queue and the pending confirmations
//!
//! Run with:
//! ```bash
//! RUST_LOG=rumscope=debug cargo run --example session_flow --features logging
//! ```

use std::sync::Arc;

use rumscope::{
    ActionType, ErrorSource, EventTime, RawEvent, ResourceKind, RumConfig, RumError,
    RumMonitorBuilder, RumRecord, SdkContext, StaticProcessInfo, Storage, Subscribe, ViewKey,
    WriteError,
};
use tracing_subscriber::EnvFilter;

/// Prints records instead of batching them to disk.
struct StdoutStorage;

impl Storage for StdoutStorage {
    fn sdk_context(&self) -> SdkContext {
        SdkContext {
            service: "demo-shop".into(),
            env: "dev".into(),
            version: "1.0.0".into(),
            source: "android".into(),
            ..SdkContext::default()
        }
    }

    fn write(&self, record: &RumRecord) -> Result<(), WriteError> {
        let line = serde_json::to_string(record)?;
        println!("[{}] {line}", record.as_label());
        Ok(())
    }
}

/// Wall clock advanced by hand so the output stays readable.
fn at(ms: i64) -> EventTime {
    EventTime::new(1_700_000_000_000 + ms, ms * 1_000_000)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), RumError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    #[cfg(feature = "logging")]
    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(rumscope::LogWriter::new())];
    #[cfg(not(feature = "logging"))]
    let subs: Vec<Arc<dyn Subscribe>> = Vec::new();

    let config = RumConfig::default().with_application_id("demo-app");
    let monitor = RumMonitorBuilder::new(config, Arc::new(StdoutStorage))
        .with_process_info(Arc::new(StaticProcessInfo::new(true, 0)))
        .with_subscribers(subs)
        .build()?;

    monitor.attributes().set("build", serde_json::json!("debug"));

    let home = ViewKey::new("home", "com.demo.HomeActivity", "Home");
    monitor.send(RawEvent::start_view(home.clone(), at(0)))?;
    monitor.send(RawEvent::start_action(ActionType::Tap, "checkout", false, at(100)))?;
    monitor.send(RawEvent::start_resource("req-1", "https://api.demo.com/cart", "GET", at(120)))?;
    monitor.send(RawEvent::stop_resource(
        "req-1",
        Some(200),
        Some(512),
        ResourceKind::Fetch,
        at(340),
    ))?;
    monitor.send(RawEvent::KeepAlive { time: at(600) })?;
    monitor.send(RawEvent::add_error(
        "cart is empty",
        ErrorSource::Source,
        false,
        at(900),
    ))?;
    monitor.send(RawEvent::stop_view(home, at(1_500)))?;

    monitor.shutdown().await;
    println!("rum context: {:?}", monitor.feature_context().get(rumscope::RUM_FEATURE));
    Ok(())
}
