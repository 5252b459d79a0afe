//! Runtime core: configuration, ingress and the worker owning the scope tree.
//!
//! The public API of this module is [`RumMonitorBuilder`], which validates a
//! [`RumConfig`] and spawns the worker, and the [`RumMonitor`] handle producers
//! push events through.
//!
//! Internal modules:
//! - [`config`]: thresholds and capacities consumed by scopes and the worker;
//! - [`builder`]: wires collaborators into `Services` and spawns the tasks;
//! - [`monitor`]: thread-safe ingress and graceful shutdown;
//! - [`worker`]: drains the queue one event at a time, with panic isolation.

mod builder;
mod config;
mod monitor;
mod worker;

pub use builder::RumMonitorBuilder;
pub use config::RumConfig;
pub use monitor::RumMonitor;
