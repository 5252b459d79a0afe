//! Error types used by the rumscope runtime and its storage boundary.
//!
//! This module defines two main error enums:
//!
//! - [`RumError`]: errors raised by the monitor runtime itself (ingress, configuration).
//! - [`WriteError`]: errors raised by the storage collaborator when a record cannot be written.
//!
//! Neither type escapes steady-state event handling: a failed write becomes a
//! `*Dropped` confirmation event, and the scope tree keeps running.

use thiserror::Error;

/// # Errors produced by the rumscope runtime.
///
/// These represent failures at the edges of the core: pushing an event into a
/// closed or saturated queue, or building a monitor from an invalid configuration.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RumError {
    /// The worker has shut down; no more events are accepted.
    #[error("monitor worker is closed")]
    WorkerClosed,

    /// The ingress queue is full; the event was dropped.
    #[error("event queue full (capacity {capacity})")]
    QueueFull {
        /// Configured queue capacity.
        capacity: usize,
    },

    /// A configuration field holds a value the core cannot work with.
    #[error("invalid configuration for `{field}`: {reason}")]
    InvalidConfig {
        /// Name of the offending field.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
}

impl RumError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use rumscope::RumError;
    ///
    /// let err = RumError::QueueFull { capacity: 8 };
    /// assert_eq!(err.as_label(), "rum_queue_full");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RumError::WorkerClosed => "rum_worker_closed",
            RumError::QueueFull { .. } => "rum_queue_full",
            RumError::InvalidConfig { .. } => "rum_invalid_config",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            RumError::WorkerClosed => "worker closed".to_string(),
            RumError::QueueFull { capacity } => format!("queue full: capacity={capacity}"),
            RumError::InvalidConfig { field, reason } => format!("config {field}: {reason}"),
        }
    }
}

/// # Errors produced by the storage collaborator.
///
/// Returned by [`Storage::write`](crate::Storage::write). The core never
/// retries: the failure is reported back as a `*Dropped` confirmation.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum WriteError {
    /// Storage refused the record (batch full, disk quota, consent pending...).
    #[error("record rejected: {reason}")]
    Rejected {
        /// Reason given by the storage layer.
        reason: String,
    },

    /// The record could not be encoded.
    #[error("record serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Storage is not available (shut down or never initialized).
    #[error("storage unavailable")]
    Unavailable,
}

impl WriteError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            WriteError::Rejected { .. } => "write_rejected",
            WriteError::Serialization(_) => "write_serialization",
            WriteError::Unavailable => "write_unavailable",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_are_stable() {
        assert_eq!(RumError::WorkerClosed.as_label(), "rum_worker_closed");
        let invalid = RumError::InvalidConfig {
            field: "sample_rate",
            reason: "must be within 0..=100".into(),
        };
        assert_eq!(invalid.as_label(), "rum_invalid_config");
        assert_eq!(invalid.as_message(), "config sample_rate: must be within 0..=100");
        assert_eq!(WriteError::Unavailable.as_label(), "write_unavailable");
    }

    #[test]
    fn serialization_error_converts() {
        let raw = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: WriteError = raw.into();
        assert_eq!(err.as_label(), "write_serialization");
    }
}
