//! Sampling policy.
//!
//! This module groups the knobs that decide **whether** a session's records are
//! kept.
//!
//! ## Contents
//! - [`Sampler`] source of uniform draws in `[0, 100)`
//! - [`RandomSampler`] thread-rng backed default
//! - [`SeededSampler`] deterministic sampler for reproducible runs
//!
//! ## Quick wiring
//! ```text
//! RumConfig { sample_rate }
//!      └─► SessionScope::renew uses:
//!           - sampler.keep(sample_rate) to pick Tracked / NotTracked
//! ```

mod sampling;

pub use sampling::{RandomSampler, Sampler, SeededSampler};
