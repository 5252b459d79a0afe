//! # Session sampling.
//!
//! A session is kept (its records reach storage) when a uniform draw in `[0, 100)`
//! falls below the configured sample rate. The draw comes from a [`Sampler`]:
//!
//! - [`RandomSampler`]: thread-local rng, the production default
//! - [`SeededSampler`]: deterministic `StdRng`, for reproducible runs and tests
//!
//! ## Rules
//! - `rate <= 0` never keeps a session, `rate >= 100` always keeps it.
//! - One draw per renewal; the decision is bound to the session id it was drawn for.

use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Source of uniform draws in `[0, 100)`.
pub trait Sampler: Send + Sync {
    /// Returns a uniform value in `[0, 100)`.
    fn sample(&self) -> f32;

    /// Draws once and returns `true` when the draw falls below `rate`.
    fn keep(&self, rate: f32) -> bool {
        self.sample() < rate
    }
}

/// Production sampler backed by the thread rng.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomSampler;

impl Sampler for RandomSampler {
    fn sample(&self) -> f32 {
        rand::rng().random_range(0.0..100.0)
    }
}

/// Deterministic sampler seeded once at construction.
#[derive(Debug)]
pub struct SeededSampler {
    rng: Mutex<StdRng>,
}

impl SeededSampler {
    /// Creates a sampler whose sequence of draws depends only on `seed`.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl Sampler for SeededSampler {
    fn sample(&self) -> f32 {
        self.rng
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .random_range(0.0..100.0)
    }
}
