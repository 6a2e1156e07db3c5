//! Per-instance deterministic randomness.
//!
//! Every interpreter instance owns one `GuestRng`, seeded independently
//! at creation. The host process randomness is never read or written by
//! guest code; reseeding only affects the owning instance.
//!
//! Argument validation lives here so the native `math.random` wrapper and
//! any test double expose identical semantics.

use std::sync::{Arc, Mutex};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::EngineError;

/// A `GuestRng` shared between a `ScriptHandle` and the native wrapper
/// functions registered inside its interpreter state.
pub type SharedRng = Arc<Mutex<GuestRng>>;

/// Deterministic random generator private to one interpreter instance.
#[derive(Debug)]
pub struct GuestRng {
    rng: StdRng,
}

impl GuestRng {
    /// Create a generator from an explicit seed.
    ///
    /// The subsequent draw sequence is a deterministic function of the seed.
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Wrap in the shared handle used by instance registration.
    pub fn shared(self) -> SharedRng {
        Arc::new(Mutex::new(self))
    }

    /// Zero-argument draw: uniform real in `[0, 1)`.
    pub fn next_real(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }

    /// One-argument draw: uniform integer in `[1, n]`.
    ///
    /// Fails with a `BadArgument` error if `n < 1`.
    pub fn next_up_to(&mut self, n: i64) -> Result<i64, EngineError> {
        self.next_range(1, n)
    }

    /// Two-argument draw: uniform integer in `[lo, hi]`.
    ///
    /// Fails with a `BadArgument` error if `lo > hi`.
    pub fn next_range(&mut self, lo: i64, hi: i64) -> Result<i64, EngineError> {
        if lo > hi {
            return Err(EngineError::BadArgument(format!(
                "interval is empty ({}..{})",
                lo, hi
            )));
        }
        Ok(self.rng.gen_range(lo..=hi))
    }

    /// Reseed the generator. Subsequent output is a deterministic function
    /// of `seed`.
    pub fn reseed(&mut self, seed: i64) {
        self.rng = StdRng::seed_from_u64(seed as u64);
    }
}
