//! Run context: the single source of randomness for a run.
//!
//! Replaces ambient global seed/device state with an explicit object
//! constructed once at startup and threaded through initialization, the
//! subject partition, and action sampling.

use rand::rngs::StdRng;
use rand::SeedableRng;

/// Explicit per-run state shared by everything that needs randomness.
pub struct RunContext {
    seed: Option<u64>,
    rng: StdRng,
}

impl RunContext {
    /// Builds the context; a fixed seed gives bit-reproducible runs.
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        Self { seed, rng }
    }

    /// The configured seed, if any (echoed into the params summary).
    pub fn seed(&self) -> Option<u64> {
        self.seed
    }

    pub fn rng_mut(&mut self) -> &mut StdRng {
        &mut self.rng
    }
}
