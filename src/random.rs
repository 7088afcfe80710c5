//! Randomness seam : everything in the core that rolls dice goes through
//! [`RandomSource`] so tests can script the outcome.
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub trait RandomSource {
    /// Uniform integer in `[low, high]` (both inclusive).
    fn range(&mut self, low: i64, high: i64) -> i64;

    /// Uniform integer in `[0, 99]`.
    fn percent(&mut self) -> i64 {
        self.range(0, 99)
    }

    /// Independent percentage roll : true with `chance` percent probability.
    fn chance(&mut self, chance: u32) -> bool {
        self.percent() < i64::from(chance)
    }
}

/// Default source backed by `rand`'s standard generator.
/// - in the browser, entropy comes from `getrandom` (js feature)
pub struct SeededRandom {
    rng: StdRng,
}

impl SeededRandom {
    pub fn from_entropy() -> Self {
        SeededRandom {
            rng: StdRng::from_entropy(),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        SeededRandom {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl RandomSource for SeededRandom {
    fn range(&mut self, low: i64, high: i64) -> i64 {
        if high <= low {
            return low;
        }
        self.rng.gen_range(low..=high)
    }
}
