//! Randomness used by the simulated providers for failure injection.
//!
//! Every roll is a percentile in `1..=100`; a gateway fails when the roll falls
//! at or below its failure threshold.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Mutex;

pub trait RandomSource: Send + Sync {
    /// A uniformly distributed value in `1..=100`.
    fn percentile(&self) -> u32;
}

/// Draws from the thread-local generator.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn percentile(&self) -> u32 {
        rand::thread_rng().gen_range(1..=100)
    }
}

/// A reproducible sequence of rolls.
#[derive(Debug)]
pub struct SeededRandom {
    rng: Mutex<StdRng>,
}

impl SeededRandom {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl RandomSource for SeededRandom {
    fn percentile(&self) -> u32 {
        match self.rng.lock() {
            Ok(mut rng) => rng.gen_range(1..=100),
            Err(poisoned) => poisoned.into_inner().gen_range(1..=100),
        }
    }
}

/// Always returns the same roll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedRandom(pub u32);

impl FixedRandom {
    /// Never triggers an injected failure.
    pub const ALWAYS_SUCCEED: FixedRandom = FixedRandom(100);
    /// Triggers the first failure branch of every probabilistic operation.
    pub const ALWAYS_FAIL: FixedRandom = FixedRandom(1);
}

impl RandomSource for FixedRandom {
    fn percentile(&self) -> u32 {
        self.0.clamp(1, 100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thread_random_stays_in_range() {
        let source = ThreadRandom;
        for _ in 0..1000 {
            let roll = source.percentile();
            assert!((1..=100).contains(&roll));
        }
    }

    #[test]
    fn test_seeded_random_is_reproducible() {
        let first = SeededRandom::new(42);
        let second = SeededRandom::new(42);
        let a: Vec<u32> = (0..20).map(|_| first.percentile()).collect();
        let b: Vec<u32> = (0..20).map(|_| second.percentile()).collect();
        assert_eq!(a, b);
    }

    #[test]
    fn test_fixed_random_is_clamped() {
        assert_eq!(FixedRandom(0).percentile(), 1);
        assert_eq!(FixedRandom(250).percentile(), 100);
        assert_eq!(FixedRandom::ALWAYS_SUCCEED.percentile(), 100);
    }
}
