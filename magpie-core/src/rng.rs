//! # Rng - Entropy for Evolution
//!
//! Every graph and every population owns its own generator; nothing is
//! shared across worker threads. A generator can be reseeded on demand,
//! which workers do after installing foreign DNA so that two workers
//! converging on the same master genome do not draw identical mutation
//! streams.

use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng as _, SeedableRng};
use rand_distr::Normal;

/// Seeded random number generator wrapping the primitives the engine needs.
pub struct Rng {
    gen: StdRng,
}

impl Rng {
    /// Create a generator seeded from OS entropy
    pub fn new() -> Self {
        Self {
            gen: StdRng::from_entropy(),
        }
    }

    /// Re-seed from OS entropy, discarding the current stream
    pub fn reseed(&mut self) {
        self.gen = StdRng::from_entropy();
    }

    /// Uniform integer in `[0, top]`
    pub fn uniform_int(&mut self, top: u32) -> u32 {
        self.gen.gen_range(0..=top)
    }

    /// Uniform integer in `[min, max]`
    pub fn uniform_int_range(&mut self, min: u32, max: u32) -> u32 {
        self.gen.gen_range(min..=max)
    }

    /// Uniform real in `[0, top)`
    pub fn uniform_dec(&mut self, top: f32) -> f32 {
        if top <= 0.0 {
            return 0.0;
        }
        self.gen.gen_range(0.0..top)
    }

    /// Uniform real in `[min, max)`
    pub fn uniform_dec_range(&mut self, min: f32, max: f32) -> f32 {
        if max <= min {
            return min;
        }
        self.gen.gen_range(min..max)
    }

    /// Normal sample with the given mean and standard deviation
    pub fn normal(&mut self, mean: f32, stddev: f32) -> f32 {
        match Normal::new(mean, stddev) {
            Ok(d) => d.sample(&mut self.gen),
            Err(_) => mean,
        }
    }

    /// Sample an index with probability proportional to its weight.
    ///
    /// A degenerate weight vector (all zero) falls back to a uniform
    /// draw; output ports routinely all sample 0.
    pub fn discrete_choice(&mut self, weights: &[f32]) -> usize {
        if weights.is_empty() {
            return 0;
        }
        match WeightedIndex::new(weights) {
            Ok(d) => d.sample(&mut self.gen),
            Err(_) => self.gen.gen_range(0..weights.len()),
        }
    }

    /// Fisher-Yates shuffle of a mutable slice
    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        items.shuffle(&mut self.gen);
    }
}

impl Default for Rng {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_int_bounds() {
        let mut rng = Rng::new();
        for _ in 0..1000 {
            let v = rng.uniform_int(5);
            assert!(v <= 5);
        }
        assert_eq!(rng.uniform_int(0), 0);
        assert_eq!(rng.uniform_int_range(7, 7), 7);
    }

    #[test]
    fn test_uniform_dec_bounds() {
        let mut rng = Rng::new();
        for _ in 0..1000 {
            let v = rng.uniform_dec(1.0);
            assert!((0.0..1.0).contains(&v));
        }
        assert_eq!(rng.uniform_dec(0.0), 0.0);
    }

    #[test]
    fn test_discrete_choice_proportional() {
        let mut rng = Rng::new();
        // index 1 carries all the mass
        for _ in 0..100 {
            assert_eq!(rng.discrete_choice(&[0.0, 1.0, 0.0]), 1);
        }
    }

    #[test]
    fn test_discrete_choice_degenerate() {
        let mut rng = Rng::new();
        // all-zero weights fall back to a uniform draw
        for _ in 0..100 {
            let v = rng.discrete_choice(&[0.0, 0.0, 0.0]);
            assert!(v < 3);
        }
        assert_eq!(rng.discrete_choice(&[]), 0);
    }

    #[test]
    fn test_shuffle_preserves_elements() {
        let mut rng = Rng::new();
        let mut items = vec![1, 2, 3, 4, 5];
        rng.shuffle(&mut items);
        items.sort_unstable();
        assert_eq!(items, vec![1, 2, 3, 4, 5]);
    }
}
