//! Deterministic simulation RNG resource.
//!
//! Wraps `ChaCha8Rng` so that equal seeds produce equal worlds. World
//! generation draws its noise seeds from here.

use bevy::prelude::*;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Default seed used when no explicit seed is provided.
const DEFAULT_SEED: u64 = 42;

#[derive(Resource, Debug, Clone)]
pub struct SimRng(pub ChaCha8Rng);

impl Default for SimRng {
    fn default() -> Self {
        Self(ChaCha8Rng::seed_from_u64(DEFAULT_SEED))
    }
}

impl SimRng {
    pub fn from_seed_u64(seed: u64) -> Self {
        Self(ChaCha8Rng::seed_from_u64(seed))
    }

    /// Seed for one fastnoise layer.
    pub fn noise_seed(&mut self) -> i32 {
        self.0.gen()
    }
}
