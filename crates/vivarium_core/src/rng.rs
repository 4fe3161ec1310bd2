//! Deterministic world-level random number generation.
//!
//! The world owns a single `WorldRng` stream, consumed in a fixed order per
//! tick step so that identical seeds produce byte-identical simulations.
//! Per-agent randomness uses the tribonacci state carried on the agent
//! record itself (`vivarium_data::agent`).

use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

#[derive(Clone, Serialize, Deserialize)]
pub struct WorldRng {
    #[serde(skip, default = "default_stream")]
    rng: ChaCha8Rng,
    seed: u64,
}

fn default_stream() -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(0)
}

impl WorldRng {
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self { rng: ChaCha8Rng::seed_from_u64(seed), seed }
    }

    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn next_u32(&mut self) -> u32 {
        self.rng.next_u32()
    }

    /// Uniform draw in `[0, max)`; returns 0 when `max == 0`.
    pub fn below(&mut self, max: u32) -> u32 {
        if max == 0 {
            return 0;
        }
        self.rng.gen_range(0..max)
    }

    pub fn below_usize(&mut self, max: usize) -> usize {
        if max == 0 {
            return 0;
        }
        self.rng.gen_range(0..max)
    }

    pub fn chance(&mut self, probability: f64) -> bool {
        if probability <= 0.0 {
            return false;
        }
        if probability >= 1.0 {
            return true;
        }
        self.rng.gen_bool(probability)
    }

    /// Borrow the underlying stream for APIs bounded on `rand::Rng`.
    pub fn stream(&mut self) -> &mut ChaCha8Rng {
        &mut self.rng
    }
}

impl std::fmt::Debug for WorldRng {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorldRng").field("seed", &self.seed).finish()
    }
}
