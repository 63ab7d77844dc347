//! Process-wide seeding.
//!
//! candle's CPU backend draws from a thread-local generator that cannot be
//! seeded, and accelerator kernels may reduce in a non-deterministic order, so
//! a fixed seed makes runs repeatable only for the generators owned here and on
//! devices that accept `set_seed`.

use candle_core::Device;
use rand::{rngs::StdRng, SeedableRng};

use crate::Result;

const DATA_STREAM: u64 = 0x5eed_da7a;
const AUGMENT_STREAM: u64 = 0x5eed_a06e;

/// Independent generators derived from a single seed.
#[derive(Debug, Clone)]
pub struct SeededRngs {
    pub seed: u64,
    /// Epoch orders and splits, see [`crate::data::Subset::shuffled`] and
    /// [`crate::data::random_split`].
    pub data: StdRng,
    /// Random augmentation draws.
    pub augment: StdRng,
}

impl SeededRngs {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            data: StdRng::seed_from_u64(seed ^ DATA_STREAM),
            augment: StdRng::seed_from_u64(seed ^ AUGMENT_STREAM),
        }
    }

    /// Seed for the augmentation stream, for components that own their generator.
    pub fn augment_seed(&self) -> u64 {
        self.seed ^ AUGMENT_STREAM
    }
}

/// Seeds `device` (when its backend supports it) and returns the crate's
/// generators for `seed`.
pub fn seed_all(seed: u64, device: &Device) -> Result<SeededRngs> {
    if device.is_cpu() {
        log::debug!("candle cpu backend rng cannot be seeded; seeding crate generators only");
    } else {
        device.set_seed(seed)?;
        log::debug!("seeded {:?} with {}", device, seed);
    }
    Ok(SeededRngs::new(seed))
}
