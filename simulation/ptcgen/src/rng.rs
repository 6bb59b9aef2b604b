//! Shared pseudo-random source for the simulation

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// The single random source every generator draws from
///
/// Replays are reproducible as long as the seed and the order of calls are
/// the same; nothing here reads the clock. The generator is pinned to
/// ChaCha8 so recorded seeds survive `rand` upgrades.
#[derive(Debug, Clone)]
pub struct SimRng {
    inner: ChaCha8Rng,
}

impl SimRng {
    /// Create a new random source with the given seed
    pub fn new(seed: u64) -> Self {
        Self {
            inner: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Random float in `[0, 1)`
    #[inline]
    pub fn rand_float(&mut self) -> f32 {
        self.inner.random::<f32>()
    }

    /// Random byte in `[0, 255]`
    #[inline]
    pub fn rand_byte(&mut self) -> u8 {
        self.inner.random::<u8>()
    }

    /// Difference of two random bytes scaled to `[-1, 1]`
    ///
    /// This is the triangular distribution used for vector variance and the
    /// cubic uncertainty offset.
    #[inline]
    pub fn byte_delta(&mut self) -> f32 {
        let a = f32::from(self.rand_byte());
        let b = f32::from(self.rand_byte());
        (a - b) / 255.0
    }

    /// Difference of two random floats, in `(-1, 1)`
    #[inline]
    pub fn float_delta(&mut self) -> f32 {
        self.rand_float() - self.rand_float()
    }
}

impl Default for SimRng {
    fn default() -> Self {
        Self::new(0)
    }
}
