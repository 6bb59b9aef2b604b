//! Engine-wide tunables

use crate::error::{PtcError, Result};

/// Simulation tics per second
pub const TICS_PER_SECOND: u32 = 35;

/// Default capacity of the generator pool
pub const DEFAULT_MAX_GENERATORS: usize = 96;

/// Sector area at which scaled-rate plane generators run at their base rate
pub const SCALED_RATE_AREA: f32 = 128.0 * 128.0;

/// Settings shared by every generator of a [`crate::ParticleSystem`]
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ParticleConfig {
    /// Master switch; a disabled system spawns nothing
    pub enabled: bool,
    /// Pool capacity
    pub max_generators: usize,
    /// Clamp on each generator's particle capacity; zero means no clamp
    pub max_particles_per_generator: usize,
    /// Global multiplier on every generator's spawn rate
    pub spawn_rate_scale: f32,
    /// Emit stage and collision sounds
    pub play_sounds: bool,
    /// Type generators also emit from client-predicted proxies
    pub include_client_proxies: bool,
    /// Seed of the shared random source
    pub seed: u64,
    /// Rounds of point sampling when placing a plane particle
    pub plane_spawn_attempts: u32,
    /// Point-in-cell draws per round
    pub cell_spawn_attempts: u32,
}

impl Default for ParticleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_generators: DEFAULT_MAX_GENERATORS,
            max_particles_per_generator: 0,
            spawn_rate_scale: 1.0,
            play_sounds: true,
            include_client_proxies: false,
            seed: 0,
            plane_spawn_attempts: 5,
            cell_spawn_attempts: 10,
        }
    }
}

impl ParticleConfig {
    /// Reject values the pool cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.max_generators == 0 || self.max_generators > usize::from(u16::MAX) {
            return Err(PtcError::InvalidConfig(format!(
                "max_generators must be in 1..={}, got {}",
                u16::MAX,
                self.max_generators
            )));
        }
        if self.spawn_rate_scale < 0.0 || !self.spawn_rate_scale.is_finite() {
            return Err(PtcError::InvalidConfig(format!(
                "spawn_rate_scale must be non-negative, got {}",
                self.spawn_rate_scale
            )));
        }
        Ok(())
    }

    /// Particle capacity for a definition after applying the clamp
    pub fn particle_capacity(&self, requested: usize) -> usize {
        if self.max_particles_per_generator > 0 {
            requested.min(self.max_particles_per_generator)
        } else {
            requested
        }
    }
}
