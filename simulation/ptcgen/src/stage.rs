//! Physics constants derived once per stage

use crate::definition::{ParticleKind, StageDef, StageFlags};

/// Runtime view of a [`StageDef`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StageRuntime {
    /// How the stage is drawn
    pub kind: ParticleKind,
    /// Stage flags
    pub flags: StageFlags,
    /// Momentum multiplier per tic, `1 - authored resistance`
    pub resistance: f32,
    /// Momentum kept after a collision
    pub bounce: f32,
    /// Collision radius
    pub radius: f32,
    /// Multiplier of world gravity
    pub gravity: f32,
}

impl StageRuntime {
    /// Derive the runtime constants of one stage
    pub fn from_def(def: &StageDef) -> Self {
        Self {
            kind: def.kind,
            flags: def.flags,
            resistance: 1.0 - def.resistance,
            bounce: def.bounce,
            radius: def.radius,
            gravity: def.gravity,
        }
    }

    /// Drawn flat against planes and thus almost entirely "hard"
    pub fn is_plane_flat(&self) -> bool {
        self.kind.is_flat_capable() && self.flags.contains(StageFlags::PLANE_FLAT)
    }

    /// Drawn flat against the wall it hits; stops there instead of bouncing
    pub fn is_wall_flat(&self) -> bool {
        self.kind.is_flat_capable() && self.flags.contains(StageFlags::WALL_FLAT)
    }
}

/// Runtime constants for every stage of a definition
pub fn derive_stages(stages: &[StageDef]) -> Box<[StageRuntime]> {
    stages.iter().map(StageRuntime::from_def).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resistance_is_inverted() {
        let def = StageDef {
            resistance: 0.25,
            ..Default::default()
        };
        assert_eq!(StageRuntime::from_def(&def).resistance, 0.75);
    }

    #[test]
    fn test_plane_flat_requires_texture() {
        let mut def = StageDef {
            kind: ParticleKind::Point,
            flags: StageFlags::PLANE_FLAT,
            ..Default::default()
        };
        assert!(!StageRuntime::from_def(&def).is_plane_flat());
        def.kind = ParticleKind::Texture(2);
        assert!(StageRuntime::from_def(&def).is_plane_flat());
    }

    #[test]
    fn test_wall_flat_requires_texture() {
        let mut def = StageDef {
            kind: ParticleKind::Line,
            flags: StageFlags::WALL_FLAT,
            ..Default::default()
        };
        assert!(!StageRuntime::from_def(&def).is_wall_flat());
        def.kind = ParticleKind::Texture(0);
        let runtime = StageRuntime::from_def(&def);
        assert!(runtime.is_wall_flat());
        assert!(!runtime.is_plane_flat());
    }

    #[test]
    fn test_one_runtime_per_stage() {
        let stages = vec![StageDef::default(); 3];
        assert_eq!(derive_stages(&stages).len(), 3);
    }
}
