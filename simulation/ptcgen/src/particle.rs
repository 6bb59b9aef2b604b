//! Individual particle records and the fixed array that holds them

use glam::Vec3;

use crate::world::{LineId, MapGeometry, PlaneSurface, SectorId};

/// A single particle slot
///
/// Slots are never allocated or freed individually. A slot whose `stage` is
/// `None` is unused and gets overwritten by the next spawn that lands on it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Particle {
    /// Current stage index; `None` when the slot is unused
    pub stage: Option<usize>,
    /// Tics left in the current stage
    pub tics: i32,
    /// World position; Z is meaningless while attached to a plane
    pub position: Vec3,
    /// Velocity per tic
    pub momentum: Vec3,
    /// Sector the particle is in
    pub sector: Option<SectorId>,
    /// Line the particle last bounced off
    pub contact: Option<LineId>,
    /// Yaw in degrees
    pub yaw: f32,
    /// Pitch in degrees
    pub pitch: f32,
    /// Plane the particle is stuck to
    pub attached: Option<PlaneSurface>,
}

impl Particle {
    /// Whether the slot holds a live particle
    #[inline]
    pub fn is_alive(&self) -> bool {
        self.stage.is_some()
    }

    /// Retire the particle; the slot becomes reusable
    #[inline]
    pub fn kill(&mut self) {
        self.stage = None;
    }

    /// Actual height, resolving plane attachment through the map
    pub fn resolved_z(&self, map: &dyn MapGeometry) -> f32 {
        match (self.attached, self.sector.and_then(|s| map.sector(s))) {
            (Some(surface), Some(sector)) => sector.plane_height(surface),
            _ => self.position.z,
        }
    }
}

/// Fixed-capacity particle storage owned by one generator
#[derive(Debug, Clone)]
pub struct ParticleArray {
    slots: Box<[Particle]>,
}

impl ParticleArray {
    /// Array of `capacity` unused slots
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![Particle::default(); capacity].into_boxed_slice(),
        }
    }

    /// Number of slots
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Slot by index
    pub fn get(&self, index: usize) -> Option<&Particle> {
        self.slots.get(index)
    }

    /// Mutable slot by index
    pub fn get_mut(&mut self, index: usize) -> Option<&mut Particle> {
        self.slots.get_mut(index)
    }

    /// Whether slot `index` holds a live particle
    pub fn in_use(&self, index: usize) -> bool {
        self.slots.get(index).is_some_and(Particle::is_alive)
    }

    /// All slots, used or not
    pub fn slots(&self) -> &[Particle] {
        &self.slots
    }

    pub(crate) fn slots_mut(&mut self) -> &mut [Particle] {
        &mut self.slots
    }

    /// Live particles with their slot index
    pub fn live(&self) -> impl Iterator<Item = (usize, &Particle)> {
        self.slots.iter().enumerate().filter(|(_, p)| p.is_alive())
    }

    /// Number of live particles
    pub fn live_count(&self) -> usize {
        self.slots.iter().filter(|p| p.is_alive()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_array_is_empty() {
        let array = ParticleArray::new(8);
        assert_eq!(array.capacity(), 8);
        assert_eq!(array.live_count(), 0);
        assert!(!array.in_use(0));
        assert!(!array.in_use(100));
    }

    #[test]
    fn test_kill_frees_slot() {
        let mut array = ParticleArray::new(4);
        if let Some(p) = array.get_mut(2) {
            p.stage = Some(0);
        }
        assert!(array.in_use(2));
        assert_eq!(array.live().map(|(i, _)| i).collect::<Vec<_>>(), vec![2]);

        if let Some(p) = array.get_mut(2) {
            p.kill();
        }
        assert!(!array.in_use(2));
        assert_eq!(array.live_count(), 0);
    }
}
