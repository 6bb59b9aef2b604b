//! Generational entity table

use glam::Vec3;

use crate::world::{EntityHandle, EntityState, EntityWorld, ProxyFlags};

/// Authoring form of an entity
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct EntitySpec {
    /// Entity type number
    pub type_id: u32,
    /// Position of the entity's feet
    pub origin: Vec3,
    /// Facing in degrees
    pub angle: f32,
    /// Velocity per tic
    pub momentum: Vec3,
    /// Height
    pub height: f32,
}

impl Default for EntitySpec {
    fn default() -> Self {
        Self {
            type_id: 0,
            origin: Vec3::ZERO,
            angle: 0.0,
            momentum: Vec3::ZERO,
            height: 56.0,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct EntitySlot {
    generation: u32,
    state: Option<EntityState>,
}

/// [`EntityWorld`] backed by a slot table
///
/// Removing an entity bumps its slot's generation, so old handles stop
/// resolving even after the slot is reused. Proxies carry handles that never
/// resolve.
#[derive(Debug, Clone, Default)]
pub struct EntityTable {
    slots: Vec<EntitySlot>,
    proxies: Vec<EntityState>,
}

impl EntityTable {
    /// Empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entity, reusing the first free slot
    pub fn spawn(&mut self, spec: &EntitySpec) -> EntityHandle {
        let index = match self.slots.iter().position(|s| s.state.is_none()) {
            Some(index) => index,
            None => {
                self.slots.push(EntitySlot::default());
                self.slots.len() - 1
            }
        };
        let slot = &mut self.slots[index];
        let handle = EntityHandle {
            index: index as u32,
            generation: slot.generation,
        };
        slot.state = Some(state_from(spec, handle, ProxyFlags::empty()));
        handle
    }

    /// Remove an entity; stale handles are ignored
    pub fn remove(&mut self, handle: EntityHandle) -> bool {
        let Some(slot) = self.slots.get_mut(handle.index as usize) else {
            return false;
        };
        if slot.generation != handle.generation || slot.state.is_none() {
            return false;
        }
        slot.state = None;
        slot.generation = slot.generation.wrapping_add(1);
        true
    }

    /// Mutable access to a live entity
    pub fn get_mut(&mut self, handle: EntityHandle) -> Option<&mut EntityState> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.state.as_mut()
    }

    /// Add a client-predicted proxy
    pub fn add_proxy(&mut self, spec: &EntitySpec, flags: ProxyFlags) {
        let handle = EntityHandle {
            index: u32::MAX,
            generation: self.proxies.len() as u32,
        };
        self.proxies.push(state_from(spec, handle, flags));
    }

    /// Number of live entities
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.state.is_some()).count()
    }

    /// No live entities
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Move every entity by its momentum
    pub fn advance(&mut self) {
        for state in self.slots.iter_mut().filter_map(|s| s.state.as_mut()) {
            state.origin += state.momentum;
        }
    }
}

fn state_from(spec: &EntitySpec, handle: EntityHandle, proxy_flags: ProxyFlags) -> EntityState {
    EntityState {
        handle,
        type_id: spec.type_id,
        origin: spec.origin,
        yaw: spec.angle.to_radians(),
        momentum: spec.momentum,
        height: spec.height,
        proxy_flags,
    }
}

impl EntityWorld for EntityTable {
    fn entity(&self, handle: EntityHandle) -> Option<EntityState> {
        let slot = self.slots.get(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.state
    }

    fn for_each_entity(&self, visit: &mut dyn FnMut(&EntityState) -> bool) -> bool {
        for state in self.slots.iter().filter_map(|s| s.state.as_ref()) {
            if !visit(state) {
                return false;
            }
        }
        true
    }

    fn for_each_proxy(&self, visit: &mut dyn FnMut(&EntityState) -> bool) -> bool {
        for state in &self.proxies {
            if !visit(state) {
                return false;
            }
        }
        true
    }
}
