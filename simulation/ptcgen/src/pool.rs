//! Fixed-capacity generator storage and the per-sector read index

use crate::generator::Generator;
use crate::world::SectorId;

/// Handle to a generator in a [`GeneratorPool`]
///
/// The generation changes every time a slot is emptied, so a handle to a
/// destroyed generator never resolves to its replacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GeneratorId {
    slot: u16,
    generation: u32,
}

impl GeneratorId {
    /// Slot index in the pool
    pub fn slot(&self) -> usize {
        usize::from(self.slot)
    }

    /// Reuse counter of the slot
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl std::fmt::Display for GeneratorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}.{}", self.slot, self.generation)
    }
}

#[derive(Debug, Clone, Default)]
struct Slot {
    generation: u32,
    generator: Option<Generator>,
}

/// Arena of generator slots plus per-sector buckets
#[derive(Debug, Clone)]
pub struct GeneratorPool {
    slots: Vec<Slot>,
    buckets: Vec<Vec<GeneratorId>>,
}

impl GeneratorPool {
    /// Pool with `max_slots` empty slots; capped at `u16::MAX`
    pub fn new(max_slots: usize) -> Self {
        let max_slots = max_slots.min(usize::from(u16::MAX));
        Self {
            slots: vec![Slot::default(); max_slots],
            buckets: Vec::new(),
        }
    }

    /// Number of slots
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of linked generators
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.generator.is_some()).count()
    }

    /// No generators linked
    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(|s| s.generator.is_none())
    }

    /// First unused slot
    pub fn next_available_slot(&self) -> Option<usize> {
        self.slots.iter().position(|s| s.generator.is_none())
    }

    fn id_for(&self, slot: usize) -> Option<GeneratorId> {
        let entry = self.slots.get(slot)?;
        entry.generator.as_ref()?;
        Some(GeneratorId {
            slot: u16::try_from(slot).ok()?,
            generation: entry.generation,
        })
    }

    /// Take ownership of `generator` in an empty slot
    ///
    /// Hands the generator back if the slot is out of range or occupied.
    pub fn link(&mut self, slot: usize, generator: Generator) -> Result<GeneratorId, Generator> {
        let Ok(index) = u16::try_from(slot) else {
            return Err(generator);
        };
        match self.slots.get_mut(slot) {
            Some(entry) if entry.generator.is_none() => {
                entry.generator = Some(generator);
                Ok(GeneratorId {
                    slot: index,
                    generation: entry.generation,
                })
            }
            _ => Err(generator),
        }
    }

    /// Release a generator; stale ids are ignored
    pub fn unlink(&mut self, id: GeneratorId) -> Option<Generator> {
        let entry = self.slots.get_mut(id.slot())?;
        if entry.generation != id.generation {
            return None;
        }
        let generator = entry.generator.take()?;
        entry.generation = entry.generation.wrapping_add(1);
        Some(generator)
    }

    /// Generator behind an id
    pub fn get(&self, id: GeneratorId) -> Option<&Generator> {
        let entry = self.slots.get(id.slot())?;
        if entry.generation != id.generation {
            return None;
        }
        entry.generator.as_ref()
    }

    /// Mutable generator behind an id
    pub fn get_mut(&mut self, id: GeneratorId) -> Option<&mut Generator> {
        let entry = self.slots.get_mut(id.slot())?;
        if entry.generation != id.generation {
            return None;
        }
        entry.generator.as_mut()
    }

    /// Id of a generator owned by this pool, by identity
    pub fn id_of(&self, generator: &Generator) -> Option<GeneratorId> {
        let slot = self
            .slots
            .iter()
            .position(|s| s.generator.as_ref().is_some_and(|g| std::ptr::eq(g, generator)))?;
        self.id_for(slot)
    }

    /// Ids of every linked generator in slot order
    pub fn ids(&self) -> Vec<GeneratorId> {
        (0..self.slots.len()).filter_map(|slot| self.id_for(slot)).collect()
    }

    /// Visit generators in slot order until `visit` returns `false`
    ///
    /// Returns `false` if the iteration was cut short.
    pub fn iterate(&self, mut visit: impl FnMut(GeneratorId, &Generator) -> bool) -> bool {
        for slot in 0..self.slots.len() {
            let (Some(id), Some(generator)) = (self.id_for(slot), self.slots[slot].generator.as_ref())
            else {
                continue;
            };
            if !visit(id, generator) {
                return false;
            }
        }
        true
    }

    /// Visit the generators bucketed under `sector` until `visit` returns `false`
    pub fn iterate_sector(
        &self,
        sector: SectorId,
        mut visit: impl FnMut(GeneratorId, &Generator) -> bool,
    ) -> bool {
        let Some(bucket) = self.buckets.get(sector.0 as usize) else {
            return true;
        };
        for &id in bucket {
            if let Some(generator) = self.get(id) {
                if !visit(id, generator) {
                    return false;
                }
            }
        }
        true
    }

    /// Oldest generator that may be evicted, i.e. not static
    pub fn oldest_evictable(&self) -> Option<GeneratorId> {
        let mut best: Option<(GeneratorId, u32)> = None;
        self.iterate(|id, generator| {
            if !generator.is_static() && best.is_none_or(|(_, age)| generator.age() > age) {
                best = Some((id, generator.age()));
            }
            true
        });
        best.map(|(id, _)| id)
    }

    /// Recompute which generators have live particles in which sectors
    pub fn rebuild_buckets(&mut self, sector_count: usize) {
        self.buckets.resize_with(sector_count, Vec::new);
        self.buckets.truncate(sector_count);
        for bucket in &mut self.buckets {
            bucket.clear();
        }
        for slot in 0..self.slots.len() {
            let Some(id) = self.id_for(slot) else {
                continue;
            };
            let Some(generator) = self.slots[slot].generator.as_ref() else {
                continue;
            };
            for sector in generator.occupied_sectors() {
                // Only this generator pushes while its particles are walked,
                // so checking the tail is enough to keep entries unique.
                if let Some(bucket) = self.buckets.get_mut(sector.0 as usize) {
                    if bucket.last() != Some(&id) {
                        bucket.push(id);
                    }
                }
            }
        }
    }

    /// Drop every generator and bucket entry
    pub fn clear(&mut self) {
        for entry in &mut self.slots {
            if entry.generator.take().is_some() {
                entry.generation = entry.generation.wrapping_add(1);
            }
        }
        for bucket in &mut self.buckets {
            bucket.clear();
        }
    }
}
