//! In-memory implementations of the world contracts
//!
//! Enough to run the engine outside a game: a polygon map, an entity table,
//! a sound recorder and a fixed model table. Tests, benchmarks and the
//! command-line driver all run on these.

mod entities;
mod map;

use std::collections::HashMap;

use glam::Vec3;

pub use entities::{EntitySpec, EntityTable};
pub use map::{BLOCK_SIZE, LineDef, MapDef, SandboxMap, SectorDef};

use crate::world::{EntityHandle, ModelMetadata, ModelOffset, SoundSink};

/// A sound played through a [`RecordingSound`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayedSound {
    /// Sound id
    pub id: u32,
    /// Where it played
    pub origin: Vec3,
    /// Volume in `[0, 1]`
    pub volume: f32,
}

/// Sound sink that remembers everything played
#[derive(Debug, Clone, Default)]
pub struct RecordingSound {
    /// Sounds in the order they were played
    pub played: Vec<PlayedSound>,
}

impl RecordingSound {
    /// Number of times sound `id` was played
    pub fn count(&self, id: u32) -> usize {
        self.played.iter().filter(|s| s.id == id).count()
    }
}

impl SoundSink for RecordingSound {
    fn play(&mut self, id: u32, origin: Vec3, volume: f32) {
        self.played.push(PlayedSound { id, origin, volume });
    }
}

/// Model table with constant per-entity sub-part offsets
#[derive(Debug, Clone, Default)]
pub struct FixedModels {
    parts: HashMap<EntityHandle, Vec<ModelOffset>>,
}

impl FixedModels {
    /// Empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Give an entity a model with the given sub-part offsets
    pub fn insert(&mut self, entity: EntityHandle, parts: Vec<ModelOffset>) {
        self.parts.insert(entity, parts);
    }
}

impl ModelMetadata for FixedModels {
    fn has_model(&self, entity: EntityHandle) -> bool {
        self.parts.contains_key(&entity)
    }

    fn particle_offset(&self, entity: EntityHandle, sub_part: usize) -> Option<ModelOffset> {
        self.parts.get(&entity)?.get(sub_part).copied()
    }
}
