//! Common test utilities and fixtures

#![allow(dead_code)]

use glam::{Vec2, Vec3};
use ptcgen::sandbox::{EntityTable, FixedModels, MapDef, RecordingSound, SandboxMap, SectorDef};
use ptcgen::{
    DefinitionSet, Generator, GeneratorDef, GeneratorId, Particle, ParticleConfig,
    ParticleSystem, StageDef, World,
};

/// Map, entities and sound sink that outlive the per-tick [`World`]
pub struct Harness {
    pub map: SandboxMap,
    pub entities: EntityTable,
    pub sound: RecordingSound,
    pub models: Option<FixedModels>,
    pub gravity: f32,
}

impl Harness {
    pub fn new(map: SandboxMap) -> Self {
        Self {
            map,
            entities: EntityTable::new(),
            sound: RecordingSound::default(),
            models: None,
            gravity: 0.0,
        }
    }

    /// A 256x256 room, floor 0, ceiling 128
    pub fn room() -> Self {
        Self::new(room_map(256.0, 0.0, 128.0))
    }

    pub fn world(&mut self) -> World<'_> {
        World {
            map: &self.map,
            entities: &self.entities,
            sound: &mut self.sound,
            models: self.models.as_ref().map(|m| m as &dyn ptcgen::ModelMetadata),
            gravity: self.gravity,
        }
    }

    pub fn tick(&mut self, system: &mut ParticleSystem, tics: usize) {
        for _ in 0..tics {
            let mut world = self.world();
            system.tick(&mut world);
        }
    }
}

/// Square room with one sector
pub fn room_map(size: f32, floor: f32, ceiling: f32) -> SandboxMap {
    SandboxMap::rect_room("E1M1", Vec2::ZERO, Vec2::splat(size), floor, ceiling)
        .expect("Failed to build room")
}

/// Two 100x100 rooms side by side; the east one has a raised floor
pub fn two_room_map(step_height: f32) -> SandboxMap {
    SandboxMap::build(&MapDef {
        id: "E1M2".to_string(),
        sectors: vec![
            SectorDef::rect(Vec2::ZERO, Vec2::new(100.0, 100.0), 0.0, 128.0),
            SectorDef::rect(
                Vec2::new(100.0, 0.0),
                Vec2::new(200.0, 100.0),
                step_height,
                128.0,
            ),
        ],
        lines: Vec::new(),
    })
    .expect("Failed to build two rooms")
}

/// Definition with one stage and no randomness
pub fn simple_def(name: &str) -> GeneratorDef {
    GeneratorDef {
        name: name.to_string(),
        stages: vec![StageDef {
            tics: 100,
            ..Default::default()
        }],
        ..Default::default()
    }
}

/// Definition firing a single particle on the first tic
pub fn single_shot(name: &str, vector: Vec3, speed: f32, stage: StageDef) -> GeneratorDef {
    GeneratorDef {
        name: name.to_string(),
        spawn_age: Some(1),
        vector,
        speed,
        stages: vec![stage],
        ..Default::default()
    }
}

pub fn system(defs: Vec<GeneratorDef>) -> ParticleSystem {
    system_with(ParticleConfig::default(), defs)
}

pub fn system_with(config: ParticleConfig, defs: Vec<GeneratorDef>) -> ParticleSystem {
    let defs = DefinitionSet::new(defs).expect("Invalid test definitions");
    ParticleSystem::new(config, defs).expect("Invalid test config")
}

pub fn generator(system: &ParticleSystem, id: GeneratorId) -> &Generator {
    system.generator(id).expect("Generator should exist")
}

/// The only live particle of a generator
pub fn only_particle(system: &ParticleSystem, id: GeneratorId) -> Particle {
    let generator = generator(system, id);
    let live: Vec<_> = generator.live_particles().collect();
    assert_eq!(live.len(), 1, "expected exactly one live particle");
    live[0].1.clone()
}
