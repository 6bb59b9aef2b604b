//! # ptcgen - Particle Generator Simulation
//!
//! A deterministic, tic-based engine for particle generators in sector-based
//! game worlds. Generators are spawned from entities, sector planes, entity
//! types, damage events or fixed points; each owns a fixed array of particles
//! that age through stages and collide with floors, ceilings and walls.
//!
//! ## Features
//!
//! - Fixed-capacity generator pool with oldest-first eviction
//! - Source, plane, type-match and untriggered spawn triggers
//! - Staged particle lifetimes with spin, gravity, resistance and sphere forces
//! - Plane and line collision with bounce, stick and touch reactions
//! - Per-sector index of generators for renderers
//! - Hot reload of generator definitions
//! - An in-memory sandbox world for tests and tools
//!
//! ## Examples
//!
//! ```
//! use glam::Vec2;
//! use ptcgen::sandbox::{EntityTable, SandboxMap};
//! use ptcgen::{
//!     DefinitionSet, GeneratorDef, ParticleConfig, ParticleSystem, PlaneSurface, SectorId,
//!     Silence, StageDef, World,
//! };
//!
//! # fn main() -> Result<(), ptcgen::PtcError> {
//! let map = SandboxMap::rect_room("demo", Vec2::ZERO, Vec2::splat(256.0), 0.0, 128.0)?;
//! let entities = EntityTable::new();
//! let mut sound = Silence;
//!
//! let defs = DefinitionSet::new(vec![GeneratorDef {
//!     name: "steam".to_string(),
//!     stages: vec![StageDef::default()],
//!     ..Default::default()
//! }])?;
//! let mut system = ParticleSystem::new(ParticleConfig::default(), defs)?;
//!
//! let mut world = World {
//!     map: &map,
//!     entities: &entities,
//!     sound: &mut sound,
//!     models: None,
//!     gravity: 0.0,
//! };
//! let id = system.spawn_for_plane("steam", SectorId(0), PlaneSurface::Floor, &mut world);
//! assert!(id.is_some());
//!
//! for _ in 0..10 {
//!     system.tick(&mut world);
//! }
//! assert_eq!(system.particle_count(), 10);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod collision;
pub mod config;
pub mod definition;
pub mod error;
pub mod generator;
pub mod particle;
pub mod physics;
pub mod pool;
pub mod rng;
pub mod sandbox;
pub mod spawn;
pub mod stage;
pub mod system;
pub mod world;

// Re-export common types
pub use config::{ParticleConfig, TICS_PER_SECOND};
pub use definition::{
    DefinitionSet, GeneratorDef, GeneratorFlags, ParticleKind, SoundRef, StageDef, StageFlags,
    TriggerDef,
};
pub use error::{PtcError, Result};
pub use generator::{Generator, Lifecycle, Trigger, TypeFilter};
pub use particle::{Particle, ParticleArray};
pub use pool::{GeneratorId, GeneratorPool};
pub use rng::SimRng;
pub use stage::StageRuntime;
pub use system::ParticleSystem;
pub use world::{
    Aabb2, CellId, CellInfo, EntityHandle, EntityState, EntityWorld, LineId, LineInfo,
    MapGeometry, ModelMetadata, ModelOffset, PlaneSurface, ProxyFlags, SectorId, SectorInfo,
    Silence, SoundSink, World,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
