//! The engine facade: spawning, ticking and resynchronising generators

use std::sync::Arc;

use glam::Vec3;
use log::{debug, info, warn};

use crate::config::{ParticleConfig, SCALED_RATE_AREA};
use crate::definition::{DefinitionSet, GeneratorDef, GeneratorFlags, TriggerDef};
use crate::error::Result;
use crate::generator::{Generator, Lifecycle, TickContext, Trigger, TypeFilter};
use crate::pool::{GeneratorId, GeneratorPool};
use crate::rng::SimRng;
use crate::world::{EntityHandle, PlaneSurface, SectorId, World};

/// Owns every generator of a session and drives them once per tic
///
/// None of the per-tick entry points fail: a spawn that cannot happen
/// returns `None` and is logged, and stale handles are ignored.
#[derive(Debug, Clone)]
pub struct ParticleSystem {
    config: ParticleConfig,
    defs: DefinitionSet,
    pool: GeneratorPool,
    rng: SimRng,
    tic: u64,
}

impl ParticleSystem {
    /// Create an empty system
    pub fn new(config: ParticleConfig, defs: DefinitionSet) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            pool: GeneratorPool::new(config.max_generators),
            rng: SimRng::new(config.seed),
            config,
            defs,
            tic: 0,
        })
    }

    /// Active configuration
    pub fn config(&self) -> &ParticleConfig {
        &self.config
    }

    /// Loaded definitions
    pub fn definitions(&self) -> &DefinitionSet {
        &self.defs
    }

    /// The generator pool
    pub fn pool(&self) -> &GeneratorPool {
        &self.pool
    }

    /// Tics run since creation
    pub fn tic(&self) -> u64 {
        self.tic
    }

    /// Number of live generators
    pub fn generator_count(&self) -> usize {
        self.pool.len()
    }

    /// Number of live particles across all generators
    pub fn particle_count(&self) -> usize {
        let mut total = 0;
        self.pool.iterate(|_, generator| {
            total += generator.live_count();
            true
        });
        total
    }

    /// Generator behind an id
    pub fn generator(&self, id: GeneratorId) -> Option<&Generator> {
        self.pool.get(id)
    }

    /// Id of a generator owned by this system
    pub fn id_of(&self, generator: &Generator) -> Option<GeneratorId> {
        self.pool.id_of(generator)
    }

    /// Visit every generator until `visit` returns `false`
    pub fn iterate(&self, visit: impl FnMut(GeneratorId, &Generator) -> bool) -> bool {
        self.pool.iterate(visit)
    }

    /// Visit the generators with live particles in `sector`
    ///
    /// The index reflects the state after the last [`tick`](Self::tick).
    pub fn iterate_sector(
        &self,
        sector: SectorId,
        visit: impl FnMut(GeneratorId, &Generator) -> bool,
    ) -> bool {
        self.pool.iterate_sector(sector, visit)
    }

    /// Advance every generator by one tic, then rebuild the sector index
    pub fn tick(&mut self, world: &mut World<'_>) {
        for id in self.pool.ids() {
            let Some(generator) = self.pool.get_mut(id) else {
                continue;
            };
            let mut ctx = TickContext {
                world: &mut *world,
                rng: &mut self.rng,
                config: &self.config,
            };
            if generator.think(&mut ctx, false) == Lifecycle::Dead {
                debug!("Generator {} ('{}') finished", id, generator.def().name);
                self.pool.unlink(id);
            }
        }
        self.pool.rebuild_buckets(world.map.sector_count());
        self.tic += 1;
    }

    /// Destroy a generator and its particles
    pub fn destroy(&mut self, id: GeneratorId) -> bool {
        match self.pool.unlink(id) {
            Some(generator) => {
                debug!("Destroyed generator {} ('{}')", id, generator.def().name);
                true
            }
            None => false,
        }
    }

    /// Destroy every generator
    pub fn clear(&mut self) {
        self.pool.clear();
    }

    fn definition(&self, name: &str) -> Option<Arc<GeneratorDef>> {
        let def = self.defs.get(name).cloned();
        if def.is_none() {
            warn!("No generator definition named '{}'", name);
        }
        def
    }

    /// Find a slot, evicting the oldest non-static generator if needed
    fn claim_slot(&mut self, for_name: &str) -> Option<usize> {
        if let Some(slot) = self.pool.next_available_slot() {
            return Some(slot);
        }
        let Some(victim) = self.pool.oldest_evictable() else {
            debug!("Generator pool full of static generators, dropping '{}'", for_name);
            return None;
        };
        let evicted = self.pool.unlink(victim)?;
        debug!(
            "Evicted generator {} ('{}', age {}) for '{}'",
            victim,
            evicted.def().name,
            evicted.age(),
            for_name
        );
        Some(victim.slot())
    }

    fn spawn(
        &mut self,
        def: &Arc<GeneratorDef>,
        trigger: Trigger,
        world: &mut World<'_>,
        setup: impl FnOnce(&mut Generator),
    ) -> Option<GeneratorId> {
        if !self.config.enabled {
            return None;
        }
        let slot = self.claim_slot(&def.name)?;

        let capacity = self.config.particle_capacity(def.particles);
        let mut generator = Generator::new(Arc::clone(def), trigger, capacity, &mut self.rng);
        setup(&mut generator);

        if def.pre_sim > 0 {
            let mut ctx = TickContext {
                world,
                rng: &mut self.rng,
                config: &self.config,
            };
            if generator.presimulate(&mut ctx) == Lifecycle::Dead {
                debug!("Generator '{}' ended during pre-simulation", def.name);
                return None;
            }
        }

        match self.pool.link(slot, generator) {
            Ok(id) => {
                debug!("Spawned generator {} ('{}')", id, def.name);
                Some(id)
            }
            Err(_) => None,
        }
    }

    /// Spawn the named definition attached to an entity
    pub fn spawn_for_entity(
        &mut self,
        name: &str,
        entity: EntityHandle,
        world: &mut World<'_>,
    ) -> Option<GeneratorId> {
        let def = self.definition(name)?;
        world.entities.entity(entity)?;
        self.spawn(
            &def,
            Trigger::Source {
                entity: Some(entity),
            },
            world,
            |_| {},
        )
    }

    /// An entity entered `state`; spawn the definition bound to it, if any
    pub fn on_entity_state(
        &mut self,
        entity: EntityHandle,
        state: &str,
        world: &mut World<'_>,
    ) -> Option<GeneratorId> {
        let def = Arc::clone(self.defs.for_state(state)?);
        world.entities.entity(entity)?;
        self.spawn(
            &def,
            Trigger::Source {
                entity: Some(entity),
            },
            world,
            |_| {},
        )
    }

    /// An entity took damage; spawn the damage definition for its type
    ///
    /// The generator sits at the target's mid-height and emits away from the
    /// inflictor, with a spawn rate multiplied by the damage amount.
    pub fn on_entity_damaged(
        &mut self,
        target: EntityHandle,
        inflictor: Option<EntityHandle>,
        amount: u32,
        world: &mut World<'_>,
    ) -> Option<GeneratorId> {
        let target = world.entities.entity(target)?;
        let def = Arc::clone(self.defs.for_damage(target.type_id)?);
        let center = target.origin + Vec3::Z * (target.height / 2.0);
        let away = inflictor
            .and_then(|h| world.entities.entity(h))
            .map(|src| (target.origin - src.origin).normalize_or_zero())
            .unwrap_or(Vec3::ZERO);
        let multiplier = amount.max(1) as f32;
        self.spawn(&def, Trigger::Untriggered { center }, world, |generator| {
            generator.set_vector(generator.vector() + away);
            generator.set_spawn_rate_multiplier(multiplier);
        })
    }

    /// Spawn the named definition across one plane of a sector
    ///
    /// Declines if that plane already has a generator.
    pub fn spawn_for_plane(
        &mut self,
        name: &str,
        sector: SectorId,
        surface: PlaneSurface,
        world: &mut World<'_>,
    ) -> Option<GeneratorId> {
        let def = self.definition(name)?;
        self.spawn_plane(&def, sector, surface, world)
    }

    fn plane_generator(&self, sector: SectorId, surface: PlaneSurface) -> Option<GeneratorId> {
        let mut found = None;
        self.pool.iterate(|id, generator| {
            if *generator.trigger() == (Trigger::Plane { sector, surface }) {
                found = Some(id);
                return false;
            }
            true
        });
        found
    }

    fn spawn_plane(
        &mut self,
        def: &Arc<GeneratorDef>,
        sector: SectorId,
        surface: PlaneSurface,
        world: &mut World<'_>,
    ) -> Option<GeneratorId> {
        if self.plane_generator(sector, surface).is_some() {
            return None;
        }
        let info = world.map.sector(sector)?;
        let multiplier = if def.flags.contains(GeneratorFlags::SCALED_RATE) {
            (info.bounds.area() / SCALED_RATE_AREA).max(1.0)
        } else {
            1.0
        };
        self.spawn(def, Trigger::Plane { sector, surface }, world, |generator| {
            generator.set_spawn_rate_multiplier(multiplier);
        })
    }

    /// Spawn the named type definition, emitting from every matching entity
    pub fn spawn_for_type(&mut self, name: &str, world: &mut World<'_>) -> Option<GeneratorId> {
        let def = self.definition(name)?;
        self.spawn_type(&def, world)
    }

    fn spawn_type(&mut self, def: &Arc<GeneratorDef>, world: &mut World<'_>) -> Option<GeneratorId> {
        let Some(filter) = TypeFilter::from_trigger(&def.trigger) else {
            warn!("Generator definition '{}' has no type trigger", def.name);
            return None;
        };
        let mut exists = false;
        self.pool.iterate(|_, generator| {
            exists = Arc::ptr_eq(generator.def(), def)
                && matches!(generator.trigger(), Trigger::TypeMatch(_));
            !exists
        });
        if exists {
            return None;
        }
        self.spawn(def, Trigger::TypeMatch(filter), world, Generator::mark_static)
    }

    /// Spawn the named definition at a fixed point
    pub fn spawn_untriggered(
        &mut self,
        name: &str,
        center: Vec3,
        world: &mut World<'_>,
    ) -> Option<GeneratorId> {
        let def = self.definition(name)?;
        self.spawn(&def, Trigger::Untriggered { center }, world, |_| {})
    }

    /// Start a map session: drop all generators and spawn the map's own
    pub fn begin_map(&mut self, world: &mut World<'_>) {
        self.clear();
        self.spawn_map_generators(world);
        self.pool.rebuild_buckets(world.map.sector_count());
        info!(
            "Map '{}' started with {} generators",
            world.map.map_id(),
            self.pool.len()
        );
    }

    /// Type, map and plane generators that belong to the current map
    fn spawn_map_generators(&mut self, world: &mut World<'_>) {
        let defs: Vec<Arc<GeneratorDef>> = self.defs.iter().cloned().collect();
        for def in &defs {
            match &def.trigger {
                TriggerDef::EntityType { .. } | TriggerDef::AnyEntityType => {
                    self.spawn_type(def, world);
                }
                TriggerDef::Map { map } if map == world.map.map_id() => {
                    self.spawn(
                        def,
                        Trigger::Untriggered { center: def.center },
                        world,
                        Generator::mark_static,
                    );
                }
                TriggerDef::Plane { material, surface } => {
                    self.spawn_plane_matches(def, material, *surface, world);
                }
                _ => {}
            }
        }
    }

    fn spawn_plane_matches(
        &mut self,
        def: &Arc<GeneratorDef>,
        material: &str,
        only: Option<PlaneSurface>,
        world: &mut World<'_>,
    ) {
        let surfaces = match only {
            Some(surface) => vec![surface],
            None => vec![PlaneSurface::Floor, PlaneSurface::Ceiling],
        };
        for index in 0..world.map.sector_count() {
            let Ok(index) = u32::try_from(index) else {
                break;
            };
            let sector = SectorId(index);
            for &surface in &surfaces {
                if world.map.plane_material(sector, surface) == Some(material) {
                    self.spawn_plane(def, sector, surface, world);
                }
            }
        }
    }

    /// Replace the definitions and bring running generators in line
    ///
    /// Map generators are destroyed and spawned afresh. Every other generator
    /// keeps running if the new set has a definition with the same name (or,
    /// failing that, the same trigger) and the same particle and stage
    /// counts; otherwise it is destroyed. Missing map, type and plane
    /// generators are then spawned.
    pub fn reload_definitions(&mut self, defs: DefinitionSet, world: &mut World<'_>) {
        let mut kept = 0usize;
        let mut dropped = 0usize;
        for id in self.pool.ids() {
            let Some(generator) = self.pool.get(id) else {
                continue;
            };
            let old = Arc::clone(generator.def());
            if matches!(old.trigger, TriggerDef::Map { .. }) {
                self.pool.unlink(id);
                continue;
            }
            match matching_definition(&defs, &old) {
                Some(new) => {
                    if let Some(generator) = self.pool.get_mut(id) {
                        generator.rebind(new);
                        kept += 1;
                    }
                }
                None => {
                    debug!("No matching definition for generator {} ('{}')", id, old.name);
                    self.pool.unlink(id);
                    dropped += 1;
                }
            }
        }
        self.defs = defs;
        self.spawn_map_generators(world);
        self.pool.rebuild_buckets(world.map.sector_count());
        info!(
            "Definitions reloaded: {} generators kept, {} destroyed",
            kept, dropped
        );
    }
}

fn matching_definition(defs: &DefinitionSet, old: &GeneratorDef) -> Option<Arc<GeneratorDef>> {
    let candidate = defs.get(&old.name).or_else(|| {
        if old.trigger == TriggerDef::None {
            None
        } else {
            defs.find_by_trigger(&old.trigger)
        }
    })?;
    let compatible = candidate.trigger == old.trigger
        && candidate.particles == old.particles
        && candidate.stage_count() == old.stage_count();
    compatible.then(|| Arc::clone(candidate))
}
