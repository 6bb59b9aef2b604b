//! A single particle emitter and its per-tick lifecycle

use std::sync::Arc;

use glam::Vec3;
use log::{debug, trace};

use crate::config::ParticleConfig;
use crate::definition::{GeneratorDef, GeneratorFlags, ParticleKind, StageDef, TriggerDef};
use crate::particle::{Particle, ParticleArray};
use crate::physics::{SphereForce, StepStage, apply_stage_angles, step_particle};
use crate::rng::SimRng;
use crate::spawn::{
    launch_vector, plane_spawn_height, random_point_in_sector, rotate_xy, uncertain_offset,
};
use crate::stage::{StageRuntime, derive_stages};
use crate::world::{
    EntityHandle, EntityState, ModelMetadata, PlaneSurface, ProxyFlags, SectorId, World,
};

/// Entity types a type-triggered generator emits from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeFilter {
    /// Every entity
    Any,
    /// One or two specific type numbers
    Types {
        /// Primary type number
        primary: u32,
        /// Optional second type number
        secondary: Option<u32>,
    },
}

impl TypeFilter {
    /// Filter described by a type trigger, if it is one
    pub fn from_trigger(trigger: &TriggerDef) -> Option<Self> {
        match *trigger {
            TriggerDef::EntityType { primary, secondary } => Some(Self::Types { primary, secondary }),
            TriggerDef::AnyEntityType => Some(Self::Any),
            _ => None,
        }
    }

    /// Whether an entity of `type_id` passes
    pub fn matches(&self, type_id: u32) -> bool {
        match *self {
            Self::Any => true,
            Self::Types { primary, secondary } => primary == type_id || secondary == Some(type_id),
        }
    }
}

/// Where a generator's particles come from
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Trigger {
    /// Bound to one entity; `None` once the entity is gone
    Source {
        /// The source entity
        entity: Option<EntityHandle>,
    },
    /// Spawns across one plane of a sector
    Plane {
        /// The sector
        sector: SectorId,
        /// Floor or ceiling
        surface: PlaneSurface,
    },
    /// Spawns from every live entity passing the filter
    TypeMatch(TypeFilter),
    /// Spawns at a fixed point
    Untriggered {
        /// World position of the emitter
        center: Vec3,
    },
}

/// Result of one generator tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Keep ticking
    Alive,
    /// Remove from the pool
    Dead,
}

/// Mutable engine state shared by every generator during a tick
pub(crate) struct TickContext<'t, 'w> {
    pub world: &'t mut World<'w>,
    pub rng: &'t mut SimRng,
    pub config: &'t ParticleConfig,
}

#[derive(Clone, Copy)]
enum SpawnOrigin<'e> {
    Entity(&'e EntityState),
    Plane(SectorId, PlaneSurface),
    Point(Vec3),
}

/// One emitter instance
///
/// Owns a fixed particle array sized at creation. New particles overwrite
/// slots round-robin, whether or not the slot is still in use.
#[derive(Debug, Clone)]
pub struct Generator {
    def: Arc<GeneratorDef>,
    trigger: Trigger,
    flags: GeneratorFlags,
    particles: ParticleArray,
    stages: Box<[StageRuntime]>,
    vector: Vec3,
    age: u32,
    spawn_accumulator: f32,
    spawn_cursor: usize,
    spawn_rate_multiplier: f32,
}

fn stage_tics(stage: &StageDef, rng: &mut SimRng) -> i32 {
    let tics = stage.tics as f32 * (1.0 - stage.variance * rng.rand_float());
    tics as i32
}

impl Generator {
    /// Create a generator with room for `capacity` particles
    pub fn new(def: Arc<GeneratorDef>, trigger: Trigger, capacity: usize, rng: &mut SimRng) -> Self {
        let mut flags = def.flags;
        if matches!(trigger, Trigger::Untriggered { .. }) {
            flags |= GeneratorFlags::UNTRIGGERED;
        }
        let mut vector = def.vector;
        if def.init_vector_variance > 0.0 {
            vector += uncertain_offset(rng, 0.0, def.init_vector_variance);
        }
        Self {
            stages: derive_stages(&def.stages),
            particles: ParticleArray::new(capacity),
            def,
            trigger,
            flags,
            vector,
            age: 0,
            spawn_accumulator: 0.0,
            spawn_cursor: 0,
            spawn_rate_multiplier: 1.0,
        }
    }

    /// The definition this generator was built from
    pub fn def(&self) -> &Arc<GeneratorDef> {
        &self.def
    }

    /// Trigger state
    pub fn trigger(&self) -> &Trigger {
        &self.trigger
    }

    /// Effective flags, including `UNTRIGGERED` for fixed-point generators
    pub fn flags(&self) -> GeneratorFlags {
        self.flags
    }

    /// Never evicted automatically
    pub fn is_static(&self) -> bool {
        self.flags.contains(GeneratorFlags::STATIC)
    }

    /// Tics since creation, excluding pre-simulation
    pub fn age(&self) -> u32 {
        self.age
    }

    /// Source entity while still attached
    pub fn source(&self) -> Option<EntityHandle> {
        match self.trigger {
            Trigger::Source { entity } => entity,
            _ => None,
        }
    }

    /// Particle storage
    pub fn particles(&self) -> &ParticleArray {
        &self.particles
    }

    /// Live particles with their slot index
    pub fn live_particles(&self) -> impl Iterator<Item = (usize, &Particle)> {
        self.particles.live()
    }

    /// Number of live particles
    pub fn live_count(&self) -> usize {
        self.particles.live_count()
    }

    /// Runtime stage constants
    pub fn stages(&self) -> &[StageRuntime] {
        &self.stages
    }

    /// Slot the next particle is written to
    pub fn spawn_cursor(&self) -> usize {
        self.spawn_cursor
    }

    /// Base emit vector
    pub fn vector(&self) -> Vec3 {
        self.vector
    }

    /// Multiplier applied to the definition's spawn rate
    pub fn spawn_rate_multiplier(&self) -> f32 {
        self.spawn_rate_multiplier
    }

    /// Sectors currently holding at least one live particle, possibly repeated
    pub fn occupied_sectors(&self) -> impl Iterator<Item = SectorId> + '_ {
        self.particles.live().filter_map(|(_, p)| p.sector)
    }

    pub(crate) fn set_vector(&mut self, vector: Vec3) {
        self.vector = vector;
    }

    pub(crate) fn set_spawn_rate_multiplier(&mut self, multiplier: f32) {
        self.spawn_rate_multiplier = multiplier;
    }

    pub(crate) fn mark_static(&mut self) {
        self.flags |= GeneratorFlags::STATIC;
    }

    /// Swap in a reloaded definition with the same particle and stage counts
    pub(crate) fn rebind(&mut self, def: Arc<GeneratorDef>) {
        self.stages = derive_stages(&def.stages);
        let kept = GeneratorFlags::UNTRIGGERED | GeneratorFlags::STATIC;
        self.flags = def.flags | (self.flags & kept);
        self.def = def;
    }

    fn spawn_window_open(&self) -> bool {
        self.def.spawn_age.is_none_or(|limit| self.age < limit)
    }

    fn is_orphaned(&self) -> bool {
        matches!(self.trigger, Trigger::Source { entity: None })
            && !self.flags.contains(GeneratorFlags::UNTRIGGERED)
    }

    /// Resolve the source entity, detaching it if it no longer exists
    fn resolve_source(&mut self, world: &World<'_>) -> Option<EntityState> {
        let Trigger::Source { entity: Some(handle) } = self.trigger else {
            return None;
        };
        let state = world.entities.entity(handle);
        if state.is_none() {
            debug!(
                "Generator '{}' lost its source entity {}:{}",
                self.def.name, handle.index, handle.generation
            );
            self.trigger = Trigger::Source { entity: None };
        }
        state
    }

    fn sphere_force(&self, source: Option<&EntityState>) -> Option<SphereForce> {
        let base = match (self.trigger, source) {
            (Trigger::Untriggered { center }, _) => center,
            (Trigger::Source { .. }, Some(src)) => src.origin,
            _ => return None,
        };
        Some(SphereForce {
            center: base + self.def.force_origin,
            radius: self.def.force_radius,
            strength: self.def.force,
            axis: self.def.force_axis,
        })
    }

    /// Run the generator through `pre_sim` tics, then reset its age
    pub(crate) fn presimulate(&mut self, ctx: &mut TickContext<'_, '_>) -> Lifecycle {
        let mut outcome = Lifecycle::Alive;
        for _ in 0..self.def.pre_sim {
            outcome = self.think(ctx, true);
            if outcome == Lifecycle::Dead {
                break;
            }
        }
        self.age = 0;
        outcome
    }

    /// Advance the generator and all its particles by one tic
    ///
    /// During pre-simulation the age limit is not enforced.
    pub(crate) fn think(&mut self, ctx: &mut TickContext<'_, '_>, presim: bool) -> Lifecycle {
        let source = self.resolve_source(ctx.world);

        if !presim && self.def.max_age.is_some_and(|max| self.age > max) {
            return Lifecycle::Dead;
        }
        if self.is_orphaned() && (!self.spawn_window_open() || self.particles.live_count() == 0) {
            return Lifecycle::Dead;
        }

        if self.spawn_window_open() && self.has_active_trigger() {
            self.accumulate_spawns(ctx, source.as_ref());
        }
        self.age = self.age.saturating_add(1);

        let sphere = self.sphere_force(source.as_ref());
        self.step_particles(ctx, sphere.as_ref());
        Lifecycle::Alive
    }

    fn has_active_trigger(&self) -> bool {
        match self.trigger {
            Trigger::Source { entity } => entity.is_some(),
            Trigger::Plane { .. } | Trigger::TypeMatch(_) | Trigger::Untriggered { .. } => true,
        }
    }

    fn accumulate_spawns(&mut self, ctx: &mut TickContext<'_, '_>, source: Option<&EntityState>) {
        let def = &self.def;
        let rate = def.spawn_rate
            * self.spawn_rate_multiplier
            * ctx.config.spawn_rate_scale
            * (1.0 - def.spawn_rate_variance * ctx.rng.rand_float());
        self.spawn_accumulator += rate;

        while self.spawn_accumulator >= 1.0 {
            self.spawn_accumulator -= 1.0;
            self.dispatch_spawn(ctx, source);
        }
    }

    fn dispatch_spawn(&mut self, ctx: &mut TickContext<'_, '_>, source: Option<&EntityState>) {
        match self.trigger {
            Trigger::Source { .. } => {
                if let Some(src) = source {
                    self.spawn_particle(ctx, SpawnOrigin::Entity(src));
                }
            }
            Trigger::Plane { sector, surface } => {
                self.spawn_particle(ctx, SpawnOrigin::Plane(sector, surface));
            }
            Trigger::TypeMatch(filter) => {
                for src in &type_sources(filter, ctx.world, ctx.config.include_client_proxies) {
                    self.spawn_particle(ctx, SpawnOrigin::Entity(src));
                }
            }
            Trigger::Untriggered { center } => {
                self.spawn_particle(ctx, SpawnOrigin::Point(center));
            }
        }
    }

    /// Write one new particle at the spawn cursor
    fn spawn_particle(&mut self, ctx: &mut TickContext<'_, '_>, origin: SpawnOrigin<'_>) {
        let models: Option<&dyn ModelMetadata> = match origin {
            SpawnOrigin::Entity(src) => ctx.world.models.filter(|m| m.has_model(src.handle)),
            _ => None,
        };
        if matches!(origin, SpawnOrigin::Entity(_))
            && self.flags.contains(GeneratorFlags::MODEL_ONLY)
            && models.is_none()
        {
            return;
        }

        let capacity = self.particles.capacity();
        if capacity == 0 {
            return;
        }
        let index = self.spawn_cursor;
        self.spawn_cursor = (index + 1) % capacity;

        let def = Arc::clone(&self.def);
        let stage_index = if ctx.rng.rand_float() < def.alt_start_variance {
            def.alt_start
        } else {
            0
        };
        let (Some(stage_def), Some(stage)) = (def.stages.get(stage_index), self.stages.get(stage_index))
        else {
            return;
        };
        let tics = stage_tics(stage_def, ctx.rng);
        let mut momentum = launch_vector(
            ctx.rng,
            self.vector,
            def.vector_variance,
            def.speed,
            def.speed_variance,
        );

        let placed = match origin {
            SpawnOrigin::Entity(src) => {
                if self.flags.contains(GeneratorFlags::RELATIVE_VECTOR) {
                    momentum = rotate_xy(momentum, src.yaw);
                }
                if self.flags.contains(GeneratorFlags::RELATIVE_VELOCITY) {
                    momentum += src.momentum;
                }
                let mut position = src.origin + Vec3::Z * def.center.z;
                let angle = src.yaw + def.center.y.to_radians();
                position += Vec3::new(angle.cos(), angle.sin(), 0.0) * def.center.x;
                if let (Some(models), Some(part)) = (models, def.sub_model) {
                    if let Some(offset) = models.particle_offset(src.handle, part) {
                        position += rotate_xy(offset.interpolated(), src.yaw);
                    }
                }
                position += uncertain_offset(ctx.rng, def.spawn_radius_min, def.spawn_radius);
                Some((position, ctx.world.sector_at(position.truncate())))
            }
            SpawnOrigin::Point(center) => {
                let position =
                    center + uncertain_offset(ctx.rng, def.spawn_radius_min, def.spawn_radius);
                Some((position, ctx.world.sector_at(position.truncate())))
            }
            SpawnOrigin::Plane(sector, surface) => ctx.world.map.sector(sector).and_then(|info| {
                let xy = random_point_in_sector(
                    ctx.world.map,
                    ctx.rng,
                    sector,
                    &info.bounds,
                    ctx.config.plane_spawn_attempts,
                    ctx.config.cell_spawn_attempts,
                )?;
                let z = plane_spawn_height(ctx.rng, self.flags, &info, surface, stage.radius);
                Some((xy.extend(z), Some(sector)))
            }),
        };

        let Some(particle) = self.particles.get_mut(index) else {
            return;
        };
        let Some((position, sector)) = placed else {
            trace!("'{}': no spawn point found, particle born dead", def.name);
            particle.kill();
            return;
        };

        *particle = Particle {
            stage: Some(stage_index),
            tics,
            position,
            momentum,
            sector,
            ..Particle::default()
        };
        apply_stage_angles(particle, stage_def.flags, ctx.rng);
        if stage_def.kind == ParticleKind::None {
            particle.kill();
            return;
        }
        if ctx.config.play_sounds {
            ctx.world.play_sound(stage_def.sound, position);
        }
    }

    fn step_particles(&mut self, ctx: &mut TickContext<'_, '_>, sphere: Option<&SphereForce>) {
        let def = Arc::clone(&self.def);
        let stages = &self.stages;
        for (index, particle) in self.particles.slots_mut().iter_mut().enumerate() {
            if !particle.is_alive() || !advance_stage(particle, &def, ctx) {
                continue;
            }
            let Some(current) = particle.stage else {
                continue;
            };
            let (Some(stage_def), Some(runtime)) = (def.stages.get(current), stages.get(current))
            else {
                particle.kill();
                continue;
            };
            step_particle(
                particle,
                index,
                StepStage {
                    def: stage_def,
                    runtime,
                },
                sphere,
                ctx.world,
                ctx.config.play_sounds,
            );
        }
    }
}

/// Count down the stage timer; returns `false` if the particle died
fn advance_stage(particle: &mut Particle, def: &GeneratorDef, ctx: &mut TickContext<'_, '_>) -> bool {
    let remaining = particle.tics;
    particle.tics -= 1;
    if remaining > 0 {
        return true;
    }

    let next = particle.stage.map_or(0, |s| s + 1);
    let Some(stage_def) = def.stages.get(next).filter(|s| s.kind != ParticleKind::None) else {
        particle.kill();
        return false;
    };
    particle.stage = Some(next);
    particle.tics = stage_tics(stage_def, ctx.rng);
    apply_stage_angles(particle, stage_def.flags, ctx.rng);
    if ctx.config.play_sounds {
        ctx.world.play_sound(stage_def.sound, particle.position);
    }
    true
}

/// Entities a type generator emits from this tic, real entities first
fn type_sources(filter: TypeFilter, world: &World<'_>, include_proxies: bool) -> Vec<EntityState> {
    let mut sources = Vec::new();
    world.entities.for_each_entity(&mut |e| {
        if filter.matches(e.type_id) {
            sources.push(*e);
        }
        true
    });
    if include_proxies {
        let skip = ProxyFlags::UNPREDICTABLE | ProxyFlags::HIDDEN;
        world.entities.for_each_proxy(&mut |e| {
            if filter.matches(e.type_id) && !e.proxy_flags.intersects(skip) {
                sources.push(*e);
            }
            true
        });
    }
    sources
}
