//! Per-particle movement: forces, plane collision and line collision

use glam::{Vec2, Vec3};
use log::trace;

use crate::collision::{LineHit, LineQuery, reflect};
use crate::config::TICS_PER_SECOND;
use crate::definition::{StageDef, StageFlags};
use crate::particle::Particle;
use crate::stage::StageRuntime;
use crate::world::{PlaneSurface, World};

/// Hard radius of a plane-flat particle
pub const FLAT_HARD_RADIUS: f32 = 1.0;

/// Below this vertical speed a flat particle sticks to the plane it bounced off
pub const STICK_SPEED: f32 = 1.0 / 256.0;

/// Below this vertical speed a particle resting in a line's opening dies
pub const GAP_REST_SPEED: f32 = 0.5;

const YAW_SIGNS: [f32; 4] = [1.0, 1.0, -1.0, -1.0];
const PITCH_SIGNS: [f32; 4] = [1.0, -1.0, 1.0, -1.0];

/// Radial and rotational force about a center point
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SphereForce {
    /// Center of the sphere
    pub center: Vec3,
    /// Radius particles are pulled onto; positive strength pulls them there
    pub radius: f32,
    /// Radial strength
    pub strength: f32,
    /// Rotation axis; its length is the angular rate
    pub axis: Vec3,
}

impl SphereForce {
    /// Momentum change for a particle at `position`
    pub fn push(&self, position: Vec3) -> Vec3 {
        let delta = position - self.center;
        let dist = delta.length();
        if dist == 0.0 {
            return Vec3::ZERO;
        }
        let mut out = Vec3::ZERO;
        if self.strength != 0.0 {
            out -= delta / dist * (dist - self.radius) * self.strength;
        }
        if self.axis != Vec3::ZERO {
            out += self.axis.cross(delta);
        }
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TouchKind {
    Plane,
    Wall,
}

/// Everything the stepper needs about the particle's current stage
pub(crate) struct StepStage<'s> {
    pub def: &'s StageDef,
    pub runtime: &'s StageRuntime,
}

/// Radius used against planes and line openings
pub fn hard_radius(stage: &StageRuntime) -> f32 {
    if stage.is_plane_flat() {
        FLAT_HARD_RADIUS
    } else {
        stage.radius / 2.0
    }
}

/// Reset or randomise the angles as the stage flags ask
pub(crate) fn apply_stage_angles(
    particle: &mut Particle,
    flags: StageFlags,
    rng: &mut crate::rng::SimRng,
) {
    if flags.contains(StageFlags::ZERO_YAW) {
        particle.yaw = 0.0;
    }
    if flags.contains(StageFlags::ZERO_PITCH) {
        particle.pitch = 0.0;
    }
    if flags.contains(StageFlags::RANDOM_YAW) {
        particle.yaw = rng.rand_float() * 360.0;
    }
    if flags.contains(StageFlags::RANDOM_PITCH) {
        particle.pitch = rng.rand_float() * 360.0;
    }
}

/// Move one live particle through a single tic
pub(crate) fn step_particle(
    particle: &mut Particle,
    index: usize,
    stage: StepStage<'_>,
    sphere: Option<&SphereForce>,
    world: &mut World<'_>,
    play_sounds: bool,
) {
    spin(particle, index, stage.def);
    apply_forces(particle, &stage, sphere, world);

    let radius = hard_radius(stage.runtime);
    if !move_z(particle, &stage, radius, world, play_sounds) {
        return;
    }
    move_xy(particle, &stage, radius, world, play_sounds);
}

fn spin(particle: &mut Particle, index: usize, def: &StageDef) {
    let tics = TICS_PER_SECOND as f32;
    particle.yaw += YAW_SIGNS[index % 4] * def.spin[0] / tics;
    particle.pitch += PITCH_SIGNS[index % 4] * def.spin[1] / tics;
    particle.yaw *= 1.0 - def.spin_resistance[0];
    particle.pitch *= 1.0 - def.spin_resistance[1];
}

fn apply_forces(
    particle: &mut Particle,
    stage: &StepStage<'_>,
    sphere: Option<&SphereForce>,
    world: &World<'_>,
) {
    // Attached particles ride the plane
    if particle.attached.is_none() {
        particle.momentum.z -= world.gravity * stage.runtime.gravity;
    }
    particle.momentum += stage.def.vector_force;

    if stage.runtime.flags.contains(StageFlags::SPHERE_FORCE) {
        if let Some(sphere) = sphere {
            let position = particle
                .position
                .truncate()
                .extend(particle.resolved_z(world.map));
            particle.momentum += sphere.push(position);
        }
    }

    particle.momentum *= stage.runtime.resistance;
}

/// Handle a collision; returns `false` if the particle died
fn touch(
    particle: &mut Particle,
    stage: &StepStage<'_>,
    kind: TouchKind,
    world: &mut World<'_>,
    play_sounds: bool,
) -> bool {
    if play_sounds {
        world.play_sound(stage.def.hit_sound, particle.position);
    }
    let flags = stage.runtime.flags;
    if flags.contains(StageFlags::DIE_TOUCH) {
        particle.kill();
        return false;
    }
    if flags.contains(StageFlags::STAGE_TOUCH)
        || (kind == TouchKind::Wall && flags.contains(StageFlags::STAGE_WALL_TOUCH))
        || (kind == TouchKind::Plane && flags.contains(StageFlags::STAGE_FLAT_TOUCH))
    {
        particle.tics = 0;
    }
    true
}

/// Vertical move against the sector planes; returns `false` if the particle died
fn move_z(
    particle: &mut Particle,
    stage: &StepStage<'_>,
    radius: f32,
    world: &mut World<'_>,
    play_sounds: bool,
) -> bool {
    if particle.attached.is_some() {
        return true;
    }
    let mut z = particle.position.z + particle.momentum.z;
    let Some(sector) = particle.sector.and_then(|s| world.map.sector(s)) else {
        particle.position.z = z;
        return true;
    };

    let mut bounced = None;
    if z > sector.ceiling - radius {
        if sector.ceiling_sky {
            trace!("particle hit a sky ceiling at z {z}");
            particle.kill();
            return false;
        }
        if !touch(particle, stage, TouchKind::Plane, world, play_sounds) {
            return false;
        }
        z = sector.ceiling - radius;
        bounced = Some(PlaneSurface::Ceiling);
    }
    if z < sector.floor + radius {
        if sector.floor_sky {
            trace!("particle hit a sky floor at z {z}");
            particle.kill();
            return false;
        }
        if !touch(particle, stage, TouchKind::Plane, world, play_sounds) {
            return false;
        }
        z = sector.floor + radius;
        bounced = Some(PlaneSurface::Floor);
    }

    if let Some(surface) = bounced {
        particle.momentum.z = -particle.momentum.z * stage.runtime.bounce;
        if particle.momentum.z.abs() < STICK_SPEED && stage.runtime.is_plane_flat() {
            particle.attached = Some(surface);
            particle.momentum.z = 0.0;
        }
    }
    particle.position.z = z;
    true
}

fn move_xy(
    particle: &mut Particle,
    stage: &StepStage<'_>,
    radius: f32,
    world: &mut World<'_>,
    play_sounds: bool,
) {
    let velocity = particle.momentum.truncate();
    if velocity == Vec2::ZERO {
        if resting_in_gap(particle, world) {
            trace!("particle came to rest inside a line opening");
            particle.kill();
        }
        return;
    }

    particle.contact = None;
    let from = particle.position.truncate();
    let to = from + velocity;
    let z = particle.resolved_z(world.map);
    let hit = LineQuery::new(world.map, from, to, z, radius, stage.runtime.radius).run();

    match hit {
        LineHit::Clear { crossed } => {
            particle.position.x = to.x;
            particle.position.y = to.y;
            if crossed {
                if let Some(sector) = world.sector_at(to) {
                    particle.sector = Some(sector);
                }
            }
        }
        LineHit::Blocked { line, info } => {
            if !touch(particle, stage, TouchKind::Wall, world, play_sounds) {
                return;
            }
            let bounced = if stage.runtime.is_wall_flat() {
                Vec2::ZERO
            } else {
                reflect(velocity, info.normal()) * stage.runtime.bounce
            };
            particle.momentum.x = bounced.x;
            particle.momentum.y = bounced.y;
            particle.contact = Some(line);
        }
    }
}

fn resting_in_gap(particle: &Particle, world: &World<'_>) -> bool {
    if particle.momentum.z.abs() >= GAP_REST_SPEED {
        return false;
    }
    let Some(info) = particle.contact.and_then(|l| world.map.line(l)) else {
        return false;
    };
    let (Some(front), Some(back)) = (info.front, info.back) else {
        return false;
    };
    let (Some(front), Some(back)) = (world.map.sector(front), world.map.sector(back)) else {
        return false;
    };
    let floor = front.floor.max(back.floor);
    let ceiling = front.ceiling.min(back.ceiling);
    let z = particle.resolved_z(world.map);
    z > floor && z < ceiling
}
