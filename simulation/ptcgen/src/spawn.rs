//! Placement helpers for newly spawned particles

use std::f32::consts::TAU;

use glam::{Vec2, Vec3};

use crate::definition::GeneratorFlags;
use crate::rng::SimRng;
use crate::world::{Aabb2, MapGeometry, PlaneSurface, SectorId, SectorInfo};

/// Random offset around a spawn point
///
/// With `low == 0` every axis gets an independent delta in `[-high, high]`
/// (a cube). Otherwise the offset has a length in `[low, high]` and points in
/// a direction sampled uniformly on the unit sphere.
pub fn uncertain_offset(rng: &mut SimRng, low: f32, high: f32) -> Vec3 {
    if low <= 0.0 {
        let x = high * rng.byte_delta();
        let y = high * rng.byte_delta();
        let z = high * rng.byte_delta();
        return Vec3::new(x, y, z);
    }

    let mut off = (high - low) * rng.byte_delta();
    off += if off < 0.0 { -low } else { low };

    let theta = rng.rand_float() * TAU;
    let phi = (2.0 * rng.rand_float() - 1.0).clamp(-1.0, 1.0).acos();
    let dir = Vec3::new(theta.cos() * phi.sin(), theta.sin() * phi.sin(), phi.cos());
    dir * off
}

/// Rotate the XY part of a vector by `angle` radians
pub fn rotate_xy(v: Vec3, angle: f32) -> Vec3 {
    let xy = Vec2::from_angle(angle).rotate(v.truncate());
    xy.extend(v.z)
}

/// Initial momentum of a particle before any source-relative adjustment
pub fn launch_vector(
    rng: &mut SimRng,
    vector: Vec3,
    variance: f32,
    speed: f32,
    speed_variance: f32,
) -> Vec3 {
    let jitter = Vec3::new(
        variance * rng.float_delta(),
        variance * rng.float_delta(),
        variance * rng.float_delta(),
    );
    let mov = vector + jitter;
    let speed = speed * (1.0 - speed_variance * rng.rand_float());
    let len = mov.length();
    let len = if len == 0.0 { 1.0 } else { len };
    mov * (speed / len)
}

fn point_in_box(rng: &mut SimRng, bounds: &Aabb2) -> Vec2 {
    let size = bounds.max - bounds.min;
    let x = bounds.min.x + rng.rand_float() * size.x;
    let y = bounds.min.y + rng.rand_float() * size.y;
    Vec2::new(x, y)
}

/// Find a random XY point that really lies inside `sector`
///
/// Points are drawn from the sector's bounding box and confirmed with a
/// point-in-cell lookup: `rounds` rounds of `tries` draws each. Non-convex or
/// sparse sectors may use up every attempt, in which case there is no point.
pub fn random_point_in_sector(
    map: &dyn MapGeometry,
    rng: &mut SimRng,
    sector: SectorId,
    bounds: &Aabb2,
    rounds: u32,
    tries: u32,
) -> Option<Vec2> {
    for _ in 0..rounds {
        for _ in 0..tries {
            let point = point_in_box(rng, bounds);
            if map.cell_at(point).is_some_and(|cell| cell.sector == sector) {
                return Some(point);
            }
        }
    }
    None
}

/// Spawn height for a plane particle of the given radius
pub fn plane_spawn_height(
    rng: &mut SimRng,
    flags: GeneratorFlags,
    sector: &SectorInfo,
    surface: PlaneSurface,
    radius: f32,
) -> f32 {
    if flags.contains(GeneratorFlags::SPACE_SPAWN) {
        let room = (sector.ceiling - sector.floor - 2.0 * radius).max(0.0);
        return sector.floor + radius + rng.rand_float() * room;
    }
    let on_floor = flags.contains(GeneratorFlags::FLOOR_SPAWN)
        || (!flags.intersects(GeneratorFlags::FLOOR_SPAWN | GeneratorFlags::CEILING_SPAWN)
            && surface == PlaneSurface::Floor);
    if on_floor {
        sector.floor + radius
    } else {
        sector.ceiling - radius
    }
}
