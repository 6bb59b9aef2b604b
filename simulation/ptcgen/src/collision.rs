//! Line collision query for particle movement

use std::collections::HashSet;

use glam::Vec2;

use crate::world::{Aabb2, LineId, LineInfo, MapGeometry};

/// Outcome of checking a movement segment against the map's lines
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LineHit {
    /// No line stops the movement
    Clear {
        /// A two-sided line was passed through, so the sector may change
        crossed: bool,
    },
    /// A line blocks the movement
    Blocked {
        /// The blocking line
        line: LineId,
        /// Its geometry at the time of the hit
        info: LineInfo,
    },
}

/// One movement query; the visited set keeps lines reported by several
/// blockmap cells from being tested twice
pub struct LineQuery<'a> {
    map: &'a dyn MapGeometry,
    from: Vec2,
    to: Vec2,
    z: f32,
    hard_radius: f32,
    bounds: Aabb2,
    visited: HashSet<LineId>,
}

/// Whether the open segments `a1-a2` and `b1-b2` properly intersect
pub fn segments_cross(a1: Vec2, a2: Vec2, b1: Vec2, b2: Vec2) -> bool {
    let da = a2 - a1;
    let db = b2 - b1;
    let s1 = da.perp_dot(b1 - a1);
    let s2 = da.perp_dot(b2 - a1);
    let s3 = db.perp_dot(a1 - b1);
    let s4 = db.perp_dot(a2 - b1);
    // A point exactly on a line counts as behind it, so a move that ends on
    // the line has crossed it and the next move away from it has not.
    (s1 > 0.0) != (s2 > 0.0) && (s3 > 0.0) != (s4 > 0.0)
}

impl<'a> LineQuery<'a> {
    /// Query for a move from `from` to `to` at height `z`
    pub fn new(
        map: &'a dyn MapGeometry,
        from: Vec2,
        to: Vec2,
        z: f32,
        hard_radius: f32,
        radius: f32,
    ) -> Self {
        Self {
            map,
            from,
            to,
            z,
            hard_radius,
            bounds: Aabb2::from_points(from, to).expanded(radius),
            visited: HashSet::new(),
        }
    }

    /// Box the query covers
    pub fn bounds(&self) -> &Aabb2 {
        &self.bounds
    }

    /// Walk the lines in the movement box and stop at the first blocking one
    pub fn run(mut self) -> LineHit {
        let map = self.map;
        let bounds = self.bounds;
        let mut visited = std::mem::take(&mut self.visited);
        let mut crossed = false;
        let mut hit = None;
        map.lines_in_box(&bounds, &mut |id| {
            if !visited.insert(id) {
                return true;
            }
            let Some(info) = map.line(id) else {
                return true;
            };
            match self.check_line(&info) {
                LineCheck::Miss => true,
                LineCheck::PassThrough => {
                    crossed = true;
                    true
                }
                LineCheck::Block => {
                    hit = Some((id, info));
                    false
                }
            }
        });
        match hit {
            Some((line, info)) => LineHit::Blocked { line, info },
            None => LineHit::Clear { crossed },
        }
    }

    fn check_line(&self, info: &LineInfo) -> LineCheck {
        if !self.bounds.overlaps(&info.bounds()) {
            return LineCheck::Miss;
        }
        if !segments_cross(self.from, self.to, info.v1, info.v2) {
            return LineCheck::Miss;
        }
        let (Some(front), Some(back)) = (info.front, info.back) else {
            return LineCheck::Block;
        };
        let (Some(front), Some(back)) = (self.map.sector(front), self.map.sector(back)) else {
            return LineCheck::Block;
        };
        let ceiling = front.ceiling.min(back.ceiling);
        let floor = front.floor.max(back.floor);
        if self.z - self.hard_radius < floor || self.z + self.hard_radius > ceiling {
            return LineCheck::Block;
        }
        LineCheck::PassThrough
    }
}

enum LineCheck {
    Miss,
    PassThrough,
    Block,
}

/// Reflect a 2D velocity about a line's normal
pub fn reflect(velocity: Vec2, normal: Vec2) -> Vec2 {
    let len_sq = normal.length_squared();
    if len_sq == 0.0 {
        return velocity;
    }
    velocity - normal * (2.0 * velocity.dot(normal) / len_sq)
}
