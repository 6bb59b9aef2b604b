//! Contracts the engine requires from the surrounding game
//!
//! Map storage, entity representation, sound playback and model metadata all
//! live outside this crate. The simulation only sees them through the traits
//! in this module, bundled per tick into a [`World`].

use glam::{Vec2, Vec3};

/// Index of a sector in the map
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SectorId(pub u32);

/// Index of a line in the map
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LineId(pub u32);

/// Index of a convex cell (subsector) in the map
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellId(pub u32);

/// Generational reference to an entity
///
/// A handle whose generation no longer matches the entity table resolves to
/// "not found" rather than to whatever reused the slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityHandle {
    /// Slot in the entity table
    pub index: u32,
    /// Reuse counter of that slot
    pub generation: u32,
}

/// Which plane of a sector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum PlaneSurface {
    /// The floor plane
    Floor,
    /// The ceiling plane
    Ceiling,
}

/// Axis-aligned 2D bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb2 {
    /// Minimum corner
    pub min: Vec2,
    /// Maximum corner
    pub max: Vec2,
}

impl Aabb2 {
    /// Box spanning two arbitrary points
    pub fn from_points(a: Vec2, b: Vec2) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    /// Smallest box containing every point, or `None` for an empty input
    pub fn enclosing(points: impl IntoIterator<Item = Vec2>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        Some(iter.fold(Self::from_points(first, first), |b, p| Self {
            min: b.min.min(p),
            max: b.max.max(p),
        }))
    }

    /// Grow the box by `amount` on every side
    pub fn expanded(&self, amount: f32) -> Self {
        Self {
            min: self.min - Vec2::splat(amount),
            max: self.max + Vec2::splat(amount),
        }
    }

    /// Whether the two boxes touch or overlap
    pub fn overlaps(&self, other: &Self) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
    }

    /// Whether the point lies inside or on the edge of the box
    pub fn contains(&self, point: Vec2) -> bool {
        point.x >= self.min.x
            && point.x <= self.max.x
            && point.y >= self.min.y
            && point.y <= self.max.y
    }

    /// Width times height
    pub fn area(&self) -> f32 {
        let size = self.max - self.min;
        size.x * size.y
    }
}

/// Snapshot of a sector's planes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SectorInfo {
    /// Floor height
    pub floor: f32,
    /// Ceiling height
    pub ceiling: f32,
    /// Floor is sky-masked
    pub floor_sky: bool,
    /// Ceiling is sky-masked
    pub ceiling_sky: bool,
    /// Bounding box of the sector's lines
    pub bounds: Aabb2,
}

impl SectorInfo {
    /// Height of the given plane
    pub fn plane_height(&self, surface: PlaneSurface) -> f32 {
        match surface {
            PlaneSurface::Floor => self.floor,
            PlaneSurface::Ceiling => self.ceiling,
        }
    }
}

/// Snapshot of a line
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineInfo {
    /// Start vertex
    pub v1: Vec2,
    /// End vertex
    pub v2: Vec2,
    /// Sector on the right-hand side, walking from `v1` to `v2`
    pub front: Option<SectorId>,
    /// Sector on the left-hand side, absent for one-sided lines
    pub back: Option<SectorId>,
}

impl LineInfo {
    /// `v2 - v1`
    pub fn direction(&self) -> Vec2 {
        self.v2 - self.v1
    }

    /// Unnormalised normal pointing to the front side
    pub fn normal(&self) -> Vec2 {
        let d = self.direction();
        Vec2::new(d.y, -d.x)
    }

    /// Bounding box of the segment
    pub fn bounds(&self) -> Aabb2 {
        Aabb2::from_points(self.v1, self.v2)
    }

    /// Signed side of a point: positive in front, negative behind
    pub fn side_of(&self, point: Vec2) -> f32 {
        (point - self.v1).dot(self.normal())
    }

    /// Both sides have a sector
    pub fn is_two_sided(&self) -> bool {
        self.front.is_some() && self.back.is_some()
    }
}

/// A convex cell of the map and the sector that owns it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellInfo {
    /// Cell identity
    pub id: CellId,
    /// Owning sector
    pub sector: SectorId,
    /// Bounding box of the cell
    pub bounds: Aabb2,
}

/// Geometric queries over the static map
pub trait MapGeometry {
    /// Identifier of the loaded map, used by map-bound definitions
    fn map_id(&self) -> &str;

    /// Number of sectors; sector ids run from zero to this count
    fn sector_count(&self) -> usize;

    /// Plane heights, sky flags and bounds of a sector
    fn sector(&self, id: SectorId) -> Option<SectorInfo>;

    /// Endpoints and sides of a line
    fn line(&self, id: LineId) -> Option<LineInfo>;

    /// Visit lines that may overlap `bounds` until `visit` returns `false`
    ///
    /// A line may be reported more than once. Returns `false` if the visit
    /// was cut short.
    fn lines_in_box(&self, bounds: &Aabb2, visit: &mut dyn FnMut(LineId) -> bool) -> bool;

    /// The cell enclosing a point, if the point is inside the map
    fn cell_at(&self, point: Vec2) -> Option<CellInfo>;

    /// Material name of a sector plane, for plane-triggered definitions
    fn plane_material(&self, _sector: SectorId, _surface: PlaneSurface) -> Option<&str> {
        None
    }
}

bitflags::bitflags! {
    /// Flags carried by client-predicted entity proxies
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ProxyFlags: u32 {
        /// The proxy's position cannot be predicted
        const UNPREDICTABLE = 0x0001;
        /// The proxy is currently hidden
        const HIDDEN = 0x0002;
    }
}

/// What the engine needs to know about an entity
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntityState {
    /// Handle of the entity
    pub handle: EntityHandle,
    /// Entity type number
    pub type_id: u32,
    /// World position of the entity's feet
    pub origin: Vec3,
    /// Facing angle in radians
    pub yaw: f32,
    /// Current velocity per tic
    pub momentum: Vec3,
    /// Height of the entity
    pub height: f32,
    /// Proxy flags; always empty for real entities
    pub proxy_flags: ProxyFlags,
}

/// Access to the live entities of the world
pub trait EntityWorld {
    /// Resolve a handle; stale handles yield `None`
    fn entity(&self, handle: EntityHandle) -> Option<EntityState>;

    /// Visit every live entity until `visit` returns `false`
    fn for_each_entity(&self, visit: &mut dyn FnMut(&EntityState) -> bool) -> bool;

    /// Visit client-predicted proxies until `visit` returns `false`
    fn for_each_proxy(&self, _visit: &mut dyn FnMut(&EntityState) -> bool) -> bool {
        true
    }
}

/// Spatial one-shot sound playback
pub trait SoundSink {
    /// Play sound `id` at `origin` with `volume` in `[0, 1]`
    fn play(&mut self, id: u32, origin: Vec3, volume: f32);
}

/// A sound sink that discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct Silence;

impl SoundSink for Silence {
    fn play(&mut self, _id: u32, _origin: Vec3, _volume: f32) {}
}

/// Particle offsets of a model sub-part for the current and next frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelOffset {
    /// Offset in the current animation frame
    pub current: Vec3,
    /// Offset in the next animation frame
    pub next: Vec3,
    /// Interpolation position between the two, in `[0, 1]`
    pub inter: f32,
}

impl ModelOffset {
    /// Linear blend of the two frame offsets
    pub fn interpolated(&self) -> Vec3 {
        self.current.lerp(self.next, self.inter.clamp(0.0, 1.0))
    }
}

/// Render-model metadata lookups
pub trait ModelMetadata {
    /// Whether the entity is drawn with a 3D model
    fn has_model(&self, entity: EntityHandle) -> bool;

    /// Offsets of a numbered sub-part in the entity's current frames
    fn particle_offset(&self, entity: EntityHandle, sub_part: usize) -> Option<ModelOffset>;
}

/// Everything a tick needs from outside the engine
pub struct World<'a> {
    /// Static map geometry
    pub map: &'a dyn MapGeometry,
    /// Live entities
    pub entities: &'a dyn EntityWorld,
    /// Sound output
    pub sound: &'a mut dyn SoundSink,
    /// Optional model metadata
    pub models: Option<&'a dyn ModelMetadata>,
    /// World gravity, in map units per tic squared
    pub gravity: f32,
}

impl World<'_> {
    /// Sector enclosing a 2D point
    pub fn sector_at(&self, point: Vec2) -> Option<SectorId> {
        self.map.cell_at(point).map(|cell| cell.sector)
    }

    pub(crate) fn play_sound(&mut self, sound: Option<crate::definition::SoundRef>, origin: Vec3) {
        if let Some(sound) = sound {
            if sound.id != 0 && sound.volume > 0.0 {
                self.sound.play(sound.id, origin, sound.volume.min(1.0));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aabb_overlap_and_area() {
        let a = Aabb2::from_points(Vec2::new(10.0, 0.0), Vec2::new(0.0, 10.0));
        assert_eq!(a.min, Vec2::ZERO);
        assert_eq!(a.area(), 100.0);
        let b = Aabb2::from_points(Vec2::new(10.0, 10.0), Vec2::new(20.0, 20.0));
        assert!(a.overlaps(&b));
        let c = Aabb2::from_points(Vec2::new(10.5, 10.5), Vec2::new(20.0, 20.0));
        assert!(!a.overlaps(&c));
        assert!(a.expanded(1.0).overlaps(&c));
    }

    #[test]
    fn test_line_sides() {
        let line = LineInfo {
            v1: Vec2::new(0.0, 0.0),
            v2: Vec2::new(0.0, 10.0),
            front: Some(SectorId(0)),
            back: None,
        };
        // Walking north, the front is to the east.
        assert!(line.normal().x > 0.0);
        assert!(line.side_of(Vec2::new(5.0, 5.0)) > 0.0);
        assert!(line.side_of(Vec2::new(-5.0, 5.0)) < 0.0);
        assert!(!line.is_two_sided());
    }

    #[test]
    fn test_model_offset_interpolation() {
        let offset = ModelOffset {
            current: Vec3::ZERO,
            next: Vec3::new(10.0, 0.0, 4.0),
            inter: 0.5,
        };
        assert_eq!(offset.interpolated(), Vec3::new(5.0, 0.0, 2.0));
    }
}
