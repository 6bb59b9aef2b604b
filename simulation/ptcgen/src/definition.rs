//! Author-supplied generator templates
//!
//! A [`GeneratorDef`] is immutable once it is part of a [`DefinitionSet`];
//! generators hold it through an `Arc` and never modify it. Field meanings
//! follow the tic-based simulation: rates are per tic, durations in tics,
//! velocities in map units per tic.

use std::sync::Arc;

use glam::Vec3;
use log::warn;

use crate::error::{PtcError, Result};
use crate::world::PlaneSurface;

bitflags::bitflags! {
    /// Generator-wide behaviour flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct GeneratorFlags: u32 {
        /// Never evicted to make room for a new generator
        const STATIC = 0x0001;
        /// Spawns at a fixed center without any trigger
        const UNTRIGGERED = 0x0002;
        /// Emit vector is rotated by the source's facing
        const RELATIVE_VECTOR = 0x0004;
        /// Particles inherit the source's momentum
        const RELATIVE_VELOCITY = 0x0008;
        /// Plane generators scale their rate by the sector area
        const SCALED_RATE = 0x0010;
        /// Only spawn from sources drawn with a 3D model
        const MODEL_ONLY = 0x0020;
        /// Plane particles spawn anywhere between floor and ceiling
        const SPACE_SPAWN = 0x0040;
        /// Plane particles spawn on the floor
        const FLOOR_SPAWN = 0x0080;
        /// Plane particles spawn below the ceiling
        const CEILING_SPAWN = 0x0100;
    }
}

bitflags::bitflags! {
    /// Per-stage behaviour flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct StageFlags: u32 {
        /// Any collision ends the stage
        const STAGE_TOUCH = 0x0001;
        /// A line collision ends the stage
        const STAGE_WALL_TOUCH = 0x0002;
        /// A plane collision ends the stage
        const STAGE_FLAT_TOUCH = 0x0004;
        /// Any collision kills the particle
        const DIE_TOUCH = 0x0008;
        /// Flat particles lie against the plane they hit
        const PLANE_FLAT = 0x0010;
        /// Flat particles stop and lie against the wall they hit
        const WALL_FLAT = 0x0020;
        /// Apply the generator's sphere force
        const SPHERE_FORCE = 0x0040;
        /// Reset yaw when the stage begins
        const ZERO_YAW = 0x0080;
        /// Reset pitch when the stage begins
        const ZERO_PITCH = 0x0100;
        /// Randomise yaw when the stage begins
        const RANDOM_YAW = 0x0200;
        /// Randomise pitch when the stage begins
        const RANDOM_PITCH = 0x0400;
    }
}

/// How a stage is drawn; `None` terminates the particle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ParticleKind {
    /// Not drawn; reaching this stage kills the particle
    None,
    /// A single point
    #[default]
    Point,
    /// A line along the momentum
    Line,
    /// A textured quad, by texture number
    Texture(u8),
    /// A 3D model, by model number
    Model(u8),
}

impl ParticleKind {
    /// Whether this kind can be drawn flat against a surface
    pub fn is_flat_capable(self) -> bool {
        matches!(self, Self::Texture(_))
    }
}

/// A sound reference with volume
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SoundRef {
    /// Sound id; zero means no sound
    pub id: u32,
    /// Volume in `[0, 1]`
    pub volume: f32,
}

/// One phase of a particle's life
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct StageDef {
    /// How the stage is drawn
    pub kind: ParticleKind,
    /// Duration in tics
    pub tics: u32,
    /// Random reduction of the duration, in `[0, 1]`
    pub variance: f32,
    /// Behaviour flags
    pub flags: StageFlags,
    /// Fraction of momentum lost per tic, in `[0, 1]`
    pub resistance: f32,
    /// Fraction of momentum kept after a collision
    pub bounce: f32,
    /// Collision radius
    pub radius: f32,
    /// Multiplier of world gravity
    pub gravity: f32,
    /// Yaw and pitch spin, degrees per second
    pub spin: [f32; 2],
    /// Fraction of yaw and pitch lost per tic
    pub spin_resistance: [f32; 2],
    /// Constant force added every tic
    pub vector_force: Vec3,
    /// Played when a particle enters the stage
    pub sound: Option<SoundRef>,
    /// Played when a particle collides during the stage
    pub hit_sound: Option<SoundRef>,
}

impl Default for StageDef {
    fn default() -> Self {
        Self {
            kind: ParticleKind::Point,
            tics: 35,
            variance: 0.0,
            flags: StageFlags::empty(),
            resistance: 0.0,
            bounce: 1.0,
            radius: 1.0,
            gravity: 0.0,
            spin: [0.0; 2],
            spin_resistance: [0.0; 2],
            vector_force: Vec3::ZERO,
            sound: None,
            hit_sound: None,
        }
    }
}

/// What causes a generator to exist and where it emits from
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", rename_all = "snake_case"))]
pub enum TriggerDef {
    /// Only spawned through the explicit API
    #[default]
    None,
    /// Attached to an entity when it enters the named state
    EntityState {
        /// State name reported by the driver
        state: String,
    },
    /// Emits from every live entity of the given type(s)
    EntityType {
        /// Primary type number
        primary: u32,
        /// Optional second type number
        secondary: Option<u32>,
    },
    /// Emits from every live entity regardless of type
    AnyEntityType,
    /// Spawned when an entity of this type takes damage
    Damage {
        /// Type number of the damaged entity
        type_id: u32,
    },
    /// Emits from every sector plane using this material
    Plane {
        /// Material name of the plane
        material: String,
        /// Restrict to one surface; `None` matches both
        surface: Option<PlaneSurface>,
    },
    /// Untriggered generator created when the named map begins
    Map {
        /// Map identifier
        map: String,
    },
}

impl TriggerDef {
    /// Whether an entity type number satisfies a type trigger
    pub fn matches_type(&self, type_id: u32) -> bool {
        match self {
            Self::EntityType { primary, secondary } => {
                *primary == type_id || *secondary == Some(type_id)
            }
            Self::AnyEntityType => true,
            _ => false,
        }
    }

    /// Whether this is a type trigger
    pub fn is_type_trigger(&self) -> bool {
        matches!(self, Self::EntityType { .. } | Self::AnyEntityType)
    }
}

/// A complete generator template
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct GeneratorDef {
    /// Unique name
    pub name: String,
    /// Trigger descriptor
    pub trigger: TriggerDef,
    /// Generator flags
    pub flags: GeneratorFlags,
    /// Particle capacity
    pub particles: usize,
    /// New particles per tic
    pub spawn_rate: f32,
    /// Random reduction of the rate, in `[0, 1]`
    pub spawn_rate_variance: f32,
    /// Stop spawning after this many tics; `None` spawns forever
    pub spawn_age: Option<u32>,
    /// Destroy after this many tics; `None` lives forever
    pub max_age: Option<u32>,
    /// Tics simulated immediately at creation
    pub pre_sim: u32,
    /// Alternative first stage
    pub alt_start: usize,
    /// Probability of starting at `alt_start`
    pub alt_start_variance: f32,
    /// Source-relative offset, or world position for untriggered generators
    pub center: Vec3,
    /// Emit direction
    pub vector: Vec3,
    /// Per-particle random variance of the emit vector
    pub vector_variance: f32,
    /// Random offset applied once to the vector at creation
    pub init_vector_variance: f32,
    /// Launch speed
    pub speed: f32,
    /// Random reduction of the speed, in `[0, 1]`
    pub speed_variance: f32,
    /// Outer spawn radius around the source
    pub spawn_radius: f32,
    /// Inner spawn radius; zero selects the cubic distribution
    pub spawn_radius_min: f32,
    /// Radial sphere-force strength
    pub force: f32,
    /// Sphere radius the radial force pulls particles onto
    pub force_radius: f32,
    /// Rotation axis of the sphere force
    pub force_axis: Vec3,
    /// Offset of the force center from the source or center
    pub force_origin: Vec3,
    /// Model sub-part whose offset positions new particles
    pub sub_model: Option<usize>,
    /// Stages, in order
    pub stages: Vec<StageDef>,
}

impl Default for GeneratorDef {
    fn default() -> Self {
        Self {
            name: String::new(),
            trigger: TriggerDef::None,
            flags: GeneratorFlags::empty(),
            particles: 64,
            spawn_rate: 1.0,
            spawn_rate_variance: 0.0,
            spawn_age: None,
            max_age: None,
            pre_sim: 0,
            alt_start: 0,
            alt_start_variance: 0.0,
            center: Vec3::ZERO,
            vector: Vec3::ZERO,
            vector_variance: 0.0,
            init_vector_variance: 0.0,
            speed: 1.0,
            speed_variance: 0.0,
            spawn_radius: 0.0,
            spawn_radius_min: 0.0,
            force: 0.0,
            force_radius: 0.0,
            force_axis: Vec3::ZERO,
            force_origin: Vec3::ZERO,
            sub_model: None,
            stages: Vec::new(),
        }
    }
}

fn unit_range(value: f32) -> bool {
    (0.0..=1.0).contains(&value)
}

impl GeneratorDef {
    /// Number of stages
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Check the definition for values the simulation cannot honour
    pub fn validate(&self) -> Result<()> {
        let name = self.name.as_str();
        if name.is_empty() {
            return Err(PtcError::definition(name, "name is empty"));
        }
        if self.stages.is_empty() {
            return Err(PtcError::definition(name, "no stages"));
        }
        if self.particles == 0 {
            return Err(PtcError::definition(name, "particle capacity is zero"));
        }
        if self.alt_start >= self.stages.len() {
            return Err(PtcError::definition(
                name,
                format!(
                    "alt_start {} out of range for {} stages",
                    self.alt_start,
                    self.stages.len()
                ),
            ));
        }
        if self.spawn_rate < 0.0 || !self.spawn_rate.is_finite() {
            return Err(PtcError::definition(name, "spawn rate must be non-negative"));
        }
        for (label, value) in [
            ("spawn_rate_variance", self.spawn_rate_variance),
            ("alt_start_variance", self.alt_start_variance),
            ("speed_variance", self.speed_variance),
        ] {
            if !unit_range(value) {
                return Err(PtcError::definition(
                    name,
                    format!("{label} {value} outside [0, 1]"),
                ));
            }
        }
        if self.spawn_radius_min < 0.0 || self.spawn_radius_min > self.spawn_radius {
            return Err(PtcError::definition(
                name,
                "spawn_radius_min must be within [0, spawn_radius]",
            ));
        }
        for (index, stage) in self.stages.iter().enumerate() {
            if !unit_range(stage.resistance) {
                return Err(PtcError::definition(
                    name,
                    format!("stage {index}: resistance {} outside [0, 1]", stage.resistance),
                ));
            }
            if !unit_range(stage.variance) {
                return Err(PtcError::definition(
                    name,
                    format!("stage {index}: variance {} outside [0, 1]", stage.variance),
                ));
            }
            if stage.radius < 0.0 || stage.bounce < 0.0 {
                return Err(PtcError::definition(
                    name,
                    format!("stage {index}: radius and bounce must be non-negative"),
                ));
            }
        }
        match &self.trigger {
            TriggerDef::EntityState { state } if state.is_empty() => {
                Err(PtcError::definition(name, "state trigger without a state"))
            }
            TriggerDef::Plane { material, .. } if material.is_empty() => {
                Err(PtcError::definition(name, "plane trigger without a material"))
            }
            TriggerDef::Map { map } if map.is_empty() => {
                Err(PtcError::definition(name, "map trigger without a map"))
            }
            _ => Ok(()),
        }
    }
}

/// The validated collection of definitions the engine spawns from
#[derive(Debug, Clone, Default)]
pub struct DefinitionSet {
    defs: Vec<Arc<GeneratorDef>>,
}

impl DefinitionSet {
    /// Validate every definition; the first failure rejects the whole set
    pub fn new(defs: Vec<GeneratorDef>) -> Result<Self> {
        let mut out: Vec<Arc<GeneratorDef>> = Vec::with_capacity(defs.len());
        for def in defs {
            def.validate()?;
            if out.iter().any(|d| d.name == def.name) {
                return Err(PtcError::definition(&def.name, "duplicate name"));
            }
            out.push(Arc::new(def));
        }
        Ok(Self { defs: out })
    }

    /// Keep the valid definitions and log the rest
    pub fn lenient(defs: Vec<GeneratorDef>) -> Self {
        let mut out: Vec<Arc<GeneratorDef>> = Vec::with_capacity(defs.len());
        for def in defs {
            if let Err(e) = def.validate() {
                warn!("Skipping generator definition: {}", e);
                continue;
            }
            if out.iter().any(|d| d.name == def.name) {
                warn!("Skipping duplicate generator definition '{}'", def.name);
                continue;
            }
            out.push(Arc::new(def));
        }
        Self { defs: out }
    }

    /// Number of definitions
    pub fn len(&self) -> usize {
        self.defs.len()
    }

    /// No definitions at all
    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    /// All definitions in authoring order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<GeneratorDef>> {
        self.defs.iter()
    }

    /// Look up a definition by name
    pub fn get(&self, name: &str) -> Option<&Arc<GeneratorDef>> {
        self.defs.iter().find(|d| d.name == name)
    }

    /// Look up a definition by name, failing on a miss
    pub fn require(&self, name: &str) -> Result<&Arc<GeneratorDef>> {
        self.get(name)
            .ok_or_else(|| PtcError::UnknownDefinition(name.to_string()))
    }

    /// First definition whose trigger equals `trigger`
    pub fn find_by_trigger(&self, trigger: &TriggerDef) -> Option<&Arc<GeneratorDef>> {
        self.defs.iter().find(|d| &d.trigger == trigger)
    }

    /// Definition spawned when an entity enters `state`
    pub fn for_state(&self, state: &str) -> Option<&Arc<GeneratorDef>> {
        self.defs
            .iter()
            .find(|d| matches!(&d.trigger, TriggerDef::EntityState { state: s } if s == state))
    }

    /// Definition spawned when an entity of `type_id` is damaged
    pub fn for_damage(&self, type_id: u32) -> Option<&Arc<GeneratorDef>> {
        self.defs
            .iter()
            .find(|d| matches!(d.trigger, TriggerDef::Damage { type_id: t } if t == type_id))
    }
}
