//! Scene files: everything needed to run the engine from the command line

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use glam::Vec3;
use log::{debug, warn};
use ptcgen::sandbox::{EntitySpec, EntityTable, MapDef, SandboxMap};
use ptcgen::{
    DefinitionSet, EntityHandle, GeneratorDef, ParticleConfig, ParticleSystem, PlaneSurface,
    SectorId, SoundSink, World,
};
use serde::Deserialize;

/// An entity placed in the scene
#[derive(Debug, Clone, Deserialize)]
pub struct SceneEntity {
    /// Position, type and motion
    #[serde(flatten)]
    pub spec: EntitySpec,
    /// State entered when the map begins
    #[serde(default)]
    pub state: Option<String>,
}

/// Something the driver does at a given tic
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum SceneAction {
    /// Spawn a definition at a fixed point
    Spawn { definition: String, at: Vec3 },
    /// Spawn a definition on a sector plane
    Plane {
        definition: String,
        sector: u32,
        surface: PlaneSurface,
    },
    /// An entity enters a state
    State { entity: usize, state: String },
    /// An entity takes damage
    Damage {
        target: usize,
        #[serde(default)]
        inflictor: Option<usize>,
        amount: u32,
    },
    /// An entity is removed from the world
    Remove { entity: usize },
}

/// A timed action
#[derive(Debug, Clone, Deserialize)]
pub struct SceneEvent {
    /// Tic before which the action runs
    pub tic: u64,
    /// What happens
    #[serde(flatten)]
    pub action: SceneAction,
}

/// A complete scene
#[derive(Debug, Clone, Deserialize)]
pub struct Scene {
    #[serde(default)]
    pub config: ParticleConfig,
    #[serde(default)]
    pub gravity: f32,
    #[serde(default)]
    pub definitions: Vec<GeneratorDef>,
    pub map: MapDef,
    #[serde(default)]
    pub entities: Vec<SceneEntity>,
    #[serde(default)]
    pub events: Vec<SceneEvent>,
}

impl Scene {
    /// Load a scene from YAML or JSON, chosen by extension
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read scene: {}", path.display()))?;
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        let scene = match extension.as_deref() {
            Some("yaml" | "yml") => serde_yaml_ng::from_str(&text)
                .with_context(|| format!("Failed to parse YAML scene: {}", path.display()))?,
            Some("json") => serde_json::from_str(&text)
                .with_context(|| format!("Failed to parse JSON scene: {}", path.display()))?,
            _ => bail!(
                "Unsupported scene format: {} (expected .yaml, .yml or .json)",
                path.display()
            ),
        };
        debug!("Loaded scene {}", path.display());
        Ok(scene)
    }

    /// Every problem that would stop the scene from running
    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if let Err(e) = self.config.validate() {
            problems.push(e.to_string());
        }
        for def in &self.definitions {
            if let Err(e) = def.validate() {
                problems.push(e.to_string());
            }
        }
        for (index, def) in self.definitions.iter().enumerate() {
            if self.definitions[..index].iter().any(|d| d.name == def.name) {
                problems.push(format!("Duplicate definition name '{}'", def.name));
            }
        }
        let sectors = match SandboxMap::build(&self.map) {
            Ok(_) => Some(self.map.sectors.len()),
            Err(e) => {
                problems.push(e.to_string());
                None
            }
        };

        let known = |name: &str| self.definitions.iter().any(|d| d.name == name);
        let entity_ok = |index: usize| index < self.entities.len();
        for event in &self.events {
            let problem = match &event.action {
                SceneAction::Spawn { definition, .. } if !known(definition.as_str()) => {
                    Some(format!("unknown definition '{definition}'"))
                }
                SceneAction::Plane {
                    definition, sector, ..
                } => {
                    if !known(definition.as_str()) {
                        Some(format!("unknown definition '{definition}'"))
                    } else if sectors.is_some_and(|count| *sector as usize >= count) {
                        Some(format!("unknown sector {sector}"))
                    } else {
                        None
                    }
                }
                SceneAction::State { entity, .. } | SceneAction::Remove { entity }
                    if !entity_ok(*entity) =>
                {
                    Some(format!("unknown entity {entity}"))
                }
                SceneAction::Damage {
                    target, inflictor, ..
                } if !entity_ok(*target) || inflictor.is_some_and(|i| !entity_ok(i)) => {
                    Some("damage event refers to an unknown entity".to_string())
                }
                _ => None,
            };
            if let Some(problem) = problem {
                problems.push(format!("Event at tic {}: {}", event.tic, problem));
            }
        }
        problems
    }
}

/// Sound sink that only counts plays per sound id
#[derive(Debug, Clone, Default)]
pub struct SoundTally {
    counts: BTreeMap<u32, usize>,
}

impl SoundTally {
    /// Plays of every sound id, in id order
    pub fn counts(&self) -> &BTreeMap<u32, usize> {
        &self.counts
    }

    /// Plays of all sounds
    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }
}

impl SoundSink for SoundTally {
    fn play(&mut self, id: u32, _origin: Vec3, _volume: f32) {
        *self.counts.entry(id).or_default() += 1;
    }
}

/// The world a scene runs in
pub struct Stage {
    pub map: SandboxMap,
    pub entities: EntityTable,
    pub handles: Vec<EntityHandle>,
    pub sound: SoundTally,
    pub gravity: f32,
}

impl Stage {
    pub fn world(&mut self) -> World<'_> {
        World {
            map: &self.map,
            entities: &self.entities,
            sound: &mut self.sound,
            models: None,
            gravity: self.gravity,
        }
    }

    fn handle(&self, index: usize) -> Option<EntityHandle> {
        self.handles.get(index).copied()
    }
}

/// A scene ready to tick
pub struct Session {
    pub stage: Stage,
    pub system: ParticleSystem,
    events: Vec<SceneEvent>,
    tic: u64,
}

impl Session {
    /// Build the map, entities and engine, then begin the map
    pub fn start(scene: Scene) -> Result<Self> {
        let map = SandboxMap::build(&scene.map).context("Invalid scene map")?;
        let defs = DefinitionSet::new(scene.definitions).context("Invalid scene definitions")?;
        let mut system = ParticleSystem::new(scene.config, defs).context("Invalid scene config")?;

        let mut entities = EntityTable::new();
        let handles: Vec<EntityHandle> = scene
            .entities
            .iter()
            .map(|e| entities.spawn(&e.spec))
            .collect();
        let mut stage = Stage {
            map,
            entities,
            handles,
            sound: SoundTally::default(),
            gravity: scene.gravity,
        };

        system.begin_map(&mut stage.world());
        for (index, entity) in scene.entities.iter().enumerate() {
            let (Some(state), Some(handle)) = (&entity.state, stage.handle(index)) else {
                continue;
            };
            system.on_entity_state(handle, state, &mut stage.world());
        }

        let mut events = scene.events;
        events.sort_by_key(|e| e.tic);
        Ok(Self {
            stage,
            system,
            events,
            tic: 0,
        })
    }

    /// Tics simulated so far
    pub fn tic(&self) -> u64 {
        self.tic
    }

    /// Run the events due now, tick the engine, then move the entities
    pub fn step(&mut self) {
        let due: Vec<SceneAction> = self
            .events
            .iter()
            .filter(|e| e.tic == self.tic)
            .map(|e| e.action.clone())
            .collect();
        for action in &due {
            self.apply(action);
        }
        self.system.tick(&mut self.stage.world());
        self.stage.entities.advance();
        self.tic += 1;
    }

    fn apply(&mut self, action: &SceneAction) {
        let stage = &mut self.stage;
        let spawned = match action {
            SceneAction::Spawn { definition, at } => {
                self.system.spawn_untriggered(definition, *at, &mut stage.world())
            }
            SceneAction::Plane {
                definition,
                sector,
                surface,
            } => self.system.spawn_for_plane(
                definition,
                SectorId(*sector),
                *surface,
                &mut stage.world(),
            ),
            SceneAction::State { entity, state } => match stage.handle(*entity) {
                Some(handle) => self
                    .system
                    .on_entity_state(handle, state, &mut stage.world()),
                None => None,
            },
            SceneAction::Damage {
                target,
                inflictor,
                amount,
            } => match stage.handle(*target) {
                Some(handle) => {
                    let inflictor = inflictor.and_then(|i| stage.handle(i));
                    self.system
                        .on_entity_damaged(handle, inflictor, *amount, &mut stage.world())
                }
                None => None,
            },
            SceneAction::Remove { entity } => {
                if let Some(handle) = stage.handle(*entity) {
                    stage.entities.remove(handle);
                }
                return;
            }
        };
        if spawned.is_none() {
            warn!("Tic {}: {:?} spawned no generator", self.tic, action);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHIME_SCENE: &str = r#"
map:
  id: CHIME
  sectors:
    - cells:
        - [[0, 0], [128, 0], [128, 128], [0, 128]]
definitions:
  - name: chime
    particles: 64
    spawn_rate: 1
    stages:
      - tics: 100
        sound:
          id: 5
          volume: 1
events:
  - tic: 0
    action: spawn
    definition: chime
    at: [64, 64, 64]
"#;

    #[test]
    fn test_sound_tally_counts_per_id() {
        let mut tally = SoundTally::default();
        tally.play(3, Vec3::ZERO, 1.0);
        tally.play(3, Vec3::ONE, 0.5);
        tally.play(1, Vec3::ZERO, 1.0);
        assert_eq!(tally.total(), 3);
        assert_eq!(
            tally.counts().iter().collect::<Vec<_>>(),
            vec![(&1, &1), (&3, &2)]
        );
    }

    #[test]
    fn test_session_tallies_stage_sounds() {
        let scene: Scene = serde_yaml_ng::from_str(CHIME_SCENE).unwrap();
        let mut session = Session::start(scene).unwrap();
        for _ in 0..10 {
            session.step();
        }

        let spawned = session.system.particle_count();
        assert!(spawned > 0);
        // One stage sound per spawned particle, kept as a single counter
        assert_eq!(session.stage.sound.total(), spawned);
        assert_eq!(session.stage.sound.counts().len(), 1);
        assert_eq!(session.stage.sound.counts().get(&5), Some(&spawned));
    }
}
