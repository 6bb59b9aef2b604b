//! Integration tests for triggers, map sessions and definition reloads

mod common;

use common::*;
use glam::{Vec2, Vec3};
use pretty_assertions::assert_eq;
use ptcgen::sandbox::{EntitySpec, FixedModels, MapDef, SandboxMap, SectorDef};
use ptcgen::{
    DefinitionSet, GeneratorDef, GeneratorFlags, ModelOffset, ParticleConfig, PlaneSurface,
    ProxyFlags, SectorId, StageDef, StageFlags, Trigger, TriggerDef,
};

fn torch(stage_tics: u32) -> GeneratorDef {
    GeneratorDef {
        name: "torch".to_string(),
        trigger: TriggerDef::EntityState {
            state: "TORCH_LIT".to_string(),
        },
        stages: vec![StageDef {
            tics: stage_tics,
            ..Default::default()
        }],
        ..Default::default()
    }
}

fn assert_close(a: Vec3, b: Vec3) {
    assert!(a.abs_diff_eq(b, 1e-4), "{a} != {b}");
}

#[test]
fn test_state_trigger_attaches_to_entity() {
    let mut system = system(vec![torch(100)]);
    let mut harness = Harness::room();
    let imp = harness.entities.spawn(&EntitySpec {
        type_id: 3001,
        origin: Vec3::new(64.0, 64.0, 0.0),
        ..Default::default()
    });

    assert!(system.on_entity_state(imp, "IDLE", &mut harness.world()).is_none());
    let id = system
        .on_entity_state(imp, "TORCH_LIT", &mut harness.world())
        .unwrap();
    assert_eq!(generator(&system, id).source(), Some(imp));

    harness.tick(&mut system, 3);
    assert_eq!(generator(&system, id).live_count(), 3);
    for (_, particle) in generator(&system, id).live_particles() {
        assert_eq!(particle.position, Vec3::new(64.0, 64.0, 0.5));
    }
}

#[test]
fn test_removed_source_stops_spawning() {
    let mut system = system(vec![torch(5)]);
    let mut harness = Harness::room();
    let imp = harness.entities.spawn(&EntitySpec {
        origin: Vec3::new(64.0, 64.0, 32.0),
        ..Default::default()
    });
    let id = system.spawn_for_entity("torch", imp, &mut harness.world()).unwrap();
    harness.tick(&mut system, 3);
    let before: Vec<_> = generator(&system, id).particles().slots()[..3].to_vec();

    harness.entities.remove(imp);
    harness.tick(&mut system, 1);
    let generator_after = generator(&system, id);
    assert_eq!(generator_after.source(), None);
    assert_eq!(generator_after.spawn_cursor(), 3);
    assert_eq!(generator_after.live_count(), 3);
    // Existing particles carry on as before
    for (old, new) in before.iter().zip(generator_after.particles().slots()) {
        assert_eq!(new.position, old.position);
        assert_eq!(new.tics, old.tics - 1);
    }

    // Retired once the last particle is gone
    harness.tick(&mut system, 4);
    assert_eq!(generator(&system, id).live_count(), 0);
    harness.tick(&mut system, 1);
    assert!(system.generator(id).is_none());
}

#[test]
fn test_orphan_with_closed_spawn_window_is_retired() {
    let def = GeneratorDef {
        spawn_age: Some(2),
        ..torch(100)
    };
    let mut system = system(vec![def]);
    let mut harness = Harness::room();
    let imp = harness.entities.spawn(&EntitySpec {
        origin: Vec3::new(64.0, 64.0, 32.0),
        ..Default::default()
    });
    let id = system.spawn_for_entity("torch", imp, &mut harness.world()).unwrap();

    // Still attached: the generator outlives its spawn window
    harness.tick(&mut system, 4);
    assert_eq!(generator(&system, id).live_count(), 2);

    harness.entities.remove(imp);
    harness.tick(&mut system, 1);
    assert!(system.generator(id).is_none());
}

#[test]
fn test_unknown_entity_is_declined() {
    let mut system = system(vec![torch(100)]);
    let mut harness = Harness::room();
    let imp = harness.entities.spawn(&EntitySpec::default());
    harness.entities.remove(imp);
    assert!(system.spawn_for_entity("torch", imp, &mut harness.world()).is_none());
    assert_eq!(system.generator_count(), 0);
}

#[test]
fn test_center_offset_and_relative_vector() {
    let def = GeneratorDef {
        flags: GeneratorFlags::RELATIVE_VECTOR,
        center: Vec3::new(16.0, 0.0, 8.0),
        vector: Vec3::X,
        speed: 1.0,
        spawn_age: Some(1),
        ..torch(100)
    };
    let mut system = system(vec![def]);
    let mut harness = Harness::room();
    let imp = harness.entities.spawn(&EntitySpec {
        origin: Vec3::new(100.0, 100.0, 0.0),
        angle: 90.0,
        ..Default::default()
    });
    let id = system.spawn_for_entity("torch", imp, &mut harness.world()).unwrap();
    harness.tick(&mut system, 1);

    let p = only_particle(&system, id);
    assert_close(p.momentum, Vec3::Y);
    // Spawned at (100, 116, 8) and moved one unit along +Y
    assert_close(p.position, Vec3::new(100.0, 117.0, 8.0));
}

#[test]
fn test_relative_velocity_inherits_momentum() {
    let def = GeneratorDef {
        flags: GeneratorFlags::RELATIVE_VELOCITY,
        vector: Vec3::Z,
        speed: 1.0,
        spawn_age: Some(1),
        ..torch(100)
    };
    let mut system = system(vec![def]);
    let mut harness = Harness::room();
    let imp = harness.entities.spawn(&EntitySpec {
        origin: Vec3::new(100.0, 100.0, 32.0),
        momentum: Vec3::new(2.0, 0.0, 0.0),
        ..Default::default()
    });
    let id = system.spawn_for_entity("torch", imp, &mut harness.world()).unwrap();
    harness.tick(&mut system, 1);
    assert_close(only_particle(&system, id).momentum, Vec3::new(2.0, 0.0, 1.0));
}

#[test]
fn test_damage_generator() {
    let blood = GeneratorDef {
        name: "blood".to_string(),
        trigger: TriggerDef::Damage { type_id: 3001 },
        vector: Vec3::Z,
        speed: 1.0,
        spawn_age: Some(1),
        stages: vec![StageDef {
            tics: 100,
            ..Default::default()
        }],
        ..Default::default()
    };
    let mut system = system(vec![blood]);
    let mut harness = Harness::room();
    let target = harness.entities.spawn(&EntitySpec {
        type_id: 3001,
        origin: Vec3::new(100.0, 100.0, 0.0),
        height: 56.0,
        ..Default::default()
    });
    let shooter = harness.entities.spawn(&EntitySpec {
        type_id: 1,
        origin: Vec3::new(50.0, 100.0, 0.0),
        ..Default::default()
    });

    // No definition for the shooter's type
    assert!(system
        .on_entity_damaged(shooter, Some(target), 10, &mut harness.world())
        .is_none());

    let id = system
        .on_entity_damaged(target, Some(shooter), 5, &mut harness.world())
        .unwrap();
    let g = generator(&system, id);
    assert_eq!(
        *g.trigger(),
        Trigger::Untriggered {
            center: Vec3::new(100.0, 100.0, 28.0)
        }
    );
    assert_eq!(g.vector(), Vec3::new(1.0, 0.0, 1.0));
    assert_eq!(g.spawn_rate_multiplier(), 5.0);

    harness.tick(&mut system, 1);
    let g = generator(&system, id);
    assert_eq!(g.live_count(), 5);
    let expected = Vec3::new(1.0, 0.0, 1.0).normalize();
    for (_, particle) in g.live_particles() {
        assert_close(particle.momentum, expected);
    }

    // Zero damage still spawns at the base rate
    let id = system
        .on_entity_damaged(target, None, 0, &mut harness.world())
        .unwrap();
    assert_eq!(generator(&system, id).spawn_rate_multiplier(), 1.0);
    assert_eq!(generator(&system, id).vector(), Vec3::Z);
}

fn aura() -> GeneratorDef {
    GeneratorDef {
        name: "aura".to_string(),
        trigger: TriggerDef::EntityType {
            primary: 2001,
            secondary: Some(2002),
        },
        stages: vec![StageDef {
            tics: 100,
            ..Default::default()
        }],
        ..Default::default()
    }
}

fn populate_types(harness: &mut Harness) {
    for type_id in [2001, 2001, 2002, 3000] {
        harness.entities.spawn(&EntitySpec {
            type_id,
            origin: Vec3::new(128.0, 128.0, 16.0),
            ..Default::default()
        });
    }
    let proxy = EntitySpec {
        type_id: 2001,
        origin: Vec3::new(64.0, 64.0, 16.0),
        ..Default::default()
    };
    harness.entities.add_proxy(&proxy, ProxyFlags::empty());
    harness.entities.add_proxy(&proxy, ProxyFlags::HIDDEN);
    harness
        .entities
        .add_proxy(&proxy, ProxyFlags::UNPREDICTABLE);
}

#[test]
fn test_type_generator_emits_from_matching_entities() {
    let mut system = system(vec![aura()]);
    let mut harness = Harness::room();
    populate_types(&mut harness);

    let id = system.spawn_for_type("aura", &mut harness.world()).unwrap();
    assert!(generator(&system, id).is_static());
    assert!(system.spawn_for_type("aura", &mut harness.world()).is_none());

    harness.tick(&mut system, 1);
    assert_eq!(generator(&system, id).live_count(), 3);
}

#[test]
fn test_type_generator_includes_visible_proxies() {
    let config = ParticleConfig {
        include_client_proxies: true,
        ..Default::default()
    };
    let mut system = system_with(config, vec![aura()]);
    let mut harness = Harness::room();
    populate_types(&mut harness);

    let id = system.spawn_for_type("aura", &mut harness.world()).unwrap();
    harness.tick(&mut system, 1);
    let g = generator(&system, id);
    assert_eq!(g.live_count(), 4);
    let from_proxy = g
        .live_particles()
        .filter(|(_, p)| p.position.truncate() == Vec2::new(64.0, 64.0))
        .count();
    assert_eq!(from_proxy, 1);
}

/// Same definition, with a sphere force centered 10 units east of the emitter
fn pulling(def: GeneratorDef) -> GeneratorDef {
    GeneratorDef {
        force: 0.1,
        force_origin: Vec3::new(10.0, 0.0, 0.0),
        stages: vec![StageDef {
            tics: 100,
            flags: StageFlags::SPHERE_FORCE,
            ..Default::default()
        }],
        ..def
    }
}

#[test]
fn test_sphere_force_moves_untriggered_particles() {
    let mut system = system(vec![pulling(simple_def("pull"))]);
    let mut harness = Harness::room();
    let id = system
        .spawn_untriggered("pull", Vec3::new(100.0, 100.0, 64.0), &mut harness.world())
        .unwrap();

    harness.tick(&mut system, 1);
    let p = only_particle(&system, id);
    assert_close(p.momentum, Vec3::X);
    assert_close(p.position, Vec3::new(101.0, 100.0, 64.0));
}

#[test]
fn test_sphere_force_ignores_plane_and_type_generators() {
    let mut system = system(vec![pulling(simple_def("pull")), pulling(aura())]);
    let mut harness = Harness::room();
    populate_types(&mut harness);
    let plane = system
        .spawn_for_plane("pull", SectorId(0), PlaneSurface::Floor, &mut harness.world())
        .unwrap();
    let typed = system.spawn_for_type("aura", &mut harness.world()).unwrap();

    harness.tick(&mut system, 3);
    assert_eq!(generator(&system, plane).live_count(), 3);
    assert_eq!(generator(&system, typed).live_count(), 9);
    for id in [plane, typed] {
        for (_, particle) in generator(&system, id).live_particles() {
            assert_eq!(particle.momentum, Vec3::ZERO);
        }
    }
}

#[test]
fn test_sphere_force_stops_when_source_is_lost() {
    let mut system = system(vec![pulling(torch(100))]);
    let mut harness = Harness::room();
    let imp = harness.entities.spawn(&EntitySpec {
        origin: Vec3::new(64.0, 64.0, 32.0),
        ..Default::default()
    });
    let id = system.spawn_for_entity("torch", imp, &mut harness.world()).unwrap();

    harness.tick(&mut system, 2);
    let before: Vec<Vec3> = generator(&system, id)
        .live_particles()
        .map(|(_, p)| p.momentum)
        .collect();
    assert_eq!(before.len(), 2);
    assert!(before.iter().all(|m| m.x > 0.0));

    harness.entities.remove(imp);
    harness.tick(&mut system, 3);
    let after: Vec<Vec3> = generator(&system, id)
        .live_particles()
        .map(|(_, p)| p.momentum)
        .collect();
    assert_eq!(after, before);
}

#[test]
fn test_model_only_needs_a_model() {
    let def = GeneratorDef {
        flags: GeneratorFlags::MODEL_ONLY,
        sub_model: Some(1),
        spawn_age: Some(1),
        ..torch(100)
    };
    let mut system = system(vec![def]);
    let mut harness = Harness::room();
    let plain = harness.entities.spawn(&EntitySpec {
        origin: Vec3::new(64.0, 64.0, 0.0),
        ..Default::default()
    });
    let modelled = harness.entities.spawn(&EntitySpec {
        origin: Vec3::new(128.0, 128.0, 0.0),
        ..Default::default()
    });
    let mut models = FixedModels::new();
    let still = |offset: Vec3| ModelOffset {
        current: offset,
        next: offset,
        inter: 0.0,
    };
    models.insert(
        modelled,
        vec![still(Vec3::ZERO), still(Vec3::new(0.0, 0.0, 40.0))],
    );
    harness.models = Some(models);

    let without = system.spawn_for_entity("torch", plain, &mut harness.world()).unwrap();
    let with = system
        .spawn_for_entity("torch", modelled, &mut harness.world())
        .unwrap();
    harness.tick(&mut system, 1);

    let skipped = generator(&system, without);
    assert_eq!(skipped.live_count(), 0);
    assert_eq!(skipped.spawn_cursor(), 0);
    assert_eq!(
        only_particle(&system, with).position,
        Vec3::new(128.0, 128.0, 40.0)
    );
}

#[test]
fn test_scaled_rate_plane_generator() {
    let def = GeneratorDef {
        flags: GeneratorFlags::SCALED_RATE,
        ..simple_def("drip")
    };
    let mut system = system(vec![def]);
    let mut harness = Harness::room();
    let id = system
        .spawn_for_plane("drip", SectorId(0), PlaneSurface::Ceiling, &mut harness.world())
        .unwrap();
    assert_eq!(generator(&system, id).spawn_rate_multiplier(), 4.0);

    harness.tick(&mut system, 2);
    let g = generator(&system, id);
    assert_eq!(g.live_count(), 8);
    for (_, particle) in g.live_particles() {
        assert_eq!(particle.position.z, 127.0);
    }

    // One generator per plane
    assert!(system
        .spawn_for_plane("drip", SectorId(0), PlaneSurface::Ceiling, &mut harness.world())
        .is_none());
    assert!(system
        .spawn_for_plane("drip", SectorId(0), PlaneSurface::Floor, &mut harness.world())
        .is_some());
    assert!(system
        .spawn_for_plane("drip", SectorId(7), PlaneSurface::Floor, &mut harness.world())
        .is_none());
}

fn material_map() -> SandboxMap {
    let mut lava = SectorDef::rect(Vec2::ZERO, Vec2::new(100.0, 100.0), 0.0, 128.0);
    lava.floor_material = Some("LAVA1".to_string());
    let mut hall = SectorDef::rect(Vec2::new(100.0, 0.0), Vec2::new(200.0, 100.0), 0.0, 128.0);
    hall.ceiling_material = Some("LAVA1".to_string());
    SandboxMap::build(&MapDef {
        id: "E1M1".to_string(),
        sectors: vec![lava, hall],
        lines: Vec::new(),
    })
    .unwrap()
}

fn session_defs() -> Vec<GeneratorDef> {
    vec![
        torch(100),
        aura(),
        GeneratorDef {
            name: "embers".to_string(),
            trigger: TriggerDef::Plane {
                material: "LAVA1".to_string(),
                surface: None,
            },
            ..simple_def("embers")
        },
        GeneratorDef {
            name: "fountain".to_string(),
            trigger: TriggerDef::Map {
                map: "E1M1".to_string(),
            },
            center: Vec3::new(50.0, 50.0, 64.0),
            ..simple_def("fountain")
        },
        GeneratorDef {
            name: "elsewhere".to_string(),
            trigger: TriggerDef::Map {
                map: "MAP01".to_string(),
            },
            ..simple_def("elsewhere")
        },
    ]
}

fn find(system: &ptcgen::ParticleSystem, name: &str) -> Vec<ptcgen::GeneratorId> {
    let mut found = Vec::new();
    system.iterate(|id, generator| {
        if generator.def().name == name {
            found.push(id);
        }
        true
    });
    found
}

#[test]
fn test_begin_map_spawns_map_generators() {
    let mut system = system(session_defs());
    let mut harness = Harness::new(material_map());
    system.spawn_untriggered("torch", Vec3::splat(10.0), &mut harness.world());

    system.begin_map(&mut harness.world());
    assert!(find(&system, "torch").is_empty());
    assert_eq!(find(&system, "aura").len(), 1);
    assert!(find(&system, "elsewhere").is_empty());

    let fountain = find(&system, "fountain");
    assert_eq!(fountain.len(), 1);
    let fountain = generator(&system, fountain[0]);
    assert!(fountain.is_static());
    assert_eq!(
        *fountain.trigger(),
        Trigger::Untriggered {
            center: Vec3::new(50.0, 50.0, 64.0)
        }
    );

    let mut planes: Vec<_> = find(&system, "embers")
        .into_iter()
        .map(|id| *generator(&system, id).trigger())
        .collect();
    planes.sort_by_key(|t| match t {
        Trigger::Plane { sector, .. } => sector.0,
        _ => u32::MAX,
    });
    assert_eq!(
        planes,
        vec![
            Trigger::Plane {
                sector: SectorId(0),
                surface: PlaneSurface::Floor
            },
            Trigger::Plane {
                sector: SectorId(1),
                surface: PlaneSurface::Ceiling
            },
        ]
    );
}

#[test]
fn test_reload_keeps_compatible_generators() {
    let mut system = system(session_defs());
    let mut harness = Harness::new(material_map());
    let imp = harness.entities.spawn(&EntitySpec {
        origin: Vec3::new(50.0, 50.0, 0.0),
        ..Default::default()
    });

    system.begin_map(&mut harness.world());
    let torch_id = system
        .on_entity_state(imp, "TORCH_LIT", &mut harness.world())
        .unwrap();
    let fountain_id = find(&system, "fountain")[0];
    let aura_id = find(&system, "aura")[0];
    harness.tick(&mut system, 5);
    let torch_particles = generator(&system, torch_id).live_count();

    let mut defs = session_defs();
    // Renamed but same trigger and shape: matched by trigger
    defs[0].name = "torch_v2".to_string();
    defs[0].speed = 3.0;
    // Different capacity: destroyed and respawned
    defs[1].particles = 16;
    // Embers removed entirely
    defs.remove(2);
    system.reload_definitions(DefinitionSet::new(defs).unwrap(), &mut harness.world());

    let torch = generator(&system, torch_id);
    assert_eq!(torch.def().name, "torch_v2");
    assert_eq!(torch.def().speed, 3.0);
    assert_eq!(torch.live_count(), torch_particles);

    assert!(system.generator(fountain_id).is_none());
    let fountains = find(&system, "fountain");
    assert_eq!(fountains.len(), 1);
    assert!(generator(&system, fountains[0]).is_static());

    assert!(system.generator(aura_id).is_none());
    let auras = find(&system, "aura");
    assert_eq!(auras.len(), 1);
    assert_eq!(generator(&system, auras[0]).particles().capacity(), 16);

    assert!(find(&system, "embers").is_empty());
    assert!(find(&system, "torch").is_empty());
}

#[test]
fn test_reload_is_idempotent() {
    let mut system = system(session_defs());
    let mut harness = Harness::new(material_map());
    system.begin_map(&mut harness.world());
    let before = system.generator_count();

    let defs = DefinitionSet::new(session_defs()).unwrap();
    system.reload_definitions(defs, &mut harness.world());
    assert_eq!(system.generator_count(), before);
    assert_eq!(find(&system, "aura").len(), 1);
    assert_eq!(find(&system, "embers").len(), 2);
}
