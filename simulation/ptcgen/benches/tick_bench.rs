use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use glam::{Vec2, Vec3};
use ptcgen::sandbox::{EntityTable, MapDef, SandboxMap, SectorDef};
use ptcgen::{
    DefinitionSet, GeneratorDef, ParticleConfig, ParticleSystem, PlaneSurface, SectorId, Silence,
    StageDef, StageFlags, World,
};
use std::hint::black_box;

/// A row of rooms with alternating floor heights
fn corridor(rooms: usize) -> SandboxMap {
    let sectors = (0..rooms)
        .map(|i| {
            let x = i as f32 * 128.0;
            let floor = if i % 2 == 0 { 0.0 } else { 16.0 };
            SectorDef::rect(Vec2::new(x, 0.0), Vec2::new(x + 128.0, 256.0), floor, 160.0)
        })
        .collect();
    SandboxMap::build(&MapDef {
        id: "bench".to_string(),
        sectors,
        lines: Vec::new(),
    })
    .unwrap()
}

fn fountain() -> GeneratorDef {
    GeneratorDef {
        name: "fountain".to_string(),
        particles: 200,
        spawn_rate: 4.0,
        vector: Vec3::new(1.0, 0.3, 2.0),
        vector_variance: 0.6,
        speed: 6.0,
        speed_variance: 0.3,
        stages: vec![
            StageDef {
                tics: 40,
                variance: 0.2,
                gravity: 1.0,
                bounce: 0.7,
                radius: 2.0,
                ..Default::default()
            },
            StageDef {
                tics: 20,
                resistance: 0.05,
                flags: StageFlags::STAGE_TOUCH,
                ..Default::default()
            },
        ],
        ..Default::default()
    }
}

fn tick_benchmark(c: &mut Criterion) {
    let map = corridor(8);
    let entities = EntityTable::new();
    let defs = DefinitionSet::new(vec![
        fountain(),
        GeneratorDef {
            name: "steam".to_string(),
            particles: 100,
            spawn_rate: 2.0,
            vector: Vec3::Z,
            stages: vec![StageDef {
                tics: 50,
                ..Default::default()
            }],
            ..Default::default()
        },
    ])
    .unwrap();

    let mut group = c.benchmark_group("tick");
    for generators in [4usize, 16, 64] {
        group.bench_with_input(
            BenchmarkId::from_parameter(generators),
            &generators,
            |b, &generators| {
                let mut sound = Silence;
                let mut world = World {
                    map: &map,
                    entities: &entities,
                    sound: &mut sound,
                    models: None,
                    gravity: 0.5,
                };
                let mut system = ParticleSystem::new(ParticleConfig::default(), defs.clone()).unwrap();
                for i in 0..generators {
                    let x = 64.0 + (i % 8) as f32 * 128.0;
                    system.spawn_untriggered("fountain", Vec3::new(x, 128.0, 32.0), &mut world);
                }
                for sector in 0..8 {
                    system.spawn_for_plane("steam", SectorId(sector), PlaneSurface::Floor, &mut world);
                }
                // Warm up until the particle arrays are full
                for _ in 0..60 {
                    system.tick(&mut world);
                }

                b.iter(|| {
                    system.tick(black_box(&mut world));
                    black_box(system.particle_count());
                });
            },
        );
    }
    group.finish();
}

criterion_group!(benches, tick_benchmark);
criterion_main!(benches);
