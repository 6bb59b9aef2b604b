//! Simulate a scene

use std::path::Path;

use anyhow::Result;
use console::style;
use log::info;
use ptcgen::TICS_PER_SECOND;

use crate::scene::{Scene, Session};
use crate::utils::generator_table;

pub fn execute(path: &Path, tics: u64, seed: Option<u64>, every: Option<u64>) -> Result<()> {
    let mut scene = Scene::load(path)?;
    if let Some(seed) = seed {
        scene.config.seed = seed;
    }
    let mut session = Session::start(scene)?;
    info!(
        "Running {} for {} tics ({:.1}s)",
        path.display(),
        tics,
        tics as f64 / f64::from(TICS_PER_SECOND)
    );

    for _ in 0..tics {
        session.step();
        if every.is_some_and(|n| n > 0 && session.tic() % n == 0) {
            println!(
                "tic {:>6}: {} generators, {} particles",
                session.tic(),
                session.system.generator_count(),
                session.system.particle_count()
            );
        }
    }

    println!("\n{}", style("Simulation Results").bold().underlined());
    println!("Scene: {}", style(path.display()).cyan());
    println!("Tics: {}", style(session.tic()).yellow());

    let table = generator_table(&session.system);
    if table.is_empty() {
        println!("\nNo generators alive");
    } else {
        println!();
        table.printstd();
    }

    println!(
        "\nGenerators: {}",
        style(session.system.generator_count()).green()
    );
    println!("Particles: {}", style(session.system.particle_count()).green());
    println!(
        "Sounds played: {}",
        style(session.stage.sound.total()).green()
    );
    for (id, count) in session.stage.sound.counts() {
        println!("  sound {id}: {count}");
    }
    Ok(())
}
