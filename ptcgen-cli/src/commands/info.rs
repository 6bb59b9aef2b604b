//! Summarise a scene

use std::path::Path;

use anyhow::{Context, Result};
use console::style;
use ptcgen::sandbox::SandboxMap;

use crate::scene::Scene;
use crate::utils::definition_table;

pub fn execute(path: &Path) -> Result<()> {
    let scene = Scene::load(path)?;
    let map = SandboxMap::build(&scene.map)
        .with_context(|| format!("Invalid map in {}", path.display()))?;

    println!("\n{}", style("Scene Information").bold().underlined());
    println!("Scene: {}", style(path.display()).cyan());
    println!("Map: {}", style(&scene.map.id).yellow());
    println!("Sectors: {}", style(scene.map.sectors.len()).green());
    println!("Cells: {}", style(map.cell_count()).green());
    println!("Lines: {}", style(map.line_count()).green());
    println!("Entities: {}", style(scene.entities.len()).green());
    println!("Events: {}", style(scene.events.len()).green());
    println!("Seed: {}", scene.config.seed);
    println!("Pool capacity: {}", scene.config.max_generators);

    println!("\n{}", style("Definitions").bold());
    if scene.definitions.is_empty() {
        println!("  (none)");
        return Ok(());
    }
    definition_table(&scene.definitions).printstd();
    Ok(())
}
