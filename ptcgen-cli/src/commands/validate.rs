//! Check a scene without running it

use std::path::Path;

use anyhow::{Result, bail};
use console::style;

use crate::scene::Scene;

pub fn execute(path: &Path) -> Result<()> {
    let scene = Scene::load(path)?;
    let problems = scene.problems();

    println!("\n{}", style("Scene Validation").bold().underlined());
    println!("Scene: {}", style(path.display()).cyan());
    println!("Definitions: {}", scene.definitions.len());
    println!("Sectors: {}", scene.map.sectors.len());
    println!("Events: {}", scene.events.len());

    if problems.is_empty() {
        println!("\n{} Scene is valid", style("✓").green());
        return Ok(());
    }

    println!("\n{}", style("Problems").bold().red());
    for problem in &problems {
        println!("  {} {}", style("✗").red(), problem);
    }
    bail!("{} problem(s) found in {}", problems.len(), path.display())
}
