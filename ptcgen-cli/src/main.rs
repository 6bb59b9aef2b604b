//! Main entry point for the ptcgen CLI

mod cli;
mod commands;
mod scene;
mod utils;

use anyhow::Result;
use clap::Parser;

use crate::cli::{Cli, Commands};

fn main() -> Result<()> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    // Parse command line arguments
    let cli = Cli::parse();

    // Set verbosity
    if cli.verbose > 0 {
        log::set_max_level(match cli.verbose {
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        });
    } else if cli.quiet {
        log::set_max_level(log::LevelFilter::Error);
    }

    // Execute command
    match cli.command {
        Commands::Run {
            scene,
            tics,
            seed,
            every,
        } => commands::run::execute(&scene, tics, seed, every),
        Commands::Validate { scene } => commands::validate::execute(&scene),
        Commands::Info { scene } => commands::info::execute(&scene),
    }
}
