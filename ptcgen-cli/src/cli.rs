//! Root CLI structure for ptcgen

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "ptcgen")]
#[command(about = "Run and inspect particle generator scenes", long_about = None)]
#[command(version)]
#[command(author)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Verbosity level (can be repeated for more detail)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Simulate a scene and report the surviving generators
    Run {
        /// Path to the scene file (.yaml, .yml or .json)
        scene: PathBuf,

        /// Number of tics to simulate
        #[arg(short, long, default_value_t = 350)]
        tics: u64,

        /// Override the scene's random seed
        #[arg(long)]
        seed: Option<u64>,

        /// Print a progress line every N tics
        #[arg(long, value_name = "N")]
        every: Option<u64>,
    },

    /// Check a scene's definitions, map and events
    Validate {
        /// Path to the scene file
        scene: PathBuf,
    },

    /// Summarise a scene
    Info {
        /// Path to the scene file
        scene: PathBuf,
    },
}
