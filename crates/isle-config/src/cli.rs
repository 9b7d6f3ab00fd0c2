//! Command-line argument parsing.

use std::path::PathBuf;

use clap::Parser;

use crate::Config;

/// Generate an island and stream content around a walking viewpoint.
///
/// CLI values override settings loaded from `config.ron`.
#[derive(Parser, Debug, Default)]
#[command(name = "isle", about = "Procedural island generator")]
pub struct CliArgs {
    /// World seed. Also turns off a random seed requested by the config file.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Seed from the wall clock, overriding any fixed seed.
    #[arg(long)]
    pub random_seed: bool,

    /// Simulation ticks to run after generation.
    #[arg(long)]
    pub ticks: Option<u32>,

    /// Heightfield samples per side.
    #[arg(long)]
    pub resolution: Option<usize>,

    /// Log level (error, warn, info, debug, trace) or a full filter string.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(seed) = args.seed {
            self.session.seed = seed;
            self.session.random_seed_on_start = false;
        }
        if args.random_seed {
            self.session.random_seed_on_start = true;
        }
        if let Some(ticks) = args.ticks {
            self.session.ticks = ticks;
        }
        if let Some(resolution) = args.resolution {
            self.world.resolution = resolution;
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
    }
}
