//! The `isle` binary: load config, apply CLI overrides, run one session.

use clap::Parser;
use tracing::{error, info};

use isle_config::{CliArgs, Config, default_config_dir};

fn main() {
    let args = CliArgs::parse();
    let config_dir = args.config.clone().unwrap_or_else(default_config_dir);

    let mut config = match Config::load_or_create(&config_dir) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config: {e}");
            std::process::exit(1);
        }
    };
    config.apply_cli_overrides(&args);

    isle_log::init_logging(
        Some(&config_dir.join("logs")),
        cfg!(debug_assertions),
        Some(&config),
    );

    let seed = config.session.resolve_seed();
    info!(seed, config = %config_dir.display(), "starting session");

    match isle_app::run(&config, seed) {
        Ok(summary) => {
            info!(
                seed = summary.seed,
                props = summary.props,
                trees = summary.trees,
                mobs = summary.mobs,
                groups = summary.groups,
                nav_triangles = summary.nav_triangles,
                skipped = summary.skipped_steps.len(),
                "done"
            );
        }
        Err(e) => {
            error!("{e}");
            std::process::exit(1);
        }
    }
}
