//! Session configuration for the island generator.
//!
//! Settings persist to disk as `config.ron`. Every section is
//! `#[serde(default)]`, so files written by older builds keep loading and
//! missing fields fall back to defaults. CLI flags override the file.

mod cli;
mod config;
mod error;

pub use cli::CliArgs;
pub use config::{Config, DebugConfig, GenerationConfig, SessionConfig, default_config_dir};
pub use error::ConfigError;
