//! Configuration structs with sensible defaults and RON persistence.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use isle_streaming::SpawnerConfig;
use isle_terrain::seed::seed_from_clock;
use isle_terrain::{GenerationStep, Pipeline, TerrainDesc};

use crate::error::ConfigError;

const CONFIG_FILE: &str = "config.ron";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Terrain dimensions and grid resolutions.
    pub world: TerrainDesc,
    /// Ordered generation steps and their rules.
    pub generation: GenerationConfig,
    /// Runtime proximity spawner.
    pub streaming: SpawnerConfig,
    pub session: SessionConfig,
    pub debug: DebugConfig,
}

/// Generation steps. Order in the file does not matter; steps run by priority.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GenerationConfig {
    pub steps: Vec<GenerationStep>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            steps: GenerationStep::defaults(),
        }
    }
}

impl GenerationConfig {
    pub fn pipeline(&self) -> Pipeline {
        Pipeline::new(self.steps.clone())
    }
}

/// How a run is seeded and how long the viewpoint walks.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SessionConfig {
    pub seed: u64,
    /// Ignore `seed` and take one from the wall clock.
    pub random_seed_on_start: bool,
    /// Simulation ticks after generation; 0 generates only.
    pub ticks: u32,
    /// Simulated seconds per tick.
    pub tick_seconds: f32,
    /// Viewpoint speed in meters per second.
    pub viewpoint_speed: f32,
    /// Radius of the viewpoint's loop as a fraction of the terrain width.
    pub path_radius01: f32,
    /// Drop a scent marker at the viewpoint every this many ticks; 0 disables.
    pub scent_interval_ticks: u32,
    pub scent_intensity: f32,
    /// Seconds until a scent marker fades out.
    pub scent_lifetime: f32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            seed: 12345,
            random_seed_on_start: false,
            ticks: 600,
            tick_seconds: 1.0 / 30.0,
            viewpoint_speed: 12.0,
            path_radius01: 0.3,
            scent_interval_ticks: 30,
            scent_intensity: 1.0,
            scent_lifetime: 20.0,
        }
    }
}

impl SessionConfig {
    /// The seed this session runs with.
    pub fn resolve_seed(&self) -> u64 {
        if self.random_seed_on_start {
            seed_from_clock()
        } else {
            self.seed
        }
    }
}

/// Debug/development configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// Log filter, e.g. "info" or "warn,isle_streaming=debug".
    pub log_level: String,
    /// Write a JSON log file next to the config in debug builds.
    pub log_to_file: bool,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_to_file: true,
        }
    }
}

/// `<platform config dir>/isle`, or the working directory when the platform
/// has none.
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("isle"))
        .unwrap_or_else(|| PathBuf::from("."))
}

// --- Load / Save ---

impl Config {
    /// Load config from the given directory, or create a default config file.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join(CONFIG_FILE);

        if config_path.exists() {
            let contents =
                std::fs::read_to_string(&config_path).map_err(|source| ConfigError::Read {
                    path: config_path.clone(),
                    source,
                })?;
            let config: Config = ron::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: config_path.clone(),
                source,
            })?;
            log::info!("Loaded config from {}", config_path.display());
            Ok(config)
        } else {
            let config = Config::default();
            config.save(config_dir)?;
            log::info!("Created default config at {}", config_path.display());
            Ok(config)
        }
    }

    /// Save config to the given directory as `config.ron`.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        std::fs::create_dir_all(config_dir).map_err(|source| ConfigError::Write {
            path: config_dir.to_path_buf(),
            source,
        })?;

        let config_path = config_dir.join(CONFIG_FILE);
        let pretty = ron::ser::PrettyConfig::new()
            .depth_limit(5)
            .separate_tuple_members(true)
            .enumerate_arrays(false);

        let serialized =
            ron::ser::to_string_pretty(self, pretty).map_err(ConfigError::Serialize)?;

        std::fs::write(&config_path, serialized).map_err(|source| ConfigError::Write {
            path: config_path,
            source,
        })?;
        Ok(())
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use isle_terrain::steps::TreeScatterer;

    #[test]
    fn test_default_config_serializes() {
        let config = Config::default();
        let ron_str = ron::ser::to_string_pretty(&config, ron::ser::PrettyConfig::new()).unwrap();
        assert!(ron_str.contains("seed: 12345"));
        assert!(ron_str.contains("spawn_radius: 70.0"));
        assert!(ron_str.contains("resolution: 513"));
    }

    #[test]
    fn test_config_roundtrip() {
        let config = Config::default();
        let ron_str = ron::to_string(&config).unwrap();
        let deserialized: Config = ron::from_str(&ron_str).unwrap();
        assert_eq!(config, deserialized);
    }

    #[test]
    fn test_missing_section_uses_default() {
        let ron_str = "(world: (resolution: 129), session: (seed: 7))";
        let config: Config = ron::from_str(ron_str).unwrap();
        assert_eq!(config.world.resolution, 129);
        assert_eq!(config.world.weight_resolution, TerrainDesc::default().weight_resolution);
        assert_eq!(config.session.seed, 7);
        assert_eq!(config.session.ticks, 600);
        assert_eq!(config.streaming, SpawnerConfig::default());
        assert_eq!(config.generation, GenerationConfig::default());
    }

    #[test]
    fn test_extra_field_ignored() {
        let result: Result<Config, _> = ron::from_str("(future_setting: true)");
        assert!(result.is_ok());
    }

    #[test]
    fn test_partial_step_list() {
        let ron_str = "(generation: (steps: [Trees((tree_count: 10))]))";
        let config: Config = ron::from_str(ron_str).unwrap();
        assert_eq!(config.generation.steps.len(), 1);
        let GenerationStep::Trees(trees) = &config.generation.steps[0] else {
            panic!("expected a tree step, got {:?}", config.generation.steps[0]);
        };
        assert_eq!(trees.tree_count, 10);
        assert_eq!(trees.priority, TreeScatterer::default().priority);
    }

    #[test]
    fn test_pipeline_from_config_is_sorted() {
        let pipeline = GenerationConfig::default().pipeline();
        let priorities: Vec<i32> = pipeline.steps().iter().map(GenerationStep::priority).collect();
        let mut sorted = priorities.clone();
        sorted.sort();
        assert_eq!(priorities, sorted);
        assert_eq!(priorities.len(), 10);
    }

    #[test]
    fn test_resolve_seed() {
        let fixed = SessionConfig::default();
        assert_eq!(fixed.resolve_seed(), 12345);
        let random = SessionConfig {
            random_seed_on_start: true,
            ..Default::default()
        };
        assert!(random.resolve_seed() > 0, "clock seed is milliseconds since the epoch");
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.session.seed = 99;
        config.streaming.max_new_chunks_per_tick = 5;
        config.world.resolution = 257;

        config.save(dir.path()).unwrap();
        let loaded = Config::load_or_create(dir.path()).unwrap();
        assert_eq!(config, loaded);
    }

    #[test]
    fn test_load_or_create_writes_default() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("isle");
        let config = Config::load_or_create(&nested).unwrap();
        assert_eq!(config, Config::default());
        assert!(nested.join(CONFIG_FILE).exists());
    }

    #[test]
    fn test_invalid_ron_produces_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "{{not valid}}").unwrap();
        let err = Config::load_or_create(dir.path()).unwrap_err();
        assert!(matches!(&err, ConfigError::Parse { path, .. } if path.ends_with(CONFIG_FILE)));
        assert!(err.to_string().contains("is not a valid island config"));
    }

    #[test]
    fn test_unwritable_dir_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("taken");
        std::fs::write(&blocker, "a file, not a directory").unwrap();
        let err = Config::default().save(&blocker).unwrap_err();
        assert!(matches!(&err, ConfigError::Write { path, .. } if path == &blocker));
    }

    #[test]
    fn test_ron_comments_accepted() {
        let ron_str = "// seed for the demo island\n(\n  // nothing else\n)";
        let config: Config = ron::from_str(ron_str).unwrap();
        assert_eq!(config, Config::default());
    }
}
