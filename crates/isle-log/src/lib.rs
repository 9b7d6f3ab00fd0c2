//! Structured logging for the island generator.
//!
//! Console output with uptime stamps and module targets, plus a JSON log file
//! in debug builds for post-mortem analysis of a run. The filter comes from
//! `RUST_LOG` when set, otherwise from the config's `debug.log_level`.

use std::fs::File;
use std::path::Path;

use isle_config::Config;
use tracing::Subscriber;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Name of the JSON log written into the log directory.
pub const LOG_FILE_NAME: &str = "isle.log";

const DEFAULT_FILTER: &str = "info";

/// Filter string for `config`, falling back to `info`.
pub fn filter_string(config: Option<&Config>) -> String {
    match config {
        Some(c) if !c.debug.log_level.trim().is_empty() => c.debug.log_level.clone(),
        _ => DEFAULT_FILTER.to_string(),
    }
}

pub fn default_env_filter() -> EnvFilter {
    EnvFilter::new(DEFAULT_FILTER)
}

/// JSON lines layer writing to `file`.
pub fn json_file_layer<S>(file: File) -> impl Layer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fmt::layer()
        .with_writer(file)
        .with_ansi(false)
        .with_target(true)
        .with_timer(fmt::time::uptime())
        .json()
}

/// Install the global subscriber.
///
/// The file layer is added only when `debug_build` is set, the config allows
/// it and `log_dir` can be created. Returns `false` if a global subscriber was
/// already installed.
pub fn init_logging(log_dir: Option<&Path>, debug_build: bool, config: Option<&Config>) -> bool {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_string(config)));

    let console_layer = fmt::layer()
        .with_target(true)
        .with_thread_names(true)
        .with_level(true)
        .with_timer(fmt::time::uptime());

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer);

    let to_file = config.is_none_or(|c| c.debug.log_to_file);
    if debug_build
        && to_file
        && let Some(log_dir) = log_dir
        && std::fs::create_dir_all(log_dir).is_ok()
        && let Ok(log_file) = File::create(log_dir.join(LOG_FILE_NAME))
    {
        return subscriber.with(json_file_layer(log_file)).try_init().is_ok();
    }

    subscriber.try_init().is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_from_config() {
        let mut config = Config::default();
        config.debug.log_level = "warn,isle_streaming=debug".to_string();
        assert_eq!(filter_string(Some(&config)), "warn,isle_streaming=debug");
        let filter = EnvFilter::new(filter_string(Some(&config)));
        assert!(format!("{filter}").contains("isle_streaming=debug"));
    }

    #[test]
    fn test_blank_level_falls_back() {
        let mut config = Config::default();
        config.debug.log_level = "  ".to_string();
        assert_eq!(filter_string(Some(&config)), "info");
        assert_eq!(filter_string(None), "info");
        assert!(format!("{}", default_env_filter()).contains("info"));
    }

    #[test]
    fn test_env_filter_parsing() {
        for filter_str in ["info", "debug,isle_terrain=trace", "warn,isle_streaming=debug", "error"] {
            assert!(EnvFilter::try_from(filter_str).is_ok(), "failed to parse filter: {filter_str}");
        }
    }

    #[test]
    fn test_json_file_layer_writes_structured_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(LOG_FILE_NAME);
        let file = File::create(&path).unwrap();

        let subscriber = tracing_subscriber::registry().with(json_file_layer(file));
        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(chunk_x = 3, built = 2, "streaming tick");
        });

        let contents = std::fs::read_to_string(&path).unwrap();
        let line = contents.lines().next().expect("one log line");
        let value: serde_json::Value = serde_json::from_str(line).unwrap();
        assert_eq!(value["level"], "INFO");
        assert_eq!(value["fields"]["message"], "streaming tick");
        assert_eq!(value["fields"]["chunk_x"], 3);
        assert_eq!(value["fields"]["built"], 2);
    }
}
