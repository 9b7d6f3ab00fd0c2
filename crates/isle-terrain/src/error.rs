use thiserror::Error;

/// Configuration problems that stop a generation run before any step executes.
#[derive(Debug, Error, PartialEq)]
pub enum PipelineError {
    #[error("heightfield resolution {resolution} is invalid (need at least 2)")]
    InvalidResolution { resolution: usize },

    #[error("terrain size {size:?} must be positive on every axis")]
    InvalidSize { size: [f32; 3] },

    #[error("{grid} grid resolution {resolution} is invalid (need at least 2)")]
    InvalidWeightGrid {
        grid: &'static str,
        resolution: usize,
    },

    #[error("step '{step}' is misconfigured: {source}")]
    InvalidStep {
        step: &'static str,
        #[source]
        source: StepError,
    },
}

/// Failures local to a single step. The pipeline logs these and moves on.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StepError {
    #[error("missing resource: {0}")]
    MissingResource(&'static str),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
