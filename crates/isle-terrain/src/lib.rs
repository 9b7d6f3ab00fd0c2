//! Heightfield world generation: seeded steps run in priority order over a
//! shared terrain dataset, plus the collaborator seams they talk through.

mod collab;
mod error;
mod heightfield;
mod layout;
mod math;
mod navigation;
mod pipeline;
mod sink;

pub mod hash;
pub mod seed;
pub mod steps;

pub use collab::{
    Collaborators, Holder, InstanceHandle, InstanceSink, LayerTag, NavBuildStats,
    NavSourceFilter, Navigation, NullPresenter, Placement, PrefabId, SurfaceSample,
    TerrainPresenter, TerrainSurface, WeightedPrefab, pick_weighted,
};
pub use error::{PipelineError, StepError};
pub use heightfield::{
    DETAIL_RESOLUTION_RANGE, Grid, Heightfield, SurfaceLayer, SurfaceWeights, TerrainData,
    TerrainDesc,
};
pub use layout::{GroupRecord, Layout, PlacedInstance, TreeInstance};
pub use math::{clamp01, inverse_lerp, lerp, perlin01, slope01_from_normal, smoothstep};
pub use navigation::GridNavigation;
pub use pipeline::{Pipeline, PipelineOutput, StepOutcome, StepStatus};
pub use sink::{RecordedInstance, RecordingSink};
pub use steps::{GenerationStep, StepContext, StepReport};
