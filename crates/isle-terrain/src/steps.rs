//! Generation steps: one tagged variant per behaviour, each with its own
//! priority, configuration and local RNG.

mod cave;
mod detail;
mod feature;
mod height;
mod mobs;
mod navigation;
mod props;
mod scatter;
mod surface;
mod trees;

use serde::{Deserialize, Serialize};

use crate::collab::Collaborators;
use crate::error::StepError;
use crate::heightfield::TerrainData;
use crate::layout::Layout;

pub use cave::CaveCarver;
pub use detail::{DetailPainter, DetailRule};
pub use feature::{FeatureStamper, StampKind};
pub use height::{FractalNoise, HeightFieldGenerator};
pub use mobs::{GroupPlacer, GroupRule, MobPlacer, MobRule, SpawnArea};
pub use navigation::NavigationBake;
pub use props::{FeatureBias, PropRule, PropScatterer, surface_rotation};
pub use scatter::{GRID_THRESHOLD, Metric, MinDistanceSet};
pub use surface::SurfaceWeightPainter;
pub use trees::TreeScatterer;

/// Everything a step may touch while it runs.
pub struct StepContext<'a, 'c> {
    pub terrain: &'a mut TerrainData,
    pub layout: &'a mut Layout,
    pub collab: &'a mut Collaborators<'c>,
}

/// How much of what a step asked for it actually produced.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StepReport {
    pub requested: usize,
    pub accepted: usize,
}

impl StepReport {
    pub fn new(requested: usize, accepted: usize) -> Self {
        Self {
            requested,
            accepted,
        }
    }

    /// Fewer results than requested; the step still completed.
    pub fn is_partial(&self) -> bool {
        self.accepted < self.requested
    }
}

impl std::ops::AddAssign for StepReport {
    fn add_assign(&mut self, rhs: Self) {
        self.requested += rhs.requested;
        self.accepted += rhs.accepted;
    }
}

/// A single pipeline step.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum GenerationStep {
    Height(HeightFieldGenerator),
    Feature(FeatureStamper),
    Cave(CaveCarver),
    Surface(SurfaceWeightPainter),
    Props(PropScatterer),
    Trees(TreeScatterer),
    Detail(DetailPainter),
    NavigationBake(NavigationBake),
    Mobs(MobPlacer),
    Groups(GroupPlacer),
}

impl GenerationStep {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Height(_) => "height",
            Self::Feature(_) => "feature",
            Self::Cave(_) => "cave",
            Self::Surface(_) => "surface",
            Self::Props(_) => "props",
            Self::Trees(_) => "trees",
            Self::Detail(_) => "detail",
            Self::NavigationBake(_) => "navigation_bake",
            Self::Mobs(_) => "mobs",
            Self::Groups(_) => "groups",
        }
    }

    /// Lower runs first.
    pub fn priority(&self) -> i32 {
        match self {
            Self::Height(s) => s.priority,
            Self::Feature(s) => s.priority,
            Self::Cave(s) => s.priority,
            Self::Surface(s) => s.priority,
            Self::Props(s) => s.priority,
            Self::Trees(s) => s.priority,
            Self::Detail(s) => s.priority,
            Self::NavigationBake(s) => s.priority,
            Self::Mobs(s) => s.priority,
            Self::Groups(s) => s.priority,
        }
    }

    /// Reject configurations that can never run.
    pub fn validate(&self) -> Result<(), StepError> {
        match self {
            Self::Height(s) => s.validate(),
            Self::Feature(s) => s.validate(),
            Self::Cave(s) => s.validate(),
            Self::Surface(_) => Ok(()),
            Self::Props(s) => s.validate(),
            Self::Trees(s) => s.validate(),
            Self::Detail(s) => s.validate(),
            Self::NavigationBake(_) => Ok(()),
            Self::Mobs(s) => s.validate(),
            Self::Groups(s) => s.validate(),
        }
    }

    pub fn apply(&self, ctx: &mut StepContext<'_, '_>, seed: u64) -> Result<StepReport, StepError> {
        match self {
            Self::Height(s) => s.apply(ctx, seed),
            Self::Feature(s) => s.apply(ctx, seed),
            Self::Cave(s) => s.apply(ctx, seed),
            Self::Surface(s) => s.apply(ctx, seed),
            Self::Props(s) => s.apply(ctx, seed),
            Self::Trees(s) => s.apply(ctx, seed),
            Self::Detail(s) => s.apply(ctx, seed),
            Self::NavigationBake(s) => s.apply(ctx, seed),
            Self::Mobs(s) => s.apply(ctx, seed),
            Self::Groups(s) => s.apply(ctx, seed),
        }
    }

    /// The full default step list, one of each.
    pub fn defaults() -> Vec<Self> {
        vec![
            Self::Height(HeightFieldGenerator::default()),
            Self::Feature(FeatureStamper::default()),
            Self::Cave(CaveCarver::default()),
            Self::Surface(SurfaceWeightPainter::default()),
            Self::Props(PropScatterer::default()),
            Self::Trees(TreeScatterer::default()),
            Self::Detail(DetailPainter::default()),
            Self::NavigationBake(NavigationBake::default()),
            Self::Mobs(MobPlacer::default()),
            Self::Groups(GroupPlacer::default()),
        ]
    }
}

pub(crate) fn invalid(msg: impl Into<String>) -> StepError {
    StepError::InvalidConfig(msg.into())
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Small terrains and collaborators for step tests.

    use glam::Vec3;

    use crate::collab::{Collaborators, NullPresenter};
    use crate::heightfield::{TerrainData, TerrainDesc};
    use crate::layout::Layout;
    use crate::navigation::GridNavigation;
    use crate::sink::RecordingSink;

    use super::StepContext;

    pub fn desc(resolution: usize) -> TerrainDesc {
        TerrainDesc {
            resolution,
            size: [200.0, 100.0, 200.0],
            origin: [0.0, 0.0, 0.0],
            weight_resolution: 32,
            hole_resolution: 32,
            detail_resolution: 32,
        }
    }

    /// Flat terrain at normalized height `h`.
    pub fn flat(resolution: usize, h: f32) -> TerrainData {
        let mut td = TerrainData::new(&desc(resolution)).expect("valid desc");
        for y in 0..resolution {
            for x in 0..resolution {
                td.heightfield.set_height01(x, y, h);
            }
        }
        td
    }

    /// Terrain rising linearly along +x from 0 to `top`.
    pub fn ramp(resolution: usize, top: f32) -> TerrainData {
        let mut td = TerrainData::new(&desc(resolution)).expect("valid desc");
        for y in 0..resolution {
            for x in 0..resolution {
                td.heightfield
                    .set_height01(x, y, top * x as f32 / (resolution - 1) as f32);
            }
        }
        td
    }

    pub struct Harness {
        pub nav: GridNavigation,
        pub sink: RecordingSink,
        pub presenter: NullPresenter,
        pub layout: Layout,
    }

    impl Harness {
        pub fn new() -> Self {
            Self {
                nav: GridNavigation::new(32),
                sink: RecordingSink::new(),
                presenter: NullPresenter,
                layout: Layout::default(),
            }
        }

        /// Run `f` with a context over `terrain` and this harness's collaborators.
        pub fn with<R>(
            &mut self,
            terrain: &mut TerrainData,
            f: impl FnOnce(&mut StepContext<'_, '_>) -> R,
        ) -> R {
            let mut collab = Collaborators {
                navigation: &mut self.nav,
                instances: &mut self.sink,
                presenter: &mut self.presenter,
            };
            let mut ctx = StepContext {
                terrain,
                layout: &mut self.layout,
                collab: &mut collab,
            };
            f(&mut ctx)
        }
    }

    pub fn within(terrain: &TerrainData, p: Vec3) -> bool {
        let o = terrain.heightfield.origin();
        let s = terrain.heightfield.size();
        p.x >= o.x - 1e-3 && p.x <= o.x + s.x + 1e-3 && p.z >= o.z - 1e-3 && p.z <= o.z + s.z + 1e-3
    }
}
