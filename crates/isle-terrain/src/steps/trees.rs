//! Terrain tree layer: terrain-relative tree records, no scene instances.

use glam::Vec3;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::scatter::{Metric, MinDistanceSet};
use super::{StepContext, StepReport, invalid};
use crate::collab::{PrefabId, TerrainSurface};
use crate::error::StepError;
use crate::layout::TreeInstance;
use crate::seed::{TREES_SALT, step_rng, uniform};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeScatterer {
    pub priority: i32,
    /// Tree prototypes, chosen uniformly.
    pub prototypes: Vec<PrefabId>,
    pub tree_count: usize,
    pub tries_multiplier: usize,
    pub min_height01: f32,
    pub max_height01: f32,
    pub max_slope01: f32,
    /// Planar spacing in meters; 0 places trees independently.
    pub min_distance: f32,
    pub width_scale_min: f32,
    pub width_scale_max: f32,
    pub height_scale_min: f32,
    pub height_scale_max: f32,
}

impl Default for TreeScatterer {
    fn default() -> Self {
        Self {
            priority: 300,
            prototypes: (200..204).map(PrefabId).collect(),
            tree_count: 4000,
            tries_multiplier: 3,
            min_height01: 0.05,
            max_height01: 0.75,
            max_slope01: 0.40,
            min_distance: 0.0,
            width_scale_min: 0.9,
            width_scale_max: 1.2,
            height_scale_min: 0.9,
            height_scale_max: 1.3,
        }
    }
}

impl TreeScatterer {
    pub fn validate(&self) -> Result<(), StepError> {
        if self.max_height01 < self.min_height01 {
            return Err(invalid("tree height range inverted"));
        }
        if self.width_scale_max < self.width_scale_min
            || self.height_scale_max < self.height_scale_min
        {
            return Err(invalid("tree scale range inverted"));
        }
        Ok(())
    }

    pub fn apply(&self, ctx: &mut StepContext<'_, '_>, seed: u64) -> Result<StepReport, StepError> {
        ctx.layout.trees.clear();
        if self.prototypes.is_empty() {
            warn!("tree scatter has no prototypes");
            return Ok(StepReport::default());
        }

        let mut rng = step_rng(seed, TREES_SALT);
        let terrain = &*ctx.terrain;
        let tries = self.tree_count * self.tries_multiplier.max(1);
        let mut spacing = MinDistanceSet::new(self.min_distance, Metric::Planar, self.tree_count);
        let mut trees = Vec::with_capacity(self.tree_count);

        for _ in 0..tries {
            if trees.len() >= self.tree_count {
                break;
            }
            let u: f32 = rng.random();
            let v: f32 = rng.random();

            let h01 = terrain.sample_height01(u, v);
            if h01 < self.min_height01 || h01 > self.max_height01 {
                continue;
            }
            if terrain.slope01(u, v) > self.max_slope01 {
                continue;
            }
            if !spacing.try_insert(terrain.surface_point(u, v)) {
                continue;
            }

            let prototype = self.prototypes[rng.random_range(0..self.prototypes.len())];
            trees.push(TreeInstance {
                prototype,
                position01: Vec3::new(u, h01, v),
                width_scale: uniform(&mut rng, self.width_scale_min, self.width_scale_max),
                height_scale: uniform(&mut rng, self.height_scale_min, self.height_scale_max),
            });
        }

        let report = StepReport::new(self.tree_count, trees.len());
        if report.is_partial() {
            warn!(placed = trees.len(), target = self.tree_count, "tree placement exhausted its tries");
        }
        info!(placed = trees.len(), prototypes = self.prototypes.len(), "trees scattered");
        ctx.layout.trees = trees;
        Ok(report)
    }
}
