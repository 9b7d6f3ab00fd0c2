//! Triggers the navigation build once the static layout is final.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{StepContext, StepReport};
use crate::collab::NavSourceFilter;
use crate::error::StepError;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigationBake {
    pub priority: i32,
    /// Steepest walkable surface.
    pub max_slope01: f32,
    /// Obstacle props block a disk of `scale * obstacle_radius_per_scale` meters.
    pub obstacle_radius_per_scale: f32,
}

impl Default for NavigationBake {
    fn default() -> Self {
        Self {
            priority: 850,
            max_slope01: 0.5,
            obstacle_radius_per_scale: 1.0,
        }
    }
}

impl NavigationBake {
    pub fn filter(&self, ctx: &StepContext<'_, '_>) -> NavSourceFilter {
        NavSourceFilter {
            max_slope01: self.max_slope01,
            obstacles: ctx.layout.obstacles(self.obstacle_radius_per_scale),
        }
    }

    pub fn apply(&self, ctx: &mut StepContext<'_, '_>, _seed: u64) -> Result<StepReport, StepError> {
        let filter = self.filter(ctx);
        let stats = ctx.collab.navigation.build(&*ctx.terrain, &filter);

        if stats.triangles == 0 {
            warn!(obstacles = filter.obstacles.len(), "navigation build produced no triangles");
            return Ok(StepReport::new(1, 0));
        }
        info!(
            vertices = stats.vertices,
            triangles = stats.triangles,
            obstacles = filter.obstacles.len(),
            "navigation built"
        );
        Ok(StepReport::new(1, 1))
    }
}
