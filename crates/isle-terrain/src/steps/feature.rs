//! Low-probability landmark stamps (rock hills and mesa cliffs) and the
//! feature mask that later painters read.

use glam::Vec2;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{StepContext, StepReport, invalid};
use crate::error::StepError;
use crate::heightfield::cell_to_unit;
use crate::math::{powf, smoothstep};
use crate::seed::{FEATURE_SALT, step_rng, uniform};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum StampKind {
    /// Smooth raised dome.
    RockHill,
    /// One-sided step: raised on the side facing a random direction.
    #[default]
    MesaCliff,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureStamper {
    pub priority: i32,
    pub kind: StampKind,
    /// Number of stamp attempts. Default: 6.
    pub feature_count: u32,
    /// Probability that an attempt produces a stamp. Default: 0.35.
    pub spawn_chance: f32,
    /// Stamp radius range in meters.
    pub radius_min: f32,
    pub radius_max: f32,
    /// Normalized height added at a RockHill center.
    pub add_height01: f32,
    /// Normalized height of a MesaCliff step.
    pub cliff_step01: f32,
    /// Falloff exponent; larger values give steeper stamp edges.
    pub edge_sharpness: f32,
}

impl Default for FeatureStamper {
    fn default() -> Self {
        Self {
            priority: 120,
            kind: StampKind::MesaCliff,
            feature_count: 6,
            spawn_chance: 0.35,
            radius_min: 60.0,
            radius_max: 180.0,
            add_height01: 0.12,
            cliff_step01: 0.18,
            edge_sharpness: 3.5,
        }
    }
}

impl FeatureStamper {
    pub fn validate(&self) -> Result<(), StepError> {
        if self.radius_min <= 0.0 || self.radius_max < self.radius_min {
            return Err(invalid(format!(
                "feature radius range [{}, {}] is invalid",
                self.radius_min, self.radius_max
            )));
        }
        if self.edge_sharpness <= 0.0 {
            return Err(invalid("edge_sharpness must be positive"));
        }
        Ok(())
    }

    pub fn apply(&self, ctx: &mut StepContext<'_, '_>, seed: u64) -> Result<StepReport, StepError> {
        let mut rng = step_rng(seed, FEATURE_SALT);
        let terrain = &mut *ctx.terrain;
        let res = terrain.heightfield.resolution();
        let size = terrain.heightfield.size();
        let max = (res - 1) as f32;

        terrain.feature_mask.fill(0.0);
        let mut accepted = 0usize;

        for _ in 0..self.feature_count {
            if rng.random::<f32>() > self.spawn_chance {
                continue;
            }

            let u0: f32 = rng.random();
            let v0: f32 = rng.random();
            let radius = uniform(&mut rng, self.radius_min, self.radius_max);
            let ru = (radius / size.x).max(1e-6);
            let rv = (radius / size.z).max(1e-6);

            let dir = match self.kind {
                StampKind::RockHill => Vec2::X,
                StampKind::MesaCliff => {
                    let angle = uniform(&mut rng, 0.0, core::f32::consts::TAU);
                    Vec2::new(libm::cosf(angle), libm::sinf(angle))
                }
            };

            let x_min = ((u0 - ru) * max).floor().clamp(0.0, max) as usize;
            let x_max = ((u0 + ru) * max).ceil().clamp(0.0, max) as usize;
            let y_min = ((v0 - rv) * max).floor().clamp(0.0, max) as usize;
            let y_max = ((v0 + rv) * max).ceil().clamp(0.0, max) as usize;

            for y in y_min..=y_max {
                for x in x_min..=x_max {
                    let p = Vec2::new(cell_to_unit(x, res) - u0, cell_to_unit(y, res) - v0);
                    let d = Vec2::new(p.x / ru, p.y / rv).length();
                    if d > 1.0 {
                        continue;
                    }

                    let mut w = powf(1.0 - d, self.edge_sharpness);
                    let lift = match self.kind {
                        StampKind::RockHill => self.add_height01,
                        StampKind::MesaCliff => {
                            w *= smoothstep(-0.15, 0.15, p.normalize_or_zero().dot(dir));
                            self.cliff_step01
                        }
                    };

                    let h = terrain.heightfield.height01(x, y).unwrap_or(0.0);
                    terrain.heightfield.set_height01(x, y, h + w * lift);
                    let m = terrain.feature_mask.get(x, y).unwrap_or(0.0);
                    terrain.feature_mask.set(x, y, m.max(w));
                }
            }

            debug!(u = u0, v = v0, radius, kind = ?self.kind, "feature stamped");
            accepted += 1;
        }

        info!(
            accepted,
            attempts = self.feature_count,
            mask_checksum = terrain.feature_mask_checksum(),
            "features stamped"
        );
        Ok(StepReport::new(self.feature_count as usize, accepted))
    }
}
