//! Detail density maps (grass clumps, pebbles): one integer grid per rule.

use noise::Perlin;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{StepContext, StepReport, invalid};
use crate::collab::{PrefabId, TerrainSurface};
use crate::error::StepError;
use crate::hash::{cell_hash01, fold_seed};
use crate::heightfield::{Grid, TerrainData, cell_to_unit};
use crate::math::{clamp01, inverse_lerp, perlin01, powf};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetailRule {
    pub prefab: PrefabId,
    pub min_height01: f32,
    pub max_height01: f32,
    pub max_slope01: f32,
    /// Density written at a full-strength cell.
    pub max_density: u32,
    /// Fraction of the noise range that produces any detail.
    pub coverage: f32,
    /// Per-cell probability gate, independent of the clump noise.
    pub spawn_chance: f32,
    pub noise_scale: f32,
    pub clump_sharpness: f32,
    /// Low-frequency jitter of the sample position, breaks up clump edges.
    pub edge_warp: f32,
    pub avoid_feature_mask: bool,
    pub feature_mask_threshold: f32,
    pub feature_mask_block: f32,
}

impl Default for DetailRule {
    fn default() -> Self {
        Self {
            prefab: PrefabId(300),
            min_height01: 0.0,
            max_height01: 1.0,
            max_slope01: 0.85,
            max_density: 40,
            coverage: 0.95,
            spawn_chance: 1.0,
            noise_scale: 6.0,
            clump_sharpness: 0.8,
            edge_warp: 0.25,
            avoid_feature_mask: false,
            feature_mask_threshold: 0.35,
            feature_mask_block: 1.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetailPainter {
    pub priority: i32,
    /// Override the terrain's detail resolution before painting.
    pub force_resolution: Option<usize>,
    pub rules: Vec<DetailRule>,
}

impl Default for DetailPainter {
    fn default() -> Self {
        Self {
            priority: 390,
            force_resolution: None,
            rules: vec![DetailRule::default()],
        }
    }
}

/// Per-rule noise domain offsets, derived from the seed by hashing.
struct RuleOffsets {
    ox: f32,
    oy: f32,
    wx: f32,
    wy: f32,
}

impl RuleOffsets {
    fn new(seed: u32, layer: u32) -> Self {
        let key = layer.wrapping_mul(92_821);
        let off = |k: u32| cell_hash01(seed, key.wrapping_add(k)) * 1000.0;
        Self {
            ox: off(11),
            oy: off(97),
            wx: off(201),
            wy: off(301),
        }
    }
}

impl DetailPainter {
    pub fn validate(&self) -> Result<(), StepError> {
        for (i, r) in self.rules.iter().enumerate() {
            if r.max_height01 < r.min_height01 {
                return Err(invalid(format!("detail rule {i}: height range inverted")));
            }
        }
        Ok(())
    }

    pub fn apply(&self, ctx: &mut StepContext<'_, '_>, seed: u64) -> Result<StepReport, StepError> {
        let terrain = &mut *ctx.terrain;
        if let Some(res) = self.force_resolution {
            terrain.set_detail_resolution(res);
        }

        let res = terrain.detail_resolution();
        let seed32 = fold_seed(seed);
        let perlin = Perlin::new(seed32);

        let mut maps = Vec::with_capacity(self.rules.len());
        let mut nonzero = 0usize;
        for (layer, rule) in self.rules.iter().enumerate() {
            let map = self.paint_rule(terrain, &perlin, seed32, layer as u32, rule, res);
            let cells = map.iter().filter(|&&d| d > 0).count();
            debug!(layer, prefab = rule.prefab.0, cells, "detail layer painted");
            nonzero += cells;
            maps.push(map);
        }
        terrain.details = maps;

        info!(
            layers = self.rules.len(),
            resolution = res,
            nonzero,
            "detail density painted"
        );
        Ok(StepReport::new(self.rules.len(), self.rules.len()))
    }

    fn paint_rule(
        &self,
        terrain: &TerrainData,
        perlin: &Perlin,
        seed: u32,
        layer: u32,
        rule: &DetailRule,
        res: usize,
    ) -> Grid<u32> {
        let mut map = Grid::new(res, res);
        let o = RuleOffsets::new(seed, layer);
        let ns = rule.noise_scale.max(0.01);
        let sharp = rule.clump_sharpness.max(0.01);
        let cov_thr = 1.0 - clamp01(rule.coverage);
        let gate_salt = seed ^ layer.wrapping_mul(2_654_435_761);

        for y in 0..res {
            for x in 0..res {
                let mut u = cell_to_unit(x, res);
                let mut v = cell_to_unit(y, res);

                if rule.edge_warp > 0.0 {
                    let wf = ns * 0.35;
                    let w1 = perlin01(perlin, u * wf + o.wx, v * wf + o.wy) - 0.5;
                    let w2 = perlin01(perlin, u * wf + o.wy, v * wf + o.wx) - 0.5;
                    let amp = rule.edge_warp * 0.02;
                    u = clamp01(u + w1 * amp);
                    v = clamp01(v + w2 * amp);
                }

                let h = terrain.sample_height01(u, v);
                if h < rule.min_height01 || h > rule.max_height01 {
                    continue;
                }
                if terrain.slope01(u, v) > rule.max_slope01 {
                    continue;
                }
                if rule.avoid_feature_mask {
                    let fm = terrain.sample_feature_mask(u, v);
                    if fm * rule.feature_mask_block.max(0.0) > rule.feature_mask_threshold {
                        continue;
                    }
                }

                let n = perlin01(perlin, u * ns + o.ox, v * ns + o.oy);
                let mut m = powf(inverse_lerp(cov_thr, 1.0, n), sharp);

                if rule.spawn_chance < 1.0 {
                    let cell = (x as u32).wrapping_add((y as u32).wrapping_mul(1_315_423_911));
                    if cell_hash01(cell, gate_salt) > rule.spawn_chance {
                        m = 0.0;
                    }
                }

                map.set(x, y, (m * rule.max_density as f32).round() as u32);
            }
        }
        map
    }
}
