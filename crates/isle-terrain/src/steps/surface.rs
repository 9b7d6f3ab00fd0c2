//! Paints the grass / dirt / rock / snow blend weights.
//!
//! Rock follows a noise-jittered slope threshold plus the feature mask, snow
//! follows height on flat ground, and dirt comes in sparse patches whose
//! coverage varies by region. Rock and snow take priority over dirt; grass
//! fills the remainder and every cell is renormalized to sum to 1.

use noise::Perlin;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{StepContext, StepReport};
use crate::collab::TerrainSurface;
use crate::error::StepError;
use crate::heightfield::{SurfaceLayer, cell_to_unit};
use crate::math::{clamp01, inverse_lerp, lerp, perlin01, powf, smoothstep};
use crate::seed::{SURFACE_SALT, noise_offset, step_rng};

/// Patch noise frequencies are given per terrain side; this scales them so
/// normalized `(u, v)` still sweeps enough noise cells.
const FREQ_MULT: f32 = 12.0;

/// Smooth 0..1 ramp of `t` between `a` and `b`.
#[inline]
fn smooth01(a: f32, b: f32, t: f32) -> f32 {
    smoothstep(0.0, 1.0, inverse_lerp(a, b, t))
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SurfaceWeightPainter {
    pub priority: i32,
    /// Paint a fourth snow layer.
    pub snow: bool,

    pub feature_rock_boost: f32,
    /// Feature mask values below this add no rock.
    pub feature_rock_min01: f32,

    pub snow_start01: f32,
    pub snow_end01: f32,

    pub rock_slope_start01: f32,
    pub rock_slope_end01: f32,
    pub dirt_slope_start01: f32,
    pub dirt_slope_end01: f32,

    /// Slope jitter noise.
    pub noise_scale: f32,
    pub noise_strength: f32,

    pub dirt_macro_scale: f32,
    pub dirt_macro_mix: f32,
    pub dirt_patch_scale: f32,
    /// Mean fraction of the map covered by dirt patches.
    pub dirt_patch_coverage: f32,
    pub dirt_patch_strength: f32,
    pub dirt_patch_sharpness: f32,
    pub dirt_mask_boost: f32,
    pub dirt_slope_blend: f32,
    pub dirt_patch_slope_penalty: f32,
    pub dirt_patch_edge_warp: f32,

    /// Size of the dirtier / cleaner regions (smaller = larger regions).
    pub dirt_region_scale: f32,
    pub dirt_coverage_min_multiplier: f32,
    pub dirt_coverage_max_multiplier: f32,
    pub dirt_region_contrast: f32,

    pub dirt_strength_random_min: f32,
    pub dirt_strength_random_max: f32,
    pub dirt_strength_noise_scale: f32,

    /// Floor applied wherever a dirt patch was detected at all.
    pub dirt_min_visible_weight: f32,
}

impl Default for SurfaceWeightPainter {
    fn default() -> Self {
        Self {
            priority: 200,
            snow: true,
            feature_rock_boost: 1.0,
            feature_rock_min01: 0.15,
            snow_start01: 0.72,
            snow_end01: 0.82,
            rock_slope_start01: 0.45,
            rock_slope_end01: 0.70,
            dirt_slope_start01: 0.20,
            dirt_slope_end01: 0.45,
            noise_scale: 5.0,
            noise_strength: 0.25,
            dirt_macro_scale: 0.6,
            dirt_macro_mix: 0.75,
            dirt_patch_scale: 2.0,
            dirt_patch_coverage: 0.12,
            dirt_patch_strength: 0.85,
            dirt_patch_sharpness: 1.2,
            dirt_mask_boost: 1.6,
            dirt_slope_blend: 0.05,
            dirt_patch_slope_penalty: 0.0,
            dirt_patch_edge_warp: 0.35,
            dirt_region_scale: 0.18,
            dirt_coverage_min_multiplier: 0.55,
            dirt_coverage_max_multiplier: 1.75,
            dirt_region_contrast: 1.4,
            dirt_strength_random_min: 0.75,
            dirt_strength_random_max: 1.35,
            dirt_strength_noise_scale: 6.0,
            dirt_min_visible_weight: 0.07,
        }
    }
}

/// Inputs of one weight cell.
#[derive(Clone, Copy, Debug)]
struct CellInput {
    u: f32,
    v: f32,
    height01: f32,
    slope01: f32,
    feature: f32,
}

struct Offsets([f32; 10]);

impl SurfaceWeightPainter {
    pub fn layer_count(&self) -> usize {
        if self.snow { 4 } else { 3 }
    }

    pub fn apply(&self, ctx: &mut StepContext<'_, '_>, seed: u64) -> Result<StepReport, StepError> {
        let mut rng = step_rng(seed, SURFACE_SALT);
        let perlin = Perlin::new(rng.random());
        let offsets = Offsets(std::array::from_fn(|_| noise_offset(&mut rng)));

        let terrain = &mut *ctx.terrain;
        let layers = self.layer_count();
        let (aw, ah) = (
            terrain.surface_weights.width(),
            terrain.surface_weights.height(),
        );
        let mut painted = Vec::with_capacity(aw * ah * layers);

        for y in 0..ah {
            for x in 0..aw {
                let u = cell_to_unit(x, aw);
                let v = cell_to_unit(y, ah);
                let input = CellInput {
                    u,
                    v,
                    height01: terrain.sample_height01(u, v),
                    slope01: terrain.slope01(u, v),
                    feature: terrain.sample_feature_mask(u, v),
                };
                let w = self.cell_weights(&perlin, &offsets, input);
                painted.extend_from_slice(&w[..layers]);
            }
        }

        terrain.surface_weights.reset(layers);
        for (i, cell) in painted.chunks_exact(layers).enumerate() {
            terrain.surface_weights.set_cell(i % aw, i / aw, cell);
        }

        info!(
            width = aw,
            height = ah,
            layers,
            checksum = terrain.surface_weights.checksum(),
            "surface weights painted"
        );
        Ok(StepReport::new(aw * ah, aw * ah))
    }

    /// Normalized `[grass, dirt, rock, snow]` for one cell; snow is 0 when disabled.
    fn cell_weights(&self, perlin: &Perlin, o: &Offsets, c: CellInput) -> [f32; 4] {
        let o = &o.0;
        let noise = |freq: f32, a: f32, b: f32| perlin01(perlin, c.u * freq + a, c.v * freq + b);

        let macro_freq = self.dirt_macro_scale.max(0.01) * FREQ_MULT;
        let patch_freq = self.dirt_patch_scale.max(0.01) * FREQ_MULT;
        let warp_freq = patch_freq * 3.0;
        let strength_freq = patch_freq * self.dirt_strength_noise_scale;
        let region_freq = self.dirt_region_scale.max(0.01) * FREQ_MULT;

        let n = noise(self.noise_scale, o[0], o[1]);
        let slope_n = clamp01(c.slope01 + (n - 0.5) * self.noise_strength);

        let mut rock = smooth01(self.rock_slope_start01, self.rock_slope_end01, slope_n);
        if c.feature >= self.feature_rock_min01 {
            rock = clamp01(rock + c.feature * self.feature_rock_boost);
        }

        let snow = if self.snow {
            smooth01(self.snow_start01, self.snow_end01, c.height01) * clamp01(1.0 - c.slope01 * 0.9)
        } else {
            0.0
        };

        let dirt_slope =
            smooth01(self.dirt_slope_start01, self.dirt_slope_end01, slope_n) * self.dirt_slope_blend;

        // Regional coverage: some areas are dirtier than others.
        let region = powf(noise(region_freq, o[8], o[9]), self.dirt_region_contrast);
        let local_coverage = (self.dirt_patch_coverage
            * lerp(
                self.dirt_coverage_min_multiplier,
                self.dirt_coverage_max_multiplier,
                region,
            ))
        .clamp(0.0, 0.5);

        let macro_n = noise(macro_freq, o[4], o[5]);
        let base_n = noise(patch_freq, o[2], o[3]);
        let warp_n = noise(warp_freq, o[3], o[2]);
        let p = clamp01(
            lerp(base_n, macro_n, self.dirt_macro_mix) + (warp_n - 0.5) * self.dirt_patch_edge_warp,
        );

        let thr = 1.0 - local_coverage;
        let band = lerp(0.22, 0.10, clamp01(self.dirt_patch_sharpness / 3.0));
        let mut mask = smooth01(thr, clamp01(thr + band), p);
        mask = powf(mask, self.dirt_patch_sharpness);
        mask = clamp01(mask * self.dirt_mask_boost);

        let strength = lerp(
            self.dirt_strength_random_min,
            self.dirt_strength_random_max,
            noise(strength_freq, o[6], o[7]),
        );
        let mut dirt_patch = mask * self.dirt_patch_strength * strength;
        let has_patch = mask > 0.001;
        if has_patch {
            dirt_patch = dirt_patch.max(self.dirt_min_visible_weight);
        }
        if self.dirt_patch_slope_penalty > 0.0 {
            dirt_patch *= clamp01(1.0 - c.slope01 * self.dirt_patch_slope_penalty);
        }

        let priority = (1.0 - rock) * (1.0 - snow);
        let mut dirt = clamp01(dirt_patch + dirt_slope) * priority;
        if has_patch {
            dirt = dirt.max(self.dirt_min_visible_weight * priority);
        }

        let mut grass = clamp01(1.0 - (rock + dirt + snow));
        let mut sum = grass + dirt + rock + snow;
        let (mut dirt, mut rock, mut snow) = (dirt, rock, snow);
        if sum < 1e-6 {
            grass = 1.0;
            sum = 1.0;
            dirt = 0.0;
            rock = 0.0;
            snow = 0.0;
        }

        let mut out = [0.0; 4];
        out[SurfaceLayer::Grass as usize] = grass / sum;
        out[SurfaceLayer::Dirt as usize] = dirt / sum;
        out[SurfaceLayer::Rock as usize] = rock / sum;
        out[SurfaceLayer::Snow as usize] = snow / sum;
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heightfield::TerrainData;
    use crate::steps::test_support::{Harness, flat, ramp};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn paint(step: &SurfaceWeightPainter, td: &mut TerrainData, seed: u64) {
        Harness::new()
            .with(td, |ctx| step.apply(ctx, seed))
            .expect("surface step");
    }

    fn assert_normalized(td: &TerrainData) {
        for cell in td.surface_weights.cells() {
            let sum: f32 = cell.iter().sum();
            assert!((sum - 1.0).abs() < 1e-4, "cell weights sum to {sum}: {cell:?}");
            assert!(cell.iter().all(|&w| w >= 0.0), "negative weight in {cell:?}");
        }
    }

    #[test]
    fn test_weights_normalized_on_mixed_terrain() {
        let step = SurfaceWeightPainter::default();
        let mut td = ramp(33, 1.0);
        td.feature_mask.fill(0.4);
        paint(&step, &mut td, 12345);
        assert_eq!(td.surface_weights.layers(), 4);
        assert_normalized(&td);
    }

    #[test]
    fn test_weights_normalized_for_random_configs() {
        let mut rng = ChaCha8Rng::seed_from_u64(99);
        for round in 0..8 {
            let step = SurfaceWeightPainter {
                snow: rng.random(),
                noise_strength: rng.random_range(0.0..0.6),
                dirt_patch_coverage: rng.random_range(0.0..0.5),
                dirt_patch_sharpness: rng.random_range(0.25..6.0),
                dirt_mask_boost: rng.random_range(0.5..3.0),
                feature_rock_boost: rng.random_range(0.0..2.0),
                dirt_min_visible_weight: rng.random_range(0.0..0.2),
                ..Default::default()
            };
            let mut td = ramp(17, rng.random_range(0.1..1.0));
            td.feature_mask.fill(rng.random());
            paint(&step, &mut td, round);
            assert_eq!(td.surface_weights.layers(), step.layer_count());
            assert_normalized(&td);
        }
    }

    #[test]
    fn test_high_flat_ground_is_snow() {
        let step = SurfaceWeightPainter::default();
        let mut td = flat(17, 0.95);
        paint(&step, &mut td, 3);
        for y in 0..td.surface_weights.height() {
            for x in 0..td.surface_weights.width() {
                let snow = td.surface_weights.weight(x, y, SurfaceLayer::Snow);
                assert!(snow > 0.99, "flat peak should be snow, got {snow}");
            }
        }
    }

    #[test]
    fn test_strong_feature_mask_is_rock() {
        let step = SurfaceWeightPainter {
            snow: false,
            ..Default::default()
        };
        let mut td = flat(17, 0.2);
        td.feature_mask.fill(1.0);
        paint(&step, &mut td, 3);
        assert_eq!(td.surface_weights.layers(), 3);
        let rock = td.surface_weights.weight(4, 4, SurfaceLayer::Rock);
        assert!(rock > 0.99, "full feature mask should paint rock, got {rock}");
    }

    #[test]
    fn test_deterministic() {
        let step = SurfaceWeightPainter::default();
        let mut a = ramp(17, 0.8);
        let mut b = ramp(17, 0.8);
        paint(&step, &mut a, 8);
        paint(&step, &mut b, 8);
        assert_eq!(a.surface_weights.checksum(), b.surface_weights.checksum());
    }
}
