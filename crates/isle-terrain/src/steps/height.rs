//! Base elevation: normalized multi-octave Perlin fBm with optional island falloff.

use noise::Perlin;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{StepContext, StepReport, invalid};
use crate::error::StepError;
use crate::heightfield::cell_to_unit;
use crate::math::{clamp01, perlin01, powf, sqrtf};
use crate::seed::{HEIGHT_SALT, noise_offset, step_rng};

/// Octave parameters of the fBm.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FractalNoise {
    /// Frequency of the first octave across the whole terrain (cycles per side).
    pub noise_scale: f32,
    /// Number of octaves to composite. Default: 5.
    pub octaves: u32,
    /// Amplitude multiplier between octaves. Default: 0.5.
    pub persistence: f32,
    /// Frequency multiplier between octaves. Default: 2.0.
    pub lacunarity: f32,
}

impl Default for FractalNoise {
    fn default() -> Self {
        Self {
            noise_scale: 6.0,
            octaves: 5,
            persistence: 0.5,
            lacunarity: 2.0,
        }
    }
}

impl FractalNoise {
    /// Sample at normalized `(u, v)` with a domain offset. Returns a value in `[0, 1]`.
    ///
    /// The sum is divided by the total amplitude so adding octaves adds detail
    /// without changing the overall range.
    pub fn sample(&self, noise: &Perlin, u: f32, v: f32, offset: (f32, f32)) -> f32 {
        let mut amp = 1.0;
        let mut freq = 1.0;
        let mut sum = 0.0;

        for _ in 0..self.octaves {
            let nx = u * self.noise_scale * freq + offset.0;
            let ny = v * self.noise_scale * freq + offset.1;
            sum += perlin01(noise, nx, ny) * amp;
            amp *= self.persistence;
            freq *= self.lacunarity;
        }

        let norm = self.max_amplitude();
        if norm > 0.0 { sum / norm } else { 0.0 }
    }

    /// Geometric sum of octave amplitudes.
    pub fn max_amplitude(&self) -> f32 {
        let mut sum = 0.0;
        let mut amp = 1.0;
        for _ in 0..self.octaves {
            sum += amp;
            amp *= self.persistence;
        }
        sum
    }
}

/// Writes every heightfield sample from scratch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeightFieldGenerator {
    pub priority: i32,
    /// Final multiplier on the normalized elevation. Default: 0.25.
    pub height_scale01: f32,
    pub noise: FractalNoise,
    /// Fade elevation to zero toward the edges.
    pub island_falloff: bool,
    /// Exponent of the radial falloff curve. Default: 2.2.
    pub falloff_power: f32,
}

impl Default for HeightFieldGenerator {
    fn default() -> Self {
        Self {
            priority: 100,
            height_scale01: 0.25,
            noise: FractalNoise::default(),
            island_falloff: true,
            falloff_power: 2.2,
        }
    }
}

impl HeightFieldGenerator {
    pub fn validate(&self) -> Result<(), StepError> {
        if self.noise.octaves == 0 {
            return Err(invalid("height noise needs at least one octave"));
        }
        if self.height_scale01 < 0.0 {
            return Err(invalid("height_scale01 must not be negative"));
        }
        Ok(())
    }

    /// Radial island falloff at `(u, v)`: 1 in the center, 0 at the edge midpoints and beyond.
    pub fn falloff(&self, u: f32, v: f32) -> f32 {
        let du = u - 0.5;
        let dv = v - 0.5;
        let d = sqrtf(du * du + dv * dv) / 0.5;
        clamp01(1.0 - powf(clamp01(d), self.falloff_power))
    }

    pub fn apply(&self, ctx: &mut StepContext<'_, '_>, seed: u64) -> Result<StepReport, StepError> {
        let mut rng = step_rng(seed, HEIGHT_SALT);
        let perlin = Perlin::new(rng.random());
        let offset = (noise_offset(&mut rng), noise_offset(&mut rng));

        let hf = &mut ctx.terrain.heightfield;
        let res = hf.resolution();
        for y in 0..res {
            for x in 0..res {
                let u = cell_to_unit(x, res);
                let v = cell_to_unit(y, res);
                let mut e = self.noise.sample(&perlin, u, v, offset);
                if self.island_falloff {
                    e *= self.falloff(u, v);
                }
                hf.set_height01(x, y, clamp01(e * self.height_scale01));
            }
        }

        debug!(resolution = res, checksum = hf.checksum(), "heightfield generated");
        Ok(StepReport::new(res * res, res * res))
    }
}
