//! Placement rules for streamed content.

use noise::Perlin;
use serde::{Deserialize, Serialize};

use isle_terrain::{WeightedPrefab, clamp01, inverse_lerp, perlin01};

/// Offsets that decorrelate the two density layers from each other.
const MACRO_OFFSET: f32 = 1000.0;
const MICRO_OFFSET: f32 = 2000.0;

/// How one kind of streamed object is distributed inside every chunk.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpawnRule {
    pub name: String,
    pub prefabs: Vec<WeightedPrefab>,
    /// Instances wanted per chunk; trials stop once reached.
    pub target_count: usize,
    pub spawn_chance: f32,
    pub tries_multiplier: usize,
    pub min_height01: f32,
    pub max_height01: f32,
    pub max_slope01: f32,
    /// Planar spacing between instances of this rule within one chunk.
    pub min_distance: f32,
    pub align_to_normal: bool,
    pub random_yaw: bool,
    pub y_offset: f32,
    pub scale_min: f32,
    pub scale_max: f32,

    /// Large-scale patches: where the noise exceeds `macro_threshold`.
    pub macro_noise_scale: f32,
    pub macro_threshold: f32,
    pub macro_sharpness: f32,
    /// Small-scale clumping inside the patches.
    pub micro_noise_scale: f32,
    pub micro_sharpness: f32,
}

impl Default for SpawnRule {
    fn default() -> Self {
        Self {
            name: "Grass".to_string(),
            prefabs: vec![WeightedPrefab::new(600, 1.0)],
            target_count: 80,
            spawn_chance: 1.0,
            tries_multiplier: 6,
            min_height01: 0.0,
            max_height01: 1.0,
            max_slope01: 0.85,
            min_distance: 0.35,
            align_to_normal: false,
            random_yaw: true,
            y_offset: 0.0,
            scale_min: 0.8,
            scale_max: 1.4,
            macro_noise_scale: 0.02,
            macro_threshold: 0.35,
            macro_sharpness: 2.0,
            micro_noise_scale: 0.12,
            micro_sharpness: 1.0,
        }
    }
}

impl SpawnRule {
    /// Rules with no prefabs or no target never run.
    pub fn is_active(&self) -> bool {
        !self.prefabs.is_empty() && self.target_count > 0
    }

    pub fn trials(&self) -> usize {
        self.target_count * self.tries_multiplier.max(1)
    }

    pub fn spacing(&self) -> f32 {
        self.min_distance.max(0.0001)
    }

    /// Macro gate: 0 below the threshold, rising to 1 at full noise.
    pub fn macro_gate(&self, noise: &Perlin, x: f32, z: f32) -> f32 {
        let n = perlin01(
            noise,
            (x + MACRO_OFFSET) * self.macro_noise_scale,
            (z + MACRO_OFFSET) * self.macro_noise_scale,
        );
        libm::powf(clamp01(inverse_lerp(self.macro_threshold, 1.0, n)), self.macro_sharpness)
    }

    pub fn micro_gate(&self, noise: &Perlin, x: f32, z: f32) -> f32 {
        let n = perlin01(
            noise,
            (x + MICRO_OFFSET) * self.micro_noise_scale,
            (z + MICRO_OFFSET) * self.micro_noise_scale,
        );
        libm::powf(clamp01(n), self.micro_sharpness)
    }

    /// Acceptance probability at world `(x, z)`.
    pub fn density(&self, noise: &Perlin, x: f32, z: f32) -> f32 {
        self.macro_gate(noise, x, z) * self.micro_gate(noise, x, z) * self.spawn_chance
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.max_height01 < self.min_height01 {
            return Err(format!("spawn rule '{}': height range inverted", self.name));
        }
        if self.scale_max < self.scale_min {
            return Err(format!("spawn rule '{}': scale range inverted", self.name));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inactive_rules() {
        let empty = SpawnRule {
            prefabs: Vec::new(),
            ..Default::default()
        };
        assert!(!empty.is_active());
        let zero = SpawnRule {
            target_count: 0,
            ..Default::default()
        };
        assert!(!zero.is_active());
        assert!(SpawnRule::default().is_active());
    }

    #[test]
    fn test_trials_and_spacing_floor() {
        let r = SpawnRule {
            target_count: 10,
            tries_multiplier: 0,
            min_distance: 0.0,
            ..Default::default()
        };
        assert_eq!(r.trials(), 10, "multiplier is at least one");
        assert!(r.spacing() > 0.0);
    }

    #[test]
    fn test_density_bounded() {
        let noise = Perlin::new(42);
        let r = SpawnRule::default();
        for i in 0..200 {
            let x = i as f32 * 3.7 - 300.0;
            let z = i as f32 * -1.3 + 50.0;
            let d = r.density(&noise, x, z);
            assert!((0.0..=1.0).contains(&d), "density {d} out of range at ({x}, {z})");
        }
    }

    #[test]
    fn test_threshold_one_closes_macro_gate() {
        let noise = Perlin::new(1);
        let r = SpawnRule {
            macro_threshold: 1.0,
            ..Default::default()
        };
        for i in 0..50 {
            assert_eq!(r.macro_gate(&noise, i as f32 * 5.1, i as f32 * 2.3), 0.0);
        }
    }

    #[test]
    fn test_zero_chance_means_zero_density() {
        let noise = Perlin::new(3);
        let r = SpawnRule {
            spawn_chance: 0.0,
            ..Default::default()
        };
        assert_eq!(r.density(&noise, 12.0, 40.0), 0.0);
    }

    #[test]
    fn test_validate() {
        let r = SpawnRule {
            min_height01: 0.8,
            max_height01: 0.2,
            ..Default::default()
        };
        assert!(r.validate().is_err());
        assert!(SpawnRule::default().validate().is_ok());
    }
}
