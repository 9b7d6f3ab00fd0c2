//! Scalar helpers shared by the painters and samplers.
//!
//! Transcendentals go through `libm` so results do not depend on the host libc.

use noise::{NoiseFn, Perlin};

#[inline]
pub fn clamp01(x: f32) -> f32 {
    x.clamp(0.0, 1.0)
}

#[inline]
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Position of `x` within `[a, b]`, clamped to `[0, 1]`. A degenerate range maps to 0.
#[inline]
pub fn inverse_lerp(a: f32, b: f32, x: f32) -> f32 {
    if a == b {
        0.0
    } else {
        clamp01((x - a) / (b - a))
    }
}

/// Hermite step: 0 at `edge0`, 1 at `edge1`, smooth in between.
#[inline]
pub fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = inverse_lerp(edge0, edge1, x);
    t * t * (3.0 - 2.0 * t)
}

#[inline]
pub fn powf(x: f32, e: f32) -> f32 {
    libm::powf(x, e)
}

#[inline]
pub fn sqrtf(x: f32) -> f32 {
    libm::sqrtf(x)
}

/// Perlin noise remapped to `[0, 1]`.
#[inline]
pub fn perlin01(noise: &Perlin, x: f32, y: f32) -> f32 {
    clamp01(noise.get([x as f64, y as f64]) as f32 * 0.5 + 0.5)
}

/// Slope in `[0, 1]` from a unit normal: 0 flat, 1 vertical.
#[inline]
pub fn slope01_from_normal(normal: glam::Vec3) -> f32 {
    let cos = normal.try_normalize().unwrap_or(glam::Vec3::Y).y.clamp(-1.0, 1.0);
    clamp01(libm::acosf(cos) / core::f32::consts::FRAC_PI_2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn test_inverse_lerp_degenerate_range() {
        assert_eq!(inverse_lerp(0.3, 0.3, 0.9), 0.0);
        assert_eq!(inverse_lerp(0.0, 1.0, 2.0), 1.0);
        assert_eq!(inverse_lerp(0.0, 1.0, -1.0), 0.0);
    }

    #[test]
    fn test_smoothstep_endpoints() {
        assert_eq!(smoothstep(0.45, 0.70, 0.2), 0.0);
        assert_eq!(smoothstep(0.45, 0.70, 0.9), 1.0);
        let mid = smoothstep(-0.15, 0.15, 0.0);
        assert!((mid - 0.5).abs() < 1e-6, "midpoint should be 0.5, got {mid}");
    }

    #[test]
    fn test_perlin01_in_range() {
        let noise = Perlin::new(7);
        for i in 0..500 {
            let v = perlin01(&noise, i as f32 * 0.37 + 0.11, i as f32 * 0.91 - 3.3);
            assert!((0.0..=1.0).contains(&v), "perlin01 out of range: {v}");
        }
    }

    #[test]
    fn test_slope_from_normal() {
        assert!(slope01_from_normal(Vec3::Y) < 1e-6);
        assert!((slope01_from_normal(Vec3::X) - 1.0).abs() < 1e-5);
        let diag = Vec3::new(1.0, 1.0, 0.0).normalize();
        assert!((slope01_from_normal(diag) - 0.5).abs() < 1e-4);
    }
}
