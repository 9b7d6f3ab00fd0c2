//! Persistent prop scatter (rocks, stumps, debris) by rejection sampling.

use glam::{Quat, Vec3};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::scatter::{MinDistanceSet, Metric};
use super::{StepContext, StepReport, invalid};
use crate::collab::{Holder, LayerTag, Placement, TerrainSurface, WeightedPrefab, pick_weighted};
use crate::error::StepError;
use crate::layout::PlacedInstance;
use crate::math::clamp01;
use crate::seed::{prop_rule_salt, step_rng, uniform};

/// Prefer cells the feature stamper marked.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureBias {
    /// Reject cells whose feature mask is below this.
    pub min01: f32,
    /// Spawn chance is scaled by `1 + mask * chance_boost`.
    pub chance_boost: f32,
}

impl Default for FeatureBias {
    fn default() -> Self {
        Self {
            min01: 0.0,
            chance_boost: 1.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PropRule {
    pub name: String,
    pub prefabs: Vec<WeightedPrefab>,
    pub target_count: usize,
    pub spawn_chance: f32,
    /// Attempts per requested prop.
    pub tries_multiplier: usize,
    pub min_height01: f32,
    pub max_height01: f32,
    pub max_slope01: f32,
    /// Planar spacing between props of this rule; 0.01 or less disables it.
    pub min_distance: f32,
    pub align_to_normal: bool,
    pub random_yaw: bool,
    pub y_offset: f32,
    pub scale_min: f32,
    pub scale_max: f32,
    pub layer: LayerTag,
    /// Tag props scaled at least `min_size_for_obstacle` as obstacles.
    pub size_based_layer: bool,
    pub min_size_for_obstacle: f32,
    pub feature_bias: Option<FeatureBias>,
}

impl Default for PropRule {
    fn default() -> Self {
        Self {
            name: "props".into(),
            prefabs: vec![
                WeightedPrefab::new(100, 1.0),
                WeightedPrefab::new(101, 1.0),
                WeightedPrefab::new(102, 1.0),
            ],
            target_count: 100,
            spawn_chance: 1.0,
            tries_multiplier: 6,
            min_height01: 0.05,
            max_height01: 0.8,
            max_slope01: 0.55,
            min_distance: 3.0,
            align_to_normal: true,
            random_yaw: true,
            y_offset: 0.0,
            scale_min: 0.9,
            scale_max: 1.4,
            layer: LayerTag::Default,
            size_based_layer: false,
            min_size_for_obstacle: 1.2,
            feature_bias: None,
        }
    }
}

impl PropRule {
    fn layer_for(&self, scale: f32) -> LayerTag {
        if self.size_based_layer && scale >= self.min_size_for_obstacle {
            LayerTag::Obstacle
        } else {
            self.layer
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PropScatterer {
    pub priority: i32,
    pub rules: Vec<PropRule>,
}

impl Default for PropScatterer {
    fn default() -> Self {
        Self {
            priority: 280,
            rules: vec![PropRule {
                size_based_layer: true,
                ..Default::default()
            }],
        }
    }
}

/// Yaw about +Y, optionally tilted onto the surface normal.
pub fn surface_rotation(align: bool, normal: Vec3, yaw_deg: f32) -> Quat {
    let yaw = Quat::from_rotation_y(yaw_deg.to_radians());
    if align {
        Quat::from_rotation_arc(Vec3::Y, normal.try_normalize().unwrap_or(Vec3::Y)) * yaw
    } else {
        yaw
    }
}

impl PropScatterer {
    pub fn validate(&self) -> Result<(), StepError> {
        for r in &self.rules {
            if r.max_height01 < r.min_height01 {
                return Err(invalid(format!("prop rule '{}': height range inverted", r.name)));
            }
            if r.scale_max < r.scale_min {
                return Err(invalid(format!("prop rule '{}': scale range inverted", r.name)));
            }
        }
        Ok(())
    }

    pub fn apply(&self, ctx: &mut StepContext<'_, '_>, seed: u64) -> Result<StepReport, StepError> {
        if self.rules.is_empty() {
            warn!("prop scatter has no rules");
            return Ok(StepReport::default());
        }

        let mut report = StepReport::default();
        for (ri, rule) in self.rules.iter().enumerate() {
            if rule.prefabs.is_empty() || rule.target_count == 0 {
                continue;
            }
            let made = self.scatter_rule(ctx, seed, ri, rule);
            report += StepReport::new(rule.target_count, made);

            if made < rule.target_count {
                warn!(
                    rule = %rule.name,
                    placed = made,
                    target = rule.target_count,
                    "prop placement exhausted its tries"
                );
            } else {
                debug!(rule = %rule.name, placed = made, "prop rule placed");
            }
        }

        info!(placed = report.accepted, target = report.requested, "props scattered");
        Ok(report)
    }

    fn scatter_rule(
        &self,
        ctx: &mut StepContext<'_, '_>,
        seed: u64,
        ri: usize,
        rule: &PropRule,
    ) -> usize {
        let mut rng = step_rng(seed, prop_rule_salt(ri));
        let tries = rule.target_count.max(1) * rule.tries_multiplier.max(1);
        let mut spacing = MinDistanceSet::new(rule.min_distance, Metric::Planar, rule.target_count);
        let mut made = 0usize;

        for _ in 0..tries {
            if made >= rule.target_count {
                break;
            }
            let u: f32 = rng.random();
            let v: f32 = rng.random();

            let terrain = &*ctx.terrain;
            let h01 = terrain.sample_height01(u, v);
            if h01 < rule.min_height01 || h01 > rule.max_height01 {
                continue;
            }
            if terrain.slope01(u, v) > rule.max_slope01 {
                continue;
            }

            let mut chance = rule.spawn_chance;
            if let Some(bias) = &rule.feature_bias {
                let rock = terrain.sample_feature_mask(u, v);
                if rock < bias.min01 {
                    continue;
                }
                chance *= 1.0 + rock * bias.chance_boost;
            }
            if rng.random::<f32>() > clamp01(chance) {
                continue;
            }

            let surface = terrain.surface_point(u, v);
            if !spacing.try_insert(surface) {
                continue;
            }

            let yaw = if rule.random_yaw { uniform(&mut rng, 0.0, 360.0) } else { 0.0 };
            let rotation = surface_rotation(rule.align_to_normal, terrain.sample_normal(u, v), yaw);
            let scale = uniform(&mut rng, rule.scale_min, rule.scale_max).max(0.01);
            let Some(prefab) = pick_weighted(&rule.prefabs, rng.random()) else {
                continue;
            };

            let placement = Placement {
                position: surface + Vec3::Y * rule.y_offset,
                rotation,
                scale: Vec3::splat(scale),
                layer: rule.layer_for(scale),
            };
            let handle = ctx.collab.instances.instantiate(prefab, &placement, Holder::Props);
            ctx.layout.props.push(PlacedInstance {
                rule_index: ri,
                prefab,
                position: placement.position,
                rotation: placement.rotation,
                scale: placement.scale,
                layer: placement.layer,
                instance: Some(handle),
            });
            made += 1;
        }
        made
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heightfield::TerrainData;
    use crate::steps::test_support::{Harness, flat, ramp, within};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn scatter(step: &PropScatterer, td: &mut TerrainData, seed: u64) -> (StepReport, Harness) {
        let mut h = Harness::new();
        let report = h.with(td, |ctx| step.apply(ctx, seed)).expect("props step");
        (report, h)
    }

    #[test]
    fn test_places_target_on_open_ground() {
        let step = PropScatterer {
            rules: vec![PropRule {
                target_count: 20,
                ..Default::default()
            }],
            ..Default::default()
        };
        let mut td = flat(33, 0.3);
        let (report, h) = scatter(&step, &mut td, 11);
        assert_eq!(report, StepReport::new(20, 20));
        assert_eq!(h.layout.props.len(), 20);
        assert_eq!(h.sink.count_in(Holder::Props), 20);
        for p in &h.layout.props {
            assert!(within(&td, p.position), "prop outside terrain: {:?}", p.position);
            assert!((p.position.y - 30.0).abs() < 1e-3);
            assert!((0.9..=1.4).contains(&p.scale.x));
        }
    }

    #[test]
    fn test_min_distance_holds_for_random_rules() {
        let mut rng = ChaCha8Rng::seed_from_u64(31);
        for round in 0..6 {
            let rule = PropRule {
                target_count: rng.random_range(5..120),
                tries_multiplier: rng.random_range(1..8),
                min_distance: rng.random_range(0.5..12.0),
                spawn_chance: rng.random_range(0.3..1.0),
                min_height01: 0.0,
                max_height01: 1.0,
                max_slope01: 1.0,
                ..Default::default()
            };
            let min_distance = rule.min_distance;
            let step = PropScatterer {
                rules: vec![rule],
                ..Default::default()
            };
            let mut td = ramp(33, 0.6);
            let (_, h) = scatter(&step, &mut td, round);
            let props = &h.layout.props;
            for (i, a) in props.iter().enumerate() {
                for b in &props[i + 1..] {
                    let d = (a.position.x - b.position.x).hypot(a.position.z - b.position.z);
                    assert!(
                        d >= min_distance - 1e-3,
                        "round {round}: props {d} apart, min {min_distance}"
                    );
                }
            }
        }
    }

    #[test]
    fn test_size_based_layer_tags_obstacles() {
        let step = PropScatterer {
            rules: vec![PropRule {
                target_count: 30,
                size_based_layer: true,
                min_size_for_obstacle: 1.2,
                ..Default::default()
            }],
            ..Default::default()
        };
        let mut td = flat(33, 0.3);
        let (_, h) = scatter(&step, &mut td, 4);
        for p in &h.layout.props {
            let expected = if p.scale.x >= 1.2 { LayerTag::Obstacle } else { LayerTag::Default };
            assert_eq!(p.layer, expected, "scale {}", p.scale.x);
        }
    }

    #[test]
    fn test_feature_bias_rejects_unmarked_ground() {
        let step = PropScatterer {
            rules: vec![PropRule {
                feature_bias: Some(FeatureBias {
                    min01: 0.5,
                    chance_boost: 1.0,
                }),
                ..Default::default()
            }],
            ..Default::default()
        };
        let mut td = flat(33, 0.3);
        let (report, _) = scatter(&step, &mut td, 4);
        assert_eq!(report.accepted, 0, "no cell reaches the mask minimum");
        assert!(report.is_partial());
    }

    #[test]
    fn test_feature_bias_boosts_chance() {
        let rule = PropRule {
            target_count: 200,
            min_distance: 0.0,
            spawn_chance: 0.3,
            tries_multiplier: 1,
            ..Default::default()
        };
        let plain = PropScatterer {
            rules: vec![rule.clone()],
            ..Default::default()
        };
        let boosted = PropScatterer {
            rules: vec![PropRule {
                feature_bias: Some(FeatureBias {
                    min01: 0.0,
                    chance_boost: 3.0,
                }),
                ..rule
            }],
            ..Default::default()
        };
        let mut a = flat(33, 0.3);
        let mut b = flat(33, 0.3);
        b.feature_mask.fill(1.0);
        let (ra, _) = scatter(&plain, &mut a, 9);
        let (rb, _) = scatter(&boosted, &mut b, 9);
        assert_eq!(rb.accepted, 200, "0.3 * (1 + 3) clamps to certainty");
        assert!(ra.accepted < rb.accepted);
    }

    #[test]
    fn test_aligned_rotation_follows_normal() {
        let n = Vec3::new(0.3, 1.0, 0.0).normalize();
        let r = surface_rotation(true, n, 45.0);
        assert!((r * Vec3::Y).distance(n) < 1e-4, "local up must map to the normal");
        let flat = surface_rotation(false, n, 90.0);
        assert!((flat * Vec3::Y).distance(Vec3::Y) < 1e-4);
    }

    #[test]
    fn test_same_seed_same_layout() {
        let step = PropScatterer::default();
        let mut a = ramp(33, 0.7);
        let mut b = ramp(33, 0.7);
        let (_, ha) = scatter(&step, &mut a, 123);
        let (_, hb) = scatter(&step, &mut b, 123);
        let pa: Vec<Vec3> = ha.layout.props.iter().map(|p| p.position).collect();
        let pb: Vec<Vec3> = hb.layout.props.iter().map(|p| p.position).collect();
        assert_eq!(pa, pb);
    }
}
