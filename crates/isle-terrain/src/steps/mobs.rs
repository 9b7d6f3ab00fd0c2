//! Creature placement: independent mobs, then clustered groups.
//!
//! Both placers share one stream RNG per step and search world XZ inside a
//! spawn area, gate on the surface slope angle and optionally snap to the
//! navigation surface. Spacing is checked on the final (snapped) position.

use glam::{Quat, Vec2, Vec3};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{StepContext, StepReport, invalid};
use crate::collab::{
    Holder, InstanceSink, LayerTag, Navigation, Placement, PrefabId, TerrainSurface,
    WeightedPrefab, pick_weighted,
};
use crate::error::StepError;
use crate::heightfield::TerrainData;
use crate::layout::{GroupRecord, PlacedInstance};
use crate::math::sqrtf;
use crate::seed::{GROUPS_SALT, MOBS_SALT, step_rng, uniform, uniform_count};

/// World-space XZ rectangle to search. `None` in a placer means the whole terrain.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpawnArea {
    pub min: [f32; 2],
    pub max: [f32; 2],
}

impl SpawnArea {
    fn resolve(area: Option<SpawnArea>, terrain: &TerrainData) -> (Vec2, Vec2) {
        match area {
            Some(a) => (Vec2::from(a.min), Vec2::from(a.max)),
            None => {
                let o = terrain.origin();
                let s = terrain.size();
                (Vec2::new(o.x, o.z), Vec2::new(o.x + s.x, o.z + s.z))
            }
        }
    }
}

/// Slope, offset and navigation limits of one search.
#[derive(Clone, Copy, Debug)]
struct Gate {
    max_slope_deg: f32,
    y_offset: f32,
    nav_radius: Option<f32>,
}

impl Gate {
    /// Surface point at `(x, z)` plus the offset, if the slope allows it.
    fn surface(&self, terrain: &TerrainData, x: f32, z: f32) -> Option<Vec3> {
        let sample = terrain.sample(x, z)?;
        (sample.slope01 * 90.0 <= self.max_slope_deg)
            .then(|| Vec3::new(x, sample.height + self.y_offset, z))
    }

    /// Snap onto the navigation surface when required.
    fn snap(&self, nav: &dyn Navigation, p: Vec3) -> Option<Vec3> {
        match self.nav_radius {
            Some(r) => nav.sample_nearest_point(p, r),
            None => Some(p),
        }
    }
}

fn far_enough(points: &[Vec3], p: Vec3, min_distance: f32) -> bool {
    let min2 = min_distance * min_distance;
    points.iter().all(|q| q.distance_squared(p) >= min2)
}

fn yaw_rotation(rng: &mut impl Rng) -> Quat {
    Quat::from_rotation_y(uniform(rng, 0.0, 360.0).to_radians())
}

fn record(
    sink: &mut dyn InstanceSink,
    rule_index: usize,
    prefab: PrefabId,
    position: Vec3,
    rotation: Quat,
    holder: Holder,
) -> PlacedInstance {
    let placement = Placement {
        rotation,
        layer: LayerTag::Mob,
        ..Placement::at(position)
    };
    let handle = sink.instantiate(prefab, &placement, holder);
    PlacedInstance {
        rule_index,
        prefab,
        position,
        rotation,
        scale: placement.scale,
        layer: placement.layer,
        instance: Some(handle),
    }
}

// ---------------------------------------------------------------------------
// Mobs
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MobRule {
    pub name: String,
    pub prefabs: Vec<WeightedPrefab>,
    /// Probability the whole rule runs; `None` always runs.
    pub rule_chance: Option<f32>,
    pub min_count: u32,
    pub max_count: u32,
    pub max_slope_angle: f32,
    /// 3D spacing against every mob placed by this step.
    pub min_distance: f32,
    pub tries_per_mob: u32,
    pub y_offset: f32,
    pub require_navigation: bool,
    pub nav_search_radius: f32,
}

impl Default for MobRule {
    fn default() -> Self {
        Self {
            name: "imp".into(),
            prefabs: vec![
                WeightedPrefab::new(400, 3.0),
                WeightedPrefab::new(401, 1.0),
                WeightedPrefab::new(402, 1.0),
            ],
            rule_chance: None,
            min_count: 3,
            max_count: 8,
            max_slope_angle: 35.0,
            min_distance: 3.0,
            tries_per_mob: 30,
            y_offset: 0.02,
            require_navigation: false,
            nav_search_radius: 2.0,
        }
    }
}

impl MobRule {
    fn gate(&self) -> Gate {
        Gate {
            max_slope_deg: self.max_slope_angle,
            y_offset: self.y_offset,
            nav_radius: self.require_navigation.then_some(self.nav_search_radius),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MobPlacer {
    pub priority: i32,
    pub area: Option<SpawnArea>,
    pub rules: Vec<MobRule>,
}

impl Default for MobPlacer {
    fn default() -> Self {
        Self {
            priority: 900,
            area: None,
            rules: vec![MobRule::default()],
        }
    }
}

impl MobPlacer {
    pub fn validate(&self) -> Result<(), StepError> {
        for r in &self.rules {
            if r.max_count < r.min_count {
                return Err(invalid(format!("mob rule '{}': count range inverted", r.name)));
            }
        }
        Ok(())
    }

    pub fn apply(&self, ctx: &mut StepContext<'_, '_>, seed: u64) -> Result<StepReport, StepError> {
        if self.rules.is_empty() {
            warn!("mob placement has no rules");
            return Ok(StepReport::default());
        }

        let mut rng = step_rng(seed, MOBS_SALT);
        let (min, max) = SpawnArea::resolve(self.area, &*ctx.terrain);
        let mut placed: Vec<Vec3> = Vec::new();
        let mut report = StepReport::default();

        for (ri, rule) in self.rules.iter().enumerate() {
            if rule.prefabs.is_empty() {
                continue;
            }
            if rule.rule_chance.is_some_and(|c| rng.random::<f32>() > c) {
                debug!(rule = %rule.name, "mob rule skipped by chance");
                continue;
            }

            let target = uniform_count(&mut rng, rule.min_count, rule.max_count) as usize;
            let tries = rule.tries_per_mob.max(1) as usize;
            let gate = rule.gate();
            let mut spawned = 0usize;

            for _ in 0..target * tries {
                if spawned >= target {
                    break;
                }
                let found = (0..tries).find_map(|_| {
                    let x = uniform(&mut rng, min.x, max.x);
                    let z = uniform(&mut rng, min.y, max.y);
                    let p = gate.surface(&*ctx.terrain, x, z)?;
                    let rotation = yaw_rotation(&mut rng);
                    let p = gate.snap(&*ctx.collab.navigation, p)?;
                    far_enough(&placed, p, rule.min_distance).then_some((p, rotation))
                });
                let Some((position, rotation)) = found else {
                    continue;
                };
                let Some(prefab) = pick_weighted(&rule.prefabs, rng.random()) else {
                    continue;
                };

                let inst = record(
                    &mut *ctx.collab.instances,
                    ri,
                    prefab,
                    position,
                    rotation,
                    Holder::Mobs,
                );
                ctx.layout.mobs.push(inst);
                placed.push(position);
                spawned += 1;
            }

            report += StepReport::new(target, spawned);
            if spawned < target {
                warn!(rule = %rule.name, placed = spawned, target, "mob placement exhausted its tries");
            } else {
                debug!(rule = %rule.name, placed = spawned, "mob rule placed");
            }
        }

        info!(placed = report.accepted, target = report.requested, "mobs placed");
        Ok(report)
    }
}

// ---------------------------------------------------------------------------
// Groups
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupRule {
    pub name: String,
    /// Member variants by weight.
    pub variants: Vec<WeightedPrefab>,
    pub group_chance: Option<f32>,
    pub min_groups: u32,
    pub max_groups: u32,
    pub min_members: u32,
    pub max_members: u32,
    /// Members spawn inside this disk around the center.
    pub group_radius: f32,
    pub min_member_distance: f32,
    /// Spacing between centers of every group placed by this step.
    pub min_group_distance: f32,
    pub max_slope_angle: f32,
    pub tries_per_group: u32,
    pub tries_per_member: u32,
    pub y_offset: f32,
    pub require_navigation: bool,
    pub nav_search_radius: f32,
}

impl Default for GroupRule {
    fn default() -> Self {
        Self {
            name: "goblins".into(),
            variants: vec![
                WeightedPrefab::new(500, 2.0),
                WeightedPrefab::new(501, 1.0),
                WeightedPrefab::new(502, 1.0),
            ],
            group_chance: None,
            min_groups: 2,
            max_groups: 5,
            min_members: 3,
            max_members: 8,
            group_radius: 8.0,
            min_member_distance: 2.0,
            min_group_distance: 20.0,
            max_slope_angle: 35.0,
            tries_per_group: 30,
            tries_per_member: 20,
            y_offset: 0.02,
            require_navigation: true,
            nav_search_radius: 2.0,
        }
    }
}

impl GroupRule {
    fn gate(&self) -> Gate {
        Gate {
            max_slope_deg: self.max_slope_angle,
            y_offset: self.y_offset,
            nav_radius: self.require_navigation.then_some(self.nav_search_radius),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupPlacer {
    pub priority: i32,
    pub area: Option<SpawnArea>,
    pub rules: Vec<GroupRule>,
}

impl Default for GroupPlacer {
    fn default() -> Self {
        Self {
            priority: 905,
            area: None,
            rules: vec![GroupRule::default()],
        }
    }
}

impl GroupPlacer {
    pub fn validate(&self) -> Result<(), StepError> {
        for r in &self.rules {
            if r.max_groups < r.min_groups || r.max_members < r.min_members {
                return Err(invalid(format!("group rule '{}': count range inverted", r.name)));
            }
            if r.group_radius < 0.0 {
                return Err(invalid(format!("group rule '{}': negative radius", r.name)));
            }
        }
        Ok(())
    }

    pub fn apply(&self, ctx: &mut StepContext<'_, '_>, seed: u64) -> Result<StepReport, StepError> {
        if self.rules.is_empty() {
            warn!("group placement has no rules");
            return Ok(StepReport::default());
        }

        let mut rng = step_rng(seed, GROUPS_SALT);
        let (min, max) = SpawnArea::resolve(self.area, &*ctx.terrain);
        let mut centers: Vec<Vec3> = Vec::new();
        let mut report = StepReport::default();
        let mut members_total = 0usize;

        for (ri, rule) in self.rules.iter().enumerate() {
            if rule.variants.is_empty() {
                continue;
            }
            if rule.group_chance.is_some_and(|c| rng.random::<f32>() > c) {
                debug!(rule = %rule.name, "group rule skipped by chance");
                continue;
            }

            let wanted = uniform_count(&mut rng, rule.min_groups, rule.max_groups) as usize;
            let gate = rule.gate();
            let mut made = 0usize;

            for g in 0..wanted {
                let center = (0..rule.tries_per_group).find_map(|_| {
                    let x = uniform(&mut rng, min.x, max.x);
                    let z = uniform(&mut rng, min.y, max.y);
                    let p = gate.surface(&*ctx.terrain, x, z)?;
                    let p = gate.snap(&*ctx.collab.navigation, p)?;
                    far_enough(&centers, p, rule.min_group_distance).then_some(p)
                });
                let Some(center) = center else {
                    warn!(rule = %rule.name, group = g + 1, "no valid group center found");
                    continue;
                };

                let target = uniform_count(&mut rng, rule.min_members, rule.max_members);
                let members = self.find_members(ctx, &mut rng, rule, gate, center, target);
                if members.is_empty() {
                    warn!(rule = %rule.name, group = g + 1, "group placement failed, discarded");
                    continue;
                }

                let index = ctx.layout.groups.len() as u32;
                let placed: Vec<PlacedInstance> = members
                    .into_iter()
                    .map(|(prefab, position, rotation)| {
                        record(
                            &mut *ctx.collab.instances,
                            ri,
                            prefab,
                            position,
                            rotation,
                            Holder::Group(index),
                        )
                    })
                    .collect();
                debug!(rule = %rule.name, group = g + 1, members = placed.len(), target, "group placed");

                members_total += placed.len();
                centers.push(center);
                ctx.layout.groups.push(GroupRecord {
                    rule_index: ri,
                    name: format!("{}_{}", rule.name, g + 1),
                    center,
                    members: placed,
                });
                made += 1;
            }

            report += StepReport::new(wanted, made);
        }

        info!(
            groups = report.accepted,
            target = report.requested,
            members = members_total,
            "groups placed"
        );
        Ok(report)
    }

    /// Member positions around `center`; nothing is instantiated here.
    fn find_members(
        &self,
        ctx: &StepContext<'_, '_>,
        rng: &mut impl Rng,
        rule: &GroupRule,
        gate: Gate,
        center: Vec3,
        target: u32,
    ) -> Vec<(PrefabId, Vec3, Quat)> {
        let mut positions: Vec<Vec3> = Vec::new();
        let mut members = Vec::new();

        for _ in 0..target {
            let found = (0..rule.tries_per_member).find_map(|_| {
                let angle = uniform(rng, 0.0, core::f32::consts::TAU);
                let r = rule.group_radius * sqrtf(rng.random::<f32>());
                let x = center.x + r * libm::cosf(angle);
                let z = center.z + r * libm::sinf(angle);
                let p = gate.surface(&*ctx.terrain, x, z)?;
                let rotation = yaw_rotation(rng);
                let p = gate.snap(&*ctx.collab.navigation, p)?;
                far_enough(&positions, p, rule.min_member_distance).then_some((p, rotation))
            });
            let Some((position, rotation)) = found else {
                continue;
            };
            let Some(prefab) = pick_weighted(&rule.variants, rng.random()) else {
                continue;
            };
            positions.push(position);
            members.push((prefab, position, rotation));
        }
        members
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::NavSourceFilter;
    use crate::steps::test_support::{Harness, flat, within};

    fn build_nav(h: &mut Harness, td: &TerrainData) {
        h.nav.build(
            td,
            &NavSourceFilter {
                max_slope01: 0.5,
                obstacles: Vec::new(),
            },
        );
    }

    #[test]
    fn test_mobs_within_count_range_and_spaced() {
        let step = MobPlacer::default();
        let mut td = flat(33, 0.3);
        let mut h = Harness::new();
        let report = h.with(&mut td, |ctx| step.apply(ctx, 12)).expect("mob step");

        let n = h.layout.mobs.len();
        assert!((3..=8).contains(&n), "mob count {n} outside [3, 8]");
        assert_eq!(report.accepted, n);
        assert_eq!(h.sink.count_in(Holder::Mobs), n);
        for (i, a) in h.layout.mobs.iter().enumerate() {
            assert_eq!(a.layer, LayerTag::Mob);
            assert!(within(&td, a.position));
            assert!((a.position.y - 30.02).abs() < 1e-3);
            for b in &h.layout.mobs[i + 1..] {
                assert!(a.position.distance(b.position) >= 3.0 - 1e-4);
            }
        }
    }

    #[test]
    fn test_mobs_need_navigation_when_required() {
        let step = MobPlacer {
            rules: vec![MobRule {
                require_navigation: true,
                ..Default::default()
            }],
            ..Default::default()
        };
        let mut td = flat(33, 0.3);
        let mut h = Harness::new();
        let report = h.with(&mut td, |ctx| step.apply(ctx, 3)).expect("mob step");
        assert_eq!(report.accepted, 0, "nothing is navigable before a build");
        assert!(report.is_partial());

        build_nav(&mut h, &td);
        let report = h.with(&mut td, |ctx| step.apply(ctx, 3)).expect("mob step");
        assert!(report.accepted > 0);
        assert!(!report.is_partial());
    }

    #[test]
    fn test_mob_rule_chance_zero_skips() {
        let step = MobPlacer {
            rules: vec![MobRule {
                rule_chance: Some(0.0),
                ..Default::default()
            }],
            ..Default::default()
        };
        let mut td = flat(17, 0.3);
        let mut h = Harness::new();
        let report = h.with(&mut td, |ctx| step.apply(ctx, 3)).expect("mob step");
        assert_eq!(report, StepReport::default());
        assert_eq!(h.sink.live_count(), 0);
    }

    #[test]
    fn test_mob_area_restricts_search() {
        let step = MobPlacer {
            area: Some(SpawnArea {
                min: [20.0, 20.0],
                max: [60.0, 60.0],
            }),
            ..Default::default()
        };
        let mut td = flat(33, 0.3);
        let mut h = Harness::new();
        h.with(&mut td, |ctx| step.apply(ctx, 8)).expect("mob step");
        for m in &h.layout.mobs {
            assert!((20.0..=60.0).contains(&m.position.x));
            assert!((20.0..=60.0).contains(&m.position.z));
        }
    }

    #[test]
    fn test_groups_have_members_near_center() {
        let step = GroupPlacer::default();
        let mut td = flat(33, 0.3);
        let mut h = Harness::new();
        build_nav(&mut h, &td);
        let report = h.with(&mut td, |ctx| step.apply(ctx, 21)).expect("group step");

        assert!((2..=5).contains(&report.requested));
        assert_eq!(report.accepted, h.layout.groups.len());
        assert!(report.accepted > 0);

        for (gi, group) in h.layout.groups.iter().enumerate() {
            assert!(!group.members.is_empty(), "empty groups must not exist");
            assert!(group.members.len() <= 8);
            assert_eq!(h.sink.count_in(Holder::Group(gi as u32)), group.members.len());
            for m in &group.members {
                let d = Vec2::new(m.position.x - group.center.x, m.position.z - group.center.z);
                assert!(d.length() <= 8.0 + 1e-3, "member {d:?} outside group radius");
            }
            for other in &h.layout.groups[gi + 1..] {
                assert!(group.center.distance(other.center) >= 20.0 - 1e-3);
            }
        }
    }

    #[test]
    fn test_group_without_members_is_discarded() {
        let step = GroupPlacer {
            rules: vec![GroupRule {
                tries_per_member: 0,
                require_navigation: false,
                ..Default::default()
            }],
            ..Default::default()
        };
        let mut td = flat(33, 0.3);
        let mut h = Harness::new();
        let report = h.with(&mut td, |ctx| step.apply(ctx, 4)).expect("group step");
        assert_eq!(report.accepted, 0);
        assert!(report.requested >= 2);
        assert!(h.layout.groups.is_empty());
        assert_eq!(h.sink.instantiated(), 0, "a failed group leaves nothing behind");
    }

    #[test]
    fn test_groups_need_navigation_by_default() {
        let step = GroupPlacer::default();
        let mut td = flat(33, 0.3);
        let mut h = Harness::new();
        let report = h.with(&mut td, |ctx| step.apply(ctx, 4)).expect("group step");
        assert_eq!(report.accepted, 0);
        assert_eq!(h.sink.live_count(), 0);
    }

    #[test]
    fn test_mobs_deterministic() {
        let step = MobPlacer::default();
        let mut a = flat(33, 0.3);
        let mut b = flat(33, 0.3);
        let mut ha = Harness::new();
        let mut hb = Harness::new();
        ha.with(&mut a, |ctx| step.apply(ctx, 55)).expect("mob step");
        hb.with(&mut b, |ctx| step.apply(ctx, 55)).expect("mob step");
        let pa: Vec<Vec3> = ha.layout.mobs.iter().map(|m| m.position).collect();
        let pb: Vec<Vec3> = hb.layout.mobs.iter().map(|m| m.position).collect();
        assert_eq!(pa, pb);
    }
}
