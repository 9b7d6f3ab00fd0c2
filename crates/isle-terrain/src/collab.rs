//! Seams to the outside world: sampling, prefab handles, instance lifecycle,
//! navigation and presentation.
//!
//! Generation and streaming only ever talk to engines through these traits.
//! Steps never own scene objects; they emit [`Placement`]s and keep the
//! returned [`InstanceHandle`]s in plain data records.

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::heightfield::{Heightfield, TerrainData};
use crate::layout::Layout;
use crate::math::slope01_from_normal;

// ---------------------------------------------------------------------------
// Sampling surface
// ---------------------------------------------------------------------------

/// World-space sample of the terrain surface.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SurfaceSample {
    /// World height of the surface.
    pub height: f32,
    pub normal: Vec3,
    pub height01: f32,
    pub slope01: f32,
}

/// Read access to a heightfield-like surface.
pub trait TerrainSurface {
    fn sample_height01(&self, u: f32, v: f32) -> f32;
    fn sample_normal(&self, u: f32, v: f32) -> Vec3;
    fn size(&self) -> Vec3;
    fn origin(&self) -> Vec3;

    fn slope01(&self, u: f32, v: f32) -> f32 {
        slope01_from_normal(self.sample_normal(u, v))
    }

    /// Normalized coordinates of world `(x, z)`, or `None` outside the footprint.
    fn world_to_uv(&self, x: f32, z: f32) -> Option<(f32, f32)> {
        let origin = self.origin();
        let size = self.size();
        let u = (x - origin.x) / size.x;
        let v = (z - origin.z) / size.z;
        ((0.0..=1.0).contains(&u) && (0.0..=1.0).contains(&v)).then_some((u, v))
    }

    /// World position of the surface at `(u, v)`.
    fn surface_point(&self, u: f32, v: f32) -> Vec3 {
        let origin = self.origin();
        let size = self.size();
        Vec3::new(
            origin.x + u * size.x,
            origin.y + self.sample_height01(u, v) * size.y,
            origin.z + v * size.z,
        )
    }

    /// Full sample at world `(x, z)`; `None` off the terrain.
    fn sample(&self, x: f32, z: f32) -> Option<SurfaceSample> {
        let (u, v) = self.world_to_uv(x, z)?;
        let height01 = self.sample_height01(u, v).clamp(0.0, 1.0);
        let normal = self.sample_normal(u, v);
        Some(SurfaceSample {
            height: self.origin().y + height01 * self.size().y,
            normal,
            height01,
            slope01: slope01_from_normal(normal),
        })
    }
}

impl TerrainSurface for Heightfield {
    fn sample_height01(&self, u: f32, v: f32) -> f32 {
        Heightfield::sample_height01(self, u, v)
    }

    fn sample_normal(&self, u: f32, v: f32) -> Vec3 {
        Heightfield::sample_normal(self, u, v)
    }

    fn size(&self) -> Vec3 {
        Heightfield::size(self)
    }

    fn origin(&self) -> Vec3 {
        Heightfield::origin(self)
    }
}

impl TerrainSurface for TerrainData {
    fn sample_height01(&self, u: f32, v: f32) -> f32 {
        self.heightfield.sample_height01(u, v)
    }

    fn sample_normal(&self, u: f32, v: f32) -> Vec3 {
        self.heightfield.sample_normal(u, v)
    }

    fn size(&self) -> Vec3 {
        self.heightfield.size()
    }

    fn origin(&self) -> Vec3 {
        self.heightfield.origin()
    }
}

// ---------------------------------------------------------------------------
// Prefab catalog
// ---------------------------------------------------------------------------

/// Opaque handle to a prefab in the host's catalog.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PrefabId(pub u32);

/// A prefab with a relative selection weight.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct WeightedPrefab {
    pub prefab: PrefabId,
    pub weight: f32,
}

impl WeightedPrefab {
    pub fn new(prefab: u32, weight: f32) -> Self {
        Self {
            prefab: PrefabId(prefab),
            weight,
        }
    }
}

/// Choose a prefab by weight using a roll in `[0, 1)`.
///
/// Entries with non-positive weight are skipped. If every weight is
/// non-positive the first entry wins. Returns `None` only for an empty list.
pub fn pick_weighted(prefabs: &[WeightedPrefab], roll01: f32) -> Option<PrefabId> {
    let total: f32 = prefabs.iter().filter(|p| p.weight > 0.0).map(|p| p.weight).sum();
    if total <= 0.0 {
        return prefabs.first().map(|p| p.prefab);
    }

    let mut r = roll01.clamp(0.0, 1.0) * total;
    let mut last = None;
    for p in prefabs.iter().filter(|p| p.weight > 0.0) {
        last = Some(p.prefab);
        r -= p.weight;
        if r <= 0.0 {
            return last;
        }
    }
    last
}

// ---------------------------------------------------------------------------
// Instance lifecycle
// ---------------------------------------------------------------------------

/// Handle to a live instance owned by an [`InstanceSink`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceHandle(pub u64);

/// Coarse classification used for collision and navigation filtering.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LayerTag {
    #[default]
    Default,
    /// Blocks navigation.
    Obstacle,
    Detail,
    Mob,
    Marker,
}

/// Where an instance sits in the host hierarchy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Holder {
    Caves,
    Props,
    Mobs,
    /// Members of one placed group, by group index.
    Group(u32),
    Streaming,
    Pool,
}

/// Transform and tag of one instance.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Placement {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
    pub layer: LayerTag,
}

impl Placement {
    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
            layer: LayerTag::Default,
        }
    }
}

/// Host-side instance lifecycle.
pub trait InstanceSink {
    fn instantiate(&mut self, prefab: PrefabId, placement: &Placement, holder: Holder)
    -> InstanceHandle;
    fn set_transform(&mut self, instance: InstanceHandle, placement: &Placement);
    fn set_active(&mut self, instance: InstanceHandle, active: bool);
    fn reparent(&mut self, instance: InstanceHandle, holder: Holder);
    fn destroy(&mut self, instance: InstanceHandle);
}

// ---------------------------------------------------------------------------
// Navigation
// ---------------------------------------------------------------------------

/// What the navigation build should consider walkable.
#[derive(Clone, Debug, PartialEq)]
pub struct NavSourceFilter {
    pub max_slope01: f32,
    /// Blocking footprints `(center, radius)` in world units.
    pub obstacles: Vec<(Vec3, f32)>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NavBuildStats {
    pub vertices: usize,
    pub triangles: usize,
}

/// Opaque navigation surface builder and query.
pub trait Navigation {
    fn build(&mut self, terrain: &TerrainData, filter: &NavSourceFilter) -> NavBuildStats;
    /// Nearest navigable point within `radius` of `position`.
    fn sample_nearest_point(&self, position: Vec3, radius: f32) -> Option<Vec3>;
}

// ---------------------------------------------------------------------------
// Presentation
// ---------------------------------------------------------------------------

/// Receives the finished dataset once the pipeline completes.
pub trait TerrainPresenter {
    fn flush(&mut self, terrain: &TerrainData, layout: &Layout);
    fn sync_transforms(&mut self);
}

/// Presenter that discards everything.
#[derive(Debug, Default)]
pub struct NullPresenter;

impl TerrainPresenter for NullPresenter {
    fn flush(&mut self, _terrain: &TerrainData, _layout: &Layout) {}
    fn sync_transforms(&mut self) {}
}

/// The external collaborators a generation run talks to.
pub struct Collaborators<'a> {
    pub navigation: &'a mut dyn Navigation,
    pub instances: &'a mut dyn InstanceSink,
    pub presenter: &'a mut dyn TerrainPresenter,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pick_weighted_respects_weights() {
        let prefabs = [WeightedPrefab::new(1, 1.0), WeightedPrefab::new(2, 3.0)];
        assert_eq!(pick_weighted(&prefabs, 0.0), Some(PrefabId(1)));
        assert_eq!(pick_weighted(&prefabs, 0.2), Some(PrefabId(1)));
        assert_eq!(pick_weighted(&prefabs, 0.3), Some(PrefabId(2)));
        assert_eq!(pick_weighted(&prefabs, 0.999), Some(PrefabId(2)));
    }

    #[test]
    fn test_pick_weighted_skips_zero_weights() {
        let prefabs = [
            WeightedPrefab::new(1, 0.0),
            WeightedPrefab::new(2, 1.0),
            WeightedPrefab::new(3, -4.0),
        ];
        for i in 0..10 {
            assert_eq!(pick_weighted(&prefabs, i as f32 / 10.0), Some(PrefabId(2)));
        }
    }

    #[test]
    fn test_pick_weighted_all_zero_falls_back_to_first() {
        let prefabs = [WeightedPrefab::new(9, 0.0), WeightedPrefab::new(8, 0.0)];
        assert_eq!(pick_weighted(&prefabs, 0.7), Some(PrefabId(9)));
        assert_eq!(pick_weighted(&[], 0.7), None);
    }

    #[test]
    fn test_world_to_uv_rejects_outside() {
        let hf = Heightfield::new(5, Vec3::new(100.0, 10.0, 50.0), Vec3::new(10.0, 0.0, -5.0))
            .expect("valid heightfield");
        assert_eq!(hf.world_to_uv(60.0, 20.0), Some((0.5, 0.5)));
        assert_eq!(hf.world_to_uv(5.0, 0.0), None);
        assert!(hf.sample(200.0, 0.0).is_none());
    }

    #[test]
    fn test_sample_reports_world_height() {
        let mut hf = Heightfield::new(3, Vec3::new(10.0, 20.0, 10.0), Vec3::new(0.0, 5.0, 0.0))
            .expect("valid heightfield");
        for y in 0..3 {
            for x in 0..3 {
                hf.set_height01(x, y, 0.5);
            }
        }
        let s = hf.sample(5.0, 5.0).expect("inside footprint");
        assert!((s.height - 15.0).abs() < 1e-5, "5 + 0.5 * 20 = 15, got {}", s.height);
        assert!(s.slope01 < 1e-6);
    }
}
