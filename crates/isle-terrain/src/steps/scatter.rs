//! Minimum-distance bookkeeping shared by the scatter steps.
//!
//! Small targets are checked brute force; large targets bucket accepted
//! points into a hash grid with cells of `min_distance` and scan the 3x3
//! neighbourhood.

use glam::Vec3;
use rustc_hash::FxHashMap;

/// Targets at or above this count use the hash grid.
pub const GRID_THRESHOLD: usize = 64;

/// Spacings at or below this are treated as "no constraint".
const MIN_SPACING: f32 = 0.01;

/// How distances between accepted points are measured.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Metric {
    /// Ignore height: distance on the XZ plane.
    Planar,
    /// Full 3D distance.
    Spatial,
}

/// Accepted points of one rule plus the spacing they must keep.
#[derive(Debug)]
pub struct MinDistanceSet {
    min_distance: f32,
    metric: Metric,
    points: Vec<Vec3>,
    grid: Option<FxHashMap<(i32, i32), Vec<usize>>>,
}

impl MinDistanceSet {
    /// `expected` is the number of points the caller is trying to place.
    pub fn new(min_distance: f32, metric: Metric, expected: usize) -> Self {
        let grid = (expected >= GRID_THRESHOLD && min_distance > MIN_SPACING)
            .then(FxHashMap::default);
        Self {
            min_distance,
            metric,
            points: Vec::with_capacity(expected.min(4096)),
            grid,
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[Vec3] {
        &self.points
    }

    pub fn uses_grid(&self) -> bool {
        self.grid.is_some()
    }

    fn cell(&self, p: Vec3) -> (i32, i32) {
        (
            (p.x / self.min_distance).floor() as i32,
            (p.z / self.min_distance).floor() as i32,
        )
    }

    fn too_close(&self, a: Vec3, b: Vec3) -> bool {
        let d2 = match self.metric {
            Metric::Planar => (a.x - b.x).powi(2) + (a.z - b.z).powi(2),
            Metric::Spatial => a.distance_squared(b),
        };
        d2 < self.min_distance * self.min_distance
    }

    /// True when `p` keeps the spacing to every accepted point.
    pub fn is_clear(&self, p: Vec3) -> bool {
        if self.min_distance <= MIN_SPACING {
            return true;
        }

        let Some(grid) = &self.grid else {
            return !self.points.iter().any(|&q| self.too_close(p, q));
        };

        // The planar 3x3 scan also covers the spatial metric: 3D distance is
        // never shorter than its XZ projection.
        let (cx, cz) = self.cell(p);
        for dz in -1..=1 {
            for dx in -1..=1 {
                let Some(bucket) = grid.get(&(cx + dx, cz + dz)) else {
                    continue;
                };
                if bucket.iter().any(|&i| self.too_close(p, self.points[i])) {
                    return false;
                }
            }
        }
        true
    }

    pub fn insert(&mut self, p: Vec3) {
        let index = self.points.len();
        let key = self.cell(p);
        if let Some(grid) = &mut self.grid {
            grid.entry(key).or_default().push(index);
        }
        self.points.push(p);
    }

    /// Insert `p` if it is clear. Returns whether it was inserted.
    pub fn try_insert(&mut self, p: Vec3) -> bool {
        if self.is_clear(p) {
            self.insert(p);
            true
        } else {
            false
        }
    }
}
