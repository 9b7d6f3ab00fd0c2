//! Reference [`Navigation`] implementation over a regular grid of walkable quads.
//!
//! Each grid cell is one quad of the terrain surface. A quad is walkable when
//! its slope is within the filter's limit, it is not over a hole and no
//! obstacle footprint covers its center. Every walkable quad contributes two
//! triangles.

use glam::{Vec2, Vec3};
use rustc_hash::FxHashSet;
use tracing::debug;

use crate::collab::{NavBuildStats, NavSourceFilter, Navigation, TerrainSurface};
use crate::heightfield::{Grid, TerrainData};

#[derive(Debug)]
pub struct GridNavigation {
    cells: usize,
    origin: Vec3,
    size: Vec3,
    walkable: Grid<bool>,
    /// World height at each cell center.
    heights: Grid<f32>,
    stats: NavBuildStats,
}

impl GridNavigation {
    /// A navigation grid of `cells x cells` quads. Nothing is walkable until [`Navigation::build`].
    pub fn new(cells: usize) -> Self {
        let cells = cells.max(1);
        Self {
            cells,
            origin: Vec3::ZERO,
            size: Vec3::ONE,
            walkable: Grid::new(cells, cells),
            heights: Grid::new(cells, cells),
            stats: NavBuildStats::default(),
        }
    }

    pub fn stats(&self) -> NavBuildStats {
        self.stats
    }

    pub fn is_walkable(&self, x: usize, y: usize) -> bool {
        self.walkable.get(x, y).unwrap_or(false)
    }

    fn cell_extent(&self) -> Vec2 {
        Vec2::new(self.size.x, self.size.z) / self.cells as f32
    }

    fn cell_center(&self, x: usize, y: usize) -> Vec3 {
        let ext = self.cell_extent();
        Vec3::new(
            self.origin.x + (x as f32 + 0.5) * ext.x,
            self.heights.get(x, y).unwrap_or(self.origin.y),
            self.origin.z + (y as f32 + 0.5) * ext.y,
        )
    }

    fn cell_of(&self, position: Vec3) -> (i64, i64) {
        let ext = self.cell_extent();
        (
            ((position.x - self.origin.x) / ext.x).floor() as i64,
            ((position.z - self.origin.z) / ext.y).floor() as i64,
        )
    }
}

impl Default for GridNavigation {
    fn default() -> Self {
        Self::new(128)
    }
}

impl Navigation for GridNavigation {
    fn build(&mut self, terrain: &TerrainData, filter: &NavSourceFilter) -> NavBuildStats {
        self.origin = terrain.origin();
        self.size = terrain.size();
        self.walkable.fill(false);

        let n = self.cells;
        let mut corners: FxHashSet<(usize, usize)> = FxHashSet::default();
        let mut quads = 0usize;

        for y in 0..n {
            for x in 0..n {
                let u = (x as f32 + 0.5) / n as f32;
                let v = (y as f32 + 0.5) / n as f32;
                let center = terrain.surface_point(u, v);
                self.heights.set(x, y, center.y);

                if terrain.slope01(u, v) > filter.max_slope01 {
                    continue;
                }
                if terrain.holes.sample_nearest(u, v) {
                    continue;
                }
                let blocked = filter.obstacles.iter().any(|(p, r)| {
                    Vec2::new(p.x - center.x, p.z - center.z).length_squared() < r * r
                });
                if blocked {
                    continue;
                }

                self.walkable.set(x, y, true);
                quads += 1;
                corners.extend([(x, y), (x + 1, y), (x, y + 1), (x + 1, y + 1)]);
            }
        }

        self.stats = NavBuildStats {
            vertices: corners.len(),
            triangles: quads * 2,
        };
        debug!(
            cells = n,
            walkable = quads,
            triangles = self.stats.triangles,
            "grid navigation built"
        );
        self.stats
    }

    fn sample_nearest_point(&self, position: Vec3, radius: f32) -> Option<Vec3> {
        if self.stats.triangles == 0 || radius < 0.0 {
            return None;
        }
        let (cx, cy) = self.cell_of(position);
        let n = self.cells as i64;

        if (0..n).contains(&cx) && (0..n).contains(&cy) && self.is_walkable(cx as usize, cy as usize)
        {
            let center = self.cell_center(cx as usize, cy as usize);
            return Some(Vec3::new(position.x, center.y, position.z));
        }

        let ext = self.cell_extent();
        let reach_x = (radius / ext.x).ceil() as i64;
        let reach_y = (radius / ext.y).ceil() as i64;
        let here = Vec2::new(position.x, position.z);
        let mut best: Option<(f32, Vec3)> = None;

        for y in (cy - reach_y).max(0)..=(cy + reach_y).min(n - 1) {
            for x in (cx - reach_x).max(0)..=(cx + reach_x).min(n - 1) {
                if !self.is_walkable(x as usize, y as usize) {
                    continue;
                }
                let c = self.cell_center(x as usize, y as usize);
                let d = Vec2::new(c.x, c.z).distance(here);
                if d <= radius && best.is_none_or(|(bd, _)| d < bd) {
                    best = Some((d, c));
                }
            }
        }
        best.map(|(_, p)| p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heightfield::TerrainDesc;

    fn flat_terrain() -> TerrainData {
        let desc = TerrainDesc {
            resolution: 17,
            size: [100.0, 20.0, 100.0],
            weight_resolution: 8,
            hole_resolution: 16,
            detail_resolution: 32,
            ..Default::default()
        };
        TerrainData::new(&desc).expect("valid desc")
    }

    fn filter() -> NavSourceFilter {
        NavSourceFilter {
            max_slope01: 0.5,
            obstacles: Vec::new(),
        }
    }

    #[test]
    fn test_flat_terrain_fully_walkable() {
        let terrain = flat_terrain();
        let mut nav = GridNavigation::new(10);
        let stats = nav.build(&terrain, &filter());
        assert_eq!(stats.triangles, 200, "two triangles per quad");
        assert_eq!(stats.vertices, 121);
    }

    #[test]
    fn test_holes_and_obstacles_block_cells() {
        let mut terrain = flat_terrain();
        terrain.holes.fill(true);
        let mut nav = GridNavigation::new(10);
        assert_eq!(nav.build(&terrain, &filter()).triangles, 0);

        let terrain = flat_terrain();
        let f = NavSourceFilter {
            max_slope01: 0.5,
            obstacles: vec![(Vec3::new(55.0, 0.0, 55.0), 2.0)],
        };
        let stats = nav.build(&terrain, &f);
        assert_eq!(stats.triangles, 198, "one quad under the obstacle");
        assert!(!nav.is_walkable(5, 5));
    }

    #[test]
    fn test_sample_nearest_point_snaps_to_walkable() {
        let terrain = flat_terrain();
        let mut nav = GridNavigation::new(10);
        let f = NavSourceFilter {
            max_slope01: 0.5,
            obstacles: vec![(Vec3::new(55.0, 0.0, 55.0), 2.0)],
        };
        nav.build(&terrain, &f);

        let inside = nav.sample_nearest_point(Vec3::new(12.0, 5.0, 13.0), 1.0);
        assert_eq!(inside, Some(Vec3::new(12.0, 0.0, 13.0)));

        let snapped = nav
            .sample_nearest_point(Vec3::new(55.0, 0.0, 55.0), 12.0)
            .expect("a neighbour is walkable");
        assert!(
            (snapped.x - 55.0).abs() + (snapped.z - 55.0).abs() >= 10.0 - 1e-4,
            "snap must leave the blocked cell, got {snapped}"
        );

        assert_eq!(nav.sample_nearest_point(Vec3::new(55.0, 0.0, 55.0), 2.0), None);
    }

    #[test]
    fn test_unbuilt_navigation_answers_none() {
        let nav = GridNavigation::new(4);
        assert_eq!(nav.sample_nearest_point(Vec3::ZERO, 100.0), None);
    }
}
