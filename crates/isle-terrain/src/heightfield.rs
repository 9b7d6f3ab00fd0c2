//! Heightfield and companion grids shared by every generation step.
//!
//! Heights are stored normalized in `[0, 1]`; conversion to world units only
//! happens at sampling time through [`Heightfield::size`] and
//! [`Heightfield::origin`]. None of the grids are ever resized after
//! construction, except the detail maps whose resolution the detail painter
//! may force.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;
use crate::seed::checksum_f32;

/// Detail map resolutions outside this range are clamped.
pub const DETAIL_RESOLUTION_RANGE: (usize, usize) = (32, 4096);

// ---------------------------------------------------------------------------
// Grid
// ---------------------------------------------------------------------------

/// Dense row-major 2D grid. Every access is bounds-checked.
#[derive(Clone, Debug, PartialEq)]
pub struct Grid<T> {
    width: usize,
    height: usize,
    cells: Vec<T>,
}

impl<T: Copy + Default> Grid<T> {
    pub fn new(width: usize, height: usize) -> Self {
        Self::filled(width, height, T::default())
    }

    pub fn filled(width: usize, height: usize, value: T) -> Self {
        Self {
            width,
            height,
            cells: vec![value; width * height],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    fn index(&self, x: usize, y: usize) -> Option<usize> {
        (x < self.width && y < self.height).then_some(y * self.width + x)
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> Option<T> {
        self.index(x, y).map(|i| self.cells[i])
    }

    /// Writes a cell. Out-of-range writes are ignored and reported as `false`.
    #[inline]
    pub fn set(&mut self, x: usize, y: usize, value: T) -> bool {
        match self.index(x, y) {
            Some(i) => {
                self.cells[i] = value;
                true
            }
            None => false,
        }
    }

    pub fn fill(&mut self, value: T) {
        self.cells.fill(value);
    }

    /// Value of the cell nearest to normalized coordinates `(u, v)`.
    pub fn sample_nearest(&self, u: f32, v: f32) -> T {
        if self.cells.is_empty() {
            return T::default();
        }
        let x = nearest_cell(u, self.width);
        let y = nearest_cell(v, self.height);
        self.cells[y * self.width + x]
    }

    pub fn as_slice(&self) -> &[T] {
        &self.cells
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.cells.iter()
    }
}

/// Rounds a normalized coordinate to a cell index in `[0, n - 1]`.
#[inline]
pub(crate) fn nearest_cell(t: f32, n: usize) -> usize {
    if n <= 1 {
        return 0;
    }
    let max = (n - 1) as f32;
    (t * max).round().clamp(0.0, max) as usize
}

/// Normalized coordinate of cell `i` on an axis of `n` samples.
#[inline]
pub(crate) fn cell_to_unit(i: usize, n: usize) -> f32 {
    if n <= 1 { 0.0 } else { i as f32 / (n - 1) as f32 }
}

// ---------------------------------------------------------------------------
// Heightfield
// ---------------------------------------------------------------------------

/// Square grid of normalized elevation samples with a world-space footprint.
#[derive(Clone, Debug)]
pub struct Heightfield {
    resolution: usize,
    size: Vec3,
    origin: Vec3,
    heights: Grid<f32>,
}

impl Heightfield {
    pub fn new(resolution: usize, size: Vec3, origin: Vec3) -> Result<Self, PipelineError> {
        if resolution < 2 {
            return Err(PipelineError::InvalidResolution { resolution });
        }
        if !(size.x > 0.0 && size.y > 0.0 && size.z > 0.0) {
            return Err(PipelineError::InvalidSize {
                size: size.to_array(),
            });
        }
        Ok(Self {
            resolution,
            size,
            origin,
            heights: Grid::new(resolution, resolution),
        })
    }

    pub fn resolution(&self) -> usize {
        self.resolution
    }

    pub fn size(&self) -> Vec3 {
        self.size
    }

    pub fn origin(&self) -> Vec3 {
        self.origin
    }

    pub fn heights(&self) -> &Grid<f32> {
        &self.heights
    }

    #[inline]
    pub fn height01(&self, x: usize, y: usize) -> Option<f32> {
        self.heights.get(x, y)
    }

    /// Writes a normalized height, clamped into `[0, 1]`.
    #[inline]
    pub fn set_height01(&mut self, x: usize, y: usize, h: f32) -> bool {
        self.heights.set(x, y, h.clamp(0.0, 1.0))
    }

    /// Bilinear sample of normalized height at `(u, v)`, clamped to the edges.
    pub fn sample_height01(&self, u: f32, v: f32) -> f32 {
        let max = (self.resolution - 1) as f32;
        let fx = (u.clamp(0.0, 1.0)) * max;
        let fy = (v.clamp(0.0, 1.0)) * max;
        let x0 = (fx.floor() as usize).min(self.resolution - 1);
        let y0 = (fy.floor() as usize).min(self.resolution - 1);
        let x1 = (x0 + 1).min(self.resolution - 1);
        let y1 = (y0 + 1).min(self.resolution - 1);
        let tx = fx - x0 as f32;
        let ty = fy - y0 as f32;

        let h = |x, y| self.heights.get(x, y).unwrap_or(0.0);
        let top = h(x0, y0) + (h(x1, y0) - h(x0, y0)) * tx;
        let bottom = h(x0, y1) + (h(x1, y1) - h(x0, y1)) * tx;
        top + (bottom - top) * ty
    }

    /// Unit surface normal at `(u, v)` from central differences in world units.
    pub fn sample_normal(&self, u: f32, v: f32) -> Vec3 {
        let step = 1.0 / (self.resolution - 1) as f32;
        let u0 = (u - step).max(0.0);
        let u1 = (u + step).min(1.0);
        let v0 = (v - step).max(0.0);
        let v1 = (v + step).min(1.0);

        let dx_world = ((u1 - u0) * self.size.x).max(f32::EPSILON);
        let dz_world = ((v1 - v0) * self.size.z).max(f32::EPSILON);
        let dh_du = (self.sample_height01(u1, v) - self.sample_height01(u0, v)) * self.size.y;
        let dh_dv = (self.sample_height01(u, v1) - self.sample_height01(u, v0)) * self.size.y;

        Vec3::new(-dh_du / dx_world, 1.0, -dh_dv / dz_world)
            .try_normalize()
            .unwrap_or(Vec3::Y)
    }

    /// Bit-exact digest of all samples.
    pub fn checksum(&self) -> u64 {
        checksum_f32(self.heights.as_slice())
    }
}

// ---------------------------------------------------------------------------
// Surface weights
// ---------------------------------------------------------------------------

/// Layer order of the surface weight grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SurfaceLayer {
    Grass = 0,
    Dirt = 1,
    Rock = 2,
    Snow = 3,
}

/// `width x height x layers` blend weights; each cell sums to 1.
#[derive(Clone, Debug)]
pub struct SurfaceWeights {
    width: usize,
    height: usize,
    layers: usize,
    weights: Vec<f32>,
}

impl SurfaceWeights {
    /// A fresh grid with every cell fully on the base layer.
    pub fn new(width: usize, height: usize, layers: usize) -> Self {
        let mut grid = Self {
            width,
            height,
            layers: 0,
            weights: Vec::new(),
        };
        grid.reset(layers);
        grid
    }

    /// Discard all weights and switch to `layers` channels (base layer = 1).
    pub fn reset(&mut self, layers: usize) {
        let layers = layers.max(1);
        self.layers = layers;
        self.weights = vec![0.0; self.width * self.height * layers];
        for cell in self.weights.chunks_exact_mut(layers) {
            cell[0] = 1.0;
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn layers(&self) -> usize {
        self.layers
    }

    pub fn cell(&self, x: usize, y: usize) -> Option<&[f32]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let start = (y * self.width + x) * self.layers;
        Some(&self.weights[start..start + self.layers])
    }

    /// Overwrites one cell. Returns `false` when out of range or the layer count mismatches.
    pub fn set_cell(&mut self, x: usize, y: usize, values: &[f32]) -> bool {
        if x >= self.width || y >= self.height || values.len() != self.layers {
            return false;
        }
        let start = (y * self.width + x) * self.layers;
        self.weights[start..start + self.layers].copy_from_slice(values);
        true
    }

    pub fn weight(&self, x: usize, y: usize, layer: SurfaceLayer) -> f32 {
        self.cell(x, y)
            .and_then(|c| c.get(layer as usize).copied())
            .unwrap_or(0.0)
    }

    pub fn cells(&self) -> impl Iterator<Item = &[f32]> {
        self.weights.chunks_exact(self.layers)
    }

    pub fn checksum(&self) -> u64 {
        checksum_f32(&self.weights)
    }
}

// ---------------------------------------------------------------------------
// Terrain description and data
// ---------------------------------------------------------------------------

/// World dimensions and grid resolutions.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainDesc {
    /// Heightfield samples per side.
    pub resolution: usize,
    /// World extent `(x, y, z)`; `y` is the height of a normalized sample of 1.
    pub size: [f32; 3],
    pub origin: [f32; 3],
    /// Surface weight cells per side.
    pub weight_resolution: usize,
    /// Hole cells per side.
    pub hole_resolution: usize,
    /// Detail density cells per side.
    pub detail_resolution: usize,
}

impl Default for TerrainDesc {
    fn default() -> Self {
        Self {
            resolution: 513,
            size: [1000.0, 600.0, 1000.0],
            origin: [0.0, 0.0, 0.0],
            weight_resolution: 512,
            hole_resolution: 512,
            detail_resolution: 1024,
        }
    }
}

/// Everything the generation pipeline reads and writes.
#[derive(Clone, Debug)]
pub struct TerrainData {
    pub heightfield: Heightfield,
    /// Feature influence per heightfield sample, `[0, 1]`. Only ever raised.
    pub feature_mask: Grid<f32>,
    pub surface_weights: SurfaceWeights,
    /// `true` marks a hole in the surface.
    pub holes: Grid<bool>,
    /// One density map per detail rule.
    pub details: Vec<Grid<u32>>,
    detail_resolution: usize,
}

impl TerrainData {
    pub fn new(desc: &TerrainDesc) -> Result<Self, PipelineError> {
        let heightfield = Heightfield::new(
            desc.resolution,
            Vec3::from_array(desc.size),
            Vec3::from_array(desc.origin),
        )?;
        for (grid, resolution) in [
            ("surface weight", desc.weight_resolution),
            ("hole", desc.hole_resolution),
        ] {
            if resolution < 2 {
                return Err(PipelineError::InvalidWeightGrid { grid, resolution });
            }
        }

        Ok(Self {
            feature_mask: Grid::new(desc.resolution, desc.resolution),
            surface_weights: SurfaceWeights::new(desc.weight_resolution, desc.weight_resolution, 3),
            holes: Grid::new(desc.hole_resolution, desc.hole_resolution),
            details: Vec::new(),
            detail_resolution: clamp_detail_resolution(desc.detail_resolution),
            heightfield,
        })
    }

    pub fn detail_resolution(&self) -> usize {
        self.detail_resolution
    }

    /// Change the detail resolution and drop all existing density maps.
    pub fn set_detail_resolution(&mut self, resolution: usize) {
        self.detail_resolution = clamp_detail_resolution(resolution);
        self.details.clear();
    }

    /// Nearest feature mask value at `(u, v)`.
    pub fn sample_feature_mask(&self, u: f32, v: f32) -> f32 {
        self.feature_mask.sample_nearest(u, v)
    }

    pub fn feature_mask_checksum(&self) -> u64 {
        checksum_f32(self.feature_mask.as_slice())
    }
}

fn clamp_detail_resolution(resolution: usize) -> usize {
    resolution.clamp(DETAIL_RESOLUTION_RANGE.0, DETAIL_RESOLUTION_RANGE.1)
}
