//! Keeps a moving viewpoint surrounded by streamed instances.
//!
//! The world is cut into square planar chunks. Each tick the spawner builds
//! the nearest missing chunks inside the spawn radius, up to a per-tick
//! budget, and retires chunks that drifted past the despawn radius. Chunk
//! content is a pure function of `(base seed, chunk, rule, trial)`: no state
//! carried between chunks feeds into placement, so a chunk rebuilt later looks
//! exactly like it did the first time.

use glam::{Vec2, Vec3};
use noise::Perlin;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use isle_terrain::hash::{chunk_rule_hash, fold_seed, hash01};
use isle_terrain::steps::surface_rotation;
use isle_terrain::{
    InstanceSink, LayerTag, Placement, PrefabId, TerrainSurface, lerp, pick_weighted,
};

use crate::chunk::{ChunkCoord, ChunkRecord, SpawnedInstance};
use crate::pool::InstancePool;
use crate::queue::ChunkBuildQueue;
use crate::rule::SpawnRule;

// Per-purpose salts for the trial draws.
const SALT_ACCEPT: u32 = 0xB529_7A4D;
const SALT_PREFAB: u32 = 0xC2B2_AE35;
const SALT_SCALE: u32 = 0x1656_67B1;
const SALT_YAW: u32 = 0x9E37_79B9;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SpawnerError {
    #[error("chunk size must be positive and finite, got {0}")]
    InvalidChunkSize(f32),
    #[error("invalid radii: spawn {spawn}, despawn {despawn}")]
    InvalidRadius { spawn: f32, despawn: f32 },
    #[error("at least one chunk must be buildable per tick")]
    ZeroBudget,
    #[error("{0}")]
    InvalidRule(String),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpawnerConfig {
    pub spawn_radius: f32,
    /// Chunks are retired beyond `max(despawn_radius, spawn_radius + chunk_size)`.
    pub despawn_radius: f32,
    pub chunk_size: f32,
    pub max_new_chunks_per_tick: usize,
    /// Fixed base seed; `None` follows the generation seed.
    pub seed_override: Option<u32>,
    pub rules: Vec<SpawnRule>,
}

impl Default for SpawnerConfig {
    fn default() -> Self {
        Self {
            spawn_radius: 70.0,
            despawn_radius: 85.0,
            chunk_size: 16.0,
            max_new_chunks_per_tick: 2,
            seed_override: None,
            rules: vec![SpawnRule::default()],
        }
    }
}

impl SpawnerConfig {
    pub fn validate(&self) -> Result<(), SpawnerError> {
        if !(self.chunk_size.is_finite() && self.chunk_size > 0.0) {
            return Err(SpawnerError::InvalidChunkSize(self.chunk_size));
        }
        if !(self.spawn_radius.is_finite() && self.spawn_radius > 0.0)
            || !(self.despawn_radius.is_finite() && self.despawn_radius >= 0.0)
        {
            return Err(SpawnerError::InvalidRadius {
                spawn: self.spawn_radius,
                despawn: self.despawn_radius,
            });
        }
        if self.max_new_chunks_per_tick == 0 {
            return Err(SpawnerError::ZeroBudget);
        }
        for rule in &self.rules {
            rule.validate().map_err(SpawnerError::InvalidRule)?;
        }
        Ok(())
    }

    /// Distance beyond which a built chunk is retired.
    ///
    /// Never tighter than one chunk past the spawn radius, so a chunk cannot
    /// flicker between built and retired while the viewpoint hovers at the edge.
    pub fn retire_radius(&self) -> f32 {
        self.despawn_radius.max(self.spawn_radius + self.chunk_size)
    }

    /// Chunk rings scanned around the viewpoint chunk.
    pub fn scan_rings(&self) -> i32 {
        (self.spawn_radius / self.chunk_size).ceil() as i32
    }
}

/// One instance a chunk build wants, before it is backed by a scene object.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlannedInstance {
    pub rule_index: usize,
    pub prefab: PrefabId,
    pub placement: Placement,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChunkPlan {
    pub instances: Vec<PlannedInstance>,
    pub starved_rules: usize,
}

/// What one tick did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Missing chunks inside the spawn radius at the start of the tick.
    pub candidates: usize,
    pub built: usize,
    /// Candidates left for later ticks by the build budget.
    pub deferred: usize,
    pub destroyed: usize,
    pub spawned: usize,
    pub released: usize,
    /// Rules in this tick's builds that ran out of trials.
    pub starved_rules: usize,
}

pub struct ChunkSpawner {
    config: SpawnerConfig,
    base_seed: u32,
    noise: Perlin,
    chunks: FxHashMap<ChunkCoord, ChunkRecord>,
    queue: ChunkBuildQueue,
    pool: InstancePool,
}

impl ChunkSpawner {
    pub fn new(config: SpawnerConfig, generation_seed: u64) -> Result<Self, SpawnerError> {
        config.validate()?;
        let base_seed = config.seed_override.unwrap_or_else(|| fold_seed(generation_seed));
        Ok(Self {
            config,
            base_seed,
            noise: Perlin::new(base_seed),
            chunks: FxHashMap::default(),
            queue: ChunkBuildQueue::new(),
            pool: InstancePool::new(),
        })
    }

    pub fn config(&self) -> &SpawnerConfig {
        &self.config
    }

    pub fn base_seed(&self) -> u32 {
        self.base_seed
    }

    pub fn pool(&self) -> &InstancePool {
        &self.pool
    }

    pub fn chunk(&self, coord: ChunkCoord) -> Option<&ChunkRecord> {
        self.chunks.get(&coord)
    }

    pub fn is_built(&self, coord: ChunkCoord) -> bool {
        self.chunks.contains_key(&coord)
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn chunks(&self) -> impl Iterator<Item = &ChunkRecord> {
        self.chunks.values()
    }

    pub fn instance_count(&self) -> usize {
        self.chunks.values().map(ChunkRecord::len).sum()
    }

    /// Run one streaming step for `viewpoint`.
    pub fn tick(
        &mut self,
        viewpoint: Vec3,
        surface: &dyn TerrainSurface,
        sink: &mut dyn InstanceSink,
    ) -> TickReport {
        let mut report = TickReport::default();
        let chunk_size = self.config.chunk_size;
        let center = ChunkCoord::from_world(viewpoint, chunk_size);
        let rings = self.config.scan_rings();

        self.queue.clear();
        for dz in -rings..=rings {
            for dx in -rings..=rings {
                let coord = center.offset(dx, dz);
                if self.chunks.contains_key(&coord) {
                    continue;
                }
                let distance = coord.center_distance(viewpoint, chunk_size);
                if distance <= self.config.spawn_radius {
                    self.queue.enqueue(coord, distance);
                }
            }
        }
        report.candidates = self.queue.len();

        for _ in 0..self.config.max_new_chunks_per_tick {
            let Some((_, coord)) = self.queue.dequeue() else {
                break;
            };
            let record = self.build_chunk(coord, surface, sink);
            report.built += 1;
            report.spawned += record.len();
            report.starved_rules += record.starved_rules;
            self.chunks.insert(coord, record);
        }
        report.deferred = self.queue.len();

        let retire = self.config.retire_radius();
        let mut stale: Vec<ChunkCoord> = self
            .chunks
            .keys()
            .copied()
            .filter(|c| c.center_distance(viewpoint, chunk_size) > retire)
            .collect();
        stale.sort();
        for coord in stale {
            if let Some(record) = self.chunks.remove(&coord) {
                report.released += self.retire_chunk(record, sink);
                report.destroyed += 1;
            }
        }

        if report.built > 0 || report.destroyed > 0 {
            debug!(
                chunk_x = center.x,
                chunk_y = center.y,
                built = report.built,
                destroyed = report.destroyed,
                deferred = report.deferred,
                active = self.chunks.len(),
                "streaming tick"
            );
        }
        report
    }

    /// Retire every chunk and destroy everything the pool holds.
    pub fn clear(&mut self, sink: &mut dyn InstanceSink) -> usize {
        let mut coords: Vec<ChunkCoord> = self.chunks.keys().copied().collect();
        coords.sort();
        for coord in coords {
            if let Some(record) = self.chunks.remove(&coord) {
                self.retire_chunk(record, sink);
            }
        }
        self.queue.clear();
        self.pool.drain(sink)
    }

    /// Compute what `coord` would contain, without touching any instances.
    pub fn plan_chunk(&self, coord: ChunkCoord, surface: &dyn TerrainSurface) -> ChunkPlan {
        let mut plan = ChunkPlan::default();
        for (ri, rule) in self.config.rules.iter().enumerate() {
            if !rule.is_active() {
                continue;
            }
            let before = plan.instances.len();
            self.plan_rule(coord, ri, rule, surface, &mut plan.instances);
            let placed = plan.instances.len() - before;
            if placed < rule.target_count {
                plan.starved_rules += 1;
                debug!(
                    chunk_x = coord.x,
                    chunk_y = coord.y,
                    rule = %rule.name,
                    placed,
                    target = rule.target_count,
                    "chunk rule starved"
                );
            }
        }
        plan
    }

    fn plan_rule(
        &self,
        coord: ChunkCoord,
        ri: usize,
        rule: &SpawnRule,
        surface: &dyn TerrainSurface,
        out: &mut Vec<PlannedInstance>,
    ) {
        let chunk_size = self.config.chunk_size;
        let origin = coord.origin(chunk_size);
        let spacing = rule.spacing();
        let base = chunk_rule_hash(self.base_seed, coord.x, coord.y, ri as u32);
        let mut grid = LocalGrid::new(chunk_size, spacing);
        let mut placed = 0;

        for t in 0..rule.trials() as u32 {
            if placed >= rule.target_count {
                break;
            }
            let local = Vec2::new(
                hash01(base, t.wrapping_mul(2)) * chunk_size,
                hash01(base, t.wrapping_mul(2).wrapping_add(1)) * chunk_size,
            );
            let world = origin + local;

            let density = rule.density(&self.noise, world.x, world.y);
            if hash01(base, SALT_ACCEPT.wrapping_add(t)) > density {
                continue;
            }

            let Some(sample) = surface.sample(world.x, world.y) else {
                continue;
            };
            if sample.height01 < rule.min_height01 || sample.height01 > rule.max_height01 {
                continue;
            }
            if sample.slope01 > rule.max_slope01 {
                continue;
            }
            if !grid.try_insert(local) {
                continue;
            }

            let Some(prefab) = pick_weighted(&rule.prefabs, hash01(base, SALT_PREFAB.wrapping_add(t)))
            else {
                continue;
            };
            let scale = lerp(rule.scale_min, rule.scale_max, hash01(base, SALT_SCALE.wrapping_add(t)));
            let yaw = if rule.random_yaw {
                hash01(base, SALT_YAW.wrapping_add(t)) * 360.0
            } else {
                0.0
            };

            out.push(PlannedInstance {
                rule_index: ri,
                prefab,
                placement: Placement {
                    position: Vec3::new(world.x, sample.height + rule.y_offset, world.y),
                    rotation: surface_rotation(rule.align_to_normal, sample.normal, yaw),
                    scale: Vec3::splat(scale),
                    layer: LayerTag::Detail,
                },
            });
            placed += 1;
        }
    }

    fn build_chunk(
        &mut self,
        coord: ChunkCoord,
        surface: &dyn TerrainSurface,
        sink: &mut dyn InstanceSink,
    ) -> ChunkRecord {
        let plan = self.plan_chunk(coord, surface);
        let mut record = ChunkRecord::new(coord);
        record.starved_rules = plan.starved_rules;
        record.instances.reserve(plan.instances.len());
        for p in plan.instances {
            let instance = self.pool.acquire(sink, p.prefab, &p.placement);
            record.instances.push(SpawnedInstance {
                rule_index: p.rule_index,
                prefab: p.prefab,
                placement: p.placement,
                instance,
            });
        }
        record
    }

    fn retire_chunk(&mut self, record: ChunkRecord, sink: &mut dyn InstanceSink) -> usize {
        let mut released = 0;
        for s in record.instances {
            match self.pool.release(sink, s.prefab, s.instance) {
                Ok(()) => released += 1,
                Err(e) => warn!(chunk_x = record.coord.x, chunk_y = record.coord.y, "{e}"),
            }
        }
        released
    }
}

/// Per-chunk spatial hash for the spacing check. Cells are `spacing` wide in
/// chunk-local coordinates and clamped to the chunk, so a 3x3 scan always
/// covers every point that could be too close.
struct LocalGrid {
    cell: f32,
    max_index: i32,
    spacing_sq: f32,
    cells: FxHashMap<(i32, i32), Vec<Vec2>>,
}

impl LocalGrid {
    fn new(chunk_size: f32, spacing: f32) -> Self {
        let dim = (chunk_size / spacing).ceil().clamp(1.0, i32::MAX as f32) as i32;
        Self {
            cell: spacing,
            max_index: dim - 1,
            spacing_sq: spacing * spacing,
            cells: FxHashMap::default(),
        }
    }

    fn key(&self, p: Vec2) -> (i32, i32) {
        let cx = ((p.x / self.cell).floor() as i32).clamp(0, self.max_index);
        let cy = ((p.y / self.cell).floor() as i32).clamp(0, self.max_index);
        (cx, cy)
    }

    fn try_insert(&mut self, p: Vec2) -> bool {
        let (cx, cy) = self.key(p);
        for dy in -1..=1 {
            for dx in -1..=1 {
                let Some(points) = self.cells.get(&(cx + dx, cy + dy)) else {
                    continue;
                };
                if points.iter().any(|q| q.distance_squared(p) < self.spacing_sq) {
                    return false;
                }
            }
        }
        self.cells.entry((cx, cy)).or_default().push(p);
        true
    }
}
