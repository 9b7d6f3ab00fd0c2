//! Planar chunk grid and the per-chunk record of what was spawned there.

use glam::{Vec2, Vec3};

use isle_terrain::{InstanceHandle, Placement, PrefabId};

/// Identifies a square chunk on the XZ plane.
///
/// `y` indexes world Z; chunks have no vertical extent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkCoord {
    pub x: i32,
    pub y: i32,
}

impl ChunkCoord {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Chunk containing world `(position.x, position.z)`.
    pub fn from_world(position: Vec3, chunk_size: f32) -> Self {
        Self {
            x: (position.x / chunk_size).floor() as i32,
            y: (position.z / chunk_size).floor() as i32,
        }
    }

    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }

    /// World XZ of the chunk's minimum corner.
    pub fn origin(self, chunk_size: f32) -> Vec2 {
        Vec2::new(self.x as f32 * chunk_size, self.y as f32 * chunk_size)
    }

    pub fn center(self, chunk_size: f32) -> Vec2 {
        self.origin(chunk_size) + Vec2::splat(chunk_size * 0.5)
    }

    /// Planar distance from the chunk center to `viewpoint`, height ignored.
    pub fn center_distance(self, viewpoint: Vec3, chunk_size: f32) -> f32 {
        self.center(chunk_size)
            .distance(Vec2::new(viewpoint.x, viewpoint.z))
    }
}

/// One instance owned by a built chunk.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpawnedInstance {
    pub rule_index: usize,
    pub prefab: PrefabId,
    pub placement: Placement,
    pub instance: InstanceHandle,
}

/// Everything a built chunk owns. Dropping the record from the spawner
/// returns each instance to the pool.
#[derive(Clone, Debug, PartialEq)]
pub struct ChunkRecord {
    pub coord: ChunkCoord,
    pub instances: Vec<SpawnedInstance>,
    /// Rules that ran out of trials before reaching their target.
    pub starved_rules: usize,
}

impl ChunkRecord {
    pub fn new(coord: ChunkCoord) -> Self {
        Self {
            coord,
            instances: Vec::new(),
            starved_rules: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}
