//! Nearest-first queue of chunks waiting to be built.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use rustc_hash::FxHashSet;

use crate::chunk::ChunkCoord;

/// Min-heap of candidate chunks keyed by planar distance to the viewpoint.
///
/// Distances are non-negative, so their IEEE bit patterns order the same way
/// the floats do. Ties break on the coordinate, which keeps the build order
/// independent of scan order.
#[derive(Debug, Default)]
pub struct ChunkBuildQueue {
    queue: BinaryHeap<Reverse<(u32, ChunkCoord)>>,
    pending: FxHashSet<ChunkCoord>,
}

impl ChunkBuildQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Duplicate coordinates are ignored.
    pub fn enqueue(&mut self, coord: ChunkCoord, distance: f32) {
        if self.pending.insert(coord) {
            self.queue.push(Reverse((distance.max(0.0).to_bits(), coord)));
        }
    }

    /// Nearest pending chunk and its distance.
    pub fn dequeue(&mut self) -> Option<(f32, ChunkCoord)> {
        while let Some(Reverse((bits, coord))) = self.queue.pop() {
            if self.pending.remove(&coord) {
                return Some((f32::from_bits(bits), coord));
            }
        }
        None
    }

    pub fn contains(&self, coord: ChunkCoord) -> bool {
        self.pending.contains(&coord)
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn clear(&mut self) {
        self.queue.clear();
        self.pending.clear();
    }
}
