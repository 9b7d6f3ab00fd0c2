//! Per-prefab free lists that let the spawner recycle instances instead of
//! destroying and reallocating them.
//!
//! Every instance the pool has ever allocated is in exactly one of two states:
//! active (handed out and owned by a chunk) or pooled (inactive, parked under
//! [`Holder::Pool`]). Counts per prefab always satisfy
//! `active + pooled == allocated`.

use rustc_hash::{FxHashMap, FxHashSet};
use thiserror::Error;

use isle_terrain::{Holder, InstanceHandle, InstanceSink, Placement, PrefabId};

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum PoolError {
    #[error("instance {0:?} is already pooled")]
    DoubleRelease(InstanceHandle),
    #[error("instance {0:?} was not allocated by this pool for {1:?}")]
    UnknownInstance(InstanceHandle, PrefabId),
}

/// Counts for one prefab identity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub active: usize,
    pub pooled: usize,
    pub allocated: usize,
}

#[derive(Debug, Default)]
pub struct InstancePool {
    free: FxHashMap<PrefabId, Vec<InstanceHandle>>,
    owner: FxHashMap<InstanceHandle, PrefabId>,
    active: FxHashSet<InstanceHandle>,
    allocated: FxHashMap<PrefabId, usize>,
}

impl InstancePool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand out an instance of `prefab` at `placement`.
    ///
    /// Reuses the most recently released instance when one is parked,
    /// otherwise asks the sink for a new one.
    pub fn acquire(
        &mut self,
        sink: &mut dyn InstanceSink,
        prefab: PrefabId,
        placement: &Placement,
    ) -> InstanceHandle {
        if let Some(handle) = self.free.get_mut(&prefab).and_then(Vec::pop) {
            sink.set_transform(handle, placement);
            sink.reparent(handle, Holder::Streaming);
            sink.set_active(handle, true);
            self.active.insert(handle);
            return handle;
        }

        let handle = sink.instantiate(prefab, placement, Holder::Streaming);
        self.owner.insert(handle, prefab);
        self.active.insert(handle);
        *self.allocated.entry(prefab).or_default() += 1;
        handle
    }

    /// Park an active instance: deactivate, move under the pool holder, push.
    pub fn release(
        &mut self,
        sink: &mut dyn InstanceSink,
        prefab: PrefabId,
        handle: InstanceHandle,
    ) -> Result<(), PoolError> {
        if self.owner.get(&handle) != Some(&prefab) {
            return Err(PoolError::UnknownInstance(handle, prefab));
        }
        if !self.active.remove(&handle) {
            return Err(PoolError::DoubleRelease(handle));
        }

        sink.set_active(handle, false);
        sink.reparent(handle, Holder::Pool);
        self.free.entry(prefab).or_default().push(handle);
        Ok(())
    }

    /// Destroy every pooled instance. Active instances are untouched.
    pub fn drain(&mut self, sink: &mut dyn InstanceSink) -> usize {
        let mut destroyed = 0;
        for (prefab, handles) in self.free.drain() {
            if let Some(n) = self.allocated.get_mut(&prefab) {
                *n = n.saturating_sub(handles.len());
            }
            for handle in handles {
                sink.destroy(handle);
                self.owner.remove(&handle);
                destroyed += 1;
            }
        }
        self.allocated.retain(|_, n| *n > 0);
        destroyed
    }

    pub fn is_active(&self, handle: InstanceHandle) -> bool {
        self.active.contains(&handle)
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn pooled_count(&self) -> usize {
        self.free.values().map(Vec::len).sum()
    }

    pub fn allocated_count(&self) -> usize {
        self.owner.len()
    }

    pub fn stats(&self, prefab: PrefabId) -> PoolStats {
        let pooled = self.free.get(&prefab).map_or(0, Vec::len);
        let allocated = self.allocated.get(&prefab).copied().unwrap_or(0);
        let active = self
            .active
            .iter()
            .filter(|h| self.owner.get(h) == Some(&prefab))
            .count();
        PoolStats {
            active,
            pooled,
            allocated,
        }
    }

    /// Every prefab this pool has allocated for, in ascending order.
    pub fn prefabs(&self) -> Vec<PrefabId> {
        let mut ids: Vec<PrefabId> = self.allocated.keys().copied().collect();
        ids.sort();
        ids
    }
}
