//! In-memory [`InstanceSink`] that records the lifecycle of every instance.

use rustc_hash::FxHashMap;

use crate::collab::{Holder, InstanceHandle, InstanceSink, Placement, PrefabId};

#[derive(Clone, Debug, PartialEq)]
pub struct RecordedInstance {
    pub prefab: PrefabId,
    pub placement: Placement,
    pub holder: Holder,
    pub active: bool,
}

/// Keeps every live instance in a map and counts lifecycle calls.
#[derive(Debug, Default)]
pub struct RecordingSink {
    next: u64,
    live: FxHashMap<InstanceHandle, RecordedInstance>,
    instantiated: usize,
    destroyed: usize,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, instance: InstanceHandle) -> Option<&RecordedInstance> {
        self.live.get(&instance)
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    pub fn active_count(&self) -> usize {
        self.live.values().filter(|r| r.active).count()
    }

    pub fn count_in(&self, holder: Holder) -> usize {
        self.live.values().filter(|r| r.holder == holder).count()
    }

    /// Total `instantiate` calls so far.
    pub fn instantiated(&self) -> usize {
        self.instantiated
    }

    /// Total `destroy` calls that hit a live instance.
    pub fn destroyed(&self) -> usize {
        self.destroyed
    }
}

impl InstanceSink for RecordingSink {
    fn instantiate(
        &mut self,
        prefab: PrefabId,
        placement: &Placement,
        holder: Holder,
    ) -> InstanceHandle {
        self.next += 1;
        self.instantiated += 1;
        let handle = InstanceHandle(self.next);
        self.live.insert(
            handle,
            RecordedInstance {
                prefab,
                placement: *placement,
                holder,
                active: true,
            },
        );
        handle
    }

    fn set_transform(&mut self, instance: InstanceHandle, placement: &Placement) {
        if let Some(r) = self.live.get_mut(&instance) {
            r.placement = *placement;
        }
    }

    fn set_active(&mut self, instance: InstanceHandle, active: bool) {
        if let Some(r) = self.live.get_mut(&instance) {
            r.active = active;
        }
    }

    fn reparent(&mut self, instance: InstanceHandle, holder: Holder) {
        if let Some(r) = self.live.get_mut(&instance) {
            r.holder = holder;
        }
    }

    fn destroy(&mut self, instance: InstanceHandle) {
        if self.live.remove(&instance).is_some() {
            self.destroyed += 1;
        }
    }
}
