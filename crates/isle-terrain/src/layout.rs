//! Plain-data records of everything the scatter steps placed.

use glam::{Quat, Vec3};

use crate::collab::{InstanceHandle, InstanceSink, LayerTag, PrefabId, TerrainSurface};

/// One persistent placed object.
#[derive(Clone, Debug, PartialEq)]
pub struct PlacedInstance {
    pub rule_index: usize,
    pub prefab: PrefabId,
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
    pub layer: LayerTag,
    /// Set once the instance sink has created the object.
    pub instance: Option<InstanceHandle>,
}

/// A tree stored terrain-relative, like a terrain tree layer would keep it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TreeInstance {
    pub prototype: PrefabId,
    /// `(u, height01, v)`.
    pub position01: Vec3,
    pub width_scale: f32,
    pub height_scale: f32,
}

impl TreeInstance {
    pub fn world_position(&self, surface: &dyn TerrainSurface) -> Vec3 {
        surface.origin() + self.position01 * surface.size()
    }

    pub fn scale(&self) -> Vec3 {
        Vec3::new(self.width_scale, self.height_scale, self.width_scale)
    }
}

/// A group center and its members. Only groups with at least one member exist.
#[derive(Clone, Debug, PartialEq)]
pub struct GroupRecord {
    pub rule_index: usize,
    pub name: String,
    pub center: Vec3,
    pub members: Vec<PlacedInstance>,
}

/// Output of the scatter steps of one generation run.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Layout {
    pub caves: Vec<PlacedInstance>,
    pub props: Vec<PlacedInstance>,
    pub trees: Vec<TreeInstance>,
    pub mobs: Vec<PlacedInstance>,
    pub groups: Vec<GroupRecord>,
}

impl Layout {
    /// Every instance-backed record, groups flattened.
    pub fn instances(&self) -> impl Iterator<Item = &PlacedInstance> {
        self.caves
            .iter()
            .chain(&self.props)
            .chain(&self.mobs)
            .chain(self.groups.iter().flat_map(|g| &g.members))
    }

    /// Destroy every instance this layout owns and forget all records.
    /// Returns how many instances were destroyed.
    pub fn destroy_instances(&mut self, sink: &mut dyn InstanceSink) -> usize {
        let mut destroyed = 0;
        for handle in self.instances().filter_map(|p| p.instance) {
            sink.destroy(handle);
            destroyed += 1;
        }
        *self = Self::default();
        destroyed
    }

    /// Blocking footprints for navigation, from obstacle-tagged props.
    pub fn obstacles(&self, radius_per_scale: f32) -> Vec<(Vec3, f32)> {
        self.props
            .iter()
            .filter(|p| p.layer == LayerTag::Obstacle)
            .map(|p| (p.position, p.scale.max_element() * radius_per_scale))
            .collect()
    }
}
