//! Punches elliptical holes in the surface and marks each cave entrance with a prefab.

use glam::Vec3;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{StepContext, StepReport, invalid};
use crate::collab::{Holder, LayerTag, Placement, PrefabId, TerrainSurface};
use crate::error::StepError;
use crate::heightfield::nearest_cell;
use crate::layout::PlacedInstance;
use crate::seed::{CAVE_SALT, step_rng};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaveCarver {
    pub priority: i32,
    /// Entrance marker. Without one the step does nothing.
    pub marker: Option<PrefabId>,
    /// Number of cave attempts. Default: 2.
    pub cave_count: u32,
    /// Hole radius in meters. Default: 10.
    pub hole_radius: f32,
    /// Reject sites below this normalized height.
    pub min_height01: f32,
    /// Reject sites steeper than this.
    pub max_slope01: f32,
    /// Vertical offset of the marker from the surface.
    pub y_offset: f32,
}

impl Default for CaveCarver {
    fn default() -> Self {
        Self {
            priority: 140,
            marker: Some(PrefabId(900)),
            cave_count: 2,
            hole_radius: 10.0,
            min_height01: 0.05,
            max_slope01: 0.35,
            y_offset: -1.0,
        }
    }
}

impl CaveCarver {
    pub fn validate(&self) -> Result<(), StepError> {
        if self.hole_radius < 0.0 {
            return Err(invalid("hole_radius must not be negative"));
        }
        Ok(())
    }

    pub fn apply(&self, ctx: &mut StepContext<'_, '_>, seed: u64) -> Result<StepReport, StepError> {
        let marker = self.marker.ok_or(StepError::MissingResource("cave marker prefab"))?;
        let mut rng = step_rng(seed, CAVE_SALT);

        let terrain = &mut *ctx.terrain;
        let hr = terrain.holes.width();
        let size = terrain.heightfield.size();
        let cell_x = size.x / (hr - 1) as f32;
        let cell_z = size.z / (hr - 1) as f32;
        let rx = (self.hole_radius / cell_x).ceil() as i64;
        let ry = (self.hole_radius / cell_z).ceil() as i64;
        let mut carved = 0usize;

        for _ in 0..self.cave_count {
            let u: f32 = rng.random();
            let v: f32 = rng.random();

            if terrain.sample_height01(u, v) < self.min_height01 {
                continue;
            }
            if terrain.slope01(u, v) > self.max_slope01 {
                continue;
            }

            let cx = nearest_cell(u, hr) as i64;
            let cy = nearest_cell(v, hr) as i64;
            let last = (hr - 1) as i64;
            for y in (cy - ry).clamp(0, last)..=(cy + ry).clamp(0, last) {
                for x in (cx - rx).clamp(0, last)..=(cx + rx).clamp(0, last) {
                    let dx = (x - cx) as f32 / rx.max(1) as f32;
                    let dy = (y - cy) as f32 / ry.max(1) as f32;
                    if dx * dx + dy * dy <= 1.0 {
                        terrain.holes.set(x as usize, y as usize, true);
                    }
                }
            }

            let position = terrain.surface_point(u, v) + Vec3::Y * self.y_offset;
            let placement = Placement {
                layer: LayerTag::Marker,
                ..Placement::at(position)
            };
            let handle = ctx
                .collab
                .instances
                .instantiate(marker, &placement, Holder::Caves);
            ctx.layout.caves.push(PlacedInstance {
                rule_index: 0,
                prefab: marker,
                position,
                rotation: placement.rotation,
                scale: placement.scale,
                layer: placement.layer,
                instance: Some(handle),
            });
            debug!(u, v, "cave carved");
            carved += 1;
        }

        info!(carved, attempts = self.cave_count, "caves carved");
        Ok(StepReport::new(self.cave_count as usize, carved))
    }
}
