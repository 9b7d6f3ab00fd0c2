//! Proximity streaming: chunks of pooled instances built and retired around
//! a moving viewpoint.

mod chunk;
mod pool;
mod queue;
mod rule;
mod spawner;

pub use chunk::{ChunkCoord, ChunkRecord, SpawnedInstance};
pub use pool::{InstancePool, PoolError, PoolStats};
pub use queue::ChunkBuildQueue;
pub use rule::SpawnRule;
pub use spawner::{
    ChunkPlan, ChunkSpawner, PlannedInstance, SpawnerConfig, SpawnerError, TickReport,
};
