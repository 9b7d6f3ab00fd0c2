//! One run: generate the island, then stream around a walking viewpoint.

use thiserror::Error;
use tracing::info;

use isle_config::Config;
use isle_streaming::{ChunkSpawner, SpawnerError};
use isle_terrain::{
    Collaborators, GridNavigation, Holder, NullPresenter, PipelineError, PipelineOutput,
    RecordingSink, TerrainData,
};

use crate::simulation::{Simulation, StreamingTotals, ViewpointPath};

/// Navigation grid cells per side, at most.
const MAX_NAV_CELLS: usize = 256;

/// Log a progress line every this many ticks.
const PROGRESS_EVERY: u64 = 100;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("generation failed: {0}")]
    Pipeline(#[from] PipelineError),
    #[error("streaming setup failed: {0}")]
    Spawner(#[from] SpawnerError),
}

/// Everything worth reporting about a finished session.
#[derive(Clone, Debug, PartialEq)]
pub struct SessionSummary {
    pub seed: u64,
    pub skipped_steps: Vec<&'static str>,
    pub props: usize,
    pub trees: usize,
    pub mobs: usize,
    pub groups: usize,
    pub caves: usize,
    pub nav_triangles: usize,
    pub height_checksum: u64,
    pub feature_mask_checksum: u64,
    pub ticks: u64,
    pub streaming: StreamingTotals,
    pub active_chunks: usize,
    pub streamed_instances: usize,
    pub pooled_instances: usize,
    pub scents: usize,
}

pub struct Session {
    seed: u64,
    terrain: TerrainData,
    navigation: GridNavigation,
    sink: RecordingSink,
    output: PipelineOutput,
    simulation: Simulation,
}

impl Session {
    /// Build the terrain and run the generation pipeline with `seed`.
    pub fn generate(config: &Config, seed: u64) -> Result<Self, SessionError> {
        let mut terrain = TerrainData::new(&config.world)?;
        let mut navigation =
            GridNavigation::new(config.world.resolution.saturating_sub(1).min(MAX_NAV_CELLS));
        let mut sink = RecordingSink::new();
        let mut presenter = NullPresenter;

        let pipeline = config.generation.pipeline();
        let output = {
            let mut collab = Collaborators {
                navigation: &mut navigation,
                instances: &mut sink,
                presenter: &mut presenter,
            };
            pipeline.run(&mut terrain, &mut collab, seed)?
        };

        let spawner = ChunkSpawner::new(config.streaming.clone(), seed)?;
        let path = ViewpointPath::around(
            &terrain,
            config.session.path_radius01,
            config.session.viewpoint_speed,
        );
        let simulation = Simulation::new(spawner, path, &config.session);

        Ok(Self {
            seed,
            terrain,
            navigation,
            sink,
            output,
            simulation,
        })
    }

    /// Generate again in place with `seed`. The previous run's instances are
    /// destroyed, streaming starts over and the clock resets.
    pub fn regenerate(&mut self, config: &Config, seed: u64) -> Result<(), SessionError> {
        let pipeline = config.generation.pipeline();
        pipeline.validate()?;
        let spawner = ChunkSpawner::new(config.streaming.clone(), seed)?;

        self.simulation.shutdown(&mut self.sink);
        let mut presenter = NullPresenter;
        self.output = {
            let mut collab = Collaborators {
                navigation: &mut self.navigation,
                instances: &mut self.sink,
                presenter: &mut presenter,
            };
            pipeline.rerun(&mut self.terrain, &mut collab, &mut self.output.layout, seed)?
        };

        let path = ViewpointPath::around(
            &self.terrain,
            config.session.path_radius01,
            config.session.viewpoint_speed,
        );
        self.simulation = Simulation::new(spawner, path, &config.session);
        self.seed = seed;
        Ok(())
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn terrain(&self) -> &TerrainData {
        &self.terrain
    }

    pub fn output(&self) -> &PipelineOutput {
        &self.output
    }

    pub fn sink(&self) -> &RecordingSink {
        &self.sink
    }

    pub fn simulation(&self) -> &Simulation {
        &self.simulation
    }

    pub fn navigation(&self) -> &GridNavigation {
        &self.navigation
    }

    /// Advance the simulation `ticks` times.
    pub fn run_ticks(&mut self, ticks: u64) {
        for _ in 0..ticks {
            let report = self.simulation.step(&self.terrain, &mut self.sink);
            let tick = self.simulation.ticks();
            if tick % PROGRESS_EVERY == 0 {
                let v = self.simulation.viewpoint();
                info!(
                    tick,
                    x = v.x,
                    z = v.z,
                    chunks = self.simulation.spawner().chunk_count(),
                    deferred = report.deferred,
                    instances = self.simulation.spawner().instance_count(),
                    "streaming progress"
                );
            }
        }
    }

    pub fn summary(&self) -> SessionSummary {
        let layout = &self.output.layout;
        let spawner = self.simulation.spawner();
        SessionSummary {
            seed: self.seed,
            skipped_steps: self.output.skipped().map(|o| o.name).collect(),
            props: layout.props.len(),
            trees: layout.trees.len(),
            mobs: layout.mobs.len(),
            groups: layout.groups.len(),
            caves: layout.caves.len(),
            nav_triangles: self.navigation.stats().triangles,
            height_checksum: self.terrain.heightfield.checksum(),
            feature_mask_checksum: self.terrain.feature_mask_checksum(),
            ticks: self.simulation.ticks(),
            streaming: self.simulation.totals(),
            active_chunks: spawner.chunk_count(),
            streamed_instances: self.sink.count_in(Holder::Streaming),
            pooled_instances: self.sink.count_in(Holder::Pool),
            scents: self.simulation.scents().len(),
        }
    }

    /// Tear down streamed content.
    pub fn shutdown(&mut self) {
        self.simulation.shutdown(&mut self.sink);
    }
}

/// Generate, walk for the configured number of ticks, summarize.
pub fn run(config: &Config, seed: u64) -> Result<SessionSummary, SessionError> {
    let mut session = Session::generate(config, seed)?;
    session.run_ticks(u64::from(config.session.ticks));
    let summary = session.summary();
    info!(
        seed,
        ticks = summary.ticks,
        chunks_built = summary.streaming.built,
        chunks_destroyed = summary.streaming.destroyed,
        peak_chunks = summary.streaming.peak_chunks,
        streamed = summary.streamed_instances,
        pooled = summary.pooled_instances,
        scents = summary.scents,
        "session finished"
    );
    session.shutdown();
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_world_is_fatal() {
        let mut config = Config::default();
        config.world.resolution = 1;
        assert!(matches!(
            Session::generate(&config, 1),
            Err(SessionError::Pipeline(_))
        ));
    }

    #[test]
    fn test_invalid_streaming_is_fatal() {
        let mut config = Config::default();
        config.world.resolution = 33;
        config.world.detail_resolution = 32;
        config.world.weight_resolution = 32;
        config.world.hole_resolution = 32;
        config.generation.steps.clear();
        config.streaming.chunk_size = -1.0;
        assert!(matches!(
            Session::generate(&config, 1),
            Err(SessionError::Spawner(_))
        ));
    }
}
