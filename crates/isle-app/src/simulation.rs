//! Fixed-step runtime after generation: the viewpoint walks a loop, the
//! spawner streams around it and scent markers fade behind it.

use glam::{Vec2, Vec3};
use tracing::debug;

use isle_config::SessionConfig;
use isle_streaming::{ChunkSpawner, TickReport};
use isle_terrain::{InstanceSink, TerrainSurface};

use crate::scent::{DEFAULT_MIN_INTENSITY, ScentRegistry};

/// A circular walk around the middle of the terrain.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewpointPath {
    pub center: Vec2,
    pub radius: f32,
    /// Meters per second along the loop.
    pub speed: f32,
}

impl ViewpointPath {
    pub fn around(surface: &dyn TerrainSurface, radius01: f32, speed: f32) -> Self {
        let origin = surface.origin();
        let size = surface.size();
        Self {
            center: Vec2::new(origin.x + size.x * 0.5, origin.z + size.z * 0.5),
            radius: size.x.min(size.z) * radius01.max(0.0),
            speed,
        }
    }

    /// Position at `time` seconds, standing on the surface where there is one.
    pub fn position(&self, time: f32, surface: &dyn TerrainSurface) -> Vec3 {
        let angle = if self.radius > 0.0 {
            self.speed * time / self.radius
        } else {
            0.0
        };
        let xz = self.center + self.radius * Vec2::new(angle.cos(), angle.sin());
        let y = surface.sample(xz.x, xz.y).map_or(0.0, |s| s.height);
        Vec3::new(xz.x, y, xz.y)
    }
}

/// Running sums over every tick so far.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StreamingTotals {
    pub built: usize,
    pub destroyed: usize,
    pub spawned: usize,
    pub released: usize,
    pub starved_rules: usize,
    pub peak_chunks: usize,
}

impl StreamingTotals {
    fn record(&mut self, report: &TickReport, chunks: usize) {
        self.built += report.built;
        self.destroyed += report.destroyed;
        self.spawned += report.spawned;
        self.released += report.released;
        self.starved_rules += report.starved_rules;
        self.peak_chunks = self.peak_chunks.max(chunks);
    }
}

pub struct Simulation {
    spawner: ChunkSpawner,
    scents: ScentRegistry,
    path: ViewpointPath,
    tick_seconds: f32,
    scent_interval: u32,
    scent_intensity: f32,
    scent_lifetime: f32,
    ticks: u64,
    viewpoint: Vec3,
    totals: StreamingTotals,
}

impl Simulation {
    pub fn new(spawner: ChunkSpawner, path: ViewpointPath, session: &SessionConfig) -> Self {
        Self {
            spawner,
            scents: ScentRegistry::new(),
            path,
            tick_seconds: session.tick_seconds.max(0.0),
            scent_interval: session.scent_interval_ticks,
            scent_intensity: session.scent_intensity,
            scent_lifetime: session.scent_lifetime,
            ticks: 0,
            viewpoint: Vec3::ZERO,
            totals: StreamingTotals::default(),
        }
    }

    pub fn spawner(&self) -> &ChunkSpawner {
        &self.spawner
    }

    pub fn scents(&self) -> &ScentRegistry {
        &self.scents
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Simulated seconds elapsed.
    pub fn time(&self) -> f32 {
        self.ticks as f32 * self.tick_seconds
    }

    pub fn viewpoint(&self) -> Vec3 {
        self.viewpoint
    }

    pub fn totals(&self) -> StreamingTotals {
        self.totals
    }

    /// Advance one tick.
    pub fn step(&mut self, surface: &dyn TerrainSurface, sink: &mut dyn InstanceSink) -> TickReport {
        let now = self.time();
        self.viewpoint = self.path.position(now, surface);

        let report = self.spawner.tick(self.viewpoint, surface, sink);
        self.totals.record(&report, self.spawner.chunk_count());

        if self.scent_interval > 0 && self.ticks % u64::from(self.scent_interval) == 0 {
            self.scents
                .add(self.viewpoint, self.scent_intensity, self.scent_lifetime, now);
        }
        let expired = self.scents.expire(now);
        if expired > 0 {
            debug!(expired, remaining = self.scents.len(), "scents faded");
        }

        self.ticks += 1;
        report
    }

    /// Closest scent to `from` strong enough to follow.
    pub fn nearest_scent(&self, from: Vec3) -> Option<Vec3> {
        self.scents
            .nearest(from, DEFAULT_MIN_INTENSITY, self.time())
            .map(|s| s.position)
    }

    /// Retire all streamed chunks and destroy the pooled instances.
    pub fn shutdown(&mut self, sink: &mut dyn InstanceSink) -> usize {
        self.spawner.clear(sink)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use isle_streaming::SpawnerConfig;
    use isle_terrain::{Heightfield, RecordingSink};

    fn plain() -> Heightfield {
        let mut hf = Heightfield::new(33, Vec3::new(256.0, 50.0, 256.0), Vec3::ZERO)
            .expect("valid heightfield");
        for y in 0..33 {
            for x in 0..33 {
                hf.set_height01(x, y, 0.2);
            }
        }
        hf
    }

    fn simulation(terrain: &Heightfield, session: &SessionConfig) -> Simulation {
        let spawner = ChunkSpawner::new(SpawnerConfig::default(), 12345).expect("valid spawner");
        let path = ViewpointPath::around(terrain, session.path_radius01, session.viewpoint_speed);
        Simulation::new(spawner, path, session)
    }

    #[test]
    fn test_path_stays_on_circle() {
        let terrain = plain();
        let path = ViewpointPath::around(&terrain, 0.25, 10.0);
        assert_eq!(path.center, Vec2::new(128.0, 128.0));
        assert_eq!(path.radius, 64.0);
        for i in 0..20 {
            let p = path.position(i as f32 * 3.0, &terrain);
            let r = Vec2::new(p.x, p.z).distance(path.center);
            assert!((r - 64.0).abs() < 1e-3, "radius drifted to {r}");
            assert!((p.y - 10.0).abs() < 1e-4, "stands on the surface");
        }
    }

    #[test]
    fn test_steps_advance_clock_and_stream() {
        let terrain = plain();
        let session = SessionConfig::default();
        let mut sim = simulation(&terrain, &session);
        let mut sink = RecordingSink::new();

        for _ in 0..30 {
            sim.step(&terrain, &mut sink);
        }
        assert_eq!(sim.ticks(), 30);
        assert!((sim.time() - 1.0).abs() < 1e-4);
        assert!(sim.totals().built > 0);
        assert_eq!(sim.totals().built - sim.totals().destroyed, sim.spawner().chunk_count());
        assert!(sim.totals().peak_chunks >= sim.spawner().chunk_count());
    }

    #[test]
    fn test_scents_dropped_and_expired() {
        let terrain = plain();
        let session = SessionConfig {
            tick_seconds: 1.0,
            scent_interval_ticks: 2,
            scent_lifetime: 5.0,
            ..Default::default()
        };
        let mut sim = simulation(&terrain, &session);
        let mut sink = RecordingSink::new();

        for _ in 0..20 {
            sim.step(&terrain, &mut sink);
        }
        // Markers at t = 0, 2, ..., 18; at t = 19 only those from 16 and 18 remain.
        assert_eq!(sim.scents().len(), 2);
        let near = sim.nearest_scent(sim.viewpoint());
        assert!(near.is_some(), "the latest marker is near the viewpoint");
    }

    #[test]
    fn test_no_scents_when_disabled() {
        let terrain = plain();
        let session = SessionConfig {
            scent_interval_ticks: 0,
            ..Default::default()
        };
        let mut sim = simulation(&terrain, &session);
        let mut sink = RecordingSink::new();
        for _ in 0..10 {
            sim.step(&terrain, &mut sink);
        }
        assert!(sim.scents().is_empty());
    }

    #[test]
    fn test_shutdown_releases_everything() {
        let terrain = plain();
        let mut sim = simulation(&terrain, &SessionConfig::default());
        let mut sink = RecordingSink::new();
        for _ in 0..10 {
            sim.step(&terrain, &mut sink);
        }
        sim.shutdown(&mut sink);
        assert_eq!(sink.live_count(), 0);
        assert_eq!(sim.spawner().chunk_count(), 0);
    }
}
