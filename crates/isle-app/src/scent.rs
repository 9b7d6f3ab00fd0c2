//! Expiring point events that mobs can track, such as blood scent.
//!
//! The registry is owned by whoever drives the simulation clock; every query
//! takes the current time explicitly.

use glam::Vec3;

/// Default fade-out time in seconds.
pub const DEFAULT_LIFETIME: f32 = 60.0;

/// Scents weaker than this are ignored by default queries.
pub const DEFAULT_MIN_INTENSITY: f32 = 0.1;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Scent {
    pub position: Vec3,
    /// Intensity at creation.
    pub intensity: f32,
    pub created_at: f32,
    pub lifetime: f32,
}

impl Scent {
    pub fn is_expired(&self, now: f32) -> bool {
        now - self.created_at >= self.lifetime
    }

    /// Linear fade from `intensity` at creation to zero at expiry.
    pub fn intensity_at(&self, now: f32) -> f32 {
        if self.lifetime <= 0.0 {
            return 0.0;
        }
        let t = (now - self.created_at) / self.lifetime;
        (self.intensity * (1.0 - t)).max(0.0)
    }
}

#[derive(Debug, Default)]
pub struct ScentRegistry {
    scents: Vec<Scent>,
}

impl ScentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, position: Vec3, intensity: f32, lifetime: f32, now: f32) {
        self.scents.push(Scent {
            position,
            intensity,
            created_at: now,
            lifetime,
        });
    }

    /// Drop everything that has fully faded. Returns how many were removed.
    pub fn expire(&mut self, now: f32) -> usize {
        let before = self.scents.len();
        self.scents.retain(|s| !s.is_expired(now));
        before - self.scents.len()
    }

    /// Closest scent still at least `min_intensity` strong.
    pub fn nearest(&self, from: Vec3, min_intensity: f32, now: f32) -> Option<&Scent> {
        self.scents
            .iter()
            .filter(|s| s.intensity_at(now) >= min_intensity)
            .min_by(|a, b| {
                a.position
                    .distance_squared(from)
                    .total_cmp(&b.position.distance_squared(from))
            })
    }

    pub fn active(&self, min_intensity: f32, now: f32) -> impl Iterator<Item = &Scent> {
        self.scents
            .iter()
            .filter(move |s| s.intensity_at(now) >= min_intensity)
    }

    pub fn len(&self) -> usize {
        self.scents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scents.is_empty()
    }
}
