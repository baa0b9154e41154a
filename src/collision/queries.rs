use glam::Vec2;

use crate::core::graph::FixtureId;

/// Ray segment `p1 + t * (p2 - p1)` for `t` in `[0, max_fraction]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayCastInput {
    pub p1: Vec2,
    pub p2: Vec2,
    pub max_fraction: f32,
}

impl RayCastInput {
    pub fn new(p1: Vec2, p2: Vec2) -> Self {
        Self {
            p1,
            p2,
            max_fraction: 1.0,
        }
    }

    pub fn point_at(&self, fraction: f32) -> Vec2 {
        self.p1 * (1.0 - fraction) + self.p2 * fraction
    }
}

/// Shape-level ray hit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayCastOutput {
    pub normal: Vec2,
    pub fraction: f32,
}

/// Result of a ray cast against the world's fixtures.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RaycastHit {
    pub fixture: FixtureId,
    pub point: Vec2,
    pub normal: Vec2,
    pub fraction: f32,
}
