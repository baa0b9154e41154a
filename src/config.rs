//! Global configuration constants and world settings for the Planar Accelerator engine.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::error::{ensure_finite, WorldResult};

/// Default gravity vector applied in the physics world (Y-up).
pub const DEFAULT_GRAVITY: [f32; 2] = [0.0, -10.0];

/// Default integration timestep (in seconds).
pub const DEFAULT_TIME_STEP: f32 = 1.0 / 60.0;

/// Default number of velocity iterations per step.
pub const DEFAULT_VELOCITY_ITERATIONS: usize = 8;

/// Default number of position iterations per step.
pub const DEFAULT_POSITION_ITERATIONS: usize = 3;

/// Collision and constraint tolerance (meters).
pub const LINEAR_SLOP: f32 = 0.005;

/// Skin radius carried by segment shapes.
pub const POLYGON_RADIUS: f32 = 2.0 * LINEAR_SLOP;

/// Fattening margin applied to broad-phase boxes.
pub const AABB_EXTENSION: f32 = 0.1;

/// Scales the predicted displacement added to a moving broad-phase box.
pub const AABB_MULTIPLIER: f32 = 2.0;

/// Default cell size for the broad-phase uniform grid.
pub const DEFAULT_BROADPHASE_CELL_SIZE: f32 = 4.0;

/// Proxies spanning more cells than this live in the oversized list.
pub const MAX_PROXY_CELLS: usize = 64;

/// Sub-step budget per contact inside one TOI loop.
pub const MAX_SUB_STEPS: u32 = 8;

/// Contact capacity of a TOI sub-island.
pub const MAX_TOI_CONTACTS: usize = 32;

/// Position iterations used by the TOI sub-island solve.
pub const TOI_POSITION_ITERATIONS: usize = 20;

/// Iteration cap of the conservative advancement root finder.
pub const MAX_TOI_ITERATIONS: usize = 20;

/// Relative approach speed below which collisions are inelastic.
pub const VELOCITY_THRESHOLD: f32 = 1.0;

/// Largest position correction applied per position iteration.
pub const MAX_LINEAR_CORRECTION: f32 = 0.2;

/// Largest translation per step. Keeps the solver stable at high speeds.
pub const MAX_TRANSLATION: f32 = 2.0;

/// Largest rotation per step.
pub const MAX_ROTATION: f32 = 0.5 * std::f32::consts::PI;

/// Overlap resolution rate of the discrete position solver.
pub const BAUMGARTE: f32 = 0.2;

/// Overlap resolution rate of the TOI position solver.
pub const TOI_BAUMGARTE: f32 = 0.75;

/// Seconds a body must stay under the sleep tolerances before it sleeps.
pub const TIME_TO_SLEEP: f32 = 0.5;

/// Linear speed (m/s) below which a body counts as resting.
pub const LINEAR_SLEEP_TOLERANCE: f32 = 0.01;

/// Angular speed (rad/s) below which a body counts as resting.
pub const ANGULAR_SLEEP_TOLERANCE: f32 = 2.0 / 180.0 * std::f32::consts::PI;

/// Runtime switches of a [`crate::world::World`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldSettings {
    pub gravity: Vec2,
    pub allow_sleep: bool,
    pub warm_starting: bool,
    pub continuous_physics: bool,
    pub sub_stepping: bool,
    pub auto_clear_forces: bool,
    /// Solve independent islands on the rayon pool (requires the `parallel` feature).
    pub parallel_islands: bool,
}

impl Default for WorldSettings {
    fn default() -> Self {
        Self {
            gravity: Vec2::from_array(DEFAULT_GRAVITY),
            allow_sleep: true,
            warm_starting: true,
            continuous_physics: true,
            sub_stepping: false,
            auto_clear_forces: true,
            parallel_islands: false,
        }
    }
}

impl WorldSettings {
    pub fn with_gravity(mut self, gravity: Vec2) -> Self {
        self.gravity = gravity;
        self
    }

    pub fn validate(&self) -> WorldResult<()> {
        ensure_finite("gravity.x", self.gravity.x)?;
        ensure_finite("gravity.y", self.gravity.y)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_are_valid() {
        let settings = WorldSettings::default();
        assert!(settings.validate().is_ok());
        assert!(settings.continuous_physics);
        assert!(!settings.sub_stepping);
    }

    #[test]
    fn non_finite_gravity_is_rejected() {
        let settings = WorldSettings::default().with_gravity(Vec2::new(0.0, f32::NAN));
        assert!(settings.validate().is_err());
    }
}
