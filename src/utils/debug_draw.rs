//! Debug drawing hook. The world never owns a renderer; callers pass one in.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::core::types::Transform;

/// RGB color in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    pub const INACTIVE: Self = Self::new(0.5, 0.5, 0.3);
    pub const STATIC: Self = Self::new(0.5, 0.9, 0.5);
    pub const KINEMATIC: Self = Self::new(0.5, 0.5, 0.9);
    pub const ASLEEP: Self = Self::new(0.6, 0.6, 0.6);
    pub const AWAKE: Self = Self::new(0.9, 0.7, 0.7);
    pub const JOINT: Self = Self::new(0.5, 0.8, 0.8);
    pub const AABB: Self = Self::new(0.9, 0.3, 0.9);
}

/// Which layers [`crate::world::World::draw_debug`] emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawFlags {
    pub shapes: bool,
    pub joints: bool,
    pub aabbs: bool,
    pub center_of_mass: bool,
}

impl Default for DrawFlags {
    fn default() -> Self {
        Self {
            shapes: true,
            joints: true,
            aabbs: false,
            center_of_mass: false,
        }
    }
}

/// Receiver of debug geometry.
pub trait DebugDraw {
    fn draw_polygon(&mut self, vertices: &[Vec2], color: Color);
    fn draw_circle(&mut self, center: Vec2, radius: f32, color: Color);
    fn draw_solid_circle(&mut self, center: Vec2, radius: f32, axis: Vec2, color: Color);
    fn draw_segment(&mut self, p1: Vec2, p2: Vec2, color: Color);
    fn draw_transform(&mut self, xf: &Transform);
}
