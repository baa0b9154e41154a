use std::fmt;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::{
    collision::{
        broadphase::{BroadPhase, ProxyId},
        queries::{RayCastInput, RayCastOutput},
        shapes::{Aabb, Shape},
    },
    core::{
        graph::{BodyId, FixtureId},
        types::Transform,
    },
    error::{ensure_non_negative, WorldResult},
};

/// Collision filtering data.
///
/// Fixtures sharing a non-zero group always collide (positive group) or
/// never collide (negative group). Otherwise each side's mask must accept
/// the other's category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    pub category_bits: u16,
    pub mask_bits: u16,
    pub group_index: i16,
}

impl Default for Filter {
    fn default() -> Self {
        Self {
            category_bits: 0x0001,
            mask_bits: 0xFFFF,
            group_index: 0,
        }
    }
}

impl Filter {
    pub fn should_collide(&self, other: &Filter) -> bool {
        if self.group_index == other.group_index && self.group_index != 0 {
            return self.group_index > 0;
        }
        (self.mask_bits & other.category_bits) != 0 && (self.category_bits & other.mask_bits) != 0
    }
}

/// Construction parameters for a fixture.
pub struct FixtureDef {
    pub shape: Box<dyn Shape>,
    pub friction: f32,
    pub restitution: f32,
    pub density: f32,
    pub is_sensor: bool,
    pub filter: Filter,
}

impl fmt::Debug for FixtureDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FixtureDef")
            .field("shape", &self.shape)
            .field("friction", &self.friction)
            .field("restitution", &self.restitution)
            .field("density", &self.density)
            .field("is_sensor", &self.is_sensor)
            .finish()
    }
}

impl FixtureDef {
    pub fn new<S: Shape + 'static>(shape: S) -> Self {
        Self {
            shape: Box::new(shape),
            friction: 0.2,
            restitution: 0.0,
            density: 0.0,
            is_sensor: false,
            filter: Filter::default(),
        }
    }

    pub fn density(mut self, density: f32) -> Self {
        self.density = density;
        self
    }

    pub fn friction(mut self, friction: f32) -> Self {
        self.friction = friction;
        self
    }

    pub fn restitution(mut self, restitution: f32) -> Self {
        self.restitution = restitution;
        self
    }

    pub fn sensor(mut self, is_sensor: bool) -> Self {
        self.is_sensor = is_sensor;
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    pub fn validate(&self) -> WorldResult<()> {
        ensure_non_negative("density", self.density)?;
        ensure_non_negative("friction", self.friction)?;
        ensure_non_negative("restitution", self.restitution)?;
        ensure_non_negative("shape.radius", self.shape.radius())?;
        Ok(())
    }
}

/// A shape attached to a body, with material and filtering data.
#[derive(Debug)]
pub struct Fixture {
    pub(crate) body: BodyId,
    pub(crate) shape: Box<dyn Shape>,
    pub(crate) density: f32,
    pub(crate) friction: f32,
    pub(crate) restitution: f32,
    pub(crate) is_sensor: bool,
    pub(crate) filter: Filter,
    pub(crate) proxy: Option<ProxyId<FixtureId>>,
    pub(crate) aabb: Aabb,
}

impl Fixture {
    pub(crate) fn new(body: BodyId, def: FixtureDef) -> Self {
        Self {
            body,
            shape: def.shape,
            density: def.density,
            friction: def.friction,
            restitution: def.restitution,
            is_sensor: def.is_sensor,
            filter: def.filter,
            proxy: None,
            aabb: Aabb::default(),
        }
    }

    pub fn body(&self) -> BodyId {
        self.body
    }

    pub fn shape(&self) -> &dyn Shape {
        self.shape.as_ref()
    }

    pub fn density(&self) -> f32 {
        self.density
    }

    pub fn friction(&self) -> f32 {
        self.friction
    }

    /// Affects contacts created after the change.
    pub fn set_friction(&mut self, friction: f32) -> WorldResult<()> {
        self.friction = ensure_non_negative("friction", friction)?;
        Ok(())
    }

    pub fn restitution(&self) -> f32 {
        self.restitution
    }

    pub fn set_restitution(&mut self, restitution: f32) -> WorldResult<()> {
        self.restitution = ensure_non_negative("restitution", restitution)?;
        Ok(())
    }

    pub fn is_sensor(&self) -> bool {
        self.is_sensor
    }

    pub fn filter(&self) -> Filter {
        self.filter
    }

    /// Tight bounds as of the last broad-phase synchronization.
    pub fn aabb(&self) -> Aabb {
        self.aabb
    }

    pub fn test_point(&self, xf: &Transform, point: Vec2) -> bool {
        self.shape.test_point(xf, point)
    }

    pub fn ray_cast(&self, input: &RayCastInput, xf: &Transform) -> Option<RayCastOutput> {
        self.shape.ray_cast(input, xf)
    }

    pub(crate) fn create_proxy(
        &mut self,
        broad_phase: &mut BroadPhase<FixtureId>,
        xf: &Transform,
        id: FixtureId,
    ) {
        debug_assert!(self.proxy.is_none(), "fixture already has a proxy");
        self.aabb = self.shape.compute_aabb(xf);
        self.proxy = Some(broad_phase.create_proxy(&self.aabb, id));
    }

    pub(crate) fn destroy_proxy(&mut self, broad_phase: &mut BroadPhase<FixtureId>) {
        if let Some(proxy) = self.proxy.take() {
            broad_phase.destroy_proxy(proxy);
        }
    }

    /// Covers the swept motion from `xf1` to `xf2` in the broad-phase.
    pub(crate) fn synchronize(
        &mut self,
        broad_phase: &mut BroadPhase<FixtureId>,
        xf1: &Transform,
        xf2: &Transform,
    ) {
        let Some(proxy) = self.proxy else {
            return;
        };
        let aabb1 = self.shape.compute_aabb(xf1);
        let aabb2 = self.shape.compute_aabb(xf2);
        self.aabb = aabb1.union(&aabb2);
        broad_phase.move_proxy(proxy, &self.aabb, xf2.p - xf1.p);
    }
}
