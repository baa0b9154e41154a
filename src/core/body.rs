use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::{
    collision::contact::ContactEdge,
    core::{
        constraints::JointEdge,
        fixture::Fixture,
        graph::{BodyId, FixtureId},
        types::{Rot, Sweep, Transform},
    },
    error::{ensure_finite, ensure_non_negative, WorldResult},
    utils::{
        allocator::{Arena, Linked, Links},
        math::{cross_sv, cross_vv},
    },
};

/// Motion type of a body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BodyType {
    /// Zero mass, zero velocity, moved only by the user.
    #[default]
    Static,
    /// Zero mass, velocity set by the user, moved by the solver.
    Kinematic,
    /// Positive mass, velocity determined by forces and constraints.
    Dynamic,
}

/// Construction parameters for a body.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BodyDef {
    pub body_type: BodyType,
    pub position: Vec2,
    pub angle: f32,
    pub linear_velocity: Vec2,
    pub angular_velocity: f32,
    pub linear_damping: f32,
    pub angular_damping: f32,
    pub allow_sleep: bool,
    pub awake: bool,
    pub fixed_rotation: bool,
    /// Treat as a fast projectile: continuous collision against dynamic bodies too.
    pub bullet: bool,
    pub active: bool,
    pub gravity_scale: f32,
}

impl Default for BodyDef {
    fn default() -> Self {
        Self {
            body_type: BodyType::Static,
            position: Vec2::ZERO,
            angle: 0.0,
            linear_velocity: Vec2::ZERO,
            angular_velocity: 0.0,
            linear_damping: 0.0,
            angular_damping: 0.0,
            allow_sleep: true,
            awake: true,
            fixed_rotation: false,
            bullet: false,
            active: true,
            gravity_scale: 1.0,
        }
    }
}

impl BodyDef {
    pub fn dynamic() -> Self {
        Self {
            body_type: BodyType::Dynamic,
            ..Self::default()
        }
    }

    pub fn kinematic() -> Self {
        Self {
            body_type: BodyType::Kinematic,
            ..Self::default()
        }
    }

    pub fn position(mut self, position: Vec2) -> Self {
        self.position = position;
        self
    }

    pub fn angle(mut self, angle: f32) -> Self {
        self.angle = angle;
        self
    }

    pub fn linear_velocity(mut self, velocity: Vec2) -> Self {
        self.linear_velocity = velocity;
        self
    }

    pub fn angular_velocity(mut self, velocity: f32) -> Self {
        self.angular_velocity = velocity;
        self
    }

    pub fn damping(mut self, linear: f32, angular: f32) -> Self {
        self.linear_damping = linear;
        self.angular_damping = angular;
        self
    }

    pub fn bullet(mut self, bullet: bool) -> Self {
        self.bullet = bullet;
        self
    }

    pub fn awake(mut self, awake: bool) -> Self {
        self.awake = awake;
        self
    }

    pub fn active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    pub fn allow_sleep(mut self, allow: bool) -> Self {
        self.allow_sleep = allow;
        self
    }

    pub fn fixed_rotation(mut self, fixed: bool) -> Self {
        self.fixed_rotation = fixed;
        self
    }

    pub fn gravity_scale(mut self, scale: f32) -> Self {
        self.gravity_scale = scale;
        self
    }

    pub fn validate(&self) -> WorldResult<()> {
        ensure_finite("position.x", self.position.x)?;
        ensure_finite("position.y", self.position.y)?;
        ensure_finite("angle", self.angle)?;
        ensure_finite("linear_velocity.x", self.linear_velocity.x)?;
        ensure_finite("linear_velocity.y", self.linear_velocity.y)?;
        ensure_finite("angular_velocity", self.angular_velocity)?;
        ensure_non_negative("linear_damping", self.linear_damping)?;
        ensure_non_negative("angular_damping", self.angular_damping)?;
        ensure_finite("gravity_scale", self.gravity_scale)?;
        Ok(())
    }
}

/// Rigid body node of the interaction graph.
#[derive(Debug)]
pub struct Body {
    pub(crate) body_type: BodyType,
    pub(crate) xf: Transform,
    pub(crate) sweep: Sweep,
    pub(crate) linear_velocity: Vec2,
    pub(crate) angular_velocity: f32,
    pub(crate) force: Vec2,
    pub(crate) torque: f32,
    pub(crate) mass: f32,
    pub(crate) inv_mass: f32,
    /// Rotational inertia about the center of mass.
    pub(crate) inertia: f32,
    pub(crate) inv_inertia: f32,
    pub(crate) linear_damping: f32,
    pub(crate) angular_damping: f32,
    pub(crate) gravity_scale: f32,
    pub(crate) sleep_time: f32,

    pub(crate) awake: bool,
    pub(crate) active: bool,
    pub(crate) bullet: bool,
    pub(crate) fixed_rotation: bool,
    pub(crate) sleeping_allowed: bool,
    pub(crate) island_flag: bool,
    pub(crate) island_index: usize,

    pub(crate) fixtures: Vec<FixtureId>,
    pub(crate) contact_edges: Vec<ContactEdge>,
    pub(crate) joint_edges: Vec<JointEdge>,
    pub(crate) links: Links<Body>,
}

impl Linked for Body {
    fn links(&self) -> &Links<Self> {
        &self.links
    }

    fn links_mut(&mut self) -> &mut Links<Self> {
        &mut self.links
    }
}

impl Body {
    pub(crate) fn new(def: &BodyDef) -> Self {
        let xf = Transform::new(def.position, def.angle);
        let (mass, inv_mass) = if def.body_type == BodyType::Dynamic {
            (1.0, 1.0)
        } else {
            (0.0, 0.0)
        };
        let moving = def.body_type != BodyType::Static;

        Self {
            body_type: def.body_type,
            xf,
            sweep: Sweep {
                local_center: Vec2::ZERO,
                c0: def.position,
                c: def.position,
                a0: def.angle,
                a: def.angle,
                alpha0: 0.0,
            },
            linear_velocity: if moving { def.linear_velocity } else { Vec2::ZERO },
            angular_velocity: if moving { def.angular_velocity } else { 0.0 },
            force: Vec2::ZERO,
            torque: 0.0,
            mass,
            inv_mass,
            inertia: 0.0,
            inv_inertia: 0.0,
            linear_damping: def.linear_damping,
            angular_damping: def.angular_damping,
            gravity_scale: def.gravity_scale,
            sleep_time: 0.0,
            awake: def.awake,
            active: def.active,
            bullet: def.bullet,
            fixed_rotation: def.fixed_rotation,
            sleeping_allowed: def.allow_sleep,
            island_flag: false,
            island_index: 0,
            fixtures: Vec::new(),
            contact_edges: Vec::new(),
            joint_edges: Vec::new(),
            links: Links::default(),
        }
    }

    pub fn body_type(&self) -> BodyType {
        self.body_type
    }

    pub fn is_static(&self) -> bool {
        self.body_type == BodyType::Static
    }

    pub fn is_dynamic(&self) -> bool {
        self.body_type == BodyType::Dynamic
    }

    pub fn transform(&self) -> Transform {
        self.xf
    }

    /// World position of the body origin.
    pub fn position(&self) -> Vec2 {
        self.xf.p
    }

    pub fn angle(&self) -> f32 {
        self.sweep.a
    }

    pub fn world_center(&self) -> Vec2 {
        self.sweep.c
    }

    pub fn local_center(&self) -> Vec2 {
        self.sweep.local_center
    }

    pub fn sweep(&self) -> &Sweep {
        &self.sweep
    }

    pub fn linear_velocity(&self) -> Vec2 {
        self.linear_velocity
    }

    pub fn set_linear_velocity(&mut self, velocity: Vec2) {
        if self.is_static() {
            return;
        }
        if velocity.length_squared() > 0.0 {
            self.set_awake(true);
        }
        self.linear_velocity = velocity;
    }

    pub fn angular_velocity(&self) -> f32 {
        self.angular_velocity
    }

    pub fn set_angular_velocity(&mut self, omega: f32) {
        if self.is_static() {
            return;
        }
        if omega * omega > 0.0 {
            self.set_awake(true);
        }
        self.angular_velocity = omega;
    }

    /// Velocity of a world point attached to this body.
    pub fn linear_velocity_from_world_point(&self, point: Vec2) -> Vec2 {
        self.linear_velocity + cross_sv(self.angular_velocity, point - self.sweep.c)
    }

    pub fn force(&self) -> Vec2 {
        self.force
    }

    pub fn torque(&self) -> f32 {
        self.torque
    }

    /// Applies a force at a world point. Forces on sleeping bodies are
    /// dropped unless `wake` is set.
    pub fn apply_force(&mut self, force: Vec2, point: Vec2, wake: bool) {
        if !self.is_dynamic() {
            return;
        }
        if wake && !self.awake {
            self.set_awake(true);
        }
        if self.awake {
            self.force += force;
            self.torque += cross_vv(point - self.sweep.c, force);
        }
    }

    pub fn apply_force_to_center(&mut self, force: Vec2, wake: bool) {
        if !self.is_dynamic() {
            return;
        }
        if wake && !self.awake {
            self.set_awake(true);
        }
        if self.awake {
            self.force += force;
        }
    }

    pub fn apply_torque(&mut self, torque: f32, wake: bool) {
        if !self.is_dynamic() {
            return;
        }
        if wake && !self.awake {
            self.set_awake(true);
        }
        if self.awake {
            self.torque += torque;
        }
    }

    pub fn apply_linear_impulse(&mut self, impulse: Vec2, point: Vec2, wake: bool) {
        if !self.is_dynamic() {
            return;
        }
        if wake && !self.awake {
            self.set_awake(true);
        }
        if self.awake {
            self.linear_velocity += self.inv_mass * impulse;
            self.angular_velocity += self.inv_inertia * cross_vv(point - self.sweep.c, impulse);
        }
    }

    pub fn apply_angular_impulse(&mut self, impulse: f32, wake: bool) {
        if !self.is_dynamic() {
            return;
        }
        if wake && !self.awake {
            self.set_awake(true);
        }
        if self.awake {
            self.angular_velocity += self.inv_inertia * impulse;
        }
    }

    pub fn mass(&self) -> f32 {
        self.mass
    }

    pub fn inv_mass(&self) -> f32 {
        self.inv_mass
    }

    /// Rotational inertia about the body origin.
    pub fn inertia(&self) -> f32 {
        self.inertia + self.mass * self.sweep.local_center.length_squared()
    }

    pub fn inv_inertia(&self) -> f32 {
        self.inv_inertia
    }

    pub fn linear_damping(&self) -> f32 {
        self.linear_damping
    }

    pub fn set_linear_damping(&mut self, damping: f32) -> WorldResult<()> {
        self.linear_damping = ensure_non_negative("linear_damping", damping)?;
        Ok(())
    }

    pub fn angular_damping(&self) -> f32 {
        self.angular_damping
    }

    pub fn set_angular_damping(&mut self, damping: f32) -> WorldResult<()> {
        self.angular_damping = ensure_non_negative("angular_damping", damping)?;
        Ok(())
    }

    pub fn gravity_scale(&self) -> f32 {
        self.gravity_scale
    }

    pub fn set_gravity_scale(&mut self, scale: f32) -> WorldResult<()> {
        self.gravity_scale = ensure_finite("gravity_scale", scale)?;
        Ok(())
    }

    pub fn is_awake(&self) -> bool {
        self.awake
    }

    /// Waking resets the sleep timer. Sleeping also zeroes velocity and
    /// accumulated forces.
    pub fn set_awake(&mut self, flag: bool) {
        if flag {
            if !self.awake {
                self.awake = true;
                self.sleep_time = 0.0;
            }
        } else {
            self.awake = false;
            self.sleep_time = 0.0;
            self.linear_velocity = Vec2::ZERO;
            self.angular_velocity = 0.0;
            self.force = Vec2::ZERO;
            self.torque = 0.0;
        }
    }

    pub fn sleep_time(&self) -> f32 {
        self.sleep_time
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_bullet(&self) -> bool {
        self.bullet
    }

    pub fn set_bullet(&mut self, flag: bool) {
        self.bullet = flag;
    }

    pub fn is_sleeping_allowed(&self) -> bool {
        self.sleeping_allowed
    }

    pub fn set_sleeping_allowed(&mut self, flag: bool) {
        self.sleeping_allowed = flag;
        if !flag {
            self.set_awake(true);
        }
    }

    pub fn is_fixed_rotation(&self) -> bool {
        self.fixed_rotation
    }

    pub fn fixtures(&self) -> &[FixtureId] {
        &self.fixtures
    }

    /// Incident contacts, most recent first.
    pub fn contact_edges(&self) -> impl Iterator<Item = &ContactEdge> + '_ {
        self.contact_edges.iter().rev()
    }

    /// Incident joints, most recent first.
    pub fn joint_edges(&self) -> impl Iterator<Item = &JointEdge> + '_ {
        self.joint_edges.iter().rev()
    }

    pub fn world_point(&self, local_point: Vec2) -> Vec2 {
        self.xf.apply(local_point)
    }

    pub fn local_point(&self, world_point: Vec2) -> Vec2 {
        self.xf.apply_inverse(world_point)
    }

    pub fn world_vector(&self, local_vector: Vec2) -> Vec2 {
        self.xf.q.apply(local_vector)
    }

    pub fn island_index(&self) -> usize {
        self.island_index
    }

    /// Whether contacts between this body and `other` may exist.
    pub(crate) fn should_collide(&self, other_id: BodyId, other: &Body) -> bool {
        if self.body_type != BodyType::Dynamic && other.body_type != BodyType::Dynamic {
            return false;
        }
        !self
            .joint_edges
            .iter()
            .any(|edge| edge.other == other_id && !edge.collide_connected)
    }

    /// Rebuilds the transform from the sweep's end pose.
    pub(crate) fn synchronize_transform(&mut self) {
        self.xf = Transform::from_center(self.sweep.c, self.sweep.a, self.sweep.local_center);
    }

    /// Transform at the start of the current sweep.
    pub(crate) fn sweep_start_transform(&self) -> Transform {
        Transform::from_center(self.sweep.c0, self.sweep.a0, self.sweep.local_center)
    }

    /// Moves the body to step fraction `alpha` and collapses the sweep there.
    pub(crate) fn advance(&mut self, alpha: f32) {
        self.sweep.advance(alpha);
        self.sweep.c = self.sweep.c0;
        self.sweep.a = self.sweep.a0;
        self.xf.q = Rot::new(self.sweep.a);
        self.xf.p = self.sweep.c - self.xf.q.apply(self.sweep.local_center);
    }

    pub(crate) fn set_transform(&mut self, position: Vec2, angle: f32) {
        self.xf = Transform::new(position, angle);
        self.sweep.c = self.xf.apply(self.sweep.local_center);
        self.sweep.a = angle;
        self.sweep.c0 = self.sweep.c;
        self.sweep.a0 = angle;
    }

    pub(crate) fn shift_origin(&mut self, new_origin: Vec2) {
        self.xf.p -= new_origin;
        self.sweep.c0 -= new_origin;
        self.sweep.c -= new_origin;
    }

    /// Recomputes mass, center of mass and inertia from the attached fixtures.
    pub(crate) fn reset_mass_data(&mut self, fixtures: &Arena<Fixture>) {
        self.mass = 0.0;
        self.inv_mass = 0.0;
        self.inertia = 0.0;
        self.inv_inertia = 0.0;
        self.sweep.local_center = Vec2::ZERO;

        if self.body_type != BodyType::Dynamic {
            self.sweep.c0 = self.xf.p;
            self.sweep.c = self.xf.p;
            self.sweep.a0 = self.sweep.a;
            return;
        }

        let mut local_center = Vec2::ZERO;
        for fixture in self.fixtures.iter().filter_map(|&id| fixtures.get(id)) {
            if fixture.density == 0.0 {
                continue;
            }
            let mass_data = fixture.shape.compute_mass(fixture.density);
            self.mass += mass_data.mass;
            local_center += mass_data.mass * mass_data.center;
            self.inertia += mass_data.inertia;
        }

        if self.mass > 0.0 {
            self.inv_mass = 1.0 / self.mass;
            local_center *= self.inv_mass;
        } else {
            // Dynamic bodies always carry mass.
            self.mass = 1.0;
            self.inv_mass = 1.0;
        }

        if self.inertia > 0.0 && !self.fixed_rotation {
            self.inertia -= self.mass * local_center.length_squared();
            debug_assert!(self.inertia > 0.0, "non-positive central inertia");
            self.inv_inertia = 1.0 / self.inertia;
        } else {
            self.inertia = 0.0;
            self.inv_inertia = 0.0;
        }

        // Move the center of mass and keep the velocity of the new center consistent.
        let old_center = self.sweep.c;
        self.sweep.local_center = local_center;
        self.sweep.c = self.xf.apply(local_center);
        self.sweep.c0 = self.sweep.c;
        self.linear_velocity += cross_sv(self.angular_velocity, self.sweep.c - old_center);
    }
}
