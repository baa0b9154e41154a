//! Top-down friction: a joint that resists relative motion up to a force
//! and torque budget.

use std::any::Any;

use glam::{Mat2, Vec2};

use crate::{
    core::{
        body::Body,
        constraints::{ConstraintBody, Joint, JointDef},
        graph::BodyId,
        types::Rot,
    },
    dynamics::solver::SolverData,
    error::{ensure_finite, ensure_non_negative, WorldError, WorldResult},
    utils::math::{cross_sv, cross_vv, inverse_or_zero},
};

/// Definition of a [`FrictionJoint`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrictionJointDef {
    pub body_a: BodyId,
    pub body_b: BodyId,
    pub local_anchor_a: Vec2,
    pub local_anchor_b: Vec2,
    /// Maximum friction force in newtons.
    pub max_force: f32,
    /// Maximum friction torque in newton-meters.
    pub max_torque: f32,
    pub collide_connected: bool,
}

impl FrictionJointDef {
    pub fn new(body_a: BodyId, body_b: BodyId) -> Self {
        Self {
            body_a,
            body_b,
            local_anchor_a: Vec2::ZERO,
            local_anchor_b: Vec2::ZERO,
            max_force: 0.0,
            max_torque: 0.0,
            collide_connected: false,
        }
    }

    /// Sets both local anchors from one world anchor point.
    pub fn initialize(mut self, body_a: &Body, body_b: &Body, anchor: Vec2) -> Self {
        self.local_anchor_a = body_a.local_point(anchor);
        self.local_anchor_b = body_b.local_point(anchor);
        self
    }

    pub fn max_force(mut self, force: f32) -> Self {
        self.max_force = force;
        self
    }

    pub fn max_torque(mut self, torque: f32) -> Self {
        self.max_torque = torque;
        self
    }

    pub fn collide_connected(mut self, flag: bool) -> Self {
        self.collide_connected = flag;
        self
    }
}

impl JointDef for FrictionJointDef {
    fn body_a(&self) -> BodyId {
        self.body_a
    }

    fn body_b(&self) -> BodyId {
        self.body_b
    }

    fn collide_connected(&self) -> bool {
        self.collide_connected
    }

    fn build(self) -> WorldResult<Box<dyn Joint>> {
        for (field, value) in [
            ("local_anchor_a.x", self.local_anchor_a.x),
            ("local_anchor_a.y", self.local_anchor_a.y),
            ("local_anchor_b.x", self.local_anchor_b.x),
            ("local_anchor_b.y", self.local_anchor_b.y),
        ] {
            ensure_finite(field, value)?;
        }
        if self.body_a == self.body_b {
            return Err(WorldError::SameBody);
        }
        Ok(Box::new(FrictionJoint {
            local_anchor_a: self.local_anchor_a,
            local_anchor_b: self.local_anchor_b,
            max_force: ensure_non_negative("max_force", self.max_force)?,
            max_torque: ensure_non_negative("max_torque", self.max_torque)?,
            linear_impulse: Vec2::ZERO,
            angular_impulse: 0.0,
            solver: SolverCache::default(),
        }))
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct SolverCache {
    index_a: usize,
    index_b: usize,
    r_a: Vec2,
    r_b: Vec2,
    inv_mass_a: f32,
    inv_mass_b: f32,
    inv_inertia_a: f32,
    inv_inertia_b: f32,
    linear_mass: Mat2,
    angular_mass: f32,
}

/// Applies at most `max_force` and `max_torque` against the relative
/// velocity of two bodies at a shared anchor.
///
/// With one body static this models ground friction for a top-down game.
#[derive(Debug, Clone)]
pub struct FrictionJoint {
    local_anchor_a: Vec2,
    local_anchor_b: Vec2,
    max_force: f32,
    max_torque: f32,
    linear_impulse: Vec2,
    angular_impulse: f32,
    solver: SolverCache,
}

impl FrictionJoint {
    pub fn local_anchor_a(&self) -> Vec2 {
        self.local_anchor_a
    }

    pub fn local_anchor_b(&self) -> Vec2 {
        self.local_anchor_b
    }

    pub fn max_force(&self) -> f32 {
        self.max_force
    }

    pub fn set_max_force(&mut self, force: f32) -> WorldResult<()> {
        self.max_force = ensure_non_negative("max_force", force)?;
        Ok(())
    }

    pub fn max_torque(&self) -> f32 {
        self.max_torque
    }

    pub fn set_max_torque(&mut self, torque: f32) -> WorldResult<()> {
        self.max_torque = ensure_non_negative("max_torque", torque)?;
        Ok(())
    }

    /// Accumulated linear impulse of the last solve.
    pub fn linear_impulse(&self) -> Vec2 {
        self.linear_impulse
    }

    /// Accumulated angular impulse of the last solve.
    pub fn angular_impulse(&self) -> f32 {
        self.angular_impulse
    }
}

impl Joint for FrictionJoint {
    fn init_velocity_constraints(
        &mut self,
        body_a: &ConstraintBody,
        body_b: &ConstraintBody,
        data: &mut SolverData<'_>,
    ) {
        let (m_a, m_b) = (body_a.inv_mass, body_b.inv_mass);
        let (i_a, i_b) = (body_a.inv_inertia, body_b.inv_inertia);

        let q_a = Rot::new(data.positions[body_a.index].a);
        let q_b = Rot::new(data.positions[body_b.index].a);
        let r_a = q_a.apply(self.local_anchor_a - body_a.local_center);
        let r_b = q_b.apply(self.local_anchor_b - body_b.local_center);

        let k = Mat2::from_cols(
            Vec2::new(
                m_a + m_b + i_a * r_a.y * r_a.y + i_b * r_b.y * r_b.y,
                -i_a * r_a.x * r_a.y - i_b * r_b.x * r_b.y,
            ),
            Vec2::new(
                -i_a * r_a.x * r_a.y - i_b * r_b.x * r_b.y,
                m_a + m_b + i_a * r_a.x * r_a.x + i_b * r_b.x * r_b.x,
            ),
        );
        let angular_mass = i_a + i_b;

        self.solver = SolverCache {
            index_a: body_a.index,
            index_b: body_b.index,
            r_a,
            r_b,
            inv_mass_a: m_a,
            inv_mass_b: m_b,
            inv_inertia_a: i_a,
            inv_inertia_b: i_b,
            linear_mass: inverse_or_zero(k),
            angular_mass: if angular_mass > 0.0 { 1.0 / angular_mass } else { 0.0 },
        };

        if data.step.warm_starting {
            self.linear_impulse *= data.step.dt_ratio;
            self.angular_impulse *= data.step.dt_ratio;

            let p = self.linear_impulse;
            let a = &mut data.velocities[body_a.index];
            a.v -= m_a * p;
            a.w -= i_a * (cross_vv(r_a, p) + self.angular_impulse);
            let b = &mut data.velocities[body_b.index];
            b.v += m_b * p;
            b.w += i_b * (cross_vv(r_b, p) + self.angular_impulse);
        } else {
            self.linear_impulse = Vec2::ZERO;
            self.angular_impulse = 0.0;
        }
    }

    fn solve_velocity_constraints(&mut self, data: &mut SolverData<'_>) {
        let s = self.solver;
        let h = data.step.dt;
        let mut a = data.velocities[s.index_a];
        let mut b = data.velocities[s.index_b];

        {
            let cdot = b.w - a.w;
            let impulse = -s.angular_mass * cdot;
            let old = self.angular_impulse;
            let max_impulse = h * self.max_torque;
            self.angular_impulse = (old + impulse).clamp(-max_impulse, max_impulse);
            let impulse = self.angular_impulse - old;
            a.w -= s.inv_inertia_a * impulse;
            b.w += s.inv_inertia_b * impulse;
        }

        {
            let cdot = b.v + cross_sv(b.w, s.r_b) - a.v - cross_sv(a.w, s.r_a);
            let impulse = -(s.linear_mass * cdot);
            let old = self.linear_impulse;
            self.linear_impulse += impulse;

            let max_impulse = h * self.max_force;
            if self.linear_impulse.length_squared() > max_impulse * max_impulse {
                self.linear_impulse = self.linear_impulse.normalize_or_zero() * max_impulse;
            }

            let impulse = self.linear_impulse - old;
            a.v -= s.inv_mass_a * impulse;
            a.w -= s.inv_inertia_a * cross_vv(s.r_a, impulse);
            b.v += s.inv_mass_b * impulse;
            b.w += s.inv_inertia_b * cross_vv(s.r_b, impulse);
        }

        data.velocities[s.index_a] = a;
        data.velocities[s.index_b] = b;
    }

    fn solve_position_constraints(&mut self, _data: &mut SolverData<'_>) -> bool {
        true
    }

    fn anchor_a(&self, body_a: &Body) -> Vec2 {
        body_a.world_point(self.local_anchor_a)
    }

    fn anchor_b(&self, body_b: &Body) -> Vec2 {
        body_b.world_point(self.local_anchor_b)
    }

    fn reaction_force(&self, inv_dt: f32) -> Vec2 {
        inv_dt * self.linear_impulse
    }

    fn reaction_torque(&self, inv_dt: f32) -> f32 {
        inv_dt * self.angular_impulse
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
