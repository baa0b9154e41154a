//! The constraint contract shared by every joint kind.

use std::any::Any;
use std::fmt::Debug;

use glam::Vec2;

use crate::{
    core::{
        body::Body,
        graph::{BodyId, JointId},
    },
    dynamics::solver::SolverData,
    error::WorldResult,
    utils::allocator::{Linked, Links},
};

/// Island-local view of a constrained body, handed to joints at init time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstraintBody {
    /// Index into the island's position and velocity buffers.
    pub index: usize,
    pub local_center: Vec2,
    pub inv_mass: f32,
    pub inv_inertia: f32,
}

/// A constraint between two bodies solved alongside contacts.
///
/// Implementations cache whatever they need from [`ConstraintBody`] in
/// `init_velocity_constraints`, including the island indices used by the
/// later solve calls. Warm starting is the joint's job: scale the stored
/// impulses by `data.step.dt_ratio` and apply them when
/// `data.step.warm_starting` is set, otherwise reset them to zero.
pub trait Joint: Debug + Send + Sync {
    fn init_velocity_constraints(
        &mut self,
        body_a: &ConstraintBody,
        body_b: &ConstraintBody,
        data: &mut SolverData<'_>,
    );

    fn solve_velocity_constraints(&mut self, data: &mut SolverData<'_>);

    /// Returns true when the position error is within tolerance.
    fn solve_position_constraints(&mut self, data: &mut SolverData<'_>) -> bool;

    fn anchor_a(&self, body_a: &Body) -> Vec2;

    fn anchor_b(&self, body_b: &Body) -> Vec2;

    /// Reaction force on body B at the anchor, in newtons.
    fn reaction_force(&self, inv_dt: f32) -> Vec2;

    /// Reaction torque on body B, in newton-meters.
    fn reaction_torque(&self, inv_dt: f32) -> f32;

    /// Rewrites any world-space data cached by the joint.
    fn shift_origin(&mut self, _new_origin: Vec2) {}

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Builds a joint from a definition.
pub trait JointDef {
    fn body_a(&self) -> BodyId;

    fn body_b(&self) -> BodyId;

    /// Whether the two connected bodies still generate contacts.
    fn collide_connected(&self) -> bool;

    fn build(self) -> WorldResult<Box<dyn Joint>>;
}

/// Graph bookkeeping around a joint.
#[derive(Debug)]
pub struct JointRecord {
    pub(crate) joint: Box<dyn Joint>,
    pub(crate) body_a: BodyId,
    pub(crate) body_b: BodyId,
    pub(crate) collide_connected: bool,
    pub(crate) island_flag: bool,
    pub(crate) links: Links<JointRecord>,
}

impl Linked for JointRecord {
    fn links(&self) -> &Links<Self> {
        &self.links
    }

    fn links_mut(&mut self) -> &mut Links<Self> {
        &mut self.links
    }
}

impl JointRecord {
    pub(crate) fn new(
        joint: Box<dyn Joint>,
        body_a: BodyId,
        body_b: BodyId,
        collide_connected: bool,
    ) -> Self {
        Self {
            joint,
            body_a,
            body_b,
            collide_connected,
            island_flag: false,
            links: Links::default(),
        }
    }

    pub fn body_a(&self) -> BodyId {
        self.body_a
    }

    pub fn body_b(&self) -> BodyId {
        self.body_b
    }

    pub fn collide_connected(&self) -> bool {
        self.collide_connected
    }

    pub fn joint(&self) -> &dyn Joint {
        self.joint.as_ref()
    }

    pub fn joint_mut(&mut self) -> &mut dyn Joint {
        self.joint.as_mut()
    }
}

/// Adjacency entry linking a body to one incident joint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JointEdge {
    pub other: BodyId,
    pub joint: JointId,
    pub collide_connected: bool,
}
