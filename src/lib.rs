//! Planar Accelerator – island-based 2D rigid-body dynamics for Rust.
//!
//! A [`World`] owns bodies, fixtures, contacts and joints as one interaction
//! graph. Each [`World::step`] refreshes contacts, partitions awake bodies
//! into islands, solves every island with a sequential-impulse solver (in
//! parallel when the `parallel` feature is on) and finally sweeps fast
//! bodies with continuous collision so they cannot tunnel.

pub mod collision;
pub mod config;
pub mod core;
pub mod dynamics;
pub mod error;
pub mod utils;
pub mod world;

pub use glam::Vec2;

pub use collision::{
    contact::{Contact, ContactImpulse},
    narrowphase::Manifold,
    queries::RaycastHit,
    shapes::{Aabb, Circle, Segment, Shape},
};
pub use config::WorldSettings;
pub use core::{
    body::{Body, BodyDef, BodyType},
    constraints::{Joint, JointDef},
    fixture::{Filter, Fixture, FixtureDef},
    graph::{BodyId, ContactId, FixtureId, JointId},
    types::Transform,
};
pub use dynamics::friction::{FrictionJoint, FrictionJointDef};
pub use error::{WorldError, WorldResult};
pub use utils::{
    debug_draw::{Color, DebugDraw, DrawFlags},
    profiling::Profile,
};
pub use world::{ContactFilter, ContactListener, DefaultContactFilter, DestructionListener, World};
