//! Core entities of the interaction graph: bodies, fixtures, joints and the
//! graph that owns them.

pub mod body;
pub mod constraints;
pub mod fixture;
pub mod graph;
pub mod types;

pub use body::{Body, BodyDef, BodyType};
pub use constraints::{ConstraintBody, Joint, JointDef, JointEdge, JointRecord};
pub use fixture::{Filter, Fixture, FixtureDef};
pub use graph::{BodyId, ContactId, FixtureId, InteractionGraph, JointId};
pub use types::{MassData, Position, Rot, Sweep, Transform, Velocity};
